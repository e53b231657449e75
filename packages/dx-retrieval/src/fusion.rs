use std::collections::{HashMap, HashSet};

use dx_domain::{Document, DocumentKey, MetadataFilter};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FusedScore {
	pub document_key: DocumentKey,
	pub score: f64,
}

/// Maps each document key to its first 0-based position in `docs`.
pub fn rank_map(docs: &[Document]) -> HashMap<DocumentKey, usize> {
	let mut ranks = HashMap::with_capacity(docs.len());

	for (rank, doc) in docs.iter().enumerate() {
		ranks.entry(doc.key()).or_insert(rank);
	}

	ranks
}

/// Weighted reciprocal rank fusion.
///
/// `fused(d) = alpha / (k + rank_dense(d)) + (1 - alpha) / (k + rank_sparse(d))`, where a term is
/// omitted when the document is absent from that list. Output is sorted by score, best first,
/// with equal scores ordered by key.
pub fn reciprocal_rank_fusion(
	ranks_dense: &HashMap<DocumentKey, usize>,
	ranks_sparse: &HashMap<DocumentKey, usize>,
	alpha: f32,
	k: u32,
) -> Vec<FusedScore> {
	let keys: HashSet<DocumentKey> =
		ranks_dense.keys().chain(ranks_sparse.keys()).copied().collect();
	let mut fused: Vec<FusedScore> = keys
		.into_iter()
		.map(|key| FusedScore {
			document_key: key,
			score: fused_score(ranks_dense.get(&key), ranks_sparse.get(&key), alpha, k),
		})
		.collect();

	fused.sort_by(|a, b| {
		b.score.total_cmp(&a.score).then_with(|| a.document_key.cmp(&b.document_key))
	});

	fused
}

/// Fuses two ranked lists into one with [`reciprocal_rank_fusion`]. Equal scores keep
/// first-seen order, dense list first.
pub fn fuse(dense: &[Document], sparse: &[Document], alpha: f32, k: u32) -> Vec<Document> {
	let scores: HashMap<DocumentKey, f64> =
		reciprocal_rank_fusion(&rank_map(dense), &rank_map(sparse), alpha, k)
			.into_iter()
			.map(|entry| (entry.document_key, entry.score))
			.collect();
	let score_of = |doc: &Document| scores.get(&doc.key()).copied().unwrap_or(0.0);
	let mut candidates = dedup_documents(dense.iter().chain(sparse).cloned());

	candidates.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));

	candidates
}

/// Keeps the first occurrence of every document key.
pub fn dedup_documents(docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
	let mut seen = HashSet::new();

	docs.into_iter().filter(|doc| seen.insert(doc.key())).collect()
}

pub fn apply_filter(docs: Vec<Document>, filter: &MetadataFilter) -> Vec<Document> {
	if filter.is_empty() {
		return docs;
	}

	docs.into_iter().filter(|doc| filter.matches(doc)).collect()
}

fn fused_score(
	dense_rank: Option<&usize>,
	sparse_rank: Option<&usize>,
	alpha: f32,
	k: u32,
) -> f64 {
	let alpha = f64::from(alpha);
	let k = f64::from(k);
	let mut score = 0.0;

	if let Some(&rank) = dense_rank {
		score += alpha / (k + rank as f64);
	}
	if let Some(&rank) = sparse_rank {
		score += (1.0 - alpha) / (k + rank as f64);
	}

	score
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn docs(texts: &[&str]) -> Vec<Document> {
		texts.iter().map(|text| Document::from_content(*text)).collect()
	}

	#[test]
	fn better_rank_in_both_lists_wins() {
		let list = docs(&["a", "b", "c"]);
		let fused = reciprocal_rank_fusion(&rank_map(&list), &rank_map(&list), 0.3, 60);

		assert_eq!(fused[0].document_key, list[0].key());
		assert!(fused[0].score > fused[1].score);
		assert!(fused[1].score > fused[2].score);
	}

	#[test]
	fn single_list_documents_keep_partial_score() {
		let dense = docs(&["a"]);
		let sparse = docs(&["b"]);
		let fused = reciprocal_rank_fusion(&rank_map(&dense), &rank_map(&sparse), 0.5, 60);

		assert_eq!(fused.len(), 2);
		assert!(fused.iter().all(|entry| (entry.score - 0.5 / 60.0).abs() < 1e-12));
	}

	#[test]
	fn alpha_weights_dense_list() {
		let dense = docs(&["a", "b"]);
		let sparse = docs(&["b", "a"]);

		assert_eq!(fuse(&dense, &sparse, 0.9, 60)[0].content(), "a");
		assert_eq!(fuse(&dense, &sparse, 0.1, 60)[0].content(), "b");
	}

	#[test]
	fn equal_scores_keep_first_seen_order() {
		let dense = docs(&["a", "b"]);
		let sparse = docs(&["b", "a"]);
		let fused = fuse(&dense, &sparse, 0.5, 60);

		assert_eq!(fused.iter().map(Document::content).collect::<Vec<_>>(), vec!["a", "b"]);
	}

	#[test]
	fn fused_order_follows_rrf_scores() {
		let dense = docs(&["a", "b", "c"]);
		let sparse = docs(&["c", "d"]);
		let expected: Vec<DocumentKey> =
			reciprocal_rank_fusion(&rank_map(&dense), &rank_map(&sparse), 0.4, 60)
				.into_iter()
				.map(|entry| entry.document_key)
				.collect();
		let fused: Vec<DocumentKey> =
			fuse(&dense, &sparse, 0.4, 60).iter().map(Document::key).collect();

		assert_eq!(fused, expected);
	}

	#[test]
	fn dedup_uses_content_and_metadata() {
		let meta = json!({ "source": "doc1" }).as_object().cloned().expect("object");
		let out = dedup_documents(vec![
			Document::new("x", meta.clone()),
			Document::from_content("x"),
			Document::new("x", meta),
		]);

		assert_eq!(out.len(), 2);
		assert_eq!(out[0].metadata().get("source"), Some(&json!("doc1")));
	}
}
