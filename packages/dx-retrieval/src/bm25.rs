use std::collections::HashMap;

use dx_config::Bm25;
use dx_domain::{Document, tokenize};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SparseHit {
	/// Position of the document in the corpus the index was built from.
	pub index: usize,
	pub score: f64,
}

/// Okapi BM25 over a fixed corpus snapshot. Rebuild to pick up corpus changes.
#[derive(Debug)]
pub struct SparseIndex {
	term_freqs: Vec<HashMap<String, u32>>,
	doc_lens: Vec<usize>,
	idf: HashMap<String, f64>,
	avgdl: f64,
	k1: f64,
	b: f64,
}
impl SparseIndex {
	pub fn build(corpus: &[Document], params: &Bm25) -> Self {
		let mut term_freqs = Vec::with_capacity(corpus.len());
		let mut doc_lens = Vec::with_capacity(corpus.len());
		let mut df: HashMap<String, u32> = HashMap::new();

		for doc in corpus {
			let tokens = tokenize(doc.content());
			let mut tf: HashMap<String, u32> = HashMap::new();

			doc_lens.push(tokens.len());

			for token in tokens {
				*tf.entry(token).or_default() += 1;
			}
			for term in tf.keys() {
				*df.entry(term.clone()).or_default() += 1;
			}

			term_freqs.push(tf);
		}

		let n = corpus.len() as f64;
		let idf = df
			.into_iter()
			.map(|(term, freq)| {
				let freq = f64::from(freq);

				(term, ((n - freq + 0.5) / (freq + 0.5) + 1.0).ln())
			})
			.collect();
		let avgdl = if doc_lens.is_empty() {
			0.0
		} else {
			doc_lens.iter().sum::<usize>() as f64 / doc_lens.len() as f64
		};

		tracing::debug!(documents = corpus.len(), avgdl, "Sparse index built.");

		Self {
			term_freqs,
			doc_lens,
			idf,
			avgdl,
			k1: f64::from(params.k1),
			b: f64::from(params.b),
		}
	}

	pub fn len(&self) -> usize {
		self.doc_lens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.doc_lens.is_empty()
	}

	/// Scores every document in corpus order. Repeated query terms count once per occurrence.
	pub fn scores(&self, query: &str) -> Vec<f64> {
		let query_tokens = tokenize(query);
		let avgdl = if self.avgdl > 0.0 { self.avgdl } else { 1.0 };

		self.term_freqs
			.iter()
			.zip(&self.doc_lens)
			.map(|(tf, &doc_len)| {
				let mut score = 0.0;

				for token in &query_tokens {
					let Some(&freq) = tf.get(token) else {
						continue;
					};
					let f = f64::from(freq);
					let idf = self.idf.get(token).copied().unwrap_or(0.0);
					let norm = self.k1 * (1.0 - self.b + self.b * doc_len as f64 / avgdl);

					score += idf * f * (self.k1 + 1.0) / (f + norm);
				}

				score
			})
			.collect()
	}

	/// Top `top_k` documents with a positive score, best first. Equal scores keep corpus order.
	pub fn search(&self, query: &str, top_k: usize) -> Vec<SparseHit> {
		let mut hits: Vec<SparseHit> = self
			.scores(query)
			.into_iter()
			.enumerate()
			.filter(|(_, score)| *score > 0.0)
			.map(|(index, score)| SparseHit { index, score })
			.collect();

		hits.sort_by(|a, b| b.score.total_cmp(&a.score));
		hits.truncate(top_k);

		hits
	}
}
