use unicode_normalization::UnicodeNormalization;
use unicode_script::{Script, UnicodeScript};
use unicode_segmentation::UnicodeSegmentation;

/// Splits text into index terms.
///
/// Text is NFKC-normalized and lowercased, then cut on Unicode word boundaries. Runs of CJK
/// characters have no word separators, so each run of two or more is emitted as overlapping
/// character bigrams. Terms of one character or less are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
	let normalized = text.nfkc().collect::<String>().to_lowercase();
	let mut tokens = Vec::new();
	let mut run = Vec::new();

	for segment in normalized.split_word_bounds() {
		if segment.chars().all(is_cjk) {
			run.extend(segment.chars());

			continue;
		}

		flush_cjk_run(&mut run, &mut tokens);

		if segment.chars().any(char::is_alphanumeric) {
			tokens.push(segment.to_string());
		}
	}

	flush_cjk_run(&mut run, &mut tokens);

	tokens.retain(|token| token.chars().count() > 1);

	tokens
}

fn is_cjk(ch: char) -> bool {
	matches!(ch.script(), Script::Han | Script::Hiragana | Script::Katakana | Script::Hangul)
}

fn flush_cjk_run(run: &mut Vec<char>, tokens: &mut Vec<String>) {
	tokens.extend(run.windows(2).map(|pair| pair.iter().collect::<String>()));
	run.clear();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cjk_runs_become_bigrams() {
		assert_eq!(tokenize("变压器温度"), vec!["变压", "压器", "器温", "温度"]);
	}

	#[test]
	fn mixed_text_keeps_words_and_numbers() {
		assert_eq!(tokenize("Oil 温度 85C, ok"), vec!["oil", "温度", "85c", "ok"]);
	}

	#[test]
	fn single_characters_and_punctuation_are_dropped() {
		assert_eq!(tokenize("电，a b。"), Vec::<String>::new());
	}

	#[test]
	fn full_width_forms_are_normalized() {
		assert_eq!(tokenize("ＧＩＳ　１１０ｋＶ"), vec!["gis", "110kv"]);
	}
}
