
// imports
use crate::error::{EmbeddingError, Result};

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const PAD_TOKEN: &str = "[PAD]";

/// Bijective word <-> index mapping. Index 0 is always `PAD_TOKEN`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vocab {
    t2i: HashMap<String, usize>,
    i2t: Vec<String>,
}

impl Vocab {

    /// Builds the vocabulary from tokenized text, keeping the `max_words - 1` most frequent
    /// words after the sentinel. `None` keeps every word.
    pub fn build(token_list: &[Vec<String>], max_words: Option<usize>) -> Vocab {
        let counts = build_word_counts(token_list);
        Vocab::from_counts(&counts, max_words)
    }

    pub fn from_counts(word_counts: &[(String, usize)], max_words: Option<usize>) -> Vocab {

        // sort by frequency, ties keep the order in which words were first seen
        let mut sorted_counts: Vec<&(String, usize)> = word_counts
            .iter()
            .filter(|(word, _)| word != PAD_TOKEN)
            .collect();
        sorted_counts.sort_by(|a, b| b.1.cmp(&a.1));
        if let Some(max_words) = max_words.filter(|m| *m > 0) {
            sorted_counts.truncate(max_words - 1);
        }

        let mut i2t: Vec<String> = Vec::with_capacity(sorted_counts.len() + 1);
        i2t.push(PAD_TOKEN.to_string());
        i2t.extend(sorted_counts.iter().map(|(word, _)| word.to_owned()));

        let t2i = i2t.iter().enumerate().map(|(i, t)| (t.to_owned(), i)).collect();

        info!("using {} most common tokens out of {}", i2t.len() - 1, word_counts.len());
        Self { t2i, i2t }
    }

    pub fn len(&self) -> usize {
        self.i2t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.i2t.is_empty()
    }

    pub fn index_of(&self, word: &str) -> Result<usize> {
        self.t2i.get(word).copied().ok_or_else(|| EmbeddingError::unknown_word(word))
    }

    pub fn word_of(&self, index: usize) -> Result<&str> {
        self.i2t
            .get(index)
            .map(String::as_str)
            .ok_or(EmbeddingError::IndexOutOfRange { index, vocab_size: self.i2t.len() })
    }

    pub fn t2i(&self) -> &HashMap<String, usize> {
        &self.t2i
    }

    /// Converts tokens to indices. Words that have not been seen are dropped, not reported.
    pub fn tokens_to_ix(&self, tokens: &[Vec<String>]) -> Vec<Vec<usize>> {
        tokens
            .iter()
            .map(|words| words.iter().filter_map(|w| self.t2i.get(w).copied()).collect())
            .collect()
    }
}

/// Lower-cases, strips everything but ascii letters and spaces, splits on whitespace and
/// truncates each example to `max_length` tokens.
pub fn tokenize_w2v(text: &[String], max_length: Option<usize>, normalize: bool) -> Vec<Vec<String>> {
    text.iter()
        .map(|t| {
            let line = if normalize {
                t.to_lowercase()
                    .chars()
                    .filter(|c| c.is_ascii_alphabetic() || *c == ' ')
                    .collect::<String>()
            } else {
                t.to_owned()
            };
            let mut tokens: Vec<String> = line.split_whitespace().map(|x| x.to_string()).collect();
            if let Some(max_length) = max_length {
                tokens.truncate(max_length);
            }
            tokens
        })
        .collect()
}

pub fn build_word_counts(token_list: &[Vec<String>]) -> Vec<(String, usize)> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for words in token_list {
        for word in words {
            let pos = *positions.entry(word.as_str()).or_insert_with(|| {
                counts.push((word.to_owned(), 0));
                counts.len() - 1
            });
            counts[pos].1 += 1;
        }
    }
    counts
}


#[cfg(test)]
mod tests {

    use super::*;

    fn to_strings(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn tokenize_normalizes_text() {
        let text = to_strings(&["Hello, world!", "This is a test."]);
        let tokens = tokenize_w2v(&text, None, true);
        assert_eq!(tokens, vec![vec!["hello", "world"], vec!["this", "is", "a", "test"]]);

        let tokens = tokenize_w2v(&text, Some(2), true);
        assert_eq!(tokens[1], vec!["this", "is"]);

        let tokens = tokenize_w2v(&text, None, false);
        assert_eq!(tokens[0], vec!["Hello,", "world!"]);
    }

    #[test]
    fn vocab_puts_pad_first_and_sorts_by_count() {
        let tokens = tokenize_w2v(&to_strings(&["b a b c", "c b"]), None, true);
        let counts = build_word_counts(&tokens);
        assert_eq!(counts, vec![("b".to_string(), 3), ("a".to_string(), 1), ("c".to_string(), 2)]);

        let vocab = Vocab::from_counts(&counts, None);
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.index_of(PAD_TOKEN).unwrap(), 0);
        assert_eq!(vocab.index_of("b").unwrap(), 1);
        assert_eq!(vocab.index_of("c").unwrap(), 2);
        assert_eq!(vocab.index_of("a").unwrap(), 3);
        assert_eq!(vocab.word_of(2).unwrap(), "c");
        assert!(vocab.word_of(4).is_err());

        // max_words counts the sentinel
        let vocab = Vocab::from_counts(&counts, Some(2));
        assert_eq!(vocab.len(), 2);
        assert!(matches!(vocab.index_of("c"), Err(EmbeddingError::UnknownWord(_))));
    }

    #[test]
    fn unseen_tokens_are_dropped() {
        let tokens = tokenize_w2v(&to_strings(&["dogs and cats", "dogs chase birds"]), None, true);
        let vocab = Vocab::build(&tokens, Some(3));
        let ix = vocab.tokens_to_ix(&tokens);
        // "dogs" is the most frequent word, "and" the first word seen once
        assert_eq!(ix, vec![vec![1, 2], vec![1]]);
    }
}
