//! N-gram tokenizer - splits text into alphanumeric runs and emits their n-grams.

use rangedb_common::{Result, error::Error};
use rangedb_format::FieldType;

use super::Token;

/// Default smallest gram size of a search.
pub const DEFAULT_MIN_GRAM: usize = 1;

/// Default largest gram size of a search.
pub const DEFAULT_MAX_GRAM: usize = 2;

/// Largest gram size an index can hold (trigrams).
pub const MAX_GRAM: usize = 3;

/// N-gram tokenizer.
///
/// The input is split into maximal runs of ASCII alphanumeric characters. Runs shorter
/// than `min_gram` are dropped. For every size `n` in `min_gram..=max_gram`, in that
/// order, every run contributes each of its contiguous `n`-character substrings,
/// lower-cased, left to right. Each token is tagged with the n-gram field type of its
/// size, which names the tree it is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgramTokenizer {
    min_gram: usize,
    max_gram: usize,
}

impl NgramTokenizer {
    /// Creates a tokenizer for gram sizes `min_gram..=max_gram`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::invalid_arg`] if a size is outside `1..=3` or `min_gram > max_gram`.
    pub fn new(min_gram: usize, max_gram: usize) -> Result<NgramTokenizer> {
        if min_gram == 0 || max_gram > MAX_GRAM {
            return Err(Error::invalid_arg(
                "gram",
                format!("gram sizes must be within 1..={MAX_GRAM}, got {min_gram}..={max_gram}"),
            ));
        }
        if min_gram > max_gram {
            return Err(Error::invalid_arg(
                "gram",
                format!("min gram {min_gram} exceeds max gram {max_gram}"),
            ));
        }
        Ok(NgramTokenizer { min_gram, max_gram })
    }

    pub fn min_gram(&self) -> usize {
        self.min_gram
    }

    pub fn max_gram(&self) -> usize {
        self.max_gram
    }

    /// Field types of the trees a search with this tokenizer reads.
    pub fn field_types(&self) -> impl Iterator<Item = FieldType> {
        (self.min_gram..=self.max_gram).filter_map(FieldType::ngram)
    }

    pub fn tokenize(&self, input: &str) -> Vec<Token> {
        let runs: Vec<String> = AlphanumericRuns::new(input)
            .filter(|run| run.len() >= self.min_gram)
            .map(|run| run.to_ascii_lowercase())
            .collect();
        let mut tokens = Vec::new();
        for n in self.min_gram..=self.max_gram {
            let Some(field_type) = FieldType::ngram(n) else {
                continue;
            };
            for run in &runs {
                if run.len() < n {
                    continue;
                }
                tokens.extend((0..=run.len() - n).map(|i| Token {
                    value: run[i..i + n].to_string(),
                    field_type,
                }));
            }
        }
        tokens
    }
}

impl Default for NgramTokenizer {
    fn default() -> Self {
        NgramTokenizer {
            min_gram: DEFAULT_MIN_GRAM,
            max_gram: DEFAULT_MAX_GRAM,
        }
    }
}

/// Iterator over the maximal runs of ASCII alphanumeric characters of a string.
pub struct AlphanumericRuns<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> AlphanumericRuns<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }
}

impl<'a> Iterator for AlphanumericRuns<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.input.as_bytes();
        let start = self.pos + bytes[self.pos..].iter().position(u8::is_ascii_alphanumeric)?;
        let end = bytes[start..]
            .iter()
            .position(|b| !b.is_ascii_alphanumeric())
            .map_or(bytes.len(), |len| start + len);
        self.pos = end;
        // Runs are ASCII, so the boundaries are char boundaries.
        Some(&self.input[start..end])
    }
}

#[cfg(test)]
mod tests {
    use rangedb_format::FieldType;

    use super::{AlphanumericRuns, NgramTokenizer};

    fn values(tokenizer: &NgramTokenizer, input: &str) -> Vec<String> {
        tokenizer
            .tokenize(input)
            .into_iter()
            .map(|t| t.value)
            .collect()
    }

    #[test]
    fn test_trigrams() {
        let tokenizer = NgramTokenizer::new(3, 3).unwrap();
        assert_eq!(
            values(&tokenizer, "wakemeup"),
            vec!["wak", "ake", "kem", "eme", "meu", "eup"]
        );
    }

    #[test]
    fn test_unigrams_then_bigrams() {
        let tokenizer = NgramTokenizer::new(1, 2).unwrap();
        let tokens = tokenizer.tokenize("Hey Yo");
        let values: Vec<&str> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(
            values,
            vec!["h", "e", "y", "y", "o", "he", "ey", "yo"]
        );
        assert!(tokens[..5].iter().all(|t| t.field_type == FieldType::Unigram));
        assert!(tokens[5..].iter().all(|t| t.field_type == FieldType::Bigram));
    }

    #[test]
    fn test_short_runs_dropped() {
        let tokenizer = NgramTokenizer::new(2, 3).unwrap();
        assert_eq!(values(&tokenizer, "a to, b"), vec!["to"]);
        assert!(values(&tokenizer, "é ü !").is_empty());
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(NgramTokenizer::new(0, 2).is_err());
        assert!(NgramTokenizer::new(1, 4).is_err());
        assert!(NgramTokenizer::new(3, 2).is_err());
        assert_eq!(NgramTokenizer::default().min_gram(), 1);
        assert_eq!(NgramTokenizer::default().max_gram(), 2);
    }

    #[test]
    fn test_runs() {
        let runs: Vec<&str> = AlphanumericRuns::new("--ab1 c_d--").collect();
        assert_eq!(runs, vec!["ab1", "c", "d"]);
        assert_eq!(AlphanumericRuns::new("").count(), 0);
    }
}
