//! StopWordExtractor - デフォルトのキーワード抽出
//!
//! Splits on anything that is not alphanumeric, lowercases, drops stop words
//! and tokens shorter than two characters.

use std::collections::BTreeSet;

use crate::ports::KeywordExtractor;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "for", "from", "has",
    "have", "in", "into", "is", "it", "its", "of", "on", "or", "so", "that", "the", "then",
    "there", "this", "to", "was", "we", "were", "will", "with", "should", "would", "could",
    "our", "my", "your", "all", "any", "some", "not", "no", "up", "out", "via", "using", "use",
];

#[derive(Debug, Clone, Default)]
pub struct StopWordExtractor {
    extra_stop_words: Vec<String>,
}

impl StopWordExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_stop_words
            .extend(words.into_iter().map(|w| w.into().to_lowercase()));
        self
    }

    fn is_stop_word(&self, token: &str) -> bool {
        STOP_WORDS.contains(&token) || self.extra_stop_words.iter().any(|w| w == token)
    }
}

impl KeywordExtractor for StopWordExtractor {
    fn extract(&self, text: &str) -> BTreeSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= 2 && !self.is_stop_word(t))
            .map(str::to_string)
            .collect()
    }
}
