//! KeywordExtractor port - テキストからキーワードを抽出
//!
//! The learner uses extracted keywords for similarity search and for deciding
//! which cached insights a new outcome invalidates. Several extractors can be
//! configured; their outputs are merged.

use std::collections::BTreeSet;

pub trait KeywordExtractor: Send + Sync {
    /// Lowercase keywords found in `text`.
    fn extract(&self, text: &str) -> BTreeSet<String>;
}
