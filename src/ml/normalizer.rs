use crate::error::{AppError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\p{L}\p{N}\s]+").unwrap();
    static ref ENGLISH_STOP_WORDS: HashSet<&'static str> = [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into",
        "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor",
        "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
        "ourselves", "out", "over", "own", "same", "she", "should", "so", "some", "such",
        "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
        "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
        "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
        "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
        "also", "feel", "feeling", "got", "getting", "im", "ive", "lot", "really",
    ]
    .into_iter()
    .collect();
}

/// Canonical token stream produced by [`TextNormalizer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedText {
    tokens: Vec<String>,
}

impl NormalizedText {
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Space-joined canonical form
    pub fn as_text(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Lower-cases, strips punctuation, collapses whitespace and drops stop-words.
///
/// Tokens shorter than two characters are dropped as well, so single letters
/// and stray digits never reach the vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Token stream for `text`; may be empty
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let cleaned = NON_WORD.replace_all(&lowered, " ");

        cleaned
            .split_whitespace()
            .filter(|w| w.chars().count() > 1)
            .filter(|w| !ENGLISH_STOP_WORDS.contains(*w))
            .map(|w| w.to_string())
            .collect()
    }

    /// Normalize caller text, failing when nothing meaningful remains
    pub fn normalize(&self, text: &str) -> Result<NormalizedText> {
        let tokens = self.tokens(text);
        if tokens.is_empty() {
            return Err(AppError::InvalidInput(
                "No recognizable symptoms found. Please describe your symptoms in more detail."
                    .to_string(),
            ));
        }
        Ok(NormalizedText { tokens })
    }

    pub fn is_stop_word(word: &str) -> bool {
        ENGLISH_STOP_WORDS.contains(word)
    }
}
