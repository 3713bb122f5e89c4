//! Text normalization
//!
//! `normalize` is a pure function: lowercase, fold diacritics, strip
//! punctuation, rewrite dialect expressions and fixed misspellings, then
//! tokenize and expand keywords to their synonym-group concept ids.
//!
//! ```
//! use farmhand_text_processing::normalize;
//!
//! let normalized = normalize("J'ai vendu 5 cochons à Jean");
//! assert!(normalized.enriched.contains("sell"));
//! assert!(normalized.enriched.contains("pig"));
//! ```

pub mod vocabulary;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use vocabulary::{
    DIALECT_EXPRESSIONS, DIALECT_INDEX, SPELLING_INDEX, STOP_WORDS, SYNONYM_GROUPS, SYNONYM_INDEX,
};

/// Synonyms added per matched group
const SYNONYMS_PER_GROUP: usize = 3;

/// Upper bound on substitution rounds
const MAX_REWRITE_ROUNDS: usize = 8;

/// Single alternation over every dialect expression, longest first
static DIALECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let mut keys: Vec<&str> = DIALECT_EXPRESSIONS.iter().map(|(k, _)| *k).collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let alternation = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})\b", alternation)).unwrap()
});

/// Result of normalizing one utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedText {
    /// Rewritten text, single-spaced
    pub text: String,
    /// All tokens of `text`
    pub tokens: Vec<String>,
    /// Tokens that are not stop-words
    pub keywords: Vec<String>,
    /// Keywords plus concept ids and leading synonyms
    pub enriched: BTreeSet<String>,
}

impl NormalizedText {
    pub fn contains(&self, keyword: &str) -> bool {
        self.enriched.contains(keyword)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Lowercase and strip diacritics, keeping punctuation.
///
/// Extractors work on this form so that numbers like `800 000` and codes
/// like `p-12` keep their separators.
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().nfd() {
        match c {
            'œ' => out.push_str("oe"),
            'æ' => out.push_str("ae"),
            '’' | '‘' => out.push('\''),
            c if is_combining_mark(c) => {}
            c => out.push(c),
        }
    }
    out
}

/// Normalize an utterance
pub fn normalize(text: &str) -> NormalizedText {
    let folded = fold(text);
    let cleaned: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut current = join_words(&cleaned);
    for _ in 0..MAX_REWRITE_ROUNDS {
        let next = correct_spelling(&rewrite_dialect(&current));
        if next == current {
            break;
        }
        current = next;
    }

    let tokens: Vec<String> = current.unicode_words().map(str::to_string).collect();
    let keywords: Vec<String> = tokens
        .iter()
        .filter(|t| !STOP_WORDS.contains(t.as_str()))
        .filter(|t| t.chars().count() >= 2 || t.chars().all(|c| c.is_ascii_digit()))
        .cloned()
        .collect();

    let mut enriched: BTreeSet<String> = keywords.iter().cloned().collect();
    for keyword in &keywords {
        if let Some(&group) = SYNONYM_INDEX.get(keyword.as_str()) {
            let (canonical, members) = SYNONYM_GROUPS[group];
            enriched.insert(canonical.to_string());
            for synonym in members.iter().take(SYNONYMS_PER_GROUP) {
                enriched.insert((*synonym).to_string());
            }
        }
    }

    NormalizedText {
        text: current,
        tokens,
        keywords,
        enriched,
    }
}

fn join_words(text: &str) -> String {
    text.unicode_words().collect::<Vec<_>>().join(" ")
}

fn rewrite_dialect(text: &str) -> String {
    let rewritten = DIALECT_PATTERN.replace_all(text, |caps: &regex::Captures| {
        DIALECT_INDEX.get(&caps[0]).copied().unwrap_or_default().to_string()
    });
    join_words(&rewritten)
}

fn correct_spelling(text: &str) -> String {
    text.unicode_words()
        .map(|word| SPELLING_INDEX.get(word).copied().unwrap_or(word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents_keeps_punctuation() {
        assert_eq!(fold("Vendu à Jérôme, 800 000 FCFA"), "vendu a jerome, 800 000 fcfa");
        assert_eq!(fold("Œuf"), "oeuf");
    }

    #[test]
    fn test_normalize_basic_sale() {
        let n = normalize("I sold 5 pigs to Jean for 800000 yesterday");

        assert_eq!(n.text, "i sold 5 pigs to jean for 800000 yesterday");
        // Stop-words are not keywords, numbers are
        assert!(!n.keywords.contains(&"to".to_string()));
        assert!(n.keywords.contains(&"5".to_string()));
        // Concept ids and leading synonyms are added
        assert!(n.contains("sell"));
        assert!(n.contains("pig"));
        assert!(n.contains("selling"));
    }

    #[test]
    fn test_spelling_and_dialect() {
        let n = normalize("j'ai vandu les cochons la, wari est là");
        assert_eq!(n.text, "j ai vendu les cochons argent est la");

        let n = normalize("wari");
        assert_eq!(n.text, "argent");
        assert!(n.contains("money"));
    }

    #[test]
    fn test_how_many_becomes_count() {
        let n = normalize("How many pigs do I have?");
        assert!(n.contains("count"));
        assert!(n.contains("pig"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "J'ai vendu 5 cochons à Jean pour 800 000 FCFA hier",
            "les porcs la la deh, combient de porce?",
            "How many pigs do I have left??",
            "Vaccinated P-001 against Erysipelas",
            "ya foro wari hein",
            "",
        ];
        for sample in samples {
            let once = normalize(sample);
            let twice = normalize(&once.text);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_empty_input() {
        let n = normalize("  ?! ");
        assert!(n.is_empty());
        assert!(n.enriched.is_empty());
    }
}
