//! Monetary amounts (FCFA)
//!
//! Numbers are read with their multiplier (`k`, `million`, `balles`) and
//! classified as marked (after "for", "price", "pour", ... or followed by a
//! currency) or bare. Marked candidates win over bare ones; inside a group the
//! largest value wins. Picking the largest number is an approximation: it
//! fails on utterances such as "2 payments of 300000 for 150000 each".

use once_cell::sync::Lazy;
use regex::Regex;

use super::measures::{HEAD_NOUNS, MASS_UNITS};

/// Smallest value accepted as an amount
pub const MIN_AMOUNT: f64 = 100.0;

/// Number with optional thousands grouping, decimals and multiplier
static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(\d{1,3}(?:[ ,.]\d{3})+\b|\d+(?:[.,]\d+)?)(?:\s*(k|millions?|balles?|mille|thousand)\b)?",
    )
    .unwrap()
});

/// Marker right before a number
static MARKER_BEFORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:for|at|amount(?:\s+of)?|price(?:\s+of)?|cost(?:\s+of)?|total(?:\s+of)?|pour|montant(?:\s+de)?|prix(?:\s+de)?|paid|paye|spent|depense)\s*:?\s*$",
    )
    .unwrap()
});

/// Currency right after a number
static CURRENCY_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:fcfa|cfa|francs?|f|xof)\b").unwrap());

/// Unit or head noun right after a number
static NOT_AN_AMOUNT_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*(?:(?:{}|{}|bags?|sacs?|doses?|days?|jours?)\b|%)",
        MASS_UNITS, HEAD_NOUNS
    ))
    .unwrap()
});

/// One number seen in the text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountCandidate {
    pub value: f64,
    pub marked: bool,
}

/// Parse `800 000`, `1,500,000`, `2.5` or `45,5`
fn parse_number(raw: &str) -> Option<f64> {
    let grouped = raw
        .split([' ', ',', '.'])
        .skip(1)
        .all(|part| part.len() == 3)
        && raw.contains([' ', ',', '.'])
        && raw.len() > 4;

    if grouped {
        raw.chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .ok()
    } else {
        raw.replace(',', ".").parse().ok()
    }
}

fn multiplier(word: Option<&str>) -> f64 {
    match word {
        Some("k") | Some("mille") | Some("thousand") | Some("balle") | Some("balles") => 1_000.0,
        Some("million") | Some("millions") => 1_000_000.0,
        _ => 1.0,
    }
}

/// Every amount candidate, with dates already blanked out
pub fn amount_candidates(blanked: &str) -> Vec<AmountCandidate> {
    let mut candidates = Vec::new();

    for caps in NUMBER_PATTERN.captures_iter(blanked) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let Some(raw) = caps.get(1) else { continue };
        let Some(number) = parse_number(raw.as_str()) else {
            continue;
        };

        let multiplier_word = caps.get(2).map(|m| m.as_str());
        let value = number * multiplier(multiplier_word);

        let after = &blanked[whole.end..];
        if multiplier_word.is_none() && NOT_AN_AMOUNT_AFTER.is_match(after) {
            continue;
        }

        let before = &blanked[..whole.start];
        let marked = MARKER_BEFORE.is_match(before) || CURRENCY_AFTER.is_match(after);

        candidates.push(AmountCandidate { value, marked });
    }

    candidates
}

/// Choose the amount, ignoring values equal to a co-extracted weight or head
/// count
pub fn select_amount(candidates: &[AmountCandidate], exclude: &[f64]) -> Option<f64> {
    let eligible = candidates.iter().filter(|c| {
        c.value >= MIN_AMOUNT && !exclude.iter().any(|x| (c.value - x).abs() < f64::EPSILON)
    });

    let (marked, bare): (Vec<&AmountCandidate>, Vec<&AmountCandidate>) =
        eligible.partition(|c| c.marked);

    let pick = |group: Vec<&AmountCandidate>| {
        group
            .into_iter()
            .map(|c| c.value)
            .fold(None, |best: Option<f64>, v| Some(best.map_or(v, |b| b.max(v))))
    };

    pick(marked).or_else(|| pick(bare))
}
