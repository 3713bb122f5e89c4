//! Head counts and weights

use once_cell::sync::Lazy;
use regex::Regex;

/// Nouns that make a preceding integer a head count
pub(crate) const HEAD_NOUNS: &str = r"pigs?|piglets?|sows?|boars?|hogs?|heads?|animals?|porcs?|porcelets?|truies?|verrats?|cochons?|tetes?|betes?|animaux";

/// Mass units
pub(crate) const MASS_UNITS: &str = r"kg|kgs|kilos?|kilogram(?:me)?s?|grams?|grammes?|g|tonnes?|t";

/// Largest plausible head count
const MAX_QUANTITY: u32 = 10_000;

/// Upper bound (exclusive) for a single animal weight in kg
const MAX_WEIGHT_KG: f64 = 1_000.0;

/// Plain or thousands-grouped integer (`1 000`, `1,200`) before a head noun
static QUANTITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,3}}(?:[ ,.]\d{{3}})+|\d{{1,5}})\s*(?:{})\b",
        HEAD_NOUNS
    ))
    .unwrap()
});

static WEIGHT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![
    Regex::new(r"\b(\d+(?:[.,]\d+)?)\s*(?:kg|kgs|kilos?|kilogram(?:me)?s?)\b").unwrap(),
    Regex::new(r"\b(?:weigh(?:s|ed|ing)?|weight|poids|pese|pesee)\s*(?:of|de|is|est|at|a|:)?\s*(\d+(?:[.,]\d+)?)\b").unwrap(),
]);

/// Integer immediately followed by a head noun
pub fn extract_quantity(folded: &str) -> Option<u32> {
    QUANTITY_PATTERN
        .captures_iter(folded)
        .filter_map(|caps| {
            caps[1]
                .chars()
                .filter(char::is_ascii_digit)
                .collect::<String>()
                .parse::<u32>()
                .ok()
        })
        .find(|n| (1..=MAX_QUANTITY).contains(n))
}

/// Weight in kilograms
pub fn extract_weight(folded: &str) -> Option<f64> {
    WEIGHT_PATTERNS.iter().find_map(|regex| {
        regex
            .captures_iter(folded)
            .filter_map(|caps| caps[1].replace(',', ".").parse::<f64>().ok())
            .find(|w| *w > 0.0 && *w < MAX_WEIGHT_KG)
    })
}
