//! Codes, names and closed-vocabulary slots

use farmhand_core::Category;
use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// CODES
// =============================================================================

static ANIMAL_CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([a-z]{1,4})-?(\d{1,5})\b").unwrap());

static BATCH_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:batch|lot|pen|loge|bande)\s*(?:no\.?|number|n°|#)?\s*([a-z]{0,4}-?\d{1,5})\b")
        .unwrap()
});

static RECORD_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:record|entry|id|entree|enregistrement)\s*(?:no\.?|number|n°|#|:)?\s*([a-z0-9][a-z0-9_-]{0,63})")
        .unwrap()
});

/// Letter prefixes that are units, not animal codes
const NON_CODE_PREFIXES: &[&str] = &[
    "k", "kg", "kgs", "g", "f", "cfa", "fcfa", "xof", "h", "j", "n", "no", "x", "id",
];

fn canonical_code(raw: &str) -> String {
    raw.replace('-', "").to_uppercase()
}

/// Animal code such as `P001` or `p-12` (-> `P12`)
pub fn extract_animal_code(folded: &str) -> Option<String> {
    let reserved: Vec<std::ops::Range<usize>> = BATCH_CODE_PATTERN
        .find_iter(folded)
        .chain(RECORD_ID_PATTERN.find_iter(folded))
        .map(|m| m.range())
        .collect();

    ANIMAL_CODE_PATTERN.captures_iter(folded).find_map(|caps| {
        let whole = caps.get(0)?;
        if reserved.iter().any(|r| r.contains(&whole.start())) {
            return None;
        }
        if NON_CODE_PREFIXES.contains(&&caps[1]) {
            return None;
        }
        Some(format!("{}{}", caps[1].to_uppercase(), &caps[2]))
    })
}

/// Batch code after batch/lot/pen
pub fn extract_batch_code(folded: &str) -> Option<String> {
    BATCH_CODE_PATTERN
        .captures(folded)
        .map(|caps| canonical_code(&caps[1]))
}

/// Record id after record/entry/id; must contain a digit
pub fn extract_record_id(folded: &str) -> Option<String> {
    RECORD_ID_PATTERN
        .captures_iter(folded)
        .map(|caps| caps[1].trim_end_matches(['-', '_']).to_string())
        .find(|id| id.chars().any(|c| c.is_ascii_digit()))
        .map(|id| id.to_uppercase())
}

// =============================================================================
// NAMES
// =============================================================================

/// Capitalised name of one or two words
const NAME: &str = r"(\p{Lu}[\p{L}'-]+(?:\s+\p{Lu}[\p{L}'-]+)?)";

static BUYER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?i:sold\s+to|to|chez|buyer|client|acheteur|acheteuse|à)\s*:?\s+{}",
        NAME
    ))
    .unwrap()
});

/// Unaccented French `a`; in English text this is the article
static FRENCH_A_BUYER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i:a)\s+{}", NAME)).unwrap());

static ENGLISH_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:sold|sell|sells|selling|sale|to|for|the|bought|gave|pigs?|piglets?)")
        .unwrap()
});

static VET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?i:dr\.?|doctor|docteur|vet|veterinarian|veterinaire|vétérinaire|véto|veto)\s*:?\s+{}",
        NAME
    ))
    .unwrap()
});

/// Capitalised words that are never names
const NOT_NAMES: &[&str] = &[
    "The", "A", "An", "My", "Our", "His", "Her", "Their", "Him", "Them", "It", "This", "That",
    "Le", "La", "Les", "Un", "Une", "Mon", "Ma", "Mes", "Son", "Sa", "Ses", "Lui", "Eux",
    "For", "Pour", "Yesterday", "Today", "Tomorrow", "Hier", "Demain", "I", "Je",
];

fn clean_name(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .split_whitespace()
        .take_while(|w| !NOT_NAMES.contains(w))
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Buyer name, read from the original (case-preserving) text
pub fn extract_buyer(text: &str) -> Option<String> {
    BUYER_PATTERN
        .captures_iter(text)
        .find_map(|caps| clean_name(&caps[1]))
        .or_else(|| {
            if ENGLISH_HINT.is_match(text) {
                return None;
            }
            FRENCH_A_BUYER_PATTERN
                .captures_iter(text)
                .find_map(|caps| clean_name(&caps[1]))
        })
}

/// Veterinarian name, read from the original (case-preserving) text
pub fn extract_veterinarian(text: &str) -> Option<String> {
    VET_PATTERN
        .captures_iter(text)
        .find_map(|caps| clean_name(&caps[1]))
}

// =============================================================================
// CLOSED VOCABULARIES
// =============================================================================

/// Surface term -> category, matched longest term first
const CATEGORY_TERMS: &[(&str, Category)] = &[
    ("vente de porcs", Category::PigSale),
    ("vente porc", Category::PigSale),
    ("pig sale", Category::PigSale),
    ("feeder", Category::Equipment),
    ("mangeoire", Category::Equipment),
    ("abreuvoir", Category::Equipment),
    ("equipment", Category::Equipment),
    ("equipement", Category::Equipment),
    ("materiel", Category::Equipment),
    ("feed", Category::Feed),
    ("provende", Category::Feed),
    ("aliment", Category::Feed),
    ("nourriture", Category::Feed),
    ("soja", Category::Feed),
    ("son de ble", Category::Feed),
    ("vaccine", Category::Vaccines),
    ("vaccin", Category::Vaccines),
    ("medicine", Category::Medication),
    ("medication", Category::Medication),
    ("medicament", Category::Medication),
    ("antibiotic", Category::Medication),
    ("vermifuge", Category::Medication),
    ("dewormer", Category::Medication),
    ("veterinary", Category::Veterinary),
    ("veterinaire", Category::Veterinary),
    ("vet", Category::Veterinary),
    ("veto", Category::Veterinary),
    ("maintenance", Category::Maintenance),
    ("entretien", Category::Maintenance),
    ("repair", Category::Maintenance),
    ("reparation", Category::Maintenance),
    ("cleaning", Category::Maintenance),
    ("nettoyage", Category::Maintenance),
    ("salary", Category::Salaries),
    ("salaries", Category::Salaries),
    ("salaire", Category::Salaries),
    ("wages", Category::Salaries),
    ("worker", Category::Salaries),
    ("ouvrier", Category::Salaries),
];

static CATEGORY_TERMS_BY_LENGTH: Lazy<Vec<(&'static str, Category)>> = Lazy::new(|| {
    let mut terms = CATEGORY_TERMS.to_vec();
    terms.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    terms
});

/// Category by longest-term-first substring match
pub fn extract_category(folded: &str) -> Option<Category> {
    CATEGORY_TERMS_BY_LENGTH
        .iter()
        .find(|(term, _)| folded.contains(term))
        .map(|(_, category)| *category)
}

/// Folded term -> canonical vaccine name
const VACCINES: &[(&str, &str)] = &[
    ("foot-and-mouth", "Foot-and-mouth"),
    ("foot and mouth", "Foot-and-mouth"),
    ("fievre aphteuse", "Foot-and-mouth"),
    ("aphteuse", "Foot-and-mouth"),
    ("peste porcine", "Swine fever"),
    ("swine fever", "Swine fever"),
    ("mycoplasma", "Mycoplasma"),
    ("mycoplasme", "Mycoplasma"),
    ("erysipelas", "Erysipelas"),
    ("rouget", "Erysipelas"),
    ("parvovirus", "Parvovirus"),
    ("parvo", "Parvovirus"),
    ("circovirus", "Circovirus"),
    ("circo", "Circovirus"),
];

/// Vaccine from the closed vocabulary
pub fn extract_vaccine(folded: &str) -> Option<String> {
    VACCINES
        .iter()
        .find(|(term, _)| folded.contains(term))
        .map(|(_, name)| (*name).to_string())
}

static FREQUENCY_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| vec![
    (Regex::new(r"\b(?:daily|every\s+day|per\s+day|par\s+jour|chaque\s+jour|quotidien(?:ne)?)\b").unwrap(), "daily"),
    (Regex::new(r"\b(?:weekly|every\s+week|per\s+week|par\s+semaine|chaque\s+semaine|hebdomadaire)\b").unwrap(), "weekly"),
    (Regex::new(r"\b(?:monthly|every\s+month|per\s+month|a\s+month|par\s+mois|chaque\s+mois|mensuel(?:le)?)\b").unwrap(), "monthly"),
    (Regex::new(r"\b(?:yearly|annual(?:ly)?|every\s+year|per\s+year|par\s+an|chaque\s+annee|annuel(?:le)?)\b").unwrap(), "yearly"),
]);

/// Recurrence of a fixed charge
pub fn extract_frequency(folded: &str) -> Option<&'static str> {
    FREQUENCY_PATTERNS
        .iter()
        .find(|(regex, _)| regex.is_match(folded))
        .map(|(_, frequency)| *frequency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animal_codes() {
        assert_eq!(extract_animal_code("weighed p001 at 45 kg"), Some("P001".to_string()));
        assert_eq!(extract_animal_code("truie p-12 malade"), Some("P12".to_string()));
        // Units and bare numbers are not codes
        assert_eq!(extract_animal_code("bought 50 kg for 5000 f"), None);
        // Batch and record codes are not animal codes
        assert_eq!(extract_animal_code("search batch b12"), None);
    }

    #[test]
    fn test_batch_and_record_codes() {
        assert_eq!(extract_batch_code("search batch b-12"), Some("B12".to_string()));
        assert_eq!(extract_batch_code("lot 3"), Some("3".to_string()));
        assert_eq!(extract_record_id("delete record 42"), Some("42".to_string()));
        assert_eq!(extract_record_id("supprimer l'entree #sale-17"), Some("SALE-17".to_string()));
        assert_eq!(extract_record_id("delete the record please"), None);
    }

    #[test]
    fn test_buyer() {
        assert_eq!(
            extract_buyer("I sold 5 pigs to Jean for 800000"),
            Some("Jean".to_string())
        );
        assert_eq!(
            extract_buyer("vendu 3 porcs à Awa Traoré hier"),
            Some("Awa Traoré".to_string())
        );
        assert_eq!(extract_buyer("sold to Marie For 50000"), Some("Marie".to_string()));
        // Lowercase words and articles are not names
        assert_eq!(extract_buyer("sold pigs to the market"), None);
        assert_eq!(extract_buyer("sold to The Market"), None);
    }

    #[test]
    fn test_english_article_is_not_a_buyer_marker() {
        assert_eq!(
            extract_buyer("I sold a Landrace to Jean for 300000"),
            Some("Jean".to_string())
        );
        assert_eq!(extract_buyer("sold a Large White yesterday"), None);
        // Unaccented French `a` still introduces the buyer
        assert_eq!(extract_buyer("vendu 3 porcs a Kouame"), Some("Kouame".to_string()));
    }

    #[test]
    fn test_veterinarian() {
        assert_eq!(extract_veterinarian("Dr Kone visited"), Some("Kone".to_string()));
        assert_eq!(
            extract_veterinarian("le docteur Yao Kouassi est passé"),
            Some("Yao Kouassi".to_string())
        );
        assert_eq!(extract_veterinarian("the vet came"), None);
    }

    #[test]
    fn test_category_longest_first() {
        // "feeder" must win over "feed"
        assert_eq!(extract_category("bought a new feeder"), Some(Category::Equipment));
        assert_eq!(extract_category("sacs de provende"), Some(Category::Feed));
        assert_eq!(extract_category("vaccine for the piglets"), Some(Category::Vaccines));
        assert_eq!(extract_category("worker salary"), Some(Category::Salaries));
        assert_eq!(extract_category("something else"), None);
    }

    #[test]
    fn test_vaccine_and_frequency() {
        assert_eq!(extract_vaccine("vaccinated against erysipelas"), Some("Erysipelas".to_string()));
        assert_eq!(extract_vaccine("vaccin contre la peste porcine"), Some("Swine fever".to_string()));
        assert_eq!(extract_vaccine("vaccinated p001"), None);

        assert_eq!(extract_frequency("rent 50000 every month"), Some("monthly"));
        assert_eq!(extract_frequency("salaire mensuel"), Some("monthly"));
        assert_eq!(extract_frequency("once"), None);
    }
}
