//! Static vocabulary tables used by the normalizer
//!
//! All entries are already folded (lowercase, no diacritics, no punctuation).
//! No replacement produced by a table is itself a key of that table, so
//! substitution converges.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Synonym groups keyed by a language-neutral concept id.
///
/// Declaration order matters: a word listed in two groups belongs to the
/// first one.
pub const SYNONYM_GROUPS: &[(&str, &[&str])] = &[
    // Actions
    ("sell", &["sell", "sold", "selling", "sale", "sales", "vendu", "vendus", "vente", "vendre", "cede", "ecoule"]),
    ("buy", &["buy", "bought", "purchase", "purchased", "achete", "acheter", "achat", "acquis", "procure"]),
    ("spend", &["spend", "spent", "paid", "pay", "expense", "expenses", "depense", "depenses", "depenser", "paye", "payer", "debourse"]),
    ("weigh", &["weigh", "weighed", "weighs", "weighing", "weight", "pese", "peser", "pesee", "poids"]),
    ("vaccinate", &["vaccinate", "vaccinated", "vaccination", "vaccine", "vaccines", "vaccin", "vaccins", "vacciner", "injection"]),
    ("treat", &["treat", "treated", "treatment", "treating", "traitement", "traite", "traiter", "soigne", "soigner"]),
    ("delete", &["delete", "deleted", "remove", "erase", "supprimer", "supprime", "effacer", "efface", "retirer"]),
    ("search", &["search", "find", "look", "lookup", "chercher", "cherche", "recherche", "rechercher", "trouver"]),
    ("calculate", &["calculate", "compute", "calcul", "calculer", "calcule"]),
    ("analyze", &["analyze", "analyse", "analysis", "analyser", "trend", "trends", "performance", "profitability", "rentabilite"]),
    // Animals
    ("pig", &["pig", "pigs", "hog", "hogs", "swine", "porc", "porcs", "cochon", "cochons", "goret", "gorets"]),
    ("piglet", &["piglet", "piglets", "porcelet", "porcelets"]),
    ("sow", &["sow", "sows", "truie", "truies", "verrat", "verrats", "boar", "boars"]),
    ("animal", &["animal", "animals", "animaux", "bete", "betes", "head"]),
    ("batch", &["batch", "batches", "lot", "lots", "bande", "bandes", "pen", "loge"]),
    // Feed and health
    ("feed", &["feed", "food", "aliment", "aliments", "provende", "nourriture", "granule", "farine", "ration"]),
    ("medicine", &["medicine", "medicines", "medication", "drug", "drugs", "medicament", "medicaments", "medoc", "antibiotic"]),
    ("vet", &["vet", "vets", "veterinarian", "veterinary", "veterinaire", "veto", "doctor", "docteur", "dr"]),
    ("visit", &["visit", "visited", "visite", "passage", "consultation"]),
    ("disease", &["disease", "diseases", "sick", "ill", "illness", "maladie", "maladies", "malade", "malades", "diarrhea", "diarrhee", "cough", "toux"]),
    // Finance
    ("money", &["money", "cash", "fcfa", "cfa", "francs", "franc", "argent", "sous", "fric"]),
    ("cost", &["cost", "costs", "price", "prices", "prix", "cout", "couts", "tarif"]),
    ("total", &["total", "totals", "overall", "sum", "somme"]),
    ("charge", &["charge", "charges", "rent", "loyer", "salary", "salaries", "salaire", "salaires", "subscription", "abonnement"]),
    // Reporting
    ("statistics", &["statistics", "stats", "stat", "statistique", "statistiques", "summary", "bilan", "overview"]),
    ("count", &["count", "number", "combien", "nombre"]),
    ("stock", &["stock", "stocks", "inventory", "inventaire", "supply", "supplies"]),
    ("left", &["left", "remaining", "remain", "reste", "restant", "restante"]),
    ("reminder", &["reminder", "reminders", "rappel", "rappels", "upcoming", "todo"]),
    // Units
    ("kilogram", &["kilogram", "kilograms", "kg", "kgs", "kilo", "kilos", "kilogramme", "kilogrammes"]),
];

/// Multi-word and regional expressions rewritten before tokenization.
/// Matched on whole words, longest key first.
pub const DIALECT_EXPRESSIONS: &[(&str, &str)] = &[
    ("how many", "count"),
    ("les porcs la", "les porcs"),
    ("les cochons la", "les cochons"),
    ("on dit quoi", "bonjour"),
    ("aller on dit", "au revoir"),
    ("ca va aller", ""),
    ("ya foro", "rien"),
    ("y a pas", "rien"),
    ("wari", "argent"),
    ("gbese", "dette"),
    ("djassa", "probleme"),
    ("yako", "desole"),
    ("akwaba", "bienvenue"),
    ("deh", ""),
    ("hein", ""),
];

/// Fixed misspellings and SMS spellings, corrected per token
pub const SPELLING_CORRECTIONS: &[(&str, &str)] = &[
    // French
    ("depance", "depense"),
    ("depanse", "depense"),
    ("depences", "depenses"),
    ("depanses", "depenses"),
    ("achetter", "acheter"),
    ("vandu", "vendu"),
    ("vandre", "vendre"),
    ("porce", "porc"),
    ("kochon", "cochon"),
    ("cochont", "cochon"),
    ("kokochon", "cochon"),
    ("troie", "truie"),
    ("trui", "truie"),
    ("vacin", "vaccin"),
    ("vaksin", "vaccin"),
    ("vaksine", "vaccine"),
    ("medikaman", "medicament"),
    ("medicamen", "medicament"),
    ("provande", "provende"),
    ("provendes", "provende"),
    ("alimant", "aliment"),
    ("alliment", "aliment"),
    ("statistik", "statistique"),
    ("combient", "combien"),
    ("conbien", "combien"),
    ("kombie", "combien"),
    ("mersi", "merci"),
    ("bjr", "bonjour"),
    ("slt", "salut"),
    ("bcp", "beaucoup"),
    ("tjs", "toujours"),
    ("pr", "pour"),
    ("ds", "dans"),
    ("vs", "vous"),
    ("ns", "nous"),
    // English
    ("sould", "sold"),
    ("pigz", "pigs"),
    ("pork", "pig"),
    ("vacinated", "vaccinated"),
    ("vaccinted", "vaccinated"),
    ("expence", "expense"),
    ("expences", "expenses"),
    ("statistcs", "statistics"),
    ("wieght", "weight"),
    ("vetenary", "veterinary"),
];

/// Words ignored when building the keyword set
pub static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English
        "a", "an", "the", "i", "me", "my", "we", "our", "you", "your", "he", "she", "it",
        "they", "them", "to", "of", "in", "on", "at", "for", "and", "or", "is", "are", "was",
        "were", "be", "been", "have", "has", "had", "do", "did", "does", "this", "that",
        "these", "those", "with", "from", "by", "about", "please", "some", "just", "what",
        "how", "much", "which", "can", "could", "would", "want", "let", "s",
        // French
        "le", "la", "les", "un", "une", "des", "du", "de", "au", "aux", "ce", "cette", "ces",
        "mon", "ma", "mes", "ton", "ta", "tes", "son", "sa", "ses", "notre", "nos", "votre",
        "vos", "leur", "leurs", "je", "j", "tu", "il", "elle", "on", "nous", "vous", "ils",
        "elles", "se", "lui", "y", "en", "et", "ou", "mais", "donc", "car", "ni", "que",
        "qui", "quoi", "pour", "par", "sur", "dans", "avec", "sans", "chez", "vers", "est",
        "sont", "ai", "as", "avons", "avez", "ont", "etre", "avoir", "fait", "faire", "fais",
        "peux", "peut", "veux", "veut", "bien", "tres", "plus", "moins", "aussi", "encore",
        "deja", "toujours", "si", "ne", "pas", "l", "d", "c", "qu",
    ]
    .into_iter()
    .collect()
});

/// Word -> index into [`SYNONYM_GROUPS`]; concept ids map to their own group
pub static SYNONYM_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for (group, (canonical, members)) in SYNONYM_GROUPS.iter().enumerate() {
        index.entry(*canonical).or_insert(group);
        for member in members.iter() {
            index.entry(*member).or_insert(group);
        }
    }
    index
});

pub static SPELLING_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| SPELLING_CORRECTIONS.iter().copied().collect());

pub static DIALECT_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| DIALECT_EXPRESSIONS.iter().copied().collect());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacements_are_never_keys() {
        // A replacement that is itself a key would keep rewriting
        for (_, replacement) in SPELLING_CORRECTIONS {
            assert!(!SPELLING_INDEX.contains_key(replacement), "{}", replacement);
        }
        for (_, replacement) in DIALECT_EXPRESSIONS {
            for word in replacement.split_whitespace() {
                assert!(!DIALECT_INDEX.contains_key(word), "{}", word);
                assert!(!SPELLING_INDEX.contains_key(word), "{}", word);
            }
        }
    }

    #[test]
    fn test_tables_are_folded() {
        let all_words = SYNONYM_GROUPS
            .iter()
            .flat_map(|(id, members)| std::iter::once(*id).chain(members.iter().copied()))
            .chain(SPELLING_CORRECTIONS.iter().flat_map(|(k, v)| [*k, *v]))
            .chain(DIALECT_EXPRESSIONS.iter().map(|(k, _)| *k));

        for word in all_words {
            assert!(
                word.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' '),
                "not folded: {:?}",
                word
            );
        }
    }

    #[test]
    fn test_first_group_wins() {
        // "head" only belongs to the animal group
        let group = SYNONYM_INDEX["head"];
        assert_eq!(SYNONYM_GROUPS[group].0, "animal");
        assert_eq!(SYNONYM_GROUPS[SYNONYM_INDEX["vendu"]].0, "sell");
    }
}
