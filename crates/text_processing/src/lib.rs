//! Text processing for the farmhand assistant
//!
//! This crate provides the deterministic, rule-based front of the pipeline:
//! - **Normalization**: diacritic folding, dialect and spelling rewrites,
//!   synonym expansion (English and French, including Ivorian expressions)
//! - **Intent Classification**: tiered keyword rules with bounded confidence
//! - **Slot Extraction**: typed slots (amounts, dates, codes, names, ...)
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use farmhand_core::{Intent, SlotName};
//! use farmhand_text_processing::{normalize, IntentClassifier, SlotExtractor};
//!
//! let text = "I sold 5 pigs to Jean for 800000 yesterday";
//! let detected = IntentClassifier::new().classify(&normalize(text)).unwrap();
//! assert_eq!(detected.intent, Intent::CreateSale);
//!
//! let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
//! let params = SlotExtractor::new().extract(text, detected.intent, today);
//! assert_eq!(params.amount(), Some(800_000.0));
//! assert!(params.contains(SlotName::Buyer));
//! ```

pub mod intent;
pub mod normalization;
pub mod slot_extraction;

pub use intent::rules::{IntentRule, RULES};
pub use intent::{IntentClassifier, RULE_CONFIDENCE_CEILING};
pub use normalization::{fold, normalize, NormalizedText};
pub use slot_extraction::SlotExtractor;
