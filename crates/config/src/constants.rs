//! Centralized defaults for the farmhand assistant
//!
//! Single source of truth for the numeric defaults used by the settings
//! structs. Override them through configuration, not by editing call sites.

/// Confirmation gate thresholds
pub mod confidence {
    /// At or above: execute without asking
    pub const HIGH: f64 = 0.95;

    /// At or above: execute, invite a correction
    pub const MEDIUM: f64 = 0.80;

    /// Thresholds after the user has corrected us often
    pub const TIGHTENED_HIGH: f64 = 0.97;
    pub const TIGHTENED_MEDIUM: f64 = 0.85;

    /// Ceiling for rule-based classification
    pub const RULE_CEILING: f64 = 0.95;
}

/// Correction tracking
pub mod corrections {
    /// Trailing window in days
    pub const WINDOW_DAYS: i64 = 7;

    /// More corrections than this inside the window tightens thresholds
    pub const TIGHTEN_AFTER: usize = 5;

    pub const MAX_HISTORY: usize = 100;

    /// A correction seen this often becomes a standing category mapping
    pub const MAPPING_MIN_COUNT: u32 = 3;
}

/// Critical action detection
pub mod critical {
    /// Amounts strictly above this (FCFA) always need confirmation
    pub const AMOUNT_THRESHOLD: f64 = 5_000_000.0;
}

/// Plausibility limits checked before an action reaches the gate
pub mod validation {
    /// Sales above this (FCFA) are flagged
    pub const SALE_AMOUNT_HIGH: f64 = 100_000_000.0;
    /// Sales below this (FCFA) are flagged
    pub const SALE_AMOUNT_LOW: f64 = 1_000.0;
    /// Expenses and fixed charges above this (FCFA) are flagged
    pub const EXPENSE_AMOUNT_HIGH: f64 = 50_000_000.0;
    pub const MAX_QUANTITY: f64 = 10_000.0;
    pub const MAX_WEIGHT_KG: f64 = 500.0;
    /// Weighings below this look like a newborn or a typo
    pub const MIN_WEIGHT_KG: f64 = 0.5;
    /// Usual sale price range, FCFA per kg live weight
    pub const PRICE_PER_KG_MIN: f64 = 500.0;
    pub const PRICE_PER_KG_MAX: f64 = 5_000.0;
}

/// Conversation context store
pub mod context {
    pub const PER_TYPE_CAPACITY: usize = 10;
    pub const DEDUP_WINDOW_SECS: i64 = 60;
    pub const MAX_TURNS: usize = 50;
}

pub mod clarification {
    pub const HISTORY_LIMIT: usize = 20;
}

pub mod retry_queue {
    pub const CAPACITY: usize = 100;
    pub const MAX_RETRIES: u8 = 3;
    pub const STORAGE_KEY: &str = "retry_queue";
    pub const PROCESS_INTERVAL_SECS: u64 = 30;
}

/// Default service endpoints
pub mod endpoints {
    pub const EXECUTOR_DEFAULT: &str = "http://localhost:3000/api/agent";
    pub const EXECUTOR_HEALTH_DEFAULT: &str = "http://localhost:3000/health";
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";
}

pub mod timeouts {
    pub const EXECUTOR_MS: u64 = 10_000;
    pub const SEMANTIC_MS: u64 = 4_000;
    pub const CONNECTIVITY_MS: u64 = 2_000;
}
