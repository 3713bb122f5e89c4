//! Collaborator traits
//!
//! The pipeline depends only on these interfaces; concrete implementations
//! are chosen at construction time.
//!
//! ```text
//! Execution:
//!   - ActionExecutor: runs a resolved action against the farm records
//!   - ConnectivityProbe: tells the retry queue whether to attempt a pass
//!
//! Semantic help (optional):
//!   - SemanticClassifier: intent fallback/booster
//!   - SemanticExtractor: fills slots the rules could not
//!
//! Storage:
//!   - KeyValueStore: durable blobs for the retry queue and corrections
//! ```

mod executor;
mod semantic;
mod storage;

pub use executor::{ActionExecutor, AlwaysOnline, ConnectivityProbe};
pub use semantic::{SemanticClassification, SemanticClassifier, SemanticError, SemanticExtractor};
pub use storage::{KeyValueStore, StorageError};
