//! # Policy Store Port
//!
//! The helper's view of the OS database mapping right names to rule
//! documents. Read and written only during single-threaded startup
//! synchronization, so the trait is synchronous.

use thiserror::Error;

use crate::domain::rules::RuleDocument;

/// Why a rule could not be read or written.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The store itself could not be reached.
    #[error("policy store io failure")]
    Io(#[from] std::io::Error),

    /// The store refused the document.
    #[error("policy store rejected rule: {0}")]
    Rejected(String),
}

/// The OS policy store of right-name to rule-document mappings.
pub trait PolicyStore: Send + Sync {
    /// The document currently stored for `name`, or `None` when the right
    /// has never been defined.
    fn get_rule(&self, name: &str) -> Result<Option<RuleDocument>, PolicyError>;

    /// Define or replace the document for `name`.
    fn set_rule(&self, name: &str, document: &RuleDocument) -> Result<(), PolicyError>;
}
