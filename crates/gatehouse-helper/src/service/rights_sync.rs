//! # Rights Synchronizer
//!
//! Reconciles the registry's declared rights against the OS policy store at
//! startup, before any connection is served.
//!
//! The reconciliation is diff-before-write. Overwriting unconditionally
//! would clobber rules an administrator tuned by hand; skipping
//! unconditionally would leave stale rules behind after the helper's
//! declared defaults change. A rule is written only when the store has no
//! document for the right or holds one structurally different from the
//! canonical document.

use thiserror::Error;
use tracing::{debug, info};

use crate::config::HelperConfig;
use crate::domain::registry::CommandRegistry;
use crate::domain::rules::canonical_rule_document;
use crate::ports::policy::{PolicyError, PolicyStore};

/// What one synchronization run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Rights examined (one per command that declares a right).
    pub examined: usize,
    /// Rights written because they were missing or differed.
    pub written: usize,
}

/// A right whose rule could not be reconciled. Fatal to startup: serving a
/// command whose access control is undefined is worse than refusing to
/// start.
#[derive(Debug, Error)]
#[error("failed to synchronize rule for right {right}")]
pub struct PolicySyncError {
    /// The right whose rule failed.
    pub right: String,
    /// The store failure underneath.
    #[source]
    pub source: PolicyError,
}

/// Reconcile every declared right in `registry` against `store`.
pub fn synchronize(
    registry: &CommandRegistry,
    store: &dyn PolicyStore,
    config: &HelperConfig,
) -> Result<SyncReport, PolicySyncError> {
    let mut report = SyncReport::default();

    for spec in registry.iter() {
        let (Some(right), Some(rule)) = (&spec.right_name, &spec.default_rule) else {
            continue;
        };
        report.examined += 1;

        let prompt = spec
            .prompt_key
            .as_deref()
            .map(|key| config.prompt_for_key(key));
        let canonical = canonical_rule_document(
            rule,
            spec.right_timeout_seconds,
            spec.right_comment.as_deref(),
            prompt.as_deref(),
        );

        let existing = store.get_rule(right).map_err(|source| PolicySyncError {
            right: right.clone(),
            source,
        })?;

        match existing {
            Some(current) if current == canonical => {
                debug!(right = %right, "rule already canonical");
            }
            current => {
                info!(
                    right = %right,
                    command = %spec.name,
                    replacing = current.is_some(),
                    "writing rule"
                );
                store
                    .set_rule(right, &canonical)
                    .map_err(|source| PolicySyncError {
                        right: right.clone(),
                        source,
                    })?;
                report.written += 1;
            }
        }
    }

    Ok(report)
}
