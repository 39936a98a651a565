//! # In-Memory Fakes
//!
//! Deterministic stand-ins for the OS collaborators, used by this crate's
//! tests and exported under the `test-utils` feature so downstream crates
//! can script helper scenarios without an operating system in the loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use gatehouse_protocol::{AuthorizationToken, CallerCredentials, MAX_EXTERNAL_TOKEN_LEN};

use crate::domain::rules::RuleDocument;
use crate::ports::broker::{BrokerError, BrokerSession, PrivilegeBroker};
use crate::ports::identity::{IdentityError, IdentityVerifier};
use crate::ports::policy::{PolicyError, PolicyStore};
use gatehouse_client::{AuthorizationError, ClientAuthorization};

/// Policy store backed by a map, counting writes.
#[derive(Default)]
pub struct MemoryPolicyStore {
    rules: Mutex<HashMap<String, RuleDocument>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryPolicyStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total writes accepted, including seeding done by tests.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RuleDocument>> {
        match self.rules.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn get_rule(&self, name: &str) -> Result<Option<RuleDocument>, PolicyError> {
        Ok(self.lock().get(name).cloned())
    }

    fn set_rule(&self, name: &str, document: &RuleDocument) -> Result<(), PolicyError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PolicyError::Rejected("writes disabled".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(name.to_owned(), document.clone());
        Ok(())
    }
}

/// Scripted privilege broker. Grants every right until told to deny, and
/// records which rights were asked for. Also serves as the client-side
/// authorization source, handing out fixed-size token blobs.
#[derive(Default)]
pub struct MemoryBroker {
    deny: AtomicBool,
    copied: Mutex<Vec<String>>,
    token_len: AtomicUsize,
}

impl MemoryBroker {
    /// A broker that grants everything with well-formed tokens.
    #[must_use]
    pub fn new() -> Self {
        let broker = Self::default();
        broker.token_len.store(MAX_EXTERNAL_TOKEN_LEN, Ordering::SeqCst);
        broker
    }

    /// Deny every subsequent right acquisition.
    pub fn deny(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    /// Grant subsequent right acquisitions again.
    pub fn allow(&self) {
        self.deny.store(false, Ordering::SeqCst);
    }

    /// Externalize tokens of `len` bytes from now on. Used to script
    /// oversized-token scenarios.
    pub fn set_token_len(&self, len: usize) {
        self.token_len.store(len, Ordering::SeqCst);
    }

    /// Every right that reached [`PrivilegeBroker::copy_rights`], in order.
    #[must_use]
    pub fn copied_rights(&self) -> Vec<String> {
        match self.copied.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl PrivilegeBroker for MemoryBroker {
    fn internalize(&self, external: &AuthorizationToken) -> Result<BrokerSession, BrokerError> {
        if external.as_bytes().len() != MAX_EXTERNAL_TOKEN_LEN {
            return Err(BrokerError::invalid_token(format!(
                "{} bytes",
                external.as_bytes().len()
            )));
        }
        Ok(BrokerSession::new())
    }

    async fn copy_rights(
        &self,
        _session: &BrokerSession,
        rights: &[&str],
        _prompt: Option<&str>,
        _allow_interaction: bool,
    ) -> Result<(), BrokerError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(BrokerError::denied());
        }
        if let Ok(mut copied) = self.copied.lock() {
            copied.extend(rights.iter().map(|r| (*r).to_owned()));
        }
        Ok(())
    }
}

impl ClientAuthorization for MemoryBroker {
    fn externalize(&self) -> Result<Vec<u8>, AuthorizationError> {
        Ok(vec![0u8; self.token_len.load(Ordering::SeqCst)])
    }
}

/// Identity verifier with a fixed verdict.
pub struct StaticIdentityVerifier {
    accept: bool,
}

impl StaticIdentityVerifier {
    /// Accepts every peer.
    #[must_use]
    pub fn accepting() -> Self {
        Self { accept: true }
    }

    /// Rejects every peer.
    #[must_use]
    pub fn rejecting() -> Self {
        Self { accept: false }
    }
}

impl IdentityVerifier for StaticIdentityVerifier {
    fn verify(
        &self,
        _peer: &CallerCredentials,
        _requirement: &str,
    ) -> Result<(), IdentityError> {
        if self.accept {
            Ok(())
        } else {
            Err(IdentityError::RequirementNotMet)
        }
    }
}
