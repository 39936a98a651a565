//! # Authorization Rule Documents
//!
//! Translation from a command's declared default rule to the canonical
//! document written into the OS policy store.
//!
//! Built-in rule classes replicate the system-supplied rules, but with
//! `shared` forced to `false` and the command's own timeout, so one
//! command's cached authorization never satisfies another's. A pass-through
//! rule writes only `{"rule": <name>}` and defers entirely to a rule the
//! administrator already defined; it gets no decoration.

use gatehouse_protocol::{StructuredMap, StructuredValue};

/// Keys understood by the policy store's rule documents.
pub mod keys {
    /// Rule class (`allow`, `deny`, `user`).
    pub const CLASS: &str = "class";
    /// Group the authenticating user must belong to.
    pub const GROUP: &str = "group";
    /// Restrict to the login session owner.
    pub const SESSION_OWNER: &str = "session-owner";
    /// Whether a root caller passes without authenticating.
    pub const ALLOW_ROOT: &str = "allow-root";
    /// Whether the user must actually authenticate.
    pub const AUTHENTICATE_USER: &str = "authenticate-user";
    /// Whether one grant satisfies other rights in the same session.
    pub const SHARED: &str = "shared";
    /// Grant lifetime in seconds.
    pub const TIMEOUT: &str = "timeout";
    /// Operator-facing comment.
    pub const COMMENT: &str = "comment";
    /// Prompt shown when the broker asks the user to authenticate.
    pub const DEFAULT_PROMPT: &str = "default-prompt";
    /// Pass-through reference to an externally defined rule.
    pub const RULE: &str = "rule";
}

/// A command's default access rule: one of the built-in classes, or the
/// name of a rule the policy store already understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleRef {
    /// Allow anyone.
    Allow,
    /// Deny everyone.
    Deny,
    /// Authenticate as an admin-group user.
    AuthenticateAdmin,
    /// Authenticate as a developer-group user.
    AuthenticateDeveloper,
    /// Authenticate as the session owner.
    AuthenticateSessionOwner,
    /// Authenticate as the session owner or an admin.
    AuthenticateSessionOwnerOrAdmin,
    /// Caller's user must be an admin; no authentication dialog.
    IsAdmin,
    /// Caller's user must be a developer; no authentication dialog.
    IsDeveloper,
    /// Caller must be root.
    IsRoot,
    /// Caller must own the login session.
    IsSessionOwner,
    /// Verbatim reference to a rule defined outside this helper.
    PassThrough(String),
}

/// The canonical document for one right, as compared against and written to
/// the policy store. Structural equality is the synchronizer's diff.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleDocument(StructuredMap);

impl RuleDocument {
    /// The document's entries.
    #[must_use]
    pub fn entries(&self) -> &StructuredMap {
        &self.0
    }

    /// Consume into the underlying map.
    #[must_use]
    pub fn into_entries(self) -> StructuredMap {
        self.0
    }

    /// Build a document directly from entries (policy store adapters use
    /// this when reading back what is on disk).
    #[must_use]
    pub fn from_entries(entries: StructuredMap) -> Self {
        Self(entries)
    }

    fn set(&mut self, key: &str, value: StructuredValue) {
        self.0.insert(key.to_owned(), value);
    }
}

/// Build the canonical rule document for a command's default rule.
///
/// `timeout_seconds` and the optional `comment`/`prompt` decorate built-in
/// classes only; a pass-through rule is written bare.
#[must_use]
pub fn canonical_rule_document(
    rule: &RuleRef,
    timeout_seconds: u64,
    comment: Option<&str>,
    prompt: Option<&str>,
) -> RuleDocument {
    let mut doc = RuleDocument::default();

    let built_in = match rule {
        RuleRef::Allow => {
            doc.set(keys::CLASS, "allow".into());
            true
        }
        RuleRef::Deny => {
            doc.set(keys::CLASS, "deny".into());
            true
        }
        RuleRef::AuthenticateAdmin => {
            doc.set(keys::CLASS, "user".into());
            doc.set(keys::GROUP, "admin".into());
            true
        }
        RuleRef::AuthenticateDeveloper => {
            doc.set(keys::CLASS, "user".into());
            doc.set(keys::GROUP, "_developer".into());
            true
        }
        RuleRef::AuthenticateSessionOwner => {
            doc.set(keys::CLASS, "user".into());
            doc.set(keys::SESSION_OWNER, true.into());
            true
        }
        RuleRef::AuthenticateSessionOwnerOrAdmin => {
            doc.set(keys::ALLOW_ROOT, false.into());
            doc.set(keys::CLASS, "user".into());
            doc.set(keys::GROUP, "admin".into());
            doc.set(keys::SESSION_OWNER, true.into());
            true
        }
        RuleRef::IsAdmin => {
            doc.set(keys::AUTHENTICATE_USER, false.into());
            doc.set(keys::CLASS, "user".into());
            doc.set(keys::GROUP, "admin".into());
            true
        }
        RuleRef::IsDeveloper => {
            doc.set(keys::AUTHENTICATE_USER, false.into());
            doc.set(keys::CLASS, "user".into());
            doc.set(keys::GROUP, "_developer".into());
            true
        }
        RuleRef::IsRoot => {
            doc.set(keys::ALLOW_ROOT, true.into());
            doc.set(keys::AUTHENTICATE_USER, false.into());
            doc.set(keys::CLASS, "user".into());
            true
        }
        RuleRef::IsSessionOwner => {
            doc.set(keys::ALLOW_ROOT, false.into());
            doc.set(keys::AUTHENTICATE_USER, false.into());
            doc.set(keys::CLASS, "user".into());
            doc.set(keys::SESSION_OWNER, true.into());
            true
        }
        RuleRef::PassThrough(name) => {
            doc.set(keys::RULE, name.as_str().into());
            false
        }
    };

    if built_in {
        doc.set(keys::SHARED, false.into());
        doc.set(
            keys::TIMEOUT,
            StructuredValue::Int64(timeout_seconds as i64),
        );

        if let Some(comment) = comment {
            doc.set(keys::COMMENT, comment.into());
        }

        if let Some(prompt) = prompt {
            // Prompts are locale-keyed; the empty locale is the default.
            let mut prompts = StructuredMap::new();
            prompts.insert(String::new(), prompt.into());
            doc.set(keys::DEFAULT_PROMPT, StructuredValue::Map(prompts));
        }
    }

    doc
}
