//! # Command Registry
//!
//! The keyed, ordered set of command descriptors a helper serves. Populated
//! during startup, validated on insertion, then read-only for the process
//! lifetime (and therefore shareable without locking).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use gatehouse_protocol::{command_name_within_limit, MAX_COMMAND_NAME_UTF16};
use thiserror::Error;

use crate::domain::rules::RuleRef;
use crate::ports::handler::CommandHandler;

/// Descriptor for one command: its name, the right gating it, and the
/// handler that runs once that right is held.
///
/// Invariants, enforced by [`CommandRegistry::register`]:
/// - `right_name` and `default_rule` are present together or not at all;
/// - `prompt_key` requires `right_name`;
/// - `name` is unique and within [`MAX_COMMAND_NAME_UTF16`] UTF-16 units.
pub struct CommandSpec {
    /// Unique command name clients put into the request envelope.
    pub name: String,
    /// Right the broker must grant before the handler runs. `None` means
    /// the handler self-authorizes or is unconditionally available.
    pub right_name: Option<String>,
    /// Rule written to the policy store for `right_name` at startup.
    pub default_rule: Option<RuleRef>,
    /// Grant lifetime recorded in the rule document, in seconds.
    pub right_timeout_seconds: u64,
    /// Operator-facing comment recorded in the rule document.
    pub right_comment: Option<String>,
    /// Key into the helper's prompt table for the authentication dialog.
    pub prompt_key: Option<String>,
    /// Code-identity requirement the connecting peer must satisfy.
    pub identity_requirement: Option<String>,
    /// The command's implementation.
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandSpec {
    /// A command with no right, no identity requirement, and no prompt.
    #[must_use]
    pub fn unrestricted(name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            name: name.into(),
            right_name: None,
            default_rule: None,
            right_timeout_seconds: 0,
            right_comment: None,
            prompt_key: None,
            identity_requirement: None,
            handler,
        }
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("right_name", &self.right_name)
            .field("default_rule", &self.default_rule)
            .field("identity_requirement", &self.identity_requirement)
            .finish_non_exhaustive()
    }
}

/// Why a command spec was rejected at registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A command with the same name is already registered.
    #[error("duplicate command name: {name}")]
    DuplicateName {
        /// The offending name.
        name: String,
    },

    /// The name exceeds the protocol's length cap.
    #[error("command name exceeds {MAX_COMMAND_NAME_UTF16} UTF-16 units")]
    NameTooLong,

    /// `right_name` without `default_rule`, or the reverse.
    #[error("command {name}: right_name and default_rule must be present together")]
    RightRuleMismatch {
        /// The offending command.
        name: String,
    },

    /// `prompt_key` on a command with no right.
    #[error("command {name}: prompt_key requires right_name")]
    PromptWithoutRight {
        /// The offending command.
        name: String,
    },
}

/// Lookup failure: the registry has no command by that name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command: {name}")]
pub struct UnknownCommand {
    /// The name that was requested.
    pub name: String,
}

/// The set of commands a helper serves, keyed by name, iterated in
/// registration order.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    by_name: HashMap<String, Arc<CommandSpec>>,
    order: Vec<String>,
}

impl CommandRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command, validating the spec's invariants.
    pub fn register(&mut self, spec: CommandSpec) -> Result<(), RegistryError> {
        if !command_name_within_limit(&spec.name) {
            return Err(RegistryError::NameTooLong);
        }
        if spec.right_name.is_some() != spec.default_rule.is_some() {
            return Err(RegistryError::RightRuleMismatch {
                name: spec.name.clone(),
            });
        }
        if spec.prompt_key.is_some() && spec.right_name.is_none() {
            return Err(RegistryError::PromptWithoutRight {
                name: spec.name.clone(),
            });
        }
        if self.by_name.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateName {
                name: spec.name.clone(),
            });
        }

        let name = spec.name.clone();
        self.by_name.insert(name.clone(), Arc::new(spec));
        self.order.push(name);
        Ok(())
    }

    /// Find a command by name.
    pub fn lookup(&self, name: &str) -> Result<&Arc<CommandSpec>, UnknownCommand> {
        self.by_name.get(name).ok_or_else(|| UnknownCommand {
            name: name.to_owned(),
        })
    }

    /// True when a command by that name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Commands in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CommandSpec>> {
        self.order.iter().filter_map(|name| self.by_name.get(name))
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no commands are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::handler::{CommandReply, CommandRequest};
    use async_trait::async_trait;
    use gatehouse_protocol::ErrorEnvelope;

    struct NoopHandler;

    #[async_trait]
    impl CommandHandler for NoopHandler {
        async fn handle(
            &self,
            _request: CommandRequest<'_>,
            _reply: &mut CommandReply,
        ) -> Result<(), ErrorEnvelope> {
            Ok(())
        }
    }

    fn spec(name: &str) -> CommandSpec {
        CommandSpec::unrestricted(name, Arc::new(NoopHandler))
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = CommandRegistry::new();
        registry.register(spec("First")).expect("register");
        registry.register(spec("Second")).expect("register");

        assert_eq!(registry.len(), 2);
        assert!(registry.lookup("First").is_ok());
        let err = registry.lookup("Third").expect_err("unknown");
        assert_eq!(err.name, "Third");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = CommandRegistry::new();
        registry.register(spec("Twice")).expect("register");
        assert_eq!(
            registry.register(spec("Twice")),
            Err(RegistryError::DuplicateName {
                name: "Twice".into()
            })
        );
    }

    #[test]
    fn right_requires_rule_and_vice_versa() {
        let mut registry = CommandRegistry::new();

        let mut missing_rule = spec("NoRule");
        missing_rule.right_name = Some("com.example.right".into());
        assert!(matches!(
            registry.register(missing_rule),
            Err(RegistryError::RightRuleMismatch { .. })
        ));

        let mut missing_right = spec("NoRight");
        missing_right.default_rule = Some(RuleRef::Allow);
        assert!(matches!(
            registry.register(missing_right),
            Err(RegistryError::RightRuleMismatch { .. })
        ));
    }

    #[test]
    fn prompt_requires_right() {
        let mut registry = CommandRegistry::new();
        let mut bad = spec("Prompted");
        bad.prompt_key = Some("prompt".into());
        assert!(matches!(
            registry.register(bad),
            Err(RegistryError::PromptWithoutRight { .. })
        ));
    }

    #[test]
    fn oversized_names_are_rejected() {
        let mut registry = CommandRegistry::new();
        let long = "n".repeat(MAX_COMMAND_NAME_UTF16 + 1);
        assert_eq!(registry.register(spec(&long)), Err(RegistryError::NameTooLong));
    }

    #[test]
    fn iteration_preserves_registration_order() {
        let mut registry = CommandRegistry::new();
        for name in ["C", "A", "B"] {
            registry.register(spec(name)).expect("register");
        }
        let names: Vec<_> = registry.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["C", "A", "B"]);
    }
}
