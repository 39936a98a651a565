//! Core domain types: command descriptors, rule documents, dispatch
//! failures, and the idle watchdog. Nothing here touches a transport or an
//! OS facility directly; those live behind the `ports` traits.

pub mod errors;
pub mod registry;
pub mod rules;
pub mod watchdog;

pub use errors::DispatchError;
pub use registry::{CommandRegistry, CommandSpec, RegistryError, UnknownCommand};
pub use rules::{canonical_rule_document, RuleDocument, RuleRef};
pub use watchdog::IdleWatchdog;
