//! Port traits for the helper's external collaborators: the OS privilege
//! broker, the policy store, the identity verifier, the transport, and the
//! application-supplied command handlers. Adapters live under
//! `crate::adapters`.

pub mod broker;
pub mod handler;
pub mod identity;
pub mod policy;
pub mod transport;

pub use broker::{BrokerError, BrokerSession, PrivilegeBroker, BROKER_DENIED_CODE, BROKER_ERROR_DOMAIN};
pub use handler::{CommandHandler, CommandReply, CommandRequest, PersistentHandler};
pub use identity::{IdentityError, IdentityVerifier};
pub use policy::{PolicyError, PolicyStore};
pub use transport::{HelperConnection, HelperListener};
