//! Cross-crate scenarios, one module per area of the runtime.

pub mod client;
pub mod dispatch;
pub mod rights;
pub mod watchdog;
