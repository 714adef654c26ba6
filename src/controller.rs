//! Controller subsystem
//!
//! Drives a capture run: phases in order, simulated clients, the operator
//! prompt before the relay, and the manifest at the end.

pub mod controller_handler;
pub mod operator;

pub use controller_handler::{Controller, RunSummary};
pub use operator::{NoPrompt, OperatorPrompt, StdinPrompt};
