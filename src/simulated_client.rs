//! Scripted database clients used to generate traffic for the capture phases.
//!
//! A client logs in, then performs its calls in order, reading one framed
//! response per call unless the call is marked as not expecting one. Each
//! client runs as its own task and reports what happened through a
//! [`ClientReport`].

pub mod client;
pub mod script;

pub use client::{run_script, spawn_client, CallOutcome, CallRecord, ClientReport};
pub use script::{ClientScript, Expectation, ScriptedCall};
