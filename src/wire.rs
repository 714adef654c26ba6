//! Wire encoders for the handful of database messages the harness produces.
//!
//! Everything is big-endian. Strings and byte arrays carry an `i32` length
//! prefix, with `-1` standing for null. Top level messages carry an `i32`
//! length prefix that counts the bytes following it.
//!
//! Only what the simulated clients send, what they need to read back, and the
//! canonical table fixture is covered here. Captured traffic itself stays
//! opaque.

pub mod auth;
pub mod codec;
pub mod decimal;
pub mod invocation;
pub mod table;
pub mod types;

pub use auth::{AuthenticationRequest, AuthenticationResponse, Credentials, HashScheme};
pub use decimal::Decimal;
pub use invocation::{ArrayValue, Invocation, InvocationResponse, Parameter};
pub use table::{Column, Table};
pub use types::{Value, WireType};
