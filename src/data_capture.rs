pub mod capture;
pub mod relay;
pub mod types;

pub use capture::{CaptureHarness, InterceptedConnection};
pub use relay::Relay;
pub use types::{CapturedMessage, Direction};
