pub mod config;
pub mod types;

pub use config::{CliArgs, Command, Config};
pub use types::{Endpoint, Exchange, Phase, RelayConfig};
