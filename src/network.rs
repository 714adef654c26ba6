pub mod network_listener;

pub use network_listener::{bind_listener, bind_listener_with_retry, connect, resolve};
