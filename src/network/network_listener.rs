//! # Network Listener Module
//!
//! Socket plumbing shared by the capture harness, the relay and the replay
//! server. Endpoints are resolved at use time so that `localhost` and explicit
//! addresses behave the same way.
//!
//! ```rust,no_run
//! use voltcap::configuration::types::Endpoint;
//! use voltcap::network::bind_listener;
//! use voltcap::error_handling::types::NetworkError;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), NetworkError> {
//!     let listener = bind_listener(&Endpoint::new("localhost", 21212)).await?;
//!     let (stream, peer) = listener.accept().await.map_err(NetworkError::AcceptFailed)?;
//!     Ok(())
//! }
//! ```

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::{sleep, Instant};

use crate::configuration::types::Endpoint;
use crate::error_handling::types::NetworkError;

/// Pending connections allowed on a capture listener.
const BACKLOG: u32 = 16;

const FIRST_RETRY_DELAY: Duration = Duration::from_millis(50);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Resolves an endpoint to the first socket address it maps to.
///
/// # Errors
///
/// `NetworkError::ResolveFailed` if the lookup fails or yields no address.
pub async fn resolve(endpoint: &Endpoint) -> Result<SocketAddr, NetworkError> {
    let mut addrs = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|e| {
            error!("[!] Unable to resolve {}: {}", endpoint, e);
            NetworkError::ResolveFailed(format!("{}: {}", endpoint, e))
        })?;
    addrs
        .next()
        .ok_or_else(|| NetworkError::ResolveFailed(format!("{}: no address", endpoint)))
}

/// Binds a listening socket on `endpoint` with address reuse enabled.
///
/// Reuse lets consecutive phases bind the same port right after the
/// previous listener was dropped.
///
/// # Returns
///
/// * `Ok(TcpListener)` ready to accept
/// * `Err(NetworkError::SockError)` if the socket cannot be created or configured
/// * `Err(NetworkError::BindError)` if binding or listening fails
pub async fn bind_listener(endpoint: &Endpoint) -> Result<TcpListener, NetworkError> {
    let addr = resolve(endpoint).await?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    };
    let socket = match socket {
        Ok(sock) => sock,
        Err(err) => {
            error!("[!] Socket error: {:?}", err);
            return Err(NetworkError::SockError(err));
        }
    };

    socket.set_reuseaddr(true).map_err(NetworkError::SockError)?;
    socket.bind(addr).map_err(|e| {
        error!("[!] Unable to bind {}: {}", addr, e);
        NetworkError::BindError(e)
    })?;
    let listener = socket.listen(BACKLOG).map_err(NetworkError::BindError)?;

    debug!(
        "Listening on {}",
        listener.local_addr().map_or(addr, |local| local)
    );
    Ok(listener)
}

/// Like [`bind_listener`], but keeps retrying while the address is still in
/// use, for at most `timeout`. The delay between attempts doubles up to one
/// second.
///
/// A server sharing the listen port may take a moment to go away after it
/// was told to shut down; this waits for it instead of failing the run.
pub async fn bind_listener_with_retry(
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<TcpListener, NetworkError> {
    let deadline = Instant::now() + timeout;
    let mut delay = FIRST_RETRY_DELAY;
    loop {
        match bind_listener(endpoint).await {
            Err(NetworkError::BindError(e))
                if e.kind() == io::ErrorKind::AddrInUse && Instant::now() < deadline =>
            {
                let wait = delay.min(deadline.saturating_duration_since(Instant::now()));
                warn!("{} still in use, retrying in {:?}", endpoint, wait);
                sleep(wait).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
            other => return other,
        }
    }
}

/// Opens an outbound connection with Nagle disabled.
pub async fn connect(endpoint: &Endpoint) -> Result<TcpStream, NetworkError> {
    let addr = resolve(endpoint).await?;
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| NetworkError::ConnectionFailed(endpoint.to_string(), e))?;
    stream.set_nodelay(true).map_err(NetworkError::SockError)?;
    debug!("Connected to {} ({})", endpoint, addr);
    Ok(stream)
}
