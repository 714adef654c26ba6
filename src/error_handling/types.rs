use std::fmt;
use std::io;

use crate::data_capture::types::Direction;
use crate::wire::types::WireType;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadEndpoint(String),
    NotInRange(String),
    NoPhases,
    UnknownPhase(String),
    PhaseDependency(String),
    DuplicateFixture(String),
    InvalidExchange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadEndpoint(e) => write!(f, "Endpoint error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::NoPhases => write!(f, "No capture phase enabled"),
            ConfigError::UnknownPhase(p) => write!(f, "Unknown phase: {}", p),
            ConfigError::PhaseDependency(e) => write!(f, "Phase dependency error: {}", e),
            ConfigError::DuplicateFixture(name) => {
                write!(f, "Fixture file named more than once: {}", name)
            }
            ConfigError::InvalidExchange(e) => write!(f, "Invalid relay exchange: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum NetworkError {
    ResolveFailed(String),
    BindError(std::io::Error),
    SockError(std::io::Error),
    AcceptFailed(std::io::Error),
    ConnectionFailed(String, std::io::Error),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ResolveFailed(e) => write!(f, "Unable to resolve endpoint: {}", e),
            NetworkError::BindError(e) => write!(f, "Network bind error: {}", e),
            NetworkError::SockError(e) => write!(f, "Socket error: {}", e),
            NetworkError::AcceptFailed(e) => write!(f, "Accept failed: {}", e),
            NetworkError::ConnectionFailed(addr, e) => {
                write!(f, "Connection to {} failed: {}", addr, e)
            }
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Debug)]
pub enum StorageError {
    DirectoryUnavailable(String),
    InvalidName(String),
    WriteFailed(String),
    ReadFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::DirectoryUnavailable(e) => write!(f, "Output directory unavailable: {}", e),
            StorageError::InvalidName(name) => write!(f, "Invalid fixture name: {:?}", name),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            StorageError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum CaptureError {
    TcpStreamError(std::io::Error),
    PeerClosed(Direction),
    NetworkError(NetworkError),
    StorageError(StorageError),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::TcpStreamError(e) => write!(f, "TCP stream capture error: {}", e),
            CaptureError::PeerClosed(dir) => {
                write!(f, "Peer closed the connection while reading {}", dir)
            }
            CaptureError::NetworkError(e) => write!(f, "Capture network error: {}", e),
            CaptureError::StorageError(e) => write!(f, "Capture storage error: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<NetworkError> for CaptureError {
    fn from(err: NetworkError) -> Self {
        CaptureError::NetworkError(err)
    }
}

impl From<StorageError> for CaptureError {
    fn from(err: StorageError) -> Self {
        CaptureError::StorageError(err)
    }
}

#[derive(Debug, PartialEq)]
pub enum WireError {
    Truncated { needed: usize, remaining: usize },
    InvalidDecimal(String),
    InvalidString,
    UnknownWireType(i8),
    UnexpectedVersion(i8),
    NoColumns,
    ColumnCount { expected: usize, actual: usize },
    ColumnMismatch { column: String, expected: WireType },
    SizeMismatch { expected: usize, actual: usize },
    TooManyParameters(usize),
    FrameLength(i32),
    Oversized { field: &'static str, len: usize },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Truncated { needed, remaining } => write!(
                f,
                "Message truncated: needed {} byte(s), {} remaining",
                needed, remaining
            ),
            WireError::InvalidDecimal(e) => write!(f, "Invalid decimal: {}", e),
            WireError::InvalidString => write!(f, "String is not valid UTF-8"),
            WireError::UnknownWireType(code) => write!(f, "Unknown wire type code {}", code),
            WireError::UnexpectedVersion(v) => write!(f, "Unexpected message version {}", v),
            WireError::NoColumns => write!(f, "A table needs at least one column"),
            WireError::ColumnCount { expected, actual } => write!(
                f,
                "Row has {} value(s) but the table has {} column(s)",
                actual, expected
            ),
            WireError::ColumnMismatch { column, expected } => {
                write!(f, "Column {} expects a {} value", column, expected)
            }
            WireError::SizeMismatch { expected, actual } => write!(
                f,
                "Serialized size mismatch: computed {} byte(s), wrote {}",
                expected, actual
            ),
            WireError::TooManyParameters(n) => write!(f, "Too many parameters: {}", n),
            WireError::FrameLength(len) => write!(f, "Invalid frame length {}", len),
            WireError::Oversized { field, len } => {
                write!(f, "{} of {} does not fit its wire field", field, len)
            }
        }
    }
}

impl std::error::Error for WireError {}

#[derive(Debug)]
pub enum ClientError {
    Io(std::io::Error),
    ConnectionClosed,
    WireError(WireError),
    AuthenticationRejected(i8),
    ClientDataMismatch { expected: i64, actual: i64 },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(e) => write!(f, "Client IO error: {}", e),
            ClientError::ConnectionClosed => write!(f, "Connection closed by peer"),
            ClientError::WireError(e) => write!(f, "Client wire error: {}", e),
            ClientError::AuthenticationRejected(code) => {
                write!(f, "Authentication rejected with result code {}", code)
            }
            ClientError::ClientDataMismatch { expected, actual } => write!(
                f,
                "Response carried client data {} but {} was expected",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ClientError::ConnectionClosed,
            _ => ClientError::Io(err),
        }
    }
}

impl From<WireError> for ClientError {
    fn from(err: WireError) -> Self {
        ClientError::WireError(err)
    }
}

#[derive(Debug)]
pub enum ReplayError {
    Io(std::io::Error),
    WireError(WireError),
    StorageError(StorageError),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Io(e) => write!(f, "Replay IO error: {}", e),
            ReplayError::WireError(e) => write!(f, "Replay wire error: {}", e),
            ReplayError::StorageError(e) => write!(f, "Replay fixture error: {}", e),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<std::io::Error> for ReplayError {
    fn from(err: std::io::Error) -> Self {
        ReplayError::Io(err)
    }
}

impl From<WireError> for ReplayError {
    fn from(err: WireError) -> Self {
        ReplayError::WireError(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    NetworkError(NetworkError),
    CaptureError(CaptureError),
    StorageError(StorageError),
    WireError(WireError),
    PhaseDependency(String),
    PromptFailed(std::io::Error),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::NetworkError(e) => write!(f, "Network error: {}", e),
            ControllerError::CaptureError(e) => write!(f, "Capture error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::WireError(e) => write!(f, "Wire error: {}", e),
            ControllerError::PhaseDependency(e) => write!(f, "Phase dependency error: {}", e),
            ControllerError::PromptFailed(e) => write!(f, "Operator prompt failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<NetworkError> for ControllerError {
    fn from(err: NetworkError) -> Self {
        ControllerError::NetworkError(err)
    }
}

impl From<CaptureError> for ControllerError {
    fn from(err: CaptureError) -> Self {
        ControllerError::CaptureError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

impl From<WireError> for ControllerError {
    fn from(err: WireError) -> Self {
        ControllerError::WireError(err)
    }
}
