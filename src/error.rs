use std::fmt;

/// Main error type for the timecast producer and consumers
#[derive(Debug)]
pub enum TimecastError {
    /// Configuration or CLI argument errors
    Config(String),

    /// System I/O errors
    Io(std::io::Error),

    /// Wire protocol violations
    Protocol(ProtocolError),

    /// Transport layer errors (bind, connect, write timeouts)
    Transport(String),

    /// Internal task or concurrency errors
    Concurrency(String),
}

/// Wire protocol specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// An opcode byte outside the known set
    UnknownOpcode(u8),

    /// A length prefix that does not match the payload of its opcode
    InvalidLength { expected: u8, found: u8 },
}

impl fmt::Display for TimecastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimecastError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TimecastError::Io(err) => write!(f, "I/O error: {}", err),
            TimecastError::Protocol(err) => write!(f, "Protocol error: {}", err),
            TimecastError::Transport(msg) => write!(f, "Transport error: {}", msg),
            TimecastError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownOpcode(op) => write!(f, "Unknown opcode: {:#04x}", op),
            ProtocolError::InvalidLength { expected, found } => {
                write!(f, "Invalid length: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for TimecastError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimecastError::Io(err) => Some(err),
            TimecastError::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for ProtocolError {}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, TimecastError>;

impl TimecastError {
    /// True when the peer simply went away (end of stream, reset, broken pipe)
    pub fn is_disconnect(&self) -> bool {
        match self {
            TimecastError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            TimecastError::Config(_) => "configuration_error",
            TimecastError::Io(_) => "io_error",
            TimecastError::Protocol(_) => "protocol_error",
            TimecastError::Transport(_) => "transport_error",
            TimecastError::Concurrency(_) => "concurrency_error",
        }
    }
}

// Conversions from common error types
impl From<std::io::Error> for TimecastError {
    fn from(err: std::io::Error) -> Self {
        TimecastError::Io(err)
    }
}

impl From<ProtocolError> for TimecastError {
    fn from(err: ProtocolError) -> Self {
        TimecastError::Protocol(err)
    }
}

impl From<tokio::task::JoinError> for TimecastError {
    fn from(err: tokio::task::JoinError) -> Self {
        TimecastError::Concurrency(format!("Task failed: {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::TimecastError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TimecastError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::TimecastError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::TimecastError::Transport(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = TimecastError::Config("Invalid port".to_string());
        assert_eq!(config_err.to_string(), "Configuration error: Invalid port");

        let proto_err = TimecastError::Protocol(ProtocolError::UnknownOpcode(7));
        assert_eq!(proto_err.to_string(), "Protocol error: Unknown opcode: 0x07");

        let len_err = ProtocolError::InvalidLength {
            expected: 8,
            found: 3,
        };
        assert_eq!(len_err.to_string(), "Invalid length: expected 8, found 3");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: TimecastError = io_err.into();
        assert!(matches!(err, TimecastError::Io(_)));
        assert!(err.is_disconnect());
        assert_eq!(err.error_type(), "io_error");

        let err: TimecastError = ProtocolError::UnknownOpcode(9).into();
        assert!(!err.is_disconnect());
        assert_eq!(err.error_type(), "protocol_error");
    }

    #[test]
    fn test_macros() {
        let err = config_error!("Port {} is invalid", 0);
        assert_eq!(err.to_string(), "Configuration error: Port 0 is invalid");

        let err = transport_error!("bind failed");
        assert_eq!(err.to_string(), "Transport error: bind failed");
    }
}
