use std::fmt::{self, Display};

use crate::{AdapterStatus, CommandId, CommandKind, ParameterId};

/// Malformed bytes on the serial link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramingError {
    MissingCrc,
    MismatchedCrc { expected: u16, actual: u16 },
    InvalidEscape,
    FrameTooShort(usize),
    LengthMismatch { declared: usize, actual: usize },
    Oversized(usize),
}

impl Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::MissingCrc => write!(f, "missing CRC"),
            FramingError::MismatchedCrc { expected, actual } => {
                write!(f, "mismatched CRC: expected {:#x}, got {:#x}", expected, actual)
            }
            FramingError::InvalidEscape => write!(f, "invalid escape sequence"),
            FramingError::FrameTooShort(len) => write!(f, "frame too short: {} bytes", len),
            FramingError::LengthMismatch { declared, actual } => write!(
                f,
                "length mismatch: header says {}, frame has {}",
                declared, actual
            ),
            FramingError::Oversized(len) => write!(f, "payload too large: {} bytes", len),
        }
    }
}

impl std::error::Error for FramingError {}

#[derive(Debug)]
pub enum ErrorKind {
    UnexpectedResponse(CommandId),
    UnsupportedCommand(CommandKind),
    UnsupportedParameter(u8),
    UnsupportedAddressMode(u8),
    InvalidParameter {
        parameter_id: ParameterId,
        inner: Box<Error>,
    },
    AdapterStatus(AdapterStatus),
    Timeout,
    TransportUnavailable,
    Framing(FramingError),
    SerialPort(tokio_serial::Error),
    Io(std::io::Error),
    ChannelError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnexpectedResponse(command_id) => {
                write!(f, "unexpected command ID as response: {}", command_id)
            }
            ErrorKind::UnsupportedCommand(command) => {
                write!(f, "unsupported command ID: {:#x}", command)
            }
            ErrorKind::UnsupportedParameter(parameter_id) => {
                write!(f, "unsupported parameter ID: {}", parameter_id)
            }
            ErrorKind::UnsupportedAddressMode(mode) => {
                write!(f, "unsupported address mode: {}", mode)
            }
            ErrorKind::InvalidParameter {
                parameter_id,
                inner,
            } => write!(f, "invalid parameter for ID {}: {}", parameter_id, inner),
            ErrorKind::AdapterStatus(status) => write!(f, "adapter returned {}", status),
            ErrorKind::Timeout => write!(f, "timed out waiting for adapter"),
            ErrorKind::TransportUnavailable => write!(f, "adapter unavailable"),
            ErrorKind::Framing(error) => write!(f, "framing error: {}", error),
            ErrorKind::SerialPort(error) => write!(f, "serial port error: {}", error),
            ErrorKind::Io(error) => write!(f, "IO error: {}", error),
            ErrorKind::ChannelError => write!(f, "channel error"),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self.kind, ErrorKind::TransportUnavailable)
    }

    pub fn adapter_status(&self) -> Option<AdapterStatus> {
        match self.kind {
            ErrorKind::AdapterStatus(status) => Some(status),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adapter error: {}", self.kind)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(other: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io(other),
        }
    }
}

impl From<tokio_serial::Error> for Error {
    fn from(other: tokio_serial::Error) -> Self {
        Error {
            kind: ErrorKind::SerialPort(other),
        }
    }
}

impl From<FramingError> for Error {
    fn from(other: FramingError) -> Self {
        Error {
            kind: ErrorKind::Framing(other),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
