use std::fmt::{self, Display};
use std::io;

use adapter::{ClusterId, ExtendedAddress, ZigbeeStatus};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
pub enum ErrorKind {
    Adapter(adapter::Error),
    Io(io::Error),
    ChannelError,
    /// No reply within the policy timeout.
    Timeout,
    TransportUnavailable,
    /// The network went offline while the request was pending.
    NetworkOffline,
    /// The adapter confirmed the APS request with a failure status.
    Delivery(ZigbeeStatus),
    /// The adapter's IEEE address differs from the one stored for this network.
    HardwareModuleChanged {
        stored: ExtendedAddress,
        current: ExtendedAddress,
    },
    /// A ZDO response reporting something other than success.
    ZdoStatus(u8),
    UnexpectedCluster(ClusterId),
    /// All request IDs are taken by outstanding requests.
    Busy,
    /// A later start or stop of the network replaced this one.
    Cancelled,
    Config(String),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Adapter(error) => write!(f, "{}", error),
            ErrorKind::Io(error) => write!(f, "io: {}", error),
            ErrorKind::ChannelError => write!(f, "channel error"),
            ErrorKind::Timeout => write!(f, "timed out"),
            ErrorKind::TransportUnavailable => write!(f, "adapter unavailable"),
            ErrorKind::NetworkOffline => write!(f, "network offline"),
            ErrorKind::Delivery(status) => write!(f, "delivery failed: {}", status),
            ErrorKind::HardwareModuleChanged { stored, current } => write!(
                f,
                "hardware module changed: network belongs to {:#018x}, adapter is {:#018x}",
                stored, current
            ),
            ErrorKind::ZdoStatus(status) => write!(f, "zdo status {:#04x}", status),
            ErrorKind::UnexpectedCluster(cluster_id) => {
                write!(f, "unexpected cluster {:#06x}", cluster_id)
            }
            ErrorKind::Busy => write!(f, "too many outstanding requests"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::Config(message) => write!(f, "config: {}", message),
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
        match &self.kind {
            ErrorKind::Timeout => true,
            ErrorKind::Adapter(error) => error.is_timeout(),
            _ => false,
        }
    }

    pub fn is_transport_unavailable(&self) -> bool {
        match &self.kind {
            ErrorKind::TransportUnavailable => true,
            ErrorKind::Adapter(error) => error.is_transport_unavailable(),
            _ => false,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {}

impl From<adapter::Error> for Error {
    fn from(other: adapter::Error) -> Self {
        // Keep the two availability failures distinguishable from the outside.
        let kind = match other.kind {
            adapter::ErrorKind::Timeout => ErrorKind::Timeout,
            adapter::ErrorKind::TransportUnavailable => ErrorKind::TransportUnavailable,
            _ => ErrorKind::Adapter(other),
        };
        Error { kind }
    }
}

impl From<io::Error> for Error {
    fn from(other: io::Error) -> Self {
        Error {
            kind: ErrorKind::Io(other),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error { kind }
    }
}

impl From<oneshot::error::RecvError> for Error {
    fn from(_: oneshot::error::RecvError) -> Error {
        Error {
            kind: ErrorKind::ChannelError,
        }
    }
}

impl<T> From<mpsc::error::SendError<T>> for Error {
    fn from(_: mpsc::error::SendError<T>) -> Error {
        Error {
            kind: ErrorKind::ChannelError,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
