use std::fmt::{self, Display};

/// Status byte carried in the header of every adapter response.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AdapterStatus {
    Success,
    Failure,
    Busy,
    Timeout,
    Unsupported,
    Error,
    NoNetwork,
    InvalidValue,
    Unknown(u8),
}

impl AdapterStatus {
    pub fn is_success(self) -> bool {
        self == AdapterStatus::Success
    }
}

impl From<u8> for AdapterStatus {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => AdapterStatus::Success,
            0x01 => AdapterStatus::Failure,
            0x02 => AdapterStatus::Busy,
            0x03 => AdapterStatus::Timeout,
            0x04 => AdapterStatus::Unsupported,
            0x05 => AdapterStatus::Error,
            0x06 => AdapterStatus::NoNetwork,
            0x07 => AdapterStatus::InvalidValue,
            unknown => AdapterStatus::Unknown(unknown),
        }
    }
}

impl From<AdapterStatus> for u8 {
    fn from(status: AdapterStatus) -> u8 {
        match status {
            AdapterStatus::Success => 0x00,
            AdapterStatus::Failure => 0x01,
            AdapterStatus::Busy => 0x02,
            AdapterStatus::Timeout => 0x03,
            AdapterStatus::Unsupported => 0x04,
            AdapterStatus::Error => 0x05,
            AdapterStatus::NoNetwork => 0x06,
            AdapterStatus::InvalidValue => 0x07,
            AdapterStatus::Unknown(byte) => byte,
        }
    }
}

impl Display for AdapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:#04x})", self, u8::from(*self))
    }
}

/// End-to-end delivery status reported by an APS data confirm. The layer that failed is implied by
/// the numeric range of the status.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZigbeeStatus {
    Success,
    Aps(u8),
    Nwk(u8),
    Mac(u8),
    Other(u8),
}

impl ZigbeeStatus {
    pub fn is_success(self) -> bool {
        self == ZigbeeStatus::Success
    }
}

impl From<u8> for ZigbeeStatus {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => ZigbeeStatus::Success,
            0xA0..=0xBF => ZigbeeStatus::Aps(byte),
            0xC0..=0xDF => ZigbeeStatus::Nwk(byte),
            0xE0..=0xFF => ZigbeeStatus::Mac(byte),
            other => ZigbeeStatus::Other(other),
        }
    }
}

impl Display for ZigbeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZigbeeStatus::Success => write!(f, "success"),
            ZigbeeStatus::Aps(status) => write!(f, "APS status {:#04x}", status),
            ZigbeeStatus::Nwk(status) => write!(f, "NWK status {:#04x}", status),
            ZigbeeStatus::Mac(status) => write!(f, "MAC status {:#04x}", status),
            ZigbeeStatus::Other(status) => write!(f, "status {:#04x}", status),
        }
    }
}
