use std::fmt::{self, Debug};

use crate::ZigbeeStatus;

pub type SequenceId = u8;
pub type Endpoint = u8;
pub type ProfileId = u16;
pub type ClusterId = u16;
pub type ShortAddress = u16;
pub type ExtendedAddress = u64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Platform {
    Avr,
    Arm,
    Unknown(u8),
}

impl From<u8> for Platform {
    fn from(byte: u8) -> Self {
        match byte {
            0x05 => Platform::Avr,
            0x07 => Platform::Arm,
            unknown => Platform::Unknown(unknown),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NetworkState {
    Offline,
    Joining,
    Connected,
    Leaving,
}

impl NetworkState {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0x0 => NetworkState::Offline,
            0x1 => NetworkState::Joining,
            0x2 => NetworkState::Connected,
            _ => NetworkState::Leaving,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            NetworkState::Offline => 0x0,
            NetworkState::Joining => 0x1,
            NetworkState::Connected => 0x2,
            NetworkState::Leaving => 0x3,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceState {
    pub network_state: NetworkState,
    pub data_confirm: bool,
    pub data_indication: bool,
    pub data_request_free_slots: bool,
    pub configuration_changed: bool,
}

impl DeviceState {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            network_state: NetworkState::from_bits(byte),
            data_confirm: (byte & 0b100) > 0,
            data_indication: (byte & 0b1000) > 0,
            configuration_changed: (byte & 0b10000) > 0,
            data_request_free_slots: (byte & 0b100000) > 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = self.network_state.bits();
        if self.data_confirm {
            byte |= 0b100;
        }
        if self.data_indication {
            byte |= 0b1000;
        }
        if self.configuration_changed {
            byte |= 0b10000;
        }
        if self.data_request_free_slots {
            byte |= 0b100000;
        }
        byte
    }

    pub fn connected(&self) -> bool {
        self.network_state == NetworkState::Connected
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            network_state: NetworkState::Offline,
            data_confirm: false,
            data_indication: false,
            data_request_free_slots: false,
            configuration_changed: false,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub enum DestinationAddress {
    Group(ShortAddress),
    Nwk(ShortAddress),
    Ieee(ExtendedAddress),
}

impl DestinationAddress {
    /// Broadcast (0xFFF8-0xFFFF) or group addressed.
    pub fn is_broadcast(&self) -> bool {
        match self {
            DestinationAddress::Group(_) => true,
            DestinationAddress::Nwk(addr) => *addr >= 0xFFF8,
            DestinationAddress::Ieee(_) => false,
        }
    }
}

impl Debug for DestinationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationAddress::Group(addr) => write!(f, "Group({:#06x})", addr),
            DestinationAddress::Nwk(addr) => write!(f, "Nwk({:#06x})", addr),
            DestinationAddress::Ieee(addr) => write!(f, "Ieee({:#018x})", addr),
        }
    }
}

#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct SourceAddress {
    pub short: Option<ShortAddress>,
    pub extended: Option<ExtendedAddress>,
}

impl Debug for SourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceAddress(")?;
        match self.short {
            Some(short) => write!(f, "{:#06x}", short)?,
            None => write!(f, "-")?,
        }
        match self.extended {
            Some(extended) => write!(f, ", {:#018x})", extended),
            None => write!(f, ", -)"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApsDataIndication {
    pub destination_address: DestinationAddress,
    pub destination_endpoint: Endpoint,
    pub source_address: SourceAddress,
    pub source_endpoint: Endpoint,
    pub profile_id: ProfileId,
    pub cluster_id: ClusterId,
    pub asdu: Vec<u8>,
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub enum Destination {
    Group(ShortAddress),
    Nwk(ShortAddress, Endpoint),
    Ieee(ExtendedAddress, Endpoint),
}

impl Destination {
    pub fn short_address(&self) -> Option<ShortAddress> {
        match self {
            Destination::Nwk(addr, _) => Some(*addr),
            _ => None,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        match self {
            Destination::Group(_) => true,
            Destination::Nwk(addr, _) => *addr >= 0xFFF8,
            Destination::Ieee(_, _) => false,
        }
    }
}

impl Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Group(addr) => write!(f, "Group({:#06x})", addr),
            Destination::Nwk(addr, endpoint) => write!(f, "Nwk({:#06x}, {:#04x})", addr, endpoint),
            Destination::Ieee(addr, endpoint) => {
                write!(f, "Ieee({:#018x}, {:#04x})", addr, endpoint)
            }
        }
    }
}

/// APS transmit options bitfield.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TxOptions(pub u8);

impl TxOptions {
    pub const NONE: TxOptions = TxOptions(0x00);
    pub const SECURITY: TxOptions = TxOptions(0x01);
    pub const ACKNOWLEDGED: TxOptions = TxOptions(0x04);
}

impl Default for TxOptions {
    fn default() -> Self {
        TxOptions::ACKNOWLEDGED
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApsDataRequest {
    pub destination: Destination,
    pub profile_id: ProfileId,
    pub cluster_id: ClusterId,
    pub source_endpoint: Endpoint,
    pub asdu: Vec<u8>,
    pub tx_options: TxOptions,
    /// Zero means the adapter's default (unlimited) number of hops.
    pub radius: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApsDataConfirm {
    pub destination: Destination,
    pub source_endpoint: Endpoint,
    pub status: u8,
}

impl ApsDataConfirm {
    pub fn zigbee_status(&self) -> ZigbeeStatus {
        ZigbeeStatus::from(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_state_bits() {
        let state = DeviceState::from_byte(0b10_1110);
        assert_eq!(state.network_state, NetworkState::Connected);
        assert!(state.data_confirm);
        assert!(state.data_indication);
        assert!(!state.configuration_changed);
        assert!(state.data_request_free_slots);
        assert_eq!(state.to_byte(), 0b10_1110);
    }

    #[test]
    fn broadcast_addresses() {
        assert!(Destination::Nwk(0xFFFC, 0).is_broadcast());
        assert!(!Destination::Nwk(0x1234, 1).is_broadcast());
        assert!(DestinationAddress::Group(0x0001).is_broadcast());
    }
}
