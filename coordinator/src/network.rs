use adapter::{ExtendedAddress, ShortAddress};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeType {
    Coordinator,
    Router,
}

impl From<u8> for NodeType {
    fn from(designated_coordinator: u8) -> Self {
        match designated_coordinator {
            1 => NodeType::Coordinator,
            _ => NodeType::Router,
        }
    }
}

impl From<NodeType> for u8 {
    fn from(node_type: NodeType) -> u8 {
        match node_type {
            NodeType::Coordinator => 1,
            NodeType::Router => 0,
        }
    }
}

/// The network as the adapter reported it after bring-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfiguration {
    pub ieee_address: ExtendedAddress,
    pub short_address: ShortAddress,
    pub pan_id: u16,
    pub extended_pan_id: u64,
    pub channel: u8,
    pub channel_mask: u32,
    pub security_mode: u8,
    pub node_type: NodeType,
    pub protocol_version: u16,
}

impl Default for NetworkConfiguration {
    fn default() -> Self {
        Self {
            ieee_address: 0,
            short_address: 0xFFFF,
            pan_id: 0,
            extended_pan_id: 0,
            channel: 0,
            channel_mask: 0,
            security_mode: 0,
            node_type: NodeType::Router,
            protocol_version: 0,
        }
    }
}
