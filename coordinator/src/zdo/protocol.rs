use std::io::{Read, Write};

use adapter::{
    ClusterId, Endpoint, ExtendedAddress, ProfileId, ReadWire, ReadWireExt, ShortAddress,
    WriteWire, WriteWireExt,
};

use super::{Request, Response};

type Result<T> = adapter::Result<T>;

/// Reads a u8-counted list.
fn read_list<R, T>(r: &mut R) -> Result<Vec<T>>
where
    R: Read,
    T: ReadWire,
{
    let count: u8 = r.read_wire()?;
    let mut list = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        list.push(r.read_wire()?);
    }
    Ok(list)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogicalType {
    Coordinator,
    Router,
    EndDevice,
    Unknown(u8),
}

impl From<u8> for LogicalType {
    fn from(bits: u8) -> Self {
        match bits {
            0x0 => LogicalType::Coordinator,
            0x1 => LogicalType::Router,
            0x2 => LogicalType::EndDevice,
            other => LogicalType::Unknown(other),
        }
    }
}

/// MAC capability flags, as carried in node descriptors and device announcements.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MacCapabilities(pub u8);

impl MacCapabilities {
    pub fn full_function_device(&self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn mains_powered(&self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn rx_on_when_idle(&self) -> bool {
        self.0 & 0x08 != 0
    }
}

// pg 86
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub logical_type: LogicalType,
    pub complex_descriptor_available: bool,
    pub user_descriptor_available: bool,
    pub frequency_band: u8,
    pub mac_capabilities: MacCapabilities,
    pub manufacturer_code: u16,
    pub maximum_buffer_size: u8,
    pub maximum_incoming_transfer_size: u16,
    pub server_mask: u16,
    pub maximum_outgoing_transfer_size: u16,
    pub descriptor_capabilities: u8,
}

impl ReadWire for NodeDescriptor {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let byte: u8 = r.read_wire()?;
        let logical_type = LogicalType::from(byte & 0b111);
        let complex_descriptor_available = byte & 0b1000 != 0;
        let user_descriptor_available = byte & 0b1_0000 != 0;

        let byte: u8 = r.read_wire()?;
        let frequency_band = byte >> 3;

        Ok(NodeDescriptor {
            logical_type,
            complex_descriptor_available,
            user_descriptor_available,
            frequency_band,
            mac_capabilities: MacCapabilities(r.read_wire()?),
            manufacturer_code: r.read_wire()?,
            maximum_buffer_size: r.read_wire()?,
            maximum_incoming_transfer_size: r.read_wire()?,
            server_mask: r.read_wire()?,
            maximum_outgoing_transfer_size: r.read_wire()?,
            descriptor_capabilities: r.read_wire()?,
        })
    }
}

#[derive(Debug)]
pub struct NodeDescRequest {
    pub addr: ShortAddress,
}

impl Request for NodeDescRequest {
    const CLUSTER_ID: ClusterId = 0x0002;

    type Response = NodeDescResponse;

    fn address_of_interest(&self) -> Option<ShortAddress> {
        Some(self.addr)
    }
}

impl WriteWire for NodeDescRequest {
    fn wire_len(&self) -> u16 {
        2
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_wire(&self.addr)
    }
}

#[derive(Debug)]
pub struct NodeDescResponse {
    pub status: u8,
    pub addr: ShortAddress,
    pub node_descriptor: Option<NodeDescriptor>,
}

impl Response for NodeDescResponse {
    const CLUSTER_ID: ClusterId = 0x8002;

    fn status(&self) -> u8 {
        self.status
    }
}

impl ReadWire for NodeDescResponse {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let status = r.read_wire()?;
        let addr = r.read_wire()?;
        let node_descriptor = if status == 0 {
            Some(r.read_wire()?)
        } else {
            None
        };

        Ok(NodeDescResponse {
            status,
            addr,
            node_descriptor,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PowerDescriptor {
    pub current_power_mode: u8,
    pub available_power_sources: u8,
    pub current_power_source: u8,
    pub current_power_source_level: u8,
}

impl ReadWire for PowerDescriptor {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let low: u8 = r.read_wire()?;
        let high: u8 = r.read_wire()?;

        Ok(PowerDescriptor {
            current_power_mode: low & 0x0F,
            available_power_sources: low >> 4,
            current_power_source: high & 0x0F,
            current_power_source_level: high >> 4,
        })
    }
}

#[derive(Debug)]
pub struct PowerDescRequest {
    pub addr: ShortAddress,
}

impl Request for PowerDescRequest {
    const CLUSTER_ID: ClusterId = 0x0003;

    type Response = PowerDescResponse;

    fn address_of_interest(&self) -> Option<ShortAddress> {
        Some(self.addr)
    }
}

impl WriteWire for PowerDescRequest {
    fn wire_len(&self) -> u16 {
        2
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_wire(&self.addr)
    }
}

#[derive(Debug)]
pub struct PowerDescResponse {
    pub status: u8,
    pub addr: ShortAddress,
    pub power_descriptor: Option<PowerDescriptor>,
}

impl Response for PowerDescResponse {
    const CLUSTER_ID: ClusterId = 0x8003;

    fn status(&self) -> u8 {
        self.status
    }
}

impl ReadWire for PowerDescResponse {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let status = r.read_wire()?;
        let addr = r.read_wire()?;
        let power_descriptor = if status == 0 {
            Some(r.read_wire()?)
        } else {
            None
        };

        Ok(PowerDescResponse {
            status,
            addr,
            power_descriptor,
        })
    }
}

#[derive(Debug)]
pub struct SimpleDescRequest {
    pub addr: ShortAddress,
    pub endpoint: Endpoint,
}

impl Request for SimpleDescRequest {
    const CLUSTER_ID: ClusterId = 0x0004;

    type Response = SimpleDescResponse;

    fn address_of_interest(&self) -> Option<ShortAddress> {
        Some(self.addr)
    }
}

impl WriteWire for SimpleDescRequest {
    fn wire_len(&self) -> u16 {
        3
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_wire(&self.addr)?;
        w.write_wire(&self.endpoint)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SimpleDescResponse {
    pub status: u8,
    pub addr: ShortAddress,
    pub simple_descriptor: Option<SimpleDescriptor>,
}

impl Response for SimpleDescResponse {
    const CLUSTER_ID: ClusterId = 0x8004;

    fn status(&self) -> u8 {
        self.status
    }
}

impl ReadWire for SimpleDescResponse {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let status = r.read_wire()?;
        let addr = r.read_wire()?;
        let len: u8 = r.read_wire()?;

        let simple_descriptor = if status == 0 && len > 0 {
            Some(r.read_wire()?)
        } else {
            None
        };

        Ok(SimpleDescResponse {
            status,
            addr,
            simple_descriptor,
        })
    }
}

// pg 96
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleDescriptor {
    pub endpoint: Endpoint,
    pub profile: ProfileId,
    pub device_identifier: u16,
    pub device_version: u8, // 4 bits
    pub input_clusters: Vec<ClusterId>,
    pub output_clusters: Vec<ClusterId>,
}

impl ReadWire for SimpleDescriptor {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let endpoint = r.read_wire()?;
        let profile = r.read_wire()?;
        let device_identifier = r.read_wire()?;
        let version: u8 = r.read_wire()?;
        let input_clusters = read_list(r)?;
        let output_clusters = read_list(r)?;

        Ok(SimpleDescriptor {
            endpoint,
            profile,
            device_identifier,
            device_version: version & 0x0F,
            input_clusters,
            output_clusters,
        })
    }
}

#[derive(Debug)]
pub struct ActiveEpRequest {
    pub addr: ShortAddress,
}

impl Request for ActiveEpRequest {
    const CLUSTER_ID: ClusterId = 0x0005;

    type Response = ActiveEpResponse;

    fn address_of_interest(&self) -> Option<ShortAddress> {
        Some(self.addr)
    }
}

impl WriteWire for ActiveEpRequest {
    fn wire_len(&self) -> u16 {
        2
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_wire(&self.addr)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct ActiveEpResponse {
    pub status: u8,
    pub addr: ShortAddress,
    pub active_endpoints: Vec<Endpoint>,
}

impl Response for ActiveEpResponse {
    const CLUSTER_ID: ClusterId = 0x8005;

    fn status(&self) -> u8 {
        self.status
    }
}

impl ReadWire for ActiveEpResponse {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let status = r.read_wire()?;
        let addr = r.read_wire()?;
        let active_endpoints = if status == 0 {
            read_list(r)?
        } else {
            Vec::new()
        };

        Ok(ActiveEpResponse {
            status,
            addr,
            active_endpoints,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceAnnounce {
    pub addr: ShortAddress,
    pub ieee: ExtendedAddress,
    pub capabilities: MacCapabilities,
}

impl DeviceAnnounce {
    pub const CLUSTER_ID: ClusterId = 0x0013;
}

impl ReadWire for DeviceAnnounce {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(DeviceAnnounce {
            addr: r.read_wire()?,
            ieee: r.read_wire()?,
            capabilities: MacCapabilities(r.read_wire()?),
        })
    }
}

impl WriteWire for DeviceAnnounce {
    fn wire_len(&self) -> u16 {
        11
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_wire(&self.addr)?;
        w.write_wire(&self.ieee)?;
        w.write_wire(&self.capabilities.0)
    }
}

#[derive(Debug)]
pub struct MgmtLqiRequest {
    pub start_index: u8,
}

impl Request for MgmtLqiRequest {
    const CLUSTER_ID: ClusterId = 0x0031;

    type Response = MgmtLqiResponse;
}

impl WriteWire for MgmtLqiRequest {
    fn wire_len(&self) -> u16 {
        1
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_wire(&self.start_index)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct MgmtLqiResponse {
    pub status: u8,
    pub neighbor_table_entries: u8,
    pub start_index: u8,
    pub neighbor_table_list: Vec<Neighbor>,
}

impl Response for MgmtLqiResponse {
    const CLUSTER_ID: ClusterId = 0x8031;

    fn status(&self) -> u8 {
        self.status
    }
}

impl ReadWire for MgmtLqiResponse {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let status = r.read_wire()?;
        if status != 0 {
            return Ok(MgmtLqiResponse {
                status,
                neighbor_table_entries: 0,
                start_index: 0,
                neighbor_table_list: Vec::new(),
            });
        }

        let neighbor_table_entries = r.read_wire()?;
        let start_index = r.read_wire()?;
        let neighbor_table_list = read_list(r)?;

        Ok(MgmtLqiResponse {
            status,
            neighbor_table_entries,
            start_index,
            neighbor_table_list,
        })
    }
}

impl ReadWire for Neighbor {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let extended_pan_id = r.read_wire()?;
        let extended_address = r.read_wire()?;
        let network_address = r.read_wire()?;

        let byte: u8 = r.read_wire()?;
        let device_type = LogicalType::from(byte & 0b11);
        let rx_on_while_idle = match (byte >> 2) & 0b11 {
            0x0 => RxOnWhileIdle::Off,
            0x1 => RxOnWhileIdle::On,
            _ => RxOnWhileIdle::Unknown,
        };
        let relationship = match (byte >> 4) & 0b111 {
            0x0 => NeighborRelationship::Parent,
            0x1 => NeighborRelationship::Child,
            0x2 => NeighborRelationship::Sibling,
            0x3 => NeighborRelationship::None,
            0x4 => NeighborRelationship::PreviousChild,
            other => NeighborRelationship::Unknown(other),
        };

        let byte: u8 = r.read_wire()?;
        let permit_joining = match byte & 0b11 {
            0x0 => PermitJoining::NotAccepting,
            0x1 => PermitJoining::Accepting,
            _ => PermitJoining::Unknown,
        };

        let depth = r.read_wire()?;
        let link_quality_index = r.read_wire()?;

        Ok(Neighbor {
            extended_pan_id,
            extended_address,
            network_address,
            device_type,
            rx_on_while_idle,
            relationship,
            permit_joining,
            depth,
            link_quality_index,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RxOnWhileIdle {
    Off,
    On,
    Unknown,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NeighborRelationship {
    Parent,
    Child,
    Sibling,
    None,
    PreviousChild,
    Unknown(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PermitJoining {
    Accepting,
    NotAccepting,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Neighbor {
    pub extended_pan_id: u64,
    pub extended_address: ExtendedAddress,
    pub network_address: ShortAddress,
    pub device_type: LogicalType,
    pub rx_on_while_idle: RxOnWhileIdle,
    pub relationship: NeighborRelationship,
    pub permit_joining: PermitJoining,
    pub depth: u8,
    pub link_quality_index: u8,
}

#[derive(Debug)]
pub struct MgmtPermitJoiningRequest {
    /// Seconds; 0 closes the network, 0xFF opens it until told otherwise.
    pub permit_duration: u8,
    pub trust_center_significance: bool,
}

impl Request for MgmtPermitJoiningRequest {
    const CLUSTER_ID: ClusterId = 0x0036;

    type Response = MgmtPermitJoiningResponse;
}

impl WriteWire for MgmtPermitJoiningRequest {
    fn wire_len(&self) -> u16 {
        2
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_wire(&self.permit_duration)?;
        w.write_wire(&u8::from(self.trust_center_significance))
    }
}

#[derive(Debug)]
pub struct MgmtPermitJoiningResponse {
    pub status: u8,
}

impl Response for MgmtPermitJoiningResponse {
    const CLUSTER_ID: ClusterId = 0x8036;

    fn status(&self) -> u8 {
        self.status
    }
}

impl ReadWire for MgmtPermitJoiningResponse {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(MgmtPermitJoiningResponse {
            status: r.read_wire()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_node_descriptor() {
        let bytes = [
            0x00, 0x34, 0x12, // status, addr
            0x01, 0x40, 0x8E, 0x7C, 0x11, 0x52, 0x52, 0x00, 0x00, 0x2C, 0x52, 0x00, 0x00,
        ];
        let response: NodeDescResponse = Cursor::new(&bytes[..]).read_wire().unwrap();
        let descriptor = response.node_descriptor.unwrap();

        assert_eq!(response.addr, 0x1234);
        assert_eq!(descriptor.logical_type, LogicalType::Router);
        assert_eq!(descriptor.manufacturer_code, 0x117C);
        assert!(descriptor.mac_capabilities.mains_powered());
    }

    #[test]
    fn failed_descriptor_has_no_body() {
        let bytes = [0x81, 0x34, 0x12];
        let response: PowerDescResponse = Cursor::new(&bytes[..]).read_wire().unwrap();
        assert_eq!(response.status, 0x81);
        assert!(response.power_descriptor.is_none());
    }

    #[test]
    fn reads_simple_descriptor() {
        let bytes = [
            0x00, 0x34, 0x12, 0x0C, // status, addr, length
            0x01, 0x04, 0x01, 0x02, 0x01, 0x01, // endpoint, profile, device, version
            0x02, 0x00, 0x00, 0x06, 0x00, // two input clusters
            0x00, // no output clusters
        ];
        let response: SimpleDescResponse = Cursor::new(&bytes[..]).read_wire().unwrap();
        let descriptor = response.simple_descriptor.unwrap();

        assert_eq!(descriptor.endpoint, 1);
        assert_eq!(descriptor.profile, 0x0104);
        assert_eq!(descriptor.input_clusters, vec![0x0000, 0x0006]);
        assert!(descriptor.output_clusters.is_empty());
    }

    #[test]
    fn reads_neighbors() {
        let mut bytes = vec![0x00, 0x01, 0x00, 0x01];
        bytes.extend_from_slice(&0xDDDD_DDDD_DDDD_DDDDu64.to_le_bytes());
        bytes.extend_from_slice(&0x0012_4B00_0102_0304u64.to_le_bytes());
        bytes.extend_from_slice(&0x4B2Au16.to_le_bytes());
        bytes.extend_from_slice(&[0x75, 0x02, 0x01, 0xFF]);

        let response: MgmtLqiResponse = Cursor::new(&bytes[..]).read_wire().unwrap();
        let neighbor = &response.neighbor_table_list[0];

        assert_eq!(response.neighbor_table_entries, 1);
        assert_eq!(neighbor.network_address, 0x4B2A);
        assert_eq!(neighbor.device_type, LogicalType::Router);
        assert_eq!(neighbor.relationship, NeighborRelationship::Unknown(7));
        assert_eq!(neighbor.permit_joining, PermitJoining::Unknown);
        assert_eq!(neighbor.link_quality_index, 0xFF);
    }
}
