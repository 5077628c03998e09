pub mod protocol;

use std::io::Cursor;

use adapter::{
    ApsDataIndication, ApsDataRequest, ClusterId, Destination, Endpoint, ProfileId, ReadWire,
    ReadWireExt, ShortAddress, TxOptions, WriteWire, WriteWireExt,
};

use crate::{ErrorKind, Result};

pub use self::protocol::{
    ActiveEpRequest, ActiveEpResponse, DeviceAnnounce, LogicalType, MacCapabilities,
    MgmtLqiRequest, MgmtLqiResponse, MgmtPermitJoiningRequest, MgmtPermitJoiningResponse,
    Neighbor, NodeDescRequest, NodeDescResponse, NodeDescriptor, PowerDescRequest,
    PowerDescResponse, PowerDescriptor, SimpleDescRequest, SimpleDescResponse, SimpleDescriptor,
};

/// ZDO transaction sequence number, the first byte of every ZDO frame.
pub type TransactionId = u8;

pub const PROFILE_ID: ProfileId = 0x0000;
pub const ENDPOINT: Endpoint = 0x00;

/// Response clusters are the request cluster with the top bit set.
pub const RESPONSE_BIT: ClusterId = 0x8000;

pub trait Request: WriteWire {
    const CLUSTER_ID: ClusterId;

    type Response: Response;

    /// The node the request asks about, echoed back in the response.
    fn address_of_interest(&self) -> Option<ShortAddress> {
        None
    }
}

pub trait Response: ReadWire {
    const CLUSTER_ID: ClusterId;

    fn status(&self) -> u8;
}

pub fn make_frame<R>(id: TransactionId, request: &R) -> Result<Vec<u8>>
where
    R: Request,
{
    let mut frame = Vec::with_capacity(usize::from(request.wire_len()) + 1);
    frame.write_wire(&id)?;
    frame.write_wire(request)?;
    Ok(frame)
}

pub fn aps_request<R>(
    destination: Destination,
    id: TransactionId,
    request: &R,
) -> Result<ApsDataRequest>
where
    R: Request,
{
    Ok(ApsDataRequest {
        destination,
        profile_id: PROFILE_ID,
        cluster_id: R::CLUSTER_ID,
        source_endpoint: ENDPOINT,
        asdu: make_frame(id, request)?,
        tx_options: TxOptions::default(),
        radius: 0,
    })
}

/// The ZDO frame header fields needed to correlate a response with its request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub transaction_id: TransactionId,
    pub address_of_interest: Option<ShortAddress>,
}

/// Peeks at the header of a ZDO indication without decoding the body.
pub fn parse_header(indication: &ApsDataIndication) -> Option<Header> {
    let transaction_id = *indication.asdu.first()?;

    // Descriptor and endpoint responses echo the address after the status byte.
    let address_of_interest = match indication.cluster_id {
        0x8000..=0x8005 if indication.asdu.len() >= 4 => {
            Some(u16::from_le_bytes([indication.asdu[2], indication.asdu[3]]))
        }
        _ => None,
    };

    Some(Header {
        transaction_id,
        address_of_interest,
    })
}

pub fn is_zdo(indication: &ApsDataIndication) -> bool {
    indication.profile_id == PROFILE_ID && indication.destination_endpoint == ENDPOINT
}

/// Decodes the body of a ZDO response, turning a non-success status into an error.
pub fn parse_response<R>(indication: &ApsDataIndication) -> Result<R>
where
    R: Response,
{
    if indication.cluster_id != R::CLUSTER_ID {
        return Err(ErrorKind::UnexpectedCluster(indication.cluster_id).into());
    }

    // Skip tx_id
    let body = indication.asdu.get(1..).unwrap_or(&[]);
    let response: R = Cursor::new(body).read_wire()?;

    match response.status() {
        0 => Ok(response),
        status => Err(ErrorKind::ZdoStatus(status).into()),
    }
}

pub fn parse_device_announce(indication: &ApsDataIndication) -> Result<DeviceAnnounce> {
    let body = indication.asdu.get(1..).unwrap_or(&[]);
    Ok(Cursor::new(body).read_wire()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapter::{DestinationAddress, SourceAddress};

    fn indication(cluster_id: ClusterId, asdu: Vec<u8>) -> ApsDataIndication {
        ApsDataIndication {
            destination_address: DestinationAddress::Nwk(0x0000),
            destination_endpoint: ENDPOINT,
            source_address: SourceAddress {
                short: Some(0x1234),
                extended: None,
            },
            source_endpoint: ENDPOINT,
            profile_id: PROFILE_ID,
            cluster_id,
            asdu,
        }
    }

    #[test]
    fn frames_carry_transaction_id() {
        let destination = Destination::Nwk(0x1234, 0);
        let request = aps_request(destination, 9, &ActiveEpRequest { addr: 0x1234 }).unwrap();
        assert_eq!(request.cluster_id, 0x0005);
        assert_eq!(request.asdu, vec![0x09, 0x34, 0x12]);
    }

    #[test]
    fn header_includes_address_of_interest() {
        let response = indication(0x8005, vec![0x09, 0x00, 0x34, 0x12, 0x00]);
        let header = parse_header(&response).unwrap();
        assert_eq!(header.transaction_id, 9);
        assert_eq!(header.address_of_interest, Some(0x1234));

        let header = parse_header(&indication(0x8031, vec![0x0A, 0x00])).unwrap();
        assert_eq!(header.address_of_interest, None);
    }

    #[test]
    fn zdo_status_is_an_error() {
        let response = indication(0x8005, vec![0x09, 0x80, 0x34, 0x12]);
        let error = parse_response::<ActiveEpResponse>(&response).unwrap_err();
        assert!(matches!(error.kind, ErrorKind::ZdoStatus(0x80)));
    }

    #[test]
    fn parses_device_announce() {
        let announce = DeviceAnnounce {
            addr: 0x4B2A,
            ieee: 0x0012_4B00_0102_0304,
            capabilities: MacCapabilities(0x8E),
        };
        let mut asdu = vec![0x81];
        asdu.write_wire(&announce).unwrap();

        assert_eq!(
            parse_device_announce(&indication(DeviceAnnounce::CLUSTER_ID, asdu)).unwrap(),
            announce
        );
    }
}
