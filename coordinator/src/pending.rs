use adapter::{
    ApsDataConfirm, ApsDataIndication, ClusterId, Destination, ExtendedAddress, ProfileId,
    RequestId, ShortAddress,
};
use coordinator_helpers::awaiting;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::discovery::Generation;
use crate::zdo;
use crate::Result;

/// Whoever is interested in the outcome of an APS request.
#[derive(Debug)]
pub enum Waiter {
    /// Resolved by the data confirm.
    Confirm(oneshot::Sender<Result<ApsDataConfirm>>),
    /// Resolved by the ZDO response.
    Zdo(oneshot::Sender<Result<ApsDataIndication>>),
    /// A step of node discovery.
    Discovery {
        ieee_address: ExtendedAddress,
        generation: Generation,
    },
}

/// Identifies the ZDO response that answers a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ZdoMatch {
    pub transaction_id: zdo::TransactionId,
    pub address_of_interest: Option<ShortAddress>,
}

/// An APS request accepted for sending that has not been resolved yet.
#[derive(Debug)]
pub struct PendingReply {
    pub destination: Destination,
    pub profile_id: ProfileId,
    pub cluster_id: ClusterId,
    pub zdo: Option<ZdoMatch>,
    /// Set once the adapter confirmed delivery.
    pub confirmed: bool,
    pub deadline: Instant,
    pub waiter: Waiter,
}

impl PendingReply {
    /// Whether `indication`, with ZDO header `header`, is the response to this request.
    pub fn answered_by(&self, indication: &ApsDataIndication, header: &zdo::Header) -> bool {
        let zdo_match = match self.zdo {
            Some(zdo_match) => zdo_match,
            None => return false,
        };

        if indication.cluster_id != self.cluster_id | zdo::RESPONSE_BIT
            || header.transaction_id != zdo_match.transaction_id
        {
            return false;
        }

        match (zdo_match.address_of_interest, header.address_of_interest) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => true,
        }
    }
}

pub type PendingReplies = awaiting::Awaiting<RequestId, PendingReply>;

#[cfg(test)]
mod tests {
    use super::*;
    use adapter::{DestinationAddress, SourceAddress};

    fn pending(transaction_id: u8, address_of_interest: Option<ShortAddress>) -> PendingReply {
        PendingReply {
            destination: Destination::Nwk(0x4B2A, 0),
            profile_id: 0,
            cluster_id: 0x0005,
            zdo: Some(ZdoMatch {
                transaction_id,
                address_of_interest,
            }),
            confirmed: false,
            deadline: Instant::now(),
            waiter: Waiter::Discovery {
                ieee_address: 1,
                generation: 1,
            },
        }
    }

    fn response(cluster_id: ClusterId, asdu: Vec<u8>) -> ApsDataIndication {
        ApsDataIndication {
            destination_address: DestinationAddress::Nwk(0),
            destination_endpoint: 0,
            source_address: SourceAddress {
                short: Some(0x4B2A),
                extended: None,
            },
            source_endpoint: 0,
            profile_id: 0,
            cluster_id,
            asdu,
        }
    }

    fn check(pending: &PendingReply, indication: &ApsDataIndication) -> bool {
        let header = zdo::parse_header(indication).unwrap();
        pending.answered_by(indication, &header)
    }

    #[test]
    fn matches_cluster_transaction_and_address() {
        let pending = pending(7, Some(0x4B2A));
        assert!(check(&pending, &response(0x8005, vec![7, 0, 0x2A, 0x4B, 0])));
        assert!(!check(&pending, &response(0x8005, vec![8, 0, 0x2A, 0x4B, 0])));
        assert!(!check(&pending, &response(0x8004, vec![7, 0, 0x2A, 0x4B, 0])));
        assert!(!check(&pending, &response(0x8005, vec![7, 0, 0x11, 0x11, 0])));
    }

    #[test]
    fn plain_aps_requests_never_match() {
        let mut pending = pending(7, None);
        pending.zdo = None;
        assert!(!check(&pending, &response(0x8005, vec![7, 0, 0x2A, 0x4B, 0])));
    }

    #[test]
    fn registry_refuses_live_request_id() {
        let mut replies = PendingReplies::new();
        assert!(replies.register(1, pending(1, None)).is_ok());
        assert!(replies.register(1, pending(2, None)).is_err());
    }
}
