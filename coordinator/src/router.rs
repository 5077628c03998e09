use adapter::{ApsDataIndication, ExtendedAddress, RequestId};

use crate::node::NodeTable;
use crate::pending::PendingReplies;
use crate::zdo::{self, DeviceAnnounce};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// The ZDO response to the pending request with this ID.
    ZdoReply(RequestId),
    DeviceAnnounce(DeviceAnnounce),
    /// Application data from an initialized node.
    Node(ExtendedAddress),
    Dropped(Reason),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reason {
    Malformed,
    UnmatchedZdo,
    UnknownSource,
}

/// Decides where an incoming APS indication goes.
pub fn route(
    indication: &ApsDataIndication,
    pending: &PendingReplies,
    nodes: &NodeTable,
) -> Route {
    if zdo::is_zdo(indication) {
        return route_zdo(indication, pending);
    }

    let by_short = indication
        .source_address
        .short
        .and_then(|short_address| nodes.by_short(short_address));
    let by_ieee = indication
        .source_address
        .extended
        .and_then(|ieee_address| nodes.get(ieee_address));

    match by_short.or(by_ieee) {
        Some(node) => Route::Node(node.ieee_address),
        None => {
            warn!(
                "dropping indication from unknown node {:?} (profile {:#06x}, cluster {:#06x})",
                indication.source_address, indication.profile_id, indication.cluster_id
            );
            Route::Dropped(Reason::UnknownSource)
        }
    }
}

fn route_zdo(indication: &ApsDataIndication, pending: &PendingReplies) -> Route {
    if indication.cluster_id == DeviceAnnounce::CLUSTER_ID {
        return match zdo::parse_device_announce(indication) {
            Ok(announce) => Route::DeviceAnnounce(announce),
            Err(error) => {
                warn!("malformed device announce: {}", error);
                Route::Dropped(Reason::Malformed)
            }
        };
    }

    let header = match zdo::parse_header(indication) {
        Some(header) => header,
        None => {
            warn!("empty zdo frame on cluster {:#06x}", indication.cluster_id);
            return Route::Dropped(Reason::Malformed);
        }
    };

    match pending.find(|_, reply| reply.answered_by(indication, &header)) {
        Some(request_id) => Route::ZdoReply(request_id),
        None => {
            if indication.destination_address.is_broadcast() {
                debug!(
                    "dropping broadcast zdo cluster {:#06x} from {:?}",
                    indication.cluster_id, indication.source_address
                );
            } else {
                warn!(
                    "dropping unmatched zdo cluster {:#06x} (tsn {}) from {:?}",
                    indication.cluster_id, header.transaction_id, indication.source_address
                );
            }
            Route::Dropped(Reason::UnmatchedZdo)
        }
    }
}
