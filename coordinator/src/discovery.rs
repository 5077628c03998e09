use std::collections::{BTreeMap, BTreeSet, HashMap};

use adapter::{
    ApsDataIndication, ApsDataRequest, Destination, Endpoint, ExtendedAddress, ShortAddress,
};

use crate::node::Node;
use crate::zdo::{
    self, ActiveEpRequest, ActiveEpResponse, LogicalType, MacCapabilities, NodeDescRequest,
    NodeDescResponse, PowerDescRequest, PowerDescResponse, PowerDescriptor, SimpleDescRequest,
    SimpleDescResponse, SimpleDescriptor,
};
use crate::{Error, Result};

/// Distinguishes successive discovery runs of the same node.
pub type Generation = u64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Query {
    NodeDescriptor,
    PowerDescriptor,
    ActiveEndpoints,
    SimpleDescriptor(Endpoint),
}

impl Query {
    pub fn request(
        &self,
        addr: ShortAddress,
        transaction_id: zdo::TransactionId,
    ) -> Result<ApsDataRequest> {
        let destination = Destination::Nwk(addr, zdo::ENDPOINT);
        match *self {
            Query::NodeDescriptor => {
                zdo::aps_request(destination, transaction_id, &NodeDescRequest { addr })
            }
            Query::PowerDescriptor => {
                zdo::aps_request(destination, transaction_id, &PowerDescRequest { addr })
            }
            Query::ActiveEndpoints => {
                zdo::aps_request(destination, transaction_id, &ActiveEpRequest { addr })
            }
            Query::SimpleDescriptor(endpoint) => zdo::aps_request(
                destination,
                transaction_id,
                &SimpleDescRequest { addr, endpoint },
            ),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryStatus {
    Initializing,
    Initialized,
    Failed,
}

/// What has been learnt about a node so far.
#[derive(Clone, Debug)]
pub struct DiscoveryState {
    pub ieee_address: ExtendedAddress,
    pub short_address: ShortAddress,
    pub generation: Generation,
    pub query: Query,
    pub status: DiscoveryStatus,
    pub logical_type: Option<LogicalType>,
    pub mac_capabilities: MacCapabilities,
    pub manufacturer_code: u16,
    pub power_descriptor: Option<PowerDescriptor>,
    pub uninitialized_endpoints: BTreeSet<Endpoint>,
    pub endpoints: BTreeMap<Endpoint, SimpleDescriptor>,
}

impl DiscoveryState {
    fn into_node(self) -> Node {
        Node {
            ieee_address: self.ieee_address,
            short_address: self.short_address,
            logical_type: self.logical_type.unwrap_or(LogicalType::Unknown(0xFF)),
            mac_capabilities: self.mac_capabilities,
            manufacturer_code: self.manufacturer_code,
            power_descriptor: self.power_descriptor,
            endpoints: self.endpoints,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// Ask the node for the next piece of information.
    Query {
        ieee_address: ExtendedAddress,
        short_address: ShortAddress,
        generation: Generation,
        query: Query,
    },
    Initialized(Node),
    Failed {
        ieee_address: ExtendedAddress,
        short_address: ShortAddress,
        error: Error,
    },
}

/// Walks each new node through its descriptors, one query at a time.
///
/// Nodes are keyed by IEEE address. Announcing a node that is already being discovered starts it
/// over under a new generation; replies carrying an older generation are ignored.
#[derive(Debug, Default)]
pub struct DiscoveryPipeline {
    nodes: HashMap<ExtendedAddress, DiscoveryState>,
    next_generation: Generation,
}

impl DiscoveryPipeline {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn announce(
        &mut self,
        ieee_address: ExtendedAddress,
        short_address: ShortAddress,
        mac_capabilities: MacCapabilities,
    ) -> Outcome {
        self.next_generation += 1;
        let generation = self.next_generation;

        if let Some(previous) = self.nodes.get(&ieee_address) {
            info!(
                "restarting discovery of {:#018x} (was at {:?})",
                ieee_address, previous.query
            );
        } else {
            info!("discovering {:#018x} at {:#06x}", ieee_address, short_address);
        }

        self.nodes.insert(
            ieee_address,
            DiscoveryState {
                ieee_address,
                short_address,
                generation,
                query: Query::NodeDescriptor,
                status: DiscoveryStatus::Initializing,
                logical_type: None,
                mac_capabilities,
                manufacturer_code: 0,
                power_descriptor: None,
                uninitialized_endpoints: BTreeSet::new(),
                endpoints: BTreeMap::new(),
            },
        );

        Outcome::Query {
            ieee_address,
            short_address,
            generation,
            query: Query::NodeDescriptor,
        }
    }

    /// Feeds the reply to the outstanding query of `ieee_address`. Returns None for stale replies.
    pub fn on_reply(
        &mut self,
        ieee_address: ExtendedAddress,
        generation: Generation,
        result: Result<ApsDataIndication>,
    ) -> Option<Outcome> {
        let current = self.nodes.get(&ieee_address).map(|state| state.generation);
        if current != Some(generation) {
            debug!(
                "ignoring reply for {:#018x} generation {} (current {:?})",
                ieee_address, generation, current
            );
            return None;
        }

        let mut state = self.nodes.remove(&ieee_address)?;
        match advance(&mut state, result) {
            Ok(Some(query)) => {
                state.query = query;
                let outcome = Outcome::Query {
                    ieee_address,
                    short_address: state.short_address,
                    generation,
                    query,
                };
                self.nodes.insert(ieee_address, state);
                Some(outcome)
            }
            Ok(None) => {
                state.status = DiscoveryStatus::Initialized;
                info!(
                    "{:#018x} initialized with endpoints {:?}",
                    ieee_address,
                    state.endpoints.keys().collect::<Vec<_>>()
                );
                Some(Outcome::Initialized(state.into_node()))
            }
            Err(error) => {
                state.status = DiscoveryStatus::Failed;
                warn!(
                    "discovery of {:#018x} failed at {:?}: {}",
                    ieee_address, state.query, error
                );
                Some(Outcome::Failed {
                    ieee_address,
                    short_address: state.short_address,
                    error,
                })
            }
        }
    }

    pub fn state(&self, ieee_address: ExtendedAddress) -> Option<&DiscoveryState> {
        self.nodes.get(&ieee_address)
    }

    pub fn in_progress(&self, ieee_address: ExtendedAddress) -> bool {
        self.nodes.contains_key(&ieee_address)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn cancel(&mut self, ieee_address: ExtendedAddress) -> bool {
        self.nodes.remove(&ieee_address).is_some()
    }

    pub fn clear(&mut self) {
        if !self.nodes.is_empty() {
            info!("cancelling discovery of {} nodes", self.nodes.len());
        }
        self.nodes.clear();
    }
}

/// Applies a reply to `state`, returning the next query or None when discovery is complete.
fn advance(
    state: &mut DiscoveryState,
    result: Result<ApsDataIndication>,
) -> Result<Option<Query>> {
    let indication = result?;

    match state.query {
        Query::NodeDescriptor => {
            let response: NodeDescResponse = zdo::parse_response(&indication)?;
            if let Some(descriptor) = response.node_descriptor {
                state.logical_type = Some(descriptor.logical_type);
                state.mac_capabilities = descriptor.mac_capabilities;
                state.manufacturer_code = descriptor.manufacturer_code;
            }
            Ok(Some(Query::PowerDescriptor))
        }
        Query::PowerDescriptor => {
            let response: PowerDescResponse = zdo::parse_response(&indication)?;
            state.power_descriptor = response.power_descriptor;
            Ok(Some(Query::ActiveEndpoints))
        }
        Query::ActiveEndpoints => {
            let response: ActiveEpResponse = zdo::parse_response(&indication)?;
            state.uninitialized_endpoints = response.active_endpoints.into_iter().collect();
            Ok(next_endpoint(state))
        }
        Query::SimpleDescriptor(endpoint) => {
            let response: SimpleDescResponse = zdo::parse_response(&indication)?;
            state.uninitialized_endpoints.remove(&endpoint);
            if let Some(descriptor) = response.simple_descriptor {
                state.endpoints.insert(endpoint, descriptor);
            }
            Ok(next_endpoint(state))
        }
    }
}

fn next_endpoint(state: &DiscoveryState) -> Option<Query> {
    state
        .uninitialized_endpoints
        .iter()
        .next()
        .map(|endpoint| Query::SimpleDescriptor(*endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use adapter::{ClusterId, DestinationAddress, SourceAddress};

    const IEEE: ExtendedAddress = 0x0012_4B00_0102_0304;
    const ADDR: ShortAddress = 0x4B2A;

    fn reply(cluster_id: ClusterId, body: &[u8]) -> Result<ApsDataIndication> {
        let mut asdu = vec![0x01];
        asdu.extend_from_slice(body);
        Ok(ApsDataIndication {
            destination_address: DestinationAddress::Nwk(0x0000),
            destination_endpoint: 0,
            source_address: SourceAddress {
                short: Some(ADDR),
                extended: None,
            },
            source_endpoint: 0,
            profile_id: 0,
            cluster_id,
            asdu,
        })
    }

    fn node_descriptor() -> Result<ApsDataIndication> {
        reply(
            0x8002,
            &[
                0x00, 0x2A, 0x4B, 0x02, 0x40, 0x80, 0x5F, 0x11, 0x52, 0x52, 0x00, 0x00, 0x2C, 0x52,
                0x00, 0x00,
            ],
        )
    }

    fn power_descriptor() -> Result<ApsDataIndication> {
        reply(0x8003, &[0x00, 0x2A, 0x4B, 0x10, 0xC2])
    }

    fn active_endpoints(endpoints: &[u8]) -> Result<ApsDataIndication> {
        let mut body = vec![0x00, 0x2A, 0x4B, endpoints.len() as u8];
        body.extend_from_slice(endpoints);
        reply(0x8005, &body)
    }

    fn simple_descriptor(endpoint: u8) -> Result<ApsDataIndication> {
        reply(
            0x8004,
            &[
                0x00, 0x2A, 0x4B, 0x0A, endpoint, 0x04, 0x01, 0x02, 0x01, 0x01, 0x01, 0x06, 0x00,
                0x00,
            ],
        )
    }

    fn expect_query(outcome: Option<Outcome>) -> (Generation, Query) {
        match outcome {
            Some(Outcome::Query {
                generation, query, ..
            }) => (generation, query),
            other => panic!("expected query, got {:?}", other),
        }
    }

    #[test]
    fn walks_descriptors_in_order() {
        let mut pipeline = DiscoveryPipeline::new();
        let generation = match pipeline.announce(IEEE, ADDR, MacCapabilities(0x80)) {
            Outcome::Query {
                generation,
                query: Query::NodeDescriptor,
                ..
            } => generation,
            other => panic!("unexpected {:?}", other),
        };

        let (_, query) = expect_query(pipeline.on_reply(IEEE, generation, node_descriptor()));
        assert_eq!(query, Query::PowerDescriptor);
        let (_, query) = expect_query(pipeline.on_reply(IEEE, generation, power_descriptor()));
        assert_eq!(query, Query::ActiveEndpoints);
        let (_, query) =
            expect_query(pipeline.on_reply(IEEE, generation, active_endpoints(&[0x0B, 0x01])));
        assert_eq!(query, Query::SimpleDescriptor(0x01));
        let (_, query) = expect_query(pipeline.on_reply(IEEE, generation, simple_descriptor(1)));
        assert_eq!(query, Query::SimpleDescriptor(0x0B));

        match pipeline.on_reply(IEEE, generation, simple_descriptor(0x0B)) {
            Some(Outcome::Initialized(node)) => {
                assert_eq!(node.logical_type, LogicalType::EndDevice);
                assert_eq!(node.manufacturer_code, 0x115F);
                assert_eq!(node.endpoints.keys().copied().collect::<Vec<_>>(), vec![1, 0x0B]);
                assert!(node.power_descriptor.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(pipeline.is_empty());
    }

    #[test]
    fn zero_endpoints_completes() {
        let mut pipeline = DiscoveryPipeline::new();
        pipeline.announce(IEEE, ADDR, MacCapabilities(0x80));
        let generation = pipeline.state(IEEE).unwrap().generation;

        pipeline.on_reply(IEEE, generation, node_descriptor());
        pipeline.on_reply(IEEE, generation, power_descriptor());
        let outcome = pipeline.on_reply(IEEE, generation, active_endpoints(&[]));
        assert!(matches!(outcome, Some(Outcome::Initialized(_))));
    }

    #[test]
    fn reannounce_restarts_and_ignores_stale_replies() {
        let mut pipeline = DiscoveryPipeline::new();
        pipeline.announce(IEEE, ADDR, MacCapabilities(0x80));
        let old = pipeline.state(IEEE).unwrap().generation;
        pipeline.on_reply(IEEE, old, node_descriptor());
        assert_eq!(pipeline.state(IEEE).unwrap().query, Query::PowerDescriptor);

        let (new, query) = match pipeline.announce(IEEE, 0x1111, MacCapabilities(0x80)) {
            Outcome::Query {
                generation, query, ..
            } => (generation, query),
            other => panic!("unexpected {:?}", other),
        };
        assert_ne!(old, new);
        assert_eq!(query, Query::NodeDescriptor);

        assert!(pipeline.on_reply(IEEE, old, power_descriptor()).is_none());
        assert_eq!(pipeline.state(IEEE).unwrap().query, Query::NodeDescriptor);
        assert_eq!(pipeline.state(IEEE).unwrap().short_address, 0x1111);
    }

    #[test]
    fn failing_step_fails_node() {
        let mut pipeline = DiscoveryPipeline::new();
        pipeline.announce(IEEE, ADDR, MacCapabilities(0x80));
        let generation = pipeline.state(IEEE).unwrap().generation;

        let outcome = pipeline.on_reply(IEEE, generation, Err(ErrorKind::Timeout.into()));
        match outcome {
            Some(Outcome::Failed { ieee_address, .. }) => assert_eq!(ieee_address, IEEE),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!pipeline.in_progress(IEEE));
    }

    #[test]
    fn query_requests_address_node() {
        let request = Query::SimpleDescriptor(1).request(ADDR, 7).unwrap();
        assert_eq!(request.destination, Destination::Nwk(ADDR, 0));
        assert_eq!(request.cluster_id, 0x0004);
        assert_eq!(request.asdu, vec![0x07, 0x2A, 0x4B, 0x01]);
    }
}
