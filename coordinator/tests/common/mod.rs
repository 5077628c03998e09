#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use adapter::{
    AdapterStatus, ApsDataConfirm, ApsDataIndication, ApsDataRequest, Codec, ClusterId,
    DeconzDialect, DestinationAddress, DeviceState, ExtendedAddress, Frame, NetworkState,
    Parameter, ParameterId, Platform, Request, RequestId, Response, ShortAddress, SlipCodec,
    SourceAddress, Version,
};
use coordinator::{Config, Engine, Event, MemoryStore};
use tokio::time::Instant;

pub const ADAPTER_IEEE: ExtendedAddress = 0x00212EFFFF0012AB;
pub const NODE_IEEE: ExtendedAddress = 0x000B57FFFE2C1A33;
pub const NODE_ADDR: ShortAddress = 0x4B2A;

/// A deCONZ adapter that answers whatever the engine sends, from its own state.
pub struct FakeAdapter {
    codec: Box<dyn Codec>,
    sequence: u8,
    pub network_state: NetworkState,
    pub parameters: HashMap<ParameterId, Parameter>,
    pub fail_writes: HashSet<ParameterId>,
    pub indications: VecDeque<ApsDataIndication>,
    pub confirms: VecDeque<(RequestId, ApsDataConfirm)>,
    /// Status of the confirm queued for each APS request; None sends no confirm at all.
    pub confirm_status: Option<u8>,
    pub free_slots: bool,
    /// Swallow requests without answering.
    pub silent: bool,
    pub requests: Vec<Request>,
    pub sent: Vec<(RequestId, ApsDataRequest)>,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self::with_codec(Box::new(SlipCodec::new()))
    }

    pub fn with_codec(codec: Box<dyn Codec>) -> Self {
        let parameters = [
            Parameter::MacAddress(ADAPTER_IEEE),
            Parameter::NwkAddress(0x0000),
            Parameter::NwkPanId(0x1A62),
            Parameter::NwkExtendedPanId(ADAPTER_IEEE),
            Parameter::ApsDesignatedCoordinator(1),
            Parameter::ChannelMask(0x0210_8800),
            Parameter::ApsExtendedPanId(0),
            Parameter::SecurityMode(3),
            Parameter::CurrentChannel(15),
            Parameter::ProtocolVersion(0x0107),
        ]
        .iter()
        .map(|parameter| (parameter.id(), *parameter))
        .collect();

        Self {
            codec,
            sequence: 0x80,
            network_state: NetworkState::Offline,
            parameters,
            fail_writes: HashSet::new(),
            indications: VecDeque::new(),
            confirms: VecDeque::new(),
            confirm_status: Some(0x00),
            free_slots: true,
            silent: false,
            requests: Vec::new(),
            sent: Vec::new(),
        }
    }

    pub fn device_state(&self) -> DeviceState {
        DeviceState {
            network_state: self.network_state,
            data_confirm: !self.confirms.is_empty(),
            data_indication: !self.indications.is_empty(),
            data_request_free_slots: self.free_slots,
            configuration_changed: false,
        }
    }

    /// Feeds bytes written by the engine, returning the adapter's replies.
    pub fn handle(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for frame in self.codec.decode(bytes) {
            let frame = frame.expect("engine sent a malformed frame");
            let request = DeconzDialect
                .decode_request(&frame)
                .expect("engine sent an unknown request");
            self.requests.push(request.clone());
            if self.silent {
                continue;
            }
            let reply = self.respond(request, &frame);
            out.extend(self.codec.encode(&reply).unwrap());
        }
        out
    }

    fn respond(&mut self, request: Request, frame: &Frame) -> Frame {
        let failed = |status| {
            Frame::new(frame.command, frame.sequence_id, Vec::new()).with_status(status)
        };

        let response = match request {
            Request::Version => Response::Version {
                version: Version {
                    major: 0x26,
                    minor: 0x72,
                },
                platform: Platform::Arm,
            },
            Request::ReadParameter { parameter_id } => match self.parameters.get(&parameter_id) {
                Some(parameter) => Response::Parameter(*parameter),
                None => return failed(AdapterStatus::Unsupported),
            },
            Request::WriteParameter { parameter } => {
                if self.fail_writes.contains(&parameter.id()) {
                    return failed(AdapterStatus::Failure);
                }
                self.parameters.insert(parameter.id(), parameter);
                Response::WriteParameter(parameter.id())
            }
            Request::DeviceState => Response::DeviceState(self.device_state()),
            Request::ChangeNetworkState(state) => {
                self.network_state = state;
                Response::ChangeNetworkState(state)
            }
            Request::ApsDataIndication => match self.indications.pop_front() {
                Some(aps_data_indication) => Response::ApsDataIndication {
                    device_state: self.device_state(),
                    aps_data_indication,
                },
                None => return failed(AdapterStatus::Error),
            },
            Request::ApsDataConfirm => match self.confirms.pop_front() {
                Some((request_id, aps_data_confirm)) => Response::ApsDataConfirm {
                    device_state: self.device_state(),
                    request_id,
                    aps_data_confirm,
                },
                None => return failed(AdapterStatus::Error),
            },
            Request::ApsDataRequest(request_id, request) => {
                if let Some(status) = self.confirm_status {
                    let confirm = ApsDataConfirm {
                        destination: request.destination,
                        source_endpoint: request.source_endpoint,
                        status,
                    };
                    self.confirms.push_back((request_id, confirm));
                }
                self.sent.push((request_id, request));
                Response::ApsDataRequest {
                    device_state: self.device_state(),
                    request_id,
                }
            }
        };

        let (command, payload) = DeconzDialect.encode_response(&response).unwrap();
        Frame::new(command, frame.sequence_id, payload)
    }

    /// The unsolicited device state frame the adapter sends when data is waiting.
    pub fn notify(&mut self) -> Vec<u8> {
        self.sequence = self.sequence.wrapping_add(1);
        let response = Response::DeviceStateChanged(self.device_state());
        let (command, payload) = DeconzDialect.encode_response(&response).unwrap();
        self.codec
            .encode(&Frame::new(command, self.sequence, payload))
            .unwrap()
    }

    pub fn last_sent(&self) -> &ApsDataRequest {
        &self.sent.last().expect("nothing sent").1
    }

    /// IDs of the parameters written, in order.
    pub fn writes(&self) -> Vec<ParameterId> {
        self.requests
            .iter()
            .filter_map(|request| match request {
                Request::WriteParameter { parameter } => Some(parameter.id()),
                _ => None,
            })
            .collect()
    }
}

pub fn zdo_indication(source: ShortAddress, cluster_id: ClusterId, asdu: Vec<u8>) -> ApsDataIndication {
    ApsDataIndication {
        destination_address: DestinationAddress::Nwk(0x0000),
        destination_endpoint: 0,
        source_address: SourceAddress {
            short: Some(source),
            extended: None,
        },
        source_endpoint: 0,
        profile_id: 0,
        cluster_id,
        asdu,
    }
}

pub fn device_announce(ieee_address: ExtendedAddress, short_address: ShortAddress) -> ApsDataIndication {
    let mut asdu = vec![0x81];
    asdu.extend_from_slice(&short_address.to_le_bytes());
    asdu.extend_from_slice(&ieee_address.to_le_bytes());
    asdu.push(0x8E);
    let mut indication = zdo_indication(short_address, 0x0013, asdu);
    indication.destination_address = DestinationAddress::Nwk(0xFFFD);
    indication
}

pub fn on_off_report(source: ShortAddress) -> ApsDataIndication {
    ApsDataIndication {
        destination_address: DestinationAddress::Nwk(0x0000),
        destination_endpoint: 1,
        source_address: SourceAddress {
            short: Some(source),
            extended: None,
        },
        source_endpoint: 1,
        profile_id: 0x0104,
        cluster_id: 0x0006,
        asdu: vec![0x18, 0x01, 0x0A, 0x00, 0x00, 0x10, 0x01],
    }
}

pub fn node_descriptor_body(addr: ShortAddress) -> Vec<u8> {
    let [lo, hi] = addr.to_le_bytes();
    vec![
        0x00, lo, hi, 0x02, 0x40, 0x80, 0x5F, 0x11, 0x52, 0x52, 0x00, 0x00, 0x2C, 0x52, 0x00, 0x00,
    ]
}

pub fn power_descriptor_body(addr: ShortAddress) -> Vec<u8> {
    let [lo, hi] = addr.to_le_bytes();
    vec![0x00, lo, hi, 0x10, 0xC2]
}

pub fn active_endpoints_body(addr: ShortAddress, endpoints: &[u8]) -> Vec<u8> {
    let [lo, hi] = addr.to_le_bytes();
    let mut body = vec![0x00, lo, hi, endpoints.len() as u8];
    body.extend_from_slice(endpoints);
    body
}

pub fn simple_descriptor_body(addr: ShortAddress, endpoint: u8) -> Vec<u8> {
    let [lo, hi] = addr.to_le_bytes();
    vec![
        0x00, lo, hi, 0x0A, endpoint, 0x04, 0x01, 0x02, 0x01, 0x01, 0x01, 0x06, 0x00, 0x00,
    ]
}

/// An engine wired to a `FakeAdapter`, with a clock the test moves by hand.
pub struct Harness {
    pub engine: Engine,
    pub adapter: FakeAdapter,
    pub store: MemoryStore,
    pub now: Instant,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Config::default(), MemoryStore::new())
    }

    pub fn with_store(config: Config, store: MemoryStore) -> Self {
        let _ = pretty_env_logger::try_init();
        Self {
            engine: Engine::new(&config, Box::new(store.clone())),
            adapter: FakeAdapter::new(),
            store,
            now: Instant::now(),
        }
    }

    /// Both ends framed by codecs built with `codec`.
    pub fn with_codec<F>(codec: F) -> Self
    where
        F: Fn() -> Box<dyn Codec>,
    {
        let _ = pretty_env_logger::try_init();
        let store = MemoryStore::new();
        Self {
            engine: Engine::with_backend(
                &Config::default(),
                Box::new(store.clone()),
                codec(),
                Box::new(DeconzDialect),
            ),
            adapter: FakeAdapter::with_codec(codec()),
            store,
            now: Instant::now(),
        }
    }

    /// Opens the link and lets bring-up run to completion.
    pub fn start(&mut self) {
        self.engine.transport_available(true, self.now);
        self.run_for(Duration::from_secs(10));
        assert!(
            self.engine.configuration().is_some(),
            "network did not start"
        );
    }

    /// Shuttles frames between engine and adapter until the engine has nothing to send.
    pub fn pump(&mut self) {
        for _ in 0..10_000 {
            let bytes = match self.engine.poll_transmit(self.now) {
                Some(bytes) => bytes,
                None => return,
            };
            let reply = self.adapter.handle(&bytes);
            if !reply.is_empty() {
                self.engine.handle_bytes(&reply, self.now);
            }
        }
        panic!("engine never went quiet");
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
        self.engine.handle_timers(self.now);
        self.pump();
    }

    /// Fires every timer due within `limit`, pumping in between.
    pub fn run_for(&mut self, limit: Duration) {
        let end = self.now + limit;
        self.pump();
        for _ in 0..10_000 {
            match self.engine.next_deadline() {
                Some(deadline) if deadline <= end => {
                    self.now = self.now.max(deadline);
                    self.engine.handle_timers(self.now);
                    self.pump();
                }
                _ => {
                    self.now = end;
                    return;
                }
            }
        }
        panic!("timers never settled");
    }

    /// Makes the adapter announce its queued data.
    pub fn notify(&mut self) {
        let bytes = self.adapter.notify();
        self.engine.handle_bytes(&bytes, self.now);
        self.pump();
    }

    /// Queues a ZDO response to the last request the adapter saw.
    pub fn answer(&mut self, cluster_id: ClusterId, body: Vec<u8>) {
        let transaction_id = self.adapter.last_sent().asdu[0];
        self.answer_with(transaction_id, cluster_id, body);
    }

    pub fn answer_with(&mut self, transaction_id: u8, cluster_id: ClusterId, body: Vec<u8>) {
        let mut asdu = vec![transaction_id];
        asdu.extend(body);
        self.adapter
            .indications
            .push_back(zdo_indication(NODE_ADDR, cluster_id, asdu));
        self.notify();
    }

    pub fn events(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.engine.poll_event()).collect()
    }

    /// Requests the adapter saw since `from`.
    pub fn requests_since(&self, from: usize) -> &[Request] {
        &self.adapter.requests[from..]
    }
}
