use std::collections::VecDeque;

use adapter::{
    Action, ApsDataConfirm, ApsDataIndication, ApsDataRequest, Codec, Completion, DeconzDialect,
    Dialect, Dispatcher, Drain, ExtendedAddress, Frame, NetworkState, Priority, Request, RequestId,
    Response, Sequencer, ShortAddress, SlipCodec,
};
use coordinator_helpers::{reply, IncrementingId};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::bringup::{BringUp, CommissioningState, Directive, Goal};
use crate::config::{Config, Policy};
use crate::discovery::{DiscoveryPipeline, Outcome};
use crate::network::NetworkConfiguration;
use crate::node::{Node, NodeStore, NodeTable};
use crate::pending::{PendingReplies, PendingReply, Waiter, ZdoMatch};
use crate::router::{self, Route};
use crate::zdo::{self, DeviceAnnounce};
use crate::{Error, ErrorKind, Result};

/// A request from a `Coordinator` handle.
#[derive(Debug)]
pub enum Command {
    /// Resolved by the adapter's data confirm. ZDO frames get their transaction ID filled in.
    SendApsData {
        request: ApsDataRequest,
        sender: oneshot::Sender<Result<ApsDataConfirm>>,
    },
    /// Resolved by the ZDO response. The first byte of the frame is overwritten with the
    /// transaction ID.
    Zdo {
        request: ApsDataRequest,
        address_of_interest: Option<ShortAddress>,
        sender: oneshot::Sender<Result<ApsDataIndication>>,
    },
    /// A request answered by the adapter itself.
    Adapter {
        request: Request,
        sender: oneshot::Sender<Result<Response>>,
    },
    StartNetwork(oneshot::Sender<Result<()>>),
    StopNetwork(oneshot::Sender<Result<()>>),
    ResetController(oneshot::Sender<Result<()>>),
    FactoryReset(oneshot::Sender<Result<()>>),
    Nodes(oneshot::Sender<Vec<Node>>),
}

/// Notifications about the network and its nodes.
#[derive(Debug)]
pub enum Event {
    NetworkStateChanged(NetworkState),
    NetworkStarted(NetworkConfiguration),
    NetworkStopped,
    NetworkFailed(String),
    AdapterDisconnected,
    NodeAnnounced {
        ieee_address: ExtendedAddress,
        short_address: ShortAddress,
    },
    NodeJoined(Node),
    /// A node whose short address was taken over by another device.
    NodeLeft {
        ieee_address: ExtendedAddress,
        short_address: ShortAddress,
    },
    NodeDiscoveryFailed {
        ieee_address: ExtendedAddress,
        short_address: ShortAddress,
        error: Error,
    },
    /// Application data from an initialized node.
    Indication {
        ieee_address: ExtendedAddress,
        indication: ApsDataIndication,
    },
}

/// What to do with the outcome of a transaction.
#[derive(Debug)]
enum Continuation {
    Caller(oneshot::Sender<Result<Response>>),
    Read(Drain),
    ApsSend(RequestId),
    BringUp(u64),
}

/// The whole coordinator, minus I/O.
///
/// Every input (received bytes, commands, timer ticks, transport availability) is a method call
/// taking the current time. Bytes to write come out of `poll_transmit` and notifications out of
/// `poll_event`; the owner sleeps until `next_deadline` and then calls `handle_timers`.
pub struct Engine {
    policy: Policy,
    codec: Box<dyn Codec>,
    dialect: Box<dyn Dialect>,
    sequencer: Sequencer<Continuation>,
    dispatcher: Dispatcher,
    bringup: BringUp,
    goal: Goal,
    network_waiter: Option<oneshot::Sender<Result<()>>>,
    poll_deadline: Option<Instant>,
    configuration: Option<NetworkConfiguration>,
    discovery: DiscoveryPipeline,
    nodes: NodeTable,
    store: Box<dyn NodeStore>,
    pending: PendingReplies,
    outbound: VecDeque<(RequestId, ApsDataRequest)>,
    request_ids: IncrementingId,
    zdo_transaction_ids: IncrementingId,
    events: VecDeque<Event>,
    reconnect: bool,
}

impl Engine {
    /// An engine for a deCONZ adapter.
    pub fn new(config: &Config, store: Box<dyn NodeStore>) -> Self {
        Self::with_backend(
            config,
            store,
            Box::new(SlipCodec::new()),
            Box::new(DeconzDialect),
        )
    }

    pub fn with_backend(
        config: &Config,
        mut store: Box<dyn NodeStore>,
        codec: Box<dyn Codec>,
        dialect: Box<dyn Dialect>,
    ) -> Self {
        let mut nodes = NodeTable::new();
        match store.load_nodes() {
            Ok(loaded) => {
                info!("loaded {} nodes", loaded.len());
                for node in loaded {
                    nodes.insert(node);
                }
            }
            Err(error) => error!("loading nodes: {}", error),
        }

        let mut bringup = BringUp::new(config.network.clone(), config.policy.clone());
        match store.load_network() {
            Ok(stored) => bringup.set_stored(stored),
            Err(error) => error!("loading network: {}", error),
        }

        Self {
            policy: config.policy.clone(),
            codec,
            dialect,
            sequencer: Sequencer::new(),
            dispatcher: Dispatcher::new(),
            bringup,
            goal: Goal::Run,
            network_waiter: None,
            poll_deadline: None,
            configuration: None,
            discovery: DiscoveryPipeline::new(),
            nodes,
            store,
            pending: PendingReplies::new(),
            outbound: VecDeque::new(),
            request_ids: IncrementingId::new(),
            zdo_transaction_ids: IncrementingId::new(),
            events: VecDeque::new(),
            reconnect: false,
        }
    }

    pub fn transport_available(&mut self, available: bool, now: Instant) {
        if available == self.sequencer.is_available() {
            return;
        }

        if available {
            self.sequencer.on_transport_availability_changed(true);
            let directives = self.bringup.start(self.goal);
            self.apply_directives(directives, now);
        } else {
            self.bringup.abort();
            self.poll_deadline = None;
            self.sequencer.on_transport_availability_changed(false);
            self.dispatcher.reset();
            self.codec.reset();
            self.abort_requests(|| ErrorKind::TransportUnavailable);
            self.configuration = None;
            self.events.push_back(Event::AdapterDisconnected);
        }

        self.process(now);
    }

    pub fn handle_bytes(&mut self, bytes: &[u8], now: Instant) {
        for result in self.codec.decode(bytes) {
            match result {
                Ok(frame) => {
                    self.handle_frame(frame);
                    self.process(now);
                }
                Err(error) => warn!("dropping malformed frame: {}", error),
            }
        }
    }

    pub fn handle_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::SendApsData {
                mut request,
                sender,
            } => {
                let waiter = Waiter::Confirm(sender);
                match self.check_online() {
                    Ok(()) => {
                        self.stamp_zdo(&mut request);
                        if let Err((error, waiter)) = self.submit(request, None, waiter, now) {
                            self.resolve_failed(waiter, error, now);
                        }
                    }
                    Err(error) => self.resolve_failed(waiter, error, now),
                }
            }
            Command::Zdo {
                request,
                address_of_interest,
                sender,
            } => self.zdo_request(request, address_of_interest, sender, now),
            Command::Adapter { request, sender } => match self.transmission(&request) {
                Ok(command) => {
                    self.sequencer
                        .enqueue(command, Priority::Normal, Continuation::Caller(sender));
                }
                Err(error) => {
                    reply(sender, Err(error));
                }
            },
            Command::StartNetwork(sender) => self.restart(Goal::Run, sender, now),
            Command::StopNetwork(sender) => self.restart(Goal::Halt, sender, now),
            Command::ResetController(sender) => {
                info!("resetting controller");
                self.reconnect = true;
                reply(sender, Ok(()));
            }
            Command::FactoryReset(sender) => {
                warn!("factory reset");
                if let Err(error) = self.store.clear() {
                    reply(sender, Err(error));
                    return;
                }
                self.nodes.clear();
                self.discovery.clear();
                self.bringup.set_stored(None);
                self.bringup.force_commission();
                self.restart(Goal::Run, sender, now);
            }
            Command::Nodes(sender) => {
                let mut nodes: Vec<Node> = self.nodes.iter().cloned().collect();
                nodes.sort_by_key(|node| node.ieee_address);
                reply(sender, nodes);
            }
        }

        self.process(now);
    }

    pub fn handle_timers(&mut self, now: Instant) {
        self.sequencer.poll_timeout(now);

        if self.poll_deadline.map_or(false, |deadline| deadline <= now) {
            self.poll_deadline = None;
            let directives = self.bringup.on_poll_timer();
            self.apply_directives(directives, now);
        }

        let expired = self
            .pending
            .remove_where(|_, pending| pending.deadline <= now);
        for (request_id, pending) in expired {
            warn!(
                "request {} to {:?} timed out waiting for {}",
                request_id,
                pending.destination,
                if pending.confirmed { "response" } else { "confirm" }
            );
            self.resolve_failed(pending.waiter, ErrorKind::Timeout.into(), now);
        }

        self.process(now);
    }

    /// Encoded bytes of the next command to write, if the link is free.
    pub fn poll_transmit(&mut self, now: Instant) -> Option<Vec<u8>> {
        let frame = self.sequencer.poll_transmit(now)?;
        match self.codec.encode(&frame) {
            Ok(bytes) => {
                debug!("sending {:?}", frame);
                Some(bytes)
            }
            Err(error) => {
                // Left in flight; it times out like any unanswered command.
                error!("encoding {:?}: {}", frame, error);
                None
            }
        }
    }

    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let pending = self.pending.iter().map(|(_, pending)| pending.deadline).min();
        [self.sequencer.next_deadline(), self.poll_deadline, pending]
            .into_iter()
            .flatten()
            .min()
    }

    /// Whether the adapter should be reopened. Clears the request.
    pub fn take_reconnect(&mut self) -> bool {
        std::mem::take(&mut self.reconnect)
    }

    pub fn configuration(&self) -> Option<&NetworkConfiguration> {
        self.configuration.as_ref()
    }

    pub fn commissioning_state(&self) -> CommissioningState {
        self.bringup.state()
    }

    pub fn network_state(&self) -> Option<NetworkState> {
        self.dispatcher.network_state()
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn discovery(&self) -> &DiscoveryPipeline {
        &self.discovery
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn handle_frame(&mut self, frame: Frame) {
        debug!("received {:?}", frame);
        if let Some(frame) = self.sequencer.on_frame_received(frame) {
            let actions = self
                .dispatcher
                .on_unsolicited_frame(&frame, self.dialect.as_ref());
            self.apply_actions(actions);
        }
    }

    /// Runs completions and queued sends until nothing changes.
    fn process(&mut self, now: Instant) {
        loop {
            let mut progressed = false;
            while let Some(completion) = self.sequencer.poll_completion() {
                progressed = true;
                self.complete(completion, now);
            }
            if self.pump_sends(now) {
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    fn transmission(&self, request: &Request) -> Result<adapter::Command> {
        let (kind, payload) = self.dialect.encode_request(request)?;
        let timeout = self.policy.timeout_for(request.timeout_class());
        Ok(adapter::Command::new(kind, payload, timeout).reply_kind(self.dialect.reply_kind(kind)))
    }

    fn complete(&mut self, completion: Completion<Continuation>, now: Instant) {
        let dialect = &self.dialect;
        let result = completion
            .result
            .map_err(Error::from)
            .and_then(|frame| dialect.decode_response(&frame).map_err(Error::from));
        let device_state = result.as_ref().ok().and_then(Response::device_state);

        match completion.token {
            Continuation::Caller(sender) => {
                reply(sender, result);
            }
            Continuation::Read(read) => {
                self.dispatcher.on_read_finished(read);
                self.read_finished(read, result, now);
            }
            Continuation::ApsSend(request_id) => self.sent(request_id, result, now),
            Continuation::BringUp(epoch) => {
                if epoch == self.bringup.epoch() {
                    let directives = self.bringup.on_response(result);
                    self.apply_directives(directives, now);
                } else {
                    debug!("dropping reply for abandoned bring-up {}", epoch);
                }
            }
        }

        // Keeps draining while the adapter reports queued data.
        if let Some(device_state) = device_state {
            let actions = self.dispatcher.on_device_state_changed(device_state);
            self.apply_actions(actions);
        }
    }

    fn apply_actions(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::NetworkStateChanged { from, to } => {
                    self.events.push_back(Event::NetworkStateChanged(to));
                    if from == Some(NetworkState::Connected) {
                        warn!(
                            "network left connected state, abandoning {} requests",
                            self.pending.len()
                        );
                        self.abort_requests(|| ErrorKind::NetworkOffline);
                    }
                }
                Action::Read(read) => self.read(read),
                Action::ResumeSends => debug!("adapter accepting requests"),
                Action::PauseSends => debug!("adapter request queue full"),
                Action::ConfigurationChanged => info!("adapter configuration changed"),
            }
        }
    }

    fn read(&mut self, read: Drain) {
        let request = match read {
            Drain::Indication => Request::ApsDataIndication,
            Drain::Confirm => Request::ApsDataConfirm,
        };
        match self.transmission(&request) {
            Ok(command) => {
                self.sequencer
                    .enqueue(command, Priority::High, Continuation::Read(read));
            }
            Err(error) => {
                error!("{:?} read: {}", read, error);
                self.dispatcher.on_read_finished(read);
            }
        }
    }

    fn read_finished(&mut self, read: Drain, result: Result<Response>, now: Instant) {
        match result {
            Ok(Response::ApsDataIndication {
                aps_data_indication,
                ..
            }) => self.indication(aps_data_indication, now),
            Ok(Response::ApsDataConfirm {
                request_id,
                aps_data_confirm,
                ..
            }) => self.confirm(request_id, aps_data_confirm, now),
            Ok(other) => warn!("unexpected reply to {:?} read: {:?}", read, other),
            Err(error) => warn!("{:?} read failed: {}", read, error),
        }
    }

    fn sent(&mut self, request_id: RequestId, result: Result<Response>, now: Instant) {
        let error = match result {
            Ok(Response::ApsDataRequest { .. }) => {
                debug!("request {} accepted by adapter", request_id);
                return;
            }
            Ok(other) => unexpected(&other),
            Err(error) => error,
        };

        if let Some(pending) = self.pending.deregister(&request_id) {
            warn!("request {} to {:?} failed: {}", request_id, pending.destination, error);
            self.resolve_failed(pending.waiter, error, now);
        }
    }

    fn confirm(&mut self, request_id: RequestId, confirm: ApsDataConfirm, now: Instant) {
        let status = confirm.zigbee_status();

        match self.pending.get_mut(&request_id) {
            None => {
                debug!("confirm for request {} nobody is waiting for", request_id);
                return;
            }
            Some(pending) if status.is_success() && !matches!(pending.waiter, Waiter::Confirm(_)) => {
                // Delivered; the response is still to come.
                pending.confirmed = true;
                pending.deadline = now + self.policy.zdo_timeout();
                return;
            }
            Some(_) => {}
        }

        let pending = match self.pending.deregister(&request_id) {
            Some(pending) => pending,
            None => return,
        };

        if status.is_success() {
            if let Waiter::Confirm(sender) = pending.waiter {
                reply(sender, Ok(confirm));
            }
        } else {
            warn!(
                "request {} to {:?} not delivered: {}",
                request_id, pending.destination, status
            );
            self.resolve_failed(pending.waiter, ErrorKind::Delivery(status).into(), now);
        }
    }

    fn indication(&mut self, indication: ApsDataIndication, now: Instant) {
        debug!("indication {:?}", indication);

        match router::route(&indication, &self.pending, &self.nodes) {
            Route::ZdoReply(request_id) => {
                let pending = match self.pending.deregister(&request_id) {
                    Some(pending) => pending,
                    None => return,
                };
                match pending.waiter {
                    Waiter::Zdo(sender) => {
                        reply(sender, Ok(indication));
                    }
                    Waiter::Discovery {
                        ieee_address,
                        generation,
                    } => {
                        let outcome =
                            self.discovery
                                .on_reply(ieee_address, generation, Ok(indication));
                        self.drive_discovery(outcome, now);
                    }
                    Waiter::Confirm(sender) => {
                        reply(
                            sender,
                            Err(ErrorKind::UnexpectedCluster(indication.cluster_id).into()),
                        );
                    }
                }
            }
            Route::DeviceAnnounce(announce) => self.announced(announce, now),
            Route::Node(ieee_address) => self.events.push_back(Event::Indication {
                ieee_address,
                indication,
            }),
            Route::Dropped(_) => {}
        }
    }

    fn announced(&mut self, announce: DeviceAnnounce, now: Instant) {
        info!(
            "device announce from {:#018x} at {:#06x}",
            announce.ieee, announce.addr
        );
        let displaced = self
            .nodes
            .by_short(announce.addr)
            .filter(|node| node.ieee_address != announce.ieee && !node.is_coordinator())
            .map(|node| node.ieee_address);
        if let Some(ieee_address) = displaced {
            self.forget(ieee_address);
        }

        self.nodes.update_short_address(announce.ieee, announce.addr);
        self.events.push_back(Event::NodeAnnounced {
            ieee_address: announce.ieee,
            short_address: announce.addr,
        });

        // Queries of an earlier generation stay pending; their replies are ignored.
        let outcome = self
            .discovery
            .announce(announce.ieee, announce.addr, announce.capabilities);
        self.drive_discovery(Some(outcome), now);
    }

    /// Drops a node that no longer owns its short address.
    fn forget(&mut self, ieee_address: ExtendedAddress) {
        let node = match self.nodes.remove(ieee_address) {
            Some(node) => node,
            None => return,
        };
        info!(
            "{:#018x} left, {:#06x} now belongs to another device",
            ieee_address, node.short_address
        );
        self.discovery.cancel(ieee_address);
        if let Err(error) = self.store.node_removed(ieee_address) {
            error!("removing {:#018x}: {}", ieee_address, error);
        }
        self.events.push_back(Event::NodeLeft {
            ieee_address,
            short_address: node.short_address,
        });
    }

    fn drive_discovery(&mut self, outcome: Option<Outcome>, now: Instant) {
        let outcome = match outcome {
            Some(outcome) => outcome,
            None => return,
        };

        match outcome {
            Outcome::Query {
                ieee_address,
                short_address,
                generation,
                query,
            } => {
                let waiter = Waiter::Discovery {
                    ieee_address,
                    generation,
                };
                let transaction_id = self.zdo_transaction_ids.next();
                match query.request(short_address, transaction_id) {
                    Ok(request) => {
                        let zdo = ZdoMatch {
                            transaction_id,
                            address_of_interest: Some(short_address),
                        };
                        if let Err((error, waiter)) = self.submit(request, Some(zdo), waiter, now) {
                            self.resolve_failed(waiter, error, now);
                        }
                    }
                    Err(error) => self.resolve_failed(waiter, error, now),
                }
            }
            Outcome::Initialized(node) => {
                if let Err(error) = self.store.node_added(&node) {
                    error!("storing {:#018x}: {}", node.ieee_address, error);
                }
                self.nodes.insert(node.clone());
                self.events.push_back(Event::NodeJoined(node));
            }
            Outcome::Failed {
                ieee_address,
                short_address,
                error,
            } => self.events.push_back(Event::NodeDiscoveryFailed {
                ieee_address,
                short_address,
                error,
            }),
        }
    }

    fn zdo_request(
        &mut self,
        mut request: ApsDataRequest,
        address_of_interest: Option<ShortAddress>,
        sender: oneshot::Sender<Result<ApsDataIndication>>,
        now: Instant,
    ) {
        let waiter = Waiter::Zdo(sender);
        if let Err(error) = self.check_online() {
            self.resolve_failed(waiter, error, now);
            return;
        }

        let transaction_id = match self.stamp_zdo(&mut request) {
            Some(transaction_id) => transaction_id,
            None => {
                let error = ErrorKind::UnexpectedCluster(request.cluster_id).into();
                self.resolve_failed(waiter, error, now);
                return;
            }
        };

        let zdo = ZdoMatch {
            transaction_id,
            address_of_interest,
        };
        if let Err((error, waiter)) = self.submit(request, Some(zdo), waiter, now) {
            self.resolve_failed(waiter, error, now);
        }
    }

    fn check_online(&self) -> Result<()> {
        if !self.sequencer.is_available() {
            return Err(ErrorKind::TransportUnavailable.into());
        }
        if self.dispatcher.network_state() != Some(NetworkState::Connected) {
            return Err(ErrorKind::NetworkOffline.into());
        }
        Ok(())
    }

    /// Writes a fresh transaction ID into a ZDO frame. Returns None for other profiles.
    fn stamp_zdo(&mut self, request: &mut ApsDataRequest) -> Option<zdo::TransactionId> {
        if request.profile_id != zdo::PROFILE_ID || request.source_endpoint != zdo::ENDPOINT {
            return None;
        }
        let first = request.asdu.first_mut()?;
        *first = self.zdo_transaction_ids.next();
        Some(*first)
    }

    /// Registers a pending reply and queues the request behind the adapter's send gate.
    fn submit(
        &mut self,
        request: ApsDataRequest,
        zdo: Option<ZdoMatch>,
        waiter: Waiter,
        now: Instant,
    ) -> std::result::Result<RequestId, (Error, Waiter)> {
        let pending = &self.pending;
        let request_id = match self.request_ids.next_free(|id| pending.contains(&id)) {
            Some(request_id) => request_id,
            None => return Err((ErrorKind::Busy.into(), waiter)),
        };

        let pending_reply = PendingReply {
            destination: request.destination,
            profile_id: request.profile_id,
            cluster_id: request.cluster_id,
            zdo,
            confirmed: false,
            deadline: now + self.policy.confirm_timeout(),
            waiter,
        };
        if let Err(pending_reply) = self.pending.register(request_id, pending_reply) {
            return Err((ErrorKind::Busy.into(), pending_reply.waiter));
        }

        debug!(
            "request {}: cluster {:#06x} to {:?}",
            request_id, request.cluster_id, request.destination
        );
        self.outbound.push_back((request_id, request));
        Ok(request_id)
    }

    /// Hands one queued APS request to the sequencer if the adapter has room for it.
    fn pump_sends(&mut self, now: Instant) -> bool {
        if !self.dispatcher.sends_open() || self.check_online().is_err() {
            return false;
        }

        while let Some((request_id, request)) = self.outbound.pop_front() {
            if !self.pending.contains(&request_id) {
                debug!("request {} resolved before it was sent", request_id);
                continue;
            }

            match self.transmission(&Request::ApsDataRequest(request_id, request)) {
                Ok(command) => {
                    self.sequencer.enqueue(
                        command,
                        Priority::Normal,
                        Continuation::ApsSend(request_id),
                    );
                    self.dispatcher.on_request_sent();
                }
                Err(error) => {
                    if let Some(pending) = self.pending.deregister(&request_id) {
                        self.resolve_failed(pending.waiter, error, now);
                    }
                }
            }
            return true;
        }

        false
    }

    fn resolve_failed(&mut self, waiter: Waiter, error: Error, now: Instant) {
        match waiter {
            Waiter::Confirm(sender) => {
                reply(sender, Err(error));
            }
            Waiter::Zdo(sender) => {
                reply(sender, Err(error));
            }
            Waiter::Discovery {
                ieee_address,
                generation,
            } => {
                let outcome = self.discovery.on_reply(ieee_address, generation, Err(error));
                self.drive_discovery(outcome, now);
            }
        }
    }

    /// Fails every outstanding request. Discovery is abandoned rather than failed.
    fn abort_requests(&mut self, kind: fn() -> ErrorKind) {
        self.outbound.clear();
        self.discovery.clear();
        for (request_id, pending) in self.pending.drain() {
            debug!("aborting request {}: {}", request_id, kind());
            match pending.waiter {
                Waiter::Confirm(sender) => {
                    reply(sender, Err(kind().into()));
                }
                Waiter::Zdo(sender) => {
                    reply(sender, Err(kind().into()));
                }
                Waiter::Discovery { .. } => {}
            }
        }
    }

    fn restart(&mut self, goal: Goal, sender: oneshot::Sender<Result<()>>, now: Instant) {
        if let Some(previous) = self.network_waiter.replace(sender) {
            reply(previous, Err(ErrorKind::Cancelled.into()));
        }
        self.goal = goal;

        // Otherwise picked up when the adapter becomes available.
        if self.sequencer.is_available() {
            self.poll_deadline = None;
            let directives = self.bringup.start(goal);
            self.apply_directives(directives, now);
        }
    }

    fn resolve_network(&mut self, result: Result<()>) {
        if let Some(sender) = self.network_waiter.take() {
            reply(sender, result);
        }
    }

    fn apply_directives(&mut self, directives: Vec<Directive>, now: Instant) {
        let mut directives = VecDeque::from(directives);

        while let Some(directive) = directives.pop_front() {
            match directive {
                Directive::Send(request) => {
                    let epoch = self.bringup.epoch();
                    match self.transmission(&request) {
                        Ok(command) => {
                            self.sequencer.enqueue(
                                command,
                                Priority::Normal,
                                Continuation::BringUp(epoch),
                            );
                        }
                        Err(error) => directives.extend(self.bringup.on_response(Err(error))),
                    }
                }
                Directive::Poll(delay) => self.poll_deadline = Some(now + delay),
                Directive::Running(configuration) => self.network_running(configuration),
                Directive::Stopped => {
                    info!("network stopped");
                    self.configuration = None;
                    self.events.push_back(Event::NetworkStopped);
                    self.resolve_network(Ok(()));
                }
                Directive::Failed(error) => {
                    error!("bring-up failed: {}", error);
                    // Reconnects leave the network down until a start or factory reset.
                    if let ErrorKind::HardwareModuleChanged { .. } = error.kind {
                        self.goal = Goal::Halt;
                    }
                    self.events.push_back(Event::NetworkFailed(error.to_string()));
                    self.resolve_network(Err(error));
                }
                Directive::Reconnect => {
                    warn!("adapter unresponsive, reconnecting");
                    self.reconnect = true;
                }
            }
        }
    }

    fn network_running(&mut self, configuration: NetworkConfiguration) {
        if let Err(error) = self.store.save_network(&configuration) {
            error!("storing network: {}", error);
        }
        self.nodes.insert(Node::coordinator(&configuration));
        self.configuration = Some(configuration.clone());
        self.events.push_back(Event::NetworkStarted(configuration));
        self.resolve_network(Ok(()));
    }
}

fn unexpected(response: &Response) -> Error {
    adapter::Error::from(adapter::ErrorKind::UnexpectedResponse(response.command_id())).into()
}
