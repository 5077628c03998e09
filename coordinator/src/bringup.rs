use std::collections::HashMap;
use std::time::Duration;

use adapter::{
    DeviceState, ExtendedAddress, NetworkKey, NetworkState, Parameter, ParameterId, Request,
    Response, Version,
};

use crate::config::{NetworkSettings, Policy};
use crate::network::{NetworkConfiguration, NodeType};
use crate::{Error, ErrorKind, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommissioningState {
    Idle,
    StopNetwork,
    WriteConfiguration,
    StartNetwork,
    ReadConfiguration,
    InitializeCoordinator,
}

/// What bring-up should end in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Goal {
    Run,
    Halt,
}

/// Instructions for the engine driving the machine.
#[derive(Debug)]
pub enum Directive {
    /// Send the request and report its outcome with `on_response`.
    Send(Request),
    /// Call `on_poll_timer` after the delay.
    Poll(Duration),
    Running(NetworkConfiguration),
    Stopped,
    Failed(Error),
    /// A retry budget ran out; the adapter should be reopened.
    Reconnect,
}

const PROBE_PARAMETERS: &[ParameterId] = &[
    ParameterId::MacAddress,
    ParameterId::ApsDesignatedCoordinator,
    ParameterId::ChannelMask,
    ParameterId::SecurityMode,
    ParameterId::NwkPanId,
    ParameterId::ApsExtendedPanId,
];

const CONFIGURATION_PARAMETERS: &[ParameterId] = &[
    ParameterId::MacAddress,
    ParameterId::NwkAddress,
    ParameterId::NwkPanId,
    ParameterId::NwkExtendedPanId,
    ParameterId::CurrentChannel,
    ParameterId::ChannelMask,
    ParameterId::SecurityMode,
    ParameterId::ApsDesignatedCoordinator,
    ParameterId::ProtocolVersion,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Step {
    Idle,
    Ping,
    ProbeDeviceState,
    ProbeParameters(usize),
    StopNetwork { polling: bool },
    WriteConfiguration(usize),
    StartNetwork { polling: bool },
    ReadConfiguration(usize),
    InitializeCoordinator,
}

/// Drives the adapter from whatever state it is in to a running network.
///
/// The machine does no I/O: every input returns the directives to carry out next. Each run of the
/// machine has an epoch; the engine tags requests with it so that replies to an abandoned run can
/// be recognised and dropped.
pub struct BringUp {
    step: Step,
    goal: Goal,
    force_commission: bool,
    epoch: u64,
    attempts: u32,
    last: Option<Request>,
    running: bool,
    settings: NetworkSettings,
    policy: Policy,
    stored: Option<NetworkConfiguration>,
    version: Option<Version>,
    device_state: Option<DeviceState>,
    parameters: HashMap<ParameterId, Parameter>,
    writes: Vec<Parameter>,
}

impl BringUp {
    pub fn new(settings: NetworkSettings, policy: Policy) -> Self {
        Self {
            step: Step::Idle,
            goal: Goal::Run,
            force_commission: false,
            epoch: 0,
            attempts: 0,
            last: None,
            running: false,
            settings,
            policy,
            stored: None,
            version: None,
            device_state: None,
            parameters: HashMap::new(),
            writes: Vec::new(),
        }
    }

    pub fn state(&self) -> CommissioningState {
        match self.step {
            Step::Idle | Step::Ping | Step::ProbeDeviceState | Step::ProbeParameters(_) => {
                CommissioningState::Idle
            }
            Step::StopNetwork { .. } => CommissioningState::StopNetwork,
            Step::WriteConfiguration(_) => CommissioningState::WriteConfiguration,
            Step::StartNetwork { .. } => CommissioningState::StartNetwork,
            Step::ReadConfiguration(_) => CommissioningState::ReadConfiguration,
            Step::InitializeCoordinator => CommissioningState::InitializeCoordinator,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_idle(&self) -> bool {
        self.step == Step::Idle
    }

    /// Whether the last run ended with the network up.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// The network a previous run stored; the adapter must still be the one it was formed on.
    pub fn set_stored(&mut self, stored: Option<NetworkConfiguration>) {
        self.stored = stored;
    }

    /// Skip the short-circuit on the next run and rewrite the adapter's configuration.
    pub fn force_commission(&mut self) {
        self.force_commission = true;
    }

    /// Starts a fresh run from the version ping, abandoning any run in progress.
    pub fn start(&mut self, goal: Goal) -> Vec<Directive> {
        self.epoch += 1;
        self.goal = goal;
        self.running = false;
        self.parameters.clear();
        self.device_state = None;
        info!("bring-up {} started ({:?})", self.epoch, goal);

        self.step = Step::Ping;
        self.send(Request::Version)
    }

    /// Abandons the current run. Nothing is sent until `start` is called again.
    pub fn abort(&mut self) {
        if self.step != Step::Idle {
            info!("bring-up {} abandoned in {:?}", self.epoch, self.step);
        }
        self.epoch += 1;
        self.step = Step::Idle;
        self.running = false;
        self.last = None;
    }

    pub fn on_response(&mut self, result: Result<Response>) -> Vec<Directive> {
        match self.step {
            Step::Idle => Vec::new(),
            Step::Ping => match result {
                Ok(Response::Version { version, platform }) => {
                    info!("adapter firmware {:?} on {:?}", version, platform);
                    self.version = Some(version);
                    self.step = Step::ProbeDeviceState;
                    self.send(Request::DeviceState)
                }
                other => self.retry(self.policy.ping_attempts, other),
            },
            Step::ProbeDeviceState => match result {
                Ok(Response::DeviceState(device_state)) => {
                    self.device_state = Some(device_state);
                    self.read_parameter(Step::ProbeParameters(0), PROBE_PARAMETERS)
                }
                other => self.retry(self.policy.ping_attempts, other),
            },
            Step::ProbeParameters(index) => match result {
                Ok(Response::Parameter(parameter)) => {
                    self.parameters.insert(parameter.id(), parameter);
                    if index + 1 < PROBE_PARAMETERS.len() {
                        self.read_parameter(Step::ProbeParameters(index + 1), PROBE_PARAMETERS)
                    } else {
                        self.decide()
                    }
                }
                other => self.retry(self.policy.parameter_read_attempts, other),
            },
            Step::StopNetwork { polling } => self.on_change_state_response(polling, result),
            Step::StartNetwork { polling } => self.on_change_state_response(polling, result),
            Step::WriteConfiguration(index) => match result {
                Ok(Response::WriteParameter(_)) => self.write_next(index + 1),
                Ok(other) => self.fail(unexpected(other)),
                Err(error) => {
                    error!("writing {:?} failed: {}", self.writes.get(index), error);
                    self.fail(error)
                }
            },
            Step::ReadConfiguration(index) => match result {
                Ok(Response::Parameter(parameter)) => {
                    self.parameters.insert(parameter.id(), parameter);
                    if index + 1 < CONFIGURATION_PARAMETERS.len() {
                        self.read_parameter(
                            Step::ReadConfiguration(index + 1),
                            CONFIGURATION_PARAMETERS,
                        )
                    } else {
                        self.step = Step::InitializeCoordinator;
                        self.initialize_coordinator()
                    }
                }
                other => self.retry(self.policy.parameter_read_attempts, other),
            },
            Step::InitializeCoordinator => Vec::new(),
        }
    }

    pub fn on_poll_timer(&mut self) -> Vec<Directive> {
        match self.step {
            Step::StopNetwork { polling: true } | Step::StartNetwork { polling: true } => {
                self.send(Request::DeviceState)
            }
            _ => Vec::new(),
        }
    }

    fn send(&mut self, request: Request) -> Vec<Directive> {
        self.attempts = 0;
        self.last = Some(request.clone());
        vec![Directive::Send(request)]
    }

    fn read_parameter(&mut self, step: Step, list: &[ParameterId]) -> Vec<Directive> {
        let index = match step {
            Step::ProbeParameters(index) | Step::ReadConfiguration(index) => index,
            _ => 0,
        };
        self.step = step;
        self.send(Request::ReadParameter {
            parameter_id: list[index],
        })
    }

    /// Re-issues the last request, or asks for a reconnect once `budget` attempts have failed.
    fn retry(&mut self, budget: u32, result: Result<Response>) -> Vec<Directive> {
        let error = match result {
            Ok(response) => unexpected(response),
            Err(error) => error,
        };

        self.attempts += 1;
        if self.attempts >= budget {
            error!(
                "bring-up {}: {:?} failed {} times, last error: {}",
                self.epoch, self.step, self.attempts, error
            );
            self.step = Step::Idle;
            self.last = None;
            return vec![Directive::Reconnect];
        }

        debug!(
            "bring-up {}: attempt {} of {:?} failed: {}",
            self.epoch, self.attempts, self.step, error
        );
        match self.last.clone() {
            Some(request) => vec![Directive::Send(request)],
            None => Vec::new(),
        }
    }

    fn fail(&mut self, error: Error) -> Vec<Directive> {
        self.step = Step::Idle;
        self.last = None;
        vec![Directive::Failed(error)]
    }

    fn parameter(&self, id: ParameterId) -> Option<Parameter> {
        self.parameters.get(&id).copied()
    }

    fn configuration_matches(&self) -> bool {
        if self.force_commission {
            return false;
        }

        let settings = &self.settings;
        let designated = matches!(
            self.parameter(ParameterId::ApsDesignatedCoordinator),
            Some(Parameter::ApsDesignatedCoordinator(1))
        );
        let channel_mask = self.parameter(ParameterId::ChannelMask)
            == Some(Parameter::ChannelMask(settings.channel_mask));
        let security_mode = self.parameter(ParameterId::SecurityMode)
            == Some(Parameter::SecurityMode(settings.security_mode));
        let pan_id = settings.pan_id.map_or(true, |pan_id| {
            self.parameter(ParameterId::NwkPanId) == Some(Parameter::NwkPanId(pan_id))
        });
        let extended_pan_id = settings.extended_pan_id.map_or(true, |extended_pan_id| {
            self.parameter(ParameterId::ApsExtendedPanId)
                == Some(Parameter::ApsExtendedPanId(extended_pan_id))
        });

        designated && channel_mask && security_mode && pan_id && extended_pan_id
    }

    fn decide(&mut self) -> Vec<Directive> {
        let connected = self.device_state.map_or(false, |state| state.connected());

        if self.goal == Goal::Halt {
            return self.stop_network();
        }

        if let Some(Parameter::MacAddress(current)) = self.parameter(ParameterId::MacAddress) {
            if let Err(error) = self.check_hardware(current) {
                return self.refuse(error);
            }
        }

        if self.configuration_matches() {
            info!("adapter configuration matches");
            if connected {
                return self.read_parameter(Step::ReadConfiguration(0), CONFIGURATION_PARAMETERS);
            }
            return self.start_network();
        }

        info!("adapter needs commissioning");
        self.stop_network()
    }

    fn stop_network(&mut self) -> Vec<Directive> {
        self.step = Step::StopNetwork { polling: false };
        self.send(Request::ChangeNetworkState(NetworkState::Offline))
    }

    fn start_network(&mut self) -> Vec<Directive> {
        self.step = Step::StartNetwork { polling: false };
        self.send(Request::ChangeNetworkState(NetworkState::Connected))
    }

    fn on_change_state_response(
        &mut self,
        polling: bool,
        result: Result<Response>,
    ) -> Vec<Directive> {
        let target = match self.step {
            Step::StopNetwork { .. } => NetworkState::Offline,
            _ => NetworkState::Connected,
        };

        if !polling {
            return match result {
                Ok(Response::ChangeNetworkState(_)) => {
                    self.set_polling();
                    vec![Directive::Poll(self.policy.poll_interval())]
                }
                other => self.retry(self.policy.ping_attempts, other),
            };
        }

        match result {
            Ok(Response::DeviceState(state)) if state.network_state == target => {
                self.device_state = Some(state);
                self.reached(target)
            }
            Ok(Response::DeviceState(state)) => {
                debug!("waiting for {:?}, adapter is {:?}", target, state.network_state);
                vec![Directive::Poll(self.policy.poll_interval())]
            }
            other => {
                let error = match other {
                    Ok(response) => unexpected(response),
                    Err(error) => error,
                };
                self.attempts += 1;
                if self.attempts >= self.policy.ping_attempts {
                    error!("adapter never reached {:?}: {}", target, error);
                    self.step = Step::Idle;
                    return vec![Directive::Reconnect];
                }
                vec![Directive::Poll(self.policy.poll_interval())]
            }
        }
    }

    fn set_polling(&mut self) {
        self.step = match self.step {
            Step::StopNetwork { .. } => Step::StopNetwork { polling: true },
            Step::StartNetwork { .. } => Step::StartNetwork { polling: true },
            step => step,
        };
        self.attempts = 0;
    }

    fn reached(&mut self, state: NetworkState) -> Vec<Directive> {
        info!("network {:?}", state);
        match (state, self.goal) {
            (NetworkState::Offline, Goal::Halt) => {
                self.step = Step::Idle;
                self.last = None;
                vec![Directive::Stopped]
            }
            (NetworkState::Offline, Goal::Run) => self.write_next(0),
            _ => self.read_parameter(Step::ReadConfiguration(0), CONFIGURATION_PARAMETERS),
        }
    }

    fn planned_writes(&self) -> Vec<Parameter> {
        let settings = &self.settings;
        let mut writes = vec![
            Parameter::ApsDesignatedCoordinator(NodeType::Coordinator.into()),
            Parameter::ChannelMask(settings.channel_mask),
            Parameter::PredefinedNwkPanId(u8::from(settings.pan_id.is_some())),
            Parameter::NwkPanId(settings.pan_id.unwrap_or(0)),
        ];
        if let Some(extended_pan_id) = settings.extended_pan_id {
            writes.push(Parameter::ApsExtendedPanId(extended_pan_id));
        }
        if let Some(Parameter::MacAddress(mac_address)) = self.parameter(ParameterId::MacAddress) {
            writes.push(Parameter::TrustCenterAddress(mac_address));
        }
        writes.push(Parameter::SecurityMode(settings.security_mode));
        if let Some(key) = settings.network_key {
            writes.push(Parameter::NetworkKey(NetworkKey { index: 0, key }));
        }
        writes
    }

    fn write_next(&mut self, index: usize) -> Vec<Directive> {
        if index == 0 {
            self.writes = self.planned_writes();
        }

        match self.writes.get(index).copied() {
            Some(parameter) => {
                debug!("writing {:?}", parameter);
                self.step = Step::WriteConfiguration(index);
                self.send(Request::WriteParameter { parameter })
            }
            None => {
                self.force_commission = false;
                self.start_network()
            }
        }
    }

    /// The stored network may only be brought up on the adapter it was formed on.
    fn check_hardware(&self, current: ExtendedAddress) -> Result<()> {
        match &self.stored {
            Some(stored) if stored.ieee_address != current => {
                Err(ErrorKind::HardwareModuleChanged {
                    stored: stored.ieee_address,
                    current,
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    /// Fails the run and takes the foreign adapter's network down without writing to it.
    fn refuse(&mut self, error: Error) -> Vec<Directive> {
        error!("{}", error);
        self.goal = Goal::Halt;
        let mut directives = vec![Directive::Failed(error)];
        directives.extend(self.stop_network());
        directives
    }

    fn configuration(&self) -> NetworkConfiguration {
        let mut configuration = NetworkConfiguration::default();
        for parameter in self.parameters.values() {
            match *parameter {
                Parameter::MacAddress(value) => configuration.ieee_address = value,
                Parameter::NwkAddress(value) => configuration.short_address = value,
                Parameter::NwkPanId(value) => configuration.pan_id = value,
                Parameter::NwkExtendedPanId(value) => configuration.extended_pan_id = value,
                Parameter::CurrentChannel(value) => configuration.channel = value,
                Parameter::ChannelMask(value) => configuration.channel_mask = value,
                Parameter::SecurityMode(value) => configuration.security_mode = value,
                Parameter::ApsDesignatedCoordinator(value) => {
                    configuration.node_type = NodeType::from(value)
                }
                Parameter::ProtocolVersion(value) => configuration.protocol_version = value,
                _ => {}
            }
        }
        configuration
    }

    fn initialize_coordinator(&mut self) -> Vec<Directive> {
        let configuration = self.configuration();

        if let Err(error) = self.check_hardware(configuration.ieee_address) {
            return self.refuse(error);
        }

        info!(
            "network running: pan {:#06x}, channel {}, coordinator {:#018x}",
            configuration.pan_id, configuration.channel, configuration.ieee_address
        );
        self.step = Step::Idle;
        self.last = None;
        self.running = true;
        self.stored = Some(configuration.clone());
        vec![Directive::Running(configuration)]
    }
}

fn unexpected(response: Response) -> Error {
    ErrorKind::Adapter(adapter::ErrorKind::UnexpectedResponse(response.command_id()).into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapter::AdapterStatus;

    const MAC: u64 = 0x00212EFFFF01A2B3;

    fn settings() -> NetworkSettings {
        NetworkSettings {
            pan_id: Some(0x1A62),
            extended_pan_id: None,
            channel_mask: 0x0000_0800,
            security_mode: 3,
            network_key: None,
        }
    }

    fn machine() -> BringUp {
        BringUp::new(settings(), Policy::default())
    }

    fn sent(directives: &[Directive]) -> Option<&Request> {
        directives.iter().find_map(|directive| match directive {
            Directive::Send(request) => Some(request),
            _ => None,
        })
    }

    fn adapter_error(status: AdapterStatus) -> Error {
        adapter::Error::from(adapter::ErrorKind::AdapterStatus(status)).into()
    }

    fn timeout() -> Error {
        ErrorKind::Timeout.into()
    }

    /// Answers the probe as an adapter with the given configuration would.
    fn probe(bring_up: &mut BringUp, device_state: u8, matching: bool) -> Vec<Directive> {
        bring_up.start(Goal::Run);
        bring_up.on_response(Ok(Response::Version {
            version: Version {
                major: 0x26,
                minor: 0x72,
            },
            platform: adapter::Platform::Arm,
        }));
        let mut directives = bring_up.on_response(Ok(Response::DeviceState(
            DeviceState::from_byte(device_state),
        )));

        loop {
            let parameter_id = match sent(&directives) {
                Some(Request::ReadParameter { parameter_id }) => *parameter_id,
                _ => return directives,
            };
            if bring_up.state() != CommissioningState::Idle {
                return directives;
            }
            let parameter = match parameter_id {
                ParameterId::MacAddress => Parameter::MacAddress(MAC),
                ParameterId::ApsDesignatedCoordinator => {
                    Parameter::ApsDesignatedCoordinator(u8::from(matching))
                }
                ParameterId::ChannelMask => Parameter::ChannelMask(0x800),
                ParameterId::SecurityMode => Parameter::SecurityMode(3),
                ParameterId::NwkPanId => Parameter::NwkPanId(0x1A62),
                ParameterId::ApsExtendedPanId => Parameter::ApsExtendedPanId(0),
                other => panic!("unexpected probe of {:?}", other),
            };
            directives = bring_up.on_response(Ok(Response::Parameter(parameter)));
        }
    }

    #[test]
    fn connected_and_matching_skips_to_read_configuration() {
        let mut bring_up = machine();
        let directives = probe(&mut bring_up, 0x02, true);
        assert_eq!(bring_up.state(), CommissioningState::ReadConfiguration);
        assert_eq!(
            sent(&directives),
            Some(&Request::ReadParameter {
                parameter_id: ParameterId::MacAddress
            })
        );
    }

    #[test]
    fn offline_and_matching_skips_to_start_network() {
        let mut bring_up = machine();
        let directives = probe(&mut bring_up, 0x00, true);
        assert_eq!(bring_up.state(), CommissioningState::StartNetwork);
        assert_eq!(
            sent(&directives),
            Some(&Request::ChangeNetworkState(NetworkState::Connected))
        );
    }

    #[test]
    fn mismatch_commissions_in_order() {
        let mut bring_up = machine();
        let directives = probe(&mut bring_up, 0x02, false);
        assert_eq!(bring_up.state(), CommissioningState::StopNetwork);
        assert_eq!(
            sent(&directives),
            Some(&Request::ChangeNetworkState(NetworkState::Offline))
        );

        let directives =
            bring_up.on_response(Ok(Response::ChangeNetworkState(NetworkState::Offline)));
        assert!(matches!(directives[0], Directive::Poll(_)));

        // Still leaving: keep polling without spending the budget.
        for _ in 0..20 {
            let directives = bring_up.on_poll_timer();
            assert_eq!(sent(&directives), Some(&Request::DeviceState));
            let directives =
                bring_up.on_response(Ok(Response::DeviceState(DeviceState::from_byte(0x03))));
            assert!(matches!(directives[0], Directive::Poll(_)));
        }

        bring_up.on_poll_timer();
        let mut directives =
            bring_up.on_response(Ok(Response::DeviceState(DeviceState::from_byte(0x00))));

        let mut written = Vec::new();
        while let Some(Request::WriteParameter { parameter }) = sent(&directives) {
            written.push(parameter.id());
            let id = parameter.id();
            directives = bring_up.on_response(Ok(Response::WriteParameter(id)));
        }

        assert_eq!(
            written,
            vec![
                ParameterId::ApsDesignatedCoordinator,
                ParameterId::ChannelMask,
                ParameterId::PredefinedNwkPanId,
                ParameterId::NwkPanId,
                ParameterId::TrustCenterAddress,
                ParameterId::SecurityMode,
            ]
        );
        assert_eq!(bring_up.state(), CommissioningState::StartNetwork);
    }

    #[test]
    fn node_type_write_failure_aborts() {
        let mut bring_up = machine();
        probe(&mut bring_up, 0x00, false);
        bring_up.on_response(Ok(Response::ChangeNetworkState(NetworkState::Offline)));
        bring_up.on_poll_timer();
        let directives =
            bring_up.on_response(Ok(Response::DeviceState(DeviceState::from_byte(0x00))));
        assert_eq!(
            sent(&directives),
            Some(&Request::WriteParameter {
                parameter: Parameter::ApsDesignatedCoordinator(1)
            })
        );

        let directives = bring_up.on_response(Err(adapter_error(AdapterStatus::Error)));
        assert_eq!(directives.len(), 1);
        assert!(matches!(directives[0], Directive::Failed(_)));
        assert!(sent(&directives).is_none());
        assert!(bring_up.is_idle());
    }

    #[test]
    fn ping_retries_then_reconnects() {
        let mut bring_up = machine();
        bring_up.start(Goal::Run);

        for _ in 0..9 {
            let directives = bring_up.on_response(Err(timeout()));
            assert_eq!(sent(&directives), Some(&Request::Version));
        }
        let directives = bring_up.on_response(Err(timeout()));
        assert!(matches!(directives[0], Directive::Reconnect));
        assert!(bring_up.is_idle());
    }

    #[test]
    fn parameter_reads_retry_three_times() {
        let mut bring_up = machine();
        bring_up.start(Goal::Run);
        bring_up.on_response(Ok(Response::Version {
            version: Version { major: 1, minor: 0 },
            platform: adapter::Platform::Avr,
        }));
        bring_up.on_response(Ok(Response::DeviceState(DeviceState::from_byte(0x00))));

        assert!(sent(&bring_up.on_response(Err(timeout()))).is_some());
        assert!(sent(&bring_up.on_response(Err(timeout()))).is_some());
        let directives = bring_up.on_response(Err(timeout()));
        assert!(matches!(directives[0], Directive::Reconnect));
    }

    fn run_to_initialize(bring_up: &mut BringUp, mac: u64) -> Vec<Directive> {
        let mut directives = probe(bring_up, 0x02, true);
        while let Some(Request::ReadParameter { parameter_id }) = sent(&directives) {
            let parameter = match parameter_id {
                ParameterId::MacAddress => Parameter::MacAddress(mac),
                ParameterId::NwkAddress => Parameter::NwkAddress(0x0000),
                ParameterId::NwkPanId => Parameter::NwkPanId(0x1A62),
                ParameterId::NwkExtendedPanId => Parameter::NwkExtendedPanId(0xDDDD),
                ParameterId::CurrentChannel => Parameter::CurrentChannel(11),
                ParameterId::ChannelMask => Parameter::ChannelMask(0x800),
                ParameterId::SecurityMode => Parameter::SecurityMode(3),
                ParameterId::ApsDesignatedCoordinator => Parameter::ApsDesignatedCoordinator(1),
                ParameterId::ProtocolVersion => Parameter::ProtocolVersion(0x0108),
                other => panic!("unexpected read of {:?}", other),
            };
            directives = bring_up.on_response(Ok(Response::Parameter(parameter)));
        }
        directives
    }

    #[test]
    fn reports_running_configuration() {
        let mut bring_up = machine();
        let directives = run_to_initialize(&mut bring_up, MAC);

        match &directives[..] {
            [Directive::Running(configuration)] => {
                assert_eq!(configuration.ieee_address, MAC);
                assert_eq!(configuration.channel, 11);
                assert_eq!(configuration.node_type, NodeType::Coordinator);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(bring_up.is_running());
    }

    #[test]
    fn changed_hardware_stops_network() {
        let mut bring_up = machine();
        bring_up.set_stored(Some(NetworkConfiguration {
            ieee_address: 0x1111,
            ..Default::default()
        }));

        let directives = run_to_initialize(&mut bring_up, MAC);
        match &directives[0] {
            Directive::Failed(error) => assert!(matches!(
                error.kind,
                ErrorKind::HardwareModuleChanged {
                    stored: 0x1111,
                    current: MAC
                }
            )),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            sent(&directives),
            Some(&Request::ChangeNetworkState(NetworkState::Offline))
        );
        assert!(!bring_up.is_running());

        bring_up.on_response(Ok(Response::ChangeNetworkState(NetworkState::Offline)));
        bring_up.on_poll_timer();
        let directives =
            bring_up.on_response(Ok(Response::DeviceState(DeviceState::from_byte(0x00))));
        assert!(matches!(directives[0], Directive::Stopped));
    }

    #[test]
    fn changed_hardware_is_never_commissioned() {
        let mut bring_up = machine();
        bring_up.set_stored(Some(NetworkConfiguration {
            ieee_address: 0x1111,
            ..Default::default()
        }));

        let directives = probe(&mut bring_up, 0x02, false);
        assert!(matches!(directives[0], Directive::Failed(_)));
        assert_eq!(bring_up.state(), CommissioningState::StopNetwork);

        bring_up.on_response(Ok(Response::ChangeNetworkState(NetworkState::Offline)));
        bring_up.on_poll_timer();
        let directives =
            bring_up.on_response(Ok(Response::DeviceState(DeviceState::from_byte(0x00))));
        assert_eq!(directives.len(), 1);
        assert!(matches!(directives[0], Directive::Stopped));
        assert!(bring_up.is_idle());
    }
}
