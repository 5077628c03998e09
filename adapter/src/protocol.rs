use std::convert::TryFrom;
use std::fmt::{self, Display};
use std::io::{Cursor, Read, Write};

use crate::{
    ApsDataConfirm, ApsDataIndication, ApsDataRequest, CommandKind, Destination,
    DestinationAddress, DeviceState, Frame, NetworkState, Parameter, ParameterId, Platform,
    ReadWire, SourceAddress, TxOptions, Version, WriteWire,
};
use crate::{Error, ErrorKind, ReadWireExt, Result, WriteWireExt};

impl ReadWire for DeviceState {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let byte = u8::read_wire(r)?;
        Ok(DeviceState::from_byte(byte))
    }
}

impl WriteWire for DeviceState {
    fn wire_len(&self) -> u16 {
        1
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_wire(&self.to_byte())
    }
}

impl ReadWire for Destination {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        match u8::read_wire(r)? {
            0x1 => Ok(Destination::Group(r.read_wire()?)),
            0x2 => {
                let short_address = r.read_wire()?;
                let endpoint = r.read_wire()?;
                Ok(Destination::Nwk(short_address, endpoint))
            }
            0x3 => {
                let extended_address = r.read_wire()?;
                let endpoint = r.read_wire()?;
                Ok(Destination::Ieee(extended_address, endpoint))
            }
            mode => Err(ErrorKind::UnsupportedAddressMode(mode).into()),
        }
    }
}

impl WriteWire for Destination {
    fn wire_len(&self) -> u16 {
        match self {
            Destination::Group(_) => 3,
            Destination::Nwk(_, _) => 4,
            Destination::Ieee(_, _) => 10,
        }
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        match *self {
            Destination::Group(addr) => {
                w.write_wire(&0x1u8)?;
                w.write_wire(&addr)?;
            }
            Destination::Nwk(addr, endpoint) => {
                w.write_wire(&0x2u8)?;
                w.write_wire(&addr)?;
                w.write_wire(&endpoint)?;
            }
            Destination::Ieee(addr, endpoint) => {
                w.write_wire(&0x3u8)?;
                w.write_wire(&addr)?;
                w.write_wire(&endpoint)?;
            }
        }

        Ok(())
    }
}

impl ReadWire for DestinationAddress {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        match u8::read_wire(r)? {
            0x1 => Ok(DestinationAddress::Group(r.read_wire()?)),
            0x2 => Ok(DestinationAddress::Nwk(r.read_wire()?)),
            0x3 => Ok(DestinationAddress::Ieee(r.read_wire()?)),
            mode => Err(ErrorKind::UnsupportedAddressMode(mode).into()),
        }
    }
}

impl WriteWire for DestinationAddress {
    fn wire_len(&self) -> u16 {
        match self {
            DestinationAddress::Group(_) | DestinationAddress::Nwk(_) => 3,
            DestinationAddress::Ieee(_) => 9,
        }
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        match *self {
            DestinationAddress::Group(addr) => {
                w.write_wire(&0x1u8)?;
                w.write_wire(&addr)
            }
            DestinationAddress::Nwk(addr) => {
                w.write_wire(&0x2u8)?;
                w.write_wire(&addr)
            }
            DestinationAddress::Ieee(addr) => {
                w.write_wire(&0x3u8)?;
                w.write_wire(&addr)
            }
        }
    }
}

impl ReadWire for SourceAddress {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        match u8::read_wire(r)? {
            0x2 => Ok(SourceAddress {
                short: Some(r.read_wire()?),
                extended: None,
            }),
            0x3 => Ok(SourceAddress {
                short: None,
                extended: Some(r.read_wire()?),
            }),
            0x4 => {
                let short = r.read_wire()?;
                let extended = r.read_wire()?;
                Ok(SourceAddress {
                    short: Some(short),
                    extended: Some(extended),
                })
            }
            mode => Err(ErrorKind::UnsupportedAddressMode(mode).into()),
        }
    }
}

impl WriteWire for SourceAddress {
    fn wire_len(&self) -> u16 {
        match (self.short, self.extended) {
            (Some(_), Some(_)) => 11,
            (None, Some(_)) => 9,
            _ => 3,
        }
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        match (self.short, self.extended) {
            (Some(short), Some(extended)) => {
                w.write_wire(&0x4u8)?;
                w.write_wire(&short)?;
                w.write_wire(&extended)
            }
            (None, Some(extended)) => {
                w.write_wire(&0x3u8)?;
                w.write_wire(&extended)
            }
            (short, None) => {
                w.write_wire(&0x2u8)?;
                w.write_wire(&short.unwrap_or(0xFFFF))
            }
        }
    }
}

pub type RequestId = u8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandId {
    Version,
    ReadParameter,
    WriteParameter,
    DeviceState,
    ChangeNetworkState,
    DeviceStateChanged,
    ApsDataIndication,
    ApsDataRequest,
    ApsDataConfirm,

    // https://github.com/dresden-elektronik/deconz-rest-plugin/issues/652#issuecomment-400055215
    MacPoll,
}

impl CommandId {
    /// Whether a response of this kind was solicited by a request.
    pub fn solicited(&self) -> bool {
        !matches!(self, CommandId::DeviceStateChanged | CommandId::MacPoll)
    }
}

impl From<CommandId> for u8 {
    fn from(command_id: CommandId) -> u8 {
        match command_id {
            CommandId::Version => 0x0D,
            CommandId::ReadParameter => 0x0A,
            CommandId::WriteParameter => 0x0B,
            CommandId::DeviceState => 0x07,
            CommandId::ChangeNetworkState => 0x08,
            CommandId::DeviceStateChanged => 0x0E,
            CommandId::ApsDataIndication => 0x17,
            CommandId::ApsDataRequest => 0x12,
            CommandId::ApsDataConfirm => 0x04,
            CommandId::MacPoll => 0x1C,
        }
    }
}

impl From<CommandId> for CommandKind {
    fn from(command_id: CommandId) -> CommandKind {
        u8::from(command_id).into()
    }
}

impl TryFrom<CommandKind> for CommandId {
    type Error = Error;

    fn try_from(kind: CommandKind) -> Result<Self> {
        match kind {
            0x0D => Ok(CommandId::Version),
            0x0A => Ok(CommandId::ReadParameter),
            0x0B => Ok(CommandId::WriteParameter),
            0x07 => Ok(CommandId::DeviceState),
            0x08 => Ok(CommandId::ChangeNetworkState),
            0x0E => Ok(CommandId::DeviceStateChanged),
            0x1C => Ok(CommandId::MacPoll),
            0x17 => Ok(CommandId::ApsDataIndication),
            0x12 => Ok(CommandId::ApsDataRequest),
            0x04 => Ok(CommandId::ApsDataConfirm),
            _ => Err(Error {
                kind: ErrorKind::UnsupportedCommand(kind),
            }),
        }
    }
}

impl Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:#04x})", self, u8::from(*self))
    }
}

/// How long the engine should wait for the adapter to answer a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeoutClass {
    Generic,
    /// Requests the adapter answers only after touching its APS queues.
    Compound,
    Ping,
}

/// A command to the adapter, independent of how any particular adapter encodes it.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Version,
    ReadParameter { parameter_id: ParameterId },
    WriteParameter { parameter: Parameter },
    DeviceState,
    ChangeNetworkState(NetworkState),
    ApsDataIndication,
    ApsDataRequest(RequestId, ApsDataRequest),
    ApsDataConfirm,
}

impl Request {
    pub fn command_id(&self) -> CommandId {
        match self {
            Request::Version => CommandId::Version,
            Request::ReadParameter { .. } => CommandId::ReadParameter,
            Request::WriteParameter { .. } => CommandId::WriteParameter,
            Request::DeviceState => CommandId::DeviceState,
            Request::ChangeNetworkState(_) => CommandId::ChangeNetworkState,
            Request::ApsDataIndication => CommandId::ApsDataIndication,
            Request::ApsDataRequest(_, _) => CommandId::ApsDataRequest,
            Request::ApsDataConfirm => CommandId::ApsDataConfirm,
        }
    }

    pub fn timeout_class(&self) -> TimeoutClass {
        match self {
            Request::Version => TimeoutClass::Ping,
            Request::ApsDataIndication | Request::ApsDataRequest(_, _) | Request::ApsDataConfirm => {
                TimeoutClass::Compound
            }
            _ => TimeoutClass::Generic,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Version {
        version: Version,
        platform: Platform,
    },
    Parameter(Parameter),
    WriteParameter(ParameterId),
    DeviceState(DeviceState),
    ChangeNetworkState(NetworkState),
    DeviceStateChanged(DeviceState),
    ApsDataIndication {
        device_state: DeviceState,
        aps_data_indication: ApsDataIndication,
    },
    ApsDataRequest {
        device_state: DeviceState,
        request_id: RequestId,
    },
    ApsDataConfirm {
        device_state: DeviceState,
        request_id: RequestId,
        aps_data_confirm: ApsDataConfirm,
    },
    MacPoll {
        source: SourceAddress,
    },
}

impl Response {
    pub fn command_id(&self) -> CommandId {
        match self {
            Response::Version { .. } => CommandId::Version,
            Response::Parameter(_) => CommandId::ReadParameter,
            Response::WriteParameter(_) => CommandId::WriteParameter,
            Response::DeviceState(_) => CommandId::DeviceState,
            Response::ChangeNetworkState(_) => CommandId::ChangeNetworkState,
            Response::DeviceStateChanged(_) => CommandId::DeviceStateChanged,
            Response::ApsDataIndication { .. } => CommandId::ApsDataIndication,
            Response::ApsDataRequest { .. } => CommandId::ApsDataRequest,
            Response::ApsDataConfirm { .. } => CommandId::ApsDataConfirm,
            Response::MacPoll { .. } => CommandId::MacPoll,
        }
    }

    pub fn solicited(&self) -> bool {
        self.command_id().solicited()
    }

    /// The adapter's device state, for responses that carry one.
    pub fn device_state(&self) -> Option<DeviceState> {
        match self {
            Response::DeviceState(device_state)
            | Response::DeviceStateChanged(device_state)
            | Response::ApsDataIndication { device_state, .. }
            | Response::ApsDataRequest { device_state, .. }
            | Response::ApsDataConfirm { device_state, .. } => Some(*device_state),
            _ => None,
        }
    }
}

/// An adapter family's command set: how logical requests and responses map onto frames.
pub trait Dialect: Send {
    fn encode_request(&self, request: &Request) -> Result<(CommandKind, Vec<u8>)>;

    /// Command kind the adapter answers a request of kind `command` with.
    fn reply_kind(&self, command: CommandKind) -> CommandKind {
        command
    }

    fn decode_response(&self, frame: &Frame) -> Result<Response>;
}

/// The deCONZ serial protocol spoken by ConBee and RaspBee adapters.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeconzDialect;

/// Prefixes `body` with its u16 length, as most deCONZ payloads are.
fn with_length(body: Vec<u8>) -> Result<Vec<u8>> {
    let len = u16::try_from(body.len()).map_err(|_| crate::FramingError::Oversized(body.len()))?;
    let mut payload = Vec::with_capacity(body.len() + 2);
    payload.write_wire(&len)?;
    payload.extend(body);
    Ok(payload)
}

impl Dialect for DeconzDialect {
    fn encode_request(&self, request: &Request) -> Result<(CommandKind, Vec<u8>)> {
        let payload = match request {
            Request::Version => vec![0; 4],
            Request::ReadParameter { parameter_id } => {
                let mut body = Vec::new();
                body.write_wire(parameter_id)?;
                with_length(body)?
            }
            Request::WriteParameter { parameter } => {
                let mut body = Vec::new();
                body.write_wire(&parameter.id())?;
                body.write_wire(parameter)?;
                with_length(body)?
            }
            Request::DeviceState => vec![0; 3],
            Request::ChangeNetworkState(state) => vec![state.bits()],
            Request::ApsDataIndication => with_length(vec![0x04])?,
            Request::ApsDataRequest(
                request_id,
                ApsDataRequest {
                    destination,
                    profile_id,
                    cluster_id,
                    source_endpoint,
                    asdu,
                    tx_options,
                    radius,
                },
            ) => {
                let mut body = Vec::new();
                body.write_wire(request_id)?;
                body.write_wire(&0u8)?; // flags
                body.write_wire(destination)?;
                body.write_wire(profile_id)?;
                body.write_wire(cluster_id)?;
                body.write_wire(source_endpoint)?;
                let asdu_len = u16::try_from(asdu.len())
                    .map_err(|_| crate::FramingError::Oversized(asdu.len()))?;
                body.write_wire(&asdu_len)?;
                body.extend_from_slice(asdu);
                body.write_wire(&tx_options.0)?;
                body.write_wire(radius)?;
                with_length(body)?
            }
            // Include payload len even though it is zero:
            Request::ApsDataConfirm => with_length(Vec::new())?,
        };

        Ok((request.command_id().into(), payload))
    }

    fn decode_response(&self, frame: &Frame) -> Result<Response> {
        let command_id = CommandId::try_from(frame.command)?;
        let mut payload = Cursor::new(frame.payload.as_slice());

        let response = match command_id {
            CommandId::Version => {
                let word: u32 = payload.read_wire()?;
                let [_, platform, minor, major] = word.to_le_bytes();

                Response::Version {
                    version: Version { major, minor },
                    platform: Platform::from(platform),
                }
            }
            CommandId::ReadParameter => {
                let _payload_len: u16 = payload.read_wire()?;

                let parameter_id: ParameterId = payload.read_wire()?;
                let parameter = parameter_id.read_parameter(&mut payload)?;

                Response::Parameter(parameter)
            }
            CommandId::WriteParameter => {
                let _payload_len: u16 = payload.read_wire()?;

                let parameter_id = payload.read_wire()?;

                Response::WriteParameter(parameter_id)
            }
            CommandId::DeviceState => Response::DeviceState(payload.read_wire()?),
            CommandId::ChangeNetworkState => {
                let byte: u8 = payload.read_wire()?;
                Response::ChangeNetworkState(NetworkState::from_bits(byte))
            }
            CommandId::DeviceStateChanged => Response::DeviceStateChanged(payload.read_wire()?),
            CommandId::ApsDataIndication => {
                let _payload_len: u16 = payload.read_wire()?;

                let device_state = payload.read_wire()?;
                let destination_address = payload.read_wire()?;
                let destination_endpoint = payload.read_wire()?;
                let source_address = payload.read_wire()?;
                let source_endpoint = payload.read_wire()?;

                let profile_id = payload.read_wire()?;
                let cluster_id = payload.read_wire()?;

                let asdu_length: u16 = payload.read_wire()?;
                let mut asdu = vec![0; asdu_length.into()];
                payload.read_exact(&mut asdu)?;
                // Trailing LQI/RSSI bytes are not used.

                Response::ApsDataIndication {
                    device_state,
                    aps_data_indication: ApsDataIndication {
                        destination_address,
                        destination_endpoint,
                        source_address,
                        source_endpoint,
                        profile_id,
                        cluster_id,
                        asdu,
                    },
                }
            }
            CommandId::ApsDataRequest => {
                let _payload_len: u16 = payload.read_wire()?;

                let device_state = payload.read_wire()?;
                let request_id = payload.read_wire()?;

                Response::ApsDataRequest {
                    device_state,
                    request_id,
                }
            }
            CommandId::MacPoll => {
                let _payload_len: u16 = payload.read_wire()?;
                let source = payload.read_wire()?;

                Response::MacPoll { source }
            }
            CommandId::ApsDataConfirm => {
                let _payload_len: u16 = payload.read_wire()?;

                let device_state = payload.read_wire()?;
                let request_id = payload.read_wire()?;
                let destination = payload.read_wire()?;
                let source_endpoint = payload.read_wire()?;
                let status = payload.read_wire()?;

                Response::ApsDataConfirm {
                    device_state,
                    request_id,
                    aps_data_confirm: ApsDataConfirm {
                        destination,
                        source_endpoint,
                        status,
                    },
                }
            }
        };

        Ok(response)
    }
}

/// The adapter's side of the protocol, for simulating an adapter.
impl DeconzDialect {
    pub fn decode_request(&self, frame: &Frame) -> Result<Request> {
        let command_id = CommandId::try_from(frame.command)?;
        let mut payload = Cursor::new(frame.payload.as_slice());

        let request = match command_id {
            CommandId::Version => Request::Version,
            CommandId::ReadParameter => {
                let _payload_len: u16 = payload.read_wire()?;
                Request::ReadParameter {
                    parameter_id: payload.read_wire()?,
                }
            }
            CommandId::WriteParameter => {
                let _payload_len: u16 = payload.read_wire()?;
                let parameter_id: ParameterId = payload.read_wire()?;
                Request::WriteParameter {
                    parameter: parameter_id.read_parameter(&mut payload)?,
                }
            }
            CommandId::DeviceState => Request::DeviceState,
            CommandId::ChangeNetworkState => {
                let byte: u8 = payload.read_wire()?;
                Request::ChangeNetworkState(NetworkState::from_bits(byte))
            }
            CommandId::ApsDataIndication => Request::ApsDataIndication,
            CommandId::ApsDataConfirm => Request::ApsDataConfirm,
            CommandId::ApsDataRequest => {
                let _payload_len: u16 = payload.read_wire()?;
                let request_id = payload.read_wire()?;
                let _flags: u8 = payload.read_wire()?;
                let destination = payload.read_wire()?;
                let profile_id = payload.read_wire()?;
                let cluster_id = payload.read_wire()?;
                let source_endpoint = payload.read_wire()?;
                let asdu_len: u16 = payload.read_wire()?;
                let mut asdu = vec![0; asdu_len.into()];
                payload.read_exact(&mut asdu)?;
                let tx_options = TxOptions(payload.read_wire()?);
                let radius = payload.read_wire()?;

                Request::ApsDataRequest(
                    request_id,
                    ApsDataRequest {
                        destination,
                        profile_id,
                        cluster_id,
                        source_endpoint,
                        asdu,
                        tx_options,
                        radius,
                    },
                )
            }
            other => return Err(ErrorKind::UnexpectedResponse(other).into()),
        };

        Ok(request)
    }

    pub fn encode_response(&self, response: &Response) -> Result<(CommandKind, Vec<u8>)> {
        let payload = match response {
            Response::Version { version, platform } => {
                let platform = match *platform {
                    Platform::Avr => 0x05,
                    Platform::Arm => 0x07,
                    Platform::Unknown(byte) => byte,
                };
                let word = u32::from_le_bytes([0, platform, version.minor, version.major]);
                let mut payload = Vec::new();
                payload.write_wire(&word)?;
                payload
            }
            Response::Parameter(parameter) => {
                let mut body = Vec::new();
                body.write_wire(&parameter.id())?;
                body.write_wire(parameter)?;
                with_length(body)?
            }
            Response::WriteParameter(parameter_id) => {
                let mut body = Vec::new();
                body.write_wire(parameter_id)?;
                with_length(body)?
            }
            Response::DeviceState(device_state) => vec![device_state.to_byte(), 0, 0],
            Response::ChangeNetworkState(state) => vec![state.bits()],
            Response::DeviceStateChanged(device_state) => vec![device_state.to_byte(), 0],
            Response::ApsDataIndication {
                device_state,
                aps_data_indication,
            } => {
                let ApsDataIndication {
                    destination_address,
                    destination_endpoint,
                    source_address,
                    source_endpoint,
                    profile_id,
                    cluster_id,
                    asdu,
                } = aps_data_indication;

                let mut body = Vec::new();
                body.write_wire(device_state)?;
                body.write_wire(destination_address)?;
                body.write_wire(destination_endpoint)?;
                body.write_wire(source_address)?;
                body.write_wire(source_endpoint)?;
                body.write_wire(profile_id)?;
                body.write_wire(cluster_id)?;
                let asdu_len = u16::try_from(asdu.len())
                    .map_err(|_| crate::FramingError::Oversized(asdu.len()))?;
                body.write_wire(&asdu_len)?;
                body.extend_from_slice(asdu);
                // Trailing LQI and RSSI fields.
                body.write_all(&[0, 0, 0xFF, 0, 0, 0, 0, 0xC4])?;
                with_length(body)?
            }
            Response::ApsDataRequest {
                device_state,
                request_id,
            } => {
                let mut body = Vec::new();
                body.write_wire(device_state)?;
                body.write_wire(request_id)?;
                with_length(body)?
            }
            Response::ApsDataConfirm {
                device_state,
                request_id,
                aps_data_confirm,
            } => {
                let mut body = Vec::new();
                body.write_wire(device_state)?;
                body.write_wire(request_id)?;
                body.write_wire(&aps_data_confirm.destination)?;
                body.write_wire(&aps_data_confirm.source_endpoint)?;
                body.write_wire(&aps_data_confirm.status)?;
                body.write_all(&[0; 4])?;
                with_length(body)?
            }
            Response::MacPoll { source } => {
                let mut body = Vec::new();
                body.write_wire(source)?;
                with_length(body)?
            }
        };

        Ok((response.command_id().into(), payload))
    }
}
