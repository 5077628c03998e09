mod dispatcher;
mod errors;
mod escaped;
mod frame;
mod parameters;
mod protocol;
mod sequencer;
mod slip;
mod status;
mod types;

#[macro_use]
extern crate log;

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

pub use crate::dispatcher::{Action, Dispatcher, Drain};
pub use crate::errors::{Error, ErrorKind, FramingError, Result};
pub use crate::escaped::EscapedCodec;
pub use crate::frame::{Codec, CommandKind, Frame};
pub use crate::parameters::{NetworkKey, Parameter, ParameterId, PARAMETERS};
pub use crate::protocol::{CommandId, DeconzDialect, Dialect, Request, RequestId, Response, TimeoutClass};
pub use crate::sequencer::{
    Command, Completion, Priority, Sequencer, TransactionId, TransactionState,
};
pub use crate::slip::SlipCodec;
pub use crate::status::{AdapterStatus, ZigbeeStatus};
pub use crate::types::{
    ApsDataConfirm, ApsDataIndication, ApsDataRequest, ClusterId, Destination, DestinationAddress,
    DeviceState, Endpoint, ExtendedAddress, NetworkState, Platform, ProfileId, SequenceId,
    ShortAddress, SourceAddress, TxOptions, Version,
};

const BAUD: u32 = 38400;

/// Opens the byte stream to an adapter. Called again whenever the engine decides the adapter needs
/// to be reconnected.
pub trait Connector: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn connect(&mut self) -> Result<Self::Stream>;
}

/// Connects to an adapter attached to a serial port.
#[derive(Clone, Debug)]
pub struct SerialConnector {
    path: PathBuf,
    baud: u32,
}

impl SerialConnector {
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            path: path.into(),
            baud: BAUD,
        }
    }

    pub fn baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }
}

impl Connector for SerialConnector {
    type Stream = SerialStream;

    fn connect(&mut self) -> Result<SerialStream> {
        let path = self.path.to_string_lossy().into_owned();
        info!("opening {} at {} baud", path, self.baud);

        let tty = tokio_serial::new(path, self.baud)
            .timeout(Duration::from_secs(60))
            .open_native_async()?;

        Ok(tty)
    }
}

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub trait ReadWire: Sized {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read;
}

pub trait WriteWire {
    fn wire_len(&self) -> u16;

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write;
}

impl ReadWire for u8 {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(r.read_u8()?)
    }
}

impl WriteWire for u8 {
    fn wire_len(&self) -> u16 {
        1
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_u8(*self)?;
        Ok(())
    }
}

impl ReadWire for u16 {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(r.read_u16::<LittleEndian>()?)
    }
}

impl WriteWire for u16 {
    fn wire_len(&self) -> u16 {
        2
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_u16::<LittleEndian>(*self)?;
        Ok(())
    }
}

impl ReadWire for u32 {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(r.read_u32::<LittleEndian>()?)
    }
}

impl WriteWire for u32 {
    fn wire_len(&self) -> u16 {
        4
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_u32::<LittleEndian>(*self)?;
        Ok(())
    }
}

impl ReadWire for u64 {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(r.read_u64::<LittleEndian>()?)
    }
}

impl WriteWire for u64 {
    fn wire_len(&self) -> u16 {
        8
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_u64::<LittleEndian>(*self)?;
        Ok(())
    }
}

pub trait ReadWireExt {
    fn read_wire<T>(&mut self) -> Result<T>
    where
        T: ReadWire;
}

impl<R> ReadWireExt for R
where
    R: Read,
{
    fn read_wire<T>(&mut self) -> Result<T>
    where
        T: ReadWire,
    {
        T::read_wire(self)
    }
}

pub trait WriteWireExt {
    fn write_wire<T>(&mut self, value: &T) -> Result<()>
    where
        T: WriteWire;
}

impl<W> WriteWireExt for W
where
    W: Write,
{
    fn write_wire<T>(&mut self, value: &T) -> Result<()>
    where
        T: WriteWire,
    {
        value.write_wire(self)
    }
}
