use std::convert::TryFrom;
use std::fmt::{self, Display};
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{Error, ErrorKind, ReadWire, Result, WriteWire};

macro_rules! define_parameters {
    ($(($param:ident, $id:literal, $ty:ty)),+ $(,)?) => {
        pub const PARAMETERS: &[ParameterId] = &[$(ParameterId::$param),+];

        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum ParameterId {
            $($param),+
        }

        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum Parameter {
            $($param($ty)),+
        }

        impl Parameter {
            pub fn id(&self) -> ParameterId {
                match self {
                    $(Parameter::$param(_) => ParameterId::$param),+
                }
            }

            pub fn len(&self) -> u16 {
                match self {
                    $(Parameter::$param(_) => <$ty as ConvertParameter>::len()),+
                }
            }

            pub fn write<W>(&self, buffer: &mut W) -> Result<()>
            where
                W: Write,
            {
                match self {
                    $(Parameter::$param(value) => ConvertParameter::write(value, buffer)),+
                }
            }
        }

        impl ParameterId {
            pub fn read_parameter<R>(&self, buffer: &mut R) -> Result<Parameter>
            where
                R: Read,
            {
                match self {
                    $(
                        ParameterId::$param => {
                            let param = <$ty as ConvertParameter>::read(buffer)
                                .map_err(|err| {
                                    Error {
                                        kind: ErrorKind::InvalidParameter {
                                            parameter_id: *self,
                                            inner: Box::new(err),
                                        }
                                    }
                                })?;
                            Ok(Parameter::$param(param))
                        }
                    )+
                }
            }
        }

        impl Display for ParameterId {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(ParameterId::$param => write!(f, "{} ({:#04x})", stringify!($param), $id)),+
                }
            }
        }

        impl TryFrom<u8> for ParameterId {
            type Error = Error;

            fn try_from(byte: u8) -> Result<Self> {
                match byte {
                    $($id => Ok(ParameterId::$param),)+
                    _ => Err(Error { kind: ErrorKind::UnsupportedParameter(byte) }),
                }
            }
        }

        impl From<ParameterId> for u8 {
            fn from(id: ParameterId) -> u8 {
                match id {
                    $(ParameterId::$param => $id,)+
                }
            }
        }
    };
}

define_parameters! {
    (MacAddress, 0x01, u64),
    (NwkPanId, 0x05, u16),
    (NwkAddress, 0x07, u16),
    (NwkExtendedPanId, 0x08, u64),
    (ApsDesignatedCoordinator, 0x09, u8),
    (ChannelMask, 0x0A, u32),
    (ApsExtendedPanId, 0x0B, u64),
    (TrustCenterAddress, 0x0E, u64),
    (SecurityMode, 0x10, u8),
    (PredefinedNwkPanId, 0x15, u8),
    (NetworkKey, 0x18, NetworkKey),
    (CurrentChannel, 0x1C, u8),
    (ProtocolVersion, 0x22, u16),
    (NwkUpdateId, 0x24, u8),
    (WatchdogTtl, 0x26, u32),
}

impl ReadWire for ParameterId {
    fn read_wire<R>(r: &mut R) -> Result<Self>
    where
        R: Read,
    {
        ParameterId::try_from(r.read_u8()?)
    }
}

impl WriteWire for ParameterId {
    fn wire_len(&self) -> u16 {
        1
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        w.write_u8(u8::from(*self))?;
        Ok(())
    }
}

impl WriteWire for Parameter {
    fn wire_len(&self) -> u16 {
        self.len()
    }

    fn write_wire<W>(&self, w: &mut W) -> Result<()>
    where
        W: Write,
    {
        self.write(w)
    }
}

/// Network key slot as stored by the adapter: key index followed by the 128-bit key.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct NetworkKey {
    pub index: u8,
    pub key: [u8; 16],
}

impl fmt::Debug for NetworkKey {
    // Keep key material out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkKey(index {}, ..)", self.index)
    }
}

trait ConvertParameter: Sized {
    fn len() -> u16;
    fn read<R>(buffer: &mut R) -> Result<Self>
    where
        R: Read;
    fn write<W>(&self, buffer: &mut W) -> Result<()>
    where
        W: Write;
}

impl ConvertParameter for u8 {
    fn len() -> u16 {
        1
    }

    fn read<R>(buffer: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(buffer.read_u8()?)
    }

    fn write<W>(&self, buffer: &mut W) -> Result<()>
    where
        W: Write,
    {
        buffer.write_u8(*self)?;
        Ok(())
    }
}

impl ConvertParameter for u16 {
    fn len() -> u16 {
        2
    }

    fn read<R>(buffer: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(buffer.read_u16::<LittleEndian>()?)
    }

    fn write<W>(&self, buffer: &mut W) -> Result<()>
    where
        W: Write,
    {
        buffer.write_u16::<LittleEndian>(*self)?;
        Ok(())
    }
}

impl ConvertParameter for u32 {
    fn len() -> u16 {
        4
    }

    fn read<R>(buffer: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(buffer.read_u32::<LittleEndian>()?)
    }

    fn write<W>(&self, buffer: &mut W) -> Result<()>
    where
        W: Write,
    {
        buffer.write_u32::<LittleEndian>(*self)?;
        Ok(())
    }
}

impl ConvertParameter for u64 {
    fn len() -> u16 {
        8
    }

    fn read<R>(buffer: &mut R) -> Result<Self>
    where
        R: Read,
    {
        Ok(buffer.read_u64::<LittleEndian>()?)
    }

    fn write<W>(&self, buffer: &mut W) -> Result<()>
    where
        W: Write,
    {
        buffer.write_u64::<LittleEndian>(*self)?;
        Ok(())
    }
}

impl ConvertParameter for NetworkKey {
    fn len() -> u16 {
        17
    }

    fn read<R>(buffer: &mut R) -> Result<Self>
    where
        R: Read,
    {
        let index = buffer.read_u8()?;
        let mut key = [0; 16];
        buffer.read_exact(&mut key)?;
        Ok(NetworkKey { index, key })
    }

    fn write<W>(&self, buffer: &mut W) -> Result<()>
    where
        W: Write,
    {
        buffer.write_u8(self.index)?;
        buffer.write_all(&self.key)?;
        Ok(())
    }
}
