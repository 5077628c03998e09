use std::convert::TryFrom;

use crate::{AdapterStatus, Codec, Frame, FramingError, Result};

const START: u8 = 0x01;
const ESC: u8 = 0x02;
const END: u8 = 0x03;
const ESC_MASK: u8 = 0x10;

/// Type (2), length (2), CRC (1).
const HEADER_LEN: usize = 5;

/// Byte-oriented framing used by the legacy NXP-based adapters:
///
/// ```text
/// 0x01 | type (u16 BE) | length (u16 BE) | crc (u8) | payload | 0x03
/// ```
///
/// Every byte between the markers below 0x10 is sent as `0x02, byte ^ 0x10`. The CRC is the XOR of
/// the type, length and payload bytes. The sequence number travels as the first payload byte;
/// this framing has no status field, so decoded frames always report success.
#[derive(Debug, Default)]
pub struct EscapedCodec {
    buffer: Vec<u8>,
    in_frame: bool,
    escaped: bool,
}

impl EscapedCodec {
    pub fn new() -> Self {
        Default::default()
    }

    fn finish_frame(&mut self) -> Result<Frame> {
        let raw = std::mem::take(&mut self.buffer);
        self.in_frame = false;
        self.escaped = false;

        if raw.len() < HEADER_LEN {
            return Err(FramingError::FrameTooShort(raw.len()).into());
        }

        let command = u16::from_be_bytes([raw[0], raw[1]]);
        let declared = usize::from(u16::from_be_bytes([raw[2], raw[3]]));
        let actual_crc = raw[4];
        let body = &raw[HEADER_LEN..];

        if declared != body.len() {
            return Err(FramingError::LengthMismatch {
                declared,
                actual: body.len(),
            }
            .into());
        }

        let expected_crc = crc(&raw[..4], body);
        if expected_crc != actual_crc {
            return Err(FramingError::MismatchedCrc {
                expected: expected_crc.into(),
                actual: actual_crc.into(),
            }
            .into());
        }

        let (&sequence_id, payload) = body
            .split_first()
            .ok_or(FramingError::FrameTooShort(raw.len()))?;

        Ok(Frame {
            command,
            sequence_id,
            status: AdapterStatus::Success,
            payload: payload.to_vec(),
        })
    }
}

impl Codec for EscapedCodec {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        let body_len = frame.payload.len() + 1;
        let length =
            u16::try_from(body_len).map_err(|_| FramingError::Oversized(frame.payload.len()))?;

        let mut raw = Vec::with_capacity(HEADER_LEN + body_len);
        raw.extend_from_slice(&frame.command.to_be_bytes());
        raw.extend_from_slice(&length.to_be_bytes());
        raw.push(0);
        raw.push(frame.sequence_id);
        raw.extend_from_slice(&frame.payload);
        raw[4] = crc(&raw[..4], &raw[HEADER_LEN..]);

        let mut out = Vec::with_capacity(raw.len() * 2 + 2);
        out.push(START);
        for byte in raw {
            if byte < ESC_MASK {
                out.push(ESC);
                out.push(byte ^ ESC_MASK);
            } else {
                out.push(byte);
            }
        }
        out.push(END);

        Ok(out)
    }

    fn decode(&mut self, bytes: &[u8]) -> Vec<Result<Frame>> {
        let mut frames = Vec::new();

        for &byte in bytes {
            match byte {
                START => {
                    if self.in_frame {
                        debug!("escaped codec: discarding {} bytes", self.buffer.len());
                    }
                    self.buffer.clear();
                    self.in_frame = true;
                    self.escaped = false;
                }
                END if self.in_frame => frames.push(self.finish_frame()),
                // Noise between frames.
                _ if !self.in_frame => {}
                ESC => self.escaped = true,
                byte if self.escaped => {
                    self.escaped = false;
                    self.buffer.push(byte ^ ESC_MASK);
                }
                byte => self.buffer.push(byte),
            }
        }

        frames
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.in_frame = false;
        self.escaped = false;
    }
}

fn crc(header: &[u8], body: &[u8]) -> u8 {
    header.iter().chain(body).fold(0, |crc, byte| crc ^ byte)
}
