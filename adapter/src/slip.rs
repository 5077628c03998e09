use std::convert::TryFrom;

use crate::{AdapterStatus, Codec, ErrorKind, Frame, FramingError, Result};

const END: u8 = 192;
const ESC: u8 = 219;
const ESC_END: u8 = 220;
const ESC_ESC: u8 = 221;

/// Command (1), sequence (1), status (1), frame length (2).
const HEADER_LEN: usize = 5;
const CRC_LEN: usize = 2;

/// deCONZ serial framing: SLIP-delimited frames with a little-endian header and a 16-bit
/// two's-complement sum as CRC.
#[derive(Debug, Default)]
pub struct SlipCodec {
    buffer: Vec<u8>,
    escaped: bool,
    invalid_escape: bool,
}

impl SlipCodec {
    pub fn new() -> Self {
        Default::default()
    }

    fn finish_frame(&mut self) -> Result<Frame> {
        let frame = std::mem::take(&mut self.buffer);
        let invalid_escape = std::mem::replace(&mut self.invalid_escape, false);
        self.escaped = false;

        if invalid_escape {
            return Err(FramingError::InvalidEscape.into());
        }

        let frame = check_and_remove_crc(frame)?;
        if frame.len() < HEADER_LEN {
            return Err(FramingError::FrameTooShort(frame.len()).into());
        }

        let declared = usize::from(u16::from_le_bytes([frame[3], frame[4]]));
        if declared != frame.len() {
            return Err(FramingError::LengthMismatch {
                declared,
                actual: frame.len(),
            }
            .into());
        }

        Ok(Frame {
            command: frame[0].into(),
            sequence_id: frame[1],
            status: AdapterStatus::from(frame[2]),
            payload: frame[HEADER_LEN..].to_vec(),
        })
    }
}

fn check_and_remove_crc(frame: Vec<u8>) -> Result<Vec<u8>> {
    if frame.len() < CRC_LEN {
        return Err(FramingError::MissingCrc.into());
    }
    let len = frame.len() - CRC_LEN;

    // Check CRC16 matches:
    let actual = u16::from_le_bytes([frame[len], frame[len + 1]]);
    let expected = crc16(&frame[..len]);

    if actual != expected {
        return Err(FramingError::MismatchedCrc { expected, actual }.into());
    }

    // Remove CRC16 bytes from returned frame:
    let mut frame = frame;
    frame.truncate(len);

    Ok(frame)
}

impl Codec for SlipCodec {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        let command = u8::try_from(frame.command)
            .map_err(|_| ErrorKind::UnsupportedCommand(frame.command))?;
        let frame_len = u16::try_from(HEADER_LEN + frame.payload.len())
            .map_err(|_| FramingError::Oversized(frame.payload.len()))?;

        let mut data = Vec::with_capacity(usize::from(frame_len) + CRC_LEN);
        data.push(command);
        data.push(frame.sequence_id);
        data.push(frame.status.into());
        data.extend_from_slice(&frame_len.to_le_bytes());
        data.extend_from_slice(&frame.payload);
        let crc = crc16(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        let mut out = Vec::with_capacity(data.len() + 2);
        out.push(END);
        for byte in data {
            match byte {
                ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
                END => out.extend_from_slice(&[ESC, ESC_END]),
                byte => out.push(byte),
            }
        }
        out.push(END);

        Ok(out)
    }

    fn decode(&mut self, bytes: &[u8]) -> Vec<Result<Frame>> {
        let mut frames = Vec::new();

        for &byte in bytes {
            if byte == END {
                // Skip END bytes at start of frame.
                if !self.buffer.is_empty() || self.invalid_escape {
                    frames.push(self.finish_frame());
                }
                continue;
            }

            if self.escaped {
                self.escaped = false;
                match byte {
                    ESC_ESC => self.buffer.push(ESC),
                    ESC_END => self.buffer.push(END),
                    _ => self.invalid_escape = true,
                }
                continue;
            }

            if byte == ESC {
                self.escaped = true;
                continue;
            }

            self.buffer.push(byte);
        }

        frames
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.escaped = false;
        self.invalid_escape = false;
    }
}

fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc = crc.wrapping_add(u16::from(*byte));
    }
    (!crc).wrapping_add(1)
}
