use crate::{AdapterStatus, Result, SequenceId};

/// Command identifier as it appears on the wire. deCONZ uses one byte, the escaped legacy framing
/// uses two.
pub type CommandKind = u16;

/// One decoded command, response or event, stripped of its framing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: CommandKind,
    pub sequence_id: SequenceId,
    pub status: AdapterStatus,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: CommandKind, sequence_id: SequenceId, payload: Vec<u8>) -> Self {
        Self {
            command,
            sequence_id,
            status: AdapterStatus::Success,
            payload,
        }
    }

    pub fn with_status(mut self, status: AdapterStatus) -> Self {
        self.status = status;
        self
    }
}

/// Turns a byte stream into frames and back. Each adapter family brings its own framing; the
/// engine only ever sees `Frame`s.
///
/// Decoding is incremental: bytes may arrive split at arbitrary points, and a single read may
/// contain several frames.
pub trait Codec: Send {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>>;

    /// Feeds received bytes, returning every frame (or framing error) they complete.
    fn decode(&mut self, bytes: &[u8]) -> Vec<Result<Frame>>;

    /// Drops any partially received frame.
    fn reset(&mut self);
}
