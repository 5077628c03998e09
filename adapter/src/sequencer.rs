use std::collections::VecDeque;
use std::time::Duration;

use coordinator_helpers::IncrementingId;
use tokio::time::Instant;

use crate::{CommandKind, Error, ErrorKind, Frame, Result, SequenceId};

/// Identifies a transaction for the lifetime of a `Sequencer`. Unlike sequence numbers, these are
/// never reused.
pub type TransactionId = u64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Priority {
    Normal,
    /// Jumps every `Normal` item. Used for draining the adapter's indication and confirm queues.
    High,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransactionState {
    Queued,
    InFlight,
    Completed,
    TimedOut,
    Aborted,
}

/// An encoded command waiting for its turn on the wire.
#[derive(Clone, Debug)]
pub struct Command {
    pub kind: CommandKind,
    /// Command kind the matching reply carries.
    pub reply_kind: CommandKind,
    pub payload: Vec<u8>,
    pub timeout: Duration,
}

impl Command {
    pub fn new(kind: CommandKind, payload: Vec<u8>, timeout: Duration) -> Self {
        Self {
            kind,
            reply_kind: kind,
            payload,
            timeout,
        }
    }

    pub fn reply_kind(mut self, reply_kind: CommandKind) -> Self {
        self.reply_kind = reply_kind;
        self
    }
}

/// The final outcome of a transaction, handed back with the caller's token.
#[derive(Debug)]
pub struct Completion<T> {
    pub id: TransactionId,
    pub token: T,
    pub state: TransactionState,
    pub result: Result<Frame>,
}

struct Transaction<T> {
    id: TransactionId,
    command: Command,
    token: T,
    sequence_id: SequenceId,
    deadline: Instant,
}

struct Queued<T> {
    id: TransactionId,
    command: Command,
    priority: Priority,
    token: T,
}

/// Serializes commands over a link that accepts one outstanding command at a time.
///
/// The sequencer does no I/O. The owner feeds it received frames, timer ticks and transport
/// availability, takes frames to transmit from `poll_transmit`, and collects finished transactions
/// from `poll_completion`. Each transaction carries an opaque token `T` that is returned with its
/// completion.
pub struct Sequencer<T> {
    queue: VecDeque<Queued<T>>,
    in_flight: Option<Transaction<T>>,
    completions: VecDeque<Completion<T>>,
    sequence: IncrementingId,
    next_id: TransactionId,
    available: bool,
}

impl<T> Default for Sequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Sequencer<T> {
    /// Creates a sequencer whose transport is not yet available.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: None,
            completions: VecDeque::new(),
            sequence: IncrementingId::new(),
            next_id: 0,
            available: false,
        }
    }

    pub fn enqueue(&mut self, command: Command, priority: Priority, token: T) -> TransactionId {
        let id = self.next_id;
        self.next_id += 1;

        if !self.available {
            debug!("transport unavailable, aborting {:#04x}", command.kind);
            self.completions.push_back(Completion {
                id,
                token,
                state: TransactionState::Aborted,
                result: Err(ErrorKind::TransportUnavailable.into()),
            });
            return id;
        }

        let queued = Queued {
            id,
            command,
            priority,
            token,
        };

        match priority {
            Priority::Normal => self.queue.push_back(queued),
            Priority::High => {
                // Ahead of every Normal item, behind earlier High items.
                let index = self
                    .queue
                    .iter()
                    .position(|queued| queued.priority == Priority::Normal)
                    .unwrap_or_else(|| self.queue.len());
                self.queue.insert(index, queued);
            }
        }

        id
    }

    /// Takes the next command off the queue if nothing is in flight. The returned frame is
    /// considered transmitted from `now`.
    pub fn poll_transmit(&mut self, now: Instant) -> Option<Frame> {
        if self.in_flight.is_some() || !self.available {
            return None;
        }

        let Queued {
            id, command, token, ..
        } = self.queue.pop_front()?;

        let sequence_id = self.sequence.next();
        let frame = Frame::new(command.kind, sequence_id, command.payload.clone());
        debug!(
            "transmitting {:#04x} (seq {}, transaction {})",
            command.kind, sequence_id, id
        );

        self.in_flight = Some(Transaction {
            id,
            deadline: now + command.timeout,
            command,
            token,
            sequence_id,
        });

        Some(frame)
    }

    /// Offers a received frame. Frames that are not the reply to the in-flight command are handed
    /// back to the caller as unsolicited.
    pub fn on_frame_received(&mut self, frame: Frame) -> Option<Frame> {
        let matches = self.in_flight.as_ref().map_or(false, |transaction| {
            transaction.sequence_id == frame.sequence_id
                && transaction.command.reply_kind == frame.command
        });

        if !matches {
            self.sequence.reseed(frame.sequence_id.wrapping_add(1));
            return Some(frame);
        }

        if let Some(transaction) = self.in_flight.take() {
            let result = if frame.status.is_success() {
                Ok(frame)
            } else {
                Err(ErrorKind::AdapterStatus(frame.status).into())
            };
            self.finish(transaction, TransactionState::Completed, result);
        }

        None
    }

    /// Times out transaction `id` if it is still in flight. Returns whether anything happened, so
    /// firing the same timer twice is harmless.
    pub fn on_timer_fired(&mut self, id: TransactionId) -> bool {
        match self.in_flight.take() {
            Some(transaction) if transaction.id == id => {
                warn!(
                    "transaction {} ({:#04x}, seq {}) timed out",
                    id, transaction.command.kind, transaction.sequence_id
                );
                self.finish(
                    transaction,
                    TransactionState::TimedOut,
                    Err(ErrorKind::Timeout.into()),
                );
                true
            }
            other => {
                self.in_flight = other;
                false
            }
        }
    }

    /// Fires the in-flight timer if its deadline has passed.
    pub fn poll_timeout(&mut self, now: Instant) -> bool {
        match self.in_flight.as_ref() {
            Some(transaction) if transaction.deadline <= now => {
                let id = transaction.id;
                self.on_timer_fired(id)
            }
            _ => false,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.as_ref().map(|transaction| transaction.deadline)
    }

    pub fn on_transport_availability_changed(&mut self, available: bool) {
        if self.available == available {
            return;
        }
        self.available = available;

        if available {
            info!("transport available");
            return;
        }

        let aborted = usize::from(self.in_flight.is_some()) + self.queue.len();
        info!("transport unavailable, aborting {} transactions", aborted);

        if let Some(transaction) = self.in_flight.take() {
            self.finish(transaction, TransactionState::Aborted, Err(transport_unavailable()));
        }
        while let Some(queued) = self.queue.pop_front() {
            self.completions.push_back(Completion {
                id: queued.id,
                token: queued.token,
                state: TransactionState::Aborted,
                result: Err(transport_unavailable()),
            });
        }

        self.sequence.reset();
    }

    pub fn poll_completion(&mut self) -> Option<Completion<T>> {
        self.completions.pop_front()
    }

    /// Current state of a transaction that has not yet been collected with `poll_completion`.
    pub fn state(&self, id: TransactionId) -> Option<TransactionState> {
        if self.in_flight.as_ref().map(|t| t.id) == Some(id) {
            return Some(TransactionState::InFlight);
        }
        if self.queue.iter().any(|queued| queued.id == id) {
            return Some(TransactionState::Queued);
        }
        self.completions
            .iter()
            .find(|completion| completion.id == id)
            .map(|completion| completion.state)
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn in_flight(&self) -> Option<TransactionId> {
        self.in_flight.as_ref().map(|transaction| transaction.id)
    }

    pub fn in_flight_count(&self) -> usize {
        usize::from(self.in_flight.is_some())
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// The sequence number the next transmitted command will carry.
    pub fn next_sequence_id(&self) -> SequenceId {
        self.sequence.peek()
    }

    fn finish(&mut self, transaction: Transaction<T>, state: TransactionState, result: Result<Frame>) {
        self.completions.push_back(Completion {
            id: transaction.id,
            token: transaction.token,
            state,
            result,
        });
    }
}

fn transport_unavailable() -> Error {
    ErrorKind::TransportUnavailable.into()
}
