pub mod awaiting;

use tokio::sync::oneshot;

/// Counter that generates u8 identifiers (sequence numbers, request IDs, ZDO transaction IDs),
/// wrapping on overflow.
#[derive(Clone, Debug, Default)]
pub struct IncrementingId {
    next: u8,
}

impl IncrementingId {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn starting_at(next: u8) -> Self {
        Self { next }
    }

    pub fn next(&mut self) -> u8 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    pub fn peek(&self) -> u8 {
        self.next
    }

    /// Continue counting from `next`. Used to follow IDs chosen by the other side of a link.
    pub fn reseed(&mut self, next: u8) {
        self.next = next;
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }

    /// Returns the next ID for which `taken` is false, or None when all 256 IDs are taken.
    pub fn next_free<F>(&mut self, taken: F) -> Option<u8>
    where
        F: Fn(u8) -> bool,
    {
        for _ in 0..=u8::MAX {
            let id = self.next();
            if !taken(id) {
                return Some(id);
            }
        }
        None
    }
}

/// Sends `value` to whoever holds the receiving half. Returns false if they stopped listening.
pub fn reply<T>(sender: oneshot::Sender<T>, value: T) -> bool {
    sender.send(value).is_ok()
}
