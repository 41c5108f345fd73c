//! The queue of requests waiting to be sent.

use super::arena::Key;
use std::collections::BTreeMap;

//------------ Ticket --------------------------------------------------------

/// A request’s position in the send queue.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Ticket(u64);

//------------ SendQueue -----------------------------------------------------

/// A FIFO queue of requests that supports removal from the middle.
///
/// Each request that is pushed gets a [`Ticket`]. Tickets are handed out
/// in increasing order so the queue is ordered by them. A request that is
/// cancelled before it was sent is removed via its ticket.
#[derive(Debug, Default)]
pub struct SendQueue {
    /// The queued requests by ticket.
    queue: BTreeMap<Ticket, Key>,

    /// The next ticket to hand out.
    next: u64,
}

impl SendQueue {
    /// Creates a new, empty queue.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of queued requests.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Appends a request to the end of the queue.
    pub fn push(&mut self, key: Key) -> Ticket {
        let ticket = Ticket(self.next);
        self.next += 1;
        self.queue.insert(ticket, key);
        ticket
    }

    /// Returns the request at the front of the queue.
    pub fn front(&self) -> Option<(Ticket, Key)> {
        self.queue
            .first_key_value()
            .map(|(ticket, key)| (*ticket, *key))
    }

    /// Removes a request from the queue.
    pub fn remove(&mut self, ticket: Ticket) -> Option<Key> {
        self.queue.remove(&ticket)
    }
}

//============ Tests =========================================================
