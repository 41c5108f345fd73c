//! The registry of outstanding lookups.
//!
//! Each outstanding request is referenced from four places: the registry
//! by its caller’s [`Handle`], the [`IdMap`] by its transaction ID, the
//! [`Timeouts`] by its deadline, and, until it has been sent, the
//! [`SendQueue`]. The [`Lookups`] type owns all four together with the
//! arena the requests live in and only ever changes them together.

use super::arena::{Arena, Key};
use super::clock::Tick;
use super::error::Error;
use super::ids::IdMap;
use super::queue::{SendQueue, Ticket};
use super::timeout::{Deadline, Timeouts};
use crate::base::iana::Rtype;
use crate::base::name::HostName;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};

//------------ Handle --------------------------------------------------------

/// The caller’s identity for a lookup.
///
/// At most one lookup per handle can be outstanding at any time. The
/// handle is needed to cancel a lookup.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Handle(u64);

impl Handle {
    /// Creates a new handle that differs from all other handles created
    /// through this function.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1 << 63);
        Handle(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a handle from a raw value chosen by the caller.
    ///
    /// Values with the top bit set are used by [`Handle::new`].
    pub const fn from_raw(value: u64) -> Self {
        Handle(value)
    }

    /// Returns the raw value of the handle.
    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//------------ Callback ------------------------------------------------------

/// The completion callback of a lookup.
pub type Callback = Box<dyn FnOnce(Result<IpAddr, Error>) + Send + 'static>;

//------------ Request -------------------------------------------------------

/// An outstanding lookup.
pub struct Request {
    /// The caller’s handle.
    handle: Handle,

    /// The name to look up.
    host: HostName,

    /// The record type currently asked for.
    rtype: Rtype,

    /// The transaction ID.
    id: u16,

    /// The server to ask if not the default one.
    server: Option<SocketAddr>,

    /// Where the timeout is scheduled.
    deadline: Deadline,

    /// The position in the send queue or `None` if the query has been sent.
    queued: Option<Ticket>,

    /// The function to call with the result.
    callback: Callback,
}

impl Request {
    /// Returns the caller’s handle.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns the host name.
    pub fn host(&self) -> &HostName {
        &self.host
    }

    /// Returns the record type currently asked for.
    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns the server requested for this lookup.
    pub fn server(&self) -> Option<SocketAddr> {
        self.server
    }

    /// Returns whether the query has been sent.
    pub fn is_sent(&self) -> bool {
        self.queued.is_none()
    }

    /// Delivers the result to the caller, consuming the request.
    pub fn complete(self, result: Result<IpAddr, Error>) {
        (self.callback)(result)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Request")
            .field("handle", &self.handle)
            .field("host", &self.host)
            .field("rtype", &self.rtype)
            .field("id", &self.id)
            .field("server", &self.server)
            .field("deadline", &self.deadline)
            .field("queued", &self.queued)
            .finish()
    }
}

//------------ Lookups -------------------------------------------------------

/// All outstanding lookups.
#[derive(Debug)]
pub struct Lookups {
    /// The requests.
    arena: Arena<Request>,

    /// The requests by caller handle.
    registry: HashMap<Handle, Key>,

    /// The requests by transaction ID.
    ids: IdMap,

    /// The requests by deadline.
    timeouts: Timeouts,

    /// The requests waiting to be sent.
    queue: SendQueue,
}

impl Lookups {
    /// Creates an empty set of lookups with the clock at `now`.
    pub fn new(now: Tick) -> Self {
        Lookups {
            arena: Arena::new(),
            registry: HashMap::new(),
            ids: IdMap::new(),
            timeouts: Timeouts::new(now),
            queue: SendQueue::new(),
        }
    }

    /// Returns the number of outstanding lookups.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns whether there are no outstanding lookups.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Returns whether there are requests waiting to be sent.
    pub fn has_queued(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Restarts deadline tracking at `now`.
    ///
    /// This must be called before adding the first lookup after a pause in
    /// sweeping.
    pub fn rearm(&mut self, now: Tick) {
        self.timeouts.rearm(now)
    }

    /// Adds a new lookup.
    ///
    /// The lookup asks for AAAA records first, is scheduled to time out
    /// `timeout` ticks after `now`, and is queued for sending.
    pub fn insert(
        &mut self,
        handle: Handle,
        host: HostName,
        server: Option<SocketAddr>,
        now: Tick,
        timeout: Tick,
        callback: Callback,
    ) -> Result<Key, Error> {
        if self.registry.contains_key(&handle) {
            return Err(Error::AlreadyInProgress);
        }

        // ID allocation is the only step that can fail, so it goes first
        // and nothing needs undoing.
        let key = self.arena.next_key();
        let id = self.ids.allocate(key)?;
        let deadline = self.timeouts.schedule(key, now, timeout);
        let ticket = self.queue.push(key);
        self.registry.insert(handle, key);
        let inserted = self.arena.insert(Request {
            handle,
            host,
            rtype: Rtype::AAAA,
            id,
            server,
            deadline,
            queued: Some(ticket),
            callback,
        });
        debug_assert_eq!(inserted, key);
        Ok(key)
    }

    /// Returns the request for `key`.
    pub fn get(&self, key: Key) -> Option<&Request> {
        self.arena.get(key)
    }

    /// Returns the key of the request with transaction ID `id`.
    pub fn by_id(&self, id: u16) -> Option<Key> {
        self.ids.get(id)
    }

    /// Removes a request from all bookkeeping and returns it.
    pub fn remove(&mut self, key: Key) -> Option<Request> {
        let request = self.arena.remove(key)?;
        self.registry.remove(&request.handle);
        self.ids.remove(request.id);
        self.timeouts.remove(request.deadline, key);
        if let Some(ticket) = request.queued {
            self.queue.remove(ticket);
        }
        Some(request)
    }

    /// Removes the request for `handle` and returns it.
    pub fn remove_handle(&mut self, handle: Handle) -> Option<Request> {
        let key = *self.registry.get(&handle)?;
        self.remove(key)
    }

    /// Removes all requests.
    pub fn drain(&mut self) -> Vec<Request> {
        self.registry.clear();
        self.ids = IdMap::new();
        self.timeouts.clear();
        self.queue = SendQueue::new();
        self.arena.drain()
    }

    /// Returns the first request waiting to be sent.
    pub fn front_queued(&self) -> Option<Key> {
        self.queue.front().map(|(_, key)| key)
    }

    /// Marks a request as sent, taking it off the send queue.
    pub fn mark_sent(&mut self, key: Key) {
        if let Some(request) = self.arena.get_mut(key) {
            if let Some(ticket) = request.queued.take() {
                self.queue.remove(ticket);
            }
        }
    }

    /// Switches a request to asking for A records and queues it again.
    ///
    /// The request keeps its transaction ID and deadline.
    pub fn fall_back_to_a(&mut self, key: Key) {
        if let Some(request) = self.arena.get_mut(key) {
            request.rtype = Rtype::A;
            if request.queued.is_none() {
                request.queued = Some(self.queue.push(key));
            }
        }
    }

    /// Removes the expired deadlines and returns their keys.
    ///
    /// The requests themselves stay registered. Each needs to be removed
    /// via [`remove`][Self::remove] before its result is delivered.
    pub fn sweep(&mut self, now: Tick) -> Vec<Key> {
        self.timeouts.sweep(now)
    }

    /// Returns the number of ticks until the next deadline sweep is due.
    pub fn next_wait(&self, now: Tick) -> Option<Tick> {
        self.timeouts.next_wait(now)
    }

    /// Checks that all four structures agree.
    #[cfg(test)]
    fn check(&self) {
        assert_eq!(self.registry.len(), self.arena.len());
        assert_eq!(self.ids.len(), self.arena.len());
        for (handle, key) in &self.registry {
            let request = self.arena.get(*key).unwrap();
            assert_eq!(request.handle, *handle);
            assert_eq!(self.ids.get(request.id), Some(*key));
        }
    }
}

//============ Tests =========================================================
