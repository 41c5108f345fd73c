//! The resolver.
//!
//! A [`Resolver`] accepts lookups from any number of threads and hands them
//! to a single background worker thread that owns the UDP socket. The
//! worker is started when the first lookup arrives and ends once there is
//! nothing left to do. The next lookup then starts a new worker. Each
//! such worker is called a generation. A new generation joins its
//! predecessor before doing anything else, so two generations never
//! touch the shared state at the same time.
//!
//! The lookups themselves are kept in a [`Lookups`] value behind the state
//! lock which is shared between the resolver and its worker. A second,
//! re-entrant lock is held while a completion callback runs. This allows
//! [`Resolver::cancel`] to wait for a callback that is currently running
//! so that no callback is running or will run for a lookup once `cancel`
//! has returned.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use super::clock::{duration_to_ticks, Clock, Tick, MAX_TICKS};
use super::conf::{ServerDiscovery, SystemDiscovery};
use super::error::Error;
use super::lookups::{Callback, Handle, Lookups};
use super::worker::{Control, Worker};
use crate::base::name::HostName;
use core::cmp;
use parking_lot::{Mutex, ReentrantMutex};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use std::{fmt, io};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

//------------ Configuration Constants ----------------------------------------

/// The longest timeout or wait in milliseconds.
const MAX_MILLIS: u64 = MAX_TICKS as u64;

/// Configuration limits for the timeout of a lookup.
const TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(5),
    Duration::from_millis(1),
    Duration::from_millis(MAX_MILLIS),
);

/// Configuration limits for the longest time the worker waits at once.
const MAX_WAIT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_millis(MAX_MILLIS),
    Duration::from_millis(1),
    Duration::from_millis(MAX_MILLIS),
);

/// The default name of worker threads.
const DEF_THREAD_NAME: &str = "netlookup-worker";

//------------ Config ---------------------------------------------------------

/// Configuration for a resolver.
#[derive(Clone, Debug)]
pub struct Config {
    /// Where to get the default server from.
    discovery: Arc<dyn ServerDiscovery>,

    /// The longest time the worker waits for something to happen.
    max_wait: Duration,

    /// The value of the resolver’s millisecond clock at creation.
    initial_tick: Tick,

    /// The name of the worker thread.
    thread_name: String,
}

impl Config {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the server discovery.
    pub fn discovery(&self) -> &Arc<dyn ServerDiscovery> {
        &self.discovery
    }

    /// Sets the server discovery.
    ///
    /// Each new worker asks the discovery for the server to use for lookups
    /// that don’t name their own server.
    pub fn set_discovery(&mut self, discovery: impl ServerDiscovery + 'static) {
        self.discovery = Arc::new(discovery)
    }

    /// Returns the longest time the worker waits at once.
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Sets the longest time the worker waits at once.
    ///
    /// If this value is too small or too large, it will be caped.
    pub fn set_max_wait(&mut self, value: Duration) {
        self.max_wait = MAX_WAIT.limit(value)
    }

    /// Returns the tick value the resolver’s clock starts at.
    pub fn initial_tick(&self) -> Tick {
        self.initial_tick
    }

    /// Sets the tick value the resolver’s clock starts at.
    ///
    /// The clock counts milliseconds and wraps around at 2^32. Only tests
    /// that want to see the wraparound have a reason to change this.
    pub fn set_initial_tick(&mut self, value: Tick) {
        self.initial_tick = value
    }

    /// Returns the name of the worker thread.
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Sets the name of the worker thread.
    pub fn set_thread_name(&mut self, value: impl Into<String>) {
        self.thread_name = value.into()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery: Arc::new(SystemDiscovery),
            max_wait: MAX_WAIT.default(),
            initial_tick: 0,
            thread_name: DEF_THREAD_NAME.into(),
        }
    }
}

//------------ Resolver -------------------------------------------------------

/// An asynchronous stub resolver.
///
/// Lookups are started with [`resolve`][Self::resolve] and report their
/// result through a callback which is run on the resolver’s worker
/// thread. Callbacks should be quick. They may start new lookups,
/// including for their own handle, and cancel other lookups.
///
/// Dropping the resolver asks its worker to shut down. Lookups still
/// outstanding at that point fail with a transport error.
pub struct Resolver {
    /// The state shared with the worker.
    shared: Arc<Shared>,
}

impl Resolver {
    /// Creates a new resolver.
    ///
    /// No thread is started until the first lookup arrives.
    pub fn new(config: Config) -> Self {
        let clock = Clock::new(config.initial_tick);
        Resolver {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    lookups: Lookups::new(clock.now()),
                    worker: None,
                    seq: 0,
                }),
                completion: ReentrantMutex::new(()),
                clock,
                config,
            }),
        }
    }

    /// Returns the process-wide resolver.
    ///
    /// It is created with the default config on first use.
    pub fn global() -> &'static Resolver {
        static GLOBAL: OnceLock<Resolver> = OnceLock::new();
        GLOBAL.get_or_init(|| Resolver::new(Config::default()))
    }

    /// Starts looking up the address of `host`.
    ///
    /// The lookup asks the default server for the host’s IPv6 address
    /// first. If there is none, it asks for the IPv4 address instead.
    /// The result is delivered by calling `callback` exactly once unless
    /// the lookup is cancelled before that. If no answer arrives within
    /// `timeout`, the lookup fails with [`Error::Timeout`].
    ///
    /// If the lookup can’t be started, an error is returned right away and
    /// `callback` is dropped without being called. This happens if the
    /// host name is too long or otherwise invalid, if a lookup for `handle`
    /// is already in progress, or if there are too many lookups.
    pub fn resolve<F>(
        &self,
        handle: Handle,
        host: &str,
        timeout: Duration,
        callback: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(Result<IpAddr, Error>) + Send + 'static,
    {
        self.submit(handle, host, timeout, None, Box::new(callback))
    }

    /// Starts looking up the address of `host` using the given server.
    ///
    /// This is the same as [`resolve`][Self::resolve] except that the
    /// queries go to `server` rather than the default server.
    pub fn resolve_with_server<F>(
        &self,
        handle: Handle,
        host: &str,
        timeout: Duration,
        server: SocketAddr,
        callback: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(Result<IpAddr, Error>) + Send + 'static,
    {
        self.submit(handle, host, timeout, Some(server), Box::new(callback))
    }

    /// Cancels the lookup for `handle`.
    ///
    /// Returns whether a lookup was outstanding. If so, its callback will
    /// not be called. If the callback is currently running, this blocks
    /// until it has finished. Either way, once this returns, the callback
    /// isn’t running anymore.
    pub fn cancel(&self, handle: Handle) -> bool {
        let mut state = self.shared.state.lock();
        match state.lookups.remove_handle(handle) {
            Some(request) => {
                trace!(%handle, "lookup cancelled");
                if state.lookups.is_empty() {
                    state.notify(Control::Stop);
                }
                drop(state);
                drop(request);
                true
            }
            None => {
                drop(state);
                // Wait for a callback that may just be running.
                drop(self.shared.completion.lock());
                false
            }
        }
    }

    /// Returns the number of outstanding lookups.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().lookups.len()
    }

    /// Shuts down the worker and waits for it to finish.
    ///
    /// Lookups still outstanding fail with a transport error. A new worker
    /// is started for the next lookup, so the resolver stays usable.
    ///
    /// This must not be called from within a callback.
    pub fn shutdown(&self) {
        let thread = {
            let mut state = self.shared.state.lock();
            match state.worker.as_mut() {
                Some(slot) => {
                    let _ = slot.control.send(Control::Shutdown);
                    slot.thread.take()
                }
                None => None,
            }
        };
        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!("resolver worker panicked");
            }
        }
        debug_assert!(
            self.shared.state.lock().lookups.is_empty(),
            "lookups left after shutdown"
        );
    }

    /// Registers a lookup and makes sure a worker will process it.
    fn submit(
        &self,
        handle: Handle,
        host: &str,
        timeout: Duration,
        server: Option<SocketAddr>,
        callback: Callback,
    ) -> Result<(), Error> {
        let host = HostName::new(host)?;
        let timeout = duration_to_ticks(TIMEOUT.limit(timeout));
        trace!(%handle, %host, timeout, ?server, "new lookup");

        let mut state = self.shared.state.lock();
        let now = self.shared.clock.now();
        let start = state
            .worker
            .as_ref()
            .map_or(true, |slot| slot.exiting || slot.control.is_closed());
        if start && state.lookups.is_empty() {
            // Nobody has been sweeping deadlines for a while.
            state.lookups.rearm(now);
        }
        state
            .lookups
            .insert(handle, host, server, now, timeout, callback)?;

        if !start {
            state.notify(Control::Send);
            return Ok(());
        }
        if let Err(err) = self.start_worker(&mut state) {
            warn!("failed to start resolver worker: {}", err);
            let request = state.lookups.remove_handle(handle);
            drop(state);
            drop(request);
            return Err(err.into());
        }
        Ok(())
    }

    /// Starts a new worker generation.
    ///
    /// The previous generation, if any, must be exiting. Its thread is
    /// handed to the new one for joining.
    fn start_worker(&self, state: &mut State) -> Result<(), io::Error> {
        let predecessor = state.worker.take().and_then(|slot| slot.thread);
        state.seq += 1;
        let seq = state.seq;
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker::new(self.shared.clone(), seq, rx);
        let thread = thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || worker.run(predecessor))?;
        state.worker = Some(WorkerSlot {
            seq,
            control: tx,
            thread: Some(thread),
            exiting: false,
        });
        debug!(seq, "started resolver worker");
        Ok(())
    }
}

#[cfg(test)]
impl Resolver {
    /// Returns the state shared with the workers.
    pub(super) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.notify(Control::Shutdown);
        if let Some(slot) = state.worker.as_mut() {
            // Detach rather than join: we may be on the worker itself.
            slot.thread.take();
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.shared.config)
            .finish()
    }
}

//------------ Shared ---------------------------------------------------------

/// The part of a resolver shared with its workers.
pub(super) struct Shared {
    /// The lookups and worker bookkeeping.
    pub(super) state: Mutex<State>,

    /// Held while a completion callback runs.
    pub(super) completion: ReentrantMutex<()>,

    /// The millisecond clock for deadlines.
    pub(super) clock: Clock,

    /// The configuration.
    pub(super) config: Config,
}

//------------ State ----------------------------------------------------------

/// The state protected by the state lock.
pub(super) struct State {
    /// The outstanding lookups.
    pub(super) lookups: Lookups,

    /// The current worker generation.
    worker: Option<WorkerSlot>,

    /// The sequence number of the last generation started.
    seq: u64,
}

impl State {
    /// Sends a control message to the current worker.
    ///
    /// If the worker is gone already, the message is dropped.
    fn notify(&self, msg: Control) {
        if let Some(slot) = self.worker.as_ref() {
            let _ = slot.control.send(msg);
        }
    }

    /// Marks generation `seq` as exiting.
    ///
    /// After this, the next lookup starts a new generation.
    pub(super) fn retire(&mut self, seq: u64) {
        if let Some(slot) = self.worker.as_mut() {
            if slot.seq == seq {
                slot.exiting = true;
            }
        }
    }
}

#[cfg(test)]
impl State {
    /// Registers generation `seq` without a thread behind it.
    pub(super) fn register_generation(
        &mut self,
        seq: u64,
    ) -> mpsc::UnboundedReceiver<Control> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.seq = seq;
        self.worker = Some(WorkerSlot {
            seq,
            control: tx,
            thread: None,
            exiting: false,
        });
        rx
    }

    /// Returns the current generation and whether it is exiting.
    pub(super) fn generation(&self) -> Option<(u64, bool)> {
        self.worker.as_ref().map(|slot| (slot.seq, slot.exiting))
    }
}

//------------ WorkerSlot -----------------------------------------------------

/// Bookkeeping for a worker generation.
struct WorkerSlot {
    /// The generation’s sequence number.
    seq: u64,

    /// The sender for control messages to the worker.
    control: mpsc::UnboundedSender<Control>,

    /// The worker thread unless it has been taken for joining.
    thread: Option<JoinHandle<()>>,

    /// Whether the worker has stopped processing lookups.
    exiting: bool,
}

//------------ DefMinMax ------------------------------------------------------

/// The default, minimum, and maximum values for a config variable.
#[derive(Clone, Copy)]
struct DefMinMax<T> {
    /// The default value,
    def: T,

    /// The minimum value,
    min: T,

    /// The maximum value,
    max: T,
}

impl<T> DefMinMax<T> {
    /// Creates a new value.
    const fn new(def: T, min: T, max: T) -> Self {
        Self { def, min, max }
    }

    /// Returns the default value.
    fn default(self) -> T {
        self.def
    }

    /// Trims the given value to fit into the minimum/maximum range.
    fn limit(self, value: T) -> T
    where
        T: Ord,
    {
        cmp::max(self.min, cmp::min(self.max, value))
    }
}

//============ Tests =========================================================
