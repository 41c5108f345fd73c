//! The background worker.
//!
//! A worker runs on its own thread with a single threaded Tokio runtime.
//! It owns the UDP socket and loops over four steps: receive one reply,
//! send whatever is queued, expire overdue lookups, and wait for the next
//! thing to happen. It exits once there are no outstanding lookups left or
//! if the socket fails.
//!
//! Results are delivered via [`deliver`] which takes the completion lock
//! before it releases the state lock. This way, a cancel that finds the
//! lookup gone can wait for the callback by taking the completion lock.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use super::clock::Tick;
use super::error::Error;
use super::lookups::Request;
use super::resolver::{Shared, State};
use crate::base::iana::Rtype;
use crate::base::message::{self, ReplyError};
use crate::base::message_builder::encode_query;
use crate::net::udp;
use parking_lot::MutexGuard;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, trace, warn};

/// The size of the receive buffer.
///
/// Replies larger than this are cut short by the socket.
const RECV_BUF_LEN: usize = 4096;

//------------ Control --------------------------------------------------------

/// A message from the resolver to its worker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Control {
    /// New requests have been queued.
    Send,

    /// A cancellation emptied the registry.
    Stop,

    /// Fail everything and exit.
    Shutdown,
}

//------------ Event ----------------------------------------------------------

/// What ended a wait.
enum Event {
    /// A control message or the end of the channel.
    Control(Option<Control>),

    /// The socket became ready or reported an error.
    Ready(Result<(), io::Error>),

    /// The wait timed out.
    Timeout,
}

//------------ Worker ---------------------------------------------------------

/// A worker generation.
pub(super) struct Worker {
    /// The state shared with the resolver.
    shared: Arc<Shared>,

    /// The generation’s sequence number.
    seq: u64,

    /// The receiver for control messages.
    control: mpsc::UnboundedReceiver<Control>,

    /// Whether there may be requests waiting to be sent.
    sending: bool,

    /// The server for lookups without their own.
    default_server: Option<SocketAddr>,
}

impl Worker {
    /// Creates a new worker generation.
    pub(super) fn new(
        shared: Arc<Shared>,
        seq: u64,
        control: mpsc::UnboundedReceiver<Control>,
    ) -> Self {
        Worker {
            shared,
            seq,
            control,
            sending: true,
            default_server: None,
        }
    }

    /// Runs the worker on the current thread.
    ///
    /// Joins the previous generation first if there is one.
    pub(super) fn run(self, predecessor: Option<JoinHandle<()>>) {
        if let Some(thread) = predecessor {
            if thread.join().is_err() {
                warn!(seq = self.seq, "previous resolver worker panicked");
            }
        }
        let runtime = match runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(seq = self.seq, "failed to create runtime: {}", err);
                self.fail_all(err.into());
                return;
            }
        };
        runtime.block_on(self.serve())
    }

    /// Processes lookups until there are none left.
    async fn serve(mut self) {
        debug!(seq = self.seq, "resolver worker running");
        self.default_server = self.shared.config.discovery().default_server();
        debug!(server = ?self.default_server, "default name server");

        let sock = match udp::open().and_then(UdpSocket::from_std) {
            Ok(sock) => sock,
            Err(err) => return self.fatal(err),
        };
        let local = match sock.local_addr() {
            Ok(local) => local,
            Err(err) => return self.fatal(err),
        };
        trace!(%local, "bound resolver socket");
        let max_wait = self.shared.config.max_wait();
        let mut buf = vec![0u8; RECV_BUF_LEN];

        loop {
            match sock.take_error() {
                Ok(None) => {}
                Ok(Some(err)) | Err(err) => return self.fatal(err),
            }

            match sock.try_recv_from(&mut buf) {
                Ok((len, from)) => self.process_reply(&buf[..len], from),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) if udp::is_stale_error(&err) => {
                    trace!("ignoring receive error: {}", err);
                }
                Err(err) => return self.fatal(err),
            }

            if self.sending {
                if let Err(err) = self.send_queued(&sock, &local) {
                    return self.fatal(err);
                }
            }

            self.expire(self.shared.clock.now());

            let wait = {
                let mut state = self.shared.state.lock();
                if state.lookups.is_empty() {
                    state.retire(self.seq);
                    debug!(seq = self.seq, "no more lookups, worker exiting");
                    return;
                }
                // Callbacks run by expire may have taken a while.
                state.lookups.next_wait(self.shared.clock.now())
            };
            let wait = wait
                .map(|ticks| Duration::from_millis(ticks.into()))
                .unwrap_or(max_wait)
                .min(max_wait);

            let sending = self.sending;
            let event = tokio::select! {
                biased;
                msg = self.control.recv() => Event::Control(msg),
                res = sock.readable() => Event::Ready(res),
                res = sock.writable(), if sending => Event::Ready(res),
                _ = sleep(wait) => Event::Timeout,
            };
            match event {
                Event::Control(msg) => {
                    if self.handle_control(msg) {
                        return;
                    }
                }
                Event::Ready(Err(err)) => return self.fatal(err),
                Event::Ready(Ok(())) | Event::Timeout => {}
            }
            while let Ok(msg) = self.control.try_recv() {
                if self.handle_control(Some(msg)) {
                    return;
                }
            }
        }
    }

    /// Processes a control message.
    ///
    /// Returns whether the worker needs to exit.
    fn handle_control(&mut self, msg: Option<Control>) -> bool {
        match msg {
            Some(Control::Send) => {
                self.sending = true;
                false
            }
            // The registry check at the end of the iteration handles it.
            Some(Control::Stop) => false,
            Some(Control::Shutdown) | None => {
                self.shutdown();
                true
            }
        }
    }

    /// Processes a received datagram.
    fn process_reply(&mut self, data: &[u8], from: SocketAddr) {
        let id = match message::reply_id(data) {
            Some(id) => id,
            None => {
                trace!(%from, len = data.len(), "ignoring short datagram");
                return;
            }
        };
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        let key = match state.lookups.by_id(id) {
            Some(key) => key,
            None => {
                trace!(%from, id, "ignoring reply with unknown ID");
                return;
            }
        };
        let (handle, rtype, result) = match state.lookups.get(key) {
            Some(request) => {
                if !message::question_matches(data, request.host()) {
                    trace!(%from, id, "ignoring reply for other name");
                    return;
                }
                (
                    request.handle(),
                    request.rtype(),
                    message::decode_reply(
                        data,
                        id,
                        request.host(),
                        request.rtype(),
                    ),
                )
            }
            None => return,
        };

        match result {
            Err(ReplyError::NoSuchHost) if rtype == Rtype::AAAA => {
                debug!(%handle, "no AAAA record, asking for A");
                state.lookups.fall_back_to_a(key);
                self.sending = true;
            }
            result => {
                if let Some(request) = state.lookups.remove(key) {
                    trace!(%handle, ?result, "reply received");
                    deliver(shared, state, request, result.map_err(Into::into));
                }
            }
        }
    }

    /// Sends queued requests until the queue is empty or the socket is full.
    ///
    /// Returns an error only if the socket itself failed.
    fn send_queued(
        &mut self,
        sock: &UdpSocket,
        local: &SocketAddr,
    ) -> Result<(), io::Error> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        loop {
            let Some(key) = state.lookups.front_queued() else {
                self.sending = false;
                return Ok(());
            };
            let Some(request) = state.lookups.get(key) else {
                debug_assert!(false, "queued request missing");
                self.sending = false;
                return Ok(());
            };
            let handle = request.handle();
            let target = request
                .server()
                .or(self.default_server)
                .filter(|addr| udp::can_reach(local, addr))
                .map(|addr| udp::map_destination(local, addr));
            let Some(target) = target else {
                debug!(%handle, "no usable name server address");
                if let Some(request) = state.lookups.remove(key) {
                    deliver(shared, state, request, Err(Error::Transport(None)));
                    state = shared.state.lock();
                }
                continue;
            };
            let packet = encode_query(request.id(), request.host(), request.rtype());

            match sock.try_send_to(&packet, target) {
                Ok(_) => {
                    trace!(%handle, %target, id = request.id(), "sent query");
                    state.lookups.mark_sent(key);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    debug!("socket full, waiting until writable");
                    return Ok(());
                }
                Err(err) if udp::is_destination_error(&err) => {
                    debug!(%handle, %target, "failed to send query: {}", err);
                    if let Some(request) = state.lookups.remove(key) {
                        let err = Error::Transport(Some(Arc::new(err)));
                        deliver(shared, state, request, Err(err));
                        state = shared.state.lock();
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Fails all lookups whose deadline has passed.
    fn expire(&self, now: Tick) {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        for key in state.lookups.sweep(now) {
            // A callback run in between may have removed it already.
            if let Some(request) = state.lookups.remove(key) {
                trace!(handle = %request.handle(), "lookup timed out");
                deliver(shared, state, request, Err(Error::Timeout));
                state = shared.state.lock();
            }
        }
    }

    /// Handles a failure of the socket or runtime.
    fn fatal(&self, err: io::Error) {
        warn!(seq = self.seq, "resolver socket failed: {}", err);
        self.fail_all(err.into())
    }

    /// Handles a shutdown request.
    fn shutdown(&self) {
        debug!(seq = self.seq, "resolver worker shutting down");
        self.fail_all(Error::Transport(None))
    }

    /// Retires this generation and fails all outstanding lookups.
    ///
    /// The completion lock is held while the whole batch is delivered.
    fn fail_all(&self, error: Error) {
        let mut state = self.shared.state.lock();
        state.retire(self.seq);
        let requests = state.lookups.drain();
        let _completion = self.shared.completion.lock();
        drop(state);
        if !requests.is_empty() {
            warn!(
                count = requests.len(),
                "failing outstanding lookups: {}", error
            );
        }
        for request in requests {
            complete(request, Err(error.clone()));
        }
    }
}

//------------ Helper Functions -----------------------------------------------

/// Delivers the result of a request that has been removed already.
///
/// Takes the completion lock before releasing the state lock. Both are
/// released when this returns.
fn deliver(
    shared: &Shared,
    state: MutexGuard<'_, State>,
    request: Request,
    result: Result<IpAddr, Error>,
) {
    let _completion = shared.completion.lock();
    drop(state);
    complete(request, result);
}

/// Runs the callback of a request.
///
/// A panicking callback is logged and otherwise ignored.
fn complete(request: Request, result: Result<IpAddr, Error>) {
    let handle = request.handle();
    let res = panic::catch_unwind(AssertUnwindSafe(|| request.complete(result)));
    if res.is_err() {
        error!(%handle, "lookup callback panicked");
    }
}

//============ Tests =========================================================
