//! Helpers shared by the integration tests.

#![allow(dead_code)]

use netlookup::base::header::HEADER_LEN;
use netlookup::base::{encode_query, Header, HostName, Rcode, Rtype};
use octseq::parse::{Parser, ShortInput};
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Sets up logging for a test.
///
/// Use `RUST_LOG=netlookup=trace` to see what is going on.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_ids(true)
        .without_time()
        .try_init()
        .ok();
}

//------------ Query ---------------------------------------------------------

/// A query as seen by the fake server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Query {
    pub id: u16,
    pub name: String,
    pub qtype: Rtype,
}

impl Query {
    /// Parses a query and returns it with its question section.
    fn parse(data: &[u8]) -> Result<(Self, Header, &[u8]), ShortInput> {
        let mut parser = Parser::from_ref(data);
        let header = Header::parse(&mut parser)?;
        let mut labels = Vec::new();
        loop {
            let len = parser.parse_u8()?;
            if len == 0 {
                break;
            }
            let label = parser.peek(len.into())?;
            labels.push(String::from_utf8_lossy(label).into_owned());
            parser.advance(len.into())?;
        }
        let qtype = Rtype::parse(&mut parser)?;
        parser.parse_u16_be()?;
        let query = Query {
            id: header.id(),
            name: labels.join("."),
            qtype,
        };
        Ok((query, header, &data[HEADER_LEN..parser.pos()]))
    }
}

//------------ Answer --------------------------------------------------------

/// What the fake server does with a query.
#[derive(Clone, Debug)]
pub enum Answer {
    /// Reply with an address record.
    ///
    /// The record type follows the address family.
    Address(IpAddr),

    /// Reply with NOERROR and no answers.
    NoData,

    /// Reply with an error response code.
    Rcode(Rcode),

    /// Don’t reply at all.
    Silent,

    /// Send these datagrams first, then answer.
    Preceded(Vec<Vec<u8>>, Box<Answer>),
}

//------------ FakeServer ----------------------------------------------------

/// A name server on the loopback interface running in its own thread.
pub struct FakeServer {
    addr: SocketAddr,
    queries: Arc<Mutex<Vec<Query>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FakeServer {
    /// Starts a server that answers each query via `handler`.
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Query) -> Answer + Send + 'static,
    {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let addr = sock.local_addr().unwrap();
        let queries = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let queries = queries.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 512];
                while !stop.load(Ordering::Relaxed) {
                    let (len, peer) = match sock.recv_from(&mut buf) {
                        Ok(res) => res,
                        Err(_) => continue,
                    };
                    let Ok((query, header, question)) =
                        Query::parse(&buf[..len])
                    else {
                        continue;
                    };
                    let answer = handler(&query);
                    queries.lock().unwrap().push(query);
                    if let Answer::Preceded(datagrams, _) = &answer {
                        for datagram in datagrams {
                            let _ = sock.send_to(datagram, peer);
                        }
                    }
                    if let Some(reply) = reply(header, question, &answer) {
                        let _ = sock.send_to(&reply, peer);
                    }
                }
            })
        };
        FakeServer {
            addr,
            queries,
            stop,
            thread: Some(thread),
        }
    }

    /// Starts a server that never answers.
    pub fn silent() -> Self {
        Self::start(|_| Answer::Silent)
    }

    /// Returns the server’s address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the queries received so far.
    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Builds the reply to a query.
fn reply(mut header: Header, question: &[u8], answer: &Answer) -> Option<Vec<u8>> {
    let (rcode, address) = match answer {
        Answer::Address(addr) => (Rcode::NOERROR, Some(*addr)),
        Answer::NoData => (Rcode::NOERROR, None),
        Answer::Rcode(rcode) => (*rcode, None),
        Answer::Silent => return None,
        Answer::Preceded(_, answer) => return reply(header, question, answer),
    };
    header.set_qr(true);
    header.set_rcode(rcode);
    header.set_ancount(address.is_some().into());

    let mut reply = Vec::new();
    header.compose(&mut reply);
    reply.extend_from_slice(question);
    if let Some(addr) = address {
        // Pointer to the question name.
        reply.extend_from_slice(&[0xC0, 0x0C]);
        let (rtype, rdata) = match addr {
            IpAddr::V4(addr) => (Rtype::A, addr.octets().to_vec()),
            IpAddr::V6(addr) => (Rtype::AAAA, addr.octets().to_vec()),
        };
        reply.extend_from_slice(&rtype.to_int().to_be_bytes());
        reply.extend_from_slice(&1u16.to_be_bytes());
        reply.extend_from_slice(&300u32.to_be_bytes());
        reply.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        reply.extend_from_slice(&rdata);
    }
    Some(reply)
}

/// Builds the reply to a query for `name` and `qtype` with the given ID.
pub fn build_reply(id: u16, name: &str, qtype: Rtype, answer: &Answer) -> Vec<u8> {
    let query = encode_query(id, &HostName::new(name).unwrap(), qtype);
    let (_, header, question) = Query::parse(&query).unwrap();
    reply(header, question, answer).unwrap_or_default()
}
