//! End to end tests of the resolver against a fake name server.

mod common;

use common::{build_reply, init_logging, Answer, FakeServer, Query};
use netlookup::base::{ProtocolError, Rcode, Rtype};
use netlookup::resolv::conf::StaticServer;
use netlookup::resolv::{self, Config, Error, Handle, Resolver};
use rstest::rstest;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

type Results = mpsc::Receiver<Result<IpAddr, Error>>;

fn config(server: SocketAddr) -> Config {
    let mut config = Config::new();
    config.set_discovery(StaticServer(Some(server)));
    config
}

fn resolver(server: &FakeServer) -> Resolver {
    Resolver::new(config(server.addr()))
}

/// Starts a lookup whose result ends up in the returned channel.
fn lookup(
    resolver: &Resolver,
    handle: Handle,
    host: &str,
    timeout: Duration,
) -> Results {
    let (tx, rx) = mpsc::channel();
    resolver
        .resolve(handle, host, timeout, move |res| {
            let _ = tx.send(res);
        })
        .unwrap();
    rx
}

/// Answers A queries with `addr` and AAAA queries with no data.
fn v4_only(addr: Ipv4Addr) -> impl Fn(&Query) -> Answer + Send + 'static {
    move |query| {
        if query.qtype == Rtype::A {
            Answer::Address(addr.into())
        } else {
            Answer::NoData
        }
    }
}

#[test]
fn resolves_ipv6_first() {
    init_logging();
    let addr: IpAddr = "2001:db8::1".parse().unwrap();
    let server = FakeServer::start(move |_| Answer::Address(addr));
    let resolver = resolver(&server);

    let rx = lookup(&resolver, Handle::new(), "example.com", WAIT);
    assert_eq!(rx.recv_timeout(WAIT).unwrap().unwrap(), addr);
    let queries = server.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].name, "example.com");
    assert_eq!(queries[0].qtype, Rtype::AAAA);
    resolver.shutdown();
}

#[test]
fn falls_back_to_ipv4() {
    init_logging();
    let server = FakeServer::start(v4_only(Ipv4Addr::new(93, 184, 216, 34)));
    let resolver = resolver(&server);

    let rx = lookup(&resolver, Handle::new(), "example.com.", WAIT);
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap().unwrap(),
        IpAddr::from([93, 184, 216, 34])
    );
    // Exactly one completion.
    assert!(rx.recv_timeout(QUIET).is_err());

    let queries = server.queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].qtype, Rtype::AAAA);
    assert_eq!(queries[1].qtype, Rtype::A);
    assert_eq!(queries[0].id, queries[1].id);
    assert_eq!(resolver.pending(), 0);
    resolver.shutdown();
}

#[test]
fn no_such_host() {
    init_logging();
    let server = FakeServer::start(|_| Answer::Rcode(Rcode::NXDOMAIN));
    let resolver = resolver(&server);

    let rx = lookup(&resolver, Handle::new(), "nowhere.example", WAIT);
    assert!(matches!(rx.recv_timeout(WAIT).unwrap(), Err(Error::NoSuchHost)));
    assert_eq!(server.queries().len(), 2);
    resolver.shutdown();
}

#[rstest]
#[case(Rcode::SERVFAIL)]
#[case(Rcode::REFUSED)]
#[case(Rcode::FORMERR)]
fn error_rcodes(#[case] rcode: Rcode) {
    init_logging();
    let server = FakeServer::start(move |_| Answer::Rcode(rcode));
    let resolver = resolver(&server);

    let rx = lookup(&resolver, Handle::new(), "example.com", WAIT);
    match rx.recv_timeout(WAIT).unwrap() {
        Err(Error::Protocol(ProtocolError::Rcode(got))) => {
            assert_eq!(got, rcode)
        }
        res => panic!("unexpected result {:?}", res),
    }
    // No fallback on server errors.
    assert_eq!(server.queries().len(), 1);
    resolver.shutdown();
}

#[test]
fn ignores_stray_datagrams() {
    init_logging();
    let server = FakeServer::start(|query| {
        let stray = Answer::Address(Ipv4Addr::new(192, 0, 2, 66).into());
        let mut garbage = vec![0xAB; 40];
        garbage[..2].copy_from_slice(&query.id.to_be_bytes());
        let datagrams = vec![
            // Too short for a reply.
            b"\x00\x00\x81\x80".to_vec(),
            // Right ID but no sensible question.
            garbage,
            build_reply(
                query.id.wrapping_add(1),
                &query.name,
                query.qtype,
                &stray,
            ),
            build_reply(query.id, "other.example", query.qtype, &stray),
        ];
        let answer = if query.qtype == Rtype::A {
            Answer::Address(Ipv4Addr::new(192, 0, 2, 7).into())
        } else {
            Answer::NoData
        };
        Answer::Preceded(datagrams, Box::new(answer))
    });
    let resolver = resolver(&server);

    let rx = lookup(&resolver, Handle::new(), "example.com", WAIT);
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap().unwrap(),
        IpAddr::from([192, 0, 2, 7])
    );
    let qtypes: Vec<_> = server.queries().into_iter().map(|q| q.qtype).collect();
    assert_eq!(qtypes, [Rtype::AAAA, Rtype::A]);
    resolver.shutdown();
}

#[test]
fn times_out() {
    init_logging();
    let server = FakeServer::silent();
    let resolver = resolver(&server);

    let start = Instant::now();
    let rx = lookup(
        &resolver,
        Handle::new(),
        "example.com",
        Duration::from_millis(100),
    );
    assert!(matches!(rx.recv_timeout(WAIT).unwrap(), Err(Error::Timeout)));
    // Ticks are whole milliseconds, so allow for a little early firing.
    assert!(start.elapsed() >= Duration::from_millis(90));
    assert_eq!(resolver.pending(), 0);
    resolver.shutdown();
}

#[test]
fn timeouts_expire_in_order() {
    init_logging();
    let server = FakeServer::silent();
    let resolver = resolver(&server);

    let (tx, rx) = mpsc::channel();
    for (name, millis) in [("slow", 300), ("fast", 50), ("middle", 150)] {
        let tx = tx.clone();
        resolver
            .resolve(
                Handle::new(),
                &format!("{}.example", name),
                Duration::from_millis(millis),
                move |res| {
                    let _ = tx.send((name, res));
                },
            )
            .unwrap();
    }
    let order: Vec<_> = (0..3)
        .map(|_| {
            let (name, res) = rx.recv_timeout(WAIT).unwrap();
            assert!(matches!(res, Err(Error::Timeout)));
            name
        })
        .collect();
    assert_eq!(order, ["fast", "middle", "slow"]);
    resolver.shutdown();
}

#[test]
fn slow_callback_keeps_deadlines() {
    init_logging();
    let server = FakeServer::silent();
    let resolver = resolver(&server);

    let start = Instant::now();
    resolver
        .resolve(
            Handle::new(),
            "slow.example",
            Duration::from_millis(50),
            |_| thread::sleep(Duration::from_millis(200)),
        )
        .unwrap();
    let rx = lookup(
        &resolver,
        Handle::new(),
        "later.example",
        Duration::from_millis(300),
    );
    assert!(matches!(rx.recv_timeout(WAIT).unwrap(), Err(Error::Timeout)));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(280), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(450), "{:?}", elapsed);
    resolver.shutdown();
}

#[test]
fn timeout_across_wraparound() {
    init_logging();
    let server = FakeServer::silent();
    let mut config = config(server.addr());
    config.set_initial_tick(u32::MAX - 50);
    let resolver = Resolver::new(config);

    // The deadline lies after the wraparound and must neither fire early
    // nor get lost.
    let start = Instant::now();
    let rx = lookup(
        &resolver,
        Handle::new(),
        "example.com",
        Duration::from_millis(200),
    );
    assert!(matches!(rx.recv_timeout(WAIT).unwrap(), Err(Error::Timeout)));
    assert!(start.elapsed() >= Duration::from_millis(190));
    resolver.shutdown();
}

#[test]
fn answer_across_wraparound() {
    init_logging();
    let server = FakeServer::start(v4_only(Ipv4Addr::new(192, 0, 2, 7)));
    let mut config = config(server.addr());
    config.set_initial_tick(u32::MAX - 5);
    let resolver = Resolver::new(config);

    let rx = lookup(&resolver, Handle::new(), "example.com", WAIT);
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap().unwrap(),
        IpAddr::from([192, 0, 2, 7])
    );
    resolver.shutdown();
}

#[test]
fn rejects_bad_names() {
    init_logging();
    let server = FakeServer::silent();
    let resolver = resolver(&server);
    let called = Arc::new(AtomicBool::new(false));

    let long = format!("{}.com", "a".repeat(250));
    assert_eq!(long.len(), 254);
    let flag = called.clone();
    let res = resolver.resolve(Handle::new(), &long, WAIT, move |_| {
        flag.store(true, Ordering::SeqCst)
    });
    assert!(matches!(res, Err(Error::NameTooLong)));

    let label = format!("{}.com", "a".repeat(64));
    let flag = called.clone();
    let res = resolver.resolve(Handle::new(), &label, WAIT, move |_| {
        flag.store(true, Ordering::SeqCst)
    });
    assert!(matches!(res, Err(Error::InvalidName)));

    assert_eq!(resolver.pending(), 0);
    assert!(!called.load(Ordering::SeqCst));
    assert!(server.queries().is_empty());
}

#[test]
fn already_in_progress() {
    init_logging();
    let server = FakeServer::silent();
    let resolver = resolver(&server);
    let handle = Handle::new();

    let rx = lookup(&resolver, handle, "example.com", WAIT);
    let res = resolver.resolve(handle, "example.org", WAIT, |_| {
        panic!("rejected lookup completed")
    });
    assert!(matches!(res, Err(Error::AlreadyInProgress)));
    assert_eq!(resolver.pending(), 1);

    assert!(resolver.cancel(handle));
    assert!(rx.recv_timeout(QUIET).is_err());

    // The handle can be used again now.
    let rx =
        lookup(&resolver, handle, "example.org", Duration::from_millis(50));
    assert!(matches!(rx.recv_timeout(WAIT).unwrap(), Err(Error::Timeout)));
    resolver.shutdown();
}

#[test]
fn cancel_suppresses_callback() {
    init_logging();
    let server = FakeServer::silent();
    let resolver = resolver(&server);
    let handle = Handle::new();

    let rx =
        lookup(&resolver, handle, "example.com", Duration::from_millis(50));
    assert!(resolver.cancel(handle));
    assert!(!resolver.cancel(handle));
    assert!(rx.recv_timeout(QUIET).is_err());
    assert_eq!(resolver.pending(), 0);
    resolver.shutdown();
}

#[test]
fn cancel_waits_for_running_callback() {
    init_logging();
    let server = FakeServer::start(|_| Answer::Address([192, 0, 2, 1].into()));
    let resolver = resolver(&server);
    let handle = Handle::new();
    let finished = Arc::new(AtomicBool::new(false));

    let (tx, rx) = mpsc::channel();
    let flag = finished.clone();
    resolver
        .resolve(handle, "example.com", WAIT, move |_| {
            let _ = tx.send(());
            thread::sleep(QUIET);
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    rx.recv_timeout(WAIT).unwrap();
    // The callback is running. Cancel can’t stop it anymore but must not
    // return before it is done.
    assert!(!resolver.cancel(handle));
    assert!(finished.load(Ordering::SeqCst));
    resolver.shutdown();
}

#[test]
fn resolve_from_callback() {
    init_logging();
    let server = FakeServer::start(v4_only(Ipv4Addr::new(192, 0, 2, 9)));
    let resolver = Arc::new(resolver(&server));
    let handle = Handle::new();

    let (tx, rx) = mpsc::channel();
    let inner = resolver.clone();
    resolver
        .resolve(handle, "first.example", WAIT, move |res| {
            let first = res;
            // The handle is free again once the callback runs.
            inner
                .resolve(handle, "second.example", WAIT, move |res| {
                    let _ = tx.send((first, res));
                })
                .unwrap();
        })
        .unwrap();

    let (first, second) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(first.unwrap(), IpAddr::from([192, 0, 2, 9]));
    assert_eq!(second.unwrap(), IpAddr::from([192, 0, 2, 9]));
    let names: Vec<_> = server.queries().into_iter().map(|q| q.name).collect();
    assert_eq!(
        names,
        ["first.example", "first.example", "second.example", "second.example"]
    );
    resolver.shutdown();
}

#[test]
fn panicking_callback() {
    init_logging();
    let silent = FakeServer::silent();
    let answering = FakeServer::start(v4_only(Ipv4Addr::new(192, 0, 2, 4)));
    let resolver = resolver(&silent);

    let slow = lookup(
        &resolver,
        Handle::new(),
        "slow.example",
        Duration::from_millis(300),
    );
    let (tx, rx) = mpsc::channel();
    resolver
        .resolve_with_server(
            Handle::new(),
            "boom.example",
            WAIT,
            answering.addr(),
            move |res| {
                let _ = tx.send(res);
                panic!("callback gave up");
            },
        )
        .unwrap();
    assert!(rx.recv_timeout(WAIT).unwrap().is_ok());

    // Both the outstanding lookup and a new one still complete.
    let fast = lookup(
        &resolver,
        Handle::new(),
        "fast.example",
        Duration::from_millis(100),
    );
    assert!(matches!(fast.recv_timeout(WAIT).unwrap(), Err(Error::Timeout)));
    assert!(matches!(slow.recv_timeout(WAIT).unwrap(), Err(Error::Timeout)));
    assert_eq!(resolver.pending(), 0);

    let rx = lookup(&resolver, Handle::new(), "again.example", WAIT);
    resolver.shutdown();
    assert!(matches!(
        rx.recv_timeout(WAIT).unwrap(),
        Err(Error::Transport(None))
    ));
}

#[test]
fn many_lookups() {
    init_logging();
    let server = FakeServer::start(|query| {
        if query.qtype == Rtype::AAAA {
            return Answer::NoData;
        }
        let index: u8 = query
            .name
            .trim_start_matches("host-")
            .trim_end_matches(".example")
            .parse()
            .unwrap();
        Answer::Address([10, 0, 0, index].into())
    });
    let resolver = resolver(&server);

    let (tx, rx) = mpsc::channel();
    for index in 0..100u8 {
        let tx = tx.clone();
        resolver
            .resolve(
                Handle::from_raw(index.into()),
                &format!("host-{}.example", index),
                WAIT,
                move |res| {
                    let _ = tx.send((index, res));
                },
            )
            .unwrap();
    }
    for _ in 0..100 {
        let (index, res) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(res.unwrap(), IpAddr::from([10, 0, 0, index]));
    }
    assert_eq!(resolver.pending(), 0);
    resolver.shutdown();
}

#[rstest]
#[case("0.0.0.0:53")]
#[case("127.0.0.1:0")]
fn unusable_server(#[case] server: &str) {
    init_logging();
    let resolver = Resolver::new(config(server.parse().unwrap()));

    let rx = lookup(&resolver, Handle::new(), "example.com", WAIT);
    assert!(matches!(
        rx.recv_timeout(WAIT).unwrap(),
        Err(Error::Transport(None))
    ));
    resolver.shutdown();
}

#[test]
fn missing_server() {
    init_logging();
    let mut config = Config::new();
    config.set_discovery(StaticServer(None));
    let resolver = Resolver::new(config);

    let rx = lookup(&resolver, Handle::new(), "example.com", WAIT);
    assert!(matches!(
        rx.recv_timeout(WAIT).unwrap(),
        Err(Error::Transport(None))
    ));
    resolver.shutdown();
}

#[test]
fn server_override() {
    init_logging();
    let default = FakeServer::silent();
    let other = FakeServer::start(v4_only(Ipv4Addr::new(192, 0, 2, 53)));
    let resolver = resolver(&default);

    let (tx, rx) = mpsc::channel();
    resolver
        .resolve_with_server(
            Handle::new(),
            "example.com",
            WAIT,
            other.addr(),
            move |res| {
                let _ = tx.send(res);
            },
        )
        .unwrap();
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap().unwrap(),
        IpAddr::from([192, 0, 2, 53])
    );
    assert!(default.queries().is_empty());
    resolver.shutdown();
}

#[test]
fn shutdown_fails_outstanding() {
    init_logging();
    let server = FakeServer::silent();
    let resolver = resolver(&server);

    let rx = lookup(&resolver, Handle::new(), "example.com", WAIT);
    resolver.shutdown();
    assert!(matches!(
        rx.recv_timeout(WAIT).unwrap(),
        Err(Error::Transport(None))
    ));
    assert_eq!(resolver.pending(), 0);

    // A new worker is started for the next lookup.
    let rx = lookup(
        &resolver,
        Handle::new(),
        "example.com",
        Duration::from_millis(50),
    );
    assert!(matches!(rx.recv_timeout(WAIT).unwrap(), Err(Error::Timeout)));
    resolver.shutdown();
}

#[test]
fn restarts_after_idle() {
    init_logging();
    let server = FakeServer::start(v4_only(Ipv4Addr::new(192, 0, 2, 2)));
    let resolver = resolver(&server);

    for _ in 0..3 {
        let rx = lookup(&resolver, Handle::new(), "example.com", WAIT);
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap().unwrap(),
            IpAddr::from([192, 0, 2, 2])
        );
        // Give the worker a chance to notice that it is idle.
        thread::sleep(Duration::from_millis(20));
    }
    resolver.shutdown();
}

#[test]
fn global_resolver() {
    init_logging();
    let server = FakeServer::start(v4_only(Ipv4Addr::new(192, 0, 2, 80)));

    let (tx, rx) = mpsc::channel();
    resolv::resolve_with_server(
        Handle::new(),
        "example.com",
        WAIT,
        server.addr(),
        move |res| {
            let _ = tx.send(res);
        },
    )
    .unwrap();
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap().unwrap(),
        IpAddr::from([192, 0, 2, 80])
    );
    assert!(!resolv::cancel(Handle::new()));
    resolv::shutdown();
}
