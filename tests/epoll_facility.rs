//! End-to-end exercises of the Linux epoll facility.
#![cfg(target_os = "linux")]

use nexilis::conn::{ConnFlags, Connection, HandshakeRegistry};
use nexilis::driver::{AppIo, ConnTable, TcpConnectProbe};
use nexilis::facility::{EpollFacility, EventFacility, FdEvents, ReadyEvent};

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

/// Application double for a connection that only waits to establish.
struct QuietApp;

impl AppIo for QuietApp {
    fn recv(&mut self, _conn: &mut Connection) {}

    fn send(&mut self, conn: &mut Connection) {
        // nothing queued for the peer, withdraw the interest
        conn.stop_send();
    }

    fn wake(&mut self, _conn: &mut Connection) {}
}

/// Starts a non-blocking connect towards `addr` and returns the socket.
fn nonblocking_connect(addr: SocketAddr) -> RawFd {
    let fd = unsafe {
        libc::socket(
            libc::AF_INET,
            libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            0,
        )
    };
    assert!(fd >= 0, "socket creation failed");

    let SocketAddr::V4(v4) = addr else {
        panic!("expected an IPv4 listener address");
    };

    let mut sin: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    sin.sin_family = libc::AF_INET as libc::sa_family_t;
    sin.sin_port = v4.port().to_be();
    sin.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());

    let rc = unsafe {
        libc::connect(
            fd,
            &sin as *const _ as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };

    if rc != 0 {
        let err = std::io::Error::last_os_error();
        assert_eq!(
            err.raw_os_error(),
            Some(libc::EINPROGRESS),
            "unexpected connect error: {err}"
        );
    }

    fd
}

#[test]
fn a_nonblocking_connect_establishes_through_the_facility() {
    let _ = tracing_subscriber::fmt().try_init();

    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind listener");
    let addr = listener.local_addr().expect("failed to get local address");
    let fd = nonblocking_connect(addr);

    let mut facility = EpollFacility::new().expect("failed to create the epoll facility");
    let mut table = ConnTable::new();

    let token = table
        .insert(
            Connection::new(fd, ConnFlags::WAIT_L4_CONN),
            Box::new(QuietApp),
            Box::new(TcpConnectProbe),
            HandshakeRegistry::new(),
            None,
        )
        .expect("insert failed");

    table.conn_mut(token).expect("live").want_send();
    table.reconcile(&mut facility, token);

    let mut events: Vec<ReadyEvent> = Vec::new();
    let mut writable = false;

    for _ in 0..50 {
        facility
            .poll(&mut events, Some(Duration::from_millis(100)))
            .expect("poll failed");

        for event in &events {
            if event.fd == fd && event.events.intersects(FdEvents::OUT | FdEvents::ERR) {
                writable = true;
            }
            table.note_event(event.fd, event.events);
        }

        let ready: Vec<RawFd> = events.iter().map(|event| event.fd).collect();
        for ready_fd in ready {
            table.on_ready(&mut facility, ready_fd);
        }

        if writable {
            break;
        }
    }
    assert!(writable, "the connect never reported writable");

    let (peer, _) = listener.accept().expect("accept failed");

    let conn = table.conn(token).expect("connection should survive");
    assert!(conn.is_established());
    assert!(!conn.awaiting_l4());
    assert!(!conn.has_error());
    assert_eq!(table.events(fd), FdEvents::empty());

    // the cycle withdrew the write interest, so the descriptor must be
    // silent now
    facility
        .poll(&mut events, Some(Duration::from_millis(50)))
        .expect("poll failed");
    assert!(
        events.iter().all(|event| event.fd != fd),
        "write interest should have been withdrawn"
    );

    drop(peer);
    unsafe {
        libc::close(fd);
    }
}

#[test]
fn interest_tracking_maps_to_epoll_registration() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind listener");
    let addr = listener.local_addr().expect("failed to get local address");

    let mut sender = TcpStream::connect(addr).expect("failed to connect");
    let (receiver, _) = listener.accept().expect("accept failed");
    let fd = receiver.as_raw_fd();

    let mut facility = EpollFacility::new().expect("failed to create the epoll facility");
    let mut events: Vec<ReadyEvent> = Vec::new();

    // no interest yet: a pending byte does not wake us
    sender.write_all(b"x").expect("write failed");
    facility
        .poll(&mut events, Some(Duration::from_millis(50)))
        .expect("poll failed");
    assert!(events.iter().all(|event| event.fd != fd));

    // read interest surfaces the byte
    facility.want_recv(fd);
    facility
        .poll(&mut events, Some(Duration::from_millis(1000)))
        .expect("poll failed");
    let event = events
        .iter()
        .find(|event| event.fd == fd)
        .expect("read readiness was not reported");
    assert!(event.events.contains(FdEvents::IN));

    // withdrawing it silences the descriptor again, byte still unread
    facility.stop_recv(fd);
    facility
        .poll(&mut events, Some(Duration::from_millis(50)))
        .expect("poll failed");
    assert!(events.iter().all(|event| event.fd != fd));

    // send interest on an idle socket reports writable immediately
    facility.want_send(fd);
    facility
        .poll(&mut events, Some(Duration::from_millis(1000)))
        .expect("poll failed");
    let event = events
        .iter()
        .find(|event| event.fd == fd)
        .expect("write readiness was not reported");
    assert!(event.events.contains(FdEvents::OUT));

    facility.stop_send(fd);
}
