//! # Nexilis
//!
//! **Nexilis** is the per-connection I/O engine of the **Nebula**
//! ecosystem's L4 proxy.
//!
//! Given a readiness notification from an operating-system event facility,
//! Nexilis advances a connection through its handshake, data-transfer and
//! post-I/O notification phases, then reconciles the connection's desired
//! read/write interest with what is currently registered in the kernel,
//! emitting the minimal set of register/modify calls and never more than
//! one per direction per cycle.
//!
//! The crate provides:
//!
//! - A **typed flag model** for connection state: lifecycle, pending
//!   handshake kinds, desired interest and registered interest as
//!   separately masked groups of one bitset
//! - A **pluggable handshake layer**: sub-protocols (PROXY-protocol parse
//!   and emit, TLS, …) registered as ordered steps, re-enterable from the
//!   data phase for renegotiation
//! - A **connection table** owning connections, their callbacks and their
//!   descriptor slots, with a readiness handler driving the whole cycle
//! - A **poll reconciler** translating interest edges into event-facility
//!   operations
//! - An **epoll-backed facility** for Linux; any backend implementing the
//!   six-primitive [`EventFacility`] capability plugs in, including
//!   in-memory doubles for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nexilis::conn::{ConnFlags, Connection, HandshakeRegistry};
//! use nexilis::driver::{ConnTable, TcpConnectProbe};
//! use nexilis::facility::EpollFacility;
//!
//! let mut facility = EpollFacility::new()?;
//! let mut table = ConnTable::new();
//!
//! let conn = Connection::new(fd, ConnFlags::WAIT_L4_CONN);
//! let token = table.insert(
//!     conn,
//!     Box::new(app),
//!     Box::new(TcpConnectProbe),
//!     HandshakeRegistry::new(),
//!     None,
//! )?;
//!
//! table.conn_mut(token).unwrap().want_send();
//! table.reconcile(&mut facility, token);
//!
//! let mut events = Vec::new();
//! loop {
//!     facility.poll(&mut events, None)?;
//!     for event in &events {
//!         table.note_event(event.fd, event.events);
//!         table.on_ready(&mut facility, event.fd);
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`conn`] — The connection object, its flags, handshake steps and the
//!   poll reconciler
//! - [`driver`] — The connection table and the readiness handler
//! - [`facility`] — The event-facility boundary and the Linux backend

mod utils;

pub mod conn;
pub mod driver;
pub mod facility;

pub use conn::{ConnFlags, Connection};
pub use driver::{AppIo, ConnTable, Transport};
pub use facility::{EventFacility, FdEvents, ReadyEvent};
