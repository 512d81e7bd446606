//! Handshake kinds and their dispatcher.
//!
//! Each handshake kind is a flag bit plus a step object carrying its own
//! small state. Kinds are kept in a registry ordered by precedence; the
//! dispatcher iterates the registry instead of hard-coding kinds, so a
//! new sub-protocol is added by reserving a bit and registering a step;
//! the dispatcher itself never changes.
//!
//! Ordering is significant: an inbound PROXY-protocol parse must run
//! before the outbound PROXY-protocol emit, which must run before any
//! later kind. New kinds are appended to preserve that order.

use super::core::Connection;
use super::flags::ConnFlags;

/// Verdict of a handshake step for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// The step finished: it cleared its kind bit and arranged any
    /// polling it still needs itself.
    Done,

    /// The step needs more I/O. It left exactly the socket-layer
    /// interest bits required to be woken again; the readiness cycle
    /// abandons handshake processing for this edge.
    Pending,
}

/// One pluggable handshake sub-protocol.
///
/// A step is invoked whenever its kind bit is pending on the connection.
/// On [`HandshakeStatus::Done`] it must have cleared the bit via
/// [`Connection::clear_handshake`]; on [`HandshakeStatus::Pending`] it
/// must have adjusted the socket-layer interest so the next edge reaches
/// it. A step may latch the error bit at any point; the dispatcher checks
/// for that between passes.
pub trait HandshakeStep {
    /// Advances the sub-protocol by as much as the available I/O allows.
    fn advance(&mut self, conn: &mut Connection) -> HandshakeStatus;
}

/// A handshake kind bound to its step.
struct HandshakeEntry {
    /// The kind bit inside [`ConnFlags::HANDSHAKE_MASK`].
    kind: ConnFlags,

    /// The step driving this kind.
    step: Box<dyn HandshakeStep>,
}

/// Ordered set of handshake kinds for one connection.
///
/// Registration order is dispatch order.
///
/// # Examples
///
/// ```rust,ignore
/// let mut registry = HandshakeRegistry::new();
/// registry.register(ConnFlags::ACCEPT_PROXY, Box::new(ProxyParse::new()));
/// registry.register(ConnFlags::SEND_PROXY, Box::new(ProxyEmit::new()));
/// ```
#[derive(Default)]
pub struct HandshakeRegistry {
    entries: Vec<HandshakeEntry>,
}

impl HandshakeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a kind to the registry.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is not a single bit inside
    /// [`ConnFlags::HANDSHAKE_MASK`].
    pub fn register(&mut self, kind: ConnFlags, step: Box<dyn HandshakeStep>) {
        assert!(
            ConnFlags::HANDSHAKE_MASK.contains(kind) && kind.bits().count_ones() == 1,
            "handshake kind must be a single reserved bit"
        );

        self.entries.push(HandshakeEntry { kind, step });
    }

    /// Returns the number of registered kinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs one pass over the registry in order, invoking the step of
    /// every pending kind.
    ///
    /// Returns [`HandshakeStatus::Pending`] as soon as a step reports it,
    /// or when a kind bit is pending without a registered step (which
    /// would otherwise spin the caller's loop forever). The caller
    /// re-evaluates the pending and error conditions between passes.
    pub(crate) fn dispatch(&mut self, conn: &mut Connection) -> HandshakeStatus {
        let mut advanced = false;

        for entry in &mut self.entries {
            if !conn.has_handshake(entry.kind) {
                continue;
            }

            advanced = true;

            match entry.step.advance(conn) {
                HandshakeStatus::Pending => return HandshakeStatus::Pending,
                HandshakeStatus::Done => {
                    debug_assert!(
                        !conn.has_handshake(entry.kind),
                        "a completed handshake step must clear its kind bit"
                    );
                }
            }
        }

        if !advanced {
            debug_assert!(false, "pending handshake kind without a registered step");
            return HandshakeStatus::Pending;
        }

        HandshakeStatus::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recording {
        name: &'static str,
        kind: ConnFlags,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl HandshakeStep for Recording {
        fn advance(&mut self, conn: &mut Connection) -> HandshakeStatus {
            self.log.borrow_mut().push(self.name);
            conn.clear_handshake(self.kind);
            HandshakeStatus::Done
        }
    }

    #[test]
    fn kinds_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = HandshakeRegistry::new();
        registry.register(
            ConnFlags::ACCEPT_PROXY,
            Box::new(Recording {
                name: "accept",
                kind: ConnFlags::ACCEPT_PROXY,
                log: log.clone(),
            }),
        );
        registry.register(
            ConnFlags::SEND_PROXY,
            Box::new(Recording {
                name: "send",
                kind: ConnFlags::SEND_PROXY,
                log: log.clone(),
            }),
        );

        let mut conn = Connection::new(5, ConnFlags::ACCEPT_PROXY | ConnFlags::SEND_PROXY);

        assert_eq!(registry.dispatch(&mut conn), HandshakeStatus::Done);
        assert!(!conn.handshake_pending());
        assert_eq!(*log.borrow(), vec!["accept", "send"]);
    }

    struct Stalled {
        polls: Rc<RefCell<u32>>,
    }

    impl HandshakeStep for Stalled {
        fn advance(&mut self, conn: &mut Connection) -> HandshakeStatus {
            *self.polls.borrow_mut() += 1;
            conn.sock_want_recv();
            HandshakeStatus::Pending
        }
    }

    #[test]
    fn a_pending_step_stops_the_pass() {
        let polls = Rc::new(RefCell::new(0));
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut registry = HandshakeRegistry::new();
        registry.register(
            ConnFlags::ACCEPT_PROXY,
            Box::new(Stalled {
                polls: polls.clone(),
            }),
        );
        registry.register(
            ConnFlags::SEND_PROXY,
            Box::new(Recording {
                name: "send",
                kind: ConnFlags::SEND_PROXY,
                log: log.clone(),
            }),
        );

        let mut conn = Connection::new(5, ConnFlags::ACCEPT_PROXY | ConnFlags::SEND_PROXY);

        assert_eq!(registry.dispatch(&mut conn), HandshakeStatus::Pending);
        assert_eq!(*polls.borrow(), 1);
        assert!(log.borrow().is_empty(), "later kinds must not run");
        assert!(conn.has_handshake(ConnFlags::SEND_PROXY));
        assert!(conn.flags().contains(ConnFlags::SOCK_RD_ENA));
    }

    #[test]
    fn a_kind_raised_mid_pass_is_picked_up_in_order() {
        // the first step raises a later kind while completing its own
        struct Chaining {
            log: Rc<RefCell<Vec<&'static str>>>,
        }

        impl HandshakeStep for Chaining {
            fn advance(&mut self, conn: &mut Connection) -> HandshakeStatus {
                self.log.borrow_mut().push("accept");
                conn.clear_handshake(ConnFlags::ACCEPT_PROXY);
                conn.raise_handshake(ConnFlags::SEND_PROXY);
                HandshakeStatus::Done
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = HandshakeRegistry::new();
        registry.register(
            ConnFlags::ACCEPT_PROXY,
            Box::new(Chaining { log: log.clone() }),
        );
        registry.register(
            ConnFlags::SEND_PROXY,
            Box::new(Recording {
                name: "send",
                kind: ConnFlags::SEND_PROXY,
                log: log.clone(),
            }),
        );

        let mut conn = Connection::new(5, ConnFlags::ACCEPT_PROXY);

        assert_eq!(registry.dispatch(&mut conn), HandshakeStatus::Done);
        assert_eq!(*log.borrow(), vec!["accept", "send"]);
        assert!(!conn.handshake_pending());
    }
}
