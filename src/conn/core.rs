//! The connection object.
//!
//! A [`Connection`] ties a file descriptor to its flag bitset. Everything
//! else that belongs to a connection (application callbacks, transport
//! operations, the handshake registry, a pending session hook) is owned
//! by the table entry that holds the connection, so that callbacks can be
//! invoked with a mutable borrow of the connection alone.
//!
//! The accessors below are the only supported way to mutate a group of
//! flags; they keep the per-group invariants (a poll request always
//! implies the enable bit, stops clear both bits of the pair).

use super::flags::ConnFlags;

use std::os::fd::RawFd;

/// A single proxied connection.
///
/// Created by an acceptor (incoming) or a connector (outgoing) with the
/// initial flags selecting its handshake set, connect-wait bits and
/// already-registered interest. The connection lives across many
/// readiness cycles and is only ever touched by its owning thread during
/// a cycle.
pub struct Connection {
    /// Descriptor key into the event facility.
    fd: RawFd,

    /// The flag bitset. See [`ConnFlags`] for the group layout.
    flags: ConnFlags,
}

impl Connection {
    /// Creates a connection over `fd` with the given initial flags.
    ///
    /// The creator is responsible for the coherence of the initial set:
    /// current-interest bits must describe what is actually registered at
    /// the event facility, and handshake-kind bits must have a matching
    /// step in the registry handed to the connection table.
    pub fn new(fd: RawFd, flags: ConnFlags) -> Self {
        Self { fd, flags }
    }

    /// Returns the descriptor this connection is keyed by.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Returns the current flag bitset.
    ///
    /// Intended for diagnostics and tests; mutation goes through the
    /// typed accessors.
    pub fn flags(&self) -> ConnFlags {
        self.flags
    }

    // ---- lifecycle -----------------------------------------------------

    /// Returns whether the terminal error bit is latched.
    pub fn has_error(&self) -> bool {
        self.flags.contains(ConnFlags::ERROR)
    }

    /// Latches the terminal error bit. The bit is never cleared again.
    pub fn latch_error(&mut self) {
        self.flags.insert(ConnFlags::ERROR);
    }

    /// Returns whether the establishment edge has been recorded.
    pub fn is_established(&self) -> bool {
        self.flags.contains(ConnFlags::CONNECTED)
    }

    pub(crate) fn mark_established(&mut self) {
        self.flags.insert(ConnFlags::CONNECTED);
    }

    /// Returns whether the transport-level connect is still unconfirmed.
    pub fn awaiting_l4(&self) -> bool {
        self.flags.contains(ConnFlags::WAIT_L4_CONN)
    }

    /// Confirms the transport-level connect.
    pub fn confirm_l4(&mut self) {
        self.flags.remove(ConnFlags::WAIT_L4_CONN);
    }

    /// Returns whether the lower-layer connect is still unconfirmed.
    pub fn awaiting_l6(&self) -> bool {
        self.flags.contains(ConnFlags::WAIT_L6_CONN)
    }

    /// Confirms the lower-layer connect.
    pub fn confirm_l6(&mut self) {
        self.flags.remove(ConnFlags::WAIT_L6_CONN);
    }

    /// Returns whether an embryonic session still awaits completion.
    pub fn expects_session(&self) -> bool {
        self.flags.contains(ConnFlags::INIT_SESS)
    }

    pub(crate) fn clear_init_sess(&mut self) {
        self.flags.remove(ConnFlags::INIT_SESS);
    }

    /// Requests that the upstream interface be poked after each cycle.
    pub fn request_wake(&mut self) {
        self.flags.insert(ConnFlags::NOTIFY_SI);
    }

    /// Withdraws the post-I/O wake request.
    pub fn clear_wake_request(&mut self) {
        self.flags.remove(ConnFlags::NOTIFY_SI);
    }

    /// Returns whether a post-I/O wake is requested.
    pub fn wake_requested(&self) -> bool {
        self.flags.contains(ConnFlags::NOTIFY_SI)
    }

    /// Returns whether the handshake layer still wants the raw socket
    /// polled after handshake completion.
    pub fn keeps_sock_polling(&self) -> bool {
        self.flags.contains(ConnFlags::POLL_SOCK)
    }

    // ---- handshake kinds -----------------------------------------------

    /// Returns whether any handshake kind is still pending.
    ///
    /// The handshake phase is derived state: it holds exactly while at
    /// least one kind bit is set.
    pub fn handshake_pending(&self) -> bool {
        self.flags.intersects(ConnFlags::HANDSHAKE_MASK)
    }

    /// Returns whether the given handshake kind is pending.
    pub fn has_handshake(&self, kind: ConnFlags) -> bool {
        self.flags.contains(kind)
    }

    /// Raises a handshake kind, re-entering the handshake phase.
    ///
    /// This is how a data-phase callback requests renegotiation: the
    /// readiness cycle returns to handshake processing before running its
    /// remaining half-step.
    pub fn raise_handshake(&mut self, kind: ConnFlags) {
        debug_assert!(
            ConnFlags::HANDSHAKE_MASK.contains(kind),
            "handshake kind outside the reserved bit range"
        );
        self.flags.insert(kind);
    }

    /// Clears a handshake kind.
    ///
    /// A handshake step must call this before reporting itself done.
    pub fn clear_handshake(&mut self, kind: ConnFlags) {
        self.flags.remove(kind);
    }

    // ---- desired interest, data layer ----------------------------------

    /// Enables receive interest on behalf of the application.
    pub fn want_recv(&mut self) {
        self.flags.insert(ConnFlags::DATA_RD_ENA);
    }

    /// Enables receive interest and requests an explicit poll edge.
    pub fn poll_recv(&mut self) {
        self.flags
            .insert(ConnFlags::DATA_RD_ENA | ConnFlags::DATA_RD_POL);
    }

    /// Withdraws the application's receive interest.
    pub fn stop_recv(&mut self) {
        self.flags
            .remove(ConnFlags::DATA_RD_ENA | ConnFlags::DATA_RD_POL);
    }

    /// Enables send interest on behalf of the application.
    pub fn want_send(&mut self) {
        self.flags.insert(ConnFlags::DATA_WR_ENA);
    }

    /// Enables send interest and requests an explicit poll edge.
    pub fn poll_send(&mut self) {
        self.flags
            .insert(ConnFlags::DATA_WR_ENA | ConnFlags::DATA_WR_POL);
    }

    /// Withdraws the application's send interest.
    pub fn stop_send(&mut self) {
        self.flags
            .remove(ConnFlags::DATA_WR_ENA | ConnFlags::DATA_WR_POL);
    }

    // ---- desired interest, socket layer --------------------------------

    /// Enables receive interest on behalf of a handshake step.
    pub fn sock_want_recv(&mut self) {
        self.flags.insert(ConnFlags::SOCK_RD_ENA);
    }

    /// Enables receive interest with an explicit poll edge for a
    /// handshake step.
    pub fn sock_poll_recv(&mut self) {
        self.flags
            .insert(ConnFlags::SOCK_RD_ENA | ConnFlags::SOCK_RD_POL);
    }

    /// Withdraws the handshake layer's receive interest.
    pub fn sock_stop_recv(&mut self) {
        self.flags
            .remove(ConnFlags::SOCK_RD_ENA | ConnFlags::SOCK_RD_POL);
    }

    /// Enables send interest on behalf of a handshake step.
    pub fn sock_want_send(&mut self) {
        self.flags.insert(ConnFlags::SOCK_WR_ENA);
    }

    /// Enables send interest with an explicit poll edge for a handshake
    /// step.
    pub fn sock_poll_send(&mut self) {
        self.flags
            .insert(ConnFlags::SOCK_WR_ENA | ConnFlags::SOCK_WR_POL);
    }

    /// Withdraws the handshake layer's send interest.
    pub fn sock_stop_send(&mut self) {
        self.flags
            .remove(ConnFlags::SOCK_WR_ENA | ConnFlags::SOCK_WR_POL);
    }

    /// Withdraws the handshake layer's interest in both directions.
    ///
    /// Run by the readiness cycle once handshakes have completed and the
    /// socket-polling retention bit is clear.
    pub fn sock_stop_both(&mut self) {
        self.flags.remove(ConnFlags::SOCK_MASK);
    }

    // ---- currently registered interest ---------------------------------

    /// Replaces the currently-registered interest bits with those of
    /// `next`, leaving every other bit untouched.
    pub(crate) fn commit_interest(&mut self, next: ConnFlags) {
        self.flags.remove(ConnFlags::CURR_MASK);
        self.flags.insert(next & ConnFlags::CURR_MASK);
    }
}
