//! The readiness cycle.
//!
//! Entry point called by the event-loop glue for every descriptor the
//! facility reported ready. One cycle advances the owning connection
//! through up to three phases (handshake, data transfer, post-I/O
//! notification) and ends by reconciling the connection's desired
//! interest with the facility.
//!
//! The cycle is a stage loop. The handshake stage can be re-entered from
//! either data half-step (a sub-protocol such as TLS may raise a kind
//! again mid-stream), but each half-step itself runs at most once per
//! cycle.

use super::table::{ConnEntry, ConnTable, ConnToken};
use crate::conn::{polling, ConnFlags, HandshakeStatus, SessionError};
use crate::facility::{EventFacility, FdEvents};

use tracing::{debug, trace};

use std::os::fd::RawFd;

/// Where the cycle continues after the current stage.
enum Stage {
    Handshake,
    Recv,
    Send,
    Probe,
}

/// How the I/O phases of a cycle ended.
enum CycleEnd {
    /// Proceed to the post-I/O path (notify, established edge, edge
    /// clearing, reconciliation).
    Leave,

    /// The connection was destroyed mid-cycle; it must not be touched
    /// again.
    Destroyed,
}

impl ConnTable {
    /// Handles a readiness notification for `fd`.
    ///
    /// Resolves the owning connection, runs the I/O phases, then the
    /// post-I/O path. A descriptor without an owner is ignored, since it
    /// may have been closed between the kernel reporting the edge and
    /// user space picking it up. Status is conveyed entirely
    /// through the connection's flags and side effects.
    pub fn on_ready<F>(&mut self, facility: &mut F, fd: RawFd)
    where
        F: EventFacility + ?Sized,
    {
        let Some(token) = self.owner(fd) else {
            trace!(fd, "readiness for a descriptor without an owner");
            return;
        };

        let events = self.events(fd);

        match self.run_io(token, events) {
            CycleEnd::Destroyed => {}
            CycleEnd::Leave => self.finish_cycle(facility, fd, token),
        }
    }

    /// Runs the handshake and data phases of one cycle.
    fn run_io(&mut self, token: ConnToken, events: FdEvents) -> CycleEnd {
        let mut recv_done = false;
        let mut send_done = false;
        let mut stage = Stage::Handshake;

        loop {
            match stage {
                // Handshake steps run in registry order until none is
                // pending. Polling state is not guaranteed when a step is
                // entered, so a step that cannot finish leaves exactly the
                // socket-layer interest it needs and the cycle moves on.
                Stage::Handshake => {
                    loop {
                        let entry = self.entry_mut(token);
                        if !entry.conn.handshake_pending() {
                            break;
                        }
                        if entry.conn.has_error() {
                            return CycleEnd::Leave;
                        }

                        let ConnEntry {
                            conn, handshakes, ..
                        } = entry;
                        if handshakes.dispatch(conn) == HandshakeStatus::Pending {
                            return CycleEnd::Leave;
                        }
                    }

                    // Purely in the data phase the handshake layer no
                    // longer polls the socket, unless it asked to keep it.
                    let entry = self.entry_mut(token);
                    if !entry.conn.keeps_sock_polling() {
                        entry.conn.sock_stop_both();
                    }

                    // An incoming session may still need its completion.
                    // Failure destroys the connection, so leave without
                    // touching it again.
                    let expects_session = entry.conn.expects_session();
                    if expects_session && self.finish_session(token).is_err() {
                        return CycleEnd::Destroyed;
                    }

                    stage = if !recv_done {
                        Stage::Recv
                    } else if !send_done {
                        Stage::Send
                    } else {
                        Stage::Probe
                    };
                }

                Stage::Recv => {
                    recv_done = true;

                    if events.intersects(FdEvents::IN | FdEvents::HUP | FdEvents::ERR) {
                        let ConnEntry { conn, app, .. } = self.entry_mut(token);
                        app.recv(conn);
                    }

                    let conn = &self.entry_mut(token).conn;
                    if conn.has_error() {
                        return CycleEnd::Leave;
                    }

                    // the recv callback may have re-raised a handshake
                    // (e.g. TLS renegotiation)
                    stage = if conn.handshake_pending() {
                        Stage::Handshake
                    } else {
                        Stage::Send
                    };
                }

                Stage::Send => {
                    send_done = true;

                    if events.intersects(FdEvents::OUT | FdEvents::ERR) {
                        let ConnEntry { conn, app, .. } = self.entry_mut(token);
                        app.send(conn);
                    }

                    let conn = &self.entry_mut(token).conn;
                    if conn.has_error() {
                        return CycleEnd::Leave;
                    }

                    stage = if conn.handshake_pending() {
                        Stage::Handshake
                    } else {
                        Stage::Probe
                    };
                }

                // Still waiting for the transport connect and nothing to
                // send to probe it with: retry the probe itself. The
                // outcome travels through the flags either way.
                Stage::Probe => {
                    let ConnEntry {
                        conn, transport, ..
                    } = self.entry_mut(token);

                    if conn.awaiting_l4() {
                        transport.probe_connect(conn);
                    }

                    return CycleEnd::Leave;
                }
            }
        }
    }

    /// The post-I/O path of a cycle: embryonic abort, upstream wake,
    /// established edge, edge-bit clearing and reconciliation.
    fn finish_cycle<F>(&mut self, facility: &mut F, fd: RawFd, token: ConnToken)
    where
        F: EventFacility + ?Sized,
    {
        let flags = self.entry_mut(token).conn.flags();

        // A failed connection that never became a session is released
        // through its completion hook, which observes the error bit.
        if flags.contains(ConnFlags::ERROR | ConnFlags::INIT_SESS) {
            let _ = self.finish_session(token);
            return;
        }

        if flags.contains(ConnFlags::NOTIFY_SI) {
            let ConnEntry { conn, app, .. } = self.entry_mut(token);
            app.wake(conn);
        }

        // Last check: did the connection just establish?
        let entry = self.entry_mut(token);
        if !entry.conn.flags().intersects(
            ConnFlags::WAIT_L4_CONN | ConnFlags::WAIT_L6_CONN | ConnFlags::CONNECTED,
        ) {
            entry.conn.mark_established();
        }

        self.fdtab.clear_events(fd);

        let entry = self.entry_mut(token);
        polling::update(&mut entry.conn, facility);
    }

    /// Completes an embryonic session, destroying the connection entry
    /// on failure.
    fn finish_session(&mut self, token: ConnToken) -> Result<(), SessionError> {
        let entry = self.entry_mut(token);
        let fd = entry.conn.fd();

        entry.conn.clear_init_sess();

        let result = match entry.session.take() {
            Some(mut hook) => hook.complete(&mut entry.conn),
            None => Ok(()),
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(fd, error = %err, "session completion failed, releasing connection");
                self.destroy(token);
                Err(err)
            }
        }
    }
}
