//! Callback contracts at the data-phase boundary.
//!
//! The core dispatches readiness to these traits without knowing what
//! the application does with the bytes; buffer management and protocol
//! parsing live entirely behind them.

use crate::conn::Connection;

/// Application callbacks invoked during the data phase.
///
/// All three methods must return promptly; blocking the thread stalls
/// every connection of the loop. A callback may latch the error bit or
/// raise a handshake kind (renegotiation); it must never free the
/// connection. Re-entry is requested by adjusting the data-layer
/// interest bits, not by looping inside the callback.
pub trait AppIo {
    /// The descriptor reported a receive-side edge (`IN`, `HUP` or
    /// `ERR`).
    fn recv(&mut self, conn: &mut Connection);

    /// The descriptor reported a send-side edge (`OUT` or `ERR`).
    fn send(&mut self, conn: &mut Connection);

    /// The post-I/O poke, issued when the connection requests an
    /// upstream wake after each cycle.
    fn wake(&mut self, conn: &mut Connection);
}

/// Lower-layer transport operations for a connection.
pub trait Transport {
    /// Checks whether the in-progress transport-level connect has been
    /// confirmed.
    ///
    /// On confirmation the implementation clears the connect-wait bit
    /// and returns `true`; on a socket error it latches the error bit
    /// and returns `false`; otherwise it leaves the flags alone and
    /// returns `false` so the next writable edge retries.
    fn probe_connect(&mut self, conn: &mut Connection) -> bool;
}
