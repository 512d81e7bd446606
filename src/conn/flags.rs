//! Connection flag model.
//!
//! A connection's whole observable state lives in one fixed-width bitset,
//! logically partitioned into four groups:
//!
//! - **Phase / lifecycle**: error, establishment, connect-wait and
//!   notification bits.
//! - **Pending handshake kinds**: one bit per sub-protocol that still has
//!   to run before (or, after renegotiation, during) the data phase.
//! - **Desired interest**: what the upper layers want the event facility
//!   to watch, kept as two independent layers: the data layer driven by
//!   the application callbacks, and the socket layer driven by handshake
//!   steps.
//! - **Currently registered interest**: the `(ENA, POL)` pair per
//!   direction that was last committed to the event facility.
//!
//! All bits are modified only by the thread owning the connection during a
//! readiness cycle; no cross-thread atomicity is provided or required.

use bitflags::bitflags;

bitflags! {
    /// Per-connection state bits.
    ///
    /// The composite `*_MASK` constants delimit the groups; code that
    /// manipulates a group should go through the typed accessors on
    /// [`Connection`](super::Connection) rather than toggling raw bits.
    ///
    /// Within the current-interest group, an `(ENA, POL)` pair encodes
    /// three meaningful states per direction: absent (`00`), want (`10`)
    /// and poll (`11`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConnFlags: u32 {
        /// Terminal failure. Latched once and never cleared for the
        /// lifetime of the connection.
        const ERROR = 1 << 0;

        /// Set on the first readiness cycle where neither connect-wait
        /// bit is set. Set exactly once.
        const CONNECTED = 1 << 1;

        /// The transport-level (TCP) connect has not been confirmed yet.
        const WAIT_L4_CONN = 1 << 2;

        /// The lower-layer (e.g. TLS) connect has not been confirmed yet.
        const WAIT_L6_CONN = 1 << 3;

        /// An embryonic incoming session still awaits completion.
        const INIT_SESS = 1 << 4;

        /// The upstream stream interface must be poked after I/O.
        const NOTIFY_SI = 1 << 5;

        /// The handshake layer keeps polling the raw socket even after
        /// all handshakes have completed.
        const POLL_SOCK = 1 << 6;

        /// Handshake kind: parse an inbound PROXY-protocol header before
        /// anything else happens on the connection.
        const ACCEPT_PROXY = 1 << 8;

        /// Handshake kind: emit an outbound PROXY-protocol header.
        const SEND_PROXY = 1 << 9;

        /// Every handshake-kind bit. The positions not taken by the
        /// built-in kinds are reserved for kinds registered by the
        /// application; a connection is in the handshake phase while any
        /// bit of this mask is set.
        const HANDSHAKE_MASK = 0x0000_0f00;

        /// Data layer wants to receive.
        const DATA_RD_ENA = 1 << 12;
        /// Data layer requests an explicit poll edge for receive.
        const DATA_RD_POL = 1 << 13;
        /// Data layer wants to send.
        const DATA_WR_ENA = 1 << 14;
        /// Data layer requests an explicit poll edge for send.
        const DATA_WR_POL = 1 << 15;

        /// All data-layer desired-interest bits.
        const DATA_MASK = Self::DATA_RD_ENA.bits()
            | Self::DATA_RD_POL.bits()
            | Self::DATA_WR_ENA.bits()
            | Self::DATA_WR_POL.bits();

        /// Socket layer (handshake steps) wants to receive.
        const SOCK_RD_ENA = 1 << 16;
        /// Socket layer requests an explicit poll edge for receive.
        const SOCK_RD_POL = 1 << 17;
        /// Socket layer wants to send.
        const SOCK_WR_ENA = 1 << 18;
        /// Socket layer requests an explicit poll edge for send.
        const SOCK_WR_POL = 1 << 19;

        /// All socket-layer desired-interest bits.
        const SOCK_MASK = Self::SOCK_RD_ENA.bits()
            | Self::SOCK_RD_POL.bits()
            | Self::SOCK_WR_ENA.bits()
            | Self::SOCK_WR_POL.bits();

        /// Receive interest currently registered at the event facility.
        const CURR_RD_ENA = 1 << 20;
        /// Explicit receive poll currently requested at the facility.
        const CURR_RD_POL = 1 << 21;
        /// Send interest currently registered at the event facility.
        const CURR_WR_ENA = 1 << 22;
        /// Explicit send poll currently requested at the facility.
        const CURR_WR_POL = 1 << 23;

        /// All currently-registered interest bits.
        const CURR_MASK = Self::CURR_RD_ENA.bits()
            | Self::CURR_RD_POL.bits()
            | Self::CURR_WR_ENA.bits()
            | Self::CURR_WR_POL.bits();
    }
}
