//! Transport-level connect probe.

use super::app::Transport;
use crate::conn::Connection;

use std::mem;

/// Probes a non-blocking TCP connect via `SO_ERROR`.
///
/// Meaningful after a writable edge: the kernel reports the socket
/// writable once the three-way handshake finished or definitely failed,
/// and `SO_ERROR` distinguishes the two. A pending socket error latches
/// the connection's error bit here rather than leaving that to the
/// caller.
pub struct TcpConnectProbe;

impl Transport for TcpConnectProbe {
    fn probe_connect(&mut self, conn: &mut Connection) -> bool {
        let mut err: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;

        let rc = unsafe {
            libc::getsockopt(
                conn.fd(),
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut err as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };

        if rc != 0 || err != 0 {
            conn.latch_error();
            return false;
        }

        conn.confirm_l4();
        true
    }
}
