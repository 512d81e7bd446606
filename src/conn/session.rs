//! Embryonic session completion.
//!
//! An incoming connection starts life before its upper-layer session
//! object exists. Once the handshakes that gate session construction
//! have run, the connection table invokes the completion hook; a failed
//! completion is the one place where the core itself disposes of a
//! connection.

use super::core::Connection;

use thiserror::Error;

/// Why an embryonic session could not be completed.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The connection latched its error bit before the session was fully
    /// set up.
    #[error("connection failed before the session was set up")]
    ConnectionFailed,

    /// The session layer could not allocate its resources.
    #[error("session resources could not be allocated")]
    ResourcesExhausted,

    /// The session layer refused the connection.
    #[error("session rejected: {0}")]
    Rejected(&'static str),
}

/// Finishes constructing the upper-layer session for an embryonic
/// connection.
///
/// The hook is consumed on first use: the table clears the pending bit
/// before invoking it, and a returned error makes the table destroy the
/// connection entry. The caller must not touch the connection again
/// after a failed completion.
///
/// A hook invoked while the connection carries the error bit is expected
/// to fail and release whatever the session layer had reserved.
pub trait SessionHook {
    /// Builds the session over `conn`.
    fn complete(&mut self, conn: &mut Connection) -> Result<(), SessionError>;
}
