mod core;
mod flags;
mod handshake;
mod session;

pub mod polling;

pub use self::core::Connection;
pub use self::flags::ConnFlags;
pub use self::handshake::{HandshakeRegistry, HandshakeStatus, HandshakeStep};
pub use self::session::{SessionError, SessionHook};
