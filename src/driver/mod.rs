mod app;
mod handler;
mod table;

#[cfg(unix)]
mod probe;

pub use app::{AppIo, Transport};
pub use table::{ConnTable, ConnTableBuilder, ConnToken, RegisterError};

#[cfg(unix)]
pub use probe::TcpConnectProbe;
