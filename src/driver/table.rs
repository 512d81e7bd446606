//! The connection table.
//!
//! [`ConnTable`] owns every live connection entry (the connection
//! itself, its application callbacks, transport operations, handshake
//! registry and the optional session hook) in a slab with stable
//! tokens, next to the descriptor slot table mapping readiness back to
//! entries. The event-loop glue latches edges with
//! [`note_event`](ConnTable::note_event) and then hands each ready
//! descriptor to [`on_ready`](ConnTable::on_ready).

use super::app::{AppIo, Transport};
use crate::conn::{polling, Connection, HandshakeRegistry, SessionHook};
use crate::facility::{EventFacility, FdEvents, FdTab};
use crate::utils::Slab;

use thiserror::Error;
use tracing::trace;

use std::os::fd::RawFd;

/// Default number of descriptor slots preallocated by the builder.
const DEFAULT_FD_CAPACITY: usize = 1024;

/// Default number of connection slots preallocated by the builder.
const DEFAULT_CONN_CAPACITY: usize = 256;

/// Stable handle to a live connection entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnToken(pub(super) usize);

/// Why a connection could not be inserted into the table.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// Another connection already owns the descriptor.
    #[error("descriptor {fd} already has an owner")]
    DescriptorInUse { fd: RawFd },

    /// The descriptor value cannot be used as a table key.
    #[error("descriptor {fd} cannot be polled")]
    InvalidDescriptor { fd: RawFd },
}

/// Everything the table owns for one connection.
pub(super) struct ConnEntry {
    pub(super) conn: Connection,
    pub(super) app: Box<dyn AppIo>,
    pub(super) transport: Box<dyn Transport>,
    pub(super) handshakes: HandshakeRegistry,
    pub(super) session: Option<Box<dyn SessionHook>>,
}

/// Builder for configuring and creating a connection table.
///
/// # Examples
///
/// ```rust,ignore
/// let table = ConnTable::builder()
///     .fd_capacity(4096)
///     .conn_capacity(1024)
///     .build();
/// ```
pub struct ConnTableBuilder {
    fd_capacity: usize,
    conn_capacity: usize,
}

impl ConnTableBuilder {
    /// Creates a builder with the default capacities.
    pub fn new() -> Self {
        Self {
            fd_capacity: DEFAULT_FD_CAPACITY,
            conn_capacity: DEFAULT_CONN_CAPACITY,
        }
    }

    /// Sets the number of descriptor slots to preallocate.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn fd_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "fd_capacity must be > 0");

        self.fd_capacity = n;
        self
    }

    /// Sets the number of connection slots to preallocate.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn conn_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "conn_capacity must be > 0");

        self.conn_capacity = n;
        self
    }

    /// Builds the table with the configured options.
    pub fn build(self) -> ConnTable {
        ConnTable {
            conns: Slab::new(self.conn_capacity),
            fdtab: FdTab::with_capacity(self.fd_capacity),
        }
    }
}

impl Default for ConnTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of all live connections and of the descriptor slot table.
pub struct ConnTable {
    pub(super) conns: Slab<ConnEntry>,
    pub(super) fdtab: FdTab<ConnToken>,
}

impl ConnTable {
    /// Creates a table with default capacities.
    pub fn new() -> Self {
        ConnTableBuilder::new().build()
    }

    /// Returns a builder for a table with custom capacities.
    pub fn builder() -> ConnTableBuilder {
        ConnTableBuilder::new()
    }

    /// Inserts a connection with its collaborators and records it as the
    /// owner of its descriptor.
    ///
    /// The connection's current-interest bits must describe what is
    /// actually registered at the event facility; the table does not
    /// reconcile on insert; call [`reconcile`](Self::reconcile) once the
    /// desired interest is set up.
    pub fn insert(
        &mut self,
        conn: Connection,
        app: Box<dyn AppIo>,
        transport: Box<dyn Transport>,
        handshakes: HandshakeRegistry,
        session: Option<Box<dyn SessionHook>>,
    ) -> Result<ConnToken, RegisterError> {
        let fd = conn.fd();

        if fd < 0 {
            return Err(RegisterError::InvalidDescriptor { fd });
        }
        if self.fdtab.owner(fd).is_some() {
            return Err(RegisterError::DescriptorInUse { fd });
        }

        let token = ConnToken(self.conns.insert(ConnEntry {
            conn,
            app,
            transport,
            handshakes,
            session,
        }));

        self.fdtab.set_owner(fd, token);

        Ok(token)
    }

    /// Removes a connection entry, vacating its descriptor slot.
    ///
    /// Returns the connection for inspection; the callbacks and hooks
    /// attached to it are dropped.
    pub fn remove(&mut self, token: ConnToken) -> Option<Connection> {
        let entry = self.conns.remove(token.0)?;
        self.fdtab.reset(entry.conn.fd());

        Some(entry.conn)
    }

    /// Returns the number of live connections.
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    /// Returns whether the table holds no connections.
    pub fn is_empty(&self) -> bool {
        self.conns.len() == 0
    }

    /// Returns the connection behind `token`, if it is still live.
    pub fn conn(&self, token: ConnToken) -> Option<&Connection> {
        self.conns.get(token.0).map(|entry| &entry.conn)
    }

    /// Returns the connection behind `token` mutably, if it is still
    /// live.
    pub fn conn_mut(&mut self, token: ConnToken) -> Option<&mut Connection> {
        self.conns.get_mut(token.0).map(|entry| &mut entry.conn)
    }

    /// Returns the owner of `fd`, if the descriptor has one.
    pub fn owner(&self, fd: RawFd) -> Option<ConnToken> {
        self.fdtab.owner(fd)
    }

    /// Latches readiness edges for `fd`, to be consumed by the next
    /// [`on_ready`](Self::on_ready) call.
    pub fn note_event(&mut self, fd: RawFd, events: FdEvents) {
        self.fdtab.note(fd, events);
    }

    /// Returns the edges currently latched for `fd`.
    pub fn events(&self, fd: RawFd) -> FdEvents {
        self.fdtab.events(fd)
    }

    /// Reconciles the connection's desired interest with the facility.
    ///
    /// Used right after [`insert`](Self::insert), or whenever interest
    /// was changed outside a readiness cycle; cycles reconcile on their
    /// own.
    pub fn reconcile<F>(&mut self, facility: &mut F, token: ConnToken)
    where
        F: EventFacility + ?Sized,
    {
        if let Some(entry) = self.conns.get_mut(token.0) {
            polling::update(&mut entry.conn, facility);
        }
    }

    /// Drops a connection entry from the readiness path.
    pub(super) fn destroy(&mut self, token: ConnToken) {
        if let Some(entry) = self.conns.remove(token.0) {
            trace!(fd = entry.conn.fd(), "connection entry released");
            self.fdtab.reset(entry.conn.fd());
        }
    }

    pub(super) fn entry_mut(&mut self, token: ConnToken) -> &mut ConnEntry {
        self.conns
            .get_mut(token.0)
            .expect("connection token does not resolve to a live entry")
    }
}

impl Default for ConnTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::ConnFlags;

    struct NoIo;

    impl AppIo for NoIo {
        fn recv(&mut self, _conn: &mut Connection) {}
        fn send(&mut self, _conn: &mut Connection) {}
        fn wake(&mut self, _conn: &mut Connection) {}
    }

    struct NoProbe;

    impl Transport for NoProbe {
        fn probe_connect(&mut self, _conn: &mut Connection) -> bool {
            true
        }
    }

    fn insert_plain(table: &mut ConnTable, fd: RawFd) -> Result<ConnToken, RegisterError> {
        table.insert(
            Connection::new(fd, ConnFlags::empty()),
            Box::new(NoIo),
            Box::new(NoProbe),
            HandshakeRegistry::new(),
            None,
        )
    }

    #[test]
    fn insert_records_descriptor_ownership() {
        let mut table = ConnTable::new();

        let token = insert_plain(&mut table, 8).expect("insert failed");
        assert_eq!(table.owner(8), Some(token));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn a_descriptor_has_at_most_one_owner() {
        let mut table = ConnTable::new();

        insert_plain(&mut table, 8).expect("insert failed");
        let second = insert_plain(&mut table, 8);

        assert!(matches!(
            second,
            Err(RegisterError::DescriptorInUse { fd: 8 })
        ));
    }

    #[test]
    fn remove_vacates_the_descriptor_slot() {
        let mut table = ConnTable::new();

        let token = insert_plain(&mut table, 8).expect("insert failed");
        table.note_event(8, FdEvents::IN);

        let conn = table.remove(token).expect("entry should be live");
        assert_eq!(conn.fd(), 8);
        assert_eq!(table.owner(8), None);
        assert_eq!(table.events(8), FdEvents::empty());
        assert!(table.is_empty());

        // the descriptor can be reused afterwards
        insert_plain(&mut table, 8).expect("reinsert failed");
    }

    #[test]
    fn negative_descriptors_are_rejected() {
        let mut table = ConnTable::new();

        assert!(matches!(
            insert_plain(&mut table, -1),
            Err(RegisterError::InvalidDescriptor { fd: -1 })
        ));
    }
}
