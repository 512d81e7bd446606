//! Linux `epoll`-based event facility.
//!
//! This backend realizes the six interest primitives with `epoll_ctl`.
//!
//! Responsibilities:
//! - Track the interest registered per descriptor so each primitive maps
//!   to the single `ADD`, `MOD` or `DEL` call that realizes the change
//! - Block waiting for I/O readiness and harvest it into [`ReadyEvent`]s
//! - Keep a reusable event buffer so the hot path does not allocate
//!
//! Because `epoll` is level-triggered here, an enabled interest is
//! re-reported on every wait while the condition holds; the explicit
//! poll request therefore reduces to enabling the interest.

use super::{EventFacility, FdEvents, ReadyEvent};

use libc::{
    epoll_create1, epoll_ctl, epoll_event, epoll_wait, EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT,
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD,
};
use tracing::trace;

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Interest registered with epoll for one descriptor.
#[derive(Clone, Copy, Default)]
struct Registration {
    read: bool,
    write: bool,
    /// Whether the descriptor is currently known to the epoll instance.
    registered: bool,
}

/// Linux event facility backed by an `epoll` instance.
///
/// # Examples
///
/// ```rust,ignore
/// let mut facility = EpollFacility::new()?;
/// let mut events = Vec::new();
///
/// facility.want_recv(fd);
/// facility.poll(&mut events, Some(Duration::from_millis(100)))?;
/// ```
pub struct EpollFacility {
    /// Epoll file descriptor.
    epoll: RawFd,

    /// Tracked registration state, indexed by descriptor.
    regs: Vec<Registration>,

    /// Reusable buffer for `epoll_wait` results.
    buffer: Vec<epoll_event>,
}

impl EpollFacility {
    /// Creates a facility with its own epoll instance.
    pub fn new() -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            epoll,
            regs: Vec::new(),
            buffer: Vec::with_capacity(64),
        })
    }

    fn ensure(&mut self, fd: RawFd) -> usize {
        debug_assert!(fd >= 0, "negative descriptor");
        let index = fd as usize;

        if index >= self.regs.len() {
            self.regs.resize(index + 1, Registration::default());
        }

        index
    }

    /// Pushes the tracked interest of `fd` down to the epoll instance.
    fn apply(&mut self, fd: RawFd) {
        let index = fd as usize;
        let reg = self.regs[index];

        if reg.read || reg.write {
            let mut flags = 0u32;
            if reg.read {
                flags |= EPOLLIN as u32;
            }
            if reg.write {
                flags |= EPOLLOUT as u32;
            }

            let mut event = epoll_event {
                events: flags,
                u64: fd as u64,
            };

            let op = if reg.registered {
                EPOLL_CTL_MOD
            } else {
                EPOLL_CTL_ADD
            };

            let rc = unsafe { epoll_ctl(self.epoll, op, fd, &mut event) };
            debug_assert_eq!(rc, 0, "epoll_ctl failed for fd {fd}");

            self.regs[index].registered = true;
            trace!(fd, read = reg.read, write = reg.write, "epoll interest updated");
        } else if reg.registered {
            unsafe {
                epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, std::ptr::null_mut());
            }

            self.regs[index].registered = false;
            trace!(fd, "epoll interest withdrawn");
        }
    }

    /// Waits for readiness and fills `events`.
    ///
    /// Blocks until at least one descriptor becomes ready or the optional
    /// timeout expires. Edges for the same descriptor are merged into a
    /// single [`ReadyEvent`]. An interrupted wait returns with `events`
    /// empty.
    pub fn poll(&mut self, events: &mut Vec<ReadyEvent>, timeout: Option<Duration>) -> io::Result<()> {
        let timeout_ms = timeout.map(|t| t.as_millis() as i32).unwrap_or(-1);

        unsafe {
            self.buffer.set_len(self.buffer.capacity());
        }

        let n = unsafe {
            epoll_wait(
                self.epoll,
                self.buffer.as_mut_ptr(),
                self.buffer.capacity() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            unsafe {
                self.buffer.set_len(0);
            }

            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                events.clear();
                return Ok(());
            }
            return Err(err);
        }

        unsafe {
            self.buffer.set_len(n as usize);
        }

        events.clear();

        for ev in &self.buffer {
            let fd = ev.u64 as RawFd;

            let mut ready = FdEvents::empty();
            if ev.events & EPOLLIN as u32 != 0 {
                ready |= FdEvents::IN;
            }
            if ev.events & EPOLLOUT as u32 != 0 {
                ready |= FdEvents::OUT;
            }
            if ev.events & EPOLLHUP as u32 != 0 {
                ready |= FdEvents::HUP;
            }
            if ev.events & EPOLLERR as u32 != 0 {
                ready |= FdEvents::ERR;
            }

            if let Some(existing) = events.iter_mut().find(|e| e.fd == fd) {
                existing.events |= ready;
            } else {
                events.push(ReadyEvent { fd, events: ready });
            }
        }

        Ok(())
    }
}

impl EventFacility for EpollFacility {
    fn want_recv(&mut self, fd: RawFd) {
        let index = self.ensure(fd);
        self.regs[index].read = true;
        self.apply(fd);
    }

    fn stop_recv(&mut self, fd: RawFd) {
        let index = self.ensure(fd);
        self.regs[index].read = false;
        self.apply(fd);
    }

    /// With a level-triggered instance the explicit poll request carries
    /// no extra arming; it enables the interest like `want_recv`.
    fn poll_recv(&mut self, fd: RawFd) {
        self.want_recv(fd);
    }

    fn want_send(&mut self, fd: RawFd) {
        let index = self.ensure(fd);
        self.regs[index].write = true;
        self.apply(fd);
    }

    fn stop_send(&mut self, fd: RawFd) {
        let index = self.ensure(fd);
        self.regs[index].write = false;
        self.apply(fd);
    }

    /// See [`EpollFacility::poll_recv`].
    fn poll_send(&mut self, fd: RawFd) {
        self.want_send(fd);
    }
}

impl Drop for EpollFacility {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epoll);
        }
    }
}
