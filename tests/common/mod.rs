//! Shared in-memory event-facility double.
#![allow(dead_code)]

use nexilis::facility::EventFacility;

use std::os::fd::RawFd;

/// One recorded facility primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilityOp {
    WantRecv,
    StopRecv,
    PollRecv,
    WantSend,
    StopSend,
    PollSend,
}

/// An event facility that records every primitive issued to it.
#[derive(Default)]
pub struct FacilityLog {
    pub ops: Vec<(RawFd, FacilityOp)>,
}

impl FacilityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns the recorded operations.
    pub fn take(&mut self) -> Vec<(RawFd, FacilityOp)> {
        std::mem::take(&mut self.ops)
    }
}

impl EventFacility for FacilityLog {
    fn want_recv(&mut self, fd: RawFd) {
        self.ops.push((fd, FacilityOp::WantRecv));
    }

    fn stop_recv(&mut self, fd: RawFd) {
        self.ops.push((fd, FacilityOp::StopRecv));
    }

    fn poll_recv(&mut self, fd: RawFd) {
        self.ops.push((fd, FacilityOp::PollRecv));
    }

    fn want_send(&mut self, fd: RawFd) {
        self.ops.push((fd, FacilityOp::WantSend));
    }

    fn stop_send(&mut self, fd: RawFd) {
        self.ops.push((fd, FacilityOp::StopSend));
    }

    fn poll_send(&mut self, fd: RawFd) {
        self.ops.push((fd, FacilityOp::PollSend));
    }
}
