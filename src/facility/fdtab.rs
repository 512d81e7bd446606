//! Descriptor slot table.
//!
//! Each pollable descriptor gets one slot holding the readiness edges
//! latched for it and a weak back-reference to its owner. The table is
//! indexed directly by descriptor value and grows on demand, so lookups
//! on the readiness path are a single bounds-checked array access.

use bitflags::bitflags;

use std::os::fd::RawFd;

bitflags! {
    /// Readiness edges latched in a descriptor's slot.
    ///
    /// The readiness handler consumes these during a cycle and clears
    /// them before returning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FdEvents: u8 {
        /// Data can be received.
        const IN = 1 << 0;
        /// Data can be sent.
        const OUT = 1 << 1;
        /// The peer hung up.
        const HUP = 1 << 2;
        /// The descriptor is in an error state.
        const ERR = 1 << 3;
    }
}

/// One descriptor slot.
struct FdSlot<T> {
    /// Latched readiness edges, cleared after consumption.
    events: FdEvents,

    /// Back-reference to whoever owns the descriptor, if anyone.
    owner: Option<T>,
}

impl<T> FdSlot<T> {
    fn vacant() -> Self {
        Self {
            events: FdEvents::empty(),
            owner: None,
        }
    }
}

/// Table of descriptor slots, indexed by raw descriptor value.
pub(crate) struct FdTab<T> {
    slots: Vec<FdSlot<T>>,
}

impl<T: Copy> FdTab<T> {
    /// Creates a table with room for descriptors `0..capacity` without
    /// further growth.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| FdSlot::vacant()).collect();

        Self { slots }
    }

    /// Grows the table so `fd` has a slot.
    fn ensure(&mut self, fd: RawFd) -> usize {
        debug_assert!(fd >= 0, "negative descriptor");
        let index = fd as usize;

        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, FdSlot::vacant);
        }

        index
    }

    /// Records `owner` as the owner of `fd`.
    pub(crate) fn set_owner(&mut self, fd: RawFd, owner: T) {
        let index = self.ensure(fd);
        self.slots[index].owner = Some(owner);
    }

    /// Returns the owner of `fd`, if the descriptor has one.
    pub(crate) fn owner(&self, fd: RawFd) -> Option<T> {
        self.slots.get(fd as usize).and_then(|slot| slot.owner)
    }

    /// Latches additional readiness edges for `fd`.
    pub(crate) fn note(&mut self, fd: RawFd, events: FdEvents) {
        let index = self.ensure(fd);
        self.slots[index].events |= events;
    }

    /// Returns the edges currently latched for `fd`.
    pub(crate) fn events(&self, fd: RawFd) -> FdEvents {
        self.slots
            .get(fd as usize)
            .map(|slot| slot.events)
            .unwrap_or(FdEvents::empty())
    }

    /// Clears the latched edges of `fd`, keeping its owner.
    pub(crate) fn clear_events(&mut self, fd: RawFd) {
        if let Some(slot) = self.slots.get_mut(fd as usize) {
            slot.events = FdEvents::empty();
        }
    }

    /// Returns the slot of `fd` to the vacant state.
    pub(crate) fn reset(&mut self, fd: RawFd) {
        if let Some(slot) = self.slots.get_mut(fd as usize) {
            slot.events = FdEvents::empty();
            slot.owner = None;
        }
    }
}
