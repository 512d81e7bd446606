//! Poll-intent reconciliation.
//!
//! The reconciler turns an interest change into the minimal set of event
//! facility operations. It works on two bit groups of the connection:
//! the desired interest (the union of the data and socket layers) and
//! the currently-registered interest, a `(ENA, POL)` pair per direction.
//!
//! Per direction, exactly one of the facility primitives is issued:
//!
//! - `poll_*` when the pair transitions **to** `11` from anything else,
//! - `want_*` when `ENA` goes `0 → 1` and the pair is not newly `11`,
//! - `stop_*` when `ENA` goes `1 → 0`,
//! - nothing when no relevant edge occurred.
//!
//! After emitting, the four current-interest bits are committed into the
//! connection and nothing else is touched. Keeping both the desire and
//! the registered state as bit pairs makes the reconciler memoryless
//! across cycles while still never issuing a redundant facility call.

use super::core::Connection;
use super::flags::ConnFlags;
use crate::facility::EventFacility;

/// Recomputes the registered interest from the connection's desired
/// interest and commits it.
///
/// The desired value is the per-direction union of the data-layer and
/// socket-layer groups; an explicit poll request in either layer yields
/// the `11` pair for that direction. This is what the readiness cycle
/// runs as its final step.
pub fn update<F>(conn: &mut Connection, facility: &mut F)
where
    F: EventFacility + ?Sized,
{
    let flags = conn.flags();
    let mut next = ConnFlags::empty();

    if flags.intersects(ConnFlags::DATA_RD_ENA | ConnFlags::SOCK_RD_ENA) {
        next |= ConnFlags::CURR_RD_ENA;
    }
    if flags.intersects(ConnFlags::DATA_RD_POL | ConnFlags::SOCK_RD_POL) {
        next |= ConnFlags::CURR_RD_ENA | ConnFlags::CURR_RD_POL;
    }
    if flags.intersects(ConnFlags::DATA_WR_ENA | ConnFlags::SOCK_WR_ENA) {
        next |= ConnFlags::CURR_WR_ENA;
    }
    if flags.intersects(ConnFlags::DATA_WR_POL | ConnFlags::SOCK_WR_POL) {
        next |= ConnFlags::CURR_WR_ENA | ConnFlags::CURR_WR_POL;
    }

    commit(conn, facility, next);
}

/// Reconciles the registered interest towards `next` and commits it.
///
/// Only the current-interest bits of `next` are considered. Calling this
/// with the connection's present current-interest bits issues no
/// facility operation at all, and two back-to-back calls with the same
/// `next` issue the same operations as one.
pub fn commit<F>(conn: &mut Connection, facility: &mut F, next: ConnFlags)
where
    F: EventFacility + ?Sized,
{
    const RD_PAIR: ConnFlags = ConnFlags::CURR_RD_ENA.union(ConnFlags::CURR_RD_POL);
    const WR_PAIR: ConnFlags = ConnFlags::CURR_WR_ENA.union(ConnFlags::CURR_WR_POL);

    let curr = conn.flags();
    let fd = conn.fd();

    if !curr.contains(RD_PAIR) && next.contains(RD_PAIR) {
        facility.poll_recv(fd);
    } else if !curr.contains(ConnFlags::CURR_RD_ENA) && next.contains(ConnFlags::CURR_RD_ENA) {
        facility.want_recv(fd);
    } else if curr.contains(ConnFlags::CURR_RD_ENA) && !next.contains(ConnFlags::CURR_RD_ENA) {
        facility.stop_recv(fd);
    }

    if !curr.contains(WR_PAIR) && next.contains(WR_PAIR) {
        facility.poll_send(fd);
    } else if !curr.contains(ConnFlags::CURR_WR_ENA) && next.contains(ConnFlags::CURR_WR_ENA) {
        facility.want_send(fd);
    } else if curr.contains(ConnFlags::CURR_WR_ENA) && !next.contains(ConnFlags::CURR_WR_ENA) {
        facility.stop_send(fd);
    }

    conn.commit_interest(next);
}
