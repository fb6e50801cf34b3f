//! Fork-join frame barrier
//!
//! The whole frame state lives in one `AtomicU64`:
//!
//! ```text
//! 63            32 31         30            0
//! +---------------+----------+--------------+
//! |    ticket     | present. |   pending    |
//! +---------------+----------+--------------+
//! ```
//!
//! - `ticket` is bumped for every dispatched frame and on every
//!   reconfiguration. Completions carry the ticket they were dispatched with;
//!   a stale ticket fails the compare-exchange and is discarded.
//! - `pending` counts workers that still have to report. Decrement-and-check
//!   is a single compare-exchange, so exactly one completion observes the
//!   transition to zero.
//! - `presenting` holds the barrier closed while the releasing worker
//!   snapshots and presents the finished canvas.
//!
//! Workers never wait on each other; the only serialization point is the
//! release performed by the last finisher.

use crate::buffers::SharedSimulationBuffers;
use crate::canvas::CanvasSlot;
use crate::surface::PresentationSurface;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const PENDING_MASK: u64 = 0x7FFF_FFFF;
const PRESENTING_BIT: u64 = 1 << 31;
const TICKET_SHIFT: u32 = 32;

fn pack(ticket: u32, presenting: bool, pending: u64) -> u64 {
    let presenting = if presenting { PRESENTING_BIT } else { 0 };
    (ticket as u64) << TICKET_SHIFT | presenting | (pending & PENDING_MASK)
}

fn ticket_of(state: u64) -> u32 {
    (state >> TICKET_SHIFT) as u32
}

fn pending_of(state: u64) -> u64 {
    state & PENDING_MASK
}

fn presenting_of(state: u64) -> bool {
    state & PRESENTING_BIT != 0
}

/// Identifies one dispatched frame; sent to every worker with the step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepTicket {
    pub ticket: u32,
    /// Configuration the frame was dispatched under
    pub epoch: u64,
    /// Index of the frame; selects the canvas slot
    pub frame: u64,
}

impl StepTicket {
    pub fn slot(&self) -> CanvasSlot {
        CanvasSlot::for_frame(self.frame)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarrierState {
    Idle,
    Stepping { pending: u32 },
    Presenting,
}

pub struct FrameBarrier {
    state: AtomicU64,
    frames_completed: AtomicU64,
    surface: Arc<dyn PresentationSurface>,
}

impl FrameBarrier {
    pub fn new(surface: Arc<dyn PresentationSurface>) -> Self {
        Self {
            state: AtomicU64::new(0),
            frames_completed: AtomicU64::new(0),
            surface,
        }
    }

    pub fn state(&self) -> BarrierState {
        let state = self.state.load(Ordering::Acquire);
        if presenting_of(state) {
            BarrierState::Presenting
        } else if pending_of(state) > 0 {
            BarrierState::Stepping {
                pending: pending_of(state) as u32,
            }
        } else {
            BarrierState::Idle
        }
    }

    /// Number of released frames; the index of the next frame to dispatch
    pub fn frames_completed(&self) -> u64 {
        self.frames_completed.load(Ordering::Acquire)
    }

    /// Canvas the next (or in-flight) frame paints into
    pub fn active_slot(&self) -> CanvasSlot {
        CanvasSlot::for_frame(self.frames_completed())
    }

    /// Open a frame for `participants` workers.
    ///
    /// Returns the frame's ticket, or `None` while a previous frame is still
    /// stepping or presenting (or when there is nobody to wait for).
    pub fn try_begin(&self, participants: usize) -> Option<u32> {
        let participants = (participants as u64).min(PENDING_MASK);
        if participants == 0 {
            return None;
        }

        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if pending_of(current) != 0 || presenting_of(current) {
                return None;
            }

            let ticket = ticket_of(current).wrapping_add(1);
            match self.state.compare_exchange_weak(
                current,
                pack(ticket, false, participants),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(ticket),
                Err(actual) => current = actual,
            }
        }
    }

    /// Abandon whatever frame is in flight.
    ///
    /// Completions for it still arrive, but carry an old ticket and are
    /// ignored.
    pub fn invalidate(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(pack(ticket_of(current).wrapping_add(1), false, 0))
            });
    }

    /// Report one worker done with `step`.
    ///
    /// This is the per-worker completion entry point. It is safe to call from
    /// every worker concurrently. Only the call that brings the countdown to
    /// zero does the rest: it advances the frame counter (which toggles the
    /// active canvas), snapshots and clears the canvas the frame painted,
    /// presents it and reopens the barrier. That call returns `true`. Every
    /// other call, including stale ones, returns `false` without side effects.
    pub fn complete(&self, step: &StepTicket, buffers: &SharedSimulationBuffers) -> bool {
        self.report(step, Some(buffers))
    }

    /// Report one worker done with `step` without having buffers to paint
    /// into or present from.
    ///
    /// Counts toward the countdown exactly like [`FrameBarrier::complete`].
    /// If this is the last report, the frame counter still advances and the
    /// barrier reopens, but nothing is presented.
    pub fn abandon(&self, step: &StepTicket) -> bool {
        self.report(step, None)
    }

    fn report(&self, step: &StepTicket, buffers: Option<&SharedSimulationBuffers>) -> bool {
        let result = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if ticket_of(current) != step.ticket || pending_of(current) == 0 {
                    return None;
                }
                let pending = pending_of(current) - 1;
                Some(pack(step.ticket, pending == 0, pending))
            });

        match result {
            Ok(previous) if pending_of(previous) == 1 => {
                self.release(step, buffers);
                true
            }
            Ok(_) => false,
            Err(current) => {
                log::trace!(
                    "discarding completion for ticket {} (current ticket {})",
                    step.ticket,
                    ticket_of(current)
                );
                false
            }
        }
    }

    fn release(&self, step: &StepTicket, buffers: Option<&SharedSimulationBuffers>) {
        self.frames_completed.fetch_add(1, Ordering::AcqRel);

        match buffers {
            Some(buffers) => {
                let snapshot = buffers.canvas(step.slot()).snapshot_and_clear(step.frame);
                log::debug!(
                    "frame {} released ({} pixels painted on canvas {:?})",
                    step.frame,
                    snapshot.painted_pixels(),
                    step.slot()
                );
                self.surface.present(snapshot);
            }
            None => log::warn!("frame {} released without buffers; not presented", step.frame),
        }

        // Fails if a reconfiguration invalidated the frame meanwhile, which
        // already left the barrier open under a newer ticket.
        let _ = self.state.compare_exchange(
            pack(step.ticket, true, 0),
            pack(step.ticket, false, 0),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}
