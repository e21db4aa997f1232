//! The frame ring: three slots, each a mailbox between the submission and
//! execution roles.
//!
//! Per slot there are two mutex/condvar pairs with disjoint jobs:
//! - the *pull* pair hands a recorded frame to the execution role
//!   (`ready_for_run`, the moved steps, the deleters).
//! - the *push* pair hands the slot back (`ready_for_fence`), which is what
//!   bounds the pipeline to three frames in flight: `begin_frame` cannot
//!   claim a slot the execution role has not fenced yet.
//!
//! Neither role ever holds both locks at once, and no lock spans the ring, so
//! the roles only contend on the single slot they are exchanging.

use std::sync::{
    Arc, Condvar, Mutex,
    atomic::{AtomicBool, AtomicI32, Ordering},
};

use crate::{
    command::{InitStep, Step},
    deleter::Deleter,
    push_buffer::PushBuffer,
};

///Frames that can be in flight at once. Submission may run up to this many
///frames ahead of execution before `begin_frame` blocks.
pub const FRAME_RING_SIZE: usize = 3;

///How the execution role finishes a claimed slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum RunType {
    ///A whole frame: fence the slot, swap, move to the next slot.
    Submit,
    ///Mid-frame flush for a synchronous readback: fence, stay on this slot.
    Sync,
}

///Guarded by the push mutex.
pub(crate) struct PushState {
    ///Slot is retired and may be claimed by `begin_frame`.
    pub ready_for_fence: bool,
    ///Slot is claimed by the submission role.
    pub ready_for_submit: bool,
    ///Slot carries submitted work the execution role has not fenced yet.
    pub pending: bool,
}

///Guarded by the pull mutex.
pub(crate) struct PullState {
    pub ready_for_run: bool,
    pub run_type: RunType,
    pub steps: Vec<Step>,
    pub init_steps: Vec<InitStep>,
    ///Deletes queued with the frame occupying this slot. Not performed yet.
    pub deleter: Deleter,
    ///Deletes from this slot's previous occupancy. Performed when the slot is
    ///claimed by the execution role - exactly one ring cycle after queuing.
    pub deleter_prev: Deleter,
    ///Push buffers whose write window follows this slot.
    pub push_buffers: Vec<Arc<PushBuffer>>,
}

pub(crate) struct FrameSlot {
    pub push: Mutex<PushState>,
    pub push_cv: Condvar,
    pub pull: Mutex<PullState>,
    pub pull_cv: Condvar,
}

impl FrameSlot {
    fn new() -> Self {
        FrameSlot {
            push: Mutex::new(PushState {
                //all slots start retired so the first ring cycle never blocks
                ready_for_fence: true,
                ready_for_submit: false,
                pending: false,
            }),
            push_cv: Condvar::new(),
            pull: Mutex::new(PullState {
                ready_for_run: false,
                run_type: RunType::Submit,
                steps: Vec::new(),
                init_steps: Vec::new(),
                deleter: Deleter::default(),
                deleter_prev: Deleter::default(),
                push_buffers: Vec::new(),
            }),
            pull_cv: Condvar::new(),
        }
    }
}

///Pixels of the most recent readback, shared so the submission role can
///convert them after its sync wait. Always tightly packed RGBA8.
#[derive(Default)]
pub struct ReadbackBuffer {
    pub width: i32,
    pub height: i32,
    pub data: Vec<u8>,
}

///Everything the two roles share. Owned behind one `Arc` by the manager, the
///executor and every registered push buffer user.
pub struct FrameRing {
    pub(crate) slots: [FrameSlot; FRAME_RING_SIZE],
    ///Cleared to pause the execution role. Queued frames still drain.
    pub(crate) run: AtomicBool,
    ///Context is gone; deleters forget instead of freeing, steps are dropped.
    pub(crate) skip_gl_calls: AtomicBool,
    ///Sticky out-of-memory flag, latched by the runner.
    pub(crate) saw_out_of_memory: AtomicBool,
    pub(crate) swap_interval: AtomicI32,
    pub(crate) swap_interval_changed: AtomicBool,
    ///Backbuffer dimensions, consulted for Y-flips of backbuffer-relative
    ///viewports and scissors.
    pub(crate) target_width: AtomicI32,
    pub(crate) target_height: AtomicI32,
    pub(crate) readback: Mutex<ReadbackBuffer>,
}

///One recorded frame, claimed by the execution role.
pub(crate) struct FrameWork {
    pub steps: Vec<Step>,
    pub init_steps: Vec<InitStep>,
    pub run_type: RunType,
    ///The previous occupancy's deleter, due now.
    pub retired_deleter: Deleter,
    pub push_buffers: Vec<Arc<PushBuffer>>,
}

impl FrameRing {
    pub(crate) fn new() -> Self {
        FrameRing {
            slots: core::array::from_fn(|_| FrameSlot::new()),
            run: AtomicBool::new(true),
            skip_gl_calls: AtomicBool::new(false),
            saw_out_of_memory: AtomicBool::new(false),
            swap_interval: AtomicI32::new(0),
            swap_interval_changed: AtomicBool::new(true),
            target_width: AtomicI32::new(0),
            target_height: AtomicI32::new(0),
            readback: Mutex::new(ReadbackBuffer::default()),
        }
    }

    // --- submission side ---

    ///Blocks until `slot` is retired, then claims it.
    pub(crate) fn begin_frame_wait(&self, slot: usize) {
        let frame = &self.slots[slot];
        let mut push = frame.push.lock().unwrap();
        while !push.ready_for_fence {
            #[cfg(feature = "logging")]
            log::trace!("PUSH: waiting for frame[{slot}] to retire");
            push = frame.push_cv.wait(push).unwrap();
        }
        push.ready_for_fence = false;
        push.ready_for_submit = true;
    }

    ///Hands a recorded frame to the execution role.
    pub(crate) fn submit(
        &self,
        slot: usize,
        steps: Vec<Step>,
        init_steps: Vec<InitStep>,
        deleter: Option<&mut Deleter>,
        run_type: RunType,
    ) {
        let frame = &self.slots[slot];
        {
            let mut pull = frame.pull.lock().unwrap();
            debug_assert!(!pull.ready_for_run, "frame slot {slot} submitted twice");
            pull.steps = steps;
            pull.init_steps = init_steps;
            if let Some(deleter) = deleter {
                pull.deleter.take(deleter);
            }
            pull.run_type = run_type;
            pull.ready_for_run = true;
        }
        {
            let mut push = frame.push.lock().unwrap();
            push.pending = true;
        }
        //notifying without the lock held is fine, and cheaper
        frame.pull_cv.notify_all();
        #[cfg(feature = "logging")]
        log::trace!("PUSH: frame[{slot}] ready ({run_type:?})");
    }

    ///Sync-flush wait: blocks until the execution role fenced the slot, then
    ///reclaims it for further recording.
    pub(crate) fn wait_sync(&self, slot: usize) {
        let frame = &self.slots[slot];
        let mut push = frame.push.lock().unwrap();
        while !push.ready_for_fence {
            push = frame.push_cv.wait(push).unwrap();
        }
        push.ready_for_fence = false;
        push.ready_for_submit = true;
    }

    ///Blocks until every submitted slot has been fenced. Unsubmitted slots
    ///are ignored.
    pub(crate) fn wait_idle(&self) {
        for (_i, frame) in self.slots.iter().enumerate() {
            let mut push = frame.push.lock().unwrap();
            while push.pending && !push.ready_for_fence {
                #[cfg(feature = "logging")]
                log::trace!("PUSH: waiting for frame[{_i}] to drain");
                push = frame.push_cv.wait(push).unwrap();
            }
        }
    }

    ///Drops every queued-but-unclaimed step in all slots. Handoff flags stay
    ///untouched, so an already-signalled slot drains as an empty frame.
    pub(crate) fn wipe_slots(&self) {
        for frame in &self.slots {
            let mut pull = frame.pull.lock().unwrap();
            pull.steps.clear();
            pull.init_steps.clear();
        }
    }

    ///Pauses the execution role. Frames already submitted still drain.
    pub(crate) fn stop(&self) {
        self.run.store(false, Ordering::Release);
        for frame in &self.slots {
            //take each lock once so a waiter can't miss the flag between its
            // check and its wait
            drop(frame.pull.lock().unwrap());
            drop(frame.push.lock().unwrap());
            frame.pull_cv.notify_all();
            frame.push_cv.notify_all();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.run.load(Ordering::Acquire)
    }

    // --- execution side ---

    ///Blocks until `slot` carries work, claims it and rotates the deleters.
    ///Returns `None` once the ring is stopped and the slot is empty. Note
    ///that a stopped ring still hands out frames that were already submitted.
    pub(crate) fn acquire(&self, slot: usize) -> Option<FrameWork> {
        let frame = &self.slots[slot];
        let mut pull = frame.pull.lock().unwrap();
        while !pull.ready_for_run {
            if !self.is_running() {
                return None;
            }
            #[cfg(feature = "logging")]
            log::trace!("PULL: waiting for frame[{slot}]");
            pull = frame.pull_cv.wait(pull).unwrap();
        }
        pull.ready_for_run = false;

        //the deleter submitted one occupancy ago is now safe to perform; the
        // one submitted with this frame starts waiting its cycle out
        let retired_deleter = core::mem::take(&mut pull.deleter_prev);
        let current = core::mem::take(&mut pull.deleter);
        pull.deleter_prev = current;

        Some(FrameWork {
            steps: core::mem::take(&mut pull.steps),
            init_steps: core::mem::take(&mut pull.init_steps),
            run_type: pull.run_type,
            retired_deleter,
            push_buffers: pull.push_buffers.clone(),
        })
    }

    ///Retires `slot` after a full frame. The slot becomes claimable again.
    pub(crate) fn fence_submit(&self, slot: usize) {
        let frame = &self.slots[slot];
        {
            let mut push = frame.push.lock().unwrap();
            debug_assert!(push.ready_for_submit, "fencing an unclaimed slot");
            push.ready_for_fence = true;
            push.ready_for_submit = false;
            push.pending = false;
        }
        frame.push_cv.notify_all();
        #[cfg(feature = "logging")]
        log::trace!("PULL: frame[{slot}] fenced");
    }

    ///Fences `slot` after a sync flush; the submission role keeps it.
    pub(crate) fn fence_sync(&self, slot: usize) {
        let frame = &self.slots[slot];
        {
            let mut push = frame.push.lock().unwrap();
            push.ready_for_fence = true;
            push.ready_for_submit = true;
            push.pending = false;
        }
        frame.push_cv.notify_all();
    }

    // --- push buffer registry ---

    pub(crate) fn register_push_buffer(&self, slot: usize, push_buffer: Arc<PushBuffer>) {
        self.slots[slot]
            .pull
            .lock()
            .unwrap()
            .push_buffers
            .push(push_buffer);
    }

    pub(crate) fn registered_push_buffers(&self, slot: usize) -> Vec<Arc<PushBuffer>> {
        self.slots[slot].pull.lock().unwrap().push_buffers.clone()
    }

    pub(crate) fn unregister_push_buffer(&self, push_buffer: &Arc<PushBuffer>) {
        let mut found = 0;
        for frame in &self.slots {
            let mut pull = frame.pull.lock().unwrap();
            let before = pull.push_buffers.len();
            pull.push_buffers
                .retain(|pb| !Arc::ptr_eq(pb, push_buffer));
            found += before - pull.push_buffers.len();
        }
        debug_assert!(found <= 1, "push buffer registered more than once");
    }

    // --- shared flags ---

    pub(crate) fn set_skip_gl_calls(&self) {
        self.skip_gl_calls.store(true, Ordering::Release);
    }

    pub(crate) fn skip_gl_calls(&self) -> bool {
        self.skip_gl_calls.load(Ordering::Acquire)
    }

    pub(crate) fn latch_out_of_memory(&self) {
        self.saw_out_of_memory.store(true, Ordering::Release);
    }

    pub(crate) fn saw_out_of_memory(&self) -> bool {
        self.saw_out_of_memory.load(Ordering::Acquire)
    }

    pub(crate) fn resize(&self, width: i32, height: i32) {
        self.target_width.store(width, Ordering::Release);
        self.target_height.store(height, Ordering::Release);
    }

    pub(crate) fn target_size(&self) -> (i32, i32) {
        (
            self.target_width.load(Ordering::Acquire),
            self.target_height.load(Ordering::Acquire),
        )
    }

    pub(crate) fn set_swap_interval(&self, interval: i32) {
        if self.swap_interval.swap(interval, Ordering::AcqRel) != interval {
            self.swap_interval_changed.store(true, Ordering::Release);
        }
    }

    ///The new interval if it changed since the last call.
    pub(crate) fn take_swap_interval_change(&self) -> Option<i32> {
        if self.swap_interval_changed.swap(false, Ordering::AcqRel) {
            Some(self.swap_interval.load(Ordering::Acquire))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_start_retired() {
        let ring = FrameRing::new();
        //claiming all three slots must not block on a fresh ring
        for i in 0..FRAME_RING_SIZE {
            ring.begin_frame_wait(i);
        }
    }

    #[test]
    fn acquire_returns_none_when_stopped_and_empty() {
        let ring = FrameRing::new();
        ring.stop();
        assert!(ring.acquire(0).is_none());
    }

    #[test]
    fn acquire_drains_submitted_work_even_when_stopped() {
        let ring = FrameRing::new();
        ring.begin_frame_wait(0);
        ring.submit(0, Vec::new(), Vec::new(), None, RunType::Submit);
        ring.stop();
        assert!(ring.acquire(0).is_some());
        ring.fence_submit(0);
        assert!(ring.acquire(0).is_none());
    }

    #[test]
    fn swap_interval_change_is_latched_once() {
        let ring = FrameRing::new();
        //a fresh ring reports its initial interval once
        assert_eq!(ring.take_swap_interval_change(), Some(0));
        assert_eq!(ring.take_swap_interval_change(), None);
        ring.set_swap_interval(1);
        assert_eq!(ring.take_swap_interval_change(), Some(1));
        ring.set_swap_interval(1);
        assert_eq!(ring.take_swap_interval_change(), None);
    }
}
