//! Cross-queue ordering for copies between accelerators

use crate::error::Result;
use crate::runtime::{Event, Queue};

/// Run `submit` on `src_queue`, fenced against `dst_queue` on both sides
///
/// Before the transfer the source queue waits for everything already
/// queued on the destination queue (which may still be reading or writing
/// the destination). After it, the destination queue waits for the
/// transfer, so later work on the destination sees the copied data. The
/// fences are placed for blocking and non-blocking copies alike; when both
/// queues are the same queue FIFO order already provides this and no event
/// is recorded.
pub fn with_cross_queue_barrier<T>(
    dst_queue: &Queue,
    src_queue: &Queue,
    submit: impl FnOnce(&Queue) -> Result<T>,
) -> Result<T> {
    if dst_queue.is_same(src_queue) {
        return submit(src_queue);
    }

    let dst_ready = Event::new();
    dst_ready.record(dst_queue)?;
    dst_ready.block(src_queue)?;

    let out = submit(src_queue)?;

    let copy_done = Event::new();
    copy_done.record(src_queue)?;
    copy_done.block(dst_queue)?;

    log::trace!(
        "fenced copy on {} against {}",
        src_queue.device(),
        dst_queue.device()
    );
    Ok(out)
}
