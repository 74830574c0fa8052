//! Execution timer scheduler
//!
//! Arms one-shot timers that post a `timer` execute trigger back to the
//! owning block's mailbox. The kernel re-arms after every cycle, which is
//! what makes a positive `execute_interval` periodic. At most one armed
//! timer exists per block: re-arming cancels the previous one first.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::attribute::TimerRef;
use crate::core::registry::BlockMsg;
use crate::core::value::ExecMethod;

/// Timer scheduling failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("timer target mailbox is closed")]
    Closed,
}

/// Arm a one-shot timer that fires a `timer` execute after `interval_ms`.
pub fn arm(sender: &UnboundedSender<BlockMsg>, interval_ms: u64) -> Result<TimerRef, TimerError> {
    if sender.is_closed() {
        return Err(TimerError::Closed);
    }
    let sender = sender.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        let _ = sender.send(BlockMsg::Execute {
            method: ExecMethod::Timer,
        });
    });
    Ok(TimerRef(task.abort_handle()))
}

/// Cancel an armed timer. Cancelling one that already fired is a no-op.
pub fn cancel(timer: TimerRef) {
    timer.cancel();
}
