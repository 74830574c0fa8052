//! Execution kernel
//!
//! The generic per-tick cycle shared by every block type:
//!
//! 1. enable gate
//! 2. delegate to the type-specific execute
//! 3. status check + exec tracking
//! 4. timer re-arm
//! 5. dataflow propagation (changed outputs only)
//! 6. control-flow dispatch over `execute_out`
//!
//! Within one cycle, propagation happens strictly after type execution and
//! tracking; dataflow updates are sent before control-flow triggers. The
//! cycle is atomic from the block's perspective; its mailbox is not drained
//! while a cycle runs.

use std::sync::OnceLock;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::error;

use crate::core::attribute::{
    ENABLE, EXECUTE_INTERVAL, EXEC_COUNT, EXEC_COUNT_MODULO, EXEC_METHOD, LAST_EXEC,
};
use crate::core::block::{BlockState, BlockType};
use crate::core::registry::{BlockMsg, BlockRegistry};
use crate::core::validate::{self, ValueError};
use crate::core::value::{ExecMethod, Status, Value};

use super::propagate;
use super::timer;

/// A block instance bound to its type object. Owned exclusively by the
/// block's server task.
pub struct LiveBlock {
    pub state: BlockState,
    pub imp: Box<dyn BlockType>,
}

/// Run the type-specific setup, then arm the execution timer.
pub async fn initialize_block(block: &mut LiveBlock, self_tx: &UnboundedSender<BlockMsg>) {
    let LiveBlock { state, imp } = block;
    imp.initialize(state).await;
    rearm_timer(state, self_tx);
}

/// One full execution cycle.
pub async fn execute_cycle(
    block: &mut LiveBlock,
    registry: &BlockRegistry,
    self_tx: &UnboundedSender<BlockMsg>,
    method: ExecMethod,
) {
    let prev = block.state.outputs.clone();

    match validate::input_bool(&block.state.inputs, ENABLE) {
        Ok(Some(true)) => {
            let LiveBlock { state, imp } = block;
            imp.execute(state, method).await;
            if state.status() == Some(Status::Normal) {
                update_tracking(state, method);
            }
        }
        Ok(Some(false)) => {
            block.state.set_outputs_not_active(Status::Disabled);
        }
        Ok(None) => {
            validate::log_input_error(&block.state.name, ENABLE, ValueError::BadType);
            block.state.set_outputs_not_active(Status::InputErr);
        }
        Err(err) => {
            validate::log_input_error(&block.state.name, ENABLE, err);
            block.state.set_outputs_not_active(Status::InputErr);
        }
    }

    rearm_timer(&mut block.state, self_tx);
    propagate::publish(&block.state.name, &prev, &block.state.outputs, registry);
}

/// Stamp the private exec-tracking attributes after a `normal` execute.
fn update_tracking(state: &mut BlockState, method: ExecMethod) {
    state.private.put(EXEC_METHOD, method);
    state.private.put(LAST_EXEC, Value::Int(monotonic_micros()));
    let count = state.private.int(EXEC_COUNT).unwrap_or(0);
    state.private.put(EXEC_COUNT, next_exec_count(count));
}

/// `exec_count` increments modulo one billion.
pub(crate) fn next_exec_count(count: i64) -> i64 {
    (count + 1) % EXEC_COUNT_MODULO
}

/// Re-arm the execution timer from the `execute_interval` config.
///
/// A positive interval cancels any armed timer and arms a fresh one; zero
/// cancels only. A non-integer interval is a config error, a negative one an
/// input error, and a scheduler failure a process error; each forces the
/// non-status outputs to `not_active`.
fn rearm_timer(state: &mut BlockState, self_tx: &UnboundedSender<BlockMsg>) {
    match validate::config_int(&state.config, EXECUTE_INTERVAL) {
        Ok(ms) if ms > 0 => {
            if let Some(armed) = state.private.take_timer() {
                armed.cancel();
            }
            match timer::arm(self_tx, ms as u64) {
                Ok(armed) => state.private.put_timer(armed),
                Err(err) => {
                    error!(block = %state.name, reason = %err, "failed to arm execution timer");
                    state.set_outputs_not_active(Status::ProcessErr);
                }
            }
        }
        Ok(0) => {
            if let Some(armed) = state.private.take_timer() {
                armed.cancel();
            }
        }
        Ok(_) => {
            validate::log_config_error(&state.name, EXECUTE_INTERVAL, ValueError::Range);
            state.set_outputs_not_active(Status::InputErr);
        }
        Err(err) => {
            validate::log_config_error(&state.name, EXECUTE_INTERVAL, err);
            state.set_outputs_not_active(Status::ConfigErr);
        }
    }
}

/// Microseconds on a process-local monotonic clock.
fn monotonic_micros() -> i64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_micros() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_count_rolls_over() {
        assert_eq!(next_exec_count(0), 1);
        assert_eq!(next_exec_count(41), 42);
        assert_eq!(next_exec_count(EXEC_COUNT_MODULO - 1), 0);
    }

    #[test]
    fn test_monotonic_micros_is_monotonic() {
        let a = monotonic_micros();
        let b = monotonic_micros();
        assert!(b >= a);
    }
}
