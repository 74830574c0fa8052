//! Toggle block
//!
//! Inverts its boolean `value` output on every execute. Wired to a periodic
//! `execute_interval` it is the canonical blinker; it is also the simplest
//! block to hang off a control-flow chain.

use async_trait::async_trait;

use crate::core::attribute::VALUE;
use crate::core::block::{BlockState, BlockType};
use crate::core::value::{ExecMethod, Status, Value};

pub const TYPE_NAME: &str = "toggle";
pub const VERSION: &str = "0.3.0";

pub struct Toggle;

impl Toggle {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Toggle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockType for Toggle {
    async fn initialize(&mut self, state: &mut BlockState) {
        let _ = state.outputs.set(VALUE, false);
        state.set_status(Status::Initialed);
    }

    async fn execute(&mut self, state: &mut BlockState, _method: ExecMethod) {
        // a value forced to not_active (disable, error) restarts from false
        let current = state
            .outputs
            .value(VALUE)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let _ = state.outputs.set(VALUE, !current);
        state.set_status(Status::Normal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attribute::{Configs, Inputs, Outputs};
    use crate::core::block::{self, BlockState};

    async fn fresh_state() -> BlockState {
        let mut imp = Toggle::new();
        let def = block::create(
            &imp,
            TYPE_NAME,
            VERSION,
            "t1",
            "",
            &Configs::new(),
            &Inputs::new(),
            &Outputs::new(),
        );
        let mut state = BlockState::from_definition(def).unwrap();
        imp.initialize(&mut state).await;
        state
    }

    #[tokio::test]
    async fn test_initialize_starts_false() {
        let state = fresh_state().await;
        assert_eq!(state.outputs.value(VALUE), Some(&Value::Bool(false)));
        assert_eq!(state.status(), Some(Status::Initialed));
    }

    #[tokio::test]
    async fn test_execute_flips_value() {
        let mut imp = Toggle::new();
        let mut state = fresh_state().await;

        imp.execute(&mut state, ExecMethod::Manual).await;
        assert_eq!(state.outputs.value(VALUE), Some(&Value::Bool(true)));
        assert_eq!(state.status(), Some(Status::Normal));

        imp.execute(&mut state, ExecMethod::Manual).await;
        assert_eq!(state.outputs.value(VALUE), Some(&Value::Bool(false)));
    }
}
