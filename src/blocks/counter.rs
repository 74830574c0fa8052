//! Counter block
//!
//! Counts transitions on its boolean `input` according to the configured
//! `trigger` policy, from `initial_value` up to `final_value`. Reaching the
//! final value raises `carry`; the next counted transition wraps back to the
//! initial value and lowers it. `carry` stays `not_active` until the count
//! first reaches the final value.

use async_trait::async_trait;

use crate::core::attribute::{ConfigAttr, Configs, InputAttr, Inputs, OutputAttr, Outputs, VALUE};
use crate::core::block::{BlockState, BlockType};
use crate::core::validate::{self, ValueError};
use crate::core::value::{ExecMethod, Status, Value};

pub const TYPE_NAME: &str = "counter";
pub const VERSION: &str = "0.3.0";

pub const TRIGGER: &str = "trigger";
pub const INITIAL_VALUE: &str = "initial_value";
pub const FINAL_VALUE: &str = "final_value";
pub const INPUT: &str = "input";
pub const CARRY: &str = "carry";

const COUNT: &str = "count";
const LAST_INPUT: &str = "last_input";

/// Which input transitions count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// Any edge
    AnyChange,
    /// Falling edge
    TrueFalse,
    /// Rising edge
    FalseTrue,
}

impl TriggerPolicy {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "any_change" => Some(TriggerPolicy::AnyChange),
            "true_false" => Some(TriggerPolicy::TrueFalse),
            "false_true" => Some(TriggerPolicy::FalseTrue),
            _ => None,
        }
    }
}

/// One counting step: decide whether the sample triggers, then advance the
/// count with wrap-around. Returns the new count and, when the carry output
/// must change, its new level.
pub(crate) fn step(
    policy: TriggerPolicy,
    last: Option<bool>,
    current: bool,
    count: i64,
    initial: i64,
    final_value: i64,
) -> (i64, Option<bool>) {
    let triggered = match policy {
        TriggerPolicy::FalseTrue => last == Some(false) && current,
        TriggerPolicy::TrueFalse => last == Some(true) && !current,
        TriggerPolicy::AnyChange => last.is_some() && last != Some(current),
    };
    if !triggered {
        return (count, None);
    }
    if count == final_value {
        (initial, Some(false))
    } else {
        let next = count + 1;
        let carry = (next == final_value).then_some(true);
        (next, carry)
    }
}

pub struct Counter;

impl Counter {
    pub fn new() -> Self {
        Self
    }

    fn read_configs(state: &BlockState) -> Result<(TriggerPolicy, i64, i64), (&'static str, ValueError)> {
        let tag = validate::config_tag(&state.config, TRIGGER).map_err(|e| (TRIGGER, e))?;
        let policy = TriggerPolicy::from_tag(tag).ok_or((TRIGGER, ValueError::Range))?;
        let initial =
            validate::config_int(&state.config, INITIAL_VALUE).map_err(|e| (INITIAL_VALUE, e))?;
        let final_value =
            validate::config_int(&state.config, FINAL_VALUE).map_err(|e| (FINAL_VALUE, e))?;
        Ok((policy, initial, final_value))
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockType for Counter {
    fn default_configs(&self) -> Configs {
        [
            ConfigAttr::new(TRIGGER, Value::Tag("false_true".into())),
            ConfigAttr::new(INITIAL_VALUE, 0i64),
            ConfigAttr::new(FINAL_VALUE, 9i64),
        ]
        .into_iter()
        .collect()
    }

    fn default_inputs(&self) -> Inputs {
        [InputAttr::new(INPUT, false)].into_iter().collect()
    }

    fn default_outputs(&self) -> Outputs {
        [OutputAttr::new(CARRY, Value::NotActive)].into_iter().collect()
    }

    async fn initialize(&mut self, state: &mut BlockState) {
        let (_, initial, _) = match Self::read_configs(state) {
            Ok(cfg) => cfg,
            Err((attr, err)) => {
                validate::log_config_error(&state.name, attr, err);
                state.set_outputs_not_active(Status::ConfigErr);
                return;
            }
        };
        state.private.put(COUNT, initial);
        state.private.put(LAST_INPUT, Value::Empty);
        let _ = state.outputs.set(VALUE, initial);
        let _ = state.outputs.set(CARRY, Value::NotActive);
        state.set_status(Status::Initialed);
    }

    async fn execute(&mut self, state: &mut BlockState, _method: ExecMethod) {
        let (policy, initial, final_value) = match Self::read_configs(state) {
            Ok(cfg) => cfg,
            Err((attr, err)) => {
                validate::log_config_error(&state.name, attr, err);
                state.set_outputs_not_active(Status::ConfigErr);
                return;
            }
        };

        let current = match validate::input_bool(&state.inputs, INPUT) {
            Ok(Some(v)) => v,
            Ok(None) => {
                // inactive input: no sample, the count holds
                state.private.put(LAST_INPUT, Value::Empty);
                let count = state.private.int(COUNT).unwrap_or(initial);
                let _ = state.outputs.set(VALUE, count);
                state.set_status(Status::Normal);
                return;
            }
            Err(err) => {
                validate::log_input_error(&state.name, INPUT, err);
                state.set_outputs_not_active(Status::InputErr);
                return;
            }
        };

        let last = state.private.bool(LAST_INPUT);
        let count = state.private.int(COUNT).unwrap_or(initial);
        let (count, carry) = step(policy, last, current, count, initial, final_value);

        state.private.put(COUNT, count);
        state.private.put(LAST_INPUT, current);
        let _ = state.outputs.set(VALUE, count);
        if let Some(carry) = carry {
            let _ = state.outputs.set(CARRY, carry);
        }
        state.set_status(Status::Normal);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
