//! GPIO digital output block
//!
//! Drives one digital output pin from the boolean `input`. The written level
//! is `input XOR invert_output`; initialize and any input failure drive the
//! configured `default_value` instead. The pin handle is acquired at
//! initialize and released at delete.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

use crate::core::attribute::{ConfigAttr, Configs, InputAttr, Inputs, VALUE};
use crate::core::block::{BlockState, BlockType};
use crate::core::validate;
use crate::core::value::{ExecMethod, Status, Value};
use crate::hal::{DigitalPin, GpioProvider};

pub const TYPE_NAME: &str = "gpio_do";
pub const VERSION: &str = "0.3.0";

pub const GPIO_PIN: &str = "gpio_pin";
pub const DEFAULT_VALUE: &str = "default_value";
pub const INVERT_OUTPUT: &str = "invert_output";
pub const INPUT: &str = "input";

pub struct GpioDigitalOutput {
    gpio: Arc<dyn GpioProvider>,
    pin: Option<Box<dyn DigitalPin>>,
    default_level: bool,
    invert: bool,
}

impl GpioDigitalOutput {
    pub fn new(gpio: Arc<dyn GpioProvider>) -> Self {
        Self {
            gpio,
            pin: None,
            default_level: false,
            invert: false,
        }
    }

    fn write_level(&mut self, state: &mut BlockState, value: bool) -> bool {
        let Some(pin) = self.pin.as_mut() else {
            state.set_outputs_not_active(Status::ProcErr);
            return false;
        };
        if let Err(err) = pin.write(value ^ self.invert) {
            error!(block = %state.name, reason = %err, "gpio write failed");
            state.set_outputs_not_active(Status::ProcErr);
            return false;
        }
        true
    }
}

#[async_trait]
impl BlockType for GpioDigitalOutput {
    fn default_configs(&self) -> Configs {
        [
            ConfigAttr::new(GPIO_PIN, 0i64),
            ConfigAttr::new(DEFAULT_VALUE, false),
            ConfigAttr::new(INVERT_OUTPUT, false),
        ]
        .into_iter()
        .collect()
    }

    fn default_inputs(&self) -> Inputs {
        [InputAttr {
            name: INPUT.to_string(),
            value: Value::Empty,
            link: None,
        }]
        .into_iter()
        .collect()
    }

    async fn initialize(&mut self, state: &mut BlockState) {
        let pin_no = match validate::config_int_in(&state.config, GPIO_PIN, 0, 255) {
            Ok(v) => v as u8,
            Err(err) => {
                validate::log_config_error(&state.name, GPIO_PIN, err);
                state.set_outputs_not_active(Status::ConfigErr);
                return;
            }
        };
        self.default_level = match validate::config_bool(&state.config, DEFAULT_VALUE) {
            Ok(v) => v,
            Err(err) => {
                validate::log_config_error(&state.name, DEFAULT_VALUE, err);
                state.set_outputs_not_active(Status::ConfigErr);
                return;
            }
        };
        self.invert = match validate::config_bool(&state.config, INVERT_OUTPUT) {
            Ok(v) => v,
            Err(err) => {
                validate::log_config_error(&state.name, INVERT_OUTPUT, err);
                state.set_outputs_not_active(Status::ConfigErr);
                return;
            }
        };

        match self.gpio.open_output(pin_no) {
            Ok(pin) => self.pin = Some(pin),
            Err(err) => {
                error!(block = %state.name, pin = pin_no, reason = %err, "failed to acquire gpio pin");
                state.set_outputs_not_active(Status::ProcErr);
                return;
            }
        }

        let default_level = self.default_level;
        if self.write_level(state, default_level) {
            let _ = state.outputs.set(VALUE, default_level);
            state.set_status(Status::Initialed);
        }
    }

    async fn execute(&mut self, state: &mut BlockState, _method: ExecMethod) {
        match validate::input_bool(&state.inputs, INPUT) {
            Ok(Some(value)) => {
                if self.write_level(state, value) {
                    let _ = state.outputs.set(VALUE, value);
                    state.set_status(Status::Normal);
                }
            }
            Ok(None) => {
                // no live input: hold the default level
                let default_level = self.default_level;
                if self.write_level(state, default_level) {
                    let _ = state.outputs.set(VALUE, Value::NotActive);
                    state.set_status(Status::Normal);
                }
            }
            Err(err) => {
                validate::log_input_error(&state.name, INPUT, err);
                let default_level = self.default_level;
                if self.write_level(state, default_level) {
                    state.set_outputs_not_active(Status::InputErr);
                }
            }
        }
    }

    async fn delete(&mut self, _state: &mut BlockState) {
        // release the pin
        self.pin = None;
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attribute::Outputs;
    use crate::core::block::{self, BlockState};
    use crate::hal::SimGpio;

    fn make_state(imp: &GpioDigitalOutput, pin: i64, default_value: bool, invert: bool) -> BlockState {
        let overrides: Configs = [
            ConfigAttr::new(GPIO_PIN, pin),
            ConfigAttr::new(DEFAULT_VALUE, default_value),
            ConfigAttr::new(INVERT_OUTPUT, invert),
        ]
        .into_iter()
        .collect();
        let def = block::create(
            imp,
            TYPE_NAME,
            VERSION,
            "do1",
            "",
            &overrides,
            &Inputs::new(),
            &Outputs::new(),
        );
        BlockState::from_definition(def).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_writes_inverted_default() {
        let gpio = Arc::new(SimGpio::new());
        let mut imp = GpioDigitalOutput::new(gpio.clone());
        let mut state = make_state(&imp, 17, false, true);

        imp.initialize(&mut state).await;
        assert_eq!(state.status(), Some(Status::Initialed));
        // default false, inverted → pin driven high
        assert_eq!(gpio.writes(17), vec![true]);
    }

    #[tokio::test]
    async fn test_execute_inverts_input() {
        let gpio = Arc::new(SimGpio::new());
        let mut imp = GpioDigitalOutput::new(gpio.clone());
        let mut state = make_state(&imp, 17, false, true);
        imp.initialize(&mut state).await;

        state.inputs.set(INPUT, true).unwrap();
        imp.execute(&mut state, ExecMethod::Manual).await;
        assert_eq!(state.outputs.value(VALUE), Some(&Value::Bool(true)));
        assert_eq!(state.status(), Some(Status::Normal));

        state.inputs.set(INPUT, false).unwrap();
        imp.execute(&mut state, ExecMethod::Manual).await;

        assert_eq!(gpio.writes(17), vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_inactive_input_holds_default() {
        let gpio = Arc::new(SimGpio::new());
        let mut imp = GpioDigitalOutput::new(gpio.clone());
        let mut state = make_state(&imp, 5, true, false);
        imp.initialize(&mut state).await;

        imp.execute(&mut state, ExecMethod::Manual).await;
        assert_eq!(state.outputs.value(VALUE), Some(&Value::NotActive));
        assert_eq!(state.status(), Some(Status::Normal));
        assert_eq!(gpio.writes(5), vec![true, true]);
    }

    #[tokio::test]
    async fn test_non_bool_input_is_input_err() {
        let gpio = Arc::new(SimGpio::new());
        let mut imp = GpioDigitalOutput::new(gpio.clone());
        let mut state = make_state(&imp, 5, false, false);
        imp.initialize(&mut state).await;

        state.inputs.set(INPUT, 42i64).unwrap();
        imp.execute(&mut state, ExecMethod::Manual).await;
        assert_eq!(state.status(), Some(Status::InputErr));
        assert_eq!(state.outputs.value(VALUE), Some(&Value::NotActive));
        // the default level was re-driven
        assert_eq!(gpio.writes(5), vec![false, false]);
    }

    #[tokio::test]
    async fn test_bad_pin_config_is_config_err() {
        let gpio = Arc::new(SimGpio::new());
        let mut imp = GpioDigitalOutput::new(gpio.clone());
        let mut state = make_state(&imp, 3000, false, false);

        imp.initialize(&mut state).await;
        assert_eq!(state.status(), Some(Status::ConfigErr));
        assert!(gpio.writes(0).is_empty());
    }

    #[tokio::test]
    async fn test_delete_releases_pin() {
        let gpio = Arc::new(SimGpio::new());
        let mut imp = GpioDigitalOutput::new(gpio.clone());
        let mut state = make_state(&imp, 2, false, false);
        imp.initialize(&mut state).await;
        assert!(imp.pin.is_some());

        imp.delete(&mut state).await;
        assert!(imp.pin.is_none());
    }
}
