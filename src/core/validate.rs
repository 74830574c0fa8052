//! Type-checked attribute accessors
//!
//! Every config or input read a block performs goes through this layer, which
//! performs lookup, shape check, and domain check with a uniform failure
//! surface. Callers log one structured event per failure and surface
//! `(value = not_active, status = config_err | input_err)`.
//!
//! Input accessors return `Ok(None)` for `not_active`; explicitly inactive
//! is a valid read wherever the caller tolerates it. An input that is still
//! `Empty` while linked means the upstream block has not published yet and
//! reads as [`ValueError::BadLink`].

use tracing::error;

use super::attribute::{Configs, Inputs};
use super::value::Value;

/// Uniform failure kinds for attribute reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("attribute not found")]
    NotFound,

    #[error("value has the wrong type")]
    BadType,

    #[error("value out of range")]
    Range,

    #[error("linked input has not been published yet")]
    BadLink,
}

// ── Config accessors ────────────────────────────────────────────────────────

fn config_value<'a>(config: &'a Configs, name: &str) -> Result<&'a Value, ValueError> {
    config
        .value(name)
        .ok_or(ValueError::NotFound)
}

/// Read any config value, checking only presence.
pub fn config_any<'a>(config: &'a Configs, name: &str) -> Result<&'a Value, ValueError> {
    config_value(config, name)
}

pub fn config_bool(config: &Configs, name: &str) -> Result<bool, ValueError> {
    config_value(config, name)?
        .as_bool()
        .ok_or(ValueError::BadType)
}

pub fn config_int(config: &Configs, name: &str) -> Result<i64, ValueError> {
    config_value(config, name)?
        .as_int()
        .ok_or(ValueError::BadType)
}

/// Integer config constrained to an inclusive range.
pub fn config_int_in(config: &Configs, name: &str, min: i64, max: i64) -> Result<i64, ValueError> {
    let v = config_int(config, name)?;
    if v < min || v > max {
        return Err(ValueError::Range);
    }
    Ok(v)
}

pub fn config_float(config: &Configs, name: &str) -> Result<f64, ValueError> {
    config_value(config, name)?
        .as_float()
        .ok_or(ValueError::BadType)
}

pub fn config_str<'a>(config: &'a Configs, name: &str) -> Result<&'a str, ValueError> {
    config_value(config, name)?
        .as_str()
        .ok_or(ValueError::BadType)
}

/// Symbolic-tag config (policy selectors and the like).
pub fn config_tag<'a>(config: &'a Configs, name: &str) -> Result<&'a str, ValueError> {
    config_value(config, name)?
        .as_tag()
        .ok_or(ValueError::BadType)
}

// ── Input accessors ─────────────────────────────────────────────────────────

/// Read an input value. `Ok(None)` means explicitly inactive; `Empty` on an
/// unlinked input also reads as inactive, while `Empty` on a linked input is
/// an unresolved link.
pub fn input_value<'a>(inputs: &'a Inputs, name: &str) -> Result<Option<&'a Value>, ValueError> {
    let attr = inputs.get(name).ok_or(ValueError::NotFound)?;
    match &attr.value {
        Value::NotActive => Ok(None),
        Value::Empty => {
            if attr.link.is_some() {
                Err(ValueError::BadLink)
            } else {
                Ok(None)
            }
        }
        v => Ok(Some(v)),
    }
}

pub fn input_bool(inputs: &Inputs, name: &str) -> Result<Option<bool>, ValueError> {
    match input_value(inputs, name)? {
        None => Ok(None),
        Some(v) => v.as_bool().map(Some).ok_or(ValueError::BadType),
    }
}

pub fn input_int(inputs: &Inputs, name: &str) -> Result<Option<i64>, ValueError> {
    match input_value(inputs, name)? {
        None => Ok(None),
        Some(v) => v.as_int().map(Some).ok_or(ValueError::BadType),
    }
}

pub fn input_float(inputs: &Inputs, name: &str) -> Result<Option<f64>, ValueError> {
    match input_value(inputs, name)? {
        None => Ok(None),
        Some(v) => v.as_float().map(Some).ok_or(ValueError::BadType),
    }
}

// ── Error-logging contract ──────────────────────────────────────────────────

/// Log a config read failure with the block name, attribute, and reason tag.
pub fn log_config_error(block: &str, attr: &str, err: ValueError) {
    error!(block, attr, reason = %err, "invalid config attribute");
}

/// Log an input read failure with the block name, attribute, and reason tag.
pub fn log_input_error(block: &str, attr: &str, err: ValueError) {
    error!(block, attr, reason = %err, "invalid input attribute");
}

// ── Tests ───────────────────────────────────────────────────────────────────
