//! Attribute values and the symbolic tags shared by every block
//!
//! Attribute values are polymorphic: a value cell can hold a boolean, a
//! number, a string, a symbolic tag, a composite, or one of the sentinel
//! states (`Empty`, `NotActive`, `Null`). The variants are narrowed to a
//! concrete type by the accessors in [`crate::core::validate`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Str(String),
    /// Symbolic tag (status codes, policy names, exec methods)
    Tag(String),
    /// Composite value
    Array(Vec<Value>),
    /// Explicitly unset; the attribute exists but carries no live value
    NotActive,
    /// No value yet (a linked input before its first update)
    Empty,
    /// Null value
    Null,
}

impl Value {
    /// Check whether the value is the `Empty` sentinel
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Check whether the value is the `NotActive` sentinel
    pub fn is_not_active(&self) -> bool {
        matches!(self, Value::NotActive)
    }

    /// Try to narrow to a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to narrow to an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to narrow to a float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to narrow to a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Try to narrow to a symbolic tag
    pub fn as_tag(&self) -> Option<&str> {
        match self {
            Value::Tag(t) => Some(t),
            _ => None,
        }
    }

    /// Try to narrow to a composite
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(vs) => Some(vs),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Block status, exposed on the `status` output as a symbolic tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Created but not yet initialized
    Created,
    /// Initialized, no successful execute yet
    Initialed,
    /// Last execute succeeded
    Normal,
    /// Enable gate is false; a state, not an error
    Disabled,
    /// A required input is missing, mistyped, or out of range
    InputErr,
    /// A required config is missing, mistyped, or out of range
    ConfigErr,
    /// A peripheral or driver failed
    ProcErr,
    /// A kernel-level scheduler failure (timer arm)
    ProcessErr,
}

impl Status {
    /// The symbolic tag stored on the `status` output.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Status::Created => "created",
            Status::Initialed => "initialed",
            Status::Normal => "normal",
            Status::Disabled => "disabled",
            Status::InputErr => "input_err",
            Status::ConfigErr => "config_err",
            Status::ProcErr => "proc_err",
            Status::ProcessErr => "process_err",
        }
    }

    /// Parse a symbolic tag back into a status.
    pub fn from_tag(tag: &str) -> Option<Status> {
        match tag {
            "created" => Some(Status::Created),
            "initialed" => Some(Status::Initialed),
            "normal" => Some(Status::Normal),
            "disabled" => Some(Status::Disabled),
            "input_err" => Some(Status::InputErr),
            "config_err" => Some(Status::ConfigErr),
            "proc_err" => Some(Status::ProcErr),
            "process_err" => Some(Status::ProcessErr),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

impl From<Status> for Value {
    fn from(s: Status) -> Self {
        Value::Tag(s.as_tag().to_string())
    }
}

/// Why a block's execute cycle ran, recorded in the private `exec_method`
/// attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMethod {
    /// Fired by the block's own periodic timer
    Timer,
    /// Triggered by an upstream `execute_out` → `execute_in` link
    ExecIn,
    /// Triggered by a value update on a linked input
    InputChange,
    /// Commanded externally
    Manual,
}

impl ExecMethod {
    pub fn as_tag(&self) -> &'static str {
        match self {
            ExecMethod::Timer => "timer",
            ExecMethod::ExecIn => "exec_in",
            ExecMethod::InputChange => "input_change",
            ExecMethod::Manual => "manual",
        }
    }

    pub fn from_tag(tag: &str) -> Option<ExecMethod> {
        match tag {
            "timer" => Some(ExecMethod::Timer),
            "exec_in" => Some(ExecMethod::ExecIn),
            "input_change" => Some(ExecMethod::InputChange),
            "manual" => Some(ExecMethod::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for ExecMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

impl From<ExecMethod> for Value {
    fn from(m: ExecMethod) -> Self {
        Value::Tag(m.as_tag().to_string())
    }
}
