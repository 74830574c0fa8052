//! Attribute model
//!
//! Blocks carry four kinds of attributes, distinguished by shape:
//! - config: `(name, value)`, static after initialize
//! - input: `(name, value, link)`, the link names the source output feeding it
//! - output: `(name, value, connections)`, connections name the blocks fed by it
//! - private: `(name, value)`, runtime state, never observable externally
//!
//! Each container is an insertion-ordered sequence with unique names. Ordering
//! is load-bearing: dataflow comparison pairs old and new output sequences
//! positionally, so containers must not be rebuilt as unordered maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::task::AbortHandle;

use super::value::{Status, Value};

// ── Common attribute names ──────────────────────────────────────────────────

pub const BLOCK_NAME: &str = "block_name";
pub const BLOCK_TYPE: &str = "block_type";
pub const DESCRIPTION: &str = "description";
pub const VERSION: &str = "version";
pub const EXECUTE_INTERVAL: &str = "execute_interval";

pub const ENABLE: &str = "enable";
pub const EXECUTE_IN: &str = "execute_in";

pub const EXECUTE_OUT: &str = "execute_out";
pub const STATUS: &str = "status";
pub const VALUE: &str = "value";

pub const EXEC_COUNT: &str = "exec_count";
pub const LAST_EXEC: &str = "last_exec";
pub const TIMER_REF: &str = "timer_ref";
pub const EXEC_METHOD: &str = "exec_method";

/// `exec_count` rolls over to 0 after reaching this bound.
pub const EXEC_COUNT_MODULO: i64 = 1_000_000_000;

// ── Attribute shapes ────────────────────────────────────────────────────────

/// Reference from an input to the source output that feeds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Name of the source block
    pub block: String,
    /// Name of the source block's output attribute
    pub output: String,
}

impl Link {
    pub fn new(block: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            block: block.into(),
            output: output.into(),
        }
    }
}

/// Config attribute: `(name, value)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigAttr {
    pub name: String,
    pub value: Value,
}

impl ConfigAttr {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Input attribute: `(name, value, link)`.
///
/// When `link` is set, the value is written by the dataflow propagator;
/// when unlinked, the value is locally supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAttr {
    pub name: String,
    pub value: Value,
    pub link: Option<Link>,
}

impl InputAttr {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            link: None,
        }
    }

    pub fn linked(name: impl Into<String>, link: Link) -> Self {
        Self {
            name: name.into(),
            value: Value::Empty,
            link: Some(link),
        }
    }
}

/// Output attribute: `(name, value, connections)`.
///
/// `connections` is the forward set of block names whose inputs are linked
/// from this output; it is authoritative for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputAttr {
    pub name: String,
    pub value: Value,
    pub connections: BTreeSet<String>,
}

impl OutputAttr {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            connections: BTreeSet::new(),
        }
    }
}

/// Opaque handle to an armed execution timer.
///
/// Lives in the `timer_ref` private attribute while armed. Stripped on
/// serialization along with the rest of the private container.
#[derive(Debug, Clone)]
pub struct TimerRef(pub(crate) AbortHandle);

impl TimerRef {
    /// Cancel the armed timer. Cancelling an already-fired timer is a no-op.
    pub fn cancel(&self) {
        self.0.abort();
    }
}

/// Value of a private attribute: a plain value or an armed timer handle.
#[derive(Debug, Clone)]
pub enum PrivValue {
    Val(Value),
    Timer(TimerRef),
}

/// Private attribute: `(name, value)`. Mutable runtime state owned by the
/// block: exec tracking, last samples, timer handle.
#[derive(Debug, Clone)]
pub struct PrivateAttr {
    pub name: String,
    pub value: PrivValue,
}

impl PrivateAttr {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: PrivValue::Val(value.into()),
        }
    }
}

// ── Ordered containers ──────────────────────────────────────────────────────

/// Names an attribute within a container.
pub trait Attr {
    fn name(&self) -> &str;
}

impl Attr for ConfigAttr {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Attr for InputAttr {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Attr for OutputAttr {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Attr for PrivateAttr {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Reads and writes the value cell of an attribute kind that stores a plain
/// [`Value`].
pub trait ValueAttr: Attr {
    fn value(&self) -> &Value;
    fn set_value(&mut self, value: Value);
}

impl ValueAttr for ConfigAttr {
    fn value(&self) -> &Value {
        &self.value
    }
    fn set_value(&mut self, value: Value) {
        self.value = value;
    }
}

impl ValueAttr for InputAttr {
    fn value(&self) -> &Value {
        &self.value
    }
    fn set_value(&mut self, value: Value) {
        self.value = value;
    }
}

impl ValueAttr for OutputAttr {
    fn value(&self) -> &Value {
        &self.value
    }
    fn set_value(&mut self, value: Value) {
        self.value = value;
    }
}

/// Attribute container errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttrError {
    #[error("attribute `{0}` not found")]
    NotFound(String),

    #[error("attribute `{0}` already present")]
    Duplicate(String),
}

/// An insertion-ordered attribute container with unique names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttrMap<A> {
    items: Vec<A>,
}

pub type Configs = AttrMap<ConfigAttr>;
pub type Inputs = AttrMap<InputAttr>;
pub type Outputs = AttrMap<OutputAttr>;
pub type Privates = AttrMap<PrivateAttr>;

impl<A> Default for AttrMap<A> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<A: Attr> AttrMap<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|a| a.name() == name)
    }

    /// Look up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&A> {
        self.items.iter().find(|a| a.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut A> {
        self.items.iter_mut().find(|a| a.name() == name)
    }

    /// Append an attribute. Fails if the name is already present.
    pub fn add(&mut self, attr: A) -> Result<(), AttrError> {
        if self.contains(attr.name()) {
            return Err(AttrError::Duplicate(attr.name().to_string()));
        }
        self.items.push(attr);
        Ok(())
    }

    /// Iterate attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &A> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut A> {
        self.items.iter_mut()
    }

    /// Attribute names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|a| a.name()).collect()
    }

    /// Merge two containers, keyed by name. Overrides win; names not present
    /// in the defaults are appended in their given order after the defaults.
    pub fn merge(defaults: &Self, overrides: &Self) -> Self
    where
        A: Clone,
    {
        let mut merged = Self::new();
        for attr in defaults.iter() {
            let chosen = overrides.get(attr.name()).unwrap_or(attr);
            merged.items.push(chosen.clone());
        }
        for attr in overrides.iter() {
            if !merged.contains(attr.name()) {
                merged.items.push(attr.clone());
            }
        }
        merged
    }
}

impl<A: ValueAttr> AttrMap<A> {
    /// Read the value of an attribute by name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).map(|a| a.value())
    }

    /// Set the value of an existing attribute.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), AttrError> {
        match self.get_mut(name) {
            Some(attr) => {
                attr.set_value(value.into());
                Ok(())
            }
            None => Err(AttrError::NotFound(name.to_string())),
        }
    }
}

impl<A: Attr> FromIterator<A> for AttrMap<A> {
    /// Build a container from attributes; later duplicates are dropped.
    fn from_iter<T: IntoIterator<Item = A>>(iter: T) -> Self {
        let mut map = Self::new();
        for attr in iter {
            let _ = map.add(attr);
        }
        map
    }
}

impl Privates {
    /// Read a plain private value. Timer handles read as `None`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.get(name).map(|a| &a.value) {
            Some(PrivValue::Val(v)) => Some(v),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_int)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(Value::as_bool)
    }

    /// Set a private value, appending the attribute on first use.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) {
        match self.get_mut(name) {
            Some(attr) => attr.value = PrivValue::Val(value.into()),
            None => {
                let _ = self.add(PrivateAttr::new(name, value));
            }
        }
    }

    /// Take the armed timer out of `timer_ref`, leaving the slot empty.
    pub fn take_timer(&mut self) -> Option<TimerRef> {
        let attr = self.get_mut(TIMER_REF)?;
        match std::mem::replace(&mut attr.value, PrivValue::Val(Value::Empty)) {
            PrivValue::Timer(timer) => Some(timer),
            other => {
                attr.value = other;
                None
            }
        }
    }

    /// Store an armed timer in `timer_ref`.
    pub fn put_timer(&mut self, timer: TimerRef) {
        match self.get_mut(TIMER_REF) {
            Some(attr) => attr.value = PrivValue::Timer(timer),
            None => {
                let _ = self.add(PrivateAttr {
                    name: TIMER_REF.to_string(),
                    value: PrivValue::Timer(timer),
                });
            }
        }
    }
}

// ── Common attribute sets ───────────────────────────────────────────────────

/// Config attributes merged into every block.
pub fn common_configs(
    block_name: &str,
    block_type: &str,
    version: &str,
    description: &str,
) -> Configs {
    [
        ConfigAttr::new(BLOCK_NAME, block_name),
        ConfigAttr::new(BLOCK_TYPE, block_type),
        ConfigAttr::new(DESCRIPTION, description),
        ConfigAttr::new(VERSION, version),
        ConfigAttr::new(EXECUTE_INTERVAL, 0i64),
    ]
    .into_iter()
    .collect()
}

/// Input attributes merged into every block.
pub fn common_inputs() -> Inputs {
    [
        InputAttr::new(ENABLE, true),
        InputAttr {
            name: EXECUTE_IN.to_string(),
            value: Value::Empty,
            link: None,
        },
    ]
    .into_iter()
    .collect()
}

/// Output attributes merged into every block.
pub fn common_outputs() -> Outputs {
    [
        OutputAttr::new(EXECUTE_OUT, false),
        OutputAttr::new(STATUS, Status::Created),
        OutputAttr {
            name: VALUE.to_string(),
            value: Value::NotActive,
            connections: BTreeSet::new(),
        },
    ]
    .into_iter()
    .collect()
}

/// The private attributes every block starts with.
pub fn default_private() -> Privates {
    [
        PrivateAttr::new(EXEC_COUNT, 0i64),
        PrivateAttr {
            name: LAST_EXEC.to_string(),
            value: PrivValue::Val(Value::Empty),
        },
        PrivateAttr {
            name: TIMER_REF.to_string(),
            value: PrivValue::Val(Value::Empty),
        },
        PrivateAttr {
            name: EXEC_METHOD.to_string(),
            value: PrivValue::Val(Value::Empty),
        },
    ]
    .into_iter()
    .collect()
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(pairs: &[(&str, i64)]) -> Configs {
        pairs
            .iter()
            .map(|(n, v)| ConfigAttr::new(*n, *v))
            .collect()
    }

    #[test]
    fn test_add_rejects_duplicate() {
        let mut map = Configs::new();
        map.add(ConfigAttr::new("a", 1i64)).unwrap();
        let err = map.add(ConfigAttr::new("a", 2i64)).unwrap_err();
        assert_eq!(err, AttrError::Duplicate("a".into()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_set_missing_is_error() {
        let mut map = Configs::new();
        let err = map.set("missing", 1i64).unwrap_err();
        assert_eq!(err, AttrError::NotFound("missing".into()));
    }

    #[test]
    fn test_merge_overrides_win() {
        let defaults = cfg(&[("a", 1), ("b", 2), ("c", 3)]);
        let overrides = cfg(&[("b", 20)]);
        let merged = Configs::merge(&defaults, &overrides);
        assert_eq!(merged.value("a"), Some(&Value::Int(1)));
        assert_eq!(merged.value("b"), Some(&Value::Int(20)));
        assert_eq!(merged.value("c"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_merge_preserves_default_order_and_appends_novel() {
        let defaults = cfg(&[("a", 1), ("b", 2)]);
        let overrides = cfg(&[("z", 9), ("b", 20), ("y", 8)]);
        let merged = Configs::merge(&defaults, &overrides);
        assert_eq!(merged.names(), vec!["a", "b", "z", "y"]);
    }

    #[test]
    fn test_common_containers_have_required_names() {
        let configs = common_configs("blk", "counter", "0.1.0", "");
        for name in [BLOCK_NAME, BLOCK_TYPE, VERSION, EXECUTE_INTERVAL] {
            assert!(configs.contains(name), "missing config {name}");
        }
        let inputs = common_inputs();
        assert!(inputs.contains(ENABLE));
        assert!(inputs.contains(EXECUTE_IN));
        let outputs = common_outputs();
        for name in [EXECUTE_OUT, STATUS, VALUE] {
            assert!(outputs.contains(name), "missing output {name}");
        }
        let private = default_private();
        for name in [EXEC_COUNT, LAST_EXEC, TIMER_REF, EXEC_METHOD] {
            assert!(private.contains(name), "missing private {name}");
        }
    }

    #[test]
    fn test_enable_defaults_true() {
        let inputs = common_inputs();
        assert_eq!(inputs.value(ENABLE), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_private_put_and_read() {
        let mut private = default_private();
        private.put(EXEC_COUNT, 41i64);
        assert_eq!(private.int(EXEC_COUNT), Some(41));
        // first use appends
        private.put("last_input", true);
        assert_eq!(private.bool("last_input"), Some(true));
        assert_eq!(private.names().last(), Some(&"last_input"));
    }

    #[test]
    fn test_timer_slot_round_trip() {
        let mut private = default_private();
        assert!(private.take_timer().is_none());
        // a plain value in the slot is not a timer
        assert!(private.value(TIMER_REF).is_some());
    }

    #[test]
    fn test_linked_input_starts_empty() {
        let input = InputAttr::linked("input", Link::new("src", VALUE));
        assert_eq!(input.value, Value::Empty);
        assert!(input.link.is_some());
    }
}
