//! Block type contract and block state
//!
//! This module defines the `BlockType` trait every concrete block implements,
//! the persisted `BlockDefinition` shape, and the runtime `BlockState` that
//! binds a block instance to its attribute containers.
//!
//! Type-specific code sees a fully-populated state and mutates it in place;
//! the execution kernel controls everything else: enable gating, exec
//! tracking, timers, and propagation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::attribute::{
    common_configs, common_inputs, common_outputs, default_private, AttrMap, Configs, Inputs,
    Outputs, Privates, BLOCK_NAME, BLOCK_TYPE, DESCRIPTION, STATUS, VERSION,
};
use super::value::{ExecMethod, Status, Value};

/// Contract every block type implements.
///
/// `initialize` typically reads config, acquires drivers, populates private
/// attributes, and sets the initial output value and status. `execute` reads
/// inputs, computes outputs, and sets `value` and `status`; it must not touch
/// exec tracking or propagate. `delete` releases drivers. Failures surface on
/// the `status` output rather than through an error channel; errors are
/// local to the block.
#[async_trait]
pub trait BlockType: Send {
    /// Type-specific config attributes, merged over the common set.
    fn default_configs(&self) -> Configs {
        Configs::new()
    }

    /// Type-specific input attributes, merged over the common set.
    fn default_inputs(&self) -> Inputs {
        Inputs::new()
    }

    /// Type-specific output attributes, merged over the common set.
    fn default_outputs(&self) -> Outputs {
        Outputs::new()
    }

    /// Type-specific setup.
    async fn initialize(&mut self, state: &mut BlockState);

    /// One type-specific execution step.
    async fn execute(&mut self, state: &mut BlockState, method: ExecMethod);

    /// Type-specific teardown. The kernel has already cancelled the timer.
    async fn delete(&mut self, _state: &mut BlockState) {}

    /// Reconcile a persisted definition written by a different code version.
    /// The kernel stamps the new version and logs the transition afterwards.
    fn upgrade(
        &self,
        _def: &mut BlockDefinition,
        _from: &str,
        _to: &str,
    ) -> Result<(), UpgradeError> {
        Ok(())
    }
}

/// Upgrade failures.
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    #[error("definition has no `version` config attribute")]
    MissingVersion,

    #[error("cannot upgrade from {from} to {to}: {reason}")]
    Incompatible {
        from: String,
        to: String,
        reason: String,
    },
}

/// Persisted shape of a block: the three externally-visible containers, no
/// private state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub config: Configs,
    pub inputs: Inputs,
    pub outputs: Outputs,
}

impl BlockDefinition {
    pub fn block_name(&self) -> Option<&str> {
        self.config.value(BLOCK_NAME).and_then(Value::as_str)
    }

    pub fn block_type(&self) -> Option<&str> {
        self.config.value(BLOCK_TYPE).and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.config.value(VERSION).and_then(Value::as_str)
    }
}

/// Definition problems detected while turning persisted records into live
/// state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("definition is missing the `{0}` config attribute")]
    MissingConfig(&'static str),
}

/// Runtime state of a block instance: the four attribute containers plus the
/// block's name. The block-type object travels next to the state (they pair
/// up in the kernel's `LiveBlock`), not inside it.
#[derive(Debug)]
pub struct BlockState {
    pub name: String,
    pub config: Configs,
    pub inputs: Inputs,
    pub outputs: Outputs,
    pub private: Privates,
}

impl BlockState {
    /// Promote a definition to runtime state with default private attributes.
    pub fn from_definition(def: BlockDefinition) -> Result<Self, DefinitionError> {
        let name = def
            .block_name()
            .ok_or(DefinitionError::MissingConfig(BLOCK_NAME))?
            .to_string();
        Ok(Self {
            name,
            config: def.config,
            inputs: def.inputs,
            outputs: def.outputs,
            private: default_private(),
        })
    }

    /// The pruned, persistable shape: no private state, no timer handle.
    pub fn to_definition(&self) -> BlockDefinition {
        BlockDefinition {
            config: self.config.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }

    /// Current status, read from the `status` output.
    pub fn status(&self) -> Option<Status> {
        self.outputs
            .value(STATUS)
            .and_then(Value::as_tag)
            .and_then(Status::from_tag)
    }

    pub fn set_status(&mut self, status: Status) {
        let _ = self.outputs.set(STATUS, status);
    }

    /// Force every output except `status` to `not_active` and set the status.
    /// The uniform error surface of the kernel and the validators.
    pub fn set_outputs_not_active(&mut self, status: Status) {
        for output in self.outputs.iter_mut() {
            if output.name != STATUS {
                output.value = Value::NotActive;
            }
        }
        self.set_status(status);
    }
}

/// Build a complete definition for a new block: common attributes, the
/// type's defaults, then the caller's overrides; later layers win, novel
/// names append.
pub fn create(
    imp: &dyn BlockType,
    type_name: &str,
    version: &str,
    name: &str,
    description: &str,
    init_config: &Configs,
    init_inputs: &Inputs,
    init_outputs: &Outputs,
) -> BlockDefinition {
    let config = AttrMap::merge(
        &AttrMap::merge(
            &common_configs(name, type_name, version, description),
            &imp.default_configs(),
        ),
        init_config,
    );
    let inputs = AttrMap::merge(
        &AttrMap::merge(&common_inputs(), &imp.default_inputs()),
        init_inputs,
    );
    let outputs = AttrMap::merge(
        &AttrMap::merge(&common_outputs(), &imp.default_outputs()),
        init_outputs,
    );
    BlockDefinition {
        config,
        inputs,
        outputs,
    }
}

/// Reconcile a persisted definition against the current module version.
/// Runs the type's upgrade hook when versions differ, then stamps the new
/// version into config and logs the transition.
pub fn upgrade(
    imp: &dyn BlockType,
    mut def: BlockDefinition,
    module_version: &str,
) -> Result<BlockDefinition, UpgradeError> {
    let from = match def.version() {
        Some(v) => v.to_string(),
        None => return Err(UpgradeError::MissingVersion),
    };
    if from == module_version {
        return Ok(def);
    }
    imp.upgrade(&mut def, &from, module_version)?;
    def.config
        .set(VERSION, module_version)
        .map_err(|_| UpgradeError::MissingVersion)?;
    info!(
        block = def.block_name().unwrap_or("?"),
        from = %from,
        to = %module_version,
        "upgraded block definition"
    );
    Ok(def)
}

/// Convenience: read a block's description config, defaulting to empty.
pub fn description(def: &BlockDefinition) -> &str {
    def.config
        .value(DESCRIPTION)
        .and_then(Value::as_str)
        .unwrap_or("")
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attribute::{ConfigAttr, InputAttr, EXECUTE_INTERVAL};

    struct Passthrough;

    #[async_trait]
    impl BlockType for Passthrough {
        fn default_inputs(&self) -> Inputs {
            [InputAttr::new("input", Value::NotActive)]
                .into_iter()
                .collect()
        }

        async fn initialize(&mut self, state: &mut BlockState) {
            state.set_status(Status::Initialed);
        }

        async fn execute(&mut self, state: &mut BlockState, _method: ExecMethod) {
            state.set_status(Status::Normal);
        }
    }

    fn minimal_def(name: &str) -> BlockDefinition {
        create(
            &Passthrough,
            "passthrough",
            "0.1.0",
            name,
            "test block",
            &Configs::new(),
            &Inputs::new(),
            &Outputs::new(),
        )
    }

    #[test]
    fn test_create_merges_common_and_type_attributes() {
        let def = minimal_def("p1");
        assert_eq!(def.block_name(), Some("p1"));
        assert_eq!(def.block_type(), Some("passthrough"));
        assert_eq!(def.version(), Some("0.1.0"));
        assert!(def.config.contains(EXECUTE_INTERVAL));
        assert!(def.inputs.contains("input"));
        assert!(def.inputs.contains("enable"));
        assert!(def.outputs.contains("status"));
    }

    #[test]
    fn test_create_overrides_win() {
        let overrides: Configs = [ConfigAttr::new(EXECUTE_INTERVAL, 250i64)]
            .into_iter()
            .collect();
        let def = create(
            &Passthrough,
            "passthrough",
            "0.1.0",
            "p2",
            "",
            &overrides,
            &Inputs::new(),
            &Outputs::new(),
        );
        assert_eq!(def.config.value(EXECUTE_INTERVAL), Some(&Value::Int(250)));
    }

    #[test]
    fn test_state_round_trip_drops_private() {
        let def = minimal_def("p3");
        let state = BlockState::from_definition(def.clone()).unwrap();
        assert_eq!(state.name, "p3");
        assert_eq!(state.to_definition(), def);
        assert!(state.private.contains("exec_count"));
    }

    #[test]
    fn test_from_definition_requires_name() {
        let err = BlockState::from_definition(BlockDefinition::default()).unwrap_err();
        assert_eq!(err, DefinitionError::MissingConfig(BLOCK_NAME));
    }

    #[test]
    fn test_set_outputs_not_active_spares_status() {
        let mut state = BlockState::from_definition(minimal_def("p4")).unwrap();
        state.set_outputs_not_active(Status::Disabled);
        assert_eq!(state.status(), Some(Status::Disabled));
        assert_eq!(state.outputs.value("value"), Some(&Value::NotActive));
        assert_eq!(state.outputs.value("execute_out"), Some(&Value::NotActive));
    }

    #[test]
    fn test_upgrade_stamps_new_version() {
        let def = minimal_def("p5");
        let upgraded = upgrade(&Passthrough, def, "0.2.0").unwrap();
        assert_eq!(upgraded.version(), Some("0.2.0"));
    }

    #[test]
    fn test_upgrade_same_version_is_identity() {
        let def = minimal_def("p6");
        let upgraded = upgrade(&Passthrough, def.clone(), "0.1.0").unwrap();
        assert_eq!(upgraded, def);
    }

    #[test]
    fn test_upgrade_missing_version() {
        let mut def = minimal_def("p7");
        def.config = def
            .config
            .iter()
            .filter(|a| a.name != VERSION)
            .cloned()
            .collect();
        assert!(matches!(
            upgrade(&Passthrough, def, "0.2.0"),
            Err(UpgradeError::MissingVersion)
        ));
    }
}
