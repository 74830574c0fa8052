//! Block runtime
//!
//! Hosts the live block graph: spawns a server task per block, wires links,
//! and exposes the create / link / execute / delete surface over the
//! process-wide registry.

pub mod kernel;
pub mod propagate;
pub mod server;
pub mod timer;
pub mod validation;

use tokio::sync::oneshot;
use tracing::warn;

use crate::config;
use crate::core::attribute::{
    ConfigAttr, Configs, Inputs, Link, Outputs, BLOCK_NAME, BLOCK_TYPE, DESCRIPTION, EXECUTE_IN,
    EXECUTE_OUT,
};
use crate::core::block::{self, BlockDefinition, BlockState, DefinitionError, UpgradeError};
use crate::core::registry::{BlockHandle, BlockMsg, BlockRegistry, RegistryError, TypeRegistry};

pub use kernel::LiveBlock;
pub use validation::{WiringValidationResult, WiringValidator};

/// Runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("unknown block type: {0}")]
    UnknownType(String),

    #[error("definition is missing the `{0}` config attribute")]
    MissingConfig(&'static str),

    #[error("cannot link {from_output} to {to_input}: incompatible endpoint kinds")]
    IncompatibleLink {
        from_output: String,
        to_input: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("block {0} did not reply")]
    NoReply(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Upgrade(#[from] UpgradeError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// The block runtime: a type registry fixed at startup plus the directory of
/// live blocks.
pub struct BlockRuntime {
    types: TypeRegistry,
    blocks: BlockRegistry,
}

impl BlockRuntime {
    pub fn new(types: TypeRegistry) -> Self {
        Self {
            types,
            blocks: BlockRegistry::new(),
        }
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.blocks
    }

    /// Handle of a live block.
    pub fn lookup(&self, name: &str) -> Option<BlockHandle> {
        self.blocks.lookup(name)
    }

    /// Bring a persisted definition to life: resolve its type, upgrade it if
    /// the code version moved on, merge it over the type's defaults, and
    /// spawn the server task.
    pub fn add_definition(&self, def: BlockDefinition) -> Result<BlockHandle, RuntimeError> {
        let type_name = def
            .block_type()
            .ok_or(RuntimeError::MissingConfig(BLOCK_TYPE))?
            .to_string();
        let (imp, version) = self
            .types
            .instantiate(&type_name)
            .ok_or_else(|| RuntimeError::UnknownType(type_name.clone()))?;
        let version = version.to_string();

        let def = match def.version() {
            Some(v) if v != version => block::upgrade(imp.as_ref(), def, &version)?,
            _ => def,
        };

        let name = def
            .block_name()
            .ok_or(RuntimeError::MissingConfig(BLOCK_NAME))?
            .to_string();
        let description = block::description(&def).to_string();
        let merged = block::create(
            imp.as_ref(),
            &type_name,
            &version,
            &name,
            &description,
            &def.config,
            &def.inputs,
            &def.outputs,
        );
        let state = BlockState::from_definition(merged)?;
        Ok(server::spawn_block(state, imp, &self.blocks)?)
    }

    /// Create a fresh block of a registered type with default attributes.
    pub fn create_block(
        &self,
        type_name: &str,
        name: &str,
        description: &str,
    ) -> Result<BlockHandle, RuntimeError> {
        let mut config = Configs::new();
        let _ = config.add(ConfigAttr::new(BLOCK_NAME, name));
        let _ = config.add(ConfigAttr::new(BLOCK_TYPE, type_name));
        let _ = config.add(ConfigAttr::new(DESCRIPTION, description));
        self.add_definition(BlockDefinition {
            config,
            inputs: Inputs::new(),
            outputs: Outputs::new(),
        })
    }

    /// Validate, reconcile, and spawn a whole persisted configuration, in
    /// record order.
    pub fn load(&self, mut defs: Vec<BlockDefinition>) -> Result<Vec<BlockHandle>, RuntimeError> {
        let report = WiringValidator::validate(&defs);
        if !report.valid {
            return Err(RuntimeError::InvalidConfig(report.error_summary()));
        }
        for w in &report.warnings {
            warn!(block = w.block.as_deref().unwrap_or("?"), "{}", w.message);
        }
        config::reconcile_connections(&mut defs);
        defs.into_iter().map(|d| self.add_definition(d)).collect()
    }

    /// Wire `from_block:output → to_block:input`. The execution channel and
    /// the value channel never mix.
    pub fn link(
        &self,
        from_block: &str,
        output: &str,
        to_block: &str,
        input: &str,
    ) -> Result<(), RuntimeError> {
        if (output == EXECUTE_OUT) != (input == EXECUTE_IN) {
            return Err(RuntimeError::IncompatibleLink {
                from_output: output.to_string(),
                to_input: input.to_string(),
            });
        }
        let src = self
            .blocks
            .lookup(from_block)
            .ok_or_else(|| RuntimeError::BlockNotFound(from_block.to_string()))?;
        let dst = self
            .blocks
            .lookup(to_block)
            .ok_or_else(|| RuntimeError::BlockNotFound(to_block.to_string()))?;

        src.send(BlockMsg::AddConnection {
            output_name: output.to_string(),
            target_block: to_block.to_string(),
        });
        dst.send(BlockMsg::SetLink {
            input_name: input.to_string(),
            link: Some(Link::new(from_block, output)),
        });
        Ok(())
    }

    /// Remove the wire `from_block:output → to_block:input`.
    pub fn unlink(
        &self,
        from_block: &str,
        output: &str,
        to_block: &str,
        input: &str,
    ) -> Result<(), RuntimeError> {
        let src = self
            .blocks
            .lookup(from_block)
            .ok_or_else(|| RuntimeError::BlockNotFound(from_block.to_string()))?;
        let dst = self
            .blocks
            .lookup(to_block)
            .ok_or_else(|| RuntimeError::BlockNotFound(to_block.to_string()))?;

        src.send(BlockMsg::RemoveConnection {
            output_name: output.to_string(),
            target_block: to_block.to_string(),
        });
        dst.send(BlockMsg::SetLink {
            input_name: input.to_string(),
            link: None,
        });
        Ok(())
    }

    /// Tear a block down: its timer is cancelled, its type delete runs, the
    /// registry entry is removed, and every other block scrubs links and
    /// connections naming it. Returns the pruned definition.
    pub async fn delete_block(&self, name: &str) -> Result<BlockDefinition, RuntimeError> {
        let handle = self
            .blocks
            .lookup(name)
            .ok_or_else(|| RuntimeError::BlockNotFound(name.to_string()))?;
        let (tx, rx) = oneshot::channel();
        handle.send(BlockMsg::Delete { reply: tx });
        let def = rx
            .await
            .map_err(|_| RuntimeError::NoReply(name.to_string()))?;
        self.blocks.broadcast_delete(name);
        Ok(def)
    }

    /// Snapshot every live block as a persistable definition, sorted by name.
    pub async fn snapshot(&self) -> Vec<BlockDefinition> {
        let mut names = self.blocks.names();
        names.sort();
        let mut defs = Vec::with_capacity(names.len());
        for name in names {
            if let Some(handle) = self.blocks.lookup(&name) {
                if let Some(def) = handle.definition().await {
                    defs.push(def);
                }
            }
        }
        defs
    }
}
