//! Block registry and block-type registry
//!
//! The block registry is the process-wide directory of live blocks: it maps
//! each unique `block_name` to the handle of the task that owns the block,
//! using `Arc<RwLock<HashMap>>` with parking_lot's RwLock for the read-heavy
//! lookup pattern (many lookups per propagation, rare register/unregister).
//!
//! The type registry is populated once at startup and maps a `type_name` tag
//! to the module version and a factory for the type object.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::attribute::Link;
use super::block::{BlockDefinition, BlockType};
use super::value::{ExecMethod, Value};

/// Registry error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("duplicate block name: {0}")]
    DuplicateBlock(String),

    #[error("duplicate block type: {0}")]
    DuplicateType(String),

    #[error("unknown block type: {0}")]
    UnknownType(String),
}

/// Messages a live block receives on its mailbox, processed one at a time in
/// arrival order.
#[derive(Debug)]
pub enum BlockMsg {
    /// Dataflow write: a linked upstream output changed.
    Update {
        from_block: String,
        output_name: String,
        value: Value,
    },
    /// Execute trigger (control flow, timer, or manual).
    Execute { method: ExecMethod },
    /// Write a locally-supplied (unlinked) input, then execute.
    SetInput { name: String, value: Value },
    /// Write a config attribute.
    SetConfig { name: String, value: Value },
    /// Read any attribute value (outputs, then inputs, configs, private).
    GetValue {
        name: String,
        reply: oneshot::Sender<Option<Value>>,
    },
    /// Snapshot the persistable definition.
    GetDefinition {
        reply: oneshot::Sender<BlockDefinition>,
    },
    /// Record a connection on one of this block's outputs.
    AddConnection {
        output_name: String,
        target_block: String,
    },
    /// Drop a connection from one of this block's outputs.
    RemoveConnection {
        output_name: String,
        target_block: String,
    },
    /// Set or clear the link on one of this block's inputs.
    SetLink {
        input_name: String,
        link: Option<Link>,
    },
    /// Another block was deleted; scrub links and connections naming it.
    PeerDeleted { block_name: String },
    /// Tear the block down and reply with its pruned definition.
    Delete {
        reply: oneshot::Sender<BlockDefinition>,
    },
}

/// Handle to a live block: its mailbox sender plus the coalescing flag for
/// control-flow triggers.
#[derive(Debug, Clone)]
pub struct BlockHandle {
    sender: mpsc::UnboundedSender<BlockMsg>,
    exec_pending: Arc<AtomicBool>,
}

impl BlockHandle {
    pub(crate) fn new(
        sender: mpsc::UnboundedSender<BlockMsg>,
        exec_pending: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sender,
            exec_pending,
        }
    }

    /// Send a message. Messages to a deleted block are discarded with a log
    /// line; returns whether the message was accepted.
    pub fn send(&self, msg: BlockMsg) -> bool {
        if self.sender.send(msg).is_err() {
            warn!("message dropped: target block is gone");
            return false;
        }
        true
    }

    /// Control-flow trigger with coalescing: while a trigger is already
    /// pending, additional triggers collapse into it.
    pub fn trigger_execute(&self) {
        if self.exec_pending.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.send(BlockMsg::Execute {
            method: ExecMethod::ExecIn,
        }) {
            self.exec_pending.store(false, Ordering::SeqCst);
        }
    }

    /// Request one execute cycle.
    pub fn execute(&self, method: ExecMethod) {
        self.send(BlockMsg::Execute { method });
    }

    /// Write an unlinked input, which also runs a `manual` execute cycle.
    pub fn set_input(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.send(BlockMsg::SetInput {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Write a config attribute.
    pub fn set_config(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.send(BlockMsg::SetConfig {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Read one attribute value from the live block.
    pub async fn get_value(&self, name: impl Into<String>) -> Option<Value> {
        let (tx, rx) = oneshot::channel();
        if !self.send(BlockMsg::GetValue {
            name: name.into(),
            reply: tx,
        }) {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Snapshot the block's persistable definition.
    pub async fn definition(&self) -> Option<BlockDefinition> {
        let (tx, rx) = oneshot::channel();
        if !self.send(BlockMsg::GetDefinition { reply: tx }) {
            return None;
        }
        rx.await.ok()
    }
}

/// Process-wide directory of live blocks.
#[derive(Clone, Default)]
pub struct BlockRegistry {
    blocks: Arc<RwLock<HashMap<String, BlockHandle>>>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live block under its unique name.
    pub fn register(&self, name: &str, handle: BlockHandle) -> Result<(), RegistryError> {
        let mut blocks = self.blocks.write();
        if blocks.contains_key(name) {
            return Err(RegistryError::DuplicateBlock(name.to_string()));
        }
        blocks.insert(name.to_string(), handle);
        Ok(())
    }

    /// Remove a block from the directory.
    pub fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        self.blocks
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::BlockNotFound(name.to_string()))
    }

    /// Look up a live block's handle.
    pub fn lookup(&self, name: &str) -> Option<BlockHandle> {
        self.blocks.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blocks.read().contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.blocks.read().len()
    }

    /// Names of all live blocks.
    pub fn names(&self) -> Vec<String> {
        self.blocks.read().keys().cloned().collect()
    }

    /// Tell every other live block that `deleted` is gone, so they can scrub
    /// links and connections naming it.
    pub fn broadcast_delete(&self, deleted: &str) {
        let handles: Vec<BlockHandle> = self
            .blocks
            .read()
            .iter()
            .filter(|(name, _)| name.as_str() != deleted)
            .map(|(_, h)| h.clone())
            .collect();
        for handle in handles {
            handle.send(BlockMsg::PeerDeleted {
                block_name: deleted.to_string(),
            });
        }
    }
}

/// Factory producing a fresh block-type object.
pub type TypeFactory = Box<dyn Fn() -> Box<dyn BlockType> + Send + Sync>;

struct TypeSpec {
    version: String,
    factory: TypeFactory,
}

/// Startup-time registry of known block types.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeSpec>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block type under its `type_name` tag.
    pub fn register(
        &mut self,
        type_name: &str,
        version: &str,
        factory: TypeFactory,
    ) -> Result<(), RegistryError> {
        if self.types.contains_key(type_name) {
            return Err(RegistryError::DuplicateType(type_name.to_string()));
        }
        self.types.insert(
            type_name.to_string(),
            TypeSpec {
                version: version.to_string(),
                factory,
            },
        );
        Ok(())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Version tag of a registered type.
    pub fn version_of(&self, type_name: &str) -> Option<&str> {
        self.types.get(type_name).map(|s| s.version.as_str())
    }

    /// Instantiate a fresh type object, with its module version.
    pub fn instantiate(&self, type_name: &str) -> Option<(Box<dyn BlockType>, &str)> {
        self.types
            .get(type_name)
            .map(|spec| ((spec.factory)(), spec.version.as_str()))
    }

    /// Registered type names.
    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
