//! Core block abstractions
//!
//! This module defines the attribute data model, the type-checked value
//! accessors, the block type contract, and the process-wide registries that
//! the execution kernel is built on.

pub mod attribute;
pub mod block;
pub mod registry;
pub mod validate;
pub mod value;

pub use attribute::{
    AttrError, AttrMap, ConfigAttr, Configs, InputAttr, Inputs, Link, OutputAttr, Outputs,
    PrivateAttr, Privates, TimerRef,
};
pub use block::{BlockDefinition, BlockState, BlockType, DefinitionError, UpgradeError};
pub use registry::{BlockHandle, BlockMsg, BlockRegistry, RegistryError, TypeRegistry};
pub use validate::ValueError;
pub use value::{ExecMethod, Status, Value};
