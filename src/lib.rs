//! Function-block runtime
//!
//! A soft-realtime engine in which a network of named, typed blocks is wired
//! together and repeatedly evaluated. Each block runs as its own actor with
//! a serial mailbox; output-value changes flow along dataflow links while
//! `execute_out → execute_in` wiring carries control-flow triggers, and
//! blocks may self-schedule on a periodic timer.

pub mod blocks;
pub mod config;
pub mod core;
pub mod hal;
pub mod runtime;
mod tests;

// Re-export commonly used types
pub use crate::core::{
    BlockDefinition, BlockHandle, BlockRegistry, BlockState, BlockType, ExecMethod, Status,
    TypeRegistry, Value,
};
pub use runtime::{BlockRuntime, RuntimeError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
