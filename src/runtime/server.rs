//! Per-block server task
//!
//! Each block instance is an independently-scheduled actor: one tokio task
//! owning the block's state, draining a serial mailbox of updates, execute
//! triggers, and timer firings in arrival order. The kernel's cycle runs to
//! completion before the next message is taken, which makes the cycle atomic
//! from the block's perspective.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::block::{BlockState, BlockType};
use crate::core::registry::{BlockHandle, BlockMsg, BlockRegistry, RegistryError};
use crate::core::value::{ExecMethod, Value};

use super::kernel::{self, LiveBlock};

/// Register a block and spawn its server task. The task runs the type's
/// initialize (arming the timer) before draining the mailbox, so every
/// message observes a fully-initialized block.
pub fn spawn_block(
    state: BlockState,
    imp: Box<dyn BlockType>,
    registry: &BlockRegistry,
) -> Result<BlockHandle, RegistryError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let exec_pending = Arc::new(AtomicBool::new(false));
    let handle = BlockHandle::new(tx.clone(), exec_pending.clone());
    registry.register(&state.name, handle.clone())?;

    let server = BlockServer {
        block: LiveBlock { state, imp },
        registry: registry.clone(),
        rx,
        tx,
        exec_pending,
    };
    tokio::spawn(server.run());
    Ok(handle)
}

struct BlockServer {
    block: LiveBlock,
    registry: BlockRegistry,
    rx: mpsc::UnboundedReceiver<BlockMsg>,
    tx: mpsc::UnboundedSender<BlockMsg>,
    exec_pending: Arc<AtomicBool>,
}

impl BlockServer {
    async fn run(mut self) {
        kernel::initialize_block(&mut self.block, &self.tx).await;
        debug!(block = %self.block.state.name, "block initialized");

        while let Some(msg) = self.rx.recv().await {
            if self.handle(msg).await.is_break() {
                break;
            }
        }
    }

    async fn handle(&mut self, msg: BlockMsg) -> ControlFlow<()> {
        match msg {
            BlockMsg::Update {
                from_block,
                output_name,
                value,
            } => {
                let mut matched = false;
                for input in self.block.state.inputs.iter_mut() {
                    let links_here = input
                        .link
                        .as_ref()
                        .is_some_and(|l| l.block == from_block && l.output == output_name);
                    if links_here {
                        input.value = value.clone();
                        matched = true;
                    }
                }
                if matched {
                    self.cycle(ExecMethod::InputChange).await;
                } else {
                    warn!(
                        block = %self.block.state.name,
                        from = %from_block,
                        output = %output_name,
                        "dropping update with no matching linked input"
                    );
                }
            }

            BlockMsg::Execute { method } => {
                if method == ExecMethod::ExecIn {
                    self.exec_pending.store(false, Ordering::SeqCst);
                }
                self.cycle(method).await;
            }

            BlockMsg::SetInput { name, value } => {
                let accepted = match self.block.state.inputs.get_mut(&name) {
                    Some(input) if input.link.is_none() => {
                        input.value = value;
                        true
                    }
                    Some(_) => {
                        warn!(block = %self.block.state.name, attr = %name, "refusing to write a linked input");
                        false
                    }
                    None => {
                        warn!(block = %self.block.state.name, attr = %name, "no such input attribute");
                        false
                    }
                };
                if accepted {
                    self.cycle(ExecMethod::Manual).await;
                }
            }

            BlockMsg::SetConfig { name, value } => {
                match self.block.state.config.set(&name, value) {
                    Ok(()) => info!(block = %self.block.state.name, attr = %name, "config updated"),
                    Err(_) => {
                        warn!(block = %self.block.state.name, attr = %name, "no such config attribute")
                    }
                }
            }

            BlockMsg::GetValue { name, reply } => {
                let state = &self.block.state;
                let value = state
                    .outputs
                    .value(&name)
                    .or_else(|| state.inputs.value(&name))
                    .or_else(|| state.config.value(&name))
                    .cloned()
                    .or_else(|| state.private.value(&name).cloned());
                let _ = reply.send(value);
            }

            BlockMsg::GetDefinition { reply } => {
                let _ = reply.send(self.block.state.to_definition());
            }

            BlockMsg::AddConnection {
                output_name,
                target_block,
            } => match self.block.state.outputs.get_mut(&output_name) {
                Some(output) => {
                    output.connections.insert(target_block);
                }
                None => {
                    warn!(block = %self.block.state.name, attr = %output_name, "no such output attribute")
                }
            },

            BlockMsg::RemoveConnection {
                output_name,
                target_block,
            } => {
                if let Some(output) = self.block.state.outputs.get_mut(&output_name) {
                    output.connections.remove(&target_block);
                }
            }

            BlockMsg::SetLink { input_name, link } => {
                match self.block.state.inputs.get_mut(&input_name) {
                    Some(input) => {
                        // a fresh link awaits its first publication; an
                        // unlinked input is explicitly unset
                        input.value = if link.is_some() {
                            Value::Empty
                        } else {
                            Value::NotActive
                        };
                        input.link = link;
                    }
                    None => {
                        warn!(block = %self.block.state.name, attr = %input_name, "no such input attribute")
                    }
                }
            }

            BlockMsg::PeerDeleted { block_name } => {
                for input in self.block.state.inputs.iter_mut() {
                    if input.link.as_ref().is_some_and(|l| l.block == block_name) {
                        input.link = None;
                        input.value = Value::NotActive;
                    }
                }
                for output in self.block.state.outputs.iter_mut() {
                    output.connections.remove(&block_name);
                }
            }

            BlockMsg::Delete { reply } => {
                if let Some(armed) = self.block.state.private.take_timer() {
                    armed.cancel();
                }
                let LiveBlock { state, imp } = &mut self.block;
                imp.delete(state).await;
                let _ = self.registry.unregister(&self.block.state.name);
                info!(block = %self.block.state.name, "block deleted");
                let _ = reply.send(self.block.state.to_definition());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn cycle(&mut self, method: ExecMethod) {
        kernel::execute_cycle(&mut self.block, &self.registry, &self.tx, method).await;
    }
}
