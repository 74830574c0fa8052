//! Dataflow and control-flow propagation
//!
//! Two distinct channels over the same graph. Dataflow pushes changed output
//! values into the linked inputs of connected blocks; control flow fires
//! execute triggers at the blocks wired to `execute_out`. Dataflow sends
//! happen first, in output-sequence order.

use tracing::warn;

use crate::core::attribute::{OutputAttr, Outputs, EXECUTE_OUT};
use crate::core::registry::{BlockMsg, BlockRegistry};

/// Positionally compare the previous and new output sequences and return the
/// value outputs whose value changed. `execute_out` is never a value output.
///
/// The sequences must share names and order; a type-specific execute that
/// reorders or drops outputs is a contract violation.
pub fn changed_outputs<'a>(prev: &Outputs, next: &'a Outputs) -> Vec<&'a OutputAttr> {
    debug_assert_eq!(
        prev.names(),
        next.names(),
        "execute must preserve output names and ordering"
    );
    prev.iter()
        .zip(next.iter())
        .filter(|(p, n)| n.name != EXECUTE_OUT && p.value != n.value)
        .map(|(_, n)| n)
        .collect()
}

/// Publish one cycle's results: updates for every changed value output, then
/// execute triggers for every `execute_out` connection.
///
/// A connection naming a block that is no longer registered is logged and
/// dropped; the connections set may lag the registry.
pub fn publish(block_name: &str, prev: &Outputs, next: &Outputs, registry: &BlockRegistry) {
    for output in changed_outputs(prev, next) {
        for target in &output.connections {
            match registry.lookup(target) {
                Some(handle) => {
                    handle.send(BlockMsg::Update {
                        from_block: block_name.to_string(),
                        output_name: output.name.clone(),
                        value: output.value.clone(),
                    });
                }
                None => warn!(
                    block = block_name,
                    output = %output.name,
                    target = %target,
                    "dropping update for unknown connection"
                ),
            }
        }
    }

    if let Some(exec_out) = next.get(EXECUTE_OUT) {
        for target in &exec_out.connections {
            match registry.lookup(target) {
                Some(handle) => handle.trigger_execute(),
                None => warn!(
                    block = block_name,
                    target = %target,
                    "dropping execute trigger for unknown connection"
                ),
            }
        }
    }
}
