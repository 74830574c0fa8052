//! Wiring validation
//!
//! Validates a set of block definitions before the runtime spawns them:
//! unique names, link endpoints that exist, and endpoint-kind compatibility
//! (`execute_out` outputs wire only to `execute_in` inputs; value outputs
//! wire only to value inputs). Produces a `WiringValidationResult` with
//! errors and non-fatal warnings.

use std::collections::{HashMap, HashSet};

use crate::core::attribute::{EXECUTE_IN, EXECUTE_OUT};
use crate::core::block::BlockDefinition;

// ── Result types ────────────────────────────────────────────────────────────

/// A single validation error with optional location and suggestion.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Block where the problem was found (if applicable).
    pub block: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Optional suggestion for how to fix it.
    pub suggestion: Option<String>,
}

/// A non-fatal warning.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub block: Option<String>,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Overall wiring validation result.
#[derive(Debug, Clone)]
pub struct WiringValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl WiringValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add_error(
        &mut self,
        block: Option<&str>,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) {
        self.valid = false;
        self.errors.push(ValidationError {
            block: block.map(|s| s.to_string()),
            message: message.into(),
            suggestion: suggestion.map(|s| s.to_string()),
        });
    }

    fn add_warning(
        &mut self,
        block: Option<&str>,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) {
        self.warnings.push(ValidationWarning {
            block: block.map(|s| s.to_string()),
            message: message.into(),
            suggestion: suggestion.map(|s| s.to_string()),
        });
    }

    /// Merge another result into this one.
    fn merge(&mut self, other: WiringValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// All error messages joined, for surfacing in a single error value.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Validator ───────────────────────────────────────────────────────────────

/// Validates the wiring of a set of block definitions.
pub struct WiringValidator;

impl WiringValidator {
    /// Run every wiring check against the given definitions.
    pub fn validate(defs: &[BlockDefinition]) -> WiringValidationResult {
        let mut result = WiringValidationResult::ok();

        result.merge(Self::check_unique_names(defs));
        result.merge(Self::check_link_endpoints(defs));
        result.merge(Self::check_endpoint_kinds(defs));
        result.merge(Self::check_connection_targets(defs));

        result
    }

    // ── Individual checks ───────────────────────────────────────────────

    /// `block_name` must be present and unique across the set.
    fn check_unique_names(defs: &[BlockDefinition]) -> WiringValidationResult {
        let mut result = WiringValidationResult::ok();
        let mut seen = HashSet::new();
        for def in defs {
            match def.block_name() {
                Some(name) => {
                    if !seen.insert(name.to_string()) {
                        result.add_error(
                            Some(name),
                            format!("duplicate block name '{name}'"),
                            Some("Rename one of the blocks"),
                        );
                    }
                }
                None => result.add_error(
                    None,
                    "definition has no block_name config",
                    Some("Add a block_name config attribute"),
                ),
            }
        }
        result
    }

    /// Every input link must reference an existing block and output.
    fn check_link_endpoints(defs: &[BlockDefinition]) -> WiringValidationResult {
        let mut result = WiringValidationResult::ok();
        let by_name: HashMap<&str, &BlockDefinition> = defs
            .iter()
            .filter_map(|d| d.block_name().map(|n| (n, d)))
            .collect();

        for def in defs {
            let block = def.block_name().unwrap_or("?");
            for input in def.inputs.iter() {
                let Some(link) = &input.link else { continue };
                match by_name.get(link.block.as_str()) {
                    Some(source) => {
                        if !source.outputs.contains(&link.output) {
                            result.add_error(
                                Some(block),
                                format!(
                                    "input '{}' links to '{}:{}' but that block has no such output",
                                    input.name, link.block, link.output
                                ),
                                Some("Check output names match the source block definition"),
                            );
                        }
                    }
                    None => result.add_error(
                        Some(block),
                        format!(
                            "input '{}' links to unknown block '{}'",
                            input.name, link.block
                        ),
                        Some("Add the block to the configuration or remove the link"),
                    ),
                }
            }
        }
        result
    }

    /// `execute_out` wires only to `execute_in`, value outputs only to value
    /// inputs. Crossing the channels is an error.
    fn check_endpoint_kinds(defs: &[BlockDefinition]) -> WiringValidationResult {
        let mut result = WiringValidationResult::ok();
        for def in defs {
            let block = def.block_name().unwrap_or("?");
            for input in def.inputs.iter() {
                let Some(link) = &input.link else { continue };
                let exec_source = link.output == EXECUTE_OUT;
                let exec_target = input.name == EXECUTE_IN;
                if exec_source != exec_target {
                    result.add_error(
                        Some(block),
                        format!(
                            "input '{}' cannot link to '{}:{}': execution and value channels do not mix",
                            input.name, link.block, link.output
                        ),
                        Some("Wire execute_out to execute_in and value outputs to value inputs"),
                    );
                }
            }
        }
        result
    }

    /// Connections naming unknown blocks, or disagreeing with the links, are
    /// warnings; the reconcile pass rebuilds connections from links.
    fn check_connection_targets(defs: &[BlockDefinition]) -> WiringValidationResult {
        let mut result = WiringValidationResult::ok();
        let names: HashSet<&str> = defs.iter().filter_map(|d| d.block_name()).collect();

        // (source block, output, target block) pairs implied by the links
        let linked: HashSet<(String, String, &str)> = defs
            .iter()
            .flat_map(|d| {
                let target = d.block_name().unwrap_or("?");
                d.inputs.iter().filter_map(move |i| {
                    i.link
                        .as_ref()
                        .map(|l| (l.block.clone(), l.output.clone(), target))
                })
            })
            .collect();

        for def in defs {
            let block = def.block_name().unwrap_or("?");
            for output in def.outputs.iter() {
                for target in &output.connections {
                    if !names.contains(target.as_str()) {
                        result.add_warning(
                            Some(block),
                            format!(
                                "output '{}' is connected to unknown block '{}'",
                                output.name, target
                            ),
                            Some("The connection will be dropped at dispatch time"),
                        );
                    } else if !linked.contains(&(
                        block.to_string(),
                        output.name.clone(),
                        target.as_str(),
                    )) {
                        result.add_warning(
                            Some(block),
                            format!(
                                "output '{}' lists connection to '{}' but '{}' has no matching link",
                                output.name, target, target
                            ),
                            Some("Reconciling connections from links will fix this"),
                        );
                    }
                }
            }
        }
        result
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attribute::{
        common_configs, common_inputs, common_outputs, Link, EXECUTE_IN, VALUE,
    };

    fn def(name: &str) -> BlockDefinition {
        BlockDefinition {
            config: common_configs(name, "toggle", "0.1.0", ""),
            inputs: common_inputs(),
            outputs: common_outputs(),
        }
    }

    fn link_input(def: &mut BlockDefinition, input: &str, source: &str, output: &str) {
        let attr = def.inputs.get_mut(input).unwrap();
        attr.link = Some(Link::new(source, output));
    }

    #[test]
    fn test_valid_control_chain() {
        let mut a = def("a");
        let mut b = def("b");
        a.outputs
            .get_mut(EXECUTE_OUT)
            .unwrap()
            .connections
            .insert("b".into());
        link_input(&mut b, EXECUTE_IN, "a", EXECUTE_OUT);

        let result = WiringValidator::validate(&[a, b]);
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = WiringValidator::validate(&[def("same"), def("same")]);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn test_link_to_unknown_block() {
        let mut b = def("b");
        link_input(&mut b, EXECUTE_IN, "ghost", EXECUTE_OUT);
        let result = WiringValidator::validate(&[b]);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("unknown block 'ghost'")));
    }

    #[test]
    fn test_link_to_missing_output() {
        let a = def("a");
        let mut b = def("b");
        link_input(&mut b, EXECUTE_IN, "a", "no_such_output");
        let result = WiringValidator::validate(&[a, b]);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("no such output")));
    }

    #[test]
    fn test_execute_out_to_value_input_rejected() {
        let a = def("a");
        let mut b = def("b");
        // value input fed from an execution output
        link_input(&mut b, "enable", "a", EXECUTE_OUT);
        let result = WiringValidator::validate(&[a, b]);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("channels do not mix")));
    }

    #[test]
    fn test_value_output_to_execute_in_rejected() {
        let a = def("a");
        let mut b = def("b");
        link_input(&mut b, EXECUTE_IN, "a", VALUE);
        let result = WiringValidator::validate(&[a, b]);
        assert!(!result.valid);
    }

    #[test]
    fn test_stale_connection_is_warning() {
        let mut a = def("a");
        a.outputs
            .get_mut(VALUE)
            .unwrap()
            .connections
            .insert("gone".into());
        let result = WiringValidator::validate(&[a]);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_empty_set_is_valid() {
        let result = WiringValidator::validate(&[]);
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }
}
