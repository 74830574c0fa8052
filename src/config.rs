//! Persisted block configuration
//!
//! A configuration is an ordered sequence of block definitions: config,
//! inputs, and outputs, never private state. The on-disk form is one JSON
//! record per line; compatibility is at the record level, not the byte
//! level. Blank lines and `#` comment lines are tolerated on read.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::core::block::BlockDefinition;

/// Configuration read/write failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed definition record on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("could not serialize definition: {0}")]
    Serialize(serde_json::Error),
}

/// Write definitions as JSON Lines: each record followed by a newline.
pub fn write_config<W: Write>(mut writer: W, defs: &[BlockDefinition]) -> Result<(), ConfigError> {
    for def in defs {
        let record = serde_json::to_string(def).map_err(ConfigError::Serialize)?;
        writeln!(writer, "{record}")?;
    }
    Ok(())
}

/// Parse a sequence of definition records.
pub fn read_config<R: BufRead>(reader: R) -> Result<Vec<BlockDefinition>, ConfigError> {
    let mut defs = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let record = line.trim();
        if record.is_empty() || record.starts_with('#') {
            continue;
        }
        let def = serde_json::from_str(record).map_err(|source| ConfigError::Parse {
            line: idx + 1,
            source,
        })?;
        defs.push(def);
    }
    Ok(defs)
}

/// Load a configuration file.
pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<BlockDefinition>, ConfigError> {
    read_config(BufReader::new(File::open(path)?))
}

/// Save a configuration file.
pub fn save_file(path: impl AsRef<Path>, defs: &[BlockDefinition]) -> Result<(), ConfigError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_config(&mut writer, defs)?;
    writer.flush()?;
    Ok(())
}

/// Rebuild every output's connections set from the input links across the
/// whole set. Links are authoritative for ingestion; connections are
/// authoritative for dispatch; this pass makes them agree after a load.
pub fn reconcile_connections(defs: &mut [BlockDefinition]) {
    // (source block, source output, target block) triples implied by links
    let wanted: Vec<(String, String, String)> = defs
        .iter()
        .flat_map(|def| {
            let target = def.block_name().unwrap_or("?").to_string();
            def.inputs
                .iter()
                .filter_map(|input| {
                    input
                        .link
                        .as_ref()
                        .map(|l| (l.block.clone(), l.output.clone(), target.clone()))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    for def in defs.iter_mut() {
        let Some(name) = def.block_name().map(str::to_string) else {
            continue;
        };
        for output in def.outputs.iter_mut() {
            output.connections = wanted
                .iter()
                .filter(|(block, out, _)| *block == name && *out == output.name)
                .map(|(_, _, target)| target.clone())
                .collect();
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
