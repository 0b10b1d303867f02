//! Compiled contract artifacts on disk.
//!
//! Each contract's creation bytecode lives in `<dir>/<Name>.json`, either
//! as a solc/hardhat-style object with a `bytecode` field (a string, or an
//! object with an `object` field) or as a bare JSON/hex string.

use std::path::{Path, PathBuf};

use alloy_primitives::Bytes;
use serde_json::Value;

use crate::error::{ContractError, ContractResult};

/// Directory of `<Name>.json` bytecode artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Creation bytecode for `name`.
    pub fn bytecode(&self, name: &str) -> ContractResult<Bytes> {
        let path = self.path_for(name);
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            ContractError::creation(name, format!("artifact {}: {e}", path.display()))
        })?;
        parse_artifact(&raw)
            .map_err(|reason| ContractError::creation(name, format!("{}: {reason}", path.display())))
    }
}

fn parse_artifact(raw: &str) -> Result<Bytes, String> {
    let trimmed = raw.trim();
    let hex_text = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => match map.get("bytecode") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(inner)) => inner
                .get("object")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or("bytecode object has no `object` field")?,
            _ => return Err("no `bytecode` field".to_string()),
        },
        Ok(_) => return Err("unsupported artifact shape".to_string()),
        // Not JSON at all: accept a raw hex dump.
        Err(_) => trimmed.to_string(),
    };

    let hex_part = hex_text.strip_prefix("0x").unwrap_or(&hex_text);
    if hex_part.is_empty() {
        return Err("empty bytecode".to_string());
    }
    hex::decode(hex_part)
        .map(Bytes::from)
        .map_err(|e| format!("bytecode is not hex: {e}"))
}
