//! Whole-document persistence under the state directory.
//!
//! Every read parses a complete document and every write replaces one.
//! Writes go to a sibling temporary file and are renamed into place so a
//! crash never leaves a half-written record behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::types::Environment;
use crate::vault::KeyVault;

/// Permission bits for files the store and the node layer write.
pub const FILE_MODE: u32 = 0o640;
/// Permission bits for directories the store and the node layer create.
pub const DIR_MODE: u32 = 0o760;

const KEYS_FILE: &str = "keys.json";
const CONFIG_FILE: &str = "config.toml";

/// File-backed store rooted at the state directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    /// Open a store at `root`. Nothing is touched on disk until first access.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open a store from a user-supplied path, expanding a leading `~`.
    pub fn from_user_path(path: &str) -> Self {
        Self::new(expand_home(path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one environment's record and node files.
    pub fn environment_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Directory holding one node's files inside an environment.
    pub fn node_dir(&self, environment: &str, node: &str) -> PathBuf {
        self.environment_dir(environment).join(node)
    }

    fn config_path(&self, name: &str) -> PathBuf {
        self.environment_dir(name).join(CONFIG_FILE)
    }

    fn keys_path(&self) -> PathBuf {
        self.root.join(KEYS_FILE)
    }

    // ── Environments ──────────────────────────────────────────────

    /// Load an environment, creating an empty record on first access.
    pub fn load_environment(&self, name: &str) -> StateResult<Environment> {
        let path = self.config_path(name);
        let content = read_or_create(&path)?;
        let env = Environment::from_toml_str(&content).map_err(|e| StateError::read(&path, e))?;
        debug!(environment = %name, ?path, "environment loaded");
        Ok(env)
    }

    /// Replace an environment record on disk.
    pub fn save_environment(&self, name: &str, env: &Environment) -> StateResult<()> {
        let path = self.config_path(name);
        let content = env.to_toml_string().map_err(|e| StateError::write(&path, e))?;
        write_atomic(&path, content.as_bytes())?;
        debug!(environment = %name, ?path, "environment saved");
        Ok(())
    }

    /// Remove an environment directory and everything under it.
    /// Returns true if it existed.
    pub fn delete_environment(&self, name: &str) -> StateResult<bool> {
        let dir = self.environment_dir(name);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| StateError::write(&dir, e))?;
        debug!(environment = %name, ?dir, "environment deleted");
        Ok(true)
    }

    /// Names of every environment that has a record on disk.
    pub fn list_environments(&self) -> StateResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StateError::read(&self.root, e)),
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(CONFIG_FILE).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    // ── Key vault ─────────────────────────────────────────────────

    /// Load the key vault, creating an empty one on first access.
    pub fn load_key_vault(&self) -> StateResult<KeyVault> {
        let path = self.keys_path();
        let content = read_or_create(&path)?;
        if content.trim().is_empty() {
            return Ok(KeyVault::default());
        }
        serde_json::from_str(&content).map_err(|e| StateError::read(&path, e))
    }

    /// Replace the key vault on disk.
    pub fn save_key_vault(&self, vault: &KeyVault) -> StateResult<()> {
        let path = self.keys_path();
        let content = serde_json::to_vec_pretty(vault).map_err(|e| StateError::write(&path, e))?;
        write_atomic(&path, &content)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

/// Create `dir` (and parents) with [`DIR_MODE`].
pub fn create_dir_restricted(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(dir)
}

/// Write `contents` to `path` with [`FILE_MODE`], creating parents as needed.
pub fn write_restricted(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_restricted(parent)?;
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

fn read_or_create(path: &Path) -> StateResult<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            write_restricted(path, b"").map_err(|e| StateError::read(path, e))?;
            Ok(String::new())
        }
        Err(e) => Err(StateError::read(path, e)),
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> StateResult<()> {
    let tmp = path.with_extension("tmp");
    write_restricted(&tmp, contents).map_err(|e| StateError::write(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StateError::write(path, e))
}
