use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use automation_chain::keys::{address_of, decrypt_keystore, generate_key};
use automation_core::Key;
use serde::Deserialize;
use tracing::info;
use walkdir::WalkDir;

use crate::context::Context;

pub const GANACHE_PRIMARY: &str = "ganache-primary";

fn stored(alias: &str, value: &str) -> anyhow::Result<Key> {
    let value = value.trim();
    let address = address_of(value).with_context(|| format!("key {alias}"))?;
    Ok(Key {
        alias: alias.to_string(),
        value: value.to_string(),
        address: address.to_string(),
    })
}

pub fn create(ctx: &Context, name: &str) -> anyhow::Result<Key> {
    let (secret, address) = generate_key();
    let key = Key {
        alias: name.to_string(),
        value: secret,
        address: address.to_string(),
    };
    let mut vault = ctx.load_vault()?;
    vault.insert(key.clone());
    ctx.save_vault(&vault)?;
    info!(alias = %name, %address, "key created");
    Ok(key)
}

/// Store the hex key on the first line of `input` under `name`.
pub fn store<R: BufRead>(ctx: &Context, name: &str, input: &mut R) -> anyhow::Result<Key> {
    let mut line = String::new();
    input.read_line(&mut line).context("reading private key")?;
    if line.trim().is_empty() {
        bail!("no private key given");
    }
    let key = stored(name, &line)?;
    let mut vault = ctx.load_vault()?;
    vault.insert(key.clone());
    ctx.save_vault(&vault)?;
    info!(alias = %name, address = %key.address, "key stored");
    Ok(key)
}

pub fn list(ctx: &Context) -> anyhow::Result<Vec<(String, String)>> {
    let vault = ctx.load_vault()?;
    Ok(vault
        .keys
        .iter()
        .map(|k| (k.alias.clone(), k.address.clone()))
        .collect())
}

pub fn delete(ctx: &Context, pattern: &str) -> anyhow::Result<Vec<String>> {
    let mut vault = ctx.load_vault()?;
    let removed = vault.remove(pattern);
    if removed.is_empty() {
        bail!("no key matches {pattern:?}");
    }
    ctx.save_vault(&vault)?;
    info!(removed = removed.len(), %pattern, "keys deleted");
    Ok(removed)
}

#[derive(Deserialize)]
struct GanacheAccounts {
    addresses: BTreeMap<String, String>,
    private_keys: BTreeMap<String, String>,
}

/// Import every account of a ganache `--account_keys_path` file.
///
/// Account 0 becomes `ganache-primary`, account `n` becomes `ganache-<n>`.
pub fn import_ganache(ctx: &Context, file: &Path) -> anyhow::Result<Vec<Key>> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let accounts: GanacheAccounts = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", file.display()))?;

    let mut indexed = Vec::with_capacity(accounts.addresses.len());
    for (index, address) in &accounts.addresses {
        let index: usize = index
            .parse()
            .with_context(|| format!("account index {index:?} is not a number"))?;
        indexed.push((index, address));
    }
    indexed.sort_by_key(|(index, _)| *index);

    let mut keys = Vec::with_capacity(indexed.len());
    for (index, address) in indexed {
        let secret = accounts
            .private_keys
            .iter()
            .find(|(a, _)| a.eq_ignore_ascii_case(address))
            .map(|(_, secret)| secret)
            .with_context(|| format!("no private key for {address}"))?;
        let alias = if index == 0 {
            GANACHE_PRIMARY.to_string()
        } else {
            format!("ganache-{index}")
        };
        keys.push(Key {
            alias,
            value: secret.clone(),
            address: address.clone(),
        });
    }

    let mut vault = ctx.load_vault()?;
    for key in &keys {
        vault.insert(key.clone());
    }
    ctx.save_vault(&vault)?;
    info!(imported = keys.len(), file = %file.display(), "ganache keys imported");
    Ok(keys)
}

fn keystore_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("listing {}", path.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    if files.is_empty() {
        bail!("no keystore files in {}", path.display());
    }
    Ok(files)
}

/// Decrypt V3 keystores; the first is stored as `name`, later ones as
/// `name-1`, `name-2`, ...
pub fn import_geth(
    ctx: &Context,
    name: &str,
    path: &Path,
    password_file: Option<&Path>,
) -> anyhow::Result<Vec<Key>> {
    let password = match password_file {
        Some(file) => std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?
            .trim_end_matches(['\r', '\n'])
            .to_string(),
        None => String::new(),
    };

    let mut keys = Vec::new();
    for (i, file) in keystore_files(path)?.into_iter().enumerate() {
        let alias = if i == 0 {
            name.to_string()
        } else {
            format!("{name}-{i}")
        };
        let secret = decrypt_keystore(&file, &password)
            .with_context(|| format!("decrypting {}", file.display()))?;
        keys.push(stored(&alias, &secret)?);
    }

    let mut vault = ctx.load_vault()?;
    for key in &keys {
        vault.insert(key.clone());
    }
    ctx.save_vault(&vault)?;
    info!(imported = keys.len(), path = %path.display(), "keystores imported");
    Ok(keys)
}
