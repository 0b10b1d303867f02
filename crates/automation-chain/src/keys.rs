//! Private key material: parsing, generation, and V3 keystores.

use std::path::Path;

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::Address;

use crate::error::{ChainError, ChainResult};

/// Decode a hex private key (with or without `0x`) into a signer.
pub fn parse_private_key(key: &str) -> ChainResult<PrivateKeySigner> {
    let bytes = decode_key_bytes(key)?;
    PrivateKeySigner::from_slice(&bytes).map_err(|e| ChainError::PublicKeyCasting(e.to_string()))
}

fn decode_key_bytes(key: &str) -> ChainResult<Vec<u8>> {
    let trimmed = key.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_part).map_err(|e| ChainError::PublicKeyCasting(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(ChainError::PublicKeyCasting(format!(
            "expected 32 bytes of key material, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Address controlled by a hex private key.
pub fn address_of(key: &str) -> ChainResult<Address> {
    parse_private_key(key).map(|signer| signer.address())
}

/// Generate a fresh key. Returns the hex secret (no prefix) and its address.
pub fn generate_key() -> (String, Address) {
    let signer = PrivateKeySigner::random();
    (hex::encode(signer.to_bytes()), signer.address())
}

/// Decrypt a V3 keystore file, returning the hex secret (no prefix).
pub fn decrypt_keystore(path: &Path, password: &str) -> ChainResult<String> {
    let bytes = eth_keystore::decrypt_key(path, password)
        .map_err(|e| ChainError::PublicKeyCasting(format!("{}: {e}", path.display())))?;
    Ok(hex::encode(bytes))
}

/// Encrypt a hex private key as V3 keystore JSON under `password`.
pub fn encrypt_keystore(key: &str, password: &str) -> ChainResult<String> {
    let bytes = decode_key_bytes(key)?;
    let address = parse_private_key(key)?.address();

    let dir = tempfile::tempdir().map_err(|e| ChainError::PublicKeyCasting(e.to_string()))?;
    eth_keystore::encrypt_key(dir.path(), &mut rand::thread_rng(), &bytes, password, Some("key"))
        .map_err(|e| ChainError::PublicKeyCasting(e.to_string()))?;
    let raw = std::fs::read_to_string(dir.path().join("key"))
        .map_err(|e| ChainError::PublicKeyCasting(e.to_string()))?;

    // Go-ethereum style keystores carry the bare lowercase address.
    let mut json: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| ChainError::PublicKeyCasting(e.to_string()))?;
    if let Some(object) = json.as_object_mut() {
        object.insert(
            "address".to_string(),
            serde_json::Value::String(hex::encode(address.as_slice())),
        );
    }
    Ok(json.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known first account of the hardhat/anvil dev mnemonic.
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn derives_known_address() {
        let expected: Address = DEV_ADDRESS.parse().unwrap();
        assert_eq!(address_of(DEV_KEY).unwrap(), expected);
        assert_eq!(address_of(&format!("0x{DEV_KEY}")).unwrap(), expected);
    }

    #[test]
    fn rejects_bad_material() {
        assert!(matches!(address_of("zz"), Err(ChainError::PublicKeyCasting(_))));
        assert!(matches!(address_of("0x01"), Err(ChainError::PublicKeyCasting(_))));
        assert!(address_of(&"00".repeat(32)).is_err());
    }

    #[test]
    fn generated_key_round_trips() {
        let (secret, address) = generate_key();
        assert_eq!(secret.len(), 64);
        assert_eq!(address_of(&secret).unwrap(), address);
    }

    #[test]
    fn keystore_round_trip() {
        let json = encrypt_keystore(DEV_KEY, "hunter2").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value["address"],
            "f39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        std::fs::write(&path, &json).unwrap();
        assert_eq!(decrypt_keystore(&path, "hunter2").unwrap(), DEV_KEY);
        assert!(decrypt_keystore(&path, "wrong").is_err());
    }
}
