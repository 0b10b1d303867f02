//! Block-explorer links for well-known chains.

use std::fmt::Display;

/// Explorer base URL for a chain id, if known.
pub fn explorer_prefix(chain_id: u64) -> Option<&'static str> {
    let prefix = match chain_id {
        1 => "https://etherscan.io",
        5 => "https://goerli.etherscan.io",
        11155111 => "https://sepolia.etherscan.io",
        10 => "https://optimistic.etherscan.io",
        420 => "https://goerli-optimism.etherscan.io",
        11155420 => "https://sepolia-optimism.etherscan.io",
        56 => "https://bscscan.com",
        97 => "https://testnet.bscscan.com",
        137 => "https://polygonscan.com",
        80001 => "https://mumbai.polygonscan.com",
        42161 => "https://arbiscan.io",
        421613 => "https://goerli.arbiscan.io",
        421614 => "https://sepolia.arbiscan.io",
        43114 => "https://snowtrace.io",
        43113 => "https://testnet.snowtrace.io",
        8453 => "https://basescan.org",
        84532 => "https://sepolia.basescan.org",
        _ => return None,
    };
    Some(prefix)
}

/// Link to a transaction on the chain's explorer, or the bare hash for
/// unknown chains.
pub fn explorer_link(chain_id: u64, hash: impl Display) -> String {
    match explorer_prefix(chain_id) {
        Some(prefix) => format!("{prefix}/tx/{hash}"),
        None => hash.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::TxHash;

    #[test]
    fn mainnet_link() {
        assert_eq!(
            explorer_link(1, "0xabc"),
            "https://etherscan.io/tx/0xabc"
        );
    }

    #[test]
    fn unknown_chain_is_bare_hash() {
        assert_eq!(explorer_link(99999, "0xabc"), "0xabc");
        assert_eq!(explorer_link(31337, "0xabc"), "0xabc");
    }

    #[test]
    fn every_known_chain_uses_tx_path() {
        for chain_id in [1, 5, 10, 56, 137, 42161, 43114, 8453, 11155111] {
            let prefix = explorer_prefix(chain_id).unwrap();
            assert_eq!(explorer_link(chain_id, "0x1"), format!("{prefix}/tx/0x1"));
        }
    }

    #[test]
    fn tx_hash_renders_prefixed_hex() {
        let hash = TxHash::repeat_byte(0xab);
        let link = explorer_link(1, hash);
        assert!(link.starts_with("https://etherscan.io/tx/0xabab"));
        assert_eq!(link.len(), "https://etherscan.io/tx/".len() + 66);
    }
}
