//! Per-node files mounted into the main container.
//!
//! ```text
//! <node dir>/secrets/
//!   chainlink-node-api        login\npassword
//!   chainlink-node-password   keystore password
//!   01-config.toml            log level, web server, chain and RPC URLs
//!   01-secret.toml            Mercury credentials
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use automation_core::store::{create_dir_restricted, write_restricted};
use serde::Serialize;
use tracing::debug;

use crate::error::{NodeError, NodeResult};
use crate::jobs::MERCURY_CREDENTIAL_NAME;

pub const API_FILE: &str = "chainlink-node-api";
pub const PASSWORD_FILE: &str = "chainlink-node-password";
pub const CONFIG_FILE: &str = "01-config.toml";
pub const SECRETS_FILE: &str = "01-secret.toml";
/// Where the secrets directory is mounted inside the container.
pub const MOUNT_POINT: &str = "/run/secrets";

#[derive(Debug, Clone, Default)]
pub struct MercuryCredentials {
    pub legacy_url: String,
    pub url: String,
    pub id: String,
    pub key: String,
}

/// Values templated into the node's files.
#[derive(Debug, Clone)]
pub struct NodeFiles<'a> {
    pub login: &'a str,
    pub password: &'a str,
    pub log_level: &'a str,
    pub chain_id: u64,
    pub ws_url: &'a str,
    pub http_url: &'a str,
    pub mercury: &'a MercuryCredentials,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConfigFile<'a> {
    log: LogSection<'a>,
    web_server: WebServerSection,
    feature: FeatureSection,
    #[serde(rename = "OCR2")]
    ocr2: Toggle,
    #[serde(rename = "P2P")]
    p2p: P2pSection,
    #[serde(rename = "EVM")]
    evm: Vec<EvmChain<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LogSection<'a> {
    level: &'a str,
    #[serde(rename = "JSONConsole")]
    json_console: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct WebServerSection {
    allow_origins: &'static str,
    #[serde(rename = "HTTPPort")]
    http_port: u16,
    secure_cookies: bool,
    session_timeout: &'static str,
    #[serde(rename = "TLS")]
    tls: TlsSection,
}

#[derive(Serialize)]
struct TlsSection {
    #[serde(rename = "HTTPSPort")]
    https_port: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FeatureSection {
    log_poller: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Toggle {
    enabled: bool,
}

#[derive(Serialize)]
struct P2pSection {
    #[serde(rename = "V2")]
    v2: Toggle,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EvmChain<'a> {
    #[serde(rename = "ChainID")]
    chain_id: String,
    nodes: Vec<EvmNode<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EvmNode<'a> {
    name: &'static str,
    #[serde(rename = "WSURL")]
    ws_url: &'a str,
    #[serde(rename = "HTTPURL")]
    http_url: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SecretsFile<'a> {
    mercury: MercurySection<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MercurySection<'a> {
    credentials: BTreeMap<&'static str, MercuryCredential<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MercuryCredential<'a> {
    #[serde(rename = "LegacyURL")]
    legacy_url: &'a str,
    #[serde(rename = "URL")]
    url: &'a str,
    username: &'a str,
    password: &'a str,
}

fn encode<T: Serialize>(file: &T) -> NodeResult<String> {
    toml::to_string(file).map_err(|e| NodeError::Encoding(e.to_string()))
}

pub fn config_toml(files: &NodeFiles<'_>) -> NodeResult<String> {
    encode(&ConfigFile {
        log: LogSection {
            level: files.log_level,
            json_console: true,
        },
        web_server: WebServerSection {
            allow_origins: "*",
            http_port: 6688,
            secure_cookies: false,
            session_timeout: "999h0m0s",
            tls: TlsSection { https_port: 0 },
        },
        feature: FeatureSection { log_poller: true },
        ocr2: Toggle { enabled: true },
        p2p: P2pSection {
            v2: Toggle { enabled: true },
        },
        evm: vec![EvmChain {
            chain_id: files.chain_id.to_string(),
            nodes: vec![EvmNode {
                name: "primary",
                ws_url: files.ws_url,
                http_url: files.http_url,
            }],
        }],
    })
}

pub fn secrets_toml(mercury: &MercuryCredentials) -> NodeResult<String> {
    let credential = MercuryCredential {
        legacy_url: &mercury.legacy_url,
        url: &mercury.url,
        username: &mercury.id,
        password: &mercury.key,
    };
    encode(&SecretsFile {
        mercury: MercurySection {
            credentials: BTreeMap::from([(MERCURY_CREDENTIAL_NAME, credential)]),
        },
    })
}

/// Write all four files under `<node_dir>/secrets`. Returns that directory.
pub fn write_node_files(node_dir: &Path, files: &NodeFiles<'_>) -> NodeResult<PathBuf> {
    let dir = node_dir.join("secrets");
    let fs_err = |path: &Path, e: std::io::Error| {
        NodeError::Filesystem(format!("{}: {e}", path.display()))
    };
    create_dir_restricted(&dir).map_err(|e| fs_err(&dir, e))?;

    let entries = [
        (API_FILE, format!("{}\n{}", files.login, files.password)),
        (PASSWORD_FILE, files.password.to_string()),
        (CONFIG_FILE, config_toml(files)?),
        (SECRETS_FILE, secrets_toml(files.mercury)?),
    ];
    for (name, content) in entries {
        let path = dir.join(name);
        write_restricted(&path, content.as_bytes()).map_err(|e| fs_err(&path, e))?;
    }
    debug!(dir = %dir.display(), "node files written");
    Ok(dir)
}
