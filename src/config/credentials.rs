//! Loads the JSON credentials file format (§4.4), the same shape a project
//! link's stash directory or an explicit `--credentials-file` point at.

use std::path::Path;

use serde::Deserialize;

use crate::config::PartialConfig;
use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    host: Option<String>,
    port: Option<i64>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
    tls_ca_data: Option<String>,
    tls_verify_hostname: Option<bool>,
}

pub fn load_credentials(path: &Path) -> Result<PartialConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_credentials(&raw)
}

fn parse_credentials(raw: &str) -> Result<PartialConfig, ConfigError> {
    let parsed: CredentialsFile = serde_json::from_str(raw)?;
    Ok(PartialConfig {
        host: parsed.host,
        port: parsed.port,
        database: parsed.database,
        user: parsed.user,
        password: parsed.password,
        tls_ca_data: parsed.tls_ca_data,
        tls_verify_hostname: parsed.tls_verify_hostname,
        ..Default::default()
    })
}
