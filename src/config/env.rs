//! Reads the `EDGEDB_*` environment variables into a [`PartialConfig`]
//! (§4.4). Kept as a pure function of an environment snapshot, not
//! `std::env` directly, so the precedence engine can test it without
//! mutating the process environment.

use std::collections::HashMap;

use tracing::warn;

use crate::config::PartialConfig;
use crate::config::validate;
use crate::error::ConfigError;

const VARS: &[&str] = &[
    "EDGEDB_DSN",
    "EDGEDB_INSTANCE",
    "EDGEDB_CREDENTIALS_FILE",
    "EDGEDB_HOST",
    "EDGEDB_PORT",
    "EDGEDB_DATABASE",
    "EDGEDB_USER",
    "EDGEDB_PASSWORD",
    "EDGEDB_TLS_CA_FILE",
    "EDGEDB_TLS_VERIFY_HOSTNAME",
];

/// Snapshot of the variables this module cares about, read once so the
/// resolver can reason about "which ones were set" without races.
pub fn snapshot() -> HashMap<&'static str, String> {
    VARS.iter()
        .filter_map(|name| std::env::var(name).ok().map(|v| (*name, v)))
        .collect()
}

pub fn from_env(vars: &HashMap<&'static str, String>) -> Result<PartialConfig, ConfigError> {
    let mut partial = PartialConfig {
        dsn: vars.get("EDGEDB_DSN").cloned(),
        instance: vars.get("EDGEDB_INSTANCE").cloned(),
        credentials_file: vars.get("EDGEDB_CREDENTIALS_FILE").cloned(),
        host: vars.get("EDGEDB_HOST").cloned(),
        database: vars.get("EDGEDB_DATABASE").cloned(),
        user: vars.get("EDGEDB_USER").cloned(),
        password: vars.get("EDGEDB_PASSWORD").cloned(),
        tls_ca_data: None,
        ..Default::default()
    };

    if let Some(ca_file) = vars.get("EDGEDB_TLS_CA_FILE") {
        partial.tls_ca_data = Some(std::fs::read_to_string(ca_file).map_err(ConfigError::Io)?);
    }

    if let Some(raw_port) = vars.get("EDGEDB_PORT") {
        if raw_port.starts_with("tcp://") {
            // A known Docker-link artifact: linking a container named
            // "edgedb" injects EDGEDB_PORT=tcp://host:port. Treat it as
            // unset rather than failing the whole connection attempt.
            warn!(
                value = %raw_port,
                "ignoring EDGEDB_PORT, looks like a Docker-link variable rather than a port number"
            );
        } else {
            let port: i64 = raw_port
                .parse()
                .map_err(|_| ConfigError::InvalidDsn(format!("invalid EDGEDB_PORT {raw_port:?}")))?;
            validate::validate_port(port)?;
            partial.port = Some(port);
        }
    }

    if let Some(raw) = vars.get("EDGEDB_TLS_VERIFY_HOSTNAME") {
        partial.tls_verify_hostname = Some(
            validate::parse_bool(raw)
                .ok_or_else(|| ConfigError::InvalidDsn(format!("invalid boolean {raw:?}")))?,
        );
    }

    Ok(partial)
}
