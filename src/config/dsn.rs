//! Parses the `edgedb://` connection string.
//!
//! This is not general-purpose URL syntax: query parameters come in three
//! mutually exclusive flavors per field (`foo`, `foo_env`, `foo_file`), which
//! a generic URL-query decoder doesn't model, so this is a small hand-rolled
//! scanner rather than a pull from the `url` crate.

use std::collections::HashMap;

use crate::config::PartialConfig;
use crate::error::ConfigError;

pub fn parse_dsn(dsn: &str) -> Result<PartialConfig, ConfigError> {
    let rest = dsn
        .strip_prefix("edgedb://")
        .ok_or_else(|| ConfigError::InvalidDsn("scheme must be 'edgedb://'".into()))?;

    let (authority_and_path, query) = match rest.split_once('?') {
        Some((a, q)) => (a, Some(q)),
        None => (rest, None),
    };
    let (authority, database) = match authority_and_path.split_once('/') {
        Some((a, d)) => (a, Some(d)),
        None => (authority_and_path, None),
    };

    let (userinfo, hostport) = match authority.rsplit_once('@') {
        Some((u, h)) => (Some(u), h),
        None => (None, authority),
    };
    let (user, password) = match userinfo {
        Some(u) => match u.split_once(':') {
            Some((user, pass)) => (Some(user.to_owned()), Some(pass.to_owned())),
            None => (Some(u.to_owned()), None),
        },
        None => (None, None),
    };
    let (host, port) = match hostport.split_once(':') {
        Some((h, p)) => {
            let port: i64 = p
                .parse()
                .map_err(|_| ConfigError::InvalidDsn(format!("invalid port {p:?}")))?;
            (Some(h.to_owned()).filter(|h| !h.is_empty()), Some(port))
        }
        None => (Some(hostport.to_owned()).filter(|h| !h.is_empty()), None),
    };

    let mut partial = PartialConfig {
        host,
        port,
        database: database.map(|d| d.to_owned()).filter(|d| !d.is_empty()),
        user,
        password,
        ..Default::default()
    };

    if let Some(query) = query {
        apply_query(&mut partial, query)?;
    }

    Ok(partial)
}

fn apply_query(partial: &mut PartialConfig, query: &str) -> Result<(), ConfigError> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (raw_key, raw_value) = pair
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidDsn(format!("malformed query parameter {pair:?}")))?;

        let (field, suffix) = split_suffix(raw_key);
        if seen.insert(field.to_owned(), ()).is_some() {
            return Err(ConfigError::DuplicateParameter(field.to_owned()));
        }

        let value = resolve_value(suffix, raw_value)?;

        match field {
            "host" => partial.host = Some(value),
            "port" => {
                partial.port = Some(
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidDsn(format!("invalid port {value:?}")))?,
                )
            }
            "database" => partial.database = Some(value),
            "user" => partial.user = Some(value),
            "password" => partial.password = Some(value),
            "tls_ca_file" => partial.tls_ca_data = Some(value),
            "tls_verify_hostname" => {
                partial.tls_verify_hostname = Some(super::validate::parse_bool(&value).ok_or_else(
                    || ConfigError::InvalidDsn(format!("invalid boolean {value:?}")),
                )?)
            }
            _ => {
                partial
                    .server_settings
                    .insert(raw_key.to_owned(), value);
            }
        }
    }
    Ok(())
}

fn split_suffix(key: &str) -> (&str, Option<&str>) {
    if let Some(field) = key.strip_suffix("_env") {
        (field, Some("env"))
    } else if let Some(field) = key.strip_suffix("_file") {
        (field, Some("file"))
    } else {
        (key, None)
    }
}

fn resolve_value(suffix: Option<&str>, raw_value: &str) -> Result<String, ConfigError> {
    match suffix {
        None => Ok(urldecode(raw_value)),
        Some("env") => std::env::var(raw_value)
            .map_err(|_| ConfigError::InvalidDsn(format!("env var {raw_value:?} is not set"))),
        Some("file") => std::fs::read_to_string(raw_value)
            .map(|s| s.trim_end().to_owned())
            .map_err(ConfigError::Io),
        Some(_) => unreachable!(),
    }
}

fn urldecode(value: &str) -> String {
    // Only percent-decodes %XX triples; anything else passes through
    // unmodified, matching the narrow subset this DSN format actually needs.
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&value[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_authority() {
        let parsed = parse_dsn("edgedb://u:p@h:1234/db").unwrap();
        assert_eq!(parsed.host.as_deref(), Some("h"));
        assert_eq!(parsed.port, Some(1234));
        assert_eq!(parsed.user.as_deref(), Some("u"));
        assert_eq!(parsed.password.as_deref(), Some("p"));
        assert_eq!(parsed.database.as_deref(), Some("db"));
    }

    #[test]
    fn rejects_wrong_scheme() {
        assert!(parse_dsn("postgres://h").is_err());
    }

    #[test]
    fn unknown_query_params_become_server_settings() {
        let parsed = parse_dsn("edgedb://h?application_name=demo").unwrap();
        assert_eq!(
            parsed.server_settings.get("application_name").map(String::as_str),
            Some("demo")
        );
    }

    #[test]
    fn duplicate_query_keys_fail() {
        assert!(parse_dsn("edgedb://h?user=a&user=b").is_err());
    }

    #[test]
    fn conflicting_suffix_variants_of_the_same_field_fail() {
        std::env::set_var("EDGETALK_TEST_DSN_HOST2", "b");
        let result = parse_dsn("edgedb://h?host=a&host_env=EDGETALK_TEST_DSN_HOST2");
        std::env::remove_var("EDGETALK_TEST_DSN_HOST2");
        assert!(matches!(result, Err(ConfigError::DuplicateParameter(_))));
    }

    #[test]
    fn env_suffix_reads_from_environment() {
        std::env::set_var("EDGETALK_TEST_DSN_USER", "fromenv");
        let parsed = parse_dsn("edgedb://h?user_env=EDGETALK_TEST_DSN_USER").unwrap();
        assert_eq!(parsed.user.as_deref(), Some("fromenv"));
        std::env::remove_var("EDGETALK_TEST_DSN_USER");
    }
}
