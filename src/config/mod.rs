//! Configuration resolution (§4.4): explicit arguments, environment
//! variables, and project-linked instances are merged with sticky
//! first-source-wins precedence — once a field is set by a higher-priority
//! source, a lower-priority source can never overwrite it.

mod credentials;
mod dsn;
mod env;
mod project;
mod validate;

use std::collections::HashMap;
use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::ConfigError;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: i64 = 5656;
const DEFAULT_USER: &str = "edgedb";
const DEFAULT_DATABASE: &str = "edgedb";

/// Caller-supplied connection options (§4.4 "explicit" source), the highest
/// precedence tier.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub dsn: Option<String>,
    pub instance: Option<String>,
    pub credentials_file: Option<String>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub tls_ca_file: Option<String>,
    pub tls_verify_hostname: Option<bool>,
}

/// A partially-filled configuration contributed by one source (DSN string,
/// credentials file, environment, ...). Every field is optional; `resolve`
/// merges several of these with precedence.
#[derive(Debug, Clone, Default)]
pub struct PartialConfig {
    pub dsn: Option<String>,
    pub instance: Option<String>,
    pub credentials_file: Option<String>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub tls_ca_data: Option<String>,
    pub tls_verify_hostname: Option<bool>,
    pub server_settings: HashMap<String, String>,
}

/// The fully resolved, validated configuration ready to open a connection
/// with, plus a record of which source won each field for diagnostics.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub tls_ca_data: Option<String>,
    pub tls_verify_hostname: bool,
    pub server_settings: HashMap<String, String>,
    pub sources: HashMap<&'static str, &'static str>,
}

/// Merges `options`, the process environment, and (if neither named an
/// instance or DSN explicitly) a project-linked instance, into a
/// [`ResolvedConfig`].
pub fn resolve(options: &ConnectOptions) -> Result<ResolvedConfig, ConfigError> {
    reject_compound_options(options)?;

    let mut merged = PartialConfig::default();
    let mut sources: HashMap<&'static str, &'static str> = HashMap::new();

    if let Some(dsn) = &options.dsn {
        apply(&mut merged, &mut sources, "explicit", dsn::parse_dsn(dsn)?);
    } else if let Some(path) = &options.credentials_file {
        apply(
            &mut merged,
            &mut sources,
            "explicit",
            credentials::load_credentials(std::path::Path::new(path))?,
        );
    } else if let Some(instance) = &options.instance {
        apply(
            &mut merged,
            &mut sources,
            "explicit",
            load_instance_credentials(instance)?,
        );
    }
    apply_scalar_overrides(&mut merged, &mut sources, "explicit", options);

    let env_vars = env::snapshot();
    let env_partial = env::from_env(&env_vars)?;
    if merged.host.is_none() && merged.dsn.is_none() {
        if let Some(dsn) = &env_partial.dsn {
            apply(&mut merged, &mut sources, "env", dsn::parse_dsn(dsn)?);
        } else if let Some(path) = &env_partial.credentials_file {
            apply(
                &mut merged,
                &mut sources,
                "env",
                credentials::load_credentials(std::path::Path::new(path))?,
            );
        } else if let Some(instance) = &env_partial.instance {
            apply(
                &mut merged,
                &mut sources,
                "env",
                load_instance_credentials(instance)?,
            );
        }
    }
    apply(&mut merged, &mut sources, "env", env_partial);

    if merged.host.is_none() {
        if let Some(cwd) = std::env::current_dir().ok() {
            if let Some(project_dir) = project::find_project_dir(&cwd)? {
                let key = project::stash_key(&project_dir)?;
                if let Some(config_dir) = project_dirs() {
                    let stash_dir = config_dir.join("projects").join(key);
                    if let Some(instance) = project::read_linked_instance(&stash_dir)? {
                        apply(
                            &mut merged,
                            &mut sources,
                            "project",
                            load_instance_credentials(&instance)?,
                        );
                    }
                }
            }
        }
    }

    if sources.is_empty() {
        return Err(ConfigError::NoProjectConfig);
    }

    finalize(merged, sources)
}

fn reject_compound_options(options: &ConnectOptions) -> Result<(), ConfigError> {
    let exclusive = [
        options.dsn.is_some(),
        options.instance.is_some(),
        options.credentials_file.is_some(),
    ];
    if exclusive.iter().filter(|set| **set).count() > 1 {
        return Err(ConfigError::CompoundOptions);
    }
    Ok(())
}

fn apply_scalar_overrides(
    merged: &mut PartialConfig,
    sources: &mut HashMap<&'static str, &'static str>,
    label: &'static str,
    options: &ConnectOptions,
) {
    macro_rules! take {
        ($field:ident) => {
            if options.$field.is_some() {
                merged.$field = options.$field.clone();
                sources.insert(stringify!($field), label);
            }
        };
    }
    take!(host);
    take!(port);
    take!(database);
    take!(user);
    take!(password);
    take!(tls_verify_hostname);
    if let Some(path) = &options.tls_ca_file {
        merged.tls_ca_data = std::fs::read_to_string(path).ok();
        sources.insert("tls_ca_data", label);
    }
}

/// Copies every field set in `incoming` into `merged` that isn't already
/// set, recording `label` as the winning source. Sticky: a field set by an
/// earlier, higher-precedence call is never overwritten.
fn apply(
    merged: &mut PartialConfig,
    sources: &mut HashMap<&'static str, &'static str>,
    label: &'static str,
    incoming: PartialConfig,
) {
    macro_rules! take {
        ($field:ident) => {
            if merged.$field.is_none() {
                if let Some(value) = incoming.$field {
                    merged.$field = Some(value);
                    sources.insert(stringify!($field), label);
                }
            }
        };
    }
    take!(dsn);
    take!(instance);
    take!(credentials_file);
    take!(host);
    take!(port);
    take!(database);
    take!(user);
    take!(password);
    take!(tls_ca_data);
    take!(tls_verify_hostname);

    for (key, value) in incoming.server_settings {
        merged.server_settings.entry(key).or_insert(value);
    }
}

fn load_instance_credentials(instance: &str) -> Result<PartialConfig, ConfigError> {
    validate::validate_identifier(instance)?;
    let config_dir = project_dirs().ok_or(ConfigError::NoProjectConfig)?;
    let path = config_dir
        .join("credentials")
        .join(format!("{instance}.json"));
    credentials::load_credentials(&path)
}

fn project_dirs() -> Option<PathBuf> {
    ProjectDirs::from("com", "edgedb", "edgedb").map(|dirs| dirs.config_dir().to_path_buf())
}

fn finalize(
    merged: PartialConfig,
    sources: HashMap<&'static str, &'static str>,
) -> Result<ResolvedConfig, ConfigError> {
    let host = merged.host.unwrap_or_else(|| DEFAULT_HOST.to_owned());
    validate::validate_host(&host)?;

    let port = validate::validate_port(merged.port.unwrap_or(DEFAULT_PORT))?;
    let database = merged.database.unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
    let user = merged.user.unwrap_or_else(|| DEFAULT_USER.to_owned());
    validate::validate_identifier(&database)?;
    validate::validate_identifier(&user)?;

    Ok(ResolvedConfig {
        host,
        port,
        database,
        user,
        password: merged.password,
        tls_verify_hostname: merged
            .tls_verify_hostname
            .unwrap_or_else(|| merged.tls_ca_data.is_none()),
        tls_ca_data: merged.tls_ca_data,
        server_settings: merged.server_settings,
        sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_options_take_precedence_over_defaults() {
        let options = ConnectOptions {
            host: Some("explicit-host".into()),
            port: Some(1111),
            ..Default::default()
        };
        let resolved = resolve(&options).unwrap();
        assert_eq!(resolved.host, "explicit-host");
        assert_eq!(resolved.port, 1111);
        assert_eq!(resolved.sources.get("host"), Some(&"explicit"));
    }

    #[test]
    fn errors_when_nothing_supplies_a_connection_target() {
        assert!(matches!(
            resolve(&ConnectOptions::default()),
            Err(ConfigError::NoProjectConfig)
        ));
    }

    #[test]
    fn defaults_fill_gaps_once_a_source_contributes_something() {
        let options = ConnectOptions {
            host: Some("explicit-host".into()),
            ..Default::default()
        };
        let resolved = resolve(&options).unwrap();
        assert_eq!(resolved.host, "explicit-host");
        assert_eq!(resolved.port, DEFAULT_PORT as u16);
        assert_eq!(resolved.user, DEFAULT_USER);
        assert_eq!(resolved.database, DEFAULT_DATABASE);
    }

    #[test]
    fn verify_hostname_defaults_to_false_when_a_custom_ca_is_set() {
        let ca_path = std::env::temp_dir().join("edgetalk_test_ca_verify_hostname.pem");
        std::fs::write(&ca_path, "test ca contents").unwrap();

        let options = ConnectOptions {
            host: Some("h".into()),
            tls_ca_file: Some(ca_path.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let resolved = resolve(&options).unwrap();
        std::fs::remove_file(&ca_path).ok();

        assert!(resolved.tls_ca_data.is_some());
        assert!(!resolved.tls_verify_hostname);
    }

    #[test]
    fn verify_hostname_defaults_to_true_without_a_custom_ca() {
        let options = ConnectOptions {
            host: Some("h".into()),
            ..Default::default()
        };
        let resolved = resolve(&options).unwrap();
        assert!(resolved.tls_verify_hostname);
    }

    #[test]
    fn dsn_and_instance_together_is_an_error() {
        let options = ConnectOptions {
            dsn: Some("edgedb://h".into()),
            instance: Some("myinst".into()),
            ..Default::default()
        };
        assert!(matches!(resolve(&options), Err(ConfigError::CompoundOptions)));
    }

    #[test]
    fn dsn_option_populates_fields() {
        let options = ConnectOptions {
            dsn: Some("edgedb://u@dbhost:1111/mydb".into()),
            ..Default::default()
        };
        let resolved = resolve(&options).unwrap();
        assert_eq!(resolved.host, "dbhost");
        assert_eq!(resolved.port, 1111);
        assert_eq!(resolved.user, "u");
        assert_eq!(resolved.database, "mydb");
    }
}
