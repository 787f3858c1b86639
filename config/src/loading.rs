//! Load process configuration from environment variables.
use std::time::Duration;

use mha_errors::ConfigInvalid;

use crate::object::Conf;
use crate::object::ProbeConf;
use crate::object::ProxyConf;
use crate::object::ReconcilerConf;
use crate::object::StoreConf;

/// Load and validate the coordinator configuration from the process environment.
pub fn load() -> Result<Conf, ConfigInvalid> {
    let (store_user, store_password) = required_user(&required("ETCDCTL_USER")?, "ETCDCTL_USER")?;
    let store = StoreConf {
        endpoints: required_list("ETCDCTL_ENDPOINTS")?,
        user: store_user,
        password: store_password,
        namespace: optional_string("MHA_NAMESPACE", ""),
    };
    let probe = ProbeConf {
        username: required("MYSQL_REPL_USERNAME")?,
        password: required("MYSQL_REPL_PASSWORD")?,
        timeout: Duration::from_millis(optional_u64("PROBE_TIMEOUT_MS", 3_000)?),
        lag_threshold: Duration::from_secs(optional_u64("REPLICATION_LAG_THRESHOLD", 300)?),
        pool_size: optional_u64("PROBE_POOL_SIZE", 16)? as usize,
    };
    let proxy = ProxyConf {
        admin_host: optional_string("PROXYSQL_ADMIN_HOST", "127.0.0.1"),
        admin_port: optional_u64("PROXYSQL_ADMIN_PORT", 6032)? as u16,
        admin_user: required("PROXYSQL_ADMIN_USER")?,
        admin_password: required("PROXYSQL_ADMIN_PASSWORD")?,
        writer_hostgroup: optional_u64("WRITER_HOSTGROUP", 10)? as u16,
        reader_hostgroup: optional_u64("READER_HOSTGROUP", 20)? as u16,
    };
    let reconciler = ReconcilerConf {
        check_interval: Duration::from_secs(optional_u64("CHECK_INTERVAL", 5)?),
        promotion_grace_period: Duration::from_secs(optional_u64("PROMOTION_GRACE_PERIOD", 30)?),
        max_age: Duration::from_secs(optional_u64("MAX_AGE", 300)?),
    };
    Ok(Conf {
        store,
        probe,
        proxy,
        reconciler,
    })
}

/// Fetch a required environment variable, failing with `ConfigInvalid` if absent or empty.
fn required(name: &str) -> Result<String, ConfigInvalid> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => Err(ConfigInvalid::new(format!(
            "environment variable '{}' is set but empty",
            name
        ))),
        Err(std::env::VarError::NotPresent) => Err(ConfigInvalid::new(format!(
            "required environment variable '{}' is not set",
            name
        ))),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigInvalid::new(format!(
            "environment variable '{}' is not valid UTF-8",
            name
        ))),
    }
}

/// Fetch a comma-separated required environment variable as a list.
fn required_list(name: &str) -> Result<Vec<String>, ConfigInvalid> {
    let raw = required(name)?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if items.is_empty() {
        return Err(ConfigInvalid::new(format!(
            "environment variable '{}' did not contain any endpoints",
            name
        )));
    }
    Ok(items)
}

/// Split a `user:pass` credential string, as used for `ETCDCTL_USER`.
fn required_user(value: &str, name: &str) -> Result<(String, String), ConfigInvalid> {
    match value.split_once(':') {
        Some((user, pass)) if !user.is_empty() => Ok((user.to_string(), pass.to_string())),
        _ => Err(ConfigInvalid::new(format!(
            "environment variable '{}' must be in the form 'user:pass'",
            name
        ))),
    }
}

fn optional_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_u64(name: &str, default: u64) -> Result<u64, ConfigInvalid> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => value.parse::<u64>().map_err(|_| {
            ConfigInvalid::new(format!(
                "environment variable '{}' must be a non-negative integer, got '{}'",
                name, value
            ))
        }),
    }
}
