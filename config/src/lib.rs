//! Coordinator process configuration object and loader.
mod loading;
mod object;

pub use self::loading::load;
pub use self::object::Conf;
pub use self::object::ProbeConf;
pub use self::object::ProxyConf;
pub use self::object::ReconcilerConf;
pub use self::object::StoreConf;

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    // Environment variables are process-global: serialise tests that mutate them.
    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const REQUIRED: &[(&str, &str)] = &[
        ("ETCDCTL_ENDPOINTS", "http://etcd-0:2379,http://etcd-1:2379"),
        ("ETCDCTL_USER", "coordinator:s3cr3t"),
        ("MYSQL_REPL_USERNAME", "repl"),
        ("MYSQL_REPL_PASSWORD", "repl-pass"),
        ("PROXYSQL_ADMIN_USER", "admin"),
        ("PROXYSQL_ADMIN_PASSWORD", "admin-pass"),
    ];

    fn with_required_env<F: FnOnce()>(extra: &[(&str, &str)], run: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        for (name, _) in REQUIRED.iter().chain(extra.iter()) {
            std::env::remove_var(name);
        }
        for (name, value) in REQUIRED.iter().chain(extra.iter()) {
            std::env::set_var(name, value);
        }
        run();
        for (name, _) in REQUIRED.iter().chain(extra.iter()) {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn loads_defaults_when_optional_vars_are_absent() {
        with_required_env(&[], || {
            let conf = super::load().expect("config should load");
            assert_eq!(conf.reconciler.check_interval.as_secs(), 5);
            assert_eq!(conf.reconciler.promotion_grace_period.as_secs(), 30);
            assert_eq!(conf.reconciler.max_age.as_secs(), 300);
            assert_eq!(conf.proxy.writer_hostgroup, 10);
            assert_eq!(conf.proxy.reader_hostgroup, 20);
            assert_eq!(conf.proxy.admin_host, "127.0.0.1");
            assert_eq!(conf.proxy.admin_port, 6032);
            assert_eq!(conf.store.endpoints.len(), 2);
            assert_eq!(conf.store.user, "coordinator");
            assert_eq!(conf.store.password, "s3cr3t");
        });
    }

    #[test]
    fn overrides_are_applied() {
        with_required_env(&[("CHECK_INTERVAL", "2"), ("WRITER_HOSTGROUP", "30")], || {
            let conf = super::load().expect("config should load");
            assert_eq!(conf.reconciler.check_interval.as_secs(), 2);
            assert_eq!(conf.proxy.writer_hostgroup, 30);
        });
    }

    #[test]
    fn missing_required_var_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        for (name, _) in REQUIRED.iter() {
            std::env::remove_var(name);
        }
        let result = super::load();
        assert!(result.is_err());
    }

    #[test]
    fn malformed_user_credential_is_rejected() {
        with_required_env(&[("ETCDCTL_USER", "no-colon-here")], || {
            let result = super::load();
            assert!(result.is_err());
        });
    }

    #[test]
    fn non_numeric_override_is_rejected() {
        with_required_env(&[("CHECK_INTERVAL", "soon")], || {
            let result = super::load();
            assert!(result.is_err());
        });
    }
}
