//! Process wiring for the replication control-plane coordinator: load configuration,
//! construct the store/probe/proxy-admin backends, and run the Reconciler until shutdown.
use std::time::Duration;

use anyhow::Result;

use mha_config::Conf;
use mha_context::Context;
use mha_proxyadmin::ProxyAdmin;
use mha_proxyadmin::SqlProxyAdmin;
use mha_reconciler::Reconciler;
use mha_reconciler::ReconcilerSettings;
use mha_store::EtcdStore;
use mha_store::Store;
use mha_topology::TopologyRepository;

pub mod logging;

/// Connect to the consensus store using the loaded configuration.
pub async fn connect_store(conf: &Conf) -> Result<Store> {
    let backend = EtcdStore::connect(
        &conf.store.endpoints,
        &conf.store.user,
        &conf.store.password,
        &conf.store.namespace,
    )
    .await?;
    Ok(Store::from(backend))
}

/// Build the proxy admin facade from the loaded configuration.
pub fn build_proxy_admin(conf: &Conf) -> ProxyAdmin {
    let backend = SqlProxyAdmin::new(
        conf.proxy.admin_host.clone(),
        conf.proxy.admin_port,
        conf.proxy.admin_user.clone(),
        conf.proxy.admin_password.clone(),
        conf.proxy.writer_hostgroup,
        conf.proxy.reader_hostgroup,
    );
    ProxyAdmin::from(backend)
}

/// Build the node probe facade from the loaded configuration.
pub fn build_probe(conf: &Conf) -> mha_probe::Probe {
    let backend = mha_probe::MysqlProbe::new(
        conf.probe.username.clone(),
        conf.probe.password.clone(),
        conf.probe.timeout,
    );
    mha_probe::Probe::from(backend)
}

/// Assemble a [`Reconciler`] ready to run, given its three backend facades.
///
/// Registers the reconciler's tick/probe/promotion counters against the process-wide
/// default [`prometheus::Registry`]; serving that registry over HTTP is left to the
/// excluded container-supervision layer.
pub fn build_reconciler(
    conf: &Conf,
    store: Store,
    probe: mha_probe::Probe,
    proxy: ProxyAdmin,
) -> Reconciler {
    let _ = mha_reconciler::metrics::register_metrics(prometheus::default_registry());
    let topology = TopologyRepository::new(store);
    let settings = ReconcilerSettings {
        check_interval: conf.reconciler.check_interval,
        promotion_grace_period: conf.reconciler.promotion_grace_period,
        max_age: conf.reconciler.max_age,
        probe_timeout: conf.probe.timeout,
        lag_threshold: conf.probe.lag_threshold,
        pool_size: conf.probe.pool_size,
        writer_hostgroup: conf.proxy.writer_hostgroup,
        reader_hostgroup: conf.proxy.reader_hostgroup,
    };
    Reconciler::new(topology, probe, proxy, settings)
}

/// Resolve once `proxy.initialize()` has succeeded, retrying a fixed number of times with a
/// short delay between attempts. Exhausting the retry budget is an unrecoverable startup
/// error: the process exits non-zero rather than run with an unconfigured proxy.
pub async fn initialize_proxy_with_retries(context: &Context, proxy: &ProxyAdmin) -> Result<()> {
    const ATTEMPTS: u32 = 5;
    const DELAY: Duration = Duration::from_secs(2);

    let mut last_error = None;
    for attempt in 1..=ATTEMPTS {
        match proxy.initialize(context).await {
            Ok(()) => return Ok(()),
            Err(error) => {
                slog::warn!(
                    context.logger, "Failed to initialize proxy admin interface, retrying";
                    "attempt" => attempt, "error" => %error,
                );
                last_error = Some(error);
                tokio::time::sleep(DELAY).await;
            }
        }
    }
    Err(last_error.unwrap())
}
