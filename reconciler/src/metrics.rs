//! Reconciler telemetry: tick counts, tick duration, probe outcomes, promotions and CAS
//! conflicts, scraped by whatever exporter the supervising process wires up. Registering an
//! HTTP surface for this registry is out of scope here (the spec excludes it).
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::Counter;
use prometheus::Histogram;
use prometheus::HistogramOpts;

/// Total number of ticks completed, successfully or abandoned.
pub static TICK_COUNT: Lazy<Counter> = Lazy::new(|| {
    Counter::new("mha_reconciler_tick_count", "Total number of reconciliation ticks run")
        .expect("failed to initialise TICK_COUNT counter")
});

/// Number of ticks abandoned due to a recoverable error.
pub static TICK_ABANDONED: Lazy<Counter> = Lazy::new(|| {
    Counter::new(
        "mha_reconciler_tick_abandoned",
        "Number of reconciliation ticks abandoned after a recoverable error",
    )
    .expect("failed to initialise TICK_ABANDONED counter")
});

/// Wall-clock duration of each tick.
pub static TICK_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "mha_reconciler_tick_duration_seconds",
        "Wall-clock duration of a reconciliation tick",
    ))
    .expect("failed to initialise TICK_DURATION histogram")
});

/// Number of node probes that classified a node as failed.
pub static PROBE_FAILED: Lazy<Counter> = Lazy::new(|| {
    Counter::new("mha_reconciler_probe_failed", "Number of node probes classified as failed")
        .expect("failed to initialise PROBE_FAILED counter")
});

/// Number of successful master promotions.
pub static PROMOTIONS: Lazy<Counter> = Lazy::new(|| {
    Counter::new("mha_reconciler_promotions", "Number of successful master promotions")
        .expect("failed to initialise PROMOTIONS counter")
});

/// Number of promotion attempts that lost the `SetMasterCAS` race.
pub static CAS_CONFLICTS: Lazy<Counter> = Lazy::new(|| {
    Counter::new(
        "mha_reconciler_cas_conflicts",
        "Number of SetMasterCAS attempts that lost the compare-and-swap race",
    )
    .expect("failed to initialise CAS_CONFLICTS counter")
});

static METRICS_REGISTERED: AtomicBool = AtomicBool::new(false);

/// The first call registers the reconciler's collectors with `reg`; later calls are no-ops,
/// so construction can run every time a [`crate::Reconciler`] is built without double
/// registering against a shared process-wide registry.
pub fn register_metrics(reg: &prometheus::Registry) -> Result<()> {
    if METRICS_REGISTERED.swap(true, Ordering::AcqRel) {
        return Ok(());
    }

    let collectors: [Box<dyn prometheus::core::Collector>; 6] = [
        Box::new(TICK_COUNT.clone()),
        Box::new(TICK_ABANDONED.clone()),
        Box::new(TICK_DURATION.clone()),
        Box::new(PROBE_FAILED.clone()),
        Box::new(PROMOTIONS.clone()),
        Box::new(CAS_CONFLICTS.clone()),
    ];
    for collector in collectors {
        reg.register(collector)?;
    }
    Ok(())
}
