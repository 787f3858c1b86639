use std::process::ExitCode;

use mha_context::Context;

use mha_coordinator::build_probe;
use mha_coordinator::build_proxy_admin;
use mha_coordinator::build_reconciler;
use mha_coordinator::connect_store;
use mha_coordinator::initialize_proxy_with_retries;
use mha_coordinator::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let level = logging::level_from_env();
    let logger = logging::configure(level);
    let context = Context::root(logger.clone()).build();

    let conf = match mha_config::load() {
        Ok(conf) => conf,
        Err(error) => {
            slog::crit!(logger, "Invalid configuration"; "error" => %error);
            return ExitCode::FAILURE;
        }
    };

    let store = match connect_store(&conf).await {
        Ok(store) => store,
        Err(error) => {
            slog::crit!(logger, "Failed to connect to the consensus store"; "error" => %error);
            return ExitCode::FAILURE;
        }
    };

    let probe = build_probe(&conf);
    let proxy = build_proxy_admin(&conf);
    if let Err(error) = initialize_proxy_with_retries(&context, &proxy).await {
        slog::crit!(logger, "Proxy admin interface unreachable after initial retries"; "error" => %error);
        return ExitCode::FAILURE;
    }

    let mut reconciler = build_reconciler(&conf, store, probe, proxy);
    let shutdown = Box::pin(shutdown_signal());
    match reconciler.run(&context, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            slog::crit!(logger, "Reconciler loop exited with an error"; "error" => %error);
            ExitCode::FAILURE
        }
    }
}

/// Resolve on SIGTERM or SIGINT (Ctrl-C), whichever comes first.
async fn shutdown_signal() {
    let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = terminate.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}
