//! Process-wide logger construction.
use std::io::stdout;
use std::str::FromStr;
use std::sync::Mutex;

use slog::Drain;
use slog::IgnoreResult;
use slog::Level;
use slog::Logger;
use slog::Never;
use slog::SendSyncRefUnwindSafeDrain;
use slog::SendSyncUnwindSafeDrain;

/// Alternative implementation of slog's `LevelFilter` with `Ok == ()`, so it can sit under an
/// [`slog_async::Async`] drain: the stock `LevelFilter` wraps `D::Ok` in an `Option`, which
/// breaks that combination.
#[derive(Debug, Clone)]
struct LevelFilter<D: Drain>(D, Level);

impl<D: Drain> Drain for LevelFilter<D> {
    type Ok = ();
    type Err = D::Err;

    fn log(&self, record: &slog::Record, values: &slog::OwnedKVList) -> Result<Self::Ok, Self::Err> {
        if record.level().is_at_least(self.1) {
            self.0.log(record, values)?;
        }
        Ok(())
    }
}

fn into_logger<D>(drain: D) -> Logger
where
    D: SendSyncUnwindSafeDrain<Ok = (), Err = Never>,
    D: 'static + SendSyncRefUnwindSafeDrain<Ok = (), Err = Never>,
{
    Logger::root(drain, slog::o!())
}

/// Build the process logger: a JSON drain over stdout, flushed asynchronously, filtered to
/// `level`.
///
/// `level` is read from `MHA_LOG_LEVEL` by [`level_from_env`]; unrecognised values fall back
/// to `info`.
pub fn configure(level: Level) -> Logger {
    let json = Mutex::new(slog_json::Json::default(stdout())).map(IgnoreResult::new);
    let filtered = LevelFilter(json, level);
    let async_drain = slog_async::Async::new(filtered).build().ignore_res();
    into_logger(async_drain)
}

/// A synchronous logger usable before configuration has loaded (e.g. to report a
/// `mha_config::load` failure before the real logger exists).
pub fn starter() -> Logger {
    let json = Mutex::new(slog_json::Json::default(stdout())).map(IgnoreResult::new);
    into_logger(json)
}

/// Parse the `MHA_LOG_LEVEL` environment variable into a [`slog::Level`], defaulting to info.
pub fn level_from_env() -> Level {
    std::env::var("MHA_LOG_LEVEL")
        .ok()
        .and_then(|value| Level::from_str(&value).ok())
        .unwrap_or(Level::Info)
}
