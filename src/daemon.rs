//! Repeating notification cycles on a fixed interval.
//!
//! `dinner-notifier watch` keeps one process alive and runs a cycle every
//! interval, as an alternative to an external scheduler invoking `run`.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::app::{Result, RunSummary};

/// Watch loop configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Interval between cycles in seconds (default: 600 = 10 minutes)
    pub interval_secs: u64,
    /// Whether to run a cycle immediately on start
    pub run_on_start: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            run_on_start: true,
        }
    }
}

impl WatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Parse interval string like "30s", "10m", "1h", "1d" or raw seconds
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        let (digits, unit, multiplier) = if let Some(hours) = s.strip_suffix('h') {
            (hours, "hours", 3600)
        } else if let Some(minutes) = s.strip_suffix('m') {
            (minutes, "minutes", 60)
        } else if let Some(days) = s.strip_suffix('d') {
            (days, "days", 86400)
        } else if let Some(secs) = s.strip_suffix('s') {
            (secs, "seconds", 1)
        } else {
            return s
                .parse::<u64>()
                .map_err(|_| format!("Invalid interval: {}. Use format like '30s', '10m', '1h'", s))
                .and_then(|secs| match secs {
                    0 => Err("Interval must be greater than zero".to_string()),
                    secs => Ok(secs),
                });
        };

        let secs = digits
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(multiplier))
            .ok_or_else(|| format!("Invalid {}: {}", unit, digits))?;

        if secs == 0 {
            return Err("Interval must be greater than zero".to_string());
        }
        Ok(secs)
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Run `cycle` every interval until `shutdown` resolves.
///
/// A failed cycle is logged and the loop continues. A cycle in progress when
/// `shutdown` resolves is allowed to finish. Returns the number of cycles run.
pub async fn watch<F, Fut, S>(config: &WatchConfig, shutdown: S, mut cycle: F) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RunSummary>>,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    info!(
        interval = %WatchConfig::format_interval(config.interval_secs),
        pid = std::process::id(),
        "Watch started"
    );

    let mut timer = interval(config.interval());
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !config.run_on_start {
        // The first tick completes immediately.
        timer.tick().await;
    }

    let mut cycles = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = timer.tick() => {}
        }

        cycles += 1;
        info!(cycle = cycles, "Running scheduled cycle");
        match cycle().await {
            Ok(summary) if summary.first_run => {
                info!(seeded = summary.seeded, "Baseline recorded");
            }
            Ok(summary) => {
                info!(
                    fetched = summary.fetched,
                    eligible = summary.eligible,
                    sent = summary.sent,
                    "Cycle complete"
                );
            }
            Err(e) => {
                error!(error = %e, "Cycle failed; retrying at next interval");
            }
        }
    }

    info!(cycles, "Watch shutting down");
    cycles
}

/// Resolves on SIGTERM or SIGINT (Ctrl-C elsewhere).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to install signal handlers; falling back to Ctrl-C");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tokio::time::{sleep, Instant};

    use super::*;
    use crate::app::NotifierError;

    #[test]
    fn test_parse_interval() {
        assert_eq!(WatchConfig::parse_interval("1h").unwrap(), 3600);
        assert_eq!(WatchConfig::parse_interval("10m").unwrap(), 600);
        assert_eq!(WatchConfig::parse_interval("1d").unwrap(), 86400);
        assert_eq!(WatchConfig::parse_interval("30s").unwrap(), 30);
        assert_eq!(WatchConfig::parse_interval("3600").unwrap(), 3600);
        assert!(WatchConfig::parse_interval("invalid").is_err());
        assert!(WatchConfig::parse_interval("0m").is_err());
        assert!(WatchConfig::parse_interval("0").is_err());
    }

    #[test]
    fn test_parse_interval_rejects_overflow() {
        let huge = format!("{}d", u64::MAX / 86400 + 1);
        assert_eq!(
            WatchConfig::parse_interval(&huge),
            Err(format!("Invalid days: {}", u64::MAX / 86400 + 1))
        );
        assert!(WatchConfig::parse_interval(&format!("{}h", u64::MAX)).is_err());
        assert_eq!(
            WatchConfig::parse_interval(&format!("{}d", u64::MAX / 86400)),
            Ok(u64::MAX / 86400 * 86400)
        );
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(WatchConfig::format_interval(3600), "1h");
        assert_eq!(WatchConfig::format_interval(600), "10m");
        assert_eq!(WatchConfig::format_interval(86400), "1d");
        assert_eq!(WatchConfig::format_interval(90), "90s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_interval_until_shutdown() {
        let config = WatchConfig {
            interval_secs: 10,
            run_on_start: true,
        };
        let calls = Cell::new(0);
        let start = Instant::now();

        let cycles = watch(&config, sleep(Duration::from_secs(35)), || {
            calls.set(calls.get() + 1);
            async { Ok(RunSummary::default()) }
        })
        .await;

        // t = 0, 10, 20, 30
        assert_eq!(cycles, 4);
        assert_eq!(calls.get(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(35));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_does_not_stop_the_loop() {
        let config = WatchConfig {
            interval_secs: 10,
            run_on_start: false,
        };
        let calls = Cell::new(0);

        let cycles = watch(&config, sleep(Duration::from_secs(25)), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n == 1 {
                    Err(NotifierError::Delivery("boom".into()))
                } else {
                    Ok(RunSummary::default())
                }
            }
        })
        .await;

        // t = 10 (fails), 20
        assert_eq!(cycles, 2);
    }
}
