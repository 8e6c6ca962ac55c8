use chrono::{Local, Utc};

use crate::app::{AppContext, Result, RunSummary};
use crate::daemon::{self, WatchConfig};
use crate::store::NotifiedLedger;

pub async fn run(ctx: &AppContext) -> Result<()> {
    let summary = ctx.run_cycle().await?;
    print_summary(&summary);
    Ok(())
}

pub async fn watch(ctx: &AppContext, config: &WatchConfig) -> Result<()> {
    println!(
        "Watching every {} (Ctrl-C to stop)",
        WatchConfig::format_interval(config.interval_secs)
    );
    let cycles = daemon::watch(config, daemon::shutdown_signal(), || ctx.run_cycle()).await;
    println!("Stopped after {} cycle(s)", cycles);
    Ok(())
}

pub async fn login(ctx: &AppContext) -> Result<()> {
    let credentials = ctx.config.twitter.credentials();
    let session = ctx.authenticator().refresh(&credentials).await?;
    println!(
        "Logged in as {}; session saved to {} at {}",
        credentials.identifier,
        ctx.session_store.path().display(),
        session.saved_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

pub fn status(ctx: &AppContext) -> Result<()> {
    for line in status_report(ctx)? {
        println!("{}", line);
    }
    Ok(())
}

/// Human-readable description of the persisted state.
pub fn status_report(ctx: &AppContext) -> Result<Vec<String>> {
    let mut lines = Vec::new();

    let store = &ctx.session_store;
    match store.inspect() {
        Ok(session) => {
            let age = session.age(Utc::now());
            let remaining = store.expiry() - age;
            lines.push(format!(
                "Session:  valid ({}h old, {}h left) in {}",
                age.num_hours(),
                remaining.num_hours(),
                store.path().display()
            ));
        }
        Err(miss) => lines.push(format!("Session:  {}", miss)),
    }

    let ledger = NotifiedLedger::open(&ctx.config.paths.notified)?;
    if ledger.is_first_run() {
        lines.push(format!(
            "Ledger:   not created yet at {} (next run records a baseline)",
            ledger.path().display()
        ));
    } else {
        lines.push(format!(
            "Ledger:   {} notified post(s) in {}",
            ledger.len(),
            ledger.path().display()
        ));
    }

    let acquisition = &ctx.config.acquisition;
    lines.push(format!(
        "Target:   @{} (latest {} posts via {})",
        acquisition.target, acquisition.limit, acquisition.strategy
    ));
    lines.push(format!("Keyword:  {}", ctx.config.filter.keyword));

    Ok(lines)
}

fn print_summary(summary: &RunSummary) {
    if summary.first_run {
        println!(
            "First run: recorded {} existing post(s); nothing was sent",
            summary.seeded
        );
        return;
    }

    println!("Fetched {} post(s), {} new match(es)", summary.fetched, summary.eligible);
    if summary.sent > 0 {
        println!("Sent {} notification(s)", summary.sent);
    }
    if summary.skipped_no_media > 0 {
        println!("Skipped {} post(s) without images", summary.skipped_no_media);
    }
    if summary.failed > 0 {
        println!("Failed to send {} notification(s)", summary.failed);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::config::Config;
    use crate::domain::Session;
    use crate::fetcher::testing::ScriptedFetcher;

    fn context(dir: &TempDir) -> AppContext {
        let mut config = Config::default();
        config.paths.notified = dir.path().join("notified.json");
        config.paths.cookie_cache = dir.path().join("twitter-cookies.json");
        AppContext::with_fetcher(config, Arc::new(ScriptedFetcher::default()))
    }

    #[test]
    fn test_status_before_first_run() {
        let dir = TempDir::new().unwrap();
        let lines = status_report(&context(&dir)).unwrap();

        assert!(lines[0].starts_with("Session:  no session cache"));
        assert!(lines[1].contains("not created yet"));
        assert!(lines[2].contains("@ekusas55000"));
        assert!(lines[2].contains("via api"));
    }

    #[test]
    fn test_status_with_session_and_ledger() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        ctx.session_store.save(&Session::new("tok", "csrf")).unwrap();
        NotifiedLedger::open(&ctx.config.paths.notified)
            .unwrap()
            .seed(["1", "2"])
            .unwrap();

        let lines = status_report(&ctx).unwrap();
        assert!(lines[0].starts_with("Session:  valid (0h old"));
        assert!(lines[1].starts_with("Ledger:   2 notified post(s)"));
    }
}
