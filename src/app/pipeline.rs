use tracing::info;

use crate::acquirer::PostSource;
use crate::app::Result;
use crate::dispatch::Dispatcher;
use crate::filter::FilterEngine;
use crate::store::NotifiedLedger;

/// What one cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    /// Set on the first run, when ids are recorded without notifying
    pub first_run: bool,
    pub seeded: usize,
    pub eligible: usize,
    pub sent: usize,
    pub skipped_no_media: usize,
    pub failed: usize,
}

/// One fetch, filter and notify cycle.
///
/// On the first run every fetched id is recorded and nothing is sent.
pub async fn run_once(
    source: &dyn PostSource,
    target: &str,
    limit: usize,
    ledger: &mut NotifiedLedger,
    filter: &FilterEngine,
    dispatcher: &Dispatcher<'_>,
) -> Result<RunSummary> {
    let posts = source.fetch_recent_posts(target, limit).await?;
    let mut summary = RunSummary {
        fetched: posts.len(),
        ..Default::default()
    };
    info!(target, fetched = summary.fetched, "Fetched recent posts");

    if ledger.is_first_run() {
        summary.first_run = true;
        summary.seeded = ledger.seed(posts.iter().map(|p| p.id.clone()))?;
        info!(
            seeded = summary.seeded,
            path = %ledger.path().display(),
            "First run: recorded current posts as notified"
        );
        return Ok(summary);
    }

    let eligible = filter.select(&posts, ledger);
    summary.eligible = eligible.len();
    info!(eligible = summary.eligible, keyword = filter.keyword(), "Filtered posts");

    let report = dispatcher.dispatch(eligible, ledger).await?;
    summary.sent = report.sent.len();
    summary.skipped_no_media = report.skipped_no_media.len();
    summary.failed = report.failed.len();
    info!(
        sent = summary.sent,
        skipped_no_media = summary.skipped_no_media,
        failed = summary.failed,
        "Dispatch finished"
    );

    report.into_result()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::acquirer::testing::StaticSource;
    use crate::dispatch::testing::RecordingSink;
    use crate::dispatch::DispatchConfig;
    use crate::domain::Post;

    fn post(id: &str, text: &str) -> Post {
        let mut post = Post::new(id, "ekusas55000", text);
        post.media_urls = vec![format!("https://pbs.twimg.com/media/{}.jpg", id)];
        post
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_seeds_then_second_run_notifies_once() {
        let dir = TempDir::new().unwrap();
        let ledger_path = dir.path().join("data").join("notified.json");
        let filter = FilterEngine::default();
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(&sink, DispatchConfig::default(), "https://x.com");

        let first = StaticSource::new(vec![
            post("3", "サスケ・ディナー"),
            post("2", "hello"),
            post("1", "サスケ・ディナー"),
        ]);
        let mut ledger = NotifiedLedger::open(&ledger_path).unwrap();
        let summary = run_once(&first, "ekusas55000", 200, &mut ledger, &filter, &dispatcher)
            .await
            .unwrap();
        assert_eq!(summary.seeded, 3);
        assert_eq!(summary.sent, 0);
        assert!(sink.sent_ids().is_empty());

        let second = StaticSource::new(vec![
            post("4", "今夜のサスケ・ディナー"),
            post("3", "サスケ・ディナー"),
            post("2", "hello"),
            post("1", "サスケ・ディナー"),
        ]);
        let mut ledger = NotifiedLedger::open(&ledger_path).unwrap();
        assert!(!ledger.is_first_run());
        let summary = run_once(&second, "ekusas55000", 200, &mut ledger, &filter, &dispatcher)
            .await
            .unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(sink.sent_ids(), vec!["4"]);
        let reloaded = NotifiedLedger::open(&ledger_path).unwrap();
        assert_eq!(reloaded.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_first_run_still_establishes_baseline() {
        let dir = TempDir::new().unwrap();
        let ledger_path = dir.path().join("notified.json");
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(&sink, DispatchConfig::default(), "https://x.com");

        let mut ledger = NotifiedLedger::open(&ledger_path).unwrap();
        run_once(
            &StaticSource::new(Vec::new()),
            "ekusas55000",
            200,
            &mut ledger,
            &FilterEngine::default(),
            &dispatcher,
        )
        .await
        .unwrap();

        assert!(ledger_path.exists());
        assert!(!NotifiedLedger::open(&ledger_path).unwrap().is_first_run());
    }

    #[tokio::test]
    async fn test_nothing_to_notify_is_success() {
        let dir = TempDir::new().unwrap();
        let ledger_path = dir.path().join("notified.json");
        let mut ledger = NotifiedLedger::open(&ledger_path).unwrap();
        ledger.seed(["1"]).unwrap();

        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(&sink, DispatchConfig::default(), "https://x.com");
        let source = StaticSource::new(vec![post("1", "サスケ・ディナー"), post("2", "hello")]);

        let summary = run_once(&source, "ekusas55000", 200, &mut ledger, &FilterEngine::default(), &dispatcher)
            .await
            .unwrap();
        assert_eq!(summary.eligible, 0);
        assert_eq!(summary.sent, 0);
        assert_eq!(source.calls.lock().unwrap()[0], ("ekusas55000".to_string(), 200));
    }
}
