use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::domain::Post;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Collecting,
    Satisfied,
    TimedOut,
}

/// Accumulates intercepted posts until the limit is reached or the wait
/// deadline passes.
#[derive(Debug)]
pub struct Collector {
    limit: usize,
    posts: Vec<Post>,
    seen: HashSet<String>,
    state: CollectorState,
}

impl Collector {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            posts: Vec::new(),
            seen: HashSet::new(),
            state: if limit == 0 {
                CollectorState::Satisfied
            } else {
                CollectorState::Collecting
            },
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state != CollectorState::Collecting
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Record a batch; returns how many posts were new.
    pub fn observe(&mut self, batch: Vec<Post>) -> usize {
        if self.is_done() {
            return 0;
        }
        let mut fresh = 0;
        for post in batch {
            if self.posts.len() >= self.limit {
                break;
            }
            if self.seen.insert(post.id.clone()) {
                self.posts.push(post);
                fresh += 1;
            }
        }
        if self.posts.len() >= self.limit {
            self.state = CollectorState::Satisfied;
        }
        fresh
    }

    pub fn time_out(&mut self) {
        if self.state == CollectorState::Collecting {
            self.state = CollectorState::TimedOut;
        }
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.posts
    }
}

/// Drive a [`Collector`] from a stream of intercepted response bodies.
///
/// The channel is drained every `poll_interval`. Collection ends when the
/// limit is reached, when `wait_timeout` passes without a batch that adds a
/// post, or when every sender is gone. Time-out is not an error.
pub async fn collect<F>(
    rx: &mut UnboundedReceiver<String>,
    limit: usize,
    poll_interval: Duration,
    wait_timeout: Duration,
    mut parse: F,
) -> Vec<Post>
where
    F: FnMut(&str) -> Vec<Post>,
{
    let mut collector = Collector::new(limit);
    let mut poll = time::interval(poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = time::sleep(wait_timeout);
    tokio::pin!(deadline);

    while !collector.is_done() {
        tokio::select! {
            _ = &mut deadline => {
                collector.time_out();
                info!(collected = collector.len(), limit, "Timed out waiting for more posts");
            }
            _ = poll.tick() => {
                let mut fresh = 0;
                let mut closed = false;
                loop {
                    match rx.try_recv() {
                        Ok(body) => fresh += collector.observe(parse(&body)),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            closed = true;
                            break;
                        }
                    }
                }
                if fresh > 0 {
                    debug!(fresh, total = collector.len(), "Observed posts");
                    deadline.as_mut().reset(Instant::now() + wait_timeout);
                }
                if closed {
                    collector.time_out();
                }
            }
        }
    }

    debug!(state = ?collector.state(), "Collection finished");
    collector.into_posts()
}

/// Background tasks aborted when the guard goes out of scope.
#[derive(Default)]
pub struct TaskGuard(Vec<JoinHandle<()>>);

impl TaskGuard {
    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.0.push(handle);
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;

    fn batch(ids: &[&str]) -> Vec<Post> {
        ids.iter().map(|id| Post::new(*id, "a", "t")).collect()
    }

    fn parse_ids(body: &str) -> Vec<Post> {
        batch(&body.split(',').collect::<Vec<_>>())
    }

    #[test]
    fn test_state_transitions() {
        let mut collector = Collector::new(3);
        assert_eq!(collector.state(), CollectorState::Collecting);

        assert_eq!(collector.observe(batch(&["1", "2"])), 2);
        assert_eq!(collector.observe(batch(&["2"])), 0);
        assert_eq!(collector.state(), CollectorState::Collecting);

        assert_eq!(collector.observe(batch(&["3", "4"])), 1);
        assert_eq!(collector.state(), CollectorState::Satisfied);

        collector.time_out();
        assert_eq!(collector.state(), CollectorState::Satisfied);
        assert_eq!(collector.into_posts().len(), 3);
    }

    #[test]
    fn test_zero_limit_is_immediately_satisfied() {
        assert!(Collector::new(0).is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_error() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<String>();
        let start = Instant::now();

        let posts = collect(
            &mut rx,
            5,
            Duration::from_secs(1),
            Duration::from_secs(10),
            parse_ids,
        )
        .await;

        assert!(posts.is_empty());
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_limit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("1,2".to_string()).unwrap();
        tx.send("3,4".to_string()).unwrap();

        let posts = collect(
            &mut rx,
            3,
            Duration::from_secs(1),
            Duration::from_secs(10),
            parse_ids,
        )
        .await;

        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_posts_extend_the_deadline() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            for (delay_ms, body) in [(7_500, "1"), (8_000, "2"), (8_000, "2")] {
                time::sleep(Duration::from_millis(delay_ms)).await;
                let _ = tx.send(body.to_string());
            }
            time::sleep(Duration::from_secs(60)).await;
        });
        let start = Instant::now();

        let posts = collect(
            &mut rx,
            10,
            Duration::from_secs(1),
            Duration::from_secs(10),
            parse_ids,
        )
        .await;

        assert_eq!(posts.len(), 2);
        // Last new post polled at 16s; the duplicate at 24s does not extend.
        assert_eq!(start.elapsed(), Duration::from_secs(26));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_ends_collection() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("1".to_string()).unwrap();
        drop(tx);

        let posts = collect(
            &mut rx,
            10,
            Duration::from_secs(1),
            Duration::from_secs(10),
            parse_ids,
        )
        .await;
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn test_guard_aborts_tasks() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let handle = tokio::spawn(async move {
            time::sleep(Duration::from_secs(3600)).await;
            flag.store(true, Ordering::SeqCst);
        });
        let mut guard = TaskGuard::default();
        guard.push(handle);
        drop(guard);

        tokio::task::yield_now().await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
