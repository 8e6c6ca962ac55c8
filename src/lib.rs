//! # dinner-notifier
//!
//! Watches one X account and announces each new post that mentions the
//! dinner keyword in a Discord channel, exactly once.
//!
//! ## Architecture
//!
//! One cycle is a linear pipeline:
//!
//! ```text
//! Session → Acquirer → Filter → Dispatcher → Ledger
//! ```
//!
//! - [`auth`]: cached session cookies, or a fresh login with retry
//! - [`acquirer`]: recent posts through the timeline API or headless Chrome
//! - [`filter`]: keyword match, reposts excluded, unseen ids only
//! - [`dispatch`]: oldest-first Discord embeds, paced
//! - [`store`]: the notified-id ledger and session cache on disk
//!
//! ## Quick Start
//!
//! ```bash
//! # Write ./data/config.toml, then fill in credentials
//! dinner-notifier init
//!
//! # One cycle (the first only records a baseline)
//! dinner-notifier run
//!
//! # Every ten minutes until interrupted
//! dinner-notifier watch --interval 10m
//! ```

/// Fetching the watched account's posts.
///
/// - [`PostSource`](acquirer::PostSource): async trait both strategies implement
/// - [`TimelineApi`](acquirer::TimelineApi): GraphQL timeline requests
/// - [`BrowserTimeline`](acquirer::BrowserTimeline): intercepts timeline
///   responses in headless Chrome
pub mod acquirer;

/// Application context, the run pipeline and error types.
pub mod app;

/// Session acquisition: cache lookup, login flow, retry policy.
pub mod auth;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `./data/config.toml` with environment overrides.
pub mod config;

/// Repeating cycles for `dinner-notifier watch`.
pub mod daemon;

/// Notification delivery.
pub mod dispatch;

/// Core domain models: [`Post`](domain::Post), [`Session`](domain::Session).
pub mod domain;

/// HTTP transport shared by login, acquisition and delivery.
pub mod fetcher;

/// Selection of posts worth announcing: keyword match, reposts excluded,
/// ids not yet in the ledger.
pub mod filter;

/// Tracing subscriber setup.
pub mod logging;

/// File persistence: notified-id ledger and session cache.
pub mod store;
