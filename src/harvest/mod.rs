//! Comment-chain harvester: turns ranked threads into training sequences.

pub mod filter;
pub mod model;
pub mod source;

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::HarvestConfig;
use crate::store::TrainingSink;

pub use filter::{ReplyFilter, ReplyVerdict};
pub use model::{Comment, Thread, TrainingSequence, flatten};
pub use source::{ContentSource, SourceError};

/// Fires a [`Shutdown`]. Held by whoever listens for Ctrl-C.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Cooperative cancellation flag raced against every pause and request.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn channel() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    /// A flag that can never fire.
    pub fn never() -> Self {
        let (_, shutdown) = Self::channel();
        shutdown
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is set. Pending forever if the trigger is gone.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Counters for one harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub threads_seen: usize,
    pub threads_deleted: usize,
    pub threads_failed: usize,
    pub rate_limited: usize,
    pub sequences_emitted: usize,
    pub sequences_discarded: usize,
    pub sink_failures: usize,
    /// The run stopped early on a shutdown signal.
    pub interrupted: bool,
}

struct Interrupted;

pub struct Harvester<S> {
    source: S,
    config: HarvestConfig,
    filter: ReplyFilter,
}

impl<S: ContentSource> Harvester<S> {
    pub fn new(source: S, config: HarvestConfig) -> Self {
        let filter = ReplyFilter::from_config(&config);
        Self { source, config, filter }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Pull up to `limit` threads for the configured topic and feed every
    /// sequence that survives filtering to `sink`, one at a time.
    ///
    /// Source errors never abort the run. A thread that fails is skipped; a
    /// rate limit pauses everything for the back-off interval first. When
    /// `shutdown` fires the run returns at once and any sequence still being
    /// built is dropped.
    pub async fn run<K: TrainingSink>(&self, sink: &mut K, shutdown: &mut Shutdown) -> HarvestReport {
        let mut report = HarvestReport::default();
        let topic = self.config.topic.as_str();

        info!("🌾 Harvesting up to {} threads from r/{}", self.config.limit, topic);

        let listing = tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                report.interrupted = true;
                return report;
            }
            listing = self.source.list_threads(topic, self.config.limit) => listing,
        };

        let threads = match listing {
            Ok(threads) => threads,
            Err(e) => {
                error!("Failed to list threads for r/{topic}: {e}");
                if let SourceError::RateLimited { retry_after } = e {
                    report.rate_limited += 1;
                    if self.back_off(retry_after, shutdown).await.is_err() {
                        report.interrupted = true;
                    }
                }
                return report;
            }
        };

        for mut thread in threads.into_iter().take(self.config.limit) {
            if shutdown.is_triggered() {
                report.interrupted = true;
                break;
            }
            report.threads_seen += 1;

            debug!("Title: {}", thread.title);
            debug!("Score: {}", thread.score);
            debug!("ID: {}", thread.id);
            if let Some(ref url) = thread.url {
                debug!("URL: {}", url);
            }

            if thread.is_deleted() {
                debug!("Skipping deleted thread {}", thread.id);
                report.threads_deleted += 1;
                continue;
            }
            if let Some(ref author) = thread.author {
                debug!("Author: {}", author);
            }

            let expanded = tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    report.interrupted = true;
                    break;
                }
                expanded = self.source.expand_all_replies(&mut thread) => expanded,
            };

            if let Err(e) = expanded {
                match e {
                    SourceError::RateLimited { retry_after } => {
                        warn!("Exceeding rate limits on thread {}", thread.id);
                        report.rate_limited += 1;
                        if self.back_off(retry_after, shutdown).await.is_err() {
                            report.interrupted = true;
                            break;
                        }
                    }
                    other => {
                        error!("Skipping thread {}: {other}", thread.id);
                        report.threads_failed += 1;
                    }
                }
                continue;
            }

            if self.harvest_thread(&thread, sink, shutdown, &mut report).await.is_err() {
                report.interrupted = true;
                break;
            }
        }

        info!(
            "Harvest finished: {} threads, {} sequences trained, {} discarded{}",
            report.threads_seen,
            report.sequences_emitted,
            report.sequences_discarded,
            if report.interrupted { " (interrupted)" } else { "" }
        );
        report
    }

    async fn harvest_thread<K: TrainingSink>(
        &self,
        thread: &Thread,
        sink: &mut K,
        shutdown: &mut Shutdown,
        report: &mut HarvestReport,
    ) -> Result<(), Interrupted> {
        for comment in flatten(&thread.comments) {
            let Some(sequence) = self.build_sequence(comment, shutdown).await? else {
                report.sequences_discarded += 1;
                continue;
            };

            match sink.train(&sequence) {
                Ok(()) => {
                    info!("Training: {:?}", sequence.statements());
                    report.sequences_emitted += 1;
                }
                Err(e) => {
                    warn!("Failed to train sequence from thread {}: {e}", thread.id);
                    report.sink_failures += 1;
                }
            }
        }
        Ok(())
    }

    /// The comment body plus every direct reply that passes the filter, or
    /// `None` if that comes out shorter than `min_sequence_length`.
    async fn build_sequence(
        &self,
        comment: &Comment,
        shutdown: &mut Shutdown,
    ) -> Result<Option<TrainingSequence>, Interrupted> {
        let mut sequence = TrainingSequence::new(comment.body.clone());

        for reply in &comment.replies {
            pause(self.config.inter_request_delay, shutdown).await?;

            match self.filter.check(&reply.body) {
                ReplyVerdict::Accept(text) => {
                    debug!("Appending reply: {}", text);
                    sequence.push(text);
                }
                ReplyVerdict::TooLong => debug!("Reply is too long"),
                ReplyVerdict::Rejected => debug!("Reply is a rejected marker"),
            }
        }

        if sequence.len() < self.config.min_sequence_length {
            debug!("Skipping: {:?}", sequence.statements());
            return Ok(None);
        }

        debug!("Comment is {} statements long", sequence.len());
        Ok(Some(sequence))
    }

    async fn back_off(&self, retry_after: Option<Duration>, shutdown: &mut Shutdown) -> Result<(), Interrupted> {
        let wait = retry_after.map_or(self.config.rate_limit_backoff, |r| r.max(self.config.rate_limit_backoff));
        warn!("Sleeping for {} seconds", wait.as_secs());
        pause(wait, shutdown).await
    }
}

async fn pause(duration: Duration, shutdown: &mut Shutdown) -> Result<(), Interrupted> {
    tokio::select! {
        biased;
        _ = shutdown.triggered() => Err(Interrupted),
        _ = sleep(duration) => Ok(()),
    }
}
