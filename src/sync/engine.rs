use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::assemble::{AssembledCall, assemble_call};
use crate::models::{CallMetadata, CallTranscript, ExtensiveCall, User, UserDirectory};
use crate::sync::state::StateStore;

/// Source of the three call facets and the user directory.
///
/// `ApiClient` is the real implementation; tests inject fixtures.
#[async_trait]
pub trait CallSource: Send + Sync {
    async fn list_calls(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<CallMetadata>, ApiError>;

    async fn get_calls_extensive(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, ExtensiveCall>, ApiError>;

    async fn get_transcripts(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, CallTranscript>, ApiError>;

    async fn get_users(&self) -> Result<Vec<User>, ApiError>;
}

#[async_trait]
impl CallSource for ApiClient {
    async fn list_calls(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<CallMetadata>, ApiError> {
        ApiClient::list_calls(self, from, to).await
    }

    async fn get_calls_extensive(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, ExtensiveCall>, ApiError> {
        ApiClient::get_calls_extensive(self, ids).await
    }

    async fn get_transcripts(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, CallTranscript>, ApiError> {
        ApiClient::get_transcripts(self, ids).await
    }

    async fn get_users(&self) -> Result<Vec<User>, ApiError> {
        ApiClient::get_users(self).await
    }
}

/// Destination for assembled calls. Acknowledgment (an `Ok` return) is what
/// allows the engine to mark a call synced.
#[async_trait]
pub trait CallWriter: Send + Sync {
    async fn write_call(&self, call: &AssembledCall) -> Result<()>;

    /// Called once after the pass, for destinations that maintain indexes.
    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}

/// Configuration for one sync pass.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Explicit window start; falls back to the persisted timestamp, then
    /// to an unbounded historical window.
    pub from: Option<DateTime<Utc>>,
    /// Window end; defaults to now.
    pub to: Option<DateTime<Utc>>,
    /// Ignore the synced-id skip list (state is still updated afterward).
    pub full_resync: bool,
    /// Ids per fetch batch; must stay within the client's batch limit.
    pub batch_size: usize,
    /// Concurrent in-flight batches.
    pub max_concurrent_batches: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            full_resync: false,
            batch_size: 50,
            max_concurrent_batches: 2,
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Call stubs returned by the listing.
    pub listed: usize,
    /// Stubs skipped because they were already synced.
    pub skipped: usize,
    /// Calls written and acknowledged this pass.
    pub synced: usize,
    /// Calls that failed assembly or writing; they stay unseen.
    pub failed_calls: usize,
    /// Batches whose fetch failed entirely; their ids stay unseen.
    pub failed_batches: usize,
}

impl SyncReport {
    /// A clean pass has delivered everything the window contained.
    pub fn is_clean(&self) -> bool {
        self.failed_calls == 0 && self.failed_batches == 0
    }
}

/// Result of one batch's facet fetches, tagged for in-order processing.
struct BatchFetch {
    index: usize,
    ids: Vec<String>,
    extensive: Result<HashMap<String, ExtensiveCall>, ApiError>,
    transcripts: Result<HashMap<String, CallTranscript>, ApiError>,
}

/// Orchestrates a full pass: window determination, batched fetching,
/// assembly, write handoff, and state persistence.
pub struct SyncEngine<C, W, S> {
    client: Arc<C>,
    writer: W,
    store: S,
    config: SyncConfig,
}

impl<C, W, S> SyncEngine<C, W, S>
where
    C: CallSource + 'static,
    W: CallWriter,
    S: StateStore,
{
    pub fn new(client: Arc<C>, writer: W, store: S, config: SyncConfig) -> Self {
        Self {
            client,
            writer,
            store,
            config,
        }
    }

    /// Run one pass. Only quota exhaustion is fatal; every other failure is
    /// scoped to its batch or call and reflected in the report.
    pub async fn run(&self) -> Result<SyncReport> {
        let mut state = self.store.load();
        let mut report = SyncReport::default();

        let from = self.config.from.or(if self.config.full_resync {
            None
        } else {
            state.last_sync_timestamp
        });
        let to = self.config.to.unwrap_or_else(Utc::now);

        match from {
            Some(from) => info!("Syncing window {} .. {}", from, to),
            None => info!("Syncing full history up to {}", to),
        }

        let stubs = self
            .client
            .list_calls(from, Some(to))
            .await
            .context("Failed to list calls")?;
        report.listed = stubs.len();

        let pending: Vec<String> = stubs
            .into_iter()
            .map(|stub| stub.id)
            .filter(|id| self.config.full_resync || !state.is_synced(id))
            .collect();
        report.skipped = report.listed - pending.len();
        info!(
            "{} calls listed, {} already synced, {} to fetch",
            report.listed,
            report.skipped,
            pending.len()
        );

        let directory = UserDirectory::new(
            self.client
                .get_users()
                .await
                .context("Failed to fetch user directory")?,
        );

        let batches = self.fetch_batches(&pending).await?;

        let mut quota: Option<ApiError> = None;
        for batch in batches {
            match (batch.extensive, batch.transcripts) {
                (Ok(mut extensive), Ok(mut transcripts)) => {
                    for id in &batch.ids {
                        let Some(ext) = extensive.remove(id) else {
                            warn!("Call {id} missing from extensive response; leaving unseen");
                            report.failed_calls += 1;
                            continue;
                        };
                        let assembled = assemble_call(ext, transcripts.remove(id), &directory);
                        if assembled.is_flagged() {
                            for flag in &assembled.flags {
                                warn!("Call {id}: {flag}");
                            }
                        }

                        match self.writer.write_call(&assembled).await {
                            Ok(()) => {
                                state.mark_synced(id);
                                report.synced += 1;
                            }
                            Err(err) => {
                                warn!("Failed to write call {id}: {err:#}");
                                report.failed_calls += 1;
                            }
                        }
                    }
                }
                (extensive, transcripts) => {
                    report.failed_batches += 1;
                    for err in [extensive.err(), transcripts.err()].into_iter().flatten() {
                        if matches!(err, ApiError::QuotaExceeded { .. }) && quota.is_none() {
                            quota = Some(err);
                        } else {
                            warn!("Batch {} fetch failed: {err}", batch.index);
                        }
                    }
                }
            }
        }

        // Advance the window only on a clean pass, so calls that failed this
        // time are listed again next time; the id set keeps the re-covered
        // window cheap.
        if report.is_clean() && quota.is_none() {
            state.last_sync_timestamp = Some(to);
        }
        self.store
            .save(&state)
            .context("Failed to persist sync state")?;

        self.writer.finish().await.context("Writer finish failed")?;

        if let Some(err) = quota {
            warn!(
                "Pass aborted by quota after {} synced calls; partial state persisted",
                report.synced
            );
            return Err(anyhow::Error::new(err).context("Daily request quota exhausted"));
        }

        info!(
            "Pass complete: {} synced, {} skipped, {} failed calls, {} failed batches",
            report.synced, report.skipped, report.failed_calls, report.failed_batches
        );
        Ok(report)
    }

    /// Fan the pending ids out in batches. Workers only fetch; assembly and
    /// state transitions happen on the engine task, in batch order.
    async fn fetch_batches(&self, pending: &[String]) -> Result<Vec<BatchFetch>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_batches.max(1)));
        let mut tasks = JoinSet::new();

        for (index, chunk) in pending.chunks(self.config.batch_size.max(1)).enumerate() {
            let ids = chunk.to_vec();
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let (extensive, transcripts) = tokio::join!(
                    client.get_calls_extensive(&ids),
                    client.get_transcripts(&ids)
                );
                BatchFetch {
                    index,
                    ids,
                    extensive,
                    transcripts,
                }
            });
        }

        let mut batches = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            batches.push(joined.context("Batch fetch task panicked")?);
        }
        batches.sort_by_key(|batch| batch.index);
        Ok(batches)
    }
}
