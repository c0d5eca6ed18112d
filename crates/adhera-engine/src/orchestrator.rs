//! Runs a whole table of classification requests under one concurrency
//! ceiling, with caching, retries, and cooperative cancellation.
//!
//! The batch is fault-isolated: one cell's failure marks that cell and
//! nothing else. Results are written back in request order, so the output
//! table is deterministic regardless of completion order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use adhera_core::{
    table::TableError, CacheKey, CellRef, ClassificationRequest, ColumnTarget, EngineConfig,
    Label, RetryPolicy, Table, FAILED_SENTINEL,
};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};

use crate::cache::VerdictCache;
use crate::decision::DecisionEngine;
use crate::error::EngineError;

enum CellOutcome {
    Labelled(Label),
    Failed,
    Cancelled,
    Skipped,
}

/// What happened to a batch, cell by cell.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub labelled_yes: usize,
    pub labelled_no: usize,
    pub skipped: usize,
    pub failed: Vec<CellRef>,
    /// Verdicts answered from the cache, including coalesced duplicates.
    pub cache_hits: usize,
    /// Verdicts that required a fresh reasoning call.
    pub computed: usize,
    pub cancelled: bool,
}

/// Requests cancellation of a running batch. In-flight cells drain; cells
/// that have not started fail with the cancellation marker.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

pub struct BatchOrchestrator {
    engine: DecisionEngine,
    cache: VerdictCache,
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl BatchOrchestrator {
    pub fn new(engine: DecisionEngine, cache: VerdictCache, config: &EngineConfig) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            engine,
            cache,
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            retry: RetryPolicy::new(config.max_attempts, config.backoff_base_ms),
            cancel_tx: Arc::new(cancel_tx),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    async fn wait_cancel(&self) {
        let mut rx = self.cancel_tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Classify every target cell and rewrite it in place.
    ///
    /// Unknown target columns abort before any external call. Empty cells are
    /// skipped untouched. A cell that still fails after retries is rewritten
    /// with [`FAILED_SENTINEL`], never a guessed label.
    pub async fn run(
        &self,
        table: &mut Table,
        targets: &[ColumnTarget],
    ) -> Result<BatchReport, EngineError> {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        for target in targets {
            if table.column_index(&target.column).is_none() {
                return Err(TableError::UnknownColumn(target.column.clone()).into());
            }
        }

        let mut cells: Vec<(CellRef, Option<ClassificationRequest>)> = Vec::new();
        for target in targets {
            for row in 0..table.num_rows() {
                let text = table.cell(row, &target.column).unwrap_or_default();
                let request = if text.trim().is_empty() {
                    None
                } else {
                    Some(ClassificationRequest {
                        row,
                        column: target.column.clone(),
                        role: target.role.clone(),
                        text: text.to_string(),
                    })
                };
                cells.push((
                    CellRef {
                        row,
                        column: target.column.clone(),
                    },
                    request,
                ));
            }
        }

        let computed = AtomicUsize::new(0);
        let outcomes = futures::future::join_all(cells.iter().map(|(cell, request)| {
            let computed = &computed;
            async move {
                let Some(request) = request else {
                    return CellOutcome::Skipped;
                };
                if self.is_cancelled() {
                    return CellOutcome::Cancelled;
                }

                let _permit = tokio::select! {
                    permit = self.semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return CellOutcome::Cancelled,
                    },
                    _ = self.wait_cancel() => return CellOutcome::Cancelled,
                };
                if self.is_cancelled() {
                    return CellOutcome::Cancelled;
                }

                let key = CacheKey::new(&request.role, &request.text);
                let result = self
                    .cache
                    .get_or_try_compute(&key, || async {
                        let verdict = self
                            .retry
                            .run(EngineError::is_transient, || self.engine.classify(request))
                            .await?;
                        computed.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, EngineError>(verdict)
                    })
                    .await;

                match result {
                    Ok(verdict) => CellOutcome::Labelled(verdict.label),
                    Err(error) => {
                        warn!(cell = %cell, %error, "cell classification failed");
                        CellOutcome::Failed
                    }
                }
            }
        }))
        .await;

        let mut report = BatchReport {
            total: cells.len(),
            ..Default::default()
        };
        for ((cell, _), outcome) in cells.iter().zip(outcomes) {
            match outcome {
                CellOutcome::Skipped => report.skipped += 1,
                CellOutcome::Labelled(label) => {
                    match label {
                        Label::Yes => report.labelled_yes += 1,
                        Label::No => report.labelled_no += 1,
                    }
                    table.set_cell(cell.row, &cell.column, label.as_str())?;
                }
                CellOutcome::Failed | CellOutcome::Cancelled => {
                    report.failed.push(cell.clone());
                    table.set_cell(cell.row, &cell.column, FAILED_SENTINEL)?;
                }
            }
        }
        report.computed = computed.load(Ordering::SeqCst);
        report.cache_hits =
            (report.labelled_yes + report.labelled_no).saturating_sub(report.computed);
        report.cancelled = self.is_cancelled();

        // Keep whatever settled, even on a cancelled or partially failed run.
        self.cache.persist().await?;

        info!(
            total = report.total,
            yes = report.labelled_yes,
            no = report.labelled_no,
            skipped = report.skipped,
            failed = report.failed.len(),
            cache_hits = report.cache_hits,
            cancelled = report.cancelled,
            "batch finished"
        );
        Ok(report)
    }
}
