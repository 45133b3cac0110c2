use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crawler_core::{FetchError, FetchSuccess, ThreadState, UrlRecord, UrlStatus, WorkItem};
use crawler_policy::{AdmissionPolicy, Decision};
use url::Url;

use crate::engine::TaskEngine;

/// Flat backoff for connection failures.
const CONNECTION_BACKOFF: Duration = Duration::from_secs(2);
/// Flat backoff for timeouts, generic request errors, and SSL errors other
/// than a premature EOF.
const FLAT_BACKOFF: Duration = Duration::from_secs(1);
/// Ceiling for the exponential backoff applied to a premature-EOF SSL error.
const MAX_EXPONENTIAL_BACKOFF_SECONDS: u32 = 60;

/// How long a worker waits between empty frontier pops before checking its
/// stop/pause flags again.
const POP_RETRY_INTERVAL: Duration = Duration::from_millis(200);

impl TaskEngine {
    pub(crate) async fn run_worker(self: Arc<Self>, worker_id: usize) {
        tracing::info!(task_id = self.task_id, worker_id, "worker started");

        loop {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            if self.paused.load(Ordering::SeqCst) {
                self.set_thread_state(worker_id, ThreadState::Paused, None).await;
                tokio::time::sleep(POP_RETRY_INTERVAL).await;
                continue;
            }

            let Some(item) = self.frontier.pop().await else {
                self.set_thread_state(worker_id, ThreadState::Idle, None).await;
                tokio::time::sleep(POP_RETRY_INTERVAL).await;
                continue;
            };

            self.process_url(worker_id, item).await;
        }

        self.set_thread_state(worker_id, ThreadState::Stopped, None).await;
        tracing::info!(task_id = self.task_id, worker_id, "worker stopped");
    }

    async fn process_url(self: &Arc<Self>, worker_id: usize, item: WorkItem) {
        let is_new = {
            let mut state = self.state.lock().await;
            state.mark_visited(&item.url)
        };
        if !is_new {
            // Already being processed by another worker (a duplicate that
            // slipped past the seen-set) — skip without touching stats or
            // sleeping.
            tracing::debug!(task_id = self.task_id, url = %item.url, "skipping already-visited url");
            self.set_thread_state(worker_id, ThreadState::Idle, None).await;
            return;
        }

        self.set_thread_state(worker_id, ThreadState::Crawling, Some(item.url.clone()))
            .await;

        let pending = UrlRecord::pending(self.task_id, item.url.clone(), item.depth);
        if let Err(err) = self.store.insert_url_record(&pending).await {
            tracing::warn!(task_id = self.task_id, url = %item.url, %err, "failed to persist pending url record");
        }

        match self.fetch_with_retry(&item.url).await {
            Ok(success) => self.complete_url(worker_id, &item, success).await,
            Err(err) => self.fail_url(worker_id, &item, pending, err).await,
        }

        if self.policy.request_interval_seconds > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(self.policy.request_interval_seconds)).await;
        }
    }

    /// Fetch `url`, retrying on failure up to `retryTimes` total attempts.
    /// The backoff sleep happens between attempts, never after the attempt
    /// that exhausts `retryTimes`.
    async fn fetch_with_retry(&self, url: &str) -> Result<FetchSuccess, FetchError> {
        let retry_times = self.policy.retry_times;
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(url).await {
                Ok(success) => return Ok(success),
                Err(err) if attempt + 1 < retry_times => {
                    let backoff = backoff_for(&err, attempt);
                    tracing::warn!(
                        task_id = self.task_id,
                        url,
                        attempt,
                        error = %err,
                        backoff_secs = backoff.as_secs(),
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn complete_url(self: &Arc<Self>, worker_id: usize, item: &WorkItem, success: FetchSuccess) {
        // A redirect target that was separately admitted (e.g. also linked
        // directly) would otherwise sit at `pending` forever: marking it
        // visited here means its own queued WorkItem gets skipped on pop
        // (process_url's already-visited check), so it never gets a real
        // fetch of its own.
        let mut redirect_target_needs_completion = false;
        if success.final_url != item.url {
            let frontier_is_new = self.frontier.mark_visited(&success.final_url).await;
            let mut state = self.state.lock().await;
            let state_is_new = state.mark_visited(&success.final_url);
            drop(state);
            redirect_target_needs_completion = !frontier_is_new && state_is_new;
        }

        let mut record = UrlRecord::pending(self.task_id, item.url.clone(), item.depth);
        record.status = UrlStatus::Completed;
        record.status_code = Some(success.status_code);
        record.response_time_seconds = Some(success.elapsed.as_secs_f64());
        record.file_size = Some(success.byte_count);
        record.content_type = success.content_type.clone();
        record.completed_at = Some(crate::engine::now());

        if let Some(body) = &success.body {
            if let Ok(base) = Url::parse(&success.final_url) {
                let parsed = crawler_parser::parse_page(body, &base);
                record.metadata = parsed.metadata;

                if !self.queue_paused.load(Ordering::SeqCst) {
                    for link in parsed.links {
                        let decision = AdmissionPolicy::evaluate(
                            self.task_id,
                            &link,
                            item.depth,
                            &self.policy,
                            &self.frontier,
                            &self.robots,
                        )
                        .await;
                        self.apply_decision(decision).await;
                    }
                }
            }
        }

        if let Err(err) = self.store.update_url_record(&record).await {
            tracing::warn!(task_id = self.task_id, url = %item.url, %err, "failed to persist completed url record");
        }

        if redirect_target_needs_completion {
            let mut redirect_record = record.clone();
            redirect_record.url = success.final_url.clone();
            // A no-op if `final_url` was never independently admitted as its
            // own UrlRecord (the common case); only updates a row that
            // already exists.
            if let Err(err) = self.store.update_url_record(&redirect_record).await {
                tracing::warn!(task_id = self.task_id, url = %success.final_url, %err, "failed to persist redirect-target url record");
            }
        }

        {
            let mut state = self.state.lock().await;
            state.record_completed(success.byte_count, success.elapsed.as_secs_f64());
            if redirect_target_needs_completion {
                state.record_completed(success.byte_count, success.elapsed.as_secs_f64());
            }
        }
        self.record_thread_outcome(
            worker_id,
            true,
            success.byte_count,
            success.elapsed.as_secs_f64(),
        )
        .await;
    }

    async fn fail_url(
        &self,
        worker_id: usize,
        item: &WorkItem,
        mut record: UrlRecord,
        err: FetchError,
    ) {
        record.status = UrlStatus::Failed;
        record.error_message = Some(err.message());
        record.completed_at = Some(crate::engine::now());

        if let Err(store_err) = self.store.update_url_record(&record).await {
            tracing::warn!(task_id = self.task_id, url = %item.url, error = %store_err, "failed to persist failed url record");
        }

        {
            let mut state = self.state.lock().await;
            state.record_failed();
        }
        self.record_thread_outcome(worker_id, false, 0, 0.0).await;
    }

    async fn apply_decision(&self, decision: Decision) {
        if let Decision::Admitted(item) = &decision {
            let record = UrlRecord::pending(self.task_id, item.url.clone(), item.depth);
            if let Err(err) = self.store.insert_url_record(&record).await {
                tracing::warn!(task_id = self.task_id, url = %item.url, %err, "failed to persist admitted url record");
            }
            let mut state = self.state.lock().await;
            state.record_admitted();
            return;
        }
        if let Decision::RejectRobots(record) = &decision {
            let _ = self.store.insert_url_record(record).await;
        }
        let mut state = self.state.lock().await;
        state.record_rejection(&decision);
    }
}

fn backoff_for(err: &FetchError, attempt: u32) -> Duration {
    if err.is_premature_eof() {
        let seconds = 2u32.saturating_pow(attempt).min(MAX_EXPONENTIAL_BACKOFF_SECONDS);
        Duration::from_secs(seconds as u64)
    } else if matches!(err, FetchError::Connection(_)) {
        CONNECTION_BACKOFF
    } else {
        FLAT_BACKOFF
    }
}

#[cfg(test)]
mod backoff_tests {
    use super::*;

    #[test]
    fn premature_eof_backs_off_exponentially_from_zero() {
        let err = FetchError::Ssl("unexpected eof".to_string());
        assert_eq!(backoff_for(&err, 0), Duration::from_secs(1));
        assert_eq!(backoff_for(&err, 1), Duration::from_secs(2));
        assert_eq!(backoff_for(&err, 2), Duration::from_secs(4));
    }

    #[test]
    fn premature_eof_backoff_is_capped() {
        let err = FetchError::Ssl("unexpected_eof".to_string());
        assert_eq!(
            backoff_for(&err, 20),
            Duration::from_secs(MAX_EXPONENTIAL_BACKOFF_SECONDS as u64)
        );
    }

    #[test]
    fn connection_error_backs_off_flat_two_seconds() {
        let err = FetchError::Connection("reset".to_string());
        assert_eq!(backoff_for(&err, 0), CONNECTION_BACKOFF);
    }

    #[test]
    fn other_ssl_error_uses_flat_backoff() {
        let err = FetchError::Ssl("handshake failure".to_string());
        assert_eq!(backoff_for(&err, 0), FLAT_BACKOFF);
    }
}
