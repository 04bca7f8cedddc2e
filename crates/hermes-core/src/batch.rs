//! Batch orchestrator: drives the per-identifier pipeline across the
//! whole input set.
//!
//! Per-identifier state machine:
//!
//! ```text
//! Pending -> Matching -> {NotFound | Matched} -> (Enriching ->) Done | Failed
//! ```
//!
//! Per-identifier errors never abort the batch. A fatal error (rejected
//! credential) stops issuing new calls; every remaining identifier is
//! still finalized as Failed so no work is dropped silently. Output
//! preserves input order, duplicates included.

use tokio_util::sync::CancellationToken;

use crate::enricher;
use crate::error::AppError;
use crate::models::{Identifier, ProfileRecord, Stage};
use crate::pacer::Pacer;
use crate::policy::{self, Decision};
use crate::resolver;
use crate::retry::{Backoff, ExponentialBackoff, RetryPolicy, with_retries};
use crate::traits::PeopleApi;

/// Terminal status of one finalized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Finalized, regardless of whether mobile data was found.
    Done,
    /// Unrecoverable error after retry exhaustion; partial data retained.
    Failed,
}

/// One finalized record. Immutable once emitted by the orchestrator.
#[derive(Debug, Clone)]
pub struct FinalizedRecord {
    pub status: RecordStatus,
    pub record: ProfileRecord,
}

/// Result of a whole batch run.
#[derive(Debug)]
pub struct BatchOutcome {
    /// One entry per input identifier, in input order.
    pub records: Vec<FinalizedRecord>,
    /// Set when the run aborted before processing all input.
    pub fatal: Option<AppError>,
}

impl BatchOutcome {
    /// Count of credit-consuming mobile lookups issued in this run.
    pub fn credits_spent(&self) -> u32 {
        self.records
            .iter()
            .filter(|r| r.record.mobile_lookup_attempted)
            .count() as u32
    }

    pub fn failed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == RecordStatus::Failed)
            .count()
    }
}

/// Drives match -> policy -> optional enrichment for every identifier,
/// with shared pacing and bounded retry.
pub struct BatchRunner<A: PeopleApi> {
    api: A,
    pacer: Pacer,
    retry: RetryPolicy,
    backoff: Box<dyn Backoff>,
}

impl<A: PeopleApi> BatchRunner<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            pacer: Pacer::default_spacing(),
            retry: RetryPolicy::default(),
            backoff: Box::new(ExponentialBackoff::default()),
        }
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    /// Process every input identifier, in order, until done or a fatal
    /// error aborts the run.
    pub async fn run(&self, inputs: &[String], cancel: &CancellationToken) -> BatchOutcome {
        let mut records = Vec::with_capacity(inputs.len());
        let mut fatal: Option<AppError> = None;

        for raw in inputs {
            if let Some(f) = &fatal {
                let mut record = ProfileRecord::new(raw.trim());
                record.push_error(Stage::Run, format!("batch aborted: {f}"));
                records.push(FinalizedRecord {
                    status: RecordStatus::Failed,
                    record,
                });
                continue;
            }

            if cancel.is_cancelled() {
                let mut record = ProfileRecord::new(raw.trim());
                record.push_error(Stage::Run, "run cancelled before processing");
                records.push(FinalizedRecord {
                    status: RecordStatus::Failed,
                    record,
                });
                continue;
            }

            let finalized = self.process_one(raw, cancel, &mut fatal).await;
            records.push(finalized);
        }

        let outcome = BatchOutcome { records, fatal };
        tracing::info!(
            total = %outcome.records.len(),
            failed = %outcome.failed_count(),
            credits_spent = %outcome.credits_spent(),
            aborted = %outcome.fatal.is_some(),
            "Batch finished"
        );
        outcome
    }

    async fn process_one(
        &self,
        raw: &str,
        cancel: &CancellationToken,
        fatal: &mut Option<AppError>,
    ) -> FinalizedRecord {
        // Validation happens before any network call; no credit is spent
        // on malformed input.
        let identifier = match Identifier::parse(raw) {
            Ok(identifier) => identifier,
            Err(e) => {
                tracing::warn!(input = %raw.trim(), error = %e, "Skipping invalid identifier");
                let mut record = ProfileRecord::new(raw.trim());
                record.push_error(Stage::Validation, e.to_string());
                return FinalizedRecord {
                    status: RecordStatus::Failed,
                    record,
                };
            }
        };

        // Match stage, with bounded retry around the paced call.
        let resolved = with_retries(&self.retry, self.backoff.as_ref(), cancel, |_| {
            let api = self.api.clone();
            let pacer = self.pacer.clone();
            let identifier = identifier.clone();
            async move {
                pacer.pace().await;
                resolver::resolve(&api, &identifier).await
            }
        })
        .await;

        let mut record = match resolved {
            Ok(record) => record,
            Err(e) => {
                let mut record = ProfileRecord::new(identifier.url());
                let stage = if matches!(e, AppError::Cancelled) {
                    Stage::Run
                } else {
                    Stage::Match
                };
                record.push_error(stage, e.to_string());
                if e.is_fatal() {
                    tracing::error!(error = %e, "Fatal error, aborting batch");
                    *fatal = Some(e);
                }
                return FinalizedRecord {
                    status: RecordStatus::Failed,
                    record,
                };
            }
        };

        match policy::decide(&record) {
            Decision::Skip(reason) => {
                tracing::debug!(identifier = %identifier, reason = %reason.as_str(), "Skipping mobile lookup");
                FinalizedRecord {
                    status: RecordStatus::Done,
                    record,
                }
            }
            Decision::Enrich => {
                if cancel.is_cancelled() {
                    record.push_error(Stage::Run, "run cancelled before mobile lookup");
                    return FinalizedRecord {
                        status: RecordStatus::Failed,
                        record,
                    };
                }
                let status = self.enrich_with_retries(&mut record, cancel, fatal).await;
                FinalizedRecord { status, record }
            }
        }
    }

    /// Enrichment retry loop. Hand-rolled rather than [`with_retries`]
    /// because the stop condition also covers spend: once a lookup may
    /// have been processed server-side (`mobile_lookup_attempted`),
    /// re-attempting would risk a double charge.
    async fn enrich_with_retries(
        &self,
        record: &mut ProfileRecord,
        cancel: &CancellationToken,
        fatal: &mut Option<AppError>,
    ) -> RecordStatus {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            if cancel.is_cancelled() {
                record.push_error(Stage::Run, "run cancelled before mobile lookup");
                return RecordStatus::Failed;
            }

            self.pacer.pace().await;
            match enricher::enrich(&self.api, record).await {
                Ok(()) => return RecordStatus::Done,
                Err(e)
                    if e.is_retryable()
                        && !e.is_fatal()
                        && !record.mobile_lookup_attempted
                        && attempt < max_attempts =>
                {
                    let delay = self.backoff.delay_for_attempt(attempt);
                    tracing::warn!(
                        %attempt,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Transient mobile-lookup error, backing off"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {
                            record.push_error(Stage::Run, "run cancelled during backoff");
                            return RecordStatus::Failed;
                        }
                    }
                    attempt += 1;
                }
                Err(e) => {
                    if !record.mobile_lookup_attempted {
                        // Ambiguous outcomes already appended their own entry.
                        record.push_error(Stage::Mobile, e.to_string());
                    }
                    if e.is_fatal() {
                        tracing::error!(error = %e, "Fatal error, aborting batch");
                        *fatal = Some(e);
                    }
                    return RecordStatus::Failed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{MatchResponse, MatchStatus, MobileAvailability, MobileResponse};
    use crate::testutil::{MockPeopleApi, matched_person};

    fn runner(api: MockPeopleApi) -> BatchRunner<MockPeopleApi> {
        BatchRunner::new(api)
            .with_pacer(Pacer::new(Duration::ZERO))
            .with_backoff(ExponentialBackoff {
                base: Duration::ZERO,
                max: Duration::ZERO,
            })
    }

    fn inputs(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|s| s.to_string()).collect()
    }

    fn match_ok(person: crate::models::PersonProfile) -> Result<MatchResponse, AppError> {
        Ok(MatchResponse {
            person: Some(person),
        })
    }

    #[tokio::test]
    async fn scenario_a_not_found_spends_nothing() {
        let api = MockPeopleApi::with_no_match();
        let outcome = runner(api.clone())
            .run(
                &inputs(&["https://linkedin.com/in/ghost"]),
                &CancellationToken::new(),
            )
            .await;

        let r = &outcome.records[0];
        assert_eq!(r.status, RecordStatus::Done);
        assert_eq!(r.record.match_status, MatchStatus::NotFound);
        assert!(!r.record.mobile_lookup_attempted);
        assert!(r.record.mobile_phone.is_none());
        assert_eq!(api.match_calls(), 1);
        assert_eq!(api.mobile_calls(), 0);
        assert_eq!(outcome.credits_spent(), 0);
    }

    #[tokio::test]
    async fn scenario_b_unlocked_enriches_successfully() {
        let api = MockPeopleApi::with_match(matched_person("available")).push_mobile(Ok(
            MobileResponse {
                phone: Some("+15551234567".into()),
            },
        ));
        let outcome = runner(api.clone())
            .run(
                &inputs(&["https://linkedin.com/in/john-doe"]),
                &CancellationToken::new(),
            )
            .await;

        let r = &outcome.records[0];
        assert_eq!(r.status, RecordStatus::Done);
        assert!(r.record.mobile_lookup_attempted);
        assert_eq!(r.record.mobile_phone.as_deref(), Some("+15551234567"));
        assert_eq!(api.mobile_calls(), 1);
        assert_eq!(outcome.credits_spent(), 1);
    }

    #[tokio::test]
    async fn scenario_c_already_verified_passes_phone_through() {
        let mut person = matched_person("verified");
        person.mobile_phone = Some("+15559876543".into());
        let api = MockPeopleApi::with_match(person);
        let outcome = runner(api.clone())
            .run(
                &inputs(&["https://linkedin.com/in/john-doe"]),
                &CancellationToken::new(),
            )
            .await;

        let r = &outcome.records[0];
        assert_eq!(r.status, RecordStatus::Done);
        assert!(!r.record.mobile_lookup_attempted);
        assert_eq!(r.record.mobile_phone.as_deref(), Some("+15559876543"));
        assert_eq!(api.mobile_calls(), 0);
    }

    #[tokio::test]
    async fn scenario_d_transient_match_errors_retry_then_succeed() {
        let api = MockPeopleApi::new()
            .push_match(Err(AppError::RateLimited))
            .push_match(Err(AppError::RateLimited))
            .push_match(match_ok(matched_person("unavailable")));
        let outcome = runner(api.clone())
            .run(
                &inputs(&["https://linkedin.com/in/john-doe"]),
                &CancellationToken::new(),
            )
            .await;

        let r = &outcome.records[0];
        assert_eq!(r.status, RecordStatus::Done);
        assert_eq!(r.record.match_status, MatchStatus::Matched);
        assert_eq!(api.match_calls(), 3);
        assert_eq!(api.mobile_calls(), 0);
    }

    #[tokio::test]
    async fn scenario_e_auth_error_aborts_the_batch() {
        let api = MockPeopleApi::with_match_error(AppError::Auth("invalid key".into()));
        let outcome = runner(api.clone())
            .run(
                &inputs(&[
                    "https://linkedin.com/in/first",
                    "https://linkedin.com/in/second",
                    "https://linkedin.com/in/third",
                ]),
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.fatal.is_some());
        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.records.iter().all(|r| r.status == RecordStatus::Failed));
        // Only the first identifier ever reached the network.
        assert_eq!(api.match_calls(), 1);
        assert!(
            outcome.records[1]
                .record
                .errors_joined()
                .contains("batch aborted")
        );
    }

    #[tokio::test]
    async fn retries_exhausted_fails_one_identifier_only() {
        let api = MockPeopleApi::new()
            .push_match(Err(AppError::Timeout(10)))
            .push_match(Err(AppError::Timeout(10)))
            .push_match(Err(AppError::Timeout(10)))
            .push_match(match_ok(matched_person("unavailable")));
        let outcome = runner(api.clone())
            .run(
                &inputs(&[
                    "https://linkedin.com/in/flaky",
                    "https://linkedin.com/in/fine",
                ]),
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.fatal.is_none());
        assert_eq!(outcome.records[0].status, RecordStatus::Failed);
        assert_eq!(outcome.records[1].status, RecordStatus::Done);
        assert_eq!(api.match_calls(), 4);
    }

    #[tokio::test]
    async fn invalid_identifier_fails_without_network() {
        let api = MockPeopleApi::new().push_match(match_ok(matched_person("unavailable")));
        let outcome = runner(api.clone())
            .run(
                &inputs(&["not-a-url", "https://linkedin.com/in/fine"]),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.records[0].status, RecordStatus::Failed);
        assert!(
            outcome.records[0]
                .record
                .errors_joined()
                .contains("[validation]")
        );
        assert_eq!(outcome.records[1].status, RecordStatus::Done);
        // The invalid line never produced a call.
        assert_eq!(api.match_calls(), 1);
        assert_eq!(outcome.credits_spent(), 0);
    }

    #[tokio::test]
    async fn output_preserves_input_order_and_duplicates() {
        let api = MockPeopleApi::new()
            .push_match(match_ok(matched_person("unavailable")))
            .push_match(Ok(MatchResponse::default()))
            .push_match(match_ok(matched_person("unavailable")));
        let urls = inputs(&[
            "https://linkedin.com/in/alpha",
            "https://linkedin.com/in/beta",
            "https://linkedin.com/in/alpha",
        ]);
        let outcome = runner(api).run(&urls, &CancellationToken::new()).await;

        assert_eq!(outcome.records.len(), 3);
        for (finalized, url) in outcome.records.iter().zip(&urls) {
            assert_eq!(&finalized.record.identifier, url);
        }
    }

    #[tokio::test]
    async fn ambiguous_mobile_timeout_is_not_reattempted() {
        let api = MockPeopleApi::with_match(matched_person("available"))
            .push_mobile(Err(AppError::Timeout(10)))
            .push_mobile(Ok(MobileResponse {
                phone: Some("+15550001111".into()),
            }));
        let outcome = runner(api.clone())
            .run(
                &inputs(&["https://linkedin.com/in/john-doe"]),
                &CancellationToken::new(),
            )
            .await;

        let r = &outcome.records[0];
        assert_eq!(r.status, RecordStatus::Failed);
        assert!(r.record.mobile_lookup_attempted);
        // Exactly one mobile call: the ambiguous outcome blocks a retry.
        assert_eq!(api.mobile_calls(), 1);
        assert_eq!(outcome.credits_spent(), 1);
    }

    #[tokio::test]
    async fn unreadable_mobile_response_is_not_reattempted() {
        // The server returned 2xx but the body was unreadable: the
        // lookup was processed, so a second call would double-charge.
        let api = MockPeopleApi::with_match(matched_person("available"))
            .push_mobile(Err(AppError::MalformedResponse("not-json-at-all".into())))
            .push_mobile(Ok(MobileResponse {
                phone: Some("+15550001111".into()),
            }));
        let outcome = runner(api.clone())
            .run(
                &inputs(&["https://linkedin.com/in/john-doe"]),
                &CancellationToken::new(),
            )
            .await;

        let r = &outcome.records[0];
        assert_eq!(r.status, RecordStatus::Failed);
        assert!(r.record.mobile_lookup_attempted);
        assert_eq!(api.mobile_calls(), 1);
        assert_eq!(outcome.credits_spent(), 1);
    }

    #[tokio::test]
    async fn pre_request_mobile_failure_retries_without_spending_twice() {
        let api = MockPeopleApi::with_match(matched_person("available"))
            .push_mobile(Err(AppError::RateLimited))
            .push_mobile(Ok(MobileResponse {
                phone: Some("+15550001111".into()),
            }));
        let outcome = runner(api.clone())
            .run(
                &inputs(&["https://linkedin.com/in/john-doe"]),
                &CancellationToken::new(),
            )
            .await;

        let r = &outcome.records[0];
        assert_eq!(r.status, RecordStatus::Done);
        assert_eq!(r.record.mobile_phone.as_deref(), Some("+15550001111"));
        assert_eq!(api.mobile_calls(), 2);
        // One credit: the rate-limited attempt never reached processing.
        assert_eq!(outcome.credits_spent(), 1);
    }

    #[tokio::test]
    async fn mobile_lookup_without_number_finalizes_done() {
        let api = MockPeopleApi::with_match(matched_person("available")).push_mobile(Ok(
            MobileResponse::default(),
        ));
        let outcome = runner(api)
            .run(
                &inputs(&["https://linkedin.com/in/john-doe"]),
                &CancellationToken::new(),
            )
            .await;

        let r = &outcome.records[0];
        assert_eq!(r.status, RecordStatus::Done);
        assert!(r.record.mobile_lookup_attempted);
        assert!(r.record.mobile_phone.is_none());
        assert_eq!(r.record.errors.len(), 1);
        assert_eq!(outcome.credits_spent(), 1);
    }

    #[tokio::test]
    async fn cancellation_finalizes_remaining_as_failed() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let api = MockPeopleApi::new();
        let outcome = runner(api.clone())
            .run(
                &inputs(&[
                    "https://linkedin.com/in/first",
                    "https://linkedin.com/in/second",
                ]),
                &cancel,
            )
            .await;

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records.iter().all(|r| r.status == RecordStatus::Failed));
        assert!(outcome.records[0].record.errors_joined().contains("cancelled"));
        assert_eq!(api.match_calls(), 0);
    }

    #[tokio::test]
    async fn credit_conservation_no_lookup_without_enrich_decision() {
        // Every non-spending availability, plus not-found: zero mobile calls.
        let api = MockPeopleApi::new()
            .push_match(match_ok(matched_person("verified")))
            .push_match(match_ok(matched_person("unavailable")))
            .push_match(match_ok(matched_person("weird_new_status")))
            .push_match(Ok(MatchResponse::default()));
        let outcome = runner(api.clone())
            .run(
                &inputs(&[
                    "https://linkedin.com/in/a",
                    "https://linkedin.com/in/b",
                    "https://linkedin.com/in/c",
                    "https://linkedin.com/in/d",
                ]),
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.records.iter().all(|r| r.status == RecordStatus::Done));
        assert!(
            outcome
                .records
                .iter()
                .all(|r| !r.record.mobile_lookup_attempted)
        );
        assert_eq!(api.mobile_calls(), 0);
        assert_eq!(outcome.credits_spent(), 0);
    }

    #[tokio::test]
    async fn unknown_availability_is_conservative() {
        let api = MockPeopleApi::with_match(matched_person("partial"));
        let outcome = runner(api.clone())
            .run(
                &inputs(&["https://linkedin.com/in/john-doe"]),
                &CancellationToken::new(),
            )
            .await;

        let r = &outcome.records[0];
        assert_eq!(r.status, RecordStatus::Done);
        assert_eq!(r.record.mobile_availability, MobileAvailability::Unknown);
        assert_eq!(api.mobile_calls(), 0);
    }
}
