//! # Audit orchestrator
//!
//! Drives one audit attempt end to end: build a fresh scrub map, scrub
//! the prompt and snapshot, reconcile the conversation window against
//! the instruction fingerprint, call the routed provider, republish
//! fragments as unscrubbed full-buffer views, parse the final text into
//! a report, and archive the record.
//!
//! One attempt at a time. A second submission while one is in flight is
//! rejected with [`SessionError::Busy`] rather than queued; the guard
//! clears when the attempt ends, however it ends.
//!
//! Cancellation is cooperative and a first-class outcome: the partial
//! text survives, nothing is archived, and no error is reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use penny_core::events::AuditEvent;
use penny_core::report::{parse_report, AuditRecord};
use penny_llm::{AuditCall, Provider, ProviderSource};
use penny_scrub::Scrubber;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::{instruction_hash, CacheStore, InstructionCache};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::host::{classify, HostSignals};
use crate::intake::AuditIntake;
use crate::session::{AuditHandle, AuditOutcome, AuditStatus};
use crate::sink::AuditSink;

/// Runs audit sessions against whatever backend the intake routes to.
pub struct Orchestrator {
    source: Arc<dyn ProviderSource>,
    sink: Arc<dyn AuditSink>,
    host: Arc<dyn HostSignals>,
    cache: Arc<parking_lot::Mutex<InstructionCache>>,
    config: SessionConfig,
    active: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Wire up an orchestrator from its seams.
    #[must_use]
    pub fn new(
        source: Arc<dyn ProviderSource>,
        sink: Arc<dyn AuditSink>,
        host: Arc<dyn HostSignals>,
        store: Arc<dyn CacheStore>,
        config: SessionConfig,
    ) -> Self {
        let cache = InstructionCache::new(store, config.history_stored);
        Self {
            source,
            sink,
            host,
            cache: Arc::new(parking_lot::Mutex::new(cache)),
            config,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start one audit attempt.
    ///
    /// Returns [`SessionError::Busy`] without side effects when another
    /// attempt is still in flight. Otherwise the attempt runs on its own
    /// task and this returns immediately with a handle.
    pub fn submit(&self, intake: AuditIntake) -> Result<AuditHandle, SessionError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::Busy);
        }

        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(AuditStatus::Idle);

        let attempt = Attempt {
            session_id,
            intake,
            config: self.config.clone(),
            source: Arc::clone(&self.source),
            sink: Arc::clone(&self.sink),
            host: Arc::clone(&self.host),
            cache: Arc::clone(&self.cache),
            cancel: cancel.clone(),
            events: event_tx,
            status: status_tx,
        };
        let flight = Flight(Arc::clone(&self.active));

        let task = tokio::spawn(async move {
            let _flight = flight;
            let result = attempt.run().await;
            if let Err(error) = &result {
                attempt.set_status(AuditStatus::Error);
                attempt.emit(AuditEvent::Failed {
                    summary: error.to_string(),
                });
                warn!(session_id = %attempt.session_id, %error, "audit failed");
            }
            result
        });

        Ok(AuditHandle {
            session_id,
            cancel,
            events: event_rx,
            status: status_rx,
            task,
        })
    }
}

/// Clears the single-flight guard when the attempt's task ends.
struct Flight(Arc<AtomicBool>);

impl Drop for Flight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything one attempt needs, moved onto its task.
struct Attempt {
    session_id: Uuid,
    intake: AuditIntake,
    config: SessionConfig,
    source: Arc<dyn ProviderSource>,
    sink: Arc<dyn AuditSink>,
    host: Arc<dyn HostSignals>,
    cache: Arc<parking_lot::Mutex<InstructionCache>>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<AuditEvent>,
    status: watch::Sender<AuditStatus>,
}

/// How the response-gathering phase ended.
enum Gathered {
    /// Full scrubbed response text.
    Complete(String),
    /// Cancelled; unscrubbed partial text.
    Cancelled(String),
}

impl Attempt {
    fn set_status(&self, status: AuditStatus) {
        let _ = self.status.send(status);
    }

    fn emit(&self, event: AuditEvent) {
        let _ = self.events.send(event);
    }

    #[instrument(skip_all, fields(session_id = %self.session_id, model = self.intake.route.model()))]
    async fn run(&self) -> Result<AuditOutcome, SessionError> {
        let started = Instant::now();
        self.set_status(AuditStatus::Submitting);
        self.emit(AuditEvent::Submitted);

        // Fresh catalog every attempt; renames between attempts always
        // produce a current map.
        let catalog = self.intake.records.catalog();
        let scrubber = Scrubber::new(&catalog);
        let system_prompt = scrubber.scrub(&self.intake.system_prompt);
        let snapshot = scrubber.scrub(&self.intake.snapshot);

        let provider = self
            .source
            .create(&self.intake.route)
            .map_err(|error| classify(error, &*self.host))?;
        let kind = provider.kind();

        let hash = instruction_hash(&system_prompt);
        let history = {
            let mut cache = self.cache.lock();
            if cache.sync_instructions(kind, &hash) {
                info!(provider = %kind, "conversation window invalidated by instruction change");
            }
            cache.window(kind, self.config.history_sent, &snapshot)
        };

        let call = AuditCall {
            snapshot,
            system_prompt,
            history,
            model: self.intake.route.model().to_owned(),
        };

        let gathered = if self.config.streaming && provider.caps().supports_streaming {
            self.gather_streaming(&*provider, &call, &scrubber).await?
        } else {
            self.gather_oneshot(&*provider, &call, &scrubber).await?
        };
        let text = match gathered {
            Gathered::Complete(text) => text,
            Gathered::Cancelled(partial_text) => {
                self.set_status(AuditStatus::Cancelled);
                self.emit(AuditEvent::Cancelled {
                    partial_text: partial_text.clone(),
                });
                info!(
                    elapsed_s = started.elapsed().as_secs(),
                    "audit cancelled by the user"
                );
                return Ok(AuditOutcome::Cancelled {
                    partial_text,
                    elapsed_seconds: started.elapsed().as_secs(),
                });
            }
        };

        self.set_status(AuditStatus::Parsing);
        let final_text = scrubber.unscrub(&text);
        let report = parse_report(&final_text)?;

        let record = AuditRecord {
            timestamp: Utc::now(),
            form_snapshot: self.intake.form_snapshot.clone(),
            parsed_result: report.clone(),
            is_test_run: self.intake.is_test_run,
        };
        self.sink.persist(&record);
        {
            // The exchange is only stored once it completed; failed and
            // cancelled attempts leave the window untouched.
            let mut cache = self.cache.lock();
            cache.record_user_turn(kind, &call.snapshot);
            cache.record_model_turn(kind, &text);
        }

        self.set_status(AuditStatus::Success);
        self.emit(AuditEvent::Completed { report });
        info!(
            elapsed_s = started.elapsed().as_secs(),
            findings = record.parsed_result.findings.len(),
            "audit complete"
        );
        Ok(AuditOutcome::Completed {
            record,
            elapsed_seconds: started.elapsed().as_secs(),
        })
    }

    /// Consume the fragment stream, republishing each arrival as an
    /// unscrubbed view of the whole buffer. Unscrubbing the full buffer,
    /// not the delta, is what heals tokens split across chunk
    /// boundaries.
    async fn gather_streaming(
        &self,
        provider: &dyn Provider,
        call: &AuditCall,
        scrubber: &Scrubber,
    ) -> Result<Gathered, SessionError> {
        let mut stream = provider
            .stream(call)
            .await
            .map_err(|error| classify(error, &*self.host))?;
        self.set_status(AuditStatus::Streaming);

        let mut accumulated = String::new();
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return Ok(Gathered::Cancelled(scrubber.unscrub(&accumulated)));
                }
                next = stream.next() => next,
            };
            match next {
                None => break,
                Some(Ok(fragment)) => {
                    accumulated.push_str(&fragment);
                    self.emit(AuditEvent::Fragment {
                        text: scrubber.unscrub(&accumulated),
                    });
                }
                Some(Err(error)) => return Err(classify(error, &*self.host)),
            }
        }
        Ok(Gathered::Complete(accumulated))
    }

    /// Single-response fallback for adapters that cannot stream. Publishes
    /// one terminal fragment so observers see the same event shape either
    /// way.
    async fn gather_oneshot(
        &self,
        provider: &dyn Provider,
        call: &AuditCall,
        scrubber: &Scrubber,
    ) -> Result<Gathered, SessionError> {
        self.set_status(AuditStatus::Streaming);
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Ok(Gathered::Cancelled(String::new())),
            result = provider.complete(call) => match result {
                Ok(text) => {
                    self.emit(AuditEvent::Fragment {
                        text: scrubber.unscrub(&text),
                    });
                    Ok(Gathered::Complete(text))
                }
                Err(error) => Err(classify(error, &*self.host)),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
