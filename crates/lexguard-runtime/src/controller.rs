//! Agent processing controller.
//!
//! One controller tracks the analysis state of one `(document, agent)` key
//! and drives it forward: fetch what the backend already has, run the agent
//! when nothing usable exists, and retry after failures.
//!
//! ## State machine
//!
//! ```text
//! Idle ──fetch──▶ Fetching ──▶ Absent | Success | Failure
//! Absent | Failure | Success ──process/retry──▶ Processing ──▶ Success | Failure
//! ```
//!
//! ## Staleness
//!
//! Every cycle takes a ticket stamped with the controller's generation.
//! Changing the key, detaching, or starting a newer fetch bumps the
//! generation; a cycle whose ticket no longer matches when its response
//! arrives is discarded without touching state. In-flight requests are not
//! aborted.
//!
//! The controller never returns an error. Client failures become
//! [`AnalysisOutcome::Failure`] with `retryable = true`.

use lexguard_core::{
    classify_fetch_response, classify_process_response, AnalysisKey, AnalysisMeta,
    AnalysisOutcome, AnalysisPayload, Classified,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use crate::client::{AnalysisClient, ClientError};

/// Where the controller is in its current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No key attached, or attached without fetching yet
    Idle,
    Fetching,
    Processing,
    /// The outcome is stable and can be rendered
    Settled,
}

impl Phase {
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::Fetching | Phase::Processing)
    }
}

/// Everything a report page renders against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub key: Option<AnalysisKey>,
    pub phase: Phase,
    pub outcome: AnalysisOutcome,
    /// Attempts recorded for this key; only reset by a success
    pub retry_count: u32,
    /// Bookkeeping from the last committed response
    pub meta: AnalysisMeta,
    /// Increases with every state change
    #[serde(skip)]
    pub revision: u64,
}

impl ControllerSnapshot {
    pub fn is_loading(&self) -> bool {
        self.phase.is_busy()
    }

    /// Whether a process/retry affordance should be offered.
    pub fn can_retry(&self) -> bool {
        self.key.is_some() && !self.is_loading() && self.outcome.can_retry()
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.error_message()
    }

    pub fn data(&self) -> Option<&AnalysisPayload> {
        self.outcome.payload()
    }
}

#[derive(Debug)]
struct State {
    key: Option<AnalysisKey>,
    generation: u64,
    revision: u64,
    phase: Phase,
    outcome: AnalysisOutcome,
    retry_count: u32,
    meta: AnalysisMeta,
}

impl State {
    fn new() -> Self {
        Self {
            key: None,
            generation: 0,
            revision: 0,
            phase: Phase::Idle,
            outcome: AnalysisOutcome::Absent,
            retry_count: 0,
            meta: AnalysisMeta::default(),
        }
    }

    fn reset(&mut self, key: Option<AnalysisKey>) {
        self.key = key;
        self.generation += 1;
        self.phase = Phase::Idle;
        self.outcome = AnalysisOutcome::Absent;
        self.retry_count = 0;
        self.meta = AnalysisMeta::default();
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            key: self.key.clone(),
            phase: self.phase,
            outcome: self.outcome.clone(),
            retry_count: self.retry_count,
            meta: self.meta.clone(),
            revision: self.revision,
        }
    }

    /// Record a change and take the snapshot to publish.
    fn changed(&mut self) -> ControllerSnapshot {
        self.revision += 1;
        self.snapshot()
    }

    /// Fold a classified fetch response into the state.
    fn apply_fetch(&mut self, classified: Classified) {
        self.outcome = match classified.outcome {
            AnalysisOutcome::Success {
                payload,
                retry_count,
            } => {
                self.retry_count = retry_count;
                AnalysisOutcome::Success {
                    payload,
                    retry_count,
                }
            }
            AnalysisOutcome::Failure {
                message,
                retry_count,
                retryable,
            } => {
                self.retry_count = self.retry_count.max(retry_count);
                AnalysisOutcome::Failure {
                    message,
                    retry_count: self.retry_count,
                    retryable,
                }
            }
            AnalysisOutcome::Absent | AnalysisOutcome::Pending => AnalysisOutcome::Absent,
        };
        self.meta = classified.meta;
    }

    fn apply_client_error(&mut self, err: &ClientError) {
        self.outcome = AnalysisOutcome::Failure {
            message: err.to_string(),
            retry_count: self.retry_count,
            retryable: true,
        };
    }
}

/// Identifies one fetch or processing cycle.
#[derive(Debug, Clone)]
struct Ticket {
    key: AnalysisKey,
    generation: u64,
}

/// Per-key fetch/process/retry state machine.
///
/// Share it behind an `Arc` to drive it from several tasks; observe it with
/// [`subscribe`](Self::subscribe).
pub struct AgentProcessingController<C> {
    client: C,
    auto_fetch: bool,
    state: Mutex<State>,
    updates: watch::Sender<ControllerSnapshot>,
}

impl<C: AnalysisClient> AgentProcessingController<C> {
    pub fn new(client: C) -> Self {
        let state = State::new();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            client,
            auto_fetch: true,
            state: Mutex::new(state),
            updates,
        }
    }

    /// Whether attaching a key fetches its stored analysis straight away.
    pub fn with_auto_fetch(mut self, auto_fetch: bool) -> Self {
        self.auto_fetch = auto_fetch;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        self.state.lock().snapshot()
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.updates.subscribe()
    }

    pub fn key(&self) -> Option<AnalysisKey> {
        self.state.lock().key.clone()
    }

    /// Point the controller at a key.
    ///
    /// A different key discards the previous key's state and any cycle still
    /// in flight for it, then fetches the new key's stored analysis when auto
    /// fetch is on. Setting the current key again does nothing.
    pub async fn set_key(&self, key: AnalysisKey) -> ControllerSnapshot {
        if !self.switch_key(key) {
            return self.snapshot();
        }
        if self.auto_fetch {
            self.fetch_existing().await
        } else {
            self.snapshot()
        }
    }

    /// Stop tracking the current key. Late responses are dropped.
    pub fn detach(&self) {
        let snapshot = {
            let mut state = self.state.lock();
            if let Some(key) = &state.key {
                tracing::info!(key = %key, generation = state.generation, "Controller detached");
            }
            state.reset(None);
            state.changed()
        };
        self.publish(snapshot);
    }

    /// Read the stored analysis for the current key.
    ///
    /// Starts a new cycle, superseding any cycle in flight.
    pub async fn fetch_existing(&self) -> ControllerSnapshot {
        let Some(ticket) = self.begin(Phase::Fetching, false) else {
            return self.snapshot();
        };

        let result = self.client.fetch_analysis(&ticket.key).await;

        self.commit(&ticket, |state| match result {
            Ok(body) => state.apply_fetch(classify_fetch_response(&body)),
            Err(err) => {
                tracing::warn!(key = %ticket.key, error = %err, "Fetching analysis failed");
                state.apply_client_error(&err);
            }
        })
    }

    /// Re-read the stored analysis for the current key.
    pub async fn refresh(&self) -> ControllerSnapshot {
        self.fetch_existing().await
    }

    /// Run the agent for the current key.
    ///
    /// Does nothing while another cycle is in flight. On failure the stored
    /// analysis is re-read, since the backend may have recorded a result or
    /// an error of its own even though the call failed.
    pub async fn process(&self) -> ControllerSnapshot {
        let Some(ticket) = self.begin(Phase::Processing, true) else {
            return self.snapshot();
        };

        let classified = match self.client.process(&ticket.key).await {
            Ok(body) => classify_process_response(&body),
            Err(err) => Classified {
                outcome: AnalysisOutcome::Failure {
                    message: err.to_string(),
                    retry_count: 0,
                    retryable: true,
                },
                meta: AnalysisMeta::default(),
            },
        };

        let (message, reported_count) = match classified.outcome {
            AnalysisOutcome::Failure {
                message,
                retry_count,
                ..
            } => (message, retry_count),
            outcome => {
                return self.commit(&ticket, |state| {
                    state.retry_count = outcome.retry_count();
                    state.outcome = outcome;
                    state.meta = classified.meta;
                });
            }
        };

        tracing::warn!(key = %ticket.key, error = %message, "Processing failed, re-reading stored analysis");

        if !self.is_current(&ticket) {
            return self.discard(&ticket);
        }

        let recorded = match self.client.fetch_analysis(&ticket.key).await {
            Ok(body) => Some(classify_fetch_response(&body)),
            Err(err) => {
                tracing::warn!(key = %ticket.key, error = %err, "Re-reading analysis failed");
                None
            }
        };

        self.commit(&ticket, |state| {
            state.retry_count = state
                .retry_count
                .saturating_add(1)
                .max(reported_count);

            match recorded {
                Some(recorded)
                    if matches!(
                        recorded.outcome,
                        AnalysisOutcome::Success { .. } | AnalysisOutcome::Failure { .. }
                    ) =>
                {
                    state.apply_fetch(recorded)
                }
                _ => {
                    state.outcome = AnalysisOutcome::Failure {
                        message,
                        retry_count: state.retry_count,
                        retryable: true,
                    };
                }
            }
        })
    }

    /// Run the agent again after a failure.
    ///
    /// Same as [`process`](Self::process), except that it does nothing when
    /// the last failure was marked non-retryable.
    pub async fn retry(&self) -> ControllerSnapshot {
        if let Some(snapshot) = self.retry_blocked() {
            return snapshot;
        }
        self.process().await
    }

    fn retry_blocked(&self) -> Option<ControllerSnapshot> {
        let state = self.state.lock();
        let blocked = matches!(
            state.outcome,
            AnalysisOutcome::Failure {
                retryable: false,
                ..
            }
        );
        if blocked {
            tracing::debug!(key = ?state.key, "Retry ignored: failure is not retryable");
        }
        blocked.then(|| state.snapshot())
    }

    fn switch_key(&self, key: AnalysisKey) -> bool {
        let snapshot = {
            let mut state = self.state.lock();
            if state.key.as_ref() == Some(&key) {
                return false;
            }

            tracing::info!(
                key = %key,
                previous = ?state.key.as_ref().map(ToString::to_string),
                generation = state.generation + 1,
                "Controller key changed"
            );
            state.reset(Some(key));
            state.changed()
        };
        self.publish(snapshot);
        true
    }

    /// Start a cycle. `exclusive` cycles refuse to start while another is in flight.
    fn begin(&self, phase: Phase, exclusive: bool) -> Option<Ticket> {
        let (ticket, snapshot) = {
            let mut state = self.state.lock();
            let key = state.key.clone()?;

            if exclusive && state.phase.is_busy() {
                tracing::debug!(key = %key, phase = ?state.phase, "Cycle already in flight, ignoring");
                return None;
            }

            state.generation += 1;
            state.phase = phase;
            state.outcome = AnalysisOutcome::Pending;
            tracing::info!(key = %key, generation = state.generation, phase = ?phase, "Cycle started");

            let ticket = Ticket {
                key,
                generation: state.generation,
            };
            (ticket, state.changed())
        };
        self.publish(snapshot);
        Some(ticket)
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.state.lock().generation == ticket.generation
    }

    /// Apply `update` if the ticket is still current, then settle.
    fn commit(&self, ticket: &Ticket, update: impl FnOnce(&mut State)) -> ControllerSnapshot {
        let snapshot = {
            let mut state = self.state.lock();
            if state.generation != ticket.generation {
                drop(state);
                return self.discard(ticket);
            }

            update(&mut state);
            state.phase = Phase::Settled;
            tracing::info!(
                key = %ticket.key,
                generation = ticket.generation,
                outcome = state.outcome.tag(),
                retry_count = state.retry_count,
                "Cycle settled"
            );
            state.changed()
        };
        self.publish(snapshot.clone());
        snapshot
    }

    fn discard(&self, ticket: &Ticket) -> ControllerSnapshot {
        let state = self.state.lock();
        tracing::warn!(
            key = %ticket.key,
            generation = ticket.generation,
            current = state.generation,
            "Discarding stale response"
        );
        state.snapshot()
    }

    /// Called with the state lock released. Subscribers may hold a borrow
    /// of the channel while calling back into the controller, so the two
    /// locks are never held together. A snapshot older than the one already
    /// published is dropped.
    fn publish(&self, snapshot: ControllerSnapshot) {
        self.updates.send_if_modified(|current| {
            if snapshot.revision <= current.revision {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}
