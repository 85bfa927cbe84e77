//! # Submission Engine
//!
//! One command is two server round trips: *prepare* posts the troop
//! selection and receives a confirmation form, *confirm* replays that form.
//!
//! ```text
//! Idle -> Preparing -> AwaitingConfirmation -> Confirming -> Completed
//!             \                                    \
//!              +-> Failed                            +-> Failed
//! ```
//!
//! Only one submission may be in flight per origin location. The lock is
//! taken when entering `Preparing` and released on any terminal state, or
//! when the [`Submission`] is dropped.

use crate::error::{AttackError, Phase};
use crate::extract::ResponseExtractor;
use crate::inventory::{self, InventoryCache};
use crate::model::{AttackRequest, AttackResult, ConfirmationPayload, LocationId, WorldBounds, TOKEN_FIELD};
use crate::token::TokenManager;
use crate::transport::{RequestOptions, Target, TransportClient};
use crate::units::{self, TravelCalculator};
use core_logic::RESULT_TARGET;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

const PLACE_SCREEN: &str = "place";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Preparing,
    AwaitingConfirmation,
    Confirming,
    Completed,
    Failed,
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Preparing => "preparing",
            SubmissionState::AwaitingConfirmation => "awaiting confirmation",
            SubmissionState::Confirming => "confirming",
            SubmissionState::Completed => "completed",
            SubmissionState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionState::Completed | SubmissionState::Failed)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin locations with a submission in flight.
#[derive(Debug, Default)]
pub struct SubmissionLocks {
    active: Mutex<HashSet<LocationId>>,
}

impl SubmissionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(self: &Arc<Self>, location_id: LocationId) -> Result<LocationLock, AttackError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(location_id) {
            return Err(AttackError::LocationBusy { location_id });
        }
        Ok(LocationLock {
            locks: Arc::clone(self),
            location_id,
        })
    }

    pub fn is_locked(&self, location_id: LocationId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&location_id)
    }
}

/// Holds a location for one submission; released on drop.
#[derive(Debug)]
pub struct LocationLock {
    locks: Arc<SubmissionLocks>,
    location_id: LocationId,
}

impl LocationLock {
    pub fn location_id(&self) -> LocationId {
        self.location_id
    }
}

impl Drop for LocationLock {
    fn drop(&mut self) {
        let mut active = self.locks.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.location_id);
    }
}

pub struct SubmissionEngine {
    transport: Arc<TransportClient>,
    tokens: Arc<TokenManager>,
    inventory: Arc<InventoryCache>,
    extractor: Arc<ResponseExtractor>,
    locks: Arc<SubmissionLocks>,
    bounds: WorldBounds,
    travel: TravelCalculator,
    verify_inventory: bool,
}

impl SubmissionEngine {
    pub fn new(
        transport: Arc<TransportClient>,
        tokens: Arc<TokenManager>,
        inventory: Arc<InventoryCache>,
        extractor: Arc<ResponseExtractor>,
    ) -> Self {
        Self {
            transport,
            tokens,
            inventory,
            extractor,
            locks: Arc::new(SubmissionLocks::new()),
            bounds: WorldBounds::default(),
            travel: TravelCalculator::default(),
            verify_inventory: true,
        }
    }

    pub fn with_bounds(mut self, bounds: WorldBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_travel(mut self, travel: TravelCalculator) -> Self {
        self.travel = travel;
        self
    }

    pub fn with_inventory_check(mut self, enabled: bool) -> Self {
        self.verify_inventory = enabled;
        self
    }

    pub fn locks(&self) -> &Arc<SubmissionLocks> {
        &self.locks
    }

    pub fn begin(&self, request: AttackRequest) -> Submission<'_> {
        Submission {
            engine: self,
            request,
            state: SubmissionState::Idle,
            lock: None,
            payload: None,
            estimate: None,
        }
    }

    /// Prepare and confirm in one go.
    pub async fn submit(&self, request: AttackRequest) -> Result<AttackResult, AttackError> {
        let mut submission = self.begin(request);
        submission.prepare().await?;
        submission.confirm().await
    }

    fn check_request(&self, request: &AttackRequest) -> Result<(), AttackError> {
        let mut errors = Vec::new();
        if !self.bounds.contains(&request.target) {
            errors.push(format!("target {} is outside the world", request.target));
        }
        if let Some(origin) = request.origin_coords {
            if !self.bounds.contains(&origin) {
                errors.push(format!("origin {} is outside the world", origin));
            }
        }
        errors.extend(inventory::validate_composition(&request.troops).errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AttackError::Validation(errors))
        }
    }
}

fn in_phase(phase: Phase) -> impl Fn(AttackError) -> AttackError {
    move |error| match error {
        AttackError::Network(source) => AttackError::Transport { phase, source },
        other => other,
    }
}

/// A single command moving through the two-phase protocol.
pub struct Submission<'a> {
    engine: &'a SubmissionEngine,
    request: AttackRequest,
    state: SubmissionState,
    lock: Option<LocationLock>,
    payload: Option<ConfirmationPayload>,
    estimate: Option<Duration>,
}

impl Submission<'_> {
    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn request(&self) -> &AttackRequest {
        &self.request
    }

    /// Hidden fields captured by a successful prepare.
    pub fn payload(&self) -> Option<&ConfirmationPayload> {
        self.payload.as_ref()
    }

    /// Advisory duration shown on the confirmation page.
    pub fn estimated_duration(&self) -> Option<Duration> {
        self.estimate
    }

    fn fail(&mut self) {
        self.state = SubmissionState::Failed;
        self.payload = None;
        self.lock = None;
    }

    fn reject(&self, phase: Phase, reason: String) -> AttackError {
        if self.engine.extractor.is_stale_token_rejection(&reason) {
            self.engine.tokens.invalidate(self.request.origin);
        }
        AttackError::ServerRejected { phase, reason }
    }

    pub async fn prepare(&mut self) -> Result<(), AttackError> {
        if self.state != SubmissionState::Idle {
            return Err(AttackError::StateViolation {
                operation: "prepare",
                state: self.state.as_str(),
            });
        }

        self.lock = Some(self.engine.locks.acquire(self.request.origin)?);
        self.state = SubmissionState::Preparing;

        match self.run_prepare().await {
            Ok((payload, estimate)) => {
                debug!(
                    "Prepared {} -> {} ({} confirmation fields)",
                    self.request.origin,
                    self.request.target,
                    payload.len()
                );
                self.payload = Some(payload);
                self.estimate = estimate;
                self.state = SubmissionState::AwaitingConfirmation;
                Ok(())
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    async fn run_prepare(&self) -> Result<(ConfirmationPayload, Option<Duration>), AttackError> {
        let engine = self.engine;
        let request = &self.request;
        let origin = request.origin;

        engine.check_request(request)?;

        if engine.verify_inventory {
            let available = engine
                .inventory
                .get_available(origin)
                .await
                .map_err(in_phase(Phase::Prepare))?;
            inventory::validate(&request.troops, &available).into_result()?;
        }

        let token = engine
            .tokens
            .get_token(origin)
            .await
            .map_err(in_phase(Phase::Prepare))?;

        let mut form = vec![
            ("x".to_string(), request.target.x.to_string()),
            ("y".to_string(), request.target.y.to_string()),
        ];
        for unit in units::unit_names() {
            if let Some(&count) = request.troops.get(unit).filter(|&&n| n > 0) {
                form.push((unit.to_string(), count.to_string()));
            }
        }
        form.push(("source_village".to_string(), origin.to_string()));
        form.push((request.command.form_marker().to_string(), "l".to_string()));
        form.push((TOKEN_FIELD.to_string(), token));

        let target = Target::new(origin, PLACE_SCREEN).with_param("try", "confirm");
        let body = engine
            .transport
            .post(&target, form, &RequestOptions::default())
            .await
            .map_err(|source| AttackError::Transport {
                phase: Phase::Prepare,
                source,
            })?;

        if let Some(reason) = engine.extractor.error_message(&body) {
            return Err(self.reject(Phase::Prepare, reason));
        }

        let payload = engine.extractor.hidden_fields(&body);
        if payload.is_empty() {
            return Err(AttackError::UnexpectedResponse {
                phase: Phase::Prepare,
                detail: "confirmation form has no hidden fields".to_string(),
            });
        }

        Ok((payload, engine.extractor.duration(&body)))
    }

    /// Fails with [`AttackError::StateViolation`] without touching the
    /// network unless the submission is awaiting confirmation.
    pub async fn confirm(&mut self) -> Result<AttackResult, AttackError> {
        if self.state != SubmissionState::AwaitingConfirmation {
            return Err(AttackError::StateViolation {
                operation: "confirm",
                state: self.state.as_str(),
            });
        }
        self.state = SubmissionState::Confirming;

        match self.run_confirm().await {
            Ok(result) => {
                self.state = SubmissionState::Completed;
                self.payload = None;
                self.lock = None;
                Ok(result)
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    async fn run_confirm(&self) -> Result<AttackResult, AttackError> {
        let engine = self.engine;
        let request = &self.request;
        let origin = request.origin;

        let payload = self.payload.as_ref().ok_or_else(|| AttackError::UnexpectedResponse {
            phase: Phase::Confirm,
            detail: "no confirmation payload captured".to_string(),
        })?;

        let token = engine
            .tokens
            .get_token(origin)
            .await
            .map_err(in_phase(Phase::Confirm))?;

        let target = Target::new(origin, PLACE_SCREEN).with_param("action", "command");
        let body = engine
            .transport
            .post(&target, payload.with_token(&token), &RequestOptions::default())
            .await
            .map_err(|source| AttackError::Transport {
                phase: Phase::Confirm,
                source,
            })?;

        if !engine.extractor.is_success(&body) {
            let reason = engine
                .extractor
                .error_message(&body)
                .unwrap_or_else(|| "command was not acknowledged by the server".to_string());
            warn!("Confirm for {} -> {} rejected: {}", origin, request.target, reason);
            return Err(self.reject(Phase::Confirm, reason));
        }

        let duration = engine
            .extractor
            .duration(&body)
            .or(self.estimate)
            .or_else(|| {
                request
                    .distance()
                    .and_then(|d| engine.travel.travel_time(d, &request.troops))
            });

        engine.inventory.invalidate(origin);

        let result = AttackResult::success(request, duration);
        info!(
            target: RESULT_TARGET,
            "{} {} -> {} SENT{}",
            request.command,
            origin,
            request.target,
            duration
                .map(|d| format!(" (arrives in {})", units::format_duration(d)))
                .unwrap_or_default()
        );
        Ok(result)
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        if self.lock.is_some() && !self.state.is_terminal() {
            debug!(
                "Submission for location {} dropped while {}",
                self.request.origin, self.state
            );
        }
    }
}
