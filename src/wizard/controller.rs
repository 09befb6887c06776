//! WizardController — coordinates drafts, validation, navigation and the
//! final submission.
//!
//! State lives behind a `tokio::sync::RwLock`; callers share the controller
//! as `Arc<WizardController>`. Storage problems never surface here (the
//! FormStore swallows them); the gateway is the only source of `Err`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::payload::{Aggregate, FieldMap};
use super::schema;
use super::sequencer::{Next, StepSequencer};
use super::step::{StepKey, subscription_steps};
use super::validator::{StepValidator, ValidationOutcome};
use crate::error::{SequencerError, WizardError};
use crate::gateway::SubmissionGateway;
use crate::packages::PackageCatalog;
use crate::store::FormStore;

/// Shown when a forward jump is attempted from an invalid step.
pub const BLOCKED_ADVISORY: &str = "Complete the current step before moving on.";

/// Shown when continue or skip targets a step the wizard is not on.
pub const NOT_CURRENT_ADVISORY: &str = "Only the current step can be continued or skipped.";

/// Field name → message.
pub type FieldErrors = BTreeMap<String, String>;

/// Lifecycle of one wizard run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    #[default]
    Active,
    Submitting,
    Submitted,
}

/// In-memory wizard state.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    pub current: StepKey,
    pub validity: BTreeMap<StepKey, bool>,
    pub drafts: BTreeMap<StepKey, FieldMap>,
    pub errors: BTreeMap<StepKey, FieldErrors>,
    pub phase: WizardPhase,
}

impl WizardState {
    fn fresh(first: &StepKey) -> Self {
        Self {
            current: first.clone(),
            validity: BTreeMap::new(),
            drafts: BTreeMap::new(),
            errors: BTreeMap::new(),
            phase: WizardPhase::Active,
        }
    }

    fn draft_value(&self, step: &str) -> Value {
        Value::Object(self.drafts.get(step).cloned().unwrap_or_default())
    }

    fn record(&mut self, step: &StepKey, outcome: &ValidationOutcome) {
        self.validity.insert(step.clone(), outcome.is_valid);
        self.errors.insert(step.clone(), outcome.errors.clone());
    }
}

/// Result of `continue_step` / `skip_step`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepTransition {
    Advanced { to: StepKey },
    /// The step was the last one; the next action is `submit`.
    AtLastStep,
    Rejected { errors: FieldErrors },
    /// The step is not the current one; nothing was saved or moved.
    Blocked { advisory: String },
}

/// Result of `jump_to_step`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JumpOutcome {
    Moved { to: StepKey },
    Blocked { advisory: String },
}

/// Result of `submit` when the gateway was not the problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Submitted,
    Rejected { errors: FieldErrors },
    AlreadyInFlight,
}

/// Per-step status for the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStatus {
    pub key: StepKey,
    pub label: String,
    pub ordinal: usize,
    pub is_valid: bool,
    pub is_current: bool,
}

/// Read-only view of the wizard for the REST layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub current: StepKey,
    pub phase: WizardPhase,
    pub steps: Vec<StepStatus>,
    pub drafts: BTreeMap<StepKey, FieldMap>,
    pub errors: BTreeMap<StepKey, FieldErrors>,
}

/// Steps and their schemas.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    pub sequencer: StepSequencer,
    pub validator: StepValidator,
}

impl WizardConfig {
    pub fn new(sequencer: StepSequencer, validator: StepValidator) -> Self {
        Self {
            sequencer,
            validator,
        }
    }

    /// The four-step subscription wizard.
    pub fn subscription(catalog: &PackageCatalog) -> Result<Self, SequencerError> {
        let sequencer = StepSequencer::new(subscription_steps())?;
        let validator = schema::subscription_schemas(catalog)
            .into_iter()
            .fold(StepValidator::new(), |v, (key, schema)| v.with_schema(key, schema));
        Ok(Self::new(sequencer, validator))
    }
}

/// Clears the in-flight flag on every exit path of `submit`.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct WizardController {
    sequencer: StepSequencer,
    validator: StepValidator,
    store: FormStore,
    gateway: Arc<dyn SubmissionGateway>,
    state: RwLock<WizardState>,
    submitting: AtomicBool,
}

impl WizardController {
    /// Create the controller, hydrating from saved drafts.
    ///
    /// Every saved draft is re-validated; the wizard resumes at the last
    /// step (in traversal order) that has a draft.
    pub async fn mount(
        config: WizardConfig,
        store: FormStore,
        gateway: Arc<dyn SubmissionGateway>,
    ) -> Self {
        let WizardConfig {
            sequencer,
            validator,
        } = config;
        let mut state = WizardState::fresh(sequencer.first());

        for (key, value) in store.load_all().await {
            if !sequencer.contains(&key) {
                debug!(step = %key, "Ignoring draft for a step this wizard does not have");
                continue;
            }
            let mut fields = match value {
                Value::Object(map) => map,
                other => {
                    warn!(step = %key, "Draft is not an object, discarding: {}", other);
                    continue;
                }
            };
            let step = StepKey::from(key);
            if let Some(schema) = validator.schema(step.as_str()) {
                schema.apply_mirrors(&mut fields);
            }
            let outcome = validator.validate(step.as_str(), &Value::Object(fields.clone()));
            state.validity.insert(step.clone(), outcome.is_valid);
            state.drafts.insert(step, fields);
        }

        state.current = sequencer
            .resume_point(state.drafts.keys().map(StepKey::as_str))
            .clone();
        info!(
            current = %state.current,
            drafts = state.drafts.len(),
            "Wizard mounted"
        );

        Self {
            sequencer,
            validator,
            store,
            gateway,
            state: RwLock::new(state),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    pub async fn current_step(&self) -> StepKey {
        self.state.read().await.current.clone()
    }

    pub async fn phase(&self) -> WizardPhase {
        self.state.read().await.phase
    }

    pub async fn state(&self) -> WizardState {
        self.state.read().await.clone()
    }

    /// Update one field of `step`'s draft and re-validate. Not persisted.
    pub async fn on_field_change(
        &self,
        step: &str,
        field: &str,
        value: Value,
    ) -> Result<ValidationOutcome, WizardError> {
        let mut fields = FieldMap::new();
        fields.insert(field.to_string(), value);
        self.update_fields(step, fields).await
    }

    /// Merge several fields into `step`'s draft and re-validate once.
    pub async fn update_fields(
        &self,
        step: &str,
        fields: FieldMap,
    ) -> Result<ValidationOutcome, WizardError> {
        let key = self.known_step(step)?;
        let mut state = self.state.write().await;
        ensure_open(&state)?;

        let draft = state.drafts.entry(key.clone()).or_default();
        draft.extend(fields);
        if let Some(schema) = self.validator.schema(step) {
            schema.apply_mirrors(draft);
        }
        let snapshot = Value::Object(draft.clone());

        let outcome = self.validator.validate(step, &snapshot);
        state.record(&key, &outcome);
        Ok(outcome)
    }

    /// Validate, save and advance. Invalid steps are neither saved nor left.
    pub async fn continue_step(&self, step: &str) -> Result<StepTransition, WizardError> {
        let key = self.known_step(step)?;
        let mut state = self.state.write().await;
        ensure_open(&state)?;
        if let Some(blocked) = not_current(&state, &key) {
            return Ok(blocked);
        }

        let draft = state.draft_value(step);
        let outcome = self.validator.validate(step, &draft);
        state.record(&key, &outcome);
        if !outcome.is_valid {
            info!(step, errors = outcome.errors.len(), "Continue rejected");
            return Ok(StepTransition::Rejected {
                errors: outcome.errors,
            });
        }

        self.store.save(step, &draft).await;
        Ok(self.advance(&mut state, &key))
    }

    /// Save the draft as-is and advance, valid or not.
    pub async fn skip_step(&self, step: &str) -> Result<StepTransition, WizardError> {
        let key = self.known_step(step)?;
        let mut state = self.state.write().await;
        ensure_open(&state)?;
        if let Some(blocked) = not_current(&state, &key) {
            return Ok(blocked);
        }

        let draft = state.draft_value(step);
        let outcome = self.validator.validate(step, &draft);
        state.validity.insert(key.clone(), outcome.is_valid);
        self.store.save(step, &draft).await;
        info!(step, valid = outcome.is_valid, "Step skipped");
        Ok(self.advance(&mut state, &key))
    }

    /// Move to `target` if the navigation rule allows it. The current draft
    /// is persisted either way.
    pub async fn jump_to_step(&self, target: &str) -> Result<JumpOutcome, WizardError> {
        let target = self.known_step(target)?;
        let mut state = self.state.write().await;
        ensure_open(&state)?;

        let current = state.current.clone();
        let draft = state.draft_value(current.as_str());
        if state.drafts.contains_key(&current) {
            self.store.save(current.as_str(), &draft).await;
        }

        let is_valid = self.validator.validate(current.as_str(), &draft).is_valid;
        state.validity.insert(current.clone(), is_valid);

        if !self
            .sequencer
            .can_navigate(current.as_str(), target.as_str(), is_valid)
        {
            info!(from = %current, to = %target, "Jump blocked");
            return Ok(JumpOutcome::Blocked {
                advisory: BLOCKED_ADVISORY.to_string(),
            });
        }

        info!(from = %current, to = %target, "Jumped to step");
        state.current = target.clone();
        Ok(JumpOutcome::Moved { to: target })
    }

    /// Submit every saved draft through the gateway.
    ///
    /// Rejected without a gateway call unless the last step is valid. A call
    /// made while another submission is pending returns
    /// [`SubmitOutcome::AlreadyInFlight`].
    pub async fn submit(&self) -> Result<SubmitOutcome, WizardError> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Submission already in flight");
            return Ok(SubmitOutcome::AlreadyInFlight);
        }
        let _in_flight = InFlight(&self.submitting);

        let last = self.sequencer.last().clone();
        {
            let mut state = self.state.write().await;
            ensure_open(&state)?;

            let draft = state.draft_value(last.as_str());
            let outcome = self.validator.validate(last.as_str(), &draft);
            state.record(&last, &outcome);
            if !outcome.is_valid {
                info!(step = %last, "Submit rejected, last step is invalid");
                return Ok(SubmitOutcome::Rejected {
                    errors: outcome.errors,
                });
            }
            self.store.save(last.as_str(), &draft).await;
            state.phase = WizardPhase::Submitting;
        }

        let drafts = self.store.load_all().await;
        for (key, value) in &drafts {
            if !self.validator.validate(key, value).is_valid {
                warn!(step = %key, "Submitting a draft that did not pass validation");
            }
        }
        let aggregate = Aggregate::from_drafts(drafts);

        match self.gateway.write(&aggregate).await {
            Ok(()) => {
                self.store.clear().await;
                let mut state = self.state.write().await;
                *state = WizardState::fresh(self.sequencer.first());
                state.phase = WizardPhase::Submitted;
                info!(steps = aggregate.len(), "Wizard submitted");
                Ok(SubmitOutcome::Submitted)
            }
            Err(e) => {
                warn!("Failed to submit form data: {}", e);
                let mut state = self.state.write().await;
                state.phase = WizardPhase::Active;
                state.current = last;
                Err(WizardError::Gateway(e))
            }
        }
    }

    /// Drop every draft and start over at the first step.
    pub async fn cancel(&self) {
        self.store.clear().await;
        *self.state.write().await = WizardState::fresh(self.sequencer.first());
        info!("Wizard cancelled");
    }

    pub async fn snapshot(&self) -> WizardSnapshot {
        let state = self.state.read().await;
        let steps = self
            .sequencer
            .steps()
            .iter()
            .map(|step| StepStatus {
                key: step.key.clone(),
                label: step.label.clone(),
                ordinal: step.ordinal,
                is_valid: state.validity.get(&step.key).copied().unwrap_or(false),
                is_current: step.key == state.current,
            })
            .collect();
        WizardSnapshot {
            current: state.current.clone(),
            phase: state.phase,
            steps,
            drafts: state.drafts.clone(),
            errors: state.errors.clone(),
        }
    }

    fn known_step(&self, step: &str) -> Result<StepKey, WizardError> {
        self.sequencer
            .step(step)
            .map(|s| s.key.clone())
            .ok_or_else(|| WizardError::UnknownStep(step.to_string()))
    }

    fn advance(&self, state: &mut WizardState, from: &StepKey) -> StepTransition {
        match self.sequencer.next(from.as_str()) {
            Some(Next::Step(to)) => {
                info!(from = %from, to = %to, "Advanced");
                state.current = to.clone();
                StepTransition::Advanced { to }
            }
            _ => {
                state.current = from.clone();
                StepTransition::AtLastStep
            }
        }
    }
}

fn not_current(state: &WizardState, step: &StepKey) -> Option<StepTransition> {
    if *step == state.current {
        return None;
    }
    info!(step = %step, current = %state.current, "Step is not current, ignoring");
    Some(StepTransition::Blocked {
        advisory: NOT_CURRENT_ADVISORY.to_string(),
    })
}

fn ensure_open(state: &WizardState) -> Result<(), WizardError> {
    match state.phase {
        WizardPhase::Submitted => Err(WizardError::AlreadySubmitted),
        _ => Ok(()),
    }
}
