//! Multi-step wizard — steps, schemas, validation, navigation and the
//! controller tying them together.

pub mod controller;
pub mod payload;
pub mod routes;
pub mod schema;
pub mod sequencer;
pub mod step;
pub mod validator;

pub use controller::{
    JumpOutcome, StepTransition, SubmitOutcome, WizardConfig, WizardController, WizardPhase,
    WizardSnapshot, WizardState,
};
pub use payload::{Aggregate, FieldMap, StepPayload};
pub use routes::{WizardRouteState, wizard_routes};
pub use schema::{FieldKind, FieldRule, Requirement, StepSchema};
pub use sequencer::{Next, StepSequencer};
pub use step::{Step, StepKey};
pub use validator::{StepValidator, ValidationOutcome};
