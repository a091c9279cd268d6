//! Wizard crate: sub-modules.

pub mod types;
pub mod error;
pub mod host;
pub mod input;
pub mod engine;
pub mod scripted;

// Re-export top-level items for convenience.
pub use types::*;
pub use error::{WizardError, WizardResult};
pub use host::{NeverResume, PromptHost, PromptWidget, ResumeBudget, ResumePolicy, WidgetEvent, WidgetKind, WidgetSpec};
pub use input::MultiStepInput;
pub use engine::{InputStep, Step, Wizard, WizardOutcome};
