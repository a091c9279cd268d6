//! Wizard error type.
//!
//! Navigation (back / cancel / resume) is never an error; this type only
//! carries genuine step failures, which abort the run and reach the caller.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardError {
    /// Title of the step that failed, if known.
    pub step: Option<String>,
    pub message: String,
}

pub type WizardResult<T> = Result<T, WizardError>;

impl WizardError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            step: None,
            message: message.into(),
        }
    }

    pub fn in_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }
}

impl fmt::Display for WizardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step {
            Some(step) => write!(f, "[wizard step {}] {}", step, self.message),
            None => write!(f, "[wizard] {}", self.message),
        }
    }
}

impl std::error::Error for WizardError {}

impl From<WizardError> for String {
    fn from(e: WizardError) -> String {
        e.to_string()
    }
}
