//! Step runner.
//!
//! A run keeps a stack of the steps it has executed.  Each step returns a
//! [`Step`] directive:
//!
//! - `Next(step)` pushes and runs `step`
//! - `Complete` ends the run normally
//! - `Back` drops the current step and re-runs the one before it; backing
//!   out of the first step aborts the run
//! - `Resume` re-runs the current step
//! - `Cancel` clears the stack and aborts the run
//!
//! A step error aborts the run and is returned to the caller.

use crate::wizard::error::WizardResult;
use crate::wizard::host::{PromptHost, ResumePolicy};
use crate::wizard::input::MultiStepInput;
use crate::wizard::types::Flow;
use std::sync::Arc;

/// One step of a flow over caller-owned state `S`.
#[async_trait::async_trait]
pub trait InputStep<S: Send>: Send + Sync {
    async fn run(&self, input: &mut MultiStepInput, state: &mut S) -> WizardResult<Step<S>>;
}

/// Directive returned by a step.
pub enum Step<S> {
    Next(Arc<dyn InputStep<S>>),
    Complete,
    Back,
    Cancel,
    Resume,
}

impl<S> Step<S> {
    pub fn next(step: impl InputStep<S> + 'static) -> Self
    where
        S: Send,
    {
        Self::Next(Arc::new(step))
    }
}

impl<S> From<Flow> for Step<S> {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Back => Self::Back,
            Flow::Cancel => Self::Cancel,
            Flow::Resume => Self::Resume,
        }
    }
}

impl<S> std::fmt::Debug for Step<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Next(_) => f.write_str("Next(..)"),
            Self::Complete => f.write_str("Complete"),
            Self::Back => f.write_str("Back"),
            Self::Cancel => f.write_str("Cancel"),
            Self::Resume => f.write_str("Resume"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardOutcome {
    Completed,
    /// Cancelled, or backed out of the first step.  State is partial.
    Aborted,
}

pub struct Wizard<S: Send> {
    input: MultiStepInput,
    steps: Vec<Arc<dyn InputStep<S>>>,
}

impl<S: Send> Wizard<S> {
    pub fn new(host: Arc<dyn PromptHost>, resume: Arc<dyn ResumePolicy>) -> Self {
        Self {
            input: MultiStepInput::new(host, resume),
            steps: Vec::new(),
        }
    }

    /// Run the flow starting at `start`, mutating `state` in place.
    pub async fn run(mut self, start: Arc<dyn InputStep<S>>, state: &mut S) -> WizardResult<WizardOutcome> {
        let mut step = start;
        let result = loop {
            self.steps.push(step.clone());
            self.input.set_depth(self.steps.len());
            self.input.suspend_current();

            let directive = match step.run(&mut self.input, state).await {
                Ok(directive) => directive,
                Err(e) => break Err(e),
            };
            log::trace!("wizard step {} -> {:?}", self.steps.len(), directive);

            match directive {
                Step::Next(next) => step = next,
                Step::Complete => break Ok(WizardOutcome::Completed),
                Step::Back => {
                    self.steps.pop();
                    match self.steps.pop() {
                        Some(previous) => step = previous,
                        None => break Ok(WizardOutcome::Aborted),
                    }
                }
                Step::Resume => match self.steps.pop() {
                    Some(current) => step = current,
                    None => break Ok(WizardOutcome::Aborted),
                },
                Step::Cancel => {
                    self.steps.clear();
                    break Ok(WizardOutcome::Aborted);
                }
            }
        };
        self.input.dispose_current();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::error::WizardError;
    use crate::wizard::host::{NeverResume, WidgetEvent};
    use crate::wizard::scripted::{Scripted, ScriptedPrompts};
    use crate::wizard::types::*;

    /// Each step records its name, asks one quick pick, and moves on.
    struct Named {
        name: &'static str,
        next: Option<fn() -> Step<Vec<&'static str>>>,
    }

    #[async_trait::async_trait]
    impl InputStep<Vec<&'static str>> for Named {
        async fn run(
            &self,
            input: &mut MultiStepInput,
            state: &mut Vec<&'static str>,
        ) -> WizardResult<Step<Vec<&'static str>>> {
            state.push(self.name);
            let reply = input
                .show_quick_pick(QuickPickParams::new(self.name, vec![QuickPickItem::new("x")]))
                .await;
            match reply {
                Reply::Flow(flow) => Ok(flow.into()),
                _ => Ok(match self.next {
                    Some(next) => next(),
                    None => Step::Complete,
                }),
            }
        }
    }

    fn second() -> Step<Vec<&'static str>> {
        Step::next(Named { name: "second", next: Some(third) })
    }

    fn third() -> Step<Vec<&'static str>> {
        Step::next(Named { name: "third", next: None })
    }

    fn first() -> Arc<dyn InputStep<Vec<&'static str>>> {
        Arc::new(Named { name: "first", next: Some(second) })
    }

    fn pick() -> Scripted {
        Scripted::Event(WidgetEvent::Selected(Some(0)))
    }

    fn back() -> Scripted {
        Scripted::Event(WidgetEvent::ButtonTriggered(QuickInputButton::back()))
    }

    async fn run(script: Vec<Scripted>) -> (WizardResult<WizardOutcome>, Vec<&'static str>, Arc<ScriptedPrompts>) {
        let host = ScriptedPrompts::new(script);
        let wizard = Wizard::new(host.clone(), Arc::new(NeverResume));
        let mut state = Vec::new();
        let outcome = wizard.run(first(), &mut state).await;
        (outcome, state, host)
    }

    #[tokio::test]
    async fn test_runs_to_completion() {
        let (outcome, visited, host) = run(vec![pick(), pick(), pick()]).await;
        assert_eq!(outcome, Ok(WizardOutcome::Completed));
        assert_eq!(visited, vec!["first", "second", "third"]);
        assert_eq!(host.live(), 0);
        assert_eq!(host.max_live(), 1);
    }

    #[tokio::test]
    async fn test_back_reruns_previous_step() {
        let (outcome, visited, _) = run(vec![pick(), pick(), back(), pick(), pick()]).await;
        assert_eq!(outcome, Ok(WizardOutcome::Completed));
        assert_eq!(visited, vec!["first", "second", "third", "second", "third"]);
    }

    #[tokio::test]
    async fn test_back_from_first_step_aborts() {
        let (outcome, visited, host) = run(vec![back()]).await;
        assert_eq!(outcome, Ok(WizardOutcome::Aborted));
        assert_eq!(visited, vec!["first"]);
        assert_eq!(host.live(), 0);
    }

    #[tokio::test]
    async fn test_dismiss_cancels_whole_run() {
        let (outcome, visited, host) = run(vec![pick(), Scripted::Event(WidgetEvent::Hidden)]).await;
        assert_eq!(outcome, Ok(WizardOutcome::Aborted));
        assert_eq!(visited, vec!["first", "second"]);
        assert_eq!(host.live(), 0);
    }

    #[tokio::test]
    async fn test_resume_reruns_same_step() {
        let host = ScriptedPrompts::new(vec![pick(), Scripted::Event(WidgetEvent::Hidden), pick(), pick()]);
        let wizard = Wizard::new(host.clone(), Arc::new(crate::wizard::ResumeBudget::new(1)));
        let mut visited = Vec::new();
        let outcome = wizard.run(first(), &mut visited).await;
        assert_eq!(outcome, Ok(WizardOutcome::Completed));
        assert_eq!(visited, vec!["first", "second", "second", "third"]);
    }

    #[tokio::test]
    async fn test_previous_widget_suspended_before_next_step() {
        let (_, _, host) = run(vec![pick(), pick(), pick()]).await;
        let journal = host.journal();
        use crate::wizard::scripted::WidgetLog;
        let disabled = journal.iter().position(|e| *e == WidgetLog::Enabled(0, false)).unwrap();
        let busy = journal.iter().position(|e| *e == WidgetLog::Busy(0, true)).unwrap();
        let created_next = journal.iter().position(|e| matches!(e, WidgetLog::Created(1, _))).unwrap();
        assert!(disabled < created_next);
        assert!(busy < created_next);
    }

    struct Failing;

    #[async_trait::async_trait]
    impl InputStep<Vec<&'static str>> for Failing {
        async fn run(
            &self,
            _input: &mut MultiStepInput,
            _state: &mut Vec<&'static str>,
        ) -> WizardResult<Step<Vec<&'static str>>> {
            Err(WizardError::new("enumeration failed").in_step("failing"))
        }
    }

    #[tokio::test]
    async fn test_step_error_propagates() {
        let host = ScriptedPrompts::new(vec![]);
        let wizard = Wizard::new(host, Arc::new(NeverResume));
        let mut state = Vec::new();
        let err = wizard.run(Arc::new(Failing), &mut state).await.unwrap_err();
        assert_eq!(err.message, "enumeration failed");
        assert_eq!(err.step.as_deref(), Some("failing"));
    }
}
