//! Prompt helpers handed to every step.
//!
//! `MultiStepInput` owns the single live widget.  Showing a new prompt
//! disposes the previous one first, so at most one interactive prompt
//! exists at any time.

use crate::wizard::host::{PromptHost, PromptWidget, ResumePolicy, WidgetEvent, WidgetKind, WidgetSpec};
use crate::wizard::types::*;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Validation started for one input value.
struct PendingValidation {
    generation: u64,
    future: BoxFuture<'static, Option<String>>,
}

/// Resolve the pending validation, or never resolve if there is none.
async fn settle(pending: &mut Option<PendingValidation>) -> (u64, Option<String>) {
    match pending {
        Some(p) => {
            let message = (&mut p.future).await;
            (p.generation, message)
        }
        None => std::future::pending().await,
    }
}

enum InputBoxEvent {
    Widget(WidgetEvent),
    Validated(u64, Option<String>),
}

pub struct MultiStepInput {
    host: Arc<dyn PromptHost>,
    resume: Arc<dyn ResumePolicy>,
    current: Option<Box<dyn PromptWidget>>,
    depth: usize,
}

impl MultiStepInput {
    pub fn new(host: Arc<dyn PromptHost>, resume: Arc<dyn ResumePolicy>) -> Self {
        Self {
            host,
            resume,
            current: None,
            depth: 0,
        }
    }

    /// Number of steps currently on the engine's stack.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    /// Freeze the live widget while the next step prepares its prompt.
    pub(crate) fn suspend_current(&mut self) {
        if let Some(widget) = self.current.as_mut() {
            widget.set_enabled(false);
            widget.set_busy(true);
        }
    }

    pub(crate) fn dispose_current(&mut self) {
        if let Some(mut widget) = self.current.take() {
            widget.dispose();
        }
    }

    fn buttons(&self, extra: &[QuickInputButton]) -> Vec<QuickInputButton> {
        let mut buttons = Vec::with_capacity(extra.len() + 1);
        if self.depth > 1 {
            buttons.push(QuickInputButton::back());
        }
        buttons.extend(extra.iter().cloned());
        buttons
    }

    fn install(&mut self, spec: WidgetSpec) {
        let mut widget = self.host.create_widget(spec);
        self.dispose_current();
        widget.show();
        self.current = Some(widget);
    }

    async fn next_event(&mut self) -> WidgetEvent {
        match self.current.as_mut() {
            Some(widget) => widget.next_event().await,
            None => WidgetEvent::Hidden,
        }
    }

    fn with_current(&mut self, f: impl FnOnce(&mut dyn PromptWidget)) {
        if let Some(widget) = self.current.as_mut() {
            f(widget.as_mut());
        }
    }

    /// Ask the resume policy what a dismissal means.  Only the policy
    /// handle is carried into the future; the widget box is not `Sync`.
    fn dismissed(&self) -> impl std::future::Future<Output = Flow> + Send + 'static {
        let resume = self.resume.clone();
        async move {
            if resume.should_resume().await {
                Flow::Resume
            } else {
                Flow::Cancel
            }
        }
    }

    /// Show a quick pick and wait for a selection.
    ///
    /// `Reply::Value(None)` means the user accepted without selecting.
    pub async fn show_quick_pick(&mut self, params: QuickPickParams) -> Reply<Option<QuickPickItem>> {
        let items = params.items.clone();
        let spec = WidgetSpec {
            kind: WidgetKind::QuickPick {
                items: params.items,
                active_item: params.active_item,
                placeholder: params.placeholder,
            },
            title: params.title,
            step: params.step,
            total_steps: params.total_steps,
            buttons: self.buttons(&params.buttons),
            ignore_focus_out: true,
        };
        self.install(spec);

        loop {
            match self.next_event().await {
                WidgetEvent::Selected(index) => {
                    return Reply::Value(index.and_then(|i| items.get(i).cloned()));
                }
                WidgetEvent::ButtonTriggered(button) if button.is_back() => {
                    return Reply::Flow(Flow::Back);
                }
                WidgetEvent::ButtonTriggered(button) => return Reply::Button(button),
                WidgetEvent::Hidden => return Reply::Flow(self.dismissed().await),
                WidgetEvent::ValueChanged(_) | WidgetEvent::Accepted(_) => {}
            }
        }
    }

    /// Show an input box and wait for an accepted, valid value.
    ///
    /// Validation runs on every change; only the result for the latest
    /// value is applied, earlier ones are dropped unapplied.
    pub async fn show_input_box(&mut self, params: InputBoxParams) -> Reply<String> {
        let validate = params.validate.clone();
        let spec = WidgetSpec {
            kind: WidgetKind::InputBox {
                value: params.value,
                prompt: params.prompt,
            },
            title: params.title,
            step: params.step,
            total_steps: params.total_steps,
            buttons: self.buttons(&params.buttons),
            ignore_focus_out: true,
        };
        self.install(spec);

        let mut generation: u64 = 0;
        let mut pending = Some(PendingValidation {
            generation,
            future: validate(String::new()),
        });

        loop {
            let event = tokio::select! {
                event = self.next_event() => InputBoxEvent::Widget(event),
                (settled, message) = settle(&mut pending) => InputBoxEvent::Validated(settled, message),
            };

            match event {
                InputBoxEvent::Validated(settled, message) => {
                    pending = None;
                    if settled == generation {
                        self.with_current(|w| w.set_validation_message(message));
                    }
                }
                InputBoxEvent::Widget(WidgetEvent::ValueChanged(text)) => {
                    generation += 1;
                    pending = Some(PendingValidation {
                        generation,
                        future: validate(text),
                    });
                }
                InputBoxEvent::Widget(WidgetEvent::Accepted(value)) => {
                    self.with_current(|w| {
                        w.set_enabled(false);
                        w.set_busy(true);
                    });
                    let message = validate(value.clone()).await;
                    if message.is_none() {
                        return Reply::Value(value);
                    }
                    self.with_current(|w| {
                        w.set_validation_message(message);
                        w.set_enabled(true);
                        w.set_busy(false);
                    });
                }
                InputBoxEvent::Widget(WidgetEvent::ButtonTriggered(button)) if button.is_back() => {
                    return Reply::Flow(Flow::Back);
                }
                InputBoxEvent::Widget(WidgetEvent::ButtonTriggered(button)) => {
                    return Reply::Button(button);
                }
                InputBoxEvent::Widget(WidgetEvent::Hidden) => {
                    return Reply::Flow(self.dismissed().await);
                }
                InputBoxEvent::Widget(WidgetEvent::Selected(_)) => {}
            }
        }
    }
}

impl Drop for MultiStepInput {
    fn drop(&mut self) {
        self.dispose_current();
    }
}
