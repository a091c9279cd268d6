//! Scripted prompt host.
//!
//! Replays a fixed sequence of widget events across every widget it
//! creates and journals the widget lifecycle.  When the script runs dry
//! the live widget reports `Hidden`.

use crate::wizard::host::{PromptHost, PromptWidget, WidgetEvent, WidgetSpec};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One entry of the script.
#[derive(Debug, Clone)]
pub enum Scripted {
    Event(WidgetEvent),
    /// Let time pass before the next event (useful with paused tokio time).
    Pause(Duration),
}

/// Widget lifecycle journal entry; the `usize` is the widget's creation index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetLog {
    Created(usize, String),
    Shown(usize),
    Enabled(usize, bool),
    Busy(usize, bool),
    Validation(usize, Option<String>),
    Disposed(usize),
}

#[derive(Default)]
struct Shared {
    script: Mutex<VecDeque<Scripted>>,
    journal: Mutex<Vec<WidgetLog>>,
    specs: Mutex<Vec<WidgetSpec>>,
    created: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

impl Shared {
    fn log(&self, entry: WidgetLog) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(entry);
        }
    }
}

pub struct ScriptedPrompts {
    shared: Arc<Shared>,
}

impl ScriptedPrompts {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        let shared = Shared {
            script: Mutex::new(script.into()),
            ..Default::default()
        };
        Arc::new(Self {
            shared: Arc::new(shared),
        })
    }

    /// Convenience: a script made only of events.
    pub fn events(events: Vec<WidgetEvent>) -> Arc<Self> {
        Self::new(events.into_iter().map(Scripted::Event).collect())
    }

    /// Append more events to the script.
    pub fn push(&self, entry: Scripted) {
        if let Ok(mut script) = self.shared.script.lock() {
            script.push_back(entry);
        }
    }

    pub fn journal(&self) -> Vec<WidgetLog> {
        self.shared.journal.lock().map(|j| j.clone()).unwrap_or_default()
    }

    /// Specs of every widget created so far, in creation order.
    pub fn specs(&self) -> Vec<WidgetSpec> {
        self.shared.specs.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn created(&self) -> usize {
        self.shared.created.load(Ordering::SeqCst)
    }

    /// Widgets shown and not yet disposed.
    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live widgets observed.
    pub fn max_live(&self) -> usize {
        self.shared.max_live.load(Ordering::SeqCst)
    }

    /// Script entries not consumed yet.
    pub fn remaining(&self) -> usize {
        self.shared.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl PromptHost for ScriptedPrompts {
    fn create_widget(&self, spec: WidgetSpec) -> Box<dyn PromptWidget> {
        let id = self.shared.created.fetch_add(1, Ordering::SeqCst);
        self.shared.log(WidgetLog::Created(id, spec.title.clone()));
        if let Ok(mut specs) = self.shared.specs.lock() {
            specs.push(spec);
        }
        Box::new(ScriptedWidget {
            id,
            shared: self.shared.clone(),
            shown: false,
            disposed: false,
        })
    }
}

struct ScriptedWidget {
    id: usize,
    shared: Arc<Shared>,
    shown: bool,
    disposed: bool,
}

impl ScriptedWidget {
    fn pop(&self) -> Option<Scripted> {
        self.shared.script.lock().ok().and_then(|mut s| s.pop_front())
    }
}

#[async_trait::async_trait]
impl PromptWidget for ScriptedWidget {
    fn set_enabled(&mut self, enabled: bool) {
        self.shared.log(WidgetLog::Enabled(self.id, enabled));
    }

    fn set_busy(&mut self, busy: bool) {
        self.shared.log(WidgetLog::Busy(self.id, busy));
    }

    fn set_validation_message(&mut self, message: Option<String>) {
        self.shared.log(WidgetLog::Validation(self.id, message));
    }

    fn show(&mut self) {
        if self.shown {
            return;
        }
        self.shown = true;
        let live = self.shared.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.max_live.fetch_max(live, Ordering::SeqCst);
        self.shared.log(WidgetLog::Shown(self.id));
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if self.shown {
            self.shared.live.fetch_sub(1, Ordering::SeqCst);
        }
        self.shared.log(WidgetLog::Disposed(self.id));
    }

    async fn next_event(&mut self) -> WidgetEvent {
        loop {
            match self.pop() {
                Some(Scripted::Event(event)) => return event,
                Some(Scripted::Pause(duration)) => tokio::time::sleep(duration).await,
                None => return WidgetEvent::Hidden,
            }
        }
    }
}

impl Drop for ScriptedWidget {
    fn drop(&mut self) {
        self.dispose();
    }
}
