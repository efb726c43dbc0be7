use serde::Serialize;

use crate::capture::types::ViewName;

/// A persisted view: its key inside the store and the URL it is served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    pub key: String,
    pub url: String,
}

/// URLs of the persisted views of one capture; `None` where the view failed or
/// could not be stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedViews {
    pub front: Option<String>,
    pub back: Option<String>,
}

impl PersistedViews {
    pub fn url(&self, view: ViewName) -> Option<&str> {
        match view {
            ViewName::Front => self.front.as_deref(),
            ViewName::Back => self.back.as_deref(),
        }
    }

    fn slot(&mut self, view: ViewName) -> &mut Option<String> {
        match view {
            ViewName::Front => &mut self.front,
            ViewName::Back => &mut self.back,
        }
    }

    pub(crate) fn set(&mut self, view: ViewName, url: String) {
        *self.slot(view) = Some(url);
    }
}

/// What the post-persistence cleanup step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Retention is disabled
    Skipped,
    Removed(usize),
    Failed(String),
}
