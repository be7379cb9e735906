use crate::core::models::ids::ItemId;

/// Result of a selection or visibility entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pass ran; `changed` lists every item whose flag flipped.
    Applied { changed: Vec<ItemId> },
    /// The target id did not resolve to an item. Nothing was touched.
    NotFound,
    /// Another sync was already in progress. Nothing was touched.
    Rejected,
}

impl SyncOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied { .. })
    }

    pub fn changed(&self) -> &[ItemId] {
        match self {
            SyncOutcome::Applied { changed } => changed,
            _ => &[],
        }
    }

    pub fn needs_redraw(&self) -> bool {
        !self.changed().is_empty()
    }
}

/// Result of a throttled inbound reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileRun {
    /// Too soon after the previous run.
    Throttled,
    /// Another sync was already in progress.
    Rejected,
    Completed { changed: Vec<ItemId> },
}

impl ReconcileRun {
    pub fn ran(&self) -> bool {
        matches!(self, ReconcileRun::Completed { .. })
    }

    pub fn changed(&self) -> &[ItemId] {
        match self {
            ReconcileRun::Completed { changed } => changed,
            _ => &[],
        }
    }

    pub fn changed_any(&self) -> bool {
        !self.changed().is_empty()
    }
}

/// Records an id once, keeping first-change order.
pub(crate) fn note_change(changed: &mut Vec<ItemId>, id: &ItemId) {
    if !changed.contains(id) {
        changed.push(id.clone());
    }
}
