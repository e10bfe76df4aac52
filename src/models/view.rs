// Dashboard view state: what a client renders. Fed only by scheduler callbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DashboardView {
    /// No cycle has finished yet.
    Loading,
    Ready {
        snapshot: Snapshot,
        updated_at: DateTime<Utc>,
    },
    Failed {
        message: String,
        failed_at: DateTime<Utc>,
    },
}

impl DashboardView {
    pub fn ready(snapshot: Snapshot) -> Self {
        DashboardView::Ready {
            snapshot,
            updated_at: Utc::now(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        DashboardView::Failed {
            message: message.into(),
            failed_at: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            DashboardView::Ready { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }
}
