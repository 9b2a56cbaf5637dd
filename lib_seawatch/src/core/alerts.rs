//! # Alert Highlighter
//!
//! Keeps, per target lookup key, the set of active notices and the overlay
//! color they imply. A NEW notice anywhere in the bucket wins over ACK_WAIT;
//! an empty bucket is dropped and its overlay cleared, never left stale.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default overlay color for unacknowledged notices.
pub const NEW_COLOR: &str = "#ff0000";
/// Default overlay color for notices awaiting acknowledgement.
pub const ACK_WAIT_COLOR: &str = "#ffaaaa";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeAction {
    New,
    AckWait,
    Ack,
    Clear,
    /// Any action the highlighter does not act on.
    #[serde(other)]
    Other,
}

/// A notice event for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    /// MMSI or feature id of the target the notice is about.
    pub target_key: String,
    pub action: NoticeAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertColors {
    pub new: String,
    pub ack_wait: String,
}

impl Default for AlertColors {
    fn default() -> Self {
        Self {
            new: NEW_COLOR.to_string(),
            ack_wait: ACK_WAIT_COLOR.to_string(),
        }
    }
}

/// Overlay change for one lookup key. `color: None` means remove the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayUpdate {
    pub key: String,
    pub color: Option<String>,
}

#[derive(Debug, Default)]
pub struct AlertHighlighter {
    buckets: HashMap<String, HashMap<String, NoticeAction>>,
    colors: AlertColors,
}

impl AlertHighlighter {
    pub fn new(colors: AlertColors) -> Self {
        Self {
            buckets: HashMap::new(),
            colors,
        }
    }

    /// Applies a notice. Returns the overlay to write, or `None` when the
    /// action is ignored.
    pub fn update(&mut self, notice: &Notice) -> Option<OverlayUpdate> {
        match notice.action {
            NoticeAction::New | NoticeAction::AckWait => {
                self.buckets
                    .entry(notice.target_key.clone())
                    .or_default()
                    .insert(notice.id.clone(), notice.action);
            }
            NoticeAction::Ack | NoticeAction::Clear => {
                if let Some(bucket) = self.buckets.get_mut(&notice.target_key) {
                    bucket.remove(&notice.id);
                    if bucket.is_empty() {
                        self.buckets.remove(&notice.target_key);
                    }
                }
            }
            NoticeAction::Other => {
                log::debug!("Ignoring notice '{}' with unhandled action", notice.id);
                return None;
            }
        }
        Some(OverlayUpdate {
            key: notice.target_key.clone(),
            color: self.color_for(&notice.target_key).map(str::to_string),
        })
    }

    /// Aggregate overlay color for a lookup key.
    pub fn color_for(&self, key: &str) -> Option<&str> {
        let bucket = self.buckets.get(key)?;
        if bucket.values().any(|a| *a == NoticeAction::New) {
            Some(&self.colors.new)
        } else if bucket.values().any(|a| *a == NoticeAction::AckWait) {
            Some(&self.colors.ack_wait)
        } else {
            None
        }
    }

    /// Number of targets with at least one active notice.
    pub fn active_targets(&self) -> usize {
        self.buckets.len()
    }
}
