//! # Group Filtering
//!
//! Hidden groups have their layers cleared outright, which keeps memory and
//! CPU bounded on continuously streaming layers. Shown groups are left alone:
//! there is no backfill, a feature comes back with its next `Current` event.
//! The `"manual"` group is the exception. Its features are user-authored, so
//! they are hidden or shown one by one and never dropped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::feature::{FeatureId, TypeTag};
use crate::core::handlers::MANUAL_GROUP;
use crate::core::registry::LayerRegistry;
use crate::core::render::LayerId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    pub group_tag: String,
    pub show: bool,
    #[serde(default)]
    pub child_type_tags: Vec<TypeTag>,
}

/// One step of a filter pass, executed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    Evict { type_tag: TypeTag, layer: LayerId },
    Hide(FeatureId),
    Show(FeatureId),
}

/// Remembers which types are filtered out so their stream updates can be
/// dropped until the group is shown again.
#[derive(Debug, Default)]
pub struct FilterEngine {
    suppressed: HashSet<TypeTag>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether live updates for `type_tag` are currently filtered out.
    pub fn is_suppressed(&self, type_tag: &str) -> bool {
        self.suppressed.contains(type_tag)
    }

    /// Plans a filter pass over every registered handler.
    ///
    /// A handler belongs to the first group listing its type tag. Handlers in
    /// no group are untouched. Manual features are toggled individually when
    /// the configuration mentions the manual group.
    pub fn filter_tracks(
        &mut self,
        registry: &LayerRegistry,
        groups: &[FilterGroup],
        manual_features: &[FeatureId],
    ) -> Vec<FilterAction> {
        let mut actions = Vec::new();
        self.suppressed.clear();

        for handler in registry.handlers() {
            let Some(group) = groups
                .iter()
                .find(|g| g.child_type_tags.iter().any(|t| *t == handler.type_tag))
            else {
                continue;
            };
            if group.group_tag == MANUAL_GROUP || group.show {
                continue;
            }
            self.suppressed.insert(handler.type_tag.clone());
            actions.push(FilterAction::Evict {
                type_tag: handler.type_tag.clone(),
                layer: handler.layer,
            });
        }

        if let Some(manual) = groups.iter().find(|g| g.group_tag == MANUAL_GROUP) {
            actions.extend(manual_features.iter().map(|id| {
                if manual.show {
                    FilterAction::Show(id.clone())
                } else {
                    FilterAction::Hide(id.clone())
                }
            }));
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handlers::{maritime_registry, MARKER_TYPE};

    fn group(tag: &str, show: bool, children: &[&str]) -> FilterGroup {
        FilterGroup {
            group_tag: tag.to_string(),
            show,
            child_type_tags: children.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn hidden_group_evicts_each_child_layer() {
        let registry = maritime_registry().unwrap();
        let mut filters = FilterEngine::new();
        let mut actions = filters.filter_tracks(
            &registry,
            &[group("ais", false, &["ais", "sat-ais"]), group("air", true, &["adsb"])],
            &[],
        );
        actions.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
        assert_eq!(actions.len(), 2);
        assert!(filters.is_suppressed("ais"));
        assert!(filters.is_suppressed("sat-ais"));
        assert!(!filters.is_suppressed("adsb"));
    }

    #[test]
    fn manual_group_toggles_features_instead_of_evicting() {
        let registry = maritime_registry().unwrap();
        let mut filters = FilterEngine::new();
        let actions = filters.filter_tracks(
            &registry,
            &[group(MANUAL_GROUP, false, &[MARKER_TYPE])],
            &["m1".to_string(), "m2".to_string()],
        );
        assert_eq!(
            actions,
            vec![FilterAction::Hide("m1".into()), FilterAction::Hide("m2".into())]
        );
        assert!(!filters.is_suppressed(MARKER_TYPE));
    }

    #[test]
    fn showing_again_lifts_suppression() {
        let registry = maritime_registry().unwrap();
        let mut filters = FilterEngine::new();
        filters.filter_tracks(&registry, &[group("ais", false, &["ais"])], &[]);
        let actions = filters.filter_tracks(&registry, &[group("ais", true, &["ais"])], &[]);
        assert!(actions.is_empty());
        assert!(!filters.is_suppressed("ais"));
    }
}
