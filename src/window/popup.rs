//! Popup heuristic for `window.open`

use serde::Serialize;

use super::features::FeatureMap;

/// Whether a new navigable is displayed as a popup or as a tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PopupDecision {
    Popup,
    #[default]
    Tab,
}

impl PopupDecision {
    pub fn is_popup(&self) -> bool {
        matches!(self, PopupDecision::Popup)
    }
}

/// Parse a feature value as a boolean.
///
/// `""`, `"yes"` and `"true"` are true; anything else is parsed as an
/// integer (0 if it does not parse) and is true when nonzero.
pub fn parse_boolean_feature(value: &str) -> bool {
    if value.is_empty() || value == "yes" || value == "true" {
        return true;
    }
    value.parse::<i64>().unwrap_or(0) != 0
}

fn feature_is_set(features: &FeatureMap, name: &str, default: bool) -> bool {
    features
        .get(name)
        .map(parse_boolean_feature)
        .unwrap_or(default)
}

/// Decide whether a popup window is requested by `features`
pub fn check_if_a_popup_window_is_requested(features: &FeatureMap) -> PopupDecision {
    if features.is_empty() {
        return PopupDecision::Tab;
    }

    if let Some(popup) = features.get("popup") {
        return if parse_boolean_feature(popup) {
            PopupDecision::Popup
        } else {
            PopupDecision::Tab
        };
    }

    let location = feature_is_set(features, "location", false);
    let toolbar = feature_is_set(features, "toolbar", false);
    if !location && !toolbar {
        return PopupDecision::Popup;
    }

    let requested = !feature_is_set(features, "menubar", false)
        || !feature_is_set(features, "resizable", true)
        || !feature_is_set(features, "scrollbars", false)
        || !feature_is_set(features, "status", false);

    if requested {
        PopupDecision::Popup
    } else {
        PopupDecision::Tab
    }
}
