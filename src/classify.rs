//! VPAID delivery and skippability rules.
//!
//! Both classifications are pure functions of the terminal document's facts.

use crate::models::{MediaEntry, TrackingEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

const FLASH_TYPES: [&str; 2] = ["application/x-shockwave-flash", "video/x-flv"];
const JS_TYPES: [&str; 2] = ["application/x-javascript", "application/javascript"];

/// How the ad's interactive layer is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VpaidCategory {
    #[serde(rename = "flash_js_vpaid")]
    FlashAndJs,
    #[serde(rename = "flash_vpaid")]
    FlashOnly,
    #[serde(rename = "js_vpaid")]
    JsOnly,
    #[serde(rename = "neither")]
    Neither,
}

impl VpaidCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VpaidCategory::FlashAndJs => "flash_js_vpaid",
            VpaidCategory::FlashOnly => "flash_vpaid",
            VpaidCategory::JsOnly => "js_vpaid",
            VpaidCategory::Neither => "neither",
        }
    }
}

impl fmt::Display for VpaidCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which evidence decides skippability for a VAST version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipRule {
    /// VAST 2.0 / 2.0.1: a `skip` tracking event
    TrackingEvent,
    /// VAST 3.0: a `skipoffset` on the linear creative
    SkipOffset,
}

pub fn skip_rule(version: &str) -> Option<SkipRule> {
    match version {
        "2.0" | "2.0.1" => Some(SkipRule::TrackingEvent),
        "3.0" => Some(SkipRule::SkipOffset),
        _ => None,
    }
}

fn matches_any(value: &str, candidates: &[&str]) -> bool {
    candidates
        .iter()
        .any(|candidate| value.eq_ignore_ascii_case(candidate))
}

fn is_flash_vpaid(entry: &MediaEntry) -> bool {
    let is_vpaid_api = entry
        .api_framework
        .as_deref()
        .is_some_and(|api| api.eq_ignore_ascii_case("VPAID"));
    is_vpaid_api && matches_any(&entry.delivery_type, &FLASH_TYPES)
}

// Any javascript media counts, with or without apiFramework="VPAID"
fn is_js(entry: &MediaEntry) -> bool {
    matches_any(&entry.delivery_type, &JS_TYPES)
}

/// Categorize the VPAID delivery of a set of media entries
pub fn classify(entries: &[MediaEntry]) -> VpaidCategory {
    let has_flash_vpaid = entries.iter().any(is_flash_vpaid);
    let has_js = entries.iter().any(is_js);

    match (has_flash_vpaid, has_js) {
        (true, true) => VpaidCategory::FlashAndJs,
        (true, false) => VpaidCategory::FlashOnly,
        (false, true) => VpaidCategory::JsOnly,
        (false, false) => VpaidCategory::Neither,
    }
}

/// Decide whether the ad can be skipped.
///
/// Versions without a rule are never skippable; see [`skip_rule`].
pub fn is_skippable(
    version: &str,
    tracking_events: &[TrackingEvent],
    primary_skip_offset: Option<&str>,
) -> bool {
    match skip_rule(version) {
        Some(SkipRule::TrackingEvent) => tracking_events.iter().any(|event| {
            event
                .event_name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case("skip"))
        }),
        Some(SkipRule::SkipOffset) => primary_skip_offset.is_some(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn flash_vpaid() -> MediaEntry {
        MediaEntry::new("application/x-shockwave-flash", Some("VPAID"))
    }

    #[test]
    fn flash_and_js() {
        let entries = vec![flash_vpaid(), MediaEntry::new("application/javascript", None)];
        assert_eq!(classify(&entries), VpaidCategory::FlashAndJs);
    }

    #[test]
    fn flv_vpaid_is_flash_only() {
        let entries = vec![MediaEntry::new("video/x-flv", Some("VPAID"))];
        assert_eq!(classify(&entries), VpaidCategory::FlashOnly);
    }

    #[test]
    fn javascript_without_framework_is_js_only() {
        let entries = vec![MediaEntry::new("application/x-javascript", None)];
        assert_eq!(classify(&entries), VpaidCategory::JsOnly);
    }

    #[test]
    fn flash_without_vpaid_framework_is_neither() {
        let entries = vec![
            MediaEntry::new("application/x-shockwave-flash", None),
            MediaEntry::new("video/x-flv", Some("clickthrough")),
            MediaEntry::new("video/mp4", Some("VPAID")),
        ];
        assert_eq!(classify(&entries), VpaidCategory::Neither);
    }

    #[test]
    fn no_entries_is_neither() {
        assert_eq!(classify(&[]), VpaidCategory::Neither);
    }

    #[test]
    fn matching_ignores_case() {
        let entries = vec![
            MediaEntry::new("Application/X-Shockwave-Flash", Some("vpaid")),
            MediaEntry::new("APPLICATION/JAVASCRIPT", None),
        ];
        assert_eq!(classify(&entries), VpaidCategory::FlashAndJs);
    }

    #[test]
    fn category_names() {
        assert_eq!(VpaidCategory::FlashAndJs.to_string(), "flash_js_vpaid");
        assert_eq!(
            serde_json::to_string(&VpaidCategory::JsOnly).unwrap(),
            "\"js_vpaid\""
        );
    }

    #[test]
    fn vast_2_skip_event() {
        let events = vec![TrackingEvent::named("start"), TrackingEvent::named("skip")];
        assert!(is_skippable("2.0", &events, None));
        assert!(is_skippable("2.0.1", &events, None));

        let events = vec![TrackingEvent::named("start")];
        assert!(!is_skippable("2.0", &events, None));
        assert!(!is_skippable("2.0", &[], None));
    }

    #[test]
    fn vast_2_ignores_skip_offset() {
        assert!(!is_skippable("2.0", &[], Some("00:00:05")));
    }

    #[test]
    fn vast_3_skip_offset() {
        assert!(is_skippable("3.0", &[], Some("00:00:05")));
        assert!(is_skippable("3.0", &[], Some("")));
        assert!(!is_skippable("3.0", &[TrackingEvent::named("skip")], None));
    }

    #[test]
    fn unknown_versions_are_not_skippable() {
        let events = vec![TrackingEvent::named("skip")];
        assert!(!is_skippable("4.0", &events, Some("00:00:05")));
        assert!(!is_skippable("1.0", &events, Some("00:00:05")));
        assert_eq!(skip_rule("4.2"), None);
    }

    fn entry_strategy() -> impl Strategy<Value = MediaEntry> {
        let types = prop::sample::select(vec![
            "application/x-shockwave-flash",
            "video/x-flv",
            "application/x-javascript",
            "application/javascript",
            "video/mp4",
            "",
        ]);
        let frameworks = prop::option::of(prop::sample::select(vec!["VPAID", "vpaid", "other"]));
        (types, frameworks).prop_map(|(t, f)| MediaEntry::new(t, f))
    }

    proptest! {
        #[test]
        fn classify_is_order_independent(
            entries in prop::collection::vec(entry_strategy(), 0..8),
        ) {
            let mut reversed = entries.clone();
            reversed.reverse();
            let mut rotated = entries.clone();
            if !rotated.is_empty() {
                rotated.rotate_left(1);
            }
            let expected = classify(&entries);
            prop_assert_eq!(classify(&reversed), expected);
            prop_assert_eq!(classify(&rotated), expected);
            prop_assert_eq!(classify(&entries), expected);
        }

        #[test]
        fn skippable_is_deterministic(
            version in prop::sample::select(vec!["2.0", "2.0.1", "3.0", "4.0", ""]),
            names in prop::collection::vec(prop::sample::select(vec!["start", "skip", "SKIP", "complete"]), 0..5),
            offset in prop::option::of(Just("00:00:05")),
        ) {
            let events: Vec<_> = names.iter().map(|name| TrackingEvent::named(name)).collect();
            let first = is_skippable(version, &events, offset);
            prop_assert_eq!(is_skippable(version, &events, offset), first);
        }
    }
}
