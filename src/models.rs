use crate::classify::VpaidCategory;
use crate::error::{AdTagError, DocumentError};
use crate::parser::{parse_markup, Element, Markup};
use serde::{Deserialize, Serialize};

/// A fetched and parsed ad document (VAST, or whatever the server sent instead)
///
/// The document is immutable once parsed; every accessor below reads the
/// underlying markup on demand and always gives the same answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdDocument {
    markup: Markup,
}

impl AdDocument {
    pub fn parse(body: &str) -> Result<Self, DocumentError> {
        Ok(AdDocument {
            markup: parse_markup(body)?,
        })
    }

    /// True when the document has a `<VAST>` root element anywhere
    pub fn is_ad_root(&self) -> bool {
        self.markup.contains("vast")
    }

    /// The `version` attribute of the VAST root.
    ///
    /// Only meaningful once [`is_ad_root`](Self::is_ad_root) holds.
    pub fn version(&self) -> Option<&str> {
        debug_assert!(self.is_ad_root(), "version read from a non-VAST document");
        self.markup
            .first("vast")
            .and_then(|root| root.attr("version"))
            .map(str::trim)
            .filter(|version| !version.is_empty())
    }

    /// The URL held by `<VASTAdTagURI>`, present only on wrapper documents
    pub fn wrapper_target(&self) -> Option<String> {
        self.markup
            .first("vastadtaguri")
            .map(|element| element.text().trim().to_string())
    }

    pub fn media_entries(&self) -> Vec<MediaEntry> {
        self.markup
            .elements_named("mediafile")
            .map(MediaEntry::from_element)
            .collect()
    }

    pub fn tracking_events(&self) -> Vec<TrackingEvent> {
        self.markup
            .elements_named("tracking")
            .map(TrackingEvent::from_element)
            .collect()
    }

    /// The `skipoffset` attribute of the first `<Linear>` creative
    pub fn primary_skip_offset(&self) -> Option<&str> {
        self.markup
            .first("linear")
            .and_then(|linear| linear.attr("skipoffset"))
    }
}

/// One `<MediaFile>` reference
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct MediaEntry {
    /// The MIME type (e.g. `application/x-shockwave-flash`); empty when absent
    pub delivery_type: String,

    /// The API framework (e.g. `VPAID`)
    pub api_framework: Option<String>,

    /// The media file URL
    pub url: String,

    /// The delivery method (progressive or streaming)
    pub delivery: Option<String>,

    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bitrate: Option<u32>,
}

impl MediaEntry {
    /// Shorthand for an entry carrying only the facts classification looks at
    pub fn new(delivery_type: impl Into<String>, api_framework: Option<&str>) -> Self {
        MediaEntry {
            delivery_type: delivery_type.into(),
            api_framework: api_framework.map(str::to_string),
            ..MediaEntry::default()
        }
    }

    fn from_element(element: &Element) -> Self {
        MediaEntry {
            delivery_type: element.attr("type").unwrap_or_default().trim().to_string(),
            api_framework: element.attr("apiframework").map(|v| v.trim().to_string()),
            url: element.text().trim().to_string(),
            delivery: element.attr("delivery").map(str::to_string),
            width: parse_number(element.attr("width")),
            height: parse_number(element.attr("height")),
            bitrate: parse_number(element.attr("bitrate")),
        }
    }
}

/// One `<Tracking>` reference
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct TrackingEvent {
    /// The event type (e.g. "start", "skip", "complete")
    pub event_name: Option<String>,

    /// The tracking URL
    pub url: String,
}

impl TrackingEvent {
    pub fn named(event_name: &str) -> Self {
        TrackingEvent {
            event_name: Some(event_name.to_string()),
            url: String::new(),
        }
    }

    fn from_element(element: &Element) -> Self {
        TrackingEvent {
            event_name: element.attr("event").map(|v| v.trim().to_string()),
            url: element.text().trim().to_string(),
        }
    }
}

fn parse_number(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse().ok())
}

/// A validated terminal document, ready for classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub document: AdDocument,
    pub version: String,

    /// Number of wrappers followed to reach the document
    pub wrapper_depth: usize,

    /// Wrapper URLs followed, in order
    pub chain: Vec<String>,
}

/// Facts extracted from a fully resolved ad tag
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct AdTagResult {
    /// The ad tag URL or file the analysis started from
    pub url: String,
    pub version: String,
    pub vpaid_status: VpaidCategory,
    pub skippable: bool,
    pub media_entries: Vec<MediaEntry>,
    pub tracking_events: Vec<TrackingEvent>,
    pub wrapper_depth: usize,
    pub wrapper_chain: Vec<String>,

    /// Set on a wrapper document analyzed without following it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapper_target: Option<String>,

    /// Non-fatal gaps, such as a version with no skippability rule
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AdTagError>,
}
