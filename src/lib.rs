//! Resolve VAST ad tags through their wrapper chains and classify the
//! terminal ad's VPAID delivery and skippability.

pub mod analyzer;
pub mod classify;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod parser;
pub mod unwrap;

pub use analyzer::{analyze_document, Analyzer};
pub use classify::VpaidCategory;
pub use config::ResolveOptions;
pub use error::{AdTagError, FetchError, Result};
pub use models::{AdDocument, AdTagResult, MediaEntry, TrackingEvent};

/// Resolve one ad tag with a fresh HTTP client.
///
/// For repeated use, build an [`Analyzer`] once and call
/// [`Analyzer::analyze`] instead.
pub async fn resolve_ad_tag(url: &str, options: ResolveOptions) -> Result<AdTagResult> {
    Analyzer::new(options)?.analyze(url).await
}
