//! Ad tag analysis: fetch, validate, unwrap, classify.

use crate::classify::{classify, is_skippable, skip_rule};
use crate::config::ResolveOptions;
use crate::error::{AdTagError, Result};
use crate::fetch::{Fetcher, HttpTransport, Transport};
use crate::models::{AdDocument, AdTagResult, ResolutionResult};
use crate::unwrap;
use log::{info, warn};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Resolves ad tags and classifies the ads they lead to
#[derive(Debug, Clone)]
pub struct Analyzer<T = HttpTransport> {
    fetcher: Fetcher<T>,
    options: ResolveOptions,
}

impl Analyzer<HttpTransport> {
    /// An analyzer talking HTTP with the timeout and user agent from `options`
    pub fn new(options: ResolveOptions) -> Result<Self> {
        let transport = HttpTransport::new(&options)?;
        Ok(Analyzer::with_transport(transport, options))
    }
}

impl<T: Transport> Analyzer<T> {
    pub fn with_transport(transport: T, options: ResolveOptions) -> Self {
        Analyzer {
            fetcher: Fetcher::new(transport),
            options,
        }
    }

    /// Resolve `url` through any wrappers and classify the terminal ad.
    ///
    /// Failures fetching `url` itself surface as
    /// [`AdTagError::OpenFailure`], [`AdTagError::UrlTimeout`] or
    /// [`AdTagError::TooManyRedirects`]; failures further down the chain as
    /// [`AdTagError::WrapperRedirectFailure`].
    pub async fn analyze(&self, url: &str) -> Result<AdTagResult> {
        let trace_id = trace_id();
        let start_time = Instant::now();
        info!("[{}] Analyzing ad tag {}", trace_id, url);

        let outcome = self.resolve(url).await;
        match &outcome {
            Ok(resolution) => info!(
                "[{}] Resolved VAST {} after {} wrapper(s) in {:?}",
                trace_id,
                resolution.version,
                resolution.wrapper_depth,
                start_time.elapsed()
            ),
            Err(err) if err.is_upstream() => {
                warn!("[{}] Wrapper chain failed after {:?}: {}", trace_id, start_time.elapsed(), err)
            }
            Err(err) => warn!("[{}] Ad tag failed after {:?}: {}", trace_id, start_time.elapsed(), err),
        }

        let result = summarize(url, outcome?, None);
        for warning in &result.warnings {
            warn!("[{}] {}", trace_id, warning);
        }
        Ok(result)
    }

    /// Fetch, validate and unwrap `url` without classifying it
    pub async fn resolve(&self, url: &str) -> Result<ResolutionResult> {
        let initial = self.fetcher.fetch(url, self.options.redirect_budget).await?;
        if !initial.is_ad_root() {
            return Err(AdTagError::NotAnAdDocument {
                url: url.to_string(),
            });
        }

        let unwrapped = unwrap::resolve(
            &self.fetcher,
            initial,
            self.options.max_wrapper_depth,
            self.options.redirect_budget,
        )
        .await?;
        unwrapped.into_resolution(url)
    }

    /// Analyze tags concurrently, at most `concurrency` at a time.
    ///
    /// Results come back in the order of `urls`.
    pub async fn analyze_batch(
        self: Arc<Self>,
        urls: Vec<String>,
        concurrency: usize,
    ) -> Vec<(String, Result<AdTagResult>)>
    where
        T: 'static,
    {
        let concurrency = concurrency.max(1);
        let mut results: Vec<Option<Result<AdTagResult>>> = vec![None; urls.len()];
        let mut tasks = JoinSet::new();

        for (idx, url) in urls.iter().enumerate() {
            if tasks.len() >= concurrency {
                if let Some(joined) = tasks.join_next().await {
                    store(&mut results, joined);
                }
            }
            let analyzer = Arc::clone(&self);
            let url = url.clone();
            tasks.spawn(async move {
                // A panic inside one analysis must still map back to its tag
                let task_url = url.clone();
                let outcome = tokio::spawn(async move { analyzer.analyze(&task_url).await })
                    .await
                    .unwrap_or_else(|err| {
                        Err(AdTagError::Internal {
                            url: url.clone(),
                            reason: err.to_string(),
                        })
                    });
                (idx, outcome)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            store(&mut results, joined);
        }

        urls.into_iter()
            .zip(results)
            .map(|(url, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(AdTagError::Internal {
                        url: url.clone(),
                        reason: "analysis task did not complete".to_string(),
                    })
                });
                (url, result)
            })
            .collect()
    }
}

/// Classify a single parsed document without following its wrapper, if any
pub fn analyze_document(document: AdDocument, origin: &str) -> Result<AdTagResult> {
    if !document.is_ad_root() {
        return Err(AdTagError::NotAnAdDocument {
            url: origin.to_string(),
        });
    }
    let wrapper_target = document.wrapper_target();
    let resolution = unwrap::Unwrapped {
        document,
        depth: 0,
        chain: Vec::new(),
    }
    .into_resolution(origin)?;

    Ok(summarize(origin, resolution, wrapper_target))
}

fn summarize(url: &str, resolution: ResolutionResult, wrapper_target: Option<String>) -> AdTagResult {
    let document = &resolution.document;
    let media_entries = document.media_entries();
    let tracking_events = document.tracking_events();

    let mut warnings = Vec::new();
    if skip_rule(&resolution.version).is_none() {
        warnings.push(AdTagError::UnsupportedVersion {
            version: resolution.version.clone(),
        });
    }

    AdTagResult {
        url: url.to_string(),
        vpaid_status: classify(&media_entries),
        skippable: is_skippable(
            &resolution.version,
            &tracking_events,
            document.primary_skip_offset(),
        ),
        version: resolution.version.clone(),
        media_entries,
        tracking_events,
        wrapper_depth: resolution.wrapper_depth,
        wrapper_chain: resolution.chain,
        wrapper_target,
        warnings,
    }
}

fn store(
    results: &mut [Option<Result<AdTagResult>>],
    joined: std::result::Result<(usize, Result<AdTagResult>), tokio::task::JoinError>,
) {
    match joined {
        Ok((idx, result)) => results[idx] = Some(result),
        Err(err) => warn!("Batch task failed: {}", err),
    }
}

/// Short random id tying together the log lines of one analysis
fn trace_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}
