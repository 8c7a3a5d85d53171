use crate::error::{AdTagError, Result};
use crate::fetch::{Fetcher, Transport};
use crate::models::{AdDocument, ResolutionResult};
use log::{debug, warn};

/// The last document reached by following wrappers, not yet validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unwrapped {
    pub document: AdDocument,

    /// Number of wrappers followed
    pub depth: usize,

    /// Wrapper URLs followed, in order
    pub chain: Vec<String>,
}

impl Unwrapped {
    /// Check the terminal document is VAST with a version.
    ///
    /// `url` names the ad tag in the resulting error.
    pub fn into_resolution(self, url: &str) -> Result<ResolutionResult> {
        if !self.document.is_ad_root() {
            return Err(AdTagError::NotAnAdDocument {
                url: self.chain.last().map_or(url, String::as_str).to_string(),
            });
        }
        let version = match self.document.version() {
            Some(version) => version.to_string(),
            None => {
                return Err(AdTagError::NotAnAdDocument {
                    url: url.to_string(),
                })
            }
        };

        Ok(ResolutionResult {
            document: self.document,
            version,
            wrapper_depth: self.depth,
            chain: self.chain,
        })
    }
}

/// Unwrap a VAST document by following wrappers until a document without a
/// `<VASTAdTagURI>` is reached.
///
/// Each step fetches the wrapper target with `redirect_budget` HTTP redirects
/// allowed and replaces the current document. At most `max_wrapper_depth`
/// steps are taken; a chain still wrapping after that fails with
/// [`AdTagError::WrapperDepthExceeded`]. Oscillating chains are bounded by the
/// same counter. Any fetch failure along the way is reported as
/// [`AdTagError::WrapperRedirectFailure`].
///
/// `initial` must already be known to be VAST.
pub async fn resolve<T: Transport>(
    fetcher: &Fetcher<T>,
    initial: AdDocument,
    max_wrapper_depth: usize,
    redirect_budget: u32,
) -> Result<Unwrapped> {
    let mut current = initial;
    let mut chain = Vec::new();

    loop {
        let Some(target) = current.wrapper_target() else {
            return Ok(Unwrapped {
                document: current,
                depth: chain.len(),
                chain,
            });
        };

        if chain.len() == max_wrapper_depth {
            warn!("Wrapper depth exceeds {} redirects at {}", max_wrapper_depth, target);
            return Err(AdTagError::WrapperDepthExceeded {
                max_depth: max_wrapper_depth,
            });
        }

        let depth = chain.len() + 1;
        debug!("Following wrapper {} (depth {})", target, depth);

        current = fetcher
            .fetch(&target, redirect_budget)
            .await
            .map_err(|cause| {
                warn!("Error opening wrapper url {}: {}", target, cause);
                AdTagError::WrapperRedirectFailure {
                    url: target.clone(),
                    depth,
                    cause,
                }
            })?;
        chain.push(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::scripted::{Reply, ScriptedTransport};

    fn wrapper(next: &str) -> String {
        format!(
            r#"<VAST version="2.0"><Ad><Wrapper><AdSystem>W</AdSystem>
               <VASTAdTagURI><![CDATA[{next}]]></VASTAdTagURI></Wrapper></Ad></VAST>"#
        )
    }

    fn inline(mime: &str) -> String {
        format!(
            r#"<VAST version="3.0"><Ad><InLine><Creatives><Creative><Linear>
               <MediaFiles><MediaFile type="{mime}">http://cdn.test/m</MediaFile></MediaFiles>
               </Linear></Creative></Creatives></InLine></Ad></VAST>"#
        )
    }

    /// A chain of `k` wrappers `/w1 .. /wk` ending in an inline ad at `/inline`
    fn chain_of(k: usize) -> (AdDocument, ScriptedTransport) {
        let url = |i: usize| {
            if i > k {
                "http://ads.test/inline".to_string()
            } else {
                format!("http://ads.test/w{i}")
            }
        };
        let mut transport = ScriptedTransport::new().body("http://ads.test/inline", &inline("video/mp4"));
        for i in 2..=k {
            transport = transport.body(&url(i), &wrapper(&url(i + 1)));
        }
        let initial = if k == 0 {
            AdDocument::parse(&inline("video/mp4")).unwrap()
        } else {
            AdDocument::parse(&wrapper(&url(2))).unwrap()
        };
        (initial, transport)
    }

    #[tokio::test]
    async fn terminal_document_resolves_immediately_at_any_depth() {
        for max_depth in [0, 1, 5] {
            let (initial, transport) = chain_of(0);
            let fetcher = Fetcher::new(transport);
            let unwrapped = resolve(&fetcher, initial.clone(), max_depth, 2).await.unwrap();
            assert_eq!(unwrapped.document, initial);
            assert_eq!(unwrapped.depth, 0);
            assert!(fetcher.transport().requests().is_empty());
        }
    }

    #[tokio::test]
    async fn chains_within_the_bound_succeed() {
        for k in 1..=5 {
            let (initial, transport) = chain_of(k);
            let fetcher = Fetcher::new(transport);
            let unwrapped = resolve(&fetcher, initial, 5, 2).await.unwrap();

            assert_eq!(unwrapped.depth, k);
            assert_eq!(unwrapped.chain.last().unwrap(), "http://ads.test/inline");
            assert_eq!(unwrapped.document.media_entries().len(), 1);
            assert_eq!(fetcher.transport().requests().len(), k);
        }
    }

    #[tokio::test]
    async fn chains_past_the_bound_fail() {
        let (initial, transport) = chain_of(4);
        let fetcher = Fetcher::new(transport);
        let err = resolve(&fetcher, initial, 3, 2).await.unwrap_err();

        assert_eq!(err, AdTagError::WrapperDepthExceeded { max_depth: 3 });
        assert_eq!(fetcher.transport().requests().len(), 3);
    }

    #[tokio::test]
    async fn zero_depth_refuses_any_wrapper() {
        let (initial, transport) = chain_of(1);
        let fetcher = Fetcher::new(transport);
        let err = resolve(&fetcher, initial, 0, 2).await.unwrap_err();

        assert_eq!(err, AdTagError::WrapperDepthExceeded { max_depth: 0 });
        assert!(fetcher.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn oscillating_wrappers_stop_at_the_depth_bound() {
        let transport = ScriptedTransport::new()
            .body("http://ads.test/a", &wrapper("http://ads.test/b"))
            .body("http://ads.test/b", &wrapper("http://ads.test/a"));
        let fetcher = Fetcher::new(transport);
        let initial = AdDocument::parse(&wrapper("http://ads.test/a")).unwrap();

        let err = resolve(&fetcher, initial, 5, 2).await.unwrap_err();
        assert_eq!(err, AdTagError::WrapperDepthExceeded { max_depth: 5 });
        assert_eq!(
            fetcher.transport().requests(),
            vec![
                "http://ads.test/a",
                "http://ads.test/b",
                "http://ads.test/a",
                "http://ads.test/b",
                "http://ads.test/a",
            ]
        );
    }

    #[tokio::test]
    async fn failed_wrapper_fetch_is_a_wrapper_failure() {
        let transport = ScriptedTransport::new()
            .body("http://ads.test/w2", &wrapper("http://ads.test/broken"))
            .route("http://ads.test/broken", Reply::Status(503));
        let fetcher = Fetcher::new(transport);
        let initial = AdDocument::parse(&wrapper("http://ads.test/w2")).unwrap();

        let err = resolve(&fetcher, initial, 5, 2).await.unwrap_err();
        match err {
            AdTagError::WrapperRedirectFailure { url, depth, cause } => {
                assert_eq!(url, "http://ads.test/broken");
                assert_eq!(depth, 2);
                assert!(matches!(cause, FetchError::Open { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrapper_timeout_keeps_its_cause() {
        let transport = ScriptedTransport::new().route("http://ads.test/slow", Reply::Timeout);
        let fetcher = Fetcher::new(transport);
        let initial = AdDocument::parse(&wrapper("http://ads.test/slow")).unwrap();

        let err = resolve(&fetcher, initial, 5, 2).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn wrapper_redirects_use_their_own_budget() {
        let transport = ScriptedTransport::new()
            .redirect("http://ads.test/w", "http://ads.test/r1")
            .redirect("http://ads.test/r1", "http://ads.test/r2")
            .body("http://ads.test/r2", &inline("video/mp4"));
        let initial = AdDocument::parse(&wrapper("http://ads.test/w")).unwrap();

        let fetcher = Fetcher::new(transport);
        let unwrapped = resolve(&fetcher, initial.clone(), 1, 2).await.unwrap();
        assert_eq!(unwrapped.depth, 1);

        let err = resolve(&fetcher, initial, 1, 1).await.unwrap_err();
        assert!(matches!(
            err,
            AdTagError::WrapperRedirectFailure {
                cause: FetchError::TooManyRedirects { .. },
                ..
            }
        ));
    }

    #[test]
    fn validation_rejects_non_vast_terminal() {
        let unwrapped = Unwrapped {
            document: AdDocument::parse("<html><body/></html>").unwrap(),
            depth: 1,
            chain: vec!["http://ads.test/next".into()],
        };
        assert_eq!(
            unwrapped.into_resolution("http://ads.test/tag").unwrap_err(),
            AdTagError::NotAnAdDocument {
                url: "http://ads.test/next".into()
            }
        );
    }

    #[test]
    fn validation_requires_a_version() {
        let unwrapped = Unwrapped {
            document: AdDocument::parse("<VAST><Ad/></VAST>").unwrap(),
            depth: 0,
            chain: Vec::new(),
        };
        assert_eq!(
            unwrapped.into_resolution("http://ads.test/tag").unwrap_err(),
            AdTagError::NotAnAdDocument {
                url: "http://ads.test/tag".into()
            }
        );
    }
}
