//! Acquisition of raw OSM extracts from the upstream query service.
//!
//! The query is a fixed template parameterised only by the bounding box; the
//! timeout and result-size cap embedded in it protect the upstream service,
//! not a local resource. Endpoints are tried strictly in order — a failed
//! endpoint is logged and skipped, never retried.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use kerbside_core::{BoundingBox, EndpointList};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use thiserror::Error;
use url::Url;

/// User agent sent with every upstream request.
pub const DEFAULT_USER_AGENT: &str = "kerbside-import/0.1";

const QUERY_TEMPLATE: &str = "[timeout:900][maxsize:1073741824];\nnwr(__bbox__);\nout;";

/// Render the fixed query template for `bbox`.
///
/// # Examples
/// ```
/// use kerbside_core::BoundingBox;
/// use kerbside_data::osm::overpass_query;
///
/// let query = overpass_query(&BoundingBox::new("48.19,16.35,48.23,16.42"));
/// assert!(query.contains("nwr(48.19,16.35,48.23,16.42);"));
/// assert!(query.starts_with("[timeout:900]"));
/// ```
#[must_use]
pub fn overpass_query(bbox: &BoundingBox) -> String {
    QUERY_TEMPLATE.replace("__bbox__", bbox.as_ref())
}

/// Transport-level errors encountered while querying one endpoint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The endpoint address could not be combined with the query.
    #[error("invalid endpoint address {endpoint}")]
    Address {
        /// Configured endpoint address.
        endpoint: String,
        /// Source parse error.
        #[source]
        source: url::ParseError,
    },
    /// The server answered with an error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description supplied by the server.
        message: String,
    },
    /// The request failed below the protocol level.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        #[source]
        source: io::Error,
    },
}

/// Source of raw extracts, abstracted for endpoint failover and tests.
pub trait ExtractSource {
    /// Submit `query` to `endpoint` and stream the response into `sink`,
    /// returning the number of bytes written.
    fn download(
        &self,
        endpoint: &str,
        query: &str,
        sink: &mut dyn Write,
    ) -> Result<u64, TransportError>;
}

/// HTTP implementation of [`ExtractSource`].
#[derive(Debug)]
pub struct HttpExtractSource {
    client: Client,
    user_agent: String,
}

impl HttpExtractSource {
    /// Construct an HTTP-backed source with the default user agent.
    ///
    /// # Panics
    /// Panics only if the static client configuration is invalid, which
    /// would be a programming error rather than a runtime condition.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            // The query embeds a 900 s server-side timeout; allow the
            // transfer at least as long before giving up locally.
            .timeout(Duration::from_secs(1000))
            .build()
            .expect("client builder only fails with invalid configuration");
        Self {
            client,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }

    /// Override the default user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for HttpExtractSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractSource for HttpExtractSource {
    fn download(
        &self,
        endpoint: &str,
        query: &str,
        sink: &mut dyn Write,
    ) -> Result<u64, TransportError> {
        let url = Url::parse_with_params(endpoint, [("data", query)]).map_err(|source| {
            TransportError::Address {
                endpoint: endpoint.to_owned(),
                source,
            }
        })?;
        let mut response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .map_err(|err| convert_reqwest_error(err, url.as_str()))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(err, url.as_str()))?;
        response
            .copy_to(sink)
            .map_err(|err| convert_reqwest_error(err, url.as_str()))
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}

/// Errors raised while acquiring an extract.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AcquireError {
    /// Every configured endpoint was tried and none succeeded.
    #[error("extract download failed on all {attempts} endpoints")]
    Exhausted {
        /// Number of endpoints attempted.
        attempts: usize,
    },
    /// The local output file could not be written.
    #[error("failed to write extract to {path:?}")]
    Write {
        /// Destination path of the extract.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Download the extract for `bbox` into `output_path`, trying `endpoints`
/// in order until one succeeds.
///
/// Per-endpoint failures are logged and converted into "try the next
/// endpoint"; they surface only as the final [`AcquireError::Exhausted`]
/// when the whole list is spent. The first success short-circuits the loop.
///
/// # Errors
/// [`AcquireError::Exhausted`] when no endpoint delivered the extract,
/// [`AcquireError::Write`] when the local file could not be created.
pub fn acquire_extract<S: ExtractSource + ?Sized>(
    source: &S,
    endpoints: &EndpointList,
    bbox: &BoundingBox,
    output_path: &Utf8Path,
) -> Result<Utf8PathBuf, AcquireError> {
    let query = overpass_query(bbox);
    debug!("prepared upstream query:\n{query}");

    for endpoint in endpoints {
        // A fresh file per attempt: a failed partial download must not
        // survive into the next attempt's output.
        let file = File::create(output_path).map_err(|source_err| AcquireError::Write {
            path: output_path.to_path_buf(),
            source: source_err,
        })?;
        let mut sink = BufWriter::new(file);
        match source.download(endpoint, &query, &mut sink) {
            Ok(bytes) => {
                sink.flush().map_err(|source_err| AcquireError::Write {
                    path: output_path.to_path_buf(),
                    source: source_err,
                })?;
                info!("extract download from {endpoint} succeeded ({bytes} bytes)");
                return Ok(output_path.to_path_buf());
            }
            Err(cause) => {
                warn!("extract download from {endpoint} failed: {cause} — trying next endpoint");
            }
        }
    }

    Err(AcquireError::Exhausted {
        attempts: endpoints.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    /// Scripted [`ExtractSource`]: fails until the configured endpoint.
    struct ScriptedSource {
        succeed_on: Option<&'static str>,
        attempts: RefCell<Vec<String>>,
    }

    impl ScriptedSource {
        fn succeeding_on(endpoint: &'static str) -> Self {
            Self {
                succeed_on: Some(endpoint),
                attempts: RefCell::new(Vec::new()),
            }
        }

        fn always_failing() -> Self {
            Self {
                succeed_on: None,
                attempts: RefCell::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.borrow().clone()
        }
    }

    impl ExtractSource for ScriptedSource {
        fn download(
            &self,
            endpoint: &str,
            _query: &str,
            sink: &mut dyn Write,
        ) -> Result<u64, TransportError> {
            self.attempts.borrow_mut().push(endpoint.to_owned());
            if self.succeed_on == Some(endpoint) {
                let payload = format!("payload from {endpoint}");
                sink.write_all(payload.as_bytes())
                    .map_err(|source| TransportError::Network {
                        url: endpoint.to_owned(),
                        source,
                    })?;
                return Ok(payload.len() as u64);
            }
            Err(TransportError::Http {
                url: endpoint.to_owned(),
                status: 504,
                message: "gateway timeout".to_owned(),
            })
        }
    }

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    fn endpoints() -> EndpointList {
        EndpointList::from(vec![
            "https://a.example/api".to_owned(),
            "https://b.example/api".to_owned(),
            "https://c.example/api".to_owned(),
        ])
    }

    fn output_in(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("extract.osm")).expect("utf-8 path")
    }

    #[rstest]
    fn first_healthy_endpoint_wins(temp_dir: TempDir) {
        let source = ScriptedSource::succeeding_on("https://c.example/api");
        let output = output_in(&temp_dir);

        let path = acquire_extract(
            &source,
            &endpoints(),
            &BoundingBox::new("48.1,16.2,48.3,16.5"),
            &output,
        )
        .expect("third endpoint should succeed");

        assert_eq!(path, output);
        assert_eq!(
            fs::read_to_string(&output).expect("read extract"),
            "payload from https://c.example/api"
        );
        assert_eq!(
            source.attempts(),
            [
                "https://a.example/api",
                "https://b.example/api",
                "https://c.example/api"
            ]
        );
    }

    #[rstest]
    fn no_endpoint_is_tried_after_a_success(temp_dir: TempDir) {
        let source = ScriptedSource::succeeding_on("https://a.example/api");
        let output = output_in(&temp_dir);

        acquire_extract(
            &source,
            &endpoints(),
            &BoundingBox::new("48.1,16.2,48.3,16.5"),
            &output,
        )
        .expect("first endpoint should succeed");

        assert_eq!(source.attempts(), ["https://a.example/api"]);
    }

    #[rstest]
    fn exhausting_every_endpoint_fails(temp_dir: TempDir) {
        let source = ScriptedSource::always_failing();
        let output = output_in(&temp_dir);

        let outcome = acquire_extract(
            &source,
            &endpoints(),
            &BoundingBox::new("48.1,16.2,48.3,16.5"),
            &output,
        );

        assert!(matches!(
            outcome,
            Err(AcquireError::Exhausted { attempts: 3 })
        ));
        assert_eq!(source.attempts().len(), 3);
    }

    #[rstest]
    fn query_embeds_only_the_bounding_box() {
        let query = overpass_query(&BoundingBox::new("1,2,3,4"));
        assert_eq!(query, "[timeout:900][maxsize:1073741824];\nnwr(1,2,3,4);\nout;");
    }
}
