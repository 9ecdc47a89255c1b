//! Remote tag lookup: rewrites a repository reference into its tag-list API
//! endpoint and fetches the published tags.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_WEB_HOST_PREFIX: &str = "//github.com/";
pub const DEFAULT_API_HOST_PREFIX: &str = "//api.github.com/repos/";
pub const TAG_LOOKUP_SUFFIX: &str = "tags";
pub const TAG_LOOKUP_USER_AGENT: &str = "gitup/tag-check";
pub const TAG_LOOKUP_TIMEOUT_MS: u64 = 8_000;

/// One published tag of a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub tag_name: String,
    pub archive_url: String,
    #[serde(default)]
    pub commit_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubTagRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    zipball_url: Option<String>,
    #[serde(default)]
    commit: Option<GitHubTagCommit>,
}

#[derive(Debug, Deserialize)]
struct GitHubTagCommit {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("remote source '{source_uri}' is not a recognized repository reference: {reason}")]
    InvalidSource { source_uri: String, reason: String },
    #[error("tag lookup for '{source_uri}' via '{endpoint}' failed: {message}")]
    Transport {
        source_uri: String,
        endpoint: String,
        message: String,
    },
    #[error("tag lookup for '{source_uri}' via '{endpoint}' returned status {status}")]
    HttpStatus {
        source_uri: String,
        endpoint: String,
        status: u16,
        body: String,
    },
}

impl FetchError {
    pub fn source_uri(&self) -> &str {
        match self {
            FetchError::InvalidSource { source_uri, .. }
            | FetchError::Transport { source_uri, .. }
            | FetchError::HttpStatus { source_uri, .. } => source_uri,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response text kept for diagnostics: the body for status failures,
    /// the transport message otherwise.
    pub fn raw_response(&self) -> &str {
        match self {
            FetchError::InvalidSource { reason, .. } => reason,
            FetchError::Transport { message, .. } => message,
            FetchError::HttpStatus { body, .. } => body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    pub web_host_prefix: String,
    pub api_host_prefix: String,
    pub tags_suffix: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            web_host_prefix: DEFAULT_WEB_HOST_PREFIX.to_string(),
            api_host_prefix: DEFAULT_API_HOST_PREFIX.to_string(),
            tags_suffix: TAG_LOOKUP_SUFFIX.to_string(),
            timeout_ms: TAG_LOOKUP_TIMEOUT_MS,
            user_agent: TAG_LOOKUP_USER_AGENT.to_string(),
            accept_invalid_certs: false,
        }
    }
}

impl FetcherConfig {
    /// Points the API prefix at `api_base` (e.g. a mirror or a test server),
    /// keeping the web prefix substitution intact.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        let without_scheme = api_base
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(api_base);
        self.api_host_prefix = format!("//{}/", without_scheme.trim_end_matches('/'));
        self
    }
}

/// Deterministic rewrite of a repository reference into its tag-list endpoint.
pub fn tags_endpoint(source_uri: &str, config: &FetcherConfig) -> Result<String, FetchError> {
    let trimmed = source_uri.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    if !trimmed.contains(config.web_host_prefix.as_str()) {
        return Err(FetchError::InvalidSource {
            source_uri: source_uri.to_string(),
            reason: format!("expected host prefix '{}'", config.web_host_prefix),
        });
    }
    let rewritten = trimmed.replacen(
        config.web_host_prefix.as_str(),
        config.api_host_prefix.as_str(),
        1,
    );
    Ok(format!(
        "{}/{}",
        rewritten.trim_end_matches('/'),
        config.tags_suffix.trim_matches('/')
    ))
}

/// Parses a tag-list body. Anything other than a JSON array yields no tags;
/// array entries without a name or archive URL are skipped.
pub fn parse_tag_response(body: &str) -> Vec<RemoteTag> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<GitHubTagRecord>(item).ok())
        .filter_map(|record| {
            let tag_name = record.name?.trim().to_string();
            let archive_url = record.zipball_url?.trim().to_string();
            if tag_name.is_empty() || archive_url.is_empty() {
                return None;
            }
            Some(RemoteTag {
                tag_name,
                archive_url,
                commit_url: record.commit.and_then(|commit| commit.url),
            })
        })
        .collect()
}

/// Source of remote tags for one repository reference.
pub trait TagSource {
    fn fetch_tags(&self, source_uri: &str) -> Result<Vec<RemoteTag>, FetchError>;
}

/// HTTP tag source speaking the GitHub `GET /repos/{owner}/{repo}/tags` contract.
#[derive(Debug, Clone, Default)]
pub struct GitHubTagFetcher {
    config: FetcherConfig,
}

impl GitHubTagFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }
}

impl TagSource for GitHubTagFetcher {
    fn fetch_tags(&self, source_uri: &str) -> Result<Vec<RemoteTag>, FetchError> {
        let endpoint = tags_endpoint(source_uri, &self.config)?;
        let (status, body) =
            run_tag_lookup(&endpoint, &self.config).map_err(|message| FetchError::Transport {
                source_uri: source_uri.to_string(),
                endpoint: endpoint.clone(),
                message,
            })?;

        if status != reqwest::StatusCode::OK.as_u16() {
            return Err(FetchError::HttpStatus {
                source_uri: source_uri.to_string(),
                endpoint,
                status,
                body,
            });
        }
        let tags = parse_tag_response(&body);
        tracing::debug!(
            source_uri,
            endpoint = endpoint.as_str(),
            tag_count = tags.len(),
            "fetched remote tags"
        );
        Ok(tags)
    }
}

/// Drives the async lookup from synchronous code. A multi-thread runtime is
/// borrowed through `block_in_place`; a current-thread runtime cannot block,
/// so the lookup moves to a scoped thread with its own runtime.
fn run_tag_lookup(endpoint: &str, config: &FetcherConfig) -> Result<(u16, String), String> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(fetch_tag_body_async(endpoint, config)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| run_on_fresh_runtime(endpoint, config))
                .join()
                .unwrap_or_else(|_| Err("tag lookup thread panicked".to_string()))
        }),
        Err(_) => run_on_fresh_runtime(endpoint, config),
    }
}

fn run_on_fresh_runtime(endpoint: &str, config: &FetcherConfig) -> Result<(u16, String), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| format!("failed to create runtime for tag lookup: {error}"))?;
    runtime.block_on(fetch_tag_body_async(endpoint, config))
}

async fn fetch_tag_body_async(
    endpoint: &str,
    config: &FetcherConfig,
) -> Result<(u16, String), String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(config.timeout_ms))
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
        .map_err(|error| format!("failed to construct HTTP client: {error}"))?;
    let response = client
        .get(endpoint)
        .header(reqwest::header::USER_AGENT, config.user_agent.as_str())
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await
        .map_err(|error| format!("request failed: {error}"))?;
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|error| format!("failed to read response body: {error}"))?;
    Ok((status, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn mock_config(server: &MockServer) -> FetcherConfig {
        FetcherConfig {
            web_host_prefix: format!("//{}/", server.address()),
            ..FetcherConfig::default().with_api_base(&server.url("/repos"))
        }
    }

    fn mock_source(server: &MockServer, repo: &str) -> String {
        format!("http://{}/{repo}", server.address())
    }

    #[test]
    fn unit_tags_endpoint_rewrites_host_prefix_and_appends_suffix() {
        let config = FetcherConfig::default();
        assert_eq!(
            tags_endpoint("https://github.com/acme/widget/", &config).expect("endpoint"),
            "https://api.github.com/repos/acme/widget/tags"
        );
        assert_eq!(
            tags_endpoint("https://github.com/acme/widget.git", &config).expect("endpoint"),
            "https://api.github.com/repos/acme/widget/tags"
        );
    }

    #[test]
    fn regression_tags_endpoint_rejects_unrecognized_host() {
        let error = tags_endpoint("https://gitlab.com/acme/widget", &FetcherConfig::default())
            .expect_err("foreign host should fail");
        assert_eq!(error.source_uri(), "https://gitlab.com/acme/widget");
        assert!(error.to_string().contains("expected host prefix"));
    }

    #[test]
    fn unit_parse_tag_response_tolerates_non_list_and_partial_entries() {
        assert!(parse_tag_response("{\"message\":\"Not Found\"}").is_empty());
        assert!(parse_tag_response("not json").is_empty());
        assert!(parse_tag_response("[]").is_empty());

        let tags = parse_tag_response(
            r#"[{"name":"1.1.0","zipball_url":"https://x/1.1.0.zip","commit":{"url":"https://x/c/1"}},{"name":"broken"},{"zipball_url":"https://x/none.zip"},42]"#,
        );
        assert_eq!(
            tags,
            vec![RemoteTag {
                tag_name: "1.1.0".to_string(),
                archive_url: "https://x/1.1.0.zip".to_string(),
                commit_url: Some("https://x/c/1".to_string()),
            }]
        );
    }

    #[test]
    fn unit_with_api_base_builds_prefix_from_url() {
        let config = FetcherConfig::default().with_api_base("http://127.0.0.1:9000/repos/");
        assert_eq!(config.api_host_prefix, "//127.0.0.1:9000/repos/");
        assert_eq!(config.web_host_prefix, DEFAULT_WEB_HOST_PREFIX);
    }

    #[test]
    fn integration_fetch_tags_parses_github_style_response_in_order() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/widget/tags")
                .header("user-agent", TAG_LOOKUP_USER_AGENT);
            then.status(200)
                .header("content-type", "application/json")
                .body(
                    r#"[{"name":"1.3.0","zipball_url":"https://x/1.3.0.zip"},{"name":"1.2.5","zipball_url":"https://x/1.2.5.zip"}]"#,
                );
        });

        let fetcher = GitHubTagFetcher::new(mock_config(&server));
        let tags = fetcher
            .fetch_tags(&mock_source(&server, "acme/widget"))
            .expect("fetch tags");
        mock.assert();
        let names = tags.iter().map(|tag| tag.tag_name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["1.3.0", "1.2.5"]);
    }

    #[test]
    fn regression_fetch_tags_reports_status_with_raw_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/repos/acme/missing/tags");
            then.status(404).body(r#"{"message":"Not Found"}"#);
        });
        let fetcher = GitHubTagFetcher::new(mock_config(&server));

        let error = fetcher
            .fetch_tags(&mock_source(&server, "acme/missing"))
            .expect_err("404 should fail");
        mock.assert();
        assert_eq!(error.status(), Some(404));
        assert_eq!(error.raw_response(), r#"{"message":"Not Found"}"#);
        assert!(error.to_string().contains("returned status 404"));
    }

    #[test]
    fn regression_fetch_tags_treats_object_body_as_no_tags() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/repos/acme/odd/tags");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"name":"not-an-array"}"#);
        });
        let fetcher = GitHubTagFetcher::new(mock_config(&server));

        let tags = fetcher
            .fetch_tags(&mock_source(&server, "acme/odd"))
            .expect("object body is not an error");
        mock.assert();
        assert!(tags.is_empty());
    }

    #[test]
    fn regression_fetch_tags_maps_timeout_to_transport_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/slow/tags");
            then.status(200)
                .delay(std::time::Duration::from_millis(500))
                .body("[]");
        });
        let fetcher = GitHubTagFetcher::new(FetcherConfig {
            timeout_ms: 50,
            ..mock_config(&server)
        });

        let error = fetcher
            .fetch_tags(&mock_source(&server, "acme/slow"))
            .expect_err("timeout should fail");
        assert!(matches!(error, FetchError::Transport { .. }));
        assert_eq!(error.status(), None);
    }

    #[tokio::test]
    async fn regression_fetch_tags_from_current_thread_runtime_does_not_block_in_place() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/acme/widget/tags");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"[{"name":"1.1.0","zipball_url":"https://x/1.1.0.zip"}]"#);
            })
            .await;
        let fetcher = GitHubTagFetcher::new(mock_config(&server));

        let tags = fetcher
            .fetch_tags(&mock_source(&server, "acme/widget"))
            .expect("lookup from current-thread runtime");
        mock.assert_async().await;
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag_name, "1.1.0");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn functional_fetch_tags_borrows_multi_thread_runtime() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/acme/gone/tags");
                then.status(404).body("missing");
            })
            .await;
        let fetcher = GitHubTagFetcher::new(mock_config(&server));

        let error = fetcher
            .fetch_tags(&mock_source(&server, "acme/gone"))
            .expect_err("404");
        assert_eq!(error.status(), Some(404));
    }
}
