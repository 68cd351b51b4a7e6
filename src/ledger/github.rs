use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{LedgerSnapshot, LedgerStore, StoreError, VersionToken};
use crate::model::Symbol;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("iv-ledger/", env!("CARGO_PKG_VERSION"));

// ── API types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

// ── Store ────────────────────────────────────────────────────────────

/// Ledgers committed to a GitHub repository through the contents API.
/// The version token is the blob sha GitHub reports for the file.
pub struct GitHubStore {
    client: reqwest::Client,
    api_url: String,
    repo: String,
    branch: Option<String>,
    token: String,
    /// Directory inside the repository that holds the ledger files.
    dir: String,
}

impl GitHubStore {
    pub fn new(
        api_url: &str,
        repo: &str,
        branch: Option<String>,
        token: &str,
        dir: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| StoreError::Transport(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            branch,
            token: token.to_string(),
            dir: dir.trim_matches('/').to_string(),
        })
    }

    /// Repository path of a symbol's ledger, e.g. `data/nifty_iv_log.csv`.
    pub fn repo_path(&self, symbol: Symbol) -> String {
        if self.dir.is_empty() {
            symbol.ledger_file().to_string()
        } else {
            format!("{}/{}", self.dir, symbol.ledger_file())
        }
    }

    fn contents_url(&self, symbol: Symbol) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_url,
            self.repo,
            self.repo_path(symbol)
        )
    }

    fn request(&self, method: reqwest::Method, symbol: Symbol) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.contents_url(symbol))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

fn transport(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Transport(format!("{context}: {e}"))
}

/// Decode the base64 payload GitHub returns (wrapped at 60 columns).
pub fn decode_content(content: &str) -> Result<String, StoreError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| transport("decoding ledger content", e))?;
    String::from_utf8(bytes).map_err(|e| transport("ledger content is not UTF-8", e))
}

#[async_trait]
impl LedgerStore for GitHubStore {
    async fn read(&self, symbol: Symbol) -> Result<LedgerSnapshot, StoreError> {
        let mut req = self.request(reqwest::Method::GET, symbol);
        if let Some(branch) = &self.branch {
            req = req.query(&[("ref", branch.as_str())]);
        }

        let resp = req.send().await.map_err(|e| transport("fetching ledger", e))?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotAvailable(symbol));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Transport(format!(
                "fetching {}: {status}: {body}",
                self.repo_path(symbol)
            )));
        }

        let contents: ContentsResponse = resp
            .json()
            .await
            .map_err(|e| transport("parsing contents response", e))?;
        if contents.encoding != "base64" {
            // Files over 1 MB come back with encoding "none" and no content.
            return Err(StoreError::Transport(format!(
                "{} returned with unsupported encoding `{}`",
                self.repo_path(symbol),
                contents.encoding
            )));
        }

        debug!(path = %self.repo_path(symbol), sha = %contents.sha, "ledger fetched");
        Ok(LedgerSnapshot {
            text: decode_content(&contents.content)?,
            version: VersionToken(contents.sha),
        })
    }

    async fn write(
        &self,
        symbol: Symbol,
        text: &str,
        version: &VersionToken,
        message: &str,
    ) -> Result<(), StoreError> {
        let body = UpdateRequest {
            message,
            content: general_purpose::STANDARD.encode(text),
            sha: &version.0,
            branch: self.branch.as_deref(),
        };

        let resp = self
            .request(reqwest::Method::PUT, symbol)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport("committing ledger", e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        // Only 409 signals a stale sha; 422 is a malformed request
        if status == StatusCode::CONFLICT {
            warn!(path = %self.repo_path(symbol), %status, "ledger sha is stale");
            return Err(StoreError::Conflict(symbol));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotAvailable(symbol));
        }

        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Transport(format!(
            "committing {}: {status}: {body}",
            self.repo_path(symbol)
        )))
    }

    fn describe(&self) -> String {
        format!("github:{}/{}", self.repo, self.dir)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode as HttpStatus;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use serde_json::{Value, json};

    use super::*;

    const LEDGER: &str = "Date,Symbol\r\n2024-01-05,NIFTY\r\n";

    /// What the fake contents API saw.
    #[derive(Default)]
    struct Seen {
        refs: Vec<Option<String>>,
        puts: Vec<Value>,
    }

    type Shared = Arc<Mutex<Seen>>;

    /// Behavior keyed on the repository name: `ok`, `missing`, `stale`,
    /// `invalid`, `broken`, `large`.
    async fn get_contents(
        State(seen): State<Shared>,
        Path((_owner, repo, _path)): Path<(String, String, String)>,
        Query(query): Query<std::collections::HashMap<String, String>>,
    ) -> Response {
        seen.lock().unwrap().refs.push(query.get("ref").cloned());
        match repo.as_str() {
            "missing" => HttpStatus::NOT_FOUND.into_response(),
            "broken" => (HttpStatus::INTERNAL_SERVER_ERROR, "boom").into_response(),
            "large" => axum::Json(json!({"sha": "big", "content": "", "encoding": "none"}))
                .into_response(),
            _ => {
                let encoded = general_purpose::STANDARD.encode(LEDGER);
                let (a, b) = encoded.split_at(8);
                axum::Json(json!({
                    "sha": "abc123",
                    "content": format!("{a}\n{b}\n"),
                    "encoding": "base64"
                }))
                .into_response()
            }
        }
    }

    async fn put_contents(
        State(seen): State<Shared>,
        Path((_owner, repo, _path)): Path<(String, String, String)>,
        axum::Json(body): axum::Json<Value>,
    ) -> Response {
        seen.lock().unwrap().puts.push(body);
        match repo.as_str() {
            "missing" => HttpStatus::NOT_FOUND.into_response(),
            "stale" => (HttpStatus::CONFLICT, "sha mismatch").into_response(),
            "invalid" => (
                HttpStatus::UNPROCESSABLE_ENTITY,
                axum::Json(json!({"message": "Invalid request. \"sha\" wasn't supplied."})),
            )
                .into_response(),
            "broken" => (HttpStatus::INTERNAL_SERVER_ERROR, "boom").into_response(),
            _ => axum::Json(json!({"content": {"sha": "def456"}})).into_response(),
        }
    }

    /// Fake contents API on an ephemeral port; returns its base URL.
    async fn fake_github() -> (String, Shared) {
        let seen = Shared::default();
        let app = Router::new()
            .route(
                "/repos/{owner}/{repo}/contents/{*path}",
                get(get_contents).put(put_contents),
            )
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        (format!("http://{addr}"), seen)
    }

    fn remote(base: &str, repo: &str, branch: Option<&str>) -> GitHubStore {
        GitHubStore::new(
            base,
            &format!("someone/{repo}"),
            branch.map(str::to_string),
            "t0ken",
            "data",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn read_decodes_content_and_sha() {
        let (base, seen) = fake_github().await;

        let snap = remote(&base, "ok", Some("ledgers")).read(Symbol::Nifty).await.unwrap();
        assert_eq!(snap.text, LEDGER);
        assert_eq!(snap.version, VersionToken("abc123".into()));

        remote(&base, "ok", None).read(Symbol::Nifty).await.unwrap();
        assert_eq!(seen.lock().unwrap().refs, vec![Some("ledgers".to_string()), None]);
    }

    #[tokio::test]
    async fn read_status_mapping() {
        let (base, _seen) = fake_github().await;

        assert!(matches!(
            remote(&base, "missing", None).read(Symbol::BankNifty).await,
            Err(StoreError::NotAvailable(Symbol::BankNifty))
        ));
        let Err(StoreError::Transport(msg)) = remote(&base, "broken", None).read(Symbol::Nifty).await
        else {
            panic!("expected a transport error");
        };
        assert!(msg.contains("500"));
        assert!(matches!(
            remote(&base, "large", None).read(Symbol::Nifty).await,
            Err(StoreError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn write_sends_base64_sha_and_branch() {
        let (base, seen) = fake_github().await;
        let version = VersionToken("abc123".into());

        remote(&base, "ok", Some("ledgers"))
            .write(Symbol::Nifty, LEDGER, &version, "Add IV data for NIFTY 2024-01-05")
            .await
            .unwrap();
        remote(&base, "ok", None)
            .write(Symbol::Nifty, LEDGER, &version, "again")
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let first = &seen.puts[0];
        assert_eq!(first["message"], "Add IV data for NIFTY 2024-01-05");
        assert_eq!(first["sha"], "abc123");
        assert_eq!(first["branch"], "ledgers");
        assert_eq!(decode_content(first["content"].as_str().unwrap()).unwrap(), LEDGER);
        assert!(seen.puts[1].get("branch").is_none());
    }

    #[tokio::test]
    async fn write_status_mapping() {
        let (base, _seen) = fake_github().await;
        let version = VersionToken("abc123".into());
        let write = |repo: &'static str| {
            let store = remote(&base, repo, None);
            let version = version.clone();
            async move { store.write(Symbol::Nifty, LEDGER, &version, "m").await }
        };

        assert!(matches!(write("stale").await, Err(StoreError::Conflict(Symbol::Nifty))));
        assert!(matches!(write("missing").await, Err(StoreError::NotAvailable(Symbol::Nifty))));
        let Err(StoreError::Transport(msg)) = write("invalid").await else {
            panic!("422 must not be reported as a conflict");
        };
        assert!(msg.contains("sha"));
        assert!(matches!(write("broken").await, Err(StoreError::Transport(_))));
    }

    fn store(dir: &str) -> GitHubStore {
        GitHubStore::new(
            "https://api.github.com/",
            "someone/iv-data",
            None,
            "t0ken",
            dir,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn paths() {
        let s = store("/data/");
        assert_eq!(s.repo_path(Symbol::Nifty), "data/nifty_iv_log.csv");
        assert_eq!(
            s.contents_url(Symbol::BankNifty),
            "https://api.github.com/repos/someone/iv-data/contents/data/banknifty_iv_log.csv"
        );
        assert_eq!(store("").repo_path(Symbol::Nifty), "nifty_iv_log.csv");
    }

    #[test]
    fn decodes_wrapped_base64() {
        let encoded = general_purpose::STANDARD.encode("Date,Symbol\r\n2024-01-05,NIFTY\r\n");
        let (a, b) = encoded.split_at(10);
        let wrapped = format!("{a}\n{b}\n");
        assert_eq!(decode_content(&wrapped).unwrap(), "Date,Symbol\r\n2024-01-05,NIFTY\r\n");
        assert!(decode_content("!!!").is_err());
    }
}
