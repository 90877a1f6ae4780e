//! OAuth authorization for the spreadsheet backend
//!
//! Authorization is a separate step that yields an [`AccessToken`]; stores
//! only ever receive the token. The installed-app flow listens on a loopback
//! port for the redirect, so it needs a browser on the same machine.

use crate::error::{Result, ScoreError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Read and write access to files created by this app only
pub const SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Tokens this close to expiry are treated as expired (seconds)
const EXPIRY_MARGIN: i64 = 60;

/// Where the client secrets and the persisted token live
#[derive(Debug, Clone)]
pub struct OAuthFiles {
    pub client_secrets: PathBuf,
    pub token_file: PathBuf,
}

/// Whether [`authorize`] may fall back to the browser flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Allowed,
    Never,
}

/// Bearer token accepted by the spreadsheet API
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// The `installed` section of a downloaded client secrets file
#[derive(Debug, Clone, Deserialize)]
pub struct InstalledApp {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: InstalledApp,
}

impl InstalledApp {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            ScoreError::Auth(format!("cannot open client secrets {}: {}", path.display(), e))
        })?;
        let secrets: ClientSecretsFile = serde_json::from_reader(BufReader::new(file))?;
        Ok(secrets.installed)
    }
}

/// Token persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: i64,
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
}

impl StoredToken {
    pub fn is_valid(&self, now: i64) -> bool {
        !self.access_token.is_empty() && self.expires_at - EXPIRY_MARGIN > now
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn load(path: &Path) -> Result<Option<StoredToken>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn access(&self) -> AccessToken {
        AccessToken::new(self.access_token.clone())
    }
}

/// Response body of the token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

/// HTTP client shared by the OAuth calls and the spreadsheet store
pub fn http_client() -> Result<reqwest::blocking::Client> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    Ok(client)
}

/// Produce a usable access token.
///
/// A valid stored token is used as is; an expired one is refreshed silently
/// when it carries a refresh token. Otherwise the browser flow runs, if
/// `interaction` allows it. New tokens are written back to the token file.
pub fn authorize(
    client: &reqwest::blocking::Client,
    files: &OAuthFiles,
    interaction: Interaction,
) -> Result<AccessToken> {
    let now = Utc::now().timestamp();

    if let Some(stored) = StoredToken::load(&files.token_file)? {
        if stored.is_valid(now) {
            log::debug!("using stored token from {}", files.token_file.display());
            return Ok(stored.access());
        }
        if stored.can_refresh() {
            match refresh(client, &stored) {
                Ok(fresh) => {
                    fresh.save(&files.token_file)?;
                    log::info!("refreshed access token");
                    return Ok(fresh.access());
                }
                Err(e) => log::warn!("token refresh failed: {}", e),
            }
        }
    }

    if interaction == Interaction::Never {
        return Err(ScoreError::Auth(format!(
            "no valid token in {}; run `pompfbot authorize` first",
            files.token_file.display()
        )));
    }

    let app = InstalledApp::from_file(&files.client_secrets)?;
    let fresh = authorize_in_browser(client, &app)?;
    fresh.save(&files.token_file)?;
    log::info!("saved new token to {}", files.token_file.display());
    Ok(fresh.access())
}

/// Exchange a refresh token for a new access token
pub fn refresh(client: &reqwest::blocking::Client, stored: &StoredToken) -> Result<StoredToken> {
    let refresh_token = stored
        .refresh_token
        .as_deref()
        .ok_or_else(|| ScoreError::Auth("no refresh token".to_string()))?;

    let response = client
        .post(&stored.token_uri)
        .form(&[
            ("client_id", stored.client_id.as_str()),
            ("client_secret", stored.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()?;
    let token = token_response(response)?;

    Ok(StoredToken {
        access_token: token.access_token,
        // Refresh responses usually omit the refresh token; keep the old one
        refresh_token: token.refresh_token.or_else(|| stored.refresh_token.clone()),
        expires_at: Utc::now().timestamp() + token.expires_in,
        client_id: stored.client_id.clone(),
        client_secret: stored.client_secret.clone(),
        token_uri: stored.token_uri.clone(),
    })
}

fn token_response(response: reqwest::blocking::Response) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ScoreError::Auth(format!("token endpoint returned {}: {}", status, body)));
    }
    Ok(response.json()?)
}

/// Run the installed-app flow: print the consent URL, wait for the browser
/// redirect on a loopback port, and exchange the code for tokens.
pub fn authorize_in_browser(
    client: &reqwest::blocking::Client,
    app: &InstalledApp,
) -> Result<StoredToken> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());

    let consent_url = url::Url::parse_with_params(
        &app.auth_uri,
        &[
            ("client_id", app.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| ScoreError::Auth(format!("invalid auth_uri: {}", e)))?;

    println!("Open this URL in a browser to authorize access:");
    println!("{}", consent_url);

    let (mut stream, _) = listener.accept()?;
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line)?;

    let code = extract_code(&request_line);
    let page = match &code {
        Ok(_) => "Authorization complete. You can close this window.",
        Err(_) => "Authorization failed. Check the terminal.",
    };
    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        page.len(),
        page
    )?;
    let code = code?;

    let response = client
        .post(&app.token_uri)
        .form(&[
            ("code", code.as_str()),
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()?;
    let token = token_response(response)?;

    Ok(StoredToken {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at: Utc::now().timestamp() + token.expires_in,
        client_id: app.client_id.clone(),
        client_secret: app.client_secret.clone(),
        token_uri: app.token_uri.clone(),
    })
}

/// Pull the authorization code out of the redirect's request line,
/// e.g. `GET /?code=abc&scope=... HTTP/1.1`
fn extract_code(request_line: &str) -> Result<String> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ScoreError::Auth(format!("unexpected request: {}", request_line.trim())))?;

    let url = url::Url::parse(&format!("http://127.0.0.1{}", target))
        .map_err(|e| ScoreError::Auth(format!("bad redirect target: {}", e)))?;

    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => return Ok(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    Err(ScoreError::Auth(
        error.unwrap_or_else(|| "redirect carried no code".to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: i64, refresh: Option<&str>) -> StoredToken {
        StoredToken {
            access_token: "ya29.token".into(),
            refresh_token: refresh.map(String::from),
            expires_at,
            client_id: "id".into(),
            client_secret: "secret".into(),
            token_uri: "https://oauth2.googleapis.com/token".into(),
        }
    }

    #[test]
    fn test_token_validity() {
        assert!(token(1000, None).is_valid(500));
        assert!(!token(1000, None).is_valid(950));
        assert!(!token(1000, None).is_valid(2000));
    }

    #[test]
    fn test_can_refresh() {
        assert!(token(0, Some("1//refresh")).can_refresh());
        assert!(!token(0, Some("")).can_refresh());
        assert!(!token(0, None).can_refresh());
    }

    #[test]
    fn test_token_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        assert!(StoredToken::load(&path).unwrap().is_none());

        token(1234, Some("r")).save(&path).unwrap();
        let loaded = StoredToken::load(&path).unwrap().unwrap();
        assert_eq!(loaded.expires_at, 1234);
        assert_eq!(loaded.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn test_valid_stored_token_needs_no_network() {
        let dir = tempfile::tempdir().unwrap();
        let files = OAuthFiles {
            client_secrets: dir.path().join("credentials.json"),
            token_file: dir.path().join("token.json"),
        };
        token(Utc::now().timestamp() + 3600, None).save(&files.token_file).unwrap();

        let client = http_client().unwrap();
        let access = authorize(&client, &files, Interaction::Never).unwrap();
        assert_eq!(access.secret(), "ya29.token");
    }

    #[test]
    fn test_expired_token_without_refresh_needs_interaction() {
        let dir = tempfile::tempdir().unwrap();
        let files = OAuthFiles {
            client_secrets: dir.path().join("credentials.json"),
            token_file: dir.path().join("token.json"),
        };
        token(0, None).save(&files.token_file).unwrap();

        let client = http_client().unwrap();
        assert!(matches!(
            authorize(&client, &files, Interaction::Never),
            Err(ScoreError::Auth(_))
        ));
    }

    #[test]
    fn test_client_secrets_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"installed":{"client_id":"cid","project_id":"p","auth_uri":"https://accounts.google.com/o/oauth2/auth","token_uri":"https://oauth2.googleapis.com/token","client_secret":"cs","redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();
        let app = InstalledApp::from_file(&path).unwrap();
        assert_eq!(app.client_id, "cid");
        assert_eq!(app.client_secret, "cs");
    }

    #[test]
    fn test_extract_code() {
        let code = extract_code("GET /?code=4%2F0Ab&scope=https://x HTTP/1.1\r\n").unwrap();
        assert_eq!(code, "4/0Ab");
    }

    #[test]
    fn test_extract_code_error() {
        let err = extract_code("GET /?error=access_denied HTTP/1.1").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
        assert!(extract_code("garbage").is_err());
    }

    #[test]
    fn test_access_token_debug_hides_secret() {
        assert_eq!(format!("{:?}", AccessToken::new("s3cret")), "AccessToken(***)");
    }
}
