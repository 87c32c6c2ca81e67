//! OAuth2 credentials for the Google Sheets API.
//!
//! The credential file follows the layout of the `token.json` files written by
//! the google-auth libraries, so an existing token can be reused as is.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use log::warn;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tiny_http::{Method, Request, Response, Server, StatusCode};
use url::Url;

use crate::survey::*;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens expiring within this window are treated as expired.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

const CONSENT_DONE_PAGE: &str =
    "The authentication flow has completed. You may close this window.";

/// An authorized user credential.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// The access token.
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + Duration::seconds(EXPIRY_MARGIN_SECONDS) >= expiry,
            None => false,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && !self.is_expired(now)
    }

    /// True if all the requested scopes were granted to this credential.
    pub fn has_scopes(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|s| self.scopes.contains(s))
    }
}

/// The OAuth client, as downloaded from the Google Cloud console.
#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

/// Where the credential is cached, and where the client secrets live.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CredentialStore {
    pub token_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl CredentialStore {
    pub fn new(token_path: PathBuf, secrets_path: PathBuf) -> CredentialStore {
        CredentialStore {
            token_path,
            secrets_path,
        }
    }

    /// The cached credential, if any.
    pub fn load(&self) -> SurveyResult<Option<Credentials>> {
        let path = self.token_path.display().to_string();
        if !self.token_path.exists() {
            debug!("No cached credential at {}", path);
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.token_path).context(TokenIoSnafu { path })?;
        let creds = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
        Ok(Some(creds))
    }

    pub fn save(&self, creds: &Credentials) -> SurveyResult<()> {
        let path = self.token_path.display().to_string();
        let contents = serde_json::to_string_pretty(creds).context(ParsingJsonSnafu {})?;
        fs::write(&self.token_path, contents).context(TokenIoSnafu { path })?;
        debug!("Credential saved to {:?}", self.token_path);
        Ok(())
    }

    pub fn load_secrets(&self) -> SurveyResult<ClientSecrets> {
        let path = self.secrets_path.display().to_string();
        let contents = fs::read_to_string(&self.secrets_path).context(OpeningJsonSnafu {
            path: path.clone(),
        })?;
        let sf: SecretsFile = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
        match sf.installed.or(sf.web) {
            Some(secrets) => Ok(secrets),
            None => whatever!("The client secrets file {} has no installed or web client", path),
        }
    }
}

/// Returns a usable credential for the scopes.
///
/// The cached credential is used while it is valid. An expired one is
/// refreshed when it carries a refresh token. Otherwise the user is asked for
/// consent in a browser, and this call blocks until the redirect comes back.
/// The resulting credential is written back to the store.
pub fn authorize(
    client: &Client,
    store: &CredentialStore,
    scopes: &[String],
) -> SurveyResult<Credentials> {
    let now = Utc::now();
    let creds = match store.load()? {
        Some(c) if c.is_valid(now) && c.has_scopes(scopes) => {
            debug!("authorize: using the cached credential");
            return Ok(c);
        }
        Some(c) if c.refresh_token.is_some() && c.has_scopes(scopes) => {
            info!("authorize: the cached credential expired, refreshing it");
            refresh(client, &c)?
        }
        Some(_) => {
            info!("authorize: the cached credential cannot be refreshed, asking for consent");
            run_consent_flow(client, &store.load_secrets()?, scopes)?
        }
        None => run_consent_flow(client, &store.load_secrets()?, scopes)?,
    };
    store.save(&creds)?;
    Ok(creds)
}

pub fn refresh(client: &Client, creds: &Credentials) -> SurveyResult<Credentials> {
    let refresh_token = creds
        .refresh_token
        .clone()
        .context(MissingSettingSnafu {
            name: "refresh_token",
        })?;
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token.as_str()),
        ("client_id", creds.client_id.as_str()),
        ("client_secret", creds.client_secret.as_str()),
    ];
    let tr = request_token(client, &creds.token_uri, &params)?;
    Ok(Credentials {
        token: tr.access_token,
        refresh_token: tr.refresh_token.or(Some(refresh_token)),
        token_uri: creds.token_uri.clone(),
        client_id: creds.client_id.clone(),
        client_secret: creds.client_secret.clone(),
        scopes: granted_scopes(tr.scope.as_deref(), &creds.scopes),
        expiry: expiry_from(tr.expires_in),
    })
}

/// Asks the user for consent in a browser, then exchanges the code.
pub fn run_consent_flow(
    client: &Client,
    secrets: &ClientSecrets,
    scopes: &[String],
) -> SurveyResult<Credentials> {
    let server = Server::http("127.0.0.1:0")
        .map_err(|e| ConsentServerSnafu { message: e.to_string() }.build())?;
    let port = match server.server_addr().to_ip() {
        Some(addr) => addr.port(),
        None => whatever!("The authorization listener has no tcp address"),
    };
    let redirect_uri = format!("http://127.0.0.1:{}/", port);
    let state = format!("{}-{}", std::process::id(), Utc::now().timestamp_millis());
    let url = consent_url(secrets, scopes, &redirect_uri, &state)?;

    info!("run_consent_flow: waiting for the redirect on port {}", port);
    eprintln!(
        "Please visit this URL to authorize this application: {}",
        url
    );
    let code = wait_for_code(&server, &state)?;

    let params = [
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", redirect_uri.as_str()),
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
    ];
    let tr = request_token(client, &secrets.token_uri, &params)?;
    Ok(Credentials {
        token: tr.access_token,
        refresh_token: tr.refresh_token,
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        scopes: granted_scopes(tr.scope.as_deref(), scopes),
        expiry: expiry_from(tr.expires_in),
    })
}

pub fn consent_url(
    secrets: &ClientSecrets,
    scopes: &[String],
    redirect_uri: &str,
    state: &str,
) -> SurveyResult<Url> {
    let mut url = Url::parse(&secrets.auth_uri).context(InvalidUrlSnafu {
        url: &secrets.auth_uri,
    })?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &secrets.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", state)
        .append_pair("access_type", "offline");
    Ok(url)
}

/// What the browser brought back on the redirect.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Redirect {
    Code { code: String, state: Option<String> },
    Error(String),
}

/// Reads the target of the redirect request, such as `/?state=xyz&code=4/0Ab`.
pub fn parse_redirect(target: &str) -> Option<Redirect> {
    let url = Url::parse("http://127.0.0.1").ok()?.join(target).ok()?;
    let mut code: Option<String> = None;
    let mut state: Option<String> = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => return Some(Redirect::Error(v.into_owned())),
            _ => {}
        }
    }
    code.map(|code| Redirect::Code { code, state })
}

// Serves the loopback listener until the browser comes back with a code.
fn wait_for_code(server: &Server, state: &str) -> SurveyResult<String> {
    for request in server.incoming_requests() {
        debug!(
            "wait_for_code: request: {:?} {:?}",
            request.method(),
            request.url()
        );
        let redirect = match request.method() {
            Method::Get => parse_redirect(request.url()),
            _ => None,
        };
        match redirect {
            Some(Redirect::Code { code, state: s }) => {
                respond(request, 200, CONSENT_DONE_PAGE)?;
                ensure!(
                    s.as_deref() == Some(state),
                    ConsentDeniedSnafu {
                        reason: "the redirect state does not match the request",
                    }
                );
                return Ok(code);
            }
            Some(Redirect::Error(reason)) => {
                respond(request, 200, &reason)?;
                return ConsentDeniedSnafu { reason }.fail();
            }
            // Browsers also ask for a favicon.
            None => respond(request, 404, "")?,
        }
    }
    whatever!("The authorization listener stopped before receiving a code")
}

fn respond(request: Request, status: u16, body: &str) -> SurveyResult<()> {
    request
        .respond(Response::from_string(body).with_status_code(StatusCode(status)))
        .context(ConsentListenerSnafu {})
}

fn request_token(client: &Client, token_uri: &str, params: &[(&str, &str)]) -> SurveyResult<TokenResponse> {
    debug!("request_token: {} grant_type: {:?}", token_uri, params.first());
    client
        .post(token_uri)
        .form(params)
        .send()
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.json())
        .context(HttpSnafu { url: token_uri })
}

fn granted_scopes(scope: Option<&str>, requested: &[String]) -> Vec<String> {
    match scope {
        Some(s) => s.split_whitespace().map(|x| x.to_string()).collect(),
        None => {
            warn!("granted_scopes: the token response lists no scope, assuming the requested ones");
            requested.to_vec()
        }
    }
}

fn expiry_from(expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in.map(|secs| Utc::now() + Duration::seconds(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::fake_server::FakeServer;
    use chrono::TimeZone;

    fn scope() -> Vec<String> {
        vec![SHEETS_READONLY_SCOPE.to_string()]
    }

    fn credentials(expiry: Option<DateTime<Utc>>) -> Credentials {
        Credentials {
            token: "ya29.token".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "client.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            scopes: scope(),
            expiry,
        }
    }

    #[test]
    fn expiry() {
        let now = Utc.with_ymd_and_hms(2021, 9, 15, 10, 0, 0).unwrap();
        assert!(credentials(None).is_valid(now));
        assert!(credentials(Some(now + Duration::hours(1))).is_valid(now));
        assert!(!credentials(Some(now - Duration::hours(1))).is_valid(now));
        // Within the safety margin.
        assert!(credentials(Some(now + Duration::seconds(30))).is_expired(now));
    }

    #[test]
    fn scopes() {
        let c = credentials(None);
        assert!(c.has_scopes(&scope()));
        assert!(c.has_scopes(&[]));
        assert!(!c.has_scopes(&["https://www.googleapis.com/auth/spreadsheets".to_string()]));
    }

    #[test]
    fn read_google_auth_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        fs::write(
            &token_path,
            r#"{"token": "ya29.a0", "refresh_token": "1//0g", "token_uri": "https://oauth2.googleapis.com/token",
                "client_id": "client.apps.googleusercontent.com", "client_secret": "secret",
                "scopes": ["https://www.googleapis.com/auth/spreadsheets.readonly"],
                "expiry": "2021-09-15T18:22:33.123456Z"}"#,
        )
        .unwrap();
        let store = CredentialStore::new(token_path, dir.path().join("credentials.json"));
        let creds = store.load().unwrap().unwrap();
        assert_eq!(creds.refresh_token.as_deref(), Some("1//0g"));
        assert!(creds.has_scopes(&scope()));
        assert!(creds.is_expired(Utc.with_ymd_and_hms(2021, 9, 15, 18, 30, 0).unwrap()));
        assert!(!creds.is_expired(Utc.with_ymd_and_hms(2021, 9, 15, 18, 0, 0).unwrap()));
    }

    #[test]
    fn missing_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(
            dir.path().join("token.json"),
            dir.path().join("credentials.json"),
        );
        assert_eq!(store.load().unwrap(), None);
        store.save(&credentials(None)).unwrap();
        assert_eq!(store.load().unwrap(), Some(credentials(None)));
    }

    #[test]
    fn read_client_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let secrets_path = dir.path().join("credentials.json");
        fs::write(
            &secrets_path,
            r#"{"installed": {"client_id": "client.apps.googleusercontent.com", "project_id": "cbs-survey",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth", "client_secret": "secret",
                "redirect_uris": ["http://localhost"]}}"#,
        )
        .unwrap();
        let store = CredentialStore::new(dir.path().join("token.json"), secrets_path);
        let secrets = store.load_secrets().unwrap();
        assert_eq!(secrets.client_secret, "secret");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn consent_url_parameters() {
        let secrets = ClientSecrets {
            client_id: "client.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: DEFAULT_AUTH_URI.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        };
        let url = consent_url(&secrets, &scope(), "http://localhost:8765/", "xyz").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&("scope".to_string(), SHEETS_READONLY_SCOPE.to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:8765/".to_string()
        )));
        assert!(pairs.contains(&("state".to_string(), "xyz".to_string())));
        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
    }

    #[test]
    fn redirects() {
        assert_eq!(
            parse_redirect("/?state=xyz&code=4%2F0Ab&scope=x"),
            Some(Redirect::Code {
                code: "4/0Ab".to_string(),
                state: Some("xyz".to_string())
            })
        );
        assert_eq!(
            parse_redirect("/?error=access_denied&state=xyz"),
            Some(Redirect::Error("access_denied".to_string()))
        );
        assert_eq!(parse_redirect("/favicon.ico"), None);
        assert_eq!(parse_redirect(""), None);
    }

    #[test]
    fn scopes_from_token_response() {
        assert_eq!(
            granted_scopes(Some("a b"), &scope()),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(granted_scopes(None, &scope()), scope());
    }

    fn listener() -> (Server, u16) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        (server, port)
    }

    #[test]
    fn loopback_redirect() {
        let (server, port) = listener();
        let browser = std::thread::spawn(move || {
            let favicon = reqwest::blocking::get(format!("http://127.0.0.1:{}/favicon.ico", port))
                .unwrap()
                .status()
                .as_u16();
            let done = reqwest::blocking::get(format!(
                "http://127.0.0.1:{}/?state=xyz&code=4/0Ab",
                port
            ))
            .unwrap()
            .text()
            .unwrap();
            (favicon, done)
        });
        let code = wait_for_code(&server, "xyz").unwrap();
        let (favicon, done) = browser.join().unwrap();
        assert_eq!(code, "4/0Ab");
        assert_eq!(favicon, 404);
        assert_eq!(done, CONSENT_DONE_PAGE);
    }

    #[test]
    fn loopback_redirect_with_wrong_state() {
        let (server, port) = listener();
        let browser = std::thread::spawn(move || {
            reqwest::blocking::get(format!("http://127.0.0.1:{}/?state=other&code=abc", port))
                .unwrap()
                .status()
                .as_u16()
        });
        let res = wait_for_code(&server, "xyz");
        assert_eq!(browser.join().unwrap(), 200);
        assert!(matches!(res, Err(SurveyError::ConsentDenied { .. })));
    }

    #[test]
    fn loopback_redirect_with_denied_consent() {
        let (server, port) = listener();
        let browser = std::thread::spawn(move || {
            reqwest::blocking::get(format!("http://127.0.0.1:{}/?error=access_denied", port))
                .unwrap()
                .text()
                .unwrap()
        });
        let res = wait_for_code(&server, "xyz");
        assert_eq!(browser.join().unwrap(), "access_denied");
        assert!(matches!(
            res,
            Err(SurveyError::ConsentDenied { reason }) if reason == "access_denied"
        ));
    }

    fn store_with(dir: &tempfile::TempDir, creds: &Credentials) -> CredentialStore {
        let store = CredentialStore::new(
            dir.path().join("token.json"),
            dir.path().join("credentials.json"),
        );
        store.save(creds).unwrap();
        store
    }

    #[test]
    fn authorize_reuses_a_valid_credential() {
        let dir = tempfile::tempdir().unwrap();
        let cached = credentials(Some(Utc::now() + Duration::hours(1)));
        let store = store_with(&dir, &cached);
        // No secrets file and no token endpoint: anything but the cache would fail.
        let creds = authorize(&Client::new(), &store, &scope()).unwrap();
        assert_eq!(creds, cached);
    }

    #[test]
    fn authorize_refreshes_an_expired_credential() {
        let server = FakeServer::spawn(|_| {
            (
                200,
                r#"{"access_token": "ya29.fresh", "expires_in": 3599, "token_type": "Bearer",
                    "scope": "https://www.googleapis.com/auth/spreadsheets.readonly"}"#
                    .to_string(),
            )
        });
        let dir = tempfile::tempdir().unwrap();
        let mut cached = credentials(Some(Utc::now() - Duration::hours(1)));
        cached.token_uri = format!("{}/token", server.base);
        let store = store_with(&dir, &cached);

        let creds = authorize(&Client::new(), &store, &scope()).unwrap();
        let seen = server.finish();

        assert_eq!(creds.token, "ya29.fresh");
        // Google does not send the refresh token again.
        assert_eq!(creds.refresh_token.as_deref(), Some("1//refresh"));
        assert!(creds.is_valid(Utc::now()));
        assert_eq!(store.load().unwrap(), Some(creds));

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].url, "/token");
        assert!(seen[0].body.contains("grant_type=refresh_token"));
        assert!(seen[0].body.contains("client_id=client.apps.googleusercontent.com"));
    }

    #[test]
    fn refused_refresh_is_an_error() {
        let server = FakeServer::spawn(|_| (400, r#"{"error": "invalid_grant"}"#.to_string()));
        let mut cached = credentials(Some(Utc::now() - Duration::hours(1)));
        cached.token_uri = format!("{}/token", server.base);
        let res = refresh(&Client::new(), &cached);
        server.finish();
        assert!(matches!(res, Err(SurveyError::Http { .. })));
    }

    #[test]
    fn expired_credential_without_refresh_token_asks_for_consent() {
        let dir = tempfile::tempdir().unwrap();
        let mut cached = credentials(Some(Utc::now() - Duration::hours(1)));
        cached.refresh_token = None;
        let store = store_with(&dir, &cached);
        // The consent flow starts by reading the client secrets, which are missing here.
        let res = authorize(&Client::new(), &store, &scope());
        assert!(matches!(res, Err(SurveyError::OpeningJson { .. })));
    }
}
