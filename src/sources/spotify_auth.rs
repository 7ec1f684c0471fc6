//! One-time Spotify authorization (authorization-code flow).
//!
//! The operator opens the authorize URL, Spotify redirects the browser to
//! `spotify.redirect_uri`, and the code received there is exchanged for the
//! refresh token that [`SpotifySource`](super::SpotifySource) runs on.

use super::spotify::{check_credentials, http_client, ACCOUNTS_URL};
use super::SourceError;
use crate::config::SpotifyConfig;
use reqwest::Url;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Scope needed to read the player state.
pub const SCOPE: &str = "user-read-playback-state";

const AUTHORIZED_PAGE: &str = "Pulse Relay is authorized. You can close this tab.\n";

#[derive(Debug, Deserialize)]
struct CodeExchangeResponse {
    refresh_token: Option<String>,
}

pub struct SpotifyAuthorizer {
    config: SpotifyConfig,
    redirect: Url,
    accounts_url: String,
    client: reqwest::Client,
}

impl SpotifyAuthorizer {
    pub fn new(config: SpotifyConfig) -> Result<Self, SourceError> {
        Self::with_accounts_url(config, ACCOUNTS_URL)
    }

    pub fn with_accounts_url(
        config: SpotifyConfig,
        accounts_url: impl Into<String>,
    ) -> Result<Self, SourceError> {
        check_credentials(&config)?;
        let redirect = Url::parse(&config.redirect_uri)
            .map_err(|e| SourceError::NotConfigured(format!("spotify.redirect_uri: {e}")))?;
        if redirect.scheme() != "http" || redirect.host_str().is_none() {
            return Err(SourceError::NotConfigured(
                "spotify.redirect_uri must be a local http:// address".to_string(),
            ));
        }

        Ok(Self {
            config,
            redirect,
            accounts_url: accounts_url.into(),
            client: http_client()?,
        })
    }

    /// Page the operator opens to grant access.
    pub fn authorize_url(&self, state: &str) -> Result<Url, SourceError> {
        Url::parse_with_params(
            &format!("{}/authorize", self.accounts_url),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", SCOPE),
                ("state", state),
            ],
        )
        .map_err(|e| SourceError::Parse(e.to_string()))
    }

    /// Listen on the redirect address.
    pub async fn bind(&self) -> Result<TcpListener, SourceError> {
        let host = self.redirect.host_str().unwrap_or("127.0.0.1");
        let port = self.redirect.port_or_known_default().unwrap_or(80);
        Ok(TcpListener::bind((host, port)).await?)
    }

    /// Serve the redirect until it delivers a code. Requests for other
    /// paths get a 404 and are ignored.
    pub async fn receive_code(
        &self,
        listener: &TcpListener,
        state: &str,
    ) -> Result<String, SourceError> {
        loop {
            let (mut stream, peer) = listener.accept().await?;
            let request_line = read_request_line(&mut stream).await?;
            tracing::debug!("Authorization callback from {peer}: {request_line}");

            match callback_code(&request_line, &self.redirect, state) {
                Ok(Some(code)) => {
                    respond(&mut stream, "200 OK", AUTHORIZED_PAGE).await?;
                    return Ok(code);
                }
                Ok(None) => respond(&mut stream, "404 Not Found", "Not found\n").await?,
                Err(e) => {
                    respond(&mut stream, "400 Bad Request", &format!("{e}\n")).await?;
                    return Err(e);
                }
            }
        }
    }

    /// Trade an authorization code for a refresh token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, SourceError> {
        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_url))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SourceError::Response {
                status: status.as_u16(),
                message,
            });
        }

        let body: CodeExchangeResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        body.refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SourceError::Authorization("no refresh token returned".to_string()))
    }
}

/// Extract the code from a callback request line.
///
/// `Ok(None)` when the request is for some other path.
pub fn callback_code(
    request_line: &str,
    redirect: &Url,
    expected_state: &str,
) -> Result<Option<String>, SourceError> {
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return Ok(None);
    };

    let url = redirect
        .join(target)
        .map_err(|e| SourceError::Parse(e.to_string()))?;
    if url.path() != redirect.path() {
        return Ok(None);
    }

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(SourceError::Authorization(value.into_owned())),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(SourceError::Authorization("state mismatch".to_string()));
    }
    code.map(Some)
        .ok_or_else(|| SourceError::Authorization("callback carried no code".to_string()))
}

/// Read the request line and drain the headers.
async fn read_request_line(stream: &mut TcpStream) -> Result<String, SourceError> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut header = String::new();
    loop {
        header.clear();
        let n = reader.read_line(&mut header).await?;
        if n == 0 || header.trim().is_empty() {
            break;
        }
    }
    Ok(request_line.trim_end().to_string())
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<(), SourceError> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn configured(redirect_uri: &str) -> SpotifyConfig {
        SpotifyConfig {
            enable: true,
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: redirect_uri.to_string(),
            ..SpotifyConfig::default()
        }
    }

    fn callback() -> Url {
        Url::parse("http://127.0.0.1:8888/callback").unwrap()
    }

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (url, handle)
    }

    #[test]
    fn test_authorize_url_carries_scope_and_redirect() {
        let auth = SpotifyAuthorizer::new(configured("http://127.0.0.1:8888/callback")).unwrap();
        let url = auth.authorize_url("xyz").unwrap();

        assert_eq!(url.path(), "/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "id".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), SCOPE.into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://127.0.0.1:8888/callback".into()
        )));
    }

    #[test]
    fn test_bad_redirect_or_credentials_rejected() {
        assert!(matches!(
            SpotifyAuthorizer::new(configured("not a url")),
            Err(SourceError::NotConfigured(_))
        ));
        assert!(matches!(
            SpotifyAuthorizer::new(SpotifyConfig::default()),
            Err(SourceError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_callback_code() {
        let redirect = callback();
        assert_eq!(
            callback_code("GET /callback?code=abc&state=s1 HTTP/1.1", &redirect, "s1").unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(
            callback_code("GET /favicon.ico HTTP/1.1", &redirect, "s1").unwrap(),
            None
        );
        assert!(matches!(
            callback_code("GET /callback?code=abc&state=other HTTP/1.1", &redirect, "s1"),
            Err(SourceError::Authorization(_))
        ));
        assert!(matches!(
            callback_code(
                "GET /callback?error=access_denied&state=s1 HTTP/1.1",
                &redirect,
                "s1"
            ),
            Err(SourceError::Authorization(e)) if e == "access_denied"
        ));
    }

    #[tokio::test]
    async fn test_receive_code_skips_unrelated_requests() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let auth =
            SpotifyAuthorizer::new(configured(&format!("http://127.0.0.1:{port}/callback")))
                .unwrap();

        let browser = tokio::spawn(async move {
            let mut replies = Vec::new();
            for target in ["/favicon.ico", "/callback?code=c0de&state=s1"] {
                let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
                let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
                stream.write_all(request.as_bytes()).await.unwrap();
                let mut reply = String::new();
                stream.read_to_string(&mut reply).await.unwrap();
                replies.push(reply);
            }
            replies
        });

        let code = auth.receive_code(&listener, "s1").await.unwrap();
        assert_eq!(code, "c0de");

        let replies = browser.await.unwrap();
        assert!(replies[0].starts_with("HTTP/1.1 404"));
        assert!(replies[1].starts_with("HTTP/1.1 200"));
        assert!(replies[1].ends_with(AUTHORIZED_PAGE));
    }

    #[tokio::test]
    async fn test_exchange_code_returns_refresh_token() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"access_token":"a","expires_in":3600,"refresh_token":"r3fresh"}"#,
        )
        .await;
        let auth = SpotifyAuthorizer::with_accounts_url(
            configured("http://127.0.0.1:8888/callback"),
            url,
        )
        .unwrap();

        assert_eq!(auth.exchange_code("c0de").await.unwrap(), "r3fresh");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/token"));
        assert!(request.contains("grant_type=authorization_code"));
        assert!(request.contains("code=c0de"));
    }

    #[tokio::test]
    async fn test_exchange_code_reports_rejection() {
        let (url, _server) = serve_once("400 Bad Request", r#"{"error":"invalid_grant"}"#).await;
        let auth = SpotifyAuthorizer::with_accounts_url(
            configured("http://127.0.0.1:8888/callback"),
            url,
        )
        .unwrap();

        assert!(matches!(
            auth.exchange_code("stale").await,
            Err(SourceError::Response { status: 400, .. })
        ));
    }
}
