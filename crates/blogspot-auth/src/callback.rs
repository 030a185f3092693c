//! Interactive authorization through a one-shot local callback listener.
//!
//! The listener binds an ephemeral port on the loopback interface, the
//! session's redirect URI is pointed at it, and the user's browser is sent
//! to Google's consent screen. The first request on the callback path
//! decides the outcome; the listener is dropped as soon as it is answered.

use crate::error::{AuthError, AuthResult};
use crate::session::AuthSession;
use crate::store::CredentialStore;
use crate::token::TokenSet;
use blogspot_util::Identifier;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Callback path registered with the OAuth client.
pub const CALLBACK_PATH: &str = "/auth/google/callback";

/// How long a connection may sit before sending its request line.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(30);

const HTML_SUCCESS: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Blogspot MCP - Authorization Successful</title>
  <style>
    body { font-family: system-ui, -apple-system, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #fafafa; color: #222; }
    .container { text-align: center; padding: 2rem; }
    h1 { color: #16a34a; margin-bottom: 1rem; }
    p { color: #555; }
  </style>
</head>
<body>
  <div class="container">
    <h1>Authorization Successful</h1>
    <p>Blogger access has been granted. You can close this window.</p>
  </div>
  <script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#;

fn html_error(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Blogspot MCP - Authorization Failed</title>
  <style>
    body {{ font-family: system-ui, -apple-system, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #fafafa; color: #222; }}
    .container {{ text-align: center; padding: 2rem; }}
    h1 {{ color: #dc2626; margin-bottom: 1rem; }}
    .error {{ color: #b91c1c; font-family: monospace; margin-top: 1rem; padding: 1rem; background: rgba(220,38,38,0.08); border-radius: 0.5rem; }}
  </style>
</head>
<body>
  <div class="container">
    <h1>Authorization Failed</h1>
    <p>Return to the terminal and try again.</p>
    <div class="error">{}</div>
  </div>
</body>
</html>"#,
        html_escape(error)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn http_response(status: u16, content_type: &str, body: &str) -> String {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    };

    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        content_type,
        body.len(),
        body
    )
}

/// Opens URLs for the user.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Opens the platform default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}

/// What a request on the listener asked for.
#[derive(Debug, PartialEq, Eq)]
enum CallbackRequest {
    /// Not the callback path (favicon, probes).
    Other,
    Code {
        code: String,
        state: Option<String>,
    },
    /// Provider `error` parameter, or a callback without a code.
    Denied(String),
    Malformed,
}

fn parse_request(raw: &str, callback_path: &str) -> CallbackRequest {
    let Some(target) = raw
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    else {
        return CallbackRequest::Malformed;
    };

    let Ok(parsed) = url::Url::parse(&format!("http://127.0.0.1{target}")) else {
        return CallbackRequest::Malformed;
    };

    if parsed.path() != callback_path {
        return CallbackRequest::Other;
    }

    let params: HashMap<String, String> = parsed
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if let Some(error) = params.get("error") {
        let message = params
            .get("error_description")
            .cloned()
            .unwrap_or_else(|| error.clone());
        return CallbackRequest::Denied(message);
    }

    match params.get("code").filter(|c| !c.is_empty()) {
        Some(code) => CallbackRequest::Code {
            code: code.clone(),
            state: params.get("state").cloned(),
        },
        None => CallbackRequest::Denied("No authorization code provided".to_string()),
    }
}

async fn respond(stream: &mut TcpStream, status: u16, content_type: &str, body: &str) {
    let response = http_response(status, content_type, body);
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        warn!(error = %e, "Failed to write callback response");
    }
    stream.shutdown().await.ok();
}

async fn read_request(
    mut stream: TcpStream,
    peer: SocketAddr,
    tx: mpsc::Sender<(TcpStream, String)>,
) {
    let mut buffer = [0u8; 4096];
    let n = match tokio::time::timeout(REQUEST_READ_TIMEOUT, stream.read(&mut buffer)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            warn!(error = %e, %peer, "Failed to read callback request");
            return;
        }
        Err(_) => {
            debug!(%peer, "Callback connection idle, dropping");
            return;
        }
    };
    let raw = String::from_utf8_lossy(&buffer[..n]).into_owned();
    // The receiver is gone once the flow has finished.
    let _ = tx.send((stream, raw)).await;
}

/// Loopback listener for one authorization attempt.
pub struct CallbackListener {
    listener: TcpListener,
    redirect_uri: String,
    callback_path: String,
}

impl CallbackListener {
    /// Bind an OS-assigned port on 127.0.0.1.
    pub async fn bind() -> AuthResult<Self> {
        Self::bind_port(0, None).await
    }

    /// Bind the port and path of a fixed redirect URI.
    pub async fn bind_redirect(redirect_uri: &str) -> AuthResult<Self> {
        let parsed = url::Url::parse(redirect_uri)
            .map_err(|e| AuthError::Listener(format!("Invalid redirect URI {redirect_uri}: {e}")))?;
        let port = parsed.port_or_known_default().ok_or_else(|| {
            AuthError::Listener(format!("Redirect URI {redirect_uri} has no port"))
        })?;
        let mut listener = Self::bind_port(port, Some(parsed.path().to_string())).await?;
        listener.redirect_uri = redirect_uri.to_string();
        Ok(listener)
    }

    async fn bind_port(port: u16, callback_path: Option<String>) -> AuthResult<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            AuthError::Listener(format!("Failed to bind callback listener on {addr}: {e}"))
        })?;
        let port = listener.local_addr()?.port();
        let callback_path = callback_path.unwrap_or_else(|| CALLBACK_PATH.to_string());

        debug!(port, path = %callback_path, "Callback listener bound");
        Ok(Self {
            listener,
            redirect_uri: format!("http://localhost:{port}{callback_path}"),
            callback_path,
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn port(&self) -> AuthResult<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Serve requests until the callback arrives, then exchange and persist.
    ///
    /// Waits indefinitely. Consumes the listener, so the port is released
    /// when this returns.
    pub async fn complete(
        self,
        session: &AuthSession,
        store: &CredentialStore,
        expected_state: &str,
    ) -> AuthResult<TokenSet> {
        // Each connection is read in its own task so an idle socket (a
        // browser preconnect) cannot hold up the real callback.
        let (tx, mut rx) = mpsc::channel::<(TcpStream, String)>(8);
        loop {
            let (mut stream, raw) = tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    tokio::spawn(read_request(stream, peer, tx.clone()));
                    continue;
                }
                Some(request) = rx.recv() => request,
            };

            match parse_request(&raw, &self.callback_path) {
                CallbackRequest::Other => {
                    respond(&mut stream, 404, "text/plain", "Not Found").await;
                }
                CallbackRequest::Malformed => {
                    respond(&mut stream, 400, "text/plain", "Bad Request").await;
                }
                CallbackRequest::Denied(reason) => {
                    warn!(reason = %reason, "Authorization was not granted");
                    respond(&mut stream, 400, "text/html", &html_error(&reason)).await;
                    return Err(AuthError::Denied(reason));
                }
                CallbackRequest::Code { code, state } => {
                    if state.as_deref() != Some(expected_state) {
                        error!("OAuth callback with invalid state");
                        let html = html_error("Invalid or missing state parameter");
                        respond(&mut stream, 400, "text/html", &html).await;
                        return Err(AuthError::StateMismatch);
                    }

                    let result = match session.exchange_code(&code).await {
                        Ok(tokens) => store.save(&tokens).await.map(|()| tokens),
                        Err(e) => Err(e),
                    };

                    return match result {
                        Ok(tokens) => {
                            respond(&mut stream, 200, "text/html", HTML_SUCCESS).await;
                            info!("Authorization completed");
                            Ok(tokens)
                        }
                        Err(e) => {
                            error!(error = %e, "Authorization code exchange failed");
                            respond(&mut stream, 500, "text/html", &html_error(&e.to_string()))
                                .await;
                            Err(e)
                        }
                    };
                }
            }
        }
    }
}

/// Runs the whole interactive flow: listen, open the browser, exchange, save.
pub struct AuthorizationFlow {
    session: Arc<AuthSession>,
    store: Arc<CredentialStore>,
    opener: Arc<dyn BrowserOpener>,
    fixed_redirect: Option<String>,
}

impl AuthorizationFlow {
    pub fn new(session: Arc<AuthSession>, store: Arc<CredentialStore>) -> Self {
        Self {
            session,
            store,
            opener: Arc::new(SystemBrowser),
            fixed_redirect: None,
        }
    }

    pub fn with_opener(mut self, opener: Arc<dyn BrowserOpener>) -> Self {
        self.opener = opener;
        self
    }

    /// Use a pre-registered redirect URI instead of an ephemeral port.
    pub fn with_fixed_redirect(mut self, redirect_uri: Option<String>) -> Self {
        self.fixed_redirect = redirect_uri;
        self
    }

    pub async fn run(&self) -> AuthResult<TokenSet> {
        let attempt = Identifier::auth_attempt();
        let listener = match &self.fixed_redirect {
            Some(uri) => CallbackListener::bind_redirect(uri).await?,
            None => CallbackListener::bind().await?,
        };

        self.session
            .set_redirect_uri(listener.redirect_uri().to_string())
            .await;
        let request = self.session.build_authorization_url().await?;

        info!(attempt = %attempt, redirect_uri = %listener.redirect_uri(), "Starting interactive authorization");
        // stdout may carry protocol frames; the prompt goes to stderr.
        eprintln!("Open this URL in your browser to authorize Blogger access:\n\n  {}\n", request.url);
        if let Err(e) = self.opener.open(&request.url) {
            warn!(error = %e, "Could not open browser; use the printed URL");
        }

        listener
            .complete(&self.session, &self.store, &request.state)
            .await
    }
}
