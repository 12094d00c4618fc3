use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use super::flow::{AuthFlowController, CallbackQuery};
use super::store::EphemeralStore;
use super::{AuthError, SessionStatus};

const SUCCESS_HTML: &str = r#"<html><body><h1>Signed in</h1><p>You may close this window and return to the terminal.</p></body></html>"#;
const ERROR_HTML: &str = r#"<html><body><h1>Sign-in failed</h1><p>Please return to the terminal and start a new login.</p></body></html>"#;

/// Drive a complete login round-trip through the system browser.
///
/// Binds the configured redirect URI on loopback, starts the login attempt,
/// hands the authorization URL to `notify` (and the browser, when asked),
/// then waits for the provider to redirect back with `code` and `state`.
/// The callback handler rebuilds everything from the ephemeral store and
/// the redirect query; nothing is carried over in-memory from `login()`
/// beyond what the store holds.
pub async fn run_login<S, F>(
    controller: &mut AuthFlowController<S>,
    open_browser: bool,
    notify_authorization_url: F,
) -> Result<SessionStatus, AuthError>
where
    S: EphemeralStore,
    F: Fn(&Url) -> Result<(), AuthError>,
{
    let redirect = controller.config().redirect_uri.clone();
    let host = redirect
        .host_str()
        .ok_or(AuthError::MissingRedirectPort)?
        .to_owned();
    let port = redirect.port().ok_or(AuthError::MissingRedirectPort)?;

    // Bind before redirecting so the provider can never race the listener.
    let listener = TcpListener::bind((host.as_str(), port)).await?;

    let auth_url = controller.login()?;
    notify_authorization_url(&auth_url)?;

    if open_browser {
        open::that(auth_url.as_str()).map_err(|err| AuthError::BrowserLaunch(err.to_string()))?;
    }

    let (mut stream, query) = accept_redirect(listener).await?;
    let outcome = controller.callback(query).await;

    match &outcome {
        Ok(()) => respond(&mut stream, 200, SUCCESS_HTML).await?,
        Err(_) => respond(&mut stream, 400, ERROR_HTML).await?,
    }
    let _ = stream.shutdown().await;
    outcome?;

    Ok(controller.session().status().await)
}

async fn accept_redirect(listener: TcpListener) -> Result<(TcpStream, CallbackQuery), AuthError> {
    let (mut stream, _addr) = listener.accept().await?;
    let mut buffer = [0u8; 4096];
    let n = stream.read(&mut buffer).await?;
    if n == 0 {
        return Err(AuthError::ListenerClosed);
    }
    let request = String::from_utf8_lossy(&buffer[..n]);
    let path = parse_request_path(&request)?;
    let url = Url::parse(&format!("http://localhost{path}"))?;
    let query = CallbackQuery::from_url(&url);
    Ok((stream, query))
}

fn parse_request_path(request: &str) -> Result<&str, AuthError> {
    let first_line = request
        .lines()
        .next()
        .ok_or_else(|| AuthError::InvalidAuthorizationResponse("missing request line".into()))?;
    let mut parts = first_line.split_whitespace();
    let _method = parts
        .next()
        .ok_or_else(|| AuthError::InvalidAuthorizationResponse("missing method".into()))?;
    parts
        .next()
        .ok_or_else(|| AuthError::InvalidAuthorizationResponse("missing path".into()))
}

async fn respond(stream: &mut TcpStream, status: u16, body: &str) -> Result<(), AuthError> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let response = format!(
        "{status_line}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}
