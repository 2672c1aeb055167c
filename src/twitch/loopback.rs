//! One-shot HTTP listener for the implicit-grant redirect.
//!
//! Twitch puts the token in the URL fragment, which browsers never send to
//! the server. The first request gets a tiny page that re-requests
//! `/callback` with the fragment moved into the query string.

use crate::error::{AuthError, BotError, BotResult};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

const MAX_REQUEST_BYTES: usize = 8 * 1024;
const WAIT_LIMIT: Duration = Duration::from_secs(300);
const READ_LIMIT: Duration = Duration::from_secs(5);

const FORWARD_PAGE: &str = r#"<!doctype html>
<html><body>
<p>Finishing sign-in&hellip;</p>
<script>
if (window.location.hash.length > 1) {
  window.location.replace("/callback?" + window.location.hash.substring(1));
} else {
  document.body.innerHTML = "<p>No token received. You can close this window.</p>";
}
</script>
</body></html>"#;

const DONE_PAGE: &str = "<!doctype html><html><body><p>Signed in. You can close this window.</p></body></html>";
const FAILED_PAGE: &str = "<!doctype html><html><body><p>Sign-in failed. You can close this window.</p></body></html>";

/// Inspects a request target like `/callback?access_token=..&state=..`.
///
/// Returns `None` when the request carries neither a token nor an error,
/// meaning the browser still needs the forwarding page.
pub fn parse_callback(target: &str, expected_state: &str) -> Option<Result<String, AuthError>> {
    let url = Url::parse(&format!("http://localhost{}", target)).ok()?;

    let mut token = None;
    let mut error = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "access_token" => token = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    if token.is_none() && error.is_none() {
        return None;
    }
    if state.as_deref() != Some(expected_state) {
        return Some(Err(AuthError::StateMismatch));
    }
    if let Some(error) = error {
        return Some(Err(match error.as_str() {
            "access_denied" => AuthError::Declined,
            other => AuthError::Rejected(other.to_string()),
        }));
    }
    token.map(Ok)
}

/// Serves the redirect on `127.0.0.1:port` until a token or an error arrives.
pub async fn wait_for_token(port: u16, expected_state: &str) -> BotResult<String> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Waiting for the authorization redirect on http://localhost:{}", port);

    timeout(WAIT_LIMIT, accept_loop(&listener, expected_state))
        .await
        .map_err(|_| BotError::Auth(AuthError::Expired))?
}

async fn accept_loop(listener: &TcpListener, expected_state: &str) -> BotResult<String> {
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<Result<String, AuthError>>(1);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                debug!("Loopback connection from {}", peer);
                tokio::spawn(serve_connection(stream, expected_state.to_string(), outcome_tx.clone()));
            }
            Some(outcome) = outcome_rx.recv() => return outcome.map_err(BotError::from),
        }
    }
}

/// Answers one browser request. Idle or broken connections are dropped
/// without affecting the others.
async fn serve_connection(
    mut stream: TcpStream,
    expected_state: String,
    outcome: mpsc::Sender<Result<String, AuthError>>,
) {
    let target = match timeout(READ_LIMIT, read_request_target(&mut stream)).await {
        Ok(Ok(Some(target))) => target,
        Ok(Ok(None)) => {
            let _ = write_response(&mut stream, "400 Bad Request", FAILED_PAGE).await;
            return;
        }
        Ok(Err(e)) => {
            warn!("Failed to read loopback request: {}", e);
            return;
        }
        Err(_) => {
            debug!("Dropping idle loopback connection");
            return;
        }
    };

    let (page, result) = match parse_callback(&target, &expected_state) {
        None => (FORWARD_PAGE, None),
        Some(Ok(token)) => (DONE_PAGE, Some(Ok(token))),
        Some(Err(e)) => (FAILED_PAGE, Some(Err(e))),
    };
    if let Err(e) = write_response(&mut stream, "200 OK", page).await {
        warn!("Failed to answer loopback request: {}", e);
    }
    if let Some(result) = result {
        let _ = outcome.send(result).await;
    }
}

/// Reads the request head and returns the target of a GET request line.
async fn read_request_target(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !buf.windows(4).any(|w| w == b"\r\n\r\n") && buf.len() < MAX_REQUEST_BYTES {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(Some(target.to_string())),
        _ => Ok(None),
    }
}

async fn write_response(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_redirect_needs_forwarding() {
        assert_eq!(parse_callback("/", "s1"), None);
        assert_eq!(parse_callback("/favicon.ico", "s1"), None);
    }

    #[test]
    fn token_with_matching_state() {
        let got = parse_callback("/callback?access_token=tok123&scope=chat%3Aread&state=s1&token_type=bearer", "s1");
        assert_eq!(got, Some(Ok("tok123".to_string())));
    }

    #[test]
    fn state_mismatch_is_rejected() {
        let got = parse_callback("/callback?access_token=tok123&state=other", "s1");
        assert_eq!(got, Some(Err(AuthError::StateMismatch)));

        let missing = parse_callback("/callback?access_token=tok123", "s1");
        assert_eq!(missing, Some(Err(AuthError::StateMismatch)));
    }

    #[test]
    fn denied_request_is_declined() {
        let got = parse_callback("/?error=access_denied&error_description=The+user+denied&state=s1", "s1");
        assert_eq!(got, Some(Err(AuthError::Declined)));
    }

    #[tokio::test]
    async fn listener_forwards_then_accepts_token() {
        let port = free_port();

        let server = tokio::spawn(async move { wait_for_token(port, "st").await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let first = send(port, "/").await;
        assert!(first.contains("window.location.replace"));

        let second = send(port, "/callback?access_token=abc&state=st").await;
        assert!(second.starts_with("HTTP/1.1 200 OK"));

        assert_eq!(server.await.unwrap().unwrap(), "abc");
    }

    #[tokio::test]
    async fn silent_connection_does_not_block_callback() {
        let port = free_port();
        let server = tokio::spawn(async move { wait_for_token(port, "st").await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // A preconnect that never sends a request
        let _idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let response = timeout(Duration::from_secs(2), send(port, "/callback?access_token=abc&state=st"))
            .await
            .expect("callback answered while another connection sits idle");
        assert!(response.contains("Signed in"));
        assert_eq!(server.await.unwrap().unwrap(), "abc");
    }

    #[tokio::test]
    async fn aborted_forwarding_request_keeps_listening() {
        let port = free_port();
        let server = tokio::spawn(async move { wait_for_token(port, "st").await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Send a request and hang up before reading the forwarding page
        {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            stream.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let response = send(port, "/callback?access_token=abc&state=st").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(server.await.unwrap().unwrap(), "abc");
    }

    #[tokio::test]
    async fn declined_redirect_ends_the_wait() {
        let port = free_port();
        let server = tokio::spawn(async move { wait_for_token(port, "st").await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let response = send(port, "/callback?error=access_denied&state=st").await;
        assert!(response.contains("Sign-in failed"));
        assert!(matches!(server.await.unwrap(), Err(BotError::Auth(AuthError::Declined))));
    }

    // The caller needs to know the port up front, so grab a free one first.
    fn free_port() -> u16 {
        let socket = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap().port()
    }

    async fn send(port: u16, target: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }
}
