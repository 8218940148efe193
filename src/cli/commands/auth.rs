use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use anyhow::{Context as _, Result};
use serde::Serialize;

use bandmeta::state::{GrantMode, TokenStatus};

use super::utils::{emit, Context};

/// Log in with the authorization-code flow and switch lookups to the user token.
pub async fn run(ctx: &mut Context) -> Result<()> {
    let redirect_uri = ctx.config.spotify.redirect_uri.clone();
    let state = format!("{:016x}", rand::random::<u64>());
    let auth_url = ctx.tokens.authorize_url(&redirect_uri, &state);

    println!("Opening browser for Spotify authorization...\n");
    println!("If it doesn't open, visit:\n{}\n", auth_url);

    let _ = open::that(&auth_url);

    let bind_addr = callback_addr(&redirect_uri)?;
    let code = tokio::task::spawn_blocking(move || wait_for_callback(&bind_addr, &state))
        .await
        .context("Callback listener panicked")??;

    println!("Exchanging code for token...");
    ctx.tokens
        .exchange_code(&code, &redirect_uri)
        .await
        .context("Spotify rejected the authorization code")?;

    ctx.config.spotify.grant = GrantMode::AuthorizationCode;
    ctx.save_config()?;

    println!("\nSuccessfully authenticated with Spotify!");
    println!("  Token saved under {:?}", ctx.config.credentials_dir());

    Ok(())
}

/// `host:port` to listen on, taken from the registered redirect URI.
fn callback_addr(redirect_uri: &str) -> Result<String> {
    let rest = redirect_uri
        .strip_prefix("http://")
        .context("Redirect URI must be a plain http loopback address")?;
    let authority = rest.split('/').next().unwrap_or(rest);
    if !authority.contains(':') {
        anyhow::bail!("Redirect URI {} has no port", redirect_uri);
    }
    Ok(authority.to_string())
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Denied(String),
    StateMismatch,
    NotCallback,
}

/// Classify the request line the browser sends to the loopback listener,
/// e.g. `GET /callback?code=xxx&state=yyy HTTP/1.1`.
fn parse_callback(request_line: &str, expected_state: &str) -> Callback {
    let Some(query) = request_line
        .split_whitespace()
        .nth(1)
        .and_then(|path| path.split_once('?'))
        .map(|(_, query)| query)
    else {
        return Callback::NotCallback;
    };

    let params: HashMap<&str, String> = query
        .split('&')
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| {
            let decoded = urlencoding::decode(v).map(|s| s.into_owned());
            (k, decoded.unwrap_or_else(|_| v.to_string()))
        })
        .collect();

    if let Some(error) = params.get("error") {
        return Callback::Denied(error.clone());
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Callback::StateMismatch;
    }
    match params.get("code") {
        Some(code) => Callback::Code(code.clone()),
        None => Callback::NotCallback,
    }
}

fn wait_for_callback(bind_addr: &str, expected_state: &str) -> Result<String> {
    let listener = TcpListener::bind(bind_addr).with_context(|| {
        format!("Failed to bind to {}. Is another instance running?", bind_addr)
    })?;

    println!("Waiting for callback on {}...", bind_addr);

    for stream in listener.incoming() {
        let mut stream = stream?;
        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        match parse_callback(&request_line, expected_state) {
            Callback::Code(code) => {
                send_response(
                    &mut stream,
                    "200 OK",
                    "<html><body><h1>Success!</h1><p>You can close this tab.</p></body></html>",
                )?;
                return Ok(code);
            }
            Callback::Denied(error) => {
                send_response(&mut stream, "400 Bad Request", &format!("Auth failed: {}", error))?;
                anyhow::bail!("Authorization denied: {}", error);
            }
            Callback::StateMismatch => {
                tracing::warn!("callback state mismatch, ignoring request");
                send_response(&mut stream, "400 Bad Request", "State mismatch - possible CSRF")?;
            }
            Callback::NotCallback => {
                send_response(&mut stream, "404 Not Found", "Not Found")?;
            }
        }
    }

    anyhow::bail!("No valid callback received")
}

fn send_response(stream: &mut impl Write, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()?;
    Ok(())
}

pub async fn logout(ctx: &mut Context) -> Result<()> {
    let had_token = ctx.tokens.current().await.is_some();
    ctx.tokens.clear().await.context("Failed to delete stored token")?;

    if ctx.config.spotify.grant == GrantMode::AuthorizationCode {
        ctx.config.spotify.grant = GrantMode::ClientCredentials;
        ctx.save_config()?;
    }

    if had_token {
        println!("Logged out from Spotify");
        println!("Run 'bandmeta auth' to login again");
    } else {
        println!("Not logged in to Spotify");
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    provider: String,
    grant: GrantMode,
    status: TokenStatus,
    token_type: Option<String>,
    scope: Option<String>,
    expires_in_secs: Option<i64>,
}

pub async fn status(ctx: &Context, json: bool) -> Result<()> {
    let token = ctx.tokens.current().await;
    let report = StatusReport {
        provider: ctx.tokens.provider().to_string(),
        grant: ctx.tokens.mode(),
        status: ctx.tokens.status().await,
        token_type: token.as_ref().map(|t| t.token_type.clone()),
        scope: token.as_ref().and_then(|t| t.scope.clone()),
        expires_in_secs: token.as_ref().map(|t| t.remaining_secs()),
    };

    emit(json, &report, |r| {
        println!("{}: {:?} ({:?})", r.provider, r.status, r.grant);
        if let Some(token_type) = &r.token_type {
            println!("Token type: {}", token_type);
        }
        if let Some(scope) = &r.scope {
            println!("Scopes: {}", scope);
        }
        match r.expires_in_secs {
            Some(secs) if secs > 0 => println!("Token expires in: {}s", secs),
            Some(_) => println!("Token expired (will refresh on next use)"),
            None if r.grant == GrantMode::AuthorizationCode => {
                println!("Run 'bandmeta auth' to log in")
            }
            None => println!("A client token is requested on first lookup"),
        }
    })
}
