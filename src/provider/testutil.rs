//! In-process fake provider for HTTP-level tests.

use axum::Router;

use crate::state::HttpConfig;

/// Serve `app` on an ephemeral loopback port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn client() -> reqwest::Client {
    crate::provider::http::build_client(&HttpConfig {
        timeout_secs: 2,
        ..HttpConfig::default()
    })
    .unwrap()
}
