// src/testutil.rs
//! Shared helpers for in-module tests: logging and a throwaway HTTP server.

use tracing_subscriber::{fmt, EnvFilter};
use url::Url;
use warp::{Filter, Rejection, Reply};

pub fn init_logging() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,esrscraper=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Serve `routes` on an ephemeral localhost port and return its base URL.
pub fn spawn_server<F, R>(routes: F) -> Url
where
    F: Filter<Extract = (R,), Error = Rejection> + Clone + Send + Sync + 'static,
    R: Reply,
{
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    Url::parse(&format!("http://{}", addr)).expect("local address should form a URL")
}
