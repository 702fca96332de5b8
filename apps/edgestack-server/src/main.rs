//! EdgeStack Server - edge digest interceptor and signature-verifying origin.
//!
//! Hosts the content-digest interceptor behind an invocation endpoint so a
//! delivery layer (or a test harness) can call it, plus an origin that
//! re-verifies the injected digest and, when credentials are configured, the
//! SigV4 signature binding it.
//!
//! # Usage
//!
//! ```text
//! GATEWAY_LISTEN=0.0.0.0:8080 edgestack-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `LOG_FORMAT` | `text` | `json` for JSON log lines |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//! | `EDGE_MAX_BODY_BYTES` | `1048576` | Largest body the interceptor hashes |
//! | `EDGE_LOG_PAYLOADS` | `false` | Log full request payloads at debug level |
//! | `ORIGIN_ACCESS_KEY_ID` | *(unset)* | Enables SigV4 verification at the origin |
//! | `ORIGIN_SECRET_ACCESS_KEY` | *(unset)* | Secret for `ORIGIN_ACCESS_KEY_ID` |

mod edge;
mod gateway;
mod origin;
mod service;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use edgestack_auth::{CredentialProvider, OriginVerifier, StaticCredentialProvider};
use edgestack_core::EdgeStackConfig;
use edgestack_edge::{ContentDigestInterceptor, InterceptorConfig};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::edge::EdgeRouter;
use crate::gateway::GatewayService;
use crate::origin::OriginRouter;
use crate::service::ServiceRouter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Build a credential provider from `ORIGIN_ACCESS_KEY_ID` /
/// `ORIGIN_SECRET_ACCESS_KEY`. Without both, the origin checks digests only.
fn build_credential_provider() -> Option<Arc<dyn CredentialProvider>> {
    let access_key = std::env::var("ORIGIN_ACCESS_KEY_ID").ok()?;
    let secret_key = std::env::var("ORIGIN_SECRET_ACCESS_KEY").ok()?;

    info!(
        access_key = %access_key,
        "configured origin credential provider from environment"
    );

    Some(Arc::new(StaticCredentialProvider::new(vec![(
        access_key, secret_key,
    )])))
}

/// Accept connections until `shutdown` resolves, then drain in-flight requests.
async fn serve<F>(listener: TcpListener, service: GatewayService, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let graceful = GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let conn = http
                    .serve_connection(TokioIo::new(stream), service.clone())
                    .into_owned();
                let conn = graceful.watch(conn);
                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(%peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => break,
        }
    }

    info!("draining connections");
    graceful.shutdown().await;
    info!("all connections drained, exiting");
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}

/// Perform a health check by connecting to the gateway and requesting the health endpoint.
///
/// Succeeds if the response is 200 OK and reports at least one running service.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /_health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

/// Assemble the routers. The origin is the catch-all and must be last.
fn build_services(
    interceptor_config: InterceptorConfig,
    credential_provider: Option<Arc<dyn CredentialProvider>>,
) -> Vec<Box<dyn ServiceRouter>> {
    let body_limit = interceptor_config.max_body_bytes;
    let verifier = OriginVerifier::new(credential_provider);
    info!(
        max_body_bytes = body_limit,
        log_payloads = interceptor_config.log_payloads,
        verify_signatures = verifier.verifies_signatures(),
        "initializing edge and origin services",
    );

    vec![
        Box::new(EdgeRouter::new(ContentDigestInterceptor::new(
            interceptor_config,
        ))),
        Box::new(OriginRouter::new(verifier, body_limit)),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = EdgeStackConfig::from_env();
    let listen_addr = config.gateway_listen.clone();

    // Handle --health-check flag for container probes.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = listen_addr.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level, config.log_json)?;

    let gateway = GatewayService::new(build_services(
        InterceptorConfig::from_env(),
        build_credential_provider(),
    ));
    let service_names = gateway.service_names();

    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("invalid bind address: {listen_addr}"))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        services = ?service_names,
        version = VERSION,
        "starting EdgeStack Server",
    );

    serve(listener, gateway, ctrl_c()).await
}
