//! Listener setup
//!
//! Serves the router over plain TCP, or terminates TLS in-process when
//! `SSL=true`. Both paths stop accepting on ctrl-c or SIGTERM.

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use playsync_shared_config::TlsConfig;
use tokio::net::TcpListener;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;

use crate::error::{RelayError, RelayResult};

/// Protocols offered during the TLS handshake. WebSocket upgrades need HTTP/1.1.
const ALPN_PROTOCOLS: &[&[u8]] = &[b"http/1.1"];

/// Bind `addr` and serve `app` until shutdown
pub async fn serve(app: Router, addr: SocketAddr, tls: &TlsConfig) -> RelayResult<()> {
    let listener = TcpListener::bind(addr).await?;

    if tls.enabled {
        let acceptor = build_acceptor(tls)?;
        tracing::info!("Listening on https://{}", addr);
        serve_tls(listener, acceptor, app).await
    } else {
        tracing::info!("Listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

/// Build a TLS acceptor from the configured certificate and key
pub fn build_acceptor(tls: &TlsConfig) -> RelayResult<TlsAcceptor> {
    let cert_file = File::open(&tls.cert_path).map_err(|e| {
        RelayError::Tls(format!(
            "Failed to open certificate file {}: {}",
            tls.cert_path.display(),
            e
        ))
    })?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RelayError::Tls(format!("Failed to parse certificates: {}", e)))?;

    if certs.is_empty() {
        return Err(RelayError::Tls(
            "No certificates found in certificate file".to_string(),
        ));
    }

    let key_file = File::open(&tls.key_path).map_err(|e| {
        RelayError::Tls(format!(
            "Failed to open key file {}: {}",
            tls.key_path.display(),
            e
        ))
    })?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .map_err(|e| RelayError::Tls(format!("Failed to parse private key: {}", e)))?
        .ok_or_else(|| RelayError::Tls("No private key found in key file".to_string()))?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| RelayError::Tls(format!("Failed to build TLS config: {}", e)))?;
    config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Accept loop for TLS connections
async fn serve_tls(listener: TcpListener, acceptor: TlsAcceptor, app: Router) -> RelayResult<()> {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };

                let acceptor = acceptor.clone();
                let service = TowerToHyperService::new(app.clone());
                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::debug!(peer = %peer_addr, error = %e, "TLS handshake failed");
                            return;
                        }
                    };

                    // Upgrades must stay enabled for WebSocket handshakes.
                    if let Err(e) = Builder::new(TokioExecutor::new())
                        .serve_connection_with_upgrades(TokioIo::new(tls_stream), service)
                        .await
                    {
                        tracing::debug!(peer = %peer_addr, error = %e, "Connection error");
                    }
                });
            }
            _ = &mut shutdown => {
                tracing::info!("Stopped accepting TLS connections");
                return Ok(());
            }
        }
    }
}

/// Resolves on ctrl-c or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
