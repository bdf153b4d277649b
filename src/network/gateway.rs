//! Gateway - TCP listener that upgrades and authenticates WebSocket clients.
//!
//! The handshake callback checks the `Origin` header against the configured
//! allow-list (403 on mismatch) and resolves the `token` query parameter, or
//! an `Authorization: Bearer` header, to a user id (401 on failure). Only
//! authenticated streams reach a [`ClientConnection`].

use crate::config::ListenConfig;
use crate::network::ClientConnection;
use crate::security::{AuthError, Authenticator};
use crate::state::Hub;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use http::StatusCode;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use tracing::{debug, error, info, instrument, warn};

/// Time allowed for the HTTP upgrade.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake timed out")]
    Timeout,
    #[error("origin not allowed")]
    OriginRejected,
    #[error("authentication failed: {0}")]
    Unauthorized(AuthError),
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Upgrade `stream`, enforcing the origin allow-list and authentication.
///
/// Returns the upgraded stream and the authenticated user id.
pub async fn handshake<S>(
    stream: S,
    listen: &ListenConfig,
    auth: &dyn Authenticator,
) -> Result<(WebSocketStream<S>, String), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Set by the callback; `None` means the request never got that far.
    let mut outcome: Option<Result<String, HandshakeError>> = None;

    let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let origin = req
            .headers()
            .get(http::header::ORIGIN)
            .and_then(|o| o.to_str().ok());
        if !listen.origin_allowed(origin) {
            outcome = Some(Err(HandshakeError::OriginRejected));
            return Err(reject(StatusCode::FORBIDDEN, "origin not allowed"));
        }

        let verified = match credential(req) {
            Some(token) => auth.authenticate(&token),
            None => Err(AuthError::Missing),
        };
        match verified {
            Ok(user_id) => {
                outcome = Some(Ok(user_id));
                Ok(response)
            }
            Err(e) => {
                outcome = Some(Err(HandshakeError::Unauthorized(e)));
                Err(reject(StatusCode::UNAUTHORIZED, "unauthorized"))
            }
        }
    };

    let upgraded = tokio::time::timeout(HANDSHAKE_TIMEOUT, accept_hdr_async(stream, callback))
        .await
        .map_err(|_| HandshakeError::Timeout)?;

    match (upgraded, outcome) {
        (Ok(ws), Some(Ok(user_id))) => Ok((ws, user_id)),
        (_, Some(Err(rejected))) => Err(rejected),
        (Err(e), _) => Err(e.into()),
        (Ok(_), None) => Err(HandshakeError::Unauthorized(AuthError::Missing)),
    }
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

/// Token from `?token=` or an `Authorization: Bearer` header.
fn credential(req: &Request) -> Option<String> {
    if let Some(query) = req.uri().query() {
        let token = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "token")
            .map(|(_, value)| value);
        if let Some(token) = token
            && !token.is_empty()
        {
            return Some(token.to_string());
        }
    }

    req.headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    listen: Arc<ListenConfig>,
    hub: Arc<Hub>,
    auth: Arc<dyn Authenticator>,
}

impl Gateway {
    /// Bind the gateway to the configured address.
    pub async fn bind(
        listen: ListenConfig,
        hub: Arc<Hub>,
        auth: Arc<dyn Authenticator>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(listen.address).await?;
        info!(address = %listener.local_addr()?, "WebSocket listener bound");
        Ok(Self {
            listener,
            listen: Arc::new(listen),
            hub,
            auth,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the hub shuts down.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        let shutdown = self.hub.shutdown_token().clone();
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Gateway stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };
            debug!(%addr, "Connection attempt");

            let hub = Arc::clone(&self.hub);
            let listen = Arc::clone(&self.listen);
            let auth = Arc::clone(&self.auth);
            tokio::spawn(async move {
                match handshake(stream, &listen, auth.as_ref()).await {
                    Ok((ws, user_id)) => {
                        info!(%addr, user = %user_id, "WebSocket handshake successful");
                        ClientConnection::new(hub, user_id, ws).run().await;
                    }
                    Err(e) => {
                        warn!(%addr, error = %e, "WebSocket handshake failed");
                    }
                }
            });
        }
    }
}
