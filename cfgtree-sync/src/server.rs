//! Blocking line-protocol server in front of any [`TreeSession`].
//!
//! Connections are handled one at a time, in accept order.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

use crate::error::TreeError;
use crate::tree::TreeSession;
use crate::wire::{self, Request, Response};

/// Accept connections forever, applying each request to `session`.
///
/// A failing client is logged and dropped; only a listener failure ends the loop.
pub fn serve<S: TreeSession + ?Sized>(listener: &TcpListener, session: &mut S) -> Result<(), TreeError> {
    let local = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "listener".to_string());
    tracing::info!("serving coordination tree on {local}");

    loop {
        let (stream, peer) = listener.accept().map_err(|source| TreeError::SessionLost {
            addr: local.clone(),
            source,
        })?;
        tracing::debug!("client connected: {peer}");
        if let Err(err) = serve_connection(stream, session) {
            tracing::warn!("client {peer} dropped: {err}");
        }
    }
}

/// Serve a single client until it disconnects.
pub fn serve_connection<S: TreeSession + ?Sized>(stream: TcpStream, session: &mut S) -> Result<(), TreeError> {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "client".to_string());
    let lost = |source| TreeError::SessionLost {
        addr: peer.clone(),
        source,
    };

    let mut writer = stream.try_clone().map_err(lost)?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line.map_err(lost)?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                tracing::debug!("{peer}: {request:?}");
                wire::handle(session, request)
            }
            Err(err) => Response::error("internal", format!("invalid request JSON: {err}")),
        };

        let payload = serde_json::to_string(&response)?;
        writer
            .write_all(payload.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush())
            .map_err(lost)?;
    }

    tracing::debug!("client disconnected: {peer}");
    Ok(())
}
