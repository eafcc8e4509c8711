// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! A stand-in for the SwitchAPI RPC server.
//!
//! The real server speaks thrift.  This one only proves that the port is
//! claimed and the daemon is alive: every connection receives a single JSON
//! line describing the driver, and is then closed.

use std::net::SocketAddr;
use std::sync::Arc;

use slog::{debug, error, info, o, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use aal::{DriverError, DriverResult};

pub(crate) struct RpcServer {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RpcServer {
    /// Bind `addr` and start answering connections with `greeting`.
    ///
    /// The socket is bound before this returns, so a port that is already in
    /// use is reported to the caller rather than to the background task.
    pub fn start(
        log: &slog::Logger,
        addr: SocketAddr,
        greeting: String,
    ) -> DriverResult<Self> {
        let rt = tokio::runtime::Handle::try_current().map_err(|e| {
            DriverError::Uninitialized(format!(
                "no async runtime for the rpc server: {e}"
            ))
        })?;

        let std_listener =
            std::net::TcpListener::bind(addr).map_err(|err| DriverError::Io {
                ctx: format!("binding rpc server to {addr}"),
                err,
            })?;
        std_listener
            .set_nonblocking(true)
            .map_err(|err| DriverError::Io {
                ctx: "configuring rpc listener".to_string(),
                err,
            })?;
        let local_addr =
            std_listener.local_addr().map_err(|err| DriverError::Io {
                ctx: "fetching rpc listener address".to_string(),
                err,
            })?;

        let listener = {
            let _guard = rt.enter();
            TcpListener::from_std(std_listener).map_err(|err| {
                DriverError::Io {
                    ctx: "registering rpc listener".to_string(),
                    err,
                }
            })?
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let log = log.new(o!("unit" => "rpc_server"));
        info!(log, "listening"; "address" => %local_addr);
        let task = rt.spawn(serve(
            log,
            listener,
            Arc::new(greeting + "\n"),
            shutdown_rx,
        ));

        Ok(RpcServer {
            local_addr,
            shutdown_tx,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Ask the listener task to exit.  The socket is closed once the task
    /// notices, which happens asynchronously.
    pub fn stop(self) {
        if self.shutdown_tx.send(true).is_err() {
            // The task is already gone.
            self.task.abort();
        }
    }
}

async fn serve(
    log: slog::Logger,
    listener: TcpListener,
    greeting: Arc<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                info!(log, "shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((mut stream, peer)) => {
                    debug!(log, "connection"; "peer" => %peer);
                    let log = log.clone();
                    let greeting = greeting.clone();
                    tokio::spawn(async move {
                        if let Err(e) =
                            stream.write_all(greeting.as_bytes()).await
                        {
                            warn!(log, "failed to answer client";
                                "peer" => %peer, "error" => %e);
                        }
                        let _ = stream.shutdown().await;
                    });
                }
                Err(e) => error!(log, "accept failed"; "error" => %e),
            }
        }
    }
}
