//! Local command socket.
//!
//! The BLE daemon forwards each characteristic write as one line on this
//! Unix stream socket. Lines are dispatched in arrival order, one at a time.

use crate::orchestrator::Orchestrator;
use crate::status::{ConnectionStatus, ConnectionType};
use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

pub struct CommandListener {
    listener: UnixListener,
    path: PathBuf,
}

impl CommandListener {
    /// Bind the socket, replacing a stale socket file left by a previous run.
    pub fn bind(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        info!("[Command] Listening on {}", path.display());
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept clients until `cancel` fires.
    pub async fn run(self, orchestrator: Arc<Orchestrator>, cancel: CancellationToken) {
        loop {
            let stream = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!("[Command] Accept failed: {}", e);
                        continue;
                    }
                },
            };

            orchestrator
                .board()
                .set(ConnectionType::Bluetooth, ConnectionStatus::Connected);
            serve_client(stream, &orchestrator, &cancel).await;
            orchestrator
                .board()
                .set(ConnectionType::Bluetooth, ConnectionStatus::NotConnected);
        }
        debug!("[Command] Listener stopped");
    }
}

impl Drop for CommandListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn serve_client(stream: UnixStream, orchestrator: &Orchestrator, cancel: &CancellationToken) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => orchestrator.handle_command(&line).await,
            Ok(None) => return,
            Err(e) => {
                warn!("[Command] Read failed: {}", e);
                return;
            }
        }
    }
}
