use anyhow::Result;
use log::{error, info, warn};
use serde::Deserialize;
use std::{
    fs,
    io::{BufRead, BufReader, ErrorKind, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
    time::Duration,
};

/// One newline-delimited JSON request, e.g. `{"op":"mode","mode":"guitar"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ControlRequest {
    Status,
    Mode { mode: String },
    Reset,
    Shutdown,
}

/// Non-blocking control socket, polled from the frame loop so every
/// request is applied on the tick thread.
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlServer {
    pub fn bind(path: PathBuf) -> Result<Self> {
        if path.exists() {
            let _ = fs::remove_file(&path);
        }
        let listener = UnixListener::bind(&path)?;
        listener.set_nonblocking(true)?;
        info!("control: listening on {}", path.display());
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve every client waiting right now; returns how many were served.
    pub fn poll(&self, mut handle: impl FnMut(ControlRequest) -> serde_json::Value) -> usize {
        let mut served = 0;
        loop {
            match self.listener.accept() {
                Ok((stream, _)) => {
                    if let Err(e) = serve_client(stream, &mut handle) {
                        error!("control client error: {e}");
                    }
                    served += 1;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("control accept failed: {e}");
                    break;
                }
            }
        }
        served
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn serve_client(
    mut stream: UnixStream,
    handle: &mut impl FnMut(ControlRequest) -> serde_json::Value,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(Duration::from_millis(200)))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }

    let resp = match serde_json::from_str::<ControlRequest>(line.trim()) {
        Ok(req) => handle(req),
        Err(e) => serde_json::json!({"ok": false, "error": format!("bad request: {e}")}),
    };
    writeln!(stream, "{resp}")?;
    Ok(())
}
