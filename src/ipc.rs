use anyhow::{Result, anyhow};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::UnixStream,
    path::Path,
};

mod runtime;
mod server;

pub use runtime::socket_path;
pub use server::{ControlRequest, ControlServer};

// Client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "no handplay session is running (socket missing at {})",
            sock.display()
        ));
    }
    client_request_at(&sock, &req)
}

pub fn client_request_at(sock: &Path, req: &serde_json::Value) -> Result<serde_json::Value> {
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
