// src/stdio.rs
//
// Line based remote: the eID service lives behind a pipe pair, one JSON
// document per line in each direction.
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::bounded;
use log::{debug, error, info};
use serde_json::json;

use crate::transport::{RemoteEndpoint, RemoteRequest};

pub const SESSION_ID: &str = "stdio";

/// Serve `remote` from `input`/`output` on two blocking threads.
///
/// Outbound commands are written as their JSON, NFC tag updates as
/// `{"tag":"<hex id>"}`. Input is read once the first bind arrived; end of
/// input counts as a disconnect of the remote.
pub fn serve<R, W>(remote: RemoteEndpoint, input: R, mut output: W) -> Vec<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    let remote = Arc::new(remote);
    let (bound_tx, bound_rx) = bounded::<()>(1);

    let requests = remote.clone();
    let writer = thread::spawn(move || {
        let mut bound_tx = Some(bound_tx);
        for request in requests.requests().iter() {
            match request {
                RemoteRequest::Bind => {
                    requests.session_established(SESSION_ID);
                    // Start reading after the first bind only
                    if let Some(tx) = bound_tx.take() {
                        let _ = tx.send(());
                    }
                }
                RemoteRequest::Unbind => debug!("Remote unbound"),
                RemoteRequest::Send { json, .. } => write_line(&mut output, &json),
                RemoteRequest::UpdateNfcTag { tag, .. } => {
                    let line = json!({ "tag": hex::encode(&tag.id) }).to_string();
                    write_line(&mut output, &line);
                }
            }
        }
        info!("Transport dropped, stopping stdio writer");
    });

    let reader = thread::spawn(move || {
        if bound_rx.recv().is_err() {
            return;
        }
        for line in input.lines() {
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => remote.receive(line),
                Err(e) => {
                    error!("Failed to read remote message: {}", e);
                    break;
                }
            }
        }
        remote.disconnected();
    });

    vec![writer, reader]
}

fn write_line<W: Write>(output: &mut W, line: &str) {
    if let Err(e) = writeln!(output, "{}", line).and_then(|_| output.flush()) {
        error!("Failed to write to remote: {}", e);
    }
}
