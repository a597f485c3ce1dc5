//! Line-oriented streaming parser for `POST /chat/stream`.
//!
//! The NagaAgent stream endpoint emits server-sent lines of the form
//! `data: <fragment>`. This module reads a `reqwest::Response` as a byte
//! stream, splits it on line boundaries (which may fall anywhere inside a
//! network chunk), and yields the fragment after each `data: ` prefix.

use futures::stream::{self, Stream, StreamExt};

use super::errors::ClientError;

const DATA_PREFIX: &str = "data: ";

/// Sentinel payload some servers send to mark the end of the stream.
const DONE_MARKER: &str = "[DONE]";

// ─── Line buffer ─────────────────────────────────────────────────────────────

/// Accumulates raw bytes and hands out complete `data: ` payloads.
///
/// Lines are decoded only once complete, so a multi-byte character split
/// across network chunks is never mangled.
#[derive(Debug, Default)]
pub struct DataLineBuffer {
    pending: Vec<u8>,
    done: bool,
}

impl DataLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk; returns the payloads of every line it completed.
    pub fn push(&mut self, chunk: impl AsRef<[u8]>) -> Vec<String> {
        self.pending.extend_from_slice(chunk.as_ref());

        let mut payloads = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(payload) = self.accept_line(&String::from_utf8_lossy(&line)) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        self.accept_line(&String::from_utf8_lossy(&rest))
    }

    fn accept_line(&mut self, line: &str) -> Option<String> {
        if self.done {
            return None;
        }
        let line = line.trim_end_matches(['\n', '\r']);
        let payload = line.strip_prefix(DATA_PREFIX)?;
        if payload.trim() == DONE_MARKER {
            self.done = true;
            return None;
        }
        Some(payload.to_string())
    }
}

// ─── Response stream ─────────────────────────────────────────────────────────

/// Turn a streaming HTTP response into a stream of `data: ` fragments.
pub fn parse_data_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<String, ClientError>> {
    let byte_stream = response.bytes_stream();

    stream::unfold(
        (byte_stream, DataLineBuffer::new(), Vec::<String>::new(), false),
        |(mut byte_stream, mut lines, mut ready, mut finished)| async move {
            loop {
                if !ready.is_empty() {
                    let next = ready.remove(0);
                    return Some((Ok(next), (byte_stream, lines, ready, finished)));
                }
                if finished || lines.is_done() {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        ready = lines.push(&bytes);
                    }
                    Some(Err(e)) => {
                        finished = true;
                        return Some((
                            Err(ClientError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, lines, ready, finished),
                        ));
                    }
                    None => {
                        finished = true;
                        ready.extend(lines.finish());
                    }
                }
            }
        },
    )
}

/// Drain a fragment stream into the complete reply text.
///
/// Stops at the first read error.
pub async fn collect_text<S>(stream: S) -> Result<String, ClientError>
where
    S: Stream<Item = Result<String, ClientError>>,
{
    futures::pin_mut!(stream);
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
