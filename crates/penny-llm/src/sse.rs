//! Event-stream frame reader shared by every adapter.
//!
//! All four dialects deliver newline-delimited frames where only
//! `data:`-prefixed lines matter. This module turns a raw byte stream into
//! JSON payload strings, handling:
//!
//! - line buffering across chunk boundaries (one trailing partial line is
//!   kept and flushed at end-of-stream when the dialect needs it)
//! - `\r\n` endings, comments, and non-data fields
//! - the `[DONE]` end-of-stream sentinel
//!
//! A malformed frame is skipped with a warning; it never aborts the stream.
//! A transport failure mid-stream surfaces as one `Err` item and ends it.

use async_stream::stream;
use bytes::BytesMut;
use futures::{Stream, StreamExt};
use tracing::warn;

use penny_core::text::preview;

use crate::error::ProviderError;

/// Fixed prefix marking a relevant frame.
const DATA_PREFIX: &str = "data:";

/// Literal sentinel that terminates a stream early.
const END_SENTINEL: &str = "[DONE]";

/// Turn a byte stream into a stream of frame payloads.
///
/// `flush_trailing` controls whether a final unterminated line is processed
/// when the connection closes — Gemini ends without a sentinel and needs
/// it; `OpenAI`-style dialects always send `[DONE]` first.
pub fn data_frames<S>(
    mut byte_stream: S,
    flush_trailing: bool,
) -> impl Stream<Item = Result<String, ProviderError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    stream! {
        let mut buffer = BytesMut::with_capacity(8192);
        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(chunk) => buffer.extend_from_slice(&chunk),
                Err(e) => {
                    // Surface the transport failure and stop; the
                    // orchestrator decides how to classify it.
                    yield Err(ProviderError::Http(e));
                    return;
                }
            }

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let mut line = buffer.split_to(newline + 1);
                line.truncate(line.len() - 1);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                let Ok(line) = std::str::from_utf8(&line) else {
                    continue; // invalid UTF-8 line, skip
                };
                if let Some(payload) = frame_payload(line) {
                    yield Ok(payload.to_string());
                }
            }
        }

        if flush_trailing && !buffer.is_empty() {
            if let Ok(line) = std::str::from_utf8(&buffer) {
                if let Some(payload) = frame_payload(line.trim()) {
                    yield Ok(payload.to_string());
                }
            }
        }
    }
}

/// Extract a frame's payload, or `None` for lines that carry none.
fn frame_payload(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let payload = trimmed.strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() || payload == END_SENTINEL {
        return None;
    }
    Some(payload)
}

/// Decode one frame payload as JSON, skipping it on failure.
pub fn decode_frame<T: serde::de::DeserializeOwned>(payload: &str, provider: &str) -> Option<T> {
    match serde_json::from_str(payload) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(
                provider,
                error = %e,
                payload = preview(payload, 120),
                "skipping undecodable event frame"
            );
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn byte_stream(
        chunks: Vec<&'static str>,
    ) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static {
        futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
    }

    async fn collect_ok(
        chunks: Vec<&'static str>,
        flush_trailing: bool,
    ) -> Vec<String> {
        data_frames(byte_stream(chunks), flush_trailing)
            .map(|frame| frame.expect("no transport error in fixture"))
            .collect()
            .await
    }

    // ── frame_payload ────────────────────────────────────────────────────

    #[test]
    fn payload_extracted_with_and_without_space() {
        assert_eq!(frame_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(frame_payload("data:{\"a\":1}"), Some("{\"a\":1}"));
    }

    #[test]
    fn sentinel_and_noise_are_dropped() {
        assert_eq!(frame_payload("data: [DONE]"), None);
        assert_eq!(frame_payload(""), None);
        assert_eq!(frame_payload(": keep-alive"), None);
        assert_eq!(frame_payload("event: delta"), None);
        assert_eq!(frame_payload("data:"), None);
    }

    // ── data_frames ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn frames_split_within_one_chunk() {
        let frames = collect_ok(vec!["data: {\"a\":1}\n\ndata: {\"b\":2}\n\n"], false).await;
        assert_eq!(frames, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[tokio::test]
    async fn partial_line_buffers_across_chunks() {
        let frames = collect_ok(vec!["data: {\"sp", "lit\":true}\n"], false).await;
        assert_eq!(frames, vec!["{\"split\":true}"]);
    }

    #[tokio::test]
    async fn done_sentinel_terminates_quietly() {
        let frames = collect_ok(vec!["data: {\"ok\":1}\n\ndata: [DONE]\n\n"], false).await;
        assert_eq!(frames, vec!["{\"ok\":1}"]);
    }

    #[tokio::test]
    async fn crlf_endings_are_handled() {
        let frames = collect_ok(vec!["data: {\"cr\":1}\r\n\r\n"], false).await;
        assert_eq!(frames, vec!["{\"cr\":1}"]);
    }

    #[tokio::test]
    async fn trailing_line_flushed_when_enabled() {
        let frames = collect_ok(vec!["data: {\"tail\":1}"], true).await;
        assert_eq!(frames, vec!["{\"tail\":1}"]);
    }

    #[tokio::test]
    async fn trailing_line_dropped_when_disabled() {
        let frames = collect_ok(vec!["data: {\"tail\":1}"], false).await;
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let frames = collect_ok(vec![], true).await;
        assert!(frames.is_empty());
    }

    // ── decode_frame ─────────────────────────────────────────────────────

    #[test]
    fn decode_valid_json() {
        let value: Option<serde_json::Value> = decode_frame("{\"x\":1}", "test");
        assert_eq!(value.unwrap()["x"], 1);
    }

    #[test]
    fn decode_corrupt_frame_is_skipped() {
        let value: Option<serde_json::Value> = decode_frame("not json", "test");
        assert!(value.is_none());
    }
}
