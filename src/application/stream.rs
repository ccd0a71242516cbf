//! # Stream Driver
//!
//! Feeds a byte stream into the response interpreter. Bytes are decoded
//! incrementally, and UI updates are throttled without ever dropping the final state.

use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::parsing::ResponseParser;
use crate::domain::types::StructuredResult;

/// Incremental UTF-8 decoder.
///
/// Holds an incomplete multi-byte sequence at the end of a chunk until the
/// next chunk completes it. Invalid bytes decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `pending + bytes` as is complete.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes whatever is left; a truncated sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Couples a parser with a decoder and an update throttle.
pub struct StreamDriver<'p> {
    parser: &'p mut ResponseParser,
    decoder: Utf8Accumulator,
    throttle: Duration,
    last_emit: Option<Instant>,
}

impl<'p> StreamDriver<'p> {
    pub fn new(parser: &'p mut ResponseParser, throttle: Duration) -> Self {
        Self {
            parser,
            decoder: Utf8Accumulator::new(),
            throttle,
            last_emit: None,
        }
    }

    /// Feeds `bytes`. Returns `true` when an update is due under the throttle.
    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        let text = self.decoder.push(bytes);
        if !text.is_empty() {
            self.parser.add_chunk(&text);
        }

        let now = Instant::now();
        let due = self
            .last_emit
            .is_none_or(|last| now.duration_since(last) >= self.throttle);
        if due {
            self.last_emit = Some(now);
        }
        due
    }

    pub fn state(&self) -> &StructuredResult {
        self.parser.state()
    }

    /// Handles one stream item: feeds it and calls `on_update` when due.
    /// Returns the error text when the item is a stream failure.
    pub fn accept<B, E, F>(&mut self, chunk: Result<B, E>, on_update: &mut F) -> Option<String>
    where
        B: AsRef<[u8]>,
        E: Display,
        F: FnMut(&StructuredResult),
    {
        match chunk {
            Ok(bytes) => {
                if self.feed(bytes.as_ref()) {
                    on_update(self.state());
                }
                None
            }
            Err(e) => {
                warn!("Response stream failed: {}", e);
                Some(e.to_string())
            }
        }
    }

    /// Flushes the decoder and returns the final result.
    pub fn finish(&mut self) -> StructuredResult {
        let rest = self.decoder.finish();
        if !rest.is_empty() {
            self.parser.add_chunk(&rest);
        }
        self.parser.state().clone()
    }

    /// `finish` plus the final, unthrottled `on_update`.
    pub fn complete<F>(&mut self, on_update: &mut F) -> StructuredResult
    where
        F: FnMut(&StructuredResult),
    {
        let result = self.finish();
        debug!(
            "Stream finished: {} step(s), {} action(s), complete: {}",
            result.reasoning.len(),
            result.actions.len(),
            result.is_complete
        );
        on_update(&result);
        result
    }
}

/// How a stream ended.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSummary {
    pub result: StructuredResult,
    /// Set when the stream failed; `result` holds what arrived before that.
    pub error: Option<String>,
}

/// Consumes `stream` into `parser`, calling `on_update` at most once per
/// `throttle` window and always once more with the final result.
pub async fn drive_stream<S, B, E, F>(
    mut stream: S,
    parser: &mut ResponseParser,
    throttle: Duration,
    mut on_update: F,
) -> StreamSummary
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(&StructuredResult),
{
    let mut driver = StreamDriver::new(parser, throttle);
    let mut error = None;

    while let Some(chunk) = stream.next().await {
        error = driver.accept(chunk, &mut on_update);
        if error.is_some() {
            break;
        }
    }

    let result = driver.complete(&mut on_update);
    StreamSummary { result, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_split_multibyte_sequence() {
        let bytes = "héllo".as_bytes();
        let mut decoder = Utf8Accumulator::new();
        assert_eq!(decoder.push(&bytes[..2]), "h");
        assert_eq!(decoder.push(&bytes[2..]), "éllo");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8Accumulator::new();
        assert_eq!(decoder.push(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(decoder.push(&[0xe2, 0x82]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[test]
    fn test_accept_reports_failure_without_feeding() {
        let mut parser = ResponseParser::new();
        let mut driver = StreamDriver::new(&mut parser, Duration::ZERO);
        let mut updates = 0;
        let mut count = |_: &StructuredResult| updates += 1;

        let ok: Result<&[u8], String> = Ok(b"<response><message>hi".as_slice());
        assert!(driver.accept(ok, &mut count).is_none());
        let failed: Result<&[u8], String> = Err("eof".to_string());
        assert_eq!(driver.accept(failed, &mut count).as_deref(), Some("eof"));

        let result = driver.complete(&mut count);
        assert_eq!(result.message, "hi");
        assert_eq!(updates, 2);
    }

    #[tokio::test]
    async fn test_final_update_is_never_throttled() {
        let chunks: Vec<Result<&[u8], String>> = vec![
            Ok(b"<response><message>hel".as_slice()),
            Ok(b"lo</message>".as_slice()),
            Ok(b"</response>".as_slice()),
        ];
        let mut parser = ResponseParser::new();
        let mut updates = Vec::new();

        let summary = drive_stream(
            stream::iter(chunks),
            &mut parser,
            Duration::from_secs(3600),
            |result| updates.push(result.clone()),
        )
        .await;

        // first chunk is always due, then only the final flush
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message, "hel");
        assert_eq!(updates[1].message, "hello");
        assert!(summary.result.is_complete);
        assert!(summary.error.is_none());
    }

    #[tokio::test]
    async fn test_stream_error_keeps_partial_result() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"<response><actions><action type=\"create_file\" path=\"a\">x</action>".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"</actions>".to_vec()),
        ];
        let mut parser = ResponseParser::new();

        let summary =
            drive_stream(stream::iter(chunks), &mut parser, Duration::ZERO, |_| {}).await;

        assert_eq!(summary.error.as_deref(), Some("connection reset"));
        assert_eq!(summary.result.actions.len(), 1);
        assert!(!summary.result.is_complete);
        assert_eq!(parser.state(), &summary.result);
    }
}
