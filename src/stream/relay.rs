// src/stream/relay.rs
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::stream::decoder::Utf8Decoder;
use crate::stream::frames::{FrameEvent, FrameParser};

/// Tunables for one turn's read loop.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum time to wait for the next chunk before the turn is declared
    /// dead. A hung upstream connection must not block the session forever.
    pub idle_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(120),
        }
    }
}

/// Drives one assistant turn's event-stream body to completion.
///
/// The relay owns all per-turn state (decoder carry, pending buffer, the
/// done flag) so independent turns never interfere. Callers pull deltas one
/// at a time; each pull either drains an already-buffered frame or suspends
/// on the next chunk read. Nothing else runs against the buffers while a
/// read is outstanding, which keeps the transcript single-writer.
pub struct TurnRelay<S> {
    body: S,
    decoder: Utf8Decoder,
    parser: FrameParser,
    cancel: CancellationToken,
    idle_timeout: Duration,
    finished: bool,
}

impl<S, E> TurnRelay<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    pub fn new(body: S, cancel: CancellationToken, config: &RelayConfig) -> Self {
        Self {
            body,
            decoder: Utf8Decoder::new(),
            parser: FrameParser::new(),
            cancel,
            idle_timeout: config.idle_timeout,
            finished: false,
        }
    }

    /// Returns the next text delta, or None once the turn is complete.
    ///
    /// Completion is either the `[DONE]` sentinel or the end of the body;
    /// after the sentinel no further line is parsed, even when more bytes
    /// were already buffered behind it. Cancellation is checked before every
    /// delta is handed out, so a cancelled turn cannot mutate a transcript
    /// that may have been reset.
    pub async fn next_delta(&mut self) -> Result<Option<String>, RelayError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(RelayError::Cancelled);
            }
            if self.finished {
                return Ok(None);
            }

            if let Some(event) = self.parser.next_event() {
                match event {
                    FrameEvent::Delta(content) => return Ok(Some(content)),
                    FrameEvent::Done => {
                        self.finished = true;
                        return Ok(None);
                    }
                }
            }

            match tokio::time::timeout(self.idle_timeout, self.body.next()).await {
                Err(_) => {
                    return Err(RelayError::NetworkFailure(format!(
                        "no data from upstream for {}s",
                        self.idle_timeout.as_secs()
                    )));
                }
                Ok(None) => {
                    // Stream ended without a sentinel; treat as completion.
                    self.finished = true;
                    return Ok(None);
                }
                Ok(Some(Err(err))) => {
                    return Err(RelayError::NetworkFailure(err.to_string()));
                }
                Ok(Some(Ok(chunk))) => {
                    let text = self.decoder.decode(&chunk);
                    self.parser.push(&text);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin {
        futures::stream::iter(
            parts
                .iter()
                .map(|part| Ok(Bytes::copy_from_slice(part.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    fn byte_chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin {
        futures::stream::iter(
            parts
                .into_iter()
                .map(|part| Ok(Bytes::from(part)))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(
        body: impl Stream<Item = Result<Bytes, Infallible>> + Unpin,
    ) -> Result<String, RelayError> {
        let mut relay = TurnRelay::new(body, CancellationToken::new(), &RelayConfig::default());
        let mut text = String::new();
        while let Some(delta) = relay.next_delta().await? {
            text.push_str(&delta);
        }
        Ok(text)
    }

    fn delta_line(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{content}\"}}}}]}}\n"
        )
    }

    #[tokio::test]
    async fn reassembles_a_line_split_mid_json() {
        let body = chunks(&[
            "data: {\"choices\":[{\"delta\"",
            ":{\"content\":\"Hello\"}}]}\n",
            "data: [DONE]\n",
        ]);
        assert_eq!(collect(body).await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn arbitrary_chunking_never_loses_a_frame() {
        // Any split of the body yields the single-chunk result, including
        // splits inside the multi-byte characters.
        let full = format!(
            "{}{}:keepalive\n\n{}data: [DONE]\n",
            delta_line("Olá"),
            delta_line(", "),
            delta_line("mundo 🙂!")
        );
        let single = collect(chunks(&[&full])).await.unwrap();
        assert_eq!(single, "Olá, mundo 🙂!");

        let bytes = full.as_bytes();
        for split in 1..bytes.len() {
            let parts = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
            let out = collect(byte_chunks(parts)).await.unwrap();
            assert_eq!(out, single, "split at byte {split} diverged");
        }
    }

    #[tokio::test]
    async fn sentinel_suppresses_everything_behind_it() {
        // Lines after [DONE] are never surfaced, even when they were
        // already sitting in the buffer.
        let body = chunks(&[&format!(
            "{}data: [DONE]\n{}",
            delta_line("kept"),
            delta_line("dropped")
        )]);
        assert_eq!(collect(body).await.unwrap(), "kept");
    }

    #[tokio::test]
    async fn end_of_stream_without_sentinel_completes_the_turn() {
        let body = chunks(&[&delta_line("partial answer")]);
        assert_eq!(collect(body).await.unwrap(), "partial answer");
    }

    #[tokio::test]
    async fn comments_and_blank_lines_do_not_affect_assembly() {
        let body = chunks(&[
            ":keepalive\n",
            &delta_line("a"),
            "\n",
            ":keepalive\n",
            &delta_line("b"),
            "data: [DONE]\n",
        ]);
        assert_eq!(collect(body).await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn cancelled_turn_yields_no_further_deltas() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut relay = TurnRelay::new(
            chunks(&[&delta_line("never seen")]),
            cancel,
            &RelayConfig::default(),
        );
        assert!(matches!(
            relay.next_delta().await,
            Err(RelayError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn idle_upstream_times_out() {
        let body = futures::stream::pending::<Result<Bytes, Infallible>>();
        let config = RelayConfig {
            idle_timeout: Duration::from_millis(20),
        };
        let mut relay = TurnRelay::new(body, CancellationToken::new(), &config);
        assert!(matches!(
            relay.next_delta().await,
            Err(RelayError::NetworkFailure(_))
        ));
    }

    #[tokio::test]
    async fn chunk_read_error_is_a_network_failure() {
        #[derive(Debug)]
        struct Broken;
        impl std::fmt::Display for Broken {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "connection reset")
            }
        }
        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"data: ")),
            Err(Broken),
        ]);
        let mut relay = TurnRelay::new(
            body,
            CancellationToken::new(),
            &RelayConfig::default(),
        );
        assert!(matches!(
            relay.next_delta().await,
            Err(RelayError::NetworkFailure(_))
        ));
    }
}
