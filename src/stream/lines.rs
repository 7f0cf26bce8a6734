//! Line framing over a streamed HTTP response body.

use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::time::{timeout_at, Instant};

use crate::stream::client::StreamClientError;

/// Boxed stream of raw body chunks.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, StreamClientError>>;

/// Yields `\n`-terminated lines (with a trailing `\r` removed) from a chunked
/// body, independent of where chunk boundaries fall.
pub struct LineReader {
    chunks: ChunkStream,
    buffer: Vec<u8>,
    finished: bool,
}

impl LineReader {
    pub fn new(chunks: ChunkStream) -> Self {
        Self {
            chunks,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Wraps a streaming `reqwest` response body.
    pub fn from_response(response: reqwest::Response) -> Self {
        let chunks = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(StreamClientError::Transport)
            })
            .boxed();
        Self::new(chunks)
    }

    /// Builds a reader over in-memory chunks.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures_util::stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    /// Reads the next line. `Ok(None)` marks a cleanly closed body.
    pub async fn next_line(&mut self) -> Result<Option<String>, StreamClientError> {
        loop {
            if let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            if self.finished {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buffer);
                let rest = String::from_utf8_lossy(&rest);
                return Ok(Some(rest.trim_end_matches('\r').to_string()));
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(err)) => return Err(err),
                None => self.finished = true,
            }
        }
    }

    /// Drains up to `limit` remaining lines within `window`. A read error,
    /// the end of the body, or the window elapsing ends the capture and
    /// returns what was read so far.
    pub async fn collect_remaining(&mut self, limit: usize, window: Duration) -> Vec<String> {
        let deadline = Instant::now() + window;
        let mut lines = Vec::new();
        while lines.len() < limit {
            match timeout_at(deadline, self.next_line()).await {
                Ok(Ok(Some(line))) => lines.push(line),
                Ok(Ok(None)) | Ok(Err(_)) | Err(_) => break,
            }
        }
        lines
    }
}

impl std::fmt::Debug for LineReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineReader")
            .field("buffered", &self.buffer.len())
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;

    use super::LineReader;
    use crate::stream::client::StreamClientError;

    const WINDOW: Duration = Duration::from_millis(200);

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime")
            .block_on(future)
    }

    #[test]
    fn splits_crlf_lines_across_chunk_boundaries() {
        block_on(async {
            let mut reader = LineReader::from_chunks(vec![
                b"OK\r".to_vec(),
                b"\nSessionId:ab".to_vec(),
                b"c123\r\n\r\n1,1|A".to_vec(),
                b"APL\n".to_vec(),
            ]);

            assert_eq!(reader.next_line().await.expect("read").as_deref(), Some("OK"));
            assert_eq!(
                reader.next_line().await.expect("read").as_deref(),
                Some("SessionId:abc123")
            );
            assert_eq!(reader.next_line().await.expect("read").as_deref(), Some(""));
            assert_eq!(
                reader.next_line().await.expect("read").as_deref(),
                Some("1,1|AAPL")
            );
            assert_eq!(reader.next_line().await.expect("read"), None);
        });
    }

    #[test]
    fn yields_unterminated_final_line() {
        block_on(async {
            let mut reader = LineReader::from_chunks(vec![b"PROBE\r\nEND".to_vec()]);
            assert_eq!(
                reader.next_line().await.expect("read").as_deref(),
                Some("PROBE")
            );
            assert_eq!(reader.next_line().await.expect("read").as_deref(), Some("END"));
            assert_eq!(reader.next_line().await.expect("read"), None);
        });
    }

    #[test]
    fn surfaces_chunk_errors() {
        block_on(async {
            let chunks = futures_util::stream::iter(vec![
                Ok(b"PROBE\r\n".to_vec()),
                Err(StreamClientError::Cancelled),
            ])
            .boxed();
            let mut reader = LineReader::new(chunks);

            assert_eq!(
                reader.next_line().await.expect("read").as_deref(),
                Some("PROBE")
            );
            assert!(matches!(
                reader.next_line().await,
                Err(StreamClientError::Cancelled)
            ));
        });
    }

    #[test]
    fn collect_remaining_respects_limit() {
        block_on(async {
            let mut reader = LineReader::from_chunks(vec![b"a\nb\nc\n".to_vec()]);
            assert_eq!(reader.collect_remaining(2, WINDOW).await, vec!["a", "b"]);
            assert_eq!(reader.collect_remaining(10, WINDOW).await, vec!["c"]);
        });
    }

    #[test]
    fn collect_remaining_returns_buffered_lines_when_body_stays_open() {
        block_on(async {
            let chunks = futures_util::stream::iter(vec![Ok(b"1\r\nbad login\r\n".to_vec())])
                .chain(futures_util::stream::pending())
                .boxed();
            let mut reader = LineReader::new(chunks);

            assert_eq!(
                reader.collect_remaining(64, Duration::from_millis(20)).await,
                vec!["1", "bad login"]
            );
        });
    }
}
