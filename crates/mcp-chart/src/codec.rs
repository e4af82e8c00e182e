//! Frame codec for the event-stream wire format.
//!
//! Outbound requests are plain JSON bodies. Inbound bytes, from the
//! subscription stream or from a single-shot response, arrive as blocks:
//!
//! ```text
//! event: message\n
//! data: {"jsonrpc":"2.0","id":"req-1","result":{...}}\n
//! \n
//! ```
//!
//! A block is complete once a blank line terminates it. Each complete block
//! tagged with the `data:` marker yields exactly one [`Frame`]. Blocks without
//! a data line (comments, keep-alives) are dropped. A block whose payload is
//! not valid JSON is consumed and reported as [`McpError::Parse`], so the
//! decoder picks up with the next block instead of stalling.

use bytes::BytesMut;
use serde::Serialize;

use crate::error::{McpError, Result};
use crate::protocol::JsonRpcMessage;

/// Marker prefixing each payload line of a block.
pub const DATA_MARKER: &str = "data:";

const EVENT_MARKER: &str = "event:";

/// Largest block the decoder buffers while waiting for its terminator.
pub const DEFAULT_MAX_BLOCK: usize = 4 * 1024 * 1024;

/// One decoded unit of the stream format.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Value of the block's `event:` field, when present.
    pub event: Option<String>,
    /// The JSON-RPC envelope carried in the block's data.
    pub message: JsonRpcMessage,
}

/// Serialize an outbound envelope. No framing is applied.
pub fn encode<T: Serialize>(envelope: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(envelope)?)
}

/// Incremental decoder over an append-only byte buffer.
///
/// Feed it chunks as they arrive; the frames it yields do not depend on
/// where the chunk boundaries fall. Bytes already searched for a terminator
/// are not searched again.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Offset where the next terminator search starts.
    scanned: usize,
    max_block: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            scanned: 0,
            max_block: DEFAULT_MAX_BLOCK,
        }
    }

    /// Limit how many bytes an unterminated block may grow to.
    pub fn with_max_block(mut self, max_block: usize) -> Self {
        self.max_block = max_block;
        self
    }

    /// Append received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of bytes waiting for a block terminator.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next complete frame.
    ///
    /// Returns `Ok(None)` when no complete data block is buffered yet. A
    /// block that outgrows the size limit is discarded with a parse error.
    pub fn decode(&mut self) -> Result<Option<Frame>> {
        loop {
            let Some((end, separator)) = find_block_end(&self.buffer, self.scanned) else {
                if self.buffer.len() > self.max_block {
                    let dropped = self.buffer.len();
                    self.buffer.clear();
                    self.scanned = 0;
                    return Err(McpError::parse(format!(
                        "unterminated block exceeds {} bytes ({} dropped)",
                        self.max_block, dropped
                    )));
                }
                // A terminator may straddle the next chunk; `\n` + `\r\n`
                // needs the last two bytes searched again.
                self.scanned = self.buffer.len().saturating_sub(2);
                return Ok(None);
            };
            let block = self.buffer.split_to(end + separator);
            self.scanned = 0;
            if let Some(frame) = parse_block(&block[..end])? {
                return Ok(Some(frame));
            }
        }
    }

    /// Treat whatever is left as a final block (the peer closed without a
    /// trailing blank line).
    pub fn finish(&mut self) -> Result<Option<Frame>> {
        self.scanned = 0;
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            self.buffer.clear();
            return Ok(None);
        }
        let block = self.buffer.split();
        parse_block(&block)
    }
}

/// Decode a complete single-shot response body.
///
/// The body may be plain JSON or event-stream framed. When several frames are
/// present the first one that carries `result` or `error` wins.
pub fn decode_body(body: &[u8]) -> Result<JsonRpcMessage> {
    let start = body.iter().position(|b| !b.is_ascii_whitespace());
    let Some(start) = start else {
        return Err(McpError::parse("empty response body"));
    };

    if body[start] == b'{' {
        return serde_json::from_slice(&body[start..])
            .map_err(|e| McpError::parse(format!("malformed JSON body: {}", e)));
    }

    let mut decoder = FrameDecoder::new().with_max_block(body.len().max(DEFAULT_MAX_BLOCK));
    decoder.push(body);

    let mut frames = Vec::new();
    let mut first_error = None;
    loop {
        match decoder.decode() {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => break,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match decoder.finish() {
        Ok(Some(frame)) => frames.push(frame),
        Ok(None) => {}
        Err(e) => {
            first_error.get_or_insert(e);
        }
    }

    let chosen = frames
        .iter()
        .position(|f| f.message.is_response())
        .or(if frames.is_empty() { None } else { Some(0) });

    match chosen {
        Some(index) => Ok(frames.swap_remove(index).message),
        None => Err(first_error
            .unwrap_or_else(|| McpError::parse("response body contains no data frame"))),
    }
}

/// Locate the first blank line at or after `from`. Returns the block length
/// and the length of the terminator that follows it.
fn find_block_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut offset = from.min(buf.len());
    while let Some(pos) = buf[offset..].iter().position(|&b| b == b'\n') {
        let newline = offset + pos;
        let rest = &buf[newline + 1..];
        if rest.starts_with(b"\n") {
            return Some((newline, 2));
        }
        if rest.starts_with(b"\r\n") {
            return Some((newline, 3));
        }
        offset = newline + 1;
    }
    None
}

fn parse_block(block: &[u8]) -> Result<Option<Frame>> {
    let text = std::str::from_utf8(block)
        .map_err(|e| McpError::parse(format!("invalid UTF-8 in frame: {}", e)))?;

    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix(DATA_MARKER) {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix(EVENT_MARKER) {
            event = Some(value.trim().to_string());
        }
    }

    let payload = data.join("\n");
    if payload.trim().is_empty() {
        return Ok(None);
    }

    let message = serde_json::from_str::<JsonRpcMessage>(&payload)
        .map_err(|e| McpError::parse(format!("malformed frame payload: {}", e)))?;

    tracing::trace!(event = ?event, id = ?message.id_string(), "decoded frame");

    Ok(Some(Frame { event, message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JsonRpcRequest;

    const STREAM: &str = concat!(
        ": keep-alive\n\n",
        "event: message\n",
        "data: {\"jsonrpc\":\"2.0\",\"id\":\"a\",\"result\":{\"n\":1}}\n\n",
        "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\r\n\r\n",
        "data: {\"jsonrpc\":\"2.0\",\n",
        "data: \"id\":\"b\",\"result\":{}}\n\n",
    );

    fn drain(decoder: &mut FrameDecoder) -> Vec<Frame> {
        let mut out = Vec::new();
        while let Some(frame) = decoder.decode().unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn test_encode_is_plain_json() {
        let req = JsonRpcRequest::new("1", "tools/list", None);
        let bytes = encode(&req).unwrap();
        assert!(bytes.starts_with(b"{"));
        assert!(!bytes.windows(5).any(|w| w == b"data:"));
    }

    #[test]
    fn test_decode_contiguous() {
        let mut decoder = FrameDecoder::new();
        decoder.push(STREAM.as_bytes());
        let frames = drain(&mut decoder);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].event.as_deref(), Some("message"));
        assert_eq!(frames[0].message.id_string().as_deref(), Some("a"));
        assert_eq!(
            frames[1].message.method.as_deref(),
            Some("notifications/progress")
        );
        assert_eq!(frames[2].message.id_string().as_deref(), Some("b"));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_chunk_boundaries_do_not_matter() {
        let mut whole = FrameDecoder::new();
        whole.push(STREAM.as_bytes());
        let expected = drain(&mut whole);

        let bytes = STREAM.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = FrameDecoder::new();
            let mut frames = Vec::new();
            decoder.push(&bytes[..split]);
            frames.extend(drain(&mut decoder));
            decoder.push(&bytes[split..]);
            frames.extend(drain(&mut decoder));
            assert_eq!(frames, expected, "split at {}", split);
        }

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in bytes {
            decoder.push(std::slice::from_ref(byte));
            frames.extend(drain(&mut decoder));
        }
        assert_eq!(frames, expected);
    }

    #[test]
    fn test_scan_resumes_near_end_of_buffer() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"jsonrpc\":\"2.0\",\"id\":\"a\",");
        assert!(decoder.decode().unwrap().is_none());
        assert_eq!(decoder.scanned, decoder.buffered() - 2);

        decoder.push(b"\"result\":{}}\r\n");
        assert!(decoder.decode().unwrap().is_none());
        decoder.push(b"\r");
        assert!(decoder.decode().unwrap().is_none());
        decoder.push(b"\n");

        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame.message.id_string().as_deref(), Some("a"));
        assert_eq!(decoder.scanned, 0);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_oversized_block_is_dropped() {
        let mut decoder = FrameDecoder::new().with_max_block(64);
        decoder.push(&[b'x'; 65]);
        assert!(matches!(decoder.decode(), Err(McpError::Parse(_))));
        assert_eq!(decoder.buffered(), 0);

        decoder.push(b"data: {\"jsonrpc\":\"2.0\",\"method\":\"ping\"}\n\n");
        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame.message.method.as_deref(), Some("ping"));
    }

    #[test]
    fn test_incomplete_block_keeps_buffering() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"jsonrpc\":\"2.0\",\"id\":\"a\",\"result\":{}}\n");
        assert!(decoder.decode().unwrap().is_none());
        assert!(decoder.buffered() > 0);

        decoder.push(b"\n");
        assert!(decoder.decode().unwrap().is_some());
    }

    #[test]
    fn test_malformed_block_resynchronizes() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {not json}\n\ndata: {\"jsonrpc\":\"2.0\",\"id\":\"ok\",\"result\":{}}\n\n");

        let err = decoder.decode().unwrap_err();
        assert!(matches!(err, McpError::Parse(_)));

        let frame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame.message.id_string().as_deref(), Some("ok"));
    }

    #[test]
    fn test_finish_flushes_unterminated_block() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"jsonrpc\":\"2.0\",\"id\":\"z\",\"result\":{}}");
        assert!(decoder.decode().unwrap().is_none());
        let frame = decoder.finish().unwrap().unwrap();
        assert_eq!(frame.message.id_string().as_deref(), Some("z"));
        assert!(decoder.finish().unwrap().is_none());
    }

    #[test]
    fn test_decode_body_plain_json() {
        let msg = decode_body(b"  {\"jsonrpc\":\"2.0\",\"id\":\"1\",\"result\":{\"ok\":true}}").unwrap();
        assert_eq!(msg.result.unwrap()["ok"], true);
    }

    #[test]
    fn test_decode_body_streamed() {
        let body = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\"}\n\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":\"1\",\"result\":{\"ok\":true}}\n\n",
        );
        let msg = decode_body(body.as_bytes()).unwrap();
        assert_eq!(msg.id_string().as_deref(), Some("1"));
    }

    #[test]
    fn test_decode_body_without_frame_is_parse_error() {
        assert!(matches!(decode_body(b""), Err(McpError::Parse(_))));
        assert!(matches!(
            decode_body(b"event: ping\n\n"),
            Err(McpError::Parse(_))
        ));
        assert!(matches!(
            decode_body(b"data: nope\n\n"),
            Err(McpError::Parse(_))
        ));
    }
}
