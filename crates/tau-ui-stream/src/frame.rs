use std::{collections::VecDeque, fmt::Display, pin::Pin};

use futures_util::{stream, Stream, StreamExt};

use crate::UiStreamError;

const FRAME_TERMINATOR: u8 = b'\n';
const COMMENT_PREFIX: char = ':';

/// Incremental newline framer for a streamed response body.
///
/// Bytes are buffered until a terminator is observed, so frames split across chunk
/// boundaries (including multi-byte UTF-8 sequences) are re-assembled before decoding.
/// Blank frames and `:` comment frames are dropped.
///
/// # Examples
///
/// ```
/// use tau_ui_stream::FrameDecoder;
///
/// let mut decoder = FrameDecoder::new();
/// assert!(decoder.push(b"data: {\"type\":\"st").is_empty());
/// let frames = decoder.push(b"art\"}\n: keepalive\n\n");
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].as_deref().unwrap(), "data: {\"type\":\"start\"}");
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every frame it completed, in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, UiStreamError>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut frame_start = 0;
        let mut cursor = self.scanned;
        while let Some(offset) = self.buffer[cursor..]
            .iter()
            .position(|byte| *byte == FRAME_TERMINATOR)
        {
            let frame_end = cursor + offset;
            if let Some(frame) = decode_frame(&self.buffer[frame_start..frame_end]) {
                frames.push(frame);
            }
            frame_start = frame_end + 1;
            cursor = frame_start;
        }

        self.buffer.drain(..frame_start);
        self.scanned = self.buffer.len();
        frames
    }

    /// Flushes an unterminated trailing frame once the body has ended.
    pub fn finish(&mut self) -> Option<Result<String, UiStreamError>> {
        let remaining = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        decode_frame(&remaining)
    }

    /// Number of bytes held for a frame whose terminator has not arrived yet.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_frame(raw: &[u8]) -> Option<Result<String, UiStreamError>> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(error) => {
            return Some(Err(UiStreamError::Decode {
                valid_up_to: error.valid_up_to(),
                frame_len: raw.len(),
            }))
        }
    };

    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
        return None;
    }
    Some(Ok(trimmed.to_string()))
}

struct FrameStreamState<S> {
    body: Pin<Box<S>>,
    decoder: FrameDecoder,
    pending: VecDeque<Result<String, UiStreamError>>,
    body_done: bool,
}

/// Lazily re-frames a byte stream into text frames.
///
/// The body is polled only when no decoded frame is pending. A transport error is yielded
/// once and ends the sequence; decode errors are yielded in place and framing continues.
pub fn frame_stream<S, B, E>(body: S) -> impl Stream<Item = Result<String, UiStreamError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = FrameStreamState {
        body: Box::pin(body),
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        body_done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((frame, state));
            }
            if state.body_done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(chunk.as_ref());
                    state.pending.extend(frames);
                }
                Some(Err(error)) => {
                    state.body_done = true;
                    return Some((Err(UiStreamError::Transport(error.to_string())), state));
                }
                None => {
                    state.body_done = true;
                    if let Some(frame) = state.decoder.finish() {
                        state.pending.push_back(frame);
                    }
                }
            }
        }
    })
}
