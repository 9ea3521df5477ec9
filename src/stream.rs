//! Streaming response reader.
//! Consumes the chunked body of a `stream: true` chat completion, reassembles
//! server-sent events split on a blank line, and appends each delta's content
//! to the output as it arrives.
//!
//! Bytes are decoded with a stateful UTF-8 decoder, so a multi-byte character
//! split across two chunks comes out whole. An event that fails to parse is
//! logged and skipped; later events are still processed. The loop ends only when
//! the transport reports end of body.

use std::char::REPLACEMENT_CHARACTER;

use crate::chat::ChatChunk;
use crate::error::AssistError;
use crate::output::OutputSurface;

const EVENT_DELIMITER: &str = "\n\n";
const DATA_PREFIX: &str = "data: ";
const DONE_PAYLOAD: &str = "[DONE]";

/// A body that yields byte chunks until EOF (`Ok(None)`).
pub trait ChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, AssistError>;
}

impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, AssistError> {
        Ok(self.chunk().await?.map(|bytes| bytes.to_vec()))
    }
}

/// Incremental UTF-8 decoder. An incomplete sequence at the end of a chunk is held
/// back until the next one; invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(REPLACEMENT_CHARACTER);
                            consumed += valid + invalid;
                        }
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        out
    }

    /// Bytes of an unfinished character waiting for the next chunk.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Splits accumulated text on blank lines. Everything before the last delimiter is
/// a complete event; the tail waits for more input.
#[derive(Debug, Default)]
pub struct EventSplitter {
    buffer: String,
}

impl EventSplitter {
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let mut events = Vec::new();
        while let Some(end) = self.buffer.find(EVENT_DELIMITER) {
            let event: String = self.buffer.drain(..end + EVENT_DELIMITER.len()).collect();
            let event = &event[..end];
            if !event.is_empty() {
                events.push(event.to_string());
            }
        }
        events
    }

    pub fn remainder(&self) -> &str {
        &self.buffer
    }
}

/// Content carried by one event, `choices[0].delta.content`. `Ok(None)` for events
/// without content (role announcements, finish markers).
pub fn parse_event(event: &str) -> Result<Option<String>, AssistError> {
    let payload = event.strip_prefix(DATA_PREFIX).ok_or_else(|| {
        AssistError::StreamEventParse(format!("missing \"data: \" prefix in {event:?}"))
    })?;

    let chunk: ChatChunk = serde_json::from_str(payload)
        .map_err(|e| AssistError::StreamEventParse(format!("{e} in {payload:?}")))?;

    let choice = chunk
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AssistError::StreamEventParse(format!("no choices in {payload:?}")))?;

    Ok(choice.delta.content.filter(|c| !c.is_empty()))
}

fn is_done_marker(event: &str) -> bool {
    event.strip_prefix(DATA_PREFIX).map(str::trim) == Some(DONE_PAYLOAD)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Complete events seen, including skipped ones.
    pub events: usize,
    /// Events that failed to parse.
    pub skipped: usize,
    /// Characters appended to the output.
    pub chars: usize,
}

/// Reads `source` to EOF, appending each event's content to `output` verbatim.
/// Only transport errors abort the read.
pub async fn read_stream<C, O>(source: &mut C, output: &mut O) -> Result<StreamSummary, AssistError>
where
    C: ChunkSource,
    O: OutputSurface + ?Sized,
{
    let mut decoder = Utf8Decoder::default();
    let mut splitter = EventSplitter::default();
    let mut summary = StreamSummary::default();

    while let Some(chunk) = source.next_chunk().await? {
        let text = decoder.decode(&chunk);
        for event in splitter.push(&text) {
            summary.events += 1;

            if is_done_marker(&event) {
                log::debug!("Stream sent [DONE]; reading on until EOF");
                continue;
            }

            match parse_event(&event) {
                Ok(Some(content)) => {
                    summary.chars += content.chars().count();
                    output.append_markup(&content);
                }
                Ok(None) => {}
                Err(e) => {
                    summary.skipped += 1;
                    log::warn!("{e}");
                }
            }
        }
    }

    if !splitter.remainder().is_empty() || decoder.pending() > 0 {
        log::debug!(
            "Stream ended with {} undelimited chars and {} pending bytes",
            splitter.remainder().chars().count(),
            decoder.pending()
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferSurface;
    use std::collections::VecDeque;

    impl ChunkSource for VecDeque<Vec<u8>> {
        async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, AssistError> {
            Ok(self.pop_front())
        }
    }

    /// Yields its chunks, then fails the way a dropped connection does.
    struct DroppedMidway(VecDeque<Vec<u8>>);

    impl ChunkSource for DroppedMidway {
        async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, AssistError> {
            match self.0.pop_front() {
                Some(chunk) => Ok(Some(chunk)),
                None => {
                    let err = reqwest::Client::new().get("not a url").build().unwrap_err();
                    Err(AssistError::Network(err))
                }
            }
        }
    }

    fn event(content: &str) -> String {
        let payload = serde_json::json!({ "choices": [{ "delta": { "content": content } }] });
        format!("data: {payload}\n\n")
    }

    async fn run(chunks: Vec<Vec<u8>>) -> (BufferSurface, StreamSummary) {
        let mut source: VecDeque<Vec<u8>> = chunks.into();
        let mut output = BufferSurface::default();
        let summary = read_stream(&mut source, &mut output).await.unwrap();
        (output, summary)
    }

    #[tokio::test]
    async fn test_two_events_in_one_chunk() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        );
        let (output, summary) = run(vec![body.as_bytes().to_vec()]).await;

        assert_eq!(output.answer, "Hello");
        assert_eq!(summary, StreamSummary { events: 2, skipped: 0, chars: 5 });
    }

    #[tokio::test]
    async fn test_output_independent_of_chunk_boundaries() {
        let body: String = ["Caf", "é ", "日本", "語 ", "🎉", "\n\n", "done"]
            .iter()
            .map(|c| event(c))
            .collect();
        let bytes = body.as_bytes();
        let expected = "Café 日本語 🎉\n\ndone";

        // every single split point, including mid-delimiter and mid-character
        for split in 0..=bytes.len() {
            let (output, _) = run(vec![bytes[..split].to_vec(), bytes[split..].to_vec()]).await;
            assert_eq!(output.answer, expected, "split at {split}");
        }

        // byte-at-a-time
        let (output, _) = run(bytes.iter().map(|b| vec![*b]).collect()).await;
        assert_eq!(output.answer, expected);

        // uneven chunk sizes
        for size in [2, 3, 5, 7, 13] {
            let (output, _) = run(bytes.chunks(size).map(<[u8]>::to_vec).collect()).await;
            assert_eq!(output.answer, expected, "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn test_transport_error_keeps_streamed_content() {
        let mut source = DroppedMidway(vec![event("partial ").into_bytes()].into());
        let mut output = BufferSurface::default();

        let err = read_stream(&mut source, &mut output).await.unwrap_err();

        assert!(matches!(err, AssistError::Network(_)));
        assert_eq!(output.answer, "partial ");
        assert!(output.errors.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_event_is_skipped() {
        let body = format!(
            "{}data: {{\"choices\":[{{\"delta\":{{\"content\":\n\n{}: keep-alive\n\n{}",
            event("one "),
            event("two "),
            event("three")
        );
        let (output, summary) = run(vec![body.into_bytes()]).await;

        assert_eq!(output.answer, "one two three");
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.events, 5);
    }

    #[tokio::test]
    async fn test_malformed_event_split_across_chunks_does_not_stop_later_chunks() {
        let first = format!("{}data: not-json", event("a"));
        let second = format!("\n\n{}", event("b"));
        let (output, summary) = run(vec![first.into_bytes(), second.into_bytes()]).await;

        assert_eq!(output.answer, "ab");
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_done_marker_does_not_end_stream() {
        let body = format!("{}data: [DONE]\n\n{}", event("x"), event("y"));
        let (output, summary) = run(vec![body.into_bytes()]).await;

        assert_eq!(output.answer, "xy");
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn test_undelimited_tail_is_not_rendered() {
        let tail = r#"data: {"choices":[{"delta":{"content":"late"}}]}"#;
        let body = format!("{}{tail}", event("on time"));
        let (output, _) = run(vec![body.into_bytes()]).await;
        assert_eq!(output.answer, "on time");
    }

    #[tokio::test]
    async fn test_markup_is_appended_verbatim() {
        let (output, _) = run(vec![event("<b>bold</b> &amp;").into_bytes()]).await;
        assert_eq!(output.answer, "<b>bold</b> &amp;");
    }

    #[test]
    fn test_parse_event_variants() {
        assert_eq!(
            parse_event(r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#).unwrap(),
            Some("hi".to_string())
        );
        assert_eq!(parse_event(r#"data: {"choices":[{"delta":{}}]}"#).unwrap(), None);
        assert_eq!(parse_event(r#"data: {"choices":[{"delta":{"content":""}}]}"#).unwrap(), None);
        for malformed in [
            r#"data: {"choices":[]}"#,
            r#"{"choices":[]}"#,
            r#"data: {"choices":[{}]}"#,
        ] {
            assert!(
                matches!(parse_event(malformed), Err(AssistError::StreamEventParse(_))),
                "{malformed}"
            );
        }
    }

    #[test]
    fn test_decoder_holds_back_partial_sequence() {
        let mut decoder = Utf8Decoder::default();
        let bytes = "é".as_bytes();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.pending(), 1);
        assert_eq!(decoder.decode(&bytes[1..]), "é");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_splitter_keeps_tail() {
        let mut splitter = EventSplitter::default();
        assert_eq!(splitter.push("one\n"), Vec::<String>::new());
        assert_eq!(splitter.push("\ntwo\n\n\n\nthr"), vec!["one".to_string(), "two".to_string()]);
        assert_eq!(splitter.remainder(), "thr");
    }
}
