//! Semantic transcript chunking
//!
//! Greedy forward scan over ordered transcript segments. Segments accumulate
//! into a buffer until a size bound or a boundary signal (long pause, topic
//! transition phrase, sentence end) allows a split. Segments are atomic: the
//! chunker never splits inside a segment's text.

use serde::{Deserialize, Serialize};

use crate::models::{Chunk, TranscriptSegment};

/// Tuning knobs for the chunker
///
/// Word counting is whitespace-splitting, which only approximates word counts
/// for scripts that are not whitespace-tokenizable. Known limitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Soft minimum: a boundary signal can close a chunk at or above this
    pub min_words: usize,

    /// Hard maximum: a chunk closes unconditionally at or above this
    pub max_words: usize,

    /// Gap between consecutive segments treated as a long pause, in seconds
    pub pause_threshold_secs: f64,

    /// Lexical cues indicating a likely subject change, matched
    /// case-insensitively as substrings
    pub topic_phrases: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_words: 80,
            max_words: 140,
            pause_threshold_secs: 2.0,
            topic_phrases: default_topic_phrases(),
        }
    }
}

/// Reference topic-transition phrase set
pub fn default_topic_phrases() -> Vec<String> {
    [
        "now let's",
        "moving on",
        "next we",
        "so basically",
        "in summary",
        "let's talk about",
        "to conclude",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

struct ChunkBuffer {
    start: f64,
    end: f64,
    text: String,
    word_count: usize,
}

impl ChunkBuffer {
    fn new() -> Self {
        Self {
            start: 0.0,
            end: 0.0,
            text: String::new(),
            word_count: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn append(&mut self, segment: &TranscriptSegment) {
        let trimmed = segment.text.trim();
        if self.is_empty() {
            self.start = segment.start;
        } else {
            self.text.push(' ');
        }
        self.text.push_str(trimmed);
        self.end = segment.end;
        self.word_count += trimmed.split_whitespace().count();
    }

    fn flush(&mut self, video_id: &str, out: &mut Vec<Chunk>) {
        if self.is_empty() {
            return;
        }
        out.push(Chunk {
            video_id: video_id.to_string(),
            start: self.start,
            end: self.end,
            text: std::mem::take(&mut self.text),
            embedding: None,
        });
        self.word_count = 0;
    }
}

/// Turn an ordered segment list into an ordered, non-overlapping chunk list
///
/// Every input segment contributes to exactly one chunk, chunks are
/// contiguous in source order, and a chunk's start/end equal the min start
/// and max end of its constituent segments. An empty input yields an empty
/// output; callers must treat that as a failure before persistence.
pub fn chunk_segments(segments: &[TranscriptSegment], config: &ChunkerConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buffer = ChunkBuffer::new();

    let video_id = match segments.first() {
        Some(first) => first.video_id.as_str(),
        None => return chunks,
    };

    for (i, segment) in segments.iter().enumerate() {
        buffer.append(segment);

        let at_boundary = match segments.get(i + 1) {
            Some(next) => {
                is_long_pause(segment, next, config.pause_threshold_secs)
                    || is_topic_shift(&segment.text, &config.topic_phrases)
                    || is_sentence_end(&segment.text)
            }
            None => false,
        };

        if buffer.word_count >= config.max_words
            || (buffer.word_count >= config.min_words && at_boundary)
        {
            buffer.flush(video_id, &mut chunks);
        }
    }

    // Trailing buffer always flushes, regardless of word count
    buffer.flush(video_id, &mut chunks);
    chunks
}

fn is_long_pause(current: &TranscriptSegment, next: &TranscriptSegment, threshold: f64) -> bool {
    next.start - current.end > threshold
}

fn is_topic_shift(text: &str, phrases: &[String]) -> bool {
    let lowered = text.to_lowercase();
    phrases.iter().any(|p| lowered.contains(p.as_str()))
}

fn is_sentence_end(text: &str) -> bool {
    matches!(text.trim().chars().last(), Some('.') | Some('!') | Some('?'))
}
