//! SRT (SubRip Subtitle) rendering of transcript segments

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::TranscriptSegment;

/// SRT entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrtEntry {
    /// Sequential number, 1-based
    pub index: u32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

impl fmt::Display for SrtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n",
            self.index,
            format_timestamp(self.start),
            format_timestamp(self.end),
            self.text
        )
    }
}

/// SRT file generator
#[derive(Debug, Clone, Default)]
pub struct SrtGenerator {
    entries: Vec<SrtEntry>,
}

impl SrtGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build entries from segments, indexed in list order
    pub fn from_segments(segments: &[TranscriptSegment]) -> Self {
        let entries = segments
            .iter()
            .enumerate()
            .map(|(i, s)| SrtEntry {
                index: (i + 1) as u32,
                start: s.start,
                end: s.end,
                text: s.text.trim().to_string(),
            })
            .collect();
        Self { entries }
    }

    pub fn add_entry(&mut self, entry: SrtEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Generate SRT content as a string
    pub fn generate(&self) -> String {
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(&entry.to_string());
            content.push('\n');
        }
        content
    }

    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        tokio::fs::write(path.as_ref(), self.generate()).await?;
        Ok(())
    }
}

/// Format seconds as an SRT timestamp: "00:01:23,456"
fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(83.456), "00:01:23,456");
        assert_eq!(format_timestamp(3661.5), "01:01:01,500");
    }

    #[test]
    fn test_generate_from_segments() {
        let segments = vec![
            TranscriptSegment::new("vid-1", 0.0, 2.5, "Hello."),
            TranscriptSegment::new("vid-1", 2.5, 5.0, "World."),
        ];
        let srt = SrtGenerator::from_segments(&segments);
        assert_eq!(srt.len(), 2);

        let content = srt.generate();
        assert!(content.starts_with("1\n00:00:00,000 --> 00:00:02,500\nHello.\n"));
        assert!(content.contains("2\n00:00:02,500 --> 00:00:05,000\nWorld.\n"));
    }
}
