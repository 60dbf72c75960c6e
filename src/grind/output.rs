//! Tool Output
//!
//! Line classification and bounded capture for the search tool's streams.

use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

/// A recognised line of tool output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    /// The tool wrote a keypair file at this location
    KeypairWritten(String),
    /// Periodic search statistics
    Searched { keypairs: u64 },
    Other,
}

static RE_KEYPAIR_WRITTEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Wrote keypair to\s+(\S.*?)\s*$").expect("valid regex"));
static RE_SEARCHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Searched\s+(\d+)\s+keypairs").expect("valid regex"));

/// Classify a single stdout line
pub fn classify_line(line: &str) -> OutputLine {
    if let Some(caps) = RE_KEYPAIR_WRITTEN.captures(line) {
        return OutputLine::KeypairWritten(caps[1].to_string());
    }

    if let Some(caps) = RE_SEARCHED.captures(line) {
        if let Ok(keypairs) = caps[1].parse() {
            return OutputLine::Searched { keypairs };
        }
    }

    OutputLine::Other
}

/// Keeps the most recent lines of one stream.
///
/// Each stream has exactly one reader task writing to its capture.
#[derive(Debug, Clone)]
pub struct BoundedCapture {
    lines: VecDeque<String>,
    capacity: usize,
    dropped: usize,
}

impl BoundedCapture {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(line.into());
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Number of older lines discarded to stay within capacity
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    /// Non-blank lines joined for display
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.trim_end())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success_line() {
        assert_eq!(
            classify_line("Wrote keypair to ABcdEF123.json"),
            OutputLine::KeypairWritten("ABcdEF123.json".to_string())
        );
        assert_eq!(
            classify_line("  Wrote keypair to /tmp/key dir/AB.json  "),
            OutputLine::KeypairWritten("/tmp/key dir/AB.json".to_string())
        );
    }

    #[test]
    fn test_classify_search_stats() {
        assert_eq!(
            classify_line("Searched 1000000 keypairs in 12s. 0 matches found."),
            OutputLine::Searched { keypairs: 1_000_000 }
        );
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(classify_line("Wrote keypair"), OutputLine::Other);
        assert_eq!(classify_line("Keypair written somewhere"), OutputLine::Other);
        assert_eq!(classify_line(""), OutputLine::Other);
    }

    #[test]
    fn test_capture_keeps_latest_lines() {
        let mut capture = BoundedCapture::new(2);
        capture.push("one");
        capture.push("two");
        capture.push("three");
        assert_eq!(capture.lines().collect::<Vec<_>>(), vec!["two", "three"]);
        assert_eq!(capture.dropped(), 1);
        assert_eq!(capture.text(), "two\nthree");
    }

    #[test]
    fn test_capture_blank() {
        let mut capture = BoundedCapture::new(10);
        assert!(capture.is_blank());
        capture.push("   ");
        assert!(capture.is_blank());
        assert_eq!(capture.text(), "");
        capture.push("error: bad pattern");
        assert!(!capture.is_blank());
        assert_eq!(capture.text(), "error: bad pattern");
    }
}
