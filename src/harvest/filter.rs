//! Reply text cleaning and acceptance.

use crate::config::HarvestConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyVerdict {
    /// Cleaned text that may join a training sequence.
    Accept(String),
    /// Cleaned length reached `max_reply_length`.
    TooLong,
    /// Cleaned text is exactly one of the rejected markers.
    Rejected,
}

#[derive(Debug, Clone)]
pub struct ReplyFilter {
    max_reply_length: usize,
    rejected_markers: Vec<String>,
    strip_markers: Vec<String>,
}

impl ReplyFilter {
    pub fn new(max_reply_length: usize, rejected_markers: Vec<String>, strip_markers: Vec<String>) -> Self {
        Self {
            max_reply_length,
            rejected_markers,
            // An empty marker would match forever in `clean`.
            strip_markers: strip_markers.into_iter().filter(|m| !m.is_empty()).collect(),
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(
            config.max_reply_length,
            config.rejected_markers.clone(),
            config.strip_markers.clone(),
        )
    }

    /// Trim whitespace and peel strip markers off both ends until none remain.
    pub fn clean<'a>(&self, text: &'a str) -> &'a str {
        let mut text = text.trim();
        loop {
            let before = text.len();
            for marker in &self.strip_markers {
                text = text.strip_prefix(marker.as_str()).unwrap_or(text);
                text = text.strip_suffix(marker.as_str()).unwrap_or(text);
            }
            text = text.trim();
            if text.len() == before {
                return text;
            }
        }
    }

    pub fn check(&self, reply: &str) -> ReplyVerdict {
        let cleaned = self.clean(reply);

        // Length is counted in characters, not bytes.
        if cleaned.chars().count() >= self.max_reply_length {
            return ReplyVerdict::TooLong;
        }

        if self.rejected_markers.iter().any(|m| m == cleaned) {
            return ReplyVerdict::Rejected;
        }

        ReplyVerdict::Accept(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ReplyFilter {
        ReplyFilter::new(
            80,
            vec!["[removed]".to_string(), "[deleted]".to_string()],
            vec!["/r/".to_string(), "^".to_string()],
        )
    }

    #[test]
    fn test_accepts_short_reply() {
        assert_eq!(filter().check("hello there"), ReplyVerdict::Accept("hello there".into()));
    }

    #[test]
    fn test_rejects_at_max_length() {
        let f = filter();
        assert_eq!(f.check(&"x".repeat(80)), ReplyVerdict::TooLong);
        assert_eq!(f.check(&"x".repeat(90)), ReplyVerdict::TooLong);
        assert_eq!(f.check(&"x".repeat(79)), ReplyVerdict::Accept("x".repeat(79)));
    }

    #[test]
    fn test_length_counts_chars() {
        // 79 two-byte chars is 158 bytes but still under the limit.
        let text = "é".repeat(79);
        assert_eq!(filter().check(&text), ReplyVerdict::Accept(text));
    }

    #[test]
    fn test_rejected_marker_exact_match_only() {
        let f = filter();
        assert_eq!(f.check("[removed]"), ReplyVerdict::Rejected);
        assert_eq!(f.check("  [deleted] "), ReplyVerdict::Rejected);
        assert_eq!(
            f.check("it was [removed] earlier"),
            ReplyVerdict::Accept("it was [removed] earlier".into())
        );
    }

    #[test]
    fn test_strips_markers_from_both_ends() {
        let f = filter();
        assert_eq!(f.clean("/r/rust"), "rust");
        assert_eq!(f.clean("^^^tiny ^text^"), "tiny ^text");
        assert_eq!(f.clean("^/r/ nested /r/^"), "nested");
        assert_eq!(f.clean("no markers"), "no markers");
    }

    #[test]
    fn test_marker_is_checked_after_cleaning() {
        assert_eq!(filter().check("^[removed]^"), ReplyVerdict::Rejected);
    }

    #[test]
    fn test_empty_strip_marker_is_ignored() {
        let f = ReplyFilter::new(80, vec![], vec![String::new()]);
        assert_eq!(f.clean(" abc "), "abc");
    }
}
