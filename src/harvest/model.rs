//! Threads, comment trees and the training sequences built from them.

use std::collections::VecDeque;

/// One ranked discussion item from a content source.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub score: i64,
    /// `None` when the submission was deleted or removed.
    pub author: Option<String>,
    pub url: Option<String>,
    /// Top-level comments in ranked order. Empty until the source expands them.
    pub comments: Vec<Comment>,
}

impl Thread {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            score: 0,
            author: None,
            url: None,
            comments: Vec::new(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.author.is_none()
    }
}

/// A node in a reply tree. Children keep the order the source supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub body: String,
    pub author: Option<String>,
    pub replies: Vec<Comment>,
}

impl Comment {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            author: None,
            replies: Vec::new(),
        }
    }

    pub fn with_replies(mut self, replies: Vec<Comment>) -> Self {
        self.replies = replies;
        self
    }
}

/// Flatten a comment forest breadth-first.
///
/// All top-level comments come first in ranked order, then their replies level
/// by level, siblings in source order. This is the order Reddit's own comment
/// listing produces, so each comment is paired with its direct replies exactly
/// once regardless of depth.
pub fn flatten(roots: &[Comment]) -> Vec<&Comment> {
    let mut out = Vec::new();
    let mut queue: VecDeque<&Comment> = roots.iter().collect();

    while let Some(comment) = queue.pop_front() {
        out.push(comment);
        queue.extend(comment.replies.iter());
    }

    out
}

/// One harvested exchange: a comment body followed by accepted replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSequence {
    statements: Vec<String>,
}

impl TrainingSequence {
    /// Start a sequence with the originating comment body.
    pub fn new(first: impl Into<String>) -> Self {
        Self {
            statements: vec![first.into()],
        }
    }

    /// Build a sequence from arbitrary statements (corpus files, manual input).
    pub fn from_statements(statements: Vec<String>) -> Option<Self> {
        if statements.is_empty() {
            None
        } else {
            Some(Self { statements })
        }
    }

    pub fn push(&mut self, statement: String) {
        self.statements.push(statement);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bodies<'a>(comments: &[&'a Comment]) -> Vec<&'a str> {
        comments.iter().map(|c| c.body.as_str()).collect()
    }

    #[test]
    fn test_flatten_is_breadth_first() {
        let roots = vec![
            Comment::new("a").with_replies(vec![
                Comment::new("a1").with_replies(vec![Comment::new("a1x")]),
                Comment::new("a2"),
            ]),
            Comment::new("b").with_replies(vec![Comment::new("b1")]),
        ];

        let flat = flatten(&roots);
        assert_eq!(bodies(&flat), vec!["a", "b", "a1", "a2", "b1", "a1x"]);
    }

    #[test]
    fn test_flatten_empty() {
        assert!(flatten(&[]).is_empty());
    }

    #[test]
    fn test_sequence_starts_with_comment() {
        let mut seq = TrainingSequence::new("hi");
        seq.push("hello there".to_string());
        assert_eq!(seq.statements(), &["hi".to_string(), "hello there".to_string()]);
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn test_from_statements_rejects_empty() {
        assert!(TrainingSequence::from_statements(vec![]).is_none());
        assert!(TrainingSequence::from_statements(vec!["x".into()]).is_some());
    }

    #[test]
    fn test_thread_without_author_is_deleted() {
        let mut thread = Thread::new("abc", "title");
        assert!(thread.is_deleted());
        thread.author = Some("alice".into());
        assert!(!thread.is_deleted());
    }
}
