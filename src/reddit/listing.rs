//! Reddit listing JSON and reply-tree assembly.
//!
//! Comment pages arrive as nested listings with `more` placeholders wherever
//! Reddit truncated the tree. Nodes are collected into an index arena keyed by
//! fullname so that children fetched later through `/api/morechildren` can be
//! grafted under their parent, then the arena is turned into owned
//! [`Comment`]s. Nothing from the JSON outlives one expansion.

use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::harvest::{Comment, Thread};

/// Marker Reddit puts in place of a deleted account.
const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Deserialize)]
pub(crate) struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingData {
    #[serde(default)]
    pub children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "RawThing")]
pub(crate) enum Thing {
    Link(LinkData),
    Comment(CommentData),
    More(MoreData),
    /// Kinds the harvester has no use for (subreddits, accounts, ...).
    Other,
}

#[derive(Deserialize)]
struct RawThing {
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl TryFrom<RawThing> for Thing {
    type Error = serde_json::Error;

    fn try_from(raw: RawThing) -> Result<Self, Self::Error> {
        Ok(match raw.kind.as_str() {
            "t3" => Thing::Link(serde_json::from_value(raw.data)?),
            "t1" => Thing::Comment(serde_json::from_value(raw.data)?),
            "more" => Thing::More(serde_json::from_value(raw.data)?),
            _ => Thing::Other,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LinkData {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub score: i64,
    pub author: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentData {
    pub name: String,
    #[serde(default)]
    pub body: String,
    pub author: Option<String>,
    pub parent_id: String,
    /// A listing, or `""` when there are no replies.
    #[serde(default, deserialize_with = "replies")]
    replies: Option<Box<Listing>>,
}

fn replies<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Box<Listing>>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) if s.is_empty() => Ok(None),
        value => serde_json::from_value(value).map(Some).map_err(D::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MoreData {
    pub parent_id: String,
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MoreChildrenResponse {
    pub json: MoreChildrenJson,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MoreChildrenJson {
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    pub data: Option<MoreChildrenData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MoreChildrenData {
    #[serde(default)]
    pub things: Vec<Thing>,
}

fn author(raw: Option<String>) -> Option<String> {
    raw.filter(|a| a != DELETED_AUTHOR)
}

impl Listing {
    /// Submissions in listing order; comments are filled in later.
    pub fn into_threads(self) -> Vec<Thread> {
        self.data
            .children
            .into_iter()
            .filter_map(|thing| match thing {
                Thing::Link(link) => Some(Thread {
                    id: link.id,
                    title: link.title,
                    score: link.score,
                    author: author(link.author),
                    url: link.url,
                    comments: Vec::new(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// A `more` placeholder still waiting to be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingMore {
    pub parent_id: String,
    pub children: Vec<String>,
}

#[derive(Debug)]
struct Node {
    body: String,
    author: Option<String>,
    children: Vec<usize>,
}

#[derive(Debug)]
pub(crate) struct CommentArena {
    link_fullname: String,
    nodes: Vec<Node>,
    by_name: HashMap<String, usize>,
    roots: Vec<usize>,
    pending: Vec<PendingMore>,
}

impl CommentArena {
    pub fn new(link_id: &str) -> Self {
        Self {
            link_fullname: format!("t3_{link_id}"),
            nodes: Vec::new(),
            by_name: HashMap::new(),
            roots: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn link_fullname(&self) -> &str {
        &self.link_fullname
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Add every thing of a listing, in order.
    pub fn extend(&mut self, things: Vec<Thing>) {
        for thing in things {
            self.insert(thing);
        }
    }

    pub fn insert(&mut self, thing: Thing) {
        match thing {
            Thing::Comment(data) => self.insert_comment(data),
            Thing::More(more) => {
                // "Continue this thread" stubs carry no ids to fetch.
                if more.children.is_empty() {
                    debug!("Dropping empty placeholder under {}", more.parent_id);
                    return;
                }
                self.pending.push(PendingMore {
                    parent_id: more.parent_id,
                    children: more.children,
                });
            }
            Thing::Link(_) | Thing::Other => {}
        }
    }

    fn insert_comment(&mut self, data: CommentData) {
        let idx = self.nodes.len();

        if data.parent_id == self.link_fullname {
            self.roots.push(idx);
        } else if let Some(&parent) = self.by_name.get(&data.parent_id) {
            self.nodes[parent].children.push(idx);
        } else {
            debug!("Dropping {}: parent {} not loaded", data.name, data.parent_id);
            return;
        }

        self.nodes.push(Node {
            body: data.body,
            author: author(data.author),
            children: Vec::new(),
        });
        self.by_name.insert(data.name, idx);

        if let Some(listing) = data.replies {
            self.extend(listing.data.children);
        }
    }

    /// Placeholders collected so far; the arena forgets them.
    pub fn take_pending(&mut self) -> Vec<PendingMore> {
        std::mem::take(&mut self.pending)
    }

    pub fn into_comments(mut self) -> Vec<Comment> {
        let roots = std::mem::take(&mut self.roots);
        roots.into_iter().map(|idx| build(&mut self.nodes, idx)).collect()
    }
}

fn build(nodes: &mut [Node], idx: usize) -> Comment {
    let body = std::mem::take(&mut nodes[idx].body);
    let author = nodes[idx].author.take();
    let children = std::mem::take(&mut nodes[idx].children);

    Comment {
        body,
        author,
        replies: children.into_iter().map(|child| build(nodes, child)).collect(),
    }
}
