//! Post events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a post; also used as its stream id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(Uuid);

impl PostId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a post id, returning `None` for anything that is not a UUID.
    pub fn parse(id: &str) -> Option<Self> {
        id.parse().ok()
    }
}

impl FromStr for PostId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostContent {
    pub author: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl PostContent {
    pub fn new(
        author: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Every event that can happen to a post.
///
/// The `@type` tags are part of the persisted format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum PostEvent {
    #[serde(rename = "events.PostAdded")]
    PostAdded {
        #[serde(rename = "postId")]
        post_id: PostId,
        content: PostContent,
    },
    #[serde(rename = "events.PostEdited")]
    PostEdited {
        #[serde(rename = "postId")]
        post_id: PostId,
        content: PostContent,
    },
    #[serde(rename = "events.PostDeleted")]
    PostDeleted {
        #[serde(rename = "postId")]
        post_id: PostId,
    },
}

impl PostEvent {
    pub fn post_id(&self) -> PostId {
        match self {
            Self::PostAdded { post_id, .. }
            | Self::PostEdited { post_id, .. }
            | Self::PostDeleted { post_id } => *post_id,
        }
    }

    /// The stream this event is committed to.
    pub fn stream_id(&self) -> String {
        self.post_id().to_string()
    }
}
