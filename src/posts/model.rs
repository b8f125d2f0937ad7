//! The posts read model.

use std::collections::HashMap;

use crate::commit::Commit;
use crate::posts::{PostContent, PostEvent, PostId};
use crate::revision::StreamRevision;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub content: PostContent,
    /// Stream revision of the commit that last touched this post.
    pub revision: StreamRevision,
}

/// All live posts, indexed by id and by insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Posts {
    by_id: HashMap<PostId, Post>,
    ordered: Vec<PostId>,
}

impl Posts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.by_id.get(id)
    }

    pub fn by_id(&self) -> &HashMap<PostId, Post> {
        &self.by_id
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Up to `n` posts, newest first.
    pub fn most_recent(&self, n: usize) -> Vec<&Post> {
        self.ordered
            .iter()
            .rev()
            .filter_map(|id| self.by_id.get(id))
            .take(n)
            .collect()
    }

    pub fn update(&self, event: &PostEvent, revision: StreamRevision) -> Posts {
        let mut next = self.clone();
        match event {
            PostEvent::PostAdded { post_id, content } => {
                next.by_id.insert(*post_id, post(*post_id, content, revision));
                next.ordered.retain(|id| id != post_id);
                next.ordered.push(*post_id);
            }
            PostEvent::PostEdited { post_id, content } => {
                next.by_id.insert(*post_id, post(*post_id, content, revision));
                if !next.ordered.contains(post_id) {
                    next.ordered.push(*post_id);
                }
            }
            PostEvent::PostDeleted { post_id } => {
                next.by_id.remove(post_id);
                next.ordered.retain(|id| id != post_id);
            }
        }
        next
    }

    pub fn update_many<'a, I>(&self, events: I) -> Posts
    where
        I: IntoIterator<Item = (&'a PostEvent, StreamRevision)>,
    {
        events
            .into_iter()
            .fold(self.clone(), |posts, (event, revision)| posts.update(event, revision))
    }

    pub fn from_history<'a, I>(events: I) -> Posts
    where
        I: IntoIterator<Item = (&'a PostEvent, StreamRevision)>,
    {
        Posts::new().update_many(events)
    }

    /// Fold one commit into the model.
    pub fn apply_commit(&self, commit: &Commit<PostEvent>) -> Posts {
        self.update_many(commit.events_with_revision())
    }
}

fn post(id: PostId, content: &PostContent, revision: StreamRevision) -> Post {
    Post {
        id,
        content: content.clone(),
        revision,
    }
}
