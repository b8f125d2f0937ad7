//! Blog posts: the domain folded by the memory image.

mod events;
mod model;

pub use events::{PostContent, PostEvent, PostId};
pub use model::{Post, Posts};
