//! Key and channel names within one store namespace.

/// Maximum ids per `HMGET` when fetching commits.
pub(crate) const FETCH_CHUNK: usize = 10_000;

#[derive(Debug, Clone)]
pub(crate) struct Keys {
    commits: String,
    control: String,
    stream_prefix: String,
}

impl Keys {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            commits: format!("{}:commits", name),
            control: format!("{}:control", name),
            stream_prefix: format!("{}:stream:", name),
        }
    }

    /// Hash of commit id to encoded commit. Also the channel live commits
    /// are published on.
    pub(crate) fn commits(&self) -> &str {
        &self.commits
    }

    /// Channel carrying subscription and close tokens.
    pub(crate) fn control(&self) -> &str {
        &self.control
    }

    /// List of commit ids belonging to one stream, in stream order.
    pub(crate) fn stream(&self, stream_id: &str) -> String {
        format!("{}{}", self.stream_prefix, stream_id)
    }
}
