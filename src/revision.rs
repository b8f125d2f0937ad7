//! Log positions.
//!
//! `StoreRevision` counts commits across the whole log, `StreamRevision`
//! counts commits within a single stream. Both start at zero, meaning
//! "nothing committed yet", and the first commit is revision 1.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

macro_rules! revision_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Nothing committed yet.
            pub const INITIAL: Self = Self(0);
            /// Upper bound for open-ended range reads. Kept within `i64` so
            /// distances between any two revisions stay representable.
            pub const MAXIMUM: Self = Self(i64::MAX as u64);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn value(self) -> u64 {
                self.0
            }

            /// Saturates at `u64::MAX`.
            pub fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }

            /// Saturates at `INITIAL`.
            pub fn previous(self) -> Self {
                Self(self.0.saturating_sub(1))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(revision: $name) -> Self {
                revision.0
            }
        }

        impl Add<u64> for $name {
            type Output = Self;

            fn add(self, rhs: u64) -> Self {
                Self(self.0.saturating_add(rhs))
            }
        }

        impl Sub<u64> for $name {
            type Output = Self;

            fn sub(self, rhs: u64) -> Self {
                Self(self.0.saturating_sub(rhs))
            }
        }

        /// Signed distance between two revisions, clamped to the `i64` range.
        impl Sub for $name {
            type Output = i64;

            fn sub(self, rhs: Self) -> i64 {
                let distance = i128::from(self.0) - i128::from(rhs.0);
                distance.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

revision_type!(
    /// Position in the global commit log.
    StoreRevision
);

revision_type!(
    /// Position within one stream.
    StreamRevision
);
