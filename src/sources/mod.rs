//! Document formats and decode-merge support.

mod format;
mod merge;

pub use format::Format;
pub use merge::{merge_into, merge_values};
