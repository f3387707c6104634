//! Session lifecycle, bounce filtering and reloading.

mod builder;
mod callback;
mod debounce;
mod loader;
mod session;

pub use builder::SessionBuilder;
pub use debounce::BounceWindow;
pub use session::{Session, SharedTarget};
