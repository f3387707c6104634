//! The single post-reload callback binding.

use arc_swap::ArcSwapOption;
use std::sync::Arc;

type LoadCallback = Box<dyn Fn() + Send + Sync>;

/// Holds at most one callback, invoked after every successful reload.
///
/// Binding a new callback discards the old one outright. Rebinding is
/// lock-free, so a callback may rebind the slot from inside its own call.
pub(crate) struct CallbackSlot {
    current: ArcSwapOption<LoadCallback>,
}

impl CallbackSlot {
    pub(crate) fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    /// Replace the bound callback.
    pub(crate) fn replace<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: LoadCallback = Box::new(callback);
        self.current.store(Some(Arc::new(callback)));
    }

    /// Invoke the bound callback, if any. Returns whether one ran.
    pub(crate) fn invoke(&self) -> bool {
        // Clone the Arc out so a rebind during the call cannot free it
        match self.current.load_full() {
            Some(callback) => {
                (**callback)();
                true
            }
            None => false,
        }
    }
}

impl Default for CallbackSlot {
    fn default() -> Self {
        Self::new()
    }
}
