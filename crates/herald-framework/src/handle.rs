//! Late-bound access to the dispatcher from inside handlers.
//!
//! Handlers are registered before the dispatcher exists, so they cannot
//! capture it directly. Instead they capture a [`DispatcherHandle`] that the
//! builder binds once the dispatcher is constructed:
//!
//! ```rust,ignore
//! let handle = DispatcherHandle::new();
//! let h = handle.clone();
//! registry.add_command(EventInfo::new("help"), move |msg, _prefix| {
//!     let h = h.clone();
//!     async move {
//!         let dispatcher = h.get().context("dispatcher stopped")?;
//!         println!("{}", dispatcher.list_commands(&msg).await?);
//!         Ok(())
//!     }
//! })?;
//!
//! let dispatcher = Dispatcher::builder(bot)
//!     .registry(registry)
//!     .handle(handle)
//!     .build(InstanceSlot::process())
//!     .await?;
//! ```

use std::sync::{Arc, OnceLock, Weak};

use crate::dispatcher::Dispatcher;

/// A cloneable, weak reference to a dispatcher, bound at build time.
///
/// Every clone shares the same binding. The handle never keeps the
/// dispatcher alive.
#[derive(Clone, Default)]
pub struct DispatcherHandle {
    target: Arc<OnceLock<Weak<Dispatcher>>>,
}

impl DispatcherHandle {
    /// Creates an unbound handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// The dispatcher, if it has been built and is still alive.
    pub fn get(&self) -> Option<Arc<Dispatcher>> {
        self.target.get().and_then(Weak::upgrade)
    }

    /// Whether a dispatcher has been bound to this handle.
    pub fn is_bound(&self) -> bool {
        self.target.get().is_some()
    }

    /// Binds the handle. Returns `false` if it was already bound.
    pub(crate) fn bind(&self, dispatcher: &Arc<Dispatcher>) -> bool {
        self.target.set(Arc::downgrade(dispatcher)).is_ok()
    }
}

impl std::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("bound", &self.is_bound())
            .field("alive", &self.get().is_some())
            .finish()
    }
}
