//! Caller permission tiers.

use std::collections::HashSet;
use std::sync::Arc;

use herald_core::{Accessibility, ChannelId, NoPermissions, PermissionSource, UserId};

/// Computes a caller's [`Accessibility`] tier.
///
/// Developers come from a static allow-list; admin status is asked of the
/// platform on every call, since permissions may change between messages.
#[derive(Clone)]
pub struct AccessibilityResolver {
    developers: HashSet<UserId>,
    permissions: Arc<dyn PermissionSource>,
}

impl AccessibilityResolver {
    /// Creates a resolver.
    pub fn new(
        developers: impl IntoIterator<Item = UserId>,
        permissions: Arc<dyn PermissionSource>,
    ) -> Self {
        Self {
            developers: developers.into_iter().collect(),
            permissions,
        }
    }

    /// Returns the tier of `user` in `channel`.
    pub fn tier_of(&self, user: UserId, channel: ChannelId) -> Accessibility {
        if self.developers.contains(&user) {
            Accessibility::DeveloperOnly
        } else if self.permissions.has_manage_permissions(user, channel) {
            Accessibility::AdminOnly
        } else {
            Accessibility::Public
        }
    }

    /// Whether `user` is on the developer allow-list.
    pub fn is_developer(&self, user: UserId) -> bool {
        self.developers.contains(&user)
    }
}

impl Default for AccessibilityResolver {
    fn default() -> Self {
        Self::new([], Arc::new(NoPermissions))
    }
}

impl std::fmt::Debug for AccessibilityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessibilityResolver")
            .field("developers", &self.developers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn test_tiers() {
        let resolver = AccessibilityResolver::new([1], Arc::new(|user: UserId, _: ChannelId| user == 2));

        assert_eq!(resolver.tier_of(1, 10), Accessibility::DeveloperOnly);
        assert_eq!(resolver.tier_of(2, 10), Accessibility::AdminOnly);
        assert_eq!(resolver.tier_of(3, 10), Accessibility::Public);
        assert!(resolver.is_developer(1));
    }

    #[test]
    fn test_permissions_are_not_cached() {
        let granted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&granted);
        let resolver = AccessibilityResolver::new([], Arc::new(move |_: UserId, _: ChannelId| {
            flag.load(Ordering::SeqCst)
        }));

        assert_eq!(resolver.tier_of(5, 1), Accessibility::Public);
        granted.store(true, Ordering::SeqCst);
        assert_eq!(resolver.tier_of(5, 1), Accessibility::AdminOnly);
    }
}
