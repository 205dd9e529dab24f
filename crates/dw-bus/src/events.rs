//! # Subscription Filters and Handles
//!
//! Defines what a subscription listens for and the opaque handle used to
//! remove it.

use dw_types::{InboundEvent, NotificationCategory};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Opaque handle returned by every subscribe call.
///
/// Ids are unique across the notification registry and the scan channel, so
/// one handle type can be routed to either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub(crate) fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Category plus optional profile filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    /// Category to receive.
    pub category: NotificationCategory,
    /// Only events for this profile. `None` matches every profile.
    pub profile: Option<String>,
}

impl EventFilter {
    /// Every event of a category.
    #[must_use]
    pub fn category(category: NotificationCategory) -> Self {
        Self {
            category,
            profile: None,
        }
    }

    /// Events of a category for one profile.
    #[must_use]
    pub fn for_profile(category: NotificationCategory, profile: impl Into<String>) -> Self {
        Self {
            category,
            profile: Some(profile.into()),
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &InboundEvent) -> bool {
        if event.category() != self.category {
            return false;
        }
        match &self.profile {
            None => true,
            Some(profile) => event.profile_name() == Some(profile.as_str()),
        }
    }
}

/// Where a failed delivery came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySource {
    Notification(NotificationCategory),
    Scan,
}

impl fmt::Display for DeliverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notification(category) => write!(f, "{category}"),
            Self::Scan => f.write_str("SCAN_RESULT"),
        }
    }
}
