//! Town settings and the partial-update rules applied to them.

use plaza_protocol::TownId;

use crate::TownError;

/// Smallest capacity a town may be created or resized to.
pub const MIN_CAPACITY: usize = 10;

/// Largest capacity a town may be created or resized to.
pub const MAX_CAPACITY: usize = 150;

/// Capacity used when none (or an out-of-range one) is given.
pub const DEFAULT_CAPACITY: usize = 50;

/// Returns `true` if `capacity` lies within `[MIN_CAPACITY, MAX_CAPACITY]`.
pub fn capacity_in_range(capacity: usize) -> bool {
    (MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity)
}

// ---------------------------------------------------------------------------
// TownConfig
// ---------------------------------------------------------------------------

/// The mutable settings of one town.
///
/// Owned by the town's controller. The update password is not part of
/// it; that capability is held by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownConfig {
    /// Display name shown in the public listing. Never empty.
    pub friendly_name: String,

    /// Whether the town appears in the public listing.
    pub is_public: bool,

    /// Maximum number of players, pending joins included.
    pub capacity: usize,
}

impl TownConfig {
    /// Builds a config, falling back to `default_capacity` when the
    /// requested capacity is absent or out of range.
    ///
    /// Never fails. Callers that want out-of-range capacities rejected
    /// must check with [`capacity_in_range`] first.
    pub fn new(
        friendly_name: impl Into<String>,
        is_public: bool,
        capacity: Option<usize>,
        default_capacity: usize,
    ) -> Self {
        Self {
            friendly_name: friendly_name.into(),
            is_public,
            capacity: capacity
                .filter(|c| capacity_in_range(*c))
                .unwrap_or(default_capacity),
        }
    }

    /// Applies a partial update.
    ///
    /// An empty name rejects the whole update and nothing changes. A
    /// capacity outside `[MIN_CAPACITY, MAX_CAPACITY]` is ignored while
    /// the other fields still apply.
    pub fn apply(&mut self, update: TownUpdate) -> Result<(), TownError> {
        if update.friendly_name.as_deref() == Some("") {
            return Err(TownError::InvalidArgument(
                "town name must not be empty".into(),
            ));
        }

        if let Some(name) = update.friendly_name {
            self.friendly_name = name;
        }
        if let Some(public) = update.is_public {
            self.is_public = public;
        }
        if let Some(capacity) = update.capacity {
            if capacity_in_range(capacity) {
                self.capacity = capacity;
            } else {
                tracing::debug!(capacity, "ignoring out-of-range capacity");
            }
        }
        Ok(())
    }
}

/// A partial change to a [`TownConfig`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TownUpdate {
    pub friendly_name: Option<String>,
    pub is_public: Option<bool>,
    pub capacity: Option<usize>,
}

// ---------------------------------------------------------------------------
// TownInfo
// ---------------------------------------------------------------------------

/// A snapshot of town metadata (not the roster).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownInfo {
    pub town_id: TownId,
    pub friendly_name: String,
    pub is_public: bool,
    /// Players currently in the town.
    pub occupancy: usize,
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TownConfig {
        TownConfig::new("lobby", true, Some(20), DEFAULT_CAPACITY)
    }

    #[test]
    fn test_new_capacity_out_of_range_uses_default() {
        assert_eq!(TownConfig::new("a", true, Some(9), 50).capacity, 50);
        assert_eq!(TownConfig::new("a", true, Some(151), 50).capacity, 50);
        assert_eq!(TownConfig::new("a", true, None, 30).capacity, 30);
        assert_eq!(TownConfig::new("a", true, Some(10), 50).capacity, 10);
        assert_eq!(TownConfig::new("a", true, Some(150), 50).capacity, 150);
    }

    #[test]
    fn test_apply_all_fields() {
        let mut c = config();
        c.apply(TownUpdate {
            friendly_name: Some("plaza".into()),
            is_public: Some(false),
            capacity: Some(100),
        })
        .unwrap();

        assert_eq!(c.friendly_name, "plaza");
        assert!(!c.is_public);
        assert_eq!(c.capacity, 100);
    }

    #[test]
    fn test_apply_empty_name_rejects_without_mutation() {
        let mut c = config();
        let result = c.apply(TownUpdate {
            friendly_name: Some(String::new()),
            is_public: Some(false),
            capacity: Some(100),
        });

        assert!(matches!(result, Err(TownError::InvalidArgument(_))));
        assert_eq!(c, config());
    }

    #[test]
    fn test_apply_out_of_range_capacity_is_ignored() {
        let mut c = config();
        c.apply(TownUpdate {
            is_public: Some(false),
            capacity: Some(5),
            ..TownUpdate::default()
        })
        .unwrap();

        assert_eq!(c.capacity, 20);
        assert!(!c.is_public);
    }

    #[test]
    fn test_apply_empty_update_is_noop() {
        let mut c = config();
        c.apply(TownUpdate::default()).unwrap();
        assert_eq!(c, config());
    }
}
