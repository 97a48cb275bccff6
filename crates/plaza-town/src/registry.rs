//! Town registry: creates, tracks, and destroys towns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use plaza_protocol::{DisconnectReason, TownId};
use plaza_session::generate_token;
use tokio::sync::RwLock;

use crate::controller::spawn_town;
use crate::{DEFAULT_CAPACITY, TownConfig, TownError, TownHandle, TownInfo, TownUpdate};

/// Counter for generating unique town ids.
static NEXT_TOWN_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for town actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

struct TownEntry {
    handle: TownHandle,
    /// Capability to update or delete the town.
    update_password: String,
}

/// What the creator of a town gets back.
#[derive(Clone)]
pub struct CreatedTown {
    pub handle: TownHandle,
    /// Shown once to the creator; never listed again.
    pub update_password: String,
}

/// The process-wide directory of live towns.
///
/// Construct one at startup and share it (behind an `Arc`) with every
/// request handler. Tests build a fresh registry each, or call
/// [`reset`](Self::reset).
///
/// The map lock is only ever held to look up, insert, or remove an entry.
/// Anything that needs a town actor clones its handle, releases the
/// lock, and then awaits.
pub struct TownRegistry {
    towns: RwLock<HashMap<TownId, TownEntry>>,

    /// Operator override accepted in place of any town's password.
    /// `None` (or empty) disables it.
    master_password: Option<String>,

    default_capacity: usize,
}

impl TownRegistry {
    /// Creates an empty registry.
    pub fn new(master_password: Option<String>) -> Self {
        Self {
            towns: RwLock::new(HashMap::new()),
            master_password: master_password.filter(|p| !p.is_empty()),
            default_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Capacity used for towns created without one (or with an
    /// out-of-range one).
    pub fn with_default_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = capacity;
        self
    }

    /// Creates and starts a new town.
    ///
    /// Never fails. A missing or out-of-range capacity falls back to the
    /// default; rejecting bad input is the caller's job.
    pub async fn create_town(
        &self,
        friendly_name: impl Into<String>,
        is_public: bool,
        capacity: Option<usize>,
    ) -> CreatedTown {
        let town_id = TownId(NEXT_TOWN_ID.fetch_add(1, Ordering::Relaxed));
        let config = TownConfig::new(friendly_name, is_public, capacity, self.default_capacity);
        tracing::info!(
            %town_id,
            name = %config.friendly_name,
            public = is_public,
            capacity = config.capacity,
            "town created"
        );

        let handle = spawn_town(town_id, config, DEFAULT_CHANNEL_SIZE);
        let update_password = generate_token();
        self.towns.write().await.insert(
            town_id,
            TownEntry {
                handle: handle.clone(),
                update_password: update_password.clone(),
            },
        );

        CreatedTown {
            handle,
            update_password,
        }
    }

    /// Looks up a town's controller.
    pub async fn get(&self, town_id: TownId) -> Option<TownHandle> {
        self.towns
            .read()
            .await
            .get(&town_id)
            .map(|entry| entry.handle.clone())
    }

    /// Returns the town's handle if `password` unlocks it.
    ///
    /// # Errors
    /// - [`TownError::NotFound`] for an unknown town
    /// - [`TownError::Forbidden`] for a wrong password
    pub async fn authorize(
        &self,
        town_id: TownId,
        password: &str,
    ) -> Result<TownHandle, TownError> {
        let towns = self.towns.read().await;
        let entry = towns.get(&town_id).ok_or(TownError::NotFound(town_id))?;
        if !self.password_matches(&entry.update_password, password) {
            tracing::warn!(%town_id, "wrong town password");
            return Err(TownError::Forbidden(town_id));
        }
        Ok(entry.handle.clone())
    }

    /// Lists public towns. Towns that fail to answer (shutting down) are
    /// skipped.
    pub async fn list_public_towns(&self) -> Vec<TownInfo> {
        let handles: Vec<TownHandle> = self
            .towns
            .read()
            .await
            .values()
            .map(|entry| entry.handle.clone())
            .collect();

        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(info) = handle.info().await {
                if info.is_public {
                    infos.push(info);
                }
            }
        }
        infos.sort_by_key(|info| info.town_id.0);
        infos
    }

    /// Password-gated settings change.
    ///
    /// # Errors
    /// - [`TownError::NotFound`] / [`TownError::Forbidden`] from the gate
    /// - [`TownError::InvalidArgument`] for an empty name (nothing changes)
    pub async fn update_town(
        &self,
        town_id: TownId,
        password: &str,
        update: TownUpdate,
    ) -> Result<TownInfo, TownError> {
        let handle = self.authorize(town_id, password).await?;
        handle.set_config(update).await
    }

    /// Password-gated deletion. Every session is told the town is gone
    /// before the town disappears.
    pub async fn delete_town(&self, town_id: TownId, password: &str) -> Result<(), TownError> {
        let entry = {
            let mut towns = self.towns.write().await;
            let entry = towns.get(&town_id).ok_or(TownError::NotFound(town_id))?;
            if !self.password_matches(&entry.update_password, password) {
                tracing::warn!(%town_id, "wrong town password on delete");
                return Err(TownError::Forbidden(town_id));
            }
            towns.remove(&town_id).ok_or(TownError::NotFound(town_id))?
        };

        // Already stopped is fine; it is gone either way.
        let _ = entry
            .handle
            .shutdown(DisconnectReason::TownDestroyed)
            .await;

        tracing::info!(%town_id, "town deleted");
        Ok(())
    }

    /// Number of live towns.
    pub async fn len(&self) -> usize {
        self.towns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.towns.read().await.is_empty()
    }

    /// Shuts down and forgets every town, telling every session the
    /// town is gone.
    pub async fn reset(&self) {
        let entries: Vec<TownEntry> = self.towns.write().await.drain().map(|(_, e)| e).collect();
        for entry in entries {
            let _ = entry
                .handle
                .shutdown(DisconnectReason::TownDestroyed)
                .await;
        }
    }

    /// Exact match, or the operator override.
    ///
    /// The master password is an intentional backdoor for operators: it
    /// unlocks every town.
    fn password_matches(&self, expected: &str, given: &str) -> bool {
        given == expected || self.master_password.as_deref() == Some(given)
    }
}

impl Default for TownRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}
