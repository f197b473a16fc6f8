//! Town store: creates, tracks, and tears down towns.
//!
//! The id → town map sits behind its own lock, held only long enough to
//! read or change the map. Anything that waits on a town actor does so
//! after the lock is released, so a busy town never delays lookups of
//! other towns.

use std::collections::HashMap;

use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::Mutex;
use townsquare_protocol::TownId;

use crate::{TownController, TownError, TownInfo, TownSettings, TownTeardown};

/// Length of generated town ids.
const TOWN_ID_LEN: usize = 10;

/// Length of generated update/delete passwords.
const PASSWORD_LEN: usize = 24;

/// Default command channel size for town actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

struct TownEntry {
    controller: TownController,
    password: String,
}

/// Every live town, keyed by id.
///
/// This is the entry point for town lifecycle operations from the request
/// handlers. Share it by reference (or `Arc`); every method takes `&self`.
pub struct TownStore {
    towns: Mutex<HashMap<TownId, TownEntry>>,
    channel_size: usize,
}

impl TownStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_channel_size(DEFAULT_CHANNEL_SIZE)
    }

    /// Creates an empty store whose town actors queue at most
    /// `channel_size` commands.
    pub fn with_channel_size(channel_size: usize) -> Self {
        Self {
            towns: Mutex::new(HashMap::new()),
            channel_size: channel_size.max(1),
        }
    }

    /// Creates and registers a new, empty town.
    ///
    /// Returns its controller and the update password. Never fails; name
    /// validation happens before this is called.
    pub async fn create_town(
        &self,
        friendly_name: &str,
        is_public: bool,
    ) -> (TownController, String) {
        let password = random_alphanumeric(PASSWORD_LEN);
        let mut towns = self.towns.lock().await;

        let town_id = loop {
            let candidate = TownId::new(random_alphanumeric(TOWN_ID_LEN));
            if !towns.contains_key(&candidate) {
                break candidate;
            }
        };

        let controller = TownController::spawn(
            town_id.clone(),
            TownSettings {
                friendly_name: friendly_name.to_owned(),
                is_public,
            },
            self.channel_size,
        );

        towns.insert(
            town_id.clone(),
            TownEntry {
                controller: controller.clone(),
                password: password.clone(),
            },
        );
        tracing::info!(%town_id, friendly_name, is_public, "town created");
        (controller, password)
    }

    /// Every publicly listed town, in no particular order.
    ///
    /// Towns whose actor doesn't answer (mid-deletion) are skipped.
    pub async fn list_towns(&self) -> Vec<TownInfo> {
        let controllers: Vec<TownController> = self
            .towns
            .lock()
            .await
            .values()
            .map(|e| e.controller.clone())
            .collect();

        let mut infos = Vec::with_capacity(controllers.len());
        for controller in controllers {
            if let Ok(info) = controller.info().await {
                if info.is_public {
                    infos.push(info);
                }
            }
        }
        infos
    }

    /// Returns a handle to the town, if it exists.
    pub async fn lookup(&self, town_id: &TownId) -> Option<TownController> {
        self.towns
            .lock()
            .await
            .get(town_id)
            .map(|e| e.controller.clone())
    }

    /// Changes a town's name and/or visibility.
    ///
    /// `None` leaves that setting unchanged; passing both as `None` is a
    /// successful no-op.
    ///
    /// # Errors
    /// - [`TownError::InvalidPassword`] if the town doesn't exist (or is
    ///   deleted concurrently) or the password is wrong.
    /// - [`TownError::InvalidValues`] if `friendly_name` is `Some("")`.
    pub async fn update_town(
        &self,
        town_id: &TownId,
        password: &str,
        friendly_name: Option<String>,
        is_public: Option<bool>,
    ) -> Result<TownInfo, TownError> {
        let controller = self.authorize(town_id, password).await?;
        if friendly_name.as_deref().is_some_and(str::is_empty) {
            return Err(TownError::InvalidValues);
        }
        controller
            .update_settings(friendly_name, is_public)
            .await
            .map_err(gone_as_invalid_password)
    }

    /// Deletes a town.
    ///
    /// The actor is destroyed first (listeners notified, sessions ended)
    /// and only then is the entry removed, so a handle obtained earlier
    /// sees [`TownError::Unavailable`] rather than a half-deleted town.
    ///
    /// # Errors
    /// [`TownError::InvalidPassword`] under the same conditions as
    /// [`update_town`](Self::update_town). Of two concurrent deletes, the
    /// one that loses the race gets it too.
    pub async fn delete_town(
        &self,
        town_id: &TownId,
        password: &str,
    ) -> Result<TownTeardown, TownError> {
        let controller = self.authorize(town_id, password).await?;
        let teardown = match controller.destroy().await {
            Ok(teardown) => Some(teardown),
            Err(TownError::Unavailable(_)) => None,
            Err(e) => return Err(e),
        };

        let mut towns = self.towns.lock().await;
        if towns
            .get(town_id)
            .is_some_and(|e| e.controller.same_town(&controller))
        {
            towns.remove(town_id);
        }
        drop(towns);

        // Already stopped: someone else finished the deletion.
        let teardown = teardown.ok_or(TownError::InvalidPassword)?;
        tracing::info!(%town_id, "town deleted");
        Ok(teardown)
    }

    /// Drops a town without a password check.
    ///
    /// Used to roll back a creation whose provider channel couldn't be
    /// provisioned.
    pub async fn unregister(&self, town_id: &TownId) -> Option<TownTeardown> {
        let entry = self.towns.lock().await.remove(town_id)?;
        tracing::info!(%town_id, "town unregistered");
        entry.controller.destroy().await.ok()
    }

    /// Number of live towns, public or not.
    pub async fn len(&self) -> usize {
        self.towns.lock().await.len()
    }

    /// Returns `true` if there are no towns.
    pub async fn is_empty(&self) -> bool {
        self.towns.lock().await.is_empty()
    }

    /// Checks the password and clones the town's handle out of the map.
    async fn authorize(
        &self,
        town_id: &TownId,
        password: &str,
    ) -> Result<TownController, TownError> {
        match self.towns.lock().await.get(town_id) {
            Some(entry) if entry.password == password => Ok(entry.controller.clone()),
            _ => {
                tracing::debug!(%town_id, "town password check failed");
                Err(TownError::InvalidPassword)
            }
        }
    }
}

impl Default for TownStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A town that stopped between the password check and the call no
/// longer exists, which callers can't tell apart from a bad password.
fn gone_as_invalid_password(e: TownError) -> TownError {
    match e {
        TownError::Unavailable(_) => TownError::InvalidPassword,
        other => other,
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
