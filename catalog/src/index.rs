//! The two persisted snapshots: the replay index and the username cache.
//!
//! Both are rewritten in full on every change. Loading is forgiving, in that a
//! missing or unreadable snapshot is logged and treated as empty; the catalog
//! will rebuild what it can on the next scan.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;

use awbw_integrations::Log;
use awbw_replay::{ReplayData, ReplayInfo};

use crate::{ReplayStorage, StorageError};

/// File name of the replay index snapshot.
pub const REPLAY_INDEX_FILE: &str = "ReplayStorage.json";

/// File name of the username cache snapshot.
pub const USERNAME_CACHE_FILE: &str = "UsernameStorage.json";

fn load_snapshot<T: DeserializeOwned + Default>(storage: &dyn ReplayStorage, name: &str) -> T {
    if !storage.exists(name) {
        tracing::info!(target: Log::Catalog, ?name, "No snapshot found, starting empty");
        return T::default();
    }

    match storage.read(name) {
        Ok(contents) => match serde_json::from_slice(&contents) {
            Ok(parsed) => parsed,

            Err(error) => {
                tracing::error!(target: Log::Catalog, ?error, ?name, "Unable to parse snapshot");
                T::default()
            },
        },

        Err(error) => {
            tracing::error!(target: Log::Catalog, ?error, ?name, "Unable to read snapshot");
            T::default()
        },
    }
}

fn write_snapshot<T: Serialize>(storage: &dyn ReplayStorage, name: &str, value: &T) -> Result<(), StorageError> {
    let contents = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Serialize {
        name: name.to_string(),
        source,
    })?;

    storage.write(name, &contents)
}

/// Every replay the catalog knows about, keyed by replay id.
#[derive(Clone, Debug, Default)]
pub struct KnownReplays(Arc<Mutex<BTreeMap<i64, ReplayInfo>>>);

impl KnownReplays {
    pub fn load(storage: &dyn ReplayStorage) -> Self {
        let replays: BTreeMap<i64, ReplayInfo> = load_snapshot(storage, REPLAY_INDEX_FILE);
        tracing::info!(target: Log::Catalog, count = replays.len(), "Loaded replay index");

        Self(Arc::new(Mutex::new(replays)))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BTreeMap<i64, ReplayInfo>> {
        self.0.lock().expect("Unable to lock replay index")
    }

    pub fn get(&self, id: i64) -> Option<ReplayInfo> {
        self.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.lock().contains_key(&id)
    }

    /// All entries, ordered by replay id.
    pub fn all(&self) -> Vec<ReplayInfo> {
        self.lock().values().cloned().collect()
    }

    /// Inserts or replaces an entry. Returns `true` if it replaced one.
    pub fn upsert(&self, info: ReplayInfo) -> bool {
        self.lock().insert(info.id, info).is_some()
    }

    /// Copies the usernames known in `resolved` into the current entry for the
    /// same replay, filling gaps only. Everything else in the entry is left as
    /// is, since the replay may have been ingested again in the meantime.
    ///
    /// Returns the merged entry if any name was filled, and `None` if the entry
    /// is gone or had nothing left to fill.
    pub fn merge_usernames(&self, resolved: &ReplayInfo) -> Option<ReplayInfo> {
        let mut replays = self.lock();
        let entry = replays.get_mut(&resolved.id)?;
        let mut filled = 0;

        for player in entry.players.values_mut().filter(|player| player.username.is_none()) {
            let name = resolved
                .players
                .values()
                .find(|known| known.user_id == player.user_id)
                .and_then(|known| known.username.clone());

            if name.is_some() {
                player.username = name;
                filled += 1;
            }
        }

        match filled {
            0 => None,
            _ => Some(entry.clone()),
        }
    }

    pub fn remove(&self, id: i64) -> Option<ReplayInfo> {
        self.lock().remove(&id)
    }

    pub fn save(&self, storage: &dyn ReplayStorage) -> Result<(), StorageError> {
        let replays = self.lock();
        write_snapshot(storage, REPLAY_INDEX_FILE, &*replays)
    }
}

/// Site user id → display name.
#[derive(Clone, Debug, Default)]
pub struct UsernameCache(Arc<Mutex<BTreeMap<i64, String>>>);

impl UsernameCache {
    pub fn load(storage: &dyn ReplayStorage) -> Self {
        let names: BTreeMap<i64, String> = load_snapshot(storage, USERNAME_CACHE_FILE);
        tracing::info!(target: Log::Catalog, count = names.len(), "Loaded username cache");

        Self(Arc::new(Mutex::new(names)))
    }

    pub fn get(&self, user_id: i64) -> Option<String> {
        let names = self.0.lock().expect("Unable to lock username cache");
        names.get(&user_id).cloned()
    }

    /// Records a name. An existing entry is kept unless `overwrite` is set.
    pub fn insert(&self, user_id: i64, username: String, overwrite: bool) {
        let mut names = self.0.lock().expect("Unable to lock username cache");

        if overwrite || !names.contains_key(&user_id) {
            names.insert(user_id, username);
        }
    }

    pub fn len(&self) -> usize {
        let names = self.0.lock().expect("Unable to lock username cache");
        names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills every unresolved player in `info` that the cache knows, and returns
    /// how many were filled.
    pub fn fill(&self, info: &mut ReplayInfo) -> usize {
        let names = self.0.lock().expect("Unable to lock username cache");
        let mut filled = 0;

        for player in info.players.values_mut() {
            if player.username.is_some() {
                continue;
            }

            if let Some(name) = names.get(&player.user_id) {
                player.username = Some(name.clone());
                filled += 1;
            }
        }

        filled
    }

    /// `fill` for a whole decoded replay.
    pub fn fill_replay(&self, data: &mut ReplayData) -> usize {
        self.fill(&mut data.info)
    }

    pub fn save(&self, storage: &dyn ReplayStorage) -> Result<(), StorageError> {
        let names = self.0.lock().expect("Unable to lock username cache");
        write_snapshot(storage, USERNAME_CACHE_FILE, &*names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    #[test]
    fn snapshots_roundtrip_through_storage() {
        let storage = MemoryStorage::new();

        let usernames = UsernameCache::default();
        usernames.insert(77, "Hellraider".into(), false);
        usernames.insert(77, "Impostor".into(), false);
        usernames.save(&storage).unwrap();

        let reloaded = UsernameCache::load(&storage);
        assert_eq!(reloaded.get(77).as_deref(), Some("Hellraider"));
        assert_eq!(reloaded.len(), 1);

        let contents = String::from_utf8(storage.read(USERNAME_CACHE_FILE).unwrap()).unwrap();
        assert!(contents.contains("\"77\""));
    }

    fn summary(name: &str, turn_count: usize, usernames: [Option<&str>; 2]) -> ReplayInfo {
        serde_json::from_value(serde_json::json!({
            "id": 42,
            "name": name,
            "startDate": "2023-01-01 00:00:00",
            "players": {
                "1001": {"id": 1001, "userId": 77, "username": usernames[0], "team": "1001"},
                "1002": {"id": 1002, "userId": 78, "username": usernames[1], "team": "1002"}
            },
            "turnCount": turn_count
        }))
        .unwrap()
    }

    #[test]
    fn merging_usernames_keeps_the_current_entry() {
        let replays = KnownReplays::default();
        replays.upsert(summary("Match 42 (day 5)", 5, [Some("Hellraider"), None]));

        // An older copy of the entry that enrichment worked on.
        let resolved = summary("Match 42", 1, [Some("Hellraider"), Some("Grit")]);

        let merged = replays.merge_usernames(&resolved).unwrap();
        assert_eq!(merged.name, "Match 42 (day 5)");
        assert_eq!(merged.turn_count, 5);
        assert_eq!(merged.players[&1002].username.as_deref(), Some("Grit"));
        assert_eq!(replays.get(42), Some(merged));

        // Nothing left to fill.
        assert_eq!(replays.merge_usernames(&resolved), None);

        replays.remove(42);
        assert_eq!(replays.merge_usernames(&resolved), None);
    }

    #[test]
    fn corrupt_snapshot_loads_empty() {
        let storage = MemoryStorage::new();
        storage.write(REPLAY_INDEX_FILE, b"{ not json").unwrap();

        assert!(KnownReplays::load(&storage).all().is_empty());
    }
}
