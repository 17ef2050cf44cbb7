//! Named playlists over catalog item ids, plus the implicit Default playlist.

use std::{collections::BTreeSet, sync::Arc};

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::{
    catalog::Catalog,
    error::PlaylistError,
    storage::{KeyValueStore, PersistenceWriter},
};

pub const DEFAULT_PLAYLIST_NAME: &str = "Default Playlist";

/// A user playlist. Membership is a set, so an item can sit in several playlists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub name: String,
    pub member_ids: BTreeSet<String>,
}

impl Playlist {
    fn new(name: String) -> Self {
        Self {
            name,
            member_ids: BTreeSet::new(),
        }
    }
}

/// The active playlist as seen by playback: which catalog items are eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistScope {
    pub name: String,
    /// `None` means every catalog item (the Default playlist).
    pub members: Option<Arc<BTreeSet<String>>>,
}

impl PlaylistScope {
    pub fn all() -> Self {
        Self {
            name: DEFAULT_PLAYLIST_NAME.to_string(),
            members: None,
        }
    }

    pub fn includes(&self, item_id: &str) -> bool {
        match &self.members {
            Some(members) => members.contains(item_id),
            None => true,
        }
    }

    /// Catalog ids eligible for next/previous/shuffle, in catalog order.
    pub fn scoped_ids(&self, catalog: &Catalog) -> Vec<String> {
        catalog
            .ids()
            .filter(|id| self.includes(id))
            .map(str::to_string)
            .collect()
    }
}

impl Default for PlaylistScope {
    fn default() -> Self {
        Self::all()
    }
}

fn normalize_name(name: &str) -> Result<String, PlaylistError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PlaylistError::InvalidName);
    }
    Ok(trimmed.to_string())
}

fn is_default(name: &str) -> bool {
    name.trim() == DEFAULT_PLAYLIST_NAME
}

/// Owns the playlists of one media kind and persists them on every mutation.
pub struct PlaylistStore {
    storage_key: String,
    playlists: Vec<Playlist>,
    active: String,
    persistence: Option<PersistenceWriter>,
}

impl PlaylistStore {
    /// Store holding only the Default playlist, without persistence.
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            playlists: Vec::new(),
            active: DEFAULT_PLAYLIST_NAME.to_string(),
            persistence: None,
        }
    }

    /// Loads saved playlists. Absent, unreadable or corrupt data yields Default only.
    pub fn restore(
        storage: &dyn KeyValueStore,
        storage_key: impl Into<String>,
        persistence: Option<PersistenceWriter>,
    ) -> Self {
        let mut store = Self::new(storage_key);
        store.persistence = persistence;

        let payload = match storage.get(&store.storage_key) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("No saved playlists under key={}", store.storage_key);
                return store;
            }
            Err(err) => {
                warn!(
                    "Failed to read playlists key={}: {}. Starting with Default only",
                    store.storage_key, err
                );
                return store;
            }
        };

        match parse_saved_playlists(&payload) {
            Some(playlists) => {
                for playlist in playlists {
                    if is_default(&playlist.name) || store.find(&playlist.name).is_some() {
                        warn!("Skipping duplicate saved playlist '{}'", playlist.name);
                        continue;
                    }
                    store.playlists.push(playlist);
                }
                info!(
                    "Restored {} playlists from key={}",
                    store.playlists.len(),
                    store.storage_key
                );
            }
            None => {
                warn!(
                    "Saved playlists under key={} are corrupt. Starting with Default only",
                    store.storage_key
                );
            }
        }
        store
    }

    fn find(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.playlists
            .iter()
            .position(|playlist| playlist.name == name)
    }

    fn find_user_playlist(&self, name: &str) -> Result<usize, PlaylistError> {
        self.find(name)
            .ok_or_else(|| PlaylistError::NotFound(name.trim().to_string()))
    }

    pub fn create(&mut self, name: &str) -> Result<&Playlist, PlaylistError> {
        let name = normalize_name(name)?;
        if is_default(&name) || self.find(&name).is_some() {
            return Err(PlaylistError::DuplicateName(name));
        }
        debug!("Creating playlist '{}'", name);
        self.playlists.push(Playlist::new(name));
        self.persist();
        let index = self.playlists.len() - 1;
        Ok(&self.playlists[index])
    }

    pub fn delete(&mut self, name: &str) -> Result<(), PlaylistError> {
        if is_default(name) {
            return Err(PlaylistError::ProtectedPlaylist(DEFAULT_PLAYLIST_NAME.to_string()));
        }
        let index = self.find_user_playlist(name)?;
        let removed = self.playlists.remove(index);
        if self.active == removed.name {
            debug!("Deleted active playlist '{}', falling back to Default", removed.name);
            self.active = DEFAULT_PLAYLIST_NAME.to_string();
        }
        self.persist();
        Ok(())
    }

    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<(), PlaylistError> {
        if is_default(name) {
            return Err(PlaylistError::ProtectedPlaylist(DEFAULT_PLAYLIST_NAME.to_string()));
        }
        let new_name = normalize_name(new_name)?;
        let index = self.find_user_playlist(name)?;
        if self.playlists[index].name == new_name {
            return Ok(());
        }
        if is_default(&new_name) || self.find(&new_name).is_some() {
            return Err(PlaylistError::DuplicateName(new_name));
        }
        if self.active == self.playlists[index].name {
            self.active = new_name.clone();
        }
        self.playlists[index].name = new_name;
        self.persist();
        Ok(())
    }

    /// Idempotent. Adding to Default is accepted and changes nothing, since
    /// Default always contains the whole catalog.
    pub fn add_member(&mut self, playlist: &str, item_id: &str) -> Result<(), PlaylistError> {
        if is_default(playlist) {
            return Ok(());
        }
        let index = self.find_user_playlist(playlist)?;
        if self.playlists[index].member_ids.insert(item_id.to_string()) {
            self.persist();
        }
        Ok(())
    }

    pub fn remove_member(&mut self, playlist: &str, item_id: &str) -> Result<(), PlaylistError> {
        if is_default(playlist) {
            return Err(PlaylistError::ProtectedPlaylist(DEFAULT_PLAYLIST_NAME.to_string()));
        }
        let index = self.find_user_playlist(playlist)?;
        if self.playlists[index].member_ids.remove(item_id) {
            self.persist();
        }
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<(), PlaylistError> {
        if is_default(name) {
            self.active = DEFAULT_PLAYLIST_NAME.to_string();
            return Ok(());
        }
        let index = self.find_user_playlist(name)?;
        self.active = self.playlists[index].name.clone();
        Ok(())
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    /// Playlist names, Default first, then creation order.
    pub fn list(&self) -> Vec<String> {
        std::iter::once(DEFAULT_PLAYLIST_NAME.to_string())
            .chain(self.playlists.iter().map(|playlist| playlist.name.clone()))
            .collect()
    }

    pub fn playlist(&self, name: &str) -> Option<&Playlist> {
        self.find(name).map(|index| &self.playlists[index])
    }

    /// Members of `name` that exist in `catalog`, in catalog order.
    pub fn members(&self, name: &str, catalog: &Catalog) -> Result<Vec<String>, PlaylistError> {
        Ok(self.scope_of(name)?.scoped_ids(catalog))
    }

    fn scope_of(&self, name: &str) -> Result<PlaylistScope, PlaylistError> {
        if is_default(name) {
            return Ok(PlaylistScope::all());
        }
        let index = self.find_user_playlist(name)?;
        let playlist = &self.playlists[index];
        Ok(PlaylistScope {
            name: playlist.name.clone(),
            members: Some(Arc::new(playlist.member_ids.clone())),
        })
    }

    pub fn scope(&self) -> PlaylistScope {
        self.scope_of(&self.active)
            .unwrap_or_else(|_| PlaylistScope::all())
    }

    /// JSON object of playlist name to member ids. Default is derived and never saved.
    pub fn serialize(&self) -> String {
        let mut map = Map::new();
        for playlist in &self.playlists {
            let members = playlist
                .member_ids
                .iter()
                .map(|id| Value::String(id.clone()))
                .collect();
            map.insert(playlist.name.clone(), Value::Array(members));
        }
        Value::Object(map).to_string()
    }

    fn persist(&self) {
        if let Some(writer) = &self.persistence {
            writer.schedule(self.storage_key.clone(), self.serialize());
        }
    }
}

/// Accepts the current object format and the older array-of-names format.
fn parse_saved_playlists(payload: &str) -> Option<Vec<Playlist>> {
    let value: Value = serde_json::from_str(payload).ok()?;
    let mut playlists = Vec::new();
    match value {
        Value::Object(entries) => {
            for (name, members) in entries {
                let Ok(name) = normalize_name(&name) else {
                    continue;
                };
                let mut playlist = Playlist::new(name);
                if let Value::Array(ids) = members {
                    playlist.member_ids = ids
                        .into_iter()
                        .filter_map(|id| id.as_str().map(str::to_string))
                        .collect();
                }
                playlists.push(playlist);
            }
        }
        Value::Array(names) => {
            for name in names {
                if let Some(Ok(name)) = name.as_str().map(normalize_name) {
                    playlists.push(Playlist::new(name));
                }
            }
        }
        _ => return None,
    }
    Some(playlists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{merge, MediaItem, MediaKind},
        storage::SqliteKeyValueStore,
    };

    fn catalog(ids: &[&str]) -> Catalog {
        let items = ids
            .iter()
            .map(|id| MediaItem {
                id: id.to_string(),
                title: id.to_string(),
                uri: format!("https://cdn.example.com/{id}"),
                duration_secs: None,
            })
            .collect();
        merge(MediaKind::Audio, items, Vec::new())
    }

    #[test]
    fn test_default_playlist_is_protected() {
        let mut store = PlaylistStore::new("playlists");
        assert_eq!(
            store.delete(DEFAULT_PLAYLIST_NAME),
            Err(PlaylistError::ProtectedPlaylist(DEFAULT_PLAYLIST_NAME.to_string()))
        );
        assert_eq!(
            store.remove_member(DEFAULT_PLAYLIST_NAME, "a"),
            Err(PlaylistError::ProtectedPlaylist(DEFAULT_PLAYLIST_NAME.to_string()))
        );
        assert!(matches!(
            store.rename(DEFAULT_PLAYLIST_NAME, "Main"),
            Err(PlaylistError::ProtectedPlaylist(_))
        ));
    }

    #[test]
    fn test_create_rejects_blank_and_duplicate_names() {
        let mut store = PlaylistStore::new("playlists");
        assert_eq!(store.create("").unwrap_err(), PlaylistError::InvalidName);
        assert_eq!(store.create("   ").unwrap_err(), PlaylistError::InvalidName);

        store.create("Rock").expect("first create");
        assert_eq!(
            store.create("Rock").unwrap_err(),
            PlaylistError::DuplicateName("Rock".to_string())
        );
        assert_eq!(
            store.create("  Rock ").unwrap_err(),
            PlaylistError::DuplicateName("Rock".to_string())
        );
        store.create("rock").expect("names are case-sensitive");
        assert!(matches!(
            store.create(DEFAULT_PLAYLIST_NAME),
            Err(PlaylistError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_create_trims_and_starts_empty() {
        let mut store = PlaylistStore::new("playlists");
        let created = store.create("  Chill  ").expect("create").clone();
        assert_eq!(created.name, "Chill");
        assert!(created.member_ids.is_empty());
        assert_eq!(store.list(), vec![DEFAULT_PLAYLIST_NAME, "Chill"]);
    }

    #[test]
    fn test_deleting_active_playlist_falls_back_to_default() {
        let mut store = PlaylistStore::new("playlists");
        store.create("Rock").expect("create");
        store.create("Jazz").expect("create");
        store.set_active("Rock").expect("activate");

        store.delete("Jazz").expect("delete inactive");
        assert_eq!(store.active(), "Rock");

        store.delete("Rock").expect("delete active");
        assert_eq!(store.active(), DEFAULT_PLAYLIST_NAME);
        assert_eq!(
            store.delete("Rock"),
            Err(PlaylistError::NotFound("Rock".to_string()))
        );
    }

    #[test]
    fn test_membership_is_a_set_and_scopes_follow_catalog_order() {
        let mut store = PlaylistStore::new("playlists");
        store.create("Rock").expect("create");
        store.create("Mix").expect("create");
        store.add_member("Rock", "c").expect("add");
        store.add_member("Rock", "a").expect("add");
        store.add_member("Rock", "a").expect("add again");
        store.add_member("Mix", "a").expect("same item, second playlist");

        let catalog = catalog(&["a", "b", "c"]);
        assert_eq!(store.members("Rock", &catalog).expect("members"), vec!["a", "c"]);
        assert_eq!(store.members("Mix", &catalog).expect("members"), vec!["a"]);
        assert_eq!(
            store.members(DEFAULT_PLAYLIST_NAME, &catalog).expect("members"),
            vec!["a", "b", "c"]
        );

        store.remove_member("Rock", "a").expect("remove");
        assert_eq!(store.members("Rock", &catalog).expect("members"), vec!["c"]);
        assert_eq!(
            store.add_member("Missing", "a"),
            Err(PlaylistError::NotFound("Missing".to_string()))
        );
    }

    #[test]
    fn test_scope_tracks_active_playlist() {
        let mut store = PlaylistStore::new("playlists");
        assert!(store.scope().members.is_none());

        store.create("Rock").expect("create");
        store.add_member("Rock", "b").expect("add");
        store.set_active("Rock").expect("activate");

        let scope = store.scope();
        assert_eq!(scope.name, "Rock");
        assert_eq!(scope.scoped_ids(&catalog(&["a", "b"])), vec!["b"]);
        assert_eq!(
            store.set_active("Nope"),
            Err(PlaylistError::NotFound("Nope".to_string()))
        );
    }

    #[test]
    fn test_rename_keeps_members_and_active_selection() {
        let mut store = PlaylistStore::new("playlists");
        store.create("Rock").expect("create");
        store.create("Jazz").expect("create");
        store.add_member("Rock", "x").expect("add");
        store.set_active("Rock").expect("activate");

        assert!(matches!(
            store.rename("Rock", "Jazz"),
            Err(PlaylistError::DuplicateName(_))
        ));
        assert_eq!(store.rename("Rock", " "), Err(PlaylistError::InvalidName));

        store.rename("Rock", "Classic Rock").expect("rename");
        assert_eq!(store.active(), "Classic Rock");
        assert!(store
            .playlist("Classic Rock")
            .expect("renamed")
            .member_ids
            .contains("x"));
    }

    #[test]
    fn test_mutations_persist_and_restore_without_default() {
        let storage = Arc::new(SqliteKeyValueStore::new_in_memory().expect("storage"));
        let writer = PersistenceWriter::spawn(storage.clone());
        {
            let mut store = PlaylistStore::restore(storage.as_ref(), "playlists", Some(writer.clone()));
            store.create("Rock").expect("create");
            store.create("Jazz").expect("create");
            store.add_member("Rock", "song1").expect("add");
            store.add_member("Rock", "local-9").expect("add");
        }
        writer.flush();

        let saved = storage.get("playlists").expect("get").expect("saved payload");
        assert_eq!(saved, r#"{"Rock":["local-9","song1"],"Jazz":[]}"#);

        let restored = PlaylistStore::restore(storage.as_ref(), "playlists", None);
        assert_eq!(restored.list(), vec![DEFAULT_PLAYLIST_NAME, "Rock", "Jazz"]);
        assert_eq!(restored.active(), DEFAULT_PLAYLIST_NAME);
        assert_eq!(
            restored.playlist("Rock").expect("rock").member_ids.len(),
            2
        );
    }

    #[test]
    fn test_restore_falls_back_to_default_on_corrupt_data() {
        let storage = SqliteKeyValueStore::new_in_memory().expect("storage");
        storage.set("playlists", "{not json").expect("set");
        let store = PlaylistStore::restore(&storage, "playlists", None);
        assert_eq!(store.list(), vec![DEFAULT_PLAYLIST_NAME]);

        storage.set("playlists", "42").expect("set");
        let store = PlaylistStore::restore(&storage, "playlists", None);
        assert_eq!(store.list(), vec![DEFAULT_PLAYLIST_NAME]);
    }

    #[test]
    fn test_restore_accepts_legacy_name_list() {
        let storage = SqliteKeyValueStore::new_in_memory().expect("storage");
        storage
            .set("video_playlists", r#"["Trips", " ", "Trips", "Default Playlist", "Kids"]"#)
            .expect("set");
        let store = PlaylistStore::restore(&storage, "video_playlists", None);
        assert_eq!(store.list(), vec![DEFAULT_PLAYLIST_NAME, "Trips", "Kids"]);
        assert!(store.playlist("Trips").expect("trips").member_ids.is_empty());
    }
}
