/// Durable store abstraction and the typed record layer on top of it.
///
/// The extension storage area only holds string values, is asynchronous, and
/// is eventually consistent across the three extension contexts. Everything
/// above this module works with `VideoRecord` / `UserSettings`; this module
/// owns the JSON encoding and the two storage invariants: an emptied record
/// is deleted rather than kept, and the settings singleton never shows up in
/// video enumeration.
use std::cell::RefCell;
use std::collections::HashMap;

use crate::bookmark_data::{UserSettings, VideoRecord};
use crate::error::Error;

/// Reserved key for the `UserSettings` singleton. Video ids come from URLs
/// and can never collide with it.
pub const SETTINGS_KEY: &str = "user-settings";

/// Narrow interface over the extension's key-value storage area, so the
/// coordination logic is testable without a browser. Values are the JSON
/// strings this module produces.
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;
    async fn get_all(&self) -> Result<HashMap<String, String>, Error>;
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;
    async fn remove(&self, key: &str) -> Result<(), Error>;
    async fn clear(&self) -> Result<(), Error>;
}

/// Typed video-record and settings access over any `KeyValueStore`.
pub struct BookmarkStore<S> {
    store: S,
}

impl<S: KeyValueStore> BookmarkStore<S> {
    pub fn new(store: S) -> BookmarkStore<S> {
        BookmarkStore { store }
    }

    /// Load the record for one video, `None` if the video has no bookmarks.
    pub async fn load_record(&self, video_id: &str) -> Result<Option<VideoRecord>, Error> {
        match self.store.get(video_id).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| Error::store(format!("malformed record for {}: {}", video_id, e))),
            None => Ok(None),
        }
    }

    /// Persist a record, or delete it if its bookmark sequence is empty.
    /// Empty records must never exist in storage.
    pub async fn save_record(&self, video_id: &str, record: &VideoRecord) -> Result<(), Error> {
        if record.bookmarks.is_empty() {
            return self.delete_record(video_id).await;
        }

        let raw = serde_json::to_string(record).map_err(Error::store)?;
        self.store.set(video_id, &raw).await
    }

    pub async fn delete_record(&self, video_id: &str) -> Result<(), Error> {
        self.store.remove(video_id).await
    }

    /// Enumerate every stored video record, skipping the settings singleton.
    /// Malformed entries are logged and skipped rather than failing the whole
    /// browse view.
    pub async fn all_records(&self) -> Result<Vec<(String, VideoRecord)>, Error> {
        let mut records = Vec::new();

        for (key, raw) in self.store.get_all().await? {
            if key == SETTINGS_KEY {
                continue;
            }

            match serde_json::from_str::<VideoRecord>(&raw) {
                Ok(record) => records.push((key, record)),
                Err(e) => log::warn!("skipping malformed record under key {}: {}", key, e),
            }
        }

        Ok(records)
    }

    /// Load the settings singleton, writing defaults on first access so every
    /// later reader sees the same record.
    pub async fn settings(&self) -> Result<UserSettings, Error> {
        if let Some(raw) = self.store.get(SETTINGS_KEY).await? {
            return serde_json::from_str(&raw)
                .map_err(|e| Error::store(format!("malformed settings: {}", e)));
        }

        let defaults = UserSettings::default();
        self.save_settings(&defaults).await?;
        Ok(defaults)
    }

    pub async fn save_settings(&self, settings: &UserSettings) -> Result<(), Error> {
        let raw = serde_json::to_string(settings).map_err(Error::store)?;
        self.store.set(SETTINGS_KEY, &raw).await
    }
}

/// HashMap-backed store used by the unit tests in place of the browser's
/// storage area.
#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    async fn get_all(&self) -> Result<HashMap<String, String>, Error> {
        Ok(self.entries.borrow().clone())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.entries.borrow_mut().clear();
        Ok(())
    }
}

impl<S: KeyValueStore> KeyValueStore for std::rc::Rc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key).await
    }

    async fn get_all(&self) -> Result<HashMap<String, String>, Error> {
        (**self).get_all().await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> Result<(), Error> {
        (**self).clear().await
    }
}

impl<S: KeyValueStore> KeyValueStore for &S {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key).await
    }

    async fn get_all(&self) -> Result<HashMap<String, String>, Error> {
        (**self).get_all().await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> Result<(), Error> {
        (**self).clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmark_data::{Bookmark, SortBy, VideoType};
    use futures::executor::block_on;

    fn record(times: &[f64]) -> VideoRecord {
        VideoRecord {
            bookmarks: times.iter().map(|t| Bookmark::at(*t)).collect(),
            title: "Test video".to_string(),
            thumbnail_image_src: "https://example.com/thumb.jpg".to_string(),
            video_type: VideoType::Watch,
            updated_at: 1698508200000.0,
        }
    }

    #[test]
    fn test_record_round_trip() {
        let store = BookmarkStore::new(MemoryStore::new());

        block_on(async {
            store.save_record("vid-1", &record(&[10.0, 40.0])).await.unwrap();

            let loaded = store.load_record("vid-1").await.unwrap().unwrap();
            assert_eq!(loaded.bookmarks.len(), 2);
            assert_eq!(loaded.title, "Test video");

            assert!(store.load_record("missing").await.unwrap().is_none());
        });
    }

    #[test]
    fn test_saving_empty_record_deletes_it() {
        let store = BookmarkStore::new(MemoryStore::new());

        block_on(async {
            store.save_record("vid-1", &record(&[10.0])).await.unwrap();
            store.save_record("vid-1", &record(&[])).await.unwrap();

            assert!(store.load_record("vid-1").await.unwrap().is_none());

            let all = store.all_records().await.unwrap();
            assert!(all.is_empty());
        });
    }

    #[test]
    fn test_enumeration_skips_settings_and_bad_entries() {
        let memory = MemoryStore::new();
        let store = BookmarkStore::new(&memory);

        block_on(async {
            store.save_record("vid-1", &record(&[10.0])).await.unwrap();
            store.save_settings(&UserSettings::default()).await.unwrap();
            memory.set("vid-bad", "{not json").await.unwrap();

            let all = store.all_records().await.unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].0, "vid-1");
        });
    }

    #[test]
    fn test_settings_defaults_written_on_first_access() {
        let memory = MemoryStore::new();
        let store = BookmarkStore::new(&memory);

        block_on(async {
            let settings = store.settings().await.unwrap();
            assert!(settings.capture_frames);
            assert_eq!(settings.sort_by, SortBy::MostRecentlyUpdated);

            // The defaults must now be durably present.
            assert!(memory.contains(SETTINGS_KEY));

            let raw = memory.get(SETTINGS_KEY).await.unwrap().unwrap();
            assert!(raw.contains("\"sortBy\":\"Most Recently Updated\""));
        });
    }

    #[test]
    fn test_settings_round_trip() {
        let store = BookmarkStore::new(MemoryStore::new());

        block_on(async {
            let mut settings = store.settings().await.unwrap();
            settings.capture_frames = false;
            settings.sort_by = SortBy::MostBookmarks;
            store.save_settings(&settings).await.unwrap();

            let reloaded = store.settings().await.unwrap();
            assert!(!reloaded.capture_frames);
            assert_eq!(reloaded.sort_by, SortBy::MostBookmarks);
        });
    }
}
