//! SQLite storage backend for photos

use super::traits::{EnricherSetting, OpenStore, PhotoStore, PhotoSummary, StorageError, StorageResult};
use crate::model::{Photo, PhotoId};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// SQLite-backed photo store
///
/// Photos are stored as a JSON body plus the columns queries need
/// (`image_hash`, the `applied` bitmask). Thread-safe via an internal
/// mutex on the connection.
pub struct SqlitePhotoStore {
    conn: Mutex<Connection>,
}

impl SqlitePhotoStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Photos table
            CREATE TABLE IF NOT EXISTS photos (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                storage_folder TEXT NOT NULL,
                relative_path TEXT NOT NULL,
                image_hash TEXT,
                applied INTEGER NOT NULL DEFAULT 0,
                body_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_photos_image_hash
                ON photos(image_hash);

            -- Enricher activation settings
            CREATE TABLE IF NOT EXISTS enrichers (
                name TEXT PRIMARY KEY COLLATE NOCASE,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl OpenStore for SqlitePhotoStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl PhotoStore for SqlitePhotoStore {
    fn load_photo(&self, id: PhotoId) -> StorageResult<Option<Photo>> {
        let conn = self.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM photos WHERE id = ?1",
                params![id.get()],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(json) => {
                let mut photo: Photo = serde_json::from_str(&json)?;
                photo.id = Some(id);
                Ok(Some(photo))
            }
            None => Ok(None),
        }
    }

    fn save_photos(&self, photos: &[Photo]) -> StorageResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO photos (id, name, storage_folder, relative_path, image_hash, applied, body_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    storage_folder = excluded.storage_folder,
                    relative_path = excluded.relative_path,
                    image_hash = excluded.image_hash,
                    applied = excluded.applied,
                    body_json = excluded.body_json
                "#,
            )?;

            for photo in photos {
                let id = photo.id.ok_or(StorageError::MissingId)?;
                let body = serde_json::to_string(photo)?;
                stmt.execute(params![
                    id.get(),
                    photo.name,
                    photo.storage_folder.to_string_lossy().into_owned(),
                    photo.relative_path.to_string_lossy().into_owned(),
                    photo.image_hash,
                    photo.applied.bits(),
                    body,
                ])?;
            }
        }
        // Dropping `tx` on any early return above rolls the batch back.
        tx.commit()?;
        Ok(())
    }

    fn find_by_image_hash(&self, hash: &str, exclude: Option<PhotoId>) -> StorageResult<Vec<PhotoSummary>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, storage_folder, relative_path FROM photos
             WHERE image_hash = ?1 AND (?2 IS NULL OR id <> ?2)
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![hash, exclude.map(PhotoId::get)], |row| {
            Ok(PhotoSummary {
                id: PhotoId::new(row.get(0)?),
                storage_folder: PathBuf::from(row.get::<_, String>(1)?),
                relative_path: PathBuf::from(row.get::<_, String>(2)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn list_photo_ids(&self) -> StorageResult<Vec<PhotoId>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id FROM photos ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0).map(PhotoId::new))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn enricher_settings(&self) -> StorageResult<Vec<EnricherSetting>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT name, is_active FROM enrichers ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(EnricherSetting {
                name: row.get(0)?,
                is_active: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn set_enricher_active(&self, name: &str, is_active: bool) -> StorageResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO enrichers (name, is_active) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET is_active = excluded.is_active",
            params![name, is_active],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Capability, CapabilitySet, TagAssignment};

    fn create_test_store() -> SqlitePhotoStore {
        SqlitePhotoStore::open_in_memory().unwrap()
    }

    fn create_test_photo(id: i64, hash: Option<&str>) -> Photo {
        let mut photo = Photo::new(format!("p{id}.jpg"), "/lib", "album")
            .with_id(id)
            .with_file(format!("p{id}.jpg"));
        photo.image_hash = hash.map(str::to_string);
        photo
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let store = create_test_store();
        let mut photo = create_test_photo(1, Some("h1"));
        photo.applied = CapabilitySet::from(Capability::Tag);
        photo.tags.push(TagAssignment { name: "dog".into(), confidence: 0.7 });

        store.save_photos(&[photo.clone()]).unwrap();
        let loaded = store.load_photo(PhotoId::new(1)).unwrap().unwrap();

        assert_eq!(loaded, photo);
    }

    #[test]
    fn test_load_missing_photo_returns_none() {
        let store = create_test_store();
        assert!(store.load_photo(PhotoId::new(42)).unwrap().is_none());
    }

    #[test]
    fn test_save_updates_existing_row() {
        let store = create_test_store();
        let mut photo = create_test_photo(1, None);
        store.save_photos(&[photo.clone()]).unwrap();

        photo.captions.push("a dog on a beach".into());
        store.save_photos(&[photo]).unwrap();

        let loaded = store.load_photo(PhotoId::new(1)).unwrap().unwrap();
        assert_eq!(loaded.captions, vec!["a dog on a beach".to_string()]);
        assert_eq!(store.list_photo_ids().unwrap().len(), 1);
    }

    #[test]
    fn test_save_without_id_rolls_back_whole_batch() {
        let store = create_test_store();
        let good = create_test_photo(1, None);
        let bad = Photo::new("orphan.jpg", "/lib", "album");

        let err = store.save_photos(&[good, bad]).unwrap_err();
        assert!(matches!(err, StorageError::MissingId));
        assert!(store.list_photo_ids().unwrap().is_empty());
    }

    #[test]
    fn test_find_by_image_hash_excludes_self() {
        let store = create_test_store();
        store
            .save_photos(&[
                create_test_photo(1, Some("same")),
                create_test_photo(2, Some("same")),
                create_test_photo(3, Some("other")),
            ])
            .unwrap();

        let matches = store.find_by_image_hash("same", Some(PhotoId::new(1))).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, PhotoId::new(2));
        assert_eq!(matches[0].relative_path, PathBuf::from("album"));

        let all = store.find_by_image_hash("same", None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_enricher_settings_upsert() {
        let store = create_test_store();
        store.set_enricher_active("metadata", true).unwrap();
        store.set_enricher_active("face", true).unwrap();
        store.set_enricher_active("FACE", false).unwrap();

        let settings = store.enricher_settings().unwrap();
        assert_eq!(settings.len(), 2);
        let face = settings.iter().find(|s| s.name.eq_ignore_ascii_case("face")).unwrap();
        assert!(!face.is_active);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lumen.db");
        {
            let store = SqlitePhotoStore::open(&path).unwrap();
            store.save_photos(&[create_test_photo(5, None)]).unwrap();
        }
        let reopened = SqlitePhotoStore::open(&path).unwrap();
        assert!(reopened.load_photo(PhotoId::new(5)).unwrap().is_some());
    }
}
