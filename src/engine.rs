use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::index::IndexSpec;
use crate::types::{CollectionName, DocumentId};
use crate::utils::json::{document_to_json, parse_json_document};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

const SNAPSHOT_EXT: &str = "ndjson";
const INDEX_SUFFIX: &str = ".indexes.json";

/// Where and how to open the store.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub data_dir: PathBuf,
    pub database: String,
    /// Create `data_dir` when it does not exist; otherwise opening fails.
    pub create_if_missing: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./plp_data"),
            database: "plp_bookstore".to_string(),
            create_if_missing: true,
        }
    }
}

/// The embedded store: named collections of one database, loaded from a snapshot directory
/// on open and written back on [`Engine::close`].
#[derive(Debug)]
pub struct Engine {
    database: String,
    // None for an in-memory engine
    db_dir: Option<PathBuf>,
    collections: RwLock<HashMap<CollectionName, Arc<Collection>>>,
}

impl Engine {
    /// Open the database directory `<data_dir>/<database>` and load every collection in it.
    ///
    /// # Errors
    /// `StoreUnavailable` when the data directory is missing (and may not be created) or
    /// unreadable; `Io` for a corrupt snapshot line.
    pub fn open(options: EngineOptions) -> Result<Self, DbError> {
        validate_name("database", &options.database)?;
        let data_dir = &options.data_dir;
        if !data_dir.exists() {
            if !options.create_if_missing {
                return Err(DbError::StoreUnavailable(format!(
                    "data directory {} does not exist",
                    data_dir.display()
                )));
            }
            log::info!("creating data directory {}", data_dir.display());
        } else if !data_dir.is_dir() {
            return Err(DbError::StoreUnavailable(format!(
                "{} is not a directory",
                data_dir.display()
            )));
        }
        let db_dir = data_dir.join(&options.database);
        fs::create_dir_all(&db_dir).map_err(|e| {
            DbError::StoreUnavailable(format!("cannot open {}: {e}", db_dir.display()))
        })?;

        let mut collections = HashMap::new();
        let entries = fs::read_dir(&db_dir).map_err(|e| {
            DbError::StoreUnavailable(format!("cannot list {}: {e}", db_dir.display()))
        })?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let col = load_collection(&db_dir, &name)?;
            collections.insert(name, Arc::new(col));
        }
        log::info!(
            "opened database {} at {} ({} collections)",
            options.database,
            db_dir.display(),
            collections.len()
        );
        Ok(Self {
            database: options.database,
            db_dir: Some(db_dir),
            collections: RwLock::new(collections),
        })
    }

    /// An engine with no backing files; `flush` and `close` do nothing.
    #[must_use]
    pub fn in_memory(database: &str) -> Self {
        Self {
            database: database.to_string(),
            db_dir: None,
            collections: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn db_dir(&self) -> Option<&Path> {
        self.db_dir.as_deref()
    }

    /// Return the named collection, creating an empty one if needed.
    ///
    /// # Errors
    /// `InvalidArgument` for a name that cannot be used as a file stem.
    pub fn create_collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        validate_name("collection", name)?;
        let mut cols = self.collections.write();
        let col = cols.entry(name.to_string()).or_insert_with(|| {
            log::info!("created collection {}.{name}", self.database);
            Arc::new(Collection::new(name.to_string()))
        });
        Ok(Arc::clone(col))
    }

    #[must_use]
    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a collection and its snapshot files.
    ///
    /// # Errors
    /// `Io` when a snapshot file exists but cannot be removed.
    pub fn drop_collection(&self, name: &str) -> Result<bool, DbError> {
        let existed = self.collections.write().remove(name).is_some();
        if let Some(dir) = &self.db_dir {
            for path in [snapshot_path(dir, name), index_path(dir, name)] {
                if path.exists() {
                    fs::remove_file(&path)?;
                }
            }
        }
        if existed {
            log::info!("dropped collection {}.{name}", self.database);
        }
        Ok(existed)
    }

    /// Write every collection back to its snapshot files.
    ///
    /// # Errors
    /// `Io` when a snapshot cannot be written or persisted.
    pub fn flush(&self) -> Result<(), DbError> {
        let Some(dir) = &self.db_dir else {
            return Ok(());
        };
        let cols: Vec<Arc<Collection>> = self.collections.read().values().cloned().collect();
        for col in cols {
            save_collection(dir, &col)?;
        }
        Ok(())
    }

    /// Flush and release the store.
    ///
    /// # Errors
    /// See [`Engine::flush`].
    pub fn close(self) -> Result<(), DbError> {
        self.flush()?;
        log::info!("closed database {}", self.database);
        Ok(())
    }
}

fn validate_name(kind: &str, name: &str) -> Result<(), DbError> {
    let ok = !name.is_empty()
        && name.len() <= 120
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(DbError::InvalidArgument(format!("invalid {kind} name '{name}'")))
    }
}

fn snapshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{SNAPSHOT_EXT}"))
}

fn index_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}{INDEX_SUFFIX}"))
}

fn load_collection(dir: &Path, name: &str) -> Result<Collection, DbError> {
    let col = Collection::new(name.to_string());
    let path = snapshot_path(dir, name);
    let reader = BufReader::new(fs::File::open(&path)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut data = parse_json_document(&line)
            .map_err(|e| DbError::Io(format!("{}:{}: {e}", path.display(), lineno + 1)))?;
        let id = match data.remove("_id") {
            Some(bson::Bson::String(s)) => DocumentId::parse(&s),
            _ => None,
        };
        let id = id.unwrap_or_else(|| {
            log::warn!("{}:{}: missing or invalid _id, assigning a new one", path.display(), lineno + 1);
            DocumentId::new()
        });
        col.insert_document(Document::with_id(id, data));
    }

    let ipath = index_path(dir, name);
    if ipath.exists() {
        let specs: Vec<IndexSpec> = serde_json::from_reader(BufReader::new(fs::File::open(&ipath)?))?;
        for spec in &specs {
            col.create_index(spec)?;
        }
    }
    log::debug!("loaded collection {name}: {} documents", col.len());
    Ok(col)
}

fn save_collection(dir: &Path, col: &Collection) -> Result<(), DbError> {
    let name = col.name_str();
    write_atomic(&snapshot_path(dir, name), |w| {
        for doc in col.get_all_documents() {
            let mut line = document_to_json(&doc.data);
            if let Value::Object(map) = &mut line {
                map.insert("_id".to_string(), Value::String(doc.id.to_string()));
            }
            serde_json::to_writer(&mut *w, &line)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    })?;
    let specs = col.index_specs();
    write_atomic(&index_path(dir, name), |w| {
        serde_json::to_writer_pretty(&mut *w, &specs)?;
        Ok(())
    })?;
    log::debug!("saved collection {name}: {} documents, {} indexes", col.len(), specs.len());
    Ok(())
}

// temp file in the destination directory, then rename over the target
fn write_atomic<F>(dest: &Path, fill: F) -> Result<(), DbError>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<(), DbError>,
{
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent)?;
    {
        let mut w = BufWriter::new(&mut tmp);
        fill(&mut w)?;
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| DbError::Io(format!("persist {}: {}", dest.display(), e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_must_be_file_safe() {
        let engine = Engine::in_memory("plp_bookstore");
        assert!(engine.create_collection("books").is_ok());
        for bad in ["", "../etc", "a/b", ".hidden"] {
            assert!(matches!(engine.create_collection(bad), Err(DbError::InvalidArgument(_))));
        }
    }

    #[test]
    fn create_collection_is_idempotent() {
        let engine = Engine::in_memory("plp_bookstore");
        let a = engine.create_collection("books").unwrap();
        let b = engine.create_collection("books").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(engine.list_collection_names(), vec!["books".to_string()]);
        assert!(engine.drop_collection("books").unwrap());
        assert!(engine.get_collection("books").is_none());
    }

    #[test]
    fn corrupt_snapshot_lines_name_the_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let db_dir = dir.path().join("plp_bookstore");
        fs::create_dir_all(&db_dir).unwrap();
        let good = r#"{"_id": "not-a-uuid", "title": "1984"}"#;
        fs::write(db_dir.join("books.ndjson"), format!("{good}\n[1, 2]\n")).unwrap();
        let opts = EngineOptions {
            data_dir: dir.path().to_path_buf(),
            database: "plp_bookstore".into(),
            create_if_missing: false,
        };
        match Engine::open(opts.clone()) {
            Err(DbError::Io(msg)) => assert!(msg.contains("books.ndjson:2"), "{msg}"),
            other => panic!("expected Io error, got {other:?}"),
        }

        fs::write(db_dir.join("books.ndjson"), format!("{good}\n\n")).unwrap();
        let engine = Engine::open(opts).unwrap();
        let books = engine.get_collection("books").unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books.get_all_documents()[0].data.get_str("title").unwrap(), "1984");
    }
}
