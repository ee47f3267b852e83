use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use lmdb::{Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info};

use crate::app_response::AppResponse;
use crate::local_storage::StorageBackend;
use crate::store_config::StoreConfig;

const COLLECTIONS_DB: &str = "collections";

/// Environments currently open in this process, by canonical path.
///
/// LMDB forbids opening the same environment twice in one process. A host
/// that loses its store pointer (a Flutter hot restart, for one) and opens
/// the store again gets the environment that is still alive.
static OPEN_ENVIRONMENTS: OnceLock<Mutex<HashMap<PathBuf, Weak<Environment>>>> = OnceLock::new();

/// LMDB-backed substrate: one named database holding one UTF-8 value per key.
pub struct LmdbStorage {
    env: Arc<Environment>,
    db: Database,
    path: PathBuf,
}

impl LmdbStorage {
    /// Opens (creating if needed) the environment at `config.db_dir()`.
    pub fn open(config: &StoreConfig) -> Result<Self, AppResponse> {
        config.validate()?;
        Self::open_at(Path::new(&config.db_dir()), config.map_size)
    }

    /// Opens the environment at `path`, or attaches to it when it is already
    /// open in this process. `map_size` only applies to a fresh open.
    pub fn open_at(path: &Path, map_size: usize) -> Result<Self, AppResponse> {
        std::fs::create_dir_all(path)?;
        let path = std::fs::canonicalize(path)?;

        let env = Self::shared_environment(&path, map_size)?;
        let db = env.create_db(Some(COLLECTIONS_DB), DatabaseFlags::empty())?;

        Ok(Self { env, db, path })
    }

    fn shared_environment(path: &Path, map_size: usize) -> Result<Arc<Environment>, AppResponse> {
        let registry = OPEN_ENVIRONMENTS.get_or_init(|| Mutex::new(HashMap::new()));
        let mut open = registry
            .lock()
            .map_err(|_| AppResponse::DatabaseError("Environment registry lock poisoned".to_string()))?;

        if let Some(env) = open.get(path).and_then(Weak::upgrade) {
            info!("Reusing LMDB environment already open at {}", path.display());
            return Ok(env);
        }

        let env = Arc::new(
            Environment::new()
                .set_max_dbs(1)
                .set_map_size(map_size)
                .open(path)?,
        );
        open.retain(|_, env| env.strong_count() > 0);
        open.insert(path.to_path_buf(), Arc::downgrade(&env));

        info!("LMDB storage opened at {}", path.display());
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes pending writes to disk.
    pub fn sync(&self) -> Result<(), AppResponse> {
        self.env.sync(true)?;
        Ok(())
    }
}

impl StorageBackend for LmdbStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppResponse> {
        let txn = self.env.begin_ro_txn()?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Some(text.to_string()),
                Err(e) => {
                    return Err(AppResponse::SerializationError(format!(
                        "Value for '{key}' is not valid UTF-8: {e}"
                    )))
                }
            },
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(AppResponse::from(e)),
        };
        txn.abort();
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.put(self.db, &key, &value, WriteFlags::empty())?;
        txn.commit()?;
        debug!("Stored {} bytes under '{}'", value.len(), key);
        Ok(())
    }

    fn clear(&self) -> Result<(), AppResponse> {
        let mut txn = self.env.begin_rw_txn()?;
        txn.clear_db(self.db)?;
        txn.commit()?;
        Ok(())
    }
}
