//! # amock-config
//!
//! Read-only override configuration for the accel-mock injection library.
//!
//! The document is a TOML tree keyed by subsystem (`[gpus]`, `[ascend_npus]`),
//! then device index, then field name, with the occasional array leaf. It is
//! located at the first existing path in a fixed search order:
//!
//! 1. `$GPU_MOCK_CONF_PATH`
//! 2. `/host/opt/gpu_mock/gpu_mock_conf.toml` (mounted host root)
//! 3. `/opt/gpu_mock/gpu_mock_conf.toml`
//!
//! A missing or unparseable document never fails the loading process: the
//! store comes up "failed", every lookup reads as absent, and callers are
//! expected to fall back to the real vendor library. The failure reason is
//! kept so the injector can record it once at attach time.
//!
//! The store is loaded once and never mutated afterwards; shared references
//! are safe from any thread.

use std::path::{Path, PathBuf};

use toml::value::{Array, Table, Value};
use tracing::debug;

/// Environment variable naming an explicit configuration path.
pub const CONF_PATH_ENV: &str = "GPU_MOCK_CONF_PATH";
/// Root under which the host filesystem is mounted inside a container.
pub const HOST_MOUNT_ROOT: &str = "/host";
/// Default installed configuration path.
pub const DEFAULT_CONF_PATH: &str = "/opt/gpu_mock/gpu_mock_conf.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to find gpu_mock_conf.toml")]
    NotFound,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("toml parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// One segment of a lookup path.
///
/// `Index` addresses array elements; on a table it falls back to the decimal
/// string key, so per-device tables written as `[gpus.0]` and genuine arrays
/// are addressed uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seg<'a> {
    Key(&'a str),
    Index(usize),
}

/// Immutable hierarchical override store.
pub struct ConfigStore {
    table: Option<Table>,
    failure: Option<String>,
    source: Option<PathBuf>,
}

impl ConfigStore {
    /// Load from the standard search locations. Infallible: any failure is
    /// recorded in the store and surfaces as "every lookup absent".
    pub fn load() -> Self {
        let env_path = std::env::var_os(CONF_PATH_ENV).map(PathBuf::from);
        Self::load_rooted(env_path.as_deref(), Path::new("/"))
    }

    /// Search relative to `root` with an explicit environment override. The
    /// injector passes `/` and the process environment; tests pass a sandbox
    /// directory instead of mutating the real filesystem.
    pub fn load_rooted(env_path: Option<&Path>, root: &Path) -> Self {
        let Some(path) = search_conf_in(env_path, root) else {
            return Self::failed(ConfigError::NotFound.to_string());
        };
        match Self::open(&path) {
            Ok(store) => store,
            Err(err) => Self::failed(err.to_string()),
        }
    }

    /// Load a specific document, surfacing read and parse errors.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: Table = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded override configuration");
        Ok(Self {
            table: Some(table),
            failure: None,
            source: Some(path.to_path_buf()),
        })
    }

    /// Build from an in-memory document. Used by tests and the CLI checker.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let table: Table = toml::from_str(contents)?;
        Ok(Self {
            table: Some(table),
            failure: None,
            source: None,
        })
    }

    fn failed(reason: String) -> Self {
        debug!(reason, "override configuration unavailable");
        Self {
            table: None,
            failure: Some(reason),
            source: None,
        }
    }

    /// Reason the store is unusable, if it is.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Path the document was loaded from, when it came from disk.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Root table, absent on a failed store.
    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    /// Walk the tree along `path`. Absent segments, failed stores, and
    /// segment/type mismatches all yield `None`.
    pub fn lookup(&self, path: &[Seg<'_>]) -> Option<&Value> {
        let mut node: Option<&Value> = None;
        for seg in path {
            node = match node {
                None => {
                    let Seg::Key(key) = seg else { return None };
                    self.table.as_ref()?.get(*key)
                }
                Some(value) => descend(value, *seg),
            };
            node?;
        }
        node
    }

    pub fn get_i64(&self, path: &[Seg<'_>]) -> Option<i64> {
        self.lookup(path)?.as_integer()
    }

    /// TOML integers are signed; negative values read as absent.
    pub fn get_u64(&self, path: &[Seg<'_>]) -> Option<u64> {
        u64::try_from(self.get_i64(path)?).ok()
    }

    pub fn get_bool(&self, path: &[Seg<'_>]) -> Option<bool> {
        self.lookup(path)?.as_bool()
    }

    pub fn get_str(&self, path: &[Seg<'_>]) -> Option<&str> {
        self.lookup(path)?.as_str()
    }

    pub fn get_array(&self, path: &[Seg<'_>]) -> Option<&Array> {
        self.lookup(path)?.as_array()
    }
}

fn descend<'a>(value: &'a Value, seg: Seg<'_>) -> Option<&'a Value> {
    match (value, seg) {
        (Value::Table(t), Seg::Key(k)) => t.get(k),
        (Value::Array(a), Seg::Index(i)) => a.get(i),
        // Decimal fallback for integer segments on tables.
        (Value::Table(t), Seg::Index(i)) => t.get(&i.to_string()),
        _ => None,
    }
}

/// First existing document in the search order, or `None`.
pub fn search_conf() -> Option<PathBuf> {
    let env_path = std::env::var_os(CONF_PATH_ENV).map(PathBuf::from);
    search_conf_in(env_path.as_deref(), Path::new("/"))
}

/// Search-order primitive behind [`search_conf`], rooted for sandboxing.
pub fn search_conf_in(env_path: Option<&Path>, root: &Path) -> Option<PathBuf> {
    if let Some(path) = env_path {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
    }
    let rel = DEFAULT_CONF_PATH.trim_start_matches('/');
    let host = root
        .join(HOST_MOUNT_ROOT.trim_start_matches('/'))
        .join(rel);
    if host.is_file() {
        return Some(host);
    }
    let default = root.join(rel);
    if default.is_file() {
        return Some(default);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(doc: &str) -> ConfigStore {
        ConfigStore::from_toml_str(doc).expect("test document parses")
    }

    #[test]
    fn key_lookup_reads_scalars() {
        let conf = store("[gpus]\ncard_count = 4\n");
        assert_eq!(
            conf.get_i64(&[Seg::Key("gpus"), Seg::Key("card_count")]),
            Some(4)
        );
        assert_eq!(conf.get_i64(&[Seg::Key("gpus"), Seg::Key("absent")]), None);
    }

    #[test]
    fn index_segment_reads_decimal_table_keys() {
        let conf = store("[gpus.2]\ndram_ue = 7\n");
        assert_eq!(
            conf.get_u64(&[Seg::Key("gpus"), Seg::Index(2), Seg::Key("dram_ue")]),
            Some(7)
        );
        assert_eq!(
            conf.get_u64(&[Seg::Key("gpus"), Seg::Index(3), Seg::Key("dram_ue")]),
            None
        );
    }

    #[test]
    fn index_segment_reads_arrays() {
        let conf = store("[gpus.0]\nnvlink_active = [true, false]\n");
        let path = [
            Seg::Key("gpus"),
            Seg::Index(0),
            Seg::Key("nvlink_active"),
            Seg::Index(1),
        ];
        assert_eq!(conf.get_bool(&path), Some(false));
        let beyond = [
            Seg::Key("gpus"),
            Seg::Index(0),
            Seg::Key("nvlink_active"),
            Seg::Index(2),
        ];
        assert_eq!(conf.get_bool(&beyond), None);
    }

    #[test]
    fn type_mismatch_reads_as_absent() {
        let conf = store("[gpus]\ncard_count = \"four\"\n");
        assert_eq!(conf.get_i64(&[Seg::Key("gpus"), Seg::Key("card_count")]), None);
        assert_eq!(
            conf.get_str(&[Seg::Key("gpus"), Seg::Key("card_count")]),
            Some("four")
        );
    }

    #[test]
    fn negative_integers_are_not_u64() {
        let conf = store("[gpus]\nnvml_init_error = -1\n");
        let path = [Seg::Key("gpus"), Seg::Key("nvml_init_error")];
        assert_eq!(conf.get_i64(&path), Some(-1));
        assert_eq!(conf.get_u64(&path), None);
    }

    #[test]
    fn failed_store_is_always_absent() {
        let conf = ConfigStore::failed("failed to find gpu_mock_conf.toml".into());
        assert!(conf.failure().is_some());
        assert_eq!(conf.get_i64(&[Seg::Key("gpus"), Seg::Key("card_count")]), None);
        assert!(conf.table().is_none());
    }
}
