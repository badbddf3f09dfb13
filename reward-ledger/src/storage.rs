//! Durable storage for the chain
//!
//! The whole chain lives in one pretty-printed JSON document:
//!
//! ```text
//! {
//!   "format_version": 1,
//!   "hash_algorithm": "sha256",
//!   "blocks": [ { "index": 0, ... }, ... ]
//! }
//! ```
//!
//! Every persist writes `<file>.tmp`, fsyncs it, renames it over the live
//! file, then fsyncs the directory. A crash leaves either the old complete
//! chain or the new complete chain, never a mix.

use crate::{
    crypto::HashAlgorithm,
    error::{PersistenceError, Result},
    types::Block,
    Config,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// On-disk layout version
pub const FORMAT_VERSION: u32 = 1;

/// Persisted document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerFile {
    /// Layout version, currently [`FORMAT_VERSION`]
    pub format_version: u32,
    /// Algorithm every block hash was computed with
    pub hash_algorithm: HashAlgorithm,
    /// Blocks in index order
    pub blocks: Vec<Block>,
}

/// Serialize a chain to the exact bytes the store writes
pub fn encode(algorithm: HashAlgorithm, blocks: &[Block]) -> Result<Vec<u8>> {
    #[derive(Serialize)]
    struct LedgerFileRef<'a> {
        format_version: u32,
        hash_algorithm: HashAlgorithm,
        blocks: &'a [Block],
    }

    let mut bytes = serde_json::to_vec_pretty(&LedgerFileRef {
        format_version: FORMAT_VERSION,
        hash_algorithm: algorithm,
        blocks,
    })
    .map_err(PersistenceError::from)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// File-backed chain store
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    algorithm: HashAlgorithm,
}

impl FileStore {
    /// Open the store, creating the data directory if needed.
    ///
    /// Does not read the chain; see [`FileStore::load`].
    pub fn open(config: &Config) -> Result<Self> {
        let dir = &config.data_dir;
        fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;

        let store = Self {
            path: config.ledger_path(),
            algorithm: config.hash_algorithm,
        };
        store.discard_stale_tmp()?;

        tracing::debug!(path = %store.path.display(), "Opened ledger store");
        Ok(store)
    }

    /// Location of the live ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Algorithm this store expects on disk
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Load the persisted chain.
    ///
    /// Returns `Ok(None)` only when no ledger file exists. A file that exists
    /// but cannot be read back into a non-empty chain is an error.
    pub fn load(&self) -> Result<Option<Vec<Block>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::io(&self.path, e).into()),
        };

        let file: LedgerFile = serde_json::from_slice(&bytes)
            .map_err(|e| PersistenceError::corrupt(&self.path, e.to_string()))?;

        if file.format_version != FORMAT_VERSION {
            return Err(PersistenceError::corrupt(
                &self.path,
                format!("unsupported format version {}", file.format_version),
            )
            .into());
        }
        if file.hash_algorithm != self.algorithm {
            return Err(PersistenceError::corrupt(
                &self.path,
                format!(
                    "written with {} but configured for {}",
                    file.hash_algorithm, self.algorithm
                ),
            )
            .into());
        }
        if file.blocks.is_empty() {
            return Err(PersistenceError::corrupt(&self.path, "no blocks (genesis missing)").into());
        }
        // Transactions were validated while parsing; only genesis may be empty
        if let Some(block) = file.blocks.iter().skip(1).find(|b| b.transactions().is_empty()) {
            return Err(PersistenceError::corrupt(
                &self.path,
                format!("block {} has no transactions", block.index()),
            )
            .into());
        }

        tracing::debug!(
            path = %self.path.display(),
            blocks = file.blocks.len(),
            "Loaded chain"
        );
        Ok(Some(file.blocks))
    }

    /// Atomically replace the persisted chain with `blocks`
    pub fn persist(&self, blocks: &[Block]) -> Result<()> {
        let bytes = encode(self.algorithm, blocks)?;
        write_atomic(&self.path, &bytes)?;

        tracing::debug!(
            path = %self.path.display(),
            blocks = blocks.len(),
            bytes = bytes.len(),
            "Chain persisted"
        );
        Ok(())
    }

    fn discard_stale_tmp(&self) -> Result<()> {
        let tmp = tmp_path(&self.path);
        match fs::remove_file(&tmp) {
            Ok(()) => {
                tracing::warn!(path = %tmp.display(), "Removed stale temp file from interrupted write");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::io(tmp, e).into()),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::result::Result<(), PersistenceError> {
    replace_file(path, bytes, fsync_parent)
}

/// The rename is the commit point. Once it succeeds the new chain is what a
/// restart will load, so a failed directory fsync afterwards is only logged.
fn replace_file(
    path: &Path,
    bytes: &[u8],
    sync_dir: impl FnOnce(&Path) -> io::Result<()>,
) -> std::result::Result<(), PersistenceError> {
    let tmp = tmp_path(path);

    let written = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(PersistenceError::io(&tmp, e));
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(PersistenceError::io(path, e));
    }

    if let Err(e) = sync_dir(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Directory fsync failed after rename; new chain is already live"
        );
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(target_family = "unix")]
fn fsync_parent(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[cfg(not(target_family = "unix"))]
fn fsync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}
