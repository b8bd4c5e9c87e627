//! On-disk cache of fitted coefficients
//!
//! One JSON archive per [`DatasetKey`], named after the key's file stem. An
//! archive is written to a temporary file in the store directory and renamed
//! over the target, so readers see either the old or the new archive.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::DatasetKey;
use crate::qssa::bspline::SmoothedCoefficientCurve;
use crate::qssa::table::CoefficientTable;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no coefficient archive for {key} at {}", path.display())]
    NotFound { key: String, path: PathBuf },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt coefficient archive {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("failed to replace archive: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("invalid store pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientArchive {
    pub key: DatasetKey,
    pub created: DateTime<Utc>,
    pub table: CoefficientTable,
    pub curve: SmoothedCoefficientCurve,
}

#[derive(Debug, Clone)]
pub struct CoefficientStore {
    root: PathBuf,
}

impl CoefficientStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &DatasetKey) -> PathBuf {
        self.root.join(format!("{}.json", key.file_stem()))
    }

    pub fn exists(&self, key: &DatasetKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Write (or overwrite) the archive for `key`. Returns its path.
    pub fn save(
        &self,
        key: &DatasetKey,
        table: &CoefficientTable,
        curve: &SmoothedCoefficientCurve,
    ) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;

        let archive = CoefficientArchive {
            key: *key,
            created: Utc::now(),
            table: table.clone(),
            curve: curve.clone(),
        };

        let path = self.path_for(key);
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &archive)
                .map_err(|e| io_err(io::Error::other(e)))?;
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path)?;

        info!("Saved coefficients for {} to {}", key, path.display());
        Ok(path)
    }

    pub fn load(
        &self,
        key: &DatasetKey,
    ) -> Result<(CoefficientTable, SmoothedCoefficientCurve), StoreError> {
        let archive = self.load_archive(key)?;
        Ok((archive.table, archive.curve))
    }

    pub fn load_archive(&self, key: &DatasetKey) -> Result<CoefficientArchive, StoreError> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    key: key.to_string(),
                    path,
                });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let archive: CoefficientArchive = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        if archive.key != *key {
            return Err(StoreError::Corrupt {
                path,
                reason: format!("archive holds {} instead of {}", archive.key, key),
            });
        }

        debug!("Loaded coefficients for {} ({} rows)", key, archive.table.len());
        Ok(archive)
    }

    /// Keys of every archive in the store, sorted by file name.
    pub fn list(&self) -> Result<Vec<DatasetKey>, StoreError> {
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = format!("{}/qssa_*.json", root);

        let mut keys = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry.map_err(|e| StoreError::Io {
                path: e.path().to_path_buf(),
                source: e.into(),
            })?;
            let key = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(DatasetKey::from_file_stem);
            match key {
                Some(key) => keys.push(key),
                None => debug!("Ignoring {}", path.display()),
            }
        }

        keys.sort_by_key(|k| k.file_stem());
        Ok(keys)
    }
}
