// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use misfit_core::{CaseStorage, MisfitError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

fn validate_label(label: &str) -> Result<(), MisfitError> {
    if label.trim().is_empty() {
        return Err(MisfitError::invalid_input("case file label must be non-empty"));
    }
    if label.contains(['/', '\\']) || label == "." || label == ".." {
        return Err(MisfitError::invalid_input(format!(
            "case file label '{label}' must be a plain file name"
        )));
    }
    Ok(())
}

fn io_write_error(action: &str, path: &Path, err: std::io::Error) -> MisfitError {
    MisfitError::storage_write(format!("{action} '{}': {err}", path.display()))
}

/// Case records stored as one file per label under a mount directory.
#[derive(Clone, Debug)]
pub struct DirectoryStorage {
    root: PathBuf,
    mount_point: String,
}

impl DirectoryStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mount_point = root.to_string_lossy().into_owned();
        Self { root, mount_point }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn case_file_path(&self, label: &str) -> PathBuf {
        self.root.join(label)
    }
}

impl CaseStorage for DirectoryStorage {
    fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Writes through a temp file, fsync and rename so readers never see a
    /// partial record.
    fn write_case_file(&self, label: &str, bytes: &[u8]) -> Result<(), MisfitError> {
        validate_label(label)?;
        std::fs::create_dir_all(&self.root)
            .map_err(|err| io_write_error("failed creating case directory", &self.root, err))?;

        let path = self.case_file_path(label);
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let temp_path = self
            .root
            .join(format!("{label}.tmp-{}-{suffix}", process::id()));

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .map_err(|err| io_write_error("failed creating case temp file", &temp_path, err))?;

        if let Err(err) = file.write_all(bytes) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(io_write_error("failed writing case temp file", &temp_path, err));
        }
        if let Err(err) = file.sync_all() {
            let _ = std::fs::remove_file(&temp_path);
            return Err(io_write_error("failed fsync on case temp file", &temp_path, err));
        }
        if let Err(err) = std::fs::rename(&temp_path, &path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(io_write_error("failed renaming case temp file", &path, err));
        }
        Ok(())
    }

    fn read_case_file(&self, label: &str) -> Result<Vec<u8>, MisfitError> {
        validate_label(label)?;
        let path = self.case_file_path(label);
        std::fs::read(&path).map_err(|err| {
            MisfitError::storage_read(format!(
                "failed reading case file '{}': {err}",
                path.display()
            ))
        })
    }
}

/// In-process case storage keyed by label.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    mount_point: String,
    files: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new(mount_point: impl Into<String>) -> Self {
        Self {
            mount_point: mount_point.into(),
            files: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.files.borrow().contains_key(label)
    }

    pub fn labels(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }
}

impl CaseStorage for MemoryStorage {
    fn mount_point(&self) -> &str {
        &self.mount_point
    }

    fn write_case_file(&self, label: &str, bytes: &[u8]) -> Result<(), MisfitError> {
        validate_label(label)?;
        self.files
            .borrow_mut()
            .insert(label.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_case_file(&self, label: &str) -> Result<Vec<u8>, MisfitError> {
        validate_label(label)?;
        self.files.borrow().get(label).cloned().ok_or_else(|| {
            MisfitError::storage_read(format!(
                "case '{}' has no record '{label}'",
                self.mount_point
            ))
        })
    }
}
