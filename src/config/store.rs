//! Loading and atomic saving of the configuration file
//!
//! A [`ConfigHandle`] remembers the file's modification time at load. Saving
//! compares it against the file on disk before taking the save lock and again
//! inside it, so of two writers racing on the same snapshot only one wins and
//! the other gets [`Error::Conflict`].

use super::ConfigDocument;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::fs::{self, File, Metadata};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Environment variable holding the configuration path
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// A loaded document plus the modification time it was read at
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    document: ConfigDocument,
    modified: SystemTime,
}

impl ConfigHandle {
    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut ConfigDocument {
        &mut self.document
    }

    /// Modification time observed at load
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn into_document(self) -> ConfigDocument {
        self.document
    }
}

/// File-backed store for the sing-box configuration
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    save_lock: Arc<Mutex<()>>,
}

impl ConfigStore {
    /// Store with its own save lock
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_lock(path, Arc::new(Mutex::new(())))
    }

    /// Store sharing a save lock with other stores for the same file
    pub fn with_lock<P: Into<PathBuf>>(path: P, save_lock: Arc<Mutex<()>>) -> Self {
        ConfigStore {
            path: path.into(),
            save_lock,
        }
    }

    /// Store for the path in `CONFIG_PATH`
    pub fn from_env() -> Result<Self> {
        Self::from_env_var(CONFIG_PATH_ENV)
    }

    /// Store for the path in the given environment variable
    pub fn from_env_var(name: &str) -> Result<Self> {
        match std::env::var(name) {
            Ok(path) if !path.trim().is_empty() => Ok(Self::new(path)),
            _ => Err(Error::EmptyPath),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the document
    pub fn load(&self) -> Result<ConfigHandle> {
        let metadata = self.stat()?;
        let modified = metadata.modified().map_err(Error::StatRead)?;

        let file = File::open(&self.path).map_err(Error::Open)?;
        let document = ConfigDocument::from_reader(BufReader::new(file)).map_err(Error::JsonDecode)?;

        debug!(
            path = %self.path.display(),
            dns_rule_sets = document.dns.rules.len(),
            route_rule_sets = document.route.rules.len(),
            "Configuration loaded"
        );

        Ok(ConfigHandle { document, modified })
    }

    /// Write the handle's document over the file.
    ///
    /// Fails with [`Error::Conflict`] when the file changed since the handle was loaded.
    pub fn save(&self, handle: &ConfigHandle) -> Result<()> {
        self.check_fresh(handle)?;

        let _guard = self.save_lock.lock();
        // another save may have finished between the check above and the lock
        let metadata = self.check_fresh(handle)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(&self.tmp_prefix())
            .suffix(".tmp")
            .tempfile_in(self.dir())
            .map_err(Error::TmpFileCreate)?;

        let bytes = handle.document.to_json().map_err(write_failed("encode"))?;
        tmp.write_all(&bytes).map_err(write_failed("write"))?;
        advance_mtime(tmp.as_file(), handle.modified).map_err(write_failed("set mtime"))?;
        tmp.as_file().sync_all().map_err(write_failed("fsync"))?;

        if let Err(e) = tmp.as_file().set_permissions(metadata.permissions()) {
            warn!(path = %tmp.path().display(), error = %e, "Failed to copy configuration permissions");
        }

        // a failed persist hands the temp file back inside the error; dropping it deletes it
        tmp.persist(&self.path)
            .map_err(|e| Error::TmpFileRename(e.error))?;

        info!(path = %self.path.display(), bytes = bytes.len(), "Configuration saved");
        Ok(())
    }

    fn stat(&self) -> Result<Metadata> {
        fs::metadata(&self.path).map_err(Error::StatRead)
    }

    fn check_fresh(&self, handle: &ConfigHandle) -> Result<Metadata> {
        let metadata = self.stat()?;
        let modified = metadata.modified().map_err(Error::StatRead)?;
        if modified != handle.modified {
            warn!(path = %self.path.display(), "Configuration changed since it was loaded");
            return Err(Error::Conflict);
        }
        Ok(metadata)
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    fn tmp_prefix(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        format!(".{}.", name)
    }
}

/// Write-stage failures all surface as `Config_JsonEncodeError`; the stage is only logged
fn write_failed(stage: &'static str) -> impl Fn(io::Error) -> Error {
    move |e| {
        warn!(stage, error = %e, "Failed to write temporary configuration");
        Error::JsonEncode(e)
    }
}

/// Push the file's mtime strictly past `token`, even within one filesystem clock tick.
///
/// Steps grow until the filesystem records a later time.
fn advance_mtime(file: &File, token: SystemTime) -> io::Result<()> {
    const STEPS: [Duration; 4] = [
        Duration::from_nanos(1),
        Duration::from_micros(1),
        Duration::from_millis(1),
        Duration::from_secs(1),
    ];

    for step in STEPS {
        if file.metadata()?.modified()? > token {
            return Ok(());
        }
        file.set_modified(token + step)?;
    }

    if file.metadata()?.modified()? > token {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            "filesystem did not record a newer modification time",
        ))
    }
}
