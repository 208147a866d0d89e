//! Run export to a JSON file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use gazelab_core::{Persistence, RunExport};
use gazelab_traits::BoxError;

use crate::error::{Result, SimError};

/// Write to a sibling temp file, sync, then rename over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

/// Writes each export as pretty JSON under `dir`.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save(&self, export: &RunExport, filename: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        let json = export
            .to_json()
            .map_err(|e| SimError::Encode(e.to_string()))?;
        write_atomic(&path, json.as_bytes())?;
        Ok(path)
    }
}

impl Persistence for JsonFilePersistence {
    fn persist(
        &mut self,
        export: &RunExport,
        filename: &str,
    ) -> std::result::Result<PathBuf, BoxError> {
        Ok(self.save(export, filename)?)
    }
}
