use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::{DirectoryError, DirectorySnapshot};

/// Where the in-memory directory is seeded from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    /// TOML file with `[[principals]]`, `[[roles]]` and `[[resources]]`.
    /// Relative paths are resolved against the config file's directory.
    /// If omitted, the directory starts empty and every request is denied.
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

impl DirectoryConfig {
    /// Load the seed snapshot, or an empty one if no seed file is set.
    pub fn load_snapshot(&self) -> Result<DirectorySnapshot, DirectoryError> {
        match &self.seed_file {
            Some(path) => DirectorySnapshot::from_file(path),
            None => Ok(DirectorySnapshot::default()),
        }
    }

    pub(super) fn resolve_relative_to(&mut self, base: &Path) {
        if let Some(seed) = &self.seed_file
            && seed.is_relative()
        {
            self.seed_file = Some(base.join(seed));
        }
    }
}
