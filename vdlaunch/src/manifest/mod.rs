//! Build-artifact manifest.
//!
//! Records which file came from which build, keyed by path relative to the
//! manifest's root directory. Persisted as JSON:
//!
//! ```json
//! {
//!   "root_dir": "/home/user/artifacts",
//!   "files": {
//!     "images/kernel": {
//!       "source": "kernel_build",
//!       "build_id": "11223344",
//!       "build_target": "kernel_aarch64",
//!       "path": "images/kernel"
//!     }
//!   }
//! }
//! ```
//!
//! Saving writes a temporary file next to the target and renames it into
//! place, so readers never observe a torn file. Concurrent writers are not
//! coordinated: the last `save` wins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use vdlaunch_shared::errors::{VdError, VdResult};

/// Where a tracked file originated.
///
/// Parsed case-insensitively; unrecognised names load as `Unknown` instead of
/// failing the whole manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSource {
    DefaultBuild,
    SystemBuild,
    KernelBuild,
    BootloaderBuild,
    AndroidEfiLoaderBuild,
    BootBuild,
    HostPackageBuild,
    ChromeOsBuild,
    LocalFile,
    Generated,
    #[default]
    Unknown,
}

impl FileSource {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "default_build" => FileSource::DefaultBuild,
            "system_build" => FileSource::SystemBuild,
            "kernel_build" => FileSource::KernelBuild,
            "bootloader_build" => FileSource::BootloaderBuild,
            "android_efi_loader_build" => FileSource::AndroidEfiLoaderBuild,
            "boot_build" => FileSource::BootBuild,
            "host_package_build" => FileSource::HostPackageBuild,
            "chrome_os_build" => FileSource::ChromeOsBuild,
            "local_file" => FileSource::LocalFile,
            "generated" => FileSource::Generated,
            _ => FileSource::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for FileSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(FileSource::from_name(&name))
    }
}

/// Provenance of one tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    #[serde(default)]
    pub source: FileSource,
    #[serde(default)]
    pub build_id: String,
    #[serde(default)]
    pub build_target: String,
    /// Path relative to the manifest root (absolute if it lay outside it).
    /// Always equal to the entry's key once loaded.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    root_dir: Option<PathBuf>,
    #[serde(default)]
    files: BTreeMap<String, TrackedFile>,
}

/// In-memory build-artifact manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchManifest {
    root_dir: Option<PathBuf>,
    files: BTreeMap<String, TrackedFile>,
}

impl FetchManifest {
    /// Empty manifest whose paths are recorded relative to `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: Some(root_dir.into()),
            files: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> VdResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VdError::Storage(format!(
                "Failed to read manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut file: ManifestFile = serde_json::from_str(&content)?;

        for (key, entry) in file.files.iter_mut() {
            if !entry.path.is_empty() && &entry.path != key {
                tracing::warn!(
                    key = %key,
                    recorded = %entry.path,
                    "Manifest entry records a different path, using its key"
                );
            }
            entry.path = key.clone();
        }

        // Entries without a recorded root are relative to the manifest itself.
        let root_dir = file.root_dir.or_else(|| {
            path.parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
        });

        tracing::debug!(
            manifest = %path.display(),
            files = file.files.len(),
            "Loaded build-artifact manifest"
        );

        Ok(Self {
            root_dir,
            files: file.files,
        })
    }

    /// Persist to `path` via write-to-temp and rename.
    pub fn save(&self, path: &Path) -> VdResult<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let file = ManifestFile {
            root_dir: self.root_dir.clone(),
            files: self.files.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| {
            VdError::Storage(format!(
                "Failed to write manifest {}: {}",
                path.display(),
                e.error
            ))
        })?;
        Ok(())
    }

    pub fn root_dir(&self) -> Option<&Path> {
        self.root_dir.as_deref()
    }

    /// All tracked files keyed by path.
    pub fn files(&self) -> &BTreeMap<String, TrackedFile> {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Track `path`, stripping the root directory prefix.
    ///
    /// # Errors
    ///
    /// Returns `Manifest` if the path is already tracked and `overwrite` is false.
    pub fn add_file(
        &mut self,
        source: FileSource,
        build_id: impl Into<String>,
        build_target: impl Into<String>,
        path: &Path,
        overwrite: bool,
    ) -> VdResult<()> {
        let key = self.relative_key(path);
        if key.is_empty() {
            return Err(VdError::Manifest(format!(
                "cannot track manifest root {}",
                path.display()
            )));
        }

        if self.files.contains_key(&key) {
            if !overwrite {
                return Err(VdError::Manifest(format!("'{}' is already tracked", key)));
            }
            tracing::debug!(path = %key, "Overwriting tracked file");
        }

        self.files.insert(
            key.clone(),
            TrackedFile {
                source,
                build_id: build_id.into(),
                build_target: build_target.into(),
                path: key,
            },
        );
        Ok(())
    }

    /// The single tracked file whose path ends with `suffix`.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing matches, `Manifest` if more than one file does.
    pub fn find_by_suffix(&self, suffix: &str) -> VdResult<&TrackedFile> {
        let mut matches = self.files.values().filter(|f| f.path.ends_with(suffix));

        let first = matches
            .next()
            .ok_or_else(|| VdError::NotFound(format!("no tracked file ends with '{}'", suffix)))?;

        if let Some(second) = matches.next() {
            return Err(VdError::Manifest(format!(
                "suffix '{}' is ambiguous: '{}' and '{}'",
                suffix, first.path, second.path
            )));
        }

        Ok(first)
    }

    /// Absolute location of a tracked file.
    pub fn resolve(&self, file: &TrackedFile) -> PathBuf {
        match &self.root_dir {
            Some(root) => root.join(&file.path),
            None => PathBuf::from(&file.path),
        }
    }

    fn relative_key(&self, path: &Path) -> String {
        let relative = self
            .root_dir
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);
        relative.to_string_lossy().into_owned()
    }
}
