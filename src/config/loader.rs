//! Configuration file loading

use super::file::{ConfigFile, CONFIG_FILE_NAME};
use crate::infra::{FileSystem, RealFileSystem};
use anyhow::{Context, Result};
use std::path::Path;

/// Loads `.mobperf.toml`
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from `.mobperf.toml` in the given directory
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mobperf::config::ConfigLoader;
    /// use std::path::Path;
    ///
    /// let config = ConfigLoader::load(Path::new("."))?;
    /// println!("Package: {:?}", config.package);
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn load(project_root: &Path) -> Result<ConfigFile> {
        Self::load_with_fs(project_root, &RealFileSystem)
    }

    /// Load config with a custom filesystem implementation
    pub fn load_with_fs<FS: FileSystem>(project_root: &Path, fs: &FS) -> Result<ConfigFile> {
        let config_path = Self::path_in(project_root);

        let contents = match fs.read_to_string(&config_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No {} in {}", CONFIG_FILE_NAME, project_root.display());
                return Ok(ConfigFile::default());
            }
            Err(e) => {
                return Err(e).context(format!("Failed to read {}", CONFIG_FILE_NAME));
            }
        };

        let config: ConfigFile = toml_edit::de::from_str(&contents)
            .context(format!("Failed to parse {}", CONFIG_FILE_NAME))?;
        log::debug!("Loaded {}", config_path.display());

        Ok(config)
    }

    /// Location of the config file inside `project_root`
    pub fn path_in(project_root: &Path) -> std::path::PathBuf {
        project_root.join(CONFIG_FILE_NAME)
    }

    /// Check if config file exists in project
    pub fn exists(project_root: &Path) -> bool {
        Self::path_in(project_root).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::Metadata;
    use std::io;
    use std::path::PathBuf;

    /// Serves a fixed read result for every path
    struct ReadOnlyFs {
        result: fn() -> io::Result<String>,
    }

    impl FileSystem for ReadOnlyFs {
        fn read_to_string(&self, _path: &Path) -> io::Result<String> {
            (self.result)()
        }

        fn write(&self, _path: &Path, _contents: impl AsRef<[u8]>) -> io::Result<()> {
            unimplemented!()
        }

        fn write_new(&self, _path: &Path, _contents: impl AsRef<[u8]>) -> io::Result<()> {
            unimplemented!()
        }

        fn metadata(&self, _path: &Path) -> io::Result<Metadata> {
            unimplemented!()
        }

        fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
            unimplemented!()
        }

        fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
            Ok(path.to_path_buf())
        }
    }

    #[test]
    fn test_loader_loads_from_valid_toml() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "package = \"com.example.app\"\nrepetitions = 7\n",
        )
        .unwrap();

        let config = ConfigLoader::load(temp.path()).unwrap();
        assert_eq!(config.package.as_deref(), Some("com.example.app"));
        assert_eq!(config.repetitions, Some(7));
        assert!(ConfigLoader::exists(temp.path()));
    }

    #[test]
    fn test_loader_missing_file_returns_default() {
        let fs = ReadOnlyFs {
            result: || Err(io::Error::new(io::ErrorKind::NotFound, "file not found")),
        };

        let config = ConfigLoader::load_with_fs(Path::new("/project"), &fs).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_loader_read_error_is_reported() {
        let fs = ReadOnlyFs {
            result: || Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
        };

        let err = ConfigLoader::load_with_fs(Path::new("/project"), &fs).unwrap_err();
        assert!(err.to_string().contains("Failed to read .mobperf.toml"));
    }

    #[test]
    fn test_loader_invalid_toml_is_reported() {
        let fs = ReadOnlyFs {
            result: || Ok("repetitions = \"many\"".to_string()),
        };

        let err = ConfigLoader::load_with_fs(Path::new("/project"), &fs).unwrap_err();
        assert!(err.to_string().contains("Failed to parse .mobperf.toml"));
    }
}
