//! Mock environment staging.
//!
//! Staging means: copy the injection library and the override configuration
//! into the mock directory, then register the library in the loader preload
//! file so every process started afterwards picks it up. Tearing down
//! restores the preload file to exactly what it was and removes the staged
//! directory.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use amock_config::ConfigStore;

/// Name the staged configuration must carry; the shim's search order looks
/// for exactly this file.
const STAGED_CONF_NAME: &str = "gpu_mock_conf.toml";

pub struct MockConfig {
    pub config_path: PathBuf,
    pub mock_dir: PathBuf,
    pub library_path: PathBuf,
    pub preload_file: PathBuf,
}

pub struct Controller {
    config: MockConfig,
    active: bool,
    staged_library: Option<PathBuf>,
    /// Preload file content before staging; `None` means it did not exist.
    original_preload: Option<String>,
}

impl Controller {
    pub fn new(config: MockConfig) -> Controller {
        Controller {
            config,
            active: false,
            staged_library: None,
            original_preload: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self) -> Result<()> {
        if self.active {
            bail!("mock environment already started");
        }
        // A document the shim cannot parse would silently degrade every call
        // to delegation; refuse to stage it at all.
        ConfigStore::open(&self.config.config_path)
            .with_context(|| format!("invalid mock configuration {}", self.config.config_path.display()))?;

        let staged = self.stage();
        if staged.is_err() {
            let _ = fs::remove_dir_all(&self.config.mock_dir);
        }
        staged?;

        self.active = true;
        info!(
            dir = %self.config.mock_dir.display(),
            preload = %self.config.preload_file.display(),
            "mock environment staged"
        );
        Ok(())
    }

    fn stage(&mut self) -> Result<()> {
        if let Some(parent) = self.config.mock_dir.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create parent of {}", self.config.mock_dir.display()))?;
        }
        fs::create_dir(&self.config.mock_dir)
            .with_context(|| format!("failed to create mock dir {}", self.config.mock_dir.display()))?;

        let library_name = self
            .config
            .library_path
            .file_name()
            .context("library path has no file name")?;
        let staged_library = self.config.mock_dir.join(library_name);
        fs::copy(&self.config.library_path, &staged_library).with_context(|| {
            format!(
                "failed to copy injection library {}",
                self.config.library_path.display()
            )
        })?;

        // Save the preload state before touching it so stop() can restore it
        // byte for byte.
        self.original_preload = match fs::read_to_string(&self.config.preload_file) {
            Ok(content) => Some(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read preload file {}", self.config.preload_file.display())
                })
            }
        };

        let mut preload = self.original_preload.clone().unwrap_or_default();
        if !preload.is_empty() && !preload.ends_with('\n') {
            preload.push('\n');
        }
        preload.push_str(&staged_library.to_string_lossy());
        preload.push('\n');
        fs::write(&self.config.preload_file, preload).with_context(|| {
            format!("failed to update preload file {}", self.config.preload_file.display())
        })?;
        self.staged_library = Some(staged_library);

        fs::copy(
            &self.config.config_path,
            self.config.mock_dir.join(STAGED_CONF_NAME),
        )
        .with_context(|| {
            format!("failed to stage configuration {}", self.config.config_path.display())
        })?;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        if self.staged_library.take().is_some() {
            match self.original_preload.take() {
                Some(content) => {
                    fs::write(&self.config.preload_file, content).with_context(|| {
                        format!(
                            "failed to restore preload file {}",
                            self.config.preload_file.display()
                        )
                    })?;
                }
                None => match fs::remove_file(&self.config.preload_file) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!(
                                "failed to remove preload file {}",
                                self.config.preload_file.display()
                            )
                        })
                    }
                },
            }
            fs::remove_dir_all(&self.config.mock_dir).with_context(|| {
                format!("failed to clean up mock dir {}", self.config.mock_dir.display())
            })?;
        }
        self.active = false;
        info!("mock environment removed");
        Ok(())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.active {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, MockConfig) {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("mock.toml");
        fs::write(&config_path, "[gpus]\ncard_count = 4\n").unwrap();
        let library_path = dir.path().join("libamock_shim.so");
        fs::write(&library_path, b"\x7fELF-stand-in").unwrap();
        let config = MockConfig {
            config_path,
            mock_dir: dir.path().join("staged/gpu_mock"),
            library_path,
            preload_file: dir.path().join("ld.so.preload"),
        };
        (dir, config)
    }

    #[test]
    fn start_stages_library_config_and_preload_entry() {
        let (_dir, config) = sandbox();
        let mut controller = Controller::new(config);
        controller.start().unwrap();
        assert!(controller.is_active());

        let mock_dir = controller.config.mock_dir.clone();
        assert!(mock_dir.join("libamock_shim.so").is_file());
        assert!(mock_dir.join(STAGED_CONF_NAME).is_file());

        let preload = fs::read_to_string(&controller.config.preload_file).unwrap();
        assert!(preload.contains("libamock_shim.so"));
        assert!(preload.ends_with('\n'));
    }

    #[test]
    fn stop_restores_an_absent_preload_file() {
        let (_dir, config) = sandbox();
        let mut controller = Controller::new(config);
        controller.start().unwrap();
        controller.stop().unwrap();

        assert!(!controller.config.preload_file.exists());
        assert!(!controller.config.mock_dir.exists());
        assert!(!controller.is_active());
    }

    #[test]
    fn stop_restores_prior_preload_content() {
        let (_dir, config) = sandbox();
        fs::write(&config.preload_file, "/usr/lib/other.so\n").unwrap();
        let mut controller = Controller::new(config);
        controller.start().unwrap();

        let staged = fs::read_to_string(&controller.config.preload_file).unwrap();
        assert!(staged.starts_with("/usr/lib/other.so\n"));
        assert!(staged.contains("libamock_shim.so"));

        controller.stop().unwrap();
        let restored = fs::read_to_string(&controller.config.preload_file).unwrap();
        assert_eq!(restored, "/usr/lib/other.so\n");
    }

    #[test]
    fn double_start_is_rejected() {
        let (_dir, config) = sandbox();
        let mut controller = Controller::new(config);
        controller.start().unwrap();
        assert!(controller.start().is_err());
    }

    #[test]
    fn unparseable_configuration_refuses_to_stage() {
        let (_dir, config) = sandbox();
        fs::write(&config.config_path, "[gpus\ncard_count = 4\n").unwrap();
        let mut controller = Controller::new(config);
        assert!(controller.start().is_err());
        assert!(!controller.config.mock_dir.exists());
    }
}
