use crate::config::Settings;
use crate::error::ConfigurationError;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Load/save access to the settings document.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Settings, ConfigurationError>;

    fn save(&self, settings: &Settings) -> Result<(), ConfigurationError>;

    /// Read-modify-write of the whole document.
    fn update(&self, apply: &mut dyn FnMut(&mut Settings)) -> Result<(), ConfigurationError> {
        let mut settings = self.load()?;
        apply(&mut settings);
        self.save(&settings)
    }
}

/// Settings kept as a pretty-printed JSON file, created on first load.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bootstrap(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        if !self.path.exists() {
            self.save(&Settings::default())?;
        }

        // Holds tracker passwords and session cookies.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<Settings, ConfigurationError> {
        debug!("Loading configuration file {} ...", self.path.display());

        self.bootstrap()?;
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigurationError> {
        debug!("Saving configuration file {} ...", self.path.display());

        let contents = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// In-process settings document.
#[derive(Default)]
pub struct MemoryStore {
    settings: Mutex<Settings>,
}

impl MemoryStore {
    pub fn new(settings: Settings) -> Self {
        MemoryStore {
            settings: Mutex::new(settings),
        }
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Settings, ConfigurationError> {
        self.settings
            .lock()
            .map(|settings| settings.clone())
            .map_err(|_| ConfigurationError::Invalid("settings lock poisoned".to_string()))
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigurationError> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| ConfigurationError::Invalid("settings lock poisoned".to_string()))?;
        *guard = settings.clone();
        Ok(())
    }
}
