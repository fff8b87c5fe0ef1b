use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::options::OptionLayer;
use crate::error::{Error, Result};

/// Settings file read when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.yml";

/// Source used when loading the settings file.
#[derive(Debug, Clone)]
pub enum SettingsSource {
    /// The default file in the working directory; absence is not an error.
    Default(PathBuf),
    /// A file named on the command line; absence is fatal.
    Explicit(PathBuf),
}

impl SettingsSource {
    pub fn from_override(path: Option<&PathBuf>) -> Self {
        match path {
            Some(path) => SettingsSource::Explicit(path.clone()),
            None => SettingsSource::Default(PathBuf::from(DEFAULT_SETTINGS_FILE)),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            SettingsSource::Default(path) | SettingsSource::Explicit(path) => path,
        }
    }
}

/// `vmlist` may be written as `"A, B"` or as a list.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VmListValue {
    Csv(String),
    Items(Vec<String>),
}

impl VmListValue {
    fn into_csv(self) -> String {
        match self {
            VmListValue::Csv(list) => list,
            VmListValue::Items(items) => items.join(","),
        }
    }
}

/// On-disk shape of the settings file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct SettingsFile {
    pub start_delay: Option<i64>,
    pub force: Option<bool>,
    pub max_wait_time: Option<f64>,
    pub add: Option<bool>,
    pub restart: Option<bool>,
    pub vmlist: Option<VmListValue>,
    pub vmfile: Option<PathBuf>,
    pub debug: Option<bool>,
    pub vboxmanage: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub settle_delay_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub retry_every: Option<u32>,
    pub delay_unit_secs: Option<u64>,
}

impl From<SettingsFile> for OptionLayer {
    fn from(file: SettingsFile) -> Self {
        OptionLayer {
            start_delay: file.start_delay,
            force: file.force,
            max_wait_time: file.max_wait_time,
            add: file.add,
            restart: file.restart,
            vmlist: file.vmlist.map(VmListValue::into_csv),
            vmfile: file.vmfile,
            debug: file.debug,
            vboxmanage: file.vboxmanage,
            log_file: file.log_file,
            settle_delay_secs: file.settle_delay_secs,
            poll_interval_secs: file.poll_interval_secs,
            retry_every: file.retry_every,
            delay_unit_secs: file.delay_unit_secs,
        }
    }
}

/// Load the settings layer. A missing default file yields an empty layer.
pub fn load_settings(source: &SettingsSource) -> Result<OptionLayer> {
    let path = source.path();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return match source {
                SettingsSource::Default(_) => Ok(OptionLayer::default()),
                SettingsSource::Explicit(_) => Err(Error::ExplicitConfigMissing {
                    path: path.to_path_buf(),
                    source: err,
                }),
            };
        }
        Err(source) => {
            return Err(Error::ReadConfig {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    parse_settings(path, &contents).map(OptionLayer::from)
}

/// Parse settings text; `.toml` files use TOML, everything else YAML.
pub fn parse_settings(path: &Path, contents: &str) -> Result<SettingsFile> {
    if contents.trim().is_empty() {
        return Ok(SettingsFile::default());
    }

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(contents).map_err(|source| Error::ParseTomlConfig {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_yaml::from_str(contents).map_err(|source| Error::ParseYamlConfig {
            path: path.to_path_buf(),
            source,
        })
    }
}
