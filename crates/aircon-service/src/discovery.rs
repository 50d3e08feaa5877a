//! Device discovery.
//!
//! Every directory below the devices folder that holds a `device_info.json`
//! is one device. The provisioning step leaves the client certificate and
//! key next to it:
//!
//! ```text
//! devices/
//!   ac-lobby/
//!     device_info.json              {"thingName", "endpoint", "rootCAPath"}
//!     ac-lobby-certificate.pem.crt
//!     ac-lobby-private.pem.key
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Name of the per-device descriptor file.
pub const DEVICE_INFO_FILE: &str = "device_info.json";

/// Contents of `device_info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "thingName")]
    pub thing_name: String,
    /// Broker host name.
    pub endpoint: String,
    #[serde(rename = "rootCAPath")]
    pub root_ca_path: PathBuf,
}

/// A device found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub folder: PathBuf,
    pub info: DeviceInfo,
}

/// PEM material for a mutually authenticated connection.
#[derive(Clone)]
pub struct Credentials {
    pub ca: Vec<u8>,
    pub certificate: Vec<u8>,
    pub private_key: Vec<u8>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("ca", &format_args!("{} bytes", self.ca.len()))
            .field("certificate", &format_args!("{} bytes", self.certificate.len()))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read PEM files from explicit paths.
    pub fn from_files(
        ca: &Path,
        certificate: &Path,
        private_key: &Path,
    ) -> Result<Self, DiscoveryError> {
        Ok(Self {
            ca: read_required("root CA", ca)?,
            certificate: read_required("certificate", certificate)?,
            private_key: read_required("private key", private_key)?,
        })
    }
}

impl DiscoveredDevice {
    /// The thing name, used as device name and MQTT client id.
    pub fn name(&self) -> &str {
        &self.info.thing_name
    }

    pub fn certificate_path(&self) -> PathBuf {
        self.folder
            .join(format!("{}-certificate.pem.crt", self.info.thing_name))
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.folder
            .join(format!("{}-private.pem.key", self.info.thing_name))
    }

    /// Root CA location. Relative paths are tried as given first, then
    /// against the device folder.
    pub fn root_ca_path(&self) -> PathBuf {
        let path = &self.info.root_ca_path;
        if path.is_relative() && !path.exists() {
            self.folder.join(path)
        } else {
            path.clone()
        }
    }

    /// Read the CA, certificate and key files.
    pub fn load_credentials(&self) -> Result<Credentials, DiscoveryError> {
        Credentials::from_files(
            &self.root_ca_path(),
            &self.certificate_path(),
            &self.private_key_path(),
        )
    }
}

fn read_required(what: &'static str, path: &Path) -> Result<Vec<u8>, DiscoveryError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DiscoveryError::MissingFile {
            what,
            path: path.to_path_buf(),
        },
        _ => DiscoveryError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Find devices below `root`, optionally only the one whose directory is
/// named `only`.
///
/// Descriptors that cannot be read or parsed are logged and skipped. Finding
/// no device at all is an error.
pub fn discover(root: &Path, only: Option<&str>) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
    let mut folders = Vec::new();
    collect_device_folders(root, &mut folders)?;
    folders.sort();

    let devices: Vec<DiscoveredDevice> = folders
        .into_iter()
        .filter(|folder| match only {
            Some(name) => folder.file_name().is_some_and(|n| n == name),
            None => true,
        })
        .filter_map(|folder| match load_device_info(&folder) {
            Ok(info) => {
                debug!("Found device {} in {}", info.thing_name, folder.display());
                Some(DiscoveredDevice { folder, info })
            }
            Err(e) => {
                warn!("Skipping {}: {}", folder.display(), e);
                None
            }
        })
        .collect();

    if devices.is_empty() {
        return Err(DiscoveryError::NoDevices {
            folder: root.to_path_buf(),
        });
    }
    Ok(devices)
}

fn collect_device_folders(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), DiscoveryError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    if dir.join(DEVICE_INFO_FILE).is_file() {
        found.push(dir.to_path_buf());
    }

    for entry in entries {
        let entry = entry.map_err(|e| DiscoveryError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        if is_dir {
            collect_device_folders(&entry.path(), found)?;
        }
    }
    Ok(())
}

fn load_device_info(folder: &Path) -> Result<DeviceInfo, DiscoveryError> {
    let path = folder.join(DEVICE_INFO_FILE);
    let content = std::fs::read(&path).map_err(|e| DiscoveryError::Io {
        path: path.clone(),
        source: e,
    })?;
    serde_json::from_slice(&content).map_err(|e| DiscoveryError::InvalidInfo { path, source: e })
}

/// Discovery errors.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid device descriptor {path}: {source}")]
    InvalidInfo {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Missing {what} at {path}")]
    MissingFile { what: &'static str, path: PathBuf },
    #[error("No devices found in {folder}")]
    NoDevices { folder: PathBuf },
}
