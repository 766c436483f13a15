//! Environment facts attached to every analytics event.

use once_cell::sync::OnceCell;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use super::bag::PropertyBag;
use super::cache::UserLevelCacheWriter;
use super::hasher::StringHasher;
use super::options::TelemetryOptions;
use crate::util::capture_stdout;

pub const OS_VERSION: &str = "OS Version";
pub const OS_PLATFORM: &str = "OS Platform";
pub const RUNTIME_ID: &str = "Runtime Id";
pub const PRODUCT_VERSION: &str = "Product Version";
pub const DOCKER_CONTAINER: &str = "Docker Container";
pub const MACHINE_ID: &str = "Machine ID";
pub const KERNEL_VERSION: &str = "Kernel Version";

const MACHINE_ID_CACHE_KEY: &str = "MachineId";
const IS_DOCKER_CONTAINER_CACHE_KEY: &str = "IsDockerContainer";

static PROCESS_COMMON_PROPERTIES: OnceCell<PropertyBag> = OnceCell::new();

/// Source of a hardware address used to derive a stable machine id.
pub trait MacAddressProvider: Send + Sync {
    fn mac_address(&self) -> Option<String>;
}

/// Detects whether the process runs inside a container.
pub trait DockerContainerDetector: Send + Sync {
    fn is_docker_container(&self) -> bool;
}

/// Reads interface addresses from `/sys/class/net`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysfsMacAddressProvider;

impl MacAddressProvider for SysfsMacAddressProvider {
    fn mac_address(&self) -> Option<String> {
        let mut interfaces: Vec<_> = std::fs::read_dir("/sys/class/net")
            .ok()?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name() != "lo")
            .collect();
        interfaces.sort_by_key(|entry| entry.file_name());

        interfaces.iter().find_map(|entry| {
            let address = std::fs::read_to_string(entry.path().join("address")).ok()?;
            let address = address.trim();
            if address.is_empty() || address == "00:00:00:00:00:00" {
                None
            } else {
                Some(address.to_string())
            }
        })
    }
}

/// Checks the usual container markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerMarkerDetector;

impl DockerContainerDetector for DockerMarkerDetector {
    fn is_docker_container(&self) -> bool {
        if Path::new("/.dockerenv").exists() {
            return true;
        }
        std::fs::read_to_string("/proc/1/cgroup")
            .map(|cgroup| {
                cgroup.contains("docker")
                    || cgroup.contains("kubepods")
                    || cgroup.contains("containerd")
            })
            .unwrap_or(false)
    }
}

/// Computes the common property snapshot.
pub struct CommonPropertiesProvider {
    product_version: String,
    hasher: Arc<dyn StringHasher>,
    mac_address: Box<dyn MacAddressProvider>,
    docker: Box<dyn DockerContainerDetector>,
    cache: UserLevelCacheWriter,
}

impl CommonPropertiesProvider {
    /// Provider backed by the platform detectors.
    pub fn new(options: &TelemetryOptions, hasher: Arc<dyn StringHasher>) -> Self {
        Self::with_detectors(
            options,
            hasher,
            Box::new(SysfsMacAddressProvider),
            Box::new(DockerMarkerDetector),
        )
    }

    /// Provider with custom detectors.
    pub fn with_detectors(
        options: &TelemetryOptions,
        hasher: Arc<dyn StringHasher>,
        mac_address: Box<dyn MacAddressProvider>,
        docker: Box<dyn DockerContainerDetector>,
    ) -> Self {
        Self {
            product_version: options.product_version.clone(),
            hasher,
            mac_address,
            docker,
            cache: UserLevelCacheWriter::new(options),
        }
    }

    /// Compute a fresh snapshot.
    ///
    /// OS facts are read on every call; the machine id and container flag
    /// come from the user-level cache.
    pub fn get_common_properties(&self) -> PropertyBag {
        PropertyBag::new()
            .with(OS_VERSION, os_version())
            .with(OS_PLATFORM, os_platform())
            .with(RUNTIME_ID, runtime_id())
            .with(PRODUCT_VERSION, self.product_version.clone())
            .with(DOCKER_CONTAINER, self.is_docker_container())
            .with(MACHINE_ID, self.machine_id())
            .with(KERNEL_VERSION, kernel_version())
    }

    /// The snapshot computed once for this process.
    pub fn process_common_properties(&self) -> PropertyBag {
        PROCESS_COMMON_PROPERTIES
            .get_or_init(|| self.get_common_properties())
            .clone()
    }

    fn machine_id(&self) -> String {
        self.cache.run_with_cache(MACHINE_ID_CACHE_KEY, || {
            match self.mac_address.mac_address() {
                Some(mac) => self.hasher.hash(&mac),
                None => uuid::Uuid::new_v4().to_string(),
            }
        })
    }

    fn is_docker_container(&self) -> String {
        self.cache.run_with_cache(IS_DOCKER_CONTAINER_CACHE_KEY, || {
            if self.docker.is_docker_container() {
                "True".to_string()
            } else {
                "False".to_string()
            }
        })
    }
}

fn os_platform() -> String {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        other => other,
    }
    .to_string()
}

fn runtime_id() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

fn os_version() -> String {
    let version = match std::env::consts::OS {
        "linux" => std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|release| parse_os_release_version(&release)),
        "macos" => {
            let mut cmd = Command::new("sw_vers");
            cmd.arg("-productVersion");
            capture_stdout(cmd)
        }
        _ => None,
    };
    version.unwrap_or_else(|| "unknown".to_string())
}

fn parse_os_release_version(release: &str) -> Option<String> {
    release.lines().find_map(|line| {
        line.strip_prefix("VERSION_ID=")
            .map(|v| v.trim_matches('"').to_string())
    })
}

fn kernel_version() -> String {
    let cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "ver"]);
        cmd
    } else {
        let mut cmd = Command::new("uname");
        cmd.arg("-srv");
        cmd
    };
    capture_stdout(cmd).unwrap_or_else(|| std::env::consts::OS.to_string())
}
