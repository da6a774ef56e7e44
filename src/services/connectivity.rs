use std::path::PathBuf;
use std::sync::RwLock;
use strum::{Display, EnumString};

/// Network transports reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Transport {
    Wifi,
    Cellular,
    Ethernet,
    /// Anything else (tunnels, bridges, unclassified links): present but not
    /// counted as usable connectivity.
    Other,
}

impl Transport {
    fn is_usable(self) -> bool {
        matches!(self, Transport::Wifi | Transport::Cellular | Transport::Ethernet)
    }
}

/// Instantaneous view of the device's network state.
pub trait NetworkState: Send + Sync {
    /// Transports currently active.
    fn active_transports(&self) -> Vec<Transport>;

    /// True iff a Wi-Fi, cellular or Ethernet transport is up right now.
    ///
    /// No caching: a caller that checks and immediately acts can still race a
    /// transport change. The offline queue is the fallback for exactly that
    /// race, so the window is acceptable.
    fn is_network_available(&self) -> bool {
        self.active_transports().iter().any(|t| t.is_usable())
    }
}

/// Reads link state from the kernel's `/sys/class/net`. An interface counts
/// as active when its `operstate` is `up`; the transport is inferred from the
/// interface naming convention.
#[derive(Debug)]
pub struct SysfsNetworkState {
    root: PathBuf,
}

impl SysfsNetworkState {
    pub fn new() -> Self {
        Self::with_root("/sys/class/net")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for SysfsNetworkState {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_interface(name: &str) -> Option<Transport> {
    if name == "lo" || name.starts_with("docker") || name.starts_with("veth") {
        return None;
    }
    if name.starts_with("wl") {
        Some(Transport::Wifi)
    } else if name.starts_with("ww") || name.starts_with("rmnet") || name.starts_with("ppp") {
        Some(Transport::Cellular)
    } else if name.starts_with("eth") || name.starts_with("en") {
        Some(Transport::Ethernet)
    } else {
        Some(Transport::Other)
    }
}

impl NetworkState for SysfsNetworkState {
    fn active_transports(&self) -> Vec<Transport> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut transports = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(transport) = classify_interface(name) else {
                continue;
            };

            let operstate = self.root.join(name).join("operstate");
            let up = std::fs::read_to_string(operstate)
                .map(|s| s.trim() == "up")
                .unwrap_or(false);

            if up && !transports.contains(&transport) {
                transports.push(transport);
            }
        }
        transports
    }
}

/// Fixed transport set, settable at runtime. Used by tests and by deployments
/// that sit behind a link the kernel can't classify.
#[derive(Debug, Default)]
pub struct StaticNetworkState {
    transports: RwLock<Vec<Transport>>,
}

impl StaticNetworkState {
    pub fn new(transports: Vec<Transport>) -> Self {
        Self {
            transports: RwLock::new(transports),
        }
    }

    pub fn set(&self, transports: Vec<Transport>) {
        *self.transports.write().unwrap() = transports;
    }
}

impl NetworkState for StaticNetworkState {
    fn active_transports(&self) -> Vec<Transport> {
        self.transports.read().unwrap().clone()
    }
}
