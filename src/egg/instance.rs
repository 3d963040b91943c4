//! Instance configuration: the per-server document that, together with its
//! egg, fully determines a container invocation.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// Resource plan for an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// RAM in GiB
    pub ram: u64,
    /// CPU limit as a percentage of one core (100 = 1 core)
    pub cpu: u64,
    /// Disk limit in GiB
    pub disk: u64,
}

/// One managed server's configuration, independent of runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Stable id, matches the directory name under the servers root
    pub id: String,

    pub egg_id: String,

    /// Primary port, used for both the container's exposed port and host binding
    pub port: u16,

    pub plan: Plan,

    #[serde(default)]
    pub location: String,

    pub name: String,

    #[serde(default)]
    pub game: String,

    /// env_variable -> value. Missing keys fall back to the egg's default_value.
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl InstanceConfig {
    /// Memory limit for this instance's container, in bytes (`plan.ram` GiB).
    pub fn memory_bytes(&self) -> u64 {
        self.plan.ram * 1024 * 1024 * 1024
    }

    /// Value for `SERVER_MEMORY`, in MiB.
    pub fn memory_mib(&self) -> u64 {
        self.plan.ram * 1024
    }

    /// Disk limit in bytes.
    pub fn disk_bytes(&self) -> u64 {
        self.plan.disk * 1024 * 1024 * 1024
    }

    /// CPU quota in microseconds for a 100000us period.
    pub fn cpu_quota(&self) -> i64 {
        if self.plan.cpu == 0 {
            0
        } else {
            (self.plan.cpu * 1000) as i64
        }
    }

    /// True if this instance's game is Minecraft-family (drives image/port special cases).
    pub fn is_minecraft(&self) -> bool {
        self.game.eq_ignore_ascii_case("minecraft")
    }
}
