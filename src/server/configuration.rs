//! Server configuration types

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server UUID
    pub uuid: String,

    /// Server name
    pub name: String,

    /// Whether the server is suspended
    #[serde(default)]
    pub suspended: bool,

    /// Startup invocation command
    pub invocation: String,

    /// Skip egg installation scripts
    #[serde(default)]
    pub skip_egg_scripts: bool,

    /// Build/resource configuration
    pub build: BuildConfig,

    /// Container configuration
    pub container: ContainerConfig,

    /// Network allocations
    pub allocations: AllocationsConfig,

    /// Egg configuration
    pub egg: EggConfig,

    /// Mount configurations
    #[serde(default)]
    pub mounts: Vec<MountConfig>,

    /// Process configuration (startup/stop)
    pub process: ProcessConfig,

    /// Environment variables
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// The egg's own installation script, carried over from the egg registry
    /// for instances configured through it. `None` for panel-sourced
    /// instances, which fetch their install script from the panel instead.
    #[serde(default)]
    pub installation_script: Option<EggInstallationScript>,
}

/// An installation script resolved from an egg descriptor, ready to hand to
/// the installer without a round-trip to the panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EggInstallationScript {
    /// Docker image the install container runs
    pub container_image: String,

    /// Entrypoint the install container runs the script under
    pub entrypoint: String,

    /// Installation script contents
    pub script: String,
}

/// Build/resource limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Memory limit in MB (-1 for unlimited)
    #[serde(default = "default_memory")]
    pub memory_limit: i64,

    /// Swap limit in MB (-1 for unlimited)
    #[serde(default = "default_swap")]
    pub swap: i64,

    /// I/O weight (10-1000)
    #[serde(default = "default_io")]
    pub io_weight: u32,

    /// CPU limit as percentage (100 = 1 core, -1 for unlimited)
    #[serde(default = "default_cpu")]
    pub cpu_limit: i64,

    /// CPU threads to pin to (comma-separated)
    #[serde(default)]
    pub threads: Option<String>,

    /// Disk space limit in MB (-1 for unlimited)
    #[serde(default = "default_disk")]
    pub disk_space: i64,

    /// Whether OOM killer is disabled
    #[serde(default)]
    pub oom_disabled: bool,
}

fn default_memory() -> i64 { -1 }
fn default_swap() -> i64 { -1 }
fn default_io() -> u32 { 500 }
fn default_cpu() -> i64 { -1 }
fn default_disk() -> i64 { -1 }

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            memory_limit: -1,
            swap: -1,
            io_weight: 500,
            cpu_limit: -1,
            threads: None,
            disk_space: -1,
            oom_disabled: false,
        }
    }
}

/// Container configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Docker image to use
    pub image: String,

    /// Whether OOM killer is disabled (override)
    #[serde(default)]
    pub oom_disabled: bool,

    /// Requires container rebuild
    #[serde(default)]
    pub requires_rebuild: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: String::new(),
            oom_disabled: false,
            requires_rebuild: false,
        }
    }
}

/// Network allocations configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationsConfig {
    /// Default allocation
    pub default: Allocation,

    /// Additional port mappings (IP -> ports)
    #[serde(default)]
    pub mappings: HashMap<String, Vec<u16>>,
}

impl Default for AllocationsConfig {
    fn default() -> Self {
        Self {
            default: Allocation::default(),
            mappings: HashMap::new(),
        }
    }
}

/// Single port allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    /// IP address
    pub ip: String,

    /// Port number
    pub port: u16,
}

impl Default for Allocation {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 25565,
        }
    }
}

/// Egg configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EggConfig {
    /// Egg UUID/ID
    pub id: String,

    /// File denylist patterns
    #[serde(default)]
    pub file_denylist: Vec<String>,

    /// Whether to fix permissions on start
    #[serde(default)]
    pub fix_permissions: bool,
}

impl Default for EggConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            file_denylist: Vec::new(),
            fix_permissions: false,
        }
    }
}

/// Mount configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    /// Source path on host
    pub source: String,

    /// Target path in container
    pub target: String,

    /// Read-only mount
    #[serde(default)]
    pub read_only: bool,
}

/// Process startup/stop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Startup detection configuration
    pub startup: StartupConfig,

    /// Stop configuration
    pub stop: StopConfig,

    /// Configuration files to modify
    #[serde(default)]
    pub configs: Vec<ConfigFileEntry>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            startup: StartupConfig::default(),
            stop: StopConfig::default(),
            configs: Vec::new(),
        }
    }
}

/// Startup detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Patterns indicating startup complete
    #[serde(default)]
    pub done: Vec<String>,

    /// User interaction patterns
    #[serde(default)]
    pub user_interaction: Vec<String>,

    /// Strip ANSI codes from output
    #[serde(default)]
    pub strip_ansi: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            done: Vec::new(),
            user_interaction: Vec::new(),
            strip_ansi: false,
        }
    }
}

/// Stop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StopConfig {
    /// Send a signal
    Signal {
        #[serde(default = "default_signal")]
        value: String,
    },
    /// Send a command
    Command { value: String },
    /// No specific stop method
    None,
}

fn default_signal() -> String {
    "SIGTERM".to_string()
}

impl Default for StopConfig {
    fn default() -> Self {
        StopConfig::Signal {
            value: "SIGTERM".to_string(),
        }
    }
}

impl StopConfig {
    /// Convert to environment StopConfig
    pub fn to_env_stop_config(&self) -> crate::environment::StopConfig {
        match self {
            StopConfig::Signal { value } => crate::environment::StopConfig::Signal(value.clone()),
            StopConfig::Command { value } => crate::environment::StopConfig::Command(value.clone()),
            StopConfig::None => crate::environment::StopConfig::Native,
        }
    }
}

/// Configuration file entry for startup modifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFileEntry {
    /// Parser type (yaml, json, ini, xml, properties, file)
    pub parser: String,

    /// File path relative to server root
    pub file: String,

    /// Replacements to make
    pub replace: Vec<ConfigReplacement>,
}

/// Single configuration replacement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigReplacement {
    /// Match pattern
    #[serde(rename = "match")]
    pub match_pattern: String,

    /// Replacement value
    pub replace_with: String,

    /// Optional condition
    #[serde(default)]
    pub if_value: Option<String>,
}

/// Translate an egg's `config.stop` value (a literal console command, or a
/// `^`-prefixed signal marker such as `^C`) into the stop strategy used by the
/// environment layer.
fn stop_config_from_egg(stop: &str) -> StopConfig {
    if let Some(marker) = stop.strip_prefix('^') {
        let signal = match marker {
            "C" => "SIGINT",
            "\\" => "SIGQUIT",
            "Z" => "SIGTSTP",
            _ => "SIGTERM",
        };
        StopConfig::Signal { value: signal.to_string() }
    } else if stop.trim().is_empty() {
        StopConfig::None
    } else {
        StopConfig::Command { value: stop.to_string() }
    }
}

impl ServerConfig {
    /// Convert API server configuration to internal format
    pub fn from_api(api_config: &crate::api::ServerConfiguration) -> Self {
        let mut environment = HashMap::new();

        // Build standard environment variables
        environment.insert("STARTUP".to_string(), api_config.invocation.clone());
        environment.insert("SERVER_IP".to_string(), api_config.allocations.default.ip.clone());
        environment.insert("SERVER_PORT".to_string(), api_config.allocations.default.port.to_string());
        environment.insert("P_SERVER_UUID".to_string(), api_config.uuid.clone());

        Self {
            uuid: api_config.uuid.clone(),
            name: api_config.name.clone(),
            suspended: api_config.suspended,
            invocation: api_config.invocation.clone(),
            skip_egg_scripts: api_config.skip_egg_scripts,
            build: BuildConfig {
                memory_limit: api_config.build.memory_limit,
                swap: api_config.build.swap,
                io_weight: api_config.build.io_weight,
                cpu_limit: api_config.build.cpu_limit,
                threads: api_config.build.threads.clone(),
                disk_space: api_config.build.disk_space,
                oom_disabled: api_config.build.oom_disabled,
            },
            container: ContainerConfig {
                image: api_config.container.image.clone(),
                oom_disabled: api_config.container.oom_disabled,
                requires_rebuild: api_config.container.requires_rebuild,
            },
            allocations: AllocationsConfig {
                default: Allocation {
                    ip: api_config.allocations.default.ip.clone(),
                    port: api_config.allocations.default.port,
                },
                mappings: api_config.allocations.mappings.clone(),
            },
            egg: EggConfig {
                id: api_config.egg.id.clone(),
                file_denylist: api_config.egg.file_denylist.clone(),
                fix_permissions: false,
            },
            mounts: api_config.mounts.iter().map(|m| MountConfig {
                source: m.source.clone(),
                target: m.target.clone(),
                read_only: m.read_only,
            }).collect(),
            process: ProcessConfig::default(), // Will be filled from process_configuration
            environment,
            installation_script: None,
        }
    }

    /// Build a runnable configuration from an egg-backed instance: the
    /// declarative counterpart to `from_api` for instances configured through
    /// the local egg registry rather than the panel.
    pub fn from_egg_instance(cfg: &crate::egg::InstanceConfig, egg: &crate::egg::Egg) -> Self {
        let invocation = crate::egg::expand(&egg.startup, egg, cfg);
        let environment = crate::egg::build_environment(egg, cfg);

        let mut mappings: HashMap<String, Vec<u16>> = HashMap::new();
        if cfg.is_minecraft() {
            // RCON / query companion port, tcp-only.
            mappings.insert("0.0.0.0".to_string(), vec![cfg.port + 1000]);
        }

        let configs = egg
            .config
            .files
            .iter()
            .map(|(path, file)| ConfigFileEntry {
                parser: file.parser.clone(),
                file: path.clone(),
                replace: file
                    .find
                    .iter()
                    .map(|(key, value_template)| ConfigReplacement {
                        match_pattern: key.clone(),
                        replace_with: crate::egg::expand(value_template, egg, cfg),
                        if_value: None,
                    })
                    .collect(),
            })
            .collect();

        let done = &egg.config.startup.done;

        let installation_script = egg.scripts.installation.as_ref().map(|descriptor| {
            EggInstallationScript {
                container_image: descriptor.container.clone(),
                entrypoint: descriptor.entrypoint.clone(),
                script: descriptor.script.clone(),
            }
        });

        Self {
            uuid: cfg.id.clone(),
            name: cfg.name.clone(),
            suspended: false,
            invocation,
            skip_egg_scripts: egg.scripts.installation.is_none(),
            build: BuildConfig {
                memory_limit: (cfg.plan.ram * 1024) as i64,
                swap: -1,
                io_weight: default_io(),
                cpu_limit: cfg.plan.cpu as i64,
                threads: None,
                disk_space: (cfg.plan.disk * 1024) as i64,
                oom_disabled: false,
            },
            container: ContainerConfig {
                image: crate::egg::choose_image(egg, cfg),
                oom_disabled: false,
                requires_rebuild: false,
            },
            allocations: AllocationsConfig {
                default: Allocation {
                    ip: "0.0.0.0".to_string(),
                    port: cfg.port,
                },
                mappings,
            },
            egg: EggConfig {
                id: egg.id.clone(),
                file_denylist: Vec::new(),
                fix_permissions: false,
            },
            mounts: Vec::new(),
            process: ProcessConfig {
                startup: StartupConfig {
                    done: if done.is_empty() { Vec::new() } else { vec![done.clone()] },
                    user_interaction: Vec::new(),
                    strip_ansi: true,
                },
                stop: stop_config_from_egg(&egg.config.stop),
                configs,
            },
            environment,
            installation_script,
        }
    }

    /// Get all port bindings as (container_port, (host_ip, host_port))
    pub fn get_port_bindings(&self) -> HashMap<u16, (String, u16)> {
        let mut bindings = HashMap::new();

        // Default allocation
        bindings.insert(
            self.allocations.default.port,
            (self.allocations.default.ip.clone(), self.allocations.default.port),
        );

        // Additional mappings
        for (ip, ports) in &self.allocations.mappings {
            for port in ports {
                bindings.insert(*port, (ip.clone(), *port));
            }
        }

        bindings
    }

    /// Calculate memory limit in bytes
    pub fn memory_bytes(&self) -> u64 {
        if self.build.memory_limit <= 0 {
            0 // Unlimited
        } else {
            (self.build.memory_limit as u64) * 1024 * 1024
        }
    }

    /// Calculate swap limit in bytes
    pub fn swap_bytes(&self) -> i64 {
        if self.build.swap <= 0 {
            -1 // Unlimited or same as memory
        } else {
            (self.build.swap as i64) * 1024 * 1024
        }
    }

    /// Calculate CPU quota (microseconds per period)
    pub fn cpu_quota(&self) -> i64 {
        if self.build.cpu_limit <= 0 {
            0 // Unlimited
        } else {
            // CPU limit is percentage, convert to quota
            // With period of 100000us, quota = limit * 1000
            (self.build.cpu_limit * 1000) as i64
        }
    }

    /// Get disk space limit in bytes
    pub fn disk_bytes(&self) -> u64 {
        if self.build.disk_space <= 0 {
            0 // Unlimited
        } else {
            (self.build.disk_space as u64) * 1024 * 1024
        }
    }
}
