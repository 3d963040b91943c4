//! Egg system: declarative server templates, per-instance configuration,
//! template expansion, image resolution, and validation.

mod defaults;
mod image;
mod instance;
mod model;
mod registry;
mod store;
mod template;
mod validate;

pub use defaults::builtin_eggs;
pub use image::{choose_image, ensure_image};
pub use instance::{InstanceConfig, Plan};
pub use model::{Egg, EggConfigFile, EggRuntimeConfig, EggScripts, EggStartupConfig, EggVariable, InstallationScriptDescriptor};
pub use registry::{EggRegistry, RegistryError, RegistryResult};
pub use store::{ConfigStore, StoreError, StoreResult};
pub use template::{build_environment, expand};
pub use validate::{validate, RuleViolation};
