//! Template expander: turns an egg's startup command (or any other
//! templated string) into a literal command against one instance.

use std::collections::HashMap;
use regex::Regex;

use super::instance::InstanceConfig;
use super::model::Egg;

/// Pre-compiled regex for one placeholder family (a literal key, quoted).
fn placeholder_regex(key: &str) -> Regex {
    Regex::new(&format!(r"\{{\{{\s*{}\s*\}}\}}", regex::escape(key))).expect("valid placeholder regex")
}

/// Expand `template` against `egg` + `cfg`. Pure function, no recursive expansion:
/// substituted text is never re-scanned for further placeholders.
pub fn expand(template: &str, egg: &Egg, cfg: &InstanceConfig) -> String {
    let mut out = template.to_string();

    // 1. Per-variable placeholders: {{server.build.env.V.env_variable}} and {{V.env_variable}}
    for var in &egg.variables {
        let value = cfg
            .variables
            .get(&var.env_variable)
            .cloned()
            .unwrap_or_else(|| var.default_value.clone());

        let long_key = format!("server.build.env.{}", var.env_variable);
        out = placeholder_regex(&long_key).replace_all(&out, value.as_str()).into_owned();
        out = placeholder_regex(&var.env_variable).replace_all(&out, value.as_str()).into_owned();
    }

    // 2. System placeholders
    out = placeholder_regex("server.build.default.port")
        .replace_all(&out, cfg.port.to_string().as_str())
        .into_owned();
    out = placeholder_regex("SERVER_PORT")
        .replace_all(&out, cfg.port.to_string().as_str())
        .into_owned();
    out = placeholder_regex("SERVER_MEMORY")
        .replace_all(&out, cfg.memory_mib().to_string().as_str())
        .into_owned();

    // 3. Any remaining {{KEY}} matching cfg.variables directly
    for (key, value) in &cfg.variables {
        out = placeholder_regex(key).replace_all(&out, value.as_str()).into_owned();
    }

    out
}

/// Build the full environment variable map for a container invocation:
/// every egg variable (instance override or default), plus the system values.
pub fn build_environment(egg: &Egg, cfg: &InstanceConfig) -> HashMap<String, String> {
    let mut env = HashMap::new();

    for var in &egg.variables {
        let value = cfg
            .variables
            .get(&var.env_variable)
            .cloned()
            .unwrap_or_else(|| var.default_value.clone());
        env.insert(var.env_variable.clone(), value);
    }

    env.insert("SERVER_PORT".to_string(), cfg.port.to_string());
    env.insert("SERVER_MEMORY".to_string(), cfg.memory_mib().to_string());
    env.insert("P_SERVER_UUID".to_string(), cfg.id.clone());
    env.insert("P_SERVER_LOCATION".to_string(), cfg.location.clone());
    env.insert("STARTUP".to_string(), egg.startup.clone());

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egg::model::{EggRuntimeConfig, EggScripts, EggVariable};
    use std::collections::HashMap;

    fn test_egg() -> Egg {
        Egg {
            id: "terraria".into(),
            name: "Terraria".into(),
            description: String::new(),
            author: String::new(),
            docker_images: HashMap::from([("default".to_string(), "pyro/terraria:latest".to_string())]),
            startup: "./TerrariaServer.bin.x86_64 -port {{SERVER_PORT}} -world {{WORLD_NAME}}".into(),
            config: EggRuntimeConfig::default(),
            scripts: EggScripts::default(),
            variables: vec![EggVariable {
                name: "World Name".into(),
                env_variable: "WORLD_NAME".into(),
                default_value: "world".into(),
                user_viewable: true,
                user_editable: true,
                rules: "required|string".into(),
            }],
        }
    }

    fn test_cfg() -> InstanceConfig {
        InstanceConfig {
            id: "s1".into(),
            egg_id: "terraria".into(),
            port: 7777,
            plan: crate::egg::instance::Plan { ram: 1, cpu: 100, disk: 5 },
            location: "node-1".into(),
            name: "My Server".into(),
            game: "terraria".into(),
            variables: HashMap::from([("WORLD_NAME".to_string(), "PyroWorld".to_string())]),
        }
    }

    #[test]
    fn expands_port_and_variable() {
        let egg = test_egg();
        let cfg = test_cfg();
        let result = expand(&egg.startup, &egg, &cfg);
        assert_eq!(result, "./TerrariaServer.bin.x86_64 -port 7777 -world PyroWorld");
    }

    #[test]
    fn falls_back_to_default_value() {
        let egg = test_egg();
        let mut cfg = test_cfg();
        cfg.variables.clear();
        let result = expand(&egg.startup, &egg, &cfg);
        assert!(result.contains("-world world"));
    }

    #[test]
    fn does_not_recursively_expand() {
        let egg = test_egg();
        let mut cfg = test_cfg();
        cfg.variables.insert("WORLD_NAME".to_string(), "{{SERVER_PORT}}".to_string());
        let result = expand(&egg.startup, &egg, &cfg);
        assert_eq!(result, "./TerrariaServer.bin.x86_64 -port 7777 -world {{SERVER_PORT}}");
    }

    #[test]
    fn builds_full_environment() {
        let egg = test_egg();
        let cfg = test_cfg();
        let env = build_environment(&egg, &cfg);
        assert_eq!(env.get("WORLD_NAME").unwrap(), "PyroWorld");
        assert_eq!(env.get("SERVER_PORT").unwrap(), "7777");
        assert_eq!(env.get("SERVER_MEMORY").unwrap(), "1024");
    }
}
