//! Built-in egg descriptors used to seed a fresh eggs directory.

use std::collections::HashMap;

use super::model::{Egg, EggConfigFile, EggRuntimeConfig, EggScripts, EggStartupConfig, EggVariable, InstallationScriptDescriptor};

pub fn builtin_eggs() -> Vec<Egg> {
    vec![minecraft_java(), terraria()]
}

fn minecraft_java() -> Egg {
    Egg {
        id: "minecraft-java".into(),
        name: "Minecraft: Java Edition".into(),
        description: "Vanilla/Paper-compatible Java Edition server".into(),
        author: "pyro".into(),
        docker_images: HashMap::from([
            ("Java 21".to_string(), "itzg/minecraft-server:java21".to_string()),
            ("Java 17".to_string(), "itzg/minecraft-server:java17".to_string()),
        ]),
        startup: "java -Xms128M -Xmx{{SERVER_MEMORY}}M -jar server.jar nogui".into(),
        config: EggRuntimeConfig {
            files: HashMap::from([(
                "server.properties".to_string(),
                EggConfigFile {
                    parser: "properties".into(),
                    find: HashMap::from([
                        ("server-port".to_string(), "{{server.build.default.port}}".to_string()),
                        ("max-players".to_string(), "{{MAX_PLAYERS}}".to_string()),
                        ("motd".to_string(), "{{SERVER_MOTD}}".to_string()),
                    ]),
                },
            )]),
            startup: EggStartupConfig { done: "Done (".to_string() },
            stop: "stop".to_string(),
        },
        scripts: EggScripts {
            installation: Some(InstallationScriptDescriptor {
                script: "#!/bin/bash\nset -e\ncurl -o server.jar \"$SERVER_JAR_URL\"\necho eula=true > eula.txt\n".to_string(),
                container: "itzg/minecraft-server:java21".to_string(),
                entrypoint: "bash".to_string(),
            }),
        },
        variables: vec![
            EggVariable {
                name: "Server Jar URL".into(),
                env_variable: "SERVER_JAR_URL".into(),
                default_value: String::new(),
                user_viewable: true,
                user_editable: true,
                rules: "required|string".into(),
            },
            EggVariable {
                name: "Max Players".into(),
                env_variable: "MAX_PLAYERS".into(),
                default_value: "20".into(),
                user_viewable: true,
                user_editable: true,
                rules: "required|numeric|between:1,200".into(),
            },
            EggVariable {
                name: "Server MOTD".into(),
                env_variable: "SERVER_MOTD".into(),
                default_value: "A Pyro Minecraft Server".into(),
                user_viewable: true,
                user_editable: true,
                rules: "nullable|string".into(),
            },
        ],
    }
}

fn terraria() -> Egg {
    Egg {
        id: "terraria".into(),
        name: "Terraria".into(),
        description: "Vanilla Terraria dedicated server".into(),
        author: "pyro".into(),
        docker_images: HashMap::from([("default".to_string(), "ryshe/terraria:latest".to_string())]),
        startup: "./TerrariaServer.bin.x86_64 -port {{SERVER_PORT}} -world {{WORLD_NAME}} -maxplayers {{MAX_PLAYERS}}".into(),
        config: EggRuntimeConfig {
            files: HashMap::from([(
                "serverconfig.txt".to_string(),
                EggConfigFile {
                    parser: "properties".into(),
                    find: HashMap::from([
                        ("worldname".to_string(), "{{WORLD_NAME}}".to_string()),
                        ("port".to_string(), "{{server.build.default.port}}".to_string()),
                        ("maxplayers".to_string(), "{{MAX_PLAYERS}}".to_string()),
                    ]),
                },
            )]),
            startup: EggStartupConfig { done: "Type 'help' for a list of commands".to_string() },
            stop: "exit".to_string(),
        },
        scripts: EggScripts { installation: None },
        variables: vec![
            EggVariable {
                name: "World Name".into(),
                env_variable: "WORLD_NAME".into(),
                default_value: "world".into(),
                user_viewable: true,
                user_editable: true,
                rules: "required|string".into(),
            },
            EggVariable {
                name: "Max Players".into(),
                env_variable: "MAX_PLAYERS".into(),
                default_value: "8".into(),
                user_viewable: true,
                user_editable: true,
                rules: "required|numeric|between:1,255".into(),
            },
        ],
    }
}
