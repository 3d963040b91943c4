//! Configure command - interactive one-shot setup wizard
//!
//! Walks an operator through the handful of settings that can't be sensibly
//! defaulted (panel URL, node credentials, API bind address) and writes out
//! a `config.toml` the daemon can load on its next run.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};

/// Run the interactive configuration wizard.
pub async fn run() -> Result<()> {
    println!("Pyro Daemon Configuration");
    println!("=========================\n");
    println!("This wizard writes a config.toml for the daemon. Press enter to");
    println!("accept the bracketed default for any prompt.\n");

    let panel_url = prompt("Panel URL", "https://panel.example.com")?;
    let token_id = prompt("Node token ID", "")?;
    let token = prompt("Node token", "")?;

    let api_host = prompt("API bind host", "0.0.0.0")?;
    let api_port = prompt("API bind port", "8080")?;
    let api_port: u16 = api_port
        .parse()
        .with_context(|| format!("invalid port: {}", api_port))?;

    let ssl_enabled = prompt_bool("Enable SSL for the API?", false)?;
    let (ssl_cert, ssl_key) = if ssl_enabled {
        (
            prompt("Path to SSL certificate", "/etc/pyro/ssl/cert.pem")?,
            prompt("Path to SSL key", "/etc/pyro/ssl/key.pem")?,
        )
    } else {
        (String::new(), String::new())
    };

    let root_directory = prompt("Root data directory", ".pyro")?;
    let docker_socket = prompt("Docker socket", "/var/run/docker.sock")?;

    let contents = render_toml(RenderedConfig {
        panel_url,
        token_id,
        token,
        api_host,
        api_port,
        ssl_enabled,
        ssl_cert,
        ssl_key,
        root_directory,
        docker_socket,
    });

    let out_path = prompt("Write configuration to", "config.toml")?;
    if Path::new(&out_path).exists() {
        let overwrite = prompt_bool(&format!("{} already exists. Overwrite?", out_path), false)?;
        if !overwrite {
            println!("Aborted, nothing written.");
            return Ok(());
        }
    }

    std::fs::write(&out_path, contents)
        .with_context(|| format!("failed to write {}", out_path))?;

    println!("\nWrote {}.", out_path);
    println!("Run `pyro-daemon --config {}` to start the daemon.", out_path);

    Ok(())
}

struct RenderedConfig {
    panel_url: String,
    token_id: String,
    token: String,
    api_host: String,
    api_port: u16,
    ssl_enabled: bool,
    ssl_cert: String,
    ssl_key: String,
    root_directory: String,
    docker_socket: String,
}

fn render_toml(c: RenderedConfig) -> String {
    format!(
        r#"# Generated by `pyro-daemon configure`

debug = false

[api]
host = "{api_host}"
port = {api_port}
upload_limit = 100

[api.ssl]
enabled = {ssl_enabled}
cert = "{ssl_cert}"
key = "{ssl_key}"

[system]
root_directory = "{root_directory}"

[docker]
socket = "{docker_socket}"

[remote]
url = "{panel_url}"
token_id = "{token_id}"
token = "{token}"
"#,
        api_host = c.api_host,
        api_port = c.api_port,
        ssl_enabled = c.ssl_enabled,
        ssl_cert = c.ssl_cert,
        ssl_key = c.ssl_key,
        root_directory = c.root_directory,
        docker_socket = c.docker_socket,
        panel_url = c.panel_url,
        token_id = c.token_id,
        token = c.token,
    )
}

/// Prompt with a default value shown in brackets; an empty reply keeps the default.
fn prompt(label: &str, default: &str) -> Result<String> {
    if default.is_empty() {
        print!("{}: ", label);
    } else {
        print!("{} [{}]: ", label, default);
    }
    io::stdout().flush().ok();

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    let line = line.trim();

    if line.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(line.to_string())
    }
}

/// Prompt for a yes/no answer, defaulting as shown.
fn prompt_bool(label: &str, default: bool) -> Result<bool> {
    let hint = if default { "Y/n" } else { "y/N" };
    print!("{} [{}]: ", label, hint);
    io::stdout().flush().ok();

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    let line = line.trim().to_lowercase();

    Ok(match line.as_str() {
        "" => default,
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}
