//! Image resolver: picks a concrete image reference for an instance and
//! makes sure the engine has it locally before the container is created.

use std::path::Path;

use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::StreamExt;
use tracing::{info, warn};

use super::instance::InstanceConfig;
use super::model::Egg;

const MINECRAFT_IMAGE: &str = "itzg/minecraft-server:latest";

/// Choose the image reference this instance should run under.
///
/// Minecraft-family workloads get a canonical runtime regardless of what the
/// egg declares, since the JVM version has to match the server jar. Everything
/// else prefers a "Java 17" label, then "Java 21", then whatever is first.
pub fn choose_image(egg: &Egg, cfg: &InstanceConfig) -> String {
    if cfg.is_minecraft() {
        if let Some(image) = egg.docker_images.get("Java 17").or_else(|| egg.docker_images.get("Java 21")) {
            return image.clone();
        }
        return MINECRAFT_IMAGE.to_string();
    }

    for label in ["Java 17", "Java 21"] {
        if let Some(image) = egg.docker_images.get(label) {
            return image.clone();
        }
    }

    egg.docker_images
        .values()
        .next()
        .cloned()
        .unwrap_or_else(|| MINECRAFT_IMAGE.to_string())
}

/// Ensure `image_ref` exists locally, pulling it if absent.
///
/// For Minecraft-class workloads this may instead build a local image from a
/// Dockerfile under `build_dir`; on build failure it falls back to
/// `image_ref` and repairs on-host ownership of `instance_dir` so the
/// fallback image (which may run as a different uid) can still write there.
pub async fn ensure_image(
    docker: &Docker,
    image_ref: &str,
    build_dir: Option<&Path>,
    instance_dir: Option<&Path>,
    runtime_uid: u32,
    runtime_gid: u32,
) -> Result<(), bollard::errors::Error> {
    if docker.inspect_image(image_ref).await.is_ok() {
        return Ok(());
    }

    if let Some(dir) = build_dir {
        if dir.join("Dockerfile").exists() {
            match build_local_image(docker, dir, image_ref).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("local image build failed for {}, falling back to pull: {}", image_ref, e);
                    if let Some(instance_dir) = instance_dir {
                        repair_ownership(instance_dir, runtime_uid, runtime_gid);
                    }
                }
            }
        }
    }

    pull_image(docker, image_ref).await
}

async fn pull_image(docker: &Docker, image_ref: &str) -> Result<(), bollard::errors::Error> {
    info!("pulling image {}", image_ref);
    let options = Some(CreateImageOptions {
        from_image: image_ref,
        ..Default::default()
    });

    let mut stream = docker.create_image(options, None, None);
    while let Some(result) = stream.next().await {
        result?;
    }
    Ok(())
}

async fn build_local_image(docker: &Docker, dir: &Path, tag: &str) -> Result<(), bollard::errors::Error> {
    use bollard::image::BuildImageOptions;

    let tarball = build_context_tar(dir)?;
    let options = BuildImageOptions {
        t: tag.to_string(),
        rm: true,
        ..Default::default()
    };

    let mut stream = docker.build_image(options, None, Some(tarball.into()));
    while let Some(result) = stream.next().await {
        result?;
    }
    Ok(())
}

fn build_context_tar(dir: &Path) -> Result<Vec<u8>, bollard::errors::Error> {
    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append_dir_all(".", dir)
        .map_err(bollard::errors::Error::IOError)?;
    builder.into_inner().map_err(bollard::errors::Error::IOError)
}

#[cfg(unix)]
fn repair_ownership(dir: &Path, uid: u32, gid: u32) {
    use std::os::unix::fs::chown;
    if let Err(e) = chown(dir, Some(uid), Some(gid)) {
        warn!("failed to repair ownership of {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn repair_ownership(_dir: &Path, _uid: u32, _gid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::egg::model::{EggRuntimeConfig, EggScripts};
    use crate::egg::instance::Plan;

    fn egg_with(images: &[(&str, &str)]) -> Egg {
        Egg {
            id: "e".into(),
            name: "e".into(),
            description: String::new(),
            author: String::new(),
            docker_images: images.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            startup: String::new(),
            config: EggRuntimeConfig::default(),
            scripts: EggScripts::default(),
            variables: vec![],
        }
    }

    fn cfg(game: &str) -> InstanceConfig {
        InstanceConfig {
            id: "s1".into(),
            egg_id: "e".into(),
            port: 1234,
            plan: Plan { ram: 1, cpu: 100, disk: 1 },
            location: String::new(),
            name: String::new(),
            game: game.into(),
            variables: HashMap::new(),
        }
    }

    #[test]
    fn prefers_java_17_label() {
        let egg = egg_with(&[("Java 21", "img:21"), ("Java 17", "img:17")]);
        assert_eq!(choose_image(&egg, &cfg("rust")), "img:17");
    }

    #[test]
    fn falls_back_to_first_entry() {
        let egg = egg_with(&[("custom", "img:custom")]);
        assert_eq!(choose_image(&egg, &cfg("rust")), "img:custom");
    }

    #[test]
    fn minecraft_special_case_overrides_label_preference() {
        let egg = egg_with(&[("custom", "img:custom")]);
        assert_eq!(choose_image(&egg, &cfg("minecraft")), MINECRAFT_IMAGE);
    }
}
