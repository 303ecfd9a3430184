use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use modledger_core::{ModDescriptor, ModVersion};
use modledger_installer::StaticCatalog;
use serde::Deserialize;
use tracing::{debug, warn};

const DESCRIPTOR_EXTENSION: &str = ".toml";

/// Contents of a `<mod>.toml` descriptor. The mod path defaults to the
/// descriptor's own path relative to the scanned directory, minus `.toml`.
#[derive(Debug, Deserialize)]
struct DescriptorFile {
    path: Option<String>,
    name: String,
    version: Option<ModVersion>,
}

/// Builds a catalog from every readable descriptor under `dir`.
pub(crate) fn load_descriptor_catalog(dir: &Path) -> Result<StaticCatalog> {
    let mut catalog = StaticCatalog::new();
    collect_descriptors(dir, dir, &mut catalog)?;
    debug!(dir = %dir.display(), mods = catalog.len(), "loaded mod descriptors");
    Ok(catalog)
}

fn collect_descriptors(root: &Path, dir: &Path, catalog: &mut StaticCatalog) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read mod descriptors: {}", dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read mod descriptors: {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_descriptors(root, &path, catalog)?;
            continue;
        }

        let Some(relative) = descriptor_mod_path(root, &path) else {
            continue;
        };
        match parse_descriptor(&path, &relative) {
            Ok(descriptor) => {
                catalog.insert(descriptor);
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "skipping unreadable mod descriptor"
                );
            }
        }
    }
    Ok(())
}

fn descriptor_mod_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.to_string_lossy().to_string();
    let stripped = relative.strip_suffix(DESCRIPTOR_EXTENSION)?;
    if stripped.is_empty() {
        return None;
    }
    Some(stripped.to_string())
}

pub(crate) fn parse_descriptor(path: &Path, default_mod_path: &str) -> Result<ModDescriptor> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read mod descriptor: {}", path.display()))?;
    let file: DescriptorFile = toml::from_str(&raw)
        .with_context(|| format!("failed to parse mod descriptor: {}", path.display()))?;

    let mut descriptor = ModDescriptor::new(
        file.path.as_deref().unwrap_or(default_mod_path),
        &file.name,
    );
    descriptor.version = file.version;
    Ok(descriptor)
}
