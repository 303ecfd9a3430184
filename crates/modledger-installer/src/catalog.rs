use std::collections::HashMap;
use std::path::Path;

use modledger_core::{Installer, ModDescriptor, NormalizedPath};

/// Lookup service that maps a stored mod path back to the unit the install
/// engine currently knows about.
pub trait ModCatalog: Send + Sync {
    fn resolve(&self, path: &NormalizedPath) -> Option<ModDescriptor>;
}

/// Catalog that knows no mods; the ledger falls back to persisted metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCatalog;

impl ModCatalog for NoCatalog {
    fn resolve(&self, _path: &NormalizedPath) -> Option<ModDescriptor> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    mods: HashMap<NormalizedPath, ModDescriptor>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: ModDescriptor) -> Option<ModDescriptor> {
        self.mods.insert(descriptor.path.clone(), descriptor)
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

impl FromIterator<ModDescriptor> for StaticCatalog {
    fn from_iter<I: IntoIterator<Item = ModDescriptor>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for descriptor in iter {
            catalog.insert(descriptor);
        }
        catalog
    }
}

impl ModCatalog for StaticCatalog {
    fn resolve(&self, path: &NormalizedPath) -> Option<ModDescriptor> {
        self.mods.get(path).cloned()
    }
}

/// Strips `mods_root` from `path` when `path` lives under it.
pub fn relative_mod_path(mods_root: &Path, path: &NormalizedPath) -> NormalizedPath {
    let root = NormalizedPath::new(&mods_root.to_string_lossy());
    if root.is_empty() {
        return path.clone();
    }

    let root_segments = root.folded().split('/').collect::<Vec<_>>();
    let path_segments = path.as_str().split('/').collect::<Vec<_>>();
    if path_segments.len() <= root_segments.len() {
        return path.clone();
    }

    let under_root = root_segments
        .iter()
        .zip(&path_segments)
        .all(|(root_segment, segment)| *root_segment == segment.to_lowercase());
    if !under_root {
        return path.clone();
    }

    NormalizedPath::new(&path_segments[root_segments.len()..].join("/"))
}

/// Rewrites a mod installer so its identity is relative to `mods_root`.
pub(crate) fn canonical_installer(mods_root: &Path, installer: &Installer) -> Installer {
    match installer {
        Installer::Reserved(_) => installer.clone(),
        Installer::Mod(descriptor) => {
            let mut descriptor = descriptor.clone();
            descriptor.path = relative_mod_path(mods_root, &descriptor.path);
            Installer::Mod(descriptor)
        }
    }
}
