use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::path::NormalizedPath;

/// Installer identities that exist in every ledger and never map to a real mod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReservedInstaller {
    /// The value that was on disk before any mod touched the item.
    OriginalValue,
    /// A value written by the mod manager itself.
    ModManagerValue,
}

impl ReservedInstaller {
    pub const ALL: [Self; 2] = [Self::OriginalValue, Self::ModManagerValue];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::OriginalValue => "ORIGINAL_VALUE",
            Self::ModManagerValue => "MOD_MANAGER_VALUE",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::OriginalValue => "Original Value",
            Self::ModManagerValue => "Mod Manager Value",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "ORIGINAL_VALUE" => Some(Self::OriginalValue),
            "MOD_MANAGER_VALUE" => Some(Self::ModManagerValue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstallerId {
    Reserved(ReservedInstaller),
    Mod(NormalizedPath),
}

impl InstallerId {
    /// Maps a persisted `path` back to an identity; sentinel file names win.
    pub fn parse(path: &str) -> Self {
        match ReservedInstaller::parse(path) {
            Some(reserved) => Self::Reserved(reserved),
            None => Self::Mod(NormalizedPath::new(path)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Reserved(reserved) => reserved.file_name(),
            Self::Mod(path) => path.as_str(),
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved(_))
    }
}

impl fmt::Display for InstallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ReservedInstaller> for InstallerId {
    fn from(value: ReservedInstaller) -> Self {
        Self::Reserved(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModVersion {
    #[serde(default)]
    pub machine: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl ModVersion {
    pub fn new(machine: Option<&str>, text: &str) -> Self {
        Self {
            machine: machine.map(ToOwned::to_owned),
            text: text.to_string(),
        }
    }

    /// Compares machine versions when both sides carry one, display text otherwise.
    pub fn matches(&self, other: &ModVersion) -> bool {
        match (&self.machine, &other.machine) {
            (Some(left), Some(right)) => left.trim() == right.trim(),
            _ => self.text.trim() == other.text.trim(),
        }
    }
}

impl fmt::Display for ModVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.machine, self.text.is_empty()) {
            (Some(machine), true) => f.write_str(machine),
            (Some(machine), false) if machine != &self.text => {
                write!(f, "{} ({machine})", self.text)
            }
            _ => f.write_str(&self.text),
        }
    }
}

/// What the ledger knows about an installable unit: identity plus display metadata.
///
/// Equality and hashing only look at `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModDescriptor {
    pub path: NormalizedPath,
    pub name: String,
    #[serde(default)]
    pub version: Option<ModVersion>,
}

impl ModDescriptor {
    pub fn new(path: &str, name: &str) -> Self {
        Self {
            path: NormalizedPath::new(path),
            name: name.to_string(),
            version: None,
        }
    }

    pub fn with_version(mut self, machine: Option<&str>, text: &str) -> Self {
        self.version = Some(ModVersion::new(machine, text));
        self
    }
}

impl PartialEq for ModDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ModDescriptor {}

impl Hash for ModDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Installer {
    Reserved(ReservedInstaller),
    Mod(ModDescriptor),
}

impl Installer {
    pub const ORIGINAL_VALUE: Installer = Installer::Reserved(ReservedInstaller::OriginalValue);
    pub const MOD_MANAGER_VALUE: Installer =
        Installer::Reserved(ReservedInstaller::ModManagerValue);

    pub fn id(&self) -> InstallerId {
        match self {
            Self::Reserved(reserved) => InstallerId::Reserved(*reserved),
            Self::Mod(descriptor) => InstallerId::Mod(descriptor.path.clone()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Reserved(reserved) => reserved.display_name(),
            Self::Mod(descriptor) => &descriptor.name,
        }
    }

    pub fn version(&self) -> Option<&ModVersion> {
        match self {
            Self::Reserved(_) => None,
            Self::Mod(descriptor) => descriptor.version.as_ref(),
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved(_))
    }

    pub fn as_mod(&self) -> Option<&ModDescriptor> {
        match self {
            Self::Reserved(_) => None,
            Self::Mod(descriptor) => Some(descriptor),
        }
    }
}

impl From<ModDescriptor> for Installer {
    fn from(value: ModDescriptor) -> Self {
        Self::Mod(value)
    }
}

impl From<ReservedInstaller> for Installer {
    fn from(value: ReservedInstaller) -> Self {
        Self::Reserved(value)
    }
}

impl fmt::Display for Installer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Short opaque identifier the ledger assigns to each registered installer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModKey(String);

impl ModKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
