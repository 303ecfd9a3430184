mod identity;
mod item_ledger;
mod items;
mod path;
mod registry;
mod stack;

pub use identity::{Installer, InstallerId, ModDescriptor, ModKey, ModVersion, ReservedInstaller};
pub use item_ledger::ItemLedger;
pub use items::{DataFilePath, GameValueKey, IniEditKey};
pub use path::{normalize_separators, NormalizedPath};
pub use registry::{ActiveModRegistry, VisibleModsView};
pub use stack::{OwnershipEntry, OwnershipStack};
