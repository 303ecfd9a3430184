mod buffer;
mod catalog;
mod config;
mod document;
mod install_log;
mod keys;
mod layout;
mod ledger;
mod state;
mod transactions;
mod types;

pub use catalog::{relative_mod_path, ModCatalog, NoCatalog, StaticCatalog};
pub use config::LedgerConfig;
pub use document::INSTALL_LOG_VERSION;
pub use install_log::InstallLog;
pub use layout::{default_ledger_root, LedgerLayout, LEDGER_ROOT_ENV};
pub use ledger::{LedgerTransaction, ModInstallLedger};
pub use transactions::{TransactionId, TransactionOutcome, TransactionParticipant};
pub use types::{LedgerSummary, VersionMismatch};
