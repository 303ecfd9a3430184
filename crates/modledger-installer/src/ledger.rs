use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use modledger_core::{Installer, InstallerId, ModKey, OwnershipStack, VisibleModsView};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::buffer::{TrackedKind, TransactionBuffer};
use crate::catalog::{canonical_installer, relative_mod_path, ModCatalog};
use crate::document::{read_install_log, write_install_log, INSTALL_LOG_VERSION};
use crate::keys::{generate_key, random_key_candidate};
use crate::state::LedgerState;
use crate::transactions::{
    TableInner, TransactionId, TransactionOutcome, TransactionParticipant, TransactionTable,
};
use crate::{InstallLog, LedgerConfig, LedgerLayout, LedgerSummary, VersionMismatch};

/// Record of which installer owns every tracked file, settings edit and game value.
///
/// Writes made through the ledger itself commit immediately. Writes made
/// through a [`LedgerTransaction`] are buffered until the transaction is
/// committed or rolled back.
pub struct ModInstallLedger {
    layout: LedgerLayout,
    config: LedgerConfig,
    mods_root: PathBuf,
    catalog: Box<dyn ModCatalog>,
    durable: RwLock<LedgerState>,
    transactions: TransactionTable,
}

impl ModInstallLedger {
    pub fn open(layout: LedgerLayout, catalog: impl ModCatalog + 'static) -> Result<Self> {
        let config = LedgerConfig::load(&layout)?;
        Self::open_with_config(layout, config, catalog)
    }

    /// Loads the install log, creating an empty one when none exists.
    /// Fails on a version mismatch or a structurally invalid log.
    pub fn open_with_config(
        layout: LedgerLayout,
        config: LedgerConfig,
        catalog: impl ModCatalog + 'static,
    ) -> Result<Self> {
        let path = layout.install_log_path();
        let (mut state, created) = match read_install_log(&path)? {
            Some(state) => (state, false),
            None => (LedgerState::default(), true),
        };
        let added_sentinels = state.ensure_reserved_installers(config.key_length);
        if created || added_sentinels {
            write_install_log(&path, &state, config.pretty)?;
        }

        if created {
            info!(path = %path.display(), "created install log");
        } else {
            info!(
                path = %path.display(),
                mods = state.registry.len(),
                items = state.item_count(),
                "loaded install log"
            );
        }

        let mods_root = config.mods_root(&layout);
        Ok(Self {
            layout,
            config,
            mods_root,
            catalog: Box::new(catalog),
            durable: RwLock::new(state),
            transactions: TransactionTable::default(),
        })
    }

    pub fn layout(&self) -> &LedgerLayout {
        &self.layout
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn mods_root(&self) -> &Path {
        &self.mods_root
    }

    pub fn begin_transaction(&self) -> TransactionId {
        let txid = self.transactions.begin();
        debug!(%txid, "began install transaction");
        txid
    }

    /// Handle for issuing ledger calls inside `txid`.
    pub fn transaction(&self, txid: TransactionId) -> LedgerTransaction<'_> {
        LedgerTransaction { ledger: self, txid }
    }

    pub fn open_transactions(&self) -> Vec<TransactionId> {
        self.transactions.lock().open_ids()
    }

    pub fn commit_transaction(&self, txid: TransactionId) -> Result<()> {
        match self.commit(txid) {
            TransactionOutcome::Failed(reason) => Err(anyhow!(reason)),
            _ => Ok(()),
        }
    }

    pub fn rollback_transaction(&self, txid: TransactionId) {
        self.rollback(txid);
    }

    pub fn visible_mods(&self) -> VisibleModsView {
        self.durable.read().registry.visible_mods()
    }

    /// The unit the catalog currently knows for `id`, or the recorded placeholder.
    pub fn live_mod(&self, id: &InstallerId) -> Option<Installer> {
        let recorded = {
            let durable = self.durable.read();
            let key = durable.registry.key_of(&self.canonical_id(id))?;
            durable.registry.mod_of(key)?.clone()
        };
        Some(self.resolve_live(recorded))
    }

    pub(crate) fn resolve_live(&self, recorded: Installer) -> Installer {
        match &recorded {
            Installer::Reserved(_) => recorded,
            Installer::Mod(descriptor) => match self.catalog.resolve(&descriptor.path) {
                Some(live) => Installer::Mod(live),
                None => recorded,
            },
        }
    }

    /// Registered mods whose version on disk differs from the one recorded at install time.
    pub fn mismatched_versions(&self) -> Vec<VersionMismatch> {
        let durable = self.durable.read();
        durable
            .registry
            .iter()
            .filter_map(|(key, installer)| {
                let recorded = installer.as_mod()?;
                let current = self.catalog.resolve(&recorded.path)?;
                let same = match (&recorded.version, &current.version) {
                    (Some(installed), Some(now)) => installed.matches(now),
                    (None, None) => true,
                    _ => false,
                };
                if same {
                    return None;
                }
                Some(VersionMismatch {
                    key: key.clone(),
                    installed: recorded.clone(),
                    current,
                })
            })
            .collect()
    }

    /// Counts of what the committed ledger tracks.
    pub fn summary(&self) -> LedgerSummary {
        let durable = self.durable.read();
        LedgerSummary {
            file_version: INSTALL_LOG_VERSION.to_string(),
            registered_mods: durable.registry.len(),
            visible_mods: durable.registry.visible_mods().len(),
            data_files: durable.data_files.len(),
            ini_edits: durable.ini_edits.len(),
            game_values: durable.game_values.len(),
        }
    }

    /// Drops every open transaction without committing it.
    pub fn release(self) {
        let mut table = self.transactions.lock();
        let open = table.open_ids();
        for txid in &open {
            table.close(*txid);
        }
        if !open.is_empty() {
            warn!(
                discarded = open.len(),
                "released install ledger with open transactions"
            );
        }
    }

    pub(crate) fn canonical(&self, installer: &Installer) -> Installer {
        canonical_installer(&self.mods_root, installer)
    }

    pub(crate) fn canonical_id(&self, id: &InstallerId) -> InstallerId {
        match id {
            InstallerId::Reserved(_) => id.clone(),
            InstallerId::Mod(path) => InstallerId::Mod(relative_mod_path(&self.mods_root, path)),
        }
    }

    /// Runs `op` against the buffer for `txid`, or against a throwaway buffer
    /// that is committed straight away when `txid` is `None`.
    pub(crate) fn write<R>(
        &self,
        txid: Option<TransactionId>,
        op: impl FnOnce(&mut BufferWriter<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut table = self.transactions.lock();
        match txid {
            Some(txid) => {
                let mut buffer = table.checkout(txid)?;
                let result = {
                    let durable = self.durable.read();
                    let mut writer = BufferWriter {
                        buffer: &mut buffer,
                        durable: &durable,
                        table: &table,
                        key_length: self.config.key_length,
                    };
                    op(&mut writer)
                };
                table.checkin(txid, buffer);
                result
            }
            None => {
                let mut buffer = TransactionBuffer::default();
                let result = {
                    let durable = self.durable.read();
                    let mut writer = BufferWriter {
                        buffer: &mut buffer,
                        durable: &durable,
                        table: &table,
                        key_length: self.config.key_length,
                    };
                    op(&mut writer)?
                };
                if !buffer.is_empty() {
                    self.merge_and_persist(&buffer)?;
                }
                Ok(result)
            }
        }
    }

    pub(crate) fn read<R>(
        &self,
        txid: Option<TransactionId>,
        op: impl FnOnce(&TransactionBuffer, &LedgerState) -> R,
    ) -> R {
        let table = self.transactions.lock();
        let durable = self.durable.read();
        match txid.and_then(|txid| table.buffer(txid)) {
            Some(buffer) => op(buffer, &durable),
            None => op(&TransactionBuffer::default(), &durable),
        }
    }

    pub(crate) fn merged_stack<K: TrackedKind>(
        &self,
        txid: Option<TransactionId>,
        item: &K::Item,
    ) -> (OwnershipStack<K::Value>, Vec<Option<Installer>>) {
        self.read(txid, |buffer, durable| {
            let stack = buffer.merged_stack::<K>(durable, item);
            let installers = stack
                .keys()
                .map(|key| buffer.installer_for(durable, key))
                .collect();
            (stack, installers)
        })
    }

    fn merge_and_persist(&self, buffer: &TransactionBuffer) -> Result<()> {
        let mut durable = self.durable.write();
        buffer.merge_into(&mut durable);
        let path = self.layout.install_log_path();
        write_install_log(&path, &durable, self.config.pretty)
    }
}

impl InstallLog for ModInstallLedger {
    fn ledger(&self) -> &ModInstallLedger {
        self
    }

    fn transaction_id(&self) -> Option<TransactionId> {
        None
    }
}

impl TransactionParticipant for ModInstallLedger {
    fn prepare(&self, txid: TransactionId) -> TransactionOutcome {
        if self.transactions.lock().is_open(txid) {
            TransactionOutcome::Prepared
        } else {
            TransactionOutcome::Failed(format!("transaction {txid} is not open"))
        }
    }

    fn commit(&self, txid: TransactionId) -> TransactionOutcome {
        let mut table = self.transactions.lock();
        let Some(buffer) = table.close(txid) else {
            return TransactionOutcome::Failed(format!("transaction {txid} is not open"));
        };
        let Some(buffer) = buffer.filter(|buffer| !buffer.is_empty()) else {
            debug!(%txid, "committed install transaction without ledger changes");
            return TransactionOutcome::Committed;
        };

        match self.merge_and_persist(&buffer) {
            Ok(()) => {
                info!(%txid, "committed install transaction");
                TransactionOutcome::Committed
            }
            Err(err) => {
                error!(%txid, error = %format!("{err:#}"), "failed to persist install transaction");
                TransactionOutcome::Failed(format!("{err:#}"))
            }
        }
    }

    fn rollback(&self, txid: TransactionId) -> TransactionOutcome {
        let mut table = self.transactions.lock();
        match table.close(txid) {
            Some(_) => info!(%txid, "rolled back install transaction"),
            None => debug!(%txid, "rollback requested for closed transaction"),
        }
        TransactionOutcome::RolledBack
    }
}

/// A buffer plus read access to everything needed to allocate keys safely.
pub(crate) struct BufferWriter<'a> {
    pub(crate) buffer: &'a mut TransactionBuffer,
    pub(crate) durable: &'a LedgerState,
    table: &'a TableInner,
    key_length: usize,
}

impl BufferWriter<'_> {
    /// Key for `installer`, registering it in the buffer when it has none.
    pub(crate) fn key_for(&mut self, installer: &Installer, hidden: bool) -> ModKey {
        let id = installer.id();
        if let Some(key) = self.buffer.assigned_key(self.durable, &id) {
            if self.buffer.key_of(self.durable, &id).is_none() {
                // Marked for removal in this buffer; the durable visibility comes back with it.
                let was_hidden = self.durable.registry.key_of(&id) == Some(&key)
                    && self.durable.registry.is_mod_hidden(&id);
                self.buffer
                    .register(installer.clone(), key.clone(), hidden || was_hidden);
            }
            return key;
        }

        let key = self.allocate_key();
        debug!(installer = %id, %key, "assigned mod key");
        self.buffer.register(installer.clone(), key.clone(), hidden);
        key
    }

    pub(crate) fn allocate_key(&self) -> ModKey {
        generate_key(
            || random_key_candidate(self.key_length),
            |candidate| {
                self.durable.registry.key_exists(candidate)
                    || self.buffer.key_taken(candidate)
                    || self.table.buffers().any(|other| other.key_taken(candidate))
            },
        )
    }

    pub(crate) fn existing_key(&self, id: &InstallerId) -> Option<ModKey> {
        self.buffer.key_of(self.durable, id)
    }
}

/// Transaction-scoped view of a [`ModInstallLedger`].
///
/// Dropping the handle leaves the transaction open; finish it with
/// [`LedgerTransaction::commit`] or [`LedgerTransaction::rollback`], or let a
/// coordinator drive it through [`TransactionParticipant`].
#[derive(Clone, Copy)]
pub struct LedgerTransaction<'a> {
    ledger: &'a ModInstallLedger,
    txid: TransactionId,
}

impl LedgerTransaction<'_> {
    pub fn id(&self) -> TransactionId {
        self.txid
    }

    pub fn prepare(&self) -> TransactionOutcome {
        self.ledger.prepare(self.txid)
    }

    pub fn commit(self) -> Result<()> {
        self.ledger.commit_transaction(self.txid)
    }

    pub fn rollback(self) {
        self.ledger.rollback_transaction(self.txid);
    }
}

impl InstallLog for LedgerTransaction<'_> {
    fn ledger(&self) -> &ModInstallLedger {
        self.ledger
    }

    fn transaction_id(&self) -> Option<TransactionId> {
        Some(self.txid)
    }
}
