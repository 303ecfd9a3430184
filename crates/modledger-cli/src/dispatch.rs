use std::path::PathBuf;

use anyhow::{bail, Result};
use modledger_core::{IniEditKey, InstallerId};
use modledger_installer::{
    default_ledger_root, InstallLog, LedgerLayout, ModCatalog, ModInstallLedger, NoCatalog,
};

use crate::catalog::load_descriptor_catalog;
use crate::render::{
    current_output_style, format_mismatch_lines, format_mod_lines, format_owned_lines,
    format_owner_lines, format_summary_lines, render_status_line, ModListing, OutputStyle,
};
use crate::{Cli, Commands, OwnedItem};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let layout = LedgerLayout::new(resolve_root(cli.root)?);
    for line in run_command(&layout, cli.command, current_output_style())? {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => default_ledger_root(),
    }
}

pub(crate) fn run_command(
    layout: &LedgerLayout,
    command: Commands,
    style: OutputStyle,
) -> Result<Vec<String>> {
    match command {
        Commands::Mods { all } => {
            let ledger = open_ledger(layout, NoCatalog)?;
            Ok(format_mod_lines(&list_mods(&ledger, all), style))
        }
        Commands::Owners { item } => {
            let ledger = open_ledger(layout, NoCatalog)?;
            let (label, installers) = match item {
                OwnedItem::File { path } => {
                    let installers = ledger.file_installers(&path);
                    (path, installers)
                }
                OwnedItem::Ini { file, section, key } => {
                    let edit = IniEditKey::new(&file, &section, &key);
                    (edit.to_string(), ledger.ini_edit_installers(&edit))
                }
                OwnedItem::Value { key } => {
                    let installers = ledger.game_value_installers(&key);
                    (key, installers)
                }
            };
            Ok(format_owner_lines(&label, &installers))
        }
        Commands::Owned { mod_path } => {
            let ledger = open_ledger(layout, NoCatalog)?;
            let id = InstallerId::parse(&mod_path);
            if ledger.mod_key(&id).is_none() {
                bail!("mod is not registered: {mod_path}");
            }
            let files = ledger
                .installed_files(&id)
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            let ini_edits = ledger
                .installed_ini_edits(&id)
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            let game_values = ledger.installed_game_values(&id);
            Ok(format_owned_lines(style, &files, &ini_edits, &game_values))
        }
        Commands::Outdated { mods_dir } => {
            let catalog = load_descriptor_catalog(&mods_dir)?;
            let ledger = open_ledger(layout, catalog)?;
            Ok(format_mismatch_lines(&ledger.mismatched_versions(), style))
        }
        Commands::Forget { mod_path } => {
            let ledger = open_ledger(layout, NoCatalog)?;
            let id = InstallerId::parse(&mod_path);
            let line = if ledger.remove_mod(&id)? {
                render_status_line(style, "ok", &format!("forgot {id}"))
            } else {
                render_status_line(style, "warn", &format!("mod is not registered: {id}"))
            };
            Ok(vec![line])
        }
        Commands::Verify => {
            let ledger = open_ledger(layout, NoCatalog)?;
            let log_path = layout.install_log_path();
            Ok(format_summary_lines(
                &ledger.summary(),
                &log_path.display().to_string(),
            ))
        }
    }
}

fn open_ledger(
    layout: &LedgerLayout,
    catalog: impl ModCatalog + 'static,
) -> Result<ModInstallLedger> {
    ModInstallLedger::open(layout.clone(), catalog)
}

fn list_mods(ledger: &ModInstallLedger, all: bool) -> Vec<ModListing> {
    if all {
        return ledger
            .registered_mods()
            .into_iter()
            .map(|(key, installer)| ModListing {
                hidden: ledger.is_mod_hidden(&installer.id()),
                key,
                installer,
            })
            .collect();
    }

    ledger
        .visible_mods()
        .snapshot()
        .into_iter()
        .filter_map(|installer| {
            let key = ledger.mod_key(&installer.id())?;
            Some(ModListing {
                key,
                installer,
                hidden: false,
            })
        })
        .collect()
}

