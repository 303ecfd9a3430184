use super::*;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::error::ErrorKind;
use modledger_core::{IniEditKey, Installer, ModDescriptor, ModKey};
use modledger_installer::{
    InstallLog, LedgerLayout, LedgerSummary, ModCatalog, ModInstallLedger, NoCatalog,
};

use crate::catalog::{load_descriptor_catalog, parse_descriptor};
use crate::dispatch::{resolve_root, run_command};
use crate::render::{
    format_mod_lines, format_owner_lines, format_summary_lines, render_status_line,
    resolve_output_style, ModListing, OutputStyle,
};

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_layout() -> LedgerLayout {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "modledger-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    LedgerLayout::new(path)
}

fn seed_ledger(layout: &LedgerLayout) {
    let ledger = ModInstallLedger::open(layout.clone(), NoCatalog).expect("must open ledger");
    let armor = Installer::Mod(
        ModDescriptor::new("armor.fomod", "Better Armor").with_version(Some("1.0"), "1.0"),
    );
    let sky = Installer::Mod(ModDescriptor::new("sky.fomod", "Sky"));
    let patch = Installer::Mod(ModDescriptor::new("patch.fomod", "Patch"));

    ledger.register_mod(&armor).expect("must register armor");
    ledger.register_mod(&sky).expect("must register sky");
    ledger
        .register_hidden_mod(&patch)
        .expect("must register patch");
    ledger
        .add_data_file(&armor, "meshes/armor.nif")
        .expect("must add file");
    ledger
        .add_data_file(&sky, "meshes/armor.nif")
        .expect("must add file");
    ledger
        .add_ini_edit(&armor, &IniEditKey::new("game.ini", "Display", "Width"), "1920")
        .expect("must add edit");
    ledger
        .add_game_value_edit(&armor, "load-order", &[1, 2])
        .expect("must add value");
}

#[test]
fn cli_parses_nested_owner_queries() {
    let cli = Cli::try_parse_from([
        "modledger",
        "--root",
        "/tmp/ledger",
        "owners",
        "ini",
        "game.ini",
        "Display",
        "Width",
    ])
    .expect("must parse");
    assert_eq!(cli.root, Some(PathBuf::from("/tmp/ledger")));
    match cli.command {
        Commands::Owners {
            item: OwnedItem::Ini { file, section, key },
        } => {
            assert_eq!(file, "game.ini");
            assert_eq!(section, "Display");
            assert_eq!(key, "Width");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_accepts_root_after_subcommand() {
    let cli = Cli::try_parse_from(["modledger", "mods", "--all", "--root", "/srv/ledger"])
        .expect("must parse");
    assert_eq!(cli.root, Some(PathBuf::from("/srv/ledger")));
    assert!(matches!(cli.command, Commands::Mods { all: true }));
}

#[test]
fn cli_requires_mods_dir_for_outdated() {
    let err = Cli::try_parse_from(["modledger", "outdated"]).expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn explicit_root_wins() {
    assert_eq!(
        resolve_root(Some(PathBuf::from("/opt/ledger"))).expect("must resolve"),
        PathBuf::from("/opt/ledger")
    );
}

#[test]
fn resolve_output_style_respects_tty_and_no_color() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(true, true), OutputStyle::Plain);
    assert_eq!(resolve_output_style(false, false), OutputStyle::Plain);
}

#[test]
fn render_status_line_badges_only_in_rich_mode() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "forgot sky.fomod"),
        "forgot sky.fomod"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "forgot sky.fomod"),
        "[OK] forgot sky.fomod"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "mod is not registered"),
        "[WARN] mod is not registered"
    );
}

#[test]
fn owner_lines_mark_current_owner() {
    let installers = vec![
        Installer::ORIGINAL_VALUE,
        Installer::Mod(ModDescriptor::new("sky.fomod", "Sky")),
    ];
    assert_eq!(
        format_owner_lines("textures/sky.dds", &installers),
        vec![
            "textures/sky.dds:",
            "  1. Original Value (ORIGINAL_VALUE)",
            "  2. Sky (sky.fomod) (current)",
        ]
    );
    assert_eq!(
        format_owner_lines("textures/sky.dds", &[]),
        vec!["No installer owns textures/sky.dds"]
    );
}

#[test]
fn mod_lines_tag_hidden_mods_in_plain_mode() {
    let listings = vec![
        ModListing {
            key: ModKey::new("aaaaaaaaaaa"),
            installer: Installer::Mod(
                ModDescriptor::new("armor.fomod", "Armor").with_version(None, "2.0"),
            ),
            hidden: false,
        },
        ModListing {
            key: ModKey::new("bbbbbbbbbbb"),
            installer: Installer::MOD_MANAGER_VALUE,
            hidden: true,
        },
    ];
    assert_eq!(
        format_mod_lines(&listings, OutputStyle::Plain),
        vec![
            "aaaaaaaaaaa Armor 2.0 (armor.fomod)",
            "bbbbbbbbbbb Mod Manager Value (MOD_MANAGER_VALUE) [hidden]",
        ]
    );
    assert_eq!(
        format_mod_lines(&[], OutputStyle::Plain),
        vec!["No mods registered"]
    );
}

#[test]
fn summary_lines_list_counts() {
    let summary = LedgerSummary {
        file_version: "0.5.0.0".to_string(),
        registered_mods: 4,
        visible_mods: 2,
        data_files: 3,
        ini_edits: 1,
        game_values: 0,
    };
    let lines = format_summary_lines(&summary, "/tmp/install_log.json");
    assert_eq!(lines[1], "version: 0.5.0.0");
    assert_eq!(lines[2], "mods: 4 registered, 2 visible");
    assert_eq!(lines[5], "game values: 0");
}

#[test]
fn mods_command_lists_visible_or_all() {
    let layout = test_layout();
    seed_ledger(&layout);

    let visible = run_command(&layout, Commands::Mods { all: false }, OutputStyle::Plain)
        .expect("must list mods");
    assert_eq!(visible.len(), 2);
    assert!(visible[0].ends_with("Better Armor 1.0 (armor.fomod)"));
    assert!(visible[1].ends_with("Sky (sky.fomod)"));

    let all = run_command(&layout, Commands::Mods { all: true }, OutputStyle::Plain)
        .expect("must list mods");
    assert_eq!(all.len(), 5);
    assert!(all
        .iter()
        .any(|line| line.ends_with("Patch (patch.fomod) [hidden]")));
    assert!(all
        .iter()
        .any(|line| line.ends_with("Original Value (ORIGINAL_VALUE) [hidden]")));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn owners_and_owned_commands_report_stacks() {
    let layout = test_layout();
    seed_ledger(&layout);

    let owners = run_command(
        &layout,
        Commands::Owners {
            item: OwnedItem::File {
                path: "Meshes\\Armor.nif".to_string(),
            },
        },
        OutputStyle::Plain,
    )
    .expect("must list owners");
    assert_eq!(
        owners[1..],
        [
            "  1. Better Armor 1.0 (armor.fomod)".to_string(),
            "  2. Sky (sky.fomod) (current)".to_string(),
        ]
    );

    let owned = run_command(
        &layout,
        Commands::Owned {
            mod_path: "armor.fomod".to_string(),
        },
        OutputStyle::Plain,
    )
    .expect("must list owned items");
    assert_eq!(
        owned,
        vec![
            "data files: 1",
            "  meshes/armor.nif",
            "ini edits: 1",
            "  game.ini [Display] Width",
            "game values: 1",
            "  load-order",
        ]
    );

    assert!(run_command(
        &layout,
        Commands::Owned {
            mod_path: "missing.fomod".to_string(),
        },
        OutputStyle::Plain,
    )
    .is_err());

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn forget_command_removes_mod_once() {
    let layout = test_layout();
    seed_ledger(&layout);

    let forget = || {
        run_command(
            &layout,
            Commands::Forget {
                mod_path: "sky.fomod".to_string(),
            },
            OutputStyle::Plain,
        )
        .expect("must forget")
    };
    assert_eq!(forget(), vec!["forgot sky.fomod"]);
    assert_eq!(forget(), vec!["mod is not registered: sky.fomod"]);

    let ledger = ModInstallLedger::open(layout.clone(), NoCatalog).expect("must open ledger");
    assert_eq!(
        ledger
            .current_file_owner("meshes/armor.nif")
            .map(|installer| installer.name().to_string()),
        Some("Better Armor".to_string())
    );

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn verify_command_prints_version_and_counts() {
    let layout = test_layout();
    seed_ledger(&layout);

    let lines =
        run_command(&layout, Commands::Verify, OutputStyle::Plain).expect("must verify");
    assert_eq!(lines[1], "version: 0.5.0.0");
    assert_eq!(lines[2], "mods: 5 registered, 2 visible");
    assert_eq!(lines[3], "data files: 1");

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn outdated_command_compares_against_descriptors() {
    let layout = test_layout();
    seed_ledger(&layout);
    let descriptors = layout.root().join("descriptors");
    fs::create_dir_all(&descriptors).expect("must create descriptors");
    fs::write(
        descriptors.join("armor.fomod.toml"),
        "name = \"Better Armor\"\n\n[version]\nmachine = \"1.1\"\ntext = \"1.1\"\n",
    )
    .expect("must write descriptor");
    fs::write(descriptors.join("sky.fomod.toml"), "not = [valid").expect("must write");

    let lines = run_command(
        &layout,
        Commands::Outdated {
            mods_dir: descriptors.clone(),
        },
        OutputStyle::Plain,
    )
    .expect("must compare versions");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Better Armor ("));
    assert!(lines[0].ends_with("installed 1.0, available 1.1"));

    let _ = fs::remove_dir_all(layout.root());
}

#[test]
fn descriptor_catalog_uses_relative_paths_and_skips_bad_files() {
    let layout = test_layout();
    let dir = layout.root().join("descriptors");
    fs::create_dir_all(dir.join("armor")).expect("must create dirs");
    fs::write(
        dir.join("armor").join("plate.fomod.toml"),
        "name = \"Plate\"\n",
    )
    .expect("must write descriptor");
    fs::write(
        dir.join("renamed.toml"),
        "path = \"elsewhere/renamed.fomod\"\nname = \"Renamed\"\n",
    )
    .expect("must write descriptor");
    fs::write(dir.join("broken.toml"), "name = ").expect("must write descriptor");
    fs::write(dir.join("readme.txt"), "ignored").expect("must write file");

    let catalog = load_descriptor_catalog(&dir).expect("must load catalog");
    assert_eq!(catalog.len(), 2);
    let plate = catalog
        .resolve(&"armor/plate.fomod".into())
        .expect("plate descriptor");
    assert_eq!(plate.name, "Plate");
    assert!(plate.version.is_none());
    assert!(catalog.resolve(&"elsewhere/renamed.fomod".into()).is_some());

    let parsed = parse_descriptor(&dir.join("renamed.toml"), "renamed")
        .expect("must parse descriptor");
    assert_eq!(parsed.path.as_str(), "elsewhere/renamed.fomod");

    let _ = fs::remove_dir_all(layout.root());
}
