use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use modledger_core::{Installer, ModKey};
use modledger_installer::{LedgerSummary, VersionMismatch};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

/// One row of `modledger mods`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ModListing {
    pub(crate) key: ModKey,
    pub(crate) installer: Installer,
    pub(crate) hidden: bool,
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
    )
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, no_color: bool) -> OutputStyle {
    if stdout_is_tty && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = match status {
                "ok" => "[OK]",
                "warn" => "[WARN]",
                "err" => "[ERR]",
                _ => "[..]",
            };
            format!("{badge} {message}")
        }
    }
}

pub(crate) fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn hidden_style() -> Style {
    Style::new().effects(Effects::DIMMED)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn describe_installer(installer: &Installer) -> String {
    match installer.version() {
        Some(version) => format!("{} {} ({})", installer.name(), version, installer.id()),
        None => format!("{} ({})", installer.name(), installer.id()),
    }
}

pub(crate) fn format_mod_lines(mods: &[ModListing], style: OutputStyle) -> Vec<String> {
    if mods.is_empty() {
        return vec!["No mods registered".to_string()];
    }

    let mut lines = Vec::new();
    if let Some(header) = render_section_header(style, "mods") {
        lines.push(header);
    }
    for listing in mods {
        let mut line = format!("{} {}", listing.key, describe_installer(&listing.installer));
        if listing.hidden {
            line.push_str(" [hidden]");
            if style == OutputStyle::Rich {
                line = colorize(hidden_style(), &line);
            }
        }
        lines.push(line);
    }
    lines
}

/// Installers of `item`, oldest first, with the current owner marked.
pub(crate) fn format_owner_lines(item: &str, installers: &[Installer]) -> Vec<String> {
    if installers.is_empty() {
        return vec![format!("No installer owns {item}")];
    }

    let mut lines = vec![format!("{item}:")];
    let last = installers.len() - 1;
    for (index, installer) in installers.iter().enumerate() {
        let marker = if index == last { " (current)" } else { "" };
        lines.push(format!(
            "  {}. {}{}",
            index + 1,
            describe_installer(installer),
            marker
        ));
    }
    lines
}

pub(crate) fn format_owned_lines(
    style: OutputStyle,
    files: &[String],
    ini_edits: &[String],
    game_values: &[String],
) -> Vec<String> {
    let mut lines = Vec::new();
    for (title, items) in [
        ("data files", files),
        ("ini edits", ini_edits),
        ("game values", game_values),
    ] {
        match render_section_header(style, title) {
            Some(header) => lines.push(header),
            None => lines.push(format!("{title}: {}", items.len())),
        }
        lines.extend(items.iter().map(|item| format!("  {item}")));
    }
    lines
}

pub(crate) fn format_mismatch_lines(
    mismatches: &[VersionMismatch],
    style: OutputStyle,
) -> Vec<String> {
    if mismatches.is_empty() {
        return vec![render_status_line(style, "ok", "all installed mods are current")];
    }

    mismatches
        .iter()
        .map(|mismatch| {
            let installed = mismatch
                .installed
                .version
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown".to_string());
            let current = mismatch
                .current
                .version
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown".to_string());
            render_status_line(
                style,
                "warn",
                &format!(
                    "{} ({}): installed {installed}, available {current}",
                    mismatch.current.name, mismatch.key
                ),
            )
        })
        .collect()
}

pub(crate) fn format_summary_lines(summary: &LedgerSummary, log_path: &str) -> Vec<String> {
    vec![
        format!("install log: {log_path}"),
        format!("version: {}", summary.file_version),
        format!(
            "mods: {} registered, {} visible",
            summary.registered_mods, summary.visible_mods
        ),
        format!("data files: {}", summary.data_files),
        format!("ini edits: {}", summary.ini_edits),
        format!("game values: {}", summary.game_values),
    ]
}
