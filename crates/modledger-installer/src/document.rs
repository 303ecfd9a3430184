use std::fs;
use std::io;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use modledger_core::{
    ActiveModRegistry, DataFilePath, IniEditKey, Installer, InstallerId, ModDescriptor, ModKey,
    ModVersion,
};
use serde::{Deserialize, Serialize};

use crate::state::LedgerState;

pub const INSTALL_LOG_VERSION: &str = "0.5.0.0";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InstallLogDocument {
    file_version: String,
    mod_list: Vec<ModRecord>,
    data_files: Vec<DataFileRecord>,
    ini_edits: Vec<IniEditRecord>,
    game_specific_edits: Vec<GameValueRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModRecord {
    path: String,
    key: ModKey,
    #[serde(default, skip_serializing_if = "is_false")]
    hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<VersionRecord>,
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    machine_version: Option<String>,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DataFileRecord {
    path: String,
    mods: Vec<KeyRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyRecord {
    key: ModKey,
}

#[derive(Debug, Serialize, Deserialize)]
struct IniEditRecord {
    file: String,
    section: String,
    key: String,
    mods: Vec<TextValueRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextValueRecord {
    key: ModKey,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GameValueRecord {
    key: String,
    mods: Vec<BinaryValueRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BinaryValueRecord {
    key: ModKey,
    #[serde(with = "base64_bytes")]
    value: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    #[serde(rename = "fileVersion")]
    file_version: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

mod base64_bytes {
    use base64::prelude::{Engine as _, BASE64_STANDARD};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(D::Error::custom)
    }
}

impl InstallLogDocument {
    pub(crate) fn parse(raw: &str) -> Result<Self> {
        let probe: VersionProbe =
            serde_json::from_str(raw).context("install log is not a valid document")?;
        match probe.file_version.as_deref() {
            Some(INSTALL_LOG_VERSION) => {}
            Some(found) => bail!(
                "install log version mismatch: expected {INSTALL_LOG_VERSION}, found {found}"
            ),
            None => bail!("install log is missing fileVersion"),
        }

        serde_json::from_str(raw).context("install log is missing required sections")
    }

    pub(crate) fn from_state(state: &LedgerState) -> Self {
        let visible = state.registry.visible_mods().snapshot();
        let mut mod_list = state
            .registry
            .iter()
            .filter(|(_, installer)| state.registry.is_mod_hidden(&installer.id()))
            .map(|(key, installer)| mod_record(key, installer, true))
            .collect::<Vec<_>>();
        for installer in &visible {
            if let Some(key) = state.registry.key_of(&installer.id()) {
                mod_list.push(mod_record(key, installer, false));
            }
        }

        let data_files = state
            .data_files
            .iter()
            .map(|(path, stack)| DataFileRecord {
                path: path.as_str().to_string(),
                mods: stack
                    .keys()
                    .map(|key| KeyRecord { key: key.clone() })
                    .collect(),
            })
            .collect();

        let ini_edits = state
            .ini_edits
            .iter()
            .map(|(edit, stack)| IniEditRecord {
                file: edit.file().to_string(),
                section: edit.section().to_string(),
                key: edit.key().to_string(),
                mods: stack
                    .iter()
                    .map(|entry| TextValueRecord {
                        key: entry.key.clone(),
                        value: entry.value.clone(),
                    })
                    .collect(),
            })
            .collect();

        let game_specific_edits = state
            .game_values
            .iter()
            .map(|(key, stack)| GameValueRecord {
                key: key.clone(),
                mods: stack
                    .iter()
                    .map(|entry| BinaryValueRecord {
                        key: entry.key.clone(),
                        value: entry.value.clone(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            file_version: INSTALL_LOG_VERSION.to_string(),
            mod_list,
            data_files,
            ini_edits,
            game_specific_edits,
        }
    }

    pub(crate) fn into_state(self) -> Result<LedgerState> {
        let mut state = LedgerState::default();
        for record in self.mod_list {
            if state.registry.key_exists(&record.key) {
                bail!("install log lists key '{}' more than once", record.key);
            }
            let id = InstallerId::parse(&record.path);
            if state.registry.is_registered(&id) {
                bail!("install log lists mod '{}' more than once", record.path);
            }
            let hidden = record.hidden || id.is_reserved();
            let installer = match id {
                InstallerId::Reserved(reserved) => Installer::Reserved(reserved),
                InstallerId::Mod(path) => Installer::Mod(ModDescriptor {
                    path,
                    name: record.name,
                    version: record.version.map(|version| ModVersion {
                        machine: version.machine_version,
                        text: version.text,
                    }),
                }),
            };
            state.registry.register_mod(installer, record.key, hidden);
        }

        for record in self.data_files {
            let path = DataFilePath::new(&record.path);
            let stack = state.data_files.get_or_create(&path);
            for entry in record.mods {
                ensure_known_key(&state.registry, &entry.key, &record.path)?;
                stack.push(entry.key, ());
            }
        }

        for record in self.ini_edits {
            let edit = IniEditKey::new(&record.file, &record.section, &record.key);
            let stack = state.ini_edits.get_or_create(&edit);
            for entry in record.mods {
                ensure_known_key(&state.registry, &entry.key, &edit.to_string())?;
                stack.push(entry.key, entry.value);
            }
        }

        for record in self.game_specific_edits {
            let stack = state.game_values.get_or_create(&record.key);
            for entry in record.mods {
                ensure_known_key(&state.registry, &entry.key, &record.key)?;
                stack.push(entry.key, entry.value);
            }
        }

        Ok(state)
    }
}

fn mod_record(key: &ModKey, installer: &Installer, hidden: bool) -> ModRecord {
    ModRecord {
        path: installer.id().as_str().to_string(),
        key: key.clone(),
        hidden: hidden && !installer.is_reserved(),
        version: installer.version().map(|version| VersionRecord {
            machine_version: version.machine.clone(),
            text: version.text.clone(),
        }),
        name: installer.name().to_string(),
    }
}

fn ensure_known_key(registry: &ActiveModRegistry, key: &ModKey, item: &str) -> Result<()> {
    if registry.key_exists(key) {
        return Ok(());
    }
    Err(anyhow!(
        "install log entry '{item}' references unknown mod key '{key}'"
    ))
}

/// Reads the install log at `path`; `None` when no log exists yet.
pub(crate) fn read_install_log(path: &Path) -> Result<Option<LedgerState>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read install log: {}", path.display()));
        }
    };

    let document = InstallLogDocument::parse(&raw)
        .with_context(|| format!("failed to parse install log: {}", path.display()))?;
    let state = document
        .into_state()
        .with_context(|| format!("failed to load install log: {}", path.display()))?;
    Ok(Some(state))
}

pub(crate) fn write_install_log(path: &Path, state: &LedgerState, pretty: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let document = InstallLogDocument::from_state(state);
    let content = if pretty {
        serde_json::to_string_pretty(&document)
    } else {
        serde_json::to_string(&document)
    }
    .context("failed to serialize install log")?;
    fs::write(path, content)
        .with_context(|| format!("failed to write install log: {}", path.display()))
}
