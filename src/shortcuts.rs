use crate::{
    checksum,
    error::{KvError, KvResult},
    fsio,
    keyvalues::{binary, text, KvNode, KvValue},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

pub const ROOT_KEY: &str = "shortcuts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    Binary,
    Text,
}

impl Encoding {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Some(Encoding::Binary),
            "text" | "txt" => Some(Encoding::Text),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Binary => "binary",
            Encoding::Text => "text",
        }
    }

    /// Binary documents open with a node or end tag; anything else is text.
    /// Returns `None` when there is nothing but whitespace to look at.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match *bytes.first()? {
            binary::TAG_NODE | binary::TAG_END => Some(Encoding::Binary),
            _ if bytes.iter().all(u8::is_ascii_whitespace) => None,
            _ => Some(Encoding::Text),
        }
    }
}

/// One non-Steam game entry as stored in `shortcuts.vdf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutRecord {
    pub app_id: u32,
    pub app_name: String,
    pub exe: String,
    pub start_dir: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub shortcut_path: String,
    #[serde(default)]
    pub launch_options: String,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default = "default_true")]
    pub allow_desktop_config: bool,
    #[serde(default = "default_true")]
    pub allow_overlay: bool,
    #[serde(default)]
    pub open_vr: bool,
    #[serde(default)]
    pub devkit: bool,
    #[serde(default)]
    pub devkit_game_id: String,
    #[serde(default)]
    pub devkit_override_app_id: u32,
    #[serde(default)]
    pub last_play_time: u32,
    #[serde(default)]
    pub flatpak_app_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ShortcutRecord {
    pub fn new(app_name: impl Into<String>, exe: impl Into<String>) -> Self {
        let app_name = app_name.into();
        let exe = exe.into();
        let start_dir = default_start_dir(&exe);
        Self {
            app_id: checksum::derive_shortcut_id(&exe, &app_name),
            app_name,
            exe,
            start_dir,
            icon: String::new(),
            shortcut_path: String::new(),
            launch_options: String::new(),
            is_hidden: false,
            allow_desktop_config: true,
            allow_overlay: true,
            open_vr: false,
            devkit: false,
            devkit_game_id: String::new(),
            devkit_override_app_id: 0,
            last_play_time: 0,
            flatpak_app_id: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn derived_app_id(&self) -> u32 {
        checksum::derive_shortcut_id(&self.exe, &self.app_name)
    }

    /// Recomputes the id after `exe` or `app_name` changed.
    pub fn refresh_app_id(&mut self) {
        self.app_id = self.derived_app_id();
    }

    pub fn launch_game_id(&self) -> u64 {
        checksum::to_launch_game_id(self.app_id)
    }

    pub fn launch_url(&self) -> String {
        checksum::launch_url(self.app_id)
    }

    /// Entry node with the key spelling and order the Steam client writes.
    pub fn to_node(&self) -> KvNode {
        KvNode::new()
            .with("appid", self.app_id as i32)
            .with("AppName", self.app_name.as_str())
            .with("Exe", self.exe.as_str())
            .with("StartDir", self.start_dir.as_str())
            .with("icon", self.icon.as_str())
            .with("ShortcutPath", self.shortcut_path.as_str())
            .with("LaunchOptions", self.launch_options.as_str())
            .with("IsHidden", i32::from(self.is_hidden))
            .with("AllowDesktopConfig", i32::from(self.allow_desktop_config))
            .with("AllowOverlay", i32::from(self.allow_overlay))
            .with("OpenVR", i32::from(self.open_vr))
            .with("Devkit", i32::from(self.devkit))
            .with("DevkitGameID", self.devkit_game_id.as_str())
            .with("DevkitOverrideAppID", self.devkit_override_app_id as i32)
            .with("LastPlayTime", self.last_play_time as i32)
            .with("FlatpakAppID", self.flatpak_app_id.as_str())
            .with(
                "tags",
                self.tags
                    .iter()
                    .enumerate()
                    .map(|(index, tag)| (index.to_string(), tag.as_str()))
                    .collect::<KvNode>(),
            )
    }

    /// Reads an entry node from either encoding. Keys match case-insensitively,
    /// unknown keys are ignored and a missing app id is derived.
    pub fn from_node(node: &KvNode) -> Self {
        let app_name = string_field(node, "AppName");
        let exe = string_field(node, "Exe");
        let app_id = u32_field(node, "appid")
            .filter(|id| *id != 0)
            .unwrap_or_else(|| checksum::derive_shortcut_id(&exe, &app_name));
        let tags = node
            .get_ignore_case("tags")
            .and_then(KvValue::as_node)
            .map(|tags| {
                tags.iter()
                    .filter_map(|(_, value)| value.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            app_id,
            app_name,
            exe,
            start_dir: string_field(node, "StartDir"),
            icon: string_field(node, "icon"),
            shortcut_path: string_field(node, "ShortcutPath"),
            launch_options: string_field(node, "LaunchOptions"),
            is_hidden: flag_field(node, "IsHidden", false),
            allow_desktop_config: flag_field(node, "AllowDesktopConfig", true),
            allow_overlay: flag_field(node, "AllowOverlay", true),
            open_vr: flag_field(node, "OpenVR", false),
            devkit: flag_field(node, "Devkit", false),
            devkit_game_id: string_field(node, "DevkitGameID"),
            devkit_override_app_id: u32_field(node, "DevkitOverrideAppID").unwrap_or(0),
            last_play_time: u32_field(node, "LastPlayTime").unwrap_or(0),
            flatpak_app_id: string_field(node, "FlatpakAppID"),
            tags,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Quoted parent directory of the (possibly quoted) executable path.
fn default_start_dir(exe: &str) -> String {
    let unquoted = exe.trim().trim_matches('"');
    let cut = unquoted.rfind(['/', '\\']);
    match cut {
        Some(index) if index > 0 => format!("\"{}\"", &unquoted[..index]),
        Some(_) => "\"/\"".to_string(),
        None => String::new(),
    }
}

fn string_field(node: &KvNode, key: &str) -> String {
    match node.get_ignore_case(key) {
        Some(KvValue::Node(_)) | None => String::new(),
        Some(value) => value.to_text(),
    }
}

// Text files carry numbers as strings, sometimes signed.
fn u32_field(node: &KvNode, key: &str) -> Option<u32> {
    match node.get_ignore_case(key)? {
        KvValue::Int(value) => Some(*value as u32),
        KvValue::String(value) => {
            let value = value.trim();
            value
                .parse::<u32>()
                .ok()
                .or_else(|| value.parse::<i32>().ok().map(|value| value as u32))
        }
        KvValue::Node(_) => None,
    }
}

fn flag_field(node: &KvNode, key: &str, default: bool) -> bool {
    u32_field(node, key).map_or(default, |value| value != 0)
}

pub fn records_to_node(records: &[ShortcutRecord]) -> KvNode {
    KvNode::new().with(
        ROOT_KEY,
        KvNode::from_array(records.iter().map(ShortcutRecord::to_node)),
    )
}

pub fn records_from_node(root: &KvNode) -> Vec<ShortcutRecord> {
    root.get_ignore_case(ROOT_KEY)
        .and_then(KvValue::as_node)
        .map(|list| list.array_items().map(ShortcutRecord::from_node).collect())
        .unwrap_or_default()
}

pub fn encode_shortcuts(records: &[ShortcutRecord], encoding: Encoding) -> KvResult<Vec<u8>> {
    let root = records_to_node(records);
    match encoding {
        Encoding::Binary => binary::encode(&root),
        Encoding::Text => Ok(text::encode(&root).into_bytes()),
    }
}

/// Decodes a whole document, detecting its encoding. Blank input is an empty
/// list encoded as `None`.
pub fn decode_shortcuts(bytes: &[u8]) -> KvResult<(Vec<ShortcutRecord>, Option<Encoding>)> {
    let Some(encoding) = Encoding::detect(bytes) else {
        return Ok((Vec::new(), None));
    };
    let root = decode_tree(bytes, encoding)?;
    Ok((records_from_node(&root), Some(encoding)))
}

pub fn decode_tree(bytes: &[u8], encoding: Encoding) -> KvResult<KvNode> {
    match encoding {
        Encoding::Binary => binary::decode(bytes),
        Encoding::Text => text::read(bytes),
    }
}

pub fn read_shortcuts(path: &Path) -> KvResult<Vec<ShortcutRecord>> {
    let bytes = fs::read(path)?;
    Ok(decode_shortcuts(&bytes)?.0)
}

pub fn read_shortcuts_binary(path: &Path) -> KvResult<Vec<ShortcutRecord>> {
    read_with(path, Encoding::Binary)
}

pub fn read_shortcuts_text(path: &Path) -> KvResult<Vec<ShortcutRecord>> {
    read_with(path, Encoding::Text)
}

fn read_with(path: &Path, encoding: Encoding) -> KvResult<Vec<ShortcutRecord>> {
    let bytes = fs::read(path)?;
    let root = decode_tree(&bytes, encoding)?;
    Ok(records_from_node(&root))
}

pub fn write_shortcuts(
    path: &Path,
    records: &[ShortcutRecord],
    encoding: Encoding,
) -> KvResult<()> {
    let bytes = encode_shortcuts(records, encoding)?;
    fsio::write_atomic(path, &bytes).map_err(KvError::Io)
}

pub fn write_shortcuts_binary(path: &Path, records: &[ShortcutRecord]) -> KvResult<()> {
    write_shortcuts(path, records, Encoding::Binary)
}

pub fn write_shortcuts_text(path: &Path, records: &[ShortcutRecord]) -> KvResult<()> {
    write_shortcuts(path, records, Encoding::Text)
}
