//! Application configuration for bulkingest.
//!
//! User config lives at `~/.bulkingest/bulkingest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::types::WriteMode;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "bulkingest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bulkingest";

// ---------------------------------------------------------------------------
// Config structs (matching bulkingest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Delimited text (record) parsing.
    #[serde(default)]
    pub parser: ParserSection,

    /// Adjacency list parsing.
    #[serde(default)]
    pub edges: EdgeListSection,

    /// Batch size overrides, capped by each store's maximum.
    #[serde(default)]
    pub batching: BatchingConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Database file used when `--db` is not given. `~/` expands to home.
    #[serde(default = "default_database")]
    pub database: String,

    /// Write mode used when `--mode` is not given.
    #[serde(default)]
    pub mode: WriteMode,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            mode: WriteMode::default(),
        }
    }
}

fn default_database() -> String {
    "~/.bulkingest/store.db".into()
}

/// `[parser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserSection {
    /// Column holding record text.
    #[serde(default = "default_content_column")]
    pub content_column: String,

    /// Column holding record ids. Absent means sequential ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_column: Option<String>,

    /// Longest accepted field in bytes. Absent means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_field_size: Option<usize>,

    /// Field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for ParserSection {
    fn default() -> Self {
        Self {
            content_column: default_content_column(),
            id_column: None,
            max_field_size: None,
            delimiter: default_delimiter(),
        }
    }
}

fn default_content_column() -> String {
    "content".into()
}
fn default_delimiter() -> char {
    ','
}

/// `[edges]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeListSection {
    /// Field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Whether the first row names the columns.
    #[serde(default)]
    pub has_headers: bool,

    /// Lines starting with this character are skipped; `""` disables it.
    #[serde(default = "default_comment", with = "comment_char")]
    pub comment: Option<char>,
}

impl Default for EdgeListSection {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            has_headers: false,
            comment: default_comment(),
        }
    }
}

fn default_comment() -> Option<char> {
    Some('#')
}

/// `comment` is written as a one-character string, or `""` for none.
mod comment_char {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<char>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(c) => serializer.serialize_str(&c.to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<char>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok(None),
            (Some(c), None) => Ok(Some(c)),
            _ => Err(D::Error::custom(format!(
                "comment must be a single character or empty, got '{raw}'"
            ))),
        }
    }
}

/// `[batching]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Batch size for edge imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<usize>,

    /// Batch size for document imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<usize>,
}

// ---------------------------------------------------------------------------
// Runtime parser configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Options for streaming logical records out of delimited text.
///
/// Passed explicitly into every streaming call; nothing is process-global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    pub content_column: String,
    pub id_column: Option<String>,
    pub max_field_size: Option<usize>,
    pub delimiter: char,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ParserConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            content_column: config.parser.content_column.clone(),
            id_column: config.parser.id_column.clone(),
            max_field_size: config.parser.max_field_size,
            delimiter: config.parser.delimiter,
        }
    }
}

/// Options for reading adjacency lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeListConfig {
    pub delimiter: char,
    pub has_headers: bool,
    pub comment: Option<char>,
}

impl Default for EdgeListConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EdgeListConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            delimiter: config.edges.delimiter,
            has_headers: config.edges.has_headers,
            comment: config.edges.comment,
        }
    }
}

/// Convert a configured delimiter/comment character to the single byte the
/// CSV reader expects.
pub fn ascii_byte(c: char, what: &str) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(IngestError::config(format!(
            "{what} must be a single ASCII character, got '{c}'"
        )))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.bulkingest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| IngestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.bulkingest/bulkingest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| IngestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| IngestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| IngestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| IngestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the database path, expanding a leading `~/`.
pub fn resolve_database_path(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| IngestError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("content_column"));
        assert!(toml_str.contains("store.db"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.parser.content_column, "content");
        assert_eq!(parsed.defaults.mode, WriteMode::Upsert);
        assert_eq!(parsed.edges.comment, Some('#'));
    }

    #[test]
    fn comment_can_be_disabled() {
        let config: AppConfig = toml::from_str("[edges]\ncomment = \"\"\n").expect("parse");
        assert_eq!(config.edges.comment, None);
        assert_eq!(EdgeListConfig::from(&config).comment, None);

        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.edges.comment, None);

        let custom: AppConfig = toml::from_str("[edges]\ncomment = \"%\"\n").expect("parse");
        assert_eq!(custom.edges.comment, Some('%'));
        assert!(toml::from_str::<AppConfig>("[edges]\ncomment = \"//\"\n").is_err());
    }

    #[test]
    fn config_with_overrides() {
        let toml_str = r#"
[defaults]
database = "/tmp/graph.db"
mode = "insert"

[parser]
content_column = "body"
id_column = "doc"
max_field_size = 4096
delimiter = ";"

[batching]
edges = 250
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.mode, WriteMode::Insert);
        assert_eq!(config.batching.edges, Some(250));
        assert_eq!(config.batching.documents, None);

        let parser = ParserConfig::from(&config);
        assert_eq!(parser.content_column, "body");
        assert_eq!(parser.id_column.as_deref(), Some("doc"));
        assert_eq!(parser.max_field_size, Some(4096));
        assert_eq!(parser.delimiter, ';');
    }

    #[test]
    fn edge_list_config_from_app_config() {
        let edges = EdgeListConfig::from(&AppConfig::default());
        assert_eq!(edges.delimiter, ',');
        assert!(!edges.has_headers);
    }

    #[test]
    fn ascii_byte_rejects_wide_chars() {
        assert_eq!(ascii_byte('\t', "delimiter").unwrap(), b'\t');
        let err = ascii_byte('§', "delimiter").unwrap_err();
        assert!(err.to_string().contains("single ASCII character"));
    }

    #[test]
    fn database_path_expansion() {
        assert_eq!(
            resolve_database_path("/var/data/x.db").unwrap(),
            PathBuf::from("/var/data/x.db")
        );
        let expanded = resolve_database_path("~/x.db").unwrap();
        assert!(expanded.ends_with("x.db"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}
