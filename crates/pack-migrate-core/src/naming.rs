//! Naming conventions: snapshot file names in, warehouse table names out.
//!
//! Snapshot files are named `<prefix>_<code>.<ext>` (for example
//! `TranslationData_en.sqlite` or `TranslationData_pt_BR.sqlite`) or
//! `<code>_<anything>.<ext>` (for example `de_LanguageData.sqlite`). Anything else is rejected with
//! [`NamingError::UnrecognizedFileName`] rather than guessed at.
//!
//! Warehouse tables are named from the language code and the snapshot table
//! name in one of two [`TableStyle`]s:
//!
//! | Style    | `("en", "nouns")` | `("en", "emoji_keywords")` |
//! |----------|-------------------|----------------------------|
//! | `snake`  | `en_nouns`        | `en_emoji_keywords`        |
//! | `pascal` | `ENNouns`         | `ENEmojiKeywords`          |

use serde::Deserialize;
use thiserror::Error;

use crate::models::backup_name;

/// Prefix SQLite reserves for its own tables; stripped from table names.
pub const SOURCE_TABLE_PREFIX: &str = "sqlite_";

/// Longest identifier MariaDB accepts.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Longest language code accepted from a file name.
pub const MAX_LANGUAGE_CODE_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("unrecognized snapshot file name: {0}")]
    UnrecognizedFileName(String),

    #[error("invalid language code {code:?} in file name {file_name}")]
    InvalidLanguageCode { file_name: String, code: String },

    #[error("invalid warehouse table name {0:?}")]
    InvalidTableName(String),
}

/// Parses snapshot file names into language codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotNaming {
    prefix: String,
}

impl SnapshotNaming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Extract the language code from a file name (no directory part).
    pub fn language_code(&self, file_name: &str) -> Result<String, NamingError> {
        let stem = match file_name.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => file_name,
        };

        let code = match stem
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
        {
            Some(code) => code,
            None => match stem.split_once('_') {
                Some((code, _)) => code,
                None => return Err(NamingError::UnrecognizedFileName(file_name.to_string())),
            },
        };

        if code.is_empty() {
            return Err(NamingError::UnrecognizedFileName(file_name.to_string()));
        }
        if !is_language_code(code) {
            return Err(NamingError::InvalidLanguageCode {
                file_name: file_name.to_string(),
                code: code.to_string(),
            });
        }
        Ok(code.to_string())
    }
}

/// Up to [`MAX_LANGUAGE_CODE_LEN`] ASCII letters, digits and inner `_`
/// (`en`, `ptBR`, `pt_BR`).
fn is_language_code(code: &str) -> bool {
    code.len() <= MAX_LANGUAGE_CODE_LEN
        && !code.starts_with('_')
        && !code.ends_with('_')
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Default for SnapshotNaming {
    fn default() -> Self {
        Self::new("TranslationData")
    }
}

/// How warehouse table names are assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStyle {
    /// `<lang>_<table>`
    #[default]
    Snake,
    /// `<LANG><Table>`, table title-cased per `_` segment.
    Pascal,
}

impl TableStyle {
    /// Warehouse table name for `source_table` from the `language` snapshot.
    ///
    /// Fails if the result (or its `_old` backup name) would not be a plain
    /// identifier of at most [`MAX_IDENTIFIER_LEN`] characters.
    pub fn destination_table(
        &self,
        language: &str,
        source_table: &str,
    ) -> Result<String, NamingError> {
        let table = source_table
            .strip_prefix(SOURCE_TABLE_PREFIX)
            .unwrap_or(source_table);

        let name = match self {
            TableStyle::Snake => format!("{}_{}", language, table),
            TableStyle::Pascal => format!("{}{}", language.to_uppercase(), title_case(table)),
        };

        validate_identifier(&name)?;
        validate_identifier(&backup_name(&name))?;
        Ok(name)
    }
}

/// `emoji_keywords` → `EmojiKeywords`. Empty segments are dropped.
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Accept only `[A-Za-z0-9_]`, 1 to [`MAX_IDENTIFIER_LEN`] characters.
pub fn validate_identifier(name: &str) -> Result<(), NamingError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(NamingError::InvalidTableName(name.to_string()))
    }
}
