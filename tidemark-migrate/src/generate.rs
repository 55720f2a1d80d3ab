//! Migration file generation

use chrono::{DateTime, Datelike, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tidemark::migration::VersionIdentifier;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid name pattern"));

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Migration name '{0}' must be snake_case (lowercase letters, digits, underscores)")]
    InvalidName(String),
    #[error("Invalid version '{0}': {1}")]
    InvalidVersion(String, String),
    #[error("Migration file {0} already exists")]
    AlreadyExists(PathBuf),
    #[error("Failed to write migration file: {0}")]
    Io(#[from] std::io::Error),
}

/// Which marker the generated migration declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedMarker {
    Timestamp(DateTime<Utc>),
    Version(VersionIdentifier),
}

impl GeneratedMarker {
    /// Parse `--version`, or use `now` when it is absent
    pub fn from_args(version: Option<&str>, now: DateTime<Utc>) -> Result<Self, GenerateError> {
        match version {
            None => Ok(GeneratedMarker::Timestamp(now)),
            Some(text) => {
                let identifier = text
                    .parse::<VersionIdentifier>()
                    .map_err(|e| GenerateError::InvalidVersion(text.to_string(), e.to_string()))?;
                match identifier.version() {
                    Some(_) => Ok(GeneratedMarker::Version(identifier)),
                    None => Err(GenerateError::InvalidVersion(
                        text.to_string(),
                        "expected major.minor[.build[.revision]]".to_string(),
                    )),
                }
            }
        }
    }

    fn file_prefix(&self) -> String {
        match self {
            GeneratedMarker::Timestamp(ts) => ts.format("%Y%m%d%H%M%S").to_string(),
            GeneratedMarker::Version(id) => match id.version() {
                Some(v) => format!("v{}_{}_{}_{}", v.major, v.minor, v.build, v.revision),
                None => id.ordering_key().to_string(),
            },
        }
    }

    fn marker_expr(&self) -> String {
        match self {
            GeneratedMarker::Timestamp(ts) => format!(
                "VersionMarker::timestamp({}, {}, {}, {}, {}, {})",
                ts.year(),
                ts.month(),
                ts.day(),
                ts.hour(),
                ts.minute(),
                ts.second()
            ),
            GeneratedMarker::Version(id) => match id.version() {
                Some(v) => format!(
                    "VersionMarker::version_full({}, {}, {}, {})",
                    v.major, v.minor, v.build, v.revision
                ),
                None => format!("VersionMarker::version(0, 0) /* {id} */"),
            },
        }
    }
}

/// `create_users_table` -> `CreateUsersTable`
pub fn struct_name(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Render the migration source
pub fn render(name: &str, marker: &GeneratedMarker, now: DateTime<Utc>) -> String {
    let struct_name = struct_name(name);
    format!(
        r#"//! Migration: {name}
//! Generated: {generated}

use tidemark::executor::DbError;
use tidemark::migration::{{Migration, SchemaManager, VersionMarker}};

pub struct {struct_name};

impl Migration for {struct_name} {{
    fn marker(&self) -> VersionMarker {{
        {marker}
    }}

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {{
        // let table = sea_query::Table::create()
        //     .table("example")
        //     .col(sea_query::ColumnDef::new("id").big_integer().not_null().primary_key())
        //     .to_owned();
        // manager.create_table(table)?;
        let _ = manager;
        Ok(())
    }}

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {{
        // manager.drop_table(sea_query::Table::drop().table("example").to_owned())?;
        let _ = manager;
        Ok(())
    }}
}}
"#,
        generated = now.format("%Y-%m-%d %H:%M:%S UTC"),
        marker = marker.marker_expr(),
    )
}

/// Write a new migration file into `dir` and return its path
///
/// The file still has to be added to a `MigrationModule` by hand.
pub fn generate_migration(
    dir: &Path,
    name: &str,
    marker: &GeneratedMarker,
    now: DateTime<Utc>,
) -> Result<PathBuf, GenerateError> {
    if !NAME_PATTERN.is_match(name) {
        return Err(GenerateError::InvalidName(name.to_string()));
    }

    fs::create_dir_all(dir)?;

    let path = dir.join(format!("m{}_{}.rs", marker.file_prefix(), name));
    if path.exists() {
        return Err(GenerateError::AlreadyExists(path));
    }

    fs::write(&path, render(name, marker, now))?;
    log::debug!("Wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 20, 12, 30, 5).unwrap()
    }

    #[test]
    fn test_struct_name() {
        assert_eq!(struct_name("create_users_table"), "CreateUsersTable");
        assert_eq!(struct_name("add__index2"), "AddIndex2");
    }

    #[test]
    fn test_timestamp_marker() {
        let marker = GeneratedMarker::from_args(None, now()).unwrap();
        assert_eq!(marker.file_prefix(), "20240120123005");
        assert_eq!(
            marker.marker_expr(),
            "VersionMarker::timestamp(2024, 1, 20, 12, 30, 5)"
        );
    }

    #[test]
    fn test_version_marker() {
        let marker = GeneratedMarker::from_args(Some("1.2"), now()).unwrap();
        assert_eq!(marker.file_prefix(), "v1_2_0_0");
        assert_eq!(marker.marker_expr(), "VersionMarker::version_full(1, 2, 0, 0)");

        assert!(GeneratedMarker::from_args(Some("20240101000000"), now()).is_err());
        assert!(GeneratedMarker::from_args(Some("1.99999"), now()).is_err());
    }
}
