//! `LedgerEntry` - one row of the version ledger

use super::identifier::{VersionIdentifier, VersionKind};
use super::unit::MigrationUnit;
use crate::executor::DbError;
use crate::migration::MigrationError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Longest `AttributeKind` value the ledger column holds
pub const KIND_MAX_LEN: usize = 9;
/// Longest `Text` value the ledger column holds
pub const TEXT_MAX_LEN: usize = 127;
/// Longest `AttributeTypeFullName` value the ledger column holds
pub const MARKER_TYPE_MAX_LEN: usize = 255;

/// A migration recorded as applied
///
/// Created when an `up()` commits and deleted when the matching `down()` commits; rows are never
/// updated in place. `version_id` is the ordering key at the time of application and is never
/// re-derived from `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Storage-assigned surrogate key (`None` until the row is written)
    pub row_id: Option<i64>,
    pub version_id: i64,
    pub applied_on: DateTime<Utc>,
    pub kind: Option<VersionKind>,
    /// Display text of the identifier
    pub text: String,
    /// Which marker type declared the migration
    #[serde(serialize_with = "serialize_marker")]
    pub marker: VersionKind,
    pub description: Option<String>,
}

fn serialize_marker<S: serde::Serializer>(kind: &VersionKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.marker_type_name())
}

impl LedgerEntry {
    /// Build the entry an `up()` of `unit` records
    #[must_use]
    pub fn from_unit(unit: &MigrationUnit, applied_on: DateTime<Utc>) -> Self {
        let identifier = unit.identifier();
        Self {
            row_id: None,
            version_id: identifier.ordering_key(),
            applied_on,
            kind: Some(identifier.kind()),
            text: identifier.display_text(),
            marker: identifier.kind(),
            description: Some(unit.description().to_string()),
        }
    }

    /// Assemble an entry from stored column values
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Validation` if the marker type name is not one of the two marker
    /// types, or the kind text is unknown or too long.
    pub fn from_parts(
        row_id: Option<i64>,
        version_id: i64,
        applied_on: DateTime<Utc>,
        kind: Option<&str>,
        text: String,
        marker_type_name: &str,
        description: Option<String>,
    ) -> Result<Self, MigrationError> {
        let marker = VersionKind::from_marker_type_name(marker_type_name)?;
        let kind = match kind {
            Some(k) if k.len() > KIND_MAX_LEN => {
                return Err(MigrationError::Validation(format!(
                    "Attribute kind '{k}' is longer than {KIND_MAX_LEN} characters"
                )));
            }
            Some(k) => Some(k.parse::<VersionKind>()?),
            None => None,
        };

        Ok(Self {
            row_id,
            version_id,
            applied_on,
            kind,
            text,
            marker,
            description,
        })
    }

    /// Decode a row selected as
    /// `Id, VersionId, AppliedOn, AttributeKind, Text, AttributeTypeFullName, Description`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Database` when a column cannot be read and
    /// `MigrationError::Validation` for unrecognized marker types.
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, MigrationError> {
        let row_id: i64 = row.try_get(0).map_err(DbError::Postgres)?;
        let version_id: i64 = row.try_get(1).map_err(DbError::Postgres)?;
        let applied_on: DateTime<Utc> = row.try_get(2).map_err(DbError::Postgres)?;
        let kind: Option<String> = row.try_get(3).map_err(DbError::Postgres)?;
        let text: String = row.try_get(4).map_err(DbError::Postgres)?;
        let marker_type_name: String = row.try_get(5).map_err(DbError::Postgres)?;
        let description: Option<String> = row.try_get(6).map_err(DbError::Postgres)?;

        Self::from_parts(
            Some(row_id),
            version_id,
            applied_on,
            kind.as_deref(),
            text,
            &marker_type_name,
            description,
        )
    }

    /// Check column limits before writing
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Validation` if `text` does not fit the ledger column.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.text.len() > TEXT_MAX_LEN {
            return Err(MigrationError::Validation(format!(
                "Identifier text '{}' is longer than {TEXT_MAX_LEN} characters",
                self.text
            )));
        }
        debug_assert!(self.marker.marker_type_name().len() <= MARKER_TYPE_MAX_LEN);
        Ok(())
    }

    /// Rebuild the identifier from the stored display text
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Validation` if the text does not parse.
    pub fn identifier(&self) -> Result<VersionIdentifier, MigrationError> {
        self.text.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DbError;
    use crate::migration::{Migration, MigrationModule, MigrationRegistry, SchemaManager, VersionMarker};
    use chrono::TimeZone;

    struct AddEmail;

    impl Migration for AddEmail {
        fn marker(&self) -> VersionMarker {
            VersionMarker::timestamp(2024, 2, 3, 4, 5, 6)
        }

        fn description(&self) -> String {
            "Add email column".to_string()
        }

        fn up(&self, _manager: &SchemaManager<'_>) -> Result<(), DbError> {
            Ok(())
        }

        fn down(&self, _manager: &SchemaManager<'_>) -> Result<(), DbError> {
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_from_unit() {
        let set = MigrationRegistry::new()
            .module(MigrationModule::new("app::migrations").with(AddEmail))
            .discover()
            .unwrap();

        let entry = LedgerEntry::from_unit(&set.units()[0], now());
        assert_eq!(entry.row_id, None);
        assert_eq!(entry.version_id, 20240203040506);
        assert_eq!(entry.kind, Some(VersionKind::Timestamp));
        assert_eq!(entry.text, "2024-02-03T04:05:06.0000000");
        assert_eq!(entry.marker, VersionKind::Timestamp);
        assert_eq!(entry.description.as_deref(), Some("Add email column"));
        assert!(entry.validate().is_ok());
        assert_eq!(entry.identifier().unwrap().ordering_key(), entry.version_id);
    }

    struct PaddedDescription;

    impl Migration for PaddedDescription {
        fn marker(&self) -> VersionMarker {
            VersionMarker::version(3, 1)
        }

        fn description(&self) -> String {
            "  Backfill totals \n".to_string()
        }

        fn up(&self, _manager: &SchemaManager<'_>) -> Result<(), DbError> {
            Ok(())
        }

        fn down(&self, _manager: &SchemaManager<'_>) -> Result<(), DbError> {
            Ok(())
        }
    }

    #[test]
    fn test_from_unit_keeps_description_verbatim() {
        let set = MigrationRegistry::new()
            .module(MigrationModule::new("app::migrations").with(PaddedDescription))
            .discover()
            .unwrap();

        let entry = LedgerEntry::from_unit(&set.units()[0], now());
        assert_eq!(entry.description.as_deref(), Some("  Backfill totals \n"));
    }

    #[test]
    fn test_from_parts_accepts_known_marker_types() {
        let entry = LedgerEntry::from_parts(
            Some(7),
            1_0002_0000_0000,
            now(),
            Some("Version"),
            "1.2.0.0".to_string(),
            "tidemark::migration::VersionMigration",
            None,
        )
        .unwrap();

        assert_eq!(entry.kind, Some(VersionKind::SemanticVersion));
        assert_eq!(entry.marker, VersionKind::SemanticVersion);
    }

    #[test]
    fn test_from_parts_null_kind() {
        let entry = LedgerEntry::from_parts(
            Some(1),
            20240101000000,
            now(),
            None,
            "2024-01-01T00:00:00.0000000".to_string(),
            "tidemark::migration::TimeStampMigration",
            Some("seed".to_string()),
        )
        .unwrap();
        assert_eq!(entry.kind, None);
    }

    #[test]
    fn test_from_parts_rejects_unknown_marker_type() {
        let err = LedgerEntry::from_parts(
            Some(1),
            1,
            now(),
            Some("Version"),
            "0.0.0.1".to_string(),
            "app::MyOwnMarker",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::Validation(_)));
    }

    #[test]
    fn test_from_parts_rejects_long_kind() {
        let err = LedgerEntry::from_parts(
            Some(1),
            1,
            now(),
            Some("TimeStampExtra"),
            "0.0.0.1".to_string(),
            "tidemark::migration::VersionMigration",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::Validation(_)));
    }

    #[test]
    fn test_serializes_marker_type_name() {
        let entry = LedgerEntry::from_parts(
            Some(1),
            1_0000_0000_0000,
            now(),
            Some("Version"),
            "1.0.0.0".to_string(),
            "tidemark::migration::VersionMigration",
            None,
        )
        .unwrap();

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["marker"], "tidemark::migration::VersionMigration");
        assert_eq!(json["kind"], "Version");
    }
}
