//! Version identifiers and the markers migrations declare them with
//!
//! Every migration carries exactly one [`VersionMarker`]: a timestamp or a semantic version.
//! Discovery turns the marker into a [`VersionIdentifier`], which is what the runner orders,
//! compares and records. All comparison goes through the 64-bit [ordering key](VersionIdentifier::ordering_key).

use crate::migration::MigrationError;
use chrono::{NaiveDate, NaiveDateTime, Timelike, Datelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Largest value any semantic-version field may take (four decimal digits in the ordering key)
pub const MAX_VERSION_FIELD: i32 = 9999;

/// Compact timestamp form of an identifier, identical to its ordering key: `YYYYMMDDHHMMSS`
static COMPACT_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})$").expect("valid compact timestamp pattern")
});

/// Two to four dot-separated integer fields
static SEMANTIC_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+)\.(-?\d+)(?:\.(-?\d+))?(?:\.(-?\d+))?$").expect("valid version pattern")
});

/// The identifier scheme a migration uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionKind {
    /// `year, month, day, hour, minute, second`
    #[serde(rename = "TimeStamp")]
    Timestamp,
    /// `major.minor.build.revision`
    #[serde(rename = "Version")]
    SemanticVersion,
}

impl VersionKind {
    /// Text persisted in the ledger's `AttributeKind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionKind::Timestamp => "TimeStamp",
            VersionKind::SemanticVersion => "Version",
        }
    }

    /// Fully-qualified name of the marker type, persisted in `AttributeTypeFullName`
    pub fn marker_type_name(&self) -> &'static str {
        match self {
            VersionKind::Timestamp => "tidemark::migration::TimeStampMigration",
            VersionKind::SemanticVersion => "tidemark::migration::VersionMigration",
        }
    }

    /// Resolve a persisted marker type name
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Validation` for any name that is not one of the two marker types.
    pub fn from_marker_type_name(name: &str) -> Result<Self, MigrationError> {
        [VersionKind::Timestamp, VersionKind::SemanticVersion]
            .into_iter()
            .find(|kind| kind.marker_type_name() == name)
            .ok_or_else(|| {
                MigrationError::Validation(format!("Invalid attribute type '{name}'"))
            })
    }
}

impl fmt::Display for VersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionKind {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TimeStamp" => Ok(VersionKind::Timestamp),
            "Version" => Ok(VersionKind::SemanticVersion),
            other => Err(MigrationError::Validation(format!(
                "Unknown attribute kind '{other}'"
            ))),
        }
    }
}

/// The identifying marker a migration declares
///
/// Markers hold raw components; nothing is validated until discovery converts them with
/// [`VersionMarker::to_identifier`].
///
/// ```rust
/// use tidemark::migration::VersionMarker;
///
/// const CREATE_USERS: VersionMarker = VersionMarker::timestamp(2024, 1, 20, 12, 0, 0);
/// const ADD_EMAIL_INDEX: VersionMarker = VersionMarker::version(1, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMarker {
    Timestamp {
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    },
    Version {
        major: i32,
        minor: i32,
        build: i32,
        revision: i32,
    },
}

impl VersionMarker {
    pub const fn timestamp(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        VersionMarker::Timestamp {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Semantic version with `build` and `revision` of 0
    pub const fn version(major: i32, minor: i32) -> Self {
        Self::version_full(major, minor, 0, 0)
    }

    pub const fn version_full(major: i32, minor: i32, build: i32, revision: i32) -> Self {
        VersionMarker::Version {
            major,
            minor,
            build,
            revision,
        }
    }

    pub fn kind(&self) -> VersionKind {
        match self {
            VersionMarker::Timestamp { .. } => VersionKind::Timestamp,
            VersionMarker::Version { .. } => VersionKind::SemanticVersion,
        }
    }

    /// Validate the components and build the identifier
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Validation` when the components are out of range.
    pub fn to_identifier(&self) -> Result<VersionIdentifier, MigrationError> {
        match *self {
            VersionMarker::Timestamp {
                year,
                month,
                day,
                hour,
                minute,
                second,
            } => VersionIdentifier::from_timestamp(year, month, day, hour, minute, second),
            VersionMarker::Version {
                major,
                minor,
                build,
                revision,
            } => VersionIdentifier::from_semantic_version(major, minor, build, revision),
        }
    }
}

/// A `major.minor.build.revision` version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    pub major: i32,
    pub minor: i32,
    pub build: i32,
    pub revision: i32,
}

impl SemanticVersion {
    fn ordering_key(&self) -> i64 {
        // Negative fields count as zero
        [self.major, self.minor, self.build, self.revision]
            .iter()
            .fold(0i64, |key, field| key * 10_000 + i64::from((*field).max(0)))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IdentifierValue {
    Timestamp(NaiveDateTime),
    Version(SemanticVersion),
}

/// A validated migration identifier
///
/// Identifiers compare by [`ordering_key`](Self::ordering_key): ascending keys are chronological
/// (or version) order, and two identifiers with the same key are the same migration.
#[derive(Debug, Clone, Copy)]
pub struct VersionIdentifier {
    value: IdentifierValue,
    ordering_key: i64,
}

impl VersionIdentifier {
    /// Build a timestamp identifier
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Validation` if the components do not form a valid date and time,
    /// or the year falls outside `1..=9999`.
    pub fn from_timestamp(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self, MigrationError> {
        if !(1..=9999).contains(&year) {
            return Err(MigrationError::Validation(format!(
                "Timestamp year {year} is outside 1..=9999"
            )));
        }

        let timestamp = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .ok_or_else(|| {
                MigrationError::Validation(format!(
                    "Invalid timestamp {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
                ))
            })?;

        let ordering_key = i64::from(timestamp.year()) * 10_000_000_000
            + i64::from(timestamp.month()) * 100_000_000
            + i64::from(timestamp.day()) * 1_000_000
            + i64::from(timestamp.hour()) * 10_000
            + i64::from(timestamp.minute()) * 100
            + i64::from(timestamp.second());

        Ok(Self {
            value: IdentifierValue::Timestamp(timestamp),
            ordering_key,
        })
    }

    /// Build a semantic-version identifier
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Validation` if any field exceeds [`MAX_VERSION_FIELD`].
    pub fn from_semantic_version(
        major: i32,
        minor: i32,
        build: i32,
        revision: i32,
    ) -> Result<Self, MigrationError> {
        let version = SemanticVersion {
            major,
            minor,
            build,
            revision,
        };

        if [major, minor, build, revision]
            .iter()
            .any(|field| *field > MAX_VERSION_FIELD)
        {
            return Err(MigrationError::Validation(format!(
                "Version fields must be {MAX_VERSION_FIELD} or less (got {version})"
            )));
        }

        Ok(Self {
            value: IdentifierValue::Version(version),
            ordering_key: version.ordering_key(),
        })
    }

    /// The 64-bit key used for every comparison and recorded in the ledger
    pub fn ordering_key(&self) -> i64 {
        self.ordering_key
    }

    /// Canonical, round-trippable text
    ///
    /// Timestamps render as `2020-03-04T05:06:07.0000000`, versions as `1.2.0.0`.
    pub fn display_text(&self) -> String {
        match &self.value {
            IdentifierValue::Timestamp(ts) => {
                format!("{}.0000000", ts.format("%Y-%m-%dT%H:%M:%S"))
            }
            IdentifierValue::Version(version) => version.to_string(),
        }
    }

    pub fn kind(&self) -> VersionKind {
        match self.value {
            IdentifierValue::Timestamp(_) => VersionKind::Timestamp,
            IdentifierValue::Version(_) => VersionKind::SemanticVersion,
        }
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self.value {
            IdentifierValue::Timestamp(ts) => Some(ts),
            IdentifierValue::Version(_) => None,
        }
    }

    pub fn version(&self) -> Option<SemanticVersion> {
        match self.value {
            IdentifierValue::Version(version) => Some(version),
            IdentifierValue::Timestamp(_) => None,
        }
    }

    fn parse_iso_timestamp(text: &str) -> Result<Self, MigrationError> {
        let trimmed = text.strip_suffix('Z').unwrap_or(text);
        let parsed = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
            .map_err(|e| {
                MigrationError::Validation(format!("Unrecognized identifier '{text}': {e}"))
            })?;

        if parsed.nanosecond() != 0 {
            return Err(MigrationError::Validation(format!(
                "Identifier '{text}' has sub-second precision; migrations are identified to the second"
            )));
        }

        Self::from_timestamp(
            parsed.year(),
            parsed.month(),
            parsed.day(),
            parsed.hour(),
            parsed.minute(),
            parsed.second(),
        )
    }
}

impl PartialEq for VersionIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.ordering_key == other.ordering_key
    }
}

impl Eq for VersionIdentifier {}

impl Hash for VersionIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        self.ordering_key.hash(state);
    }
}

impl PartialOrd for VersionIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordering_key
            .cmp(&other.ordering_key)
            .then_with(|| (self.kind() as u8).cmp(&(other.kind() as u8)))
    }
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl FromStr for VersionIdentifier {
    type Err = MigrationError;

    /// Accepts display text (`1.2`, `1.2.3.4`, `2020-03-04T05:06:07.0000000`) and the compact
    /// key form `20200304050607`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();

        if let Some(caps) = COMPACT_TIMESTAMP.captures(text) {
            let field = |i: usize| caps[i].parse::<u32>().unwrap_or_default();
            let year = caps[1].parse::<i32>().unwrap_or_default();
            return Self::from_timestamp(year, field(2), field(3), field(4), field(5), field(6));
        }

        if let Some(caps) = SEMANTIC_VERSION.captures(text) {
            let mut fields = [0i32; 4];
            for (slot, group) in fields.iter_mut().zip(1..=4) {
                if let Some(m) = caps.get(group) {
                    *slot = m.as_str().parse::<i32>().map_err(|e| {
                        MigrationError::Validation(format!(
                            "Version field '{}' in '{text}': {e}",
                            m.as_str()
                        ))
                    })?;
                }
            }
            return Self::from_semantic_version(fields[0], fields[1], fields[2], fields[3]);
        }

        Self::parse_iso_timestamp(text)
    }
}

impl Serialize for VersionIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering_key_groups() {
        let id = VersionIdentifier::from_semantic_version(1, 0, 0, 0).unwrap();
        assert_eq!(id.ordering_key(), 1_000_000_000_000);
        assert_eq!(format!("{:016}", id.ordering_key()), "0001000000000000");

        let id = VersionIdentifier::from_semantic_version(12, 345, 6, 7890).unwrap();
        assert_eq!(format!("{:016}", id.ordering_key()), "0012034500067890");
    }

    #[test]
    fn test_version_field_limit() {
        assert!(VersionIdentifier::from_semantic_version(9999, 9999, 9999, 9999).is_ok());

        for fields in [(10000, 0, 0, 0), (0, 10000, 0, 0), (0, 0, 10000, 0), (0, 0, 0, 10000)] {
            let err = VersionIdentifier::from_semantic_version(fields.0, fields.1, fields.2, fields.3)
                .unwrap_err();
            assert!(matches!(err, MigrationError::Validation(_)), "{fields:?}");
        }
    }

    #[test]
    fn test_negative_version_fields_normalize_to_zero() {
        let id = VersionIdentifier::from_semantic_version(2, -1, -5, 3).unwrap();
        assert_eq!(id.ordering_key(), 2_0000_0000_0003);
    }

    #[test]
    fn test_timestamp_ordering_key() {
        let id = VersionIdentifier::from_timestamp(2020, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(id.ordering_key(), 20200304050607);
        assert_eq!(id.kind(), VersionKind::Timestamp);
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        assert!(matches!(
            VersionIdentifier::from_timestamp(2021, 2, 30, 0, 0, 0),
            Err(MigrationError::Validation(_))
        ));
        assert!(VersionIdentifier::from_timestamp(2021, 1, 1, 24, 0, 0).is_err());
        assert!(VersionIdentifier::from_timestamp(10000, 1, 1, 0, 0, 0).is_err());
        assert!(VersionIdentifier::from_timestamp(0, 1, 1, 0, 0, 0).is_err());
    }

    #[test]
    fn test_display_text() {
        let ts = VersionIdentifier::from_timestamp(2020, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(ts.display_text(), "2020-03-04T05:06:07.0000000");

        let v = VersionIdentifier::from_semantic_version(1, 2, 0, 0).unwrap();
        assert_eq!(v.display_text(), "1.2.0.0");
        assert_eq!(v.to_string(), "1.2.0.0");
    }

    #[test]
    fn test_display_text_parses_back() {
        let ts = VersionIdentifier::from_timestamp(1999, 12, 31, 23, 59, 58).unwrap();
        assert_eq!(ts.display_text().parse::<VersionIdentifier>().unwrap(), ts);

        let v = VersionIdentifier::from_semantic_version(3, 14, 15, 9).unwrap();
        assert_eq!(v.display_text().parse::<VersionIdentifier>().unwrap(), v);
    }

    #[test]
    fn test_parse_short_forms() {
        let v: VersionIdentifier = "2.0".parse().unwrap();
        assert_eq!(v, VersionIdentifier::from_semantic_version(2, 0, 0, 0).unwrap());

        let ts: VersionIdentifier = "20240120120000".parse().unwrap();
        assert_eq!(ts, VersionIdentifier::from_timestamp(2024, 1, 20, 12, 0, 0).unwrap());

        let ts: VersionIdentifier = "2024-01-20T12:00:00Z".parse().unwrap();
        assert_eq!(ts.ordering_key(), 20240120120000);

        assert!("not-a-version".parse::<VersionIdentifier>().is_err());
        assert!("2024-01-20T12:00:00.5".parse::<VersionIdentifier>().is_err());
    }

    #[test]
    fn test_ordering_follows_key() {
        let a = VersionIdentifier::from_semantic_version(1, 0, 0, 0).unwrap();
        let b = VersionIdentifier::from_semantic_version(1, 1, 0, 0).unwrap();
        let c = VersionIdentifier::from_semantic_version(2, 0, 0, 0).unwrap();

        let mut ids = vec![c, a, b];
        ids.sort();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn test_marker_kind_and_conversion() {
        let marker = VersionMarker::version(1, 1);
        assert_eq!(marker.kind(), VersionKind::SemanticVersion);
        assert_eq!(marker.to_identifier().unwrap().display_text(), "1.1.0.0");

        let marker = VersionMarker::timestamp(2024, 13, 1, 0, 0, 0);
        assert_eq!(marker.kind(), VersionKind::Timestamp);
        assert!(marker.to_identifier().is_err());
    }

    #[test]
    fn test_kind_texts() {
        assert_eq!(VersionKind::Timestamp.as_str(), "TimeStamp");
        assert_eq!(VersionKind::SemanticVersion.as_str(), "Version");
        assert_eq!("Version".parse::<VersionKind>().unwrap(), VersionKind::SemanticVersion);
        assert!("Semver".parse::<VersionKind>().is_err());
        assert!(VersionKind::SemanticVersion.as_str().len() <= 9);
    }

    #[test]
    fn test_marker_type_names_resolve() {
        for kind in [VersionKind::Timestamp, VersionKind::SemanticVersion] {
            assert_eq!(
                VersionKind::from_marker_type_name(kind.marker_type_name()).unwrap(),
                kind
            );
        }
        assert!(matches!(
            VersionKind::from_marker_type_name("System.String"),
            Err(MigrationError::Validation(_))
        ));
    }
}
