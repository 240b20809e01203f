//! Stored exemplars and their persisted form.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PhonemeError;
use crate::features::FeatureVector;
use crate::letter::{Letter, ProfileId};

/// In-memory identity of a snapshot.
///
/// Assigned when the snapshot enters the store; not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(pub(crate) u64);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Positive, negative, or negative for every letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Positive,
    Negative,
    GlobalNegative,
}

impl SnapshotKind {
    pub fn is_negative(self) -> bool {
        self != SnapshotKind::Positive
    }

    /// Score a freshly captured snapshot starts with.
    pub fn initial_score(self) -> u32 {
        match self {
            SnapshotKind::Positive => 1,
            _ => 0,
        }
    }
}

/// A stored feature pattern for one letter.
///
/// Only `score` changes after creation, and only upward.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub label: Letter,
    pub pattern: FeatureVector,
    pub is_negative: bool,
    pub is_global_negative: bool,
    pub score: u32,
    pub audio_ref: Option<String>,
    pub owner: ProfileId,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn kind(&self) -> SnapshotKind {
        if self.is_global_negative {
            SnapshotKind::GlobalNegative
        } else if self.is_negative {
            SnapshotKind::Negative
        } else {
            SnapshotKind::Positive
        }
    }

    /// Same owner, pattern and audio reference.
    pub fn same_capture(&self, owner: &ProfileId, pattern: &FeatureVector, audio_ref: Option<&str>) -> bool {
        &self.owner == owner && &self.pattern == pattern && self.audio_ref.as_deref() == audio_ref
    }

    pub fn to_record(&self) -> SnapshotRecord {
        SnapshotRecord {
            data: self.pattern.as_slice().to_vec(),
            profile_id: self.owner.to_string(),
            is_negative: self.is_negative,
            is_global_negative: self.is_global_negative,
            score: self.score,
            audio_url: self.audio_ref.clone(),
            created_at: Some(self.created_at),
        }
    }
}

/// Persisted form of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub data: Vec<f32>,
    pub profile_id: String,
    #[serde(default)]
    pub is_negative: bool,
    #[serde(default)]
    pub is_global_negative: bool,
    #[serde(default)]
    pub score: u32,
    #[serde(rename = "audio_url", default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SnapshotRecord {
    /// Checks the record and turns it into a snapshot for `label`.
    pub fn into_snapshot(self, id: SnapshotId, label: Letter, bins: usize) -> Result<Snapshot, PhonemeError> {
        if self.data.len() != bins {
            return Err(PhonemeError::InvalidRecord(format!(
                "pattern has {} bins, expected {bins}",
                self.data.len()
            )));
        }
        if let Some(bad) = self
            .data
            .iter()
            .find(|v| !v.is_finite() || !(0.0..=1.0).contains(*v))
        {
            return Err(PhonemeError::InvalidRecord(format!("pattern value {bad} out of range")));
        }
        let owner = ProfileId::new(self.profile_id)?;
        Ok(Snapshot {
            id,
            label,
            pattern: FeatureVector::new(self.data),
            is_negative: self.is_negative || self.is_global_negative,
            is_global_negative: self.is_global_negative,
            score: self.score,
            audio_ref: self.audio_url.filter(|u| !u.is_empty()),
            owner,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}

/// All persisted snapshots of one letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterRecord {
    pub letter: Letter,
    pub snapshots: Vec<SnapshotRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(data: Vec<f32>) -> SnapshotRecord {
        SnapshotRecord {
            data,
            profile_id: "kid".into(),
            is_negative: false,
            is_global_negative: false,
            score: 3,
            audio_url: None,
            created_at: None,
        }
    }

    #[test]
    fn record_json_field_names() {
        let json = r#"{"data":[0.5,1.0],"profileId":"kid","isNegative":true,"isGlobalNegative":false,"score":2,"audio_url":"kv://clips/a.wav","createdAt":"2026-01-02T03:04:05Z"}"#;
        let rec: SnapshotRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.profile_id, "kid");
        assert!(rec.is_negative);
        assert_eq!(rec.audio_url.as_deref(), Some("kv://clips/a.wav"));

        let back = serde_json::to_value(&rec).unwrap();
        assert_eq!(back["profileId"], "kid");
        assert_eq!(back["isGlobalNegative"], false);
        assert!(back.get("audio_url").is_some());
    }

    #[test]
    fn missing_optional_fields_default() {
        let rec: SnapshotRecord = serde_json::from_str(r#"{"data":[1.0],"profileId":"p"}"#).unwrap();
        assert_eq!(rec.score, 0);
        assert!(!rec.is_negative);
        assert!(rec.created_at.is_none());
    }

    #[test]
    fn into_snapshot_validates() {
        let m = Letter::new('m').unwrap();
        assert!(record(vec![0.5; 4]).into_snapshot(SnapshotId(1), m, 4).is_ok());
        assert!(record(vec![0.5; 3]).into_snapshot(SnapshotId(1), m, 4).is_err());
        assert!(record(vec![0.5, 1.5, 0.0, 0.0]).into_snapshot(SnapshotId(1), m, 4).is_err());
        assert!(record(vec![f32::NAN, 0.0, 0.0, 0.0]).into_snapshot(SnapshotId(1), m, 4).is_err());

        let mut anonymous = record(vec![0.5; 4]);
        anonymous.profile_id = String::new();
        assert!(anonymous.into_snapshot(SnapshotId(1), m, 4).is_err());
    }

    #[test]
    fn global_negative_implies_negative() {
        let mut rec = record(vec![0.5; 4]);
        rec.is_global_negative = true;
        let snap = rec.into_snapshot(SnapshotId(7), Letter::new('s').unwrap(), 4).unwrap();
        assert!(snap.is_negative);
        assert_eq!(snap.kind(), SnapshotKind::GlobalNegative);
        assert_eq!(snap.to_record().score, 3);
    }
}
