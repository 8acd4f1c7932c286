use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoodLevel {
    VeryLow,
    Low,
    Neutral,
    Good,
    Excellent,
}

/// Which entry table an id belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Mood,
    Journal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IslamicPractices {
    pub prayer: bool,
    pub quran: bool,
    pub dhikr: bool,
    pub charity: bool,
}

/// A single mood check-in. Only `notes` is sensitive free text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    /// `HH:MM` time of day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// 0-23, kept for analytics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u8>,
    pub mood: MoodLevel,
    #[serde(default)]
    pub emotions: Vec<String>,
    /// 1-5
    pub energy: u8,
    /// 1-5
    pub stress: u8,
    /// Hours slept.
    pub sleep: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub islamic_practices: Option<IslamicPractices>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gratitude: Option<Vec<String>>,
}

impl MoodEntry {
    /// A new entry dated now, with a fresh id.
    pub fn new(mood: MoodLevel, energy: u8, stress: u8, sleep: f32) -> Self {
        Self {
            id: crate::new_entry_id(),
            date: Utc::now(),
            time: None,
            hour: None,
            mood,
            emotions: Vec::new(),
            energy,
            stress,
            sleep,
            notes: None,
            islamic_practices: None,
            gratitude: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        check_scale("energy", self.energy)?;
        check_scale("stress", self.stress)?;
        if !(0.0..=24.0).contains(&self.sleep) {
            return Err(ValidationError::OutOfRange {
                field: "sleep",
                min: 0,
                max: 24,
                value: self.sleep.to_string(),
            });
        }
        match self.hour {
            Some(hour) if hour > 23 => Err(ValidationError::OutOfRange {
                field: "hour",
                min: 0,
                max: 23,
                value: hour.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn check_scale(field: &'static str, value: u8) -> ValidationResult<()> {
    if !(1..=5).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field,
            min: 1,
            max: 5,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// A journal page. `content` is always sealed at rest, `title` only when
/// the entry is private.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<MoodLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Vec<String>>,
    #[serde(default)]
    pub is_private: bool,
}

impl JournalEntry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: crate::new_entry_id(),
            date: Utc::now(),
            title: None,
            content: content.into(),
            mood: None,
            emotions: None,
            is_private: false,
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        Ok(())
    }
}
