use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// One profile per account; never mutated after signup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Same as the username.
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(username: &str) -> ValidationResult<Self> {
        validate_username(username)?;
        Ok(Self {
            id: username.to_string(),
            username: username.to_string(),
            created_at: Utc::now(),
        })
    }
}

pub(crate) fn validate_username(username: &str) -> ValidationResult<()> {
    if username.trim().is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ar,
    #[default]
    En,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// User-facing account info stored in the vault header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub username: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub theme: Theme,
    /// `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

impl UserInfo {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            language: Language::default(),
            theme: Theme::default(),
            reminder_time: None,
            profile_picture: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub notifications: bool,
    pub backup_enabled: bool,
    pub islamic_features: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications: true,
            backup_enabled: true,
            islamic_features: true,
        }
    }
}
