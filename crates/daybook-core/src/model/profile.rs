use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{normalize_optional, MAX_TEMPLATE_NAME_LENGTH};
use crate::error::{DaybookError, Result};

/// Display name and avatar for a signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// An empty profile for a user who has never saved one.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            full_name: None,
            avatar_url: None,
            updated_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, update: &UpdateProfileInput) {
        if let Some(ref name) = update.full_name {
            self.full_name = normalize_optional(Some(name.clone()));
        }
        if let Some(ref url) = update.avatar_url {
            self.avatar_url = normalize_optional(Some(url.clone()));
        }
        self.updated_at = Utc::now();
    }
}

/// Fields left as `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateProfileInput {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

pub fn validate_profile_input(input: &UpdateProfileInput) -> Result<()> {
    if let Some(ref name) = input.full_name {
        if name.chars().count() > MAX_TEMPLATE_NAME_LENGTH {
            return Err(DaybookError::InvalidInput(format!(
                "full_name exceeds maximum length of {MAX_TEMPLATE_NAME_LENGTH} characters"
            )));
        }
    }
    Ok(())
}
