use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_length, normalize_tags, null_as_empty, MAX_TEMPLATE_NAME_LENGTH};
use crate::error::{DaybookError, Result};

/// A saved activity preset used to prefill the activity form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTemplate {
    pub id: Uuid,
    pub user_id: String,
    pub template_name: String,
    pub content: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityTemplate {
    pub fn new(user_id: impl Into<String>, input: TemplateInput) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            template_name: input.template_name.trim().to_string(),
            content: input.content,
            tags: normalize_tags(input.tags),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInput {
    pub template_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub fn validate_template_input(input: &TemplateInput) -> Result<()> {
    let name = input.template_name.trim();
    if name.is_empty() {
        return Err(DaybookError::InvalidInput(
            "template_name cannot be empty".into(),
        ));
    }
    if name.chars().count() > MAX_TEMPLATE_NAME_LENGTH {
        return Err(DaybookError::InvalidInput(format!(
            "template_name exceeds maximum length of {MAX_TEMPLATE_NAME_LENGTH} characters"
        )));
    }
    check_length("content", &input.content)
}
