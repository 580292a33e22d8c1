//! Typed request and response bodies
//!
//! Every field a client may omit is an `Option`; `validate` turns missing or
//! blank required fields into `Error::Validation` at the boundary.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use tutor_core::{Error, Result, SourceRef};
use tutor_store::NewUser;

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Validation(format!("Field '{field}' is required")))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub selected_text: Option<String>,
}

impl ChatRequest {
    /// The question and the non-blank selection, if any
    pub fn validate(self) -> Result<(String, Option<String>)> {
        let message = required(self.message, "message")?;
        let selected = self.selected_text.filter(|s| !s.trim().is_empty());
        Ok((message, selected))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub experience_level: Option<String>,
    pub software_background: Option<String>,
    pub hardware_background: Option<String>,
}

impl SignupRequest {
    pub fn validate(self) -> Result<NewUser> {
        let user = NewUser {
            name: required(self.name, "name")?,
            email: required(self.email, "email")?,
            password: required(self.password, "password")?,
            experience_level: self
                .experience_level
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "beginner".to_string()),
            software_background: self.software_background.unwrap_or_default(),
            hardware_background: self.hardware_background.unwrap_or_default(),
        };
        user.validate()?;
        Ok(user)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl SigninRequest {
    pub fn validate(self) -> Result<(String, String)> {
        Ok((
            required(self.email, "email")?,
            required(self.password, "password")?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBackground {
    #[serde(default = "default_level")]
    pub experience_level: String,
    #[serde(default)]
    pub software_background: String,
    #[serde(default)]
    pub hardware_background: String,
}

fn default_level() -> String {
    "beginner".to_string()
}

impl Default for UserBackground {
    fn default() -> Self {
        Self {
            experience_level: default_level(),
            software_background: String::new(),
            hardware_background: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizeRequest {
    pub content: Option<String>,
    pub user_background: Option<UserBackground>,
}

impl PersonalizeRequest {
    pub fn validate(self) -> Result<(String, UserBackground)> {
        Ok((
            required(self.content, "content")?,
            self.user_background.unwrap_or_default(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    #[default]
    Urdu,
    English,
}

impl FromStr for TargetLanguage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "urdu" | "ur" => Ok(Self::Urdu),
            "english" | "en" => Ok(Self::English),
            _ => Err(Error::Validation(format!("Unsupported target language: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub content: Option<String>,
    pub target_language: Option<String>,
}

impl TranslateRequest {
    pub fn validate(self) -> Result<(String, TargetLanguage)> {
        let content = required(self.content, "content")?;
        let language = match self.target_language {
            Some(raw) => raw.parse::<TargetLanguage>()?,
            None => TargetLanguage::default(),
        };
        Ok((content, language))
    }
}
