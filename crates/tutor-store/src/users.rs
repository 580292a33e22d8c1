//! User accounts and credential checks

use std::sync::LazyLock;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use regex::Regex;
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use tutor_core::{Error, Result};

use crate::db::{Database, persistence};

const MIN_PASSWORD_CHARS: usize = 6;

// something@something.tld
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

/// Registration payload after request parsing
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub experience_level: String,
    pub software_background: String,
    pub hardware_background: String,
}

/// Public view of an account; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub experience_level: String,
    pub software_background: String,
    pub hardware_background: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("Name is required".to_string()));
        }
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(Error::Validation("A valid email is required".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(Error::Validation(format!(
                "Password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Argon2id PHC string for `password`, plus the salt embedded in it
fn hash_password(password: &str) -> Result<(String, String)> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| Error::Other(format!("Failed to encode salt: {e}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Other(format!("Failed to hash password: {e}")))?;
    Ok((hash.to_string(), salt.as_str().to_string()))
}

fn verify_password(stored_hash: &str, password: &str) -> bool {
    PasswordHash::new(stored_hash)
        .is_ok_and(|hash| Argon2::default().verify_password(password.as_bytes(), &hash).is_ok())
}

fn invalid_credentials() -> Error {
    Error::Authentication("Invalid email or password".to_string())
}

impl Database {
    pub async fn create_user(&self, user: NewUser) -> Result<UserProfile> {
        user.validate()?;
        let email = normalize_email(&user.email);

        let profile = self
            .call(move |conn| {
                let (password_hash, salt) = hash_password(&user.password)?;
                let exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                        [&email],
                        |row| row.get(0),
                    )
                    .map_err(persistence("Failed to check email"))?;
                if exists {
                    return Err(Error::Validation("Email already registered".to_string()));
                }

                conn.execute(
                    "INSERT INTO users (name, email, password_hash, salt, experience_level,
                       software_background, hardware_background, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        user.name.trim(),
                        email,
                        password_hash,
                        salt,
                        user.experience_level,
                        user.software_background,
                        user.hardware_background,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )
                .map_err(persistence("Failed to create user"))?;

                Ok(UserProfile {
                    id: conn.last_insert_rowid(),
                    name: user.name.trim().to_string(),
                    email,
                    experience_level: user.experience_level,
                    software_background: user.software_background,
                    hardware_background: user.hardware_background,
                })
            })
            .await?;

        info!(user_id = profile.id, "registered user");
        Ok(profile)
    }

    /// Unknown email and wrong password produce the same error
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserProfile> {
        let email = normalize_email(email);
        let password = password.to_string();

        self.call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, email, password_hash, experience_level,
                       software_background, hardware_background
                     FROM users WHERE email = ?1",
                    [&email],
                    |row| {
                        Ok((
                            UserProfile {
                                id: row.get(0)?,
                                name: row.get(1)?,
                                email: row.get(2)?,
                                experience_level: row.get(4)?,
                                software_background: row.get(5)?,
                                hardware_background: row.get(6)?,
                            },
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(persistence("Failed to load user"))?;

            let (profile, stored_hash) = row.ok_or_else(invalid_credentials)?;
            if !verify_password(&stored_hash, &password) {
                return Err(invalid_credentials());
            }
            Ok(profile)
        })
        .await
    }
}
