//! User records and the inputs that create or change them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tandem_cache::CacheValue;
use tandem_storage::Record;
use time::OffsetDateTime;

use crate::error::{UserError, UserResult};

pub const DEFAULT_ROLE: &str = "user";

fn default_active() -> bool {
    true
}

fn default_roles() -> Vec<String> {
    vec![DEFAULT_ROLE.to_string()]
}

/// A user as stored in both stores.
///
/// `password` holds an argon2 PHC string and is stripped from every user
/// the service hands out. Token fields serialize as `null` when unset so a
/// projection clears them in the secondary store too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "default_roles")]
    pub roles: Vec<String>,
    #[serde(default)]
    pub password_reset_token: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub password_reset_expires: Option<OffsetDateTime>,
    #[serde(default)]
    pub email_verification_token: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub email_verification_expires: Option<OffsetDateTime>,
}

impl User {
    /// The same user without the password hash.
    #[must_use]
    pub fn without_password(mut self) -> Self {
        self.password = None;
        self
    }
}

impl CacheValue for User {}

impl Record for User {
    const KIND: &'static str = "user";
    const NATURAL_KEY_FIELD: &'static str = "email";
    const UNIQUE_FIELDS: &'static [&'static str] = &["email", "username"];
    const SENSITIVE_FIELDS: &'static [&'static str] = &["password"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn natural_key(&self) -> Option<&str> {
        Some(&self.email)
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

impl NewUser {
    pub fn validate(&self) -> UserResult<()> {
        require_text("firstName", &self.first_name)?;
        require_text("lastName", &self.last_name)?;
        require_text("username", &self.username)?;
        validate_email(&self.email)?;
        validate_password_strength(&self.password)
    }

    /// The record to insert, carrying `password_hash` instead of the plain password.
    pub(crate) fn into_user(self, password_hash: String) -> User {
        User {
            id: None,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password: Some(password_hash),
            is_active: self.is_active.unwrap_or(true),
            roles: self.roles.unwrap_or_else(default_roles),
            password_reset_token: None,
            password_reset_expires: None,
            email_verification_token: None,
            email_verification_expires: None,
        }
    }
}

/// Partial update of a user. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl UserPatch {
    /// Validates the fields present. Already-hashed passwords skip the strength rules.
    pub fn validate(&self) -> UserResult<()> {
        if let Some(first_name) = &self.first_name {
            require_text("firstName", first_name)?;
        }
        if let Some(last_name) = &self.last_name {
            require_text("lastName", last_name)?;
        }
        if let Some(username) = &self.username {
            require_text("username", username)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        match &self.password {
            Some(password) if !crate::password::is_hashed(password) => {
                validate_password_strength(password)
            }
            _ => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_merge_patch().as_object().is_none_or(Map::is_empty)
    }

    /// JSON merge patch with only the present fields.
    pub fn to_merge_patch(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

fn require_text(field: &str, value: &str) -> UserResult<()> {
    if value.trim().is_empty() {
        return Err(UserError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Minimal address check: one `@`, a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> UserResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
                && domain
                    .split('.')
                    .filter(|part| !part.is_empty())
                    .count()
                    >= 2
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(UserError::validation("email", "Invalid email address"))
    }
}

const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

const FORBIDDEN_SEQUENCES: &[&str] = &[
    "abc", "bcd", "cde", "def", "efg", "fgh", "ghi", "hij", "ijk", "jkl", "klm", "lmn", "mno",
    "nop", "opq", "pqr", "qrs", "rst", "stu", "tuv", "uvw", "vwx", "wxy", "xyz", "123", "234",
    "345", "456", "567", "678", "789", "012", "098", "987", "876", "765", "654", "543", "432",
    "321",
];

/// Requires upper and lower case letters, a digit and a special character, and
/// rejects runs such as `abc` or `321`.
pub fn validate_password_strength(password: &str) -> UserResult<()> {
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIAL_CHARACTERS.contains(c));
    let lowered = password.to_ascii_lowercase();
    let has_sequence = FORBIDDEN_SEQUENCES.iter().any(|seq| lowered.contains(seq));

    if has_upper && has_lower && has_digit && has_special && !has_sequence {
        Ok(())
    } else {
        Err(UserError::validation(
            "password",
            "Password must contain at least one uppercase letter, one lowercase letter, \
             one special character, one number, and no sequences like \"abc\" or \"123\"",
        ))
    }
}
