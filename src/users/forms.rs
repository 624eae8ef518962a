use std::sync::LazyLock;

use diesel::{QueryResult, SqliteConnection};
use regex::Regex;
use serde::Deserialize;

use super::{username_taken, NewAccount, USERNAME_MAX_LENGTH};
use crate::forms::{max_length_message, require_trimmed, required_message, FormErrors};
use crate::security::password::PasswordManager;

pub const LOGIN_FAILED_MESSAGE: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

const NAME_MAX_LENGTH: usize = 150;
const EMAIL_MAX_LENGTH: usize = 254;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password1: String,
    pub password2: String,
}

impl RegistrationForm {
    /// Validates the submission. Uniqueness needs the database, so a query
    /// failure is reported separately from form errors.
    pub fn validate(
        &self,
        conn: &mut SqliteConnection,
        passwords: &PasswordManager,
    ) -> QueryResult<Result<NewAccount, FormErrors>> {
        let mut errors = FormErrors::new();

        let username = require_trimmed(&mut errors, "username", &self.username);
        if let Some(username) = username {
            let length = username.chars().count();
            if length > USERNAME_MAX_LENGTH {
                errors.add("username", max_length_message(USERNAME_MAX_LENGTH, length));
            } else if !is_valid_username(username) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            } else if username_taken(conn, username)? {
                errors.add("username", "A user with that username already exists.");
            }
        }

        let email = self.email.trim();
        if !email.is_empty() {
            let length = email.chars().count();
            if length > EMAIL_MAX_LENGTH {
                errors.add("email", max_length_message(EMAIL_MAX_LENGTH, length));
            } else if !is_valid_email(email) {
                errors.add("email", "Enter a valid email address.");
            }
        }

        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            let length = value.trim().chars().count();
            if length > NAME_MAX_LENGTH {
                errors.add(field, max_length_message(NAME_MAX_LENGTH, length));
            }
        }

        if self.password1.is_empty() {
            errors.add("password1", required_message());
        }
        if self.password2.is_empty() {
            errors.add("password2", required_message());
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                let email = (!email.is_empty()).then_some(email);
                for issue in passwords.validate(&self.password2, username, email) {
                    errors.add("password2", issue.message());
                }
            }
        }

        Ok(errors.finish(|| NewAccount {
            username: username.unwrap_or_default().to_string(),
            email: email.to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            password: self.password1.clone(),
            is_staff: false,
        }))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: String,
}

impl LoginForm {
    /// Checks presence only; credentials are checked against the store.
    pub fn validate(&self) -> Result<(&str, &str), FormErrors> {
        let mut errors = FormErrors::new();
        let username = require_trimmed(&mut errors, "username", &self.username);
        if self.password.is_empty() {
            errors.add("password", required_message());
        }

        match username {
            Some(username) if errors.is_empty() => Ok((username, self.password.as_str())),
            _ => Err(errors),
        }
    }
}

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("Invalid username regex"));

/// Dotted domain required; bare hosts such as `localhost` are rejected.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).expect("Invalid email regex")
});

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}
