use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
    pub reject_numeric: bool,
    pub reject_common: bool,
    /// Ratio above which a password counts as too similar to the username
    /// or email. Zero disables the check.
    pub max_similarity: f64,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 4096,
            reject_numeric: true,
            reject_common: true,
            max_similarity: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2Config {
    pub memory_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub output_length: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost_kib: 19456,
            time_cost: 2,
            parallelism: 1,
            output_length: 32,
        }
    }
}

impl Argon2Config {
    /// Cheapest parameters argon2 accepts. Only meant for test fixtures.
    pub fn minimal() -> Self {
        Self {
            memory_cost_kib: 8,
            time_cost: 1,
            parallelism: 1,
            output_length: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordIssue {
    TooShort { min: usize },
    TooLong { max: usize },
    EntirelyNumeric,
    CommonPassword,
    TooSimilar { attribute: &'static str },
}

impl PasswordIssue {
    pub fn message(&self) -> String {
        match self {
            Self::TooShort { min } => format!(
                "This password is too short. It must contain at least {min} characters."
            ),
            Self::TooLong { max } => {
                format!("This password is too long. It must contain at most {max} characters.")
            }
            Self::EntirelyNumeric => "This password is entirely numeric.".into(),
            Self::CommonPassword => "This password is too common.".into(),
            Self::TooSimilar { attribute } => {
                format!("The password is too similar to the {attribute}.")
            }
        }
    }
}

pub struct PasswordManager {
    argon2: Argon2<'static>,
    config: PasswordConfig,
}

impl PasswordManager {
    pub fn new(argon2_config: &Argon2Config, password_config: PasswordConfig) -> Result<Self> {
        let params = Params::new(
            argon2_config.memory_cost_kib,
            argon2_config.time_cost,
            argon2_config.parallelism,
            Some(argon2_config.output_length),
        )
        .map_err(|e| anyhow!("Invalid Argon2 parameters: {e}"))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        Ok(Self {
            argon2,
            config: password_config,
        })
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {e}"))?;

        Ok(hash.to_string())
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("Password verification failed: {e}")),
        }
    }

    /// Burns roughly the same time as a real verification so unknown
    /// usernames cannot be told apart by latency.
    pub fn verify_dummy(&self, password: &str) {
        let salt = SaltString::generate(&mut OsRng);
        if self.argon2.hash_password(password.as_bytes(), &salt).is_err() {
            debug!("Dummy password hash failed");
        }
    }

    pub fn validate(
        &self,
        password: &str,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Vec<PasswordIssue> {
        let mut issues = Vec::new();

        let length = password.chars().count();
        if length < self.config.min_length {
            issues.push(PasswordIssue::TooShort {
                min: self.config.min_length,
            });
        }
        if length > self.config.max_length {
            issues.push(PasswordIssue::TooLong {
                max: self.config.max_length,
            });
        }

        if self.config.max_similarity > 0.0 {
            let candidates = [
                ("username", username),
                ("email address", email),
                ("email address", email.and_then(|e| e.split('@').next())),
            ];
            for (attribute, value) in candidates {
                let Some(value) = value.filter(|v| !v.is_empty()) else {
                    continue;
                };
                if similarity_ratio(password, value) >= self.config.max_similarity {
                    issues.push(PasswordIssue::TooSimilar { attribute });
                    break;
                }
            }
        }

        if self.config.reject_common && is_common_password(password) {
            issues.push(PasswordIssue::CommonPassword);
        }

        if self.config.reject_numeric
            && !password.is_empty()
            && password.chars().all(|c| c.is_ascii_digit())
        {
            issues.push(PasswordIssue::EntirelyNumeric);
        }

        issues
    }
}

/// `2 * lcs / (len(a) + len(b))` over lowercased characters, where `lcs` is
/// the longest common subsequence.
fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                previous[j] + 1
            } else {
                current[j].max(previous[j + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    (2 * previous[b.len()]) as f64 / total as f64
}

fn is_common_password(password: &str) -> bool {
    const COMMON_PASSWORDS: &[&str] = &[
        "password",
        "123456",
        "12345678",
        "123456789",
        "qwerty",
        "qwertyuiop",
        "abc123",
        "monkey",
        "1234567",
        "letmein",
        "trustno1",
        "dragon",
        "baseball",
        "iloveyou",
        "master",
        "sunshine",
        "ashley",
        "bailey",
        "shadow",
        "123123",
        "654321",
        "superman",
        "qazwsx",
        "michael",
        "football",
        "password1",
        "password123",
        "welcome",
        "welcome1",
        "admin",
        "admin123",
        "changeme",
        "default",
        "secret",
        "login",
        "passw0rd",
        "p@ssword",
        "p@ssw0rd",
        "qwerty123",
        "azerty",
        "000000",
        "111111",
        "1234567890",
        "0987654321",
    ];

    let lower = password.to_lowercase();
    COMMON_PASSWORDS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PasswordManager {
        PasswordManager::new(&Argon2Config::minimal(), PasswordConfig::default())
            .expect("Failed to create manager")
    }

    #[test]
    fn test_hash_and_verify() {
        let manager = manager();
        let hash = manager.hash("correct horse battery").expect("Failed to hash");

        assert!(hash.starts_with("$argon2id$"));
        assert!(manager.verify("correct horse battery", &hash).expect("Verify failed"));
        assert!(!manager.verify("wrong horse", &hash).expect("Verify failed"));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(manager().verify("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_strong_password_passes() {
        let issues = manager().validate("Tr1cky-Lemur-42", Some("alice"), None);
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_too_short() {
        let issues = manager().validate("Ab1!", None, None);
        assert!(issues.contains(&PasswordIssue::TooShort { min: 8 }));
        assert_eq!(
            issues[0].message(),
            "This password is too short. It must contain at least 8 characters."
        );
    }

    #[test]
    fn test_numeric_and_common() {
        let issues = manager().validate("12345678", None, None);
        assert!(issues.contains(&PasswordIssue::EntirelyNumeric));
        assert!(issues.contains(&PasswordIssue::CommonPassword));
    }

    #[test]
    fn test_similar_to_username() {
        let issues = manager().validate("testuser1", Some("testuser"), None);
        assert!(issues.contains(&PasswordIssue::TooSimilar {
            attribute: "username"
        }));
    }

    #[test]
    fn test_similarity_ratio() {
        assert!((similarity_ratio("abc", "abc") - 1.0).abs() < f64::EPSILON);
        assert!(similarity_ratio("abc", "xyz") < f64::EPSILON);
        assert!(similarity_ratio("", "") < f64::EPSILON);
    }

    #[test]
    fn test_invalid_argon2_params() {
        let config = Argon2Config {
            memory_cost_kib: 0,
            time_cost: 0,
            parallelism: 0,
            output_length: 32,
        };
        assert!(PasswordManager::new(&config, PasswordConfig::default()).is_err());
    }
}
