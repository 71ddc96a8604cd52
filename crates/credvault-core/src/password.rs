//! Password generation and strength estimation

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::crypto::SecretString;
use crate::error::{Result, VaultError};

/// Shortest accepted master passphrase
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Generated password length bounds
pub const MIN_GENERATED_LEN: usize = 8;
pub const MAX_GENERATED_LEN: usize = 128;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

const COMMON_PASSWORDS: &[&str] = &[
    "password", "123456", "12345678", "qwerty", "abc123", "monkey", "letmein", "dragon",
    "111111", "baseball", "iloveyou", "trustno1", "sunshine", "master", "welcome", "shadow",
    "ashley", "football", "jesus", "michael", "ninja", "mustang", "password1",
];

/// Character classes and length for [`generate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorOptions {
    pub length: usize,
    pub uppercase: bool,
    pub lowercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            length: 16,
            uppercase: true,
            lowercase: true,
            digits: true,
            symbols: true,
        }
    }
}

/// Generate a random password from the OS RNG
///
/// Every selected class appears at least once. With no class selected,
/// lowercase letters and digits are used.
pub fn generate(options: &GeneratorOptions) -> Result<SecretString> {
    if !(MIN_GENERATED_LEN..=MAX_GENERATED_LEN).contains(&options.length) {
        return Err(VaultError::Configuration(format!(
            "password length must be between {} and {}",
            MIN_GENERATED_LEN, MAX_GENERATED_LEN
        )));
    }

    let mut classes: Vec<&[u8]> = [
        (options.uppercase, UPPERCASE),
        (options.lowercase, LOWERCASE),
        (options.digits, DIGITS),
        (options.symbols, SYMBOLS),
    ]
    .into_iter()
    .filter_map(|(selected, chars)| selected.then_some(chars))
    .collect();
    if classes.is_empty() {
        classes = vec![LOWERCASE, DIGITS];
    }

    let pool: Vec<u8> = classes.concat();
    let mut rng = OsRng;

    let mut bytes: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while bytes.len() < options.length {
        bytes.push(pool[rng.gen_range(0..pool.len())]);
    }
    bytes.shuffle(&mut rng);

    // Every byte comes from an ASCII table.
    let password: String = bytes.iter().map(|&b| char::from(b)).collect();
    zeroize::Zeroize::zeroize(&mut bytes);
    Ok(SecretString::new(password))
}

/// Strength buckets, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strength {
    VeryWeak,
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl Strength {
    fn from_score(score: u32) -> Self {
        match score {
            90.. => Strength::VeryStrong,
            75..=89 => Strength::Strong,
            50..=74 => Strength::Medium,
            25..=49 => Strength::Weak,
            _ => Strength::VeryWeak,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strength::VeryWeak => "very weak",
            Strength::Weak => "weak",
            Strength::Medium => "medium",
            Strength::Strong => "strong",
            Strength::VeryStrong => "very strong",
        }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of [`check_strength`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthReport {
    pub strength: Strength,
    /// 0-100
    pub score: u32,
    /// What is wrong with the password
    pub feedback: Vec<String>,
    /// What to do about it
    pub suggestions: Vec<String>,
}

fn keyboard_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(qwer|asdf|zxcv|1234|5678|qaz|wsx|edc)").expect("static regex")
    })
}

fn special_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).expect("static regex"))
}

/// Three or more of the same character in a row
fn has_repeated_run(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

/// Score a password 0-100 and explain the score
pub fn check_strength(password: &str) -> StrengthReport {
    let mut feedback = Vec::new();
    let mut suggestions = Vec::new();
    let mut score: u32 = 0;
    let length = password.chars().count();

    let mut check = |passed: bool, points: u32, problem: &str, fix: &str| {
        if passed {
            score += points;
        } else {
            feedback.push(problem.to_string());
            suggestions.push(fix.to_string());
        }
    };

    check(
        length >= 8,
        (length as u32).saturating_mul(4).min(20),
        "Password must be at least 8 characters",
        "Make it longer",
    );
    check(
        password.chars().any(|c| c.is_ascii_uppercase()),
        15,
        "Password should contain uppercase letters",
        "Add uppercase letters",
    );
    check(
        password.chars().any(|c| c.is_ascii_lowercase()),
        15,
        "Password should contain lowercase letters",
        "Add lowercase letters",
    );
    check(
        password.chars().any(|c| c.is_ascii_digit()),
        15,
        "Password should contain digits",
        "Add digits",
    );
    check(
        special_chars().is_match(password),
        15,
        "Password should contain special characters",
        "Add special characters",
    );

    let unique = password.chars().collect::<HashSet<_>>().len();
    check(
        (unique as f64) >= (length as f64) * 0.6,
        10,
        "Too many repeated characters",
        "Use more distinct characters",
    );

    let mut penalize = |hit: bool, points: u32, problem: &str, fix: &str| {
        if hit {
            feedback.push(problem.to_string());
            suggestions.push(fix.to_string());
            score = score.saturating_sub(points);
        }
    };

    let lowered = password.to_lowercase();
    penalize(
        COMMON_PASSWORDS.contains(&lowered.as_str()),
        30,
        "This is a common password and easy to guess",
        "Avoid common passwords",
    );
    penalize(
        has_repeated_run(password),
        10,
        "Password repeats the same character in a row",
        "Avoid runs of the same character",
    );
    penalize(
        keyboard_pattern().is_match(password),
        10,
        "Password contains a keyboard pattern",
        "Avoid keyboard patterns",
    );

    StrengthReport {
        strength: Strength::from_score(score),
        score,
        feedback,
        suggestions,
    }
}

/// Reject master passphrases that are too short
pub fn validate_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
        return Err(VaultError::PassphraseTooShort {
            min: MIN_PASSPHRASE_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default() {
        let password = generate(&GeneratorOptions::default()).unwrap();
        let password = password.expose();

        assert_eq!(password.len(), 16);
        assert!(password.bytes().any(|b| UPPERCASE.contains(&b)));
        assert!(password.bytes().any(|b| LOWERCASE.contains(&b)));
        assert!(password.bytes().any(|b| DIGITS.contains(&b)));
        assert!(password.bytes().any(|b| SYMBOLS.contains(&b)));
    }

    #[test]
    fn test_generate_without_classes_falls_back() {
        let options = GeneratorOptions {
            length: 32,
            uppercase: false,
            lowercase: false,
            digits: false,
            symbols: false,
        };
        let password = generate(&options).unwrap();
        assert!(password
            .expose()
            .bytes()
            .all(|b| LOWERCASE.contains(&b) || DIGITS.contains(&b)));
    }

    #[test]
    fn test_generate_rejects_bad_length() {
        for length in [0, 7, 129] {
            let options = GeneratorOptions {
                length,
                ..Default::default()
            };
            assert!(matches!(generate(&options), Err(VaultError::Configuration(_))));
        }
        let options = GeneratorOptions {
            length: 128,
            ..Default::default()
        };
        assert_eq!(generate(&options).unwrap().expose().len(), 128);
    }

    #[test]
    fn test_generated_passwords_differ() {
        let a = generate(&GeneratorOptions::default()).unwrap();
        let b = generate(&GeneratorOptions::default()).unwrap();
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn test_common_password_is_very_weak() {
        let report = check_strength("password");
        // 20 length + 15 lowercase + 10 diversity - 30 common
        assert_eq!(report.score, 15);
        assert_eq!(report.strength, Strength::VeryWeak);
        assert!(report.feedback.iter().any(|f| f.contains("common")));
    }

    #[test]
    fn test_strong_password() {
        let report = check_strength("Tr0ub4dor&3xyz");
        assert_eq!(report.score, 90);
        assert_eq!(report.strength, Strength::VeryStrong);
        assert!(report.feedback.is_empty());
    }

    #[test]
    fn test_penalties() {
        let report = check_strength("Aaaa1111!qwer");
        assert!(report.feedback.iter().any(|f| f.contains("in a row")));
        assert!(report.feedback.iter().any(|f| f.contains("keyboard")));
        assert!(report.score < 90);
    }

    #[test]
    fn test_short_password_scores_nothing_for_length() {
        let report = check_strength("Ab1!");
        assert_eq!(report.score, 70);
        assert_eq!(report.strength, Strength::Medium);
        assert!(report.feedback[0].contains("at least 8"));
    }

    #[test]
    fn test_strength_buckets() {
        assert_eq!(Strength::from_score(0), Strength::VeryWeak);
        assert_eq!(Strength::from_score(25), Strength::Weak);
        assert_eq!(Strength::from_score(50), Strength::Medium);
        assert_eq!(Strength::from_score(75), Strength::Strong);
        assert_eq!(Strength::from_score(90), Strength::VeryStrong);
        assert_eq!(Strength::from_score(100), Strength::VeryStrong);
    }

    #[test]
    fn test_validate_passphrase() {
        assert!(matches!(
            validate_passphrase("short"),
            Err(VaultError::PassphraseTooShort { min: 8 })
        ));
        assert!(validate_passphrase("long enough").is_ok());
    }
}
