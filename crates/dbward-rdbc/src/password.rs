//! Credential generation
//!
//! Passwords are drawn from the operating system CSPRNG and restricted to
//! ASCII alphanumerics so they survive every client connection-string format
//! without escaping.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use secrecy::SecretString;

/// Default generated password length
pub const DEFAULT_PASSWORD_LENGTH: usize = 32;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 16;

/// Generate a random password of `length` characters (at least
/// [`MIN_PASSWORD_LENGTH`])
pub fn generate_password(length: usize) -> SecretString {
    let length = length.max(MIN_PASSWORD_LENGTH);
    let password: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    SecretString::from(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_password_length_and_charset() {
        let pw = generate_password(DEFAULT_PASSWORD_LENGTH);
        assert_eq!(pw.expose_secret().len(), DEFAULT_PASSWORD_LENGTH);
        assert!(pw.expose_secret().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_password_minimum_length() {
        let pw = generate_password(4);
        assert_eq!(pw.expose_secret().len(), MIN_PASSWORD_LENGTH);
    }

    #[test]
    fn test_passwords_differ() {
        let a = generate_password(DEFAULT_PASSWORD_LENGTH);
        let b = generate_password(DEFAULT_PASSWORD_LENGTH);
        assert_ne!(a.expose_secret(), b.expose_secret());
    }
}
