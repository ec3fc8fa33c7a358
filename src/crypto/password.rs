//! Password handling for the archive-level crypto envelope.

use zeroize::Zeroizing;

/// A password for archive encryption/decryption.
///
/// Holds the password in a [`Zeroizing`] buffer so it is wiped from
/// memory on drop; never implements `Display` and redacts itself in
/// `Debug` output.
#[derive(Clone)]
pub struct Password {
    inner: Zeroizing<String>,
}

impl Password {
    /// Creates a new password from a string.
    pub fn new<S: Into<String>>(password: S) -> Self {
        Self {
            inner: Zeroizing::new(password.into()),
        }
    }

    /// Returns the password's raw UTF-8 bytes, as consumed by `scrypt`.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Returns the password as a string slice.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Returns true if the password is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the length of the password in characters.
    pub fn len(&self) -> usize {
        self.inner.chars().count()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_bytes_matches_the_utf8_encoding() {
        let password = Password::new("test");
        assert_eq!(password.as_bytes(), b"test");
    }

    #[test]
    fn debug_output_never_contains_the_password() {
        let password = Password::new("hunter2");
        let debug = format!("{password:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("len"));
    }

    #[test]
    fn empty_password_reports_zero_length() {
        let password = Password::new("");
        assert!(password.is_empty());
        assert_eq!(password.len(), 0);
    }

    #[test]
    fn from_str_and_from_string_agree() {
        let a: Password = "secret".into();
        let b: Password = String::from("secret").into();
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn len_counts_characters_not_bytes() {
        let password = Password::new("пароль");
        assert_eq!(password.len(), 6);
        assert_eq!(password.as_bytes().len(), 12);
    }
}
