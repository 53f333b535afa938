//! Authorization token resolution.
//!
//! The fleet controller authenticates every request with a single
//! `Authorization` header.  The token is either handed over directly or read
//! from a JSON credential file of the form `{"auth": "Basic ..."}`.

use std::fmt;
use std::fs;
use std::path::Path;

use mir_types::MirError;
use serde::Deserialize;
use zeroize::Zeroizing;

/// The header-carried credential.  The token is wiped from memory on drop
/// and never printed by `Debug`.
#[derive(Clone)]
pub struct Credential(Zeroizing<String>);

#[derive(Deserialize)]
struct CredentialFile {
    auth: Option<String>,
}

impl Credential {
    /// Wrap a token value.  Blank tokens are rejected.
    pub fn new(token: impl Into<String>) -> Result<Self, MirError> {
        let token = Zeroizing::new(token.into());
        if token.trim().is_empty() {
            return Err(MirError::Configuration(
                "authorization token is empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Read the token from the `"auth"` field of a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, MirError> {
        let raw = Zeroizing::new(fs::read_to_string(path).map_err(|e| {
            MirError::Configuration(format!(
                "failed to read credential file {}: {e}",
                path.display()
            ))
        })?);
        let parsed: CredentialFile = serde_json::from_str(&raw).map_err(|e| {
            MirError::Configuration(format!(
                "credential file {} is not valid JSON: {e}",
                path.display()
            ))
        })?;
        match parsed.auth {
            Some(token) => Self::new(token),
            None => Err(MirError::Configuration(format!(
                "credential file {} has no \"auth\" field",
                path.display()
            ))),
        }
    }

    /// Prefer an explicit `token`; fall back to `file`.
    ///
    /// # Errors
    ///
    /// [`MirError::Configuration`] when neither source is supplied or the
    /// file cannot provide a token.
    pub fn resolve(token: Option<&str>, file: Option<&Path>) -> Result<Self, MirError> {
        match (token, file) {
            (Some(token), _) => Self::new(token),
            (None, Some(file)) => Self::from_file(file),
            (None, None) => Err(MirError::Configuration(
                "pass either an authorization token or a credential file that contains it"
                    .to_string(),
            )),
        }
    }

    /// The raw header value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("auth.json");
        fs::write(&path, contents).expect("write credential file");
        path
    }

    #[test]
    fn explicit_token_wins_over_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write_file(&dir, r#"{"auth": "from-file"}"#);
        let cred = Credential::resolve(Some("Basic abc"), Some(&path)).unwrap();
        assert_eq!(cred.expose(), "Basic abc");
    }

    #[test]
    fn token_is_read_from_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write_file(&dir, r#"{"auth": "Basic from-file"}"#);
        let cred = Credential::resolve(None, Some(&path)).unwrap();
        assert_eq!(cred.expose(), "Basic from-file");
    }

    #[test]
    fn file_without_auth_field_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write_file(&dir, r#"{"token": "Basic abc"}"#);
        let err = Credential::resolve(None, Some(&path)).unwrap_err();
        match err {
            MirError::Configuration(msg) => assert!(msg.contains("\"auth\"")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("absent.json");
        let err = Credential::resolve(None, Some(&path)).unwrap_err();
        assert!(matches!(err, MirError::Configuration(_)));
    }

    #[test]
    fn neither_source_is_a_configuration_error() {
        let err = Credential::resolve(None, None).unwrap_err();
        assert!(matches!(err, MirError::Configuration(_)));
    }

    #[test]
    fn blank_token_is_rejected() {
        assert!(Credential::new("   ").is_err());
    }

    #[test]
    fn debug_output_redacts_token() {
        let cred = Credential::new("Basic super-secret").unwrap();
        let debug_str = format!("{cred:?}");
        assert!(!debug_str.contains("super-secret"));
        assert!(debug_str.contains("<redacted>"));
    }
}
