//! Credential material for the REST backend.
//!
//! A credential is either a path on disk or the material itself. In TOML:
//!
//! ```toml
//! cert = "/home/lnd/.lnd/tls.cert"
//! macaroon = { data = "0201036c6e64..." }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Where a certificate or macaroon comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialSource {
    /// Read from this file when the backend is built
    Path(PathBuf),
    /// Inline text: PEM for certificates, hex for macaroons
    Inline {
        /// The credential text
        data: String,
    },
    /// Raw bytes supplied programmatically
    #[serde(skip)]
    Bytes(Vec<u8>),
}

impl CredentialSource {
    /// Rejects obviously unusable sources without touching the filesystem.
    pub fn check(&self, option: &'static str) -> Result<(), ConfigError> {
        let empty = match self {
            CredentialSource::Path(path) => path.as_os_str().is_empty(),
            CredentialSource::Inline { data } => data.trim().is_empty(),
            CredentialSource::Bytes(bytes) => bytes.is_empty(),
        };
        if empty {
            return Err(ConfigError::InvalidOption { option, reason: "must not be empty".into() });
        }
        Ok(())
    }

    /// Loads the credential as UTF-8 text (certificates).
    pub fn load_text(&self, option: &'static str) -> Result<String, ConfigError> {
        match self {
            CredentialSource::Path(path) => std::fs::read_to_string(path)
                .map_err(|source| ConfigError::Credential { option, path: path.clone(), source }),
            CredentialSource::Inline { data } => Ok(data.clone()),
            CredentialSource::Bytes(bytes) => String::from_utf8(bytes.clone()).map_err(|e| {
                ConfigError::InvalidOption { option, reason: format!("not valid UTF-8: {}", e) }
            }),
        }
    }

    /// Loads the credential as lowercase hex (macaroons).
    ///
    /// Files and raw bytes are hex-encoded; inline text is taken as already
    /// encoded.
    pub fn load_hex(&self, option: &'static str) -> Result<String, ConfigError> {
        match self {
            CredentialSource::Path(path) => std::fs::read(path)
                .map(hex::encode)
                .map_err(|source| ConfigError::Credential { option, path: path.clone(), source }),
            CredentialSource::Inline { data } => Ok(data.trim().to_string()),
            CredentialSource::Bytes(bytes) => Ok(hex::encode(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_load_text() {
        let file = NamedTempFile::new().expect("temp file");
        fs::write(&file, "-----BEGIN CERTIFICATE-----\nMIIB\n").expect("write cert");

        let from_path = CredentialSource::Path(file.path().to_path_buf());
        assert_eq!(
            from_path.load_text("cert").expect("path"),
            "-----BEGIN CERTIFICATE-----\nMIIB\n"
        );

        let inline = CredentialSource::Inline { data: "PEM".to_string() };
        assert_eq!(inline.load_text("cert").expect("inline"), "PEM");

        let bytes = CredentialSource::Bytes(b"PEM".to_vec());
        assert_eq!(bytes.load_text("cert").expect("bytes"), "PEM");

        let invalid = CredentialSource::Bytes(vec![0xff, 0xfe]);
        assert!(matches!(
            invalid.load_text("cert"),
            Err(ConfigError::InvalidOption { option: "cert", .. })
        ));
    }

    #[test]
    fn test_load_hex() {
        let file = NamedTempFile::new().expect("temp file");
        fs::write(&file, [0x02u8, 0x01, 0xab]).expect("write macaroon");

        let from_path = CredentialSource::Path(file.path().to_path_buf());
        assert_eq!(from_path.load_hex("macaroon").expect("path"), "0201ab");

        let bytes = CredentialSource::Bytes(vec![0xde, 0xad]);
        assert_eq!(bytes.load_hex("macaroon").expect("bytes"), "dead");

        let inline = CredentialSource::Inline { data: " 0201ab\n".to_string() };
        assert_eq!(inline.load_hex("macaroon").expect("inline"), "0201ab");
    }

    #[test]
    fn test_missing_file() {
        let missing = CredentialSource::Path(PathBuf::from("/nonexistent/admin.macaroon"));
        match missing.load_hex("macaroon").expect_err("file does not exist") {
            ConfigError::Credential { option, path, .. } => {
                assert_eq!(option, "macaroon");
                assert_eq!(path, PathBuf::from("/nonexistent/admin.macaroon"));
            }
            other => panic!("Expected Credential error, got {:?}", other),
        }
    }

    #[test]
    fn test_check() {
        assert!(CredentialSource::Inline { data: "x".into() }.check("cert").is_ok());
        assert!(CredentialSource::Inline { data: " ".into() }.check("cert").is_err());
        assert!(CredentialSource::Path(PathBuf::new()).check("cert").is_err());
        assert!(CredentialSource::Bytes(Vec::new()).check("macaroon").is_err());
    }

    #[test]
    fn test_deserialize_untagged() {
        #[derive(Deserialize)]
        struct Holder {
            cert: CredentialSource,
            macaroon: CredentialSource,
        }
        let holder: Holder = toml::from_str(
            r#"
            cert = "/home/lnd/tls.cert"
            macaroon = { data = "0201" }
            "#,
        )
        .expect("parse");
        assert_eq!(holder.cert, CredentialSource::Path(PathBuf::from("/home/lnd/tls.cert")));
        assert_eq!(holder.macaroon, CredentialSource::Inline { data: "0201".to_string() });
    }
}
