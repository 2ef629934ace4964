//! Encrypted OOXML password verification.
//!
//! The cryptography is not reimplemented here: the verifier delegates to
//! `forge-offcrypto`, whose `verify_password` is the smallest surface that
//! answers the boolean question. Only the translation between "wrong
//! password" and real errors lives in this module.

use std::path::{Path, PathBuf};

use forge_formats::OfficeDesc;
use forge_offcrypto::{EncryptionInfo, OffcryptoError};

use crate::VerifyError;

#[derive(Debug)]
pub struct OfficeVerifier {
    info: EncryptionInfo,
}

impl OfficeVerifier {
    /// Fails up front for schemes the library cannot verify (e.g.
    /// Extensible encryption), so no worker starts on a dead descriptor.
    pub fn new(desc: &OfficeDesc) -> Result<Self, VerifyError> {
        if let EncryptionInfo::Unsupported { version } = &desc.info {
            return Err(VerifyError::Unsupported(format!(
                "Office EncryptionInfo version {}.{}",
                version.major, version.minor
            )));
        }
        Ok(OfficeVerifier {
            info: desc.info.clone(),
        })
    }

    pub fn verify(&self, password: &str) -> Result<bool, VerifyError> {
        match forge_offcrypto::verify_password(&self.info, password) {
            Ok(()) => Ok(true),
            Err(OffcryptoError::InvalidPassword) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Decrypt the `EncryptedPackage` stream and export the inner OOXML
    /// package next to the other recovered artifacts.
    pub fn decrypt(
        &self,
        password: &str,
        source: &Path,
        out_dir: &Path,
    ) -> Result<PathBuf, VerifyError> {
        let bytes = std::fs::read(source).map_err(|source| VerifyError::Io {
            context: "office container",
            source,
        })?;
        let package = forge_formats::office::read_encrypted_package(&bytes)
            .map_err(|err| VerifyError::Crypto(format!("EncryptedPackage stream: {err}")))?;
        let plaintext = forge_offcrypto::decrypt_package(&self.info, &package, password)?;

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "decrypted.docx".to_string());
        let out_path = out_dir.join(file_name);
        std::fs::create_dir_all(out_dir).map_err(|source| VerifyError::Io {
            context: "export directory",
            source,
        })?;
        std::fs::write(&out_path, plaintext).map_err(|source| VerifyError::Io {
            context: "exported file",
            source,
        })?;
        Ok(out_path)
    }
}
