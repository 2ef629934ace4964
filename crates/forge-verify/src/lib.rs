//! Format-specific password verifiers.
//!
//! Each verifier answers one question: does this candidate password reproduce
//! the stored verification data of its container? Verification performs the
//! minimum cryptographic work each format allows; no payload is decrypted on
//! the hot path. The ZIP verifiers additionally run a library-assisted
//! extraction once their cheap check passes, because ZipCrypto checks a
//! single byte and WinZip AES only two: collisions are expected and the full
//! extraction is the final arbiter.
//!
//! Dispatch is a tagged enum rather than a trait object: the set of formats
//! is closed, and workers share one immutable [`Verifier`] across threads.

mod rc4;
mod zip_extract;

pub mod office;
pub mod pdf_aes;
pub mod pdf_rc4;
pub mod zipaes;
pub mod zipcrypto;

use std::path::{Path, PathBuf};

use forge_formats::FormatDescriptor;

pub use office::OfficeVerifier;
pub use pdf_aes::PdfAesVerifier;
pub use pdf_rc4::PdfRc4Verifier;
pub use zipaes::ZipAesVerifier;
pub use zipcrypto::ZipCryptoVerifier;

/// Errors surfaced by verifier construction, verification, or the
/// decrypt-and-export hook.
///
/// A wrong password is never an error; `verify` returns `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("crypto failure: {0}")]
    Crypto(String),
    #[error("failed to read {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("descriptor cannot be verified: {0}")]
    Unsupported(String),
    #[error("pdf object model: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("zip container: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Offcrypto(#[from] forge_offcrypto::OffcryptoError),
}

/// One verifier per crackable format, dispatched by variant.
#[derive(Debug)]
pub enum Verifier {
    ZipCrypto(ZipCryptoVerifier),
    ZipAes(ZipAesVerifier),
    PdfRc4(PdfRc4Verifier),
    PdfAes(PdfAesVerifier),
    Office(OfficeVerifier),
}

impl Verifier {
    /// Build the verifier matching a descriptor.
    ///
    /// ZIP verifiers read their 12-byte encryption header (or nothing beyond
    /// the descriptor) here, so no file handles are held once construction
    /// returns. `scratch_dir` hosts the ZIP library-check extractions.
    pub fn for_descriptor(
        descriptor: &FormatDescriptor,
        scratch_dir: &Path,
    ) -> Result<Self, VerifyError> {
        match descriptor {
            FormatDescriptor::ZipCrypto(desc) => {
                Ok(Verifier::ZipCrypto(ZipCryptoVerifier::new(desc, scratch_dir)?))
            }
            FormatDescriptor::ZipAes(desc) => {
                Ok(Verifier::ZipAes(ZipAesVerifier::new(desc, scratch_dir)))
            }
            FormatDescriptor::PdfRc4(desc) => Ok(Verifier::PdfRc4(PdfRc4Verifier::new(desc))),
            FormatDescriptor::PdfAes(desc) => Ok(Verifier::PdfAes(PdfAesVerifier::new(desc))),
            FormatDescriptor::Office(desc) => Ok(Verifier::Office(OfficeVerifier::new(desc)?)),
            FormatDescriptor::Bitlocker(_) => Err(VerifyError::Unsupported(
                "BitLocker volumes are metadata-only".to_string(),
            )),
            FormatDescriptor::Luks(_) => Err(VerifyError::Unsupported(
                "LUKS volumes are metadata-only".to_string(),
            )),
        }
    }

    /// Check one candidate. Has no side effects on the verifier; calling it
    /// twice with the same candidate does the same work twice.
    pub fn verify(&self, password: &str) -> Result<bool, VerifyError> {
        match self {
            Verifier::ZipCrypto(v) => v.verify(password),
            Verifier::ZipAes(v) => v.verify(password),
            Verifier::PdfRc4(v) => Ok(v.verify(password)),
            Verifier::PdfAes(v) => v.verify(password),
            Verifier::Office(v) => v.verify(password),
        }
    }

    /// Best-effort decrypt-and-export once a password is known. Returns the
    /// path of the exported plaintext.
    ///
    /// `source` is the container file (ignored by the ZIP verifiers, which
    /// carry their archive path in the descriptor).
    pub fn decrypt(
        &self,
        password: &str,
        source: &Path,
        out_dir: &Path,
    ) -> Result<PathBuf, VerifyError> {
        match self {
            Verifier::ZipCrypto(v) => v.decrypt(password, out_dir),
            Verifier::ZipAes(v) => v.decrypt(password, out_dir),
            Verifier::PdfRc4(v) => v.decrypt(password, source, out_dir),
            Verifier::PdfAes(v) => v.decrypt(password, source, out_dir),
            Verifier::Office(v) => v.decrypt(password, source, out_dir),
        }
    }

    /// Display label for notifications and progress bars.
    pub fn label(&self) -> &'static str {
        match self {
            Verifier::ZipCrypto(_) | Verifier::ZipAes(_) => "ZIP cracker",
            Verifier::PdfRc4(_) | Verifier::PdfAes(_) => "PDF cracker",
            Verifier::Office(_) => "Office cracker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_formats::{BitlockerInfo, FormatDescriptor};

    #[test]
    fn volume_descriptors_have_no_verifier() {
        let desc = FormatDescriptor::Bitlocker(BitlockerInfo {
            to_go: false,
            encryption_method: "AES-XTS 128-bit encryption".to_string(),
            creation_time_epoch: 0,
            description: String::new(),
            key_protectors: Vec::new(),
        });
        let err = Verifier::for_descriptor(&desc, Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, VerifyError::Unsupported(_)));
    }
}
