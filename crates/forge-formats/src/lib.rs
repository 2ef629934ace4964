//! Detection and metadata extraction for encrypted containers found on disk
//! images.
//!
//! Each parser extracts, from raw bytes, exactly the cryptographic parameters
//! needed to *verify a candidate password without decrypting the payload*:
//! salts, verifier values, key-derivation revisions, and so on. The result is
//! a [`FormatDescriptor`] that a password-search driver can consume long after
//! the original file handle is closed.
//!
//! Volume formats (BitLocker, LUKS) are metadata-only: their descriptors
//! identify the encryption scheme and key protectors but are not candidates
//! for password search.

pub mod bitlocker;
pub mod luks;
pub mod office;
pub mod pdf;
pub mod strings;
pub mod util;
pub mod zip;

use std::path::PathBuf;

use serde::Serialize;

/// Errors produced while detecting or parsing a container.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// A required structure is missing or inconsistent; the object is skipped.
    #[error("malformed {format}: {context}")]
    Malformed {
        format: &'static str,
        context: &'static str,
    },
    /// Not enough bytes to parse the requested structure.
    #[error("truncated data while reading {context}")]
    Truncated { context: &'static str },
    /// The container uses a feature outside the supported subset.
    #[error("unsupported {format} feature: {feature}")]
    Unsupported {
        format: &'static str,
        feature: String,
    },
    #[error("failed to read {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("pdf object model: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("luks2 json area: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Offcrypto(#[from] forge_offcrypto::OffcryptoError),
}

/// AES key strength used by WinZip AE-x encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesStrength {
    Aes128,
    Aes192,
    Aes256,
}

impl AesStrength {
    pub fn key_bits(self) -> u32 {
        match self {
            AesStrength::Aes128 => 128,
            AesStrength::Aes192 => 192,
            AesStrength::Aes256 => 256,
        }
    }

    /// Salt length per the WinZip AES spec: half the key size in bytes.
    pub fn salt_len(self) -> usize {
        (self.key_bits() / 16) as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            AesStrength::Aes128 => "AES-128",
            AesStrength::Aes192 => "AES-192",
            AesStrength::Aes256 => "AES-256",
        }
    }
}

/// One ZipCrypto-encrypted archive entry.
///
/// `verification_byte` is the high byte of the entry's CRC-32, or of its DOS
/// mod time when the entry was written streaming (general purpose bit 3) and
/// the CRC lives in a trailing data descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipCryptoDesc {
    pub archive_path: PathBuf,
    pub entry_path: String,
    pub local_header_offset: u64,
    pub general_purpose_flags: u16,
    pub verification_byte: u8,
}

/// One WinZip-AES-encrypted archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipAesDesc {
    pub archive_path: PathBuf,
    pub entry_path: String,
    pub local_header_offset: u64,
    pub strength: AesStrength,
    /// `strength.salt_len()` bytes read from the start of the entry data.
    pub salt: Vec<u8>,
    /// 2-byte password verification value stored after the salt.
    pub password_verifier: [u8; 2],
}

/// PDF standard security handler, revisions 2-4 (MD5 + RC4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfRc4Desc {
    pub revision: u8,
    pub key_length_bits: u16,
    pub owner_key: [u8; 32],
    pub user_key: [u8; 32],
    /// `/P`, least-significant byte first.
    pub permissions: [u8; 4],
    /// First element of the trailer `/ID` array.
    pub document_id: Vec<u8>,
    pub metadata_encrypted: bool,
}

/// PDF standard security handler, revision 6 (SHA-2 + AES).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfAesDesc {
    pub owner_key: [u8; 48],
    pub user_key: [u8; 48],
}

/// Encrypted OOXML document (OLE-wrapped `EncryptionInfo` present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeDesc {
    pub encryption_mode: String,
    pub cipher_algorithm: String,
    pub hash_algorithm: String,
    /// Full parsed stream, retained so verification needs no re-read.
    pub info: forge_offcrypto::EncryptionInfo,
}

/// One BitLocker key protector (a way to unseal the volume master key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyProtector {
    pub guid: String,
    pub protection_type: String,
}

/// BitLocker FVE volume metadata. Extraction only; password search over
/// BitLocker is out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitlockerInfo {
    /// `true` for BitLocker To Go (the GUID's final byte is `0x01`).
    pub to_go: bool,
    pub encryption_method: String,
    /// Volume creation time, seconds since the Unix epoch.
    pub creation_time_epoch: i64,
    pub description: String,
    pub key_protectors: Vec<KeyProtector>,
}

/// LUKS volume metadata. Extraction only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LuksInfo {
    pub version: u8,
    pub cipher: String,
    pub mode: String,
    pub hash: String,
    pub key_size_bits: u32,
    pub active_slots: Vec<u32>,
    pub guid: String,
}

/// One detected encrypted object, carrying everything its verifier needs.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatDescriptor {
    ZipCrypto(ZipCryptoDesc),
    ZipAes(ZipAesDesc),
    PdfRc4(PdfRc4Desc),
    PdfAes(PdfAesDesc),
    Office(OfficeDesc),
    Bitlocker(BitlockerInfo),
    Luks(LuksInfo),
}

impl FormatDescriptor {
    /// Short scheme name for notifications and artifact attributes.
    pub fn scheme_name(&self) -> &'static str {
        match self {
            FormatDescriptor::ZipCrypto(_) => "ZipCrypto",
            FormatDescriptor::ZipAes(d) => d.strength.name(),
            FormatDescriptor::PdfRc4(_) => "PDF (RC4)",
            FormatDescriptor::PdfAes(_) => "PDF (AES)",
            FormatDescriptor::Office(_) => "Office",
            FormatDescriptor::Bitlocker(_) => "BitLocker",
            FormatDescriptor::Luks(_) => "LUKS",
        }
    }

    /// Whether a password search can be run against this descriptor.
    pub fn crackable(&self) -> bool {
        !matches!(
            self,
            FormatDescriptor::Bitlocker(_) | FormatDescriptor::Luks(_)
        )
    }
}
