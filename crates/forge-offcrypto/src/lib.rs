//! MS-OFFCRYPTO parsing and password verification.
//!
//! This crate supports the subset of [MS-OFFCRYPTO] needed to decide whether a
//! candidate password opens an encrypted OOXML package, without decrypting the
//! payload:
//! - Parsing the *Standard* (CryptoAPI) `EncryptionInfo` stream header
//!   (`versionMinor == 2`; `versionMajor ∈ {2,3,4}` is observed in the wild)
//! - Parsing the *Agile* `EncryptionInfo` stream (version 4.4, password
//!   key-encryptor subset)
//! - ECMA-376 Standard password→key derivation + verifier checks
//! - Agile iterated-hash derivation + verifier checks
//! - Decrypting the `EncryptedPackage` stream once a password is known
//!
//! Verifier digests are compared in constant time to reduce timing side
//! channels.

mod util;

pub mod agile;

use core::fmt;

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use cbc::Decryptor;
use cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use sha1::{Digest as _, Sha1};
use zeroize::Zeroizing;

const ITER_COUNT: u32 = 50_000;
const SHA1_LEN: usize = 20;
const MAX_DIGEST_LEN: usize = 64; // SHA-512
const AES_BLOCK_SIZE: usize = 16;

/// Upper bound accepted for the Agile `spinCount` attribute.
///
/// Excel commonly writes `100_000`. The cap keeps pathological
/// attacker-controlled values (e.g. `u32::MAX`) from hanging a password
/// search, where the iterated hash runs once per candidate.
pub const MAX_SPIN_COUNT: u32 = 10_000_000;

// CryptoAPI algorithm identifiers used by Standard encryption.
const CALG_AES_128: u32 = 0x0000_660E;
const CALG_AES_192: u32 = 0x0000_660F;
const CALG_AES_256: u32 = 0x0000_6610;
const CALG_SHA1: u32 = 0x0000_8004;

/// Parsed `EncryptionVersionInfo` (MS-OFFCRYPTO).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionVersionInfo {
    pub major: u16,
    pub minor: u16,
    pub flags: u32,
}

/// Parsed Standard (CryptoAPI) `EncryptionHeader`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardEncryptionHeader {
    pub flags: u32,
    pub alg_id: u32,
    pub alg_id_hash: u32,
    pub key_size_bits: u32,
    pub provider_type: u32,
    pub csp_name: String,
}

/// Parsed Standard (CryptoAPI) `EncryptionVerifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardEncryptionVerifier {
    pub salt: Vec<u8>,
    pub encrypted_verifier: [u8; 16],
    pub verifier_hash_size: u32,
    pub encrypted_verifier_hash: Vec<u8>,
}

/// Parsed contents of an Agile (XML) `EncryptionInfo` stream, restricted to
/// the password key encryptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgileEncryptionInfo {
    pub key_data_salt: Vec<u8>,
    pub key_data_hash_algorithm: HashAlgorithm,
    pub key_data_block_size: usize,
    pub key_data_key_bits: usize,

    // Password key encryptor fields (`p:encryptedKey`).
    pub spin_count: u32,
    pub password_salt: Vec<u8>,
    pub password_hash_algorithm: HashAlgorithm,
    pub password_key_bits: usize,
    pub encrypted_key_value: Vec<u8>,
    pub encrypted_verifier_hash_input: Vec<u8>,
    pub encrypted_verifier_hash_value: Vec<u8>,
}

/// Parsed `EncryptionInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionInfo {
    /// Standard (CryptoAPI) encryption (`versionMinor == 2`).
    Standard {
        version: EncryptionVersionInfo,
        header: StandardEncryptionHeader,
        verifier: StandardEncryptionVerifier,
    },
    /// Agile (XML) encryption (version 4.4).
    Agile {
        version: EncryptionVersionInfo,
        info: AgileEncryptionInfo,
    },
    /// A version we do not support (e.g. Extensible encryption).
    Unsupported { version: EncryptionVersionInfo },
}

impl EncryptionInfo {
    /// Schema name as surfaced to artifact consumers.
    pub fn mode_name(&self) -> &'static str {
        match self {
            EncryptionInfo::Standard { .. } => "Standard",
            EncryptionInfo::Agile { .. } => "Agile",
            EncryptionInfo::Unsupported { version } if version.minor == 3 => "Extensible",
            EncryptionInfo::Unsupported { .. } => "Unknown",
        }
    }

    /// Cipher algorithm name (AES key size included) as surfaced to artifact
    /// consumers.
    pub fn cipher_name(&self) -> String {
        match self {
            EncryptionInfo::Standard { header, .. } => match header.alg_id {
                CALG_AES_128 => "AES-128".to_string(),
                CALG_AES_192 => "AES-192".to_string(),
                CALG_AES_256 => "AES-256".to_string(),
                other => format!("Unknown (0x{other:08x})"),
            },
            EncryptionInfo::Agile { info, .. } => format!("AES-{}", info.key_data_key_bits),
            EncryptionInfo::Unsupported { .. } => "Unknown".to_string(),
        }
    }

    /// Hash algorithm name as surfaced to artifact consumers.
    pub fn hash_name(&self) -> &'static str {
        match self {
            EncryptionInfo::Standard { .. } => "SHA-1",
            EncryptionInfo::Agile { info, .. } => info.password_hash_algorithm.name(),
            EncryptionInfo::Unsupported { .. } => "Unknown",
        }
    }
}

/// Hash algorithms allowed by the Agile password key encryptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    fn parse_offcrypto_name(name: &str) -> Result<Self, OffcryptoError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SHA1" | "SHA-1" => Ok(HashAlgorithm::Sha1),
            "SHA256" | "SHA-256" => Ok(HashAlgorithm::Sha256),
            "SHA384" | "SHA-384" => Ok(HashAlgorithm::Sha384),
            "SHA512" | "SHA-512" => Ok(HashAlgorithm::Sha512),
            _ => Err(OffcryptoError::InvalidEncryptionInfo {
                context: "unsupported hashAlgorithm",
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }

    pub(crate) fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub(crate) fn digest_into(self, data: &[u8], out: &mut [u8]) {
        debug_assert!(out.len() >= self.digest_len());
        match self {
            HashAlgorithm::Sha1 => {
                out[..20].copy_from_slice(&Sha1::digest(data));
            }
            HashAlgorithm::Sha256 => {
                out[..32].copy_from_slice(&sha2::Sha256::digest(data));
            }
            HashAlgorithm::Sha384 => {
                out[..48].copy_from_slice(&sha2::Sha384::digest(data));
            }
            HashAlgorithm::Sha512 => {
                out[..64].copy_from_slice(&sha2::Sha512::digest(data));
            }
        }
    }

    pub(crate) fn digest_two_into(self, a: &[u8], b: &[u8], out: &mut [u8]) {
        debug_assert!(out.len() >= self.digest_len());
        match self {
            HashAlgorithm::Sha1 => {
                let mut hasher = Sha1::new();
                hasher.update(a);
                hasher.update(b);
                out[..20].copy_from_slice(&hasher.finalize());
            }
            HashAlgorithm::Sha256 => {
                let mut hasher = sha2::Sha256::new();
                hasher.update(a);
                hasher.update(b);
                out[..32].copy_from_slice(&hasher.finalize());
            }
            HashAlgorithm::Sha384 => {
                let mut hasher = sha2::Sha384::new();
                hasher.update(a);
                hasher.update(b);
                out[..48].copy_from_slice(&hasher.finalize());
            }
            HashAlgorithm::Sha512 => {
                let mut hasher = sha2::Sha512::new();
                hasher.update(a);
                hasher.update(b);
                out[..64].copy_from_slice(&hasher.finalize());
            }
        }
    }
}

/// Errors returned by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffcryptoError {
    /// Not enough bytes to parse the requested structure.
    Truncated { context: &'static str },
    /// Input bytes were structurally invalid.
    InvalidFormat { context: &'static str },
    /// The stream contents are structurally invalid (e.g. missing required
    /// attributes).
    InvalidEncryptionInfo { context: &'static str },
    /// The declared algorithm parameters are outside the supported subset.
    UnsupportedAlgorithm(String),
    /// The `EncryptionInfo` version is not supported by the current parser.
    UnsupportedVersion { major: u16, minor: u16 },
    /// Ciphertext length must be a multiple of 16 bytes for AES.
    InvalidCiphertextLength { len: usize },
    /// Invalid AES key length (expected 16, 24, or 32 bytes).
    InvalidKeyLength { len: usize },
    /// `EncryptedPackage` declared plaintext size exceeds the ciphertext.
    PackageSizeMismatch { total_size: u64, ciphertext_len: usize },
    /// Password did not pass the verifier check.
    InvalidPassword,
}

impl fmt::Display for OffcryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffcryptoError::Truncated { context } => {
                write!(f, "truncated data while reading {context}")
            }
            OffcryptoError::InvalidFormat { context } => write!(f, "invalid format: {context}"),
            OffcryptoError::InvalidEncryptionInfo { context } => {
                write!(f, "invalid EncryptionInfo: {context}")
            }
            OffcryptoError::UnsupportedAlgorithm(msg) => write!(f, "unsupported algorithm: {msg}"),
            OffcryptoError::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported EncryptionInfo version {major}.{minor}")
            }
            OffcryptoError::InvalidCiphertextLength { len } => write!(
                f,
                "ciphertext length must be a multiple of 16 bytes for AES, got {len}"
            ),
            OffcryptoError::InvalidKeyLength { len } => write!(
                f,
                "invalid AES key length {len}; expected 16, 24, or 32 bytes"
            ),
            OffcryptoError::PackageSizeMismatch {
                total_size,
                ciphertext_len,
            } => write!(
                f,
                "EncryptedPackage declared original size {total_size} exceeds ciphertext length {ciphertext_len}"
            ),
            OffcryptoError::InvalidPassword => write!(f, "invalid password"),
        }
    }
}

impl std::error::Error for OffcryptoError {}

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    pub(crate) fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], OffcryptoError> {
        let end = self.pos.saturating_add(n);
        if end > self.bytes.len() {
            return Err(OffcryptoError::Truncated { context });
        }
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn read_u16_le(&mut self, context: &'static str) -> Result<u16, OffcryptoError> {
        let b = self.take(2, context)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32_le(&mut self, context: &'static str) -> Result<u32, OffcryptoError> {
        let b = self.take(4, context)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_u64_le(&mut self, context: &'static str) -> Result<u64, OffcryptoError> {
        let b = self.take(8, context)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

fn decode_csp_name_utf16le(bytes: &[u8]) -> String {
    let mut code_units: Vec<u16> = Vec::with_capacity(bytes.len() / 2);
    for chunk in bytes.chunks_exact(2) {
        code_units.push(u16::from_le_bytes([chunk[0], chunk[1]]));
    }
    let end = code_units
        .iter()
        .position(|u| *u == 0)
        .unwrap_or(code_units.len());
    String::from_utf16_lossy(&code_units[..end])
}

/// Parse an MS-OFFCRYPTO `EncryptionInfo` stream.
pub fn parse_encryption_info(bytes: &[u8]) -> Result<EncryptionInfo, OffcryptoError> {
    let mut r = Reader::new(bytes);
    let major = r.read_u16_le("EncryptionVersionInfo.major")?;
    let minor = r.read_u16_le("EncryptionVersionInfo.minor")?;
    let flags = r.read_u32_le("EncryptionVersionInfo.flags")?;
    let version = EncryptionVersionInfo { major, minor, flags };

    if (major, minor) == (4, 4) {
        // Agile payload is an XML document beginning at byte offset 8.
        let info = agile::parse_agile_xml(r.remaining())?;
        return Ok(EncryptionInfo::Agile { version, info });
    }

    // MS-OFFCRYPTO identifies Standard encryption via `versionMinor == 2`;
    // real-world files vary `versionMajor` across 2/3/4. Everything else
    // (including Extensible encryption, versionMinor == 3) is reported as
    // Unsupported so callers can still surface the metadata.
    let is_standard = minor == 2 && matches!(major, 2 | 3 | 4);
    if !is_standard {
        return Ok(EncryptionInfo::Unsupported { version });
    }

    let header_size = r.read_u32_le("EncryptionInfo.header_size")? as usize;
    // Fixed 8-DWORD prefix; anything over 1 MiB is far larger than any real
    // CSP name.
    if !(32..=1024 * 1024).contains(&header_size) {
        return Err(OffcryptoError::InvalidEncryptionInfo {
            context: "EncryptionInfo.header_size is out of bounds",
        });
    }

    let header_bytes = r.take(header_size, "EncryptionHeader")?;
    let mut hr = Reader::new(header_bytes);
    let flags = hr.read_u32_le("EncryptionHeader.flags")?;
    let _size_extra = hr.read_u32_le("EncryptionHeader.sizeExtra")?;
    let alg_id = hr.read_u32_le("EncryptionHeader.algId")?;
    let alg_id_hash = hr.read_u32_le("EncryptionHeader.algIdHash")?;
    let key_size_bits = hr.read_u32_le("EncryptionHeader.keySize")?;
    let provider_type = hr.read_u32_le("EncryptionHeader.providerType")?;
    let _reserved1 = hr.read_u32_le("EncryptionHeader.reserved1")?;
    let _reserved2 = hr.read_u32_le("EncryptionHeader.reserved2")?;
    let header = StandardEncryptionHeader {
        flags,
        alg_id,
        alg_id_hash,
        key_size_bits,
        provider_type,
        csp_name: decode_csp_name_utf16le(hr.remaining()),
    };

    // Standard encryption produced by Office uses AES + SHA1. Restrict the
    // parser to this subset so the crypto code can rely on the parameters.
    let expected_key_size = match header.alg_id {
        CALG_AES_128 => 128,
        CALG_AES_192 => 192,
        CALG_AES_256 => 256,
        other => {
            return Err(OffcryptoError::UnsupportedAlgorithm(format!(
                "algId=0x{other:08x}"
            )))
        }
    };
    if header.key_size_bits != expected_key_size {
        return Err(OffcryptoError::UnsupportedAlgorithm(format!(
            "keySize={} mismatch for algId=0x{:08x}",
            header.key_size_bits, header.alg_id
        )));
    }
    if header.alg_id_hash != CALG_SHA1 {
        return Err(OffcryptoError::UnsupportedAlgorithm(format!(
            "algIdHash=0x{:08x}",
            header.alg_id_hash
        )));
    }

    let salt_size = r.read_u32_le("EncryptionVerifier.saltSize")? as usize;
    if salt_size != 16 {
        return Err(OffcryptoError::InvalidEncryptionInfo {
            context: "EncryptionVerifier.saltSize must be 16 for Standard encryption",
        });
    }
    let salt = r.take(16, "EncryptionVerifier.salt")?.to_vec();

    let mut encrypted_verifier = [0u8; 16];
    encrypted_verifier.copy_from_slice(r.take(16, "EncryptionVerifier.encryptedVerifier")?);

    let verifier_hash_size = r.read_u32_le("EncryptionVerifier.verifierHashSize")?;
    if verifier_hash_size != 20 {
        return Err(OffcryptoError::InvalidEncryptionInfo {
            context: "EncryptionVerifier.verifierHashSize must be 20 (SHA1)",
        });
    }
    // SHA1 hashes are 20 bytes, padded to an AES block boundary => 32 bytes.
    let encrypted_verifier_hash = r
        .take(32, "EncryptionVerifier.encryptedVerifierHash")?
        .to_vec();

    Ok(EncryptionInfo::Standard {
        version,
        header,
        verifier: StandardEncryptionVerifier {
            salt,
            encrypted_verifier,
            verifier_hash_size,
            encrypted_verifier_hash,
        },
    })
}

/// Check a candidate password against a parsed `EncryptionInfo`.
///
/// Returns `Ok(())` when the password reproduces the stored verifier,
/// [`OffcryptoError::InvalidPassword`] when it does not, and any other error
/// for structural or unsupported-scheme failures.
pub fn verify_password(info: &EncryptionInfo, password: &str) -> Result<(), OffcryptoError> {
    match info {
        EncryptionInfo::Standard {
            header, verifier, ..
        } => {
            // Derived keys are sensitive; keep them in `Zeroizing` buffers so
            // failed attempts don't leave key material in heap allocations.
            let key = Zeroizing::new(standard_key_from_password(
                password,
                &verifier.salt,
                header.key_size_bits,
            )?);
            standard_verify_key(key.as_slice(), verifier)
        }
        EncryptionInfo::Agile { info, .. } => agile::verify_password(info, password),
        EncryptionInfo::Unsupported { version } => Err(OffcryptoError::UnsupportedVersion {
            major: version.major,
            minor: version.minor,
        }),
    }
}

/// Decrypt an `EncryptedPackage` stream using a known-good password.
///
/// The stream format is a `u64` little-endian plaintext size followed by the
/// ciphertext (AES-ECB for Standard, 4096-byte AES-CBC segments for Agile).
pub fn decrypt_package(
    info: &EncryptionInfo,
    encrypted_package: &[u8],
    password: &str,
) -> Result<Vec<u8>, OffcryptoError> {
    let mut r = Reader::new(encrypted_package);
    let total_size = r.read_u64_le("EncryptedPackage.original_size")?;
    let ciphertext = r.remaining();
    let total = usize::try_from(total_size).map_err(|_| OffcryptoError::PackageSizeMismatch {
        total_size,
        ciphertext_len: ciphertext.len(),
    })?;
    if total > ciphertext.len() {
        return Err(OffcryptoError::PackageSizeMismatch {
            total_size,
            ciphertext_len: ciphertext.len(),
        });
    }

    match info {
        EncryptionInfo::Standard {
            header, verifier, ..
        } => {
            let key = Zeroizing::new(standard_key_from_password(
                password,
                &verifier.salt,
                header.key_size_bits,
            )?);
            standard_verify_key(key.as_slice(), verifier)?;
            let mut plaintext = ciphertext.to_vec();
            aes_ecb_decrypt_in_place(key.as_slice(), &mut plaintext)?;
            plaintext.truncate(total);
            Ok(plaintext)
        }
        EncryptionInfo::Agile { info, .. } => agile::decrypt_package(info, ciphertext, total, password),
        EncryptionInfo::Unsupported { version } => Err(OffcryptoError::UnsupportedVersion {
            major: version.major,
            minor: version.minor,
        }),
    }
}

pub(crate) fn password_to_utf16le_bytes(password: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(password.len().saturating_mul(2));
    for unit in password.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

fn sha1(data: &[u8]) -> [u8; SHA1_LEN] {
    Sha1::digest(data).into()
}

/// ECMA-376 Standard key derivation (SHA1 + AES).
///
/// - `salt` comes from `EncryptionVerifier.salt`
/// - `key_size_bits` comes from `EncryptionHeader.keySize`, must be 128/192/256
pub fn standard_key_from_password(
    password: &str,
    salt: &[u8],
    key_size_bits: u32,
) -> Result<Vec<u8>, OffcryptoError> {
    let key_len = match key_size_bits {
        128 | 192 | 256 => (key_size_bits / 8) as usize,
        other => {
            return Err(OffcryptoError::UnsupportedAlgorithm(format!(
                "keySize={other} bits"
            )))
        }
    };

    let password_utf16 = Zeroizing::new(password_to_utf16le_bytes(password));

    // h = sha1(salt || password_utf16le)
    let mut hasher = Sha1::new();
    hasher.update(salt);
    hasher.update(password_utf16.as_slice());
    let mut h: [u8; SHA1_LEN] = hasher.finalize().into();

    // for i in 0..ITER_COUNT: h = sha1(u32le(i) || h)
    let mut buf = [0u8; 4 + SHA1_LEN];
    for i in 0..ITER_COUNT {
        buf[..4].copy_from_slice(&i.to_le_bytes());
        buf[4..].copy_from_slice(&h);
        h = sha1(&buf);
    }

    // h_final = sha1(h || u32le(0))
    let mut buf0 = [0u8; SHA1_LEN + 4];
    buf0[..SHA1_LEN].copy_from_slice(&h);
    buf0[SHA1_LEN..].copy_from_slice(&0u32.to_le_bytes());
    let h_final = sha1(&buf0);

    // key = (sha1((0x36*64) ^ h_final) || sha1((0x5c*64) ^ h_final))[..key_len]
    let mut buf1 = [0x36u8; 64];
    let mut buf2 = [0x5cu8; 64];
    for i in 0..SHA1_LEN {
        buf1[i] ^= h_final[i];
        buf2[i] ^= h_final[i];
    }
    let x1 = sha1(&buf1);
    let x2 = sha1(&buf2);

    let mut out = [0u8; SHA1_LEN * 2];
    out[..SHA1_LEN].copy_from_slice(&x1);
    out[SHA1_LEN..].copy_from_slice(&x2);
    Ok(out[..key_len].to_vec())
}

/// Verify a Standard encryption key against the encrypted verifier fields.
pub fn standard_verify_key(
    key: &[u8],
    verifier: &StandardEncryptionVerifier,
) -> Result<(), OffcryptoError> {
    if verifier.encrypted_verifier_hash.len() % AES_BLOCK_SIZE != 0 {
        return Err(OffcryptoError::InvalidCiphertextLength {
            len: verifier.encrypted_verifier_hash.len(),
        });
    }

    let mut plain_verifier = verifier.encrypted_verifier;
    aes_ecb_decrypt_in_place(key, &mut plain_verifier)?;
    let expected_hash = sha1(&plain_verifier);

    let mut verifier_hash = verifier.encrypted_verifier_hash.clone();
    aes_ecb_decrypt_in_place(key, &mut verifier_hash)?;
    if verifier_hash.len() < SHA1_LEN {
        return Err(OffcryptoError::Truncated {
            context: "decrypted verifier hash",
        });
    }

    if util::ct_eq(&expected_hash, &verifier_hash[..SHA1_LEN]) {
        Ok(())
    } else {
        Err(OffcryptoError::InvalidPassword)
    }
}

pub(crate) fn aes_ecb_decrypt_in_place(key: &[u8], buf: &mut [u8]) -> Result<(), OffcryptoError> {
    if buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(OffcryptoError::InvalidCiphertextLength { len: buf.len() });
    }

    fn decrypt_with<C>(key: &[u8], buf: &mut [u8]) -> Result<(), OffcryptoError>
    where
        C: BlockDecrypt + KeyInit,
    {
        let cipher = C::new_from_slice(key)
            .map_err(|_| OffcryptoError::InvalidKeyLength { len: key.len() })?;
        for block in buf.chunks_mut(AES_BLOCK_SIZE) {
            cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }

    match key.len() {
        16 => decrypt_with::<Aes128>(key, buf),
        24 => decrypt_with::<Aes192>(key, buf),
        32 => decrypt_with::<Aes256>(key, buf),
        _ => Err(OffcryptoError::InvalidKeyLength { len: key.len() }),
    }
}

pub(crate) fn aes_cbc_decrypt_in_place(
    key: &[u8],
    iv: &[u8],
    buf: &mut [u8],
) -> Result<(), OffcryptoError> {
    if buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(OffcryptoError::InvalidCiphertextLength { len: buf.len() });
    }
    if iv.len() != AES_BLOCK_SIZE {
        return Err(OffcryptoError::InvalidFormat {
            context: "AES-CBC IV must be 16 bytes",
        });
    }

    fn decrypt_with<C>(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<(), OffcryptoError>
    where
        C: aes::cipher::BlockCipher + aes::cipher::BlockDecryptMut + aes::cipher::KeyInit,
        Decryptor<C>: KeyIvInit + BlockDecryptMut,
    {
        let dec = <Decryptor<C>>::new_from_slices(key, iv)
            .map_err(|_| OffcryptoError::InvalidKeyLength { len: key.len() })?;
        let len = buf.len();
        dec.decrypt_padded_mut::<NoPadding>(buf)
            .map_err(|_| OffcryptoError::InvalidCiphertextLength { len })?;
        Ok(())
    }

    match key.len() {
        16 => decrypt_with::<Aes128>(key, iv, buf),
        24 => decrypt_with::<Aes192>(key, iv, buf),
        32 => decrypt_with::<Aes256>(key, iv, buf),
        _ => Err(OffcryptoError::InvalidKeyLength { len: key.len() }),
    }
}
