//! Agile encryption password helpers.
//!
//! In the Agile scheme (OOXML), password verification decrypts the
//! `encryptedVerifierHashInput` and `encryptedVerifierHashValue` fields with
//! keys derived from the candidate password, then checks
//! `Hash(verifierHashInput) == verifierHashValue`.
//!
//! The derived password hash uses `spinCount` iterations (commonly 100,000);
//! it is computed once per candidate and reused for every block key.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader as XmlReader;
use zeroize::Zeroizing;

use crate::util::ct_eq;
use crate::{
    aes_cbc_decrypt_in_place, password_to_utf16le_bytes, AgileEncryptionInfo, HashAlgorithm,
    OffcryptoError, AES_BLOCK_SIZE, MAX_DIGEST_LEN, MAX_SPIN_COUNT,
};

/// MS-OFFCRYPTO Agile: block key for deriving the "verifierHashInput" key.
const VERIFIER_HASH_INPUT_BLOCK: [u8; 8] = [0xFE, 0xA7, 0xD2, 0x76, 0x3B, 0x4B, 0x9E, 0x79];
/// MS-OFFCRYPTO Agile: block key for deriving the "verifierHashValue" key.
const VERIFIER_HASH_VALUE_BLOCK: [u8; 8] = [0xD7, 0xAA, 0x0F, 0x6D, 0x30, 0x61, 0x34, 0x4E];
/// MS-OFFCRYPTO Agile: block key for deriving the "keyValue" key.
const KEY_VALUE_BLOCK: [u8; 8] = [0x14, 0x6E, 0x0B, 0xE7, 0xAB, 0xAC, 0xD0, 0xD6];

const AGILE_SALT_LEN: usize = 16;
const AGILE_MAX_ENCRYPTED_LEN: usize = 64;
const SEGMENT_LEN: usize = 4096;

/// Parse the XML payload of an Agile `EncryptionInfo` stream (the bytes after
/// the 8-byte version header).
///
/// Only `<keyData>` and the password key encryptor's `<encryptedKey>` element
/// are consumed; certificate key encryptors and `<dataIntegrity>` are skipped.
/// The password `<encryptedKey>` is recognized by its `spinCount` attribute,
/// which certificate encryptors do not carry.
pub(crate) fn parse_agile_xml(xml_bytes: &[u8]) -> Result<AgileEncryptionInfo, OffcryptoError> {
    let end = xml_bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let trimmed = xml_bytes[..end].strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&xml_bytes[..end]);
    let xml = std::str::from_utf8(trimmed).map_err(|_| OffcryptoError::InvalidEncryptionInfo {
        context: "agile EncryptionInfo XML is not valid UTF-8",
    })?;

    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut key_data: Option<(Vec<u8>, HashAlgorithm, usize, usize)> = None;
    let mut password_key: Option<(u32, Vec<u8>, HashAlgorithm, usize, Vec<u8>, Vec<u8>, Vec<u8>)> =
        None;

    loop {
        let event = reader
            .read_event()
            .map_err(|_| OffcryptoError::InvalidEncryptionInfo {
                context: "agile EncryptionInfo XML parse error",
            })?;
        match event {
            XmlEvent::Start(ref e) | XmlEvent::Empty(ref e) => match e.local_name().as_ref() {
                b"keyData" => key_data = Some(parse_key_data_attrs(e)?),
                b"encryptedKey" => {
                    if let Some(parsed) = parse_encrypted_key_attrs(e)? {
                        password_key = Some(parsed);
                    }
                }
                _ => {}
            },
            XmlEvent::Eof => break,
            _ => {}
        }
        if key_data.is_some() && password_key.is_some() {
            break;
        }
    }

    let (key_data_salt, key_data_hash_algorithm, key_data_block_size, key_data_key_bits) = key_data
        .ok_or(OffcryptoError::InvalidEncryptionInfo {
            context: "missing <keyData> element",
        })?;
    let (
        spin_count,
        password_salt,
        password_hash_algorithm,
        password_key_bits,
        encrypted_key_value,
        encrypted_verifier_hash_input,
        encrypted_verifier_hash_value,
    ) = password_key.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing password <encryptedKey> element",
    })?;

    Ok(AgileEncryptionInfo {
        key_data_salt,
        key_data_hash_algorithm,
        key_data_block_size,
        key_data_key_bits,
        spin_count,
        password_salt,
        password_hash_algorithm,
        password_key_bits,
        encrypted_key_value,
        encrypted_verifier_hash_input,
        encrypted_verifier_hash_value,
    })
}

fn attr_str(value: &[u8]) -> Result<&str, OffcryptoError> {
    std::str::from_utf8(value).map_err(|_| OffcryptoError::InvalidEncryptionInfo {
        context: "invalid UTF-8 attribute value",
    })
}

fn decode_base64_bounded(
    value: &[u8],
    max_len: usize,
    context: &'static str,
) -> Result<Vec<u8>, OffcryptoError> {
    // Some producers pretty-print the XML; be permissive about whitespace and
    // missing `=` padding, but bound the decoded length.
    let cleaned: Vec<u8> = value
        .iter()
        .copied()
        .filter(|b| !matches!(b, b'\r' | b'\n' | b'\t' | b' '))
        .collect();
    let decoded = STANDARD
        .decode(&cleaned)
        .or_else(|_| STANDARD_NO_PAD.decode(&cleaned))
        .map_err(|_| OffcryptoError::InvalidEncryptionInfo {
            context: "invalid base64 value",
        })?;
    if decoded.len() > max_len {
        return Err(OffcryptoError::InvalidFormat { context });
    }
    Ok(decoded)
}

fn validate_salt(salt: &[u8], context: &'static str) -> Result<(), OffcryptoError> {
    if salt.len() != AGILE_SALT_LEN {
        return Err(OffcryptoError::InvalidFormat { context });
    }
    Ok(())
}

fn validate_encrypted(buf: &[u8], context: &'static str) -> Result<(), OffcryptoError> {
    if buf.is_empty() || buf.len() > AGILE_MAX_ENCRYPTED_LEN || buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(OffcryptoError::InvalidFormat { context });
    }
    Ok(())
}

fn parse_key_data_attrs(
    e: &quick_xml::events::BytesStart<'_>,
) -> Result<(Vec<u8>, HashAlgorithm, usize, usize), OffcryptoError> {
    let mut salt: Option<Vec<u8>> = None;
    let mut hash_algorithm: Option<HashAlgorithm> = None;
    let mut block_size: Option<usize> = None;
    let mut key_bits: Option<usize> = None;

    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|_| OffcryptoError::InvalidEncryptionInfo {
            context: "invalid XML attribute",
        })?;
        let value = attr.value.as_ref();
        match local_attr_name(attr.key.as_ref()) {
            b"cipherAlgorithm" => {
                if !attr_str(value)?.trim().eq_ignore_ascii_case("AES") {
                    return Err(OffcryptoError::UnsupportedAlgorithm(
                        "keyData.cipherAlgorithm must be AES".to_string(),
                    ));
                }
            }
            b"cipherChaining" => {
                if !attr_str(value)?.trim().eq_ignore_ascii_case("ChainingModeCBC") {
                    return Err(OffcryptoError::UnsupportedAlgorithm(
                        "keyData.cipherChaining must be ChainingModeCBC".to_string(),
                    ));
                }
            }
            b"saltValue" => {
                salt = Some(decode_base64_bounded(
                    value,
                    AGILE_SALT_LEN,
                    "keyData.saltValue too large",
                )?)
            }
            b"hashAlgorithm" => {
                hash_algorithm = Some(HashAlgorithm::parse_offcrypto_name(attr_str(value)?)?)
            }
            b"blockSize" => {
                let parsed = parse_decimal(value)?;
                if parsed != AES_BLOCK_SIZE {
                    return Err(OffcryptoError::UnsupportedAlgorithm(
                        "keyData.blockSize must be 16 for AES".to_string(),
                    ));
                }
                block_size = Some(parsed);
            }
            b"keyBits" => key_bits = Some(parse_decimal(value)?),
            _ => {}
        }
    }

    let salt = salt.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing keyData.saltValue",
    })?;
    validate_salt(&salt, "keyData.saltValue must be 16 bytes")?;
    let hash_algorithm = hash_algorithm.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing keyData.hashAlgorithm",
    })?;
    let block_size = block_size.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing keyData.blockSize",
    })?;
    let key_bits = key_bits.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing keyData.keyBits",
    })?;
    if !matches!(key_bits, 128 | 192 | 256) {
        return Err(OffcryptoError::UnsupportedAlgorithm(format!(
            "keyData.keyBits={key_bits}"
        )));
    }
    Ok((salt, hash_algorithm, block_size, key_bits))
}

type PasswordKeyAttrs = (u32, Vec<u8>, HashAlgorithm, usize, Vec<u8>, Vec<u8>, Vec<u8>);

/// Returns `Ok(None)` for `<encryptedKey>` elements without a `spinCount`
/// attribute (certificate key encryptors).
fn parse_encrypted_key_attrs(
    e: &quick_xml::events::BytesStart<'_>,
) -> Result<Option<PasswordKeyAttrs>, OffcryptoError> {
    let mut spin_count: Option<u32> = None;
    let mut salt: Option<Vec<u8>> = None;
    let mut hash_algorithm: Option<HashAlgorithm> = None;
    let mut key_bits: Option<usize> = None;
    let mut encrypted_key_value: Option<Vec<u8>> = None;
    let mut verifier_hash_input: Option<Vec<u8>> = None;
    let mut verifier_hash_value: Option<Vec<u8>> = None;

    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|_| OffcryptoError::InvalidEncryptionInfo {
            context: "invalid XML attribute",
        })?;
        let value = attr.value.as_ref();
        match local_attr_name(attr.key.as_ref()) {
            b"spinCount" => spin_count = Some(parse_decimal_u32(value)?),
            b"saltValue" => {
                salt = Some(decode_base64_bounded(
                    value,
                    AGILE_SALT_LEN,
                    "encryptedKey.saltValue too large",
                )?)
            }
            b"hashAlgorithm" => {
                hash_algorithm = Some(HashAlgorithm::parse_offcrypto_name(attr_str(value)?)?)
            }
            b"keyBits" => key_bits = Some(parse_decimal(value)?),
            b"encryptedKeyValue" => {
                encrypted_key_value = Some(decode_base64_bounded(
                    value,
                    AGILE_MAX_ENCRYPTED_LEN,
                    "encryptedKey.encryptedKeyValue too large",
                )?)
            }
            b"encryptedVerifierHashInput" => {
                verifier_hash_input = Some(decode_base64_bounded(
                    value,
                    AGILE_MAX_ENCRYPTED_LEN,
                    "encryptedKey.encryptedVerifierHashInput too large",
                )?)
            }
            b"encryptedVerifierHashValue" => {
                verifier_hash_value = Some(decode_base64_bounded(
                    value,
                    AGILE_MAX_ENCRYPTED_LEN,
                    "encryptedKey.encryptedVerifierHashValue too large",
                )?)
            }
            _ => {}
        }
    }

    let Some(spin_count) = spin_count else {
        return Ok(None);
    };
    if spin_count > MAX_SPIN_COUNT {
        return Err(OffcryptoError::InvalidEncryptionInfo {
            context: "encryptedKey.spinCount too large",
        });
    }

    let salt = salt.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing encryptedKey.saltValue",
    })?;
    validate_salt(&salt, "encryptedKey.saltValue must be 16 bytes")?;
    let hash_algorithm = hash_algorithm.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing encryptedKey.hashAlgorithm",
    })?;
    let key_bits = key_bits.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing encryptedKey.keyBits",
    })?;
    if !matches!(key_bits, 128 | 192 | 256) {
        return Err(OffcryptoError::UnsupportedAlgorithm(format!(
            "encryptedKey.keyBits={key_bits}"
        )));
    }
    let encrypted_key_value = encrypted_key_value.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing encryptedKey.encryptedKeyValue",
    })?;
    validate_encrypted(
        &encrypted_key_value,
        "encryptedKey.encryptedKeyValue must be AES-block aligned",
    )?;
    let verifier_hash_input = verifier_hash_input.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing encryptedKey.encryptedVerifierHashInput",
    })?;
    validate_encrypted(
        &verifier_hash_input,
        "encryptedKey.encryptedVerifierHashInput must be AES-block aligned",
    )?;
    let verifier_hash_value = verifier_hash_value.ok_or(OffcryptoError::InvalidEncryptionInfo {
        context: "missing encryptedKey.encryptedVerifierHashValue",
    })?;
    validate_encrypted(
        &verifier_hash_value,
        "encryptedKey.encryptedVerifierHashValue must be AES-block aligned",
    )?;

    Ok(Some((
        spin_count,
        salt,
        hash_algorithm,
        key_bits,
        encrypted_key_value,
        verifier_hash_input,
        verifier_hash_value,
    )))
}

fn local_attr_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|b| *b == b':')
        .map(|idx| &name[idx + 1..])
        .unwrap_or(name)
}

fn parse_decimal(value: &[u8]) -> Result<usize, OffcryptoError> {
    attr_str(value)?
        .trim()
        .parse::<usize>()
        .map_err(|_| OffcryptoError::InvalidEncryptionInfo {
            context: "invalid numeric attribute",
        })
}

fn parse_decimal_u32(value: &[u8]) -> Result<u32, OffcryptoError> {
    attr_str(value)?
        .trim()
        .parse::<u32>()
        .map_err(|_| OffcryptoError::InvalidEncryptionInfo {
            context: "invalid numeric attribute",
        })
}

/// Compute the Agile password *iterated hash*:
///
/// 1. `H = Hash(salt || password_utf16le)`
/// 2. For `i in 0..spinCount`: `H = Hash(LE32(i) || H)`
pub fn iterated_hash(
    password_utf16le: &[u8],
    salt: &[u8],
    hash_alg: HashAlgorithm,
    spin_count: u32,
) -> Zeroizing<Vec<u8>> {
    let digest_len = hash_alg.digest_len();
    let mut h = Zeroizing::new(vec![0u8; digest_len]);
    hash_alg.digest_two_into(salt, password_utf16le, &mut h);

    // Avoid per-iteration allocations (spinCount is often 100k).
    let mut buf = Zeroizing::new(vec![0u8; 4 + digest_len]);
    for i in 0u32..spin_count {
        buf[..4].copy_from_slice(&i.to_le_bytes());
        buf[4..].copy_from_slice(&h);
        hash_alg.digest_into(&buf, &mut h);
    }
    h
}

/// Derive a block key from the iterated hash: `Hash(H || block)` truncated, or
/// padded with `0x36`, to `key_len` bytes.
fn block_key(
    h: &[u8],
    block: &[u8; 8],
    hash_alg: HashAlgorithm,
    key_len: usize,
) -> Zeroizing<Vec<u8>> {
    let digest_len = hash_alg.digest_len();
    let mut digest = Zeroizing::new([0u8; MAX_DIGEST_LEN]);
    hash_alg.digest_two_into(h, block, &mut digest[..digest_len]);

    let mut key = Zeroizing::new(vec![0x36u8; key_len]);
    let n = key_len.min(digest_len);
    key[..n].copy_from_slice(&digest[..n]);
    key
}

/// Check a candidate password against the Agile verifier fields.
pub fn verify_password(info: &AgileEncryptionInfo, password: &str) -> Result<(), OffcryptoError> {
    let password_utf16 = Zeroizing::new(password_to_utf16le_bytes(password));
    let h = iterated_hash(
        &password_utf16,
        &info.password_salt,
        info.password_hash_algorithm,
        info.spin_count,
    );
    let key_len = info.password_key_bits / 8;

    let input_key = block_key(
        &h,
        &VERIFIER_HASH_INPUT_BLOCK,
        info.password_hash_algorithm,
        key_len,
    );
    let mut verifier_input = info.encrypted_verifier_hash_input.clone();
    aes_cbc_decrypt_in_place(&input_key, &info.password_salt, &mut verifier_input)?;

    let value_key = block_key(
        &h,
        &VERIFIER_HASH_VALUE_BLOCK,
        info.password_hash_algorithm,
        key_len,
    );
    let mut verifier_value = info.encrypted_verifier_hash_value.clone();
    aes_cbc_decrypt_in_place(&value_key, &info.password_salt, &mut verifier_value)?;

    // `verifierHashValue` may carry AES padding (SHA1 = 20 bytes padded to
    // 32); compare only the digest prefix.
    let digest_len = info.password_hash_algorithm.digest_len();
    let mut digest = [0u8; MAX_DIGEST_LEN];
    info.password_hash_algorithm
        .digest_into(&verifier_input, &mut digest[..digest_len]);
    let expected = verifier_value
        .get(..digest_len)
        .ok_or(OffcryptoError::InvalidPassword)?;
    if ct_eq(&digest[..digest_len], expected) {
        Ok(())
    } else {
        Err(OffcryptoError::InvalidPassword)
    }
}

/// Decrypt an Agile `EncryptedPackage` ciphertext (4096-byte AES-CBC segments,
/// per-segment IV derived from the keyData salt).
pub(crate) fn decrypt_package(
    info: &AgileEncryptionInfo,
    ciphertext: &[u8],
    total: usize,
    password: &str,
) -> Result<Vec<u8>, OffcryptoError> {
    verify_password(info, password)?;

    let password_utf16 = Zeroizing::new(password_to_utf16le_bytes(password));
    let h = iterated_hash(
        &password_utf16,
        &info.password_salt,
        info.password_hash_algorithm,
        info.spin_count,
    );
    let kv_key = block_key(
        &h,
        &KEY_VALUE_BLOCK,
        info.password_hash_algorithm,
        info.password_key_bits / 8,
    );
    let mut secret = Zeroizing::new(info.encrypted_key_value.clone());
    aes_cbc_decrypt_in_place(&kv_key, &info.password_salt, &mut secret)?;
    let secret_len = info.key_data_key_bits / 8;
    if secret.len() < secret_len {
        return Err(OffcryptoError::InvalidFormat {
            context: "decrypted keyValue shorter than keyData.keyBits",
        });
    }

    let iv_alg = info.key_data_hash_algorithm;
    let digest_len = iv_alg.digest_len();
    let mut out = Vec::with_capacity(ciphertext.len());
    for (i, segment) in ciphertext.chunks(SEGMENT_LEN).enumerate() {
        // IV_i = Hash(keyDataSalt || LE32(i)), truncated (or 0x36-padded) to
        // the cipher block size.
        let mut digest = [0u8; MAX_DIGEST_LEN];
        iv_alg.digest_two_into(
            &info.key_data_salt,
            &(i as u32).to_le_bytes(),
            &mut digest[..digest_len],
        );
        let mut iv = [0x36u8; AES_BLOCK_SIZE];
        let n = AES_BLOCK_SIZE.min(digest_len);
        iv[..n].copy_from_slice(&digest[..n]);

        let mut seg = segment.to_vec();
        let rem = seg.len() % AES_BLOCK_SIZE;
        if rem != 0 {
            seg.resize(seg.len() + AES_BLOCK_SIZE - rem, 0);
        }
        aes_cbc_decrypt_in_place(&secret[..secret_len], &iv, &mut seg)?;
        out.extend_from_slice(&seg);
    }
    out.truncate(total);
    Ok(out)
}
