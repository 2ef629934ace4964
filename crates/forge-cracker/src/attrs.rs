//! Artifact attribute names and descriptor-to-attribute mapping.
//!
//! Attribute names are stable strings shared with the host platform; values
//! follow the conventions the rest of the platform expects (hex strings for
//! byte arrays, a 32-digit binary string for flag words, JSON for the
//! key-protector list).

use forge_formats::util::{to_bin32, to_hex};
use forge_formats::FormatDescriptor;

use crate::host::AttrValue;

/// Tag applied by analysts to files whose strings should feed the cracker.
pub const CRACKER_SOURCE_TAG: &str = "FORGE Cracker Source";

pub const FORGE_PASSWORD: &str = "FORGE_PASSWORD";
pub const FORGE_TRIED_PASSWORD: &str = "FORGE_TRIED_PASSWORD";

pub const FORGE_ZIP_FILE_PATH: &str = "FORGE_ZIP_FILE_PATH";
pub const FORGE_ZIP_FILE_ENCRYPTION_METHOD: &str = "FORGE_ZIP_FILE_ENCRYPTION_METHOD";
pub const FORGE_ZIP_FILE_GEN_PURP_FLAG: &str = "FORGE_ZIP_FILE_GEN_PURP_FLAG";
pub const FORGE_ZIP_FILE_RELATIVE_OFFSET_OF_LOCAL_HEADER: &str =
    "FORGE_ZIP_FILE_RELATIVE_OFFSET_OF_LOCAL_HEADER";

pub const FORGE_PDF_FILTER: &str = "FORGE_PDF_FILTER";
pub const FORGE_PDF_REVISION: &str = "FORGE_PDF_REVISION";
pub const FORGE_PDF_LENGTH: &str = "FORGE_PDF_LENGTH";
pub const FORGE_PDF_OWNER_KEY: &str = "FORGE_PDF_OWNER_KEY";
pub const FORGE_PDF_USER_KEY: &str = "FORGE_PDF_USER_KEY";
pub const FORGE_PDF_PERMISSIONS: &str = "FORGE_PDF_PERMISSIONS";
pub const FORGE_PDF_ID: &str = "FORGE_PDF_ID";
pub const FORGE_PDF_IS_METADATAENCRYPTED: &str = "FORGE_PDF_IS_METADATAENCRYPTED";

pub const FORGE_OFFICE_MODE: &str = "FORGE_OFFICE_MODE";
pub const FORGE_OFFICE_CYPHER_ALG: &str = "FORGE_OFFICE_CYPHER_ALG";
pub const FORGE_OFFICE_HASH_ALG: &str = "FORGE_OFFICE_HASH_ALG";

pub const FORGE_BITLOCKER_ENCRYPTION_METHOD: &str = "FORGE_BITLOCKER_ENCRYPTION_METHOD";
pub const FORGE_BITLOCKER_DESCRIPTION: &str = "FORGE_BITLOCKER_DESCRIPTION";
pub const FORGE_BITLOCKER_KEY: &str = "FORGE_BITLOCKER_KEY";

pub const FORGE_LUKS_VERSION: &str = "FORGE_VOLUME_LUKS_VERSION";
pub const FORGE_LUKS_ENCRYPTION_METHOD: &str = "FORGE_LUKS_ENCRYPTION_METHOD";
pub const FORGE_LUKS_ENCRYPTION_MODE: &str = "FORGE_LUKS_ENCRYPTION_MODE";
pub const FORGE_LUKS_HASH_METHOD: &str = "FORGE_LUKS_HASH_METHOD";
pub const FORGE_LUKS_KEY_SIZE: &str = "FORGE_LUKS_KEY_SIZE";
pub const FORGE_LUKS_ACTIVE_KEYSLOTS: &str = "FORGE_LUKS_ACTIVE_KEYSLOTS";
pub const FORGE_LUKS_GUID: &str = "FORGE_LUKS_GUID";

/// Attributes the ingest side records for a detected descriptor.
pub fn descriptor_attributes(descriptor: &FormatDescriptor) -> Vec<(&'static str, AttrValue)> {
    match descriptor {
        FormatDescriptor::ZipCrypto(d) => vec![
            (FORGE_ZIP_FILE_PATH, AttrValue::Str(d.entry_path.clone())),
            (
                FORGE_ZIP_FILE_ENCRYPTION_METHOD,
                AttrValue::Str("ZipCrypto".to_string()),
            ),
            (
                FORGE_ZIP_FILE_GEN_PURP_FLAG,
                AttrValue::Str(to_bin32(u32::from(d.general_purpose_flags))[16..].to_string()),
            ),
            (
                FORGE_ZIP_FILE_RELATIVE_OFFSET_OF_LOCAL_HEADER,
                AttrValue::Int(d.local_header_offset as i64),
            ),
        ],
        FormatDescriptor::ZipAes(d) => vec![
            (FORGE_ZIP_FILE_PATH, AttrValue::Str(d.entry_path.clone())),
            (
                FORGE_ZIP_FILE_ENCRYPTION_METHOD,
                AttrValue::Str(d.strength.name().to_string()),
            ),
            (
                FORGE_ZIP_FILE_RELATIVE_OFFSET_OF_LOCAL_HEADER,
                AttrValue::Int(d.local_header_offset as i64),
            ),
        ],
        FormatDescriptor::PdfRc4(d) => vec![
            (FORGE_PDF_FILTER, AttrValue::Str("Standard".to_string())),
            (FORGE_PDF_REVISION, AttrValue::Int(i64::from(d.revision))),
            (FORGE_PDF_LENGTH, AttrValue::Int(i64::from(d.key_length_bits))),
            (FORGE_PDF_OWNER_KEY, AttrValue::Str(to_hex(&d.owner_key))),
            (FORGE_PDF_USER_KEY, AttrValue::Str(to_hex(&d.user_key))),
            (
                FORGE_PDF_PERMISSIONS,
                AttrValue::Str(to_bin32(u32::from_le_bytes(d.permissions))),
            ),
            (FORGE_PDF_ID, AttrValue::Str(to_hex(&d.document_id))),
            (
                FORGE_PDF_IS_METADATAENCRYPTED,
                AttrValue::Int(i64::from(d.metadata_encrypted)),
            ),
        ],
        FormatDescriptor::PdfAes(d) => vec![
            (FORGE_PDF_FILTER, AttrValue::Str("Standard".to_string())),
            (FORGE_PDF_REVISION, AttrValue::Int(6)),
            (FORGE_PDF_OWNER_KEY, AttrValue::Str(to_hex(&d.owner_key))),
            (FORGE_PDF_USER_KEY, AttrValue::Str(to_hex(&d.user_key))),
        ],
        FormatDescriptor::Office(d) => vec![
            (FORGE_OFFICE_MODE, AttrValue::Str(d.encryption_mode.clone())),
            (FORGE_OFFICE_CYPHER_ALG, AttrValue::Str(d.cipher_algorithm.clone())),
            (FORGE_OFFICE_HASH_ALG, AttrValue::Str(d.hash_algorithm.clone())),
        ],
        FormatDescriptor::Bitlocker(d) => vec![
            (
                FORGE_BITLOCKER_ENCRYPTION_METHOD,
                AttrValue::Str(d.encryption_method.clone()),
            ),
            (FORGE_BITLOCKER_DESCRIPTION, AttrValue::Str(d.description.clone())),
            (
                FORGE_BITLOCKER_KEY,
                AttrValue::Json(
                    serde_json::to_string(&d.key_protectors).unwrap_or_else(|_| "[]".to_string()),
                ),
            ),
        ],
        FormatDescriptor::Luks(d) => vec![
            (FORGE_LUKS_VERSION, AttrValue::Int(i64::from(d.version))),
            (FORGE_LUKS_ENCRYPTION_METHOD, AttrValue::Str(d.cipher.clone())),
            (FORGE_LUKS_ENCRYPTION_MODE, AttrValue::Str(d.mode.clone())),
            (FORGE_LUKS_HASH_METHOD, AttrValue::Str(d.hash.clone())),
            (FORGE_LUKS_KEY_SIZE, AttrValue::Int(i64::from(d.key_size_bits))),
            (
                FORGE_LUKS_ACTIVE_KEYSLOTS,
                AttrValue::Str(
                    d.active_slots
                        .iter()
                        .map(u32::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            ),
            (FORGE_LUKS_GUID, AttrValue::Str(d.guid.clone())),
        ],
    }
}
