//! BitLocker FVE metadata extraction.
//!
//! Layout follows the libbde BDE format documentation. The parser never fails
//! on an unrecognized metadata entry; unknown entry kinds are skipped so one
//! odd vendor extension cannot hide the whole volume.

use std::io::{Read, Seek};

use crate::util::{filetime_to_unix, format_guid, read_at, utf16le_lossy, Reader};
use crate::{BitlockerInfo, FormatError, KeyProtector};

/// BitLocker volume GUID at offset 160, mixed endian, without its final byte.
/// The 16th byte discriminates plain BitLocker (`0x00`) from To Go (`0x01`).
pub const BITLOCKER_GUID: [u8; 15] = [
    0x3B, 0xD6, 0x67, 0x49, 0x2E, 0x29, 0xD8, 0x4A, 0x83, 0x99, 0xF6, 0xA3, 0x39, 0xE3, 0xD0,
];

const GUID_OFFSET: u64 = 160;
const FVE_OFFSET_FIELD: u64 = 176;
/// FVE metadata header is 64 bytes; the block header before it is 48.
const FVE_HEADER_LEN: u64 = 64;
const FVE_BLOCK_HEADER_LEN: u64 = 48;

const ENTRY_KEY_PROTECTOR: u16 = 0x0002;
const ENTRY_DESCRIPTION: u16 = 0x0007;
const VALUE_UNICODE: u16 = 0x0002;
const VALUE_VMK: u16 = 0x0008;

/// Check the volume GUID. `Some(to_go)` when the volume is BitLocker.
pub fn detect<R: Read + Seek>(volume: &mut R) -> Result<Option<bool>, FormatError> {
    let mut guid = [0u8; 16];
    if read_at(volume, GUID_OFFSET, &mut guid, "BitLocker volume GUID").is_err() {
        return Ok(None);
    }
    if guid[..15] != BITLOCKER_GUID {
        return Ok(None);
    }
    match guid[15] {
        0x00 => Ok(Some(false)),
        0x01 => Ok(Some(true)),
        _ => Ok(None),
    }
}

/// Parse the FVE metadata block of a BitLocker volume.
pub fn parse<R: Read + Seek>(volume: &mut R) -> Result<BitlockerInfo, FormatError> {
    let Some(to_go) = detect(volume)? else {
        return Err(FormatError::Malformed {
            format: "bitlocker volume",
            context: "volume GUID not found at offset 160",
        });
    };

    let mut buf8 = [0u8; 8];
    read_at(volume, FVE_OFFSET_FIELD, &mut buf8, "FVE metadata offset")?;
    let fve_offset = u64::from_le_bytes(buf8);

    let mut buf4 = [0u8; 4];
    read_at(volume, fve_offset + FVE_HEADER_LEN, &mut buf4, "FVE metadata size")?;
    let metadata_size = u32::from_le_bytes(buf4) as u64;

    read_at(
        volume,
        fve_offset + FVE_HEADER_LEN + 36,
        &mut buf4,
        "FVE encryption method",
    )?;
    let encryption_method = u32::from_le_bytes(buf4);

    read_at(volume, fve_offset + FVE_HEADER_LEN + 40, &mut buf8, "FVE creation time")?;
    let creation_time_epoch = filetime_to_unix(u64::from_le_bytes(buf8));

    let data_size = metadata_size
        .checked_sub(FVE_BLOCK_HEADER_LEN + FVE_HEADER_LEN)
        .ok_or(FormatError::Malformed {
            format: "bitlocker volume",
            context: "FVE metadata size smaller than its headers",
        })?;
    let mut metadata = vec![0u8; data_size as usize];
    read_at(
        volume,
        fve_offset + FVE_BLOCK_HEADER_LEN + FVE_HEADER_LEN,
        &mut metadata,
        "FVE metadata entries",
    )?;

    let mut description = String::new();
    let mut key_protectors = Vec::new();

    let mut offset = 0usize;
    while offset + 8 <= metadata.len() {
        let mut er = Reader::new(&metadata[offset..]);
        let size = er.read_u16_le("FVE entry size")? as usize;
        let entry_type = er.read_u16_le("FVE entry type")?;
        let value_type = er.read_u16_le("FVE entry value type")?;
        let _version = er.read_u16_le("FVE entry version")?;
        if size < 8 || offset + size > metadata.len() {
            // A zero or overlong size would loop forever; stop the walk and
            // keep what was already collected.
            log::warn!("bitlocker: FVE entry at offset {offset} has invalid size {size}");
            break;
        }
        let payload = &metadata[offset + 8..offset + size];

        match (entry_type, value_type) {
            (ENTRY_KEY_PROTECTOR, VALUE_VMK) => {
                if payload.len() >= 28 {
                    let mut guid = [0u8; 16];
                    guid.copy_from_slice(&payload[..16]);
                    let protection_type = u16::from_le_bytes([payload[26], payload[27]]);
                    key_protectors.push(KeyProtector {
                        guid: format_guid(&guid),
                        protection_type: protection_type_name(protection_type).to_string(),
                    });
                }
            }
            (ENTRY_DESCRIPTION, VALUE_UNICODE) => {
                description.push_str(&utf16le_lossy(payload));
            }
            _ => {}
        }
        offset += size;
    }

    Ok(BitlockerInfo {
        to_go,
        encryption_method: encryption_method_name(encryption_method).to_string(),
        creation_time_epoch,
        description,
        key_protectors,
    })
}

/// Key-protector type names per the BDE documentation.
fn protection_type_name(protection_type: u16) -> &'static str {
    match protection_type {
        0x0000 => "Clear key (unprotected)",
        0x0100 => "TPM",
        0x0200 => "Startup key",
        0x0500 => "TPM + PIN",
        0x0800 => "Recovery password",
        0x2000 => "Password",
        _ => "Unknown",
    }
}

/// Encryption-method names keyed by the low 16 bits of the method field.
fn encryption_method_name(method: u32) -> &'static str {
    match method & 0xFFFF {
        0x0001 | 0x1001 => "Unknown (Stretch key)",
        0x2000..=0x2005 => "Unknown (AES-CCM 256 bit encryption)",
        0x8000 => "AES-CBC 128-bit encryption with Elephant Diffuser",
        0x8001 => "AES-CBC 256-bit encryption with Elephant Diffuser",
        0x8002 => "AES-CBC 128-bit encryption",
        0x8003 => "AES-CBC 256-bit encryption",
        0x8004 => "AES-XTS 128-bit encryption",
        0x8005 => "Unknown (AES-XTS 256-bit encryption)",
        _ => "Unknown",
    }
}
