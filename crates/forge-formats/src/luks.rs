//! LUKS volume header extraction (versions 1 and 2).
//!
//! LUKS1 keeps everything at fixed offsets in a big-endian binary header;
//! LUKS2 moves most metadata into a JSON area that starts at offset 4096.

use std::io::{Read, Seek};

use crate::util::{read_at, Reader};
use crate::{FormatError, LuksInfo};

/// `"LUKS"` at offset 0.
pub const LUKS_MAGIC: [u8; 4] = [0x4C, 0x55, 0x4B, 0x53];

const V1_CIPHER_OFFSET: u64 = 8;
const V1_MODE_OFFSET: u64 = 40;
const V1_HASH_OFFSET: u64 = 72;
const V1_KEY_BYTES_OFFSET: u64 = 108;
const UUID_OFFSET: u64 = 168;
const V1_KEY_SLOTS_OFFSET: u64 = 208;
const V1_KEY_SLOT_LEN: u64 = 48;
const V1_SLOT_ACTIVE: u32 = 0x00AC_71F3;
const V2_JSON_OFFSET: u64 = 4096;

/// Check the magic at offset 0.
pub fn detect<R: Read + Seek>(volume: &mut R) -> Result<bool, FormatError> {
    let mut magic = [0u8; 4];
    if read_at(volume, 0, &mut magic, "LUKS magic").is_err() {
        return Ok(false);
    }
    Ok(magic == LUKS_MAGIC)
}

/// Parse a LUKS1 or LUKS2 header.
pub fn parse<R: Read + Seek>(volume: &mut R) -> Result<LuksInfo, FormatError> {
    if !detect(volume)? {
        return Err(FormatError::Malformed {
            format: "luks volume",
            context: "magic not found at offset 0",
        });
    }

    let mut version_buf = [0u8; 2];
    read_at(volume, 6, &mut version_buf, "LUKS version")?;
    let version = u16::from_be_bytes(version_buf);

    match version {
        1 => parse_v1(volume),
        2 => parse_v2(volume),
        other => Err(FormatError::Unsupported {
            format: "luks volume",
            feature: format!("version {other}"),
        }),
    }
}

fn read_ascii_field<R: Read + Seek>(
    volume: &mut R,
    offset: u64,
    len: usize,
    context: &'static str,
) -> Result<String, FormatError> {
    let mut buf = vec![0u8; len];
    read_at(volume, offset, &mut buf, context)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).trim().to_string())
}

fn parse_v1<R: Read + Seek>(volume: &mut R) -> Result<LuksInfo, FormatError> {
    let cipher = read_ascii_field(volume, V1_CIPHER_OFFSET, 32, "LUKS1 cipher name")?;
    let mode = read_ascii_field(volume, V1_MODE_OFFSET, 32, "LUKS1 cipher mode")?;
    let hash = read_ascii_field(volume, V1_HASH_OFFSET, 32, "LUKS1 hash spec")?;

    let mut key_bytes_buf = [0u8; 4];
    read_at(volume, V1_KEY_BYTES_OFFSET, &mut key_bytes_buf, "LUKS1 key bytes")?;
    let key_bytes = u32::from_be_bytes(key_bytes_buf);

    let guid = read_ascii_field(volume, UUID_OFFSET, 40, "LUKS1 UUID")?;

    let mut active_slots = Vec::new();
    let mut slot = [0u8; 48];
    for i in 0..8u32 {
        read_at(
            volume,
            V1_KEY_SLOTS_OFFSET + u64::from(i) * V1_KEY_SLOT_LEN,
            &mut slot,
            "LUKS1 key slot",
        )?;
        let status = Reader::new(&slot).read_u32_be("LUKS1 key slot status")?;
        if status == V1_SLOT_ACTIVE {
            active_slots.push(i);
        }
    }

    Ok(LuksInfo {
        version: 1,
        cipher,
        mode,
        hash,
        key_size_bits: key_bytes * 8,
        active_slots,
        guid,
    })
}

fn parse_v2<R: Read + Seek>(volume: &mut R) -> Result<LuksInfo, FormatError> {
    let guid = read_ascii_field(volume, UUID_OFFSET, 40, "LUKS2 UUID")?;

    let mut size_buf = [0u8; 8];
    read_at(volume, 8, &mut size_buf, "LUKS2 JSON area size")?;
    let json_size = u64::from_be_bytes(size_buf);
    // The JSON area is bounded (cryptsetup defaults to well under 4 MiB); a
    // corrupt size field must not drive a huge allocation.
    if json_size == 0 || json_size > 16 * 1024 * 1024 {
        return Err(FormatError::Malformed {
            format: "luks volume",
            context: "JSON area size out of bounds",
        });
    }

    let mut json_buf = vec![0u8; json_size as usize];
    read_at(volume, V2_JSON_OFFSET, &mut json_buf, "LUKS2 JSON area")?;
    // The area is zero-padded past the document.
    let end = json_buf.iter().position(|&b| b == 0).unwrap_or(json_buf.len());
    let root: serde_json::Value = serde_json::from_slice(&json_buf[..end])?;

    let mut active_slots = Vec::new();
    let mut key_size_bits = 0u32;
    if let Some(keyslots) = root.get("keyslots").and_then(|v| v.as_object()) {
        for (slot, entry) in keyslots {
            if let Ok(index) = slot.parse::<u32>() {
                active_slots.push(index);
            }
            if key_size_bits == 0 {
                if let Some(bytes) = entry.get("key_size").and_then(|v| v.as_u64()) {
                    key_size_bits = bytes as u32 * 8;
                }
            }
        }
        active_slots.sort_unstable();
    }

    // `segments` holds `encryption` formatted `cipher-mode`; everything up to
    // the first dash is the cipher, the rest is the mode.
    let encryption = first_entry_str(&root, "segments", "encryption").unwrap_or_default();
    let (cipher, mode) = match encryption.find('-') {
        Some(idx) => (
            encryption[..idx].to_string(),
            encryption[idx + 1..].to_string(),
        ),
        None => (encryption, String::new()),
    };

    let hash = first_entry_str(&root, "digests", "hash").unwrap_or_default();

    Ok(LuksInfo {
        version: 2,
        cipher,
        mode,
        hash,
        key_size_bits,
        active_slots,
        guid,
    })
}

fn first_entry_str(root: &serde_json::Value, section: &str, field: &str) -> Option<String> {
    root.get(section)?
        .as_object()?
        .values()
        .next()?
        .get(field)?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn put_ascii(vol: &mut [u8], offset: usize, s: &str) {
        vol[offset..offset + s.len()].copy_from_slice(s.as_bytes());
    }

    fn build_v1() -> Vec<u8> {
        let mut vol = vec![0u8; 1024];
        vol[..4].copy_from_slice(&LUKS_MAGIC);
        vol[6..8].copy_from_slice(&1u16.to_be_bytes());
        put_ascii(&mut vol, 8, "aes");
        put_ascii(&mut vol, 40, "xts-plain64");
        put_ascii(&mut vol, 72, "sha256");
        vol[108..112].copy_from_slice(&64u32.to_be_bytes());
        put_ascii(&mut vol, 168, "f0e1d2c3-0000-4a4a-8888-123456789abc");
        // Slots 0 and 3 active.
        vol[208..212].copy_from_slice(&V1_SLOT_ACTIVE.to_be_bytes());
        vol[208 + 3 * 48..208 + 3 * 48 + 4].copy_from_slice(&V1_SLOT_ACTIVE.to_be_bytes());
        vol
    }

    #[test]
    fn parses_luks1_header() {
        let info = parse(&mut Cursor::new(build_v1())).expect("parse LUKS1");
        assert_eq!(
            info,
            LuksInfo {
                version: 1,
                cipher: "aes".to_string(),
                mode: "xts-plain64".to_string(),
                hash: "sha256".to_string(),
                key_size_bits: 512,
                active_slots: vec![0, 3],
                guid: "f0e1d2c3-0000-4a4a-8888-123456789abc".to_string(),
            }
        );
    }

    #[test]
    fn parses_luks2_json_area() {
        let json = br#"{
            "keyslots": {"0": {"key_size": 64}, "2": {"key_size": 64}},
            "segments": {"0": {"encryption": "aes-xts-plain64"}},
            "digests": {"0": {"hash": "sha256"}}
        }"#;
        let mut vol = vec![0u8; 4096 + 512];
        vol[..4].copy_from_slice(&LUKS_MAGIC);
        vol[6..8].copy_from_slice(&2u16.to_be_bytes());
        vol[8..16].copy_from_slice(&512u64.to_be_bytes());
        put_ascii(&mut vol, 168, "11112222-3333-4444-5555-666677778888");
        vol[4096..4096 + json.len()].copy_from_slice(json);

        let info = parse(&mut Cursor::new(vol)).expect("parse LUKS2");
        assert_eq!(info.version, 2);
        assert_eq!(info.cipher, "aes");
        assert_eq!(info.mode, "xts-plain64");
        assert_eq!(info.hash, "sha256");
        assert_eq!(info.key_size_bits, 512);
        assert_eq!(info.active_slots, vec![0, 2]);
        assert_eq!(info.guid, "11112222-3333-4444-5555-666677778888");
    }

    #[test]
    fn rejects_unknown_version() {
        let mut vol = vec![0u8; 512];
        vol[..4].copy_from_slice(&LUKS_MAGIC);
        vol[6..8].copy_from_slice(&3u16.to_be_bytes());
        let err = parse(&mut Cursor::new(vol)).unwrap_err();
        assert!(matches!(err, FormatError::Unsupported { .. }));
    }

    #[test]
    fn rejects_missing_magic() {
        assert!(!detect(&mut Cursor::new(vec![0u8; 64])).unwrap());
        let err = parse(&mut Cursor::new(vec![0u8; 64])).unwrap_err();
        assert!(matches!(err, FormatError::Malformed { .. }));
    }
}
