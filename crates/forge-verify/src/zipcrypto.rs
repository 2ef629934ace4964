//! ZipCrypto (PKWARE APPNOTE §6.1) password verification.
//!
//! The traditional ZIP stream cipher prefixes each entry with a 12-byte
//! encryption header whose final byte, once decrypted, must match a known
//! check byte. That rejects 255 of 256 wrong passwords; survivors go through
//! the library extraction check.

use std::path::{Path, PathBuf};

use forge_formats::ZipCryptoDesc;

use crate::zip_extract::{confirm_by_extraction, extract_entry};
use crate::VerifyError;

const KEY0_INIT: u32 = 0x1234_5678;
const KEY1_INIT: u32 = 0x2345_6789;
const KEY2_INIT: u32 = 0x3456_7890;

/// CRC-32 table for the byte-stepped updates of the key schedule (polynomial
/// 0xEDB88320). Built in const context so verifier construction is just I/O.
const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut r = i as u32;
        let mut j = 0;
        while j < 8 {
            r = if r & 1 != 0 { (r >> 1) ^ 0xEDB8_8320 } else { r >> 1 };
            j += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

fn crc32_step(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
}

/// Cipher state per APPNOTE §6.1.5-§6.1.7.
struct Keys {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl Keys {
    fn new() -> Self {
        Keys {
            k0: KEY0_INIT,
            k1: KEY1_INIT,
            k2: KEY2_INIT,
        }
    }

    fn update(&mut self, byte: u8) {
        self.k0 = crc32_step(self.k0, byte);
        self.k1 = (self.k1.wrapping_add(self.k0 & 0xFF))
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.k2 = crc32_step(self.k2, (self.k1 >> 24) as u8);
    }

    fn decrypt_byte(&mut self, byte: u8) -> u8 {
        let temp = (self.k2 | 2) as u16;
        let plain = byte ^ (temp.wrapping_mul(temp ^ 1) >> 8) as u8;
        self.update(plain);
        plain
    }
}

#[derive(Debug)]
pub struct ZipCryptoVerifier {
    archive_path: PathBuf,
    entry_path: String,
    scratch_dir: PathBuf,
    /// 12-byte encryption header read once at construction.
    header: [u8; 12],
    verification_byte: u8,
}

impl ZipCryptoVerifier {
    /// Read the entry's encryption header; no file handle survives the call.
    pub fn new(desc: &ZipCryptoDesc, scratch_dir: &Path) -> Result<Self, VerifyError> {
        let header = read_encryption_header(&desc.archive_path, desc.local_header_offset)?;
        Ok(ZipCryptoVerifier {
            archive_path: desc.archive_path.clone(),
            entry_path: desc.entry_path.clone(),
            scratch_dir: scratch_dir.to_path_buf(),
            header,
            verification_byte: desc.verification_byte,
        })
    }

    pub fn verify(&self, password: &str) -> Result<bool, VerifyError> {
        let mut keys = Keys::new();
        for &byte in password.as_bytes() {
            keys.update(byte);
        }
        let mut last = 0u8;
        for &byte in &self.header {
            last = keys.decrypt_byte(byte);
        }
        if last != self.verification_byte {
            return Ok(false);
        }
        confirm_by_extraction(
            &self.archive_path,
            &self.entry_path,
            password,
            &self.scratch_dir,
        )
    }

    pub fn decrypt(&self, password: &str, out_dir: &Path) -> Result<PathBuf, VerifyError> {
        extract_entry(&self.archive_path, &self.entry_path, password, out_dir)
    }
}

/// Locate the 12-byte encryption header: past the local header's fixed part,
/// file name, and extra field.
fn read_encryption_header(archive_path: &Path, local_header_offset: u64) -> Result<[u8; 12], VerifyError> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = std::fs::File::open(archive_path).map_err(|source| VerifyError::Io {
        context: "zip archive",
        source,
    })?;
    let read_exact_at = |file: &mut std::fs::File, offset: u64, buf: &mut [u8]| {
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(buf))
            .map_err(|source| VerifyError::Io {
                context: "zip local header",
                source,
            })
    };

    let mut lens = [0u8; 4];
    read_exact_at(&mut file, local_header_offset + 26, &mut lens)?;
    let name_len = u64::from(u16::from_le_bytes([lens[0], lens[1]]));
    let extra_len = u64::from(u16::from_le_bytes([lens[2], lens[3]]));

    let mut header = [0u8; 12];
    read_exact_at(
        &mut file,
        local_header_offset + 30 + name_len + extra_len,
        &mut header,
    )?;
    Ok(header)
}
