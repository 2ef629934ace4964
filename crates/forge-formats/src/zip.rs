//! ZIP archive walker.
//!
//! Walks the central directory without decompressing anything, classifying
//! each entry's encryption per PKWARE APPNOTE §§4.3.7/4.3.12/4.3.16 and the
//! WinZip AES extra field. Zip64 and split archives are out of scope and are
//! reported as unsupported rather than misparsed.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::util::{read_at, Reader};
use crate::{AesStrength, FormatDescriptor, FormatError, ZipAesDesc, ZipCryptoDesc};

const EOCD_SIG: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
const CD_SIG: u32 = 0x0201_4B50;
const LOCAL_SIG: u32 = 0x0403_4B50;
/// Minimum EOCD length; the backward scan starts here from the end.
const EOCD_MIN_LEN: u64 = 22;
/// WinZip AES extra field header id.
const AES_EXTRA_ID: u16 = 0x9901;
/// Compression method signalling WinZip AES; the real method is in the extra
/// field.
const METHOD_AES: u16 = 99;

const FLAG_ENCRYPTED: u16 = 1 << 0;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
const FLAG_STRONG_ENCRYPTION: u16 = 1 << 6;

/// Per-entry encryption classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZipEncryption {
    None,
    ZipCrypto,
    Aes {
        strength: AesStrength,
        salt: Vec<u8>,
        password_verifier: [u8; 2],
    },
    /// Proprietary strong encryption (general purpose bit 6); metadata only.
    Strong,
    Unknown,
}

impl ZipEncryption {
    pub fn method_name(&self) -> &'static str {
        match self {
            ZipEncryption::None => "None",
            ZipEncryption::ZipCrypto => "ZipCrypto",
            ZipEncryption::Aes { strength, .. } => strength.name(),
            ZipEncryption::Strong => "Strong Encryption",
            ZipEncryption::Unknown => "Unknown",
        }
    }
}

/// One central-directory record, plus the encryption classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub general_purpose_flags: u16,
    /// Real compression method (AES entries report the method stored in the
    /// extra field, not 99).
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u64,
    pub path: String,
    pub comment: String,
    pub is_directory: bool,
    pub encryption: ZipEncryption,
}

impl ZipEntry {
    pub fn encrypted(&self) -> bool {
        !matches!(self.encryption, ZipEncryption::None)
    }

    /// Byte checked by the ZipCrypto 12-byte header: the CRC-32 high byte, or
    /// the DOS-time high byte when the CRC is deferred to a data descriptor.
    pub fn zipcrypto_verification_byte(&self) -> u8 {
        if self.general_purpose_flags & FLAG_DATA_DESCRIPTOR != 0 {
            (self.last_mod_time >> 8) as u8
        } else {
            (self.crc32 >> 24) as u8
        }
    }

    /// Build a crack-ready descriptor for this entry, if its scheme supports
    /// password verification.
    pub fn descriptor(&self, archive_path: &Path) -> Option<FormatDescriptor> {
        match &self.encryption {
            ZipEncryption::ZipCrypto => Some(FormatDescriptor::ZipCrypto(ZipCryptoDesc {
                archive_path: archive_path.to_path_buf(),
                entry_path: self.path.clone(),
                local_header_offset: self.local_header_offset,
                general_purpose_flags: self.general_purpose_flags,
                verification_byte: self.zipcrypto_verification_byte(),
            })),
            ZipEncryption::Aes {
                strength,
                salt,
                password_verifier,
            } => Some(FormatDescriptor::ZipAes(ZipAesDesc {
                archive_path: archive_path.to_path_buf(),
                entry_path: self.path.clone(),
                local_header_offset: self.local_header_offset,
                strength: *strength,
                salt: salt.clone(),
                password_verifier: *password_verifier,
            })),
            ZipEncryption::None | ZipEncryption::Strong | ZipEncryption::Unknown => None,
        }
    }

    /// Human-readable compression method per the APPNOTE §4.4.5 table.
    pub fn compression_method_name(&self) -> String {
        let m = self.compression_method;
        let name = match m {
            0 => "Stored",
            1 => "Shrunk",
            2 => "Reduced with compression factor 1",
            3 => "Reduced with compression factor 2",
            4 => "Reduced with compression factor 3",
            5 => "Reduced with compression factor 4",
            6 => "Imploded",
            7 => "Tokenized",
            8 => "Deflated",
            9 => "Deflate64",
            10 => "PKWARE DCL Imploded",
            12 => "BZIP2",
            14 => "LZMA",
            16 => "IBM z/OS CMPSC",
            18 => "IBM TERSE",
            19 => "IBM LZ77",
            93 => "zstd",
            94 => "MP3",
            95 => "XZ",
            96 => "JPEG variant",
            97 => "WavPack",
            98 => "PPMd",
            _ => "",
        };
        if name.is_empty() {
            format!("({m})")
        } else {
            format!("{name} ({m})")
        }
    }
}

/// Parsed archive-level metadata plus all central-directory entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipArchive {
    pub comment: String,
    pub cd_records: u16,
    pub cd_offset: u64,
    pub eocd_offset: u64,
    pub entries: Vec<ZipEntry>,
}

impl ZipArchive {
    pub fn encrypted(&self) -> bool {
        self.entries.iter().any(ZipEntry::encrypted)
    }

    /// Archive-level encryption method: the last encrypted entry's method, as
    /// surfaced on the archive artifact.
    pub fn encryption_method(&self) -> &'static str {
        self.entries
            .iter()
            .rev()
            .find(|e| e.encrypted())
            .map(|e| e.encryption.method_name())
            .unwrap_or("None")
    }
}

/// Walk an archive: locate the EOCD, parse it, then every central-directory
/// record. For AES entries the local header is revisited to pull the salt and
/// password verification value, so the returned entries are self-contained.
pub fn parse_archive<R: Read + Seek>(r: &mut R) -> Result<ZipArchive, FormatError> {
    let file_len = r
        .seek(SeekFrom::End(0))
        .map_err(|source| FormatError::Io {
            context: "zip archive length",
            source,
        })?;
    if file_len < EOCD_MIN_LEN {
        return Err(FormatError::Malformed {
            format: "zip archive",
            context: "shorter than an EOCD record",
        });
    }

    // The EOCD sits at the very end, possibly preceded by a comment of up to
    // 0xFFFF bytes. Read the whole candidate tail once and scan backward.
    let tail_len = file_len.min(EOCD_MIN_LEN + 0xFFFF);
    let tail_start = file_len - tail_len;
    let mut tail = vec![0u8; tail_len as usize];
    read_at(r, tail_start, &mut tail, "zip EOCD tail")?;

    let mut eocd_in_tail = None;
    let mut pos = tail.len() - EOCD_MIN_LEN as usize;
    loop {
        if tail[pos..pos + 4] == EOCD_SIG {
            eocd_in_tail = Some(pos);
            break;
        }
        if pos == 0 {
            break;
        }
        pos -= 1;
    }
    let Some(eocd_in_tail) = eocd_in_tail else {
        return Err(FormatError::Malformed {
            format: "zip archive",
            context: "EOCD signature not found",
        });
    };
    let eocd_offset = tail_start + eocd_in_tail as u64;

    let mut er = Reader::new(&tail[eocd_in_tail + 4..]);
    let disk_number = er.read_u16_le("EOCD.diskNumber")?;
    let disk_with_cd = er.read_u16_le("EOCD.diskWithCentralDirectory")?;
    let cd_records_on_disk = er.read_u16_le("EOCD.centralDirectoryRecordsOnDisk")?;
    let cd_records = er.read_u16_le("EOCD.centralDirectoryRecords")?;
    let cd_size = er.read_u32_le("EOCD.centralDirectorySize")?;
    let cd_offset = er.read_u32_le("EOCD.centralDirectoryOffset")?;
    let comment_len = er.read_u16_le("EOCD.commentLength")?;

    if cd_records_on_disk != cd_records {
        return Err(FormatError::Unsupported {
            format: "zip archive",
            feature: "split archive".to_string(),
        });
    }
    if disk_number == 0xFFFF
        || disk_with_cd == 0xFFFF
        || cd_records_on_disk == 0xFFFF
        || cd_records == 0xFFFF
        || cd_size == 0xFFFF_FFFF
        || cd_offset == 0xFFFF_FFFF
    {
        return Err(FormatError::Unsupported {
            format: "zip archive",
            feature: "Zip64".to_string(),
        });
    }

    let comment = String::from_utf8_lossy(er.take(comment_len as usize, "EOCD.comment")?).into_owned();

    let mut cd = vec![0u8; cd_size as usize];
    read_at(r, cd_offset as u64, &mut cd, "zip central directory")?;
    let mut cr = Reader::new(&cd);

    let mut entries = Vec::with_capacity(cd_records as usize);
    for _ in 0..cd_records {
        if cr.read_u32_le("central directory signature")? != CD_SIG {
            return Err(FormatError::Malformed {
                format: "zip archive",
                context: "central directory signature not found",
            });
        }
        let version_made_by = cr.read_u16_le("cd.versionMadeBy")?;
        let version_needed = cr.read_u16_le("cd.versionNeededToExtract")?;
        let general_purpose_flags = cr.read_u16_le("cd.generalPurposeBitFlag")?;
        let mut compression_method = cr.read_u16_le("cd.compressionMethod")?;
        let last_mod_time = cr.read_u16_le("cd.lastModFileTime")?;
        let last_mod_date = cr.read_u16_le("cd.lastModFileDate")?;
        let crc32 = cr.read_u32_le("cd.crc32")?;
        let compressed_size = cr.read_u32_le("cd.compressedSize")?;
        let uncompressed_size = cr.read_u32_le("cd.uncompressedSize")?;
        let name_len = cr.read_u16_le("cd.fileNameLength")? as usize;
        let extra_len = cr.read_u16_le("cd.extraFieldLength")? as usize;
        let comment_len = cr.read_u16_le("cd.fileCommentLength")? as usize;
        let _disk_number_start = cr.read_u16_le("cd.diskNumberStart")?;
        let _internal_attributes = cr.read_u16_le("cd.internalFileAttributes")?;
        let _external_attributes = cr.read_u32_le("cd.externalFileAttributes")?;
        let local_header_offset = cr.read_u32_le("cd.relativeOffsetOfLocalHeader")? as u64;

        let path = String::from_utf8_lossy(cr.take(name_len, "cd.fileName")?).into_owned();
        let extra = cr.take(extra_len, "cd.extraField")?.to_vec();
        let comment = String::from_utf8_lossy(cr.take(comment_len, "cd.fileComment")?).into_owned();

        let encrypted = general_purpose_flags & FLAG_ENCRYPTED != 0;
        let strong = general_purpose_flags & FLAG_STRONG_ENCRYPTION != 0;
        let mut encryption = match (encrypted, strong, compression_method) {
            (false, _, _) => ZipEncryption::None,
            (true, true, _) => ZipEncryption::Strong,
            (true, false, METHOD_AES) => ZipEncryption::Unknown, // resolved below
            (true, false, _) => ZipEncryption::ZipCrypto,
        };

        if encrypted && !strong && compression_method == METHOD_AES {
            match find_aes_extra(&extra) {
                Some((strength, real_method)) => {
                    compression_method = real_method;
                    let (salt, password_verifier) =
                        read_aes_salt(r, local_header_offset, strength)?;
                    encryption = ZipEncryption::Aes {
                        strength,
                        salt,
                        password_verifier,
                    };
                }
                None => {
                    log::warn!("zip entry {path:?}: method 99 without a WinZip AES extra field");
                    encryption = ZipEncryption::Unknown;
                }
            }
        }

        let is_directory = path.ends_with('/');
        entries.push(ZipEntry {
            version_made_by,
            version_needed,
            general_purpose_flags,
            compression_method,
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            path,
            comment,
            is_directory,
            encryption,
        });
    }

    Ok(ZipArchive {
        comment,
        cd_records,
        cd_offset: cd_offset as u64,
        eocd_offset,
        entries,
    })
}

/// Scan a central-directory extra field for the WinZip AES block (`0x9901`):
/// returns the AES strength and the real compression method.
fn find_aes_extra(extra: &[u8]) -> Option<(AesStrength, u16)> {
    let mut pos = 0usize;
    while pos + 4 <= extra.len() {
        let id = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let size = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        let data = extra.get(pos + 4..pos + 4 + size)?;
        if id == AES_EXTRA_ID {
            // data: vendor version (2), vendor id "AE" (2), strength (1),
            // real compression method (2)
            if data.len() < 7 {
                return None;
            }
            let strength = match data[4] {
                0x01 => AesStrength::Aes128,
                0x02 => AesStrength::Aes192,
                0x03 => AesStrength::Aes256,
                _ => return None,
            };
            let real_method = u16::from_le_bytes([data[5], data[6]]);
            return Some((strength, real_method));
        }
        pos += 4 + size;
    }
    None
}

/// Read the per-entry salt and 2-byte password verification value stored at
/// the start of an AES entry's data (just past the local header).
fn read_aes_salt<R: Read + Seek>(
    r: &mut R,
    local_header_offset: u64,
    strength: AesStrength,
) -> Result<(Vec<u8>, [u8; 2]), FormatError> {
    let mut fixed = [0u8; 30];
    read_at(r, local_header_offset, &mut fixed, "zip local header")?;
    let mut lr = Reader::new(&fixed);
    if lr.read_u32_le("local header signature")? != LOCAL_SIG {
        return Err(FormatError::Malformed {
            format: "zip archive",
            context: "local header signature not found",
        });
    }
    let name_len = u16::from_le_bytes([fixed[26], fixed[27]]) as u64;
    let extra_len = u16::from_le_bytes([fixed[28], fixed[29]]) as u64;

    let data_offset = local_header_offset + 30 + name_len + extra_len;
    let mut salt = vec![0u8; strength.salt_len()];
    read_at(r, data_offset, &mut salt, "zip AES salt")?;
    let mut pv = [0u8; 2];
    read_at(
        r,
        data_offset + strength.salt_len() as u64,
        &mut pv,
        "zip AES password verifier",
    )?;
    Ok((salt, pv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    struct TestEntry {
        name: &'static str,
        flags: u16,
        method: u16,
        crc32: u32,
        mod_time: u16,
        extra: Vec<u8>,
        data: Vec<u8>,
    }

    fn aes_extra(strength: u8, real_method: u16) -> Vec<u8> {
        let mut e = Vec::new();
        e.extend_from_slice(&AES_EXTRA_ID.to_le_bytes());
        e.extend_from_slice(&7u16.to_le_bytes());
        e.extend_from_slice(&2u16.to_le_bytes()); // AE-2
        e.extend_from_slice(b"AE");
        e.push(strength);
        e.extend_from_slice(&real_method.to_le_bytes());
        e
    }

    /// Build a minimal archive: local headers with entry data, a central
    /// directory, and an EOCD with the given comment.
    fn build_archive(entries: &[TestEntry], comment: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut locals = Vec::new();
        for e in entries {
            locals.push(out.len() as u32);
            out.extend_from_slice(&LOCAL_SIG.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&e.flags.to_le_bytes());
            out.extend_from_slice(&e.method.to_le_bytes());
            out.extend_from_slice(&e.mod_time.to_le_bytes());
            out.extend_from_slice(&0x58A3u16.to_le_bytes()); // mod date
            out.extend_from_slice(&e.crc32.to_le_bytes());
            out.extend_from_slice(&(e.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(e.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(e.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(e.extra.len() as u16).to_le_bytes());
            out.extend_from_slice(e.name.as_bytes());
            out.extend_from_slice(&e.extra);
            out.extend_from_slice(&e.data);
        }

        let cd_offset = out.len() as u32;
        for (e, local_offset) in entries.iter().zip(&locals) {
            out.extend_from_slice(&CD_SIG.to_le_bytes());
            out.extend_from_slice(&0x031Eu16.to_le_bytes()); // made by
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&e.flags.to_le_bytes());
            out.extend_from_slice(&e.method.to_le_bytes());
            out.extend_from_slice(&e.mod_time.to_le_bytes());
            out.extend_from_slice(&0x58A3u16.to_le_bytes());
            out.extend_from_slice(&e.crc32.to_le_bytes());
            out.extend_from_slice(&(e.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(e.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(e.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(e.extra.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // comment len
            out.extend_from_slice(&0u16.to_le_bytes()); // disk start
            out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            out.extend_from_slice(&local_offset.to_le_bytes());
            out.extend_from_slice(e.name.as_bytes());
            out.extend_from_slice(&e.extra);
        }
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(&EOCD_SIG);
        out.extend_from_slice(&0u16.to_le_bytes()); // disk
        out.extend_from_slice(&0u16.to_le_bytes()); // disk with cd
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        out.extend_from_slice(comment);
        out
    }

    fn plain(name: &'static str) -> TestEntry {
        TestEntry {
            name,
            flags: 0,
            method: 8,
            crc32: 0x1234_5678,
            mod_time: 0x6C5A,
            extra: Vec::new(),
            data: vec![0xAB; 8],
        }
    }

    #[test]
    fn classifies_mixed_archive() {
        let mut aes_data = vec![0u8; 16 + 2 + 10];
        for (i, b) in aes_data.iter_mut().enumerate() {
            *b = i as u8;
        }
        let entries = vec![
            plain("readme.txt"),
            TestEntry {
                name: "secret/",
                flags: FLAG_ENCRYPTED,
                method: 0,
                crc32: 0,
                mod_time: 0,
                extra: Vec::new(),
                data: Vec::new(),
            },
            TestEntry {
                name: "secret/pk.bin",
                flags: FLAG_ENCRYPTED,
                method: 8,
                crc32: 0xDEAD_BEEF,
                mod_time: 0x6C5A,
                extra: Vec::new(),
                data: vec![0u8; 20],
            },
            TestEntry {
                name: "secret/aes.bin",
                flags: FLAG_ENCRYPTED,
                method: METHOD_AES,
                crc32: 0,
                mod_time: 0x6C5A,
                extra: aes_extra(0x03, 8),
                data: aes_data,
            },
            TestEntry {
                name: "strong.bin",
                flags: FLAG_ENCRYPTED | FLAG_STRONG_ENCRYPTION,
                method: 8,
                crc32: 0,
                mod_time: 0,
                extra: Vec::new(),
                data: vec![0u8; 4],
            },
        ];
        let bytes = build_archive(&entries, b"backup set 7");
        let archive = parse_archive(&mut Cursor::new(&bytes)).expect("parse archive");

        assert_eq!(archive.comment, "backup set 7");
        assert_eq!(archive.cd_records, 5);
        assert!(archive.encrypted());

        assert_eq!(archive.entries[0].encryption, ZipEncryption::None);
        assert!(!archive.entries[0].encrypted());
        assert_eq!(archive.entries[0].compression_method_name(), "Deflated (8)");

        assert!(archive.entries[1].is_directory);
        assert_eq!(archive.entries[2].encryption, ZipEncryption::ZipCrypto);
        // CRC present in the central directory: high byte of CRC-32.
        assert_eq!(archive.entries[2].zipcrypto_verification_byte(), 0xDE);

        let ZipEncryption::Aes {
            strength,
            salt,
            password_verifier,
        } = &archive.entries[3].encryption
        else {
            panic!("expected AES entry, got {:?}", archive.entries[3].encryption);
        };
        assert_eq!(*strength, AesStrength::Aes256);
        assert_eq!(salt.len(), 16);
        assert_eq!(salt.as_slice(), (0u8..16).collect::<Vec<_>>().as_slice());
        assert_eq!(*password_verifier, [16, 17]);
        // AES entries report the real compression method from the extra field.
        assert_eq!(archive.entries[3].compression_method, 8);

        assert_eq!(archive.entries[4].encryption, ZipEncryption::Strong);
        assert_eq!(archive.encryption_method(), "Strong Encryption");
    }

    #[test]
    fn streaming_entry_uses_dos_time_byte() {
        let entries = vec![TestEntry {
            name: "streamed.bin",
            flags: FLAG_ENCRYPTED | FLAG_DATA_DESCRIPTOR,
            method: 8,
            crc32: 0,
            mod_time: 0x6C5A,
            extra: Vec::new(),
            data: vec![0u8; 16],
        }];
        let bytes = build_archive(&entries, b"");
        let archive = parse_archive(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(archive.entries[0].zipcrypto_verification_byte(), 0x6C);

        let desc = archive.entries[0]
            .descriptor(Path::new("/evidence/streamed.zip"))
            .expect("crackable descriptor");
        let FormatDescriptor::ZipCrypto(desc) = desc else {
            panic!("expected ZipCrypto descriptor");
        };
        assert_eq!(desc.verification_byte, 0x6C);
        assert_eq!(desc.entry_path, "streamed.bin");
    }

    #[test]
    fn rejects_zip64_sentinels() {
        let mut bytes = build_archive(&[plain("a.txt")], b"");
        // Force the central-directory offset to the Zip64 sentinel.
        let eocd = bytes.len() - 22;
        bytes[eocd + 16..eocd + 20].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        let err = parse_archive(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(
            matches!(&err, FormatError::Unsupported { feature, .. } if feature == "Zip64"),
            "got {err:?}"
        );
    }

    #[test]
    fn rejects_split_archives() {
        let mut bytes = build_archive(&[plain("a.txt")], b"");
        let eocd = bytes.len() - 22;
        // records-on-this-disk != total records
        bytes[eocd + 8..eocd + 10].copy_from_slice(&0u16.to_le_bytes());
        let err = parse_archive(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(
            matches!(&err, FormatError::Unsupported { feature, .. } if feature == "split archive"),
            "got {err:?}"
        );
    }

    #[test]
    fn missing_eocd_is_malformed() {
        let err = parse_archive(&mut Cursor::new(vec![0u8; 64])).unwrap_err();
        assert!(matches!(err, FormatError::Malformed { .. }));
        let err = parse_archive(&mut Cursor::new(b"PK".to_vec())).unwrap_err();
        assert!(matches!(err, FormatError::Malformed { .. }));
    }

    #[test]
    fn eocd_found_behind_comment() {
        let bytes = build_archive(&[plain("a.txt")], &vec![b'x'; 300]);
        let archive = parse_archive(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(archive.comment.len(), 300);
        assert_eq!(archive.entries.len(), 1);
    }

    #[test]
    fn corrupt_cd_signature_is_malformed() {
        let mut bytes = build_archive(&[plain("a.txt")], b"");
        let eocd = bytes.len() - 22;
        let cd_offset =
            u32::from_le_bytes(bytes[eocd + 16..eocd + 20].try_into().unwrap()) as usize;
        bytes[cd_offset] ^= 0xFF;
        let err = parse_archive(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(
            matches!(&err, FormatError::Malformed { context, .. }
                if *context == "central directory signature not found"),
            "got {err:?}"
        );
    }
}
