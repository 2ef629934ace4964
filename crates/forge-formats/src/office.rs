//! Encrypted OOXML document detection.
//!
//! Password-protected OOXML files are OLE compound files wrapping an
//! `EncryptionInfo` stream and the `EncryptedPackage` payload. Parsing of the
//! `EncryptionInfo` stream itself is delegated to `forge-offcrypto`.

use std::io::{Cursor, Read};

use crate::{FormatError, OfficeDesc};

/// Detect an encrypted OOXML document.
///
/// Returns `Ok(None)` for anything that is not an OLE compound file, or is an
/// OLE file without an `EncryptionInfo` stream (a plain binary Office file).
pub fn parse_office(bytes: &[u8]) -> Result<Option<OfficeDesc>, FormatError> {
    let Ok(mut ole) = cfb::CompoundFile::open(Cursor::new(bytes)) else {
        return Ok(None);
    };
    let Ok(mut stream) = ole.open_stream("EncryptionInfo") else {
        return Ok(None);
    };
    let mut encryption_info = Vec::new();
    stream
        .read_to_end(&mut encryption_info)
        .map_err(|source| FormatError::Io {
            context: "EncryptionInfo stream",
            source,
        })?;

    let info = forge_offcrypto::parse_encryption_info(&encryption_info)?;
    Ok(Some(OfficeDesc {
        encryption_mode: info.mode_name().to_string(),
        cipher_algorithm: info.cipher_name(),
        hash_algorithm: info.hash_name().to_string(),
        info,
    }))
}

/// Read the raw `EncryptedPackage` stream for the decrypt-and-export hook.
pub fn read_encrypted_package(bytes: &[u8]) -> Result<Vec<u8>, FormatError> {
    let mut ole = cfb::CompoundFile::open(Cursor::new(bytes)).map_err(|source| FormatError::Io {
        context: "OLE compound file",
        source,
    })?;
    let mut stream = ole
        .open_stream("EncryptedPackage")
        .map_err(|source| FormatError::Io {
            context: "EncryptedPackage stream",
            source,
        })?;
    let mut out = Vec::new();
    stream.read_to_end(&mut out).map_err(|source| FormatError::Io {
        context: "EncryptedPackage stream",
        source,
    })?;
    Ok(out)
}
