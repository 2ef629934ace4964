//! WinZip AES (AE-1/AE-2) password verification.
//!
//! The entry data starts with a salt and a 2-byte password verification
//! value; PBKDF2-HMAC-SHA1 at 1000 iterations derives `2 * key_len + 2`
//! bytes, and the trailing 2 bytes must equal the stored value. That rejects
//! all but 1 in 65536 wrong passwords; survivors go through the library
//! extraction check, which also validates the authentication code.

use std::path::{Path, PathBuf};

use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use zeroize::Zeroizing;

use forge_formats::ZipAesDesc;

use crate::zip_extract::{confirm_by_extraction, extract_entry};
use crate::VerifyError;

const PBKDF2_ITERATIONS: u32 = 1000;

#[derive(Debug)]
pub struct ZipAesVerifier {
    archive_path: PathBuf,
    entry_path: String,
    scratch_dir: PathBuf,
    key_bits: u32,
    salt: Vec<u8>,
    password_verifier: [u8; 2],
}

impl ZipAesVerifier {
    pub fn new(desc: &ZipAesDesc, scratch_dir: &Path) -> Self {
        ZipAesVerifier {
            archive_path: desc.archive_path.clone(),
            entry_path: desc.entry_path.clone(),
            scratch_dir: scratch_dir.to_path_buf(),
            key_bits: desc.strength.key_bits(),
            salt: desc.salt.clone(),
            password_verifier: desc.password_verifier,
        }
    }

    pub fn verify(&self, password: &str) -> Result<bool, VerifyError> {
        // The WinZip AES format caps passwords at 128 bytes; anything longer
        // can never have produced this entry.
        if password.len() > 128 {
            return Ok(false);
        }

        let key_len = (self.key_bits / 8) as usize;
        let derived_len = 2 * key_len + 2;
        let mut derived = Zeroizing::new(vec![0u8; derived_len]);
        pbkdf2_hmac::<Sha1>(
            password.as_bytes(),
            &self.salt,
            PBKDF2_ITERATIONS,
            &mut derived,
        );

        if derived[derived_len - 2..] != self.password_verifier {
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
