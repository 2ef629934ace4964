//! PDF standard security handler, revisions 2-4 (ISO 32000-1, MD5 + RC4).
//!
//! A candidate is accepted when it validates as the user password
//! (Algorithms 2, 4/5, 6) or as the owner password (Algorithms 3 and 7,
//! which recover a user-password candidate and re-run the user check).

use md5::{Digest as _, Md5};

use forge_formats::PdfRc4Desc;

use crate::rc4::Rc4;

/// Fixed 32-byte password pad of the standard security handler; every short
/// password is extended with the leading bytes of this constant.
const PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

#[derive(Debug)]
pub struct PdfRc4Verifier {
    desc: PdfRc4Desc,
}

impl PdfRc4Verifier {
    pub fn new(desc: &PdfRc4Desc) -> Self {
        PdfRc4Verifier { desc: desc.clone() }
    }

    /// Wrong passwords are simply `false`; the MD5/RC4 pipeline cannot fail.
    pub fn verify(&self, password: &str) -> bool {
        let padded = pad_password(password);
        self.verify_user(&padded) || self.verify_owner(&padded)
    }

    pub fn decrypt(
        &self,
        password: &str,
        source: &std::path::Path,
        out_dir: &std::path::Path,
    ) -> Result<std::path::PathBuf, crate::VerifyError> {
        decrypt_pdf(password, source, out_dir)
    }

    /// Key length in bytes: 5 for revision 2, `Length / 8` otherwise.
    fn key_len(&self) -> usize {
        if self.desc.revision == 2 {
            5
        } else {
            (self.desc.key_length_bits / 8) as usize
        }
    }

    /// Algorithm 2: derive the file encryption key from a padded password.
    fn file_key(&self, padded: &[u8; 32]) -> Vec<u8> {
        let d = &self.desc;
        let mut md5 = Md5::new();
        md5.update(padded);
        md5.update(d.owner_key);
        md5.update(d.permissions);
        md5.update(&d.document_id);
        if d.revision >= 4 && !d.metadata_encrypted {
            md5.update([0xFF, 0xFF, 0xFF, 0xFF]);
        }
        let mut digest: [u8; 16] = md5.finalize().into();

        let n = self.key_len();
        if d.revision >= 3 {
            // Fifty rounds over the leading n bytes of the previous digest.
            for _ in 0..50 {
                digest = Md5::digest(&digest[..n]).into();
            }
        }
        digest[..n].to_vec()
    }

    /// Algorithms 4/5 + 6: recompute U from the padded password and compare.
    fn verify_user(&self, padded: &[u8; 32]) -> bool {
        let d = &self.desc;
        let key = self.file_key(padded);

        if d.revision == 2 {
            // Algorithm 4: U = RC4(key, pad), compared in full.
            let computed = Rc4::process(&key, &PAD);
            return computed[..] == d.user_key[..];
        }

        // Algorithm 5: MD5(pad || ID), RC4 with the file key, then 19 rounds
        // with the key bytes XORed by the round index. Only the first 16
        // bytes of U are meaningful; the rest is arbitrary padding.
        let mut md5 = Md5::new();
        md5.update(PAD);
        md5.update(&d.document_id);
        let mut computed = Rc4::process(&key, &md5.finalize());
        let mut round_key = vec![0u8; key.len()];
        for i in 1..=19u8 {
            for (rk, kb) in round_key.iter_mut().zip(&key) {
                *rk = kb ^ i;
            }
            computed = Rc4::process(&round_key, &computed);
        }
        computed[..16] == d.user_key[..16]
    }

    /// Algorithms 3 + 7: decrypt O with the owner key to recover the user
    /// password bytes, then run the user check on them.
    fn verify_owner(&self, padded: &[u8; 32]) -> bool {
        let d = &self.desc;

        let mut digest: [u8; 16] = Md5::digest(padded).into();
        if d.revision >= 3 {
            for _ in 0..50 {
                digest = Md5::digest(digest).into();
            }
        }
        let key = &digest[..self.key_len()];

        let user_password = if d.revision == 2 {
            Rc4::process(key, &d.owner_key)
        } else {
            // 20 RC4 rounds with descending XOR index, starting from O.
            let mut data = d.owner_key.to_vec();
            let mut round_key = vec![0u8; key.len()];
            for i in (0..=19u8).rev() {
                for (rk, kb) in round_key.iter_mut().zip(key) {
                    *rk = kb ^ i;
                }
                data = Rc4::process(&round_key, &data);
            }
            data
        };

        let mut recovered = [0u8; 32];
        let n = user_password.len().min(32);
        recovered[..n].copy_from_slice(&user_password[..n]);
        self.verify_user(&recovered)
    }
}

/// Truncate to 32 bytes, mapping non-ASCII characters to `?`, and pad with
/// the standard constant.
fn pad_password(password: &str) -> [u8; 32] {
    let mut out = PAD;
    let bytes: Vec<u8> = password
        .chars()
        .take(32)
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect();
    let n = bytes.len().min(32);
    out[..n].copy_from_slice(&bytes[..n]);
    if n < 32 {
        out[n..].copy_from_slice(&PAD[..32 - n]);
    }
    out
}

/// Shared decrypt-and-export: reopen with the found password, strip the
/// encryption, save the plaintext document.
pub(crate) fn decrypt_pdf(
    password: &str,
    source: &std::path::Path,
    out_dir: &std::path::Path,
) -> Result<std::path::PathBuf, crate::VerifyError> {
    let mut doc = lopdf::Document::load(source)?;
    doc.decrypt(password)?;

    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "decrypted.pdf".to_string());
    let out_path = out_dir.join(file_name);
    std::fs::create_dir_all(out_dir).map_err(|source| crate::VerifyError::Io {
        context: "export directory",
        source,
    })?;
    doc.save(&out_path)
        .map_err(|err| crate::VerifyError::Crypto(format!("failed to save decrypted pdf: {err}")))?;
    Ok(out_path)
}
