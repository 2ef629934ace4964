//! PDF standard security handler, revision 6 (SHA-2 + AES).
//!
//! Revision 6 hashes UTF-8 passwords (no padding constant) through
//! Algorithm 2.B, an iterated AES-CBC/SHA-2 construction whose round count
//! depends on its own output, then compares against the leading 32 bytes of
//! `U` (Algorithm 11) or `O` (Algorithm 12).

use aes::Aes128;
use cbc::Encryptor;
use cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
use sha2::{Digest as _, Sha256, Sha384, Sha512};

use forge_formats::PdfAesDesc;

use crate::VerifyError;

#[derive(Debug)]
pub struct PdfAesVerifier {
    desc: PdfAesDesc,
}

impl PdfAesVerifier {
    pub fn new(desc: &PdfAesDesc) -> Self {
        PdfAesVerifier { desc: desc.clone() }
    }

    pub fn verify(&self, password: &str) -> Result<bool, VerifyError> {
        let password = password.as_bytes();
        Ok(self.verify_user(password)? || self.verify_owner(password)?)
    }

    pub fn decrypt(
        &self,
        password: &str,
        source: &std::path::Path,
        out_dir: &std::path::Path,
    ) -> Result<std::path::PathBuf, VerifyError> {
        crate::pdf_rc4::decrypt_pdf(password, source, out_dir)
    }

    /// Algorithm 11: hash over `password || U[32..40]` (the validation salt).
    fn verify_user(&self, password: &[u8]) -> Result<bool, VerifyError> {
        let u = &self.desc.user_key;
        let mut input = Vec::with_capacity(password.len() + 8);
        input.extend_from_slice(password);
        input.extend_from_slice(&u[32..40]);
        let hash = algorithm_2b(&input, password, None)?;
        Ok(hash == u[..32])
    }

    /// Algorithm 12: hash over `password || O[32..40] || U[0..48]`, with `U`
    /// also mixed into every round.
    fn verify_owner(&self, password: &[u8]) -> Result<bool, VerifyError> {
        let o = &self.desc.owner_key;
        let u = &self.desc.user_key;
        let mut input = Vec::with_capacity(password.len() + 8 + 48);
        input.extend_from_slice(password);
        input.extend_from_slice(&o[32..40]);
        input.extend_from_slice(u);
        let hash = algorithm_2b(&input, password, Some(u))?;
        Ok(hash == o[..32])
    }
}

/// Algorithm 2.B (ISO 32000-2 §7.6.4.3.4).
///
/// Starting from `K = SHA-256(input)`, each round AES-CBC-encrypts 64
/// repetitions of `password || K [|| U]` under `K`'s leading bytes, picks
/// SHA-256/384/512 by the first 16 bytes of the ciphertext mod 3, and rehashes.
/// At least 64 rounds run; afterwards the loop ends once the last ciphertext
/// byte is at most `round - 32`.
pub(crate) fn algorithm_2b(
    input: &[u8],
    password: &[u8],
    owner_u: Option<&[u8; 48]>,
) -> Result<[u8; 32], VerifyError> {
    let mut k: Vec<u8> = Sha256::digest(input).to_vec();
    let mut e: Vec<u8> = Vec::new();

    let mut round = 0usize;
    loop {
        if round >= 64 {
            // At least 64 rounds have run, so E is non-empty here.
            let last = usize::from(e.last().copied().unwrap_or(u8::MAX));
            if last <= round - 32 {
                break;
            }
        }

        let mut k0 = Vec::with_capacity(password.len() + k.len() + 48);
        k0.extend_from_slice(password);
        k0.extend_from_slice(&k);
        if let Some(u) = owner_u {
            k0.extend_from_slice(u);
        }
        let mut k1 = Vec::with_capacity(64 * k0.len());
        for _ in 0..64 {
            k1.extend_from_slice(&k0);
        }

        // `K1` is 64 whole repetitions, so it is always block-aligned.
        let len = k1.len();
        let enc = Encryptor::<Aes128>::new_from_slices(&k[..16], &k[16..32])
            .map_err(|err| VerifyError::Crypto(format!("AES-CBC init: {err}")))?;
        e = enc
            .encrypt_padded_mut::<NoPadding>(&mut k1, len)
            .map_err(|err| VerifyError::Crypto(format!("AES-CBC encrypt: {err}")))?
            .to_vec();

        // The first 16 bytes of E as a big unsigned integer, mod 3. Since
        // 256 ≡ 1 (mod 3), that is the byte sum mod 3.
        let selector: u32 = e[..16].iter().map(|&b| u32::from(b)).sum::<u32>() % 3;
        k = match selector {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };

        round += 1;
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&k[..32]);
    Ok(out)
}
