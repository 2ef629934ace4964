//! Minimal RC4 (KSA + PRGA) for the legacy PDF security handler.
//!
//! Kept small and self-contained rather than pulling in a cipher crate whose
//! typed key lengths fight the 5..16-byte keys revisions 2-4 actually use.

pub(crate) struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    pub(crate) fn new(key: &[u8]) -> Self {
        debug_assert!(!key.is_empty());
        let mut s = [0u8; 256];
        for (i, v) in s.iter_mut().enumerate() {
            *v = i as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256usize {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        Rc4 { s, i: 0, j: 0 }
    }

    pub(crate) fn apply_keystream(&mut self, data: &mut [u8]) {
        for b in data {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let idx = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *b ^= self.s[idx as usize];
        }
    }

    /// One-shot keystream application returning a fresh buffer; RC4 encrypt
    /// and decrypt are the same operation.
    pub(crate) fn process(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        Rc4::new(key).apply_keystream(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::Rc4;

    // Vectors from RFC 6229 (first keystream bytes, expressed as
    // encryptions of zero).
    #[test]
    fn known_keystreams() {
        let out = Rc4::process(b"Key", b"Plaintext");
        assert_eq!(out, [0xBB, 0xF3, 0x16, 0xE8, 0xD9, 0x40, 0xAF, 0x0A, 0xD3]);

        let out = Rc4::process(b"Wiki", b"pedia");
        assert_eq!(out, [0x10, 0x21, 0xBF, 0x04, 0x20]);
    }

    #[test]
    fn roundtrip() {
        let cipher = Rc4::process(&[1, 2, 3, 4, 5], b"attack at dawn");
        let plain = Rc4::process(&[1, 2, 3, 4, 5], &cipher);
        assert_eq!(plain, b"attack at dawn");
    }
}
