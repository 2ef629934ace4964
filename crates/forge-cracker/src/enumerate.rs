//! Exhaustive password enumeration.
//!
//! Indexes every non-empty string over a charset in length-then-lex order
//! and maps indexes back to passwords, so the search space can be split into
//! contiguous per-worker ranges with no coordination. Index arithmetic is
//! `u128` with overflow checked up front: a space too large to index is
//! rejected at configuration time, not wrapped around silently.
//!
//! The mapping treats an index as a base-`B` numeral with an offset per
//! digit: `index("") = -1`, and a string `c_0..c_{n-1}` (most significant
//! first) has `index = Σ (c_k + 1) · B^(n-1-k) - 1`. Decoding peels
//! least-significant digits with `i -> i / B - 1`.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnumerationError {
    #[error("charset must not be empty")]
    EmptyCharset,
    #[error("invalid length bounds: min {min}, max {max}")]
    InvalidLengths { min: usize, max: usize },
    #[error("search space exceeds the indexable range")]
    SpaceTooLarge,
}

/// A `(charset, min_len, max_len)` password space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordSpace {
    charset: Vec<char>,
    min_len: usize,
    max_len: usize,
    /// Index of the first password of length `min_len`: the count of all
    /// strictly shorter strings (including the empty one, which the mapping
    /// itself never yields), minus one for that empty string.
    skip: u128,
    total: u128,
}

impl PasswordSpace {
    pub fn new(charset: Vec<char>, min_len: usize, max_len: usize) -> Result<Self, EnumerationError> {
        if charset.is_empty() {
            return Err(EnumerationError::EmptyCharset);
        }
        if min_len == 0 || min_len > max_len {
            return Err(EnumerationError::InvalidLengths {
                min: min_len,
                max: max_len,
            });
        }
        let base = charset.len() as u128;

        // skip = Σ_{k=0..min_len-1} B^k - 1 (count of strictly shorter
        // strings, including the empty one which the index mapping never
        // produces).
        let mut skip: u128 = 0;
        for k in 0..min_len {
            skip = skip
                .checked_add(checked_pow(base, k)?)
                .ok_or(EnumerationError::SpaceTooLarge)?;
        }
        skip -= 1;

        let mut total: u128 = 0;
        for k in min_len..=max_len {
            total = total
                .checked_add(checked_pow(base, k)?)
                .ok_or(EnumerationError::SpaceTooLarge)?;
        }

        // The decode loop evaluates indices up to skip + total - 1; make
        // sure the position one past the end is still representable.
        skip.checked_add(total).ok_or(EnumerationError::SpaceTooLarge)?;

        Ok(PasswordSpace {
            charset,
            min_len,
            max_len,
            skip,
            total,
        })
    }

    /// Index of the first password of length `min_len`.
    pub fn skip(&self) -> u128 {
        self.skip
    }

    /// Number of passwords in the space.
    pub fn total(&self) -> u128 {
        self.total
    }

    /// The half-open index interval covering exactly this space.
    pub fn index_range(&self) -> Range<u128> {
        self.skip..self.skip + self.total
    }

    /// Decode an index into its password.
    pub fn password_at(&self, index: u128) -> String {
        let base = self.charset.len() as u128;
        let mut out = String::with_capacity(self.max_len);
        let mut i = index;
        loop {
            out.push(self.charset[(i % base) as usize]);
            if i < base {
                break;
            }
            i = i / base - 1;
        }
        out.chars().rev().collect()
    }

    /// Split the index interval into `workers` contiguous ranges of
    /// ceil(total / workers) indices; the last range is clamped to the end.
    pub fn worker_ranges(&self, workers: usize) -> Vec<Range<u128>> {
        let workers = workers.max(1) as u128;
        let each = self.total.div_ceil(workers);
        let end = self.skip + self.total;
        (0..workers)
            .map(|w| {
                let start = (self.skip + w * each).min(end);
                let stop = (self.skip + (w + 1) * each).min(end);
                start..stop
            })
            .collect()
    }
}

fn checked_pow(base: u128, exp: usize) -> Result<u128, EnumerationError> {
    let exp = u32::try_from(exp).map_err(|_| EnumerationError::SpaceTooLarge)?;
    base.checked_pow(exp).ok_or(EnumerationError::SpaceTooLarge)
}
