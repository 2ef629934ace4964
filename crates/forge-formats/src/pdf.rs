//! PDF encryption dictionary extraction.
//!
//! An encrypted PDF cannot be fully parsed without its password, so the
//! extractor works in two steps: scan the raw bytes for `/Encrypt <num> <gen>
//! R` references, then reopen a scratch copy with those references blanked
//! out. The object model then yields the encryption dictionary (whose own
//! strings are never encrypted) without demanding a password.

use lopdf::{Dictionary, Document, Object};

use crate::{FormatDescriptor, FormatError, PdfAesDesc, PdfRc4Desc};

/// Raw fields of a standard-security-handler encryption dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfEncryption {
    pub filter: String,
    pub version: i64,
    pub revision: i64,
    pub key_length_bits: i64,
    pub owner_key: Vec<u8>,
    pub user_key: Vec<u8>,
    pub owner_encryption_key: Option<Vec<u8>>,
    pub user_encryption_key: Option<Vec<u8>>,
    pub permissions: i64,
    pub perms: Option<Vec<u8>>,
    pub crypt_filter_method: Option<String>,
    pub metadata_encrypted: bool,
    /// First element of the trailer `/ID` array; empty when absent.
    pub document_id: Vec<u8>,
}

/// Extract the encryption dictionary from raw PDF bytes.
///
/// Returns `Ok(None)` when the document carries no `/Encrypt` reference.
pub fn parse_encryption(bytes: &[u8]) -> Result<Option<PdfEncryption>, FormatError> {
    let refs = find_encrypt_refs(bytes);
    let Some(&(_, obj_num, gen_num)) = refs.last() else {
        return Ok(None);
    };

    // ISO 32000 requires every occurrence to reference the same dictionary;
    // the last one wins, matching incremental-update semantics.
    let mut stripped = bytes.to_vec();
    for &(ref span, _, _) in &refs {
        stripped[span.clone()].fill(b' ');
    }

    let doc = Document::load_mem(&stripped)?;
    let enc_obj = doc.get_object((obj_num, gen_num))?;
    let dict = resolve_dict(&doc, enc_obj)?;

    let filter = name_of(&doc, dict.get(b"Filter").ok()).unwrap_or_default();
    if filter != "Standard" {
        return Err(FormatError::Unsupported {
            format: "pdf",
            feature: format!("security handler filter {filter:?}"),
        });
    }

    let version = int_of(&doc, dict.get(b"V").ok()).unwrap_or(0);
    let revision = int_of(&doc, dict.get(b"R").ok()).ok_or(FormatError::Malformed {
        format: "pdf",
        context: "encryption dictionary has no /R",
    })?;
    let key_length_bits = int_of(&doc, dict.get(b"Length").ok()).unwrap_or(40);
    let owner_key = bytes_of(&doc, dict.get(b"O").ok()).ok_or(FormatError::Malformed {
        format: "pdf",
        context: "encryption dictionary has no /O",
    })?;
    let user_key = bytes_of(&doc, dict.get(b"U").ok()).ok_or(FormatError::Malformed {
        format: "pdf",
        context: "encryption dictionary has no /U",
    })?;
    let owner_encryption_key = bytes_of(&doc, dict.get(b"OE").ok());
    let user_encryption_key = bytes_of(&doc, dict.get(b"UE").ok());
    let permissions = int_of(&doc, dict.get(b"P").ok()).unwrap_or(0);
    let perms = bytes_of(&doc, dict.get(b"Perms").ok());
    let metadata_encrypted = bool_of(&doc, dict.get(b"EncryptMetadata").ok()).unwrap_or(true);

    let crypt_filter_method = dict
        .get(b"CF")
        .ok()
        .and_then(|o| resolve_dict(&doc, o).ok())
        .and_then(|cf| cf.get(b"StdCF").ok())
        .and_then(|o| resolve_dict(&doc, o).ok())
        .and_then(|std_cf| name_of(&doc, std_cf.get(b"CFM").ok()));

    let document_id = doc
        .trailer
        .get(b"ID")
        .ok()
        .and_then(|o| match resolve(&doc, o) {
            Object::Array(items) => items.first().and_then(|first| match resolve(&doc, first) {
                Object::String(id, _) => Some(id.clone()),
                _ => None,
            }),
            _ => None,
        })
        .unwrap_or_default();

    Ok(Some(PdfEncryption {
        filter,
        version,
        revision,
        key_length_bits,
        owner_key,
        user_key,
        owner_encryption_key,
        user_encryption_key,
        permissions,
        perms,
        crypt_filter_method,
        metadata_encrypted,
        document_id,
    }))
}

impl PdfEncryption {
    /// Build the crack-ready descriptor for this dictionary.
    ///
    /// The revision uniquely selects the verification algorithm family;
    /// revisions outside {2,3,4,6} are unsupported (metadata extraction still
    /// succeeds, only the verifier is unavailable).
    pub fn descriptor(&self) -> Result<FormatDescriptor, FormatError> {
        match self.revision {
            2..=4 => Ok(FormatDescriptor::PdfRc4(PdfRc4Desc {
                revision: self.revision as u8,
                key_length_bits: self.key_length_bits as u16,
                owner_key: fixed_key::<32>(&self.owner_key, "pdf /O is not 32 bytes")?,
                user_key: fixed_key::<32>(&self.user_key, "pdf /U is not 32 bytes")?,
                permissions: (self.permissions as i32).to_le_bytes(),
                document_id: self.document_id.clone(),
                metadata_encrypted: self.metadata_encrypted,
            })),
            6 => Ok(FormatDescriptor::PdfAes(PdfAesDesc {
                owner_key: fixed_key::<48>(&self.owner_key, "pdf /O is not 48 bytes")?,
                user_key: fixed_key::<48>(&self.user_key, "pdf /U is not 48 bytes")?,
            })),
            other => Err(FormatError::Unsupported {
                format: "pdf",
                feature: format!("encryption revision {other}"),
            }),
        }
    }
}

/// Keys in the wild are sometimes written longer than their fixed length;
/// the verification algorithms only consume the fixed prefix.
fn fixed_key<const N: usize>(key: &[u8], context: &'static str) -> Result<[u8; N], FormatError> {
    if key.len() < N {
        return Err(FormatError::Malformed {
            format: "pdf",
            context,
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&key[..N]);
    Ok(out)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Dictionary, FormatError> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(FormatError::Malformed {
            format: "pdf",
            context: "expected dictionary object",
        }),
    }
}

fn name_of(doc: &Document, obj: Option<&Object>) -> Option<String> {
    match resolve(doc, obj?) {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn int_of(doc: &Document, obj: Option<&Object>) -> Option<i64> {
    match resolve(doc, obj?) {
        Object::Integer(value) => Some(*value),
        _ => None,
    }
}

fn bool_of(doc: &Document, obj: Option<&Object>) -> Option<bool> {
    match resolve(doc, obj?) {
        Object::Boolean(value) => Some(*value),
        _ => None,
    }
}

fn bytes_of(doc: &Document, obj: Option<&Object>) -> Option<Vec<u8>> {
    match resolve(doc, obj?) {
        Object::String(bytes, _) => Some(bytes.clone()),
        _ => None,
    }
}

/// Find every `/Encrypt <num> <gen> R` occurrence: byte span plus the parsed
/// indirect object id.
fn find_encrypt_refs(bytes: &[u8]) -> Vec<(std::ops::Range<usize>, u32, u16)> {
    const NEEDLE: &[u8] = b"/Encrypt";
    let mut refs = Vec::new();
    let mut pos = 0usize;
    while let Some(idx) = find_from(bytes, NEEDLE, pos) {
        pos = idx + NEEDLE.len();
        let mut cursor = pos;
        let Some(obj_num) = scan_number(bytes, &mut cursor) else {
            continue;
        };
        let Some(gen_num) = scan_number(bytes, &mut cursor) else {
            continue;
        };
        skip_pdf_whitespace(bytes, &mut cursor);
        if bytes.get(cursor) != Some(&b'R') {
            continue;
        }
        cursor += 1;
        let (Ok(obj_num), Ok(gen_num)) = (u32::try_from(obj_num), u16::try_from(gen_num)) else {
            continue;
        };
        refs.push((idx..cursor, obj_num, gen_num));
        pos = cursor;
    }
    refs
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|idx| idx + from)
}

fn skip_pdf_whitespace(bytes: &[u8], cursor: &mut usize) {
    while matches!(bytes.get(*cursor), Some(b' ' | b'\t' | b'\r' | b'\n' | b'\0' | b'\x0C')) {
        *cursor += 1;
    }
}

fn scan_number(bytes: &[u8], cursor: &mut usize) -> Option<u64> {
    skip_pdf_whitespace(bytes, cursor);
    let start = *cursor;
    let mut value: u64 = 0;
    while let Some(c) = bytes.get(*cursor) {
        if !c.is_ascii_digit() {
            break;
        }
        value = value.checked_mul(10)?.checked_add(u64::from(c - b'0'))?;
        *cursor += 1;
    }
    (*cursor > start).then_some(value)
}
