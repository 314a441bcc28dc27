//! Lenient PEM layout fallback for imported keys.
//!
//! Encoding and strict decoding go through the `rsa` crate's PKCS#8 / SPKI
//! PEM support. Keys pasted out of chat clients often arrive with the whole
//! base64 body on one line, CRLF line endings or stray blank lines, which
//! the RFC 7468 decoder rejects. This module checks the armor and rewrites
//! such text into canonical form so it can be decoded strictly:
//!
//! ```text
//! -----BEGIN PUBLIC KEY-----      ◄── label selects the role
//! MIIBIjANBgkqhkiG9w0BAQEFAAOC...  ◄── base64 DER, 64 columns, LF
//! -----END PUBLIC KEY-----
//! ```

use zeroize::Zeroizing;

use super::keys::KeyRole;
use crate::error::{Error, Result};

const BEGIN_PREFIX: &str = "-----BEGIN ";
const END_PREFIX: &str = "-----END ";
const MARKER_SUFFIX: &str = "-----";

/// Base64 columns per body line in canonical output
const LINE_WIDTH: usize = 64;

/// Check the armor of `text` and re-wrap it as canonical PEM
///
/// Fails if the markers are missing or malformed, if BEGIN and END disagree,
/// if the label does not match `expected`, or if the body holds characters
/// outside the base64 alphabet.
pub(crate) fn canonicalize(text: &str, expected: KeyRole) -> Result<Zeroizing<String>> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let begin = lines
        .next()
        .ok_or_else(|| Error::KeyFormat("empty input".into()))?;
    let begin_label = marker_label(begin, BEGIN_PREFIX)
        .ok_or_else(|| Error::KeyFormat("missing BEGIN marker".into()))?;

    let found = KeyRole::from_pem_label(begin_label)
        .ok_or_else(|| Error::KeyFormat(format!("unsupported PEM label \"{}\"", begin_label)))?;
    if found != expected {
        return Err(Error::KeyFormat(format!(
            "expected a {} key but found a {} key",
            expected, found
        )));
    }

    let mut body = Zeroizing::new(String::new());
    let mut end_label = None;
    for line in lines.by_ref() {
        if line.starts_with(END_PREFIX) {
            end_label = Some(
                marker_label(line, END_PREFIX)
                    .ok_or_else(|| Error::KeyFormat("malformed END marker".into()))?,
            );
            break;
        }
        if line.starts_with("-----") {
            return Err(Error::KeyFormat("unexpected marker inside key body".into()));
        }
        body.push_str(line);
    }

    match end_label {
        None => return Err(Error::KeyFormat("missing END marker".into())),
        Some(label) if label != begin_label => {
            return Err(Error::KeyFormat(format!(
                "END marker \"{}\" does not match BEGIN marker \"{}\"",
                label, begin_label
            )))
        }
        Some(_) => {}
    }

    if lines.next().is_some() {
        return Err(Error::KeyFormat("trailing data after END marker".into()));
    }
    if body.is_empty() {
        return Err(Error::KeyFormat("key body is empty".into()));
    }
    if !body
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
    {
        return Err(Error::KeyFormat("invalid base64 body".into()));
    }

    let label = expected.pem_label();
    let mut pem = Zeroizing::new(String::with_capacity(
        body.len() + body.len() / LINE_WIDTH + 2 * (label.len() + 16),
    ));
    pem.push_str(BEGIN_PREFIX);
    pem.push_str(label);
    pem.push_str(MARKER_SUFFIX);
    pem.push('\n');

    let mut rest = body.as_str();
    while !rest.is_empty() {
        // The body is ASCII, so any byte index is a char boundary
        let (line, tail) = rest.split_at(rest.len().min(LINE_WIDTH));
        pem.push_str(line);
        pem.push('\n');
        rest = tail;
    }

    pem.push_str(END_PREFIX);
    pem.push_str(label);
    pem.push_str(MARKER_SUFFIX);
    pem.push('\n');
    Ok(pem)
}

/// Extract `LABEL` from `-----BEGIN LABEL-----` / `-----END LABEL-----`
fn marker_label<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let label = line.strip_prefix(prefix)?.strip_suffix(MARKER_SUFFIX)?;
    if label.is_empty() || label.contains('-') {
        return None;
    }
    Some(label)
}

// ============================================================================
// TESTS
// ============================================================================
