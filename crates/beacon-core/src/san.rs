//! Subject Alternative Name construction and the username `otherName` codec.
//!
//! The username flavor binds identities of the form `user!domain` into an
//! `otherName` SAN with type-id `1.3.6.1.4.1.57264.1.7`:
//!
//! ```text
//! SEQUENCE {                              -- GeneralNames
//!   [0] {                                 -- otherName
//!     OBJECT IDENTIFIER 1.3.6.1.4.1.57264.1.7
//!     [0] EXPLICIT UTF8String "user!domain"
//!   }
//! }
//! ```
//!
//! Parsing is DER-strict: lengths must be definite and minimally encoded,
//! and nothing may trail a parsed element. The error strings emitted by
//! [`unmarshal_sans`] are a wire contract relied on by downstream
//! verifiers; do not reword them.

use der::asn1::OctetString;
use x509_cert::ext::Extension;

use crate::error::{CoreError, Result};
use crate::oid;

/// A typed SAN entry, ordered as the extractor produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanValue {
    /// rfc822Name
    Email(String),
    /// uniformResourceIdentifier
    Uri(String),
    /// dNSName
    Dns(String),
    /// otherName with the username type-id; payload is `user!domain`
    OtherName(String),
}

// GeneralName context-specific tags (RFC 5280 §4.2.1.6)
const TAG_OTHER_NAME: u8 = 0xa0;
const TAG_RFC822: u8 = 0x81;
const TAG_DNS: u8 = 0x82;
const TAG_URI: u8 = 0x86;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_OID: u8 = 0x06;
const TAG_UTF8_STRING: u8 = 0x0c;
const TAG_EXPLICIT_0: u8 = 0xa0;

/// Build the SAN extension (`2.5.29.17`) from typed entries.
pub fn marshal_sans(sans: &[SanValue], critical: bool) -> Result<Extension> {
    let mut names = Vec::new();
    for san in sans {
        match san {
            SanValue::Email(v) => write_ia5(&mut names, TAG_RFC822, v)?,
            SanValue::Uri(v) => write_ia5(&mut names, TAG_URI, v)?,
            SanValue::Dns(v) => write_ia5(&mut names, TAG_DNS, v)?,
            SanValue::OtherName(v) => write_other_name(&mut names, v),
        }
    }
    let mut value = Vec::with_capacity(names.len() + 4);
    write_tlv(&mut value, TAG_SEQUENCE, &names);

    Ok(Extension {
        extn_id: oid::SUBJECT_ALT_NAME,
        critical,
        extn_value: OctetString::new(value)?,
    })
}

/// Build the critical-by-default username SAN for a `user!domain` identity.
pub fn marshal_username_san(other_name: &str, critical: bool) -> Result<Extension> {
    marshal_sans(&[SanValue::OtherName(other_name.to_string())], critical)
}

/// Extract the single username `otherName` from a set of extensions.
///
/// Rejects anything other than exactly one well-formed otherName carrying
/// the expected type-id. Non-otherName GeneralNames are skipped.
pub fn unmarshal_sans(extensions: &[Extension]) -> Result<String> {
    let mut other_names = Vec::new();

    for ext in extensions {
        if ext.extn_id != oid::SUBJECT_ALT_NAME {
            continue;
        }
        let value = ext.extn_value.as_bytes();

        if value.is_empty() {
            return Err(bad("sequence truncated"));
        }
        if value[0] != TAG_SEQUENCE {
            return Err(bad("bad SAN sequence"));
        }
        let (content, rest) =
            read_tlv(value).map_err(|_| bad("sequence truncated"))?;
        if !rest.is_empty() {
            return Err(bad("trailing data after X.509 extension"));
        }

        // Walk the GeneralNames, keeping only otherName entries.
        let mut names = content;
        while !names.is_empty() {
            let tag = names[0];
            let (body, rest) = read_tlv(names).map_err(|_| bad("sequence truncated"))?;
            if tag == TAG_OTHER_NAME {
                other_names.push(parse_other_name(body)?);
            }
            names = rest;
        }
    }

    match other_names.len() {
        0 => Err(bad("no OtherName found")),
        1 => Ok(other_names.remove(0)),
        _ => Err(bad("expected only one OtherName")),
    }
}

/// Parse the body of an otherName GeneralName: OID then [0] EXPLICIT UTF8String.
/// Structure errors come first; the type-id is only compared once the
/// structure parsed cleanly.
fn parse_other_name(body: &[u8]) -> Result<String> {
    let parse = || -> std::result::Result<(&[u8], String), ()> {
        if body.first() != Some(&TAG_OID) {
            return Err(());
        }
        let (oid_bytes, rest) = read_tlv(body)?;

        if rest.first() != Some(&TAG_EXPLICIT_0) {
            return Err(());
        }
        let (explicit, rest) = read_tlv(rest)?;
        if !rest.is_empty() {
            return Err(());
        }

        if explicit.first() != Some(&TAG_UTF8_STRING) {
            return Err(());
        }
        let (utf8, rest) = read_tlv(explicit)?;
        if !rest.is_empty() {
            return Err(());
        }
        let s = std::str::from_utf8(utf8).map_err(|_| ())?;
        Ok((oid_bytes, s.to_string()))
    };

    let (oid_bytes, value) =
        parse().map_err(|_| bad("could not parse requested OtherName SAN"))?;

    if oid_bytes != oid::OTHERNAME_USERNAME.as_bytes() {
        return Err(bad("unexpected OID for OtherName"));
    }
    Ok(value)
}

fn bad(msg: &str) -> CoreError {
    CoreError::InvalidSan(msg.to_string())
}

fn write_ia5(out: &mut Vec<u8>, tag: u8, value: &str) -> Result<()> {
    if !value.is_ascii() {
        return Err(bad("SAN value is not IA5"));
    }
    write_tlv(out, tag, value.as_bytes());
    Ok(())
}

fn write_other_name(out: &mut Vec<u8>, value: &str) {
    let mut utf8 = Vec::with_capacity(value.len() + 2);
    write_tlv(&mut utf8, TAG_UTF8_STRING, value.as_bytes());

    let mut explicit = Vec::with_capacity(utf8.len() + 2);
    write_tlv(&mut explicit, TAG_EXPLICIT_0, &utf8);

    let mut body = Vec::new();
    write_tlv(&mut body, TAG_OID, oid::OTHERNAME_USERNAME.as_bytes());
    body.extend_from_slice(&explicit);

    write_tlv(out, TAG_OTHER_NAME, &body);
}

/// Append tag, definite minimal length, content.
fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
        out.push(0x80 | (bytes.len() - first) as u8);
        out.extend_from_slice(&bytes[first..]);
    }
    out.extend_from_slice(content);
}

/// Read one TLV off the front of `buf`, returning (content, rest).
/// Indefinite and non-minimal length forms are rejected.
fn read_tlv(buf: &[u8]) -> std::result::Result<(&[u8], &[u8]), ()> {
    if buf.len() < 2 {
        return Err(());
    }
    let first = buf[1];
    let (len, header) = if first < 0x80 {
        (first as usize, 2)
    } else if first == 0x80 {
        // indefinite length is not DER
        return Err(());
    } else {
        let n = (first & 0x7f) as usize;
        if n > 4 || buf.len() < 2 + n {
            return Err(());
        }
        let mut len = 0usize;
        for &b in &buf[2..2 + n] {
            len = (len << 8) | b as usize;
        }
        // minimal form: no leading zero octet, and the long form must
        // have been necessary at all
        if buf[2] == 0 || len < 0x80 {
            return Err(());
        }
        (len, 2 + n)
    };
    if buf.len() < header + len {
        return Err(());
    }
    Ok((&buf[header..header + len], &buf[header + len..]))
}
