//! Response body normalization.
//!
//! Undoes the `Content-Encoding` of a suggest response and transcodes it to
//! UTF-8. The charset is chosen by [`sniff_encoding`], a pure function with a
//! fixed priority:
//!
//! 1. Byte order mark
//! 2. `charset` parameter of the `Content-Type` header
//! 3. `<meta>` or `<?xml?>` declaration in the first 1024 bytes
//! 4. Guess: UTF-8 if the bytes are valid UTF-8, windows-1252 otherwise
//! 5. UTF-8 for an empty body
//!
//! Labels are resolved with the WHATWG Encoding Standard, so `latin1` and
//! `iso-8859-1` both select windows-1252. Bytes that are malformed in the
//! chosen encoding become U+FFFD.

use std::borrow::Cow;
use std::io::Read;
use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use regex::bytes::Regex;
use suggestio_core::Error;

/// Number of leading bytes searched for a markup charset declaration.
const PRESCAN_BYTES: usize = 1024;

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)<meta\b[^>]*?charset\s*=\s*["']?\s*([a-z0-9_:.+-]+)"#).expect("valid meta charset regex")
});

static XML_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i-u)<\?xml\b[^>]*?encoding\s*=\s*["']([a-z0-9_:.+-]+)["']"#).expect("valid xml encoding regex")
});

/// Where the chosen encoding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    Bom,
    Declared,
    Meta,
    Guess,
    Default,
}

/// Outcome of charset sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub encoding: &'static Encoding,
    pub source: EncodingSource,
}

/// Decompress and transcode a response body to UTF-8.
///
/// `max_bytes` bounds every decompressed stage of the body.
///
/// # Errors
///
/// Returns `Error::Decode` if the body cannot be decompressed and
/// `Error::FetchTooLarge` if it decompresses past `max_bytes`.
pub fn normalize(
    raw: &[u8], content_encoding: Option<&str>, content_type: Option<&str>, max_bytes: usize,
) -> Result<Vec<u8>, Error> {
    let body = decompress(raw, content_encoding, max_bytes)?;
    let sniffed = sniff_encoding(&body, content_type);
    tracing::debug!(encoding = sniffed.encoding.name(), source = ?sniffed.source, "response charset");
    Ok(transcode(&body, sniffed.encoding))
}

/// Undo every coding listed in `content_encoding`, last applied first.
pub fn decompress<'a>(
    raw: &'a [u8], content_encoding: Option<&str>, max_bytes: usize,
) -> Result<Cow<'a, [u8]>, Error> {
    let Some(header) = content_encoding else {
        return Ok(Cow::Borrowed(raw));
    };

    let mut body = Cow::Borrowed(raw);
    for coding in header.rsplit(',').map(|c| c.trim().to_ascii_lowercase()) {
        body = match coding.as_str() {
            "" | "identity" => body,
            "gzip" | "x-gzip" => Cow::Owned(gunzip(&body, max_bytes)?),
            "deflate" => Cow::Owned(inflate(&body, max_bytes)?),
            other => {
                tracing::warn!(coding = other, "unsupported content encoding, using body as is");
                body
            }
        };
    }
    Ok(body)
}

/// Reads every gzip member, not just the first.
fn gunzip(bytes: &[u8], max_bytes: usize) -> Result<Vec<u8>, Error> {
    read_capped(MultiGzDecoder::new(bytes), "gzip", max_bytes)
}

/// `deflate` should be a zlib stream, but some servers send raw deflate.
fn inflate(bytes: &[u8], max_bytes: usize) -> Result<Vec<u8>, Error> {
    match read_capped(ZlibDecoder::new(bytes), "deflate", max_bytes) {
        Err(Error::Decode(_)) => read_capped(DeflateDecoder::new(bytes), "deflate", max_bytes),
        result => result,
    }
}

fn read_capped(decoder: impl Read, coding: &str, max_bytes: usize) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    decoder
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decode(format!("failed to read {coding} body: {e}")))?;

    if out.len() > max_bytes {
        return Err(Error::FetchTooLarge(format!("{coding} body expands past {max_bytes} bytes")));
    }
    Ok(out)
}

/// Choose the encoding of `bytes` given the `Content-Type` header.
pub fn sniff_encoding(bytes: &[u8], content_type: Option<&str>) -> Sniffed {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return Sniffed { encoding, source: EncodingSource::Bom };
    }

    if let Some(encoding) = content_type.and_then(declared_charset).and_then(|l| Encoding::for_label(l.as_bytes())) {
        return Sniffed { encoding, source: EncodingSource::Declared };
    }

    if let Some(encoding) = prescan(&bytes[..bytes.len().min(PRESCAN_BYTES)]) {
        return Sniffed { encoding, source: EncodingSource::Meta };
    }

    if bytes.is_empty() {
        return Sniffed { encoding: UTF_8, source: EncodingSource::Default };
    }

    let encoding = if std::str::from_utf8(bytes).is_ok() { UTF_8 } else { WINDOWS_1252 };
    Sniffed { encoding, source: EncodingSource::Guess }
}

/// `charset` parameter of a `Content-Type` value, unquoted.
pub fn declared_charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        (!value.is_empty()).then_some(value)
    })
}

/// Charset declared by markup near the start of the body.
///
/// A markup declaration of UTF-16 cannot be true for bytes that were just
/// read as ASCII, so it means UTF-8.
fn prescan(head: &[u8]) -> Option<&'static Encoding> {
    let label = META_CHARSET
        .captures(head)
        .or_else(|| XML_ENCODING.captures(head))
        .and_then(|caps| caps.get(1))?;

    let encoding = Encoding::for_label(label.as_bytes())?;
    if encoding == UTF_16LE || encoding == UTF_16BE { Some(UTF_8) } else { Some(encoding) }
}

/// Transcode `bytes` from `encoding` to UTF-8, dropping a matching BOM.
///
/// Malformed sequences are replaced with U+FFFD and logged.
pub fn transcode(bytes: &[u8], encoding: &'static Encoding) -> Vec<u8> {
    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &bytes[bom_len..],
        _ => bytes,
    };

    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        tracing::warn!(encoding = encoding.name(), "malformed bytes in response body replaced");
    }
    text.into_owned().into_bytes()
}
