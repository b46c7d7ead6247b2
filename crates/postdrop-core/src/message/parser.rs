//! Raw message structure parser
//!
//! Splits an accepted raw message into ordered headers and a flat list of
//! content parts. Multipart containers are expanded recursively and never
//! appear as leaves; malformed parts are dropped rather than failing the
//! whole message. Transfer-encoding decoding is a separate operation that
//! callers apply on demand.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use regex::Regex;

/// Header name/value pair, in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    pub name: String,
    pub value: String,
}

/// Leaf content part of a parsed message
#[derive(Debug, Clone, PartialEq)]
pub struct ContentPart {
    /// Effective content type, `text/plain` when the part declares none
    pub content_type: String,

    /// Headers retained for this part
    pub headers: Vec<ParsedHeader>,

    /// Part body, still in its transfer encoding
    pub body: String,

    /// `Content-Transfer-Encoding` value, if declared
    pub transfer_encoding: Option<String>,

    /// `Content-Disposition` value, if declared
    pub disposition: Option<String>,
}

impl ContentPart {
    fn from_headers(headers: Vec<ParsedHeader>, body: String) -> Self {
        let content_type = header_value(&headers, "Content-Type")
            .unwrap_or("text/plain")
            .to_string();
        let transfer_encoding =
            header_value(&headers, "Content-Transfer-Encoding").map(str::to_string);
        let disposition = header_value(&headers, "Content-Disposition").map(str::to_string);
        Self {
            content_type,
            headers,
            body,
            transfer_encoding,
            disposition,
        }
    }

    /// First header matching `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Body with this part's transfer encoding applied
    pub fn decoded_body(&self) -> String {
        match &self.transfer_encoding {
            Some(encoding) => decode_body(&self.body, encoding),
            None => self.body.clone(),
        }
    }
}

/// Parsed message: top-level headers plus leaf parts in depth-first order
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMail {
    pub headers: Vec<ParsedHeader>,
    pub parts: Vec<ContentPart>,
}

impl ParsedMail {
    /// First top-level header matching `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// Header names carried over onto a single-part message's only part
const CONTENT_HEADERS: [&str; 6] = [
    "Content-Type",
    "Content-Transfer-Encoding",
    "Content-Disposition",
    "Content-ID",
    "Content-Description",
    "Content-Location",
];

/// Structure parser for raw messages
pub struct MailParser {
    dot_stuffed: Regex,
    blank_line: Regex,
    header_shape: Regex,
    header_line: Regex,
    boundary_param: Regex,
}

impl Default for MailParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MailParser {
    pub fn new() -> Self {
        Self {
            dot_stuffed: Regex::new(r"(?m)^\.\.(.)").unwrap(),
            blank_line: Regex::new(r"\r?\n\r?\n").unwrap(),
            header_shape: Regex::new(r"^[A-Za-z0-9-]+:").unwrap(),
            header_line: Regex::new(r"^([A-Za-z0-9-]+):\s*(.*)$").unwrap(),
            boundary_param: Regex::new(r#"(?i)boundary=["']?([^"';,\s]+)["']?"#).unwrap(),
        }
    }

    /// Parse a raw message into headers and leaf content parts
    pub fn parse(&self, raw: &str) -> ParsedMail {
        // Defensive: transport normally un-stuffs, but raw data handed in
        // directly may still carry doubled dots.
        let raw = self.dot_stuffed.replace_all(raw, ".${1}");

        let (header_block, body) = self.split_message(&raw);
        let headers = self.parse_headers(header_block);

        let mut parts = Vec::new();
        self.collect_parts(&headers, body, true, &mut parts);

        ParsedMail { headers, parts }
    }

    /// Split at the first blank line; without one, fall back to the first
    /// line that is not header-shaped.
    fn split_message<'a>(&self, raw: &'a str) -> (&'a str, &'a str) {
        if let Some(separator) = self.blank_line.find(raw) {
            return (&raw[..separator.start()], &raw[separator.end()..]);
        }

        let mut offset = 0;
        for line in raw.split_inclusive('\n') {
            let content = line.trim_end_matches(['\r', '\n']);
            if !self.header_shape.is_match(content) {
                return (&raw[..offset], raw[offset..].trim_start());
            }
            offset += line.len();
        }
        (raw, "")
    }

    /// Strict header/body split for a multipart part; parts without a blank
    /// line are malformed and dropped by the caller.
    fn split_part<'a>(&self, raw: &'a str) -> Option<(&'a str, &'a str)> {
        let separator = self.blank_line.find(raw)?;
        Some((&raw[..separator.start()], &raw[separator.end()..]))
    }

    fn parse_headers(&self, block: &str) -> Vec<ParsedHeader> {
        let mut headers: Vec<ParsedHeader> = Vec::new();
        for line in block.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                // Folding continuation belongs to the previous header.
                if let Some(last) = headers.last_mut() {
                    last.value.push(' ');
                    last.value.push_str(line.trim());
                }
                continue;
            }
            if let Some(caps) = self.header_line.captures(line) {
                headers.push(ParsedHeader {
                    name: caps[1].to_string(),
                    value: caps[2].trim_end().to_string(),
                });
            }
        }
        headers
    }

    fn collect_parts(
        &self,
        headers: &[ParsedHeader],
        body: &str,
        top_level: bool,
        out: &mut Vec<ContentPart>,
    ) {
        let content_type = header_value(headers, "Content-Type").unwrap_or("text/plain");

        if content_type.to_lowercase().contains("multipart") {
            if let Some(boundary) = self
                .boundary_param
                .captures(content_type)
                .map(|caps| caps[1].to_string())
            {
                let pattern = format!(r"--{}(?:--)?(?:\r?\n|$)", regex::escape(&boundary));
                if let Ok(delimiter) = Regex::new(&pattern) {
                    for segment in delimiter.split(body) {
                        let segment = segment.trim();
                        if segment.is_empty() {
                            continue;
                        }
                        let Some((head, rest)) = self.split_part(segment) else {
                            continue;
                        };
                        let part_headers = self.parse_headers(head);
                        self.collect_parts(&part_headers, rest, false, out);
                    }
                    return;
                }
            }
        }

        // Leaf. A single-part message keeps only the content-relevant
        // headers on its part; nested leaves keep everything of their own.
        let kept = if top_level {
            headers
                .iter()
                .filter(|h| CONTENT_HEADERS.iter().any(|c| h.name.eq_ignore_ascii_case(c)))
                .cloned()
                .collect()
        } else {
            headers.to_vec()
        };
        out.push(ContentPart::from_headers(kept, body.to_string()));
    }
}

fn header_value<'a>(headers: &'a [ParsedHeader], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Decode a part body according to its transfer encoding
///
/// `base64` and `quoted-printable` are decoded; any other encoding is
/// passed through untouched. Undecodable input is returned as-is.
pub fn decode_body(body: &str, encoding: &str) -> String {
    match encoding.trim().to_lowercase().as_str() {
        "base64" => {
            let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
            match BASE64.decode(compact.as_bytes()) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => body.to_string(),
            }
        }
        "quoted-printable" => decode_quoted_printable(body),
        _ => body.to_string(),
    }
}

fn decode_quoted_printable(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        // Soft line break: "=" at end of line disappears.
        if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') {
            i += 3;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        match (hex_value(bytes.get(i + 1)), hex_value(bytes.get(i + 2))) {
            (Some(hi), Some(lo)) => {
                out.push(hi << 4 | lo);
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: Option<&u8>) -> Option<u8> {
    byte.and_then(|b| (*b as char).to_digit(16)).map(|v| v as u8)
}
