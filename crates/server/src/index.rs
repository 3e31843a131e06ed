//! Canonical index codec
//!
//! `index.csv` holds one line per entry: `IOC,PRF_HEX,NONCE_HEX,CT_HEX`.
//! The IOC field may contain commas (URLs, arbitrary strings), so it is
//! quoted RFC-4180 style when needed: wrapped in double quotes, embedded
//! quotes doubled. The hex fields never need quoting. This file is
//! server-only; clients never see raw IOCs.

use blindfeed_protocol::{EncMeta, Prf};

use crate::error::{Result, ServerError};

/// One server-side index entry for an indicator.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IndexEntry {
    pub ioc: String,
    pub prf: Prf,
    pub enc_meta: EncMeta,
}

impl IndexEntry {
    fn encode_line(&self) -> String {
        format!(
            "{},{},{},{}",
            quote_field(&self.ioc),
            self.prf.to_hex(),
            hex::encode(self.enc_meta.nonce),
            hex::encode(&self.enc_meta.ciphertext)
        )
    }

    fn parse_line(line: &str) -> Result<Self> {
        let fields = split_csv_line(line)?;
        let [ioc, prf_hex, nonce_hex, ct_hex]: [String; 4] = fields.try_into().map_err(
            |fields: Vec<String>| {
                ServerError::CorruptState(format!(
                    "index line has {} fields, expected 4",
                    fields.len()
                ))
            },
        )?;

        let prf = Prf::from_hex(&prf_hex)?;
        let enc_meta = EncMeta::from_field(&format!("{nonce_hex}:{ct_hex}"))?;

        Ok(IndexEntry { ioc, prf, enc_meta })
    }
}

/// Serialize entries to the `index.csv` body.
pub fn encode_index(entries: &[IndexEntry]) -> String {
    let mut body = String::new();
    for entry in entries {
        body.push_str(&entry.encode_line());
        body.push('\n');
    }
    body
}

/// Parse an `index.csv` body; blank lines are skipped.
pub fn parse_index(body: &str) -> Result<Vec<IndexEntry>> {
    body.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(IndexEntry::parse_line)
        .collect()
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn split_csv_line(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push('"');
                }
                '"' => in_quotes = false,
                other => current.push(other),
            }
        } else {
            match c {
                '"' if current.is_empty() => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut current)),
                other => current.push(other),
            }
        }
    }

    if in_quotes {
        return Err(ServerError::CorruptState(format!(
            "unterminated quote in index line: {line:?}"
        )));
    }
    fields.push(current);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ioc: &str) -> IndexEntry {
        IndexEntry {
            ioc: ioc.to_string(),
            prf: Prf([0x11; 64]),
            enc_meta: EncMeta {
                nonce: [0x22; 24],
                ciphertext: vec![0x33; 24],
            },
        }
    }

    #[test]
    fn roundtrip_plain_iocs() {
        let entries = vec![entry("evil.com"), entry("1.2.3.4")];
        let body = encode_index(&entries);
        assert_eq!(parse_index(&body).unwrap(), entries);
    }

    #[test]
    fn roundtrip_iocs_with_commas_and_quotes() {
        let entries = vec![
            entry("http://evil.com/path?a=1,b=2"),
            entry(r#"say "hello",world"#),
        ];
        let body = encode_index(&entries);
        assert_eq!(parse_index(&body).unwrap(), entries);
    }

    #[test]
    fn quoting_only_when_needed() {
        let body = encode_index(&[entry("plain.example")]);
        assert!(body.starts_with("plain.example,"));
        let body = encode_index(&[entry("a,b")]);
        assert!(body.starts_with("\"a,b\","));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_index("only,three,fields\n").is_err());
        assert!(parse_index("\"unterminated,aa,bb,cc\n").is_err());
        let bad_hex = format!("ioc,{},{},zz\n", "11".repeat(64), "22".repeat(24));
        assert!(parse_index(&bad_hex).is_err());
    }
}
