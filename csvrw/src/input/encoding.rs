use std::str::FromStr;

/// Declared text encoding of a route file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
    Utf16Le,
    Utf16Be,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Utf8
    }
}

impl FromStr for Encoding {
    type Err = String;
    fn from_str(s: &str) -> Result<Encoding, String> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" | "windows-1252" => Ok(Encoding::Latin1),
            "utf16" | "utf-16" | "utf-16le" | "utf16le" => Ok(Encoding::Utf16Le),
            "utf-16be" | "utf16be" => Ok(Encoding::Utf16Be),
            x => Err(format!("unknown encoding \"{}\"", x)),
        }
    }
}

/// Decodes file contents. A byte order mark overrides the declared encoding.
pub fn decode(bytes: &[u8], declared: Encoding) -> String {
    let (encoding, body) = match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => (Encoding::Utf8, rest),
        [0xFF, 0xFE, rest @ ..] => (Encoding::Utf16Le, rest),
        [0xFE, 0xFF, rest @ ..] => (Encoding::Utf16Be, rest),
        _ => (declared, bytes),
    };
    match encoding {
        Encoding::Utf8 => String::from_utf8_lossy(body).into_owned(),
        Encoding::Latin1 => body.iter().map(|&b| b as char).collect(),
        Encoding::Utf16Le | Encoding::Utf16Be => {
            let units: Vec<u16> = body.chunks(2)
                .filter(|c| c.len() == 2)
                .map(|c| if encoding == Encoding::Utf16Le {
                    u16::from_le_bytes([c[0], c[1]])
                } else {
                    u16::from_be_bytes([c[0], c[1]])
                })
                .collect();
            String::from_utf16_lossy(&units)
        }
    }
}

/// Splits decoded text into lines, accepting `\n`, `\r\n` and lone `\r`.
pub fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split(|c| c == '\n' || c == '\r')
        .map(|l| l.to_string())
        .collect()
}

#[test]
fn test_bom_overrides_declaration() {
    let bytes = [0xEF, 0xBB, 0xBF, b'a', 0xC3, 0xA5];
    assert_eq!(decode(&bytes, Encoding::Latin1), "aå");
}

#[test]
fn test_latin1() {
    assert_eq!(decode(&[b'b', 0xE6], Encoding::Latin1), "bæ");
}

#[test]
fn test_utf16le() {
    let bytes = [b'T', 0, b'r', 0];
    assert_eq!(decode(&bytes, Encoding::Utf16Le), "Tr");
}

#[test]
fn test_split_lines() {
    assert_eq!(split_lines("a\r\nb\rc\nd"), vec!["a", "b", "c", "d"]);
}
