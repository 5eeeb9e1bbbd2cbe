//! Source Text Decoding
//!
//! DTD files arrive as raw bytes (disk or HTTP body). Detects UTF-16 from the
//! byte order mark or the first markup character and decodes to a `String`.

/// Encoding of a DTD byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return TextEncoding::Utf8;
        }

        match (input[0], input[1]) {
            (0xFF, 0xFE) => TextEncoding::Utf16Le,
            (0xFE, 0xFF) => TextEncoding::Utf16Be,
            // No BOM: a DTD usually opens with '<' (declaration or comment)
            (0x00, b'<') => TextEncoding::Utf16Be,
            (b'<', 0x00) => TextEncoding::Utf16Le,
            _ => TextEncoding::Utf8,
        }
    }
}

/// Decode DTD bytes into text, stripping any byte order mark
pub fn decode(input: Vec<u8>) -> Result<String, String> {
    match TextEncoding::detect(&input) {
        TextEncoding::Utf8 => {
            let mut input = input;
            if input.starts_with(&[0xEF, 0xBB, 0xBF]) {
                input.drain(..3);
            }
            String::from_utf8(input).map_err(|e| format!("Invalid UTF-8: {}", e))
        }
        TextEncoding::Utf16Le => decode_utf16(&input, [0xFF, 0xFE], u16::from_le_bytes, "LE"),
        TextEncoding::Utf16Be => decode_utf16(&input, [0xFE, 0xFF], u16::from_be_bytes, "BE"),
    }
}

fn decode_utf16(
    input: &[u8],
    bom: [u8; 2],
    unit: fn([u8; 2]) -> u16,
    label: &str,
) -> Result<String, String> {
    let bytes = input.strip_prefix(&bom[..]).unwrap_or(input);

    if bytes.len() % 2 != 0 {
        return Err(format!("Invalid UTF-16 {}: odd number of bytes", label));
    }

    let code_units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| unit([chunk[0], chunk[1]]))
        .collect();

    String::from_utf16(&code_units).map_err(|e| format!("Invalid UTF-16 {}: {}", label, e))
}
