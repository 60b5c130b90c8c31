//! Compressed RTF (LZFu) decompression.
//!
//! RTF bodies are stored with a dictionary-seeded LZ77 variant: the sliding
//! window starts out holding 207 bytes of common RTF boilerplate, so short
//! documents compress to little more than back-references into the seed.

use crate::error::{MsgError, Result};

/// Magic for dictionary-compressed payloads ("LZFu").
const MAGIC_COMPRESSED: u32 = 0x75465A4C;
/// Magic for stored-as-is payloads ("MELA").
const MAGIC_UNCOMPRESSED: u32 = 0x414C454D;

const WINDOW_SIZE: usize = 4096;

/// The fixed 207-byte dictionary every window is seeded with.
const DICTIONARY: &[u8; 207] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}\
{\\f0\\fnil \\froman \\fswiss \\fmodern \\fscript \\fdecor MS Sans SerifSymbolArial\
Times New RomanCourier{\\colortbl\\red0\\green0\\blue0\r\n\\par \
\\pard\\plain\\f0\\fs20\\b\\i\\u\\tab\\tx";

/// Decompresses a PR_RTF_COMPRESSED payload. Empty input yields empty
/// output (the caller decides what an absent body means). The header
/// checksum is advisory: a mismatch is logged, never fatal.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < 16 {
        return Err(MsgError::CorruptData(
            "compressed RTF shorter than its 16-byte header".to_string(),
        ));
    }

    let comp_size = read_u32(data, 0) as usize;
    let raw_size = read_u32(data, 4) as usize;
    let magic = read_u32(data, 8);
    let checksum = read_u32(data, 12);

    // COMPSIZE counts everything after itself.
    if comp_size != data.len() - 4 {
        return Err(MsgError::CorruptData(format!(
            "compressed RTF header claims {comp_size} bytes but {} follow",
            data.len() - 4
        )));
    }

    let body = &data[16..];
    verify_checksum(body, checksum);

    match magic {
        MAGIC_UNCOMPRESSED => {
            if body.len() < raw_size {
                return Err(MsgError::CorruptData(
                    "stored RTF payload shorter than its declared size".to_string(),
                ));
            }
            Ok(body[..raw_size].to_vec())
        }
        MAGIC_COMPRESSED => decompress_lzfu(body, raw_size),
        other => Err(MsgError::CorruptData(format!(
            "unknown compressed RTF magic 0x{other:08X}"
        ))),
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// The header CRC is the common reflected CRC-32 but with zero initial
/// value and no final XOR.
const RTF_CRC: crc::Algorithm<u32> = crc::Algorithm {
    width: 32,
    poly: 0x04C1_1DB7,
    init: 0,
    refin: true,
    refout: true,
    xorout: 0,
    check: 0x2DFD_2D88,
    residue: 0,
};

fn verify_checksum(body: &[u8], expected: u32) {
    let crc = crc::Crc::<u32>::new(&RTF_CRC);
    let mut digest = crc.digest();
    digest.update(body);
    let actual = digest.finalize();
    if actual != expected {
        log::warn!(
            "compressed RTF checksum mismatch (header 0x{expected:08X}, computed 0x{actual:08X})"
        );
    }
}

fn decompress_lzfu(body: &[u8], raw_size: usize) -> Result<Vec<u8>> {
    let mut window = [0u8; WINDOW_SIZE];
    window[..DICTIONARY.len()].copy_from_slice(DICTIONARY);
    let mut write_pos = DICTIONARY.len();

    let mut output = Vec::with_capacity(raw_size);
    let mut pos = 0;

    'decode: while output.len() < raw_size {
        let control = *body.get(pos).ok_or_else(truncated)?;
        pos += 1;

        for bit in 0..8 {
            if output.len() >= raw_size {
                break;
            }
            if control >> bit & 1 == 0 {
                // Literal byte.
                let byte = *body.get(pos).ok_or_else(truncated)?;
                pos += 1;
                window[write_pos] = byte;
                write_pos = (write_pos + 1) % WINDOW_SIZE;
                output.push(byte);
            } else {
                // 12-bit window offset, 4-bit length biased by 2.
                let high = *body.get(pos).ok_or_else(truncated)?;
                let low = *body.get(pos + 1).ok_or_else(truncated)?;
                pos += 2;
                let offset = (usize::from(high) << 4) | (usize::from(low) >> 4);
                let length = usize::from(low & 0x0F) + 2;

                // A reference to the current write position ends the stream.
                if offset == write_pos {
                    break 'decode;
                }

                // Byte-by-byte forward copy: a run may overlap the bytes it
                // is producing.
                for step in 0..length {
                    if output.len() >= raw_size {
                        break;
                    }
                    let byte = window[(offset + step) % WINDOW_SIZE];
                    window[write_pos] = byte;
                    write_pos = (write_pos + 1) % WINDOW_SIZE;
                    output.push(byte);
                }
            }
        }
    }

    Ok(output)
}

fn truncated() -> MsgError {
    MsgError::CorruptData("compressed RTF payload ends mid-token".to_string())
}

/// Extracts HTML that was encapsulated into an RTF body (`\fromhtml`
/// documents). Returns `None` when the RTF does not carry HTML.
///
/// This is a deliberately small de-encapsulator: `\*\htmltag` group
/// content and untagged document text are emitted, RTF control words are
/// dropped, and `\'xx` escapes are decoded.
pub fn extract_encapsulated_html(rtf: &str) -> Option<String> {
    if !rtf.contains("\\fromhtml") {
        return None;
    }

    let bytes = rtf.as_bytes();
    let mut output = Vec::new();
    let mut pos = 0;
    // Group depths (relative to the document group) whose contents are
    // suppressed: unknown \* destinations other than \*\htmltag.
    let mut depth: i32 = 0;
    let mut skip_above: Option<i32> = None;

    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => {
                depth += 1;
                pos += 1;
                if skip_above.is_some() {
                    continue;
                }
                // Peek for destination groups.
                let rest = &rtf[pos..];
                if rest.starts_with("\\*\\htmltag") {
                    // Emit the group content; skip the control word itself.
                    pos += "\\*\\htmltag".len();
                    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                        pos += 1;
                    }
                    if pos < bytes.len() && bytes[pos] == b' ' {
                        pos += 1;
                    }
                } else if rest.starts_with("\\*") {
                    skip_above = Some(depth);
                }
            }
            b'}' => {
                if skip_above == Some(depth) {
                    skip_above = None;
                }
                depth -= 1;
                pos += 1;
            }
            b'\\' => {
                if skip_above.is_some() {
                    pos += 1;
                    continue;
                }
                if pos + 1 >= bytes.len() {
                    break;
                }
                match bytes[pos + 1] {
                    b'\'' => {
                        // \'xx hex escape.
                        if pos + 3 < bytes.len()
                            && bytes[pos + 2].is_ascii_hexdigit()
                            && bytes[pos + 3].is_ascii_hexdigit()
                        {
                            if let Ok(byte) = u8::from_str_radix(&rtf[pos + 2..pos + 4], 16) {
                                output.push(byte);
                            }
                            pos += 4;
                        } else {
                            pos += 2;
                        }
                    }
                    b'{' | b'}' | b'\\' => {
                        output.push(bytes[pos + 1]);
                        pos += 2;
                    }
                    _ => {
                        // Control word: skip letters, optional numeric
                        // parameter and one trailing space.
                        pos += 1;
                        let word_start = pos;
                        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
                            pos += 1;
                        }
                        let word = &rtf[word_start..pos];
                        if pos < bytes.len() && (bytes[pos] == b'-' || bytes[pos].is_ascii_digit())
                        {
                            pos += 1;
                            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                                pos += 1;
                            }
                        }
                        if pos < bytes.len() && bytes[pos] == b' ' {
                            pos += 1;
                        }
                        if word == "par" || word == "line" {
                            output.extend_from_slice(b"\r\n");
                        }
                    }
                }
            }
            b'\r' | b'\n' => pos += 1,
            byte => {
                if skip_above.is_none() {
                    output.push(byte);
                }
                pos += 1;
            }
        }
    }

    let html = String::from_utf8_lossy(&output).trim().to_string();
    if html.is_empty() {
        None
    } else {
        Some(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_header(magic: u32, raw_size: u32, body: &[u8]) -> Vec<u8> {
        let crc = crc::Crc::<u32>::new(&RTF_CRC);
        let mut digest = crc.digest();
        digest.update(body);
        let checksum = digest.finalize();

        let mut data = Vec::with_capacity(16 + body.len());
        data.extend_from_slice(&((body.len() as u32) + 12).to_le_bytes());
        data.extend_from_slice(&raw_size.to_le_bytes());
        data.extend_from_slice(&magic.to_le_bytes());
        data.extend_from_slice(&checksum.to_le_bytes());
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn dictionary_is_207_bytes() {
        assert_eq!(DICTIONARY.len(), 207);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(decompress(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn plain_copy_mode_returns_payload() {
        let payload = b"{\\rtf1 hello}";
        let data = with_header(MAGIC_UNCOMPRESSED, payload.len() as u32, payload);
        assert_eq!(decompress(&data).unwrap(), payload);
    }

    #[test]
    fn dictionary_only_payload_reproduces_seed() {
        // One reference token: offset 0 into the seed, length 9 -> "{\rtf1\an".
        // Control byte 0x01 marks the first token as a reference.
        let body = [0x01, 0x00, 0x07];
        let data = with_header(MAGIC_COMPRESSED, 9, &body);
        assert_eq!(decompress(&data).unwrap(), &DICTIONARY[..9]);
    }

    #[test]
    fn literal_bytes_pass_through() {
        let body = [0x00, b'a', b'b', b'c', 0x00, 0x00, 0x00, 0x00, 0x00];
        let data = with_header(MAGIC_COMPRESSED, 3, &body[..4]);
        assert_eq!(decompress(&data).unwrap(), b"abc");
    }

    #[test]
    fn overlapping_reference_extends_output() {
        // Literal 'x' then a reference starting at the literal's window
        // position (207) with length 4: classic self-overlapping copy.
        let offset = DICTIONARY.len();
        let high = (offset >> 4) as u8;
        let low = (((offset & 0x0F) << 4) | 0x02) as u8;
        let body = [0x02, b'x', high, low];
        let data = with_header(MAGIC_COMPRESSED, 5, &body);
        assert_eq!(decompress(&data).unwrap(), b"xxxxx");
    }

    #[test]
    fn decompress_is_pure() {
        let payload = b"same bytes";
        let data = with_header(MAGIC_UNCOMPRESSED, payload.len() as u32, payload);
        assert_eq!(decompress(&data).unwrap(), decompress(&data).unwrap());
    }

    #[test]
    fn checksum_mismatch_is_not_fatal() {
        let payload = b"advisory";
        let mut data = with_header(MAGIC_UNCOMPRESSED, payload.len() as u32, payload);
        data[12] ^= 0xFF;
        assert_eq!(decompress(&data).unwrap(), payload);
    }

    #[test]
    fn inconsistent_comp_size_is_corrupt() {
        let payload = b"x";
        let mut data = with_header(MAGIC_UNCOMPRESSED, 1, payload);
        data[0] = 0xFF;
        assert!(matches!(
            decompress(&data).unwrap_err(),
            MsgError::CorruptData(_)
        ));
    }

    #[test]
    fn unknown_magic_is_corrupt() {
        let data = with_header(0x1234_5678, 0, b"");
        assert!(matches!(
            decompress(&data).unwrap_err(),
            MsgError::CorruptData(_)
        ));
    }

    #[test]
    fn truncated_reference_is_corrupt() {
        let body = [0x01, 0x00];
        let data = with_header(MAGIC_COMPRESSED, 9, &body);
        assert!(matches!(
            decompress(&data).unwrap_err(),
            MsgError::CorruptData(_)
        ));
    }

    #[test]
    fn extracts_encapsulated_html() {
        let rtf = "{\\rtf1\\ansi\\fromhtml1{\\*\\htmltag2 <html>}{\\*\\htmltag50 <p>}plain text{\\*\\htmltag58 </p>}{\\*\\htmltag4 </html>}}";
        let html = extract_encapsulated_html(rtf).unwrap();
        assert!(html.contains("<html>"));
        assert!(html.contains("plain text"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn plain_rtf_has_no_html() {
        assert_eq!(extract_encapsulated_html("{\\rtf1 no markup}"), None);
    }
}
