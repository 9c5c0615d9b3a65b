//! PowerShell `-EncodedCommand` wrapping.
//!
//! The script travels as base64 of its UTF-16LE bytes, so quotes, pipes and
//! newlines reach PowerShell untouched by the cmd.exe layer underneath.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

const POWERSHELL_PREFIX: &str = "powershell -NoProfile -NonInteractive -EncodedCommand ";

/// Command line that runs `script` in PowerShell.
#[must_use]
pub fn encode_powershell(script: &str) -> String {
    let utf16: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    format!("{POWERSHELL_PREFIX}{}", BASE64.encode(utf16))
}

/// Recover the script from a line built by `encode_powershell`.
#[must_use]
pub fn decode_powershell(command_line: &str) -> Option<String> {
    let encoded = command_line.strip_prefix(POWERSHELL_PREFIX)?;
    let bytes = BASE64.decode(encoded.trim()).ok()?;
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encoding() {
        // "hi" -> 68 00 69 00
        assert_eq!(
            encode_powershell("hi"),
            "powershell -NoProfile -NonInteractive -EncodedCommand aABpAA=="
        );
    }

    #[test]
    fn test_decode_recovers_script() {
        let script = "Write-Host \"it's\"\r\n$x = 1 | % { $_ }";
        assert_eq!(decode_powershell(&encode_powershell(script)).as_deref(), Some(script));
    }

    #[test]
    fn test_decode_rejects_foreign_lines() {
        assert_eq!(decode_powershell("dir /b"), None);
        assert_eq!(
            decode_powershell("powershell -NoProfile -NonInteractive -EncodedCommand !!"),
            None
        );
    }
}
