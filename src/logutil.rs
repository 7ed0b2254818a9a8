//! Logging helpers for untrusted schema content.
//! Names and stat keys come straight from the peer, so they are escaped before
//! they reach a log line; binary blobs are shown as a short hex prefix.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///
/// Other control characters become `\xNN`. Output is capped at 200 chars with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 200;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Lowercase hex of the first `max` bytes of `data`.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    data.iter()
        .take(max)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_log("Win\n\tthe\\game\u{1}"), "Win\\n\\tthe\\\\game\\x01");
    }

    #[test]
    fn long_names_are_capped() {
        let long = "a".repeat(500);
        let esc = escape_log(&long);
        assert!(esc.ends_with('…'));
        assert_eq!(esc.chars().count(), 201);
    }

    #[test]
    fn hex_prefix() {
        assert_eq!(hex_snippet(&[0x00, 0xab, 0x08], 2), "00ab");
        assert_eq!(hex_snippet(&[], 4), "");
    }
}
