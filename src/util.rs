const HEX: &[u8; 16] = b"0123456789abcdef";

#[inline]
pub(crate) fn format_seq_hex(prefix: &str, seq: u64) -> String {
    let mut out = String::with_capacity(prefix.len() + 16);
    out.push_str(prefix);
    push_u64_hex_16(&mut out, seq);
    out
}

/// Strip the `data:` field prefix from a single-line SSE payload.
///
/// Returns `None` for comments, event lines, blank payloads and the OpenAI
/// `[DONE]` sentinel.
#[inline]
pub(crate) fn extract_sse_data_payload(data: &str) -> Option<&str> {
    let trimmed = data.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') || trimmed.starts_with("event:") {
        return None;
    }
    let payload = trimmed
        .strip_prefix("data:")
        .map_or(trimmed, str::trim_start);
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload)
}

#[inline]
pub(crate) fn push_json_string_escaped(out: &mut String, value: &str) {
    let bytes = value.as_bytes();
    if bytes.iter().all(|&b| b >= 0x20 && b != b'"' && b != b'\\') {
        out.push('"');
        out.push_str(value);
        out.push('"');
        return;
    }

    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c <= '\u{1f}' => {
                let control = c as u8;
                out.push_str("\\u00");
                out.push(char::from(HEX[(control >> 4) as usize]));
                out.push(char::from(HEX[(control & 0x0f) as usize]));
            }
            _ => out.push(ch),
        }
    }
    out.push('"');
}

#[inline]
pub(crate) fn push_u64_decimal(out: &mut String, mut n: u64) {
    if n == 0 {
        out.push('0');
        return;
    }

    let mut buf = [0u8; 20];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = b'0' + ((n % 10) as u8);
        n /= 10;
    }
    let digits = std::str::from_utf8(&buf[i..]).unwrap_or("0");
    out.push_str(digits);
}

#[inline]
pub(crate) fn push_usize_decimal(out: &mut String, n: usize) {
    push_u64_decimal(out, n as u64);
}

#[inline]
fn push_u64_hex_16(out: &mut String, mut value: u64) {
    let mut buf = [b'0'; 16];
    let mut idx = 16;
    while idx > 0 {
        idx -= 1;
        let nibble = usize::try_from(value & 0x0f).unwrap_or(0);
        buf[idx] = HEX[nibble];
        value >>= 4;
    }
    for byte in buf {
        out.push(char::from(byte));
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_sse_data_payload, format_seq_hex, push_json_string_escaped, push_u64_decimal};

    #[test]
    fn format_seq_hex_pads_to_sixteen_digits() {
        assert_eq!(format_seq_hex("msg_", 0x1234_abcd_u64), "msg_000000001234abcd");
        assert_eq!(format_seq_hex("msg_", u64::MAX), "msg_ffffffffffffffff");
    }

    #[test]
    fn push_json_string_escaped_matches_serde_json() {
        let inputs = [
            "",
            "plain ascii",
            "quote \" and slash \\",
            "line\nbreak\r\n",
            "\u{08}\u{0c}\t",
            "control \u{001f} tail",
            "emoji 😀 café",
            "<think>\nreasoning\n</think>",
        ];

        for input in inputs {
            let mut out = String::new();
            push_json_string_escaped(&mut out, input);
            let expected = serde_json::to_string(input).expect("serialize");
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn push_u64_decimal_renders_digits() {
        let mut out = String::new();
        push_u64_decimal(&mut out, 0);
        out.push(',');
        push_u64_decimal(&mut out, 1_234_567);
        assert_eq!(out, "0,1234567");
    }

    #[test]
    fn extract_sse_data_payload_skips_done_and_comments() {
        assert_eq!(extract_sse_data_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(extract_sse_data_payload("{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(extract_sse_data_payload("data: [DONE]"), None);
        assert_eq!(extract_sse_data_payload("[DONE]"), None);
        assert_eq!(extract_sse_data_payload(": keepalive"), None);
        assert_eq!(extract_sse_data_payload("   "), None);
    }
}
