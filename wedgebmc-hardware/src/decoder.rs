//! Response decoder
//!
//! Pulls a typed value out of a raw shell transcript. The transcript holds
//! the echoed command, its output and the trailing prompt; only the text
//! after the last echo of the command is considered.

/// Return the first integer in base `base` that follows the last occurrence
/// of `echoed` in `transcript`.
///
/// Tokens are whitespace-delimited. A leading sign is accepted, and in base
/// 16 so is a `0x` prefix, matching what `i2cget` prints.
///
/// ```
/// use wedgebmc_hardware::decoder::extract_int;
///
/// let transcript = "cat /x\n1000\nroot@h:~# ";
/// assert_eq!(extract_int(transcript, "cat /x", 10), Some(1000));
/// ```
pub fn extract_int(transcript: &str, echoed: &str, base: u32) -> Option<i64> {
    if echoed.is_empty() {
        return None;
    }
    let start = transcript.rfind(echoed)? + echoed.len();

    transcript[start..]
        .split_whitespace()
        .find_map(|token| parse_token(token, base))
}

/// Parse one token as a signed integer in `base`
pub fn parse_token(token: &str, base: u32) -> Option<i64> {
    if !(2..=36).contains(&base) {
        return None;
    }

    let (negative, digits) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };
    let digits = if base == 16 {
        digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits)
    } else {
        digits
    };
    // from_str_radix would accept a second sign here
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(base)) {
        return None;
    }

    let magnitude = i64::from_str_radix(digits, base).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Map console bytes to text one byte per character (ISO-8859-1)
///
/// Never fails, so a transcript with line noise still decodes.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_decimal_from_file_read() {
        let transcript = "cat /x\n1000\nroot@h:~# ";
        assert_eq!(extract_int(transcript, "cat /x", 10), Some(1000));
    }

    #[test]
    fn test_missing_echo_is_none() {
        assert_eq!(extract_int("1000\nroot@h:~# ", "cat /x", 10), None);
    }

    #[test]
    fn test_no_numeric_token_is_none() {
        let transcript = "cat /x\ncat: can't open '/x': No such file or directory\nroot@h:~# ";
        assert_eq!(extract_int(transcript, "cat /x", 10), None);
    }

    #[test]
    fn test_uses_last_echo() {
        // A stale echo with a different value precedes the real one
        let transcript = "cat /x\r\n1\r\nroot@h:~# cat /x\r\n2500\r\nroot@h:~# ";
        assert_eq!(extract_int(transcript, "cat /x", 10), Some(2500));
    }

    #[test]
    fn test_hex_register_values() {
        let cmd = "i2cget -f -y 7 0x5a 0x96 w";
        let transcript = format!("{}\r\n0x0078\r\nroot@bmc:~# ", cmd);
        assert_eq!(extract_int(&transcript, cmd, 16), Some(0x78));

        let cmd = "i2cget -f -y 1 0x32 0x10";
        let transcript = format!("{}\r\nff\r\nroot@bmc:~# ", cmd);
        assert_eq!(extract_int(&transcript, cmd, 16), Some(0xff));
    }

    #[test]
    fn test_skips_unparseable_tokens() {
        let transcript = "cat /t\r\nvalue: 23750\r\nroot@h:~# ";
        assert_eq!(extract_int(transcript, "cat /t", 10), Some(23750));
    }

    #[test]
    fn test_parse_token() {
        assert_eq!(parse_token("-12", 10), Some(-12));
        assert_eq!(parse_token("+7", 10), Some(7));
        assert_eq!(parse_token("0x1F", 16), Some(31));
        assert_eq!(parse_token("0X1f", 16), Some(31));
        assert_eq!(parse_token("0x10", 10), None);
        assert_eq!(parse_token("--1", 10), None);
        assert_eq!(parse_token("-", 10), None);
        assert_eq!(parse_token("0x", 16), None);
        assert_eq!(parse_token("12", 1), None);
    }

    #[test]
    fn test_latin1_is_lossless() {
        assert_eq!(latin1(b"ok\xb0C"), "ok\u{b0}C");
        assert_eq!(latin1(&[0xff]).chars().count(), 1);
    }
}
