//! Hex rendering of byte strings for log output

/// Render bytes as lowercase hex, optionally `:`-delimited (`c0:00:41`)
pub fn hexrep(data: &[u8], delimit: bool) -> String {
    let delimiter = if delimit { ":" } else { "" };
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(delimiter)
}

/// Render bytes as compact hex in angle brackets (`<c00041>`)
pub fn pretty_hexrep(data: &[u8]) -> String {
    format!("<{}>", hexrep(data, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hexrep() {
        assert_eq!(hexrep(&[0xC0, 0x00, 0x41], true), "c0:00:41");
        assert_eq!(hexrep(&[0xC0, 0x00, 0x41], false), "c00041");
        assert_eq!(hexrep(&[], true), "");
    }

    #[test]
    fn test_pretty_hexrep() {
        assert_eq!(pretty_hexrep(&[0xDB, 0xDD]), "<dbdd>");
        assert_eq!(pretty_hexrep(&[]), "<>");
    }
}
