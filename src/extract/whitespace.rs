//! Line-level whitespace normalization.

/// Trim every line and collapse runs of blank lines into a single one.
///
/// Idempotent, and the output never has two consecutive empty lines.
pub fn normalize_whitespace(body: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in body.lines().map(str::trim) {
        if line.is_empty() && out.last().is_some_and(|prev| prev.is_empty()) {
            continue;
        }
        out.push(line);
    }
    out.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_blank_runs() {
        let body = "  first  \n\n\n \t \nsecond\n\nthird\n\n\n";
        assert_eq!(normalize_whitespace(body), "first\n\nsecond\n\nthird");
    }

    #[test]
    fn test_crlf_and_leading_blanks() {
        assert_eq!(normalize_whitespace("\r\n\r\n  a\r\n\r\n\r\nb\r\n"), "a\n\nb");
    }

    #[test]
    fn test_idempotent_and_no_double_blank() {
        let samples = [
            "",
            "\n\n\n",
            "a",
            " a \n\n\n b ",
            "x\n \n\t\n\ny\n\n\nz",
            "\u{a0}indented\n\n\n\nline\r\n\r\n",
        ];
        for sample in samples {
            let once = normalize_whitespace(sample);
            assert_eq!(normalize_whitespace(&once), once, "not idempotent for {sample:?}");
            assert!(!once.contains("\n\n\n"), "double blank in {once:?}");
        }
    }
}
