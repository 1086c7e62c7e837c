//! Removal of quoted replies, reply attributions, signatures and known footers.

/// Lines containing any of these (case-insensitive) are dropped.
const BOILERPLATE_MARKERS: &[&str] = &[
    "virus-free. www.avast.com",
    "www.avast.com/sig-email",
];

/// Strip conversational noise from a message body.
///
/// Works line by line and never reorders lines. In order:
/// boilerplate footers, `<#...#>` card markers, `>` quotes and
/// `On ... wrote:` attributions are dropped; then everything from the first
/// line starting with `--` (the signature delimiter) onwards is cut.
///
/// A body made only of quotes and signature comes back empty.
pub fn strip_noise(body: &str) -> String {
    let kept: Vec<&str> = body
        .lines()
        .filter(|line| !is_boilerplate(line))
        .filter(|line| !(line.contains("<#") && line.contains("#>")))
        .filter(|line| !line.trim().starts_with('>'))
        .filter(|line| !is_reply_attribution(line))
        .take_while(|line| !line.trim().starts_with("--"))
        .collect();

    kept.join("\n").trim().to_string()
}

fn is_boilerplate(line: &str) -> bool {
    let lower = line.to_lowercase();
    BOILERPLATE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// `On <anything> wrote:`, matched by substring co-occurrence only.
fn is_reply_attribution(line: &str) -> bool {
    line.trim().starts_with("On ") && line.contains(" wrote:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_attribution_and_signature() {
        let body = "Hi there\n> old reply\nOn Mon, Jan 1, 2024, Alice wrote:\nSome text\n-- \nSignature block";
        assert_eq!(strip_noise(body), "Hi there\nSome text");
    }

    #[test]
    fn test_indented_quotes_dropped() {
        assert_eq!(strip_noise("keep\n   > indented quote\n>>nested"), "keep");
    }

    #[test]
    fn test_boilerplate_case_insensitive() {
        let body = "Thanks!\nVirus-free. WWW.AVAST.COM\nBye";
        assert_eq!(strip_noise(body), "Thanks!\nBye");
    }

    #[test]
    fn test_card_marker_needs_both_tokens() {
        let body = "a\n<#DAB4FAD8-2DD7-40BB-A1B8-4E2AA1F9FDF2#>\n<# only open\nb";
        assert_eq!(strip_noise(body), "a\n<# only open\nb");
    }

    #[test]
    fn test_attribution_heuristic_is_substring_based() {
        // Starts with "On " and contains " wrote:" anywhere: dropped, even mid-sentence.
        let body = "On reflection, she wrote: that is fine\nOn Monday we meet\nEnd";
        assert_eq!(strip_noise(body), "On Monday we meet\nEnd");
    }

    #[test]
    fn test_truncates_at_first_dash_line_only_after_filtering() {
        let body = "> -- quoted dashes do not truncate\nbody\n--\nsig\nmore";
        assert_eq!(strip_noise(body), "body");
    }

    #[test]
    fn test_only_noise_gives_empty() {
        assert_eq!(strip_noise("> a\n> b\nOn x, y wrote:\n"), "");
        assert_eq!(strip_noise(""), "");
    }

    #[test]
    fn test_order_preserved() {
        let body = "3\n1\n> q\n2";
        assert_eq!(strip_noise(body), "3\n1\n2");
    }
}
