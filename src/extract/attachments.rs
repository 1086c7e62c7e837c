//! Attachment counting over the MIME part tree.

use crate::model::part::Part;
use crate::parser::mime::MAX_DEPTH;

/// Count attachments below `part`.
///
/// Every descendant with a non-empty filename whose type is neither
/// `text/plain` nor `text/html` counts once. `part` itself is never counted.
pub fn count_attachments(part: &Part) -> usize {
    count_below(part, 0)
}

fn count_below(part: &Part, depth: usize) -> usize {
    if depth >= MAX_DEPTH {
        return 0;
    }
    part.children()
        .iter()
        .map(|child| {
            let own = usize::from(child.filename().is_some() && !child.is_body_text());
            own + count_below(child, depth + 1)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_part_counts_zero() {
        assert_eq!(count_attachments(&Part::text("text/plain", "hi")), 0);
        let named_root = Part::attachment("application/pdf", "root.pdf", b"");
        assert_eq!(count_attachments(&named_root), 0);
    }

    #[test]
    fn test_single_pdf_child() {
        let tree = Part::multipart(
            "multipart/mixed",
            vec![Part::attachment("application/pdf", "invoice.pdf", b"%PDF")],
        );
        assert_eq!(count_attachments(&tree), 1);
    }

    #[test]
    fn test_named_text_child_not_counted() {
        let tree = Part::multipart(
            "multipart/mixed",
            vec![Part::attachment("text/plain", "invoice.pdf", b"")],
        );
        assert_eq!(count_attachments(&tree), 0);
    }

    #[test]
    fn test_nested_parts_each_eligible() {
        let forwarded = Part::Composite {
            mime_type: "message/rfc822".into(),
            filename: Some("forwarded.eml".into()),
            children: vec![Part::multipart(
                "multipart/mixed",
                vec![
                    Part::text("text/plain", "inner"),
                    Part::attachment("image/jpeg", "a.jpg", b""),
                    Part::attachment("image/jpeg", "b.jpg", b""),
                ],
            )],
        };
        let tree = Part::multipart(
            "multipart/mixed",
            vec![
                Part::text("text/plain", "outer"),
                forwarded,
                Part::Leaf {
                    mime_type: "application/zip".into(),
                    filename: Some(String::new()),
                    content: Vec::new(),
                },
            ],
        );
        assert_eq!(count_attachments(&tree), 3);
    }

    #[test]
    fn test_depth_bound_terminates() {
        let mut tree = Part::attachment("application/pdf", "deep.pdf", b"");
        for _ in 0..(MAX_DEPTH * 2) {
            tree = Part::multipart("multipart/mixed", vec![tree]);
        }
        assert_eq!(count_attachments(&tree), 0);
    }
}
