//! MIME part tree.
//!
//! A message body is a tree: multipart containers hold ordered children,
//! everything else is a leaf with a decoded payload.

/// A parsed message: its headers plus the root of its part tree.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub headers: super::headers::HeaderMap,
    pub root: Part,
}

/// One node of the MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// A part carrying content (text, HTML, binary attachment, ...).
    Leaf {
        /// Lowercase `type/subtype`.
        mime_type: String,
        /// Attachment filename, from `Content-Disposition` or `Content-Type` `name=`.
        filename: Option<String>,
        /// Transfer-decoded payload. Text parts are already charset-decoded to UTF-8.
        content: Vec<u8>,
    },
    /// A `multipart/*` container or an embedded `message/rfc822`.
    Composite {
        mime_type: String,
        filename: Option<String>,
        children: Vec<Part>,
    },
}

impl Part {
    /// Convenience constructor for a leaf holding UTF-8 text.
    pub fn text(mime_type: &str, content: &str) -> Self {
        Self::Leaf {
            mime_type: mime_type.to_string(),
            filename: None,
            content: content.as_bytes().to_vec(),
        }
    }

    /// Convenience constructor for a named attachment leaf.
    pub fn attachment(mime_type: &str, filename: &str, content: &[u8]) -> Self {
        Self::Leaf {
            mime_type: mime_type.to_string(),
            filename: Some(filename.to_string()),
            content: content.to_vec(),
        }
    }

    /// Convenience constructor for a container.
    pub fn multipart(mime_type: &str, children: Vec<Part>) -> Self {
        Self::Composite {
            mime_type: mime_type.to_string(),
            filename: None,
            children,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            Self::Leaf { mime_type, .. } | Self::Composite { mime_type, .. } => mime_type,
        }
    }

    /// The filename, if present and non-empty.
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Leaf { filename, .. } | Self::Composite { filename, .. } => {
                filename.as_deref().filter(|f| !f.is_empty())
            }
        }
    }

    /// Child parts; empty for leaves.
    pub fn children(&self) -> &[Part] {
        match self {
            Self::Leaf { .. } => &[],
            Self::Composite { children, .. } => children,
        }
    }

    /// `true` for `text/plain` and `text/html`, the two types treated as message text.
    pub fn is_body_text(&self) -> bool {
        matches!(self.mime_type(), "text/plain" | "text/html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filename_is_none() {
        let part = Part::Leaf {
            mime_type: "application/pdf".into(),
            filename: Some(String::new()),
            content: Vec::new(),
        };
        assert_eq!(part.filename(), None);
    }

    #[test]
    fn test_leaf_has_no_children() {
        assert!(Part::text("text/plain", "hi").children().is_empty());
        let tree = Part::multipart("multipart/mixed", vec![Part::text("text/plain", "hi")]);
        assert_eq!(tree.children().len(), 1);
        assert!(tree.children()[0].is_body_text());
    }
}
