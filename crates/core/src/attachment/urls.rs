//! Client-facing links for published attachments.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped in a single URL path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Builds `view` and `download` links from a token and filename.
#[derive(Debug, Clone)]
pub struct AttachmentUrls {
    base: String,
}

impl AttachmentUrls {
    /// Links are built beneath `base` (trailing slashes ignored).
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Inline view link.
    #[must_use]
    pub fn view(&self, token: &str, name: &str) -> String {
        self.link("view", token, name)
    }

    /// Download link.
    #[must_use]
    pub fn download(&self, token: &str, name: &str) -> String {
        self.link("download", token, name)
    }

    fn link(&self, kind: &str, token: &str, name: &str) -> String {
        format!(
            "{}/attachments/{kind}/{}/{}",
            self.base,
            utf8_percent_encode(token, SEGMENT),
            utf8_percent_encode(name, SEGMENT)
        )
    }
}
