//! Minimal HTML helpers shared by every interpreter.

use crate::error::HandlerError;

/// Escape text for inclusion in HTML content or a quoted attribute.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// The page written for a [`HandlerError`]. Only the public message appears.
#[must_use]
pub fn error_page(error: &HandlerError) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Error</title></head>\
         <body><main class=\"error\"><h1>{}</h1><p>{}</p></main></body></html>",
        error.status.as_u16(),
        escape(&error.public_message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_error_page_hides_private_message() {
        let page = error_page(&HandlerError::internal("db password wrong"));
        assert!(page.contains("Something went wrong."));
        assert!(!page.contains("password"));
    }
}
