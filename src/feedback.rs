// src/feedback.rs

//! Feedback URL templates.
//!
//! List responses synthesize a `feedback_url` attribute from a server
//! configured template and the `[feedback]` parameters an uploader
//! provided. Template fields are `%{key}`.

use crate::doc::Node;

/// Substitute `%{key}` fields in `template` from `params` attributes.
///
/// Returns None when the template is empty, the parameters are empty,
/// or any field has no matching parameter -- clients get an empty
/// `feedback_url` rather than a half-filled link.
pub fn format_feedback_url(template: &str, params: &Node) -> Option<String> {
    if template.is_empty() || params.attributes.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}')?;
        let key = &after[..end];

        let value = params.attr(key)?;
        if value.is_empty() {
            return None;
        }
        out.push_str(&value.to_text());
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_fields() {
        let mut params = Node::new();
        params.set_attr("topic_id", 12345i64);
        let url = format_feedback_url("https://forum.example/t%{topic_id}", &params);
        assert_eq!(url.as_deref(), Some("https://forum.example/t12345"));
    }

    #[test]
    fn test_multiple_fields() {
        let mut params = Node::new();
        params.set_attr("board", "addons");
        params.set_attr("topic_id", 7i64);
        let url = format_feedback_url("https://f.example/%{board}/%{topic_id}", &params);
        assert_eq!(url.as_deref(), Some("https://f.example/addons/7"));
    }

    #[test]
    fn test_missing_param_yields_none() {
        let mut params = Node::new();
        params.set_attr("other", "x");
        assert!(format_feedback_url("https://f.example/t%{topic_id}", &params).is_none());
    }

    #[test]
    fn test_empty_template_or_params() {
        let mut params = Node::new();
        params.set_attr("topic_id", 1i64);
        assert!(format_feedback_url("", &params).is_none());
        assert!(format_feedback_url("https://x/%{topic_id}", &Node::new()).is_none());
    }

    #[test]
    fn test_template_without_fields_passes_through() {
        let mut params = Node::new();
        params.set_attr("ignored", "x");
        let url = format_feedback_url("https://static.example/feedback", &params);
        assert_eq!(url.as_deref(), Some("https://static.example/feedback"));
    }
}
