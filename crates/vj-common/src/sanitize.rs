use lol_html::{element, rewrite_str, RewriteStrSettings};
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

/// Formatting tags that survive the safe policy. Everything else is
/// unwrapped (tag dropped, content kept) or, for active content, removed
/// outright.
const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "div", "span", "strong", "b", "em", "i", "u", "ul", "ol", "li", "h1", "h2", "h3",
    "h4", "h5", "h6", "a",
];

/// Tags whose content must never reach the output.
const DROPPED_TAGS: &[&str] = &["script", "style", "iframe", "object", "embed", "noscript"];

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Policy-driven HTML sanitizer for untrusted upstream markup.
///
/// Two policies: [`clean`](Sanitizer::clean) keeps a whitelist of display
/// tags, [`clean_to_text`](Sanitizer::clean_to_text) strips everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sanitizer;

impl Sanitizer {
    pub fn new() -> Self {
        Self
    }

    /// Safe-HTML policy: whitelist of formatting tags, `href` on `a` with
    /// http/https/mailto (or relative) targets, every other attribute
    /// dropped.
    pub fn clean(&self, html: &str) -> String {
        let rewritten = rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![element!("*", |el| {
                    let tag = el.tag_name();

                    if DROPPED_TAGS.contains(&tag.as_str()) {
                        el.remove();
                        return Ok(());
                    }

                    if !ALLOWED_TAGS.contains(&tag.as_str()) {
                        el.remove_and_keep_content();
                        return Ok(());
                    }

                    let attrs: Vec<String> =
                        el.attributes().iter().map(|a| a.name()).collect();
                    for name in attrs {
                        if tag == "a" && name == "href" {
                            continue;
                        }
                        el.remove_attribute(&name);
                    }

                    if tag == "a" {
                        if let Some(href) = el.get_attribute("href") {
                            if !href_allowed(&href) {
                                el.remove_attribute("href");
                            }
                        }
                    }

                    Ok(())
                })],
                ..RewriteStrSettings::default()
            },
        );

        match rewritten {
            Ok(out) => out,
            Err(err) => {
                warn!(error = %err, "sanitizer rewrite failed, dropping content");
                String::new()
            }
        }
    }

    /// Strict policy: no tags at all. Blank runs are collapsed and the
    /// result trimmed; any stray `<` left in text is entity-escaped so the
    /// output never contains markup.
    pub fn clean_to_text(&self, html: &str) -> String {
        let rewritten = rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![element!("*", |el| {
                    if DROPPED_TAGS.contains(&el.tag_name().as_str()) {
                        el.remove();
                    } else {
                        el.remove_and_keep_content();
                    }
                    Ok(())
                })],
                ..RewriteStrSettings::default()
            },
        );

        let mut text = match rewritten {
            Ok(out) => out,
            Err(err) => {
                warn!(error = %err, "sanitizer rewrite failed, dropping content");
                String::new()
            }
        };

        text = text.replace('<', "&lt;");
        while text.contains("\n\n\n") {
            text = text.replace("\n\n\n", "\n\n");
        }
        text.trim().to_string()
    }

    /// Recursively sanitize string values and nested objects of a free-form
    /// record, leaving non-string scalars alone. Applied to `RawJob.raw_data`
    /// before normalization.
    pub fn clean_map(&self, data: &Map<String, Value>) -> Map<String, Value> {
        data.iter()
            .map(|(key, value)| (key.clone(), self.clean_value(value)))
            .collect()
    }

    fn clean_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.clean(s)),
            Value::Object(map) => Value::Object(self.clean_map(map)),
            other => other.clone(),
        }
    }
}

fn href_allowed(href: &str) -> bool {
    match Url::parse(href) {
        Ok(url) => ALLOWED_SCHEMES.contains(&url.scheme()),
        // Unparseable as absolute means relative, which is allowed.
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn safe_policy_keeps_whitelisted_markup() {
        let s = Sanitizer::new();
        let html = "<p>Mô tả <strong>công việc</strong></p><ul><li>item</li></ul>";
        assert_eq!(s.clean(html), html);
    }

    #[test]
    fn safe_policy_strips_scripts_and_unknown_attributes() {
        let s = Sanitizer::new();
        assert_eq!(s.clean("<p onclick=\"x()\">hi</p><script>evil()</script>"), "<p>hi</p>");
        assert_eq!(s.clean("<table><tr><td>cell</td></tr></table>"), "cell");
    }

    #[test]
    fn safe_policy_restricts_link_schemes() {
        let s = Sanitizer::new();
        assert_eq!(
            s.clean(r#"<a href="javascript:alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            s.clean(r#"<a href="https://vn.example/jobs" target="_blank">x</a>"#),
            r#"<a href="https://vn.example/jobs">x</a>"#
        );
        assert_eq!(
            s.clean(r#"<a href="/tuyen-dung/123">x</a>"#),
            r#"<a href="/tuyen-dung/123">x</a>"#
        );
    }

    #[test]
    fn strict_policy_never_emits_tags() {
        let s = Sanitizer::new();
        let out = s.clean_to_text("<div><p>a</p><script>bad</script>b &lt; c</div>\n\n\n\nd");
        assert!(!out.contains('<'));
        assert!(!out.contains("bad"));
        assert!(!out.contains("\n\n\n"));
        assert!(out.starts_with('a'));
    }

    #[test]
    fn clean_map_recurses_into_nested_objects() {
        let s = Sanitizer::new();
        let data = json!({
            "title": "<script>x</script>Kế toán",
            "nested": { "body": "<em>ok</em><iframe src=\"x\"></iframe>" },
            "count": 3,
        });
        let Value::Object(map) = data else { unreachable!() };

        let cleaned = s.clean_map(&map);
        assert_eq!(cleaned["title"], json!("Kế toán"));
        assert_eq!(cleaned["nested"]["body"], json!("<em>ok</em>"));
        assert_eq!(cleaned["count"], json!(3));
    }
}
