//! Free-text sanitization and email shape checks

use regex::Regex;

/// Longest accepted email address
pub const MAX_EMAIL_LENGTH: usize = 255;

const ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&amp;", "&"),
    ("&quot;", "\""),
    ("&#x27;", "'"),
    ("&#x2F;", "/"),
];

/// Strips markup, script and event-handler patterns from untrusted text
///
/// Cleaning repeats until the text stops changing, so nested or
/// entity-encoded payloads cannot reassemble after one pass and
/// `sanitize(sanitize(s)) == sanitize(s)` holds.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    script: Regex,
    tag: Regex,
    javascript_scheme: Regex,
    event_handler: Regex,
    email: Regex,
}

impl Sanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            script: Regex::new(r"(?is)<script\b.*?</script\s*>")?,
            tag: Regex::new(r"<[^>]+>")?,
            javascript_scheme: Regex::new(r"(?i)javascript:")?,
            event_handler: Regex::new(r"(?i)\bon[a-z]+\s*=")?,
            email: Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")?,
        })
    }

    /// Clean `value` and cut it to at most `max_chars` characters
    pub fn sanitize(&self, value: &str, max_chars: usize) -> String {
        let mut current = value.to_string();
        loop {
            let next = self.clean_pass(&current);
            if next == current {
                break;
            }
            current = next;
        }

        match current.char_indices().nth(max_chars) {
            Some((cut, _)) => current[..cut].trim_end().to_string(),
            None => current,
        }
    }

    /// Sanitized text, or `None` when nothing is left
    pub fn sanitize_optional(&self, value: Option<&str>, max_chars: usize) -> Option<String> {
        value
            .map(|v| self.sanitize(v, max_chars))
            .filter(|v| !v.is_empty())
    }

    pub fn is_valid_email(&self, value: &str) -> bool {
        let trimmed = value.trim();
        trimmed.chars().count() <= MAX_EMAIL_LENGTH && self.email.is_match(trimmed)
    }

    fn clean_pass(&self, value: &str) -> String {
        let visible: String = value
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
            .collect();

        let text = self.script.replace_all(visible.trim(), "");
        let text = self.tag.replace_all(&text, "");
        let text = self.javascript_scheme.replace_all(&text, "");
        let text = self.event_handler.replace_all(&text, "");

        let mut decoded = text.into_owned();
        for (entity, replacement) in ENTITIES {
            if decoded.contains(entity) {
                decoded = decoded.replace(entity, replacement);
            }
        }
        decoded.trim().to_string()
    }
}

/// Whether a value is meant as an email address rather than a free-text name
pub fn looks_like_email(value: &str) -> bool {
    value.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new().unwrap()
    }

    #[rstest]
    #[case("  Av. Corrientes 1234  ", "Av. Corrientes 1234")]
    #[case("<b>Casa</b> con patio", "Casa con patio")]
    #[case("Hola<script>alert(1)</script> mundo", "Hola mundo")]
    #[case("<SCRIPT type=\"x\">\nsteal()\n</script >ok", "ok")]
    #[case("<a href=\"javascript:alert(1)\">link</a>", "link")]
    #[case("javascript:alert(1)", "alert(1)")]
    #[case("x onclick=alert(1)", "x alert(1)")]
    #[case("Tom &amp; Jerry", "Tom & Jerry")]
    #[case("&lt;img src=x onerror=alert(1)&gt;", "")]
    #[case("<scr<script>x</script>ipt>alert(1)</script>", "alert(1)")]
    #[case("line\u{0}break", "linebreak")]
    fn test_sanitize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitizer().sanitize(input, 1000), expected);
    }

    #[test]
    fn test_truncates_by_characters() {
        let s = sanitizer();
        assert_eq!(s.sanitize("ñandú ñandú", 5), "ñandú");
        assert_eq!(s.sanitize("abc def", 4), "abc");
        assert_eq!(s.sanitize("short", 100), "short");
    }

    #[test]
    fn test_sanitize_optional_drops_empty_results() {
        let s = sanitizer();
        assert_eq!(s.sanitize_optional(Some("<br>"), 10), None);
        assert_eq!(s.sanitize_optional(None, 10), None);
        assert_eq!(s.sanitize_optional(Some(" Lanús "), 10), Some("Lanús".to_string()));
    }

    #[rstest]
    #[case("asesor@inmobiliaria.com", true)]
    #[case(" Asesor@Example.com.ar ", true)]
    #[case("asesor@inmobiliaria", false)]
    #[case("ase sor@example.com", false)]
    #[case("a@b@c.com", false)]
    #[case("Juan Perez", false)]
    fn test_email_shape(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(sanitizer().is_valid_email(value), valid);
    }

    #[test]
    fn test_email_length_ceiling() {
        let local = "a".repeat(250);
        assert!(!sanitizer().is_valid_email(&format!("{}@example.com", local)));
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(input in "\\PC{0,64}", max in 1usize..80) {
            let s = sanitizer();
            let once = s.sanitize(&input, max);
            prop_assert_eq!(s.sanitize(&once, max), once);
        }

        #[test]
        fn prop_sanitize_is_idempotent_on_markup(
            input in "(<|>|&lt;|&gt;|&amp;|script|/|on[a-z]{1,5}\\s?=|javascript:|[a-z ]{1,4}){0,16}",
        ) {
            let s = sanitizer();
            let once = s.sanitize(&input, 1000);
            prop_assert_eq!(s.sanitize(&once, 1000), once);
        }
    }
}
