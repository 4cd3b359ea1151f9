use ammonia;

/// Clean user-supplied text using the ammonia library.
///
/// Survey titles, descriptions, question text and option text come straight
/// from creators and are later rendered by respondent-facing clients.
/// Whitelist-based sanitization keeps harmless markup and strips script
/// content and event-handler attributes (Stored XSS fail-safe).
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = clean_html("Coffee<script>alert(1)</script> Survey");
        assert_eq!(cleaned, "Coffee Survey");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(clean_html("Do you drink coffee?"), "Do you drink coffee?");
    }
}
