//! Project-specific utilities live here.

use covers_http::error::FieldError;

/// Trims `value`; blank input becomes `None`.
pub fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Case-insensitive substring match. An empty needle matches everything.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Trims a required text field and checks its length in characters,
/// recording a field error when it is missing or out of bounds.
pub fn required_text(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
    missing: &str,
    errors: &mut Vec<FieldError>,
) -> String {
    let value = value.trim().to_string();
    let len = value.chars().count();
    if len == 0 {
        errors.push(FieldError::new(field, missing));
    } else if len < min || len > max {
        errors.push(FieldError::new(
            field,
            format!("must be between {min} and {max} characters"),
        ));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trimmed_drops_blank_values() {
        assert_eq!(trimmed(Some("  Dune ".to_string())), Some("Dune".to_string()));
        assert_eq!(trimmed(Some("   ".to_string())), None);
        assert_eq!(trimmed(None), None);
    }

    #[test]
    fn contains_ignore_case_matches_substrings() {
        assert!(contains_ignore_case("Frank Herbert", "herb"));
        assert!(contains_ignore_case("Frank Herbert", ""));
        assert!(!contains_ignore_case("Frank Herbert", "asimov"));
    }

    #[test]
    fn required_text_counts_characters() {
        let mut errors = Vec::new();
        let title = required_text("title", "  Été ", 1, 3, "required", &mut errors);
        assert_eq!(title, "Été");
        assert!(errors.is_empty());

        required_text("title", " ", 1, 3, "Please provide a title", &mut errors);
        required_text("author", "abcd", 1, 3, "required", &mut errors);
        assert_eq!(
            errors,
            vec![
                FieldError::new("title", "Please provide a title"),
                FieldError::new("author", "must be between 1 and 3 characters"),
            ]
        );
    }
}
