//! Workout title rules.

/// A title is valid if it is non-empty and only ASCII letters, digits and spaces.
///
/// Titles double as document keys, which is why punctuation is refused.
pub fn is_valid_title(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_letters_digits_spaces() {
        assert!(is_valid_title("Leg Day 1"));
        assert!(is_valid_title("5x5"));
        assert!(is_valid_title(" "));
    }

    #[test]
    fn test_rejects_empty_and_punctuation() {
        assert!(!is_valid_title(""));
        assert!(!is_valid_title("leg-day"));
        assert!(!is_valid_title("Push/Pull"));
        assert!(!is_valid_title("Day.1"));
    }

    #[test]
    fn test_rejects_non_ascii() {
        assert!(!is_valid_title("Beintag Ü"));
        assert!(!is_valid_title("Legs\tDay"));
    }
}
