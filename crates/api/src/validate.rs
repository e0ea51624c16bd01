use model::question::MAX_QUESTION_LENGTH;

/// Rooms are addressed by a short code or by a much longer backend id.
/// Anything shorter than this is taken to be a code.
pub const ROOM_CODE_MAX_LENGTH: usize = 20;

/// Trims a question and checks that it is non-empty and at most
/// [`MAX_QUESTION_LENGTH`] characters. Returns the text to submit.
pub fn question_text(text: &str) -> Option<&str> {
    let text = text.trim();
    let length = text.chars().count();
    (1..=MAX_QUESTION_LENGTH).contains(&length).then_some(text)
}

pub fn is_room_code(id_or_code: &str) -> bool {
    id_or_code.len() < ROOM_CODE_MAX_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_questions() {
        assert_eq!(question_text(""), None);
        assert_eq!(question_text("   \n\t"), None);
    }

    #[test]
    fn trims_accepted_questions() {
        assert_eq!(question_text("  Why is the sky blue?  "), Some("Why is the sky blue?"));
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let exact = "é".repeat(MAX_QUESTION_LENGTH);
        assert!(question_text(&exact).is_some());
        let over = "a".repeat(MAX_QUESTION_LENGTH + 1);
        assert_eq!(question_text(&over), None);
    }

    #[test]
    fn distinguishes_codes_from_ids() {
        assert!(is_room_code("XK42QZ"));
        assert!(!is_room_code("65f1aa00bc12de34ff567890"));
    }
}
