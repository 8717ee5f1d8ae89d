// Typographic cleanup
// Collapses fancy dashes, bullets and quotes into their ASCII counterparts

fn replacement(c: char) -> Option<char> {
    match c {
        '\u{2011}' | '\u{2014}' | '\u{2013}' | '\u{2022}' => Some('-'),
        '\u{201c}' | '\u{201d}' => Some('"'),
        '\u{2019}' => Some('\''),
        _ => None,
    }
}

pub fn clean_text(text: &str) -> String {
    if !text.chars().any(|c| replacement(c).is_some()) {
        return text.to_string();
    }

    text.chars().map(|c| replacement(c).unwrap_or(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_replaces_punctuation() {
        assert_eq!(
            clean_text("non\u{2011}breaking \u{2014} em \u{2013} en \u{2022} item"),
            "non-breaking - em - en - item"
        );
        assert_eq!(clean_text("\u{201c}quoted\u{201d} it\u{2019}s"), "\"quoted\" it's");
    }

    #[test]
    fn test_clean_text_keeps_other_unicode() {
        assert_eq!(clean_text("caf\u{e9} \u{2018}left\u{2019}"), "caf\u{e9} \u{2018}left'");
        assert_eq!(clean_text(""), "");
    }
}
