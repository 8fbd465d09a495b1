// Text entry encoding for `adb shell input text` and the ADB keyboard broadcast.
// `input text` only understands ASCII; anything else must go through an IME.

/// Characters the device shell would otherwise interpret.
const SHELL_SPECIALS: &[char] = &[
    '(', ')', '<', '>', '|', ';', '&', '*', '\\', '~', '"', '\'', '`', '$', '?', '#', '!', '[', ']', '{', '}',
];

/// Returns true if the text contains characters `input text` cannot type
/// (CJK, emoji, accented letters, …).
pub fn needs_ime(text: &str) -> bool {
    !text.is_ascii()
}

/// Encodes ASCII text for `input text`: spaces become `%s`, shell metacharacters are escaped.
pub fn encode_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            c if SHELL_SPECIALS.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Single-quotes `text` for the device shell.
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_non_ascii() {
        assert!(!needs_ime("hello world"));
        assert!(needs_ime("你好"));
        assert!(needs_ime("café"));
    }

    #[test]
    fn encodes_spaces_and_specials() {
        assert_eq!(encode_input_text("hello world"), "hello%sworld");
        assert_eq!(encode_input_text("a&b (c)"), r"a\&b%s\(c\)");
        assert_eq!(encode_input_text("it's $5"), r"it\'s%s\$5");
    }

    #[test]
    fn quotes_for_shell() {
        assert_eq!(shell_quote("你好"), "'你好'");
        assert_eq!(shell_quote("l'été"), r"'l'\''été'");
    }
}
