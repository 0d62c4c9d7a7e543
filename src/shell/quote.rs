//! Quoting values for `sh -c` command lines.

/// Characters the shell treats specially outside quotes.
const SHELL_META: &[char] = &[
    ' ', '\t', '\n', '\r', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{',
    '}', '<', '>', '|', '&', ';', '#', '~', '=', '%', '^',
];

/// Quote a value so the shell reads it back as exactly one word.
///
/// Plain values are returned unchanged; anything else is wrapped in single
/// quotes with embedded quotes written as `'\''`.
pub fn quote_arg(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    if !value.contains(SHELL_META) && !value.chars().any(char::is_control) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(quote_arg("v1.2.3"), "v1.2.3");
        assert_eq!(quote_arg("/tmp/run_1/auth/target.url"), "/tmp/run_1/auth/target.url");
        assert_eq!(quote_arg("RunLocalTests"), "RunLocalTests");
    }

    #[test]
    fn empty_value_stays_one_word() {
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn spaces_are_quoted() {
        assert_eq!(quote_arg("/home/ci/my project"), "'/home/ci/my project'");
    }

    #[test]
    fn command_separators_are_quoted() {
        assert_eq!(
            quote_arg("v1.2.3;touch$IFS/tmp/x"),
            "'v1.2.3;touch$IFS/tmp/x'"
        );
        assert_eq!(quote_arg("$(id)"), "'$(id)'");
    }

    #[test]
    fn single_quotes_are_escaped() {
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
    }
}
