//! Internal helpers shared across modules.

fn extract_class_name(full_path: &str) -> &str {
    let after_last_period = full_path.rsplit('.').next().unwrap_or(full_path);
    // If the class is an inner class, we need to extract the outer class name
    match after_last_period.find('$') {
        Some(pos) if pos > 0 => &after_last_period[..pos],
        _ => after_last_period,
    }
}

/// Synthesizes a source file name from a class name.
///
/// For example: `com.example.Main` -> `Main.java`
/// For inner classes: `com.example.Main$Inner` -> `Main.java`
pub(crate) fn synthesize_source_file(class_name: &str) -> String {
    if class_name.is_empty() {
        return String::new();
    }
    format!("{}.java", extract_class_name(class_name))
}

/// Converts an internal class name into an external class name.
///
/// For example, `java/lang/Object` becomes `java.lang.Object`.
pub fn external_class_name(name: &str) -> String {
    name.replace('/', ".")
}

/// Converts an external class name into an internal class name.
///
/// For example, `java.lang.Object` becomes `java/lang/Object`.
pub fn internal_class_name(name: &str) -> String {
    name.replace('.', "/")
}

/// Returns the first byte offset at which the two strings differ.
///
/// The offset is always on a char boundary of both strings.
pub(crate) fn first_non_common_index(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((idx, _), _)| idx)
        .unwrap_or_else(|| a.len().min(b.len()))
}

/// Returns `line` with the leading characters it shares with `previous`
/// replaced by spaces.
pub(crate) fn trim_common_prefix(line: &str, previous: &str) -> String {
    let end = first_non_common_index(line, previous);
    let blanked = line[..end].chars().count();

    let mut trimmed = String::with_capacity(blanked + line.len() - end);
    trimmed.extend(std::iter::repeat(' ').take(blanked));
    trimmed.push_str(&line[end..]);
    trimmed
}

/// Whether `c` separates tokens that may be class names.
pub(crate) fn is_token_delimiter(c: char) -> bool {
    c.is_whitespace() || "()<>[]{};:,'\"/\\".contains(c)
}

/// Splits `s` into tokens, keeping every delimiter as a token of its own.
///
/// Concatenating the returned tokens yields `s` again.
pub(crate) fn split_with_delimiters<P>(s: &str, is_delimiter: P) -> Vec<&str>
where
    P: Fn(char) -> bool,
{
    let mut tokens = Vec::new();
    let mut start = 0;

    for (idx, c) in s.char_indices() {
        if is_delimiter(c) {
            if start < idx {
                tokens.push(&s[start..idx]);
            }
            let end = idx + c.len_utf8();
            tokens.push(&s[idx..end]);
            start = end;
        }
    }
    if start < s.len() {
        tokens.push(&s[start..]);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_file_names() {
        assert_eq!(synthesize_source_file("com.example.Main"), "Main.java");
        assert_eq!(synthesize_source_file("com.example.Main$Inner"), "Main.java");
        assert_eq!(synthesize_source_file("Main"), "Main.java");
        assert_eq!(synthesize_source_file(""), "");
    }

    #[test]
    fn class_name_forms() {
        assert_eq!(external_class_name("java/lang/Object"), "java.lang.Object");
        assert_eq!(internal_class_name("java.lang.Object"), "java/lang/Object");
    }

    #[test]
    fn trim_prefix() {
        assert_eq!(first_non_common_index("abcd", "abxd"), 2);
        assert_eq!(first_non_common_index("abc", "abcdef"), 3);
        assert_eq!(
            trim_common_prefix("    at a.b.bar()", "    at a.b.foo()"),
            format!("{}bar()", " ".repeat(11))
        );
        assert_eq!(trim_common_prefix("same", "same"), "    ");
        // multi-byte characters are blanked one space per character
        assert_eq!(trim_common_prefix("äöx", "äöy"), "  x");
    }

    #[test]
    fn split_keeps_delimiters() {
        let s = "java.lang.NullPointerException: Attempt to invoke virtual method 'java.lang.String java.lang.Object.toString()' on a null object reference";
        let tokens = split_with_delimiters(s, |c| c == ' ');
        assert_eq!(
            tokens,
            vec![
                "java.lang.NullPointerException:",
                " ",
                "Attempt",
                " ",
                "to",
                " ",
                "invoke",
                " ",
                "virtual",
                " ",
                "method",
                " ",
                "'java.lang.String",
                " ",
                "java.lang.Object.toString()'",
                " ",
                "on",
                " ",
                "a",
                " ",
                "null",
                " ",
                "object",
                " ",
                "reference",
            ]
        );
        assert_eq!(tokens.concat(), s);

        let tokens = split_with_delimiters("a.b(c)", is_token_delimiter);
        assert_eq!(tokens, vec!["a.b", "(", "c", ")"]);
    }
}
