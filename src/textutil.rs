/// Makes an uploaded file name safe to store.
///
/// Non-ASCII characters are dropped and `/` or whitespace runs become `_`.
/// Anything else outside `[A-Za-z0-9_.-]` is removed, backslashes included.
/// Leading or trailing dots and underscores are stripped. May return an
/// empty string.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Case-sensitive `.docx` suffix check on the client-supplied name.
pub fn has_docx_extension(name: &str) -> bool {
    name.ends_with(".docx")
}
