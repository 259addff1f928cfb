//! Output file names derived from the label.

/// Characters that are not allowed in file names on common filesystems.
const FORBIDDEN: [char; 9] = ['\\', '/', ':', '"', '*', '?', '<', '>', '|'];

/// Longest file stem produced, in characters.
pub const MAX_FILE_STEM_CHARS: usize = 120;

/// Stem used when nothing printable is left.
pub const FALLBACK_FILE_STEM: &str = "output";

/// Turn a label into a safe file stem.
///
/// Runs of forbidden characters become one hyphen, whitespace runs become one
/// space, and the result is trimmed and cut to [`MAX_FILE_STEM_CHARS`].
/// Everything else, non-ASCII letters included, is kept as is.
pub fn sanitize_filename(label: &str) -> String {
    let mut replaced = String::with_capacity(label.len());
    let mut in_forbidden_run = false;
    for c in label.trim().chars() {
        if FORBIDDEN.contains(&c) {
            if !in_forbidden_run {
                replaced.push('-');
            }
            in_forbidden_run = true;
        } else {
            replaced.push(c);
            in_forbidden_run = false;
        }
    }

    // Unicode White_Space; the separators \x1c-\x1f are not in it and stay
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return FALLBACK_FILE_STEM.to_string();
    }

    let truncated: String = collapsed.chars().take(MAX_FILE_STEM_CHARS).collect();
    // A cut can land right after a space
    truncated.trim_end().to_string()
}

/// `{stem}.pdf` for a label
pub fn output_file_name(label: &str) -> String {
    format!("{}.pdf", sanitize_filename(label))
}
