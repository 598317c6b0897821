//! PDF file naming: `{id}【{tag}】{title}.pdf`, later rewritten to
//! `{id}【{tag}-{institution}】{title}.pdf` once the institution is known.

use lazy_static::lazy_static;
use regex::Regex;

/// Longest title segment kept in a file name, in characters.
const MAX_TITLE_CHARS: usize = 150;

lazy_static! {
    static ref ILLEGAL: Regex = Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap();
    static ref TAGGED_NAME: Regex = Regex::new(r"^([^【】]+)【([^【】]*)】(.*)$").unwrap();
}

/// Replace characters that are illegal in file names and trim leading or
/// trailing dots and whitespace. Never returns an empty string.
pub fn sanitize_component(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let replaced = ILLEGAL.replace_all(&collapsed, "_");
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name for a freshly downloaded paper.
pub fn pdf_file_name(arxiv_id: &str, tag: &str, title: &str) -> String {
    let title: String = sanitize_component(title).chars().take(MAX_TITLE_CHARS).collect();
    format!(
        "{}【{}】{}.pdf",
        sanitize_component(arxiv_id),
        sanitize_component(tag),
        title.trim_end_matches(|c: char| c == '.' || c.is_whitespace()),
    )
}

/// Embed `institution` into the tag segment of an existing file name.
///
/// Returns `None` when the name does not follow the `{id}【{tag}】{rest}` layout.
/// Already-embedded institutions are left as they are.
pub fn with_institution(file_name: &str, institution: &str) -> Option<String> {
    let caps = TAGGED_NAME.captures(file_name)?;
    let (id, tag, rest) = (&caps[1], &caps[2], &caps[3]);
    let suffix = format!("-{}", institution);
    if tag.ends_with(&suffix) {
        return Some(file_name.to_string());
    }
    Some(format!("{}【{}{}】{}", id, tag, suffix, rest))
}
