//! Parsing of free-text model replies.
//!
//! Stages never compare raw model output against sentinel strings; they parse
//! it here into a strict enum first.

/// Sentinel the relevance prompt asks for when a paper is off-topic.
pub const RELEVANCE_SENTINEL: &str = "irrelevant";

/// Sentinel the institution prompt asks for when no tracked institution matches.
pub const INSTITUTION_SENTINEL: &str = "none";

const RELEVANCE_SENTINELS: &[&str] = &[RELEVANCE_SENTINEL, "not relevant", "unrelated", "不相关"];
const INSTITUTION_SENTINELS: &[&str] = &[INSTITUTION_SENTINEL, "no", "n/a", "无"];
const INSTITUTION_DELIMITERS: &[char] = &['、', ';', '；', '\n', '|'];
/// Commas also separate names, but several real names contain one
/// ("University of California, Berkeley"), so they are split last.
const COMMAS: &[char] = &[',', '，'];

/// Strip surrounding whitespace, quotes and trailing punctuation.
fn normalise(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '“' | '”' | '「' | '」' | '《' | '》' | '*')
        })
        .trim_end_matches(|c: char| matches!(c, '.' | '。' | '!' | '！'))
        .trim()
}

fn is_sentinel(value: &str, sentinels: &[&str]) -> bool {
    let lower = value.to_lowercase();
    sentinels.iter().any(|s| lower == *s)
}

/// A sentinel followed by an explanation, e.g. "Irrelevant (civil engineering)".
fn starts_with_sentinel(value: &str, sentinels: &[&str]) -> bool {
    let lower = value.to_lowercase();
    sentinels.iter().any(|s| {
        lower
            .strip_prefix(s)
            .is_some_and(|rest| rest.chars().next().map_or(true, |c| !c.is_alphanumeric()))
    })
}

/// Split `segment` on commas, keeping comma-bearing runs that `is_known` accepts whole.
/// The longest known run starting at each piece wins.
fn split_commas<'a>(segment: &'a str, is_known: &dyn Fn(&str) -> bool) -> Vec<&'a str> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for (i, c) in segment.char_indices() {
        if COMMAS.contains(&c) {
            ranges.push((start, i));
            start = i + c.len_utf8();
        }
    }
    ranges.push((start, segment.len()));

    let mut names = Vec::new();
    let mut i = 0;
    while i < ranges.len() {
        let joined = (i + 1..ranges.len())
            .rev()
            .map(|j| (j, normalise(&segment[ranges[i].0..ranges[j].1])))
            .find(|(_, candidate)| is_known(*candidate));
        match joined {
            Some((j, name)) => {
                names.push(name);
                i = j + 1;
            }
            None => {
                names.push(normalise(&segment[ranges[i].0..ranges[i].1]));
                i += 1;
            }
        }
    }
    names
}

/// Outcome of the relevance prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelevanceVerdict {
    /// Short research-topic tag, e.g. "RAG" or "instruction dataset".
    Relevant(String),
    Irrelevant,
}

impl RelevanceVerdict {
    /// Only the first line of the reply is considered; an empty reply counts
    /// as irrelevant so that malformed output never includes a paper. A
    /// sentinel followed by a reason ("irrelevant - not about LLMs") is still
    /// the sentinel.
    pub fn parse(raw: &str) -> Self {
        let first_line = raw.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        let tag = normalise(first_line);
        if tag.is_empty() || starts_with_sentinel(tag, RELEVANCE_SENTINELS) {
            RelevanceVerdict::Irrelevant
        } else {
            RelevanceVerdict::Relevant(tag.to_string())
        }
    }

    pub fn is_relevant(&self) -> bool {
        matches!(self, RelevanceVerdict::Relevant(_))
    }
}

/// Outcome of the institution prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstitutionVerdict {
    /// No tracked institution among the leading affiliations.
    NoMatch,
    /// Matched institutions in the order the model listed them (never empty).
    Matched(Vec<String>),
}

impl InstitutionVerdict {
    /// Returns `None` for an empty reply, which callers treat as a failed call.
    /// Every comma separates names; see [`InstitutionVerdict::parse_with`].
    pub fn parse(raw: &str) -> Option<Self> {
        Self::parse_with(raw, |_| false)
    }

    /// Like [`InstitutionVerdict::parse`], but a comma-bearing run for which
    /// `is_known` holds is kept as one name.
    pub fn parse_with(raw: &str, is_known: impl Fn(&str) -> bool) -> Option<Self> {
        let whole = normalise(raw);
        if whole.is_empty() {
            return None;
        }
        if is_sentinel(whole, INSTITUTION_SENTINELS) {
            return Some(InstitutionVerdict::NoMatch);
        }

        let names: Vec<String> = whole
            .split(INSTITUTION_DELIMITERS)
            .flat_map(|segment| split_commas(segment, &is_known))
            .filter(|n| !n.is_empty() && !is_sentinel(n, INSTITUTION_SENTINELS))
            .map(String::from)
            .collect();

        if names.is_empty() {
            Some(InstitutionVerdict::NoMatch)
        } else {
            Some(InstitutionVerdict::Matched(names))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_sentinels() {
        assert_eq!(RelevanceVerdict::parse("irrelevant"), RelevanceVerdict::Irrelevant);
        assert_eq!(RelevanceVerdict::parse("  \"Irrelevant.\" "), RelevanceVerdict::Irrelevant);
        assert_eq!(RelevanceVerdict::parse("不相关"), RelevanceVerdict::Irrelevant);
        assert_eq!(RelevanceVerdict::parse(""), RelevanceVerdict::Irrelevant);
    }

    #[test]
    fn test_relevance_sentinel_with_reason() {
        assert_eq!(RelevanceVerdict::parse("Irrelevant (civil engineering)"), RelevanceVerdict::Irrelevant);
        assert_eq!(RelevanceVerdict::parse("irrelevant - not LLM related"), RelevanceVerdict::Irrelevant);
        assert_eq!(RelevanceVerdict::parse("Not relevant: soil mechanics"), RelevanceVerdict::Irrelevant);
        assert_eq!(RelevanceVerdict::parse("不相关，土木工程"), RelevanceVerdict::Irrelevant);
        assert_eq!(
            RelevanceVerdict::parse("Unrelatedness detection"),
            RelevanceVerdict::Relevant("Unrelatedness detection".to_string())
        );
    }

    #[test]
    fn test_relevance_tag_first_line_only() {
        let v = RelevanceVerdict::parse("\n「Scaling laws」\nBecause the paper studies…");
        assert_eq!(v, RelevanceVerdict::Relevant("Scaling laws".to_string()));
        assert!(v.is_relevant());
    }

    #[test]
    fn test_institution_none() {
        assert_eq!(InstitutionVerdict::parse("none"), Some(InstitutionVerdict::NoMatch));
        assert_eq!(InstitutionVerdict::parse("无"), Some(InstitutionVerdict::NoMatch));
        assert_eq!(InstitutionVerdict::parse("  "), None);
    }

    #[test]
    fn test_institution_list_split() {
        let v = InstitutionVerdict::parse("腾讯、深圳大学").unwrap();
        assert_eq!(
            v,
            InstitutionVerdict::Matched(vec!["腾讯".to_string(), "深圳大学".to_string()])
        );
        let v = InstitutionVerdict::parse("清华大学, 北京大学;").unwrap();
        assert_eq!(
            v,
            InstitutionVerdict::Matched(vec!["清华大学".to_string(), "北京大学".to_string()])
        );
    }

    #[test]
    fn test_institution_names_with_commas() {
        let known = |n: &str| {
            ["university of california, berkeley", "iflytek co., ltd"].contains(&n.to_lowercase().as_str())
        };
        assert_eq!(
            InstitutionVerdict::parse_with("University of California, Berkeley", known),
            Some(InstitutionVerdict::Matched(vec!["University of California, Berkeley".to_string()]))
        );
        assert_eq!(
            InstitutionVerdict::parse_with("iFLYTEK Co., Ltd, 清华大学", known),
            Some(InstitutionVerdict::Matched(vec!["iFLYTEK Co., Ltd".to_string(), "清华大学".to_string()]))
        );
        assert_eq!(
            InstitutionVerdict::parse_with("OpenAI、University of California, Berkeley", known),
            Some(InstitutionVerdict::Matched(vec![
                "OpenAI".to_string(),
                "University of California, Berkeley".to_string()
            ]))
        );
    }
}
