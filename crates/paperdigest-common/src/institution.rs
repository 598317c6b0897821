//! Curated institution table.
//!
//! Maps a canonical institution name to the alias spellings that appear in
//! paper bylines. The table is partitioned into four disjoint categories and is
//! built once at start-up, then shared read-only with the resolver stage.
//!
//! A custom table can be supplied as TOML:
//!
//! ```toml
//! [domestic_academia]
//! "清华大学" = ["Tsinghua University", "THU"]
//!
//! [foreign_industry]
//! "OpenAI" = ["OpenAI"]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DigestError, Result};

type Rows = &'static [(&'static str, &'static [&'static str])];

const FOREIGN_INDUSTRY: Rows = &[
    ("OpenAI",     &["OpenAI"]),
    ("谷歌",       &["Google", "Google DeepMind", "DeepMind"]),
    ("Meta",       &["Facebook", "Meta", "Meta Platforms"]),
    ("Anthropic",  &["Anthropic"]),
    ("微软",       &["Microsoft", "Microsoft Research", "MSR"]),
    ("英伟达",     &["NVIDIA", "Nvidia Corporation"]),
    ("AllenAI",    &["Allen Institute for AI", "Allen AI", "AI2"]),
    ("xAI",        &["xAI", "Grok"]),
    ("Salesforce", &["Salesforce", "Einstein GPT"]),
];

const DOMESTIC_INDUSTRY: Rows = &[
    ("幻方",     &["DeepSeek"]),
    ("阿里",     &["Alibaba", "Alibaba Group", "qwen"]),
    ("腾讯",     &["Tencent", "Tencent Holdings", "Hunyuan"]),
    ("字节跳动", &["ByteDance", "Douyin", "Doubao"]),
    ("智谱AI",   &["Zhipu AI", "GLM", "智谱清言"]),
    ("月之暗面", &["Moonshot AI", "Moonshot Intelligence", "Kimi"]),
    ("阶跃星辰", &["StepFun AI", "StepFun", "Yi"]),
    ("华为",     &["Huawei", "Huawei Technologies", "PanGu"]),
    ("百度",     &["Baidu", "Baidu Inc", "ERNIE"]),
    ("美团",     &["Meituan", "Meituan Dianping", "美团大模型"]),
    ("商汤科技", &["SenseTime", "SenseTime Group"]),
    ("科大讯飞", &["iFLYTEK", "iFLYTEK Co., Ltd", "Spark"]),
];

const FOREIGN_ACADEMIA: Rows = &[
    ("麻省理工学院",       &["Massachusetts Institute of Technology", "MIT"]),
    ("斯坦福大学",         &["Stanford University"]),
    ("卡内基梅隆大学",     &["Carnegie Mellon University", "CMU"]),
    ("加州大学伯克利分校", &["University of California, Berkeley", "UC Berkeley", "UCB"]),
    ("华盛顿大学",         &["University of Washington", "UW"]),
    ("新加坡国立大学",     &["National University of Singapore", "NUS"]),
];

const DOMESTIC_ACADEMIA: Rows = &[
    ("北京智源研究院",     &["Beijing Academy of Artificial Intelligence", "BAAI", "智源研究院"]),
    ("上海人工智能实验室", &["Shanghai AI Laboratory", "SAIL"]),
    ("清华大学",           &["Tsinghua University", "THU"]),
    ("北京大学",           &["Peking University", "PKU"]),
    ("复旦大学",           &["Fudan University", "FDU"]),
    ("上海交通大学",       &["Shanghai Jiao Tong University", "SJTU"]),
    ("浙江大学",           &["Zhejiang University", "ZJU"]),
    ("哈尔滨工业大学",     &["Harbin Institute of Technology", "HIT"]),
    ("中国科学技术大学",   &["University of Science and Technology of China", "USTC"]),
    ("中国人民大学",       &["Renmin University of China", "RUC"]),
    ("香港科技大学",       &["Hong Kong University of Science and Technology", "HKUST"]),
    ("香港中文大学",       &["The Chinese University of Hong Kong", "CUHK"]),
];

/// Institution taxonomy used for grouping notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstitutionCategory {
    ForeignIndustry,
    DomesticIndustry,
    ForeignAcademia,
    DomesticAcademia,
    /// Anything not found in the table.
    Other,
}

impl InstitutionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstitutionCategory::ForeignIndustry  => "foreign-industry",
            InstitutionCategory::DomesticIndustry => "domestic-industry",
            InstitutionCategory::ForeignAcademia  => "foreign-academia",
            InstitutionCategory::DomesticAcademia => "domestic-academia",
            InstitutionCategory::Other            => "other",
        }
    }

    pub fn is_industry(&self) -> bool {
        matches!(self, InstitutionCategory::ForeignIndustry | InstitutionCategory::DomesticIndustry)
    }
}

/// One canonical institution with its byline aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstitutionEntry {
    pub canonical: String,
    pub category: InstitutionCategory,
    pub aliases: Vec<String>,
}

/// On-disk layout of a custom table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct InstitutionTableFile {
    #[serde(default)]
    foreign_industry: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    domestic_industry: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    foreign_academia: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    domestic_academia: BTreeMap<String, Vec<String>>,
}

/// Immutable alias table, constructed once and passed by reference.
#[derive(Debug, Clone)]
pub struct InstitutionTable {
    entries: Vec<InstitutionEntry>,
    by_canonical: HashMap<String, usize>,
    /// Lower-cased alias → entry index.
    by_alias: HashMap<String, usize>,
}

impl InstitutionTable {
    /// Build a table, rejecting a canonical name listed in two categories.
    pub fn new(entries: Vec<InstitutionEntry>) -> Result<Self> {
        let mut by_canonical = HashMap::with_capacity(entries.len());
        let mut by_alias = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            if let Some(prev) = by_canonical.insert(entry.canonical.clone(), idx) {
                return Err(DigestError::Config(format!(
                    "institution '{}' is listed under both {} and {}",
                    entry.canonical,
                    entries[prev].category.as_str(),
                    entry.category.as_str(),
                )));
            }
            for alias in &entry.aliases {
                // First listing wins for ambiguous aliases.
                by_alias.entry(alias.trim().to_lowercase()).or_insert(idx);
            }
        }

        Ok(Self { entries, by_canonical, by_alias })
    }

    /// Parse a TOML table (see module docs for the layout).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: InstitutionTableFile = toml::from_str(content)
            .map_err(|e| DigestError::Config(format!("invalid institution table: {e}")))?;

        let mut entries = Vec::new();
        for (category, map) in [
            (InstitutionCategory::ForeignIndustry, file.foreign_industry),
            (InstitutionCategory::DomesticIndustry, file.domestic_industry),
            (InstitutionCategory::ForeignAcademia, file.foreign_academia),
            (InstitutionCategory::DomesticAcademia, file.domestic_academia),
        ] {
            for (canonical, aliases) in map {
                entries.push(InstitutionEntry { canonical, category, aliases });
            }
        }
        Self::new(entries)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The curated default table.
    pub fn builtin() -> Self {
        let mut entries = Vec::new();
        for (category, rows) in [
            (InstitutionCategory::ForeignIndustry, FOREIGN_INDUSTRY),
            (InstitutionCategory::DomesticIndustry, DOMESTIC_INDUSTRY),
            (InstitutionCategory::ForeignAcademia, FOREIGN_ACADEMIA),
            (InstitutionCategory::DomesticAcademia, DOMESTIC_ACADEMIA),
        ] {
            for (canonical, aliases) in rows {
                entries.push(InstitutionEntry {
                    canonical: canonical.to_string(),
                    category,
                    aliases: aliases.iter().map(|a| a.to_string()).collect(),
                });
            }
        }

        // Built-in rows are unique by construction.
        match Self::new(entries) {
            Ok(table) => table,
            Err(e) => unreachable!("built-in institution table is inconsistent: {e}"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[InstitutionEntry] {
        &self.entries
    }

    /// Resolve a canonical key or a known alias to its table entry.
    pub fn lookup(&self, name: &str) -> Option<&InstitutionEntry> {
        let name = name.trim();
        self.by_canonical
            .get(name)
            .or_else(|| self.by_alias.get(&name.to_lowercase()))
            .map(|&idx| &self.entries[idx])
    }

    /// Category membership test; unknown names are `Other`.
    pub fn category_of(&self, name: &str) -> InstitutionCategory {
        self.lookup(name)
            .map(|e| e.category)
            .unwrap_or(InstitutionCategory::Other)
    }

    /// Flattened `canonical: alias, alias` listing handed to the model as a lookup hint.
    pub fn prompt_hint(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}: {}", e.canonical, e.aliases.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_categories() {
        let table = InstitutionTable::builtin();
        assert!(!table.is_empty());
        assert_eq!(table.category_of("清华大学"), InstitutionCategory::DomesticAcademia);
        assert_eq!(table.category_of("OpenAI"), InstitutionCategory::ForeignIndustry);
        assert_eq!(table.category_of("腾讯"), InstitutionCategory::DomesticIndustry);
        assert_eq!(table.category_of("斯坦福大学"), InstitutionCategory::ForeignAcademia);
        assert_eq!(table.category_of("深圳大学"), InstitutionCategory::Other);
    }

    #[test]
    fn test_alias_lookup_is_case_insensitive() {
        let table = InstitutionTable::builtin();
        let entry = table.lookup("tsinghua university").unwrap();
        assert_eq!(entry.canonical, "清华大学");
        assert_eq!(table.category_of("  DeepMind "), InstitutionCategory::ForeignIndustry);
    }

    #[test]
    fn test_from_toml() {
        let table = InstitutionTable::from_toml_str(
            r#"
            [domestic_academia]
            "清华大学" = ["Tsinghua University"]
            "#,
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.category_of("清华大学"), InstitutionCategory::DomesticAcademia);
        assert_eq!(table.prompt_hint(), "清华大学: Tsinghua University");
    }

    #[test]
    fn test_duplicate_canonical_rejected() {
        let err = InstitutionTable::from_toml_str(
            r#"
            [foreign_industry]
            "Acme" = ["Acme Corp"]
            [domestic_industry]
            "Acme" = ["Acme China"]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Acme"));
    }

    #[test]
    fn test_category_serialises_kebab_case() {
        let json = serde_json::to_string(&InstitutionCategory::DomesticAcademia).unwrap();
        assert_eq!(json, "\"domestic-academia\"");
        assert!(InstitutionCategory::DomesticIndustry.is_industry());
        assert!(!InstitutionCategory::Other.is_industry());
    }
}
