//! Dataset name parsing.
//!
//! `/<primary>/<era>-<processing string>-<version>/<tier>` for processed data,
//! `/<primary>/<era>-<version>/RAW` for RAW data. A processing string ending in
//! `_vN` carries its own version and a filtered processing string.

use std::sync::LazyLock;

use regex::Regex;

static RAW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(\w*)/(Run[0-9]{4}[A-Z]){1}-(v[0-9]{1,2})/(RAW)$").expect("valid RAW regex")
});

static PROCESSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(\w*)/(Run[0-9]{4}[A-Z]){1}-(\w*)-(v[0-9]{1,2})/([A-Z]*)$")
        .expect("valid dataset regex")
});

static SUBVERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w*)_(v[0-9]{1,2})$").expect("valid subversion regex"));

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(_v[0-9])?_v[0-9]|-v[0-9]").expect("valid version regex"));

static RUN_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Run([0-9]{4})").expect("valid run regex"));

/// Fields extracted from a dataset name. All empty when the name is invalid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetName {
    pub full_name: String,
    pub primary_dataset: String,
    pub era: String,
    pub year: String,
    pub processing_string: String,
    /// Processing string without its `_vN` suffix, empty when it has none.
    pub filtered_ps: String,
    pub version: String,
    pub tier: String,
    valid: bool,
}

impl DatasetName {
    pub fn parse(name: &str) -> Self {
        let mut parsed = DatasetName {
            full_name: name.to_string(),
            ..Default::default()
        };

        if let Some(c) = RAW_RE.captures(name) {
            parsed.primary_dataset = c[1].to_string();
            parsed.era = c[2].to_string();
            parsed.version = c[3].to_string();
            parsed.tier = c[4].to_string();
        } else if let Some(c) = PROCESSED_RE.captures(name) {
            parsed.primary_dataset = c[1].to_string();
            parsed.era = c[2].to_string();
            parsed.processing_string = c[3].to_string();
            parsed.version = c[4].to_string();
            parsed.tier = c[5].to_string();

            if let Some(sub) = SUBVERSION_RE.captures(&parsed.processing_string) {
                parsed.filtered_ps = sub[1].to_string();
                parsed.version = sub[2].to_string();
            }
        } else {
            return parsed;
        }

        // `Run2022C` -> `2022`
        parsed.year = parsed.era[3..parsed.era.len() - 1].to_string();
        parsed.valid = true;
        parsed
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_raw(&self) -> bool {
        self.valid && self.tier == "RAW"
    }

    /// Processing string used for campaign lookups.
    pub fn campaign_ps(&self) -> &str {
        if self.filtered_ps.is_empty() {
            &self.processing_string
        } else {
            &self.filtered_ps
        }
    }
}

/// Version number used to match children with their parent, 0 when absent.
///
/// `/A/Run2022C-PromptNanoAODv10_v1-v2/NANOAOD` -> 1,
/// `/A/Run2022C-PromptReco-v3/AOD` -> 3.
pub fn dataset_version(name: &str) -> u32 {
    VERSION_RE
        .find(name)
        .and_then(|m| {
            let s = m.as_str();
            let v = s.find('v')?;
            s[v + 1..].chars().next()?.to_digit(10)
        })
        .unwrap_or(0)
}

/// Last path component of a dataset name.
pub fn tier_of(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or("")
}

/// First path component of a dataset name.
pub fn primary_dataset_of(name: &str) -> &str {
    name.split('/').find(|s| !s.is_empty()).unwrap_or("")
}

/// Four-digit year following `Run` in a dataset name.
pub fn year_of_run(name: &str) -> Option<&str> {
    RUN_YEAR_RE
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}
