//! Glob blacklists for datasets and campaigns.

use regex::Regex;

use crate::errors::{TreeError, TreeResult};

pub const DEFAULT_DATASET_BLACKLIST: [&str; 3] = [
    "/*/*DQMresub*/*AOD",
    "/*/*EcalRecovery*/*AOD",
    "/*/*WMass*/*AOD",
];

pub const DEFAULT_CAMPAIGN_BLACKLIST: [&str; 1] = ["NanoAODv6"];

/// Full-match glob list where `*` matches anything.
#[derive(Debug, Clone)]
pub struct Blacklist {
    patterns: Vec<Regex>,
}

impl Blacklist {
    pub fn new<S: AsRef<str>>(globs: &[S]) -> TreeResult<Self> {
        let patterns = globs
            .iter()
            .map(|g| {
                let g = g.as_ref();
                let body = g
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*");
                Regex::new(&format!("^(?:{body})$")).map_err(|source| TreeError::Pattern {
                    pattern: g.to_string(),
                    source,
                })
            })
            .collect::<TreeResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn datasets() -> TreeResult<Self> {
        Self::new(&DEFAULT_DATASET_BLACKLIST)
    }

    pub fn campaigns() -> TreeResult<Self> {
        Self::new(&DEFAULT_CAMPAIGN_BLACKLIST)
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dataset_patterns() {
        let bl = Blacklist::datasets().unwrap();
        assert!(bl.matches("/ZeroBias/Run2018A-12Nov2019_UL2018_DQMresub-v1/AOD"));
        assert!(bl.matches("/EGamma/Run2018D-EcalRecovery_12Nov2019_UL2018-v1/MINIAOD"));
        assert!(!bl.matches("/ZeroBias/Run2018A-12Nov2019_UL2018-v2/AOD"));
        // the tier must end in AOD
        assert!(!bl.matches("/ZeroBias/Run2018A-WMass-v1/RAW"));
    }

    #[test]
    fn campaign_patterns_are_full_match() {
        let bl = Blacklist::campaigns().unwrap();
        assert!(bl.matches("NanoAODv6"));
        assert!(!bl.matches("NanoAODv6x"));
        assert!(!Blacklist::empty().matches("NanoAODv6"));
    }

    #[test]
    fn dots_are_literal() {
        let bl = Blacklist::new(&["a.b*"]).unwrap();
        assert!(bl.matches("a.bc"));
        assert!(!bl.matches("axbc"));
    }
}
