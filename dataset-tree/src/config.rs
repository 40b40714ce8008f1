//! Per-year report configuration (`years.json`).
//!
//! ```json
//! {
//!   "2022": {
//!     "twiki_file_name": "2022dataFromTwiki.txt",
//!     "dcs_json_path": "/path/to/json_DCSONLY.txt",
//!     "campaigns": {
//!       "AOD":     {"AOD": ["PromptReco", "27Jun2023"]},
//!       "MINIAOD": {"MiniAODv3": ["PromptReco", "27Jun2023"]}
//!     },
//!     "era": {
//!       "Run2022C": {"MINIAOD": [{"campaign": "MiniAODv3", "processing_string": ["27Jun2023"]}]}
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::{TreeError, TreeResult};
use crate::name::DatasetName;
use crate::runs::{LumiMask, TwikiRuns, load_dcs_json};

/// Campaign name used when no campaign lists the processing string.
pub const OTHER_CAMPAIGN: &str = "<other>";

/// Campaign name -> processing strings tagged with it.
pub type CampaignTags = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Deserialize)]
struct EraCampaign {
    campaign: String,
    #[serde(default)]
    processing_string: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct YearEntry {
    #[serde(default)]
    twiki_file_name: String,
    #[serde(default)]
    dcs_json_path: String,
    #[serde(default)]
    campaigns: BTreeMap<String, CampaignTags>,
    #[serde(default)]
    era: BTreeMap<String, BTreeMap<String, Vec<EraCampaign>>>,
}

/// One configured data-taking year.
#[derive(Debug, Clone, Default)]
pub struct Year {
    pub year: String,
    pub twiki_file: PathBuf,
    pub dcs_json_path: PathBuf,
    /// Tier -> campaign -> processing strings.
    pub campaigns: BTreeMap<String, CampaignTags>,
    /// (era, tier, processing string) -> campaign.
    era_campaigns: BTreeMap<(String, String, String), String>,
    /// Certified runs per RAW dataset.
    pub twiki: TwikiRuns,
    /// Certification lumi mask of the year.
    pub dcs: LumiMask,
}

impl Year {
    fn from_entry(year: String, entry: YearEntry) -> Self {
        let mut era_campaigns = BTreeMap::new();
        for (era, tiers) in entry.era {
            for (tier, matches) in tiers {
                for m in matches {
                    for ps in m.processing_string {
                        era_campaigns.insert((era.clone(), tier.clone(), ps), m.campaign.clone());
                    }
                }
            }
        }

        Year {
            year,
            twiki_file: PathBuf::from(entry.twiki_file_name),
            dcs_json_path: PathBuf::from(entry.dcs_json_path),
            campaigns: entry.campaigns,
            era_campaigns,
            twiki: TwikiRuns::default(),
            dcs: LumiMask::default(),
        }
    }

    /// Campaigns configured for a tier.
    pub fn tier_campaigns(&self, tier: &str) -> Option<&CampaignTags> {
        self.campaigns.get(tier)
    }

    /// First campaign of `tier` listing `processing_string`, `<other>` otherwise.
    pub fn campaign_for(&self, tier: &str, processing_string: &str) -> String {
        self.tier_campaigns(tier)
            .and_then(|tags| {
                tags.iter()
                    .find(|(_, ps)| ps.iter().any(|p| p == processing_string))
                    .map(|(c, _)| c.clone())
            })
            .unwrap_or_else(|| OTHER_CAMPAIGN.to_string())
    }

    /// Campaign from the era block, keyed by era, tier and (filtered) processing string.
    pub fn era_campaign(&self, name: &DatasetName) -> Option<&str> {
        let key = (
            name.era.clone(),
            name.tier.clone(),
            name.campaign_ps().to_string(),
        );
        self.era_campaigns.get(&key).map(String::as_str)
    }

    /// Processing strings of the `AOD` campaign used to pick reprocessing workflows.
    pub fn aod_tags(&self) -> &[String] {
        self.tier_campaigns("AOD")
            .and_then(|c| c.get("AOD"))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Reads the twiki run file and the DCS lumi mask of this year.
    pub fn load_run_inputs(&mut self) -> TreeResult<()> {
        self.twiki = TwikiRuns::load(&self.twiki_file)?;
        self.dcs = load_dcs_json(&self.dcs_json_path)?;
        info!(
            year = %self.year,
            twiki_rows = self.twiki.len(),
            dcs_runs = self.dcs.len(),
            "loaded run inputs"
        );
        Ok(())
    }
}

/// All configured years.
#[derive(Debug, Clone, Default)]
pub struct YearsConfig {
    years: BTreeMap<String, Year>,
}

impl YearsConfig {
    /// Parses `years.json` content without touching the referenced files.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: BTreeMap<String, YearEntry> = serde_json::from_str(raw)?;
        let years = entries
            .into_iter()
            .map(|(y, e)| (y.clone(), Year::from_entry(y, e)))
            .collect();
        Ok(Self { years })
    }

    /// Reads and parses a `years.json` file.
    pub fn from_file(path: &Path) -> TreeResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| TreeError::io(path, e))?;
        let cfg = Self::from_json(&raw).map_err(|e| TreeError::json(path, e))?;
        debug!(years = cfg.years.len(), "loaded {}", path.display());
        Ok(cfg)
    }

    /// Loads twiki and DCS files of every year.
    pub fn with_run_inputs(mut self) -> TreeResult<Self> {
        for year in self.years.values_mut() {
            year.load_run_inputs()?;
        }
        Ok(self)
    }

    /// Year whose `/Run<year>` appears in the dataset name.
    pub fn year_for(&self, dataset: &str) -> Option<&Year> {
        self.years
            .values()
            .find(|y| dataset.contains(&format!("/Run{}", y.year)))
    }

    pub fn get(&self, year: &str) -> Option<&Year> {
        self.years.get(year)
    }

    pub fn year_names(&self) -> impl Iterator<Item = &str> {
        self.years.keys().map(String::as_str)
    }

    pub fn insert(&mut self, year: Year) {
        self.years.insert(year.year.clone(), year);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEARS: &str = r#"{
        "2018": {
            "twiki_file_name": "",
            "dcs_json_path": "",
            "campaigns": {
                "AOD": {"AOD": ["12Nov2019_UL2018", "12Nov2019_UL2018_rsb"]},
                "NANOAOD": {"NanoAODv6": ["Nano02Dec2019"], "NanoAODv9": ["UL2018_MiniAODv2_NanoAODv9"]}
            }
        },
        "2022": {
            "campaigns": {"MINIAOD": {"MiniAODv3": ["PromptReco", "27Jun2023"]}},
            "era": {
                "Run2022C": {"NANOAOD": [{"campaign": "NanoAODv12", "processing_string": ["PromptNanoAODv11"]}]}
            }
        }
    }"#;

    #[test]
    fn year_is_found_from_raw_name() {
        let cfg = YearsConfig::from_json(YEARS).unwrap();
        assert_eq!(cfg.year_for("/A/Run2018B-v1/RAW").unwrap().year, "2018");
        assert!(cfg.year_for("/A/Run2016B-v1/RAW").is_none());
    }

    #[test]
    fn campaign_lookup_falls_back_to_other() {
        let cfg = YearsConfig::from_json(YEARS).unwrap();
        let y = cfg.get("2018").unwrap();
        assert_eq!(y.campaign_for("NANOAOD", "Nano02Dec2019"), "NanoAODv6");
        assert_eq!(y.campaign_for("NANOAOD", "Unknown"), OTHER_CAMPAIGN);
        assert_eq!(y.campaign_for("MINIAOD", "Nano02Dec2019"), OTHER_CAMPAIGN);
        assert_eq!(y.aod_tags().len(), 2);
    }

    #[test]
    fn era_lookup_uses_filtered_processing_string() {
        let cfg = YearsConfig::from_json(YEARS).unwrap();
        let y = cfg.get("2022").unwrap();
        let n = DatasetName::parse("/A/Run2022C-PromptNanoAODv11_v1-v2/NANOAOD");
        assert_eq!(y.era_campaign(&n), Some("NanoAODv12"));
        let other = DatasetName::parse("/A/Run2022D-PromptNanoAODv11_v1-v2/NANOAOD");
        assert_eq!(y.era_campaign(&other), None);
        assert!(y.aod_tags().is_empty());
    }

    #[test]
    fn empty_input_paths_load_nothing() {
        let cfg = YearsConfig::from_json(YEARS)
            .unwrap()
            .with_run_inputs()
            .unwrap();
        assert!(cfg.get("2018").unwrap().dcs.is_empty());
    }
}
