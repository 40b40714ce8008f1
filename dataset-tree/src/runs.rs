//! Run sets, lumi masks and the input files they are loaded from.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{TreeError, TreeResult};

/// Ordered set of run numbers.
pub type RunSet = BTreeSet<u32>;

/// Runs are queried at most this many at a time.
pub const RUN_CHUNK_SIZE: usize = 50;

/// Inclusive `[first, last]` lumi section range.
pub type LumiRange = [u32; 2];

/// Run -> lumi ranges, the certification JSON format.
///
/// On disk the runs are string keys (`{"355100": [[1, 20], [25, 30]]}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LumiMask(BTreeMap<u32, Vec<LumiRange>>);

impl LumiMask {
    pub fn new(map: BTreeMap<u32, Vec<LumiRange>>) -> Self {
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn runs(&self) -> RunSet {
        self.0.keys().copied().collect()
    }

    pub fn contains_run(&self, run: u32) -> bool {
        self.0.contains_key(&run)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &Vec<LumiRange>)> {
        self.0.iter()
    }

    /// Entries whose run is in `runs`.
    pub fn restrict_to(&self, runs: &RunSet) -> LumiMask {
        self.filter(|run| runs.contains(&run))
    }

    /// Entries whose run is also a run of `other`.
    pub fn restrict_to_mask(&self, other: &LumiMask) -> LumiMask {
        self.filter(|run| other.contains_run(run))
    }

    /// Entries whose run is not in `runs`.
    pub fn without_runs(&self, runs: &RunSet) -> LumiMask {
        self.filter(|run| !runs.contains(&run))
    }

    fn filter(&self, keep: impl Fn(u32) -> bool) -> LumiMask {
        LumiMask(
            self.0
                .iter()
                .filter(|(run, _)| keep(**run))
                .map(|(run, ranges)| (*run, ranges.clone()))
                .collect(),
        )
    }
}

impl FromIterator<(u32, Vec<LumiRange>)> for LumiMask {
    fn from_iter<I: IntoIterator<Item = (u32, Vec<LumiRange>)>>(iter: I) -> Self {
        LumiMask(iter.into_iter().collect())
    }
}

/// `(missing, surplus)`: runs of `parent` absent from `child`, runs of `child` absent from `parent`.
pub fn run_difference(parent: &RunSet, child: &RunSet) -> (usize, usize) {
    (
        parent.difference(child).count(),
        child.difference(parent).count(),
    )
}

/// Splits runs into query-sized chunks.
pub fn chunk_runs(runs: &[u32]) -> impl Iterator<Item = &[u32]> {
    runs.chunks(RUN_CHUNK_SIZE)
}

/// Loads a certification lumi mask; an empty path yields an empty mask.
pub fn load_dcs_json(path: &Path) -> TreeResult<LumiMask> {
    if path.as_os_str().is_empty() {
        return Ok(LumiMask::default());
    }

    let raw = fs::read_to_string(path).map_err(|e| TreeError::io(path, e))?;
    let mask: LumiMask = serde_json::from_str(&raw).map_err(|e| TreeError::json(path, e))?;
    debug!(runs = mask.len(), "loaded DCS JSON {}", path.display());
    Ok(mask)
}

/// Certified runs per RAW dataset, from the tab-separated twiki export.
///
/// Rows starting with `#` are comments; column 0 is the dataset, column 2 a
/// bracketed run list. The first row of a dataset wins.
#[derive(Debug, Clone, Default)]
pub struct TwikiRuns {
    by_dataset: BTreeMap<String, RunSet>,
}

impl TwikiRuns {
    /// Loads the file; an empty path yields an empty table.
    pub fn load(path: &Path) -> TreeResult<Self> {
        if path.as_os_str().is_empty() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|e| TreeError::io(path, e))?;
        Self::parse(&raw).map_err(|(line, reason)| TreeError::Twiki {
            path: path.to_path_buf(),
            line,
            reason,
        })
    }

    fn parse(raw: &str) -> Result<Self, (usize, String)> {
        let mut by_dataset = BTreeMap::new();
        for (idx, line) in raw.lines().enumerate() {
            let cols: Vec<&str> = line.split('\t').collect();
            let Some(dataset) = cols.first().filter(|c| !c.is_empty()) else {
                continue;
            };
            if dataset.starts_with('#') {
                continue;
            }
            let Some(runs_col) = cols.get(2) else {
                warn!(line = idx + 1, "twiki row for {} has no run column", dataset);
                continue;
            };

            let runs = parse_run_list(runs_col).map_err(|r| (idx + 1, r))?;
            by_dataset.entry(dataset.to_string()).or_insert(runs);
        }
        Ok(Self { by_dataset })
    }

    /// Runs listed for `dataset`, empty when the dataset is not in the file.
    pub fn runs_for(&self, dataset: &str) -> RunSet {
        self.by_dataset.get(dataset).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dataset.is_empty()
    }
}

/// `[1, 2,3]` -> {1, 2, 3}; blank entries are skipped.
pub fn parse_run_list(s: &str) -> Result<RunSet, String> {
    s.trim()
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u32>().map_err(|_| format!("bad run number `{p}`")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn mask(entries: &[(u32, &[[u32; 2]])]) -> LumiMask {
        entries.iter().map(|(r, l)| (*r, l.to_vec())).collect()
    }

    #[test]
    fn mask_restriction_and_removal() {
        let m = mask(&[(1, &[[1, 5]]), (2, &[[1, 1]]), (3, &[[2, 4]])]);
        let runs: RunSet = [1, 3, 9].into_iter().collect();
        assert_eq!(m.restrict_to(&runs).runs(), [1, 3].into_iter().collect());
        assert_eq!(m.without_runs(&runs).runs(), [2].into_iter().collect());

        let other = mask(&[(2, &[[7, 8]])]);
        let r = m.restrict_to_mask(&other);
        assert_eq!(r.runs(), [2].into_iter().collect());
        // ranges stay those of the restricted mask
        assert_eq!(r.iter().next().unwrap().1, &vec![[1, 1]]);
    }

    #[test]
    fn differences_count_both_sides() {
        let parent: RunSet = [1, 2, 3, 4].into_iter().collect();
        let child: RunSet = [3, 4, 5].into_iter().collect();
        assert_eq!(run_difference(&parent, &child), (2, 1));
    }

    #[test]
    fn chunks_of_fifty() {
        let runs: Vec<u32> = (0..120).collect();
        let sizes: Vec<usize> = chunk_runs(&runs).map(<[u32]>::len).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
    }

    #[test]
    fn dcs_json_keys_are_runs() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"355100": [[1, 20], [25, 30]], "355101": [[1, 1]]}}"#).unwrap();
        let m = load_dcs_json(f.path()).unwrap();
        assert_eq!(m.runs(), [355100, 355101].into_iter().collect());
        assert!(load_dcs_json(Path::new("")).unwrap().is_empty());
    }

    #[test]
    fn twiki_rows() {
        let raw = "# dataset\tcomment\truns\n\
                   /A/Run2018A-v1/RAW\tx\t[315252, 315255]\n\
                   /A/Run2018A-v1/RAW\tx\t[1]\n\
                   /B/Run2018A-v1/RAW\tx\t[]\n\
                   \n\
                   /C/Run2018A-v1/RAW\n";
        let t = TwikiRuns::parse(raw).unwrap();
        assert_eq!(
            t.runs_for("/A/Run2018A-v1/RAW"),
            [315252, 315255].into_iter().collect()
        );
        assert!(t.runs_for("/B/Run2018A-v1/RAW").is_empty());
        assert!(t.runs_for("/Z/Run2018A-v1/RAW").is_empty());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn twiki_bad_run_reports_line() {
        let err = TwikiRuns::parse("/A/Run2018A-v1/RAW\tx\t[12, x]\n").unwrap_err();
        assert_eq!(err.0, 1);
    }
}
