use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub type CandidateId = u32;

/// Named id ranges used by the problem set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Track {
    Lightning,
    Block,
}

impl Track {
    pub fn ids(self) -> RangeInclusive<CandidateId> {
        match self {
            Track::Lightning => 1..=55,
            Track::Block => 56..=90,
        }
    }
}

/// Restricts which discovered candidates take part in a run.
///
/// Accepts `all`, a track name, or a comma list of ids and inclusive
/// ranges such as `1-10,42`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IdFilter {
    #[default]
    All,
    Track(Track),
    Ranges(Vec<RangeInclusive<CandidateId>>),
}

impl IdFilter {
    pub fn accepts(&self, id: CandidateId) -> bool {
        match self {
            IdFilter::All => true,
            IdFilter::Track(t) => t.ids().contains(&id),
            IdFilter::Ranges(ranges) => ranges.iter().any(|r| r.contains(&id)),
        }
    }
}

impl FromStr for IdFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(IdFilter::All);
        }
        if let Ok(track) = Track::from_str(s) {
            return Ok(IdFilter::Track(track));
        }

        let mut ranges = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let range = match part.split_once('-') {
                Some((lo, hi)) => {
                    let lo = parse_id(lo)?;
                    let hi = parse_id(hi)?;
                    if lo > hi {
                        return Err(format!("range '{}' is reversed", part));
                    }
                    lo..=hi
                }
                None => {
                    let id = parse_id(part)?;
                    id..=id
                }
            };
            ranges.push(range);
        }

        if ranges.is_empty() {
            let tracks: Vec<String> = Track::iter().map(|t| t.to_string()).collect();
            return Err(format!(
                "empty id selector (expected all, {}, or ids like 1-10,42)",
                tracks.join(", ")
            ));
        }
        Ok(IdFilter::Ranges(ranges))
    }
}

impl fmt::Display for IdFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdFilter::All => write!(f, "all"),
            IdFilter::Track(t) => write!(f, "{}", t),
            IdFilter::Ranges(ranges) => {
                let parts: Vec<String> = ranges
                    .iter()
                    .map(|r| {
                        if r.start() == r.end() {
                            r.start().to_string()
                        } else {
                            format!("{}-{}", r.start(), r.end())
                        }
                    })
                    .collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

impl TryFrom<String> for IdFilter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IdFilter> for String {
    fn from(value: IdFilter) -> Self {
        value.to_string()
    }
}

fn parse_id(s: &str) -> Result<CandidateId, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("'{}' is not a candidate id", s.trim()))
}

/// Maps a canonical `<id>.<ext>` file name back to its id.
/// Hidden files and anything else in the directory yield `None`.
pub fn id_from_path(path: &Path, extension: &str) -> Option<CandidateId> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
    stem.parse().ok()
}

pub fn file_name(id: CandidateId, extension: &str) -> String {
    format!("{}.{}", id, extension)
}
