use std::collections::BTreeSet;

/// Ordinal tempo scale used for tempo affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoBucket {
    Slow,
    Medium,
    Fast,
    /// tempo was not reported, neutral during scoring
    Unknown,
}

impl TempoBucket {
    fn ordinal(self) -> Option<i8> {
        match self {
            TempoBucket::Slow => Some(0),
            TempoBucket::Medium => Some(1),
            TempoBucket::Fast => Some(2),
            TempoBucket::Unknown => None,
        }
    }

    /// Distance on the ordinal scale, `None` if either side is unknown.
    pub fn distance(self, other: TempoBucket) -> Option<u8> {
        let (a, b) = (self.ordinal()?, other.ordinal()?);
        Some(a.abs_diff(b))
    }
}

/// Identity used by diversity caps.
///
/// Unknown artists and albums are keyed by the owning track, so two
/// tracks with missing artist never count as the same artist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiversityKey {
    Known(String),
    Unknown { track_id: String },
}

impl DiversityKey {
    pub fn known(&self) -> Option<&str> {
        match self {
            DiversityKey::Known(id) => Some(id),
            DiversityKey::Unknown { .. } => None,
        }
    }
}

/// Normalized, comparable form of [`TrackMetadata`](super::track::TrackMetadata).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub track_id: String,
    pub artist: DiversityKey,
    pub album: DiversityKey,
    pub genres: BTreeSet<String>,
    pub moods: BTreeSet<String>,
    pub tempo: TempoBucket,
    pub year: Option<i32>,
    pub display: DisplayInfo,
}

/// Fields carried through to the response untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayInfo {
    pub title: Option<String>,
    pub artist_name: Option<String>,
    pub cover_art_url: Option<String>,
}

/// A candidate together with its similarity to the seed.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub track_id: String,
    pub score: f64,
    pub features: FeatureRecord,
}
