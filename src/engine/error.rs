use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecommendError {
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    #[error("invalid ranking config: {0}")]
    InvalidRankingConfig(String),

    #[error("seed track cannot be resolved: {0}")]
    SeedUnresolvable(String),
}
