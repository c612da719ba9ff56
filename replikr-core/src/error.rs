use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`vus` must be a positive integer")]
    InvalidVus,

    #[error("`iterations` must be a positive integer")]
    InvalidIterations,

    #[error("`rate` must be a positive integer")]
    InvalidRate,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("`timeUnit` must be a positive duration")]
    InvalidTimeUnit,

    #[error("`preAllocatedVUs` must be a positive integer")]
    InvalidPreAllocatedVus,

    #[error("`maxVUs` must be >= `preAllocatedVUs`")]
    InvalidMaxVus,

    #[error("`operations` must be a non-empty list of GET/POST/DELETE")]
    NoOperations,

    #[error("`resource` must start with `/`: `{0}`")]
    InvalidResource(String),

    #[error("membership schedule must contain at least one step")]
    EmptyMembership,

    #[error("membership schedule must start at t=0 (first step starts at {0:?})")]
    MembershipStartNonZero(Duration),

    #[error("membership steps must be strictly ordered by start time")]
    MembershipUnordered,

    #[error("invalid output path: `{0}`")]
    InvalidOutputPath(String),
}
