use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer {0} already exists, refresh it instead")]
    DuplicateId(u64),

    #[error("timer {0} does not exist")]
    UnknownId(u64),
}
