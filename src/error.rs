use thiserror::Error;

/// Any error the crate can return, for callers that chain several stages.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] crate::model::Error),

    #[error(transparent)]
    Io(#[from] crate::io::Error),

    #[error(transparent)]
    Archive(#[from] crate::archive::Error),

    #[error(transparent)]
    Driver(#[from] crate::driver::Error),

    #[error(transparent)]
    Config(#[from] crate::config::Error),
}
