use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("'{program}' did not finish within {:.1} s", timeout.as_secs_f64())]
    Timeout { program: String, timeout: Duration },

    #[error("'{program}' exited with {}: {stderr}", StatusDisplay(*code))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unusable output from '{program}': {details}")]
    BadOutput { program: String, details: String },

    #[error("required executable '{program}' was not found")]
    MissingDependency { program: String },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Shape(#[from] crate::model::Error),
}

impl Error {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn bad_output(program: impl Into<String>, details: impl Into<String>) -> Self {
        Self::BadOutput {
            program: program.into(),
            details: details.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

struct StatusDisplay(Option<i32>);

impl std::fmt::Display for StatusDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, "status {}", code),
            None => write!(f, "a signal"),
        }
    }
}
