use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "I/O error for {path_desc}: {source}",
        path_desc = PathDisplay(path)
    )]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "failed to parse {format} {path_desc}{node_desc}: {details} (line {line_number})",
        path_desc = PathDisplay(path),
        node_desc = NodeDisplay(node)
    )]
    Parse {
        format: &'static str,
        path: Option<PathBuf>,
        line_number: usize,
        node: Option<String>,
        details: String,
    },

    #[error(
        "inconsistent data in {format} {path_desc}: {details}",
        path_desc = PathDisplay(path)
    )]
    InconsistentData {
        format: &'static str,
        path: Option<PathBuf>,
        details: String,
    },
}

impl Error {
    pub fn from_io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { path, source }
    }

    pub fn parse(
        format: &'static str,
        path: Option<PathBuf>,
        line_number: usize,
        details: impl Into<String>,
    ) -> Self {
        Self::Parse {
            format,
            path,
            line_number,
            node: None,
            details: details.into(),
        }
    }

    /// Parse failure attributed to a specific document node, e.g. `n id=12`.
    pub fn parse_node(
        format: &'static str,
        path: Option<PathBuf>,
        line_number: usize,
        node: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::Parse {
            format,
            path,
            line_number,
            node: Some(node.into()),
            details: details.into(),
        }
    }

    pub fn inconsistent_data(
        format: &'static str,
        path: Option<PathBuf>,
        details: impl Into<String>,
    ) -> Self {
        Self::InconsistentData {
            format,
            path,
            details: details.into(),
        }
    }

    /// Attaches a path to errors raised while reading an anonymous stream.
    pub fn with_path(self, new_path: PathBuf) -> Self {
        match self {
            Self::Io { path: None, source } => Self::Io {
                path: Some(new_path),
                source,
            },
            Self::Parse {
                format,
                path: None,
                line_number,
                node,
                details,
            } => Self::Parse {
                format,
                path: Some(new_path),
                line_number,
                node,
                details,
            },
            Self::InconsistentData {
                format,
                path: None,
                details,
            } => Self::InconsistentData {
                format,
                path: Some(new_path),
                details,
            },
            other => other,
        }
    }
}

struct PathDisplay<'a>(&'a Option<PathBuf>);

impl<'a> fmt::Display for PathDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(p) => write!(f, "file '{}'", p.display()),
            None => write!(f, "stream source"),
        }
    }
}

struct NodeDisplay<'a>(&'a Option<String>);

impl<'a> fmt::Display for NodeDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(node) => write!(f, " at node <{}>", node),
            None => Ok(()),
        }
    }
}
