use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Type alias for [`std::result::Result`] containing a brokkr [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Enum describing the possible errors that can occur while converting robot descriptions.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("File `{}` does not exist", .0.display())]
    #[diagnostic(
        code(brokkr::missing_file),
        help("Check the path, relative paths are resolved from the current directory.")
    )]
    MissingFile(PathBuf),

    #[error("Failed to access `{}`", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("Failed to parse xml document `{}`", path.display())]
    #[diagnostic(code(brokkr::xml))]
    Xml {
        #[source]
        source: crate::xml::ParseError,
        path: PathBuf,
    },

    #[error(transparent)]
    #[diagnostic(help("Failed to deserialize the export config!"))]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(help("Failed to deserialize the conversion config!"))]
    Toml(#[from] toml::de::Error),

    #[error("External converter failed: {0}")]
    #[diagnostic(
        code(brokkr::converter),
        help("The converter output is printed above!")
    )]
    Converter(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::Io { source, path }
    }

    pub(crate) fn xml(path: impl Into<PathBuf>) -> impl FnOnce(crate::xml::ParseError) -> Self {
        let path = path.into();
        move |source| Error::Xml { source, path }
    }
}
