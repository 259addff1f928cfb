use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComposeError>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, detected before any rendering starts.
    Validation,
    /// Rendering, merging or writing the output failed.
    Render,
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("validation error: {context}")]
    InvalidInput {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("validation error: {context}")]
    InvalidSource {
        context: String,
        #[source]
        source: lopdf::Error,
    },

    #[error("render error: {0}")]
    Render(String),

    #[error("render error: {context}")]
    Pdf {
        context: String,
        #[source]
        source: lopdf::Error,
    },

    #[error("write error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ComposeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidInput { .. } | Self::InvalidSource { .. } => {
                ErrorKind::Validation
            }
            Self::Render(_) | Self::Pdf { .. } | Self::Io { .. } => ErrorKind::Render,
        }
    }
}

/// `with_context` for the two foreign error types the pipeline sees.
pub(crate) trait ResultExt<T> {
    fn pdf_context<F: FnOnce() -> String>(self, context: F) -> Result<T>;
}

impl<T> ResultExt<T> for lopdf::Result<T> {
    fn pdf_context<F: FnOnce() -> String>(self, context: F) -> Result<T> {
        self.map_err(|source| ComposeError::Pdf {
            context: context(),
            source,
        })
    }
}

pub(crate) trait IoResultExt<T> {
    fn io_context<F: FnOnce() -> String>(self, context: F) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn io_context<F: FnOnce() -> String>(self, context: F) -> Result<T> {
        self.map_err(|source| ComposeError::Io {
            context: context(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(ComposeError::validation("x").to_string().starts_with("validation error:"));
        assert!(ComposeError::render("x").to_string().starts_with("render error:"));
    }

    #[test]
    fn kinds_split_validation_from_render() {
        assert_eq!(ComposeError::validation("empty label").kind(), ErrorKind::Validation);
        assert_eq!(ComposeError::render("merge").kind(), ErrorKind::Render);

        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Err::<(), _>(missing).io_context(|| "Failed to write out.pdf".to_string());
        assert_eq!(err.unwrap_err().kind(), ErrorKind::Render);
    }

    #[test]
    fn underlying_cause_is_attached() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ComposeError::InvalidInput {
            context: "Failed to open text file".to_string(),
            source: missing,
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.source().unwrap().to_string(), "gone");
    }
}
