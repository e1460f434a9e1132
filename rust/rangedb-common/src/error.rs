use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Returns `true` when the error reports a disagreement between the
    /// expected and the observed length of a remote source.
    ///
    /// Integrity failures are transient by nature (the source changed between
    /// two requests) and the caller may retry the operation.
    pub fn is_integrity(&self) -> bool {
        matches!(self.kind(), ErrorKind::Integrity { .. })
    }

    pub fn integrity(context: impl Into<String>, expected: u64, actual: u64) -> Error {
        Error(
            ErrorKind::Integrity {
                context: context.into(),
                expected,
                actual,
            }
            .into(),
        )
    }

    pub fn malformed_node(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::MalformedNode {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn malformed_meta(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::MalformedMeta {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn protocol(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Protocol {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn query_validation(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::QueryValidation {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    pub fn parse<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error(
            ErrorKind::Parse {
                context: context.into(),
                source: Box::new(source),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("integrity check failed for '{context}': expected length {expected}, observed {actual}")]
    Integrity {
        context: String,
        expected: u64,
        actual: u64,
    },

    #[error("malformed B+Tree node: {message}")]
    MalformedNode { message: String },

    #[error("malformed meta page: {message}")]
    MalformedMeta { message: String },

    #[error("protocol error: {message}")]
    Protocol { message: String },

    #[error("invalid query: {message}")]
    QueryValidation { message: String },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("failed to parse {context}: {source}")]
    Parse {
        context: String,
        source: StdErrorBoxed,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(_: std::convert::Infallible) -> Self {
        Error::invalid_operation("conversion")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_classification() {
        let err = Error::integrity("index", 4096, 8192);
        assert!(err.is_integrity());
        assert_eq!(
            err.to_string(),
            "integrity check failed for 'index': expected length 4096, observed 8192"
        );
        assert!(!Error::protocol("bad boundary").is_integrity());
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into();
        match err.into_kind() {
            ErrorKind::Io { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::UnexpectedEof)
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }
}
