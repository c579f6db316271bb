use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn out_of_memory(requested: Option<u64>) -> Error {
        Error(ErrorKind::OutOfMemory { requested }.into())
    }

    pub fn internal(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Internal {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn cant_unpack(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::CantUnpack {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn cant_pack(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::CantPack {
                message: message.into(),
            }
            .into(),
        )
    }

    /// Allocation or size computation was denied.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self.kind(), ErrorKind::OutOfMemory { .. })
    }

    /// A broken invariant in the calling code, never caused by input data alone.
    pub fn is_internal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Internal { .. })
    }

    /// A range or null-pointer violation, typically triggered by malformed input.
    pub fn is_cant_unpack(&self) -> bool {
        matches!(self.kind(), ErrorKind::CantUnpack { .. })
    }

    pub fn is_cant_pack(&self) -> bool {
        matches!(self.kind(), ErrorKind::CantPack { .. })
    }

    /// Returns the human-readable message carried by the error.
    pub fn message(&self) -> String {
        match self.kind() {
            ErrorKind::OutOfMemory { .. } => self.to_string(),
            ErrorKind::Internal { message }
            | ErrorKind::CantUnpack { message }
            | ErrorKind::CantPack { message } => message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error(
        "out of memory{}",
        requested.map(|n| format!(" (requested {n} bytes)")).unwrap_or_default())]
    OutOfMemory { requested: Option<u64> },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("can't unpack: {message}")]
    CantUnpack { message: String },

    #[error("can't pack: {message}")]
    CantPack { message: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::alloc::LayoutError> for Error {
    fn from(_: std::alloc::LayoutError) -> Self {
        Error::out_of_memory(None)
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(_: std::num::TryFromIntError) -> Self {
        Error::out_of_memory(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert!(Error::out_of_memory(Some(10)).is_out_of_memory());
        assert!(Error::internal("x").is_internal());
        assert!(Error::cant_unpack("x").is_cant_unpack());
        assert!(Error::cant_pack("x").is_cant_pack());
        assert!(!Error::cant_pack("x").is_internal());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::out_of_memory(Some(42)).to_string(),
            "out of memory (requested 42 bytes)"
        );
        assert_eq!(Error::out_of_memory(None).to_string(), "out of memory");
        assert_eq!(
            Error::internal("block not allocated").to_string(),
            "internal error: block not allocated"
        );
        assert_eq!(Error::cant_pack("bad subref").message(), "bad subref");
    }
}
