pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[inline]
pub fn verify_internal(predicate: bool, message: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        internal_error(message)
    }
}

#[inline]
pub fn verify_unpack(predicate: bool, message: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        cant_unpack(message)
    }
}

#[cold]
pub fn internal_error<T>(message: &str) -> Result<T> {
    Err(crate::error::ErrorKind::Internal {
        message: message.to_string(),
    }
    .into())
}

#[cold]
pub fn cant_unpack<T>(message: &str) -> Result<T> {
    Err(crate::error::ErrorKind::CantUnpack {
        message: message.to_string(),
    }
    .into())
}

#[cold]
pub fn out_of_memory<T>(requested: Option<u64>) -> Result<T> {
    Err(crate::error::ErrorKind::OutOfMemory { requested }.into())
}
