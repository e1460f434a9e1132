pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Verifies a structural property of decoded bytes, failing with a
/// malformed-node error.
#[macro_export]
macro_rules! verify_node {
    ($expr:expr) => {{
        let result = $expr;
        $crate::result::verify_node(result, stringify!($expr))?;
    }};
}

/// Verifies a structural property of a decoded meta page, failing with a
/// malformed-meta error.
#[macro_export]
macro_rules! verify_meta {
    ($expr:expr) => {{
        let result = $expr;
        $crate::result::verify_meta(result, stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

#[inline]
pub fn verify_node(predicate: bool, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        Err(crate::error::Error::malformed_node(condition))
    }
}

#[inline]
pub fn verify_meta(predicate: bool, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        Err(crate::error::Error::malformed_meta(condition))
    }
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}
