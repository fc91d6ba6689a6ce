use derive_more::{Display, Error};

pub type Error = exn::Exn<ConfigErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ConfigErrorKind {
    /// A required setting was not provided by any source.
    #[display("missing required setting `{_0}`")]
    Missing(#[error(not(source))] &'static str),
    /// Configuration sources could not be read or extracted.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}

impl ConfigErrorKind {
    /// Configuration problems need the operator, never a retry.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
