use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Why the run couldn't finish. Any of these exits with status 1.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not set up the object store")]
    Store,
    #[display("could not set up the compression service")]
    Service,
    #[display("sync aborted")]
    Sync,
}
