use thiserror::Error;

/// Misuse of a promise.
///
/// These are programmer errors rather than rejections: the promise involved is
/// left pending and no subscriber observes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("promise resolved with itself")]
    ResolvedWithItself,
    #[error("promise rejected with itself")]
    RejectedWithItself,
}
