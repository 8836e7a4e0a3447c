//! Result of a store operation that reached (or deliberately skipped) the
//! remote gateway.

/// How a store operation ended.
///
/// Remote failures never surface as `Err`: the store logs them, broadcasts
/// a `RemoteFailed` event and reports [`Outcome::RemoteFailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T = ()> {
    /// The server confirmed and local state was updated.
    Applied(T),
    /// The gateway call failed; local state is unchanged.
    RemoteFailed,
    /// The result arrived after the view it belonged to was replaced, or a
    /// newer call for the same entity made this one redundant.
    Superseded,
    /// The entity is not known locally; nothing was sent.
    Missing,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    /// The applied value, if any.
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(value) => Outcome::Applied(f(value)),
            Outcome::RemoteFailed => Outcome::RemoteFailed,
            Outcome::Superseded => Outcome::Superseded,
            Outcome::Missing => Outcome::Missing,
        }
    }
}
