//! Transaction isolation levels.

/// Isolation level requested for a transaction on a [`RelationalConnection`](crate::connection::RelationalConnection).
///
/// Not every backend implements every level; a backend that cannot honor
/// the requested level should upgrade to the next strictest one it
/// supports rather than silently ignore the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    /// No isolation guarantee is requested; the backend's default applies.
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::None
    }
}
