use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an attendee (participant) of a group.
///
/// Ordering is significant: every deterministic tie-break in the engine
/// (remainder cents, equal-magnitude debtors and creditors) uses ascending
/// attendee id.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::attendee::AttendeeId;
///
/// let alice = AttendeeId::new("alice");
/// let bob = AttendeeId::new("bob");
/// assert!(alice < bob);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendeeId(String);

impl AttendeeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this attendee ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttendeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AttendeeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of the group (trip) whose books are being settled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A member of a group as seen by the engine: an id plus a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub id: AttendeeId,
    pub name: String,
}

impl Attendee {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: AttendeeId::new(id),
            name: name.into(),
        }
    }
}
