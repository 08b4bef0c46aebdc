use serde::{Deserialize, Serialize};

/// Handle onto an external actor (user, service account, …) that may hold
/// roles and direct permission grants.
///
/// The identity system itself lives outside this core; the polymorphic
/// (type, id) pair is all the join tables key on, so any host model can be
/// addressed without the core knowing its shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub subject_type: String,
    pub subject_id: i64,
}

impl Subject {
    pub fn new(subject_type: impl Into<String>, subject_id: i64) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id,
        }
    }

    /// Conventional constructor for the common case.
    pub fn user(id: i64) -> Self {
        Self::new("user", id)
    }
}
