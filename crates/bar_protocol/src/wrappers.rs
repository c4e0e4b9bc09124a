use serde::{Deserialize, Serialize};

/// The identifier of a probe. Segments produced by a probe carry it in their `name` field.
#[repr(transparent)]
#[derive(
    Clone,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::AsRef,
    derive_more::From,
    derive_more::Display,
    derive_more::Debug,
)]
#[debug("ProbeId({})", _0)]
pub struct ProbeId(pub String);

impl ProbeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ProbeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProbeId {
    fn from(s: &str) -> Self {
        ProbeId(s.to_owned())
    }
}

impl PartialEq<str> for ProbeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
