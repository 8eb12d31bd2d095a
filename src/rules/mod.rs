use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::context::VerificationContext;

mod family;
mod person;

pub use family::FamilyRule;
pub use person::PersonRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "E",
            Self::Warning => "W",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Person,
    Family,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::Family => "Family",
        }
    }
}

/// Outcome of one rule against one entity. Rules that report separately on
/// each parent say which one triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    NotBroken,
    Broken,
    Father,
    Mother,
}

impl Verdict {
    pub fn is_broken(self) -> bool {
        self != Self::NotBroken
    }

    pub(crate) fn from_bool(broken: bool) -> Self {
        if broken { Self::Broken } else { Self::NotBroken }
    }
}

/// Suppression key of a violation: the rule id plus the parameter values the
/// rule ran with. Booleans are encoded as 0/1.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViolationIdentity {
    pub rule_id: u32,
    pub params: Vec<i64>,
}

impl ViolationIdentity {
    pub fn new(rule_id: u32, params: Vec<i64>) -> Self {
        Self { rule_id, params }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub message: String,
    pub display_id: String,
    pub display_name: String,
    pub kind: EntityKind,
    pub identity: ViolationIdentity,
    pub severity: Severity,
    pub handle: String,
}

pub trait Rule {
    type Subject;

    const KIND: EntityKind;

    fn id(&self) -> u32;
    fn severity(&self) -> Severity;
    fn params(&self) -> Vec<i64>;
    fn message(&self, verdict: Verdict) -> &'static str;
    fn evaluate(&self, ctx: &VerificationContext<'_>, subject: &Self::Subject) -> Result<Verdict>;

    fn identity(&self) -> ViolationIdentity {
        ViolationIdentity::new(self.id(), self.params())
    }
}

pub(crate) fn flag(value: bool) -> i64 {
    i64::from(value)
}

pub(crate) fn exceeds(days: i64, limit_years: u32) -> bool {
    crate::dates::years(days) > f64::from(limit_years)
}

pub(crate) fn falls_short(days: i64, limit_years: u32) -> bool {
    crate::dates::years(days) < f64::from(limit_years)
}
