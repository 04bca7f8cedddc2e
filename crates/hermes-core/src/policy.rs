//! The spend-gating policy: decides whether a record is worth a paid
//! mobile lookup.
//!
//! This is the system's central cost-control invariant, kept as a pure
//! data-driven function so it is verifiable without a network. A credit
//! is spent only on the single case of explicit, high-confidence
//! availability; every ambiguous or already-satisfied case is skipped.

use serde::Serialize;

use crate::models::{MatchStatus, MobileAvailability, ProfileRecord};

/// Why a record was skipped instead of enriched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Match response already carried a verified number.
    AlreadySatisfied,
    /// Remote side holds no mobile number for this person.
    NotAvailableUpstream,
    /// Unrecognized availability signal — conservatively no spend.
    AmbiguousSignal,
    /// Identifier did not resolve to a person.
    NoMatch,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadySatisfied => "already satisfied",
            SkipReason::NotAvailableUpstream => "not available upstream",
            SkipReason::AmbiguousSignal => "ambiguous signal, conservative",
            SkipReason::NoMatch => "no match",
        }
    }
}

/// Outcome of the enrichment policy for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Spend a credit on the mobile lookup.
    Enrich,
    /// Do not spend.
    Skip(SkipReason),
}

/// Decide whether a resolved record warrants the credit-consuming mobile
/// lookup.
///
/// | availability       | match status | decision                     |
/// |--------------------|--------------|------------------------------|
/// | AlreadyVerified    | Matched      | Skip(AlreadySatisfied)       |
/// | AvailableUnlocked  | Matched      | Enrich                       |
/// | NotAvailable       | Matched      | Skip(NotAvailableUpstream)   |
/// | Unknown            | Matched      | Skip(AmbiguousSignal)        |
/// | any                | NotFound     | Skip(NoMatch)                |
pub fn decide(record: &ProfileRecord) -> Decision {
    if record.match_status == MatchStatus::NotFound {
        return Decision::Skip(SkipReason::NoMatch);
    }
    match record.mobile_availability {
        MobileAvailability::AlreadyVerified => Decision::Skip(SkipReason::AlreadySatisfied),
        MobileAvailability::AvailableUnlocked => Decision::Enrich,
        MobileAvailability::NotAvailable => Decision::Skip(SkipReason::NotAvailableUpstream),
        MobileAvailability::Unknown => Decision::Skip(SkipReason::AmbiguousSignal),
    }
}
