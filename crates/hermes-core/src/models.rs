use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

/// A validated LinkedIn profile URL — the unit of work.
///
/// Parsing extracts the stable profile slug from the `/in/<slug>` path
/// segment (e.g. `https://linkedin.com/in/john-doe/` → `john-doe`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    url: String,
    slug: String,
}

impl Identifier {
    /// Validate a raw input line as a profile URL.
    ///
    /// Malformed input fails with [`AppError::Validation`] before any
    /// network call is made.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed)
            .map_err(|e| AppError::Validation(format!("'{trimmed}': {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::Validation(format!(
                    "'{trimmed}': scheme '{scheme}' is not a profile URL"
                )));
            }
        }

        let mut segments = url
            .path_segments()
            .ok_or_else(|| AppError::Validation(format!("'{trimmed}': URL has no path")))?
            .filter(|s| !s.is_empty());

        let mut slug = None;
        while let Some(segment) = segments.next() {
            if segment == "in" {
                slug = segments.next();
                break;
            }
        }
        let slug = slug.ok_or_else(|| {
            AppError::Validation(format!("'{trimmed}': no /in/<profile> segment"))
        })?;

        Ok(Self {
            url: trimmed.to_string(),
            slug: slug.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Whether the match endpoint resolved the identifier to a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    NotFound,
    Matched,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::NotFound => "not_found",
            MatchStatus::Matched => "matched",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mobile-availability signal derived from the match response.
///
/// Closed enumeration produced by exactly one adapter function
/// ([`MobileAvailability::from_remote`]) so upstream schema drift stays
/// contained at the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobileAvailability {
    /// No recognizable signal. Treated conservatively: never spend on it.
    Unknown,
    /// Remote side has no mobile number for this person.
    NotAvailable,
    /// A number exists upstream and can be unlocked with a paid lookup.
    AvailableUnlocked,
    /// The match response already carries a verified number. No spend needed.
    AlreadyVerified,
}

impl MobileAvailability {
    /// Map the remote `mobile_phone_status` indicator to the closed enum.
    ///
    /// Absent and explicit "unavailable" indicators both mean the remote
    /// side holds no number.
    pub fn from_remote(status: Option<&str>) -> Self {
        match status {
            Some("verified") | Some("unlocked") => MobileAvailability::AlreadyVerified,
            Some("available") | Some("locked") => MobileAvailability::AvailableUnlocked,
            Some("unavailable") | Some("no_status") | None => MobileAvailability::NotAvailable,
            Some(_) => MobileAvailability::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MobileAvailability::Unknown => "unknown",
            MobileAvailability::NotAvailable => "not_available",
            MobileAvailability::AvailableUnlocked => "available_unlocked",
            MobileAvailability::AlreadyVerified => "already_verified",
        }
    }
}

impl fmt::Display for MobileAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MobileAvailability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(MobileAvailability::Unknown),
            "not_available" => Ok(MobileAvailability::NotAvailable),
            "available_unlocked" => Ok(MobileAvailability::AvailableUnlocked),
            "already_verified" => Ok(MobileAvailability::AlreadyVerified),
            _ => Err(format!("Unknown mobile availability: {s}")),
        }
    }
}

/// Pipeline stage an error was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Match,
    Mobile,
    Run,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::Match => "match",
            Stage::Mobile => "mobile",
            Stage::Run => "run",
        }
    }
}

/// One error descriptor accumulated on a record. Later failures never
/// discard earlier partial data, they only append here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage.as_str(), self.message)
    }
}

/// Normalized person profile returned by the match endpoint.
///
/// All fields except the stable person id may be absent; absence is not
/// an error. `mobile_status` carries the raw remote indicator — the rest
/// of the core only ever sees [`MobileAvailability`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonProfile {
    pub person_id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub company_website: Option<String>,
    pub company_industry: Option<String>,
    pub email: Option<String>,
    pub mobile_status: Option<String>,
    pub mobile_phone: Option<String>,
}

/// Response of the primary match operation. `person: None` means the
/// remote side found no match (distinct from a transport failure).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub person: Option<PersonProfile>,
}

/// Response of the credit-consuming mobile lookup. `phone: None` means
/// the credit was spent but no number came back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileResponse {
    pub phone: Option<String>,
}

/// The accumulating result for one identifier.
///
/// Created at the start of the per-identifier pipeline, mutated by the
/// match stage and optionally the enrichment stage, then finalized.
/// Never dropped: failed records are retained with populated `errors`.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRecord {
    pub identifier: String,
    pub match_status: MatchStatus,
    pub person_id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub company_website: Option<String>,
    pub company_industry: Option<String>,
    pub email: Option<String>,
    pub mobile_availability: MobileAvailability,
    pub mobile_phone: Option<String>,
    /// True iff a credit-consuming mobile lookup was issued for this record.
    pub mobile_lookup_attempted: bool,
    pub errors: Vec<StageError>,
}

impl ProfileRecord {
    /// Fresh record for an identifier, before the match stage runs.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            match_status: MatchStatus::NotFound,
            person_id: None,
            name: None,
            title: None,
            company: None,
            company_website: None,
            company_industry: None,
            email: None,
            mobile_availability: MobileAvailability::Unknown,
            mobile_phone: None,
            mobile_lookup_attempted: false,
            errors: Vec::new(),
        }
    }

    pub fn push_error(&mut self, stage: Stage, message: impl Into<String>) {
        self.errors.push(StageError::new(stage, message));
    }

    /// Flattened representation of `errors` for tabular output.
    pub fn errors_joined(&self) -> String {
        self.errors
            .iter()
            .map(StageError::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_extracts_slug() {
        let id = Identifier::parse("https://www.linkedin.com/in/john-doe-example/").unwrap();
        assert_eq!(id.slug(), "john-doe-example");
        assert_eq!(id.url(), "https://www.linkedin.com/in/john-doe-example/");
    }

    #[test]
    fn identifier_trims_whitespace() {
        let id = Identifier::parse("  https://linkedin.com/in/jane-roe\n").unwrap();
        assert_eq!(id.slug(), "jane-roe");
    }

    #[test]
    fn identifier_rejects_missing_profile_segment() {
        assert!(matches!(
            Identifier::parse("https://www.linkedin.com/company/acme"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            Identifier::parse("https://www.linkedin.com/in/"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn identifier_rejects_malformed_input() {
        assert!(matches!(
            Identifier::parse("not-a-url"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            Identifier::parse("ftp://linkedin.com/in/someone"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn availability_mapping_covers_remote_statuses() {
        use MobileAvailability::*;
        assert_eq!(MobileAvailability::from_remote(Some("verified")), AlreadyVerified);
        assert_eq!(MobileAvailability::from_remote(Some("unlocked")), AlreadyVerified);
        assert_eq!(MobileAvailability::from_remote(Some("available")), AvailableUnlocked);
        assert_eq!(MobileAvailability::from_remote(Some("locked")), AvailableUnlocked);
        assert_eq!(MobileAvailability::from_remote(Some("unavailable")), NotAvailable);
        assert_eq!(MobileAvailability::from_remote(Some("no_status")), NotAvailable);
        assert_eq!(MobileAvailability::from_remote(None), NotAvailable);
        assert_eq!(MobileAvailability::from_remote(Some("something_new")), Unknown);
    }

    #[test]
    fn availability_roundtrip() {
        for availability in [
            MobileAvailability::Unknown,
            MobileAvailability::NotAvailable,
            MobileAvailability::AvailableUnlocked,
            MobileAvailability::AlreadyVerified,
        ] {
            let s = availability.as_str();
            let parsed: MobileAvailability = s.parse().unwrap();
            assert_eq!(parsed, availability);
        }
    }

    #[test]
    fn new_record_starts_unmatched() {
        let record = ProfileRecord::new("https://linkedin.com/in/a");
        assert_eq!(record.match_status, MatchStatus::NotFound);
        assert_eq!(record.mobile_availability, MobileAvailability::Unknown);
        assert!(!record.mobile_lookup_attempted);
        assert!(record.errors.is_empty());
    }

    #[test]
    fn errors_joined_flattens_in_order() {
        let mut record = ProfileRecord::new("https://linkedin.com/in/a");
        record.push_error(Stage::Match, "first");
        record.push_error(Stage::Mobile, "second");
        assert_eq!(record.errors_joined(), "[match] first; [mobile] second");
    }
}
