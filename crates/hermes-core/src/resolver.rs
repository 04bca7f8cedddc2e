//! Match stage: resolve an identifier to a profile record and a
//! mobile-availability signal.

use crate::error::AppError;
use crate::models::{Identifier, MatchStatus, MobileAvailability, ProfileRecord};
use crate::traits::PeopleApi;

/// Call the primary match endpoint and build the initial record.
///
/// A remote "no match" is a normal outcome, not an error: the record
/// comes back with `match_status = NotFound` and nothing downstream runs
/// for it. Transport failures wrap as [`AppError::Resolution`]; the
/// orchestrator decides retry.
pub async fn resolve<A: PeopleApi>(
    api: &A,
    identifier: &Identifier,
) -> Result<ProfileRecord, AppError> {
    let mut record = ProfileRecord::new(identifier.url());

    let response = api
        .match_person(identifier)
        .await
        .map_err(AppError::resolution)?;

    let Some(person) = response.person else {
        tracing::info!(identifier = %identifier, "No match found upstream");
        return Ok(record);
    };

    record.match_status = MatchStatus::Matched;
    record.person_id = Some(person.person_id);
    record.name = person.name;
    record.title = person.title;
    record.company = person.company;
    record.company_website = person.company_website;
    record.company_industry = person.company_industry;
    record.email = person.email;
    record.mobile_availability = MobileAvailability::from_remote(person.mobile_status.as_deref());

    // A verified match may already carry the number. Copy it through
    // unchanged so no credit is ever spent on it.
    if record.mobile_availability == MobileAvailability::AlreadyVerified {
        record.mobile_phone = person.mobile_phone.filter(|p| !p.is_empty());
    }

    tracing::info!(
        identifier = %identifier,
        availability = %record.mobile_availability,
        "Matched"
    );

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PersonProfile;
    use crate::testutil::{MockPeopleApi, matched_person};

    fn ident() -> Identifier {
        Identifier::parse("https://linkedin.com/in/john-doe").unwrap()
    }

    #[tokio::test]
    async fn no_match_short_circuits() {
        let api = MockPeopleApi::with_no_match();
        let record = resolve(&api, &ident()).await.unwrap();

        assert_eq!(record.match_status, MatchStatus::NotFound);
        assert_eq!(record.mobile_availability, MobileAvailability::Unknown);
        assert!(record.person_id.is_none());
    }

    #[tokio::test]
    async fn matched_populates_profile_fields() {
        let api = MockPeopleApi::with_match(matched_person("available"));
        let record = resolve(&api, &ident()).await.unwrap();

        assert_eq!(record.match_status, MatchStatus::Matched);
        assert_eq!(record.person_id.as_deref(), Some("person-1"));
        assert_eq!(record.name.as_deref(), Some("John Doe"));
        assert_eq!(record.title.as_deref(), Some("Engineer"));
        assert_eq!(record.company.as_deref(), Some("Acme"));
        assert_eq!(record.email.as_deref(), Some("john@acme.test"));
        assert_eq!(
            record.mobile_availability,
            MobileAvailability::AvailableUnlocked
        );
        assert!(record.mobile_phone.is_none());
    }

    #[tokio::test]
    async fn absent_fields_are_not_an_error() {
        let person = PersonProfile {
            person_id: "person-2".into(),
            mobile_status: Some("unavailable".into()),
            ..Default::default()
        };
        let api = MockPeopleApi::with_match(person);
        let record = resolve(&api, &ident()).await.unwrap();

        assert_eq!(record.match_status, MatchStatus::Matched);
        assert!(record.name.is_none());
        assert!(record.email.is_none());
        assert_eq!(record.mobile_availability, MobileAvailability::NotAvailable);
    }

    #[tokio::test]
    async fn verified_match_carries_phone_through() {
        let mut person = matched_person("verified");
        person.mobile_phone = Some("+15551234567".into());
        let api = MockPeopleApi::with_match(person);
        let record = resolve(&api, &ident()).await.unwrap();

        assert_eq!(
            record.mobile_availability,
            MobileAvailability::AlreadyVerified
        );
        assert_eq!(record.mobile_phone.as_deref(), Some("+15551234567"));
        assert!(!record.mobile_lookup_attempted);
    }

    #[tokio::test]
    async fn unverified_phone_is_not_copied() {
        let mut person = matched_person("available");
        person.mobile_phone = Some("+15550000000".into());
        let api = MockPeopleApi::with_match(person);
        let record = resolve(&api, &ident()).await.unwrap();

        assert!(record.mobile_phone.is_none());
    }

    #[tokio::test]
    async fn client_errors_wrap_as_resolution() {
        let api = MockPeopleApi::with_match_error(AppError::RateLimited);
        let err = resolve(&api, &ident()).await.unwrap_err();

        assert!(matches!(err, AppError::Resolution(_)));
        assert!(err.is_retryable());
    }
}
