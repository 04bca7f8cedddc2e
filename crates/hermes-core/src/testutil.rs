//! Test utilities: a scripted mock of the people-data API.
//!
//! Handwritten mock for dependency injection in unit tests, using
//! `Arc<Mutex<_>>` queues so tests can script per-call outcomes and
//! assert on recorded call counts.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::{
    MatchResponse, MatchStatus, MobileAvailability, MobileResponse, PersonProfile, ProfileRecord,
};
use crate::traits::PeopleApi;

/// Mock API with scripted response queues. Each call pops the next
/// scripted result; an empty queue yields a benign default (no match /
/// no number).
#[derive(Clone, Default)]
pub struct MockPeopleApi {
    match_responses: Arc<Mutex<Vec<Result<MatchResponse, AppError>>>>,
    mobile_responses: Arc<Mutex<Vec<Result<MobileResponse, AppError>>>>,
    match_call_count: Arc<AtomicU32>,
    mobile_call_count: Arc<AtomicU32>,
}

impl MockPeopleApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match endpoint reports no match.
    pub fn with_no_match() -> Self {
        Self::new().push_match(Ok(MatchResponse::default()))
    }

    /// Match endpoint returns the given person.
    pub fn with_match(person: PersonProfile) -> Self {
        Self::new().push_match(Ok(MatchResponse {
            person: Some(person),
        }))
    }

    /// Match endpoint fails with the given error.
    pub fn with_match_error(error: AppError) -> Self {
        Self::new().push_match(Err(error))
    }

    /// Mobile endpoint returns the given number.
    pub fn with_mobile_phone(phone: &str) -> Self {
        Self::new().push_mobile(Ok(MobileResponse {
            phone: Some(phone.to_string()),
        }))
    }

    /// Mobile endpoint processes the request but returns no number.
    pub fn with_mobile_no_number() -> Self {
        Self::new().push_mobile(Ok(MobileResponse::default()))
    }

    /// Mobile endpoint fails with the given error.
    pub fn with_mobile_error(error: AppError) -> Self {
        Self::new().push_mobile(Err(error))
    }

    /// Append a scripted match response.
    pub fn push_match(self, response: Result<MatchResponse, AppError>) -> Self {
        self.match_responses.lock().unwrap().push(response);
        self
    }

    /// Append a scripted mobile response.
    pub fn push_mobile(self, response: Result<MobileResponse, AppError>) -> Self {
        self.mobile_responses.lock().unwrap().push(response);
        self
    }

    /// Number of match calls issued so far.
    pub fn match_calls(&self) -> u32 {
        self.match_call_count.load(Ordering::SeqCst)
    }

    /// Number of credit-consuming mobile calls issued so far.
    pub fn mobile_calls(&self) -> u32 {
        self.mobile_call_count.load(Ordering::SeqCst)
    }
}

impl PeopleApi for MockPeopleApi {
    async fn match_person(
        &self,
        _identifier: &crate::models::Identifier,
    ) -> Result<MatchResponse, AppError> {
        self.match_call_count.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.match_responses.lock().unwrap();
        if responses.is_empty() {
            Ok(MatchResponse::default())
        } else {
            responses.remove(0)
        }
    }

    async fn mobile_lookup(&self, _person_id: &str) -> Result<MobileResponse, AppError> {
        self.mobile_call_count.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.mobile_responses.lock().unwrap();
        if responses.is_empty() {
            Ok(MobileResponse::default())
        } else {
            responses.remove(0)
        }
    }
}

/// A person profile with every field populated and the given raw
/// mobile status.
pub fn matched_person(mobile_status: &str) -> PersonProfile {
    PersonProfile {
        person_id: "person-1".to_string(),
        name: Some("John Doe".to_string()),
        title: Some("Engineer".to_string()),
        company: Some("Acme".to_string()),
        company_website: Some("https://acme.test".to_string()),
        company_industry: Some("Manufacturing".to_string()),
        email: Some("john@acme.test".to_string()),
        mobile_status: Some(mobile_status.to_string()),
        mobile_phone: None,
    }
}

/// A matched record (post-resolution) with the given availability.
pub fn matched_record(availability: MobileAvailability) -> ProfileRecord {
    let mut record = ProfileRecord::new("https://linkedin.com/in/john-doe");
    record.match_status = MatchStatus::Matched;
    record.person_id = Some("person-1".to_string());
    record.name = Some("John Doe".to_string());
    record.mobile_availability = availability;
    record
}
