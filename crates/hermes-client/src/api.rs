use std::time::Duration;

use hermes_core::error::AppError;
use hermes_core::models::{
    Identifier, MatchResponse, MobileResponse, PersonProfile,
};
use hermes_core::traits::PeopleApi;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://api.apollo.io/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// People-data API client using reqwest.
///
/// Posts JSON to the two logical endpoints with the API key attached to
/// every request. Wire-schema knowledge lives entirely in this module:
/// the rest of the system only sees the normalized core types.
#[derive(Clone)]
pub struct ReqwestPeopleApi {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl ReqwestPeopleApi {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(&self.api_key, &self.base_url, timeout)
    }

    fn build(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent("Hermes/0.2 (contact enrichment)")
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        payload: serde_json::Value,
    ) -> Result<T, AppError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::Network(format!("Connection failed: {e}"))
                } else {
                    AppError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        // Past this point the server has processed the request: failures
        // reading or parsing the body must not look like pre-send
        // transport errors, or a credit-consuming call could be retried
        // into a double charge.
        let body = response.text().await.map_err(|e| {
            AppError::MalformedResponse(format!("failed to read response body: {e}"))
        })?;
        parse_success_body(&body)
    }
}

impl PeopleApi for ReqwestPeopleApi {
    async fn match_person(&self, identifier: &Identifier) -> Result<MatchResponse, AppError> {
        tracing::debug!(identifier = %identifier, "Calling match endpoint");
        let payload = json!({
            "linkedin_url": identifier.url(),
            "match_on_website": true,
        });
        let wire: WireMatchResponse = self.post_json("people/match", payload).await?;
        Ok(MatchResponse {
            person: wire.person.map(person_from_wire),
        })
    }

    async fn mobile_lookup(&self, person_id: &str) -> Result<MobileResponse, AppError> {
        tracing::debug!(%person_id, "Calling mobile-lookup endpoint");
        let payload = json!({
            "id": person_id,
            "mobile_phone_only": true,
        });
        let wire: WireMatchResponse = self.post_json("people/mobile/search", payload).await?;
        Ok(MobileResponse {
            phone: wire
                .person
                .and_then(|p| p.mobile_phone_number)
                .filter(|p| !p.is_empty()),
        })
    }
}

/// Parse the body of a success response.
fn parse_success_body<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, AppError> {
    serde_json::from_str(body).map_err(|e| AppError::MalformedResponse(e.to_string()))
}

/// Classify a non-2xx status into the error taxonomy.
///
/// 401/403 are fatal for the run; 429 and 5xx are retryable; 408 is the
/// one 4xx on the retry allow-list; everything else is terminal for the
/// identifier.
fn error_for_status(status: u16, body: &str) -> AppError {
    let message = serde_json::from_str::<WireError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| format!("HTTP {status}: {body}"));

    match status {
        401 | 403 => AppError::Auth(message),
        429 => AppError::RateLimited,
        _ => AppError::Api {
            message,
            status_code: status,
            retryable: status == 408 || status >= 500,
        },
    }
}

// ---- Wire types (remote schema, versioned/unstable) ----

#[derive(Debug, Deserialize)]
struct WireMatchResponse {
    person: Option<WirePerson>,
}

#[derive(Debug, Deserialize)]
struct WirePerson {
    id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    title: Option<String>,
    email: Option<String>,
    organization: Option<WireOrganization>,
    mobile_phone_status: Option<String>,
    mobile_phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireOrganization {
    name: Option<String>,
    website_url: Option<String>,
    industry: Option<String>,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}

fn person_from_wire(person: WirePerson) -> PersonProfile {
    let name = match (&person.first_name, &person.last_name) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(first), None) => Some(first.clone()),
        (None, Some(last)) => Some(last.clone()),
        (None, None) => None,
    };
    let (company, company_website, company_industry) = match person.organization {
        Some(org) => (org.name, org.website_url, org.industry),
        None => (None, None, None),
    };

    PersonProfile {
        person_id: person.id,
        name,
        title: person.title,
        company,
        company_website,
        company_industry,
        email: person.email.filter(|e| !e.is_empty()),
        mobile_status: person.mobile_phone_status,
        mobile_phone: person.mobile_phone_number.filter(|p| !p.is_empty()),
    }
}
