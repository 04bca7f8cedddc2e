//! Mobile enrichment stage: the credit-consuming lookup.
//!
//! Invoked only when the enrichment policy returned `Enrich`. Credit
//! accounting errs toward overcounting: an ambiguous timeout (unknown
//! server-side outcome) marks the lookup as attempted so the orchestrator
//! never re-attempts and double-charges.

use crate::error::AppError;
use crate::models::{ProfileRecord, Stage};
use crate::traits::PeopleApi;

/// Call the mobile-lookup endpoint for a matched record and merge the
/// result in place.
///
/// Uses the stable person id from the match stage, not the raw input
/// identifier. Sets `mobile_lookup_attempted` whenever the remote side
/// processed (or may have processed) the request:
/// - success with a number: phone set, flag set
/// - success without a number: flag set, informational error appended
/// - timeout mid-flight, or a success response with an unreadable body:
///   flag set, error appended, failure propagated
/// - failure before the server processed the request (connect error,
///   rate limit, auth): flag left unset, failure propagated
pub async fn enrich<A: PeopleApi>(api: &A, record: &mut ProfileRecord) -> Result<(), AppError> {
    let Some(person_id) = record.person_id.clone() else {
        return Err(AppError::enrichment(AppError::Validation(
            "record has no person id".into(),
        )));
    };

    match api.mobile_lookup(&person_id).await {
        Ok(response) => {
            record.mobile_lookup_attempted = true;
            match response.phone.filter(|p| !p.is_empty()) {
                Some(phone) => {
                    tracing::info!(%person_id, "Mobile number unlocked");
                    record.mobile_phone = Some(phone);
                }
                None => {
                    tracing::warn!(%person_id, "Credit spent but no number returned");
                    record.push_error(Stage::Mobile, "credit spent but no number returned");
                }
            }
            Ok(())
        }
        Err(e @ (AppError::Timeout(_) | AppError::MalformedResponse(_))) => {
            // Server-side outcome unknown (timeout) or confirmed
            // processed (2xx with an unreadable body): count the spend.
            record.mobile_lookup_attempted = true;
            record.push_error(
                Stage::Mobile,
                format!("server may have processed the lookup, counting credit as spent: {e}"),
            );
            tracing::warn!(%person_id, error = %e, "Mobile lookup failed after send");
            Err(AppError::enrichment(e))
        }
        Err(e) => Err(AppError::enrichment(e)),
    }
}
