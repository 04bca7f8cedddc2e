use std::future::Future;

use crate::error::AppError;
use crate::models::{Identifier, MatchResponse, MobileResponse};

/// The two logical operations of the remote people-data API.
///
/// Implementations attach the configured credential to every request and
/// translate HTTP-level outcomes into the [`AppError`] taxonomy. They
/// hold no state between calls; retry and pacing belong to the batch
/// orchestrator, not the transport.
pub trait PeopleApi: Send + Sync + Clone {
    /// Primary, low-cost lookup: resolve an identifier to a profile and
    /// a mobile-availability signal.
    fn match_person(
        &self,
        identifier: &Identifier,
    ) -> impl Future<Output = Result<MatchResponse, AppError>> + Send;

    /// Secondary, credit-consuming lookup: retrieve a mobile number for
    /// a matched person's stable id.
    fn mobile_lookup(
        &self,
        person_id: &str,
    ) -> impl Future<Output = Result<MobileResponse, AppError>> + Send;
}
