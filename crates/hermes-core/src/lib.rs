pub mod batch;
pub mod enricher;
pub mod error;
pub mod models;
pub mod pacer;
pub mod policy;
pub mod resolver;
pub mod retry;
pub mod testutil;
pub mod traits;

pub use batch::{BatchOutcome, BatchRunner, FinalizedRecord, RecordStatus};
pub use error::AppError;
pub use models::{
    Identifier, MatchStatus, MobileAvailability, ProfileRecord, Stage, StageError,
};
pub use pacer::Pacer;
pub use policy::{Decision, SkipReason, decide};
pub use retry::{Backoff, ExponentialBackoff, RetryPolicy};
pub use traits::PeopleApi;
