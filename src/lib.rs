pub mod api;
pub mod assemble;
pub mod models;
pub mod output;
pub mod sync;

pub use api::{ApiClient, ApiConfig, ApiError, RateLimitConfig, RateLimiter, RetryPolicy};
pub use assemble::{AssembledCall, DataFlag, ResolvedSegment, SpeakerIdentity, assemble_call};
pub use models::{
    Affiliation, CallMetadata, CallTranscript, ExtensiveCall, Participant, Sentence,
    TranscriptSegment, User, UserDirectory,
};
pub use output::LocalWriter;
pub use sync::{
    CallSource, CallWriter, JsonStateStore, StateStore, SyncConfig, SyncEngine, SyncReport,
    SyncState,
};
