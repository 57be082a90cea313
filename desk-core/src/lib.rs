//! Routing core for deskflow.
//!
//! Holds the live connection registry, the session store, the message router
//! and the background enrichment coordinator, plus the collaborator traits
//! (persistence, cache, content generation, similarity search, spreadsheet
//! export) the application wires together at startup.

mod cache;
mod enrichment;
mod error;
mod fields;
mod models;
mod registry;
mod responder;
mod router;
mod sessions;
mod sqlite;
mod store;

pub use cache::MemoryCache;
pub use enrichment::{EnrichmentConfig, EnrichmentCoordinator, merge_fields};
pub use error::{Result, RoutingError};
pub use fields::{FieldConfigService, build_export_row};
pub use models::{
    ChatSession, CustomerInfo, DashboardSummary, FieldConfig, Message, MessageId, NewFieldConfig,
    NewMessage, SenderType, SessionId, SessionStatus, SessionView, WsEvent,
};
pub use registry::{ConnectionRegistry, FrameSender};
pub use responder::{AutoReplier, Reply};
pub use router::MessageRouter;
pub use sessions::SessionStore;
pub use sqlite::SqliteStore;
pub use store::{
    Cache, ContentGenerator, MergeOutcome, NoopSheetExporter, NoopSimilaritySearch, ScoredChunk,
    SheetExporter, SimilaritySearch, Store,
};
