//! Catalog storage: upload normalisation, staging and commit, grade-band
//! partitions, cached result sets, and saved student scores.

pub mod index;
pub mod ingest;
pub mod service;
pub mod store;

pub use ingest::{
    chunk_rows, normalize_row, normalize_rows, read_csv_rows, IngestionError, RawCatalogRow,
    CHUNK_SIZE,
};
pub use service::{
    AdminAuthority, AuthError, CatalogService, CatalogServiceError, CatalogStatus, ChunkUpload,
    CommittedCatalog, DepartmentLookup, IngestionReceipt, RecommendationQuery,
    RecommendationResponse, SavedScores, ScoresUpdate, SessionVerifier, SharedSecretAuthority,
    StagedChunk,
};
pub use store::{KeyValueStore, StoreError};
