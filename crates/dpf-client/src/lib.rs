//! DPF client - typed GraphQL client for the MLIT Data Platform.
//!
//! This crate provides:
//! - Typed query construction with variables, never string splicing.
//! - Client-side rate limiting and retry with jittered backoff.
//! - A process-lifetime cache of administrative code tables with
//!   free-text place-name resolution.
//! - Cursor pagination over the `getAllData` bulk export.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

mod cache;
mod client;
mod config;
mod error;
mod normalize;
mod operation;
mod pagination;
mod query;
mod retry;
mod types;

pub use client::{DpfClient, DpfClientBuilder, DpfClientMetrics, DpfClientMetricsSnapshot};
pub use config::{DEFAULT_BASE_URL, DEFAULT_RATE, DpfConfig};
pub use error::{
    DpfClientError, GraphqlError, GraphqlErrorLocation, GraphqlPathSegment, HttpErrorInfo,
};
pub use normalize::{MunicipalityCandidate, NormalizeRequest, NormalizedCodes};
pub use operation::{GraphqlRequest, GraphqlResponse};
pub use pagination::{AllDataCollection, AllDataPages};
pub use query::{
    AttributeClause, AttributeFilter, AttributeFilterNode, CountDataRequest, DetailLevel,
    GeoDistanceFilter, GetAllDataRequest, LatLon, LocationFilter, MAX_BATCH_SIZE, MAX_DISTANCE_M,
    MAX_SEARCH_SIZE, RectangleFilter, SearchRequest, SortOrder, SpatialFilter, SuggestRequest,
};
pub use retry::{RetryDecision, RetryPolicy};
pub use types::{
    AllDataPage, AllDataRecord, CatalogDataset, CatalogEntry, CountResult, DataRecord,
    DataResults, DownloadUrl, FileRef, Municipality, Prefecture, SearchRecord, SearchResults,
    Suggestion, Suggestions, Tileset,
};
