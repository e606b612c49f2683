//! Record types returned by the platform.
//!
//! Field names follow the platform schema, which mixes snake_case
//! (`dataset_id`, `original_path`) and camelCase (`hasThumbnail`,
//! `nextDataRequestToken`); renames are applied per field rather than
//! with a container-level rename rule.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

/// Codes arrive as either JSON numbers or strings depending on the
/// dataset; normalize to a string at the boundary.
#[derive(Deserialize)]
#[serde(untagged)]
enum Code {
    Text(String),
    Number(i64),
}

impl Code {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

fn de_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Code::deserialize(deserializer).map(Code::into_string)
}

fn de_code_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Code>::deserialize(deserializer).map(|code| code.map(Code::into_string))
}

/// One record from a `search` result page.
///
/// Which fields are present depends on the requested detail level; the
/// rest deserialize as `None`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchRecord {
    /// Record identifier.
    pub id: String,
    /// Record title.
    #[serde(default)]
    pub title: Option<String>,
    /// Latitude.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude.
    #[serde(default)]
    pub lon: Option<f64>,
    /// Owning dataset identifier.
    #[serde(default)]
    pub dataset_id: Option<String>,
    /// Publication year (basic and detail levels).
    #[serde(default, deserialize_with = "de_code_opt")]
    pub year: Option<String>,
    /// Owning catalog identifier (basic and detail levels).
    #[serde(default)]
    pub catalog_id: Option<String>,
    /// Theme classification (detail level).
    #[serde(default)]
    pub theme: Option<String>,
    /// Opaque metadata document (detail level).
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Whether a thumbnail exists (detail level).
    #[serde(default, rename = "hasThumbnail")]
    pub has_thumbnail: Option<bool>,
}

/// A `search` result page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResults {
    /// Total matching records across all pages.
    #[serde(rename = "totalNumber")]
    pub total_number: u64,
    /// Records on this page.
    #[serde(default, rename = "searchResults")]
    pub search_results: Vec<SearchRecord>,
}

/// One record from a `getAllData` batch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AllDataRecord {
    /// Record identifier.
    pub id: String,
    /// Record title.
    #[serde(default)]
    pub title: Option<String>,
    /// Opaque metadata document.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// One `getAllData` batch plus its continuation token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AllDataPage {
    /// Continuation token; absent on the final batch.
    #[serde(default, rename = "nextDataRequestToken")]
    pub next_data_request_token: Option<String>,
    /// Records in this batch.
    #[serde(default)]
    pub data: Vec<AllDataRecord>,
}

/// A dataset nested under a catalog entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogDataset {
    /// Dataset identifier.
    pub id: String,
    /// Dataset title.
    #[serde(default)]
    pub title: Option<String>,
    /// Number of records in the dataset.
    #[serde(default)]
    pub data_count: Option<u64>,
}

/// One catalog entry from `dataCatalog`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogEntry {
    /// Catalog identifier.
    pub id: String,
    /// Catalog title.
    #[serde(default)]
    pub title: Option<String>,
    /// Datasets in the catalog (when requested).
    #[serde(default)]
    pub datasets: Vec<CatalogDataset>,
}

/// A file reference on a data record; also the input shape for the
/// download-URL operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// File identifier.
    pub id: String,
    /// Path within the dataset storage.
    pub original_path: String,
}

/// 3D tileset attachment on a data record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tileset {
    /// Tileset URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Vertical offset applied when rendering.
    #[serde(default)]
    pub altitude_offset_meters: Option<f64>,
}

/// One record from the `data` query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataRecord {
    /// Record identifier.
    pub id: String,
    /// Record title.
    #[serde(default)]
    pub title: Option<String>,
    /// Opaque metadata document.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Attached files.
    #[serde(default)]
    pub files: Vec<FileRef>,
    /// Whether a thumbnail exists.
    #[serde(default, rename = "hasThumbnail")]
    pub has_thumbnail: Option<bool>,
    /// 3D tileset attachment.
    #[serde(default)]
    pub tileset: Option<Tileset>,
}

/// A `data` query result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataResults {
    /// Total matching records.
    #[serde(rename = "totalNumber")]
    pub total_number: u64,
    /// The records.
    #[serde(default, rename = "getDataResults")]
    pub get_data_results: Vec<DataRecord>,
}

/// One completion suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Suggestion {
    /// Suggested term.
    pub name: String,
    /// Matching record count.
    #[serde(default)]
    pub cnt: u64,
}

/// A `suggest` result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Suggestions {
    /// Total suggestions available.
    #[serde(rename = "totalNumber")]
    pub total_number: u64,
    /// The suggestions.
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// A prefecture row from the `prefecture` query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Prefecture {
    /// Prefecture code ("1".."47"; platform convention, no zero pad).
    #[serde(deserialize_with = "de_code")]
    pub code: String,
    /// Japanese name (e.g. 東京都).
    pub name: String,
}

/// A municipality row from the `municipalities` query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Municipality {
    /// Five-digit municipality code.
    #[serde(rename = "code_as_string", deserialize_with = "de_code")]
    pub code: String,
    /// Owning prefecture code.
    #[serde(deserialize_with = "de_code")]
    pub prefecture_code: String,
    /// Japanese name.
    pub name: String,
}

/// A minted download URL. Valid for roughly 60 seconds; fetch on
/// demand, never cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DownloadUrl {
    /// File or thumbnail identifier.
    #[serde(rename = "ID")]
    pub id: String,
    /// Pre-signed URL.
    #[serde(rename = "URL")]
    pub url: String,
}

// Envelope `data` payload wrappers, one per top-level query field.

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchData {
    pub search: SearchResults,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AllDataData {
    #[serde(rename = "getAllData")]
    pub get_all_data: AllDataPage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CatalogData {
    #[serde(default, rename = "dataCatalog")]
    pub data_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DataData {
    pub data: DataResults,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SuggestData {
    pub suggest: Suggestions,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CountData {
    #[serde(rename = "countData")]
    pub count_data: CountResult,
}

/// A `countData` result (total only).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountResult {
    /// Total matching records.
    #[serde(rename = "dataCount")]
    pub data_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PrefectureData {
    #[serde(default)]
    pub prefecture: Vec<Prefecture>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MunicipalitiesData {
    #[serde(default)]
    pub municipalities: Vec<Municipality>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FileUrlsData {
    #[serde(default, rename = "fileDownloadURLs")]
    pub file_download_urls: Vec<DownloadUrl>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ZipUrlData {
    #[serde(default, rename = "zipfileDownloadURL")]
    pub zipfile_download_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ThumbnailUrlsData {
    #[serde(default, rename = "thumbnailURLs")]
    pub thumbnail_urls: Vec<DownloadUrl>,
}
