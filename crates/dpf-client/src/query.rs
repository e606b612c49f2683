//! Typed query construction.
//!
//! Every platform operation has a static query template; caller input
//! only ever travels through GraphQL variables. Builders validate
//! client-side invariants (page and batch bounds, coordinate ranges)
//! and fail with [`DpfClientError::MalformedRequest`] before any I/O.

use serde::Serialize;

use crate::error::DpfClientError;
use crate::normalize::fold_width;
use crate::operation::GraphqlRequest;
use crate::types::FileRef;

/// Largest `size` accepted by the `search` query.
pub const MAX_SEARCH_SIZE: u32 = 500;

/// Largest batch accepted by the `getAllData` query.
pub const MAX_BATCH_SIZE: u32 = 1000;

/// Largest radius accepted by the `geoDistance` filter, in meters.
pub const MAX_DISTANCE_M: f64 = 50_000.0;

/// Attributes the platform namespaces under `DPF:`.
const DPF_ATTRIBUTES: &[&str] = &[
    "dataset_id",
    "catalog_id",
    "prefecture_code",
    "municipality_code",
    "year",
    "address",
    "title",
    "lat",
    "lon",
    "theme",
];

/// How much of each record a search returns.
///
/// The field sets are fixed per level and strictly nested:
/// every level contains all fields of the levels below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    /// `id title lat lon dataset_id`.
    Minimal,
    /// Minimal plus `year catalog_id`.
    #[default]
    Basic,
    /// Basic plus `theme metadata hasThumbnail`.
    Detail,
}

impl DetailLevel {
    /// Record fields requested at this level.
    #[must_use]
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Minimal => &["id", "title", "lat", "lon", "dataset_id"],
            Self::Basic => &["id", "title", "lat", "lon", "dataset_id", "year", "catalog_id"],
            Self::Detail => &[
                "id",
                "title",
                "lat",
                "lon",
                "dataset_id",
                "year",
                "catalog_id",
                "theme",
                "metadata",
                "hasThumbnail",
            ],
        }
    }

    const fn search_query(self) -> &'static str {
        match self {
            Self::Minimal => SEARCH_MINIMAL,
            Self::Basic => SEARCH_BASIC,
            Self::Detail => SEARCH_DETAIL,
        }
    }
}

/// Sort direction. The platform spells descending `dsc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortOrder {
    /// Ascending.
    #[serde(rename = "asc")]
    Asc,
    /// Descending.
    #[serde(rename = "dsc")]
    Desc,
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl LatLon {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    fn validate(self) -> Result<(), DpfClientError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(DpfClientError::malformed(format!(
                "latitude {} out of range [-90, 90]",
                self.lat
            )));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(DpfClientError::malformed(format!(
                "longitude {} out of range [-180, 180]",
                self.lon
            )));
        }
        Ok(())
    }
}

/// Spatial restriction for search-like queries. Exactly one shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpatialFilter {
    /// Axis-aligned rectangle given by any two opposite corners.
    Rectangle {
        /// One corner.
        corner_a: LatLon,
        /// The opposite corner.
        corner_b: LatLon,
    },
    /// All points within `radius_m` meters of `center`.
    PointRadius {
        /// Circle center.
        center: LatLon,
        /// Radius in meters, in `(0, MAX_DISTANCE_M]`.
        radius_m: f64,
    },
}

impl SpatialFilter {
    /// Rectangle from any two opposite corners; orientation is
    /// normalized at serialization time.
    #[must_use]
    pub const fn rectangle(corner_a: LatLon, corner_b: LatLon) -> Self {
        Self::Rectangle { corner_a, corner_b }
    }

    /// Circle around a point.
    #[must_use]
    pub const fn point_radius(center: LatLon, radius_m: f64) -> Self {
        Self::PointRadius { center, radius_m }
    }

    fn validate(&self) -> Result<(), DpfClientError> {
        match self {
            Self::Rectangle { corner_a, corner_b } => {
                corner_a.validate()?;
                corner_b.validate()
            }
            Self::PointRadius { center, radius_m } => {
                center.validate()?;
                if !radius_m.is_finite() || *radius_m <= 0.0 {
                    return Err(DpfClientError::malformed(format!(
                        "radius {radius_m} must be positive"
                    )));
                }
                if *radius_m > MAX_DISTANCE_M {
                    return Err(DpfClientError::malformed(format!(
                        "radius {radius_m} exceeds maximum {MAX_DISTANCE_M}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Wire form. Rectangle corners are normalized to NW top-left and
    /// SE bottom-right regardless of how the caller ordered them.
    fn to_wire(self) -> LocationFilter {
        match self {
            Self::Rectangle { corner_a, corner_b } => LocationFilter::Rectangle(RectangleFilter {
                top_left: LatLon::new(
                    corner_a.lat.max(corner_b.lat),
                    corner_a.lon.min(corner_b.lon),
                ),
                bottom_right: LatLon::new(
                    corner_a.lat.min(corner_b.lat),
                    corner_a.lon.max(corner_b.lon),
                ),
            }),
            Self::PointRadius { center, radius_m } => {
                LocationFilter::GeoDistance(GeoDistanceFilter {
                    lat: center.lat,
                    lon: center.lon,
                    distance: radius_m,
                })
            }
        }
    }
}

/// Wire shape of `locationFilter`. Externally tagged, so exactly one of
/// `rectangle` / `geoDistance` appears in the JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum LocationFilter {
    /// `{ rectangle: { topLeft, bottomRight } }`.
    #[serde(rename = "rectangle")]
    Rectangle(RectangleFilter),
    /// `{ geoDistance: { lat, lon, distance } }`.
    #[serde(rename = "geoDistance")]
    GeoDistance(GeoDistanceFilter),
}

/// Normalized rectangle: NW top-left, SE bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RectangleFilter {
    /// North-west corner.
    #[serde(rename = "topLeft")]
    pub top_left: LatLon,
    /// South-east corner.
    #[serde(rename = "bottomRight")]
    pub bottom_right: LatLon,
}

/// Point-distance restriction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoDistanceFilter {
    /// Center latitude.
    pub lat: f64,
    /// Center longitude.
    pub lon: f64,
    /// Radius in meters.
    pub distance: f64,
}

/// One attribute equality clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeClause {
    /// Namespaced attribute name (e.g. `DPF:prefecture_code`).
    #[serde(rename = "attributeName")]
    pub attribute_name: String,
    /// Value the attribute must equal.
    pub is: serde_json::Value,
}

/// Wire shape of `attributeFilter`: a lone clause stays bare, multiple
/// clauses are AND-wrapped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeFilterNode {
    /// A single clause.
    Single(AttributeClause),
    /// A conjunction of clauses.
    And {
        /// The clauses.
        #[serde(rename = "AND")]
        and: Vec<AttributeClause>,
    },
}

/// Attribute restrictions for search-like queries.
///
/// Each present key contributes one equality clause over the matching
/// `DPF:`-namespaced attribute; absent keys are omitted entirely.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeFilter {
    /// Restrict to one dataset.
    pub dataset_id: Option<String>,
    /// Restrict to one catalog.
    pub catalog_id: Option<String>,
    /// Restrict to one prefecture (code, not name).
    pub prefecture_code: Option<String>,
    /// Restrict to one municipality (code, not name).
    pub municipality_code: Option<String>,
    /// Restrict to one publication year.
    pub year: Option<String>,
    /// Restrict by address text.
    pub address: Option<String>,
    /// Additional clauses over arbitrary attributes. Names without a
    /// namespace are `DPF:`-prefixed when the platform defines them.
    pub custom: Vec<(String, serde_json::Value)>,
}

impl AttributeFilter {
    /// True when no clause would be emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dataset_id.is_none()
            && self.catalog_id.is_none()
            && self.prefecture_code.is_none()
            && self.municipality_code.is_none()
            && self.year.is_none()
            && self.address.is_none()
            && self.custom.is_empty()
    }

    fn clauses(&self) -> Vec<AttributeClause> {
        let mut clauses = Vec::new();
        let mut push = |name: &str, value: serde_json::Value| {
            clauses.push(AttributeClause {
                attribute_name: format!("DPF:{name}"),
                is: value,
            });
        };
        if let Some(id) = &self.dataset_id {
            push("dataset_id", serde_json::Value::String(id.clone()));
        }
        if let Some(id) = &self.catalog_id {
            push("catalog_id", serde_json::Value::String(id.clone()));
        }
        if let Some(code) = &self.prefecture_code {
            push("prefecture_code", code_value(code));
        }
        if let Some(code) = &self.municipality_code {
            push("municipality_code", code_value(code));
        }
        if let Some(year) = &self.year {
            push("year", code_value(year));
        }
        if let Some(address) = &self.address {
            push("address", serde_json::Value::String(address.clone()));
        }
        for (name, value) in &self.custom {
            clauses.push(AttributeClause {
                attribute_name: namespace_attribute(name),
                is: value.clone(),
            });
        }
        clauses
    }

    /// Wire form, or `None` when empty.
    #[must_use]
    pub fn node(&self) -> Option<AttributeFilterNode> {
        let mut clauses = self.clauses();
        match clauses.len() {
            0 => None,
            1 => clauses.pop().map(AttributeFilterNode::Single),
            _ => Some(AttributeFilterNode::And { and: clauses }),
        }
    }
}

/// Prefix bare names of platform-defined attributes with `DPF:`;
/// anything already namespaced (or unknown) passes through.
fn namespace_attribute(name: &str) -> String {
    if name.contains(':') || !DPF_ATTRIBUTES.contains(&name) {
        name.to_string()
    } else {
        format!("DPF:{name}")
    }
}

/// Code values go out as numbers when they look like plain integers
/// (after full-width folding, no leading zero) and as strings
/// otherwise. Matches how the platform indexes prefecture and
/// municipality codes.
fn code_value(raw: &str) -> serde_json::Value {
    let folded = fold_width(raw.trim());
    let plain_integer = !folded.is_empty()
        && folded.bytes().all(|byte| byte.is_ascii_digit())
        && !(folded.len() > 1 && folded.starts_with('0'));
    if plain_integer {
        if let Ok(number) = folded.parse::<u64>() {
            return serde_json::Value::from(number);
        }
    }
    serde_json::Value::String(folded)
}

/// A `search` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Free-text term.
    pub term: Option<String>,
    /// Result offset.
    pub first: u32,
    /// Page size, in `1..=MAX_SEARCH_SIZE`.
    pub size: u32,
    /// Match the term as a phrase rather than individual words.
    pub phrase_match: bool,
    /// Attribute to sort on.
    pub sort_attribute_name: Option<String>,
    /// Sort direction.
    pub sort_order: Option<SortOrder>,
    /// Requested field set.
    pub detail: DetailLevel,
    /// Spatial restriction.
    pub spatial: Option<SpatialFilter>,
    /// Attribute restrictions.
    pub attributes: AttributeFilter,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            term: None,
            first: 0,
            size: 50,
            phrase_match: true,
            sort_attribute_name: None,
            sort_order: None,
            detail: DetailLevel::default(),
            spatial: None,
            attributes: AttributeFilter::default(),
        }
    }
}

impl SearchRequest {
    /// Keyword search with defaults.
    #[must_use]
    pub fn keyword(term: impl Into<String>) -> Self {
        Self {
            term: Some(term.into()),
            ..Self::default()
        }
    }

    /// Set the field detail level.
    #[must_use]
    pub const fn with_detail(mut self, detail: DetailLevel) -> Self {
        self.detail = detail;
        self
    }

    /// Set the page window.
    #[must_use]
    pub const fn with_page(mut self, first: u32, size: u32) -> Self {
        self.first = first;
        self.size = size;
        self
    }

    /// Set a spatial restriction.
    #[must_use]
    pub const fn with_spatial(mut self, spatial: SpatialFilter) -> Self {
        self.spatial = Some(spatial);
        self
    }

    /// Set attribute restrictions.
    #[must_use]
    pub fn with_attributes(mut self, attributes: AttributeFilter) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Variables for the `search` templates.
#[derive(Debug, Clone, Serialize)]
pub struct SearchVariables {
    first: u32,
    size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    term: Option<String>,
    #[serde(rename = "phraseMatch", skip_serializing_if = "Option::is_none")]
    phrase_match: Option<bool>,
    #[serde(rename = "sortAttributeName", skip_serializing_if = "Option::is_none")]
    sort_attribute_name: Option<String>,
    #[serde(rename = "sortOrder", skip_serializing_if = "Option::is_none")]
    sort_order: Option<SortOrder>,
    #[serde(rename = "attributeFilter", skip_serializing_if = "Option::is_none")]
    attribute_filter: Option<AttributeFilterNode>,
    #[serde(rename = "locationFilter", skip_serializing_if = "Option::is_none")]
    location_filter: Option<LocationFilter>,
}

const SEARCH_MINIMAL: &str = "\
query Search($first: Int!, $size: Int!, $term: String, $phraseMatch: Boolean, \
$sortAttributeName: String, $sortOrder: String, \
$attributeFilter: AttributeFilter, $locationFilter: LocationFilter) {
  search(first: $first, size: $size, term: $term, phraseMatch: $phraseMatch, \
sortAttributeName: $sortAttributeName, sortOrder: $sortOrder, \
attributeFilter: $attributeFilter, locationFilter: $locationFilter) {
    totalNumber
    searchResults { id title lat lon dataset_id }
  }
}";

const SEARCH_BASIC: &str = "\
query Search($first: Int!, $size: Int!, $term: String, $phraseMatch: Boolean, \
$sortAttributeName: String, $sortOrder: String, \
$attributeFilter: AttributeFilter, $locationFilter: LocationFilter) {
  search(first: $first, size: $size, term: $term, phraseMatch: $phraseMatch, \
sortAttributeName: $sortAttributeName, sortOrder: $sortOrder, \
attributeFilter: $attributeFilter, locationFilter: $locationFilter) {
    totalNumber
    searchResults { id title lat lon dataset_id year catalog_id }
  }
}";

const SEARCH_DETAIL: &str = "\
query Search($first: Int!, $size: Int!, $term: String, $phraseMatch: Boolean, \
$sortAttributeName: String, $sortOrder: String, \
$attributeFilter: AttributeFilter, $locationFilter: LocationFilter) {
  search(first: $first, size: $size, term: $term, phraseMatch: $phraseMatch, \
sortAttributeName: $sortAttributeName, sortOrder: $sortOrder, \
attributeFilter: $attributeFilter, locationFilter: $locationFilter) {
    totalNumber
    searchResults { id title lat lon dataset_id year catalog_id theme metadata hasThumbnail }
  }
}";

/// Build a `search` request. Validates page bounds and the spatial
/// filter before anything is sent.
pub fn build_search(request: &SearchRequest) -> Result<GraphqlRequest<SearchVariables>, DpfClientError> {
    if request.size == 0 || request.size > MAX_SEARCH_SIZE {
        return Err(DpfClientError::malformed(format!(
            "search size {} out of range 1..={MAX_SEARCH_SIZE}",
            request.size
        )));
    }
    if let Some(spatial) = &request.spatial {
        spatial.validate()?;
    }

    // The platform requires a term once an attribute filter is present;
    // an empty term means "match everything".
    let term = match (&request.term, request.attributes.is_empty()) {
        (Some(term), _) => Some(term.clone()),
        (None, false) => Some(String::new()),
        (None, true) => None,
    };

    let variables = SearchVariables {
        first: request.first,
        size: request.size,
        term,
        phrase_match: request.phrase_match.then_some(true),
        sort_attribute_name: request.sort_attribute_name.clone(),
        sort_order: request.sort_order,
        attribute_filter: request.attributes.node(),
        location_filter: request.spatial.map(SpatialFilter::to_wire),
    };
    Ok(GraphqlRequest::new(request.detail.search_query(), variables).with_operation_name("Search"))
}

/// A `getAllData` bulk export request.
#[derive(Debug, Clone, PartialEq)]
pub struct GetAllDataRequest {
    /// Records per batch, in `1..=MAX_BATCH_SIZE`.
    pub batch_size: u32,
    /// Free-text term.
    pub term: Option<String>,
    /// Phrase matching; `None` leaves the platform default.
    pub phrase_match: Option<bool>,
    /// Attribute restrictions (first batch only; later batches are
    /// driven by the continuation token).
    pub attributes: AttributeFilter,
    /// Spatial restriction (first batch only).
    pub spatial: Option<SpatialFilter>,
    /// Stop after this many records in total.
    pub max_items: Option<usize>,
}

impl Default for GetAllDataRequest {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            term: None,
            phrase_match: None,
            attributes: AttributeFilter::default(),
            spatial: None,
            max_items: None,
        }
    }
}

impl GetAllDataRequest {
    pub(crate) fn validate(&self) -> Result<(), DpfClientError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(DpfClientError::malformed(format!(
                "batch size {} out of range 1..={MAX_BATCH_SIZE}",
                self.batch_size
            )));
        }
        if let Some(spatial) = &self.spatial {
            spatial.validate()?;
        }
        Ok(())
    }
}

/// Variables for the first `getAllData` batch.
#[derive(Debug, Clone, Serialize)]
pub struct AllDataFirstVariables {
    size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    term: Option<String>,
    #[serde(rename = "phraseMatch", skip_serializing_if = "Option::is_none")]
    phrase_match: Option<bool>,
    #[serde(rename = "attributeFilter", skip_serializing_if = "Option::is_none")]
    attribute_filter: Option<AttributeFilterNode>,
    #[serde(rename = "locationFilter", skip_serializing_if = "Option::is_none")]
    location_filter: Option<LocationFilter>,
}

/// Variables for continuation `getAllData` batches.
#[derive(Debug, Clone, Serialize)]
pub struct AllDataNextVariables {
    size: u32,
    #[serde(rename = "nextDataRequestToken")]
    next_data_request_token: String,
}

const ALL_DATA_FIRST: &str = "\
query GetAllData($size: Int!, $term: String, $phraseMatch: Boolean, \
$attributeFilter: AttributeFilter, $locationFilter: LocationFilter) {
  getAllData(size: $size, term: $term, phraseMatch: $phraseMatch, \
attributeFilter: $attributeFilter, locationFilter: $locationFilter) {
    nextDataRequestToken
    data { id title metadata }
  }
}";

const ALL_DATA_NEXT: &str = "\
query GetAllData($size: Int!, $nextDataRequestToken: String!) {
  getAllData(size: $size, nextDataRequestToken: $nextDataRequestToken) {
    nextDataRequestToken
    data { id title metadata }
  }
}";

/// Build the first `getAllData` batch, carrying the filters.
pub fn build_all_data_first(
    request: &GetAllDataRequest,
) -> Result<GraphqlRequest<AllDataFirstVariables>, DpfClientError> {
    request.validate()?;
    let variables = AllDataFirstVariables {
        size: request.batch_size,
        term: request.term.clone(),
        phrase_match: request.phrase_match,
        attribute_filter: request.attributes.node(),
        location_filter: request.spatial.map(SpatialFilter::to_wire),
    };
    Ok(GraphqlRequest::new(ALL_DATA_FIRST, variables).with_operation_name("GetAllData"))
}

/// Build a continuation `getAllData` batch; only the token travels.
#[must_use]
pub fn build_all_data_next(
    batch_size: u32,
    token: impl Into<String>,
) -> GraphqlRequest<AllDataNextVariables> {
    let variables = AllDataNextVariables {
        size: batch_size,
        next_data_request_token: token.into(),
    };
    GraphqlRequest::new(ALL_DATA_NEXT, variables).with_operation_name("GetAllData")
}

/// Variables for `dataCatalog`. `ids: null` means all catalogs, so the
/// key is always serialized.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogVariables {
    ids: Option<Vec<String>>,
}

const DATA_CATALOG: &str = "\
query DataCatalog($ids: [ID]) {
  dataCatalog(IDs: $ids) {
    id
    title
    datasets { id title data_count }
  }
}";

const DATA_CATALOG_SUMMARY: &str = "\
query DataCatalog($ids: [ID]) {
  dataCatalog(IDs: $ids) {
    id
    title
  }
}";

/// Build a `dataCatalog` request; `None` fetches every catalog.
#[must_use]
pub fn build_data_catalog(
    ids: Option<Vec<String>>,
    include_datasets: bool,
) -> GraphqlRequest<CatalogVariables> {
    let query = if include_datasets {
        DATA_CATALOG
    } else {
        DATA_CATALOG_SUMMARY
    };
    GraphqlRequest::new(query, CatalogVariables { ids }).with_operation_name("DataCatalog")
}

/// Variables for the `data` templates.
#[derive(Debug, Clone, Serialize)]
pub struct DataVariables {
    #[serde(rename = "dataSetID")]
    data_set_id: String,
    #[serde(rename = "dataID")]
    data_id: String,
}

const GET_DATA: &str = "\
query GetData($dataSetID: ID!, $dataID: ID!) {
  data(dataSetID: $dataSetID, dataID: $dataID) {
    totalNumber
    getDataResults {
      id
      title
      metadata
      files { id original_path }
      hasThumbnail
      tileset { url altitude_offset_meters }
    }
  }
}";

const GET_DATA_SUMMARY: &str = "\
query GetData($dataSetID: ID!, $dataID: ID!) {
  data(dataSetID: $dataSetID, dataID: $dataID) {
    totalNumber
    getDataResults { id title }
  }
}";

fn data_variables(
    dataset_id: &str,
    data_id: &str,
) -> Result<DataVariables, DpfClientError> {
    if dataset_id.is_empty() || data_id.is_empty() {
        return Err(DpfClientError::malformed(
            "dataset id and data id must be non-empty",
        ));
    }
    Ok(DataVariables {
        data_set_id: dataset_id.to_string(),
        data_id: data_id.to_string(),
    })
}

/// Build a full `data` record request.
pub fn build_get_data(
    dataset_id: &str,
    data_id: &str,
) -> Result<GraphqlRequest<DataVariables>, DpfClientError> {
    Ok(GraphqlRequest::new(GET_DATA, data_variables(dataset_id, data_id)?)
        .with_operation_name("GetData"))
}

/// Build a summary `data` record request (`id title` only).
pub fn build_get_data_summary(
    dataset_id: &str,
    data_id: &str,
) -> Result<GraphqlRequest<DataVariables>, DpfClientError> {
    Ok(GraphqlRequest::new(GET_DATA_SUMMARY, data_variables(dataset_id, data_id)?)
        .with_operation_name("GetData"))
}

/// A `suggest` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestRequest {
    /// Prefix to complete. Required.
    pub term: String,
    /// Phrase matching; `None` leaves the platform default.
    pub phrase_match: Option<bool>,
    /// Attribute restrictions.
    pub attributes: AttributeFilter,
    /// Spatial restriction.
    pub spatial: Option<SpatialFilter>,
}

impl SuggestRequest {
    /// Suggest completions for a term.
    #[must_use]
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            phrase_match: None,
            attributes: AttributeFilter::default(),
            spatial: None,
        }
    }
}

/// Variables for the `suggest` template.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestVariables {
    term: String,
    #[serde(rename = "phraseMatch", skip_serializing_if = "Option::is_none")]
    phrase_match: Option<bool>,
    #[serde(rename = "attributeFilter", skip_serializing_if = "Option::is_none")]
    attribute_filter: Option<AttributeFilterNode>,
    #[serde(rename = "locationFilter", skip_serializing_if = "Option::is_none")]
    location_filter: Option<LocationFilter>,
}

const SUGGEST: &str = "\
query Suggest($term: String!, $phraseMatch: Boolean, \
$attributeFilter: AttributeFilter, $locationFilter: LocationFilter) {
  suggest(term: $term, phraseMatch: $phraseMatch, \
attributeFilter: $attributeFilter, locationFilter: $locationFilter) {
    totalNumber
    suggestions { name cnt }
  }
}";

/// Build a `suggest` request.
pub fn build_suggest(
    request: &SuggestRequest,
) -> Result<GraphqlRequest<SuggestVariables>, DpfClientError> {
    if request.term.is_empty() {
        return Err(DpfClientError::malformed("suggest term must be non-empty"));
    }
    if let Some(spatial) = &request.spatial {
        spatial.validate()?;
    }
    let variables = SuggestVariables {
        term: request.term.clone(),
        phrase_match: request.phrase_match,
        attribute_filter: request.attributes.node(),
        location_filter: request.spatial.map(SpatialFilter::to_wire),
    };
    Ok(GraphqlRequest::new(SUGGEST, variables).with_operation_name("Suggest"))
}

/// A `countData` request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountDataRequest {
    /// Free-text term.
    pub term: Option<String>,
    /// Phrase matching; `None` leaves the platform default.
    pub phrase_match: Option<bool>,
    /// Attribute restrictions.
    pub attributes: AttributeFilter,
    /// Spatial restriction.
    pub spatial: Option<SpatialFilter>,
}

/// Variables for the `countData` template.
#[derive(Debug, Clone, Serialize)]
pub struct CountVariables {
    #[serde(skip_serializing_if = "Option::is_none")]
    term: Option<String>,
    #[serde(rename = "phraseMatch", skip_serializing_if = "Option::is_none")]
    phrase_match: Option<bool>,
    #[serde(rename = "attributeFilter", skip_serializing_if = "Option::is_none")]
    attribute_filter: Option<AttributeFilterNode>,
    #[serde(rename = "locationFilter", skip_serializing_if = "Option::is_none")]
    location_filter: Option<LocationFilter>,
}

const COUNT_DATA: &str = "\
query CountData($term: String, $phraseMatch: Boolean, \
$attributeFilter: AttributeFilter, $locationFilter: LocationFilter) {
  countData(term: $term, phraseMatch: $phraseMatch, \
attributeFilter: $attributeFilter, locationFilter: $locationFilter) {
    dataCount
  }
}";

/// Build a `countData` request.
pub fn build_count_data(
    request: &CountDataRequest,
) -> Result<GraphqlRequest<CountVariables>, DpfClientError> {
    if let Some(spatial) = &request.spatial {
        spatial.validate()?;
    }
    let variables = CountVariables {
        term: request.term.clone(),
        phrase_match: request.phrase_match,
        attribute_filter: request.attributes.node(),
        location_filter: request.spatial.map(SpatialFilter::to_wire),
    };
    Ok(GraphqlRequest::new(COUNT_DATA, variables).with_operation_name("CountData"))
}

const PREFECTURES: &str = "\
query Prefectures {
  prefecture {
    code
    name
  }
}";

/// Build the prefecture table request.
#[must_use]
pub fn build_prefectures() -> GraphqlRequest<serde_json::Map<String, serde_json::Value>> {
    GraphqlRequest::new(PREFECTURES, serde_json::Map::new()).with_operation_name("Prefectures")
}

/// Variables for the `municipalities` template.
#[derive(Debug, Clone, Serialize)]
pub struct MunicipalitiesVariables {
    #[serde(rename = "prefCodes", skip_serializing_if = "Option::is_none")]
    pref_codes: Option<Vec<String>>,
    #[serde(rename = "muniCodes", skip_serializing_if = "Option::is_none")]
    muni_codes: Option<Vec<String>>,
}

const MUNICIPALITIES: &str = "\
query Municipalities($prefCodes: [String!], $muniCodes: [String!]) {
  municipalities(prefCodes: $prefCodes, muniCodes: $muniCodes) {
    code_as_string
    prefecture_code
    name
  }
}";

/// Build a municipality table request; at least one code list is
/// required.
pub fn build_municipalities(
    pref_codes: Option<Vec<String>>,
    muni_codes: Option<Vec<String>>,
) -> Result<GraphqlRequest<MunicipalitiesVariables>, DpfClientError> {
    if pref_codes.as_ref().map_or(true, Vec::is_empty)
        && muni_codes.as_ref().map_or(true, Vec::is_empty)
    {
        return Err(DpfClientError::malformed(
            "municipalities requires prefecture or municipality codes",
        ));
    }
    let variables = MunicipalitiesVariables {
        pref_codes: pref_codes.filter(|codes| !codes.is_empty()),
        muni_codes: muni_codes.filter(|codes| !codes.is_empty()),
    };
    Ok(GraphqlRequest::new(MUNICIPALITIES, variables).with_operation_name("Municipalities"))
}

/// Variables for the file download-URL templates.
#[derive(Debug, Clone, Serialize)]
pub struct FilesVariables {
    files: Vec<FileRef>,
}

/// Variables for the thumbnail-URL template.
#[derive(Debug, Clone, Serialize)]
pub struct ThumbnailsVariables {
    thumbnails: Vec<FileRef>,
}

const FILE_DOWNLOAD_URLS: &str = "\
query FileDownloadUrls($files: [FileInput!]!) {
  fileDownloadURLs(files: $files) {
    ID
    URL
  }
}";

const ZIPFILE_DOWNLOAD_URL: &str = "\
query ZipfileDownloadUrl($files: [FileInput!]!) {
  zipfileDownloadURL(files: $files)
}";

const THUMBNAIL_URLS: &str = "\
query ThumbnailUrls($thumbnails: [FileInput!]!) {
  thumbnailURLs(thumbnails: $thumbnails) {
    ID
    URL
  }
}";

fn require_files(files: &[FileRef], what: &str) -> Result<(), DpfClientError> {
    if files.is_empty() {
        return Err(DpfClientError::malformed(format!(
            "{what} requires at least one file reference"
        )));
    }
    Ok(())
}

/// Build a per-file download-URL request.
pub fn build_file_download_urls(
    files: &[FileRef],
) -> Result<GraphqlRequest<FilesVariables>, DpfClientError> {
    require_files(files, "fileDownloadURLs")?;
    Ok(GraphqlRequest::new(
        FILE_DOWNLOAD_URLS,
        FilesVariables {
            files: files.to_vec(),
        },
    )
    .with_operation_name("FileDownloadUrls"))
}

/// Build a zip-bundle download-URL request.
pub fn build_zipfile_download_url(
    files: &[FileRef],
) -> Result<GraphqlRequest<FilesVariables>, DpfClientError> {
    require_files(files, "zipfileDownloadURL")?;
    Ok(GraphqlRequest::new(
        ZIPFILE_DOWNLOAD_URL,
        FilesVariables {
            files: files.to_vec(),
        },
    )
    .with_operation_name("ZipfileDownloadUrl"))
}

/// Build a thumbnail-URL request.
pub fn build_thumbnail_urls(
    thumbnails: &[FileRef],
) -> Result<GraphqlRequest<ThumbnailsVariables>, DpfClientError> {
    require_files(thumbnails, "thumbnailURLs")?;
    Ok(GraphqlRequest::new(
        THUMBNAIL_URLS,
        ThumbnailsVariables {
            thumbnails: thumbnails.to_vec(),
        },
    )
    .with_operation_name("ThumbnailUrls"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_levels_are_strictly_nested() {
        let minimal = DetailLevel::Minimal.fields();
        let basic = DetailLevel::Basic.fields();
        let detail = DetailLevel::Detail.fields();

        assert!(minimal.iter().all(|field| basic.contains(field)));
        assert!(basic.iter().all(|field| detail.contains(field)));
        assert!(minimal.len() < basic.len());
        assert!(basic.len() < detail.len());
    }

    #[test]
    fn search_templates_request_their_field_sets() {
        for level in [DetailLevel::Minimal, DetailLevel::Basic, DetailLevel::Detail] {
            let query = level.search_query();
            for field in level.fields() {
                assert!(query.contains(field), "{field} missing at {level:?}");
            }
        }
        assert!(!DetailLevel::Minimal.search_query().contains("year"));
        assert!(!DetailLevel::Basic.search_query().contains("hasThumbnail"));
    }

    #[test]
    fn absent_keys_are_omitted_from_variables() {
        let request = build_search(&SearchRequest::keyword("bridge")).unwrap();
        let variables = serde_json::to_value(&request.variables).unwrap();
        let object = variables.as_object().unwrap();
        assert_eq!(object["term"], "bridge");
        assert_eq!(object["first"], 0);
        assert_eq!(object["size"], 50);
        assert_eq!(object["phraseMatch"], true);
        assert!(!object.contains_key("sortAttributeName"));
        assert!(!object.contains_key("attributeFilter"));
        assert!(!object.contains_key("locationFilter"));
    }

    #[test]
    fn search_size_bounds_fail_fast() {
        let mut request = SearchRequest::default();
        request.size = 501;
        assert!(matches!(
            build_search(&request),
            Err(DpfClientError::MalformedRequest { .. })
        ));
        request.size = 0;
        assert!(matches!(
            build_search(&request),
            Err(DpfClientError::MalformedRequest { .. })
        ));
        request.size = 500;
        assert!(build_search(&request).is_ok());
    }

    #[test]
    fn attribute_filter_implies_empty_term() {
        let request = SearchRequest::default().with_attributes(AttributeFilter {
            prefecture_code: Some("13".into()),
            ..AttributeFilter::default()
        });
        let built = build_search(&request).unwrap();
        let variables = serde_json::to_value(&built.variables).unwrap();
        assert_eq!(variables["term"], "");
    }

    #[test]
    fn rectangle_corners_are_normalized() {
        // Deliberately swapped: SE corner first.
        let spatial = SpatialFilter::rectangle(
            LatLon::new(34.0, 140.0),
            LatLon::new(36.0, 139.0),
        );
        let LocationFilter::Rectangle(rect) = spatial.to_wire() else {
            panic!("expected rectangle");
        };
        assert_eq!(rect.top_left.lat, 36.0);
        assert_eq!(rect.top_left.lon, 139.0);
        assert_eq!(rect.bottom_right.lat, 34.0);
        assert_eq!(rect.bottom_right.lon, 140.0);
    }

    #[test]
    fn location_filter_serializes_exactly_one_shape() {
        let rect = SpatialFilter::rectangle(LatLon::new(36.0, 139.0), LatLon::new(34.0, 140.0));
        let value = serde_json::to_value(rect.to_wire()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(object.contains_key("rectangle"));

        let circle = SpatialFilter::point_radius(LatLon::new(35.0, 139.0), 1000.0);
        let value = serde_json::to_value(circle.to_wire()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["geoDistance"]["distance"], 1000.0);
    }

    #[test]
    fn coordinate_and_radius_bounds() {
        let bad_lat = SpatialFilter::rectangle(LatLon::new(91.0, 0.0), LatLon::new(0.0, 0.0));
        assert!(bad_lat.validate().is_err());

        let bad_radius = SpatialFilter::point_radius(LatLon::new(0.0, 0.0), 0.0);
        assert!(bad_radius.validate().is_err());

        let too_far = SpatialFilter::point_radius(LatLon::new(0.0, 0.0), MAX_DISTANCE_M + 1.0);
        assert!(too_far.validate().is_err());
    }

    #[test]
    fn single_attribute_clause_stays_bare() {
        let filter = AttributeFilter {
            prefecture_code: Some("13".into()),
            ..AttributeFilter::default()
        };
        let value = serde_json::to_value(filter.node().unwrap()).unwrap();
        assert_eq!(value["attributeName"], "DPF:prefecture_code");
        assert_eq!(value["is"], 13);
        assert!(value.get("AND").is_none());
    }

    #[test]
    fn multiple_attribute_clauses_are_and_wrapped() {
        let filter = AttributeFilter {
            dataset_id: Some("ds1".into()),
            prefecture_code: Some("13".into()),
            ..AttributeFilter::default()
        };
        let value = serde_json::to_value(filter.node().unwrap()).unwrap();
        let and = value["AND"].as_array().unwrap();
        assert_eq!(and.len(), 2);
        assert_eq!(and[0]["attributeName"], "DPF:dataset_id");
        assert_eq!(and[0]["is"], "ds1");
    }

    #[test]
    fn code_values_fold_and_quote() {
        assert_eq!(code_value("13"), serde_json::json!(13));
        assert_eq!(code_value("１３"), serde_json::json!(13));
        // Leading zero must stay a string to preserve the digit.
        assert_eq!(code_value("013"), serde_json::json!("013"));
        assert_eq!(code_value("13a"), serde_json::json!("13a"));
    }

    #[test]
    fn custom_attributes_get_namespaced_when_known() {
        let filter = AttributeFilter {
            custom: vec![
                ("theme".into(), serde_json::json!("防災")),
                ("OSM:highway".into(), serde_json::json!("primary")),
                ("unknown_attr".into(), serde_json::json!(1)),
            ],
            ..AttributeFilter::default()
        };
        let clauses = filter.clauses();
        assert_eq!(clauses[0].attribute_name, "DPF:theme");
        assert_eq!(clauses[1].attribute_name, "OSM:highway");
        assert_eq!(clauses[2].attribute_name, "unknown_attr");
    }

    #[test]
    fn batch_size_bounds_fail_fast() {
        let mut request = GetAllDataRequest::default();
        request.batch_size = 1001;
        assert!(build_all_data_first(&request).is_err());
        request.batch_size = 1000;
        assert!(build_all_data_first(&request).is_ok());
    }

    #[test]
    fn continuation_batches_carry_only_the_token() {
        let request = build_all_data_next(1000, "tok-1");
        let variables = serde_json::to_value(&request.variables).unwrap();
        let object = variables.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["size"], 1000);
        assert_eq!(object["nextDataRequestToken"], "tok-1");
    }

    #[test]
    fn catalog_ids_serialize_null_for_all() {
        let request = build_data_catalog(None, true);
        let variables = serde_json::to_value(&request.variables).unwrap();
        assert!(variables["ids"].is_null());
    }

    #[test]
    fn municipalities_requires_codes() {
        assert!(build_municipalities(None, None).is_err());
        assert!(build_municipalities(Some(vec![]), None).is_err());
        assert!(build_municipalities(Some(vec!["13".into()]), None).is_ok());
    }

    #[test]
    fn download_urls_require_files() {
        assert!(build_file_download_urls(&[]).is_err());
        assert!(build_zipfile_download_url(&[]).is_err());
        assert!(build_thumbnail_urls(&[]).is_err());
        let files = vec![FileRef {
            id: "f1".into(),
            original_path: "a/b.zip".into(),
        }];
        assert!(build_file_download_urls(&files).is_ok());
    }
}
