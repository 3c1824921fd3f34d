#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the park map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the catalog row types so each resource decides which fields it
//! exposes: facilities served by the explore resources carry no `status`
//! or `location`, and neighborhoods never carry their geometry.

use geojson::Geometry;
use park_map_catalog_models::{Activity, Facility, Neighborhood, Park, Parktype};
use serde::{Deserialize, Serialize};

/// Path prefix every catalog resource is mounted under.
pub const API_PREFIX: &str = "/api/v1";

/// Returns the detail URI of a row, e.g. `/api/v1/park/12/`.
#[must_use]
pub fn resource_uri(resource: &str, id: i32) -> String {
    format!("{API_PREFIX}/{resource}/{id}/")
}

/// Returns the list URI of a resource, e.g. `/api/v1/park/`.
#[must_use]
pub fn list_uri(resource: &str) -> String {
    format!("{API_PREFIX}/{resource}/")
}

/// A page of objects with pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiList<T> {
    /// Pagination metadata.
    pub meta: ApiListMeta,
    /// Objects on this page.
    pub objects: Vec<T>,
}

/// Pagination metadata for an [`ApiList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiListMeta {
    /// Page size that was applied.
    pub limit: usize,
    /// Index of the first object on this page.
    pub offset: usize,
    /// Number of objects matching the filters across all pages.
    pub total_count: usize,
    /// URI of the next page, if any.
    pub next: Option<String>,
    /// URI of the previous page, if any.
    pub previous: Option<String>,
}

/// A park as returned by the `park` and `explore_park` resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPark {
    /// Primary key.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Stable external key.
    pub slug: String,
    /// Alternate name.
    pub alt_name: Option<String>,
    /// Street address.
    pub address: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Park type id.
    pub parktype_id: i32,
    /// Linked neighborhood ids.
    pub neighborhood_ids: Vec<i32>,
    /// Boundary as `GeoJSON` in EPSG:4326.
    pub geometry: Option<Geometry>,
    /// Detail URI.
    pub resource_uri: String,
}

impl ApiPark {
    /// Renders a park row for the given resource.
    #[must_use]
    pub fn from_row(park: Park, resource: &str) -> Self {
        Self {
            resource_uri: resource_uri(resource, park.id),
            id: park.id,
            name: park.name,
            slug: park.slug,
            alt_name: park.alt_name,
            address: park.address,
            description: park.description,
            parktype_id: park.parktype_id,
            neighborhood_ids: park.neighborhood_ids,
            geometry: park.geometry,
        }
    }
}

/// A facility as returned by the `explore_facility` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFacility {
    /// Primary key.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Owning park id.
    pub park_id: Option<i32>,
    /// Offered activity ids.
    pub activity_ids: Vec<i32>,
    /// Detail URI.
    pub resource_uri: String,
}

impl ApiFacility {
    /// Renders a facility row for the given resource.
    #[must_use]
    pub fn from_row(facility: Facility, resource: &str) -> Self {
        Self {
            resource_uri: resource_uri(resource, facility.id),
            id: facility.id,
            name: facility.name,
            park_id: facility.park_id,
            activity_ids: facility.activity_ids,
        }
    }
}

/// An activity as returned by the `activity` and `explore_activity`
/// resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiActivity {
    /// Primary key.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Stable external key.
    pub slug: String,
    /// Detail URI.
    pub resource_uri: String,
}

impl ApiActivity {
    /// Renders an activity row for the given resource.
    #[must_use]
    pub fn from_row(activity: Activity, resource: &str) -> Self {
        Self {
            resource_uri: resource_uri(resource, activity.id),
            id: activity.id,
            name: activity.name,
            slug: activity.slug,
        }
    }
}

/// A neighborhood as returned by the `neighborhood` resource. The boundary
/// is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNeighborhood {
    /// Primary key.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Stable external key.
    pub slug: String,
    /// Detail URI.
    pub resource_uri: String,
}

impl ApiNeighborhood {
    /// Renders a neighborhood row for the given resource.
    #[must_use]
    pub fn from_row(neighborhood: Neighborhood, resource: &str) -> Self {
        Self {
            resource_uri: resource_uri(resource, neighborhood.id),
            id: neighborhood.id,
            name: neighborhood.name,
            slug: neighborhood.slug,
        }
    }
}

/// A park type as returned by the `parktype` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiParktype {
    /// Primary key.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Detail URI.
    pub resource_uri: String,
}

impl ApiParktype {
    /// Renders a park type row for the given resource.
    #[must_use]
    pub fn from_row(parktype: Parktype, resource: &str) -> Self {
        Self {
            resource_uri: resource_uri(resource, parktype.id),
            id: parktype.id,
            name: parktype.name,
        }
    }
}

/// Entry point for one neighborhood: references to every resource that can
/// be narrowed by it.
///
/// The explore references carry only the neighborhood; clients add
/// `parktype` (and `activity_ids` for parks and facilities).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEntry {
    /// Neighborhood primary key.
    pub id: i32,
    /// Neighborhood display name.
    pub name: String,
    /// Neighborhood slug.
    pub slug: String,
    /// Neighborhood detail URI.
    pub neighborhood: String,
    /// Activities in this neighborhood.
    pub activity: String,
    /// Park types in this neighborhood.
    pub parktype: String,
    /// Explore parks in this neighborhood.
    pub explorepark: String,
    /// Explore facilities in this neighborhood.
    pub explorefacility: String,
    /// Explore activities in this neighborhood.
    pub exploreactivity: String,
    /// Detail URI.
    pub resource_uri: String,
}

impl ApiEntry {
    /// Builds the entry for a neighborhood row.
    #[must_use]
    pub fn from_row(neighborhood: Neighborhood, resource: &str) -> Self {
        let slug = urlencoding::encode(&neighborhood.slug).into_owned();
        let by_slug = |target: &str| format!("{}?neighborhood={slug}", list_uri(target));

        Self {
            neighborhood: resource_uri("neighborhood", neighborhood.id),
            activity: by_slug("activity"),
            parktype: by_slug("parktype"),
            explorepark: by_slug("explore_park"),
            explorefacility: by_slug("explore_facility"),
            exploreactivity: by_slug("explore_activity"),
            resource_uri: resource_uri(resource, neighborhood.id),
            id: neighborhood.id,
            name: neighborhood.name,
            slug: neighborhood.slug,
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}
