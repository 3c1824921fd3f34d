//! The read contract every catalog store fulfils.

use async_trait::async_trait;
use park_map_catalog_models::{
    Activity, Facility, ListFilter, Listing, Neighborhood, Page, Park, Parktype,
};

use crate::DbError;

/// Read-only access to the park catalog.
///
/// Lookups by external key return `Ok(None)` when nothing matches; deciding
/// whether absence is an error is left to the caller. Every method that
/// returns a list returns it ordered by primary key.
///
/// Implementations must return geometries in EPSG:4326.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Looks up a neighborhood by slug.
    async fn neighborhood_by_slug(&self, slug: &str) -> Result<Option<Neighborhood>, DbError>;

    /// Looks up an activity by slug.
    async fn activity_by_slug(&self, slug: &str) -> Result<Option<Activity>, DbError>;

    /// Looks up a park type by primary key.
    async fn parktype_by_id(&self, id: i32) -> Result<Option<Parktype>, DbError>;

    /// Returns the activities whose ids are in `ids`. Unknown ids are
    /// skipped.
    async fn activities_by_ids(&self, ids: &[i32]) -> Result<Vec<Activity>, DbError>;

    /// Returns the parks whose ids are in `ids`. Unknown ids are skipped.
    async fn parks_by_ids(&self, ids: &[i32]) -> Result<Vec<Park>, DbError>;

    /// Returns every facility offering the given activity, with or without
    /// a park.
    async fn facilities_offering(&self, activity_id: i32) -> Result<Vec<Facility>, DbError>;

    /// Returns the parks linked to a neighborhood, optionally narrowed to
    /// one park type.
    async fn parks_in_neighborhood(
        &self,
        neighborhood_id: i32,
        parktype_id: Option<i32>,
    ) -> Result<Vec<Park>, DbError>;

    /// Returns the parks whose geometry intersects the neighborhood's
    /// geometry. A neighborhood without geometry intersects nothing.
    async fn parks_intersecting(&self, neighborhood_id: i32) -> Result<Vec<Park>, DbError>;

    /// Returns the facilities that belong to any of the given parks.
    async fn facilities_in_parks(&self, park_ids: &[i32]) -> Result<Vec<Facility>, DbError>;

    /// Lists one page of the parks matching `filter`, with the total
    /// match count.
    async fn list_parks(&self, filter: &ListFilter, page: Page) -> Result<Listing<Park>, DbError>;

    /// Lists one page of the neighborhoods matching `filter`.
    async fn list_neighborhoods(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Neighborhood>, DbError>;

    /// Lists one page of the facilities matching `filter`.
    async fn list_facilities(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Facility>, DbError>;

    /// Lists one page of the activities matching `filter`.
    async fn list_activities(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Activity>, DbError>;

    /// Lists one page of the park types matching `filter`.
    async fn list_parktypes(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Parktype>, DbError>;
}
