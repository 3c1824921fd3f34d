//! In-memory catalog store.
//!
//! Holds every catalog row in memory and answers [`CatalogStore`] queries
//! by scanning. Geometries are kept in EPSG:4326 and intersected with
//! `geo`. The catalog is loaded from a JSON fixture ([`CatalogFixture`]),
//! which makes this store suitable for tests and for running the API
//! against a snapshot without a database.

use std::path::Path;

use async_trait::async_trait;
use geo::Intersects as _;
use park_map_catalog_models::{
    Activity, CatalogRow, Facility, ListFilter, Listing, Neighborhood, Page, Park, Parktype,
};
use serde::{Deserialize, Serialize};

use crate::{CatalogStore, DbError};

/// A serialised catalog snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub parktypes: Vec<Parktype>,
    #[serde(default)]
    pub neighborhoods: Vec<Neighborhood>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub parks: Vec<Park>,
    #[serde(default)]
    pub facilities: Vec<Facility>,
}

/// Catalog store backed by in-memory vectors, each sorted by id.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    parktypes: Vec<Parktype>,
    neighborhoods: Vec<Neighborhood>,
    activities: Vec<Activity>,
    parks: Vec<Park>,
    facilities: Vec<Facility>,
}

impl MemoryStore {
    /// Builds a store from a fixture.
    #[must_use]
    pub fn from_fixture(fixture: CatalogFixture) -> Self {
        let CatalogFixture {
            mut parktypes,
            mut neighborhoods,
            mut activities,
            mut parks,
            mut facilities,
        } = fixture;

        parktypes.sort_by_key(|r| r.id);
        neighborhoods.sort_by_key(|r| r.id);
        activities.sort_by_key(|r| r.id);
        parks.sort_by_key(|r| r.id);
        facilities.sort_by_key(|r| r.id);

        Self {
            parktypes,
            neighborhoods,
            activities,
            parks,
            facilities,
        }
    }

    /// Parses a fixture from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Json`] if the JSON does not describe a catalog.
    pub fn from_json(json: &str) -> Result<Self, DbError> {
        let fixture: CatalogFixture = serde_json::from_str(json)?;
        Ok(Self::from_fixture(fixture))
    }

    /// Loads a fixture file.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, DbError> {
        let json = std::fs::read_to_string(path)?;
        let store = Self::from_json(&json)?;
        log::info!(
            "Loaded catalog fixture {}: {} parks, {} facilities, {} neighborhoods",
            path.display(),
            store.parks.len(),
            store.facilities.len(),
            store.neighborhoods.len()
        );
        Ok(store)
    }
}

fn filtered<T: CatalogRow + Clone>(rows: &[T], filter: &ListFilter, page: Page) -> Listing<T> {
    let matching: Vec<&T> = rows.iter().filter(|r| filter.matches(*r)).collect();
    Listing::paginate(matching, page).map(T::clone)
}

fn to_geo(geometry: Option<&geojson::Geometry>) -> Option<geo::Geometry<f64>> {
    geometry.cloned()?.try_into().ok()
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn neighborhood_by_slug(&self, slug: &str) -> Result<Option<Neighborhood>, DbError> {
        Ok(self.neighborhoods.iter().find(|n| n.slug == slug).cloned())
    }

    async fn activity_by_slug(&self, slug: &str) -> Result<Option<Activity>, DbError> {
        Ok(self.activities.iter().find(|a| a.slug == slug).cloned())
    }

    async fn parktype_by_id(&self, id: i32) -> Result<Option<Parktype>, DbError> {
        Ok(self.parktypes.iter().find(|t| t.id == id).cloned())
    }

    async fn activities_by_ids(&self, ids: &[i32]) -> Result<Vec<Activity>, DbError> {
        Ok(self
            .activities
            .iter()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn parks_by_ids(&self, ids: &[i32]) -> Result<Vec<Park>, DbError> {
        Ok(self
            .parks
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn facilities_offering(&self, activity_id: i32) -> Result<Vec<Facility>, DbError> {
        Ok(self
            .facilities
            .iter()
            .filter(|f| f.offers(activity_id))
            .cloned()
            .collect())
    }

    async fn parks_in_neighborhood(
        &self,
        neighborhood_id: i32,
        parktype_id: Option<i32>,
    ) -> Result<Vec<Park>, DbError> {
        Ok(self
            .parks
            .iter()
            .filter(|p| p.neighborhood_ids.contains(&neighborhood_id))
            .filter(|p| parktype_id.is_none_or(|t| p.parktype_id == t))
            .cloned()
            .collect())
    }

    async fn parks_intersecting(&self, neighborhood_id: i32) -> Result<Vec<Park>, DbError> {
        let Some(boundary) = self
            .neighborhoods
            .iter()
            .find(|n| n.id == neighborhood_id)
            .and_then(|n| to_geo(n.geometry.as_ref()))
        else {
            return Ok(Vec::new());
        };

        Ok(self
            .parks
            .iter()
            .filter(|p| to_geo(p.geometry.as_ref()).is_some_and(|g| g.intersects(&boundary)))
            .cloned()
            .collect())
    }

    async fn facilities_in_parks(&self, park_ids: &[i32]) -> Result<Vec<Facility>, DbError> {
        Ok(self
            .facilities
            .iter()
            .filter(|f| f.park_id.is_some_and(|p| park_ids.contains(&p)))
            .cloned()
            .collect())
    }

    async fn list_parks(&self, filter: &ListFilter, page: Page) -> Result<Listing<Park>, DbError> {
        Ok(filtered(&self.parks, filter, page))
    }

    async fn list_neighborhoods(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Neighborhood>, DbError> {
        Ok(filtered(&self.neighborhoods, filter, page))
    }

    async fn list_facilities(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Facility>, DbError> {
        Ok(filtered(&self.facilities, filter, page))
    }

    async fn list_activities(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Activity>, DbError> {
        Ok(filtered(&self.activities, filter, page))
    }

    async fn list_parktypes(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Parktype>, DbError> {
        Ok(filtered(&self.parktypes, filter, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use park_map_catalog_models::{FieldFilter, FilterOp};

    const FIXTURE: &str = include_str!("../fixtures/catalog.json");

    fn store() -> MemoryStore {
        MemoryStore::from_json(FIXTURE).unwrap()
    }

    fn ids<T: CatalogRow>(rows: &[T]) -> Vec<i32> {
        rows.iter().map(CatalogRow::id).collect()
    }

    #[tokio::test]
    async fn looks_up_by_external_key() {
        let store = store();

        let back_bay = store.neighborhood_by_slug("back-bay").await.unwrap();
        assert_eq!(back_bay.map(|n| n.name), Some("Back Bay".to_string()));
        assert!(store.neighborhood_by_slug("atlantis").await.unwrap().is_none());

        let tennis = store.activity_by_slug("tennis").await.unwrap();
        assert_eq!(tennis.map(|a| a.id), Some(5));

        assert!(store.parktype_by_id(2).await.unwrap().is_some());
        assert!(store.parktype_by_id(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn parks_in_neighborhood_follow_links() {
        let store = store();

        let all = store.parks_in_neighborhood(1, None).await.unwrap();
        assert_eq!(ids(&all), vec![10, 11, 12, 13]);

        let wilds = store.parks_in_neighborhood(1, Some(2)).await.unwrap();
        assert_eq!(ids(&wilds), vec![11, 12, 13]);
    }

    #[tokio::test]
    async fn parks_intersecting_use_geometry_not_links() {
        let store = store();

        let jp = store.parks_intersecting(3).await.unwrap();
        assert_eq!(ids(&jp), vec![13, 14]);

        let beacon_hill = store.parks_intersecting(2).await.unwrap();
        assert_eq!(ids(&beacon_hill), vec![15]);

        assert!(store.parks_intersecting(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn facilities_in_parks_skip_parkless_facilities() {
        let store = store();

        let facilities = store.facilities_in_parks(&[11, 12]).await.unwrap();
        assert_eq!(ids(&facilities), vec![100, 101, 102]);

        let kayaking = store.facilities_offering(9).await.unwrap();
        assert_eq!(ids(&kayaking), vec![107]);
        assert!(kayaking[0].park_id.is_none());
    }

    const ALL: Page = Page {
        limit: 100,
        offset: 0,
    };

    #[tokio::test]
    async fn lists_apply_filters_in_id_order() {
        let store = store();

        let all = store.list_parks(&ListFilter::All, ALL).await.unwrap();
        assert_eq!(ids(&all.rows), vec![10, 11, 12, 13, 14, 15]);
        assert_eq!(all.total_count, 6);

        let common = store
            .list_parks(
                &ListFilter::Fields(vec![FieldFilter::new(
                    "name",
                    FilterOp::Contains,
                    "Common",
                )]),
                ALL,
            )
            .await
            .unwrap();
        assert_eq!(ids(&common.rows), vec![15]);

        let picked = store
            .list_activities(&ListFilter::Ids([8, 5].into_iter().collect()), ALL)
            .await
            .unwrap();
        assert_eq!(ids(&picked.rows), vec![5, 8]);
    }

    #[tokio::test]
    async fn lists_page_after_filtering() {
        let store = store();

        let page = store
            .list_parks(&ListFilter::All, Page { limit: 2, offset: 2 })
            .await
            .unwrap();
        assert_eq!(ids(&page.rows), vec![12, 13]);
        assert_eq!(page.total_count, 6);

        let past_end = store
            .list_facilities(
                &ListFilter::All,
                Page {
                    limit: 20,
                    offset: usize::MAX,
                },
            )
            .await
            .unwrap();
        assert!(past_end.rows.is_empty());
        assert_eq!(past_end.total_count, 8);
    }
}
