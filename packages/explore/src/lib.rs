#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cross-filter queries over the park catalog.
//!
//! Each query narrows one entity by attributes of related entities reached
//! through the store: neighborhoods by the activities offered in their
//! parks, park types and activities by neighborhood, and the three
//! "explore" queries that intersect neighborhood, park type and activity at
//! once.
//!
//! External keys that do not resolve (an unknown neighborhood or activity
//! slug, an unknown park type id) fail with a not-found error. Requested
//! activity ids that do not exist are ignored. Nothing is cached: every
//! call goes back to the store.

use std::collections::{BTreeMap, BTreeSet};

use park_map_catalog_models::{Activity, CatalogRow, Facility, Neighborhood, Park, Parktype};
use park_map_database::{CatalogStore, DbError};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Errors that can occur while resolving a cross filter.
#[derive(Debug, Error)]
pub enum ExploreError {
    /// No neighborhood has the given slug.
    #[error("Neighborhood not found: {slug}")]
    NeighborhoodNotFound {
        /// The slug that was looked up.
        slug: String,
    },

    /// No activity has the given slug.
    #[error("Activity not found: {slug}")]
    ActivityNotFound {
        /// The slug that was looked up.
        slug: String,
    },

    /// No park type has the given id.
    #[error("Park type not found: {id}")]
    ParktypeNotFound {
        /// The id that was looked up.
        id: i32,
    },

    /// The store failed.
    #[error(transparent)]
    Database(#[from] DbError),
}

/// What the explore-parks and explore-facilities queries do when a row
/// matches more than one requested activity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DuplicatePolicy {
    /// Keep only the first occurrence of each row.
    #[default]
    Dedupe,
    /// Emit a row once per (facility, matching activity) pair, so rows that
    /// match several requested activities repeat.
    Preserve,
}

impl DuplicatePolicy {
    /// Applies the policy to rows in match order.
    #[must_use]
    pub fn apply<T: CatalogRow>(self, rows: Vec<T>) -> Vec<T> {
        match self {
            Self::Preserve => rows,
            Self::Dedupe => {
                let mut seen = BTreeSet::new();
                rows.into_iter().filter(|r| seen.insert(r.id())).collect()
            }
        }
    }
}

/// Parameters of an explore query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExploreQuery {
    /// Neighborhood slug.
    pub neighborhood: String,
    /// Park type id.
    pub parktype_id: i32,
    /// Requested activity ids. Ignored by [`explore_activities`].
    pub activity_ids: Vec<i32>,
}

async fn require_neighborhood(
    store: &dyn CatalogStore,
    slug: &str,
) -> Result<Neighborhood, ExploreError> {
    store
        .neighborhood_by_slug(slug)
        .await?
        .ok_or_else(|| ExploreError::NeighborhoodNotFound {
            slug: slug.to_string(),
        })
}

async fn require_parktype(store: &dyn CatalogStore, id: i32) -> Result<Parktype, ExploreError> {
    store
        .parktype_by_id(id)
        .await?
        .ok_or(ExploreError::ParktypeNotFound { id })
}

/// Returns the ids of neighborhoods containing at least one park with a
/// facility that offers the activity.
///
/// Neighborhood membership follows the park's neighborhood links.
/// Facilities without a park contribute nothing.
///
/// # Errors
///
/// * [`ExploreError::ActivityNotFound`] if no activity has the slug
/// * [`ExploreError::Database`] if the store fails
pub async fn neighborhoods_with_activity(
    store: &dyn CatalogStore,
    activity_slug: &str,
) -> Result<BTreeSet<i32>, ExploreError> {
    let activity = store.activity_by_slug(activity_slug).await?.ok_or_else(|| {
        ExploreError::ActivityNotFound {
            slug: activity_slug.to_string(),
        }
    })?;

    let facilities = store.facilities_offering(activity.id).await?;
    let park_ids: Vec<i32> = facilities
        .iter()
        .filter_map(|f| f.park_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let parks = store.parks_by_ids(&park_ids).await?;
    let neighborhoods: BTreeSet<i32> = parks
        .iter()
        .flat_map(|p| p.neighborhood_ids.iter().copied())
        .collect();

    log::debug!(
        "activity '{activity_slug}': {} facilities, {} parks, {} neighborhoods",
        facilities.len(),
        parks.len(),
        neighborhoods.len()
    );

    Ok(neighborhoods)
}

/// Returns the ids of park types held by at least one park linked to the
/// neighborhood.
///
/// # Errors
///
/// * [`ExploreError::NeighborhoodNotFound`] if no neighborhood has the slug
/// * [`ExploreError::Database`] if the store fails
pub async fn parktypes_in_neighborhood(
    store: &dyn CatalogStore,
    neighborhood_slug: &str,
) -> Result<BTreeSet<i32>, ExploreError> {
    let neighborhood = require_neighborhood(store, neighborhood_slug).await?;
    let parks = store.parks_in_neighborhood(neighborhood.id, None).await?;

    Ok(parks.iter().map(|p| p.parktype_id).collect())
}

/// Returns the ids of activities offered by facilities in parks whose
/// geometry intersects the neighborhood's geometry.
///
/// Unlike the other neighborhood queries this one is spatial: a park counts
/// when its boundary touches the neighborhood, whether or not the two are
/// linked.
///
/// # Errors
///
/// * [`ExploreError::NeighborhoodNotFound`] if no neighborhood has the slug
/// * [`ExploreError::Database`] if the store fails
pub async fn activities_in_neighborhood(
    store: &dyn CatalogStore,
    neighborhood_slug: &str,
) -> Result<BTreeSet<i32>, ExploreError> {
    let neighborhood = require_neighborhood(store, neighborhood_slug).await?;
    let parks = store.parks_intersecting(neighborhood.id).await?;
    let park_ids: Vec<i32> = parks.iter().map(|p| p.id).collect();
    let facilities = store.facilities_in_parks(&park_ids).await?;

    log::debug!(
        "neighborhood '{neighborhood_slug}': {} intersecting parks, {} facilities",
        parks.len(),
        facilities.len()
    );

    Ok(facilities
        .iter()
        .flat_map(|f| f.activity_ids.iter().copied())
        .collect())
}

/// Parks linked to the neighborhood with the given park type, and the
/// facilities inside them.
async fn candidates(
    store: &dyn CatalogStore,
    neighborhood_slug: &str,
    parktype_id: i32,
) -> Result<(Vec<Park>, Vec<Facility>), ExploreError> {
    let neighborhood = require_neighborhood(store, neighborhood_slug).await?;
    let parktype = require_parktype(store, parktype_id).await?;

    let parks = store
        .parks_in_neighborhood(neighborhood.id, Some(parktype.id))
        .await?;
    let park_ids: Vec<i32> = parks.iter().map(|p| p.id).collect();
    let facilities = store.facilities_in_parks(&park_ids).await?;

    log::debug!(
        "explore '{neighborhood_slug}' x parktype {parktype_id}: {} parks, {} facilities",
        parks.len(),
        facilities.len()
    );

    Ok((parks, facilities))
}

/// Visits every (facility, requested activity) pair the facility offers,
/// facilities in id order and activities in id order.
fn for_each_match<'a>(
    facilities: &'a [Facility],
    activities: &'a [Activity],
) -> impl Iterator<Item = &'a Facility> {
    facilities.iter().flat_map(move |facility| {
        activities
            .iter()
            .filter(move |activity| facility.offers(activity.id))
            .map(move |_| facility)
    })
}

/// Returns the parks in the neighborhood with the given park type that have
/// a facility offering any of the requested activities.
///
/// # Errors
///
/// * [`ExploreError::NeighborhoodNotFound`] if no neighborhood has the slug
/// * [`ExploreError::ParktypeNotFound`] if no park type has the id
/// * [`ExploreError::Database`] if the store fails
pub async fn explore_parks(
    store: &dyn CatalogStore,
    query: &ExploreQuery,
    policy: DuplicatePolicy,
) -> Result<Vec<Park>, ExploreError> {
    let (parks, facilities) = candidates(store, &query.neighborhood, query.parktype_id).await?;
    let activities = store.activities_by_ids(&query.activity_ids).await?;

    let parks_by_id: BTreeMap<i32, &Park> = parks.iter().map(|p| (p.id, p)).collect();
    let matches: Vec<Park> = for_each_match(&facilities, &activities)
        .filter_map(|f| f.park_id.and_then(|id| parks_by_id.get(&id)))
        .map(|p| (*p).clone())
        .collect();

    Ok(policy.apply(matches))
}

/// Returns the facilities in parks of the neighborhood with the given park
/// type that offer any of the requested activities.
///
/// # Errors
///
/// * [`ExploreError::NeighborhoodNotFound`] if no neighborhood has the slug
/// * [`ExploreError::ParktypeNotFound`] if no park type has the id
/// * [`ExploreError::Database`] if the store fails
pub async fn explore_facilities(
    store: &dyn CatalogStore,
    query: &ExploreQuery,
    policy: DuplicatePolicy,
) -> Result<Vec<Facility>, ExploreError> {
    let (_, facilities) = candidates(store, &query.neighborhood, query.parktype_id).await?;
    let activities = store.activities_by_ids(&query.activity_ids).await?;

    let matches: Vec<Facility> = for_each_match(&facilities, &activities)
        .cloned()
        .collect();

    Ok(policy.apply(matches))
}

/// Returns every activity offered by a facility in a park of the
/// neighborhood with the given park type, deduplicated and in id order.
///
/// Empty, not an error, when no park matches.
///
/// # Errors
///
/// * [`ExploreError::NeighborhoodNotFound`] if no neighborhood has the slug
/// * [`ExploreError::ParktypeNotFound`] if no park type has the id
/// * [`ExploreError::Database`] if the store fails
pub async fn explore_activities(
    store: &dyn CatalogStore,
    neighborhood_slug: &str,
    parktype_id: i32,
) -> Result<Vec<Activity>, ExploreError> {
    let (_, facilities) = candidates(store, neighborhood_slug, parktype_id).await?;
    let activity_ids: Vec<i32> = facilities
        .iter()
        .flat_map(|f| f.activity_ids.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(store.activities_by_ids(&activity_ids).await?)
}
