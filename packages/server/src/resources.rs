//! Catalog resource table and the query-string to filter translation.
//!
//! Every resource is one row in [`RESOURCES`]: which representation it
//! renders, which entity fields exist, which of them may be filtered and
//! with which operators, and the optional composite filter that hands the
//! request to a cross-filter query. [`build_selection`] is the only place
//! those rows are interpreted.

use std::collections::BTreeSet;

use park_map_catalog_models::{CatalogRow, Facility, FieldFilter, FilterOp, ListFilter, Park};
use park_map_database::CatalogStore;
use park_map_explore::{self as explore, DuplicatePolicy, ExploreQuery};

use crate::error::ApiError;

/// Query-string keys that control the response rather than filter it.
pub const RESERVED_PARAMS: &[&str] = &["limit", "offset", "format"];

/// How a resource's rows are fetched and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Park rows with geometry.
    Park,
    /// Facility rows without status or location.
    Facility,
    Activity,
    /// Neighborhood rows without geometry.
    Neighborhood,
    Parktype,
    /// Neighborhood rows rendered as links to the resources they narrow.
    Entry,
}

/// A cross-filter query a resource can delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossFilter {
    /// `activity` slug -> neighborhoods offering it.
    NeighborhoodsWithActivity,
    /// `neighborhood` slug -> park types present.
    ParktypesInNeighborhood,
    /// `neighborhood` slug -> activities in intersecting parks.
    ActivitiesInNeighborhood,
    /// `neighborhood` x `parktype` x `activity_ids` -> parks.
    ExploreParks,
    /// `neighborhood` x `parktype` x `activity_ids` -> facilities.
    ExploreFacilities,
    /// `neighborhood` x `parktype` -> activities.
    ExploreActivities,
}

/// Keys that, when all present, route a list request through a cross
/// filter.
#[derive(Debug, Clone, Copy)]
pub struct CompositeFilter {
    /// Query-string keys the cross filter reads.
    pub keys: &'static [&'static str],
    /// Query run when every key is present.
    pub cross_filter: CrossFilter,
}

/// One catalog resource.
#[derive(Debug, Clone, Copy)]
pub struct ResourceConfig {
    /// Path segment under the API prefix.
    pub name: &'static str,
    /// Which rows are listed and how they render.
    pub representation: Representation,
    /// Entity fields. Query keys naming anything else are ignored.
    pub fields: &'static [&'static str],
    /// Fields that may be filtered, with their permitted operators.
    pub filtering: &'static [(&'static str, &'static [FilterOp])],
    /// Cross filter that replaces simple filtering when its keys are given.
    pub composite: Option<CompositeFilter>,
}

const PARK_FIELDS: &[&str] = &["id", "name", "slug", "alt_name", "address", "description"];
const FACILITY_FIELDS: &[&str] = &["id", "name", "status"];
const ACTIVITY_FIELDS: &[&str] = &["id", "name", "slug"];
const NEIGHBORHOOD_FIELDS: &[&str] = &["id", "name", "slug"];
const PARKTYPE_FIELDS: &[&str] = &["id", "name"];

const EXPLORE_KEYS: &[&str] = &["neighborhood", "parktype", "activity_ids"];

/// Every catalog resource.
pub const RESOURCES: &[ResourceConfig] = &[
    ResourceConfig {
        name: "park",
        representation: Representation::Park,
        fields: PARK_FIELDS,
        filtering: &[("name", FilterOp::ALL)],
        composite: None,
    },
    ResourceConfig {
        name: "explore_activity",
        representation: Representation::Activity,
        fields: ACTIVITY_FIELDS,
        filtering: &[],
        composite: Some(CompositeFilter {
            keys: &["neighborhood", "parktype"],
            cross_filter: CrossFilter::ExploreActivities,
        }),
    },
    ResourceConfig {
        name: "explore_park",
        representation: Representation::Park,
        fields: PARK_FIELDS,
        filtering: &[],
        composite: Some(CompositeFilter {
            keys: EXPLORE_KEYS,
            cross_filter: CrossFilter::ExploreParks,
        }),
    },
    ResourceConfig {
        name: "explore_facility",
        representation: Representation::Facility,
        fields: FACILITY_FIELDS,
        filtering: &[],
        composite: Some(CompositeFilter {
            keys: EXPLORE_KEYS,
            cross_filter: CrossFilter::ExploreFacilities,
        }),
    },
    ResourceConfig {
        name: "neighborhood",
        representation: Representation::Neighborhood,
        fields: NEIGHBORHOOD_FIELDS,
        filtering: &[],
        composite: Some(CompositeFilter {
            keys: &["activity"],
            cross_filter: CrossFilter::NeighborhoodsWithActivity,
        }),
    },
    ResourceConfig {
        name: "parktype",
        representation: Representation::Parktype,
        fields: PARKTYPE_FIELDS,
        filtering: &[],
        composite: Some(CompositeFilter {
            keys: &["neighborhood"],
            cross_filter: CrossFilter::ParktypesInNeighborhood,
        }),
    },
    ResourceConfig {
        name: "activity",
        representation: Representation::Activity,
        fields: ACTIVITY_FIELDS,
        filtering: &[],
        composite: Some(CompositeFilter {
            keys: &["neighborhood"],
            cross_filter: CrossFilter::ActivitiesInNeighborhood,
        }),
    },
    ResourceConfig {
        name: "entry",
        representation: Representation::Entry,
        fields: NEIGHBORHOOD_FIELDS,
        filtering: &[],
        composite: None,
    },
];

/// Looks up a resource by path segment.
#[must_use]
pub fn find(name: &str) -> Option<&'static ResourceConfig> {
    RESOURCES.iter().find(|r| r.name == name)
}

/// Decoded query-string pairs in request order.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    #[must_use]
    pub const fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// Returns the last value given for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, key: &str) -> Result<&str, ApiError> {
        self.get(key)
            .ok_or_else(|| ApiError::BadRequest(format!("Missing '{key}' parameter")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parses a `parktype` parameter.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] if the value is not an integer.
pub fn parse_parktype(raw: &str) -> Result<i32, ApiError> {
    raw.trim().parse().map_err(|_| {
        ApiError::BadRequest(format!("Invalid parktype '{raw}': expected an integer id"))
    })
}

/// Parses a comma-separated `activity_ids` parameter. Blank items are
/// skipped.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] if any item is not an integer.
pub fn parse_activity_ids(raw: &str) -> Result<Vec<i32>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse().map_err(|_| {
                ApiError::BadRequest(format!(
                    "Invalid activity_ids '{raw}': '{part}' is not an integer id"
                ))
            })
        })
        .collect()
}

fn ids_of<T: CatalogRow>(rows: &[T]) -> BTreeSet<i32> {
    rows.iter().map(CatalogRow::id).collect()
}

/// Rows a list request resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Rows matching a filter, paged by the store.
    Filter(ListFilter),
    /// Explore-parks result in match order. Under
    /// [`DuplicatePolicy::Preserve`] a park repeats once per matching
    /// (facility, activity) pair.
    Parks(Vec<Park>),
    /// Explore-facilities result in match order, repeating like
    /// [`Selection::Parks`].
    Facilities(Vec<Facility>),
}

impl CrossFilter {
    /// Runs the cross filter with arguments taken from `params`.
    ///
    /// The explore-parks and explore-facilities queries return their rows
    /// as matched, so `policy` shows in the response. The others narrow the
    /// resource's list to the matching ids.
    ///
    /// # Errors
    ///
    /// * [`ApiError::BadRequest`] if an argument is missing or malformed
    /// * [`ApiError::NotFound`] if a referenced slug or id does not exist
    /// * [`ApiError::Database`] if the store fails
    pub async fn resolve(
        self,
        params: &QueryParams,
        store: &dyn CatalogStore,
        policy: DuplicatePolicy,
    ) -> Result<Selection, ApiError> {
        let ids = match self {
            Self::NeighborhoodsWithActivity => {
                explore::neighborhoods_with_activity(store, params.require("activity")?).await?
            }
            Self::ParktypesInNeighborhood => {
                explore::parktypes_in_neighborhood(store, params.require("neighborhood")?).await?
            }
            Self::ActivitiesInNeighborhood => {
                explore::activities_in_neighborhood(store, params.require("neighborhood")?)
                    .await?
            }
            Self::ExploreParks => {
                let query = explore_query(params, true)?;
                let parks = explore::explore_parks(store, &query, policy).await?;
                return Ok(Selection::Parks(parks));
            }
            Self::ExploreFacilities => {
                let query = explore_query(params, true)?;
                let facilities = explore::explore_facilities(store, &query, policy).await?;
                return Ok(Selection::Facilities(facilities));
            }
            Self::ExploreActivities => {
                let query = explore_query(params, false)?;
                ids_of(
                    &explore::explore_activities(store, &query.neighborhood, query.parktype_id)
                        .await?,
                )
            }
        };

        Ok(Selection::Filter(ListFilter::Ids(ids)))
    }
}

fn explore_query(params: &QueryParams, with_activities: bool) -> Result<ExploreQuery, ApiError> {
    let activity_ids = if with_activities {
        parse_activity_ids(params.require("activity_ids")?)?
    } else {
        Vec::new()
    };

    Ok(ExploreQuery {
        neighborhood: params.require("neighborhood")?.to_string(),
        parktype_id: parse_parktype(params.require("parktype")?)?,
        activity_ids,
    })
}

/// Translates a request's query string into the rows of a resource's list.
///
/// When every composite key of the resource is present, the cross filter
/// runs and its result is the whole selection; any simple field filters in
/// the request are discarded. Otherwise each key of the form `field` or
/// `field__op` naming an entity field becomes a [`FieldFilter`]. Reserved
/// keys and keys that name no entity field are ignored.
///
/// # Errors
///
/// * [`ApiError::BadRequest`] if a field does not allow filtering, an
///   operator is unknown or not permitted, or a composite argument is
///   malformed
/// * [`ApiError::NotFound`] if the cross filter references a missing row
/// * [`ApiError::Database`] if the store fails
pub async fn build_selection(
    resource: &ResourceConfig,
    params: &QueryParams,
    store: &dyn CatalogStore,
    policy: DuplicatePolicy,
) -> Result<Selection, ApiError> {
    if let Some(composite) = resource.composite
        && composite.keys.iter().all(|key| params.get(key).is_some())
    {
        let selection = composite.cross_filter.resolve(params, store, policy).await?;
        log::debug!(
            "{}: {:?} matched {}",
            resource.name,
            composite.cross_filter,
            selection.describe()
        );
        return Ok(selection);
    }

    simple_filters(resource, params).map(Selection::Filter)
}

impl Selection {
    fn describe(&self) -> String {
        match self {
            Self::Filter(ListFilter::Ids(ids)) => format!("{} ids", ids.len()),
            Self::Filter(_) => "a field filter".to_string(),
            Self::Parks(rows) => format!("{} parks", rows.len()),
            Self::Facilities(rows) => format!("{} facilities", rows.len()),
        }
    }
}

fn simple_filters(resource: &ResourceConfig, params: &QueryParams) -> Result<ListFilter, ApiError> {
    let mut filters = Vec::new();

    for (key, value) in params.iter() {
        if RESERVED_PARAMS.contains(&key) {
            continue;
        }

        let (field_name, op_name) = match key.split_once("__") {
            Some((field, op)) => (field, Some(op)),
            None => (key, None),
        };

        let Some(field) = resource.fields.iter().copied().find(|f| *f == field_name) else {
            continue;
        };

        let Some((_, allowed)) = resource.filtering.iter().find(|(f, _)| *f == field) else {
            return Err(ApiError::BadRequest(format!(
                "The '{field}' field does not allow filtering."
            )));
        };

        let op = match op_name {
            Some(name) => name.parse::<FilterOp>().map_err(|_| {
                ApiError::BadRequest(format!("Unknown filter '{name}' on field '{field}'."))
            })?,
            None => FilterOp::Exact,
        };

        if !allowed.contains(&op) {
            return Err(ApiError::BadRequest(format!(
                "The '{op}' filter is not allowed on field '{field}'."
            )));
        }

        filters.push(FieldFilter::new(field, op, value));
    }

    Ok(if filters.is_empty() {
        ListFilter::All
    } else {
        ListFilter::Fields(filters)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use park_map_database::memory::MemoryStore;

    const FIXTURE: &str = include_str!("../../database/fixtures/catalog.json");

    fn store() -> MemoryStore {
        MemoryStore::from_json(FIXTURE).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    fn resource(name: &str) -> &'static ResourceConfig {
        find(name).unwrap()
    }

    fn id_filter(ids: &[i32]) -> Selection {
        Selection::Filter(ListFilter::Ids(ids.iter().copied().collect()))
    }

    fn row_ids<T: CatalogRow>(rows: &[T]) -> Vec<i32> {
        rows.iter().map(CatalogRow::id).collect()
    }

    #[test]
    fn resource_names_are_unique() {
        let names: BTreeSet<&str> = RESOURCES.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), RESOURCES.len());
        assert!(find("facility").is_none());
    }

    #[test]
    fn filterable_fields_are_entity_fields() {
        for resource in RESOURCES {
            for (field, _) in resource.filtering {
                assert!(
                    resource.fields.contains(field),
                    "{} filters on unknown field {field}",
                    resource.name
                );
            }
        }
    }

    #[test]
    fn parses_composite_arguments() {
        assert_eq!(parse_parktype(" 2 ").unwrap(), 2);
        assert!(matches!(parse_parktype("two"), Err(ApiError::BadRequest(_))));

        assert_eq!(parse_activity_ids("5,7").unwrap(), vec![5, 7]);
        assert_eq!(parse_activity_ids("5, ,7,").unwrap(), vec![5, 7]);
        assert!(parse_activity_ids("").unwrap().is_empty());
        assert!(matches!(parse_activity_ids("5,x"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn last_value_wins() {
        let params = params(&[("neighborhood", "back-bay"), ("neighborhood", "beacon-hill")]);
        assert_eq!(params.get("neighborhood"), Some("beacon-hill"));
        assert_eq!(params.get("parktype"), None);
    }

    #[actix_web::test]
    async fn composite_keys_delegate_to_cross_filter() {
        let store = store();

        let filter = build_selection(
            resource("parktype"),
            &params(&[("neighborhood", "back-bay")]),
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap();
        assert_eq!(filter, id_filter(&[2, 3]));

        let filter = build_selection(
            resource("explore_activity"),
            &params(&[("neighborhood", "jamaica-plain"), ("parktype", "2")]),
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap();
        assert_eq!(filter, id_filter(&[5, 6]));
    }

    #[actix_web::test]
    async fn explore_rows_follow_duplicate_policy() {
        let store = store();
        let explore = params(&[
            ("neighborhood", "back-bay"),
            ("parktype", "2"),
            ("activity_ids", "5,7"),
        ]);

        let dedupe = build_selection(
            resource("explore_park"),
            &explore,
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap();
        let parks = match dedupe {
            Selection::Parks(parks) => parks,
            other => panic!("expected parks, got {other:?}"),
        };
        assert_eq!(row_ids(&parks), vec![11, 12]);

        let preserve = build_selection(
            resource("explore_park"),
            &explore,
            &store,
            DuplicatePolicy::Preserve,
        )
        .await
        .unwrap();
        let parks = match preserve {
            Selection::Parks(parks) => parks,
            other => panic!("expected parks, got {other:?}"),
        };
        assert_eq!(row_ids(&parks), vec![11, 12, 12]);

        let facilities = build_selection(
            resource("explore_facility"),
            &explore,
            &store,
            DuplicatePolicy::Preserve,
        )
        .await
        .unwrap();
        let facilities = match facilities {
            Selection::Facilities(facilities) => facilities,
            other => panic!("expected facilities, got {other:?}"),
        };
        assert_eq!(row_ids(&facilities), vec![100, 102, 102]);
    }

    #[actix_web::test]
    async fn unused_filter_keys_stay_ignored() {
        let store = store();

        let filter = build_selection(
            resource("parktype"),
            &params(&[("format", "json"), ("color", "green")]),
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap();
        assert_eq!(filter, Selection::Filter(ListFilter::All));
    }

    #[actix_web::test]
    async fn composite_discards_simple_filters() {
        let store = store();

        let filter = build_selection(
            resource("neighborhood"),
            &params(&[("activity", "ice-skating"), ("name", "Back Bay")]),
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap();
        assert_eq!(filter, id_filter(&[1, 2]));
    }

    #[actix_web::test]
    async fn partial_composite_falls_through() {
        let store = store();

        let filter = build_selection(
            resource("explore_activity"),
            &params(&[("neighborhood", "back-bay")]),
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap();
        assert_eq!(filter, Selection::Filter(ListFilter::All));
    }

    #[actix_web::test]
    async fn builds_allow_listed_field_filters() {
        let store = store();

        let filter = build_selection(
            resource("park"),
            &params(&[
                ("name__icontains", "common"),
                ("limit", "5"),
                ("neighborhood", "back-bay"),
            ]),
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap();
        assert_eq!(
            filter,
            Selection::Filter(ListFilter::Fields(vec![FieldFilter::new(
                "name",
                FilterOp::Icontains,
                "common"
            )]))
        );
    }

    #[actix_web::test]
    async fn rejects_disallowed_fields_and_operators() {
        let store = store();

        let err = build_selection(
            resource("park"),
            &params(&[("slug", "boston-common")]),
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "The 'slug' field does not allow filtering.");

        let err = build_selection(
            resource("park"),
            &params(&[("name__regex", "^B")]),
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[actix_web::test]
    async fn unknown_slug_is_not_found() {
        let store = store();

        let err = build_selection(
            resource("neighborhood"),
            &params(&[("activity", "nonexistent-slug")]),
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[actix_web::test]
    async fn malformed_composite_argument_is_bad_request() {
        let store = store();

        let err = build_selection(
            resource("explore_facility"),
            &params(&[
                ("neighborhood", "back-bay"),
                ("parktype", "2"),
                ("activity_ids", "5;7"),
            ]),
            &store,
            DuplicatePolicy::Dedupe,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
