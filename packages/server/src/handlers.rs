//! HTTP handler functions for the park map API.

use std::collections::BTreeSet;

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, web};
use park_map_catalog_models::{ListFilter, Listing, Page};
use park_map_server_models::{
    ApiActivity, ApiEntry, ApiErrorBody, ApiFacility, ApiHealth, ApiList, ApiNeighborhood, ApiPark,
    ApiParktype,
};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;
use crate::pagination::{list_meta, page_from_params};
use crate::resources::{self, QueryParams, Representation, ResourceConfig, Selection};

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/v1/{resource}/`
///
/// Lists a resource, narrowed by the filters in the query string.
pub async fn list(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<Vec<(String, String)>>,
    req: HttpRequest,
) -> HttpResponse {
    let params = QueryParams::new(query.into_inner());

    match list_page(&state, &path, &params, req.query_string()).await {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(e) => e.into_response(),
    }
}

/// `GET /api/v1/{resource}/{id}/`
pub async fn detail(state: web::Data<AppState>, path: web::Path<(String, String)>) -> HttpResponse {
    let (name, id) = path.into_inner();

    match detail_object(&state, &name, &id).await {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(e) => e.into_response(),
    }
}

/// Any method other than `GET` on a resource path.
pub async fn method_not_allowed(req: HttpRequest) -> HttpResponse {
    let name = req.match_info().get("resource").unwrap_or_default();

    if resources::find(name).is_none() {
        return unknown_resource(name).into_response();
    }

    HttpResponse::MethodNotAllowed()
        .insert_header((header::ALLOW, "GET"))
        .json(ApiErrorBody {
            error: format!("Method {} not allowed on '{name}'", req.method()),
        })
}

fn unknown_resource(name: &str) -> ApiError {
    ApiError::NotFound(format!("Unknown resource '{name}'"))
}

async fn list_page(
    state: &AppState,
    name: &str,
    params: &QueryParams,
    raw_query: &str,
) -> Result<ApiList<serde_json::Value>, ApiError> {
    let resource = resources::find(name).ok_or_else(|| unknown_resource(name))?;
    let page = page_from_params(params)?;
    let selection =
        resources::build_selection(resource, params, state.store.as_ref(), state.duplicate_policy)
            .await?;

    let listing = fetch(state, resource, selection, page).await?;

    Ok(ApiList {
        meta: list_meta(page, resource.name, raw_query, listing.total_count),
        objects: listing.rows,
    })
}

async fn detail_object(
    state: &AppState,
    name: &str,
    id: &str,
) -> Result<serde_json::Value, ApiError> {
    let resource = resources::find(name).ok_or_else(|| unknown_resource(name))?;
    let not_found = || ApiError::NotFound(format!("No {name} with id '{id}'"));

    let id: i32 = id.parse().map_err(|_| not_found())?;
    let selection = Selection::Filter(ListFilter::Ids(BTreeSet::from([id])));

    let listing = fetch(state, resource, selection, Page { limit: 1, offset: 0 }).await?;
    listing.rows.into_iter().next().ok_or_else(not_found)
}

/// Renders one page of the selected rows.
///
/// Explore rows arrive already loaded and are paged here. Filters are
/// handed to the store, which pages and counts them itself.
async fn fetch(
    state: &AppState,
    resource: &ResourceConfig,
    selection: Selection,
    page: Page,
) -> Result<Listing<serde_json::Value>, ApiError> {
    let store = state.store.as_ref();
    let name = resource.name;

    let filter = match selection {
        Selection::Parks(rows) => {
            return render(Listing::paginate(rows, page), |row| {
                ApiPark::from_row(row, name)
            });
        }
        Selection::Facilities(rows) => {
            return render(Listing::paginate(rows, page), |row| {
                ApiFacility::from_row(row, name)
            });
        }
        Selection::Filter(filter) => filter,
    };

    match resource.representation {
        Representation::Park => render(store.list_parks(&filter, page).await?, |row| {
            ApiPark::from_row(row, name)
        }),
        Representation::Facility => render(store.list_facilities(&filter, page).await?, |row| {
            ApiFacility::from_row(row, name)
        }),
        Representation::Activity => render(store.list_activities(&filter, page).await?, |row| {
            ApiActivity::from_row(row, name)
        }),
        Representation::Neighborhood => {
            render(store.list_neighborhoods(&filter, page).await?, |row| {
                ApiNeighborhood::from_row(row, name)
            })
        }
        Representation::Parktype => render(store.list_parktypes(&filter, page).await?, |row| {
            ApiParktype::from_row(row, name)
        }),
        Representation::Entry => render(store.list_neighborhoods(&filter, page).await?, |row| {
            ApiEntry::from_row(row, name)
        }),
    }
}

fn render<T, A: Serialize>(
    listing: Listing<T>,
    to_api: impl Fn(T) -> A,
) -> Result<Listing<serde_json::Value>, ApiError> {
    let rows = listing
        .rows
        .into_iter()
        .map(|row| serde_json::to_value(to_api(row)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Listing {
        total_count: listing.total_count,
        rows,
    })
}
