#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Park catalog entity types.
//!
//! These types are the shapes of catalog rows as read from the spatial
//! store: parks, neighborhoods, facilities, activities and park types.
//! They are distinct from the API response types in
//! `park_map_server_models`, which decide which fields are exposed per
//! resource.
//!
//! Geometries are always in EPSG:4326 once they leave the store.

pub mod filter;
pub mod page;

pub use filter::{FieldFilter, FilterOp, ListFilter};
pub use page::{Listing, Page};

use geojson::Geometry;
use serde::{Deserialize, Serialize};

/// EPSG code of the coordinate reference system geometries are served in.
pub const OUTPUT_SRID: i32 = 4326;

/// A catalog row with a numeric primary key and named text fields.
///
/// Stores use this to evaluate [`ListFilter`]s against rows they hold in
/// memory.
pub trait CatalogRow {
    /// Primary key.
    fn id(&self) -> i32;

    /// Returns the value of a text field by name, or `None` if the row has
    /// no such field or the field is null.
    fn text_field(&self, field: &str) -> Option<&str>;
}

/// A park row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Park {
    /// Primary key.
    pub id: i32,
    /// Display name (e.g. "Boston Common").
    pub name: String,
    /// Stable external key.
    pub slug: String,
    /// Alternate name, if the park is known by another one.
    #[serde(default)]
    pub alt_name: Option<String>,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// The park's type. Every park has exactly one.
    pub parktype_id: i32,
    /// Neighborhoods the park is linked to.
    #[serde(default)]
    pub neighborhood_ids: Vec<i32>,
    /// Park boundary in EPSG:4326.
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

impl CatalogRow for Park {
    fn id(&self) -> i32 {
        self.id
    }

    fn text_field(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "slug" => Some(&self.slug),
            "alt_name" => self.alt_name.as_deref(),
            "address" => self.address.as_deref(),
            "description" => self.description.as_deref(),
            _ => None,
        }
    }
}

/// A neighborhood row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    /// Primary key.
    pub id: i32,
    /// Display name (e.g. "Back Bay").
    pub name: String,
    /// Stable external key (e.g. `"back-bay"`).
    pub slug: String,
    /// Neighborhood boundary in EPSG:4326.
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

impl CatalogRow for Neighborhood {
    fn id(&self) -> i32 {
        self.id
    }

    fn text_field(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "slug" => Some(&self.slug),
            _ => None,
        }
    }
}

/// A facility row. Facilities sit inside at most one park and offer a set
/// of activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    /// Primary key.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Owning park. Facilities without a park are excluded from every
    /// neighborhood-derived lookup.
    #[serde(default)]
    pub park_id: Option<i32>,
    /// Operational status as recorded by the administrators.
    #[serde(default)]
    pub status: Option<String>,
    /// Point location in EPSG:4326.
    #[serde(default)]
    pub location: Option<Geometry>,
    /// Activities offered at this facility.
    #[serde(default)]
    pub activity_ids: Vec<i32>,
}

impl Facility {
    /// Whether this facility offers the given activity.
    #[must_use]
    pub fn offers(&self, activity_id: i32) -> bool {
        self.activity_ids.contains(&activity_id)
    }
}

impl CatalogRow for Facility {
    fn id(&self) -> i32 {
        self.id
    }

    fn text_field(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "status" => self.status.as_deref(),
            _ => None,
        }
    }
}

/// An activity row (e.g. "Tennis", "Swimming").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Primary key.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Stable external key.
    pub slug: String,
}

impl CatalogRow for Activity {
    fn id(&self) -> i32 {
        self.id
    }

    fn text_field(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            "slug" => Some(&self.slug),
            _ => None,
        }
    }
}

/// A park type row (e.g. "Urban Wild", "Playground").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parktype {
    /// Primary key.
    pub id: i32,
    /// Display name.
    pub name: String,
}

impl CatalogRow for Parktype {
    fn id(&self) -> i32 {
        self.id
    }

    fn text_field(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(&self.name),
            _ => None,
        }
    }
}
