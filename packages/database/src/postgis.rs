//! `PostGIS`-backed catalog store.
//!
//! All queries are raw parameterised SQL via `query_raw_params()`.
//! Many-to-many links are folded into comma-separated id lists with
//! `string_agg` so each entity comes back as a single row, and geometry is
//! re-projected to [`OUTPUT_SRID`] and serialised with `ST_AsGeoJSON` inside
//! the database. List queries page with `LIMIT`/`OFFSET` and count matches
//! with a separate `COUNT(*)`.

use std::sync::Arc;

use async_trait::async_trait;
use geojson::{GeoJson, Geometry};
use moosicbox_json_utils::database::ToValue as _;
use park_map_catalog_models::{
    Activity, Facility, FieldFilter, FilterOp, ListFilter, Listing, Neighborhood, OUTPUT_SRID,
    Page, Park, Parktype,
};
use switchy_database::{Database, DatabaseValue, Row};

use crate::{CatalogStore, DbError};

/// A catalog table: alias, `FROM` clause and selected columns. `{srid}` in
/// the columns is replaced with [`OUTPUT_SRID`].
struct Table {
    alias: &'static str,
    from: &'static str,
    columns: &'static str,
}

impl Table {
    fn select(&self) -> String {
        format!(
            "SELECT {} FROM {}",
            self.columns.replace("{srid}", &OUTPUT_SRID.to_string()),
            self.from
        )
    }
}

const PARKS: Table = Table {
    alias: "p",
    from: "parks p",
    columns: "p.id, p.name, p.slug, p.alt_name, p.address, p.description, p.parktype_id,
        COALESCE((SELECT string_agg(pn.neighborhood_id::text, ',' ORDER BY pn.neighborhood_id)
                  FROM park_neighborhoods pn WHERE pn.park_id = p.id), '') AS neighborhood_ids,
        ST_AsGeoJSON(ST_Transform(p.geometry, {srid})) AS geometry",
};

const NEIGHBORHOODS: Table = Table {
    alias: "n",
    from: "neighborhoods n",
    columns: "n.id, n.name, n.slug, ST_AsGeoJSON(ST_Transform(n.geometry, {srid})) AS geometry",
};

const FACILITIES: Table = Table {
    alias: "f",
    from: "facilities f",
    columns: "f.id, f.name, f.park_id, f.status,
        ST_AsGeoJSON(ST_Transform(f.location, {srid})) AS location,
        COALESCE((SELECT string_agg(fa.activity_id::text, ',' ORDER BY fa.activity_id)
                  FROM facility_activities fa WHERE fa.facility_id = f.id), '') AS activity_ids",
};

const ACTIVITIES: Table = Table {
    alias: "a",
    from: "activities a",
    columns: "a.id, a.name, a.slug",
};

const PARKTYPES: Table = Table {
    alias: "t",
    from: "parktypes t",
    columns: "t.id, t.name",
};

/// Catalog store over a `PostGIS` database.
pub struct PostgisStore {
    db: Arc<dyn Database>,
}

impl PostgisStore {
    /// Wraps an open database connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    async fn fetch<T>(
        &self,
        table: &Table,
        conditions: Conditions,
        decode: fn(&Row) -> Result<T, DbError>,
    ) -> Result<Vec<T>, DbError> {
        self.fetch_page(table, conditions, None, decode).await
    }

    async fn list<T>(
        &self,
        table: &Table,
        filter: &ListFilter,
        page: Page,
        decode: fn(&Row) -> Result<T, DbError>,
    ) -> Result<Listing<T>, DbError> {
        let conditions = || {
            let mut conditions = Conditions::default();
            conditions.list_filter(table.alias, filter);
            conditions
        };

        let (sql, params) = conditions().render_count(table);
        log::trace!("catalog count: {sql}");
        let counted = self.db.query_raw_params(&sql, &params).await?;
        let total_count: i64 = match counted.first() {
            Some(row) => row
                .to_value("total_count")
                .map_err(conversion("total_count"))?,
            None => 0,
        };
        drop(counted);

        let rows = self
            .fetch_page(table, conditions(), Some(page), decode)
            .await?;

        Ok(Listing {
            total_count: usize::try_from(total_count).unwrap_or(0),
            rows,
        })
    }

    async fn fetch_page<T>(
        &self,
        table: &Table,
        conditions: Conditions,
        page: Option<Page>,
        decode: fn(&Row) -> Result<T, DbError>,
    ) -> Result<Vec<T>, DbError> {
        let (sql, params) = conditions.render(table, page);
        log::trace!("catalog query: {sql}");
        let rows = self.db.query_raw_params(&sql, &params).await?;
        rows.iter().map(decode).collect()
    }
}

#[async_trait]
impl CatalogStore for PostgisStore {
    async fn neighborhood_by_slug(&self, slug: &str) -> Result<Option<Neighborhood>, DbError> {
        let mut conditions = Conditions::default();
        conditions.text("n.slug", slug);
        let rows = self
            .fetch(&NEIGHBORHOODS, conditions, neighborhood_from_row)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn activity_by_slug(&self, slug: &str) -> Result<Option<Activity>, DbError> {
        let mut conditions = Conditions::default();
        conditions.text("a.slug", slug);
        let rows = self
            .fetch(&ACTIVITIES, conditions, activity_from_row)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn parktype_by_id(&self, id: i32) -> Result<Option<Parktype>, DbError> {
        let mut conditions = Conditions::default();
        conditions.ids("t.id", &[id]);
        let rows = self
            .fetch(&PARKTYPES, conditions, parktype_from_row)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn activities_by_ids(&self, ids: &[i32]) -> Result<Vec<Activity>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conditions = Conditions::default();
        conditions.ids("a.id", ids);
        self.fetch(&ACTIVITIES, conditions, activity_from_row).await
    }

    async fn parks_by_ids(&self, ids: &[i32]) -> Result<Vec<Park>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conditions = Conditions::default();
        conditions.ids("p.id", ids);
        self.fetch(&PARKS, conditions, park_from_row).await
    }

    async fn facilities_offering(&self, activity_id: i32) -> Result<Vec<Facility>, DbError> {
        let mut conditions = Conditions::default();
        let p = conditions.bind(DatabaseValue::Int32(activity_id));
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM facility_activities fa
                     WHERE fa.facility_id = f.id AND fa.activity_id = {p})"
        ));
        self.fetch(&FACILITIES, conditions, facility_from_row).await
    }

    async fn parks_in_neighborhood(
        &self,
        neighborhood_id: i32,
        parktype_id: Option<i32>,
    ) -> Result<Vec<Park>, DbError> {
        let mut conditions = Conditions::default();
        let p = conditions.bind(DatabaseValue::Int32(neighborhood_id));
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM park_neighborhoods pn
                     WHERE pn.park_id = p.id AND pn.neighborhood_id = {p})"
        ));
        if let Some(parktype_id) = parktype_id {
            conditions.ids("p.parktype_id", &[parktype_id]);
        }
        self.fetch(&PARKS, conditions, park_from_row).await
    }

    async fn parks_intersecting(&self, neighborhood_id: i32) -> Result<Vec<Park>, DbError> {
        let mut conditions = Conditions::default();
        let p = conditions.bind(DatabaseValue::Int32(neighborhood_id));
        conditions.push(format!(
            "ST_Intersects(p.geometry,
                (SELECT ST_Transform(n.geometry, ST_SRID(p.geometry))
                 FROM neighborhoods n WHERE n.id = {p}))"
        ));
        self.fetch(&PARKS, conditions, park_from_row).await
    }

    async fn facilities_in_parks(&self, park_ids: &[i32]) -> Result<Vec<Facility>, DbError> {
        if park_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conditions = Conditions::default();
        conditions.ids("f.park_id", park_ids);
        self.fetch(&FACILITIES, conditions, facility_from_row).await
    }

    async fn list_parks(&self, filter: &ListFilter, page: Page) -> Result<Listing<Park>, DbError> {
        self.list(&PARKS, filter, page, park_from_row).await
    }

    async fn list_neighborhoods(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Neighborhood>, DbError> {
        self.list(&NEIGHBORHOODS, filter, page, neighborhood_from_row)
            .await
    }

    async fn list_facilities(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Facility>, DbError> {
        self.list(&FACILITIES, filter, page, facility_from_row)
            .await
    }

    async fn list_activities(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Activity>, DbError> {
        self.list(&ACTIVITIES, filter, page, activity_from_row)
            .await
    }

    async fn list_parktypes(
        &self,
        filter: &ListFilter,
        page: Page,
    ) -> Result<Listing<Parktype>, DbError> {
        self.list(&PARKTYPES, filter, page, parktype_from_row)
            .await
    }
}

/// `WHERE` clauses and their bound parameters, numbered `$1..$n` in the
/// order they were bound.
#[derive(Debug, Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<DatabaseValue>,
}

impl Conditions {
    /// Binds a parameter and returns its placeholder.
    fn bind(&mut self, value: DatabaseValue) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn push(&mut self, clause: String) {
        self.clauses.push(clause);
    }

    fn text(&mut self, column: &str, value: &str) {
        let p = self.bind(DatabaseValue::String(value.to_string()));
        self.push(format!("{column} = {p}"));
    }

    fn ids(&mut self, column: &str, ids: &[i32]) {
        if ids.is_empty() {
            self.push("FALSE".to_string());
            return;
        }
        let placeholders: Vec<String> = ids
            .iter()
            .map(|id| self.bind(DatabaseValue::Int32(*id)))
            .collect();
        self.push(format!("{column} IN ({})", placeholders.join(", ")));
    }

    fn list_filter(&mut self, alias: &str, filter: &ListFilter) {
        match filter {
            ListFilter::All => {}
            ListFilter::Ids(ids) => {
                let ids: Vec<i32> = ids.iter().copied().collect();
                self.ids(&format!("{alias}.id"), &ids);
            }
            ListFilter::Fields(filters) => {
                for filter in filters {
                    self.field_filter(alias, filter);
                }
            }
        }
    }

    fn field_filter(&mut self, alias: &str, filter: &FieldFilter) {
        let column = format!("{alias}.{}", filter.field);
        let operand = filter.values.first().map_or("", String::as_str);

        let (value, template) = match filter.op {
            FilterOp::In => {
                self.any_of(&column, &filter.values);
                return;
            }
            FilterOp::Exact => (operand.to_string(), "{c} = {p}"),
            FilterOp::Iexact => (operand.to_string(), "LOWER({c}) = LOWER({p})"),
            FilterOp::Contains => (format!("%{}%", escape_like(operand)), "{c} LIKE {p}"),
            FilterOp::Icontains => (format!("%{}%", escape_like(operand)), "{c} ILIKE {p}"),
            FilterOp::Startswith => (format!("{}%", escape_like(operand)), "{c} LIKE {p}"),
            FilterOp::Istartswith => (format!("{}%", escape_like(operand)), "{c} ILIKE {p}"),
            FilterOp::Endswith => (format!("%{}", escape_like(operand)), "{c} LIKE {p}"),
            FilterOp::Iendswith => (format!("%{}", escape_like(operand)), "{c} ILIKE {p}"),
            FilterOp::Gt => (operand.to_string(), "{c} > {p}"),
            FilterOp::Gte => (operand.to_string(), "{c} >= {p}"),
            FilterOp::Lt => (operand.to_string(), "{c} < {p}"),
            FilterOp::Lte => (operand.to_string(), "{c} <= {p}"),
        };

        let p = self.bind(DatabaseValue::String(value));
        self.push(template.replace("{c}", &column).replace("{p}", &p));
    }

    /// `column IN (...)` over text values. An empty list matches nothing.
    fn any_of(&mut self, column: &str, values: &[String]) {
        if values.is_empty() {
            self.push("FALSE".to_string());
            return;
        }
        let placeholders: Vec<String> = values
            .iter()
            .map(|v| self.bind(DatabaseValue::String(v.clone())))
            .collect();
        self.push(format!("{column} IN ({})", placeholders.join(", ")));
    }

    fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Renders the row query, ordered by id and optionally paged.
    fn render(mut self, table: &Table, page: Option<Page>) -> (String, Vec<DatabaseValue>) {
        let mut sql = format!(
            "{}{} ORDER BY {}.id",
            table.select(),
            self.where_clause(),
            table.alias
        );

        if let Some(page) = page {
            let limit = self.bind(DatabaseValue::Int64(to_i64(page.limit)));
            let offset = self.bind(DatabaseValue::Int64(to_i64(page.offset)));
            sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }

        (sql, self.params)
    }

    /// Renders `SELECT COUNT(*)` over the same conditions.
    fn render_count(self, table: &Table) -> (String, Vec<DatabaseValue>) {
        let sql = format!(
            "SELECT COUNT(*) AS total_count FROM {}{}",
            table.from,
            self.where_clause()
        );
        (sql, self.params)
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Escapes `LIKE` wildcards so user input matches literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn conversion<E: std::fmt::Display>(column: &'static str) -> impl FnOnce(E) -> DbError {
    move |e| DbError::Conversion {
        message: format!("Failed to parse {column}: {e}"),
    }
}

/// Parses a `string_agg` id list such as `"3,5,8"`.
fn parse_id_list(s: &str) -> Result<Vec<i32>, DbError> {
    s.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.trim().parse().map_err(|e| DbError::Conversion {
                message: format!("Invalid id '{part}' in list: {e}"),
            })
        })
        .collect()
}

fn parse_geometry(json: Option<String>) -> Result<Option<Geometry>, DbError> {
    let Some(json) = json else {
        return Ok(None);
    };

    match json.parse::<GeoJson>() {
        Ok(GeoJson::Geometry(geometry)) => Ok(Some(geometry)),
        Ok(_) => Err(DbError::Conversion {
            message: "Expected a GeoJSON geometry".to_string(),
        }),
        Err(e) => Err(DbError::Conversion {
            message: format!("Invalid GeoJSON geometry: {e}"),
        }),
    }
}

fn park_from_row(row: &Row) -> Result<Park, DbError> {
    let neighborhood_ids: String = row
        .to_value("neighborhood_ids")
        .map_err(conversion("neighborhood_ids"))?;

    Ok(Park {
        id: row.to_value("id").map_err(conversion("id"))?,
        name: row.to_value("name").map_err(conversion("name"))?,
        slug: row.to_value("slug").map_err(conversion("slug"))?,
        alt_name: row.to_value("alt_name").unwrap_or(None),
        address: row.to_value("address").unwrap_or(None),
        description: row.to_value("description").unwrap_or(None),
        parktype_id: row
            .to_value("parktype_id")
            .map_err(conversion("parktype_id"))?,
        neighborhood_ids: parse_id_list(&neighborhood_ids)?,
        geometry: parse_geometry(row.to_value("geometry").unwrap_or(None))?,
    })
}

fn neighborhood_from_row(row: &Row) -> Result<Neighborhood, DbError> {
    Ok(Neighborhood {
        id: row.to_value("id").map_err(conversion("id"))?,
        name: row.to_value("name").map_err(conversion("name"))?,
        slug: row.to_value("slug").map_err(conversion("slug"))?,
        geometry: parse_geometry(row.to_value("geometry").unwrap_or(None))?,
    })
}

fn facility_from_row(row: &Row) -> Result<Facility, DbError> {
    let activity_ids: String = row
        .to_value("activity_ids")
        .map_err(conversion("activity_ids"))?;

    Ok(Facility {
        id: row.to_value("id").map_err(conversion("id"))?,
        name: row.to_value("name").map_err(conversion("name"))?,
        park_id: row.to_value("park_id").unwrap_or(None),
        status: row.to_value("status").unwrap_or(None),
        location: parse_geometry(row.to_value("location").unwrap_or(None))?,
        activity_ids: parse_id_list(&activity_ids)?,
    })
}

fn activity_from_row(row: &Row) -> Result<Activity, DbError> {
    Ok(Activity {
        id: row.to_value("id").map_err(conversion("id"))?,
        name: row.to_value("name").map_err(conversion("name"))?,
        slug: row.to_value("slug").map_err(conversion("slug"))?,
    })
}

fn parktype_from_row(row: &Row) -> Result<Parktype, DbError> {
    Ok(Parktype {
        id: row.to_value("id").map_err(conversion("id"))?,
        name: row.to_value("name").map_err(conversion("name"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_without_conditions() {
        let (sql, params) = Conditions::default().render(&PARKTYPES, None);
        assert_eq!(sql, "SELECT t.id, t.name FROM parktypes t ORDER BY t.id");
        assert!(params.is_empty());
    }

    #[test]
    fn projects_geometry_to_output_srid() {
        let select = PARKS.select();
        assert!(select.contains(&format!("ST_Transform(p.geometry, {OUTPUT_SRID})")));
        assert!(!select.contains("{srid}"));
    }

    #[test]
    fn numbers_placeholders_in_bind_order() {
        let mut conditions = Conditions::default();
        conditions.text("n.slug", "back-bay");
        conditions.ids("n.id", &[3, 5]);
        let (sql, params) = conditions.render(&NEIGHBORHOODS, None);

        assert!(sql.contains("WHERE n.slug = $1 AND n.id IN ($2, $3) ORDER BY n.id"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn pages_after_filter_params() {
        let mut conditions = Conditions::default();
        conditions.list_filter("p", &ListFilter::Ids([11, 12].into_iter().collect()));
        let (sql, params) = conditions.render(&PARKS, Some(Page { limit: 2, offset: 4 }));

        assert!(sql.ends_with("WHERE p.id IN ($1, $2) ORDER BY p.id LIMIT $3 OFFSET $4"));
        assert_eq!(params.len(), 4);
        assert!(matches!(params[2], DatabaseValue::Int64(2)));
        assert!(matches!(params[3], DatabaseValue::Int64(4)));
    }

    #[test]
    fn huge_offsets_clamp_to_i64() {
        let page = Page {
            limit: 20,
            offset: usize::MAX,
        };
        let (_, params) = Conditions::default().render(&ACTIVITIES, Some(page));
        assert!(matches!(params[1], DatabaseValue::Int64(i64::MAX)));
    }

    #[test]
    fn counts_with_the_same_conditions() {
        let mut conditions = Conditions::default();
        conditions.list_filter(
            "p",
            &ListFilter::Fields(vec![FieldFilter::new("name", FilterOp::Icontains, "fens")]),
        );
        let (sql, params) = conditions.render_count(&PARKS);

        assert_eq!(
            sql,
            "SELECT COUNT(*) AS total_count FROM parks p WHERE p.name ILIKE $1"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn empty_id_set_matches_nothing() {
        let mut conditions = Conditions::default();
        conditions.list_filter("p", &ListFilter::Ids(std::collections::BTreeSet::new()));
        let (sql, params) = conditions.render(&PARKS, None);

        assert!(sql.contains("WHERE FALSE"));
        assert!(params.is_empty());
    }

    #[test]
    fn renders_field_filters() {
        let mut conditions = Conditions::default();
        conditions.list_filter(
            "p",
            &ListFilter::Fields(vec![
                FieldFilter::new("name", FilterOp::Icontains, "50%_off"),
                FieldFilter::new("name", FilterOp::In, "Boston Common,Public Garden"),
                FieldFilter::new("name", FilterOp::Gte, "B"),
            ]),
        );
        let (sql, params) = conditions.render(&PARKS, None);

        assert!(sql.contains(
            "WHERE p.name ILIKE $1 AND p.name IN ($2, $3) AND p.name >= $4 ORDER BY p.id"
        ));
        assert_eq!(params.len(), 4);
        assert!(matches!(&params[0], DatabaseValue::String(s) if s == "%50\\%\\_off%"));
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut conditions = Conditions::default();
        conditions.field_filter("a", &FieldFilter::new("slug", FilterOp::In, " , "));
        let (sql, params) = conditions.render(&ACTIVITIES, None);

        assert!(sql.contains("WHERE FALSE"));
        assert!(params.is_empty());
    }

    #[test]
    fn parses_aggregated_id_lists() {
        assert_eq!(parse_id_list("").unwrap(), Vec::<i32>::new());
        assert_eq!(parse_id_list("3,5,8").unwrap(), vec![3, 5, 8]);
        assert!(parse_id_list("3,x").is_err());
    }

    #[test]
    fn parses_geojson_geometry() {
        let geometry = parse_geometry(Some(
            r#"{"type":"Point","coordinates":[-71.0656,42.3551]}"#.to_string(),
        ))
        .unwrap();
        assert!(geometry.is_some());

        assert!(parse_geometry(None).unwrap().is_none());
        assert!(parse_geometry(Some("not json".to_string())).is_err());
    }
}
