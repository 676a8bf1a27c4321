//! Event discovery query composition.
//!
//! The listing endpoint and its total-count twin share one predicate
//! builder: both queries are produced by appending the same FROM/JOIN/WHERE
//! text and binds to a [`QueryBuilder`], so the filters can never drift
//! apart. Only the page fetch adds ORDER BY / LIMIT / OFFSET.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::event::EventRow;
use crate::utils::error::AppError;

pub const DEFAULT_PAGE_SIZE: u32 = 12;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Wire-level filter parameters of `GET /events`. Field names are part of
/// the public API and mirror what the frontend sends.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilters {
    pub naziv: Option<String>,
    pub lokacija: Option<String>,
    pub tip: Option<String>,
    pub zacetek: Option<String>,
    pub konec: Option<String>,
    pub cena: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "priljubljeniDogodki")]
    pub priljubljeni_dogodki: Option<bool>,
    #[serde(rename = "priljubljeniOrganizatorji")]
    pub priljubljeni_organizatorji: Option<bool>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius: Option<f64>,
    pub je_promoviran: Option<bool>,
    /// Restrict to one organizer's events. Set internally by handlers, never
    /// from the query string.
    #[serde(skip)]
    pub organizer: Option<Uuid>,
}

impl EventFilters {
    pub fn wants_favorite_events(&self) -> bool {
        self.priljubljeni_dogodki == Some(true)
    }

    pub fn wants_favorite_organizers(&self) -> bool {
        self.priljubljeni_organizatorji == Some(true)
    }

    pub fn wants_favorites(&self) -> bool {
        self.wants_favorite_events() || self.wants_favorite_organizers()
    }

    /// Radius filtering applies only when all three parameters are present.
    fn geo(&self) -> Option<(f64, f64, f64)> {
        match (self.lat, self.lon, self.radius) {
            (Some(lat), Some(lon), Some(radius)) => Some((lat, lon, radius)),
            _ => None,
        }
    }

    pub fn page_size(&self) -> i64 {
        match self.limit {
            Some(0) | None => DEFAULT_PAGE_SIZE as i64,
            Some(n) => n as i64,
        }
    }

    pub fn offset(&self) -> i64 {
        let page = match self.page {
            Some(0) | None => 1,
            Some(n) => n,
        };
        (page as i64 - 1) * self.page_size()
    }
}

/// Fixed price buckets of the `cena` parameter. Anything unrecognized is
/// silently ignored (no price predicate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBucket {
    Free,
    UpTo10,
    From10To25,
    From25To50,
    Over50,
}

impl PriceBucket {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Brezplačno" => Some(PriceBucket::Free),
            "10" => Some(PriceBucket::UpTo10),
            "10-25" => Some(PriceBucket::From10To25),
            "25-50" => Some(PriceBucket::From25To50),
            "50" => Some(PriceBucket::Over50),
            _ => None,
        }
    }

    /// Predicate against the joined current price. Buckets use fixed
    /// constants, so no binds are needed.
    fn predicate(self) -> &'static str {
        match self {
            PriceBucket::Free => "pw.price = 0",
            PriceBucket::UpTo10 => "pw.price <= 10",
            PriceBucket::From10To25 => "pw.price BETWEEN 10 AND 25",
            PriceBucket::From25To50 => "pw.price BETWEEN 25 AND 50",
            PriceBucket::Over50 => "pw.price > 50",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSort {
    #[default]
    DateAsc,
    DateDesc,
    TitleAsc,
    TitleDesc,
    PriceAsc,
    PriceDesc,
}

impl EventSort {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("date-desc") => EventSort::DateDesc,
            Some("az") => EventSort::TitleAsc,
            Some("za") => EventSort::TitleDesc,
            Some("price-asc") => EventSort::PriceAsc,
            Some("price-desc") => EventSort::PriceDesc,
            _ => EventSort::DateAsc,
        }
    }

    /// ORDER BY clause. Events without a current price sort as 999999 when
    /// ascending (last) and as -1 when descending (first). The event id is
    /// always appended so page boundaries are deterministic.
    fn order_clause(self) -> &'static str {
        match self {
            EventSort::DateAsc => "e.start_time ASC, e.id ASC",
            EventSort::DateDesc => "e.start_time DESC, e.id ASC",
            EventSort::TitleAsc => "e.title ASC, e.id ASC",
            EventSort::TitleDesc => "e.title DESC, e.id ASC",
            EventSort::PriceAsc => "COALESCE(pw.price, 999999) ASC, e.id ASC",
            EventSort::PriceDesc => "COALESCE(pw.price, -1) DESC, e.id ASC",
        }
    }
}

const LISTING_COLUMNS: &str = "e.id, e.title, e.description, e.start_time, e.promoted, e.image, e.ticket_url, \
     a.street, a.house_number, a.postal_code, a.municipality, a.lat, a.lon, \
     t.id AS event_type_id, t.name AS event_type_name, \
     u.id AS organizer_id, u.first_name AS organizer_first_name, u.last_name AS organizer_last_name, \
     pw.price AS current_price";

/// Append the FROM clause, joins and every filter predicate.
///
/// Used by both the page fetch and the count query; anything added here is
/// automatically reflected in both.
fn push_source_and_filters(
    qb: &mut QueryBuilder<'static, Postgres>,
    filters: &EventFilters,
    viewer: Option<Uuid>,
    now: DateTime<Utc>,
) {
    qb.push(
        " FROM events e \
         JOIN addresses a ON a.id = e.address_id \
         JOIN event_types t ON t.id = e.event_type_id \
         JOIN users u ON u.id = e.organizer_id \
         LEFT JOIN pricing_windows pw ON pw.event_id = e.id AND pw.valid_to IS NULL AND pw.valid_from <= ",
    );
    qb.push_bind(now);

    // The favorites tables are unique per (user, event/organizer) pair, so
    // these inner joins never duplicate event rows.
    if filters.wants_favorite_events() {
        if let Some(viewer) = viewer {
            qb.push(" JOIN favorite_events fe ON fe.event_id = e.id AND fe.user_id = ");
            qb.push_bind(viewer);
        }
    }
    if filters.wants_favorite_organizers() {
        if let Some(viewer) = viewer {
            qb.push(" JOIN favorite_organizers fo ON fo.organizer_id = e.organizer_id AND fo.user_id = ");
            qb.push_bind(viewer);
        }
    }

    qb.push(" WHERE TRUE");

    if let Some(organizer) = filters.organizer {
        qb.push(" AND e.organizer_id = ");
        qb.push_bind(organizer);
    }

    if let Some(promoted) = filters.je_promoviran {
        qb.push(" AND e.promoted = ");
        qb.push_bind(promoted);
    }

    if let Some(naziv) = filters.naziv.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND e.title ILIKE ");
        qb.push_bind(format!("%{naziv}%"));
    }

    if let Some(lokacija) = filters.lokacija.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{lokacija}%");
        qb.push(" AND (a.municipality ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR a.street ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR a.house_number ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR a.postal_code ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }

    if let Some(tip) = filters.tip.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND t.name = ");
        qb.push_bind(tip.to_string());
    }

    // Date bounds are passed through uncast; a malformed value surfaces as a
    // query failure rather than input validation (the caller owns that).
    if let Some(zacetek) = filters.zacetek.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND e.start_time >= (");
        qb.push_bind(zacetek.to_string());
        qb.push(")::timestamptz");
    }
    if let Some(konec) = filters.konec.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND e.start_time <= (");
        qb.push_bind(konec.to_string());
        qb.push(")::timestamptz");
    }

    if let Some(bucket) = filters.cena.as_deref().and_then(PriceBucket::parse) {
        qb.push(" AND ");
        qb.push(bucket.predicate());
    }

    if let Some((lat, lon, radius)) = filters.geo() {
        // Great-circle distance, evaluated per row in the database. Events
        // whose address lacks coordinates yield NULL and are excluded. The
        // acos argument is clamped against floating-point overshoot.
        qb.push(format!(" AND ({EARTH_RADIUS_KM} * acos(LEAST(1.0, GREATEST(-1.0, cos(radians("));
        qb.push_bind(lat);
        qb.push(")) * cos(radians(a.lat)) * cos(radians(a.lon) - radians(");
        qb.push_bind(lon);
        qb.push(")) + sin(radians(");
        qb.push_bind(lat);
        qb.push(")) * sin(radians(a.lat)))))) <= ");
        qb.push_bind(radius);
    }
}

pub fn build_listing_query(
    filters: &EventFilters,
    viewer: Option<Uuid>,
    now: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {LISTING_COLUMNS}"));
    push_source_and_filters(&mut qb, filters, viewer, now);

    qb.push(" ORDER BY ");
    qb.push(EventSort::parse(filters.sort.as_deref()).order_clause());

    qb.push(" LIMIT ");
    qb.push_bind(filters.page_size());
    qb.push(" OFFSET ");
    qb.push_bind(filters.offset());

    qb
}

/// Fetch one event in the listing row shape (address, type, organizer and
/// current price joined in).
pub async fn fetch_by_id(
    pool: &PgPool,
    event_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<EventRow>, AppError> {
    let mut qb = QueryBuilder::new(format!("SELECT {LISTING_COLUMNS}"));
    push_source_and_filters(&mut qb, &EventFilters::default(), None, now);
    qb.push(" AND e.id = ");
    qb.push_bind(event_id);

    let row = qb
        .build_query_as::<EventRow>()
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Same predicates as the listing query, no ordering or pagination.
pub fn build_count_query(
    filters: &EventFilters,
    viewer: Option<Uuid>,
    now: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*)");
    push_source_and_filters(&mut qb, filters, viewer, now);
    qb
}

/// Favorite filters need a session; checked before anything touches the
/// database.
pub fn ensure_favorites_authorized(
    filters: &EventFilters,
    viewer: Option<Uuid>,
) -> Result<(), AppError> {
    if filters.wants_favorites() && viewer.is_none() {
        return Err(AppError::Auth(
            "Za dostop do priljubljenih vsebin se morate prijaviti".to_string(),
        ));
    }
    Ok(())
}

pub struct EventPage {
    pub items: Vec<EventRow>,
    /// Present only when the caller asked for a page.
    pub total: Option<i64>,
}

pub async fn search(
    pool: &PgPool,
    filters: &EventFilters,
    viewer: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<EventPage, AppError> {
    ensure_favorites_authorized(filters, viewer)?;

    let items = build_listing_query(filters, viewer, now)
        .build_query_as::<EventRow>()
        .fetch_all(pool)
        .await?;

    let total = if filters.page.is_some() {
        let total: i64 = build_count_query(filters, viewer, now)
            .build_query_scalar()
            .fetch_one(pool)
            .await?;
        Some(total)
    } else {
        None
    };

    Ok(EventPage { items, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_filters() -> EventFilters {
        EventFilters {
            naziv: Some("koncert".into()),
            lokacija: Some("Maribor".into()),
            tip: Some("Koncert".into()),
            zacetek: Some("2025-06-01".into()),
            konec: Some("2025-06-30".into()),
            cena: Some("10-25".into()),
            sort: Some("price-asc".into()),
            page: Some(2),
            limit: Some(10),
            priljubljeni_dogodki: Some(true),
            priljubljeni_organizatorji: Some(true),
            lat: Some(46.5547),
            lon: Some(15.6459),
            radius: Some(5.0),
            je_promoviran: Some(true),
            organizer: Some(Uuid::new_v4()),
        }
    }

    /// Everything between FROM and ORDER BY must be byte-identical in the
    /// listing and count queries: the parity invariant.
    #[test]
    fn count_query_replicates_every_predicate() {
        let now = Utc::now();
        let viewer = Some(Uuid::new_v4());
        let filters = full_filters();

        let listing_sql = build_listing_query(&filters, viewer, now).sql().to_string();
        let count_sql = build_count_query(&filters, viewer, now).sql().to_string();

        let from_idx = listing_sql.find(" FROM ").unwrap();
        let order_idx = listing_sql.find(" ORDER BY ").unwrap();
        let listing_predicates = &listing_sql[from_idx..order_idx];

        let count_predicates = count_sql.strip_prefix("SELECT COUNT(*)").unwrap();
        assert_eq!(listing_predicates, count_predicates);
    }

    #[test]
    fn count_query_has_no_pagination() {
        let sql = build_count_query(&full_filters(), Some(Uuid::new_v4()), Utc::now())
            .sql()
            .to_string();
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("OFFSET"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn active_price_join_is_left_and_open_ended() {
        let sql = build_listing_query(&EventFilters::default(), None, Utc::now())
            .sql()
            .to_string();
        assert!(sql.contains("LEFT JOIN pricing_windows pw ON pw.event_id = e.id"));
        assert!(sql.contains("pw.valid_to IS NULL"));
        assert!(sql.contains("pw.valid_from <= "));
    }

    #[test]
    fn default_sort_is_date_ascending_with_id_tiebreak() {
        let sql = build_listing_query(&EventFilters::default(), None, Utc::now())
            .sql()
            .to_string();
        assert!(sql.contains("ORDER BY e.start_time ASC, e.id ASC"));
    }

    #[test]
    fn price_sort_sentinels_are_asymmetric() {
        assert_eq!(
            EventSort::PriceAsc.order_clause(),
            "COALESCE(pw.price, 999999) ASC, e.id ASC"
        );
        assert_eq!(
            EventSort::PriceDesc.order_clause(),
            "COALESCE(pw.price, -1) DESC, e.id ASC"
        );
    }

    #[test]
    fn sort_parsing_defaults_to_date_ascending() {
        assert_eq!(EventSort::parse(None), EventSort::DateAsc);
        assert_eq!(EventSort::parse(Some("nonsense")), EventSort::DateAsc);
        assert_eq!(EventSort::parse(Some("za")), EventSort::TitleDesc);
        assert_eq!(EventSort::parse(Some("price-desc")), EventSort::PriceDesc);
    }

    #[test]
    fn price_buckets_map_to_fixed_predicates() {
        assert_eq!(
            PriceBucket::parse("Brezplačno").map(PriceBucket::predicate),
            Some("pw.price = 0")
        );
        assert_eq!(
            PriceBucket::parse("50").map(PriceBucket::predicate),
            Some("pw.price > 50")
        );
        // An event priced exactly 50 falls in the 25-50 bucket, not "50".
        assert_eq!(
            PriceBucket::parse("25-50").map(PriceBucket::predicate),
            Some("pw.price BETWEEN 25 AND 50")
        );
        assert_eq!(PriceBucket::parse("poceni"), None);
    }

    #[test]
    fn unknown_price_bucket_adds_no_predicate() {
        let filters = EventFilters {
            cena: Some("poceni".into()),
            ..Default::default()
        };
        let sql = build_listing_query(&filters, None, Utc::now()).sql().to_string();
        assert!(!sql.contains("pw.price ="));
        assert!(!sql.contains("BETWEEN"));
    }

    #[test]
    fn geo_predicate_requires_all_three_parameters() {
        let partial = EventFilters {
            lat: Some(46.0),
            lon: Some(15.0),
            ..Default::default()
        };
        let sql = build_listing_query(&partial, None, Utc::now()).sql().to_string();
        assert!(!sql.contains("acos"));

        let complete = EventFilters {
            radius: Some(1.0),
            ..partial
        };
        let sql = build_listing_query(&complete, None, Utc::now()).sql().to_string();
        assert!(sql.contains("6371 * acos(LEAST(1.0, GREATEST(-1.0,"));
        assert!(sql.contains("sin(radians(a.lat))"));
    }

    #[test]
    fn location_filter_ors_all_address_components() {
        let filters = EventFilters {
            lokacija: Some("Celje".into()),
            ..Default::default()
        };
        let sql = build_listing_query(&filters, None, Utc::now()).sql().to_string();
        for column in [
            "a.municipality ILIKE",
            "a.street ILIKE",
            "a.house_number ILIKE",
            "a.postal_code ILIKE",
        ] {
            assert!(sql.contains(column), "missing {column}");
        }
    }

    #[test]
    fn favorite_joins_only_appear_for_an_authenticated_viewer() {
        let filters = EventFilters {
            priljubljeni_dogodki: Some(true),
            priljubljeni_organizatorji: Some(true),
            ..Default::default()
        };

        let sql = build_listing_query(&filters, Some(Uuid::new_v4()), Utc::now())
            .sql()
            .to_string();
        assert!(sql.contains("JOIN favorite_events fe"));
        assert!(sql.contains("JOIN favorite_organizers fo"));
    }

    #[test]
    fn favorites_without_session_is_an_auth_error() {
        let filters = EventFilters {
            priljubljeni_dogodki: Some(true),
            ..Default::default()
        };
        let err = ensure_favorites_authorized(&filters, None).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);

        assert!(ensure_favorites_authorized(&filters, Some(Uuid::new_v4())).is_ok());
        assert!(ensure_favorites_authorized(&EventFilters::default(), None).is_ok());
    }

    #[test]
    fn pagination_defaults_and_offsets() {
        let defaults = EventFilters::default();
        assert_eq!(defaults.page_size(), 12);
        assert_eq!(defaults.offset(), 0);

        let paged = EventFilters {
            page: Some(3),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(paged.offset(), 20);

        // A zero limit falls back to the default page size.
        let zero_limit = EventFilters {
            limit: Some(0),
            page: Some(2),
            ..Default::default()
        };
        assert_eq!(zero_limit.page_size(), 12);
        assert_eq!(zero_limit.offset(), 12);
    }

    #[test]
    fn wire_names_deserialize() {
        let filters: EventFilters = serde_urlencoded_shim(
            "naziv=jazz&priljubljeniDogodki=true&je_promoviran=false&lat=46.1&lon=15.2&radius=2",
        );
        assert_eq!(filters.naziv.as_deref(), Some("jazz"));
        assert_eq!(filters.priljubljeni_dogodki, Some(true));
        assert_eq!(filters.je_promoviran, Some(false));
        assert_eq!(filters.geo(), Some((46.1, 15.2, 2.0)));
    }

    fn serde_urlencoded_shim(query: &str) -> EventFilters {
        // axum's Query extractor uses the same serde path.
        serde_json::from_value(
            query
                .split('&')
                .map(|pair| {
                    let (k, v) = pair.split_once('=').unwrap();
                    let value = match v {
                        "true" => serde_json::Value::Bool(true),
                        "false" => serde_json::Value::Bool(false),
                        _ => v
                            .parse::<f64>()
                            .map(|n| serde_json::json!(n))
                            .unwrap_or_else(|_| serde_json::Value::String(v.into())),
                    };
                    (k.to_string(), value)
                })
                .collect::<serde_json::Map<_, _>>()
                .into(),
        )
        .unwrap()
    }
}
