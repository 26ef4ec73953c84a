//! Property queries
//!
//! Bulk writes go through `UNNEST` array binds so a 200-row batch is a
//! single round trip. Management merges lock the target row inside a
//! transaction so concurrent import runs serialize per property.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::types::{GeoCoord, Location, Management, Name, Property, StoredProperty};

/// Max rows returned by a search
pub const SEARCH_LIMIT: i64 = 20;

#[derive(sqlx::FromRow)]
struct PropertyRow {
    key: String,
    name_ja: String,
    name_ja_kata: String,
    postal_code: String,
    address: String,
    lat: f64,
    lng: f64,
    locality: String,
    kind: String,
    management_start_date: Option<DateTime<Utc>>,
    management_end_date: Option<DateTime<Utc>>,
    management_in_service: bool,
}

impl From<PropertyRow> for StoredProperty {
    fn from(row: PropertyRow) -> Self {
        StoredProperty {
            key: row.key,
            property: Property {
                name: Name {
                    ja: row.name_ja,
                    ja_kata: row.name_ja_kata,
                },
                location: Location {
                    address: row.address,
                    postal_code: row.postal_code,
                    geo_coord: GeoCoord {
                        lat: row.lat,
                        lng: row.lng,
                    },
                    locality: row.locality,
                },
                kind: row.kind,
                management: Management {
                    start_date: row.management_start_date,
                    end_date: row.management_end_date,
                    in_service: row.management_in_service,
                },
            },
        }
    }
}

const SELECT_COLUMNS: &str = "key, name_ja, name_ja_kata, postal_code, address, lat, lng, \
     locality, kind, management_start_date, management_end_date, management_in_service";

/// Upsert a batch of properties in one statement.
///
/// Every column is written, so a re-import replaces the stored record
/// wholesale (including clearing management fields the export does not
/// carry).
pub async fn upsert_properties(pool: &PgPool, batch: &[(String, Property)]) -> Result<()> {
    let mut keys = Vec::with_capacity(batch.len());
    let mut names_ja = Vec::with_capacity(batch.len());
    let mut names_ja_kata = Vec::with_capacity(batch.len());
    let mut postal_codes = Vec::with_capacity(batch.len());
    let mut addresses = Vec::with_capacity(batch.len());
    let mut lats = Vec::with_capacity(batch.len());
    let mut lngs = Vec::with_capacity(batch.len());
    let mut localities = Vec::with_capacity(batch.len());
    let mut kinds = Vec::with_capacity(batch.len());
    let mut starts: Vec<Option<DateTime<Utc>>> = Vec::with_capacity(batch.len());
    let mut ends: Vec<Option<DateTime<Utc>>> = Vec::with_capacity(batch.len());
    let mut in_services = Vec::with_capacity(batch.len());

    for (key, p) in batch {
        keys.push(key.clone());
        names_ja.push(p.name.ja.clone());
        names_ja_kata.push(p.name.ja_kata.clone());
        postal_codes.push(p.location.postal_code.clone());
        addresses.push(p.location.address.clone());
        lats.push(p.location.geo_coord.lat);
        lngs.push(p.location.geo_coord.lng);
        localities.push(p.location.locality.clone());
        kinds.push(p.kind.clone());
        starts.push(p.management.start_date);
        ends.push(p.management.end_date);
        in_services.push(p.management.in_service);
    }

    sqlx::query(
        r#"
        INSERT INTO properties (
            key, name_ja, name_ja_kata, postal_code, address, lat, lng,
            locality, kind, management_start_date, management_end_date,
            management_in_service, updated_at
        )
        SELECT u.*, NOW()
        FROM UNNEST(
            $1::text[], $2::text[], $3::text[], $4::text[], $5::text[],
            $6::float8[], $7::float8[], $8::text[], $9::text[],
            $10::timestamptz[], $11::timestamptz[], $12::boolean[]
        ) AS u
        ON CONFLICT (key) DO UPDATE SET
            name_ja = EXCLUDED.name_ja,
            name_ja_kata = EXCLUDED.name_ja_kata,
            postal_code = EXCLUDED.postal_code,
            address = EXCLUDED.address,
            lat = EXCLUDED.lat,
            lng = EXCLUDED.lng,
            locality = EXCLUDED.locality,
            kind = EXCLUDED.kind,
            management_start_date = EXCLUDED.management_start_date,
            management_end_date = EXCLUDED.management_end_date,
            management_in_service = EXCLUDED.management_in_service,
            updated_at = NOW()
        "#,
    )
    .bind(&keys)
    .bind(&names_ja)
    .bind(&names_ja_kata)
    .bind(&postal_codes)
    .bind(&addresses)
    .bind(&lats)
    .bind(&lngs)
    .bind(&localities)
    .bind(&kinds)
    .bind(&starts)
    .bind(&ends)
    .bind(&in_services)
    .execute(pool)
    .await?;

    Ok(())
}

/// Merge a management window into an existing property.
///
/// Locks the row, then writes the management columns. Fails when the
/// property does not exist.
pub async fn set_management(pool: &PgPool, key: &str, management: &Management) -> Result<()> {
    let mut tx = pool.begin().await?;

    let existing: Option<String> =
        sqlx::query_scalar("SELECT key FROM properties WHERE key = $1 FOR UPDATE")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
    if existing.is_none() {
        anyhow::bail!("property {} not found", key);
    }

    sqlx::query(
        r#"
        UPDATE properties SET
            management_start_date = $2,
            management_end_date = $3,
            management_in_service = $4,
            updated_at = NOW()
        WHERE key = $1
        "#,
    )
    .bind(key)
    .bind(management.start_date)
    .bind(management.end_date)
    .bind(management.in_service)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Fetch a single property by key
pub async fn get_property(pool: &PgPool, key: &str) -> Result<Option<StoredProperty>> {
    let row: Option<PropertyRow> = sqlx::query_as(&format!(
        "SELECT {} FROM properties WHERE key = $1",
        SELECT_COLUMNS
    ))
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StoredProperty::from))
}

/// Replace the mutable fields of an existing property.
///
/// Returns false when the key does not exist.
pub async fn update_property(pool: &PgPool, key: &str, property: &Property) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE properties SET
            name_ja = $2,
            name_ja_kata = $3,
            postal_code = $4,
            address = $5,
            lat = $6,
            lng = $7,
            locality = $8,
            kind = $9,
            management_start_date = $10,
            management_end_date = $11,
            management_in_service = $12,
            updated_at = NOW()
        WHERE key = $1
        "#,
    )
    .bind(key)
    .bind(&property.name.ja)
    .bind(&property.name.ja_kata)
    .bind(&property.location.postal_code)
    .bind(&property.location.address)
    .bind(property.location.geo_coord.lat)
    .bind(property.location.geo_coord.lng)
    .bind(&property.location.locality)
    .bind(&property.kind)
    .bind(property.management.start_date)
    .bind(property.management.end_date)
    .bind(property.management.in_service)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Search properties by optional kind / locality / in-service filters,
/// capped at [`SEARCH_LIMIT`] matches.
pub async fn search_properties(
    pool: &PgPool,
    kind: Option<&str>,
    locality: Option<&str>,
    in_service: Option<bool>,
) -> Result<Vec<StoredProperty>> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM properties WHERE TRUE", SELECT_COLUMNS));

    if let Some(kind) = kind {
        builder.push(" AND kind = ").push_bind(kind);
    }
    if let Some(locality) = locality {
        builder.push(" AND locality = ").push_bind(locality);
    }
    if let Some(in_service) = in_service {
        builder
            .push(" AND management_in_service = ")
            .push_bind(in_service);
    }
    builder.push(" ORDER BY key LIMIT ").push_bind(SEARCH_LIMIT);

    let rows: Vec<PropertyRow> = builder.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().map(StoredProperty::from).collect())
}

/// Fetch every property, in key order
pub async fn list_properties(pool: &PgPool) -> Result<Vec<StoredProperty>> {
    let rows: Vec<PropertyRow> = sqlx::query_as(&format!(
        "SELECT {} FROM properties ORDER BY key",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StoredProperty::from).collect())
}

/// Distinct non-empty kind values, sorted
pub async fn distinct_kinds(pool: &PgPool) -> Result<Vec<String>> {
    let kinds = sqlx::query_scalar(
        "SELECT DISTINCT kind FROM properties WHERE kind <> '' ORDER BY kind",
    )
    .fetch_all(pool)
    .await?;
    Ok(kinds)
}

/// Distinct non-empty locality values, sorted
pub async fn distinct_localities(pool: &PgPool) -> Result<Vec<String>> {
    let localities = sqlx::query_scalar(
        "SELECT DISTINCT locality FROM properties WHERE locality <> '' ORDER BY locality",
    )
    .fetch_all(pool)
    .await?;
    Ok(localities)
}
