//! Room queries

use anyhow::Result;
use sqlx::PgPool;

use crate::types::{Contract, Rentable, Room, RoomEntity, StoredRoom, Tenant, TimePeriod};

#[derive(sqlx::FromRow)]
struct RoomRow {
    room_no: String,
    layout: String,
    contract_from: Option<String>,
    contract_to: Option<String>,
    tenant_id: Option<String>,
    tenant_name: Option<String>,
    rentable: bool,
    rentable_reason: String,
}

impl From<RoomRow> for StoredRoom {
    fn from(row: RoomRow) -> Self {
        // Contract columns are written together; the tenant id marks presence.
        let contract = row.tenant_id.map(|id| Contract {
            period: TimePeriod {
                from: row.contract_from.unwrap_or_default(),
                to: row.contract_to.unwrap_or_default(),
            },
            tenant: Tenant {
                id,
                name: row.tenant_name.unwrap_or_default(),
            },
        });
        StoredRoom {
            room_no: row.room_no,
            room: Room {
                layout: row.layout,
                contract,
                rentable: Rentable {
                    rentable: row.rentable,
                    reason: row.rentable_reason,
                },
            },
        }
    }
}

/// Upsert a batch of rooms in one statement, keyed by (property, room no).
pub async fn upsert_rooms(pool: &PgPool, batch: &[RoomEntity]) -> Result<()> {
    let mut property_keys = Vec::with_capacity(batch.len());
    let mut room_nos = Vec::with_capacity(batch.len());
    let mut layouts = Vec::with_capacity(batch.len());
    let mut contract_froms: Vec<Option<String>> = Vec::with_capacity(batch.len());
    let mut contract_tos: Vec<Option<String>> = Vec::with_capacity(batch.len());
    let mut tenant_ids: Vec<Option<String>> = Vec::with_capacity(batch.len());
    let mut tenant_names: Vec<Option<String>> = Vec::with_capacity(batch.len());
    let mut rentables = Vec::with_capacity(batch.len());
    let mut reasons = Vec::with_capacity(batch.len());

    for entity in batch {
        property_keys.push(entity.property_key.clone());
        room_nos.push(entity.room_no.clone());
        layouts.push(entity.room.layout.clone());
        match &entity.room.contract {
            Some(contract) => {
                contract_froms.push(Some(contract.period.from.clone()));
                contract_tos.push(Some(contract.period.to.clone()));
                tenant_ids.push(Some(contract.tenant.id.clone()));
                tenant_names.push(Some(contract.tenant.name.clone()));
            }
            None => {
                contract_froms.push(None);
                contract_tos.push(None);
                tenant_ids.push(None);
                tenant_names.push(None);
            }
        }
        rentables.push(entity.room.rentable.rentable);
        reasons.push(entity.room.rentable.reason.clone());
    }

    sqlx::query(
        r#"
        INSERT INTO rooms (
            property_key, room_no, layout, contract_from, contract_to,
            tenant_id, tenant_name, rentable, rentable_reason, updated_at
        )
        SELECT u.*, NOW()
        FROM UNNEST(
            $1::text[], $2::text[], $3::text[], $4::text[], $5::text[],
            $6::text[], $7::text[], $8::boolean[], $9::text[]
        ) AS u
        ON CONFLICT (property_key, room_no) DO UPDATE SET
            layout = EXCLUDED.layout,
            contract_from = EXCLUDED.contract_from,
            contract_to = EXCLUDED.contract_to,
            tenant_id = EXCLUDED.tenant_id,
            tenant_name = EXCLUDED.tenant_name,
            rentable = EXCLUDED.rentable,
            rentable_reason = EXCLUDED.rentable_reason,
            updated_at = NOW()
        "#,
    )
    .bind(&property_keys)
    .bind(&room_nos)
    .bind(&layouts)
    .bind(&contract_froms)
    .bind(&contract_tos)
    .bind(&tenant_ids)
    .bind(&tenant_names)
    .bind(&rentables)
    .bind(&reasons)
    .execute(pool)
    .await?;

    Ok(())
}

/// All rooms under a property, in room-number order
pub async fn rooms_for_property(pool: &PgPool, property_key: &str) -> Result<Vec<StoredRoom>> {
    let rows: Vec<RoomRow> = sqlx::query_as(
        r#"
        SELECT room_no, layout, contract_from, contract_to, tenant_id,
               tenant_name, rentable, rentable_reason
        FROM rooms
        WHERE property_key = $1
        ORDER BY room_no
        "#,
    )
    .bind(property_key)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StoredRoom::from).collect())
}
