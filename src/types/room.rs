//! Room types
//!
//! A `Room` is a unit or parking slot belonging to a property. Its key is
//! the vendor 部屋No, unique only within the parent property's scope.

use serde::{Deserialize, Serialize};

/// Store id for a tenant: `ck-tenant-` + the vendor 契約者No column.
pub fn tenant_id(source_no: &str) -> String {
    format!("ck-tenant-{}", source_no)
}

/// Contract period. The vendor export carries opaque date strings; they are
/// stored verbatim, never parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub from: String,
    pub to: String,
}

/// The tenant on a contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
}

/// An active tenancy on a room
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub period: TimePeriod,
    pub tenant: Tenant,
}

/// Whether a room is available for rent, and if not through us, why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rentable {
    pub rentable: bool,
    pub reason: String,
}

/// A unit or parking slot of a property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub layout: String,
    pub contract: Option<Contract>,
    pub rentable: Rentable,
}

/// A room addressed by its ancestor chain: parent property key + room no.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEntity {
    pub property_key: String,
    pub room_no: String,
    pub room: Room,
}
