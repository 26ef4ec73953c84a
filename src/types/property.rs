//! Property types
//!
//! A `Property` is the root of the property/room hierarchy. It is stored
//! under a deterministic named key derived from the vendor's property
//! number, so re-importing the same export overwrites instead of
//! duplicating.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Room;

/// Store key for a property: `ck-` + the vendor 物件No column.
pub fn property_key(source_no: &str) -> String {
    format!("ck-{}", source_no)
}

/// Property display name (native script plus phonetic variant)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Name {
    pub ja: String,
    pub ja_kata: String,
}

/// Latitude/longitude pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lat: f64,
    pub lng: f64,
}

/// Where the property is. `postal_code` and `address` come straight from
/// the vendor export; `geo_coord` and `locality` are derived later (by
/// geocoding) and written back through the update API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub address: String,
    pub postal_code: String,
    pub geo_coord: GeoCoord,
    pub locality: String,
}

/// Operative management window plus the derived in-service flag.
///
/// `in_service` holds `start_date <= now && !(end_date <= now)` evaluated
/// against a single wall-clock snapshot taken at import time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Management {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub in_service: bool,
}

impl Management {
    /// Evaluate the in-service invariant against the given snapshot.
    pub fn compute_in_service(&mut self, now: DateTime<Utc>) {
        let started = self.start_date.is_some_and(|s| s <= now);
        let ended = self.end_date.is_some_and(|e| e <= now);
        self.in_service = started && !ended;
    }
}

/// A single rental property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: Name,
    pub location: Location,
    pub kind: String,
    pub management: Management,
}

/// Category classification of the free-text kind string.
///
/// Computed on read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindCategory {
    Residence,
    Parking,
    Business,
    Other,
}

impl KindCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            KindCategory::Residence => "residence",
            KindCategory::Parking => "parking",
            KindCategory::Business => "business",
            KindCategory::Other => "other",
        }
    }
}

impl Property {
    /// Classify the vendor kind string against the fixed lookup table.
    pub fn category(&self) -> KindCategory {
        match self.kind.as_str() {
            "一戸建て" | "アパート" | "マンション" | "共同住宅" | "テラスハウス" => {
                KindCategory::Residence
            }
            "駐車場" | "駐輪場" => KindCategory::Parking,
            "店舗" | "住宅付店舗" | "事務所" | "倉庫" | "ビル" | "貸地" => {
                KindCategory::Business
            }
            _ => KindCategory::Other,
        }
    }
}

/// Property plus its key, as returned by the query API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProperty {
    pub key: String,
    #[serde(flatten)]
    pub property: Property,
}

/// API response for a single property with its child rooms
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyWithRooms {
    #[serde(flatten)]
    pub property: StoredProperty,
    pub rooms: Vec<StoredRoom>,
}

/// Room plus its scoped key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRoom {
    pub room_no: String,
    #[serde(flatten)]
    pub room: Room,
}
