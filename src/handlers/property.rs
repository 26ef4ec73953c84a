//! Property query handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::queries;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::types::{KindCategory, Property, PropertyWithRooms, StoredProperty};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub kind: Option<String>,
    pub locality: Option<String>,
    pub in_service: Option<bool>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<StoredProperty>>, ApiError> {
    let matches = queries::property::search_properties(
        &state.pool,
        params.kind.as_deref(),
        params.locality.as_deref(),
        params.in_service,
    )
    .await?;
    Ok(Json(matches))
}

pub async fn distinct(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let kinds = queries::property::distinct_kinds(&state.pool).await?;
    let localities = queries::property::distinct_localities(&state.pool).await?;
    Ok(Json(json!({
        "kind": kinds,
        "locality": localities,
    })))
}

/// GET `/api/property/:id`.
///
/// A `.geojson` suffix selects the map view instead of a single record:
/// `all`, `residence`, `parking` or `business` ahead of the suffix picks
/// the computed category to include.
pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if let Some(selector) = id.strip_suffix(".geojson") {
        let category = parse_category_selector(selector)?;
        let properties = queries::property::list_properties(&state.pool).await?;
        return Ok(Json(feature_collection(&properties, category)));
    }

    let response = fetch_with_rooms(&state, &id).await?;
    Ok(Json(serde_json::to_value(response).map_err(anyhow::Error::from)?))
}

/// PUT `/api/property/:id` — replace the record's mutable fields from the
/// JSON body, then return the updated record with its rooms.
pub async fn put_property(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(property): Json<Property>,
) -> Result<Json<PropertyWithRooms>, ApiError> {
    let found = queries::property::update_property(&state.pool, &id, &property).await?;
    if !found {
        return Err(ApiError::NotFound);
    }
    Ok(Json(fetch_with_rooms(&state, &id).await?))
}

async fn fetch_with_rooms(state: &AppState, id: &str) -> Result<PropertyWithRooms, ApiError> {
    let stored = queries::property::get_property(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let rooms = queries::room::rooms_for_property(&state.pool, id).await?;
    Ok(PropertyWithRooms {
        property: stored,
        rooms,
    })
}

fn parse_category_selector(selector: &str) -> Result<Option<KindCategory>, ApiError> {
    match selector {
        "all" => Ok(None),
        "residence" => Ok(Some(KindCategory::Residence)),
        "parking" => Ok(Some(KindCategory::Parking)),
        "business" => Ok(Some(KindCategory::Business)),
        other => Err(ApiError::BadRequest(format!(
            "unknown category {:?}",
            other
        ))),
    }
}

/// Build a GeoJSON FeatureCollection, one Point per property, optionally
/// filtered by computed category. Coordinates are [lng, lat] per the
/// GeoJSON spec.
fn feature_collection(properties: &[StoredProperty], category: Option<KindCategory>) -> Value {
    let features: Vec<Value> = properties
        .iter()
        .filter(|p| category.map_or(true, |c| p.property.category() == c))
        .map(|p| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [p.property.location.geo_coord.lng, p.property.location.geo_coord.lat],
                },
                "properties": {
                    "key": p.key,
                    "name": p.property.name.ja,
                    "kind": p.property.kind,
                },
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoCoord;

    fn stored(key: &str, kind: &str, lat: f64, lng: f64) -> StoredProperty {
        let mut property = Property::default();
        property.kind = kind.to_string();
        property.location.geo_coord = GeoCoord { lat, lng };
        StoredProperty {
            key: key.to_string(),
            property,
        }
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!(parse_category_selector("all").unwrap(), None);
        assert_eq!(
            parse_category_selector("parking").unwrap(),
            Some(KindCategory::Parking)
        );
        assert!(parse_category_selector("garden").is_err());
    }

    #[test]
    fn test_feature_collection_filters_by_category() {
        let properties = vec![
            stored("ck-1", "マンション", 35.0, 139.0),
            stored("ck-2", "駐車場", 36.0, 140.0),
        ];

        let all = feature_collection(&properties, None);
        assert_eq!(all["features"].as_array().unwrap().len(), 2);

        let parking = feature_collection(&properties, Some(KindCategory::Parking));
        let features = parking["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["properties"]["key"], "ck-2");
    }

    #[test]
    fn test_feature_coordinates_are_lng_lat() {
        let properties = vec![stored("ck-1", "マンション", 35.68, 139.76)];
        let collection = feature_collection(&properties, None);
        let coords = collection["features"][0]["geometry"]["coordinates"]
            .as_array()
            .unwrap();
        assert_eq!(coords[0], 139.76);
        assert_eq!(coords[1], 35.68);
    }
}
