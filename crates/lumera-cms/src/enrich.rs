//! Overlay of booking-backend geocoordinates onto content records.
//!
//! Enrichment is a pure function over owned values: callers pass in records
//! cloned out of the cache and get new records back, so cached state is
//! never touched. A record that cannot be enriched passes through
//! unchanged; enrichment must never shrink a result set.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use lumera_core::geo::GeoPoint;

/// Overlays latitude/longitude onto each record whose `data.externalId`
/// appears in `geo`, creating the nested `address` object when absent.
/// Present-but-`None` coordinates leave existing fields untouched.
pub fn overlay_coordinates(items: Vec<Value>, geo: &HashMap<String, GeoPoint>) -> Vec<Value> {
    if geo.is_empty() {
        return items;
    }
    items
        .into_iter()
        .map(|item| overlay_one(item, geo))
        .collect()
}

fn overlay_one(mut item: Value, geo: &HashMap<String, GeoPoint>) -> Value {
    let Some(external_id) = item
        .get("data")
        .and_then(|data| data.get("externalId"))
        .and_then(Value::as_str)
        .map(str::to_owned)
    else {
        return item;
    };
    let Some(point) = geo.get(&external_id) else {
        return item;
    };
    let Some(data) = item.get_mut("data").and_then(Value::as_object_mut) else {
        return item;
    };

    let address = data
        .entry("address")
        .or_insert_with(|| Value::Object(Map::new()));
    if !address.is_object() {
        *address = Value::Object(Map::new());
    }
    let Some(address) = address.as_object_mut() else {
        return item;
    };

    if let Some(latitude) = point.latitude {
        address.insert("latitude".to_string(), json!(latitude));
    }
    if let Some(longitude) = point.longitude {
        address.insert("longitude".to_string(), json!(longitude));
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo(id: &str, lat: Option<f64>, lon: Option<f64>) -> HashMap<String, GeoPoint> {
        HashMap::from([(id.to_string(), GeoPoint::new(lat, lon))])
    }

    #[test]
    fn creates_address_structure_when_absent() {
        let items = vec![json!({"data": {"externalId": "8944", "name": "Centro"}})];
        let enriched = overlay_coordinates(items, &geo("8944", Some(-23.55), Some(-46.63)));
        assert_eq!(
            enriched[0],
            json!({"data": {
                "externalId": "8944",
                "name": "Centro",
                "address": {"latitude": -23.55, "longitude": -46.63}
            }})
        );
    }

    #[test]
    fn preserves_existing_address_fields() {
        let items = vec![json!({"data": {
            "externalId": "8944",
            "address": {"street": "Av. Paulista", "latitude": 0.0}
        }})];
        let enriched = overlay_coordinates(items, &geo("8944", Some(-23.55), Some(-46.63)));
        let address = &enriched[0]["data"]["address"];
        assert_eq!(address["street"], "Av. Paulista");
        assert_eq!(address["latitude"], -23.55);
        assert_eq!(address["longitude"], -46.63);
    }

    #[test]
    fn none_coordinates_do_not_overwrite() {
        let items = vec![json!({"data": {
            "externalId": "8944",
            "address": {"latitude": 1.0, "longitude": 2.0}
        }})];
        let enriched = overlay_coordinates(items, &geo("8944", None, Some(-46.63)));
        let address = &enriched[0]["data"]["address"];
        assert_eq!(address["latitude"], 1.0);
        assert_eq!(address["longitude"], -46.63);
    }

    #[test]
    fn records_without_matching_id_pass_through() {
        let items = vec![
            json!({"data": {"externalId": "unknown"}}),
            json!({"data": {"name": "no external id"}}),
            json!({"note": "no data at all"}),
            json!("not even an object"),
        ];
        let enriched = overlay_coordinates(items.clone(), &geo("8944", Some(1.0), Some(2.0)));
        assert_eq!(enriched, items);
    }

    #[test]
    fn never_shrinks_the_result_set() {
        let items = vec![json!(null), json!(42), json!({"data": {"externalId": "8944"}})];
        let enriched = overlay_coordinates(items, &geo("8944", Some(1.0), None));
        assert_eq!(enriched.len(), 3);
    }

    #[test]
    fn enrichment_is_idempotent() {
        let items = vec![json!({"data": {"externalId": "8944"}})];
        let map = geo("8944", Some(-23.55), Some(-46.63));
        let once = overlay_coordinates(items, &map);
        let twice = overlay_coordinates(once.clone(), &map);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_map_is_a_no_op() {
        let items = vec![json!({"data": {"externalId": "8944"}})];
        let enriched = overlay_coordinates(items.clone(), &HashMap::new());
        assert_eq!(enriched, items);
    }

    #[test]
    fn non_object_address_is_replaced() {
        let items = vec![json!({"data": {"externalId": "8944", "address": "unstructured"}})];
        let enriched = overlay_coordinates(items, &geo("8944", Some(1.5), Some(2.5)));
        assert_eq!(
            enriched[0]["data"]["address"],
            json!({"latitude": 1.5, "longitude": 2.5})
        );
    }
}
