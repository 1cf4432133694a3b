/// Test fixtures: representative payloads from the Cologne ArcGIS feed.
///
/// Real responses (`f=pjson`, `outSR=4326`) carry many more envelope keys
/// (`displayFieldName`, `fieldAliases`, `spatialReference`, `fields`);
/// these keep enough of them to show the parser ignores what it does not need.
///
/// Feature shape:
///   features[]
///     .attributes.objectid - integer natural key
///     .attributes.adresse  - street address, sometimes absent
///     .geometry.x          - longitude (WGS84)
///     .geometry.y          - latitude (WGS84)

/// Three valid stations around Cologne cathedral.
pub(crate) fn fixture_cologne_stations_json() -> &'static str {
    r#"{
      "displayFieldName": "adresse",
      "fieldAliases": { "objectid": "OBJECTID", "adresse": "Adresse" },
      "geometryType": "esriGeometryPoint",
      "spatialReference": { "wkid": 4326, "latestWkid": 4326 },
      "features": [
        {
          "attributes": { "objectid": 101, "adresse": "Komödienstraße 2" },
          "geometry": { "x": 6.9583, "y": 50.9413 }
        },
        {
          "attributes": { "objectid": 102, "adresse": "Rheinuferstraße 14" },
          "geometry": { "x": 6.9700, "y": 50.9300 }
        },
        {
          "attributes": { "objectid": 103, "adresse": "Aachener Straße 311" },
          "geometry": { "x": 6.9100, "y": 50.9380 }
        }
      ]
    }"#
}

/// One record missing its objectid, one with latitude 200, one valid.
pub(crate) fn fixture_mixed_validity_json() -> &'static str {
    r#"{
      "features": [
        {
          "attributes": { "adresse": "Ohne Kennung 1" },
          "geometry": { "x": 6.95, "y": 50.94 }
        },
        {
          "attributes": { "objectid": 202, "adresse": "Breitengrad 200" },
          "geometry": { "x": 6.95, "y": 200.0 }
        },
        {
          "attributes": { "objectid": 203, "adresse": "Neusser Straße 50" },
          "geometry": { "x": 6.9572, "y": 50.9531 }
        }
      ]
    }"#
}

/// ArcGIS query failure, delivered with HTTP 200.
pub(crate) fn fixture_arcgis_error_json() -> &'static str {
    r#"{
      "error": {
        "code": 400,
        "message": "Invalid or missing input parameters.",
        "details": []
      }
    }"#
}
