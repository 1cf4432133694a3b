/// gas_station_service: Cologne gas station import and proximity search.
///
/// # Module structure
///
/// ```text
/// gas_station_service
/// ├── model       - shared data types (GasStation, Coordinates, SearchRadius, …)
/// ├── config      - service configuration loader (service.toml)
/// ├── logging     - tracing subscriber setup
/// ├── db          - connection pool + schema readiness probe
/// ├── ingest
/// │   ├── feed      - ArcGIS feature feed: HTTP fetch + envelope decoding
/// │   ├── transform - raw feature → GasStation, per-record rejections
/// │   └── fixtures (test only) - representative feed payloads
/// ├── repository  - StationRepository contract
/// │   ├── postgis - PostgreSQL + PostGIS store
/// │   └── memory  - in-process store
/// ├── importer    - one import cycle: validate, fetch, transform, persist
/// ├── scheduler   - periodic import trigger
/// ├── query       - proximity query service (input validation, meters → km)
/// └── endpoint    - HTTP API
/// ```

/// Public modules
pub mod config;
pub mod db;
pub mod endpoint;
pub mod importer;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod query;
pub mod repository;
pub mod scheduler;
