/// Upstream ingestion: fetching the feature feed and turning raw features
/// into canonical stations.

pub mod feed;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod transform;
