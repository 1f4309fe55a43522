//! ArcGIS REST endpoint URL builders

/// Token generation endpoint of a portal
pub fn token_url(portal_url: &str) -> String {
    format!("{}/sharing/rest/generateToken", portal_url)
}

/// Catalog item details
pub fn item_url(portal_url: &str, item_id: &str) -> String {
    format!("{}/sharing/rest/content/items/{}", portal_url, item_id)
}

/// A numbered layer under a feature service
pub fn layer_url(service_url: &str, layer: u32) -> String {
    format!("{}/{}", service_url.trim_end_matches('/'), layer)
}

/// Feature query endpoint of a layer
pub fn query_url(layer_url: &str) -> String {
    format!("{}/query", layer_url)
}

/// Geometry service projection endpoint
pub fn project_url(geometry_url: &str) -> String {
    format!("{}/project", geometry_url)
}
