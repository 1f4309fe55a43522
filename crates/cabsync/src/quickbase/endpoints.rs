//! Quickbase JSON API endpoint URL builders

/// Record query endpoint
pub fn records_query_url(api_url: &str) -> String {
    format!("{}/records/query", api_url)
}

/// Record insert/update endpoint
pub fn records_url(api_url: &str) -> String {
    format!("{}/records", api_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_urls() {
        assert_eq!(
            records_query_url("https://api.quickbase.com/v1"),
            "https://api.quickbase.com/v1/records/query"
        );
        assert_eq!(
            records_url("https://api.quickbase.com/v1"),
            "https://api.quickbase.com/v1/records"
        );
    }
}
