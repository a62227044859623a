//! Address lookup proxy
//!
//! The submission form turns a typed address into coordinates before it
//! creates an issue. Lookups go to a Nominatim-compatible search endpoint;
//! the core never calls this.

use civic_core::config::GeocodeConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct GeocodeRequest {
    #[serde(rename = "fullAddress", default)]
    pub full_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub pincode: String,
    pub source: String,
}

/// One entry of a Nominatim `format=json` response
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: Option<PlaceAddress>,
}

#[derive(Debug, Deserialize)]
struct PlaceAddress {
    #[serde(default)]
    postcode: Option<String>,
}

pub struct Geocoder {
    client: reqwest::Client,
    endpoint: String,
    country_codes: String,
    country_suffix: String,
}

impl Geocoder {
    pub fn new(config: &GeocodeConfig) -> civic_core::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| civic_core::Error::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            country_codes: config.country_codes.clone(),
            country_suffix: config.country_suffix.clone(),
        })
    }

    fn query(&self, full_address: &str) -> String {
        if self.country_suffix.is_empty() {
            full_address.to_string()
        } else {
            format!("{}, {}", full_address, self.country_suffix)
        }
    }

    /// Resolve a free-text address to coordinates
    pub async fn lookup(&self, full_address: &str) -> ApiResult<GeocodeResult> {
        let full_address = full_address.trim();
        if full_address.is_empty() {
            return Err(ApiError::MissingAddress);
        }

        let query = self.query(full_address);
        let mut params = vec![
            ("q", query.as_str()),
            ("format", "json"),
            ("addressdetails", "1"),
            ("limit", "1"),
        ];
        if !self.country_codes.is_empty() {
            params.push(("countrycodes", self.country_codes.as_str()));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upstream(format!("geocoder returned {status}")));
        }

        let places: Vec<Place> = response.json().await?;
        let place = places.into_iter().next().ok_or(ApiError::NoGeocodeResults)?;
        let result = to_result(place)?;
        tracing::debug!(address = %full_address, lat = result.lat, lng = result.lng, "geocoded");
        Ok(result)
    }
}

fn to_result(place: Place) -> ApiResult<GeocodeResult> {
    let coordinate = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| ApiError::Upstream(format!("Invalid coordinate data received: {value:?}")))
    };
    Ok(GeocodeResult {
        lat: coordinate(&place.lat)?,
        lng: coordinate(&place.lon)?,
        address: place.display_name,
        pincode: place
            .address
            .and_then(|a| a.postcode)
            .unwrap_or_else(|| "Not found".to_string()),
        source: "OpenStreetMap".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(json: &str) -> Place {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_to_result() {
        let result = to_result(place(
            r#"{"lat":"19.05","lon":"74.38","display_name":"Parner, Maharashtra",
                "address":{"postcode":"414302"}}"#,
        ))
        .unwrap();
        assert_eq!(result.lat, 19.05);
        assert_eq!(result.lng, 74.38);
        assert_eq!(result.pincode, "414302");
        assert_eq!(result.source, "OpenStreetMap");
    }

    #[test]
    fn test_missing_postcode() {
        let result =
            to_result(place(r#"{"lat":"1","lon":"2","display_name":"Somewhere"}"#)).unwrap();
        assert_eq!(result.pincode, "Not found");
    }

    #[test]
    fn test_bad_coordinates() {
        let result = to_result(place(r#"{"lat":"","lon":"2","display_name":"x"}"#));
        assert!(matches!(result, Err(ApiError::Upstream(_))));
    }

    #[test]
    fn test_query_suffix() {
        let geocoder = Geocoder::new(&GeocodeConfig::default()).unwrap();
        assert_eq!(geocoder.query("Parner 414305"), "Parner 414305, India");
    }

    #[tokio::test]
    async fn test_blank_address_rejected_without_request() {
        let geocoder = Geocoder::new(&GeocodeConfig::default()).unwrap();
        assert!(matches!(
            geocoder.lookup("  ").await,
            Err(ApiError::MissingAddress)
        ));
    }
}
