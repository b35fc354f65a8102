use anyhow::{anyhow, Result};
use serde::Deserialize;

use super::{Confidence, ReverseGeocoder, SuggestedAddress};
use crate::cluster::geo::GeoPoint;
use crate::config::GeocodeConfig;

/// Reverse geocoding against an OpenStreetMap Nominatim server.
pub struct NominatimGeocoder {
    endpoint: String,
    user_agent: String,
    timeout_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct NominatimResponse {
    #[serde(default)]
    pub address: Option<NominatimAddress>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NominatimAddress {
    pub city: Option<String>,
    pub town: Option<String>,
    pub suburb: Option<String>,
    pub municipality: Option<String>,
    pub road: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodeConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    fn reverse_url(&self, point: GeoPoint) -> String {
        format!(
            "{}/reverse?format=json&lat={}&lon={}&zoom=18&addressdetails=1",
            self.endpoint, point.lat, point.lng
        )
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, point: GeoPoint) -> Result<Option<SuggestedAddress>> {
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build();

        let response = agent
            .get(&self.reverse_url(point))
            .set("User-Agent", &self.user_agent)
            .set("Accept", "application/json")
            .call()
            .map_err(|e| anyhow!("Nominatim request failed: {}", e))?;

        let body: NominatimResponse = response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse Nominatim response: {}", e))?;

        Ok(format_address(&body))
    }

    fn provider_name(&self) -> &'static str {
        "Nominatim"
    }
}

/// "City – 123 Street" when the response has structured parts, otherwise
/// the first two parts of `display_name`. A street makes it medium
/// confidence; anything less is low.
pub fn format_address(response: &NominatimResponse) -> Option<SuggestedAddress> {
    let mut parts: Vec<String> = Vec::new();
    let mut has_street = false;

    if let Some(address) = &response.address {
        let city = address
            .city
            .as_ref()
            .or(address.town.as_ref())
            .or(address.suburb.as_ref())
            .or(address.municipality.as_ref());
        if let Some(city) = city {
            parts.push(city.clone());
        }

        if let Some(street) = address.road.as_ref().or(address.street.as_ref()) {
            has_street = true;
            match &address.house_number {
                Some(number) => parts.push(format!("{} {}", number, street)),
                None => parts.push(street.clone()),
            }
        }
    }

    let mut formatted = parts.join(" – ");
    if formatted.is_empty() {
        if let Some(display_name) = &response.display_name {
            formatted = display_name
                .split(',')
                .take(2)
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(" – ");
        }
    }

    if formatted.trim().is_empty() {
        return None;
    }

    let confidence = if has_street {
        Confidence::Medium
    } else {
        Confidence::Low
    };
    Some(SuggestedAddress::new(formatted.trim(), confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> NominatimResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_city_and_street() {
        let response = parse(
            r#"{"address": {"city": "Burnaby", "road": "Kingsway", "house_number": "8290"},
                "display_name": "8290, Kingsway, Burnaby, BC"}"#,
        );
        let address = format_address(&response).unwrap();
        assert_eq!(address.formatted, "Burnaby – 8290 Kingsway");
        assert_eq!(address.confidence, Confidence::Medium);
        assert_eq!(address.source, "reverse_geocode");
    }

    #[test]
    fn test_town_without_street_is_low_confidence() {
        let response = parse(r#"{"address": {"town": "Squamish"}}"#);
        let address = format_address(&response).unwrap();
        assert_eq!(address.formatted, "Squamish");
        assert_eq!(address.confidence, Confidence::Low);
    }

    #[test]
    fn test_display_name_fallback() {
        let response = parse(r#"{"address": {}, "display_name": "Stanley Park, Vancouver, BC, Canada"}"#);
        let address = format_address(&response).unwrap();
        assert_eq!(address.formatted, "Stanley Park – Vancouver");
        assert_eq!(address.confidence, Confidence::Low);
    }

    #[test]
    fn test_empty_response_has_no_address() {
        assert_eq!(format_address(&parse("{}")), None);
        assert_eq!(format_address(&parse(r#"{"error": "Unable to geocode"}"#)), None);
    }

    #[test]
    fn test_reverse_url() {
        let geocoder = NominatimGeocoder::new(&GeocodeConfig {
            endpoint: "http://localhost:8080/".to_string(),
            ..Default::default()
        });
        assert_eq!(
            geocoder.reverse_url(GeoPoint::new(49.5, -123.25)),
            "http://localhost:8080/reverse?format=json&lat=49.5&lon=-123.25&zoom=18&addressdetails=1"
        );
    }
}
