//! MaxMind lookups for proxies whose listing gave no usable country

use crate::proxy::country;
use crate::proxy::models::GeoFields;
use anyhow::Result;
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Location information for an IP address
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeoLocation {
    /// ISO 3166-1 alpha-2 country code (e.g., "US", "CN")
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub city_name: Option<String>,
}

impl GeoLocation {
    pub fn is_empty(&self) -> bool {
        self.country_code.is_none() && self.country_name.is_none() && self.city_name.is_none()
    }
}

impl From<GeoLocation> for GeoFields {
    fn from(location: GeoLocation) -> Self {
        // prefer the reference table's display name so listings and lookups agree
        let resolved = location.country_code.as_deref().and_then(country::resolve);
        GeoFields {
            country_code: location.country_code,
            country: resolved.map(|c| c.name.to_string()).or(location.country_name),
            region: None,
            city: location.city_name,
        }
    }
}

/// GeoLocator for looking up IP addresses in MMDB databases
#[derive(Clone)]
pub struct GeoLocator {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoLocator {
    /// Create a new GeoLocator from an MMDB file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// Look up the geolocation for an IP address string
    pub fn lookup(&self, ip_str: &str) -> Result<GeoLocation> {
        let ip: IpAddr = ip_str.parse()?;
        let lookup_result = self.reader.lookup(ip)?;

        let city: Option<geoip2::City> = lookup_result.decode()?;
        let Some(city) = city else {
            return Ok(GeoLocation::default());
        };

        Ok(GeoLocation {
            country_code: city.country.iso_code.map(String::from),
            country_name: city.country.names.english.map(String::from),
            city_name: city.city.names.english.map(String::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_location() {
        assert!(GeoLocation::default().is_empty());
        let fields: GeoFields = GeoLocation::default().into();
        assert!(fields.is_unknown());
    }

    #[test]
    fn test_location_into_fields() {
        let location = GeoLocation {
            country_code: Some("US".to_string()),
            country_name: Some("United States of America".to_string()),
            city_name: Some("New York".to_string()),
        };
        let fields: GeoFields = location.into();
        assert_eq!(fields.country_code.as_deref(), Some("US"));
        assert_eq!(fields.country.as_deref(), Some("United States"));
        assert_eq!(fields.city.as_deref(), Some("New York"));
    }

    #[test]
    fn test_missing_database() {
        assert!(GeoLocator::from_path("/nonexistent/GeoLite2-City.mmdb").is_err());
    }
}
