//! Country label resolution for listing sites that print free-text locations

use crate::proxy::models::GeoFields;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A resolved country
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
    pub code: &'static str,
    pub name: &'static str,
}

/// Normalized label -> (ISO code, display name)
const COUNTRY_TABLE: &[(&str, &str, &str)] = &[
    ("afghanistan", "AF", "Afghanistan"),
    ("albania", "AL", "Albania"),
    ("algeria", "DZ", "Algeria"),
    ("argentina", "AR", "Argentina"),
    ("armenia", "AM", "Armenia"),
    ("australia", "AU", "Australia"),
    ("austria", "AT", "Austria"),
    ("azerbaijan", "AZ", "Azerbaijan"),
    ("bangladesh", "BD", "Bangladesh"),
    ("belarus", "BY", "Belarus"),
    ("belgium", "BE", "Belgium"),
    ("bolivia", "BO", "Bolivia"),
    ("bosnia_and_herzegovina", "BA", "Bosnia and Herzegovina"),
    ("brazil", "BR", "Brazil"),
    ("bulgaria", "BG", "Bulgaria"),
    ("cambodia", "KH", "Cambodia"),
    ("cameroon", "CM", "Cameroon"),
    ("canada", "CA", "Canada"),
    ("chile", "CL", "Chile"),
    ("china", "CN", "China"),
    ("colombia", "CO", "Colombia"),
    ("costa_rica", "CR", "Costa Rica"),
    ("croatia", "HR", "Croatia"),
    ("cyprus", "CY", "Cyprus"),
    ("czech_republic", "CZ", "Czech Republic"),
    ("czechia", "CZ", "Czech Republic"),
    ("denmark", "DK", "Denmark"),
    ("dominican_republic", "DO", "Dominican Republic"),
    ("ecuador", "EC", "Ecuador"),
    ("egypt", "EG", "Egypt"),
    ("estonia", "EE", "Estonia"),
    ("finland", "FI", "Finland"),
    ("france", "FR", "France"),
    ("georgia", "GE", "Georgia"),
    ("germany", "DE", "Germany"),
    ("ghana", "GH", "Ghana"),
    ("greece", "GR", "Greece"),
    ("guatemala", "GT", "Guatemala"),
    ("honduras", "HN", "Honduras"),
    ("hong_kong", "HK", "Hong Kong"),
    ("hungary", "HU", "Hungary"),
    ("india", "IN", "India"),
    ("indonesia", "ID", "Indonesia"),
    ("iran", "IR", "Iran"),
    ("iraq", "IQ", "Iraq"),
    ("ireland", "IE", "Ireland"),
    ("israel", "IL", "Israel"),
    ("italy", "IT", "Italy"),
    ("japan", "JP", "Japan"),
    ("kazakhstan", "KZ", "Kazakhstan"),
    ("kenya", "KE", "Kenya"),
    ("korea", "KR", "South Korea"),
    ("south_korea", "KR", "South Korea"),
    ("republic_of_korea", "KR", "South Korea"),
    ("latvia", "LV", "Latvia"),
    ("lithuania", "LT", "Lithuania"),
    ("malaysia", "MY", "Malaysia"),
    ("mexico", "MX", "Mexico"),
    ("moldova", "MD", "Moldova"),
    ("mongolia", "MN", "Mongolia"),
    ("morocco", "MA", "Morocco"),
    ("nepal", "NP", "Nepal"),
    ("netherlands", "NL", "Netherlands"),
    ("the_netherlands", "NL", "Netherlands"),
    ("new_zealand", "NZ", "New Zealand"),
    ("nigeria", "NG", "Nigeria"),
    ("norway", "NO", "Norway"),
    ("pakistan", "PK", "Pakistan"),
    ("panama", "PA", "Panama"),
    ("paraguay", "PY", "Paraguay"),
    ("peru", "PE", "Peru"),
    ("philippines", "PH", "Philippines"),
    ("poland", "PL", "Poland"),
    ("portugal", "PT", "Portugal"),
    ("romania", "RO", "Romania"),
    ("russia", "RU", "Russia"),
    ("russian_federation", "RU", "Russia"),
    ("saudi_arabia", "SA", "Saudi Arabia"),
    ("serbia", "RS", "Serbia"),
    ("singapore", "SG", "Singapore"),
    ("slovakia", "SK", "Slovakia"),
    ("slovenia", "SI", "Slovenia"),
    ("south_africa", "ZA", "South Africa"),
    ("spain", "ES", "Spain"),
    ("sweden", "SE", "Sweden"),
    ("switzerland", "CH", "Switzerland"),
    ("taiwan", "TW", "Taiwan"),
    ("thailand", "TH", "Thailand"),
    ("turkey", "TR", "Turkey"),
    ("ukraine", "UA", "Ukraine"),
    ("united_arab_emirates", "AE", "United Arab Emirates"),
    ("united_kingdom", "GB", "United Kingdom"),
    ("great_britain", "GB", "United Kingdom"),
    ("uk", "GB", "United Kingdom"),
    ("united_states", "US", "United States"),
    ("united_states_of_america", "US", "United States"),
    ("usa", "US", "United States"),
    ("uruguay", "UY", "Uruguay"),
    ("venezuela", "VE", "Venezuela"),
    ("vietnam", "VN", "Vietnam"),
    ("viet_nam", "VN", "Vietnam"),
];

static BY_LABEL: Lazy<HashMap<&'static str, Country>> = Lazy::new(|| {
    COUNTRY_TABLE
        .iter()
        .map(|&(label, code, name)| (label, Country { code, name }))
        .collect()
});

static BY_CODE: Lazy<HashMap<&'static str, Country>> = Lazy::new(|| {
    COUNTRY_TABLE
        .iter()
        .map(|&(_, code, name)| (code, Country { code, name }))
        .collect()
});

/// Lowercase, spaces to underscores, first comma-delimited token only
pub fn normalize_label(label: &str) -> String {
    label
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Resolve a free-text country label or a two-letter code
pub fn resolve(label: &str) -> Option<Country> {
    let normalized = normalize_label(label);
    if let Some(country) = BY_LABEL.get(normalized.as_str()) {
        return Some(*country);
    }
    if normalized.len() == 2 {
        return BY_CODE.get(normalized.to_uppercase().as_str()).copied();
    }
    None
}

/// Split "Country, Region, City" text into geo fields
pub fn parse_location(text: &str) -> GeoFields {
    let mut parts = text
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty());

    let country = parts.next().and_then(resolve);
    let region = parts.next().map(str::to_string);
    let city = parts.next().map(str::to_string);

    GeoFields {
        country_code: country.map(|c| c.code.to_string()),
        country: country.map(|c| c.name.to_string()),
        region,
        city,
    }
}
