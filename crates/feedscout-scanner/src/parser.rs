use crate::error::{Result, ScanError};
use feedscout_core::{or_unavailable, SiteConfig, UNAVAILABLE};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn country_code_regex() -> &'static Regex {
    static COUNTRY_CODE: OnceLock<Regex> = OnceLock::new();
    COUNTRY_CODE.get_or_init(|| Regex::new(r"\+(\d+)").expect("valid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub country_code: String,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParts {
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl AddressParts {
    fn unavailable() -> Self {
        Self {
            city: UNAVAILABLE.to_string(),
            state: UNAVAILABLE.to_string(),
            postal_code: UNAVAILABLE.to_string(),
        }
    }
}

/// Heuristic phone and address splitting, independent of any page.
#[derive(Debug, Clone)]
pub struct FieldParser {
    postal_code: Regex,
    default_country_code: String,
}

impl FieldParser {
    pub fn new(default_country_code: impl Into<String>, postal_code_digits: usize) -> Result<Self> {
        let postal_code = Regex::new(&format!(r"\d{{{postal_code_digits}}}"))
            .map_err(|e| ScanError::SiteConfig(format!("postal code pattern: {e}")))?;

        Ok(Self {
            postal_code,
            default_country_code: default_country_code.into(),
        })
    }

    pub fn from_site(site: &SiteConfig) -> Result<Self> {
        Self::new(site.default_country_code.clone(), site.postal_code_digits)
    }

    /// Split an international prefix from the local number.
    ///
    /// Without a `+` prefix the regional default applies and one leading
    /// trunk `0` is dropped.
    pub fn normalize_phone(&self, raw: &str) -> PhoneNumber {
        let raw = raw.trim();

        if let Some(found) = country_code_regex().find(raw) {
            let code = found.as_str();
            let local = raw.replacen(code, "", 1).trim().to_string();
            return PhoneNumber {
                country_code: code.to_string(),
                local: or_unavailable(Some(local)),
            };
        }

        let local = raw.strip_prefix('0').unwrap_or(raw).trim();
        PhoneNumber {
            country_code: self.default_country_code.clone(),
            local: or_unavailable(Some(local.to_string())),
        }
    }

    /// Derive city, state and postal code from comma-delimited segments.
    ///
    /// Needs at least three segments. The state segment is the last one when
    /// it carries the postal code, otherwise the second-from-last (a trailing
    /// country). The city is the segment just before the state segment.
    pub fn parse_address(&self, address: &str) -> AddressParts {
        let segments: Vec<&str> = address.split(',').map(str::trim).collect();
        let n = segments.len();
        if n < 3 {
            return AddressParts::unavailable();
        }

        let (city_idx, state_idx) = if self.postal_code.is_match(segments[n - 1]) {
            (n - 2, n - 1)
        } else {
            (n - 3, n - 2)
        };

        let city = segments[city_idx].to_string();
        let state_segment = segments[state_idx];

        let (state, postal_code) = match self.postal_code.find(state_segment) {
            Some(code) => (
                state_segment.replacen(code.as_str(), "", 1).trim().to_string(),
                Some(code.as_str().to_string()),
            ),
            None => (state_segment.to_string(), None),
        };

        AddressParts {
            city: or_unavailable(Some(city)),
            state: or_unavailable(Some(state)),
            postal_code: or_unavailable(postal_code),
        }
    }
}

/// Leading count from a reviews label such as `"1,204 reviews"`.
pub fn review_count(label: &str) -> Option<String> {
    label
        .split(' ')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> FieldParser {
        FieldParser::new("+91", 6).expect("valid parser")
    }

    #[test]
    fn test_international_phone() {
        let phone = parser().normalize_phone("+1 415-555-0100");
        assert_eq!(phone.country_code, "+1");
        assert_eq!(phone.local, "415-555-0100");
    }

    #[test]
    fn test_trunk_prefix_stripped() {
        let phone = parser().normalize_phone("022-5551234");
        assert_eq!(phone.country_code, "+91");
        assert_eq!(phone.local, "22-5551234");
    }

    #[test]
    fn test_local_phone_without_trunk() {
        let phone = parser().normalize_phone("98765 43210");
        assert_eq!(phone.country_code, "+91");
        assert_eq!(phone.local, "98765 43210");
    }

    #[test]
    fn test_bare_country_code_leaves_local_unavailable() {
        let phone = parser().normalize_phone("+14155550100");
        assert_eq!(phone.country_code, "+14155550100");
        assert_eq!(phone.local, UNAVAILABLE);
    }

    #[test]
    fn test_address_with_trailing_postal_segment() {
        let parts = parser().parse_address("12 Main St, Springfield, ST 123456");
        assert_eq!(parts.city, "Springfield");
        assert_eq!(parts.state, "ST");
        assert_eq!(parts.postal_code, "123456");
    }

    #[test]
    fn test_address_with_trailing_country() {
        let parts =
            parser().parse_address("Shop 4, MG Road, Bengaluru, Karnataka 560001, India");
        assert_eq!(parts.city, "Bengaluru");
        assert_eq!(parts.state, "Karnataka");
        assert_eq!(parts.postal_code, "560001");
    }

    #[test]
    fn test_address_without_postal_code() {
        let parts = parser().parse_address("Old Town, Riverside, Westshire, Freedonia");
        assert_eq!(parts.city, "Riverside");
        assert_eq!(parts.state, "Westshire");
        assert_eq!(parts.postal_code, UNAVAILABLE);
    }

    #[test]
    fn test_short_address_is_unavailable() {
        for address in ["Springfield, ST 123456", "Springfield", "", UNAVAILABLE] {
            let parts = parser().parse_address(address);
            assert_eq!(parts, AddressParts::unavailable(), "address {address:?}");
        }
    }

    #[test]
    fn test_postal_digits_configurable() {
        let parser = FieldParser::new("+1", 5).expect("valid parser");
        let parts = parser.parse_address("1 Elm St, Portland, OR 97201, USA");
        assert_eq!(parts.city, "Portland");
        assert_eq!(parts.state, "OR");
        assert_eq!(parts.postal_code, "97201");
    }

    #[test]
    fn test_review_count() {
        assert_eq!(review_count("1,204 reviews"), Some("1,204".to_string()));
        assert_eq!(review_count(""), None);
    }
}
