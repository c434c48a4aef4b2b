use serde::{Deserialize, Serialize};

/// Postal address snapshot taken when an order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    /// Suburb or city.
    pub locality: String,
    /// State or province.
    pub region: String,
    pub postcode: String,
    pub country: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        locality: impl Into<String>,
        region: impl Into<String>,
        postcode: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            locality: locality.into(),
            region: region.into(),
            postcode: postcode.into(),
            country: country.into(),
        }
    }

    /// Returns true when the fields a carrier needs are present.
    pub fn is_deliverable(&self) -> bool {
        !self.street.trim().is_empty()
            && !self.locality.trim().is_empty()
            && !self.country.trim().is_empty()
    }

    /// Renders the address on one line: `street, locality, region postcode, country`.
    ///
    /// Empty parts are skipped so partial addresses do not produce dangling commas.
    pub fn single_line(&self) -> String {
        let region_postcode = [self.region.trim(), self.postcode.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        [
            self.street.trim(),
            self.locality.trim(),
            region_postcode.as_str(),
            self.country.trim(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.single_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_rendering() {
        let address = Address::new("1 George St", "Sydney", "NSW", "2000", "Australia");
        assert_eq!(address.single_line(), "1 George St, Sydney, NSW 2000, Australia");
        assert!(address.is_deliverable());
    }

    #[test]
    fn single_line_skips_missing_parts() {
        let address = Address::new("1 George St", "Sydney", "", "", "Australia");
        assert_eq!(address.single_line(), "1 George St, Sydney, Australia");

        let no_region = Address::new("9 Main Rd", "Hobart", "", "7000", "Australia");
        assert_eq!(no_region.to_string(), "9 Main Rd, Hobart, 7000, Australia");
    }

    #[test]
    fn blank_street_is_not_deliverable() {
        let address = Address::new("  ", "Sydney", "NSW", "2000", "Australia");
        assert!(!address.is_deliverable());
    }
}
