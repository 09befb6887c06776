//! Subscription packages offered in the final wizard step.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How often a package is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    #[default]
    Yearly,
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

/// A purchasable package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub billing_cycle: BillingCycle,
    pub features: Vec<String>,
}

/// The packages a user can choose from.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageCatalog {
    packages: Vec<Package>,
}

impl Default for PackageCatalog {
    fn default() -> Self {
        Self::new(vec![Package {
            id: "standard".to_string(),
            name: "Standard Pack".to_string(),
            price: dec!(15),
            billing_cycle: BillingCycle::Monthly,
            features: vec![
                "Display stars in Google organic search result and showcase reviews on your website"
                    .to_string(),
                "20,000 Visitors".to_string(),
                "Create Unlimited Widgets".to_string(),
                "CMS Integration".to_string(),
            ],
        }])
    }
}

impl PackageCatalog {
    pub fn new(packages: Vec<Package>) -> Self {
        Self { packages }
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn ids(&self) -> Vec<String> {
        self.packages.iter().map(|p| p.id.clone()).collect()
    }

    pub fn find(&self, id: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_standard_pack() {
        let catalog = PackageCatalog::default();
        let standard = catalog.find("standard").unwrap();
        assert_eq!(standard.name, "Standard Pack");
        assert_eq!(standard.price, dec!(15));
        assert_eq!(standard.billing_cycle, BillingCycle::Monthly);
        assert_eq!(standard.features.len(), 4);
        assert!(catalog.find("premium").is_none());
    }

    #[test]
    fn billing_cycle_defaults_to_yearly() {
        assert_eq!(BillingCycle::default(), BillingCycle::Yearly);
        assert_eq!(serde_json::to_string(&BillingCycle::Monthly).unwrap(), "\"monthly\"");
        assert_eq!(BillingCycle::Yearly.to_string(), "yearly");
    }

    #[test]
    fn package_price_serializes_as_string() {
        let catalog = PackageCatalog::default();
        let json = serde_json::to_value(catalog.find("standard").unwrap()).unwrap();
        assert_eq!(json["price"], "15");
        assert_eq!(json["billingCycle"], "monthly");
    }
}
