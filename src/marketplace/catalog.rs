use serde::Serialize;

use super::domain::PackageId;

/// Subscription plan offered on the pricing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    #[serde(rename = "name_ua")]
    pub name_localized: String,
    pub description: String,
    #[serde(rename = "description_ua")]
    pub description_localized: String,
    /// Minor currency units (kopiyky).
    pub price: u64,
    pub duration_days: i64,
    pub features: Vec<String>,
    #[serde(rename = "features_ua")]
    pub features_localized: Vec<String>,
    pub popular: bool,
}

struct PackageSeed {
    id: &'static str,
    name: &'static str,
    name_localized: &'static str,
    description: &'static str,
    description_localized: &'static str,
    price: u64,
    features: &'static [&'static str],
    features_localized: &'static [&'static str],
    popular: bool,
}

const STANDARD_DURATION_DAYS: i64 = 30;

const STANDARD_PACKAGES: &[PackageSeed] = &[
    PackageSeed {
        id: "basic",
        name: "Basic",
        name_localized: "Базовий",
        description: "Perfect for getting started",
        description_localized: "Ідеально для початку",
        price: 29_900,
        features: &["1 vehicle listing", "Basic search visibility", "Email support"],
        features_localized: &["1 оголошення", "Базова видимість у пошуку", "Email підтримка"],
        popular: false,
    },
    PackageSeed {
        id: "professional",
        name: "Professional",
        name_localized: "Професійний",
        description: "Best for active drivers",
        description_localized: "Найкраще для активних водіїв",
        price: 59_900,
        features: &[
            "5 vehicle listings",
            "Priority search visibility",
            "Phone support",
            "Analytics dashboard",
        ],
        features_localized: &[
            "5 оголошень",
            "Пріоритетна видимість",
            "Телефонна підтримка",
            "Аналітика",
        ],
        popular: true,
    },
    PackageSeed {
        id: "enterprise",
        name: "Enterprise",
        name_localized: "Корпоративний",
        description: "For transport companies",
        description_localized: "Для транспортних компаній",
        price: 149_900,
        features: &[
            "Unlimited vehicles",
            "Top search placement",
            "24/7 support",
            "API access",
            "Custom branding",
        ],
        features_localized: &[
            "Безліміт оголошень",
            "Топ пошуку",
            "Підтримка 24/7",
            "API доступ",
            "Власний брендінг",
        ],
        popular: false,
    },
];

/// Immutable package catalog.
#[derive(Debug, Clone)]
pub struct PackageCatalog {
    packages: Vec<Package>,
}

impl PackageCatalog {
    pub fn new(packages: Vec<Package>) -> Self {
        Self { packages }
    }

    pub fn standard() -> Self {
        let packages = STANDARD_PACKAGES
            .iter()
            .map(|seed| Package {
                id: PackageId::from(seed.id),
                name: seed.name.to_string(),
                name_localized: seed.name_localized.to_string(),
                description: seed.description.to_string(),
                description_localized: seed.description_localized.to_string(),
                price: seed.price,
                duration_days: STANDARD_DURATION_DAYS,
                features: seed.features.iter().map(|f| f.to_string()).collect(),
                features_localized: seed
                    .features_localized
                    .iter()
                    .map(|f| f.to_string())
                    .collect(),
                popular: seed.popular,
            })
            .collect();
        Self::new(packages)
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn find(&self, id: &PackageId) -> Option<&Package> {
        self.packages.iter().find(|package| &package.id == id)
    }
}

impl Default for PackageCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_lists_three_monthly_plans() {
        let catalog = PackageCatalog::standard();
        let ids: Vec<&str> = catalog.packages().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["basic", "professional", "enterprise"]);
        assert!(catalog
            .packages()
            .iter()
            .all(|package| package.duration_days == 30));

        let popular: Vec<&str> = catalog
            .packages()
            .iter()
            .filter(|package| package.popular)
            .map(|package| package.id.as_str())
            .collect();
        assert_eq!(popular, vec!["professional"]);
    }

    #[test]
    fn find_is_exact() {
        let catalog = PackageCatalog::standard();
        assert_eq!(
            catalog.find(&PackageId::from("enterprise")).map(|p| p.price),
            Some(149_900)
        );
        assert!(catalog.find(&PackageId::from("Enterprise")).is_none());
    }

    #[test]
    fn serializes_localized_fields_with_wire_names() {
        let catalog = PackageCatalog::standard();
        let value = serde_json::to_value(&catalog.packages()[0]).expect("serializes");
        assert_eq!(value["name_ua"], "Базовий");
        assert_eq!(value["features_ua"][0], "1 оголошення");
    }
}
