//! Public listing search.
//!
//! Every criterion is optional except the vehicle class; present criteria are
//! AND-combined. Results are ordered by creation time (ties by id), so the same
//! query over unchanged data always yields the same sequence.

use serde::Deserialize;

use super::domain::OwnerContact;
use super::repository::creation_order;
use super::vehicle::{ValidationError, Vehicle, VehicleType, VehicleView};

pub const MAX_PAGE_SIZE: usize = 100;

/// Listing joined with its owner's contact details, when the owner is known.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub vehicle: Vehicle,
    pub owner: Option<OwnerContact>,
}

impl Listing {
    pub fn view(&self) -> VehicleView {
        self.vehicle.view(self.owner.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub vehicle_type: VehicleType,
    pub city: Option<String>,
    pub min_capacity: Option<f64>,
    pub max_price: Option<f64>,
    pub available: Option<bool>,
}

impl SearchCriteria {
    pub fn for_type(vehicle_type: VehicleType) -> Self {
        Self {
            vehicle_type,
            city: None,
            min_capacity: None,
            max_price: None,
            available: None,
        }
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        let vehicle = &listing.vehicle;
        if vehicle.vehicle_type() != self.vehicle_type {
            return false;
        }

        if let Some(city) = &self.city {
            let needle = city.to_lowercase();
            match &listing.owner {
                Some(owner) if owner.city.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }

        if let Some(min_capacity) = self.min_capacity {
            match vehicle.class.capacity_tons() {
                Some(capacity) if capacity >= min_capacity => {}
                _ => return false,
            }
        }

        if let Some(max_price) = self.max_price {
            if vehicle.price_per_km > max_price {
                return false;
            }
        }

        match self.available {
            Some(available) => vehicle.available == available,
            None => true,
        }
    }
}

/// Optional window over an ordered result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn apply(self, listings: Vec<Listing>) -> Vec<Listing> {
        let skipped = listings.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => skipped.take(limit.min(MAX_PAGE_SIZE)).collect(),
            None => skipped.collect(),
        }
    }
}

/// Filters and orders listings. The result is a subset of the input, and
/// filtering it again with the same criteria returns it unchanged.
pub fn filter(listings: &[Listing], criteria: &SearchCriteria) -> Vec<Listing> {
    let mut matched: Vec<Listing> = listings
        .iter()
        .filter(|listing| criteria.matches(listing))
        .cloned()
        .collect();
    matched.sort_by(|left, right| creation_order(&left.vehicle, &right.vehicle));
    matched
}

/// Raw query-string parameters. Empty values count as absent so forms can
/// submit untouched inputs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub min_capacity: Option<String>,
    #[serde(default)]
    pub max_price: Option<String>,
    #[serde(default)]
    pub available: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_number(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<f64>, ValidationError> {
    match present(value) {
        None => Ok(None),
        Some(raw) => match raw.parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(Some(number)),
            _ => Err(ValidationError::new(
                field,
                format!("{field} must be a number"),
            )),
        },
    }
}

impl SearchParams {
    pub fn into_query(self) -> Result<(SearchCriteria, Page), ValidationError> {
        let vehicle_type = present(self.vehicle_type)
            .ok_or_else(|| ValidationError::new("vehicle_type", "vehicle_type is required"))?;
        let vehicle_type = VehicleType::parse(&vehicle_type).ok_or_else(|| {
            ValidationError::new("vehicle_type", "vehicle_type must be 'cargo' or 'passenger'")
        })?;

        let available = match present(self.available) {
            None => None,
            Some(raw) => Some(raw.parse::<bool>().map_err(|_| {
                ValidationError::new("available", "available must be true or false")
            })?),
        };

        let limit = match present(self.limit) {
            None => None,
            Some(raw) => match raw.parse::<usize>() {
                Ok(limit) if limit > 0 => Some(limit.min(MAX_PAGE_SIZE)),
                _ => {
                    return Err(ValidationError::new("limit", "limit must be a positive integer"))
                }
            },
        };

        let offset = match present(self.offset) {
            None => 0,
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                ValidationError::new("offset", "offset must be a non-negative integer")
            })?,
        };

        let criteria = SearchCriteria {
            vehicle_type,
            city: present(self.city),
            min_capacity: parse_number("min_capacity", self.min_capacity)?,
            max_price: parse_number("max_price", self.max_price)?,
            available,
        };

        Ok((criteria, Page { limit, offset }))
    }
}
