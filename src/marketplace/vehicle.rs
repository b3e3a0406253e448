//! Vehicle listing entity: wire payloads, validation, and partial-update merging.
//!
//! Listings are stored as a tagged union over the vehicle class so a passenger
//! record can never carry tonnage or dimensions, and a cargo record can never
//! carry a seat count. Forms tend to submit both field groups; the fields that
//! do not belong to the declared class are dropped during validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::domain::{OwnerContact, UserId, VehicleId};

pub const MIN_MODEL_YEAR: i32 = 1990;

/// Declared class of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Cargo,
    Passenger,
}

impl VehicleType {
    /// Exact, case-sensitive match on the wire label.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "cargo" => Some(Self::Cargo),
            "passenger" => Some(Self::Passenger),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VehicleType::Cargo => "cargo",
            VehicleType::Passenger => "passenger",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CargoSpec {
    pub capacity_tons: Option<f64>,
    pub dimensions_length: Option<f64>,
    pub dimensions_width: Option<f64>,
    pub dimensions_height: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassengerSpec {
    pub passenger_seats: Option<u32>,
}

/// Class-specific attributes of a listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VehicleClass {
    Cargo(CargoSpec),
    Passenger(PassengerSpec),
}

impl VehicleClass {
    pub fn vehicle_type(&self) -> VehicleType {
        match self {
            VehicleClass::Cargo(_) => VehicleType::Cargo,
            VehicleClass::Passenger(_) => VehicleType::Passenger,
        }
    }

    pub fn capacity_tons(&self) -> Option<f64> {
        match self {
            VehicleClass::Cargo(spec) => spec.capacity_tons,
            VehicleClass::Passenger(_) => None,
        }
    }

    fn cargo(&self) -> CargoSpec {
        match self {
            VehicleClass::Cargo(spec) => *spec,
            VehicleClass::Passenger(_) => CargoSpec::default(),
        }
    }

    fn passenger(&self) -> PassengerSpec {
        match self {
            VehicleClass::Passenger(spec) => *spec,
            VehicleClass::Cargo(_) => PassengerSpec::default(),
        }
    }
}

/// Field-level rejection of a listing payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn default_available() -> bool {
    true
}

/// Full listing payload as submitted by the dashboard form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInput {
    pub vehicle_type: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    #[serde(default)]
    pub capacity_tons: Option<f64>,
    #[serde(default)]
    pub dimensions_length: Option<f64>,
    #[serde(default)]
    pub dimensions_width: Option<f64>,
    #[serde(default)]
    pub dimensions_height: Option<f64>,
    #[serde(default)]
    pub passenger_seats: Option<i64>,
    #[serde(default)]
    pub description: String,
    pub price_per_km: f64,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Maps `null` to `Some(None)` so a patch can clear an optional attribute,
/// while an absent key stays `None` and keeps the stored value.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial listing edit. Absent keys keep the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehiclePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub capacity_tons: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub dimensions_length: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub dimensions_width: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub dimensions_height: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub passenger_seats: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl VehiclePatch {
    /// Overlays the patch on the stored listing, yielding a full payload that
    /// goes through the same validation as a fresh submission.
    pub fn merge_into(self, existing: &Vehicle) -> VehicleInput {
        let mut input = existing.to_input();
        if let Some(vehicle_type) = self.vehicle_type {
            input.vehicle_type = vehicle_type;
        }
        if let Some(brand) = self.brand {
            input.brand = brand;
        }
        if let Some(model) = self.model {
            input.model = model;
        }
        if let Some(year) = self.year {
            input.year = year;
        }
        if let Some(capacity_tons) = self.capacity_tons {
            input.capacity_tons = capacity_tons;
        }
        if let Some(length) = self.dimensions_length {
            input.dimensions_length = length;
        }
        if let Some(width) = self.dimensions_width {
            input.dimensions_width = width;
        }
        if let Some(height) = self.dimensions_height {
            input.dimensions_height = height;
        }
        if let Some(seats) = self.passenger_seats {
            input.passenger_seats = seats;
        }
        if let Some(description) = self.description {
            input.description = description;
        }
        if let Some(price_per_km) = self.price_per_km {
            input.price_per_km = price_per_km;
        }
        if let Some(available) = self.available {
            input.available = available;
        }
        if let Some(images) = self.images {
            input.images = images;
        }
        input
    }
}

/// Validated listing attributes, independent of identity and ownership.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleDraft {
    pub class: VehicleClass,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub description: String,
    pub price_per_km: f64,
    pub available: bool,
    pub images: Vec<String>,
}

fn positive_decimal(
    field: &'static str,
    value: Option<f64>,
) -> Result<Option<f64>, ValidationError> {
    match value {
        Some(value) if !(value.is_finite() && value > 0.0) => Err(ValidationError::new(
            field,
            format!("{field} must be a positive number"),
        )),
        other => Ok(other),
    }
}

fn required_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Validates and normalizes a listing payload.
///
/// `current_year` bounds the model year to `[1990, current_year + 1]`.
pub fn validate(input: &VehicleInput, current_year: i32) -> Result<VehicleDraft, ValidationError> {
    let vehicle_type = VehicleType::parse(&input.vehicle_type).ok_or_else(|| {
        ValidationError::new("vehicle_type", "vehicle_type must be 'cargo' or 'passenger'")
    })?;

    let brand = required_text("brand", &input.brand)?;
    let model = required_text("model", &input.model)?;

    let newest = current_year + 1;
    if input.year < MIN_MODEL_YEAR || input.year > newest {
        return Err(ValidationError::new(
            "year",
            format!("year must be between {MIN_MODEL_YEAR} and {newest}"),
        ));
    }

    if !(input.price_per_km.is_finite() && input.price_per_km > 0.0) {
        return Err(ValidationError::new(
            "price_per_km",
            "price_per_km must be greater than zero",
        ));
    }

    let class = match vehicle_type {
        VehicleType::Cargo => VehicleClass::Cargo(CargoSpec {
            capacity_tons: positive_decimal("capacity_tons", input.capacity_tons)?,
            dimensions_length: positive_decimal("dimensions_length", input.dimensions_length)?,
            dimensions_width: positive_decimal("dimensions_width", input.dimensions_width)?,
            dimensions_height: positive_decimal("dimensions_height", input.dimensions_height)?,
        }),
        VehicleType::Passenger => {
            let passenger_seats = match input.passenger_seats {
                None => None,
                Some(seats) => match u32::try_from(seats) {
                    Ok(seats) if seats > 0 => Some(seats),
                    _ => {
                        return Err(ValidationError::new(
                            "passenger_seats",
                            "passenger_seats must be a positive integer",
                        ))
                    }
                },
            };
            VehicleClass::Passenger(PassengerSpec { passenger_seats })
        }
    };

    let images = input
        .images
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect();

    Ok(VehicleDraft {
        class,
        brand,
        model,
        year: input.year,
        description: input.description.trim().to_string(),
        price_per_km: input.price_per_km,
        available: input.available,
        images,
    })
}

/// Stored listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub owner_id: UserId,
    pub class: VehicleClass,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub description: String,
    pub price_per_km: f64,
    pub available: bool,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(id: VehicleId, owner_id: UserId, draft: VehicleDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id,
            class: draft.class,
            brand: draft.brand,
            model: draft.model,
            year: draft.year,
            description: draft.description,
            price_per_km: draft.price_per_km,
            available: draft.available,
            images: draft.images,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces every attribute with the draft, keeping identity and creation time.
    pub fn apply(&mut self, draft: VehicleDraft, now: DateTime<Utc>) {
        self.class = draft.class;
        self.brand = draft.brand;
        self.model = draft.model;
        self.year = draft.year;
        self.description = draft.description;
        self.price_per_km = draft.price_per_km;
        self.available = draft.available;
        self.images = draft.images;
        self.updated_at = now;
    }

    pub fn vehicle_type(&self) -> VehicleType {
        self.class.vehicle_type()
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn to_input(&self) -> VehicleInput {
        let cargo = self.class.cargo();
        let passenger = self.class.passenger();
        VehicleInput {
            vehicle_type: self.vehicle_type().label().to_string(),
            brand: self.brand.clone(),
            model: self.model.clone(),
            year: self.year,
            capacity_tons: cargo.capacity_tons,
            dimensions_length: cargo.dimensions_length,
            dimensions_width: cargo.dimensions_width,
            dimensions_height: cargo.dimensions_height,
            passenger_seats: passenger.passenger_seats.map(i64::from),
            description: self.description.clone(),
            price_per_km: self.price_per_km,
            available: self.available,
            images: self.images.clone(),
        }
    }

    pub fn view(&self, owner: Option<&OwnerContact>) -> VehicleView {
        let cargo = self.class.cargo();
        let passenger = self.class.passenger();
        VehicleView {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            vehicle_type: self.vehicle_type(),
            brand: self.brand.clone(),
            model: self.model.clone(),
            year: self.year,
            capacity_tons: cargo.capacity_tons,
            dimensions_length: cargo.dimensions_length,
            dimensions_width: cargo.dimensions_width,
            dimensions_height: cargo.dimensions_height,
            passenger_seats: passenger.passenger_seats,
            description: self.description.clone(),
            price_per_km: self.price_per_km,
            available: self.available,
            images: self.images.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            driver_name: owner.map(|contact| contact.name.clone()),
            driver_phone: owner.map(|contact| contact.phone.clone()),
            driver_city: owner.map(|contact| contact.city.clone()),
        }
    }
}

/// Flat listing representation consumed by listing cards and the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleView {
    pub id: VehicleId,
    pub owner_id: UserId,
    pub vehicle_type: VehicleType,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub capacity_tons: Option<f64>,
    pub dimensions_length: Option<f64>,
    pub dimensions_width: Option<f64>,
    pub dimensions_height: Option<f64>,
    pub passenger_seats: Option<u32>,
    pub description: String,
    pub price_per_km: f64,
    pub available: bool,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub driver_city: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn cargo_input() -> VehicleInput {
        VehicleInput {
            vehicle_type: "cargo".to_string(),
            brand: "MAN".to_string(),
            model: "TGX".to_string(),
            year: 2019,
            capacity_tons: Some(20.0),
            dimensions_length: Some(13.6),
            dimensions_width: Some(2.45),
            dimensions_height: Some(2.7),
            passenger_seats: Some(3),
            description: "Curtain-sider, ADR certified".to_string(),
            price_per_km: 15.0,
            available: true,
            images: vec!["https://cdn.example/man.jpg".to_string()],
        }
    }

    #[test]
    fn cargo_listing_drops_passenger_fields() {
        let draft = validate(&cargo_input(), 2026).expect("valid cargo listing");
        let vehicle = Vehicle::new(VehicleId::from("v-1"), UserId::from("u-1"), draft, now());

        assert_eq!(vehicle.vehicle_type(), VehicleType::Cargo);
        assert_eq!(vehicle.class.capacity_tons(), Some(20.0));
        let view = vehicle.view(None);
        assert_eq!(view.passenger_seats, None);
        assert_eq!(view.dimensions_length, Some(13.6));
        assert_eq!(vehicle.primary_image(), Some("https://cdn.example/man.jpg"));
    }

    #[test]
    fn passenger_listing_drops_cargo_fields() {
        let input = VehicleInput {
            vehicle_type: "passenger".to_string(),
            passenger_seats: Some(18),
            ..cargo_input()
        };

        let draft = validate(&input, 2026).expect("valid passenger listing");
        assert_eq!(
            draft.class,
            VehicleClass::Passenger(PassengerSpec {
                passenger_seats: Some(18)
            })
        );
        assert_eq!(draft.class.capacity_tons(), None);
    }

    #[test]
    fn foreign_fields_are_not_validated() {
        let input = VehicleInput {
            vehicle_type: "passenger".to_string(),
            capacity_tons: Some(-4.0),
            passenger_seats: None,
            ..cargo_input()
        };
        assert!(validate(&input, 2026).is_ok());
    }

    #[test]
    fn rejects_unknown_vehicle_type() {
        let input = VehicleInput {
            vehicle_type: "Cargo".to_string(),
            ..cargo_input()
        };
        let error = validate(&input, 2026).expect_err("type is case-sensitive");
        assert_eq!(error.field, "vehicle_type");
    }

    #[test]
    fn rejects_non_positive_price() {
        for price in [0.0, -1.5, f64::NAN] {
            let input = VehicleInput {
                price_per_km: price,
                ..cargo_input()
            };
            let error = validate(&input, 2026).expect_err("price must be positive");
            assert_eq!(error.field, "price_per_km");
        }
    }

    #[test]
    fn year_window_tracks_current_year() {
        let too_old = VehicleInput {
            year: 1989,
            ..cargo_input()
        };
        assert_eq!(validate(&too_old, 2026).expect_err("too old").field, "year");

        let next_model_year = VehicleInput {
            year: 2027,
            ..cargo_input()
        };
        assert!(validate(&next_model_year, 2026).is_ok());

        let too_new = VehicleInput {
            year: 2028,
            ..cargo_input()
        };
        assert_eq!(validate(&too_new, 2026).expect_err("too new").field, "year");
    }

    #[test]
    fn rejects_non_positive_cargo_dimensions() {
        let input = VehicleInput {
            dimensions_width: Some(0.0),
            ..cargo_input()
        };
        let error = validate(&input, 2026).expect_err("width must be positive");
        assert_eq!(error.field, "dimensions_width");
    }

    #[test]
    fn rejects_zero_seats() {
        let input = VehicleInput {
            vehicle_type: "passenger".to_string(),
            passenger_seats: Some(0),
            ..cargo_input()
        };
        let error = validate(&input, 2026).expect_err("seats must be positive");
        assert_eq!(error.field, "passenger_seats");
    }

    #[test]
    fn blank_images_are_dropped() {
        let input = VehicleInput {
            images: vec![" ".to_string(), "https://cdn.example/a.jpg".to_string()],
            ..cargo_input()
        };
        let draft = validate(&input, 2026).expect("valid");
        assert_eq!(draft.images, vec!["https://cdn.example/a.jpg".to_string()]);
    }

    #[test]
    fn patch_switching_class_discards_previous_class_fields() {
        let draft = validate(&cargo_input(), 2026).expect("valid");
        let vehicle = Vehicle::new(VehicleId::from("v-1"), UserId::from("u-1"), draft, now());

        let patch = VehiclePatch {
            vehicle_type: Some("passenger".to_string()),
            passenger_seats: Some(Some(8)),
            ..VehiclePatch::default()
        };
        let merged = validate(&patch.merge_into(&vehicle), 2026).expect("valid merge");

        assert_eq!(merged.class.capacity_tons(), None);
        assert_eq!(merged.brand, "MAN");
        assert_eq!(
            merged.class,
            VehicleClass::Passenger(PassengerSpec {
                passenger_seats: Some(8)
            })
        );
    }

    #[test]
    fn patch_null_clears_and_absent_keeps() {
        let draft = validate(&cargo_input(), 2026).expect("valid");
        let vehicle = Vehicle::new(VehicleId::from("v-1"), UserId::from("u-1"), draft, now());

        let patch: VehiclePatch =
            serde_json::from_str(r#"{"capacity_tons": null, "price_per_km": 12.5}"#)
                .expect("patch parses");
        let merged = validate(&patch.merge_into(&vehicle), 2026).expect("valid merge");

        assert_eq!(merged.class.capacity_tons(), None);
        assert_eq!(merged.price_per_km, 12.5);
        match merged.class {
            VehicleClass::Cargo(spec) => assert_eq!(spec.dimensions_length, Some(13.6)),
            other => panic!("expected cargo class, got {other:?}"),
        }
    }

    #[test]
    fn input_defaults_match_form_contract() {
        let input: VehicleInput = serde_json::from_str(
            r#"{"vehicle_type":"cargo","brand":"DAF","model":"XF","year":2020,"price_per_km":11}"#,
        )
        .expect("minimal payload parses");
        assert!(input.available);
        assert!(input.images.is_empty());
        assert!(input.description.is_empty());
    }
}
