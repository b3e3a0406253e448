use std::sync::Arc;

use serde::Serialize;

use super::domain::Role;
use super::error::MarketplaceError;
use super::repository::{UserDirectory, VehicleRepository};
use super::vehicle::VehicleType;

/// Platform counters for the landing page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub drivers: usize,
    pub vehicles: usize,
    pub cargo_vehicles: usize,
    pub passenger_vehicles: usize,
}

pub struct StatsService {
    users: Arc<dyn UserDirectory>,
    vehicles: Arc<dyn VehicleRepository>,
}

impl StatsService {
    pub fn new(users: Arc<dyn UserDirectory>, vehicles: Arc<dyn VehicleRepository>) -> Self {
        Self { users, vehicles }
    }

    /// Counts over the current store contents; not a transactional snapshot.
    pub fn compute(&self) -> Result<Stats, MarketplaceError> {
        let drivers = self
            .users
            .all()?
            .iter()
            .filter(|user| user.role == Role::Driver)
            .count();

        let mut stats = Stats {
            drivers,
            ..Stats::default()
        };
        for vehicle in self.vehicles.all()? {
            stats.vehicles += 1;
            match vehicle.vehicle_type() {
                VehicleType::Cargo => stats.cargo_vehicles += 1,
                VehicleType::Passenger => stats.passenger_vehicles += 1,
            }
        }
        Ok(stats)
    }
}
