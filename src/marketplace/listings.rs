use std::collections::HashMap;
use std::sync::Arc;

use chrono::Datelike;
use tracing::info;

use super::domain::{OwnerContact, User, UserId, VehicleId};
use super::error::MarketplaceError;
use super::gate::{authorize_owner, authorize_write, WriteLocks};
use super::identity::Principal;
use super::repository::{UserDirectory, VehicleRepository};
use super::search::{self, Listing, Page, SearchCriteria};
use super::vehicle::{validate, Vehicle, VehicleInput, VehiclePatch, VehicleView};
use super::SharedClock;

/// Listing lifecycle. Writes pass through the subscription gate while holding
/// the owner's write lock.
pub struct ListingService {
    vehicles: Arc<dyn VehicleRepository>,
    users: Arc<dyn UserDirectory>,
    locks: Arc<WriteLocks>,
    clock: SharedClock,
}

impl ListingService {
    pub fn new(
        vehicles: Arc<dyn VehicleRepository>,
        users: Arc<dyn UserDirectory>,
        locks: Arc<WriteLocks>,
        clock: SharedClock,
    ) -> Self {
        Self {
            vehicles,
            users,
            locks,
            clock,
        }
    }

    fn load_user(&self, user_id: &UserId) -> Result<User, MarketplaceError> {
        self.users
            .fetch(user_id)?
            .ok_or_else(|| MarketplaceError::unauthorized("User not found"))
    }

    fn load_vehicle(&self, id: &VehicleId) -> Result<Vehicle, MarketplaceError> {
        self.vehicles
            .fetch(id)?
            .ok_or_else(|| MarketplaceError::not_found("Vehicle not found"))
    }

    /// Loads the caller and vehicle for a write, in gate order: subscription,
    /// existence, then ownership.
    fn writable(
        &self,
        principal: &Principal,
        id: &VehicleId,
    ) -> Result<(User, Vehicle), MarketplaceError> {
        let owner = self.load_user(&principal.user_id)?;
        authorize_write(&owner, self.clock.utc())?;
        let vehicle = self.load_vehicle(id)?;
        authorize_owner(&owner, &vehicle)?;
        Ok((owner, vehicle))
    }

    /// Gate check alone, for requests rejected before a payload is read.
    pub fn ensure_can_publish(&self, principal: &Principal) -> Result<(), MarketplaceError> {
        let owner = self.load_user(&principal.user_id)?;
        authorize_write(&owner, self.clock.utc())?;
        Ok(())
    }

    pub fn ensure_can_modify(
        &self,
        principal: &Principal,
        id: &VehicleId,
    ) -> Result<(), MarketplaceError> {
        self.writable(principal, id).map(|_| ())
    }

    pub fn create(
        &self,
        principal: &Principal,
        input: VehicleInput,
    ) -> Result<VehicleView, MarketplaceError> {
        self.locks.with_user(&principal.user_id, || {
            let owner = self.load_user(&principal.user_id)?;
            let now = self.clock.utc();
            authorize_write(&owner, now)?;
            let draft = validate(&input, now.year())?;

            let vehicle = Vehicle::new(VehicleId::generate(), owner.id.clone(), draft, now);
            let stored = self.vehicles.insert(vehicle)?;
            info!(
                vehicle_id = %stored.id,
                owner_id = %owner.id,
                vehicle_type = stored.vehicle_type().label(),
                "listing created"
            );
            Ok(stored.view(Some(&owner.contact())))
        })
    }

    /// Partial update. Absent fields keep their stored values; the merged
    /// record is validated as a whole.
    pub fn update(
        &self,
        principal: &Principal,
        id: &VehicleId,
        patch: VehiclePatch,
    ) -> Result<VehicleView, MarketplaceError> {
        self.locks.with_user(&principal.user_id, || {
            let (owner, mut vehicle) = self.writable(principal, id)?;
            let now = self.clock.utc();
            let merged = patch.merge_into(&vehicle);
            let draft = validate(&merged, now.year())?;

            vehicle.apply(draft, now);
            self.vehicles.update(vehicle.clone())?;
            info!(vehicle_id = %vehicle.id, owner_id = %owner.id, "listing updated");
            Ok(vehicle.view(Some(&owner.contact())))
        })
    }

    pub fn delete(&self, principal: &Principal, id: &VehicleId) -> Result<(), MarketplaceError> {
        self.locks.with_user(&principal.user_id, || {
            let (owner, vehicle) = self.writable(principal, id)?;
            self.vehicles.remove(&vehicle.id)?;
            info!(vehicle_id = %vehicle.id, owner_id = %owner.id, "listing deleted");
            Ok(())
        })
    }

    /// The caller's own listings, regardless of subscription state.
    pub fn list_by_owner(
        &self,
        principal: &Principal,
    ) -> Result<Vec<VehicleView>, MarketplaceError> {
        let owner = self.load_user(&principal.user_id)?;
        let contact = owner.contact();
        Ok(self
            .vehicles
            .by_owner(&owner.id)?
            .iter()
            .map(|vehicle| vehicle.view(Some(&contact)))
            .collect())
    }

    pub fn search(
        &self,
        criteria: &SearchCriteria,
        page: Page,
    ) -> Result<Vec<VehicleView>, MarketplaceError> {
        let listings = self.listings()?;
        let matched = page.apply(search::filter(&listings, criteria));
        Ok(matched.iter().map(Listing::view).collect())
    }

    pub fn get(&self, id: &VehicleId) -> Result<VehicleView, MarketplaceError> {
        let vehicle = self.load_vehicle(id)?;
        let owner = self.users.fetch(&vehicle.owner_id)?.map(|user| user.contact());
        Ok(vehicle.view(owner.as_ref()))
    }

    /// Every stored vehicle joined with its owner. A vehicle whose owner is
    /// gone keeps no contact and only fails city criteria.
    fn listings(&self) -> Result<Vec<Listing>, MarketplaceError> {
        let contacts: HashMap<UserId, OwnerContact> = self
            .users
            .all()?
            .into_iter()
            .map(|user| (user.id.clone(), user.contact()))
            .collect();
        Ok(self
            .vehicles
            .all()?
            .into_iter()
            .map(|vehicle| {
                let owner = contacts.get(&vehicle.owner_id).cloned();
                Listing { vehicle, owner }
            })
            .collect())
    }
}
