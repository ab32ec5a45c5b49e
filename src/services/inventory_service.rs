use std::sync::Arc;

use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{LockerStatus, LockerUnit, ParkingLot};
use crate::store::{ListFilter, ResourceStore};
use crate::tenant::TenantContext;

use super::StatusPatch;

/// Parking-lot and locker inventory.
pub struct InventoryService {
    lots: Arc<ResourceStore<ParkingLot>>,
    lockers: Arc<ResourceStore<LockerUnit>>,
}

impl InventoryService {
    pub fn new(
        lots: Arc<ResourceStore<ParkingLot>>,
        lockers: Arc<ResourceStore<LockerUnit>>,
    ) -> Self {
        Self { lots, lockers }
    }

    pub fn lots(&self) -> &ResourceStore<ParkingLot> {
        &self.lots
    }

    pub fn lockers(&self) -> &ResourceStore<LockerUnit> {
        &self.lockers
    }

    pub async fn refresh(&self, ctx: &TenantContext) -> AppResult<()> {
        self.lots.list(ctx, &ListFilter::new()).await?;
        self.lockers.list(ctx, &ListFilter::new()).await?;
        Ok(())
    }

    pub async fn add_parking_lot(
        &self,
        ctx: &TenantContext,
        name: &str,
        total_spaces: u32,
    ) -> AppResult<ParkingLot> {
        if name.trim().is_empty() {
            return Err(AppError::validation("parking lot name is required"));
        }
        if total_spaces == 0 {
            return Err(AppError::validation("a parking lot needs at least one space"));
        }
        let lot = ParkingLot {
            id: None,
            name: name.trim().to_string(),
            total_spaces,
            occupied_spaces: 0,
            school_id: None,
            is_active: true,
        };
        self.lots.create(ctx, lot).await
    }

    pub async fn set_lot_active(
        &self,
        ctx: &TenantContext,
        id: &str,
        active: bool,
    ) -> AppResult<ParkingLot> {
        self.lots.update(ctx, id, &json!({ "isActive": active })).await
    }

    pub async fn record_occupancy(
        &self,
        ctx: &TenantContext,
        id: &str,
        occupied: u32,
    ) -> AppResult<ParkingLot> {
        let lot = self
            .lots
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("parking lot {}", id)))?;
        if occupied > lot.total_spaces {
            return Err(AppError::validation(format!(
                "{} has only {} spaces",
                lot.name, lot.total_spaces
            )));
        }
        self.lots
            .update(ctx, id, &json!({ "occupiedSpaces": occupied }))
            .await
    }

    pub async fn add_locker(
        &self,
        ctx: &TenantContext,
        locker_number: &str,
        location: &str,
    ) -> AppResult<LockerUnit> {
        if locker_number.trim().is_empty() {
            return Err(AppError::validation("locker number is required"));
        }
        let locker = LockerUnit {
            id: None,
            locker_number: locker_number.trim().to_string(),
            location: location.to_string(),
            status: LockerStatus::Available,
            assigned_to: None,
            school_id: None,
        };
        self.lockers.create(ctx, locker).await
    }

    pub async fn assign_locker(
        &self,
        ctx: &TenantContext,
        id: &str,
        user_id: &str,
    ) -> AppResult<LockerUnit> {
        if user_id.trim().is_empty() {
            return Err(AppError::validation("user_id is required"));
        }
        let locker = self
            .lockers
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("locker {}", id)))?;
        if locker.status != LockerStatus::Available {
            return Err(AppError::validation(format!(
                "locker {} is not available",
                locker.locker_number
            )));
        }
        self.lockers
            .update(
                ctx,
                id,
                &json!({ "status": LockerStatus::Occupied, "assignedTo": user_id }),
            )
            .await
    }

    pub async fn release_locker(&self, ctx: &TenantContext, id: &str) -> AppResult<LockerUnit> {
        self.lockers
            .update(
                ctx,
                id,
                &json!({ "status": LockerStatus::Available, "assignedTo": null }),
            )
            .await
    }

    pub async fn set_locker_maintenance(
        &self,
        ctx: &TenantContext,
        id: &str,
    ) -> AppResult<LockerUnit> {
        self.lockers
            .update(ctx, id, &StatusPatch::new(LockerStatus::Maintenance))
            .await
    }
}
