pub mod booking_service;
pub mod feedback_service;
pub mod inventory_service;
pub mod lost_found_service;

pub use booking_service::{BookingRequest, BookingService};
pub use feedback_service::FeedbackService;
pub use inventory_service::InventoryService;
pub use lost_found_service::{
    reciprocity_violations, LostFoundService, MatchOutcome, MatchPolicy, ReciprocityViolation,
};

use std::sync::Arc;

use serde::Serialize;

use crate::analytics::{Dashboard, DashboardInput, DateRange};
use crate::api::ApiTransport;
use crate::clock::Clock;
use crate::error::AppResult;
use crate::models::Resource;
use crate::store::{ListFilter, Record, ResourceStore};
use crate::tenant::TenantContext;

/// `{ status, notes? }` body for status-only updates.
#[derive(Debug, Clone, Serialize)]
pub struct StatusPatch<S> {
    pub status: S,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl<S> StatusPatch<S> {
    pub fn new(status: S) -> Self {
        Self {
            status,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

fn store<R: Record>(api: &Arc<dyn ApiTransport>) -> Arc<ResourceStore<R>> {
    Arc::new(ResourceStore::new(api.clone()))
}

/// Every store and service, built once at start-up and handed to callers.
pub struct CampusServices {
    pub resources: Arc<ResourceStore<Resource>>,
    pub bookings: BookingService,
    pub inventory: InventoryService,
    pub feedback: FeedbackService,
    pub lost_found: LostFoundService,
    clock: Arc<dyn Clock>,
}

impl CampusServices {
    pub fn new(api: Arc<dyn ApiTransport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            resources: store(&api),
            bookings: BookingService::new(store(&api), clock.clone()),
            inventory: InventoryService::new(store(&api), store(&api)),
            feedback: FeedbackService::new(store(&api), store(&api), store(&api)),
            lost_found: LostFoundService::new(api.clone(), store(&api), clock.clone()),
            clock,
        }
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.lost_found = self.lost_found.with_policy(policy);
        self
    }

    /// Re-lists every collection a dashboard reads.
    pub async fn refresh_all(&self, ctx: &TenantContext) -> AppResult<()> {
        self.resources.list(ctx, &ListFilter::new()).await?;
        self.bookings.refresh(ctx).await?;
        self.inventory.refresh(ctx).await?;
        self.feedback.refresh(ctx).await?;
        self.lost_found.refresh(ctx).await?;
        Ok(())
    }

    /// Computes the dashboard from what is currently loaded.
    pub async fn dashboard(&self, range: DateRange) -> Dashboard {
        let input = DashboardInput {
            bookings: self.bookings.store().snapshot().await,
            lost_items: self.lost_found.store().snapshot().await,
            parking_lots: self.inventory.lots().snapshot().await,
            lockers: self.inventory.lockers().snapshot().await,
            feedback: self.feedback.feedback().snapshot().await,
            bugs: self.feedback.bugs().snapshot().await,
        };
        Dashboard::compute(&input, range, self.clock.now())
    }

    /// Detaches every store so in-flight responses are not applied.
    pub fn close(&self) {
        self.resources.close();
        self.bookings.store().close();
        self.inventory.lots().close();
        self.inventory.lockers().close();
        self.feedback.feedback().close();
        self.feedback.responds().close();
        self.feedback.bugs().close();
        self.lost_found.store().close();
    }
}
