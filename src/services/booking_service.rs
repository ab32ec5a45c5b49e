use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{Booking, BookingStatus};
use crate::store::{ListFilter, ResourceStore};
use crate::tenant::TenantContext;

use super::StatusPatch;

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub resource_id: String,
    pub purpose: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Facility booking requests and staff approval.
pub struct BookingService {
    bookings: Arc<ResourceStore<Booking>>,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(bookings: Arc<ResourceStore<Booking>>, clock: Arc<dyn Clock>) -> Self {
        Self { bookings, clock }
    }

    pub fn store(&self) -> &ResourceStore<Booking> {
        &self.bookings
    }

    pub async fn refresh(&self, ctx: &TenantContext) -> AppResult<Vec<Booking>> {
        self.bookings.list(ctx, &ListFilter::new()).await
    }

    pub async fn request_booking(
        &self,
        ctx: &TenantContext,
        req: BookingRequest,
    ) -> AppResult<Booking> {
        if req.resource_id.trim().is_empty() {
            return Err(AppError::validation("resource_id is required"));
        }
        if req.end_time <= req.start_time {
            return Err(AppError::validation("booking must end after it starts"));
        }
        if req.start_time < self.clock.now() {
            return Err(AppError::validation("booking cannot start in the past"));
        }

        let booking = Booking {
            id: None,
            resource_id: req.resource_id,
            person_id: Some(ctx.user_id().to_string()),
            school_id: None,
            purpose: req.purpose,
            start_time: req.start_time,
            end_time: req.end_time,
            status: BookingStatus::Pending,
            notes: None,
        };
        self.bookings.create(ctx, booking).await
    }

    pub async fn approve(&self, ctx: &TenantContext, id: &str) -> AppResult<Booking> {
        self.ensure_pending(id).await?;
        self.bookings
            .update(ctx, id, &StatusPatch::new(BookingStatus::Approved))
            .await
    }

    pub async fn reject(&self, ctx: &TenantContext, id: &str, notes: &str) -> AppResult<Booking> {
        if notes.trim().is_empty() {
            return Err(AppError::validation("a reason is required to reject a booking"));
        }
        self.ensure_pending(id).await?;
        self.bookings
            .update(
                ctx,
                id,
                &StatusPatch::new(BookingStatus::Rejected).with_notes(notes),
            )
            .await
    }

    pub async fn cancel(&self, ctx: &TenantContext, id: &str) -> AppResult<Booking> {
        if let Some(existing) = self.bookings.get(id).await {
            if matches!(
                existing.status,
                BookingStatus::Rejected | BookingStatus::Cancelled
            ) {
                return Err(AppError::validation("booking is already closed"));
            }
        }
        self.bookings
            .update(ctx, id, &StatusPatch::new(BookingStatus::Cancelled))
            .await
    }

    /// Approval decisions only apply to pending bookings; unknown IDs are left to the server.
    async fn ensure_pending(&self, id: &str) -> AppResult<()> {
        match self.bookings.get(id).await {
            Some(b) if b.status != BookingStatus::Pending => Err(AppError::validation(format!(
                "booking {} is no longer pending",
                id
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeApi;
    use crate::api::ApiTransport;
    use crate::clock::FixedClock;
    use crate::tenant::{resolve, Role, Session};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn setup() -> (Arc<FakeApi>, BookingService, TenantContext) {
        let api = Arc::new(FakeApi::new());
        let transport: Arc<dyn ApiTransport> = api.clone();
        let svc = BookingService::new(
            Arc::new(ResourceStore::new(transport)),
            Arc::new(FixedClock(now())),
        );
        let ctx = resolve(&Session::new("u1", Role::SchoolAdmin, Some("s1".into()))).unwrap();
        (api, svc, ctx)
    }

    fn hall(hours_from_now: i64) -> BookingRequest {
        BookingRequest {
            resource_id: "hall-1".into(),
            purpose: "Debate club".into(),
            start_time: now() + Duration::hours(hours_from_now),
            end_time: now() + Duration::hours(hours_from_now + 2),
        }
    }

    #[tokio::test]
    async fn test_request_then_approve() {
        let (_api, svc, ctx) = setup();
        let booking = svc.request_booking(&ctx, hall(24)).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.school_id.as_deref(), Some("s1"));

        let id = booking.id.unwrap();
        let approved = svc.approve(&ctx, &id).await.unwrap();
        assert_eq!(approved.status, BookingStatus::Approved);
        assert_eq!(svc.store().get(&id).await, Some(approved));

        let err = svc.reject(&ctx, &id, "double booked").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reject_records_notes() {
        let (_api, svc, ctx) = setup();
        let id = svc.request_booking(&ctx, hall(3)).await.unwrap().id.unwrap();
        assert!(svc.reject(&ctx, &id, " ").await.is_err());
        let rejected = svc.reject(&ctx, &id, "Hall under repair").await.unwrap();
        assert_eq!(rejected.status, BookingStatus::Rejected);
        assert_eq!(rejected.notes.as_deref(), Some("Hall under repair"));
        assert!(svc.cancel(&ctx, &id).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_requests_never_reach_server() {
        let (api, svc, ctx) = setup();
        let mut backwards = hall(5);
        backwards.end_time = backwards.start_time;
        assert!(svc.request_booking(&ctx, backwards).await.is_err());
        assert!(svc.request_booking(&ctx, hall(-3)).await.is_err());
        let mut no_resource = hall(5);
        no_resource.resource_id = String::new();
        assert!(svc.request_booking(&ctx, no_resource).await.is_err());
        assert!(api.requests().is_empty());
    }
}
