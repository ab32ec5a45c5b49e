use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::api::{path, send_as, ApiRequest, ApiTransport};
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{ItemStatus, ItemSubmission, LostItem, Resolution};
use crate::store::{ListFilter, Record, ResourceStore};
use crate::tenant::TenantContext;

/// How strictly match targets are checked before the request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Any other item may be matched, including ones already claimed.
    #[default]
    Permissive,
    /// Claimed or already-matched items are rejected with a validation error.
    Strict,
}

/// Both records as returned by the match endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub reported_item: LostItem,
    pub found_item: LostItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReciprocityViolation {
    /// Claimed without any `matchedItem`.
    MissingMatch { item_id: String },
    /// `matchedItem` points at an item that is not in the collection.
    DanglingMatch { item_id: String, matched_id: String },
    /// The target does not point back.
    NotReciprocal { item_id: String, matched_id: String },
}

/// Checks that every claimed item is linked to an item that links back.
pub fn reciprocity_violations(items: &[LostItem]) -> Vec<ReciprocityViolation> {
    let mut violations = Vec::new();
    for item in items.iter().filter(|i| i.status == ItemStatus::Claimed) {
        let Some(item_id) = item.id.as_deref() else {
            continue;
        };
        let Some(matched_id) = item.matched_id() else {
            violations.push(ReciprocityViolation::MissingMatch {
                item_id: item_id.to_string(),
            });
            continue;
        };
        match items.iter().find(|other| other.id.as_deref() == Some(matched_id)) {
            None => violations.push(ReciprocityViolation::DanglingMatch {
                item_id: item_id.to_string(),
                matched_id: matched_id.to_string(),
            }),
            Some(target) if target.matched_id() != Some(item_id) => {
                violations.push(ReciprocityViolation::NotReciprocal {
                    item_id: item_id.to_string(),
                    matched_id: matched_id.to_string(),
                })
            }
            Some(_) => {}
        }
    }
    violations
}

/// Lost-and-found reporting, status lifecycle and matching.
pub struct LostFoundService {
    api: Arc<dyn ApiTransport>,
    items: Arc<ResourceStore<LostItem>>,
    clock: Arc<dyn Clock>,
    policy: MatchPolicy,
}

impl LostFoundService {
    pub fn new(
        api: Arc<dyn ApiTransport>,
        items: Arc<ResourceStore<LostItem>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            items,
            clock,
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn store(&self) -> &ResourceStore<LostItem> {
        &self.items
    }

    pub async fn refresh(&self, ctx: &TenantContext) -> AppResult<Vec<LostItem>> {
        self.items.list(ctx, &ListFilter::new()).await
    }

    pub async fn report_lost(
        &self,
        ctx: &TenantContext,
        submission: ItemSubmission,
    ) -> AppResult<LostItem> {
        self.submit(ctx, submission, ItemStatus::Reported).await
    }

    pub async fn report_found(
        &self,
        ctx: &TenantContext,
        submission: ItemSubmission,
    ) -> AppResult<LostItem> {
        self.submit(ctx, submission, ItemStatus::Found).await
    }

    async fn submit(
        &self,
        ctx: &TenantContext,
        submission: ItemSubmission,
        status: ItemStatus,
    ) -> AppResult<LostItem> {
        submission.validate(self.clock.now().date_naive())?;
        let item = submission.into_item(status, ctx.user_id());
        self.items.create(ctx, item).await
    }

    /// Sends the full record with the new status, then re-lists.
    ///
    /// Local state only changes once the server has answered; nothing is applied
    /// optimistically.
    pub async fn update_status(
        &self,
        ctx: &TenantContext,
        item: &LostItem,
        status: ItemStatus,
        notes: &str,
    ) -> AppResult<LostItem> {
        let id = item
            .id()
            .ok_or_else(|| AppError::validation("item has not been saved yet"))?
            .to_string();

        let mut record = item.clone();
        record.status = status;
        record.resolution = Some(Resolution {
            status,
            notes: notes.to_string(),
            resolved_at: Some(self.clock.now()),
        });

        let updated = self.items.update(ctx, &id, &record).await?;
        tracing::info!(
            "Lost item {} moved {} -> {}",
            id,
            item.status.as_str(),
            status.as_str()
        );

        if let Err(e) = self.refresh(ctx).await {
            tracing::warn!("Refresh after status update of {} failed: {}", id, e);
        }
        Ok(updated)
    }

    /// Items that may be offered as the counterpart of `reported`.
    pub async fn match_candidates(&self, reported: &LostItem) -> Vec<LostItem> {
        let policy = self.policy;
        self.items
            .snapshot()
            .await
            .into_iter()
            .filter(|c| c.id.is_some() && c.id != reported.id)
            .filter(|c| policy == MatchPolicy::Permissive || Self::is_unmatched(c))
            .collect()
    }

    fn is_unmatched(item: &LostItem) -> bool {
        item.status != ItemStatus::Claimed && item.matched_item.is_none()
    }

    /// Links a reported item with a found item through the server's match endpoint.
    ///
    /// The server claims both items and cross-links them in one request. A failure
    /// leaves local state untouched; success is followed by a full re-list.
    pub async fn match_items(
        &self,
        ctx: &TenantContext,
        reported: &LostItem,
        found: &LostItem,
    ) -> AppResult<MatchOutcome> {
        let (Some(reported_id), Some(found_id)) = (reported.id(), found.id()) else {
            return Err(AppError::validation(
                "both items must be selected before matching",
            ));
        };
        if reported_id == found_id {
            return Err(AppError::validation("an item cannot be matched with itself"));
        }
        if self.policy == MatchPolicy::Strict {
            for item in [reported, found] {
                if !Self::is_unmatched(item) {
                    return Err(AppError::validation(format!(
                        "'{}' is already claimed or matched",
                        item.name()
                    )));
                }
            }
        }

        let body = json!({
            "reportedItemId": reported_id,
            "foundItemId": found_id,
        });
        let outcome: MatchOutcome = send_as(
            self.api.as_ref(),
            ApiRequest::post(path(&[LostItem::COLLECTION, "match"]), body),
        )
        .await
        .inspect_err(|e| tracing::warn!("Match {} <-> {} failed: {}", reported_id, found_id, e))?;

        tracing::info!(
            "Matched lost item {} with {} by user {}",
            reported_id,
            found_id,
            ctx.user_id()
        );

        match self.refresh(ctx).await {
            Ok(items) => {
                for v in reciprocity_violations(&items) {
                    tracing::warn!("Lost-and-found link inconsistency: {:?}", v);
                }
            }
            Err(e) => tracing::warn!("Refresh after match failed: {}", e),
        }
        Ok(outcome)
    }

    /// Staff-only hard delete.
    pub async fn delete_item(&self, ctx: &TenantContext, id: &str) -> AppResult<()> {
        self.items.remove(ctx, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeApi;
    use crate::api::ApiMethod;
    use crate::clock::FixedClock;
    use crate::models::{ItemRef, Location};
    use crate::tenant::{resolve, Role, Session};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn ctx(role: Role) -> TenantContext {
        resolve(&Session::new("user-7", role, Some("school-1".to_string()))).unwrap()
    }

    fn service(api: &Arc<FakeApi>) -> LostFoundService {
        let transport: Arc<dyn ApiTransport> = api.clone();
        let store = Arc::new(ResourceStore::new(transport.clone()));
        LostFoundService::new(transport, store, clock())
    }

    fn backpack() -> ItemSubmission {
        ItemSubmission::new("Blue Backpack", Location::Library, today())
    }

    #[tokio::test]
    async fn test_student_reports_lost_backpack() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api);

        let item = svc.report_lost(&ctx(Role::Student), backpack()).await.unwrap();

        assert_eq!(item.status, ItemStatus::Reported);
        assert_eq!(item.school_id.as_deref(), Some("school-1"));
        assert_eq!(item.person_id.as_deref(), Some("user-7"));
        assert_eq!(svc.store().snapshot().await, vec![item]);
    }

    #[tokio::test]
    async fn test_found_submission_starts_found() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api);
        let item = svc.report_found(&ctx(Role::Student), backpack()).await.unwrap();
        assert_eq!(item.status, ItemStatus::Found);
    }

    #[tokio::test]
    async fn test_future_date_rejected_for_lost_and_found() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api);
        let tomorrow = today().succ_opt().unwrap();
        let sub = ItemSubmission::new("Watch", Location::Gym, tomorrow);

        let lost = svc.report_lost(&ctx(Role::Student), sub.clone()).await.unwrap_err();
        let found = svc.report_found(&ctx(Role::Student), sub).await.unwrap_err();

        assert!(matches!(lost, AppError::Validation(ref m) if !m.is_empty()));
        assert!(matches!(found, AppError::Validation(ref m) if !m.is_empty()));
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_match_claims_both_items_reciprocally() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api);
        let student = ctx(Role::Student);
        let staff = ctx(Role::SchoolAdmin);
        let lost = svc.report_lost(&student, backpack()).await.unwrap();
        let found = svc.report_found(&student, backpack()).await.unwrap();

        let outcome = svc.match_items(&staff, &lost, &found).await.unwrap();
        assert_eq!(outcome.reported_item.status, ItemStatus::Claimed);
        assert_eq!(outcome.found_item.status, ItemStatus::Claimed);

        let reported = svc.store().get(lost.id.as_deref().unwrap()).await.unwrap();
        let matched = svc.store().get(found.id.as_deref().unwrap()).await.unwrap();
        assert_eq!(reported.status, ItemStatus::Claimed);
        assert_eq!(matched.status, ItemStatus::Claimed);
        assert_eq!(reported.matched_id(), found.id.as_deref());
        assert_eq!(matched.matched_id(), lost.id.as_deref());
        assert!(reciprocity_violations(&svc.store().snapshot().await).is_empty());

        let last = api.requests().pop().unwrap();
        assert_eq!(last, (ApiMethod::Get, "/lost-items/school/school-1".to_string()));
    }

    #[tokio::test]
    async fn test_match_requires_saved_items() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api);
        let unsaved = backpack().into_item(ItemStatus::Reported, "user-7");
        let err = svc
            .match_items(&ctx(Role::SchoolAdmin), &unsaved, &unsaved)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failed_match_leaves_local_state_untouched() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api);
        let student = ctx(Role::Student);
        let lost = svc.report_lost(&student, backpack()).await.unwrap();
        let found = svc.report_found(&student, backpack()).await.unwrap();
        let before = svc.store().snapshot().await;

        api.fail_next("Items belong to different schools");
        let err = svc
            .match_items(&ctx(Role::SchoolAdmin), &lost, &found)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Items belong to different schools");
        assert_eq!(svc.store().snapshot().await, before);
    }

    #[tokio::test]
    async fn test_candidates_include_claimed_items_by_default() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api);
        let student = ctx(Role::Student);
        let a = svc.report_lost(&student, backpack()).await.unwrap();
        let b = svc.report_found(&student, backpack()).await.unwrap();
        let c = svc.report_found(&student, backpack()).await.unwrap();
        svc.match_items(&student, &a, &b).await.unwrap();

        let candidates = svc.match_candidates(&c).await;
        assert_eq!(candidates.len(), 2);

        let strict = service(&api).with_policy(MatchPolicy::Strict);
        strict.refresh(&student).await.unwrap();
        assert!(strict.match_candidates(&c).await.is_empty());
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_rematch() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api).with_policy(MatchPolicy::Strict);
        let student = ctx(Role::Student);
        let a = svc.report_lost(&student, backpack()).await.unwrap();
        let b = svc.report_found(&student, backpack()).await.unwrap();
        let c = svc.report_found(&student, backpack()).await.unwrap();
        svc.match_items(&student, &a, &b).await.unwrap();

        let claimed = svc.store().get(a.id.as_deref().unwrap()).await.unwrap();
        let err = svc.match_items(&student, &claimed, &c).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_status_writes_resolution_and_refreshes() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api);
        let student = ctx(Role::Student);
        let item = svc.report_lost(&student, backpack()).await.unwrap();

        let updated = svc
            .update_status(&ctx(Role::SchoolAdmin), &item, ItemStatus::Found, "At front desk")
            .await
            .unwrap();

        assert_eq!(updated.status, ItemStatus::Found);
        let resolution = updated.resolution.unwrap();
        assert_eq!(resolution.status, ItemStatus::Found);
        assert_eq!(resolution.notes, "At front desk");
        assert_eq!(resolution.resolved_at, Some(clock().now()));

        let methods: Vec<ApiMethod> = api.requests().into_iter().map(|(m, _)| m).collect();
        assert_eq!(methods, vec![ApiMethod::Post, ApiMethod::Put, ApiMethod::Get]);
    }

    #[tokio::test]
    async fn test_update_status_failure_is_not_applied() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api);
        let student = ctx(Role::Student);
        let item = svc.report_lost(&student, backpack()).await.unwrap();

        api.fail_next("Not allowed");
        assert!(svc
            .update_status(&student, &item, ItemStatus::Claimed, "")
            .await
            .is_err());
        assert_eq!(svc.store().snapshot().await, vec![item]);
    }

    #[tokio::test]
    async fn test_delete_item() {
        let api = Arc::new(FakeApi::new());
        let svc = service(&api);
        let student = ctx(Role::Student);
        let item = svc.report_lost(&student, backpack()).await.unwrap();
        svc.delete_item(&ctx(Role::SchoolAdmin), item.id.as_deref().unwrap())
            .await
            .unwrap();
        assert!(svc.store().snapshot().await.is_empty());
        assert!(api.docs("lost-items").is_empty());
    }

    #[test]
    fn test_reciprocity_violations() {
        let base = backpack().into_item(ItemStatus::Claimed, "u");
        let with = |id: &str, matched: Option<&str>| LostItem {
            id: Some(id.to_string()),
            matched_item: matched.map(|m| ItemRef::Id(m.to_string())),
            ..base.clone()
        };
        let items = vec![
            with("a", Some("b")),
            with("b", Some("a")),
            with("c", None),
            with("d", Some("zz")),
            with("e", Some("a")),
        ];

        let violations = reciprocity_violations(&items);
        assert_eq!(
            violations,
            vec![
                ReciprocityViolation::MissingMatch { item_id: "c".into() },
                ReciprocityViolation::DanglingMatch {
                    item_id: "d".into(),
                    matched_id: "zz".into()
                },
                ReciprocityViolation::NotReciprocal {
                    item_id: "e".into(),
                    matched_id: "a".into()
                },
            ]
        );
    }
}
