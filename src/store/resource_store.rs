use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::api::{path, send_as, ApiRequest, ApiTransport};
use crate::error::{AppError, AppResult};
use crate::tenant::TenantContext;

use super::Record;

#[derive(Debug, Clone)]
pub struct StoreState<R> {
    pub items: Vec<R>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<R> Default for StoreState<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// Equality filters passed as query parameters on list requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    params: Vec<(String, String)>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        self.params.clone()
    }
}

/// Client-side cache and REST wrapper for one collection.
pub struct ResourceStore<R: Record> {
    api: Arc<dyn ApiTransport>,
    state: RwLock<StoreState<R>>,
    closed: AtomicBool,
}

impl<R: Record> ResourceStore<R> {
    pub fn new(api: Arc<dyn ApiTransport>) -> Self {
        Self {
            api,
            state: RwLock::new(StoreState::default()),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn snapshot(&self) -> Vec<R> {
        self.state.read().await.items.clone()
    }

    pub async fn state(&self) -> StoreState<R> {
        self.state.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<R> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|r| r.id() == Some(id))
            .cloned()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// Detaches the store: responses that arrive afterwards are dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.is_closed() {
            tracing::debug!("{} store closed, discarding response", R::COLLECTION);
            return Err(AppError::Cancelled);
        }
        Ok(())
    }

    async fn record_failure(&self, err: AppError) -> AppError {
        if !self.is_closed() {
            let mut state = self.state.write().await;
            state.loading = false;
            state.error = Some(err.to_string());
        }
        tracing::warn!("{} request failed: {}", R::COLLECTION, err);
        err
    }

    /// Replaces the collection with the tenant-scoped server list.
    pub async fn list(&self, ctx: &TenantContext, filter: &ListFilter) -> AppResult<Vec<R>> {
        let request = ApiRequest::get(ctx.checked_scope()?.list_path(R::COLLECTION))
            .with_query(filter.to_query());
        self.ensure_open()?;

        self.state.write().await.loading = true;
        let items = match send_as::<Vec<R>>(self.api.as_ref(), request).await {
            Ok(items) => items,
            Err(e) => return Err(self.record_failure(e).await),
        };
        if let Err(e) = self.ensure_open() {
            self.state.write().await.loading = false;
            return Err(e);
        }

        let mut state = self.state.write().await;
        state.items = items.clone();
        state.loading = false;
        state.error = None;
        tracing::debug!(
            "Listed {} {} for user {}",
            items.len(),
            R::COLLECTION,
            ctx.user_id()
        );
        Ok(items)
    }

    /// POSTs a new record, stamping the caller's school, and appends the server copy.
    pub async fn create(&self, ctx: &TenantContext, mut payload: R) -> AppResult<R> {
        if let Some(school_id) = ctx.checked_scope()?.school_id() {
            payload.set_school_id(school_id);
        }
        let body = serde_json::to_value(&payload)?;
        self.ensure_open()?;

        let created = match send_as::<R>(
            self.api.as_ref(),
            ApiRequest::post(path(&[R::COLLECTION]), body),
        )
        .await
        {
            Ok(created) => created,
            Err(e) => return Err(self.record_failure(e).await),
        };
        self.ensure_open()?;

        let mut state = self.state.write().await;
        state.items.push(created.clone());
        state.error = None;
        tracing::info!(
            "Created {} {:?} by user {}",
            R::COLLECTION,
            created.id(),
            ctx.user_id()
        );
        Ok(created)
    }

    /// PUTs a patch and replaces the local record with the server's version.
    pub async fn update<P>(&self, ctx: &TenantContext, id: &str, patch: &P) -> AppResult<R>
    where
        P: Serialize + ?Sized,
    {
        if id.trim().is_empty() {
            return Err(AppError::validation("id is required"));
        }
        ctx.checked_scope()?;
        let body = serde_json::to_value(patch)?;
        Self::check_school(ctx, &body)?;
        self.ensure_open()?;

        let updated = match send_as::<R>(
            self.api.as_ref(),
            ApiRequest::put(path(&[R::COLLECTION, id]), body),
        )
        .await
        {
            Ok(updated) => updated,
            Err(e) => return Err(self.record_failure(e).await),
        };
        self.ensure_open()?;

        let key = updated.id().unwrap_or(id).to_string();
        let mut state = self.state.write().await;
        match state.items.iter_mut().find(|r| r.id() == Some(key.as_str())) {
            Some(slot) => *slot = updated.clone(),
            None => state.items.push(updated.clone()),
        }
        state.error = None;
        tracing::info!("Updated {} {} by user {}", R::COLLECTION, key, ctx.user_id());
        Ok(updated)
    }

    /// DELETEs a record and drops it locally once the server confirms.
    pub async fn remove(&self, ctx: &TenantContext, id: &str) -> AppResult<()> {
        if id.trim().is_empty() {
            return Err(AppError::validation("id is required"));
        }
        ctx.checked_scope()?;
        self.ensure_open()?;

        if let Err(e) = self
            .api
            .send(ApiRequest::delete(path(&[R::COLLECTION, id])))
            .await
        {
            return Err(self.record_failure(e).await);
        }
        self.ensure_open()?;

        let mut state = self.state.write().await;
        state.items.retain(|r| r.id() != Some(id));
        state.error = None;
        tracing::info!("Deleted {} {} by user {}", R::COLLECTION, id, ctx.user_id());
        Ok(())
    }

    /// A tenant-scoped caller may not move a record into another school.
    fn check_school(ctx: &TenantContext, body: &Value) -> AppResult<()> {
        let (Some(own), Some(target)) = (
            ctx.school_id(),
            body.get("schoolId").and_then(Value::as_str),
        ) else {
            return Ok(());
        };
        if own != target {
            return Err(AppError::validation("record belongs to another school"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeApi;
    use crate::api::ApiMethod;
    use crate::models::{Resource, ParkingLot};
    use crate::tenant::{resolve, Role, Session, TenantScope};
    use serde_json::json;

    fn student(school: &str) -> TenantContext {
        resolve(&Session::new("stu-1", Role::Student, Some(school.to_string()))).unwrap()
    }

    fn super_admin() -> TenantContext {
        resolve(&Session::new("root", Role::SuperAdmin, None)).unwrap()
    }

    fn lot(name: &str) -> ParkingLot {
        ParkingLot {
            id: None,
            name: name.to_string(),
            total_spaces: 40,
            occupied_spaces: 0,
            school_id: None,
            is_active: true,
        }
    }

    fn setup() -> (Arc<FakeApi>, ResourceStore<ParkingLot>) {
        let api = Arc::new(FakeApi::new());
        api.seed(
            "parking-lots",
            vec![
                json!({"_id": "p1", "name": "North", "totalSpaces": 50, "occupiedSpaces": 10, "schoolId": "s1"}),
                json!({"_id": "p2", "name": "South", "totalSpaces": 20, "occupiedSpaces": 5, "schoolId": "s2"}),
            ],
        );
        let store = ResourceStore::new(api.clone() as Arc<dyn ApiTransport>);
        (api, store)
    }

    #[tokio::test]
    async fn test_scoped_list_never_hits_global_path() {
        let (api, store) = setup();
        let items = store.list(&student("s1"), &ListFilter::new()).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "North");
        let requests = api.requests();
        assert_eq!(requests, vec![(ApiMethod::Get, "/parking-lots/school/s1".to_string())]);
    }

    #[tokio::test]
    async fn test_global_list_for_super_admin() {
        let (api, store) = setup();
        let items = store.list(&super_admin(), &ListFilter::new()).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(api.requests()[0].1, "/parking-lots");
    }

    #[tokio::test]
    async fn test_list_is_idempotent_and_clears_loading() {
        let (_api, store) = setup();
        let ctx = student("s1");
        let first = store.list(&ctx, &ListFilter::new()).await.unwrap();
        let second = store.list(&ctx, &ListFilter::new()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.snapshot().await, second);
        assert!(!store.is_loading().await);
        assert_eq!(store.last_error().await, None);
    }

    #[tokio::test]
    async fn test_list_filter_is_sent_as_query() {
        let (_api, store) = setup();
        let filter = ListFilter::new().eq("name", "South");
        let items = store.list(&super_admin(), &filter).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn test_list_failure_keeps_items_and_records_error() {
        let (api, store) = setup();
        let ctx = student("s1");
        store.list(&ctx, &ListFilter::new()).await.unwrap();

        api.fail_next("backend unavailable");
        let err = store.list(&ctx, &ListFilter::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "backend unavailable");
        assert_eq!(store.snapshot().await.len(), 1);
        assert_eq!(store.last_error().await.as_deref(), Some("backend unavailable"));
        assert!(!store.is_loading().await);
    }

    #[tokio::test]
    async fn test_create_injects_school_and_appends_server_copy() {
        let (api, store) = setup();
        let ctx = student("s1");
        store.list(&ctx, &ListFilter::new()).await.unwrap();
        let before = store.snapshot().await.len();

        let created = store.create(&ctx, lot("East")).await.unwrap();

        assert!(created.id.is_some());
        assert_eq!(created.school_id.as_deref(), Some("s1"));
        let after = store.snapshot().await;
        assert_eq!(after.len(), before + 1);
        assert_eq!(after.last(), Some(&created));
        assert_eq!(api.docs("parking-lots").len(), 3);
    }

    #[tokio::test]
    async fn test_create_failure_does_not_mutate() {
        let (api, store) = setup();
        let ctx = student("s1");
        store.list(&ctx, &ListFilter::new()).await.unwrap();
        api.fail_next("name already taken");

        assert!(store.create(&ctx, lot("North")).await.is_err());
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_with_server_version() {
        let (_api, store) = setup();
        let ctx = student("s1");
        store.list(&ctx, &ListFilter::new()).await.unwrap();

        let updated = store
            .update(&ctx, "p1", &json!({"occupiedSpaces": 12}))
            .await
            .unwrap();

        assert_eq!(updated.occupied_spaces, 12);
        assert_eq!(updated.total_spaces, 50);
        assert_eq!(store.get("p1").await, Some(updated));
    }

    #[tokio::test]
    async fn test_update_unknown_id_leaves_collection_unchanged() {
        let (_api, store) = setup();
        let ctx = student("s1");
        store.list(&ctx, &ListFilter::new()).await.unwrap();
        let before = store.snapshot().await;

        let result = store.update(&ctx, "missing", &json!({"occupiedSpaces": 1})).await;

        assert!(!crate::error::OpStatus::from(&result).success);
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_update_cannot_move_record_to_other_school() {
        let (api, store) = setup();
        let ctx = student("s1");
        let err = store
            .update(&ctx, "p1", &json!({"schoolId": "s2"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_remove_after_confirmation() {
        let (api, store) = setup();
        let ctx = student("s1");
        store.list(&ctx, &ListFilter::new()).await.unwrap();

        api.fail_next("forbidden");
        assert!(store.remove(&ctx, "p1").await.is_err());
        assert_eq!(store.snapshot().await.len(), 1);

        store.remove(&ctx, "p1").await.unwrap();
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_store_sends_nothing() {
        let (api, store) = setup();
        store.close();
        let err = store.list(&student("s1"), &ListFilter::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert!(store.snapshot().await.is_empty());
        assert!(!store.is_loading().await);
        assert!(api.requests().is_empty());

        let err = store.create(&student("s1"), lot("East")).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(api.docs("parking-lots").len(), 2);
    }

    #[tokio::test]
    async fn test_scoped_role_with_global_scope_never_queries() {
        let (api, store) = setup();
        let ctx = TenantContext::from_parts("stu-1", Role::Student, TenantScope::Global);

        let err = store.list(&ctx, &ListFilter::new()).await.unwrap_err();
        assert!(matches!(err, AppError::MissingTenantContext));
        let err = store.create(&ctx, lot("East")).await.unwrap_err();
        assert!(matches!(err, AppError::MissingTenantContext));
        let err = store.remove(&ctx, "p2").await.unwrap_err();
        assert!(matches!(err, AppError::MissingTenantContext));

        assert!(api.requests().is_empty());
        assert!(!store.is_loading().await);
    }

    #[tokio::test]
    async fn test_resource_store_uses_its_collection() {
        let api = Arc::new(FakeApi::new());
        let store: ResourceStore<Resource> = ResourceStore::new(api.clone());
        let ctx = student("s9");
        store.list(&ctx, &ListFilter::new()).await.unwrap();
        assert_eq!(api.requests()[0].1, "/resources/school/s9");
        assert_eq!(ctx.scope(), &TenantScope::School("s9".to_string()));
    }
}
