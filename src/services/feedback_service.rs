use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{BugReport, BugStatus, Feedback, FeedbackStatus, Respond, Severity};
use crate::store::{ListFilter, ResourceStore};
use crate::tenant::TenantContext;

use super::StatusPatch;

/// Feedback and bug-report triage, including staff responses.
pub struct FeedbackService {
    feedback: Arc<ResourceStore<Feedback>>,
    responds: Arc<ResourceStore<Respond>>,
    bugs: Arc<ResourceStore<BugReport>>,
}

impl FeedbackService {
    pub fn new(
        feedback: Arc<ResourceStore<Feedback>>,
        responds: Arc<ResourceStore<Respond>>,
        bugs: Arc<ResourceStore<BugReport>>,
    ) -> Self {
        Self {
            feedback,
            responds,
            bugs,
        }
    }

    pub fn feedback(&self) -> &ResourceStore<Feedback> {
        &self.feedback
    }

    pub fn responds(&self) -> &ResourceStore<Respond> {
        &self.responds
    }

    pub fn bugs(&self) -> &ResourceStore<BugReport> {
        &self.bugs
    }

    pub async fn refresh(&self, ctx: &TenantContext) -> AppResult<()> {
        self.feedback.list(ctx, &ListFilter::new()).await?;
        self.responds.list(ctx, &ListFilter::new()).await?;
        self.bugs.list(ctx, &ListFilter::new()).await?;
        Ok(())
    }

    pub async fn submit_feedback(
        &self,
        ctx: &TenantContext,
        title: &str,
        message: &str,
        category: &str,
        rating: Option<u8>,
    ) -> AppResult<Feedback> {
        if title.trim().is_empty() {
            return Err(AppError::validation("title is required"));
        }
        if let Some(r) = rating {
            if !(1..=5).contains(&r) {
                return Err(AppError::validation("rating must be between 1 and 5"));
            }
        }
        let feedback = Feedback {
            id: None,
            title: title.trim().to_string(),
            message: message.to_string(),
            category: category.to_string(),
            rating,
            status: FeedbackStatus::Open,
            person_id: Some(ctx.user_id().to_string()),
            school_id: None,
            created_at: None,
        };
        self.feedback.create(ctx, feedback).await
    }

    pub async fn set_status(
        &self,
        ctx: &TenantContext,
        id: &str,
        status: FeedbackStatus,
    ) -> AppResult<Feedback> {
        self.feedback.update(ctx, id, &StatusPatch::new(status)).await
    }

    /// Posts a staff response; open feedback moves to review once answered.
    pub async fn respond(
        &self,
        ctx: &TenantContext,
        feedback_id: &str,
        message: &str,
    ) -> AppResult<Respond> {
        if feedback_id.trim().is_empty() {
            return Err(AppError::validation("feedback_id is required"));
        }
        if message.trim().is_empty() {
            return Err(AppError::validation("response message is required"));
        }
        let respond = Respond {
            id: None,
            feedback_id: feedback_id.to_string(),
            message: message.trim().to_string(),
            responder_id: ctx.user_id().to_string(),
            school_id: None,
            created_at: None,
        };
        let created = self.responds.create(ctx, respond).await?;

        let is_open = self
            .feedback
            .get(feedback_id)
            .await
            .is_some_and(|f| f.status == FeedbackStatus::Open);
        if is_open {
            if let Err(e) = self
                .set_status(ctx, feedback_id, FeedbackStatus::InReview)
                .await
            {
                tracing::warn!("Could not move feedback {} to review: {}", feedback_id, e);
            }
        }
        Ok(created)
    }

    pub async fn responses_for(&self, feedback_id: &str) -> Vec<Respond> {
        self.responds
            .snapshot()
            .await
            .into_iter()
            .filter(|r| r.feedback_id == feedback_id)
            .collect()
    }

    pub async fn report_bug(
        &self,
        ctx: &TenantContext,
        title: &str,
        description: &str,
        severity: Severity,
    ) -> AppResult<BugReport> {
        if title.trim().is_empty() {
            return Err(AppError::validation("title is required"));
        }
        let bug = BugReport {
            id: None,
            title: title.trim().to_string(),
            description: description.to_string(),
            severity,
            status: BugStatus::Open,
            reporter_id: Some(ctx.user_id().to_string()),
            school_id: None,
            created_at: None,
        };
        self.bugs.create(ctx, bug).await
    }

    pub async fn triage_bug(
        &self,
        ctx: &TenantContext,
        id: &str,
        severity: Severity,
        status: BugStatus,
    ) -> AppResult<BugReport> {
        self.bugs
            .update(ctx, id, &serde_json::json!({ "severity": severity, "status": status }))
            .await
    }
}
