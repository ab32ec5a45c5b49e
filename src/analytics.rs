//! Dashboard projections over already-loaded collections.
//!
//! Everything here is a pure function of its inputs. Time windows take `now` as an
//! argument so results are reproducible.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::models::{
    Booking, BookingStatus, BugReport, Feedback, FeedbackStatus, ItemStatus, LockerStatus,
    LockerUnit, LostItem, ParkingLot, Severity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngagementLevel {
    High,
    Medium,
    Low,
}

pub fn engagement_level(actions: usize) -> EngagementLevel {
    if actions >= 50 {
        EngagementLevel::High
    } else if actions >= 20 {
        EngagementLevel::Medium
    } else {
        EngagementLevel::Low
    }
}

/// Share of `part` in `total` as a percentage with one decimal; 0 for an empty total.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / total as f64).round() / 10.0
}

pub fn month_key(ts: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", ts.year(), ts.month())
}

/// Counts items per `YYYY-MM`; items without a timestamp are skipped.
pub fn group_by_month<T, F>(items: &[T], timestamp: F) -> BTreeMap<String, usize>
where
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    let mut buckets = BTreeMap::new();
    for ts in items.iter().filter_map(timestamp) {
        *buckets.entry(month_key(ts)).or_insert(0) += 1;
    }
    buckets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    Last7Days,
    Last30Days,
    Last90Days,
    #[default]
    All,
}

impl DateRange {
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = match self {
            DateRange::Last7Days => 7,
            DateRange::Last30Days => 30,
            DateRange::Last90Days => 90,
            DateRange::All => return None,
        };
        Some(now - Duration::days(days))
    }

    /// Undated records only count toward `All`.
    pub fn contains(self, ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (self.since(now), ts) {
            (None, _) => true,
            (Some(since), Some(ts)) => ts >= since && ts <= now,
            (Some(_), None) => false,
        }
    }
}

impl std::str::FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(DateRange::Last7Days),
            "30d" => Ok(DateRange::Last30Days),
            "90d" => Ok(DateRange::Last90Days),
            "all" => Ok(DateRange::All),
            other => Err(format!("unknown range '{}', expected 7d, 30d, 90d or all", other)),
        }
    }
}

/// When a lost-and-found record entered the system, falling back to its occurrence date.
pub fn lost_item_timestamp(item: &LostItem) -> Option<DateTime<Utc>> {
    item.created_at
        .or_else(|| Some(item.item_details.lost_date.and_time(NaiveTime::MIN).and_utc()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub cancelled: usize,
    pub approval_rate: f64,
}

impl BookingSummary {
    pub fn from_bookings(bookings: &[Booking]) -> Self {
        let count = |s: BookingStatus| bookings.iter().filter(|b| b.status == s).count();
        let approved = count(BookingStatus::Approved);
        let rejected = count(BookingStatus::Rejected);
        Self {
            total: bookings.len(),
            pending: count(BookingStatus::Pending),
            approved,
            rejected,
            cancelled: count(BookingStatus::Cancelled),
            approval_rate: percentage(approved, approved + rejected),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LostFoundSummary {
    pub total: usize,
    pub reported: usize,
    pub found: usize,
    pub claimed: usize,
    pub recovery_rate: f64,
}

impl LostFoundSummary {
    pub fn from_items(items: &[LostItem]) -> Self {
        let count = |s: ItemStatus| items.iter().filter(|i| i.status == s).count();
        let claimed = count(ItemStatus::Claimed);
        Self {
            total: items.len(),
            reported: count(ItemStatus::Reported),
            found: count(ItemStatus::Found),
            claimed,
            recovery_rate: percentage(claimed, items.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParkingSummary {
    pub active_lots: usize,
    pub total_spaces: u32,
    pub occupied_spaces: u32,
    pub occupancy_rate: f64,
}

impl ParkingSummary {
    /// Inactive lots are left out of capacity figures.
    pub fn from_lots(lots: &[ParkingLot]) -> Self {
        let active: Vec<&ParkingLot> = lots.iter().filter(|l| l.is_active).collect();
        let total_spaces: u32 = active.iter().map(|l| l.total_spaces).sum();
        let occupied_spaces: u32 = active
            .iter()
            .map(|l| l.occupied_spaces.min(l.total_spaces))
            .sum();
        Self {
            active_lots: active.len(),
            total_spaces,
            occupied_spaces,
            occupancy_rate: percentage(occupied_spaces as usize, total_spaces as usize),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockerSummary {
    pub total: usize,
    pub available: usize,
    pub occupied: usize,
    pub maintenance: usize,
    pub utilisation: f64,
}

impl LockerSummary {
    pub fn from_lockers(lockers: &[LockerUnit]) -> Self {
        let count = |s: LockerStatus| lockers.iter().filter(|l| l.status == s).count();
        let occupied = count(LockerStatus::Occupied);
        let maintenance = count(LockerStatus::Maintenance);
        Self {
            total: lockers.len(),
            available: count(LockerStatus::Available),
            occupied,
            maintenance,
            utilisation: percentage(occupied, lockers.len() - maintenance),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSummary {
    pub total: usize,
    pub open: usize,
    pub average_rating: Option<f64>,
}

impl FeedbackSummary {
    pub fn from_feedback(feedback: &[Feedback]) -> Self {
        let ratings: Vec<u8> = feedback.iter().filter_map(|f| f.rating).collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            let sum: u32 = ratings.iter().map(|&r| r as u32).sum();
            Some((sum as f64 * 10.0 / ratings.len() as f64).round() / 10.0)
        };
        Self {
            total: feedback.len(),
            open: feedback
                .iter()
                .filter(|f| f.status == FeedbackStatus::Open)
                .count(),
            average_rating,
        }
    }
}

pub fn bugs_by_severity(bugs: &[BugReport]) -> BTreeMap<Severity, usize> {
    let mut counts = BTreeMap::new();
    for bug in bugs {
        *counts.entry(bug.severity).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantEngagement {
    pub school_id: String,
    pub actions: usize,
    pub level: EngagementLevel,
}

/// Scores each school by the number of actions attributed to it, busiest first.
pub fn tenant_engagement<'a, I>(school_ids: I) -> Vec<TenantEngagement>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for id in school_ids.into_iter().flatten() {
        *counts.entry(id).or_insert(0) += 1;
    }
    let mut scores: Vec<TenantEngagement> = counts
        .into_iter()
        .map(|(school_id, actions)| TenantEngagement {
            school_id: school_id.to_string(),
            actions,
            level: engagement_level(actions),
        })
        .collect();
    scores.sort_by(|a, b| b.actions.cmp(&a.actions).then(a.school_id.cmp(&b.school_id)));
    scores
}

/// Collections a dashboard is computed from.
#[derive(Debug, Clone, Default)]
pub struct DashboardInput {
    pub bookings: Vec<Booking>,
    pub lost_items: Vec<LostItem>,
    pub parking_lots: Vec<ParkingLot>,
    pub lockers: Vec<LockerUnit>,
    pub feedback: Vec<Feedback>,
    pub bugs: Vec<BugReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub bookings: BookingSummary,
    pub bookings_by_month: BTreeMap<String, usize>,
    pub lost_found: LostFoundSummary,
    pub lost_items_by_month: BTreeMap<String, usize>,
    pub parking: ParkingSummary,
    pub lockers: LockerSummary,
    pub feedback: FeedbackSummary,
    pub bugs_by_severity: BTreeMap<Severity, usize>,
    pub engagement: Vec<TenantEngagement>,
}

impl Dashboard {
    /// Activity collections are windowed by `range`; inventory is a point-in-time view.
    pub fn compute(input: &DashboardInput, range: DateRange, now: DateTime<Utc>) -> Self {
        let bookings: Vec<Booking> = input
            .bookings
            .iter()
            .filter(|b| range.contains(Some(b.start_time), now))
            .cloned()
            .collect();
        let lost_items: Vec<LostItem> = input
            .lost_items
            .iter()
            .filter(|i| range.contains(lost_item_timestamp(i), now))
            .cloned()
            .collect();
        let feedback: Vec<Feedback> = input
            .feedback
            .iter()
            .filter(|f| range.contains(f.created_at, now))
            .cloned()
            .collect();
        let bugs: Vec<BugReport> = input
            .bugs
            .iter()
            .filter(|b| range.contains(b.created_at, now))
            .cloned()
            .collect();

        let activity = bookings
            .iter()
            .map(|b| b.school_id.as_deref())
            .chain(lost_items.iter().map(|i| i.school_id.as_deref()))
            .chain(feedback.iter().map(|f| f.school_id.as_deref()))
            .chain(bugs.iter().map(|b| b.school_id.as_deref()));
        let engagement = tenant_engagement(activity);

        Self {
            bookings: BookingSummary::from_bookings(&bookings),
            bookings_by_month: group_by_month(&bookings, |b| Some(b.start_time)),
            lost_found: LostFoundSummary::from_items(&lost_items),
            lost_items_by_month: group_by_month(&lost_items, lost_item_timestamp),
            parking: ParkingSummary::from_lots(&input.parking_lots),
            lockers: LockerSummary::from_lockers(&input.lockers),
            feedback: FeedbackSummary::from_feedback(&feedback),
            bugs_by_severity: bugs_by_severity(&bugs),
            engagement,
        }
    }
}
