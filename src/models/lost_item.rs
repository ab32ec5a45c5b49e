use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, AppResult};
use crate::store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Reported,
    Found,
    Claimed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Reported => "reported",
            ItemStatus::Found => "found",
            ItemStatus::Claimed => "claimed",
        }
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reported" => Ok(ItemStatus::Reported),
            "found" => Ok(ItemStatus::Found),
            "claimed" => Ok(ItemStatus::Claimed),
            other => Err(AppError::validation(format!(
                "status must be 'reported', 'found' or 'claimed', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Library,
    Cafeteria,
    Gym,
    Classroom,
    Laboratory,
    Auditorium,
    Hostel,
    Playground,
    Parking,
    Office,
    Other,
}

/// Inline image attached to a report; `data` is base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemImage {
    pub data: String,
    pub content_type: String,
}

impl ItemImage {
    pub fn from_bytes(bytes: &[u8], content_type: impl Into<String>) -> Self {
        Self {
            data: BASE64.encode(bytes),
            content_type: content_type.into(),
        }
    }

    pub fn decode(&self) -> AppResult<Vec<u8>> {
        BASE64
            .decode(&self.data)
            .map_err(|e| AppError::validation(format!("image data is not valid base64: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetails {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub location: Location,
    #[serde(deserialize_with = "deserialize_lost_date")]
    pub lost_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ItemImage>,
}

/// Accepts `YYYY-MM-DD` or a full ISO datetime and keeps the calendar date.
pub fn parse_lost_date(raw: &str) -> AppResult<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.date())
        .map_err(|_| AppError::validation(format!("invalid lostDate: {}", raw)))
}

fn deserialize_lost_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_lost_date(&raw).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub status: ItemStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulatedRef {
    #[serde(rename = "_id")]
    pub id: String,
}

/// `matchedItem` arrives either as a bare ID or as a populated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemRef {
    Id(String),
    Populated(PopulatedRef),
}

impl ItemRef {
    pub fn id(&self) -> &str {
        match self {
            ItemRef::Id(id) => id,
            ItemRef::Populated(p) => &p.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LostItem {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub item_details: ItemDetails,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_item: Option<ItemRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl LostItem {
    pub fn matched_id(&self) -> Option<&str> {
        self.matched_item.as_ref().map(ItemRef::id)
    }

    pub fn name(&self) -> &str {
        &self.item_details.name
    }
}

impl Record for LostItem {
    const COLLECTION: &'static str = "lost-items";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_school_id(&mut self, school_id: &str) {
        self.school_id = Some(school_id.to_string());
    }
}

/// What a reporter fills in for a lost or found item.
#[derive(Debug, Clone)]
pub struct ItemSubmission {
    pub name: String,
    pub description: String,
    pub location: Location,
    pub lost_date: NaiveDate,
    pub image: Option<ItemImage>,
}

impl ItemSubmission {
    pub fn new(name: impl Into<String>, location: Location, lost_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            location,
            lost_date,
            image: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_image(mut self, image: ItemImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Rejects blank names, occurrence dates after `today` and non-image attachments.
    pub fn validate(&self, today: NaiveDate) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("item name is required"));
        }
        if self.lost_date > today {
            return Err(AppError::validation(format!(
                "date {} cannot be in the future",
                self.lost_date
            )));
        }
        if let Some(image) = &self.image {
            if !image.content_type.starts_with("image/") {
                return Err(AppError::validation(format!(
                    "attachment must be an image, got '{}'",
                    image.content_type
                )));
            }
        }
        Ok(())
    }

    pub fn into_item(self, status: ItemStatus, person_id: &str) -> LostItem {
        LostItem {
            id: None,
            item_details: ItemDetails {
                name: self.name.trim().to_string(),
                description: self.description,
                location: self.location,
                lost_date: self.lost_date,
                image: self.image,
            },
            status,
            resolution: None,
            matched_item: None,
            person_id: Some(person_id.to_string()),
            school_id: None,
            created_at: None,
        }
    }
}
