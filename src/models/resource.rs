use serde::{Deserialize, Serialize};

use crate::store::Record;

fn default_active() -> bool {
    true
}

/// A bookable facility (room, hall, lab, equipment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Record for Resource {
    const COLLECTION: &'static str = "resources";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_school_id(&mut self, school_id: &str) {
        self.school_id = Some(school_id.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingLot {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub total_spaces: u32,
    #[serde(default)]
    pub occupied_spaces: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl ParkingLot {
    pub fn available_spaces(&self) -> u32 {
        self.total_spaces.saturating_sub(self.occupied_spaces)
    }
}

impl Record for ParkingLot {
    const COLLECTION: &'static str = "parking-lots";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_school_id(&mut self, school_id: &str) {
        self.school_id = Some(school_id.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockerStatus {
    Available,
    Occupied,
    Maintenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockerUnit {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub locker_number: String,
    #[serde(default)]
    pub location: String,
    pub status: LockerStatus,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
}

impl Record for LockerUnit {
    const COLLECTION: &'static str = "lockers";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_school_id(&mut self, school_id: &str) {
        self.school_id = Some(school_id.to_string());
    }
}
