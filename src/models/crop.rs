//! Crop listing and interest models
//!
//! Wire shapes for the /crops, /my-crops and /my-interests endpoints. A
//! listing embeds its interests; both are serialized with the field names
//! the marketplace frontend already speaks (`_id`, `created_at`, camelCase
//! elsewhere).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Fallback for listing/owner names missing from the stored document
pub const UNKNOWN: &str = "Unknown";

/// Alternate fields checked, in order, when a listing has no `name`
const ALTERNATE_NAME_FIELDS: [&str; 2] = ["cropName", "title"];

/// Fields a client may never write directly
pub const PROTECTED_FIELDS: [&str; 5] = ["_id", "owner", "interests", "version", "created_at"];

/// Embedded owner sub-record, fixed at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub owner_email: String,
    pub owner_name: String,
}

/// Status of an interest. Only `pending` may transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl InterestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestStatus::Pending => "pending",
            InterestStatus::Accepted => "accepted",
            InterestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InterestStatus::Pending)
    }
}

/// An owner's decision on a pending interest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    /// Parse a decision value; anything but exactly `accepted`/`rejected` is refused
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accepted" => Some(Decision::Accept),
            "rejected" => Some(Decision::Reject),
            _ => None,
        }
    }

    pub fn status(&self) -> InterestStatus {
        match self {
            Decision::Accept => InterestStatus::Accepted,
            Decision::Reject => InterestStatus::Rejected,
        }
    }
}

/// A request to acquire some quantity from a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interest {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(default)]
    pub user_email: Option<String>,
    pub quantity: Decimal,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: InterestStatus,
}

/// A crop surplus offered by a producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropListing {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub interests: Vec<Interest>,
    /// Bumped on every write; decisions are conditioned on it
    #[serde(default)]
    pub version: i64,
    /// Owner-supplied fields with no dedicated column
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl CropListing {
    pub fn owner_email(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.owner_email.as_str())
    }

    /// Display name, falling back through alternate name fields
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        ALTERNATE_NAME_FIELDS
            .iter()
            .filter_map(|field| self.attributes.get(*field))
            .filter_map(Value::as_str)
            .find(|n| !n.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string()
    }

    pub fn interest(&self, interest_id: Uuid) -> Option<&Interest> {
        self.interests.iter().find(|i| i.id == interest_id)
    }
}

/// Body of POST /crops
///
/// `ownerEmail`/`ownerName` are folded into the embedded owner record;
/// any client `created_at` is overwritten server-side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCropRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub owner_email: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Fields present in a PUT /crops/{id} body. Absent fields stay untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CropPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub attributes: Map<String, Value>,
}

impl CropPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.quantity.is_none()
            && self.attributes.is_empty()
    }

    /// Merge the patch into an in-memory listing. Returns whether anything changed.
    pub fn apply(&self, listing: &mut CropListing) -> bool {
        let mut changed = false;
        if let Some(name) = &self.name {
            changed |= listing.name.as_ref() != Some(name);
            listing.name = Some(name.clone());
        }
        if let Some(description) = &self.description {
            changed |= listing.description.as_ref() != Some(description);
            listing.description = Some(description.clone());
        }
        if let Some(quantity) = self.quantity {
            changed |= listing.quantity != quantity;
            listing.quantity = quantity;
        }
        for (key, value) in &self.attributes {
            changed |= listing.attributes.get(key) != Some(value);
            listing.attributes.insert(key.clone(), value.clone());
        }
        changed
    }
}

/// Body of POST /crops/{id}/interests
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitInterestRequest {
    #[serde(default)]
    pub user_email: Option<String>,
    pub quantity: Decimal,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of PATCH /crops/{cropId}/interests/{interestId}
///
/// `status` stays an untyped value so that a wrong type is reported as an
/// invalid decision once the listing is known to exist.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecideInterestRequest {
    #[serde(default)]
    pub status: Option<Value>,
}

impl DecideInterestRequest {
    /// The requested status when it is a JSON string
    pub fn decision(&self) -> Option<&str> {
        self.status.as_ref().and_then(Value::as_str)
    }
}

/// `?email=` filter used by /my-crops and /my-interests
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// One interest flattened together with its parent listing, for /my-interests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyInterest {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub crop_id: Uuid,
    pub crop_name: String,
    pub owner_name: String,
    pub owner_email: String,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: InterestStatus,
}

impl MyInterest {
    pub fn project(listing: &CropListing, interest: &Interest) -> Self {
        let (owner_name, owner_email) = match &listing.owner {
            Some(owner) => (owner.owner_name.clone(), owner.owner_email.clone()),
            None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        };
        Self {
            id: interest.id,
            crop_id: listing.id,
            crop_name: listing.display_name(),
            owner_name,
            owner_email,
            quantity: interest.quantity,
            message: interest.message.clone(),
            status: interest.status,
        }
    }
}

/// Error body for every non-2xx response produced by the crop endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
