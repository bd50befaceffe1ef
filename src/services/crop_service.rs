//! Crop listing service
//!
//! Listing CRUD plus the interest workflow: buyers submit interests against
//! a listing, the listing owner accepts or rejects each one exactly once,
//! and accepted quantities are taken off the listing.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::crop::{
    CreateCropRequest, CropListing, CropPatch, Decision, Interest, InterestStatus, MyInterest,
    Owner, PROTECTED_FIELDS, SubmitInterestRequest,
};
use crate::services::auth::Identity;
use crate::services::crop_store::{CropStore, StoreError, UpdateOutcome};

/// Number of listings returned by the "latest" view
pub const LATEST_LIMIT: u64 = 6;

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happens when an accepted interest asks for more than is left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantityPolicy {
    /// Clamp the remaining quantity at zero
    #[default]
    Saturate,
    /// Refuse the acceptance
    RejectIfInsufficient,
}

impl QuantityPolicy {
    /// Remaining quantity after taking `requested` from `available`
    pub fn remaining(self, available: Decimal, requested: Decimal) -> Result<Decimal, CropError> {
        match self {
            QuantityPolicy::Saturate => Ok((available - requested).max(Decimal::ZERO)),
            QuantityPolicy::RejectIfInsufficient if requested > available => {
                Err(CropError::InvalidInput(format!(
                    "requested quantity {} exceeds available quantity {}",
                    requested, available
                )))
            }
            QuantityPolicy::RejectIfInsufficient => Ok(available - requested),
        }
    }
}

impl FromStr for QuantityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "saturate" => Ok(QuantityPolicy::Saturate),
            "reject" | "reject-if-insufficient" => Ok(QuantityPolicy::RejectIfInsufficient),
            other => Err(format!("unknown quantity policy '{}'", other)),
        }
    }
}

/// Parse a path id. Anything that is not a UUID cannot name a stored document.
pub fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn require_owner(listing: &CropListing, caller: &Identity) -> Result<(), CropError> {
    match listing.owner_email() {
        Some(owner) if owner == caller.email => Ok(()),
        _ => Err(CropError::Forbidden(
            "only the listing owner can do this".to_string(),
        )),
    }
}

fn crop_not_found() -> CropError {
    CropError::NotFound("crop not found".to_string())
}

fn interest_not_found() -> CropError {
    CropError::NotFound("interest not found".to_string())
}

fn strip_protected(attributes: &mut Map<String, Value>) {
    for field in PROTECTED_FIELDS {
        if attributes.remove(field).is_some() {
            debug!(field, "Ignoring client-supplied protected field");
        }
    }
}

/// Build a patch from a raw PUT body, keeping only client-writable fields
pub fn patch_from_body(mut body: Map<String, Value>) -> Result<CropPatch, CropError> {
    strip_protected(&mut body);

    let name = match body.remove("name") {
        None => None,
        Some(Value::String(name)) => Some(name),
        Some(_) => return Err(CropError::InvalidInput("name must be a string".to_string())),
    };
    let description = match body.remove("description") {
        None => None,
        Some(Value::String(description)) => Some(description),
        Some(_) => {
            return Err(CropError::InvalidInput(
                "description must be a string".to_string(),
            ));
        }
    };
    let quantity = match body.remove("quantity") {
        None => None,
        Some(value) => {
            let quantity: Decimal = serde_json::from_value(value)
                .map_err(|_| CropError::InvalidInput("quantity must be a number".to_string()))?;
            if quantity < Decimal::ZERO {
                return Err(CropError::InvalidInput(
                    "quantity cannot be negative".to_string(),
                ));
            }
            Some(quantity)
        }
    };

    Ok(CropPatch {
        name,
        description,
        quantity,
        attributes: body,
    })
}

#[derive(Clone)]
pub struct CropService {
    store: Arc<dyn CropStore>,
    policy: QuantityPolicy,
}

impl CropService {
    pub fn new(store: Arc<dyn CropStore>, policy: QuantityPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn list(&self) -> Result<Vec<CropListing>, CropError> {
        Ok(self.store.find_all().await?)
    }

    pub async fn latest(&self) -> Result<Vec<CropListing>, CropError> {
        Ok(self.store.find_latest(LATEST_LIMIT).await?)
    }

    /// `Ok(None)` is the not-found signal; it is not an error
    pub async fn get(&self, id: &str) -> Result<Option<CropListing>, CropError> {
        match parse_id(id) {
            Some(id) => Ok(self.store.find_by_id(id).await?),
            None => Ok(None),
        }
    }

    pub async fn create(&self, request: CreateCropRequest) -> Result<Uuid, CropError> {
        let CreateCropRequest {
            name,
            description,
            quantity,
            owner_email,
            owner_name,
            mut attributes,
        } = request;

        let quantity = quantity.unwrap_or(Decimal::ZERO);
        if quantity < Decimal::ZERO {
            return Err(CropError::InvalidInput(
                "quantity cannot be negative".to_string(),
            ));
        }
        strip_protected(&mut attributes);

        let owner = match (owner_email, owner_name) {
            (Some(owner_email), Some(owner_name)) => Some(Owner {
                owner_email,
                owner_name,
            }),
            _ => None,
        };

        let listing = CropListing {
            id: Uuid::new_v4(),
            name,
            description,
            quantity,
            created_at: Utc::now(),
            owner,
            interests: Vec::new(),
            version: 0,
            attributes,
        };
        Ok(self.store.insert(listing).await?)
    }

    /// Listings owned by `email`. Without an email every listing is returned.
    pub async fn mine(&self, email: Option<&str>) -> Result<Vec<CropListing>, CropError> {
        if email.is_none() {
            warn!("my-crops called without an email filter, returning all listings");
        }
        Ok(self.store.find_by_owner(email).await?)
    }

    pub async fn update(
        &self,
        id: &str,
        patch: CropPatch,
        caller: &Identity,
    ) -> Result<UpdateOutcome, CropError> {
        let Some(id) = parse_id(id) else {
            return Ok(UpdateOutcome { matched: 0, modified: 0 });
        };
        let Some(listing) = self.store.find_by_id(id).await? else {
            return Ok(UpdateOutcome { matched: 0, modified: 0 });
        };
        require_owner(&listing, caller)?;

        if patch.is_empty() {
            return Ok(UpdateOutcome { matched: 1, modified: 0 });
        }
        Ok(self.store.update_fields(id, &patch).await?)
    }

    pub async fn delete(&self, id: &str, caller: &Identity) -> Result<u64, CropError> {
        let Some(id) = parse_id(id) else {
            return Ok(0);
        };
        let Some(listing) = self.store.find_by_id(id).await? else {
            return Ok(0);
        };
        require_owner(&listing, caller)?;

        let deleted = self.store.delete(id).await?;
        info!(crop_id = %id, interests = listing.interests.len(), "Crop listing deleted");
        Ok(deleted)
    }

    pub async fn submit_interest(
        &self,
        crop_id: &str,
        request: SubmitInterestRequest,
        caller: &Identity,
    ) -> Result<CropListing, CropError> {
        let crop_id = parse_id(crop_id).ok_or_else(crop_not_found)?;
        if request.quantity <= Decimal::ZERO {
            return Err(CropError::InvalidInput(
                "quantity must be greater than zero".to_string(),
            ));
        }

        let interest = Interest {
            id: Uuid::new_v4(),
            user_email: request.user_email.or_else(|| Some(caller.email.clone())),
            quantity: request.quantity,
            message: request.message,
            status: InterestStatus::Pending,
        };

        let listing = self
            .store
            .append_interest(crop_id, &interest)
            .await?
            .ok_or_else(crop_not_found)?;

        info!(
            crop_id = %crop_id,
            interest_id = %interest.id,
            quantity = %interest.quantity,
            "Interest submitted"
        );
        Ok(listing)
    }

    /// Accept or reject a pending interest on one of the caller's listings
    pub async fn decide_interest(
        &self,
        crop_id: &str,
        interest_id: &str,
        decision: Option<&str>,
        caller: &Identity,
    ) -> Result<CropListing, CropError> {
        let crop_id = parse_id(crop_id).ok_or_else(crop_not_found)?;
        let mut listing = self
            .store
            .find_by_id(crop_id)
            .await?
            .ok_or_else(crop_not_found)?;

        let decision = decision.and_then(Decision::parse).ok_or_else(|| {
            CropError::InvalidInput("status must be 'accepted' or 'rejected'".to_string())
        })?;

        require_owner(&listing, caller)?;

        let interest_id = parse_id(interest_id).ok_or_else(interest_not_found)?;
        let interest = listing
            .interests
            .iter_mut()
            .find(|i| i.id == interest_id)
            .ok_or_else(interest_not_found)?;

        if interest.status.is_terminal() {
            return Err(CropError::Conflict(format!(
                "interest already {}",
                interest.status.as_str()
            )));
        }

        interest.status = decision.status();
        let mut quantity = listing.quantity;
        if decision == Decision::Accept {
            quantity = self.policy.remaining(quantity, interest.quantity)?;
        }

        let updated = self
            .store
            .write_decision(crop_id, listing.version, &listing.interests, quantity)
            .await?
            .ok_or_else(|| {
                CropError::Conflict("listing changed concurrently, reload and retry".to_string())
            })?;

        info!(
            crop_id = %crop_id,
            interest_id = %interest_id,
            status = decision.status().as_str(),
            remaining = %updated.quantity,
            "Interest decided"
        );
        Ok(updated)
    }

    /// Every interest submitted by `email`, flattened with its listing
    pub async fn my_interests(&self, email: &str) -> Result<Vec<MyInterest>, CropError> {
        let listings = self.store.find_with_interests_from(email).await?;
        Ok(listings
            .iter()
            .flat_map(|listing| {
                listing
                    .interests
                    .iter()
                    .filter(|i| i.user_email.as_deref() == Some(email))
                    .map(move |i| MyInterest::project(listing, i))
            })
            .collect())
    }
}
