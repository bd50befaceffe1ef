//! Crop document store
//!
//! The listing collection seen as a document store: whole-listing reads,
//! partial-field merges, a server-side append onto the embedded interest
//! array, and a version-conditioned write for decisions.

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::crop::{CropListing, CropPatch, Interest};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("corrupt crop document {id}: {message}")]
    Corrupt { id: Uuid, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of a partial update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

#[async_trait]
pub trait CropStore: Send + Sync {
    /// All listings in creation order
    async fn find_all(&self) -> Result<Vec<CropListing>, StoreError>;

    /// Newest listings first, ties broken by id descending
    async fn find_latest(&self, limit: u64) -> Result<Vec<CropListing>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CropListing>, StoreError>;

    /// Listings owned by `email`; every listing when no email is given
    async fn find_by_owner(&self, email: Option<&str>) -> Result<Vec<CropListing>, StoreError>;

    /// Listings holding at least one interest submitted by `email`, in creation order
    async fn find_with_interests_from(&self, email: &str) -> Result<Vec<CropListing>, StoreError>;

    async fn insert(&self, listing: CropListing) -> Result<Uuid, StoreError>;

    /// Merge the present fields of `patch` into the listing
    async fn update_fields(&self, id: Uuid, patch: &CropPatch) -> Result<UpdateOutcome, StoreError>;

    /// Remove the listing together with its interests. Returns the number deleted.
    async fn delete(&self, id: Uuid) -> Result<u64, StoreError>;

    /// Atomically append one interest. `None` when the listing does not exist.
    async fn append_interest(
        &self,
        id: Uuid,
        interest: &Interest,
    ) -> Result<Option<CropListing>, StoreError>;

    /// Replace the interest sequence and quantity in one write, only if the
    /// listing is still at `expected_version`. `None` when it moved on or vanished.
    async fn write_decision(
        &self,
        id: Uuid,
        expected_version: i64,
        interests: &[Interest],
        quantity: Decimal,
    ) -> Result<Option<CropListing>, StoreError>;
}

/// In-process store; listings kept in insertion order
#[derive(Clone, Default)]
pub struct MemoryCropStore {
    listings: Arc<RwLock<Vec<CropListing>>>,
}

impl MemoryCropStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CropStore for MemoryCropStore {
    async fn find_all(&self) -> Result<Vec<CropListing>, StoreError> {
        Ok(self.listings.read().clone())
    }

    async fn find_latest(&self, limit: u64) -> Result<Vec<CropListing>, StoreError> {
        let mut listings = self.listings.read().clone();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        listings.truncate(limit as usize);
        Ok(listings)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CropListing>, StoreError> {
        Ok(self.listings.read().iter().find(|l| l.id == id).cloned())
    }

    async fn find_by_owner(&self, email: Option<&str>) -> Result<Vec<CropListing>, StoreError> {
        let listings = self.listings.read();
        Ok(match email {
            Some(email) => listings
                .iter()
                .filter(|l| l.owner_email() == Some(email))
                .cloned()
                .collect(),
            None => listings.clone(),
        })
    }

    async fn find_with_interests_from(&self, email: &str) -> Result<Vec<CropListing>, StoreError> {
        Ok(self
            .listings
            .read()
            .iter()
            .filter(|l| l.interests.iter().any(|i| i.user_email.as_deref() == Some(email)))
            .cloned()
            .collect())
    }

    async fn insert(&self, listing: CropListing) -> Result<Uuid, StoreError> {
        let id = listing.id;
        self.listings.write().push(listing);
        Ok(id)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        patch: &CropPatch,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut listings = self.listings.write();
        let Some(listing) = listings.iter_mut().find(|l| l.id == id) else {
            return Ok(UpdateOutcome { matched: 0, modified: 0 });
        };
        let modified = patch.apply(listing);
        if modified {
            listing.version += 1;
        }
        Ok(UpdateOutcome {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut listings = self.listings.write();
        let before = listings.len();
        listings.retain(|l| l.id != id);
        Ok((before - listings.len()) as u64)
    }

    async fn append_interest(
        &self,
        id: Uuid,
        interest: &Interest,
    ) -> Result<Option<CropListing>, StoreError> {
        let mut listings = self.listings.write();
        Ok(listings.iter_mut().find(|l| l.id == id).map(|listing| {
            listing.interests.push(interest.clone());
            listing.version += 1;
            listing.clone()
        }))
    }

    async fn write_decision(
        &self,
        id: Uuid,
        expected_version: i64,
        interests: &[Interest],
        quantity: Decimal,
    ) -> Result<Option<CropListing>, StoreError> {
        let mut listings = self.listings.write();
        Ok(listings
            .iter_mut()
            .find(|l| l.id == id && l.version == expected_version)
            .map(|listing| {
                listing.interests = interests.to_vec();
                listing.quantity = quantity;
                listing.version += 1;
                listing.clone()
            }))
    }
}
