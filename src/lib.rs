// src/lib.rs

use axum::extract::FromRef;
use std::sync::Arc;

use services::{auth::AuthProvider, crop_service::CropService};

#[derive(Clone)]
pub struct AppState {
    pub crops: CropService,
    pub auth: Arc<dyn AuthProvider>,
}

impl FromRef<AppState> for Arc<dyn AuthProvider> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

pub mod entities {
    pub mod prelude;
    pub mod crops;
}

pub mod services {
    pub mod auth;
    pub mod crop_store;
    pub mod pg_crop_store;
    pub mod crop_service;
}

pub mod models {
    pub mod crop;
}

pub mod handlers {
    pub mod auth;
    pub mod crop;
}

pub mod config;
pub mod routes;
