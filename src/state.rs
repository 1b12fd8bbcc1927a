use std::sync::Arc;

use sha2::{Digest, Sha512};

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{invoices::InvoiceAllocator, trips::TripRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub trips: TripRepository,
    pub invoices: InvoiceAllocator,
    pub token_key: Arc<Vec<u8>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        trips: TripRepository,
        invoices: InvoiceAllocator,
    ) -> Self {
        let token_key = Sha512::digest(config.token_secret.as_bytes()).to_vec();
        Self {
            config,
            db,
            trips,
            invoices,
            token_key: Arc::new(token_key),
        }
    }
}
