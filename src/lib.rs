//! Storefront API Library
//!
//! Order finalization, discount-prorated sales analytics, and the admin
//! order surface for the storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod payments;
pub mod services;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use services::{
    analytics::AnalyticsService,
    checkout::CheckoutService,
    inventory::InventoryService,
    notifications::{LoggingNotifier, OrderNotifier},
    orders::OrderService,
    promotions::PromoCodeService,
    settings::SettingsService,
};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: AppServices,
}

#[derive(Clone)]
pub struct AppServices {
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub analytics: AnalyticsService,
    pub promotions: PromoCodeService,
    pub inventory: InventoryService,
    pub settings: SettingsService,
}

impl AppState {
    /// Wires every service over one connection pool with the default
    /// logging notifier.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        Self::with_notifier(db, config, event_sender, Arc::new(LoggingNotifier))
    }

    pub fn with_notifier(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Self {
        let promotions = PromoCodeService::new(db.clone());
        let inventory = InventoryService::new(db.clone(), event_sender.clone());
        let settings = SettingsService::new(db.clone());
        let checkout = CheckoutService::new(
            db.clone(),
            promotions.clone(),
            inventory.clone(),
            settings.clone(),
            notifier,
            event_sender.clone(),
        );
        let orders = OrderService::new(db.clone(), inventory.clone(), event_sender.clone());
        let analytics = AnalyticsService::new(db.clone());

        Self {
            db,
            config,
            event_sender,
            services: AppServices {
                checkout,
                orders,
                analytics,
                promotions,
                inventory,
                settings,
            },
        }
    }
}

/// Common query parameters for list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

#[derive(Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn pagination_rounds_up_partial_pages() {
        let response = PaginatedResponse::new(vec![1, 2, 3], 45, 1, 20);
        assert_eq!(response.total_pages, 3);
    }
}
