pub mod analytics;
pub mod checkout;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod promotions;
pub mod settings;
