use crate::{
    entities::site_setting::{self, Entity as SiteSetting},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use tracing::instrument;

/// Key of the site-wide stock policy toggle.
pub const AUTO_DEDUCT_STOCK: &str = "auto_deduct_stock";

/// Injected policy lookup over the `site_settings` table.
///
/// The checkout pipeline consults this mid-flight instead of holding a
/// module-level flag, so the toggle can change between finalizations.
#[derive(Clone)]
pub struct SettingsService {
    db: Arc<DatabaseConnection>,
}

impl SettingsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Whether placed orders reserve stock (`true`) or immediately deduct it
    /// (`false`, the default when the setting is unset).
    #[instrument(skip(self))]
    pub async fn auto_deduct_stock(&self) -> Result<bool, ServiceError> {
        let setting = SiteSetting::find_by_id(AUTO_DEDUCT_STOCK.to_string())
            .one(&*self.db)
            .await?;
        Ok(setting
            .map(|s| matches!(s.value.trim(), "true" | "1"))
            .unwrap_or(false))
    }

    #[instrument(skip(self))]
    pub async fn set_auto_deduct_stock(&self, enabled: bool) -> Result<(), ServiceError> {
        let model = site_setting::ActiveModel {
            key: Set(AUTO_DEDUCT_STOCK.to_string()),
            value: Set(enabled.to_string()),
            updated_at: Set(Utc::now()),
        };
        SiteSetting::insert(model)
            .on_conflict(
                OnConflict::column(site_setting::Column::Key)
                    .update_columns([site_setting::Column::Value, site_setting::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}
