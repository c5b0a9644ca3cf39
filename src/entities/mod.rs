pub mod order;
pub mod order_item;
pub mod order_promo_code;
pub mod product;
pub mod promo_code;
pub mod site_setting;
pub mod user;

pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use order_promo_code::Entity as OrderPromoCode;
pub use product::Entity as Product;
pub use promo_code::Entity as PromoCode;
pub use site_setting::Entity as SiteSetting;
pub use user::Entity as User;
