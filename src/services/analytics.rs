use crate::{
    entities::{
        order::{self, Entity as Order},
        order_item::{self, Entity as OrderItem},
        product::{self, Entity as Product},
    },
    errors::ServiceError,
    payments::OrderAddress,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ProductSales {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
}

/// Per-color or per-size rollup. `orders` counts distinct orders containing
/// the attribute at least once, not line items.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeSales {
    pub value: String,
    pub quantity: i64,
    pub revenue: Decimal,
    pub orders: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub revenue: Decimal,
    pub orders: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationRevenue {
    pub location: String,
    pub revenue: Decimal,
    pub orders: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerSummary {
    pub total: u64,
    pub new: u64,
    pub returning: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesReport {
    pub total_orders: u64,
    pub total_revenue: Decimal,
    pub total_cost: Decimal,
    pub total_profit: Decimal,
    pub product_sales: Vec<ProductSales>,
    pub sales_by_color: Vec<AttributeSales>,
    pub sales_by_size: Vec<AttributeSales>,
    pub revenue_by_day: Vec<DailyRevenue>,
    pub revenue_by_location: Vec<LocationRevenue>,
    pub customers: CustomerSummary,
}

/// Discount-prorated sales reporting over a time window.
#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<DatabaseConnection>,
}

impl AnalyticsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Builds the sales report for orders created in `[start, end)`.
    #[instrument(skip(self))]
    pub async fn sales_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SalesReport, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::CreatedAt.lt(end))
            .order_by_asc(order::Column::CreatedAt)
            .find_with_related(OrderItem)
            .all(&*self.db)
            .await?;

        let product_ids: Vec<Uuid> = orders
            .iter()
            .flat_map(|(_, items)| items.iter().map(|item| item.product_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let products: HashMap<Uuid, product::Model> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            Product::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        // Returning customers are emails already seen before the window.
        let prior_customers: HashSet<String> = Order::find()
            .filter(order::Column::CreatedAt.lt(start))
            .filter(order::Column::Email.ne(""))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|o| o.email)
            .collect();

        Ok(aggregate(&orders, &products, &prior_customers))
    }
}

/// Revenue proration factor for one order. The order-level discount (and any
/// shipping/tax spread) is distributed across items pro-rata by their share
/// of the pre-discount subtotal.
fn discount_ratio(total: Decimal, subtotal: Decimal) -> Decimal {
    if subtotal.is_zero() {
        Decimal::ONE
    } else {
        total / subtotal
    }
}

/// Customer identity for uniqueness counting. Every emailless order gets a
/// synthetic key of its own, so each one counts as a distinct new customer.
fn customer_key(order: &order::Model) -> String {
    if order.email.is_empty() {
        format!("{}:{}", order.name, order.id)
    } else {
        order.email.clone()
    }
}

fn aggregate(
    orders: &[(order::Model, Vec<order_item::Model>)],
    products: &HashMap<Uuid, product::Model>,
    prior_customers: &HashSet<String>,
) -> SalesReport {
    struct ProductAcc {
        name: String,
        quantity: i64,
        revenue: Decimal,
        cost: Decimal,
    }
    #[derive(Default)]
    struct AttributeAcc {
        quantity: i64,
        revenue: Decimal,
        orders: u64,
    }

    let mut by_product: HashMap<Uuid, ProductAcc> = HashMap::new();
    let mut by_color: BTreeMap<String, AttributeAcc> = BTreeMap::new();
    let mut by_size: BTreeMap<String, AttributeAcc> = BTreeMap::new();
    let mut by_day: BTreeMap<NaiveDate, (Decimal, u64)> = BTreeMap::new();
    let mut by_location: BTreeMap<String, (Decimal, u64)> = BTreeMap::new();
    let mut customers: HashSet<String> = HashSet::new();
    let mut new_customers: u64 = 0;
    let mut total_cost = Decimal::ZERO;
    let mut total_revenue = Decimal::ZERO;

    for (order_model, items) in orders {
        let ratio = discount_ratio(order_model.total, order_model.subtotal);
        let mut colors_in_order: HashSet<&str> = HashSet::new();
        let mut sizes_in_order: HashSet<&str> = HashSet::new();

        for item in items {
            let quantity = Decimal::from(item.quantity);
            let revenue = item.price_at_purchase * quantity * ratio;
            // Cost basis is never discounted.
            let cost = products
                .get(&item.product_id)
                .map(|p| (p.cost_price + p.shipping_cost) * quantity)
                .unwrap_or(Decimal::ZERO);
            total_cost += cost;

            let acc = by_product
                .entry(item.product_id)
                .or_insert_with(|| ProductAcc {
                    name: item.product_name.clone(),
                    quantity: 0,
                    revenue: Decimal::ZERO,
                    cost: Decimal::ZERO,
                });
            acc.quantity += i64::from(item.quantity);
            acc.revenue += revenue;
            acc.cost += cost;

            if let Some(color) = item.color.as_deref().filter(|c| !c.is_empty()) {
                let acc = by_color.entry(color.to_string()).or_default();
                acc.quantity += i64::from(item.quantity);
                acc.revenue += revenue;
                colors_in_order.insert(color);
            }
            if let Some(size) = item.size.as_deref().filter(|s| !s.is_empty()) {
                let acc = by_size.entry(size.to_string()).or_default();
                acc.quantity += i64::from(item.quantity);
                acc.revenue += revenue;
                sizes_in_order.insert(size);
            }
        }

        // One per order, however many matching line items it has.
        for color in colors_in_order {
            if let Some(acc) = by_color.get_mut(color) {
                acc.orders += 1;
            }
        }
        for size in sizes_in_order {
            if let Some(acc) = by_size.get_mut(size) {
                acc.orders += 1;
            }
        }

        total_revenue += order_model.total;

        let day = order_model.created_at.date_naive();
        let entry = by_day.entry(day).or_insert((Decimal::ZERO, 0));
        entry.0 += order_model.total;
        entry.1 += 1;

        let location = OrderAddress::parse(&order_model.address).location_label();
        let entry = by_location.entry(location).or_insert((Decimal::ZERO, 0));
        entry.0 += order_model.total;
        entry.1 += 1;

        let key = customer_key(order_model);
        if customers.insert(key.clone()) && !prior_customers.contains(&key) {
            new_customers += 1;
        }
    }

    let mut product_sales: Vec<ProductSales> = by_product
        .into_iter()
        .map(|(product_id, acc)| ProductSales {
            product_id,
            name: acc.name,
            quantity: acc.quantity,
            revenue: acc.revenue.round_dp(2),
            cost: acc.cost.round_dp(2),
            profit: (acc.revenue - acc.cost).round_dp(2),
        })
        .collect();
    product_sales.sort_by(|a, b| b.revenue.cmp(&a.revenue));

    let into_attribute = |map: BTreeMap<String, AttributeAcc>| -> Vec<AttributeSales> {
        let mut out: Vec<AttributeSales> = map
            .into_iter()
            .map(|(value, acc)| AttributeSales {
                value,
                quantity: acc.quantity,
                revenue: acc.revenue.round_dp(2),
                orders: acc.orders,
            })
            .collect();
        out.sort_by(|a, b| b.revenue.cmp(&a.revenue));
        out
    };

    let total_customers = customers.len() as u64;
    SalesReport {
        total_orders: orders.len() as u64,
        total_revenue: total_revenue.round_dp(2),
        total_cost: total_cost.round_dp(2),
        total_profit: (total_revenue - total_cost).round_dp(2),
        product_sales,
        sales_by_color: into_attribute(by_color),
        sales_by_size: into_attribute(by_size),
        revenue_by_day: by_day
            .into_iter()
            .map(|(day, (revenue, orders))| DailyRevenue {
                day,
                revenue: revenue.round_dp(2),
                orders,
            })
            .collect(),
        revenue_by_location: by_location
            .into_iter()
            .map(|(location, (revenue, orders))| LocationRevenue {
                location,
                revenue: revenue.round_dp(2),
                orders,
            })
            .collect(),
        customers: CustomerSummary {
            total: total_customers,
            new: new_customers,
            returning: total_customers - new_customers,
        },
    }
}
