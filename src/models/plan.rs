//! Subscription plans offered in the pricing table.
//!
//! Plans are defined in code; only the processor price ids come from config.

use serde::Serialize;

use crate::config::Config;
use crate::format;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub id: &'static str,
    pub name: &'static str,
    /// Credits granted on every paid invoice
    pub monthly_credits: i64,
    pub price_cents: i64,
    pub currency: &'static str,
}

pub const PLANS: [Plan; 3] = [
    Plan {
        id: "basic",
        name: "Basic",
        monthly_credits: 300,
        price_cents: 999,
        currency: "USD",
    },
    Plan {
        id: "pro",
        name: "Pro",
        monthly_credits: 1000,
        price_cents: 2999,
        currency: "USD",
    },
    Plan {
        id: "max",
        name: "Max",
        monthly_credits: 3000,
        price_cents: 7999,
        currency: "USD",
    },
];

impl Plan {
    pub fn find(id: &str) -> Option<&'static Plan> {
        PLANS.iter().find(|p| p.id == id)
    }

    /// Processor price id configured for this plan, if any.
    pub fn price_id<'c>(&self, config: &'c Config) -> Option<&'c str> {
        let price = match self.id {
            "basic" => &config.payment_price_basic,
            "pro" => &config.payment_price_pro,
            "max" => &config.payment_price_max,
            _ => &None,
        };
        price.as_deref().filter(|p| !p.is_empty())
    }

    /// Reverse lookup used by webhooks that only carry a price id.
    pub fn from_price_id(config: &Config, price_id: &str) -> Option<&'static Plan> {
        PLANS.iter().find(|p| p.price_id(config) == Some(price_id))
    }
}

/// Response item for `GET /api/v1/plans`.
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub id: &'static str,
    pub name: &'static str,
    pub monthly_credits: i64,
    pub price_cents: i64,
    pub currency: &'static str,
    pub price_display: String,
    pub purchasable: bool,
}

impl PlanResponse {
    pub fn new(plan: &Plan, config: &Config) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            monthly_credits: plan.monthly_credits,
            price_cents: plan.price_cents,
            currency: plan.currency,
            price_display: format::format_currency(plan.price_cents, plan.currency),
            purchasable: config.payment_api_key.is_some() && plan.price_id(config).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_pairs([
            ("DATABASE_URL", "postgres://localhost/studio"),
            ("JWT_SECRET", "secret"),
            ("PAYMENT_API_KEY", "sk_test"),
            ("PAYMENT_PRICE_PRO", "price_pro_123"),
        ])
        .unwrap()
    }

    #[test]
    fn finds_plans_by_id() {
        assert_eq!(Plan::find("pro").unwrap().monthly_credits, 1000);
        assert!(Plan::find("enterprise").is_none());
    }

    #[test]
    fn price_ids_come_from_config() {
        let config = config();
        assert_eq!(
            Plan::find("pro").unwrap().price_id(&config),
            Some("price_pro_123")
        );
        assert_eq!(Plan::find("basic").unwrap().price_id(&config), None);
        assert_eq!(
            Plan::from_price_id(&config, "price_pro_123").map(|p| p.id),
            Some("pro")
        );
    }

    #[test]
    fn only_priced_plans_are_purchasable() {
        let config = config();
        let pro = PlanResponse::new(Plan::find("pro").unwrap(), &config);
        let basic = PlanResponse::new(Plan::find("basic").unwrap(), &config);
        assert!(pro.purchasable);
        assert!(!basic.purchasable);
        assert_eq!(pro.price_display, "$29.99");
    }
}
