use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    /// Catalog reference from the cart; not a live join
    pub product_id: String,
    /// Name at checkout time, kept even if the catalog entry changes
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub status: LineItemStatus,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Fulfilment stage of one line item.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LineItemStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "succeeded")]
    Succeeded,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl LineItemStatus {
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// The only status an admin may move this line to, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Processing),
            Self::Processing => Some(Self::Succeeded),
            Self::Succeeded => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(Utc::now());
            }
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_chain_ends_at_delivered() {
        let mut status = LineItemStatus::Pending;
        let mut visited = vec![status];
        while let Some(next) = status.next() {
            visited.push(next);
            status = next;
        }
        assert_eq!(
            visited,
            vec![
                LineItemStatus::Pending,
                LineItemStatus::Processing,
                LineItemStatus::Succeeded,
                LineItemStatus::Delivered,
            ]
        );
        assert_eq!(LineItemStatus::Cancelled.next(), None);
    }

    #[test]
    fn parses_known_values_and_rejects_legacy_truthy() {
        assert_eq!("Processing".parse::<LineItemStatus>(), Ok(LineItemStatus::Processing));
        assert!("true".parse::<LineItemStatus>().is_err());
        assert_eq!(LineItemStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(LineItemStatus::Delivered.as_str(), "delivered");
    }
}
