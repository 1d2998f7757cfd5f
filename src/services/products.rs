use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait,
    ActiveValue::Set,
    DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    entities::product,
    errors::ServiceError,
    events::{Event, EventSender},
};

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("positive_price");
        err.message = Some("productPrice must be greater than zero".into());
        Err(err)
    }
}

/// Input for creating a catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[serde(rename = "productName")]
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(rename = "productPrice")]
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[serde(rename = "productCategory")]
    #[validate(length(min = 1, message = "productCategory is required"))]
    pub category: String,
    #[serde(rename = "productDesc", default)]
    pub description: String,
    #[serde(rename = "productImage", default)]
    pub image: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// Partial update; absent fields are left alone
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[serde(rename = "productName")]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(rename = "productPrice")]
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    #[serde(rename = "productCategory")]
    #[validate(length(min = 1, message = "productCategory must not be empty"))]
    pub category: Option<String>,
    #[serde(rename = "productDesc")]
    pub description: Option<String>,
    #[serde(rename = "productImage")]
    pub image: Option<String>,
    pub available: Option<bool>,
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            price: Set(input.price),
            category: Set(input.category.trim().to_string()),
            description: Set(input.description),
            image: Set(input.image),
            available: Set(input.available),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!("Failed to create product: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!("Product {} created", model.id);
        self.event_sender
            .send_or_log(Event::ProductCreated(model.id))
            .await;
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to fetch product {}: {}", id, e);
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        product::Entity::find()
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to list products: {}", e);
                ServiceError::DatabaseError(e)
            })
    }

    /// Exact category match, ignoring case.
    #[instrument(skip(self))]
    pub async fn list_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<product::Model>, ServiceError> {
        product::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(product::Column::Category)))
                    .eq(category.trim().to_lowercase()),
            )
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to list products in {}: {}", category, e);
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let mut active = self.get_product(id).await?.into_active_model();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(category) = input.category {
            active.category = Set(category.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(image) = input.image {
            active.image = Set(Some(image));
        }
        if let Some(available) = input.available {
            active.available = Set(available);
        }

        let updated = active.update(&*self.db).await.map_err(|e| {
            error!("Failed to update product {}: {}", id, e);
            ServiceError::DatabaseError(e)
        })?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(id))
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = product::Entity::delete_by_id(id)
            .exec(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to delete product {}: {}", id, e);
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Product {} not found", id)));
        }

        info!("Product {} deleted", id);
        self.event_sender
            .send_or_log(Event::ProductDeleted(id))
            .await;
        Ok(())
    }
}
