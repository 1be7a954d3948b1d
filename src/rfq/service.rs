//! RFQ service layer - lifecycle and listing

use serde_json::json;
use sqlx::PgPool;
use sqlx::types::chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::models::{Product, UserRole};
use crate::rfq::model::{
    transition, CreateRfqRequest, ListRfqsQuery, Rfq, RfqAction, RfqStatus, RfqTransition,
};
use crate::websocket::{Channel, OutboundEvent};

/// RFQ service for managing the request-for-quotation lifecycle
pub struct RfqService {
    db: PgPool,
}

impl RfqService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an RFQ on behalf of a buyer
    pub async fn create_rfq(
        &self,
        actor: &AuthenticatedUser,
        request: CreateRfqRequest,
    ) -> ApiResult<(Rfq, Vec<OutboundEvent>)> {
        request.validate()?;

        if actor.role != UserRole::Buyer {
            return Err(ApiError::Forbidden(
                "Only buyers may create RFQs".to_string(),
            ));
        }

        let seller_role = sqlx::query_scalar::<_, UserRole>("SELECT role FROM users WHERE id = $1")
            .bind(request.seller_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Seller not found".to_string()))?;

        if seller_role != UserRole::Seller {
            return Err(ApiError::ValidationError(
                "Target user is not a seller".to_string(),
            ));
        }

        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(request.product_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

        if product.seller_id != request.seller_id || !product.is_active {
            return Err(ApiError::ValidationError(
                "Product does not belong to the seller or is inactive".to_string(),
            ));
        }

        let rfq = sqlx::query_as::<_, Rfq>(
            r#"
            INSERT INTO rfqs (
                id, buyer_id, seller_id, initial_product_id, initial_quantity,
                shipping_country, shipping_address, buyer_message, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id)
        .bind(request.seller_id)
        .bind(request.product_id)
        .bind(request.quantity)
        .bind(&request.shipping_country)
        .bind(&request.shipping_address)
        .bind(&request.message)
        .bind(RfqStatus::Pending)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(rfq_id = %rfq.id, buyer = %rfq.buyer_id, seller = %rfq.seller_id, "RFQ created");

        let events = vec![OutboundEvent::new(
            Channel::UserNotifications(rfq.seller_id),
            "rfq.created",
            json!({
                "rfq_id": rfq.id,
                "buyer_id": rfq.buyer_id,
                "product_id": rfq.initial_product_id,
                "quantity": rfq.initial_quantity,
                "status": rfq.status,
            }),
        )];

        Ok((rfq, events))
    }

    /// Get an RFQ; only its parties and admins may read it
    pub async fn get_rfq(&self, actor: &AuthenticatedUser, id: Uuid) -> ApiResult<Rfq> {
        let rfq = sqlx::query_as::<_, Rfq>("SELECT * FROM rfqs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("RFQ {} not found", id)))?;

        if !self.can_view(actor, &rfq) {
            return Err(ApiError::Forbidden(
                "Not a party to this RFQ".to_string(),
            ));
        }

        Ok(rfq)
    }

    /// List RFQs scoped to the caller's side of the marketplace
    pub async fn list_rfqs(
        &self,
        actor: &AuthenticatedUser,
        query: ListRfqsQuery,
    ) -> ApiResult<Vec<Rfq>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM rfqs WHERE 1=1");

        match actor.role {
            UserRole::Admin => {}
            UserRole::Buyer => {
                query_builder.push(" AND buyer_id = ");
                query_builder.push_bind(actor.user_id);
            }
            UserRole::Seller => {
                query_builder.push(" AND seller_id = ");
                query_builder.push_bind(actor.user_id);
            }
        }

        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
        }

        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(limit as i64);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset as i64);

        let rfqs = query_builder
            .build_query_as::<Rfq>()
            .fetch_all(&self.db)
            .await?;

        Ok(rfqs)
    }

    /// Apply a seller-side lifecycle action (mark seen / in progress / reject)
    pub async fn apply_seller_action(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        action: RfqAction,
    ) -> ApiResult<(Rfq, Vec<OutboundEvent>)> {
        let rfq = sqlx::query_as::<_, Rfq>("SELECT * FROM rfqs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("RFQ {} not found", id)))?;

        if rfq.seller_id != actor.user_id {
            return Err(ApiError::Forbidden(
                "Only the RFQ's seller may perform this action".to_string(),
            ));
        }

        self.apply(rfq, action).await
    }

    /// Administrative close, valid from any state
    pub async fn admin_close(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> ApiResult<(Rfq, Vec<OutboundEvent>)> {
        if actor.role != UserRole::Admin {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }

        let rfq = sqlx::query_as::<_, Rfq>("SELECT * FROM rfqs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("RFQ {} not found", id)))?;

        self.apply(rfq, RfqAction::Close).await
    }

    /// Run a transition through the table and persist it with a
    /// conditional update keyed on the status the decision was made from.
    async fn apply(&self, rfq: Rfq, action: RfqAction) -> ApiResult<(Rfq, Vec<OutboundEvent>)> {
        let next = match transition(rfq.status, action)? {
            RfqTransition::Applied(next) => next,
            RfqTransition::Noop => return Ok((rfq, Vec::new())),
        };

        let updated = sqlx::query_as::<_, Rfq>(
            r#"
            UPDATE rfqs
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            RETURNING *
            "#,
        )
        .bind(next)
        .bind(Utc::now())
        .bind(rfq.id)
        .bind(rfq.status)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict("RFQ was modified by a concurrent request".to_string())
        })?;

        tracing::info!(
            rfq_id = %updated.id,
            from = rfq.status.as_str(),
            to = updated.status.as_str(),
            "RFQ transition applied"
        );

        let events = vec![
            OutboundEvent::new(
                Channel::UserNotifications(updated.buyer_id),
                "rfq.updated",
                json!({ "rfq_id": updated.id, "status": updated.status }),
            ),
            OutboundEvent::new(
                Channel::UserNotifications(updated.seller_id),
                "rfq.updated",
                json!({ "rfq_id": updated.id, "status": updated.status }),
            ),
        ];

        Ok((updated, events))
    }

    fn can_view(&self, actor: &AuthenticatedUser, rfq: &Rfq) -> bool {
        actor.is_admin() || rfq.buyer_id == actor.user_id || rfq.seller_id == actor.user_id
    }
}
