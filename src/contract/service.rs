//! Contract service layer - creation from accepted quotes and the
//! payment/shipment lifecycle

use serde_json::json;
use sqlx::types::chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::chat::{insert_message_tx, Conversation, MessageKind};
use crate::contract::model::{
    generate_contract_number, is_valid_transaction_id, transition, BulkItemOutcome,
    BulkUpdateStatusRequest, Contract, ContractStatus, ListContractsQuery, NewContract,
    UpdateContractStatusRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::models::UserRole;
use crate::websocket::{Channel, OutboundEvent};

/// Contract service for the post-acceptance lifecycle
pub struct ContractService {
    db: PgPool,
}

impl ContractService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a contract; only its parties and admins may read it
    pub async fn get_contract(&self, actor: &AuthenticatedUser, id: Uuid) -> ApiResult<Contract> {
        let contract = sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Contract {} not found", id)))?;

        if !can_view(actor, &contract) {
            return Err(ApiError::Forbidden(
                "Not a party to this contract".to_string(),
            ));
        }

        Ok(contract)
    }

    /// List contracts scoped to the caller's side; admins see all
    pub async fn list_contracts(
        &self,
        actor: &AuthenticatedUser,
        query: ListContractsQuery,
    ) -> ApiResult<Vec<Contract>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM contracts WHERE 1=1");

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

        let contracts = query_builder
            .build_query_as::<Contract>()
            .fetch_all(&self.db)
            .await?;

        Ok(contracts)
    }

    /// Apply a single-step status transition.
    ///
    /// The decision is made against the status the contract was read at
    /// and persisted with a conditional update, so a concurrent transition
    /// surfaces as a conflict instead of a silent double-apply.
    pub async fn update_status(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        request: UpdateContractStatusRequest,
    ) -> ApiResult<(Contract, Vec<OutboundEvent>)> {
        let contract = sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Contract {} not found", id)))?;

        if !can_view(actor, &contract) {
            return Err(ApiError::Forbidden(
                "Not a party to this contract".to_string(),
            ));
        }

        // Cancellation is the administrative escape hatch
        if request.status == ContractStatus::Cancelled && !actor.is_admin() {
            return Err(ApiError::Forbidden(
                "Only admins may cancel a contract".to_string(),
            ));
        }

        transition(contract.status, request.status)?;

        let transaction_id = if request.status == ContractStatus::DeliveredAndPaid {
            let id = request.seller_transaction_id.as_deref().ok_or_else(|| {
                ApiError::ValidationError(
                    "seller_transaction_id is required to mark a contract delivered and paid"
                        .to_string(),
                )
            })?;
            if !is_valid_transaction_id(id) {
                return Err(ApiError::ValidationError(
                    "seller_transaction_id must be 10-25 uppercase alphanumeric characters"
                        .to_string(),
                ));
            }
            Some(id.to_string())
        } else {
            None
        };

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query_as::<_, Contract>(
            r#"
            UPDATE contracts
            SET status = $1,
                seller_transaction_id = COALESCE($2, seller_transaction_id),
                updated_at = $3
            WHERE id = $4 AND status = $5
            RETURNING *
            "#,
        )
        .bind(request.status)
        .bind(&transaction_id)
        .bind(Utc::now())
        .bind(contract.id)
        .bind(contract.status)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict("Contract was modified by a concurrent request".to_string())
        })?;

        // Each applied transition leaves a trail in the contract thread
        if let Some(conversation_id) = updated.conversation_id {
            let conversation =
                sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
                    .bind(conversation_id)
                    .fetch_one(&mut *tx)
                    .await?;

            insert_message_tx(
                &mut tx,
                &conversation,
                actor.user_id,
                &format!(
                    "Contract {} moved to {}",
                    updated.contract_number,
                    updated.status.as_str()
                ),
                MessageKind::Contract,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            contract_id = %updated.id,
            from = contract.status.as_str(),
            to = updated.status.as_str(),
            actor = %actor.user_id,
            "Contract transition applied"
        );

        let events = contract_updated_events(&updated, actor.user_id);
        Ok((updated, events))
    }

    /// Admin bulk transition. Each contract is validated and updated
    /// independently; one row's failure never rolls back another's
    /// success.
    pub async fn bulk_update_status(
        &self,
        actor: &AuthenticatedUser,
        request: BulkUpdateStatusRequest,
    ) -> ApiResult<(Vec<BulkItemOutcome>, Vec<OutboundEvent>)> {
        if !actor.is_admin() {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }

        let mut outcomes = Vec::with_capacity(request.contract_ids.len());
        let mut events = Vec::new();

        for contract_id in request.contract_ids {
            let item = UpdateContractStatusRequest {
                status: request.status,
                seller_transaction_id: None,
            };

            match self.update_status(actor, contract_id, item).await {
                Ok((_, mut item_events)) => {
                    events.append(&mut item_events);
                    outcomes.push(BulkItemOutcome {
                        contract_id,
                        success: true,
                        error_code: None,
                        message: None,
                    });
                }
                Err(err) => outcomes.push(BulkItemOutcome {
                    contract_id,
                    success: false,
                    error_code: Some(err.error_code().to_string()),
                    message: Some(err.to_string()),
                }),
            }
        }

        Ok((outcomes, events))
    }
}

/// Create the contract for a freshly accepted quote inside the caller's
/// transaction, along with its conversation and opening message.
pub(crate) async fn create_for_quote_tx(
    conn: &mut PgConnection,
    new: NewContract,
    actor_id: Uuid,
) -> ApiResult<(Contract, Conversation)> {
    if !(50..=10000).contains(&new.terms_and_conditions.len()) {
        return Err(ApiError::ValidationError(
            "terms_and_conditions must be between 50 and 10000 characters".to_string(),
        ));
    }

    let now = Utc::now();

    if let Some(estimated) = new.estimated_delivery {
        if estimated <= now {
            return Err(ApiError::ValidationError(
                "estimated_delivery must be in the future".to_string(),
            ));
        }
    }

    let contract_number = generate_contract_number(now);

    let conversation = crate::chat::create_contract_conversation_tx(
        &mut *conn,
        new.seller_id,
        new.buyer_id,
        &contract_number,
    )
    .await?;

    let contract = sqlx::query_as::<_, Contract>(
        r#"
        INSERT INTO contracts (
            id, contract_number, quote_id, buyer_id, seller_id,
            total_amount_cents, currency, status, seller_transaction_id,
            estimated_delivery, shipping_address, billing_address,
            terms_and_conditions, metadata, conversation_id,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL, $9, $10, $11, $12, $13, $14, $15, $15)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&contract_number)
    .bind(new.quote_id)
    .bind(new.buyer_id)
    .bind(new.seller_id)
    .bind(new.total_amount_cents)
    .bind(&new.currency)
    .bind(ContractStatus::PendingApproval)
    .bind(new.estimated_delivery)
    .bind(&new.shipping_address)
    .bind(&new.billing_address)
    .bind(&new.terms_and_conditions)
    .bind(&new.metadata)
    .bind(conversation.id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match &e {
        // UNIQUE(quote_id): a concurrent accept already created the contract
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::Conflict("Quote already has a contract".to_string())
        }
        _ => ApiError::from(e),
    })?;

    insert_message_tx(
        &mut *conn,
        &conversation,
        actor_id,
        &format!(
            "Contract {} created for a total of {} {}",
            contract.contract_number, contract.total_amount_cents, contract.currency
        ),
        MessageKind::Contract,
    )
    .await?;

    Ok((contract, conversation))
}

/// Notification events for an applied contract transition
pub(crate) fn contract_updated_events(contract: &Contract, actor_id: Uuid) -> Vec<OutboundEvent> {
    let payload = json!({
        "contract_id": contract.id,
        "contract_number": contract.contract_number,
        "status": contract.status,
        "actor_id": actor_id,
    });

    vec![
        OutboundEvent::new(
            Channel::UserNotifications(contract.buyer_id),
            "contract.updated",
            payload.clone(),
        ),
        OutboundEvent::new(
            Channel::UserNotifications(contract.seller_id),
            "contract.updated",
            payload,
        ),
    ]
}

fn can_view(actor: &AuthenticatedUser, contract: &Contract) -> bool {
    actor.is_admin() || contract.buyer_id == actor.user_id || contract.seller_id == actor.user_id
}
