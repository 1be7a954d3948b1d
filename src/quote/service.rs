//! Quote service layer - creation, item updates, and the accept path
//!
//! Accepting a quote is the pivot of the negotiation pipeline: the status
//! flip, the contract insert, and the RFQ nudge commit in one transaction,
//! and the status flip is conditional on the quote still being `sent`, so
//! two concurrent accepts produce exactly one contract.

use serde_json::json;
use sqlx::types::chrono::Utc;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use crate::chat::{insert_message_tx, message_sent_events, Conversation, MessageKind};
use crate::contract::{create_for_quote_tx, Contract, NewContract};
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::models::{UserRole, UserSummary};
use crate::rfq::{self, Rfq, RfqAction, RfqTransition};
use crate::websocket::{Channel, OutboundEvent};

use super::model::{
    total_cents, AcceptQuoteRequest, CreateQuoteRequest, ListQuotesQuery, Quote, QuoteItem,
    QuoteStatus, QuoteWithItems, UpdateQuoteRequest,
};

/// Quote service for the negotiation pipeline
pub struct QuoteService {
    db: PgPool,
}

impl QuoteService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a quote from an RFQ or a conversation
    pub async fn create_quote(
        &self,
        actor: &AuthenticatedUser,
        request: CreateQuoteRequest,
    ) -> ApiResult<(QuoteWithItems, Vec<OutboundEvent>)> {
        request
            .validate()
            .map_err(ApiError::ValidationError)?;

        if actor.role != UserRole::Seller {
            return Err(ApiError::Forbidden(
                "Only sellers may create quotes".to_string(),
            ));
        }

        let product_ids: Vec<Uuid> = request.items.iter().map(|i| i.product_id).collect();
        self.check_products(actor.user_id, &product_ids).await?;

        // Resolve the originating context and the buyer it names
        let mut rfq: Option<Rfq> = None;
        let mut conversation: Option<Conversation> = None;

        let buyer_id = if let Some(rfq_id) = request.rfq_id {
            let loaded = sqlx::query_as::<_, Rfq>("SELECT * FROM rfqs WHERE id = $1")
                .bind(rfq_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("RFQ {} not found", rfq_id)))?;

            if loaded.seller_id != actor.user_id {
                return Err(ApiError::Forbidden(
                    "Only the RFQ's seller may quote it".to_string(),
                ));
            }
            // Fail early if the RFQ can no longer take quotes
            rfq::transition(loaded.status, RfqAction::RecordQuote)?;

            let buyer = loaded.buyer_id;
            rfq = Some(loaded);
            buyer
        } else {
            let conversation_id = request.conversation_id.expect("validated");
            let loaded =
                sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
                    .bind(conversation_id)
                    .fetch_optional(&self.db)
                    .await?
                    .ok_or_else(|| {
                        ApiError::NotFound(format!("Conversation {} not found", conversation_id))
                    })?;

            if loaded.seller_id != actor.user_id {
                return Err(ApiError::Forbidden(
                    "Quotes are sent from the seller side of a conversation".to_string(),
                ));
            }
            if !loaded.is_active {
                return Err(ApiError::ValidationError(
                    "Conversation is no longer active".to_string(),
                ));
            }

            let buyer = loaded.buyer_id;
            conversation = Some(loaded);
            buyer
        };

        let mut tx = self.db.begin().await?;
        let now = Utc::now();

        let quote = sqlx::query_as::<_, Quote>(
            r#"
            INSERT INTO quotes (
                id, rfq_id, conversation_id, seller_id, buyer_id, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.rfq_id)
        .bind(request.conversation_id)
        .bind(actor.user_id)
        .bind(buyer_id)
        .bind(QuoteStatus::Sent)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for input in &request.items {
            let item = sqlx::query_as::<_, QuoteItem>(
                r#"
                INSERT INTO quote_items (id, quote_id, product_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(quote.id)
            .bind(input.product_id)
            .bind(input.quantity)
            .bind(input.unit_price_cents)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        let mut events = Vec::new();

        // RFQ-originated quotes mark the RFQ quoted in the same commit
        if let Some(rfq) = &rfq {
            if let RfqTransition::Applied(next) =
                rfq::transition(rfq.status, RfqAction::RecordQuote)?
            {
                let applied = sqlx::query(
                    "UPDATE rfqs SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
                )
                .bind(next)
                .bind(now)
                .bind(rfq.id)
                .bind(rfq.status)
                .execute(&mut *tx)
                .await?;

                if applied.rows_affected() == 0 {
                    return Err(ApiError::Conflict(
                        "RFQ was modified by a concurrent request".to_string(),
                    ));
                }

                events.push(OutboundEvent::new(
                    Channel::UserNotifications(rfq.buyer_id),
                    "rfq.updated",
                    json!({ "rfq_id": rfq.id, "status": next }),
                ));
            }
        }

        // Conversation-originated quotes land in the thread as a message
        if let Some(conversation) = &conversation {
            let total = total_cents(&items);
            let message = insert_message_tx(
                &mut tx,
                conversation,
                actor.user_id,
                &format!("Quote {} sent ({} cents total)", quote.id, total),
                MessageKind::Quote,
            )
            .await?;
            events.extend(message_sent_events(conversation, &message));
        }

        tx.commit().await?;

        let with_items = QuoteWithItems::new(quote, items);

        tracing::info!(
            quote_id = %with_items.quote.id,
            seller = %with_items.quote.seller_id,
            buyer = %with_items.quote.buyer_id,
            total_cents = with_items.total_cents,
            "Quote created"
        );

        events.push(OutboundEvent::new(
            Channel::UserNotifications(with_items.quote.buyer_id),
            "quote.received",
            json!({
                "quote_id": with_items.quote.id,
                "rfq_id": with_items.quote.rfq_id,
                "conversation_id": with_items.quote.conversation_id,
                "total_cents": with_items.total_cents,
            }),
        ));

        Ok((with_items, events))
    }

    /// Get a quote with its items; only its parties and admins may read it
    pub async fn get_quote(&self, actor: &AuthenticatedUser, id: Uuid) -> ApiResult<QuoteWithItems> {
        let quote = self.load_quote(id).await?;

        if !actor.is_admin() && quote.seller_id != actor.user_id && quote.buyer_id != actor.user_id
        {
            return Err(ApiError::Forbidden(
                "Not a party to this quote".to_string(),
            ));
        }

        let items = self.load_items(id).await?;
        Ok(QuoteWithItems::new(quote, items))
    }

    /// List quotes scoped to the caller's side
    pub async fn list_quotes(
        &self,
        actor: &AuthenticatedUser,
        query: ListQuotesQuery,
    ) -> ApiResult<Vec<QuoteWithItems>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM quotes WHERE 1=1");

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
        if let Some(rfq_id) = query.rfq_id {
            query_builder.push(" AND rfq_id = ");
            query_builder.push_bind(rfq_id);
        }

        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(limit as i64);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset as i64);

        let quotes = query_builder
            .build_query_as::<Quote>()
            .fetch_all(&self.db)
            .await?;

        let mut result = Vec::with_capacity(quotes.len());
        for quote in quotes {
            let items = self.load_items(quote.id).await?;
            result.push(QuoteWithItems::new(quote, items));
        }

        Ok(result)
    }

    /// Replace or merge a quote's items. Only the seller may update, and
    /// only while the quote is still `sent`.
    pub async fn update_quote(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        request: UpdateQuoteRequest,
    ) -> ApiResult<(QuoteWithItems, Vec<OutboundEvent>)> {
        request
            .validate()
            .map_err(ApiError::ValidationError)?;

        let quote = self.load_quote(id).await?;

        if quote.seller_id != actor.user_id {
            return Err(ApiError::Forbidden(
                "Only the quote's seller may update it".to_string(),
            ));
        }
        if quote.status != QuoteStatus::Sent {
            return Err(ApiError::InvalidTransition(format!(
                "cannot update a quote in status '{}'",
                quote.status.as_str()
            )));
        }

        // Any product being introduced must belong to the seller
        let introduced: Vec<Uuid> = request
            .items
            .iter()
            .filter_map(|item| item.product_id)
            .collect();
        if !introduced.is_empty() {
            self.check_products(actor.user_id, &introduced).await?;
        }

        let mut tx = self.db.begin().await?;

        if request.replace {
            sqlx::query("DELETE FROM quote_items WHERE quote_id = $1")
                .bind(quote.id)
                .execute(&mut *tx)
                .await?;
        }

        for item in &request.items {
            match (item.id, request.replace) {
                (Some(item_id), false) => {
                    let updated = sqlx::query(
                        r#"
                        UPDATE quote_items
                        SET product_id = COALESCE($1, product_id),
                            quantity = COALESCE($2, quantity),
                            unit_price_cents = COALESCE($3, unit_price_cents)
                        WHERE id = $4 AND quote_id = $5
                        "#,
                    )
                    .bind(item.product_id)
                    .bind(item.quantity)
                    .bind(item.unit_price_cents)
                    .bind(item_id)
                    .bind(quote.id)
                    .execute(&mut *tx)
                    .await?;

                    if updated.rows_affected() == 0 {
                        return Err(ApiError::ValidationError(format!(
                            "Item {} does not belong to this quote",
                            item_id
                        )));
                    }
                }
                _ => {
                    sqlx::query(
                        r#"
                        INSERT INTO quote_items (id, quote_id, product_id, quantity, unit_price_cents)
                        VALUES ($1, $2, $3, $4, $5)
                        "#,
                    )
                    .bind(Uuid::new_v4())
                    .bind(quote.id)
                    .bind(item.product_id.expect("validated"))
                    .bind(item.quantity.expect("validated"))
                    .bind(item.unit_price_cents.expect("validated"))
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        let quote = sqlx::query_as::<_, Quote>(
            "UPDATE quotes SET updated_at = $1 WHERE id = $2 RETURNING *",
        )
        .bind(Utc::now())
        .bind(quote.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let items = self.load_items(quote.id).await?;
        let with_items = QuoteWithItems::new(quote, items);

        let events = vec![OutboundEvent::new(
            Channel::UserNotifications(with_items.quote.buyer_id),
            "quote.updated",
            json!({
                "quote_id": with_items.quote.id,
                "total_cents": with_items.total_cents,
            }),
        )];

        Ok((with_items, events))
    }

    /// Accept a quote and create its contract, exactly once
    pub async fn accept_quote(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        request: AcceptQuoteRequest,
    ) -> ApiResult<(Contract, Vec<OutboundEvent>)> {
        request.validate()?;

        let quote = self.load_quote(id).await?;

        if quote.buyer_id != actor.user_id {
            return Err(ApiError::Forbidden(
                "Only the quote's buyer may accept it".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        // The status flip is the authoritative accept: it only succeeds if
        // the quote is still `sent`, so a racing request loses cleanly here.
        let accepted = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET status = 'accepted', updated_at = $1
            WHERE id = $2 AND status = 'sent'
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(quote.id)
        .fetch_optional(&mut *tx)
        .await?;

        let accepted = match accepted {
            Some(quote) => quote,
            None => return Err(self.terminal_status_error(quote.id).await?),
        };

        let items = sqlx::query_as::<_, QuoteItem>(
            "SELECT * FROM quote_items WHERE quote_id = $1 ORDER BY id",
        )
        .bind(accepted.id)
        .fetch_all(&mut *tx)
        .await?;

        let total = total_cents(&items);

        let metadata = request
            .metadata
            .map(|m| serde_json::to_value(m))
            .transpose()?
            .unwrap_or_else(|| json!({}));

        let (contract, contract_conversation) = create_for_quote_tx(
            &mut tx,
            NewContract {
                quote_id: accepted.id,
                buyer_id: accepted.buyer_id,
                seller_id: accepted.seller_id,
                total_amount_cents: total,
                currency: request.currency.to_uppercase(),
                shipping_address: request.shipping_address,
                billing_address: request.billing_address,
                terms_and_conditions: request.terms_and_conditions,
                estimated_delivery: request.estimated_delivery,
                metadata,
            },
            actor.user_id,
        )
        .await?;

        // Nudge the RFQ to `quoted` if a stale status slipped through; a
        // terminally closed RFQ no longer matters once the contract exists.
        if let Some(rfq_id) = accepted.rfq_id {
            let rfq = sqlx::query_as::<_, Rfq>("SELECT * FROM rfqs WHERE id = $1")
                .bind(rfq_id)
                .fetch_optional(&mut *tx)
                .await?;

            if let Some(rfq) = rfq {
                match rfq::transition(rfq.status, RfqAction::RecordQuote) {
                    Ok(RfqTransition::Applied(next)) => {
                        sqlx::query(
                            "UPDATE rfqs SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
                        )
                        .bind(next)
                        .bind(Utc::now())
                        .bind(rfq.id)
                        .bind(rfq.status)
                        .execute(&mut *tx)
                        .await?;
                    }
                    Ok(RfqTransition::Noop) => {}
                    Err(err) => {
                        tracing::debug!(rfq_id = %rfq.id, error = %err, "Skipping RFQ nudge");
                    }
                }
            }
        }

        tx.commit().await?;

        tracing::info!(
            quote_id = %accepted.id,
            contract_id = %contract.id,
            total_cents = total,
            "Quote accepted, contract created"
        );

        let mut events = vec![
            OutboundEvent::new(
                Channel::UserNotifications(accepted.seller_id),
                "quote.accepted",
                json!({ "quote_id": accepted.id, "contract_id": contract.id }),
            ),
            OutboundEvent::new(
                Channel::UserNotifications(accepted.buyer_id),
                "contract.created",
                json!({
                    "contract_id": contract.id,
                    "contract_number": contract.contract_number,
                    "total_amount_cents": contract.total_amount_cents,
                    "status": contract.status,
                }),
            ),
            OutboundEvent::new(
                Channel::UserNotifications(accepted.seller_id),
                "contract.created",
                json!({
                    "contract_id": contract.id,
                    "contract_number": contract.contract_number,
                    "total_amount_cents": contract.total_amount_cents,
                    "status": contract.status,
                }),
            ),
        ];
        events.extend(
            self.conversation_created_events(&contract_conversation)
                .await?,
        );

        Ok((contract, events))
    }

    /// Reject a quote; terminal, buyer-only
    pub async fn reject_quote(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> ApiResult<(Quote, Vec<OutboundEvent>)> {
        let quote = self.load_quote(id).await?;

        if quote.buyer_id != actor.user_id {
            return Err(ApiError::Forbidden(
                "Only the quote's buyer may reject it".to_string(),
            ));
        }

        let rejected = sqlx::query_as::<_, Quote>(
            r#"
            UPDATE quotes
            SET status = 'rejected', updated_at = $1
            WHERE id = $2 AND status = 'sent'
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(quote.id)
        .fetch_optional(&self.db)
        .await?;

        let rejected = match rejected {
            Some(quote) => quote,
            None => return Err(self.terminal_status_error(quote.id).await?),
        };

        let events = vec![OutboundEvent::new(
            Channel::UserNotifications(rejected.seller_id),
            "quote.rejected",
            json!({ "quote_id": rejected.id }),
        )];

        Ok((rejected, events))
    }

    // ===== Helpers =====

    async fn load_quote(&self, id: Uuid) -> ApiResult<Quote> {
        sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Quote {} not found", id)))
    }

    async fn load_items(&self, quote_id: Uuid) -> ApiResult<Vec<QuoteItem>> {
        let items = sqlx::query_as::<_, QuoteItem>(
            "SELECT * FROM quote_items WHERE quote_id = $1 ORDER BY id",
        )
        .bind(quote_id)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    /// Distinguish why a `sent`-conditioned update matched no row
    async fn terminal_status_error(&self, id: Uuid) -> ApiResult<ApiError> {
        let status = sqlx::query_scalar::<_, QuoteStatus>("SELECT status FROM quotes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(match status {
            None => ApiError::NotFound(format!("Quote {} not found", id)),
            Some(QuoteStatus::Accepted) => {
                ApiError::Conflict("Quote was already accepted".to_string())
            }
            Some(QuoteStatus::Rejected) => {
                ApiError::InvalidTransition("Quote was already rejected".to_string())
            }
            // The row flipped back to sent between our update and this read;
            // report it as a lost race
            Some(QuoteStatus::Sent) => {
                ApiError::Conflict("Quote was modified by a concurrent request".to_string())
            }
        })
    }

    /// All products must exist, be active, and belong to the seller
    async fn check_products(&self, seller_id: Uuid, product_ids: &[Uuid]) -> ApiResult<()> {
        let known: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM products WHERE id = ANY($1) AND seller_id = $2 AND is_active = TRUE",
        )
        .bind(product_ids)
        .bind(seller_id)
        .fetch_all(&self.db)
        .await?;

        let known: HashSet<Uuid> = known.into_iter().collect();
        for product_id in product_ids {
            if !known.contains(product_id) {
                return Err(ApiError::ValidationError(format!(
                    "Product {} does not exist, is inactive, or belongs to another seller",
                    product_id
                )));
            }
        }

        Ok(())
    }

    /// `conversation.created` events for a contract conversation, with the
    /// participants' display fields denormalized into the payload
    async fn conversation_created_events(
        &self,
        conversation: &Conversation,
    ) -> ApiResult<Vec<OutboundEvent>> {
        let summaries = sqlx::query_as::<_, UserSummary>(
            "SELECT id, display_name, avatar_url FROM users WHERE id = ANY($1)",
        )
        .bind(vec![conversation.seller_id, conversation.buyer_id])
        .fetch_all(&self.db)
        .await?;

        let seller = summaries
            .iter()
            .find(|u| u.id == conversation.seller_id)
            .cloned()
            .ok_or_else(|| ApiError::InternalError("Missing participant row".to_string()))?;
        let buyer = summaries
            .iter()
            .find(|u| u.id == conversation.buyer_id)
            .cloned()
            .ok_or_else(|| ApiError::InternalError("Missing participant row".to_string()))?;

        let details = crate::chat::ConversationDetails {
            conversation: conversation.clone(),
            seller,
            buyer,
        };

        Ok(crate::chat::conversation_created_events(&details))
    }
}
