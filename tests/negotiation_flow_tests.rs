//! End-to-end tests for the RFQ -> quote -> contract pipeline

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use uuid::Uuid;

    use tradelink_server::contract::{
        BulkUpdateStatusRequest, ContractService, ContractStatus, UpdateContractStatusRequest,
    };
    use tradelink_server::middleware::AuthenticatedUser;
    use tradelink_server::models::UserRole;
    use tradelink_server::quote::{
        AcceptQuoteRequest, CreateQuoteRequest, QuoteItemInput, QuoteService, QuoteStatus,
    };
    use tradelink_server::rfq::{CreateRfqRequest, RfqAction, RfqService, RfqStatus};

    /// Helper to create a test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/tradelink_test".to_string());

        sqlx::postgres::PgPoolOptions::new()
            .max_connections(4)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database")
    }

    /// Seed a user row and return the matching principal
    async fn seed_user(pool: &PgPool, role: UserRole) -> AuthenticatedUser {
        let user_id = Uuid::new_v4();
        let company_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, avatar_url, company_id, role, suspended)
            VALUES ($1, $2, $3, NULL, $4, $5, FALSE)
            "#,
        )
        .bind(user_id)
        .bind(format!("{}@test.example", user_id))
        .bind(format!("user-{}", &user_id.to_string()[..8]))
        .bind(company_id)
        .bind(role)
        .execute(pool)
        .await
        .expect("Failed to seed user");

        AuthenticatedUser {
            user_id,
            company_id,
            role,
        }
    }

    /// Seed an active product owned by the seller
    async fn seed_product(pool: &PgPool, seller_id: Uuid) -> Uuid {
        let product_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, name, sku, is_active)
            VALUES ($1, $2, $3, NULL, TRUE)
            "#,
        )
        .bind(product_id)
        .bind(seller_id)
        .bind(format!("product-{}", &product_id.to_string()[..8]))
        .execute(pool)
        .await
        .expect("Failed to seed product");

        product_id
    }

    fn accept_request() -> AcceptQuoteRequest {
        AcceptQuoteRequest {
            currency: "EUR".to_string(),
            shipping_address: "12 Harbour Way, Rotterdam".to_string(),
            billing_address: "12 Harbour Way, Rotterdam".to_string(),
            terms_and_conditions:
                "Standard purchase terms: net 30, delivery DAP, disputes settled in Rotterdam."
                    .to_string(),
            estimated_delivery: None,
            metadata: None,
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_full_negotiation_scenario() {
        let pool = setup_test_db().await;

        let buyer = seed_user(&pool, UserRole::Buyer).await;
        let seller = seed_user(&pool, UserRole::Seller).await;
        let product_id = seed_product(&pool, seller.user_id).await;

        let rfq_service = RfqService::new(pool.clone());
        let quote_service = QuoteService::new(pool.clone());

        // Buyer creates the RFQ
        let (rfq, _) = rfq_service
            .create_rfq(
                &buyer,
                CreateRfqRequest {
                    seller_id: seller.user_id,
                    product_id,
                    quantity: 10,
                    shipping_country: "NL".to_string(),
                    shipping_address: "12 Harbour Way, Rotterdam".to_string(),
                    message: Some("Looking for a bulk price".to_string()),
                },
            )
            .await
            .expect("RFQ creation should succeed");
        assert_eq!(rfq.status, RfqStatus::Pending);

        // Seller opens it
        let (rfq, _) = rfq_service
            .apply_seller_action(&seller, rfq.id, RfqAction::MarkSeen)
            .await
            .expect("markSeen should succeed");
        assert_eq!(rfq.status, RfqStatus::Seen);

        // Seller quotes: 10 x 12.50
        let (quote, _) = quote_service
            .create_quote(
                &seller,
                CreateQuoteRequest {
                    rfq_id: Some(rfq.id),
                    conversation_id: None,
                    items: vec![QuoteItemInput {
                        product_id,
                        quantity: 10,
                        unit_price_cents: 1250,
                    }],
                },
            )
            .await
            .expect("Quote creation should succeed");
        assert_eq!(quote.quote.status, QuoteStatus::Sent);
        assert_eq!(quote.total_cents, 12500);

        let rfq = rfq_service
            .get_rfq(&seller, rfq.id)
            .await
            .expect("RFQ fetch should succeed");
        assert_eq!(rfq.status, RfqStatus::Quoted);

        // Buyer accepts; the contract freezes the quote total
        let (contract, _) = quote_service
            .accept_quote(&buyer, quote.quote.id, accept_request())
            .await
            .expect("Accept should succeed");
        assert_eq!(contract.status, ContractStatus::PendingApproval);
        assert_eq!(contract.total_amount_cents, 12500);
        assert_eq!(contract.quote_id, quote.quote.id);
        assert!(contract.conversation_id.is_some());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_accept_creates_one_contract() {
        let pool = setup_test_db().await;

        let buyer = seed_user(&pool, UserRole::Buyer).await;
        let seller = seed_user(&pool, UserRole::Seller).await;
        let product_id = seed_product(&pool, seller.user_id).await;

        let rfq_service = RfqService::new(pool.clone());
        let quote_service = QuoteService::new(pool.clone());

        let (rfq, _) = rfq_service
            .create_rfq(
                &buyer,
                CreateRfqRequest {
                    seller_id: seller.user_id,
                    product_id,
                    quantity: 5,
                    shipping_country: "NL".to_string(),
                    shipping_address: "12 Harbour Way, Rotterdam".to_string(),
                    message: None,
                },
            )
            .await
            .unwrap();

        let (quote, _) = quote_service
            .create_quote(
                &seller,
                CreateQuoteRequest {
                    rfq_id: Some(rfq.id),
                    conversation_id: None,
                    items: vec![QuoteItemInput {
                        product_id,
                        quantity: 5,
                        unit_price_cents: 2000,
                    }],
                },
            )
            .await
            .unwrap();

        // Two simultaneous accepts: exactly one wins
        let (a, b) = tokio::join!(
            quote_service.accept_quote(&buyer, quote.quote.id, accept_request()),
            quote_service.accept_quote(&buyer, quote.quote.id, accept_request()),
        );

        assert!(
            a.is_ok() != b.is_ok(),
            "exactly one accept must win (a: {:?}, b: {:?})",
            a.is_ok(),
            b.is_ok()
        );

        let contracts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM contracts WHERE quote_id = $1")
                .bind(quote.quote.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(contracts, 1, "exactly one contract per accepted quote");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_delivered_and_paid_requires_transaction_id() {
        let pool = setup_test_db().await;

        let buyer = seed_user(&pool, UserRole::Buyer).await;
        let seller = seed_user(&pool, UserRole::Seller).await;
        let product_id = seed_product(&pool, seller.user_id).await;

        let rfq_service = RfqService::new(pool.clone());
        let quote_service = QuoteService::new(pool.clone());
        let contract_service = ContractService::new(pool.clone());

        let (rfq, _) = rfq_service
            .create_rfq(
                &buyer,
                CreateRfqRequest {
                    seller_id: seller.user_id,
                    product_id,
                    quantity: 1,
                    shipping_country: "NL".to_string(),
                    shipping_address: "12 Harbour Way, Rotterdam".to_string(),
                    message: None,
                },
            )
            .await
            .unwrap();

        let (quote, _) = quote_service
            .create_quote(
                &seller,
                CreateQuoteRequest {
                    rfq_id: Some(rfq.id),
                    conversation_id: None,
                    items: vec![QuoteItemInput {
                        product_id,
                        quantity: 1,
                        unit_price_cents: 9900,
                    }],
                },
            )
            .await
            .unwrap();

        let (contract, _) = quote_service
            .accept_quote(&buyer, quote.quote.id, accept_request())
            .await
            .unwrap();

        // Walk the contract up to `delivered`
        for status in [
            ContractStatus::Approved,
            ContractStatus::PendingPayment,
            ContractStatus::PendingPaymentConfirmation,
            ContractStatus::InProgress,
            ContractStatus::VerifyShipmentUrl,
            ContractStatus::Shipped,
            ContractStatus::Delivered,
        ] {
            contract_service
                .update_status(
                    &seller,
                    contract.id,
                    UpdateContractStatusRequest {
                        status,
                        seller_transaction_id: None,
                    },
                )
                .await
                .unwrap_or_else(|e| panic!("transition to {:?} failed: {}", status, e));
        }

        // Missing id
        let err = contract_service
            .update_status(
                &seller,
                contract.id,
                UpdateContractStatusRequest {
                    status: ContractStatus::DeliveredAndPaid,
                    seller_transaction_id: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        // Lowercase and too short
        let err = contract_service
            .update_status(
                &seller,
                contract.id,
                UpdateContractStatusRequest {
                    status: ContractStatus::DeliveredAndPaid,
                    seller_transaction_id: Some("abc123".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        // Valid id
        let (updated, _) = contract_service
            .update_status(
                &seller,
                contract.id,
                UpdateContractStatusRequest {
                    status: ContractStatus::DeliveredAndPaid,
                    seller_transaction_id: Some("ABC1234567".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, ContractStatus::DeliveredAndPaid);
        assert_eq!(updated.seller_transaction_id.as_deref(), Some("ABC1234567"));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_bulk_update_isolates_failures() {
        let pool = setup_test_db().await;

        let buyer = seed_user(&pool, UserRole::Buyer).await;
        let seller = seed_user(&pool, UserRole::Seller).await;
        let admin = seed_user(&pool, UserRole::Admin).await;
        let product_id = seed_product(&pool, seller.user_id).await;

        let rfq_service = RfqService::new(pool.clone());
        let quote_service = QuoteService::new(pool.clone());
        let contract_service = ContractService::new(pool.clone());

        // Two contracts, one already approved
        let mut contract_ids = Vec::new();
        for _ in 0..2 {
            let (rfq, _) = rfq_service
                .create_rfq(
                    &buyer,
                    CreateRfqRequest {
                        seller_id: seller.user_id,
                        product_id,
                        quantity: 1,
                        shipping_country: "NL".to_string(),
                        shipping_address: "12 Harbour Way, Rotterdam".to_string(),
                        message: None,
                    },
                )
                .await
                .unwrap();
            let (quote, _) = quote_service
                .create_quote(
                    &seller,
                    CreateQuoteRequest {
                        rfq_id: Some(rfq.id),
                        conversation_id: None,
                        items: vec![QuoteItemInput {
                            product_id,
                            quantity: 1,
                            unit_price_cents: 100,
                        }],
                    },
                )
                .await
                .unwrap();
            let (contract, _) = quote_service
                .accept_quote(&buyer, quote.quote.id, accept_request())
                .await
                .unwrap();
            contract_ids.push(contract.id);
        }

        contract_service
            .update_status(
                &seller,
                contract_ids[1],
                UpdateContractStatusRequest {
                    status: ContractStatus::Approved,
                    seller_transaction_id: None,
                },
            )
            .await
            .unwrap();

        // Bulk-approve both: the pending one succeeds, the approved one
        // fails its single-step validation, and neither affects the other
        let (outcomes, _) = contract_service
            .bulk_update_status(
                &admin,
                BulkUpdateStatusRequest {
                    contract_ids: contract_ids.clone(),
                    status: ContractStatus::Approved,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert_eq!(
            outcomes[1].error_code.as_deref(),
            Some("INVALID_TRANSITION")
        );

        let status: ContractStatus =
            sqlx::query_scalar("SELECT status FROM contracts WHERE id = $1")
                .bind(contract_ids[0])
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, ContractStatus::Approved);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_terminal_rfq_refuses_seller_actions() {
        let pool = setup_test_db().await;

        let buyer = seed_user(&pool, UserRole::Buyer).await;
        let seller = seed_user(&pool, UserRole::Seller).await;
        let product_id = seed_product(&pool, seller.user_id).await;

        let rfq_service = RfqService::new(pool.clone());

        let (rfq, _) = rfq_service
            .create_rfq(
                &buyer,
                CreateRfqRequest {
                    seller_id: seller.user_id,
                    product_id,
                    quantity: 3,
                    shipping_country: "NL".to_string(),
                    shipping_address: "12 Harbour Way, Rotterdam".to_string(),
                    message: None,
                },
            )
            .await
            .unwrap();

        rfq_service
            .apply_seller_action(&seller, rfq.id, RfqAction::Reject)
            .await
            .unwrap();

        let err = rfq_service
            .apply_seller_action(&seller, rfq.id, RfqAction::MarkSeen)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");

        let err = rfq_service
            .apply_seller_action(&seller, rfq.id, RfqAction::MarkInProgress)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_quote_request_validation() {
        let request = CreateQuoteRequest {
            rfq_id: None,
            conversation_id: None,
            items: vec![QuoteItemInput {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price_cents: 100,
            }],
        };
        assert!(request.validate().is_err(), "origin context is required");

        let request = CreateQuoteRequest {
            rfq_id: Some(Uuid::new_v4()),
            conversation_id: None,
            items: vec![],
        };
        assert!(request.validate().is_err(), "items are required");
    }

    #[test]
    fn test_accept_request_validation() {
        let mut request = accept_request();
        assert!(validator::Validate::validate(&request).is_ok());

        request.terms_and_conditions = "too short".to_string();
        assert!(validator::Validate::validate(&request).is_err());
    }
}
