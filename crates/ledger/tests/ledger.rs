use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, PaginatorTrait, QueryFilter,
    Statement, prelude::*,
};

use ledger::{
    AccountKind, DepositCmd, Direction, Ledger, LedgerError, Money, Principal, Role,
    TransactionKind, TransactionListFilter, TransferCmd, TransferKind, TransferPolicy,
    WithdrawCmd, transactions,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn ledger_with_db() -> (Ledger, DatabaseConnection) {
    // A single pooled connection keeps the in-memory database shared across
    // every query and serializes concurrent transactions.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let ledger = Ledger::builder().database(db.clone()).build().await.unwrap();
    (ledger, db)
}

async fn ledger_with_policy(policy: TransferPolicy) -> (Ledger, DatabaseConnection) {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let ledger = Ledger::builder()
        .database(db.clone())
        .transfer_policy(policy)
        .build()
        .await
        .unwrap();
    (ledger, db)
}

async fn register(ledger: &Ledger, username: &str) -> Principal {
    ledger
        .register_user(
            username,
            &format!("{username}@example.com"),
            "salt$digest",
            Role::User,
            Utc::now(),
        )
        .await
        .unwrap()
}

async fn account_of_kind(ledger: &Ledger, principal: &Principal, kind: AccountKind) -> Uuid {
    ledger
        .accounts_by_owner(principal)
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.kind == kind)
        .expect("seed account missing")
        .id
}

async fn balance_of(ledger: &Ledger, principal: &Principal, account_id: Uuid) -> Money {
    ledger.account(principal, account_id).await.unwrap().balance
}

async fn row_count(db: &DatabaseConnection) -> u64 {
    transactions::Entity::find().count(db).await.unwrap()
}

#[tokio::test]
async fn register_seeds_three_funded_accounts() {
    let (ledger, db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;

    let accounts = ledger.accounts_by_owner(&alice).await.unwrap();
    assert_eq!(accounts.len(), 3);

    let expected = [
        (AccountKind::Checking, Money::new(2_500_00)),
        (AccountKind::Savings, Money::new(15_000_00)),
        (AccountKind::Business, Money::new(50_000_00)),
    ];
    for (kind, balance) in expected {
        let account = accounts.iter().find(|a| a.kind == kind).unwrap();
        assert_eq!(account.balance, balance);
    }

    // Every seed balance is backed by exactly one deposit row.
    assert_eq!(row_count(&db).await, 3);
}

#[tokio::test]
async fn register_twice_fails_username_taken() {
    let (ledger, _db) = ledger_with_db().await;
    register(&ledger, "alice").await;

    let second = ledger
        .register_user(
            "alice",
            "other@example.com",
            "salt$digest",
            Role::User,
            Utc::now(),
        )
        .await;
    assert_eq!(
        second,
        Err(LedgerError::UsernameTaken("alice".to_string()))
    );

    // Exactly one alice row exists.
    let admin = ledger
        .register_user(
            "root",
            "root@example.com",
            "salt$digest",
            Role::Admin,
            Utc::now(),
        )
        .await
        .unwrap();
    let users = ledger.list_users(&admin).await.unwrap();
    assert_eq!(users.iter().filter(|u| u.username == "alice").count(), 1);
}

#[tokio::test]
async fn deposit_increases_balance_and_appends_one_row() {
    let (ledger, db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;

    let before_rows = row_count(&db).await;
    ledger
        .deposit(
            &alice,
            DepositCmd::new(checking, Money::new(10_00), Utc::now()).note("piggy bank"),
        )
        .await
        .unwrap();

    assert_eq!(
        balance_of(&ledger, &alice, checking).await,
        Money::new(2_510_00)
    );
    assert_eq!(row_count(&db).await, before_rows + 1);
}

#[tokio::test]
async fn deposit_rejects_non_positive_amounts() {
    let (ledger, _db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;

    for cents in [0, -100] {
        let result = ledger
            .deposit(
                &alice,
                DepositCmd::new(checking, Money::new(cents), Utc::now()),
            )
            .await;
        assert_eq!(
            result,
            Err(LedgerError::InvalidAmount("amount must be > 0".to_string()))
        );
    }
}

#[tokio::test]
async fn failed_withdrawal_leaves_balance_and_log_unchanged() {
    let (ledger, db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;

    // A fresh account with a controlled balance of 100.00.
    let account = ledger
        .open_account(&alice, AccountKind::Checking, Utc::now())
        .await
        .unwrap();
    ledger
        .deposit(&alice, DepositCmd::new(account, Money::new(100_00), Utc::now()))
        .await
        .unwrap();

    let before_rows = row_count(&db).await;
    let result = ledger
        .withdraw(
            &alice,
            WithdrawCmd::new(account, Money::new(150_00), Utc::now()),
        )
        .await;
    assert_eq!(
        result,
        Err(LedgerError::InsufficientFunds(
            "balance would go negative".to_string()
        ))
    );

    assert_eq!(
        balance_of(&ledger, &alice, account).await,
        Money::new(100_00)
    );
    assert_eq!(row_count(&db).await, before_rows);
}

#[tokio::test]
async fn withdrawal_decreases_balance() {
    let (ledger, _db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;

    ledger
        .withdraw(
            &alice,
            WithdrawCmd::new(checking, Money::new(500_00), Utc::now()),
        )
        .await
        .unwrap();

    assert_eq!(
        balance_of(&ledger, &alice, checking).await,
        Money::new(2_000_00)
    );
}

#[tokio::test]
async fn transfer_moves_funds_and_writes_two_correlated_rows() {
    let (ledger, db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;
    let savings = account_of_kind(&ledger, &alice, AccountKind::Savings).await;

    let transfer_id = ledger
        .transfer(
            &alice,
            TransferCmd::new(
                checking,
                savings,
                Money::new(100_00),
                TransferKind::Internal,
                Utc::now(),
            )
            .note("rainy day"),
        )
        .await
        .unwrap();

    assert_eq!(
        balance_of(&ledger, &alice, checking).await,
        Money::new(2_400_00)
    );
    assert_eq!(
        balance_of(&ledger, &alice, savings).await,
        Money::new(15_100_00)
    );

    let rows: Vec<transactions::Model> = transactions::Entity::find()
        .filter(transactions::Column::TransferId.eq(transfer_id.to_string()))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let out = rows.iter().find(|r| r.kind == "transfer_out").unwrap();
    let r#in = rows.iter().find(|r| r.kind == "transfer_in").unwrap();
    assert_eq!(out.account_id, checking.to_string());
    assert_eq!(out.counterpart_account_id, Some(savings.to_string()));
    assert_eq!(r#in.account_id, savings.to_string());
    assert_eq!(r#in.counterpart_account_id, Some(checking.to_string()));
    assert_eq!(out.amount_minor, 100_00);
    assert_eq!(r#in.amount_minor, 100_00);
    assert_eq!(out.status, "completed");
    assert_eq!(r#in.status, "completed");
}

#[tokio::test]
async fn transfer_to_missing_account_fails_with_not_found() {
    let (ledger, db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;

    let before_rows = row_count(&db).await;
    let result = ledger
        .transfer(
            &alice,
            TransferCmd::new(
                checking,
                Uuid::new_v4(),
                Money::new(50_00),
                TransferKind::External,
                Utc::now(),
            ),
        )
        .await;
    assert_eq!(
        result,
        Err(LedgerError::NotFound("account not exists".to_string()))
    );

    assert_eq!(
        balance_of(&ledger, &alice, checking).await,
        Money::new(2_500_00)
    );
    assert_eq!(row_count(&db).await, before_rows);
}

#[tokio::test]
async fn transfer_insufficient_funds_leaves_both_balances_unchanged() {
    let (ledger, db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;
    let savings = account_of_kind(&ledger, &alice, AccountKind::Savings).await;

    let before_rows = row_count(&db).await;
    let result = ledger
        .transfer(
            &alice,
            TransferCmd::new(
                checking,
                savings,
                Money::new(9_999_99),
                TransferKind::Internal,
                Utc::now(),
            ),
        )
        .await;
    assert_eq!(
        result,
        Err(LedgerError::InsufficientFunds(
            "balance would go negative".to_string()
        ))
    );

    assert_eq!(
        balance_of(&ledger, &alice, checking).await,
        Money::new(2_500_00)
    );
    assert_eq!(
        balance_of(&ledger, &alice, savings).await,
        Money::new(15_000_00)
    );
    assert_eq!(row_count(&db).await, before_rows);
}

#[tokio::test]
async fn transfer_rejects_same_account_and_bad_amounts() {
    let (ledger, _db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;
    let savings = account_of_kind(&ledger, &alice, AccountKind::Savings).await;

    let same = ledger
        .transfer(
            &alice,
            TransferCmd::new(
                checking,
                checking,
                Money::new(10_00),
                TransferKind::Internal,
                Utc::now(),
            ),
        )
        .await;
    assert_eq!(
        same,
        Err(LedgerError::InvalidTarget(
            "from and to accounts must differ".to_string()
        ))
    );

    let zero = ledger
        .transfer(
            &alice,
            TransferCmd::new(
                checking,
                savings,
                Money::ZERO,
                TransferKind::Internal,
                Utc::now(),
            ),
        )
        .await;
    assert_eq!(
        zero,
        Err(LedgerError::InvalidAmount("amount must be > 0".to_string()))
    );
}

#[tokio::test]
async fn internal_transfer_to_other_user_is_rejected_by_default() {
    let (ledger, _db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let bob = register(&ledger, "bob").await;
    let alice_checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;
    let bob_checking = account_of_kind(&ledger, &bob, AccountKind::Checking).await;

    let internal = ledger
        .transfer(
            &alice,
            TransferCmd::new(
                alice_checking,
                bob_checking,
                Money::new(10_00),
                TransferKind::Internal,
                Utc::now(),
            ),
        )
        .await;
    assert_eq!(
        internal,
        Err(LedgerError::InvalidTarget(
            "internal transfer target must belong to the same user".to_string()
        ))
    );

    // The same pair of accounts is a valid external transfer.
    ledger
        .transfer(
            &alice,
            TransferCmd::new(
                alice_checking,
                bob_checking,
                Money::new(10_00),
                TransferKind::External,
                Utc::now(),
            ),
        )
        .await
        .unwrap();
    assert_eq!(
        balance_of(&ledger, &bob, bob_checking).await,
        Money::new(2_510_00)
    );
}

#[tokio::test]
async fn any_account_policy_allows_cross_user_internal_transfers() {
    let (ledger, _db) = ledger_with_policy(TransferPolicy::AnyAccount).await;
    let alice = register(&ledger, "alice").await;
    let bob = register(&ledger, "bob").await;
    let alice_checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;
    let bob_checking = account_of_kind(&ledger, &bob, AccountKind::Checking).await;

    ledger
        .transfer(
            &alice,
            TransferCmd::new(
                alice_checking,
                bob_checking,
                Money::new(25_00),
                TransferKind::Internal,
                Utc::now(),
            ),
        )
        .await
        .unwrap();
    assert_eq!(
        balance_of(&ledger, &bob, bob_checking).await,
        Money::new(2_525_00)
    );
}

#[tokio::test]
async fn foreign_account_operations_are_unauthorized() {
    let (ledger, _db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let bob = register(&ledger, "bob").await;
    let alice_checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;
    let bob_checking = account_of_kind(&ledger, &bob, AccountKind::Checking).await;

    let deposit = ledger
        .deposit(
            &bob,
            DepositCmd::new(alice_checking, Money::new(10_00), Utc::now()),
        )
        .await;
    assert_eq!(
        deposit,
        Err(LedgerError::Unauthorized(
            "account belongs to another user".to_string()
        ))
    );

    // Not even an admin may debit someone else's account in a transfer.
    let admin = ledger
        .register_user(
            "root",
            "root@example.com",
            "salt$digest",
            Role::Admin,
            Utc::now(),
        )
        .await
        .unwrap();
    let transfer = ledger
        .transfer(
            &admin,
            TransferCmd::new(
                alice_checking,
                bob_checking,
                Money::new(10_00),
                TransferKind::External,
                Utc::now(),
            ),
        )
        .await;
    assert_eq!(
        transfer,
        Err(LedgerError::Unauthorized(
            "account belongs to another user".to_string()
        ))
    );
}

#[tokio::test]
async fn admin_may_read_foreign_accounts_but_users_may_not() {
    let (ledger, _db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let bob = register(&ledger, "bob").await;
    let admin = ledger
        .register_user(
            "root",
            "root@example.com",
            "salt$digest",
            Role::Admin,
            Utc::now(),
        )
        .await
        .unwrap();
    let alice_checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;

    assert!(ledger.account(&admin, alice_checking).await.is_ok());
    assert_eq!(
        ledger.account(&bob, alice_checking).await,
        Err(LedgerError::Unauthorized(
            "account belongs to another user".to_string()
        ))
    );

    assert!(ledger.list_users(&admin).await.is_ok());
    assert_eq!(
        ledger.list_users(&alice).await,
        Err(LedgerError::Unauthorized("admin role required".to_string()))
    );
}

#[tokio::test]
async fn idempotent_deposit_replay_returns_the_original_row() {
    let (ledger, db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;

    let first = ledger
        .deposit(
            &alice,
            DepositCmd::new(checking, Money::new(10_00), Utc::now()).idempotency_key("dep-1"),
        )
        .await
        .unwrap();
    let replay = ledger
        .deposit(
            &alice,
            DepositCmd::new(checking, Money::new(10_00), Utc::now()).idempotency_key("dep-1"),
        )
        .await
        .unwrap();

    assert_eq!(first, replay);
    assert_eq!(
        balance_of(&ledger, &alice, checking).await,
        Money::new(2_510_00)
    );
    assert_eq!(row_count(&db).await, 4);
}

#[tokio::test]
async fn idempotent_transfer_replay_returns_the_original_correlation_id() {
    let (ledger, db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;
    let savings = account_of_kind(&ledger, &alice, AccountKind::Savings).await;

    let make_cmd = || {
        TransferCmd::new(
            checking,
            savings,
            Money::new(100_00),
            TransferKind::Internal,
            Utc::now(),
        )
        .idempotency_key("tr-1")
    };

    let first = ledger.transfer(&alice, make_cmd()).await.unwrap();
    let replay = ledger.transfer(&alice, make_cmd()).await.unwrap();

    assert_eq!(first, replay);
    assert_eq!(
        balance_of(&ledger, &alice, checking).await,
        Money::new(2_400_00)
    );
    // 3 seed rows + the single transfer pair.
    assert_eq!(row_count(&db).await, 5);
}

#[tokio::test]
async fn history_direction_filters_partition_the_log() {
    let (ledger, _db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;
    let savings = account_of_kind(&ledger, &alice, AccountKind::Savings).await;

    ledger
        .deposit(&alice, DepositCmd::new(checking, Money::new(1_00), Utc::now()))
        .await
        .unwrap();
    ledger
        .withdraw(
            &alice,
            WithdrawCmd::new(checking, Money::new(2_00), Utc::now()),
        )
        .await
        .unwrap();
    ledger
        .transfer(
            &alice,
            TransferCmd::new(
                checking,
                savings,
                Money::new(3_00),
                TransferKind::Internal,
                Utc::now(),
            ),
        )
        .await
        .unwrap();

    let list = |direction| {
        let filter = TransactionListFilter {
            direction: Some(direction),
            ..Default::default()
        };
        let ledger = &ledger;
        let alice = &alice;
        async move {
            ledger
                .list_transactions_for_account(alice, checking, 50, &filter)
                .await
                .unwrap()
        }
    };

    let debits = list(Direction::Debit).await;
    assert_eq!(debits.len(), 2);
    assert!(debits.iter().all(|tx| matches!(
        tx.kind,
        TransactionKind::Withdrawal | TransactionKind::TransferOut
    )));

    // The seed deposit, the manual deposit.
    let credits = list(Direction::Credit).await;
    assert_eq!(credits.len(), 2);
    assert!(credits.iter().all(|tx| matches!(
        tx.kind,
        TransactionKind::Deposit | TransactionKind::TransferIn
    )));

    let transfers = list(Direction::Transfer).await;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].kind, TransactionKind::TransferOut);
}

#[tokio::test]
async fn history_pages_are_newest_first_and_disjoint() {
    let (ledger, _db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;

    for cents in 1..=5 {
        ledger
            .deposit(
                &alice,
                DepositCmd::new(checking, Money::new(cents), Utc::now()),
            )
            .await
            .unwrap();
    }

    let filter = TransactionListFilter::default();
    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let (page, next) = ledger
            .list_transactions_for_account_page(
                &alice,
                checking,
                2,
                cursor.as_deref(),
                &filter,
            )
            .await
            .unwrap();
        assert!(page.len() <= 2);
        for tx in &page {
            assert!(!seen.contains(&tx.id), "page overlap on {}", tx.id);
            seen.push(tx.id);
        }
        match next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    // 5 deposits plus the seed deposit.
    assert_eq!(seen.len(), 6);
}

#[tokio::test]
async fn account_statistics_totals_follow_the_log() {
    let (ledger, _db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;
    let savings = account_of_kind(&ledger, &alice, AccountKind::Savings).await;

    ledger
        .deposit(&alice, DepositCmd::new(checking, Money::new(50_00), Utc::now()))
        .await
        .unwrap();
    ledger
        .withdraw(
            &alice,
            WithdrawCmd::new(checking, Money::new(20_00), Utc::now()),
        )
        .await
        .unwrap();
    ledger
        .transfer(
            &alice,
            TransferCmd::new(
                checking,
                savings,
                Money::new(30_00),
                TransferKind::Internal,
                Utc::now(),
            ),
        )
        .await
        .unwrap();

    let stats = ledger.account_statistics(&alice, checking).await.unwrap();
    assert_eq!(stats.balance, Money::new(2_500_00));
    // Seed deposit + manual deposit.
    assert_eq!(stats.total_credited, Money::new(2_550_00));
    // Withdrawal + transfer out.
    assert_eq!(stats.total_debited, Money::new(50_00));
}

#[tokio::test]
async fn recompute_balance_repairs_a_drifted_account() {
    let (ledger, db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;
    let checking = account_of_kind(&ledger, &alice, AccountKind::Checking).await;

    ledger
        .deposit(&alice, DepositCmd::new(checking, Money::new(1_00), Utc::now()))
        .await
        .unwrap();

    // Corrupt the denormalized balance directly.
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE accounts SET balance_minor = 0 WHERE id = ?",
        vec![checking.to_string().into()],
    ))
    .await
    .unwrap();

    let recomputed = ledger.recompute_balance(&alice, checking).await.unwrap();
    assert_eq!(recomputed, Money::new(2_501_00));
    assert_eq!(
        balance_of(&ledger, &alice, checking).await,
        Money::new(2_501_00)
    );
}

#[tokio::test]
async fn concurrent_withdrawals_never_overdraw() {
    let (ledger, _db) = ledger_with_db().await;
    let alice = register(&ledger, "alice").await;

    let account = ledger
        .open_account(&alice, AccountKind::Checking, Utc::now())
        .await
        .unwrap();
    ledger
        .deposit(
            &alice,
            DepositCmd::new(account, Money::new(300_00), Utc::now()),
        )
        .await
        .unwrap();

    let ledger = Arc::new(ledger);
    let mut tasks = Vec::new();
    for _ in 0..4 {
        let ledger = Arc::clone(&ledger);
        let alice = alice.clone();
        tasks.push(tokio::spawn(async move {
            ledger
                .withdraw(
                    &alice,
                    WithdrawCmd::new(account, Money::new(100_00), Utc::now()),
                )
                .await
        }));
    }

    let mut successes = 0;
    let mut shortfalls = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LedgerError::InsufficientFunds(_)) => shortfalls += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 3);
    assert_eq!(shortfalls, 1);
    assert_eq!(balance_of(&ledger, &alice, account).await, Money::ZERO);
}
