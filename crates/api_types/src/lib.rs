use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RegisterUser {
        pub username: String,
        pub email: String,
        pub password: String,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Role {
        User,
        Admin,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub id: String,
        pub username: String,
        pub email: String,
        pub role: Role,
        pub created_at: DateTime<FixedOffset>,
    }

    /// Response body for the admin user listing.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct UsersResponse {
        pub users: Vec<UserView>,
    }
}

pub mod account {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AccountKind {
        Checking,
        Savings,
        Business,
    }

    /// Request body for opening an additional account.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub kind: AccountKind,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: Uuid,
        pub kind: AccountKind,
        /// Balance in minor units (cents).
        pub balance_minor: i64,
        pub created_at: DateTime<FixedOffset>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountCreated {
        pub id: Uuid,
    }

    /// Response body for the dashboard account listing.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountsResponse {
        pub accounts: Vec<AccountView>,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Deposit,
        Withdrawal,
        TransferOut,
        TransferIn,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionStatus {
        Pending,
        Completed,
        Failed,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransferKind {
        Internal,
        External,
    }

    /// Request body for a deposit or a withdrawal.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MovementNew {
        /// Amount in minor units (cents); must be positive.
        pub amount_minor: i64,
        pub note: Option<String>,
        pub idempotency_key: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferNew {
        pub from_account_id: Uuid,
        pub to_account_id: Uuid,
        /// Amount in minor units (cents); must be positive.
        pub amount_minor: i64,
        pub kind: TransferKind,
        pub note: Option<String>,
        pub idempotency_key: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferCreated {
        /// Correlation id shared by the two rows of the transfer.
        pub transfer_id: Uuid,
    }

    /// Query parameters of the history endpoint.
    ///
    /// `type` carries the history-page filter vocabulary
    /// (`debit|credit|transfer`).
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct HistoryParams {
        #[serde(rename = "type")]
        pub direction: Option<String>,
        pub limit: Option<u64>,
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub kind: TransactionKind,
        pub status: TransactionStatus,
        pub amount_minor: i64,
        pub counterpart_account_id: Option<Uuid>,
        pub transfer_id: Option<Uuid>,
        pub note: Option<String>,
        pub created_at: DateTime<FixedOffset>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<TransactionView>,
        pub next_cursor: Option<String>,
    }
}

pub mod stats {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Statistic {
        pub balance_minor: i64,
        pub total_credited_minor: i64,
        pub total_debited_minor: i64,
    }
}

pub mod register {
    use super::*;

    /// Response body of a successful registration: the fresh principal plus
    /// its seeded accounts.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct RegisterResponse {
        pub user_id: String,
        pub accounts: Vec<super::account::AccountView>,
    }
}
