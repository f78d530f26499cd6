use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
}

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserNew {
        pub username: String,
        pub password: String,
        pub email: String,
        pub avatar_url: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProfileUpdate {
        pub email: Option<String>,
        pub avatar_url: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub username: String,
        pub email: String,
        pub avatar_url: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserSearch {
        /// Substring to match against usernames or emails, case-insensitive.
        /// Queries shorter than 2 characters return an empty list.
        pub query: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserSearchResponse {
        pub users: Vec<UserView>,
    }
}

pub mod group {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupNew {
        pub name: String,
        pub description: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupUpdate {
        pub name: Option<String>,
        pub description: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupView {
        pub id: String,
        pub name: String,
        pub description: Option<String>,
        pub created_by: String,
        pub currency: Currency,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupListResponse {
        pub groups: Vec<GroupView>,
    }

    /// A group plus its full member roster.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupDetail {
        pub group: GroupView,
        pub members: Vec<super::membership::MemberView>,
    }
}

pub mod membership {
    use super::*;

    /// Role of a user inside a group.
    ///
    /// The server treats roles as:
    /// - `admin`: can edit the group, manage members, delete any expense.
    /// - `member`: can record expenses and settlements and read balances.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum GroupRole {
        Admin,
        Member,
    }

    impl GroupRole {
        /// Returns the canonical role string used by the engine/database.
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Admin => "admin",
                Self::Member => "member",
            }
        }
    }

    /// Request body for adding/updating a member.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberUpsert {
        pub username: String,
        pub role: GroupRole,
    }

    /// Response body for listing members.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MembersResponse {
        pub members: Vec<MemberView>,
    }

    /// A member with profile fields and their role.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub username: String,
        pub email: String,
        pub avatar_url: Option<String>,
        pub role: GroupRole,
    }
}

pub mod expense {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitNew {
        pub user_id: String,
        /// Must be >= 0; all splits must sum to the expense amount.
        pub amount_minor: i64,
        /// Marks the share as already resolved outside the ledger.
        #[serde(default)]
        pub paid: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        /// Must be > 0.
        pub amount_minor: i64,
        pub description: Option<String>,
        /// Defaults to the caller when absent.
        pub paid_by: Option<String>,
        /// RFC3339 timestamp, including timezone offset (local user time).
        pub occurred_at: DateTime<FixedOffset>,
        pub splits: Vec<SplitNew>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitView {
        pub user_id: String,
        pub amount_minor: i64,
        pub paid: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: Uuid,
        pub description: Option<String>,
        pub amount_minor: i64,
        pub currency: Currency,
        pub paid_by: String,
        pub created_by: String,
        pub occurred_at: DateTime<FixedOffset>,
        pub splits: Vec<SplitView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseList {
        pub limit: Option<u64>,
        /// Opaque pagination cursor (base64), from `next_cursor`.
        ///
        /// Newest → older pagination.
        pub cursor: Option<String>,
        pub from: Option<DateTime<FixedOffset>>,
        pub to: Option<DateTime<FixedOffset>>,
        pub paid_by: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseListResponse {
        pub expenses: Vec<ExpenseView>,
        /// Opaque cursor for fetching the next page (older items).
        pub next_cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseCreated {
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitPaidUpdate {
        pub user_id: String,
        pub paid: bool,
    }
}

pub mod settlement {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementNew {
        /// Defaults to the caller when absent.
        pub paid_by: Option<String>,
        pub received_by: String,
        /// Must be > 0.
        pub amount_minor: i64,
        pub note: Option<String>,
        /// RFC3339 timestamp, including timezone offset (local user time).
        pub occurred_at: DateTime<FixedOffset>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementView {
        pub id: Uuid,
        pub paid_by: String,
        pub received_by: String,
        pub amount_minor: i64,
        pub currency: Currency,
        pub note: Option<String>,
        pub created_by: String,
        pub occurred_at: DateTime<FixedOffset>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementList {
        pub limit: Option<u64>,
        /// Opaque pagination cursor (base64), from `next_cursor`.
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementListResponse {
        pub settlements: Vec<SettlementView>,
        /// Opaque cursor for fetching the next page (older items).
        pub next_cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementCreated {
        pub id: Uuid,
    }
}

pub mod balance {
    use std::collections::BTreeMap;

    use super::*;

    /// A directed debt in the netted ledger.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct DebtView {
        pub to: String,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CreditView {
        pub from: String,
        pub amount_minor: i64,
    }

    /// Per-member balance: net position plus who they owe and who owes
    /// them, after pairwise netting.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberBalanceView {
        pub member: super::membership::MemberView,
        pub total_balance_minor: i64,
        pub owes: Vec<DebtView>,
        pub owed_by: Vec<CreditView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalancesResponse {
        pub currency: Currency,
        pub members: Vec<MemberBalanceView>,
        /// Net balance per username, in minor units.
        pub totals: BTreeMap<String, i64>,
    }
}
