pub use balance::{BalanceRecord, BalanceSheet, CreditEntry, DebtEntry, compute_balances};
pub use currency::Currency;
pub use error::EngineError;
pub use expenses::Expense;
pub use group_memberships::GroupRole;
pub use groups::{Group, GroupMember};
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder, ExpenseListFilter};
pub use settlements::Settlement;
pub use splits::Split;
pub use users::UserProfile;

mod balance;
mod currency;
mod error;
mod expenses;
mod group_memberships;
mod groups;
mod money;
mod ops;
mod settlements;
mod splits;
mod users;

type ResultEngine<T> = Result<T, EngineError>;
