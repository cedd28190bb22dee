//! Finance record types.
//!
//! Defines the four entity kinds kept per user and the `Record<T>`
//! envelope every stored record is returned in. Serialized field names
//! are the document keys shared by the remote store and the local
//! fallback, so a record written by either path decodes the same way.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::validation::{
    ValidationError, require_hex_color, require_icon, require_min_chars,
    require_non_negative, require_positive, require_range, require_text,
};

/// Opaque record identifier assigned by whichever store persisted it.
pub type RecordId = String;

// ────────────────────────────────────────────
// Entity kinds and query ordering
// ────────────────────────────────────────────

/// The four record collections kept under each user namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Transactions,
    Accounts,
    Subscriptions,
    Categories,
}

impl EntityKind {
    pub const ALL: [Self; 4] = [
        Self::Transactions,
        Self::Accounts,
        Self::Subscriptions,
        Self::Categories,
    ];

    /// Collection name, used both as the remote path segment and the
    /// local fallback key.
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Accounts => "accounts",
            Self::Subscriptions => "subscriptions",
            Self::Categories => "categories",
        }
    }

    /// Ordering applied to remote `list` and `watch` queries.
    ///
    /// Transactions sort newest date first, categories alphabetically.
    /// Accounts and subscriptions come back in store order.
    pub const fn sort_order(self) -> Option<SortOrder> {
        match self {
            Self::Transactions => Some(SortOrder::descending("data")),
            Self::Categories => Some(SortOrder::ascending("name")),
            Self::Accounts | Self::Subscriptions => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.collection().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown entity kind `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Single-field ordering for collection queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    /// Document key to order by.
    pub field: &'static str,
    pub direction: Direction,
}

impl SortOrder {
    pub const fn ascending(field: &'static str) -> Self {
        Self { field, direction: Direction::Ascending }
    }

    pub const fn descending(field: &'static str) -> Self {
        Self { field, direction: Direction::Descending }
    }
}

// ────────────────────────────────────────────
// Field enums
// ────────────────────────────────────────────

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "Receita", alias = "receita")]
    Income,
    #[serde(rename = "Despesa", alias = "despesa")]
    Expense,
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "receita" | "income" => Ok(Self::Income),
            "despesa" | "expense" => Ok(Self::Expense),
            other => Err(format!("unknown transaction kind `{other}`")),
        }
    }
}

/// Settlement state of a transaction. New transactions default to pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[serde(rename = "pago")]
    Paid,
    #[default]
    #[serde(rename = "pendente")]
    Pending,
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pago" | "paid" => Ok(Self::Paid),
            "pendente" | "pending" => Ok(Self::Pending),
            other => Err(format!("unknown transaction status `{other}`")),
        }
    }
}

/// Billing cadence of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "Mensal", alias = "mensal")]
    Monthly,
    #[serde(rename = "Anual", alias = "anual")]
    Yearly,
    #[serde(rename = "Semanal", alias = "semanal")]
    Weekly,
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mensal" | "monthly" => Ok(Self::Monthly),
            "anual" | "yearly" => Ok(Self::Yearly),
            "semanal" | "weekly" => Ok(Self::Weekly),
            other => Err(format!("unknown frequency `{other}`")),
        }
    }
}

/// Whether a category groups income or expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryType {
    #[serde(rename = "receita")]
    Income,
    #[serde(rename = "despesa")]
    Expense,
}

impl CategoryType {
    /// Swatch preselected by the category form for this type.
    pub const fn default_color(self) -> &'static str {
        match self {
            Self::Income => "#10b981",
            Self::Expense => "#ef4444",
        }
    }
}

impl FromStr for CategoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "receita" | "income" => Ok(Self::Income),
            "despesa" | "expense" => Ok(Self::Expense),
            other => Err(format!("unknown category type `{other}`")),
        }
    }
}

// ────────────────────────────────────────────
// Entities
// ────────────────────────────────────────────

/// A storable record body.
///
/// `validate` is pure and runs before any I/O; the facade relies on it
/// to reject drafts without touching either store.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn validate(&self) -> Result<(), ValidationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "tipo")]
    pub kind: TransactionKind,
    #[serde(rename = "valor")]
    pub amount: Decimal,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "conta")]
    pub account: String,
    #[serde(default)]
    pub status: TransactionStatus,
}

impl Entity for Transaction {
    const KIND: EntityKind = EntityKind::Transactions;

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("descricao", &self.description)?;
        require_text("categoria", &self.category)?;
        require_text("conta", &self.account)?;
        require_positive("valor", self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: String,
    /// Opening balance; absent when the user left it blank.
    #[serde(default)]
    pub balance: Option<Decimal>,
}

impl Entity for Account {
    const KIND: EntityKind = EntityKind::Accounts;

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("type", &self.account_type)?;
        require_non_negative("balance", self.balance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub name: String,
    pub amount: Decimal,
    pub frequency: Frequency,
    /// Day of month the charge falls due (1–31).
    #[serde(rename = "dueDay")]
    pub due_day: u8,
    pub category: String,
}

impl Entity for Subscription {
    const KIND: EntityKind = EntityKind::Subscriptions;

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("category", &self.category)?;
        require_positive("amount", self.amount)?;
        require_range("dueDay", i64::from(self.due_day), 1, 31)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    /// Name from `domain::icons::CATALOG`.
    pub icon: String,
    /// `#RRGGBB`, either case.
    pub color: String,
}

impl Entity for Category {
    const KIND: EntityKind = EntityKind::Categories;

    fn validate(&self) -> Result<(), ValidationError> {
        require_min_chars("name", &self.name, 2)?;
        require_icon("icon", &self.icon)?;
        require_hex_color("color", &self.color)
    }
}

// ────────────────────────────────────────────
// Stored envelope
// ────────────────────────────────────────────

/// A persisted record with its store-assigned identity and timestamps.
///
/// Remote records carry the server's `createdAt`; fallback records carry
/// the client clock at the time of the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<T> {
    pub id: RecordId,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub data: T,
}
