//! Wire types for the payments API

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Authenticated user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl User {
    /// "First Last", falling back to the username
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Body of `POST auth/login/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Response from `POST auth/login/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access: String,
    pub refresh: String,
    pub user: User,
}

/// Body of `POST auth/refresh/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRefreshRequest {
    pub refresh: String,
}

/// Response from `POST auth/refresh/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRefreshResponse {
    pub access: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paid" => Ok(PaymentStatus::Paid),
            "pending" => Ok(PaymentStatus::Pending),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Pix,
    Credit,
    Debit,
    Cash,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Pix => "pix",
            PaymentType::Credit => "credit",
            PaymentType::Debit => "debit",
            PaymentType::Cash => "cash",
        }
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pix" => Ok(PaymentType::Pix),
            "credit" => Ok(PaymentType::Credit),
            "debit" => Ok(PaymentType::Debit),
            "cash" => Ok(PaymentType::Cash),
            other => Err(format!("unknown payment type: {}", other)),
        }
    }
}

/// A payment record as returned by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationPayment {
    pub id: u64,
    /// Owning user id
    pub user: u64,
    pub name: String,
    /// Decimal amount, kept as the server's string
    pub amount: String,
    pub status: PaymentStatus,
    pub status_display: String,
    pub payment_type: PaymentType,
    pub payment_type_display: String,
    pub installments: Option<u32>,
    pub installment_amount: String,
    pub expense_date: NaiveDate,
    pub expected_end_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<FixedOffset>>,
    pub external_reference: Option<String>,
    pub remaining_amount: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl OrganizationPayment {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

/// Writable payment fields for create, update and patch.
///
/// Unset fields are left out of the body. `installments` distinguishes
/// "leave alone" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<PaymentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installments: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
}

/// Paginated list envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Aggregates from `GET organization-payment/stats/`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentStats {
    #[serde(rename = "total_pagos")]
    pub total_paid: f64,
    #[serde(rename = "total_pendentes")]
    pub total_pending: f64,
    #[serde(rename = "total_credito")]
    pub total_credit: f64,
    #[serde(rename = "total_geral")]
    pub total: f64,
    #[serde(rename = "quantidade_total")]
    pub count: u64,
    #[serde(rename = "quantidade_pagos")]
    pub count_paid: u64,
    #[serde(rename = "quantidade_pendentes")]
    pub count_pending: u64,
    #[serde(rename = "quantidade_credito")]
    pub count_credit: u64,
}

/// One slice of the paid/pending breakdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusSlice {
    pub status: PaymentStatus,
    pub total: f64,
    pub count: u64,
}

impl PaymentStats {
    /// Paid and pending slices, in that order
    pub fn by_status(&self) -> [StatusSlice; 2] {
        [
            StatusSlice {
                status: PaymentStatus::Paid,
                total: self.total_paid,
                count: self.count_paid,
            },
            StatusSlice {
                status: PaymentStatus::Pending,
                total: self.total_pending,
                count: self.count_pending,
            },
        ]
    }

    /// Share of the overall total already paid, in [0, 1]
    pub fn paid_share(&self) -> f64 {
        if self.total <= 0.0 {
            0.0
        } else {
            (self.total_paid / self.total).clamp(0.0, 1.0)
        }
    }
}
