//! Raw transaction normalization
//!
//! Card companies and banks return the same concept under different field
//! names ("used date" vs "approval date", store name vs merchant name). Each
//! known response shape has a priority table: for every canonical field, an
//! ordered list of source keys. The first key present on the record wins.
//!
//! Normalization never fails. Missing fields become empty strings and amounts
//! are passed through untouched; validation is the detector's job.

use serde_json::{Map, Value};

use crate::models::{BusinessType, NormalizedTransaction};

/// One transaction as returned by a data source
pub type RawTransaction = Map<String, Value>;

/// Ordered source keys for each canonical field
#[derive(Debug, Clone, Copy)]
pub struct FieldPriority {
    pub date: &'static [&'static str],
    pub time: &'static [&'static str],
    pub merchant: &'static [&'static str],
    pub amount: &'static [&'static str],
    pub status: &'static [&'static str],
    pub card_name: &'static [&'static str],
    pub card_identifier: &'static [&'static str],
    pub category: &'static [&'static str],
}

/// Card approval history (승인내역)
pub const CARD_APPROVAL_FIELDS: FieldPriority = FieldPriority {
    date: &["resUsedDate", "resApprovalDate"],
    time: &["resUsedTime", "resApprovalTime"],
    merchant: &["resMemberStoreName", "resStoreName", "resMerchantName"],
    amount: &["resUsedAmount", "resApprovalAmount", "resAmount"],
    status: &["resApprovalStatus"],
    card_name: &["resCardName"],
    card_identifier: &["resCardNo", "resCardNumber"],
    category: &["resCategory"],
};

/// Bank account transaction history (거래내역)
pub const BANK_TRANSACTION_FIELDS: FieldPriority = FieldPriority {
    date: &["resAccountTrDate"],
    time: &["resAccountTrTime"],
    merchant: &["resAccountDesc3", "resAccountDesc2", "resAccountDesc1"],
    amount: &["resAccountOut"],
    status: &[],
    card_name: &["resAccountName"],
    card_identifier: &["resAccount", "resAccountNo"],
    category: &["resAccountDesc4"],
};

/// Known response shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceShape {
    #[default]
    CardApproval,
    BankTransaction,
}

impl SourceShape {
    pub fn fields(&self) -> &'static FieldPriority {
        match self {
            Self::CardApproval => &CARD_APPROVAL_FIELDS,
            Self::BankTransaction => &BANK_TRANSACTION_FIELDS,
        }
    }
}

impl From<BusinessType> for SourceShape {
    fn from(business_type: BusinessType) -> Self {
        match business_type {
            BusinessType::Card => Self::CardApproval,
            BusinessType::Bank => Self::BankTransaction,
        }
    }
}

/// Normalize one raw record using the given shape's priority table
pub fn normalize_transaction(raw: &RawTransaction, shape: SourceShape) -> NormalizedTransaction {
    let fields = shape.fields();
    NormalizedTransaction {
        date: resolve(raw, fields.date),
        time: resolve(raw, fields.time),
        merchant: resolve(raw, fields.merchant),
        amount: resolve(raw, fields.amount),
        status: resolve(raw, fields.status),
        card_name: resolve(raw, fields.card_name),
        card_identifier: resolve(raw, fields.card_identifier),
        category: resolve(raw, fields.category),
    }
}

/// Normalize a batch of raw records
pub fn normalize_all(raw: &[RawTransaction], shape: SourceShape) -> Vec<NormalizedTransaction> {
    raw.iter()
        .map(|tx| normalize_transaction(tx, shape))
        .collect()
}

/// First present key wins, even if its value is an empty string.
/// `null` counts as absent.
fn resolve(raw: &RawTransaction, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(value_text))
        .unwrap_or_default()
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // Nested structures carry no scalar we can use
        Value::Array(_) | Value::Object(_) => None,
    }
}
