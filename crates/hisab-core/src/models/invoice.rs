use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Decimal2;
use crate::utils::contains_ignore_case;

/// Tax rate applied to new invoices unless the draft says otherwise.
pub const DEFAULT_TAX_RATE: Decimal2 = Decimal2::from_units(18);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl InvoiceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Paid => write!(f, "Paid"),
            Self::Overdue => write!(f, "Overdue"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    #[serde(default)]
    pub id: Option<i64>,
    pub description: String,
    pub quantity: Decimal2,
    pub unit_price: Decimal2,
    #[serde(default)]
    pub total: Decimal2,
}

impl InvoiceItem {
    pub fn line_total(&self) -> Decimal2 {
        self.quantity.times(self.unit_price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub amount: Decimal2,
    pub payment_date: Option<String>,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub client_name: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub client_phone: String,
    #[serde(default)]
    pub client_address: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub subtotal: Decimal2,
    #[serde(default)]
    pub tax_rate: Decimal2,
    #[serde(default)]
    pub tax_amount: Decimal2,
    #[serde(default)]
    pub total_amount: Decimal2,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub terms_conditions: String,
    #[serde(default)]
    pub razorpay_payment_link: Option<String>,
    #[serde(default)]
    pub last_reminder_sent: Option<String>,
    #[serde(default)]
    pub reminder_count: i32,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Invoice {
    /// Case-insensitive match on invoice number, client name or client email.
    pub fn matches_search(&self, query: &str) -> bool {
        contains_ignore_case(&self.invoice_number, query)
            || contains_ignore_case(&self.client_name, query)
            || contains_ignore_case(&self.client_email, query)
    }

    /// Past due and still unpaid on `today`.
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        !matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
            && today > self.due_date
    }

    /// Totals recomputed from the line items, for comparison with the server's.
    pub fn computed_totals(&self) -> InvoiceTotals {
        InvoiceTotals::compute(
            self.items.iter().map(|item| (item.quantity, item.unit_price)),
            self.tax_rate,
        )
    }

    pub fn payment_link(&self) -> Option<&str> {
        self.razorpay_payment_link
            .as_deref()
            .filter(|link| !link.is_empty())
    }

    pub fn amount_paid(&self) -> Decimal2 {
        self.payments.iter().map(|p| p.amount).sum()
    }
}

/// Subtotal, tax and grand total for a set of line items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal2,
    pub tax_amount: Decimal2,
    pub total: Decimal2,
}

impl InvoiceTotals {
    /// Each line is `quantity × unit_price` rounded to cents; tax is applied
    /// once to the summed subtotal.
    pub fn compute<I>(lines: I, tax_rate: Decimal2) -> Self
    where
        I: IntoIterator<Item = (Decimal2, Decimal2)>,
    {
        let subtotal: Decimal2 = lines
            .into_iter()
            .map(|(quantity, unit_price)| quantity.times(unit_price))
            .sum();
        let tax_amount = subtotal.percent(tax_rate);
        Self {
            subtotal,
            tax_amount,
            total: subtotal + tax_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemDraft {
    pub description: String,
    pub quantity: Decimal2,
    pub unit_price: Decimal2,
}

impl LineItemDraft {
    pub fn total(&self) -> Decimal2 {
        self.quantity.times(self.unit_price)
    }

    pub fn is_complete(&self) -> bool {
        !self.description.trim().is_empty()
            && self.quantity > Decimal2::ZERO
            && self.unit_price > Decimal2::ZERO
    }
}

fn default_tax_rate() -> Decimal2 {
    DEFAULT_TAX_RATE
}

/// Body for creating or replacing an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub client_name: String,
    pub client_email: String,
    #[serde(default)]
    pub client_phone: String,
    #[serde(default)]
    pub client_address: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal2,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub terms_conditions: String,
    pub items: Vec<LineItemDraft>,
}

impl InvoiceDraft {
    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals::compute(
            self.items.iter().map(|item| (item.quantity, item.unit_price)),
            self.tax_rate,
        )
    }

    /// Drop blank rows, the way the item editor does before submitting.
    pub fn without_incomplete_items(mut self) -> Self {
        self.items.retain(LineItemDraft::is_complete);
        self
    }

    /// Shallow required-field check; the server does the real validation.
    pub fn check(&self) -> Result<(), String> {
        if self.client_name.trim().is_empty() || self.client_email.trim().is_empty() {
            return Err("Client name and email are required".to_string());
        }
        if !self.items.iter().any(LineItemDraft::is_complete) {
            return Err("At least one item with description, quantity and price is required".to_string());
        }
        Ok(())
    }
}

/// Filters for the invoice list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceQuery {
    pub status: Option<InvoiceStatus>,
    pub search: Option<String>,
}

impl InvoiceQuery {
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(status) = self.status {
            params.push(("status".to_string(), status.as_str().to_string()));
        }
        if let Some(ref search) = self.search {
            if !search.is_empty() {
                params.push(("search".to_string(), search.clone()));
            }
        }
        params
    }

    pub fn matches(&self, invoice: &Invoice) -> bool {
        let status_ok = self.status.map(|s| invoice.status == s).unwrap_or(true);
        let search_ok = self
            .search
            .as_deref()
            .map(|q| invoice.matches_search(q))
            .unwrap_or(true);
        status_ok && search_ok
    }

    /// Apply the filters locally, for servers that ignore the query params.
    pub fn apply(&self, invoices: Vec<Invoice>) -> Vec<Invoice> {
        invoices.into_iter().filter(|inv| self.matches(inv)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    pub payment_link: String,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
