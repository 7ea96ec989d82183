use serde::{Deserialize, Serialize};

use super::Decimal2;

/// Dashboard totals, returned as a single object by the summary endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    #[serde(default)]
    pub total_invoices: u32,
    #[serde(default)]
    pub pending_invoices: u32,
    #[serde(default)]
    pub paid_invoices: u32,
    #[serde(default)]
    pub overdue_invoices: u32,
    #[serde(default)]
    pub total_pending_amount: Decimal2,
    #[serde(default)]
    pub total_paid_amount: Decimal2,
    #[serde(default)]
    pub total_overdue_amount: Decimal2,
    #[serde(default)]
    pub total_amount: Decimal2,
}

impl InvoiceSummary {
    /// Amount still to be collected (pending plus overdue).
    pub fn outstanding(&self) -> Decimal2 {
        self.total_pending_amount + self.total_overdue_amount
    }

    /// Share of issued invoices that are paid, as a whole percentage.
    pub fn paid_percent(&self) -> u32 {
        if self.total_invoices == 0 {
            0
        } else {
            (self.paid_invoices * 100 + self.total_invoices / 2) / self.total_invoices
        }
    }
}
