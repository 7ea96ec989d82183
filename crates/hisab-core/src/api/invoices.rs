//! Invoice endpoints.

use tracing::{debug, warn};

use super::transport::ApiRequest;
use super::{ApiClient, ApiError};
use crate::models::{
    Invoice, InvoiceDraft, InvoiceQuery, InvoiceSummary, MessageResponse, PaymentLink,
    ReminderRequest,
};

pub const INVOICES_PATH: &str = "/invoices/";
pub const SUMMARY_PATH: &str = "/invoices/summary/";
pub const RECENT_PATH: &str = "/invoices/recent/";

/// Validate that a string looks like a UUID, the server's invoice key.
/// 36 characters with dashes: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
pub fn is_valid_invoice_id(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    s.chars().enumerate().all(|(i, c)| {
        if i == 8 || i == 13 || i == 18 || i == 23 {
            c == '-'
        } else {
            c.is_ascii_hexdigit()
        }
    })
}

/// `/invoices/{id}/` or `/invoices/{id}/{action}/`. Ids are checked here so a
/// stray path segment can never reach the server.
fn invoice_path(id: &str, action: Option<&str>) -> Result<String, ApiError> {
    if !is_valid_invoice_id(id) {
        warn!(id = %id, "Invalid invoice id format");
        return Err(ApiError::InvalidId(id.to_string()));
    }
    Ok(match action {
        Some(action) => format!("{}{}/{}/", INVOICES_PATH, id, action),
        None => format!("{}{}/", INVOICES_PATH, id),
    })
}

impl ApiClient {
    /// Invoices for the signed-in user, newest first, filtered server-side.
    pub async fn list_invoices(&self, query: &InvoiceQuery) -> Result<Vec<Invoice>, ApiError> {
        let mut request = ApiRequest::get(INVOICES_PATH);
        for (key, value) in query.params() {
            request = request.query(key, value);
        }
        let invoices: Vec<Invoice> = self.fetch(request).await?;
        debug!(count = invoices.len(), "Fetched invoices");
        Ok(invoices)
    }

    pub async fn get_invoice(&self, id: &str) -> Result<Invoice, ApiError> {
        self.fetch(ApiRequest::get(invoice_path(id, None)?)).await
    }

    /// Create an invoice. The server echoes the accepted draft, without the
    /// id or number it assigned.
    pub async fn create_invoice(&self, draft: &InvoiceDraft) -> Result<InvoiceDraft, ApiError> {
        self.fetch(ApiRequest::post(INVOICES_PATH).json(draft)?).await
    }

    /// Replace an invoice's fields and items. Replies with the accepted draft.
    pub async fn update_invoice(
        &self,
        id: &str,
        draft: &InvoiceDraft,
    ) -> Result<InvoiceDraft, ApiError> {
        self.fetch(ApiRequest::put(invoice_path(id, None)?).json(draft)?)
            .await
    }

    pub async fn delete_invoice(&self, id: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(invoice_path(id, None)?)).await
    }

    pub async fn invoice_summary(&self) -> Result<InvoiceSummary, ApiError> {
        self.fetch(ApiRequest::get(SUMMARY_PATH)).await
    }

    pub async fn recent_invoices(&self) -> Result<Vec<Invoice>, ApiError> {
        self.fetch(ApiRequest::get(RECENT_PATH)).await
    }

    /// Raw PDF bytes.
    pub async fn download_pdf(&self, id: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .execute(ApiRequest::get(invoice_path(id, Some("pdf"))?))
            .await?;
        debug!(bytes = response.body.len(), "Downloaded invoice PDF");
        Ok(response.body)
    }

    /// Email the client a payment reminder, with an optional custom message.
    pub async fn send_reminder(
        &self,
        id: &str,
        message: Option<&str>,
    ) -> Result<MessageResponse, ApiError> {
        let body = ReminderRequest {
            message: message.map(str::to_string),
        };
        self.fetch(ApiRequest::post(invoice_path(id, Some("send-reminder"))?).json(&body)?)
            .await
    }

    pub async fn payment_link(&self, id: &str) -> Result<PaymentLink, ApiError> {
        self.fetch(ApiRequest::post(invoice_path(id, Some("razorpay-link"))?))
            .await
    }

    pub async fn mark_paid(&self, id: &str) -> Result<MessageResponse, ApiError> {
        self.fetch(ApiRequest::post(invoice_path(id, Some("mark-paid"))?))
            .await
    }
}
