//! Data models for the invoicing API.
//!
//! - `UserProfile`, `BusinessProfile`: the signed-in account
//! - `RegistrationData`, `ProfileUpdate`, `ChangePassword`: auth request bodies
//! - `Invoice`, `InvoiceItem`, `Payment`: invoices as the server returns them
//! - `InvoiceDraft`, `LineItemDraft`, `InvoiceTotals`: building invoices locally
//! - `InvoiceSummary`: dashboard totals
//! - `Decimal2`: two-place fixed-point amounts

pub mod decimal;
pub mod invoice;
pub mod summary;
pub mod user;

pub use decimal::{Decimal2, ParseDecimalError};
pub use invoice::{
    Invoice, InvoiceDraft, InvoiceItem, InvoiceQuery, InvoiceStatus, InvoiceTotals, LineItemDraft,
    MessageResponse, Payment, PaymentLink, ReminderRequest, DEFAULT_TAX_RATE,
};
pub use summary::InvoiceSummary;
pub use user::{
    AuthResponse, BusinessProfile, ChangePassword, ProfileUpdate, RegistrationData, TokenPair,
    UserProfile,
};
