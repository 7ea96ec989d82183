//! Plain-text rendering of API data.

use std::fmt::Write;

use chrono::NaiveDate;
use hisab_core::models::{Invoice, InvoiceStatus, InvoiceSummary, InvoiceTotals, UserProfile};
use hisab_core::utils::{format_currency, format_date, truncate};

/// Column width for client names in tables
const CLIENT_WIDTH: usize = 24;

fn date(d: NaiveDate) -> String {
    d.format("%b %d, %Y").to_string()
}

fn status_label(invoice: &Invoice, today: NaiveDate) -> String {
    if invoice.status == InvoiceStatus::Pending && invoice.is_past_due(today) {
        "Past due".to_string()
    } else {
        invoice.status.to_string()
    }
}

pub fn invoice_table(invoices: &[Invoice], today: NaiveDate) -> String {
    if invoices.is_empty() {
        return "No invoices.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:<width$} {:<13} {:<13} {:<10} {:>14}",
        "NUMBER",
        "CLIENT",
        "ISSUED",
        "DUE",
        "STATUS",
        "TOTAL",
        width = CLIENT_WIDTH
    );
    for invoice in invoices {
        let _ = writeln!(
            out,
            "{:<12} {:<width$} {:<13} {:<13} {:<10} {:>14}",
            invoice.invoice_number,
            truncate(&invoice.client_name, CLIENT_WIDTH),
            date(invoice.issue_date),
            date(invoice.due_date),
            status_label(invoice, today),
            format_currency(invoice.total_amount),
            width = CLIENT_WIDTH
        );
    }
    out
}

pub fn invoice_detail(invoice: &Invoice, today: NaiveDate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Invoice {}  [{}]", invoice.invoice_number, status_label(invoice, today));
    let _ = writeln!(out, "Id:       {}", invoice.id);
    let _ = writeln!(out, "Client:   {}", invoice.client_name);
    if !invoice.client_email.is_empty() {
        let _ = writeln!(out, "Email:    {}", invoice.client_email);
    }
    if !invoice.client_phone.is_empty() {
        let _ = writeln!(out, "Phone:    {}", invoice.client_phone);
    }
    if !invoice.client_address.is_empty() {
        let _ = writeln!(out, "Address:  {}", invoice.client_address);
    }
    let _ = writeln!(out, "Issued:   {}", date(invoice.issue_date));
    let _ = writeln!(out, "Due:      {}", date(invoice.due_date));

    if !invoice.items.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<32} {:>8} {:>14} {:>14}", "ITEM", "QTY", "PRICE", "AMOUNT");
        for item in &invoice.items {
            let _ = writeln!(
                out,
                "{:<32} {:>8} {:>14} {:>14}",
                truncate(&item.description, 32),
                item.quantity.to_string(),
                format_currency(item.unit_price),
                format_currency(item.line_total())
            );
        }
    }

    let _ = writeln!(out);
    let tax_label = format!("Tax ({}%):", invoice.tax_rate);
    let _ = writeln!(out, "{:<17}{:>14}", "Subtotal:", format_currency(invoice.subtotal));
    let _ = writeln!(out, "{:<17}{:>14}", tax_label, format_currency(invoice.tax_amount));
    let _ = writeln!(out, "{:<17}{:>14}", "Total:", format_currency(invoice.total_amount));

    if !invoice.payments.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Payments:");
        for payment in &invoice.payments {
            let when = payment.payment_date.as_deref().map(format_date).unwrap_or_default();
            let _ = writeln!(
                out,
                "  {} {} {} {}",
                when,
                format_currency(payment.amount),
                payment.payment_method,
                payment.status
            );
        }
        let _ = writeln!(out, "  Paid so far: {}", format_currency(invoice.amount_paid()));
    }

    if let Some(link) = invoice.payment_link() {
        let _ = writeln!(out, "Payment link: {}", link);
    }
    if invoice.reminder_count > 0 {
        let last = invoice
            .last_reminder_sent
            .as_deref()
            .map(format_date)
            .unwrap_or_default();
        let _ = writeln!(out, "Reminders sent: {} (last {})", invoice.reminder_count, last);
    }
    if !invoice.notes.is_empty() {
        let _ = writeln!(out, "\nNotes: {}", invoice.notes);
    }
    if !invoice.terms_conditions.is_empty() {
        let _ = writeln!(out, "Terms: {}", invoice.terms_conditions);
    }
    out
}

pub fn summary(summary: &InvoiceSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Invoices:    {}", summary.total_invoices);
    let _ = writeln!(
        out,
        "Pending:     {:<4} {}",
        summary.pending_invoices,
        format_currency(summary.total_pending_amount)
    );
    let _ = writeln!(
        out,
        "Paid:        {:<4} {}",
        summary.paid_invoices,
        format_currency(summary.total_paid_amount)
    );
    let _ = writeln!(
        out,
        "Overdue:     {:<4} {}",
        summary.overdue_invoices,
        format_currency(summary.total_overdue_amount)
    );
    let _ = writeln!(out, "Outstanding: {}", format_currency(summary.outstanding()));
    let _ = writeln!(out, "Collected:   {}%", summary.paid_percent());
    out
}

pub fn totals(totals: &InvoiceTotals, tax_rate: impl std::fmt::Display) -> String {
    format!(
        "Subtotal {}  Tax ({}%) {}  Total {}",
        format_currency(totals.subtotal),
        tax_rate,
        format_currency(totals.tax_amount),
        format_currency(totals.total)
    )
}

pub fn user(user: &UserProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", user.display_name(), user.username);
    if !user.email.is_empty() {
        let _ = writeln!(out, "Email:   {}", user.email);
    }
    let profile = &user.profile;
    if !profile.company_name.is_empty() {
        let _ = writeln!(out, "Company: {}", profile.company_name);
    }
    if !profile.phone.is_empty() {
        let _ = writeln!(out, "Phone:   {}", profile.phone);
    }
    if !profile.address.is_empty() {
        let _ = writeln!(out, "Address: {}", profile.address);
    }
    if !profile.gst_number.is_empty() {
        let _ = writeln!(out, "GSTIN:   {}", profile.gst_number);
    }
    out
}
