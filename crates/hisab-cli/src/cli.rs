//! Command line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hisab_core::models::InvoiceStatus;

#[derive(Debug, Parser)]
#[command(name = "hisab", version, about = "Invoicing from the terminal")]
pub struct Cli {
    /// API base URL, overriding HISAB_API_URL and the config file
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Create an account and sign in
    Register(RegisterArgs),
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user (from the stored session)
    Whoami,
    /// Check the stored session against the server
    Status,
    /// Business profile
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Change the account password
    Password,
    /// Invoice totals and the most recent invoices
    Dashboard,
    #[command(subcommand)]
    Invoices(InvoiceCommand),
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, default_value = "")]
    pub first_name: String,
    #[arg(long, default_value = "")]
    pub last_name: String,
    #[arg(long, default_value = "")]
    pub company: String,
    #[arg(long, default_value = "")]
    pub phone: String,
    #[arg(long, default_value = "")]
    pub address: String,
    /// GST registration number
    #[arg(long, default_value = "")]
    pub gst: String,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Change the fields given; others are left as they are
    Update(ProfileArgs),
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub gst: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum InvoiceCommand {
    /// List invoices
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<InvoiceStatus>,
        /// Match invoice number, client name or email
        #[arg(long)]
        search: Option<String>,
        /// Sort by client name instead of newest first
        #[arg(long)]
        by_client: bool,
    },
    /// Show one invoice with its items and payments
    Show { id: String },
    /// Create an invoice from a JSON draft
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace an invoice with a JSON draft
    Update {
        id: String,
        #[arg(long)]
        file: PathBuf,
    },
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Download the invoice PDF
    Pdf {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Email payment reminders
    Remind {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        message: Option<String>,
    },
    /// Generate a Razorpay payment link
    PayLink { id: String },
    MarkPaid { id: String },
}

fn parse_status(s: &str) -> Result<InvoiceStatus, String> {
    InvoiceStatus::parse(s)
        .ok_or_else(|| format!("unknown status '{}' (pending, paid, overdue, cancelled)", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::try_parse_from(["hisab", "invoices", "list", "--status", "PAID", "--search", "acme"])
            .unwrap();
        match cli.command {
            Command::Invoices(InvoiceCommand::List { status, search, by_client }) => {
                assert_eq!(status, Some(InvoiceStatus::Paid));
                assert_eq!(search.as_deref(), Some("acme"));
                assert!(!by_client);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(Cli::try_parse_from(["hisab", "invoices", "list", "--status", "draft"]).is_err());
    }

    #[test]
    fn test_remind_needs_an_id() {
        assert!(Cli::try_parse_from(["hisab", "invoices", "remind"]).is_err());
        let cli = Cli::try_parse_from(["hisab", "invoices", "remind", "a", "b", "--message", "hi"]).unwrap();
        match cli.command {
            Command::Invoices(InvoiceCommand::Remind { ids, message }) => {
                assert_eq!(ids, vec!["a", "b"]);
                assert_eq!(message.as_deref(), Some("hi"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
