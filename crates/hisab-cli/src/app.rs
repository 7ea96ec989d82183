//! Command handlers.
//!
//! `App` owns the configuration and the session store for one invocation.
//! Each subcommand maps to one handler; output goes to stdout, diagnostics
//! to the tracing subscriber.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, warn};

use hisab_core::api::ApiError;
use hisab_core::auth::{AuthState, SessionHandle};
use hisab_core::models::{InvoiceDraft, InvoiceQuery, ProfileUpdate, RegistrationData};
use hisab_core::utils::cmp_ignore_case;
use hisab_core::{ApiClient, Config, SessionStore};

use crate::cli::{Command, InvoiceCommand, ProfileArgs, ProfileCommand, RegisterArgs};
use crate::render;

/// Maximum concurrent reminder requests.
/// Reminders send email server-side, so keep the burst small.
const MAX_CONCURRENT_REMINDERS: usize = 4;

/// Read instead of prompting when set; for scripts.
const PASSWORD_ENV: &str = "HISAB_PASSWORD";

pub struct App {
    config: Config,
    store: SessionStore,
    auth_rx: watch::Receiver<AuthState>,
}

impl App {
    pub fn new(config: Config, api_url: Option<String>) -> Result<Self> {
        let session = Arc::new(SessionHandle::load(config.token_store()?));
        let client = match api_url {
            Some(url) => ApiClient::new(&url, config.request_timeout(), session.clone())?,
            None => ApiClient::from_config(&config, session.clone())?,
        };
        Ok(Self::with_store(config, SessionStore::new(client)))
    }

    pub fn with_store(config: Config, store: SessionStore) -> Self {
        let auth_rx = store.session().subscribe();
        Self {
            config,
            store,
            auth_rx,
        }
    }

    fn client(&self) -> &ApiClient {
        self.store.client()
    }

    /// True once if the session was dropped while a command ran, e.g. by a
    /// failed token refresh. A logout the user asked for does not count.
    pub fn session_lost(&mut self) -> bool {
        self.auth_rx.has_changed().unwrap_or(false)
            && *self.auth_rx.borrow_and_update() == AuthState::Unauthenticated
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { username } => self.login(username).await,
            Command::Register(args) => self.register(args).await,
            Command::Logout => {
                self.store.logout().await;
                self.auth_rx.borrow_and_update();
                println!("Logged out.");
                Ok(())
            }
            Command::Whoami => self.whoami(),
            Command::Status => self.status().await,
            Command::Profile(ProfileCommand::Update(args)) => self.update_profile(args).await,
            Command::Password => self.change_password().await,
            Command::Dashboard => self.dashboard().await,
            Command::Invoices(command) => self.invoices(command).await,
        }
    }

    fn require_login(&self) -> Result<()> {
        if !self.store.is_authenticated() {
            bail!("Not logged in. Run `hisab login` first.");
        }
        Ok(())
    }

    // ===== Account =====

    async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(name) if !name.trim().is_empty() => name,
            _ => prompt_line("Username: ")?,
        };
        let password = read_password("Password: ")?;
        if username.is_empty() || password.is_empty() {
            bail!("Username and password required");
        }

        let user = self.store.login(&username, &password).await?;

        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        println!("Logged in as {}.", user.display_name());
        Ok(())
    }

    async fn register(&mut self, args: RegisterArgs) -> Result<()> {
        let password = read_password("Password: ")?;
        let password2 = match std::env::var(PASSWORD_ENV) {
            Ok(_) => password.clone(),
            Err(_) => read_password("Confirm password: ")?,
        };
        let registration = RegistrationData {
            username: args.username,
            password,
            password2,
            email: args.email,
            first_name: args.first_name,
            last_name: args.last_name,
            company_name: args.company,
            phone: args.phone,
            address: args.address,
            gst_number: args.gst,
        };

        let user = self.store.register(&registration).await?;

        self.config.last_username = Some(user.username.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        println!("Account created. Logged in as {}.", user.display_name());
        Ok(())
    }

    fn whoami(&self) -> Result<()> {
        match self.store.current_user() {
            Some(user) => print!("{}", render::user(&user)),
            None => println!("Not logged in."),
        }
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        println!("API:     {}", self.config.api_url());
        println!("Storage: {:?}", self.config.storage);

        let Some(credentials) = self.store.session().credentials() else {
            println!("Session: none");
            return Ok(());
        };
        if let Some(expires) = credentials.refresh_expires_at() {
            println!("Refresh token expires: {}", expires.with_timezone(&Local).format("%b %d, %Y %H:%M"));
        }

        match self.store.restore().await? {
            Some(user) => println!("Session: signed in as {}", user.display_name()),
            None => println!("Session: none"),
        }
        Ok(())
    }

    async fn update_profile(&self, args: ProfileArgs) -> Result<()> {
        self.require_login()?;
        let update = ProfileUpdate {
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            company_name: args.company,
            phone: args.phone,
            address: args.address,
            gst_number: args.gst,
        };
        if update.is_empty() {
            bail!("Nothing to update; pass at least one field");
        }

        let user = self.store.update_profile(&update).await?;
        println!("Profile updated.");
        print!("{}", render::user(&user));
        Ok(())
    }

    async fn change_password(&self) -> Result<()> {
        self.require_login()?;
        let old_password = rpassword::prompt_password("Current password: ")?;
        let new_password = rpassword::prompt_password("New password: ")?;
        let confirm = rpassword::prompt_password("Confirm new password: ")?;
        if new_password != confirm {
            bail!("Passwords do not match");
        }

        let message = self.store.change_password(&old_password, &new_password).await?;
        println!("{}", message);
        Ok(())
    }

    // ===== Invoices =====

    async fn dashboard(&self) -> Result<()> {
        self.require_login()?;
        let client = self.client();

        let (summary, recent) = tokio::join!(client.invoice_summary(), client.recent_invoices());

        for err in [summary.as_ref().err(), recent.as_ref().err()].into_iter().flatten() {
            if err.requires_reauth() {
                return Err(ApiError::ReauthRequired.into());
            }
        }

        match summary {
            Ok(summary) => print!("{}", render::summary(&summary)),
            Err(e) => eprintln!("Summary unavailable: {}", e),
        }
        println!();
        match recent {
            Ok(recent) => {
                println!("Recent invoices:");
                print!("{}", render::invoice_table(&recent, today()));
            }
            Err(e) => eprintln!("Recent invoices unavailable: {}", e),
        }
        Ok(())
    }

    async fn invoices(&self, command: InvoiceCommand) -> Result<()> {
        self.require_login()?;
        let client = self.client();

        match command {
            InvoiceCommand::List {
                status,
                search,
                by_client,
            } => {
                let query = InvoiceQuery { status, search };
                let mut invoices = query.apply(client.list_invoices(&query).await?);
                if by_client {
                    invoices.sort_by(|a, b| cmp_ignore_case(&a.client_name, &b.client_name));
                }
                print!("{}", render::invoice_table(&invoices, today()));
            }
            InvoiceCommand::Show { id } => {
                let invoice = client.get_invoice(&id).await?;
                print!("{}", render::invoice_detail(&invoice, today()));
            }
            InvoiceCommand::Create { file } => {
                let draft = read_draft(&file)?;
                let accepted = client.create_invoice(&draft).await?;
                println!("Created invoice for {}.", accepted.client_name);
            }
            InvoiceCommand::Update { id, file } => {
                let draft = read_draft(&file)?;
                client.update_invoice(&id, &draft).await?;
                println!("Updated invoice {}.", id);
            }
            InvoiceCommand::Delete { id, yes } => {
                if !yes && !confirm(&format!("Delete invoice {}?", id))? {
                    println!("Cancelled.");
                    return Ok(());
                }
                client.delete_invoice(&id).await?;
                println!("Deleted.");
            }
            InvoiceCommand::Pdf { id, output } => {
                let bytes = client.download_pdf(&id).await?;
                let path = output.unwrap_or_else(|| PathBuf::from(format!("invoice-{}.pdf", id)));
                std::fs::write(&path, &bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Saved {} ({} bytes).", path.display(), bytes.len());
            }
            InvoiceCommand::Remind { ids, message } => {
                self.send_reminders(ids, message.as_deref()).await?;
            }
            InvoiceCommand::PayLink { id } => {
                let link = client.payment_link(&id).await?;
                println!("{}", link.payment_link);
                if let Some(order_id) = link.order_id {
                    debug!(order_id = %order_id, "Payment order created");
                }
            }
            InvoiceCommand::MarkPaid { id } => {
                let reply = client.mark_paid(&id).await?;
                println!("{}", reply.message);
            }
        }
        Ok(())
    }

    /// One reminder per id, a few at a time. Every id is attempted; the
    /// command fails if any of them did.
    async fn send_reminders(&self, ids: Vec<String>, message: Option<&str>) -> Result<()> {
        let client = self.client();
        let total = ids.len();

        let results: Vec<(String, Result<String, ApiError>)> = stream::iter(ids)
            .map(|id| async move {
                let result = client.send_reminder(&id, message).await.map(|r| r.message);
                (id, result)
            })
            .buffer_unordered(MAX_CONCURRENT_REMINDERS)
            .collect()
            .await;

        let mut failed = 0;
        let mut reauth = false;
        for (id, result) in results {
            match result {
                Ok(reply) => println!("{}: {}", id, reply),
                Err(e) => {
                    failed += 1;
                    reauth |= e.requires_reauth();
                    eprintln!("{}: {}", id, e.user_message(&e.to_string()));
                }
            }
        }

        if reauth {
            return Err(ApiError::ReauthRequired.into());
        }
        if failed > 0 {
            bail!("{} of {} reminders failed", failed, total);
        }
        Ok(())
    }
}

fn today() -> chrono::NaiveDate {
    Local::now().date_naive()
}

/// Load a draft, drop blank item rows and show the totals it will produce.
fn read_draft(path: &Path) -> Result<InvoiceDraft> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let draft: InvoiceDraft = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse draft {}", path.display()))?;
    let draft = draft.without_incomplete_items();
    draft.check().map_err(anyhow::Error::msg)?;

    println!("{}", render::totals(&draft.totals(), draft.tax_rate));
    Ok(draft)
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn read_password(prompt: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    Ok(rpassword::prompt_password(prompt)?)
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt_line(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}
