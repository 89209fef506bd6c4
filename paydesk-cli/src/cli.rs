//! Subcommands and their execution

use std::sync::Arc;

use anyhow::bail;
use chrono::{DateTime, FixedOffset, NaiveDate};
use clap::{Args, Subcommand};
use paydesk_client::{
    AuthController, LoginRequest, OrganizationPayment, PaymentInput, PaymentQuery, PaymentStats,
    PaymentStatus, PaymentType, PaymentsApi,
};
use serde::Serialize;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "PAYDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the session
    Logout {
        /// Only drop the local session, skip the server call
        #[arg(long)]
        local: bool,
    },

    /// Show the logged-in user
    Whoami,

    /// Manage payment records
    #[command(subcommand)]
    Payments(PaymentCommands),

    /// Show payment totals by status
    Stats,
}

#[derive(Debug, Subcommand)]
pub enum PaymentCommands {
    /// List payments
    List {
        /// Filter by status (paid, pending)
        #[arg(long)]
        status: Option<PaymentStatus>,
        /// Filter by payment type, repeatable (pix, credit, debit, cash)
        #[arg(long = "type")]
        payment_types: Vec<PaymentType>,
        #[arg(long)]
        search: Option<String>,
        /// Ordering field, prefix with - for descending
        #[arg(long)]
        ordering: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Show one payment
    Get { id: u64 },

    /// Create a payment
    Create(PaymentFields),

    /// Update a payment (PATCH by default)
    Update {
        id: u64,
        #[command(flatten)]
        fields: PaymentFields,
        /// Send a full replacement (PUT)
        #[arg(long)]
        replace: bool,
    },

    /// Delete a payment
    Delete { id: u64 },
}

#[derive(Debug, Args)]
pub struct PaymentFields {
    #[arg(long)]
    pub name: Option<String>,
    /// Decimal amount, e.g. 120.50
    #[arg(long)]
    pub amount: Option<String>,
    #[arg(long)]
    pub status: Option<PaymentStatus>,
    #[arg(long = "type")]
    pub payment_type: Option<PaymentType>,
    #[arg(long, conflicts_with = "no_installments")]
    pub installments: Option<u32>,
    /// Clear the installment count
    #[arg(long)]
    pub no_installments: bool,
    /// YYYY-MM-DD
    #[arg(long)]
    pub expense_date: Option<NaiveDate>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub expected_end_date: Option<NaiveDate>,
    /// RFC 3339 timestamp
    #[arg(long)]
    pub paid_at: Option<DateTime<FixedOffset>>,
    #[arg(long)]
    pub external_reference: Option<String>,
}

impl From<PaymentFields> for PaymentInput {
    fn from(f: PaymentFields) -> Self {
        let installments = if f.no_installments {
            Some(None)
        } else {
            f.installments.map(Some)
        };

        PaymentInput {
            name: f.name,
            amount: f.amount,
            status: f.status,
            payment_type: f.payment_type,
            installments,
            expense_date: f.expense_date,
            expected_end_date: f.expected_end_date,
            paid_at: f.paid_at,
            external_reference: f.external_reference,
        }
    }
}

/// Everything a command may need
pub struct App {
    pub auth: Arc<AuthController>,
    pub payments: PaymentsApi,
}

pub async fn execute(app: &App, command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::Login { username, password } => {
            let user = app.auth.login(&LoginRequest::new(username, password)).await?;
            Ok(format!("Logged in as {} (id {})", user.display_name(), user.id))
        }
        Commands::Logout { local } => {
            if local {
                app.auth.logout();
            } else {
                app.auth.sign_out().await;
            }
            Ok("Logged out".to_string())
        }
        Commands::Whoami => Ok(match app.auth.user() {
            Some(user) => format!("{} <{}> (id {})", user.display_name(), user.email, user.id),
            None => "Not logged in".to_string(),
        }),
        Commands::Payments(cmd) => {
            require_login(app)?;
            execute_payments(&app.payments, cmd).await
        }
        Commands::Stats => {
            require_login(app)?;
            let stats = app.payments.stats().await?;
            Ok(format_stats(&stats))
        }
    }
}

async fn execute_payments(payments: &PaymentsApi, cmd: PaymentCommands) -> anyhow::Result<String> {
    match cmd {
        PaymentCommands::List {
            status,
            payment_types,
            search,
            ordering,
            page,
            page_size,
        } => {
            let mut query = PaymentQuery::new();
            if let Some(status) = status {
                query = query.status(status);
            }
            if !payment_types.is_empty() {
                query = query.payment_types(&payment_types);
            }
            if let Some(search) = search {
                query = query.search(search);
            }
            if let Some(ordering) = ordering {
                query = query.ordering(ordering);
            }
            if let Some(page) = page {
                query = query.page(page);
            }
            if let Some(size) = page_size {
                query = query.page_size(size);
            }

            let page = payments.list(query).await?;
            let mut out: Vec<String> = page.results.iter().map(format_payment_line).collect();
            out.push(format!("{} of {} payment(s)", page.results.len(), page.count));
            Ok(out.join("\n"))
        }
        PaymentCommands::Get { id } => pretty(&payments.get(id).await?),
        PaymentCommands::Create(fields) => {
            let input = validate_create(fields.into())?;
            pretty(&payments.create(&input).await?)
        }
        PaymentCommands::Update {
            id,
            fields,
            replace,
        } => {
            let input: PaymentInput = fields.into();
            let updated = if replace {
                payments.update(id, &validate_create(input)?).await?
            } else {
                payments.patch(id, &input).await?
            };
            pretty(&updated)
        }
        PaymentCommands::Delete { id } => {
            payments.delete(id).await?;
            Ok(format!("Deleted payment {}", id))
        }
    }
}

fn require_login(app: &App) -> anyhow::Result<()> {
    if !app.auth.is_authenticated() {
        bail!("Not logged in, run `paydesk login` first");
    }
    Ok(())
}

/// Create and full update need the fields the server requires
fn validate_create(input: PaymentInput) -> anyhow::Result<PaymentInput> {
    let mut missing = Vec::new();
    if input.name.as_deref().map_or(true, str::is_empty) {
        missing.push("--name");
    }
    if input.amount.is_none() {
        missing.push("--amount");
    }
    if input.payment_type.is_none() {
        missing.push("--type");
    }
    if input.expense_date.is_none() {
        missing.push("--expense-date");
    }
    if !missing.is_empty() {
        bail!("Missing required field(s): {}", missing.join(", "));
    }
    if let Some(ref amount) = input.amount {
        if amount.parse::<f64>().is_err() {
            bail!("Invalid amount: {}", amount);
        }
    }
    Ok(input)
}

fn pretty<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn format_payment_line(p: &OrganizationPayment) -> String {
    let installments = match p.installments {
        Some(n) => format!(" {}x {}", n, p.installment_amount),
        None => String::new(),
    };
    format!(
        "#{:<5} {}  {:<8} {:<7} {:>12}{}  {}",
        p.id,
        p.expense_date,
        p.status.as_str(),
        p.payment_type.as_str(),
        p.amount,
        installments,
        p.name
    )
}

fn format_stats(stats: &PaymentStats) -> String {
    let mut lines: Vec<String> = stats
        .by_status()
        .iter()
        .map(|slice| {
            format!(
                "{:<8} {:>12.2} ({} payment(s))",
                slice.status.as_str(),
                slice.total,
                slice.count
            )
        })
        .collect();
    lines.push(format!(
        "{:<8} {:>12.2} ({} payment(s))",
        "credit", stats.total_credit, stats.count_credit
    ));
    lines.push(format!(
        "{:<8} {:>12.2} ({} payment(s))",
        "total", stats.total, stats.count
    ));
    lines.push(format!("paid     {:>11.1}%", stats.paid_share() * 100.0));
    lines.join("\n")
}
