// Command-line front end for the lab back-office API.

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use labdesk::config::Config;
use labdesk::model::{LabTestStatus, Page, Reconciliation, ReportKind, ReportRange};
use labdesk::storage::FileTokenStore;
use labdesk::store::ListQuery;
use labdesk::{AuthState, LabDesk};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "labdesk")]
#[command(about = "LabDesk - laboratory back-office client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print records as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the server and connection options
    Configure {
        /// API base URL, e.g. https://lab.example.com/api
        #[arg(long)]
        url: Option<String>,

        /// Accept self-signed certificates
        #[arg(long)]
        insecure: Option<bool>,

        /// Rows per page
        #[arg(long)]
        per_page: Option<u32>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Log in and store the session token. The password is read from stdin
    /// and echoed as typed; pipe it in to keep it off the screen.
    Login {
        /// Defaults to the last username
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Revoke the session and forget the token
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Today's counters
    Dashboard,

    /// List patients
    Patients {
        #[arg(short, long)]
        search: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Show one patient
    Patient { id: u64 },

    /// List inventory items
    Inventory {
        #[arg(short, long)]
        search: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Show stock movements instead of items
        #[arg(long)]
        transactions: bool,
    },

    /// Lab queue counters and tests
    LabQueue {
        /// pending, processing, completed or released
        #[arg(long)]
        status: Option<LabTestStatus>,

        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// List billable services
    Services {
        #[arg(short, long)]
        search: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// List discounts
    Discounts {
        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// List staff accounts
    Users {
        #[arg(short, long)]
        search: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// End-of-day cash reconciliation
    Reconcile {
        #[command(subcommand)]
        action: ReconcileAction,
    },

    /// Fetch a report for a date range
    Report {
        /// financial, inventory-log, audit-log or lab-report
        kind: ReportKind,

        /// First day, YYYY-MM-DD (default today)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day, YYYY-MM-DD (default: same as --from)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Address lookups for the patient form
    Address {
        #[command(subcommand)]
        level: AddressLevel,
    },
}

#[derive(Subcommand)]
enum ReconcileAction {
    /// Expected cash for today
    Preview {
        /// Counted cash, to show the variance before submitting
        #[arg(long)]
        cash: Option<String>,
    },

    /// Submit the counted cash
    Submit {
        #[arg(long)]
        cash: String,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Past reconciliations
    List {
        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Show one reconciliation
    Show { id: u64 },
}

#[derive(Subcommand)]
enum AddressLevel {
    Regions,
    Provinces { region_code: String },
    Cities { province_code: String },
    Barangays { city_code: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints rows one per line, or the whole page as JSON.
fn print_page<T: Serialize>(json: bool, page: &Page<T>, line: impl Fn(&T) -> String) -> Result<()> {
    if json {
        return print_json(page);
    }
    if page.data.is_empty() {
        println!("No records found.");
        return Ok(());
    }
    for row in &page.data {
        println!("{}", line(row));
    }
    match page.total {
        Some(total) => println!("-- page {}/{} ({} total)", page.current_page, page.last_page, total),
        None => println!("-- page {}/{}", page.current_page, page.last_page),
    }
    Ok(())
}

fn reconciliation_line(r: &Reconciliation) -> String {
    format!(
        "#{:<5} {}  expected {:>10.2}  counted {:>10.2}  {:<8} {}",
        r.id,
        r.date,
        r.expected_cash,
        r.actual_cash,
        r.status,
        r.computed_variance().display()
    )
}

fn search_query(search: Option<String>) -> ListQuery {
    ListQuery::new().search(search.as_deref().unwrap_or(""))
}

fn prompt(label: &str, hidden_hint: bool) -> Result<String> {
    let mut stderr = io::stderr();
    if hidden_hint {
        write!(stderr, "{} (input is visible): ", label)?;
    } else {
        write!(stderr, "{}: ", label)?;
    }
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn open_desk(config: Config) -> Result<LabDesk> {
    let store = FileTokenStore::default_location()?;
    Ok(LabDesk::new(config, Box::new(store))?)
}

/// Builds the desk and requires a valid stored session.
async fn authenticated_desk() -> Result<LabDesk> {
    let config = Config::load().context("Run `labdesk configure --url ...` first")?;
    let desk = open_desk(config)?;
    match desk.hydrate().await {
        AuthState::Authenticated(_) => Ok(desk),
        _ => bail!("Not logged in. Run `labdesk login`."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let json = cli.json;
    match cli.command {
        Commands::Configure {
            url,
            insecure,
            per_page,
            timeout,
        } => {
            let mut config = Config::load().unwrap_or_default();
            if let Some(url) = url {
                config.url = url;
            }
            if let Some(insecure) = insecure {
                config.allow_insecure_certs = insecure;
            }
            if per_page.is_some() {
                config.per_page = per_page;
            }
            if let Some(timeout) = timeout {
                config.request_timeout_secs = timeout;
            }
            config.save()?;
            println!("Saved {}", Config::get_path_string()?);
        }

        Commands::Login { username } => {
            let mut config = Config::load().context("Run `labdesk configure --url ...` first")?;
            let username = match username {
                Some(u) => u,
                None if !config.username.is_empty() => config.username.clone(),
                None => prompt("Username", false)?,
            };
            let password = prompt("Password", true)?;
            let desk = open_desk(config.clone())?;
            let user = desk.login(&username, &password).await?;
            if config.username != user.username {
                config.username = user.username.clone();
                config.save()?;
            }
            println!("Logged in as {} ({})", user.name, user.role);
        }

        Commands::Logout => {
            let desk = open_desk(Config::load()?)?;
            desk.logout().await;
            println!("Logged out.");
        }

        Commands::Whoami => {
            let desk = authenticated_desk().await?;
            if let Some(user) = desk.current_user() {
                if json {
                    print_json(&user)?;
                } else {
                    println!("{} <{}> {}", user.name, user.username, user.role);
                }
            }
        }

        Commands::Dashboard => {
            let desk = authenticated_desk().await?;
            let d = desk.client().dashboard().await?;
            if json {
                print_json(&d)?;
            } else {
                println!("Revenue today:      {:.2}", d.revenue_today);
                println!("Transactions today: {}", d.transactions_today);
                println!("Patients today:     {}", d.patients_today);
                println!("Pending tests:      {}", d.pending_tests);
                println!("Low-stock items:    {}", d.low_stock_items);
            }
        }

        Commands::Patients { search, page } => {
            let desk = authenticated_desk().await?;
            let query = search_query(search).per_page(desk.config().per_page);
            let rows = desk.client().patients(&query, page).await?;
            print_page(json, &rows, |p| {
                format!(
                    "#{:<6} {:<12} {}",
                    p.id,
                    p.patient_no.as_deref().unwrap_or("-"),
                    p.display_name()
                )
            })?;
        }

        Commands::Patient { id } => {
            let desk = authenticated_desk().await?;
            print_json(&desk.client().patient(id).await?)?;
        }

        Commands::Inventory {
            search,
            page,
            transactions,
        } => {
            let desk = authenticated_desk().await?;
            let query = search_query(search).per_page(desk.config().per_page);
            if transactions {
                let rows = desk.client().inventory_transactions(&query, page).await?;
                print_page(json, &rows, |t| {
                    format!(
                        "#{:<6} {:?} {} x{}",
                        t.id,
                        t.kind,
                        t.item_name.as_deref().unwrap_or("?"),
                        t.quantity
                    )
                })?;
            } else {
                let rows = desk.client().inventory(&query, page).await?;
                print_page(json, &rows, |i| {
                    let flag = if i.is_low_stock() { " LOW" } else { "" };
                    format!("#{:<6} {:<30} {}{}", i.id, i.name, i.quantity, flag)
                })?;
            }
        }

        Commands::LabQueue { status, page } => {
            let desk = authenticated_desk().await?;
            let summary = desk.client().lab_queue_summary().await?;
            let mut query = ListQuery::new().per_page(desk.config().per_page);
            if let Some(status) = status {
                query = query.filter("status", status.as_str());
            }
            let rows = desk.client().lab_tests(&query, page).await?;
            if json {
                print_json(&(summary, rows))?;
            } else {
                println!(
                    "pending {}  processing {}  completed {}  released {}",
                    summary.pending, summary.processing, summary.completed, summary.released
                );
                print_page(false, &rows, |t| {
                    format!(
                        "#{:<6} {:<10} {} / {}",
                        t.id,
                        t.status.as_str(),
                        t.patient_name,
                        t.service_name
                    )
                })?;
            }
        }

        Commands::Services { search, page } => {
            let desk = authenticated_desk().await?;
            let query = search_query(search).per_page(desk.config().per_page);
            let rows = desk.client().services(&query, page).await?;
            print_page(json, &rows, |s| {
                let active = if s.is_active { "" } else { " (inactive)" };
                format!("#{:<6} {:<30} {:>10.2}{}", s.id, s.name, s.price, active)
            })?;
        }

        Commands::Discounts { page } => {
            let desk = authenticated_desk().await?;
            let query = ListQuery::new().per_page(desk.config().per_page);
            let rows = desk.client().discounts(&query, page).await?;
            print_page(json, &rows, |d| {
                format!("#{:<6} {:<30} {:?} {}", d.id, d.name, d.kind, d.value)
            })?;
        }

        Commands::Users { search, page } => {
            let desk = authenticated_desk().await?;
            let query = search_query(search).per_page(desk.config().per_page);
            let rows = desk.client().users(&query, page).await?;
            print_page(json, &rows, |u| {
                format!("#{:<6} {:<20} {:<12} {}", u.id, u.username, u.role, u.name)
            })?;
        }

        Commands::Reconcile { action } => {
            let desk = authenticated_desk().await?;
            match action {
                ReconcileAction::Preview { cash } => {
                    let preview = desk.reconciliation_preview().await?;
                    println!(
                        "{}: expected {:.2} from {} transactions",
                        preview.date, preview.expected_cash, preview.transaction_count
                    );
                    if let Some(cash) = cash {
                        let v = LabDesk::project_variance(&preview, &cash)?;
                        println!("Variance {} ({})", v.display(), v.status);
                    }
                }
                ReconcileAction::Submit { cash, notes } => {
                    let rec = desk.submit_reconciliation(&cash, notes).await?;
                    if json {
                        print_json(&rec)?;
                    } else {
                        println!("{}", reconciliation_line(&rec));
                    }
                }
                ReconcileAction::List { page } => {
                    let query = ListQuery::new().per_page(desk.config().per_page);
                    let rows = desk.client().reconciliations(&query, page).await?;
                    print_page(json, &rows, reconciliation_line)?;
                }
                ReconcileAction::Show { id } => {
                    let rec = desk.client().reconciliation(id).await?;
                    if json {
                        print_json(&rec)?;
                    } else {
                        println!("{}", reconciliation_line(&rec));
                        if let Some(cashier) = &rec.cashier {
                            println!("Cashier: {}", cashier.name);
                        }
                        if let Some(notes) = &rec.notes {
                            println!("Notes: {}", notes);
                        }
                    }
                }
            }
        }

        Commands::Report { kind, from, to } => {
            let desk = authenticated_desk().await?;
            let from = from.unwrap_or_else(|| Local::now().date_naive());
            let range = ReportRange::new(from, to.unwrap_or(from))?;
            let client = desk.client();
            match kind {
                ReportKind::Financial => print_json(&client.financial_report(&range).await?)?,
                ReportKind::InventoryLog => {
                    print_json(&client.inventory_log_report(&range).await?)?
                }
                ReportKind::AuditLog => print_json(&client.audit_log_report(&range).await?)?,
                ReportKind::LabReport => print_json(&client.lab_report(&range).await?)?,
            }
        }

        Commands::Address { level } => {
            let desk = authenticated_desk().await?;
            let book = desk.addresses();
            let entries = match level {
                AddressLevel::Regions => book.regions().await?,
                AddressLevel::Provinces { region_code } => book.provinces(&region_code).await?,
                AddressLevel::Cities { province_code } => book.cities(&province_code).await?,
                AddressLevel::Barangays { city_code } => book.barangays(&city_code).await?,
            };
            if json {
                print_json(&entries)?;
            } else {
                for e in entries {
                    println!("{:<12} {}", e.code, e.name);
                }
            }
        }
    }
    Ok(())
}
