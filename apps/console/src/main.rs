use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use dashboard_core::{
    api::{ApiOptions, CreatedIdPolicy, HttpUserApi},
    Dashboard, DashboardEvent, DashboardPage,
};
use shared::{
    domain::{Company, NewUser, UserId},
    query::{SortDirection, SortDirective, SortField},
};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use url::Url;

mod config;

use config::{load_settings, Settings};

/// How long to wait for the debounced search filter to take effect.
const SEARCH_APPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "console", about = "Terminal front-end for the users dashboard")]
struct Cli {
    /// Base URL of the users API; overrides console.toml and environment.
    #[arg(long)]
    api_url: Option<String>,
    /// Print pages as JSON instead of an aligned table.
    #[arg(long)]
    json: bool,
    /// Keep the id the backend echoes for a created record instead of
    /// substituting a local timestamp (use against real deployments).
    #[arg(long)]
    trust_server_ids: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show one page of the directory.
    List {
        /// Keep records whose name or email contains this text.
        #[arg(long, default_value = "")]
        search: String,
        /// Column to sort by: name, email, phone, website or company.
        #[arg(long, default_value_t = SortField::Name)]
        sort: SortField,
        /// Sort descending instead of ascending.
        #[arg(long)]
        desc: bool,
        /// 1-based page to show; past-the-end values land on the last page.
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Rows per page; overrides console.toml and environment.
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Create a record.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        website: String,
        #[arg(long, default_value = "")]
        company: String,
    },
    /// Edit a record; fields not given keep their stored value.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },
    /// Delete a record.
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let Cli {
        api_url,
        json,
        trust_server_ids,
        command,
    } = Cli::parse();
    let settings = load_settings();

    match command {
        Command::List {
            search,
            sort,
            desc,
            page,
            page_size,
        } => {
            let page_size = page_size.unwrap_or(settings.page_size);
            let dashboard = build_dashboard(api_url.as_deref(), trust_server_ids, &settings, page_size)?;
            let mut events = dashboard.subscribe_events();

            let directive = SortDirective {
                field: sort,
                direction: if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                },
            };
            dashboard.set_sort(directive).await;
            dashboard.set_page(page).await;
            if !search.is_empty() {
                dashboard.set_search(search.clone()).await;
                wait_for_search(&mut events, &search).await?;
            }

            let snapshot = dashboard.current_page().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", render_table(&snapshot, directive));
            }
        }
        Command::Create {
            name,
            email,
            phone,
            website,
            company,
        } => {
            let dashboard =
                build_dashboard(api_url.as_deref(), trust_server_ids, &settings, settings.page_size)?;
            let mut events = dashboard.subscribe_events();
            dashboard
                .create_user(NewUser {
                    name,
                    email,
                    phone,
                    website,
                    company: Company { name: company },
                })
                .await;
            report_outcome(&mut events)?;
        }
        Command::Update {
            id,
            name,
            email,
            phone,
            website,
            company,
        } => {
            let dashboard =
                build_dashboard(api_url.as_deref(), trust_server_ids, &settings, settings.page_size)?;
            let mut events = dashboard.subscribe_events();
            let id = UserId(id);
            let Some(mut user) = dashboard.find_user(id).await? else {
                bail!("no user with id {}", id.0);
            };
            if let Some(v) = name {
                user.name = v;
            }
            if let Some(v) = email {
                user.email = v;
            }
            if let Some(v) = phone {
                user.phone = v;
            }
            if let Some(v) = website {
                user.website = v;
            }
            if let Some(v) = company {
                user.company.name = v;
            }
            dashboard.update_user(user).await;
            report_outcome(&mut events)?;
        }
        Command::Delete { id } => {
            let dashboard =
                build_dashboard(api_url.as_deref(), trust_server_ids, &settings, settings.page_size)?;
            let mut events = dashboard.subscribe_events();
            dashboard.delete_user(UserId(id)).await;
            report_outcome(&mut events)?;
        }
    }

    Ok(())
}

fn build_dashboard(
    api_url_flag: Option<&str>,
    trust_server_ids: bool,
    settings: &Settings,
    page_size: u32,
) -> Result<Arc<Dashboard>> {
    let raw_url = api_url_flag
        .map(str::to_string)
        .unwrap_or_else(|| settings.api_url.clone());
    let base_url =
        Url::parse(&raw_url).with_context(|| format!("invalid API url '{raw_url}'"))?;

    let mut options = ApiOptions::new(base_url);
    options.timeout = Duration::from_secs(settings.request_timeout_secs);
    options.created_id_policy = if trust_server_ids || settings.trust_server_ids {
        CreatedIdPolicy::ServerAssigned
    } else {
        CreatedIdPolicy::LocalClock
    };

    let api = Arc::new(HttpUserApi::new(options)?);
    Ok(Dashboard::new_with_settings(
        api,
        page_size,
        Duration::from_millis(settings.debounce_ms),
    ))
}

/// Blocks until the session reports the search text as applied; the
/// filter only takes effect after the debounce window.
async fn wait_for_search(
    events: &mut broadcast::Receiver<DashboardEvent>,
    expected: &str,
) -> Result<()> {
    tokio::time::timeout(SEARCH_APPLY_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(DashboardEvent::SearchApplied { text }) if text == expected => return Ok(()),
                Ok(_) => continue,
                Err(err) => return Err(anyhow!("event channel closed: {err}")),
            }
        }
    })
    .await
    .context("timed out waiting for the search filter to apply")?
}

/// Prints every notification the session emitted and fails if any of
/// them reported a failed operation.
fn report_outcome(events: &mut broadcast::Receiver<DashboardEvent>) -> Result<()> {
    let mut failed = None;
    while let Ok(event) = events.try_recv() {
        println!("{}", describe_event(&event));
        if let DashboardEvent::OperationFailed { action, .. } = event {
            failed = Some(action);
        }
    }
    match failed {
        Some(action) => bail!("{action} did not complete"),
        None => Ok(()),
    }
}

fn describe_event(event: &DashboardEvent) -> String {
    match event {
        DashboardEvent::CollectionLoaded { total } => format!("loaded {total} users"),
        DashboardEvent::SearchApplied { text } => format!("search applied: \"{text}\""),
        DashboardEvent::UserCreated { id } => format!("created user {}", id.0),
        DashboardEvent::UserUpdated { id } => format!("updated user {}", id.0),
        DashboardEvent::UserDeleted { id } => format!("deleted user {}", id.0),
        DashboardEvent::OperationFailed { action, message } => {
            format!("could not {action}: {message}")
        }
    }
}

/// Renders a page as an aligned table: an id column, one column per
/// sortable field with a direction marker on the active one, and the
/// "Showing X to Y of Z results" footer.
fn render_table(page: &DashboardPage, sort: SortDirective) -> String {
    let mut headers = vec!["ID".to_string()];
    for field in SortField::ALL {
        let mut label = field.as_str().to_uppercase();
        if field == sort.field {
            label.push_str(match sort.direction {
                SortDirection::Ascending => " ^",
                SortDirection::Descending => " v",
            });
        }
        headers.push(label);
    }

    let rows: Vec<Vec<String>> = page
        .users
        .iter()
        .map(|user| {
            vec![
                user.id.0.to_string(),
                user.name.clone(),
                user.email.clone(),
                user.phone.clone(),
                user.website.clone(),
                user.company.name.clone(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|cell| cell.chars().count()).collect();
    for row in &rows {
        for (column, cell) in row.iter().enumerate() {
            widths[column] = widths[column].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &headers, &widths);
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }

    let (start, end) = page.display_range();
    out.push_str(&format!(
        "Showing {start} to {end} of {} results (page {} of {})\n",
        page.total_matched, page.page, page.page_count
    ));
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (column, cell) in cells.iter().enumerate() {
        if column > 0 {
            line.push_str("  ");
        }
        line.push_str(cell);
        if column + 1 < cells.len() {
            let pad = widths[column].saturating_sub(cell.chars().count());
            line.push_str(&" ".repeat(pad));
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
