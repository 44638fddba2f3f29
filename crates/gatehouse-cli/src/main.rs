use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use gatehouse_core::checkin::{CheckInOutcome, CheckInService};
use gatehouse_core::config::{self, GateConfig};
use gatehouse_core::directory::MemberDirectory;
use gatehouse_core::ledger::LedgerStore;
use gatehouse_core::model::{Guest, Member, ProfileId};
use gatehouse_core::storage::{create_backend, Storage};
use gatehouse_core::sync::{SyncClient, SyncCoordinator};
use gatehouse_core::validation::GuestRules;
use gatehouse_core::GateError;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gatehouse", about = "Gatehouse: member and guest check-in at the gate", version)]
enum Cli {
    /// Initialize Gatehouse config in the current directory
    Init,
    /// Show configuration, sync state and today's totals
    Info,
    /// Search members by name, id, household, contact or plate
    Search {
        /// Search query
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// List all members in the downloaded roster
    List {
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Show whether a member is checked in today
    Status {
        /// Member profile id
        id: ProfileId,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Check in a member, optionally with guests
    #[command(name = "checkin")]
    CheckIn {
        /// Member profile id
        id: ProfileId,
        /// Guest name (can be repeated)
        #[arg(short, long = "guest")]
        guest: Vec<String>,
        /// Free-text notes for the check-in
        #[arg(long)]
        notes: Option<String>,
    },
    /// Add guests to a member already checked in today
    AddGuests {
        /// Member profile id
        id: ProfileId,
        /// Guest name (can be repeated)
        #[arg(short, long = "guest", required = true)]
        guest: Vec<String>,
    },
    /// List guest names a member has brought before
    Guests {
        /// Member profile id
        id: ProfileId,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a manual gate alert
    Alert {
        /// Alert message
        message: String,
        /// Member the alert concerns
        #[arg(long)]
        profile_id: Option<ProfileId>,
        /// Guest the alert concerns
        #[arg(long)]
        guest: Option<String>,
    },
    /// Show today's check-ins and alerts
    Today {
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Download the member roster (starts a new day)
    Download,
    /// Upload today's check-ins and alerts
    Upload {
        /// Print the payload instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Load a member roster from a JSON file
    Import {
        /// Input file path
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gatehouse=warn,gatehouse_core=warn")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let config = GateConfig::load(Some(&std::env::current_dir()?))
        .unwrap_or_else(|_| GateConfig::default_config());

    let result = run(cli, &config).await;
    if let Err(ref err) = result {
        let friendly = format_network_error(err, &config);
        if friendly != format!("{}", err) {
            eprintln!("{}", friendly);
            std::process::exit(1);
        }
    }
    result
}

async fn run(cli: Cli, config: &GateConfig) -> Result<()> {
    match cli {
        Cli::Init => cmd_init(&std::env::current_dir()?),
        Cli::Info => {
            let storage = make_storage(config)?;
            cmd_info(&storage, config).await
        }
        Cli::Search { query, limit, json } => {
            let storage = make_storage(config)?;
            cmd_search(&storage, &query, limit, json).await
        }
        Cli::List { json } => {
            let storage = make_storage(config)?;
            cmd_list(&storage, json).await
        }
        Cli::Status { id, json } => {
            let storage = make_storage(config)?;
            cmd_status(&storage, config, id, json).await
        }
        Cli::CheckIn { id, guest, notes } => {
            let storage = make_storage(config)?;
            cmd_checkin(&storage, config, id, guest, notes).await
        }
        Cli::AddGuests { id, guest } => {
            let storage = make_storage(config)?;
            cmd_add_guests(&storage, config, id, guest).await
        }
        Cli::Guests { id, json } => {
            let storage = make_storage(config)?;
            cmd_guests(&storage, config, id, json).await
        }
        Cli::Alert {
            message,
            profile_id,
            guest,
        } => {
            let storage = make_storage(config)?;
            cmd_alert(&storage, config, &message, profile_id, guest).await
        }
        Cli::Today { json } => {
            let storage = make_storage(config)?;
            cmd_today(&storage, config, json).await
        }
        Cli::Download => {
            let storage = make_storage(config)?;
            cmd_download(&storage, config).await
        }
        Cli::Upload { dry_run } => {
            let storage = make_storage(config)?;
            cmd_upload(&storage, config, dry_run).await
        }
        Cli::Import { path } => {
            let storage = make_storage(config)?;
            cmd_import(&storage, config, Path::new(&path)).await
        }
    }
}

fn make_storage(config: &GateConfig) -> Result<Storage> {
    create_backend(config).context("failed to create storage backend")
}

fn coordinator<'a>(storage: &'a Storage, config: &GateConfig) -> SyncCoordinator<'a> {
    SyncCoordinator::new(
        storage,
        config::resolve_device_id(&config.sync),
        config.rules.calendar(),
    )
}

/// Format connection failures against the club server with a hint.
fn format_network_error(err: &anyhow::Error, config: &GateConfig) -> String {
    let Some(gate_err) = err.downcast_ref::<GateError>().filter(|e| e.is_transient()) else {
        return format!("{}", err);
    };
    let (headline, detail) = match gate_err {
        GateError::Http(_) => (
            "Error: club server unavailable",
            format!("Cannot reach the club server at {}.", config.sync.base_url),
        ),
        other => (
            "Error: club server busy",
            format!("The club server at {} answered: {}.", config.sync.base_url, other),
        ),
    };
    format!(
        "{}\n\n  {}\n  Check the network connection and {} in .gatehouse/config.toml.\n  Check-ins keep working offline; upload again later.\n",
        headline.red(),
        detail,
        "[sync] base_url".cyan()
    )
}

/// Print a check-in result. Rejections become errors so the process exits non-zero.
fn report_outcome(outcome: &CheckInOutcome) -> Result<()> {
    if !outcome.success {
        anyhow::bail!("{}", outcome.message);
    }
    println!("{}", outcome.message.green());
    for name in &outcome.flagged_guests {
        println!(
            "  {} {} is over the seasonal visit limit. An alert was recorded.",
            "!".yellow().bold(),
            name.yellow()
        );
    }
    Ok(())
}

async fn warn_if_stale(storage: &Storage, config: &GateConfig) {
    if !coordinator(storage, config).is_fresh().await {
        eprintln!(
            "{} member data was not downloaded today. Run {} for the current roster.",
            "warning:".yellow(),
            "gatehouse download".cyan()
        );
    }
}

fn guests_from_names(names: Vec<String>) -> Vec<Guest> {
    names.into_iter().map(Guest::new).collect()
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn cmd_init(dir: &Path) -> Result<()> {
    let site_dir = dir.join(".gatehouse");

    if site_dir.join("config.toml").exists() {
        println!("Gatehouse already initialized here.");
        return Ok(());
    }

    std::fs::create_dir_all(&site_dir)?;

    let config = GateConfig::default_config();
    let header = "# Gatehouse site config\n# Put the API key in .gatehouse/config.local.toml under [sync]\n\n";
    let toml_str = format!("{}{}", header, toml::to_string_pretty(&config)?);
    std::fs::write(site_dir.join("config.toml"), toml_str)?;

    // Keep config.local.toml (API key) out of version control
    let gitignore_path = dir.join(".gitignore");
    let entry = ".gatehouse/config.local.toml";
    if gitignore_path.exists() {
        let contents = std::fs::read_to_string(&gitignore_path)?;
        if !contents.lines().any(|l| l.trim() == entry) {
            let mut appended = contents;
            if !appended.ends_with('\n') {
                appended.push('\n');
            }
            appended.push_str(entry);
            appended.push('\n');
            std::fs::write(&gitignore_path, appended)?;
        }
    } else {
        std::fs::write(&gitignore_path, format!("{entry}\n"))?;
    }

    println!("{}", "Initialized Gatehouse in .gatehouse/".green());
    println!("  {}   .gatehouse/config.toml", "Config:".dimmed());
    println!("  {} {}", "Storage:".dimmed(), config.storage.backend.cyan());
    println!(
        "  {}",
        "Set [sync] api_key in .gatehouse/config.local.toml (gitignored)".dimmed()
    );
    println!();
    println!("  Next: {}", "gatehouse download".cyan());
    Ok(())
}

// ---------------------------------------------------------------------------
// info
// ---------------------------------------------------------------------------

async fn cmd_info(storage: &Storage, config: &GateConfig) -> Result<()> {
    let sync = coordinator(storage, config);
    let status = sync.status().await;
    let directory = MemberDirectory::load(storage).await;
    let (start, end) = config.rules.calendar().warm_months();

    println!("{}", "Gatehouse".bold());
    println!("  {}   {}", "Storage:".dimmed(), storage.backend_name().cyan());
    println!("  {}    {}", "Server:".dimmed(), config.sync.base_url);
    println!("  {}    {}", "Device:".dimmed(), sync.device_id());
    println!(
        "  {}    {} (summer months {start}-{end})",
        "Season:".dimmed(),
        status.season.to_string().cyan()
    );
    println!();

    let downloaded = match status.last_downloaded {
        Some(ts) => {
            let local = ts.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M");
            if status.is_fresh {
                format!("{}", local.green())
            } else {
                format!("{} {}", local.yellow(), "(stale)".yellow())
            }
        }
        None => format!("{}", "never".yellow()),
    };
    println!("  {}  {}", "Downloaded:".dimmed(), downloaded);
    println!("  {}     {}", "Members:".dimmed(), directory.len());
    println!("  {}   {}", "Check-ins:".dimmed(), status.pending_check_ins);
    println!("  {}      {}", "Alerts:".dimmed(), status.pending_alerts);
    println!(
        "  {}       {} visits/guest/season, {} guests/member/day",
        "Rules:".dimmed(),
        config.rules.max_visits_per_season,
        config.rules.max_guests_per_day
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// search / list
// ---------------------------------------------------------------------------

fn print_member_table(members: &[&Member]) {
    println!(
        "  {}  {}  {}",
        format!("{:<8}", "ID").dimmed(),
        format!("{:<28}", "Name").dimmed(),
        "Category".dimmed(),
    );
    println!("{}", "─".repeat(60).dimmed());
    for member in members {
        let category = if member.category.is_empty() {
            "-"
        } else {
            member.category.as_str()
        };
        println!(
            "  {}  {:<28}  {}",
            format!("{:<8}", member.profile_id).cyan(),
            member.name,
            category.dimmed(),
        );
    }
    println!("{}", "─".repeat(60).dimmed());
    println!(
        "  {} member{}",
        members.len(),
        if members.len() == 1 { "" } else { "s" }
    );
}

async fn cmd_search(storage: &Storage, query: &str, limit: usize, json: bool) -> Result<()> {
    let directory = MemberDirectory::load(storage).await;
    let hits = directory.search(query, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }
    if directory.is_empty() {
        println!("No member data. Run {} first.", "gatehouse download".cyan());
        return Ok(());
    }
    if hits.is_empty() {
        println!("No members match '{}'.", query);
        return Ok(());
    }
    print_member_table(&hits);
    Ok(())
}

async fn cmd_list(storage: &Storage, json: bool) -> Result<()> {
    let directory = MemberDirectory::load(storage).await;
    if json {
        println!("{}", serde_json::to_string_pretty(directory.members())?);
        return Ok(());
    }
    if directory.is_empty() {
        println!("No member data. Run {} first.", "gatehouse download".cyan());
        return Ok(());
    }
    let mut members: Vec<&Member> = directory.members().iter().collect();
    members.sort_by_key(|m| m.name.to_lowercase());
    print_member_table(&members);
    Ok(())
}

// ---------------------------------------------------------------------------
// status / checkin / add-guests / guests
// ---------------------------------------------------------------------------

async fn cmd_status(storage: &Storage, config: &GateConfig, id: ProfileId, json: bool) -> Result<()> {
    let directory = MemberDirectory::load(storage).await;
    let service = CheckInService::new(
        LedgerStore::new(storage),
        &directory,
        GuestRules::from(&config.rules),
    );
    let status = service.status(id).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let name = status
        .name
        .clone()
        .unwrap_or_else(|| format!("Member {id} (not in roster)"));
    match status.check_in {
        Some(ref record) => {
            println!(
                "{} {} since {}",
                name.bold(),
                "checked in".green(),
                record.check_in_time.format("%H:%M")
            );
            if !record.guests.is_empty() {
                println!("  {}", "Guests:".dimmed());
                for guest in &record.guests {
                    match guest.notes {
                        Some(ref notes) => println!("    {} {}", guest.name, notes.yellow()),
                        None => println!("    {}", guest.name),
                    }
                }
            }
            if let Some(ref notes) = record.notes {
                println!("  {} {}", "Notes:".dimmed(), notes);
            }
        }
        None => println!("{} {}", name.bold(), "not checked in today".dimmed()),
    }
    Ok(())
}

async fn cmd_checkin(
    storage: &Storage,
    config: &GateConfig,
    id: ProfileId,
    guests: Vec<String>,
    notes: Option<String>,
) -> Result<()> {
    warn_if_stale(storage, config).await;
    let directory = MemberDirectory::load(storage).await;
    let service = CheckInService::new(
        LedgerStore::new(storage),
        &directory,
        GuestRules::from(&config.rules),
    );
    let outcome = service
        .check_in_by_id(id, guests_from_names(guests), notes)
        .await
        .context("check-in could not be saved")?;
    report_outcome(&outcome)
}

async fn cmd_add_guests(
    storage: &Storage,
    config: &GateConfig,
    id: ProfileId,
    guests: Vec<String>,
) -> Result<()> {
    let directory = MemberDirectory::load(storage).await;
    let service = CheckInService::new(
        LedgerStore::new(storage),
        &directory,
        GuestRules::from(&config.rules),
    );
    let outcome = service
        .add_guests(id, guests_from_names(guests))
        .await
        .context("guests could not be saved")?;
    report_outcome(&outcome)
}

async fn cmd_guests(storage: &Storage, config: &GateConfig, id: ProfileId, json: bool) -> Result<()> {
    let directory = MemberDirectory::load(storage).await;
    let service = CheckInService::new(
        LedgerStore::new(storage),
        &directory,
        GuestRules::from(&config.rules),
    );
    let names = service.previous_guest_names(id).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }
    if names.is_empty() {
        println!("No previous guests for member {id}.");
        return Ok(());
    }
    for name in &names {
        println!("  {}", name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// alert / today
// ---------------------------------------------------------------------------

async fn cmd_alert(
    storage: &Storage,
    config: &GateConfig,
    message: &str,
    profile_id: Option<ProfileId>,
    guest: Option<String>,
) -> Result<()> {
    let directory = MemberDirectory::load(storage).await;
    let service = CheckInService::new(
        LedgerStore::new(storage),
        &directory,
        GuestRules::from(&config.rules),
    );
    let alert = service
        .create_manual_alert(profile_id, guest, message)
        .await
        .context("alert could not be saved")?;
    println!(
        "{} {} ({})",
        "Alert recorded:".green(),
        alert.message,
        alert.season
    );
    Ok(())
}

async fn cmd_today(storage: &Storage, config: &GateConfig, json: bool) -> Result<()> {
    let directory = MemberDirectory::load(storage).await;
    let service = CheckInService::new(
        LedgerStore::new(storage),
        &directory,
        GuestRules::from(&config.rules),
    );
    let check_ins = service.todays_check_ins().await;
    let alerts = service.todays_alerts().await;

    if json {
        let out = serde_json::json!({ "checkins": check_ins, "alerts": alerts });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if check_ins.is_empty() {
        println!("No check-ins yet today.");
    } else {
        println!("{}", "Check-ins".bold());
        for record in &check_ins {
            let name = directory
                .get(record.profile_id)
                .map(|m| m.name.as_str())
                .unwrap_or("?");
            let guests = if record.guests.is_empty() {
                String::new()
            } else {
                format!(" + {}", record.guest_names().join(", "))
            };
            println!(
                "  {}  {}  {}{}",
                record.check_in_time.format("%H:%M").to_string().dimmed(),
                format!("{:<8}", record.profile_id).cyan(),
                name,
                guests
            );
        }
    }

    if !alerts.is_empty() {
        println!();
        println!("{}", "Alerts".bold());
        for alert in &alerts {
            println!("  {} {}", alert.alert_type.to_string().yellow(), alert.message);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// download / upload / import
// ---------------------------------------------------------------------------

async fn cmd_download(storage: &Storage, config: &GateConfig) -> Result<()> {
    let client = SyncClient::new(&config.sync)?;
    let sync = coordinator(storage, config);
    let count = sync
        .download(&client)
        .await
        .with_context(|| format!("download from {} failed", client.download_url()))?;
    println!(
        "{} {} members. Today's check-ins start fresh.",
        "Downloaded".green(),
        count
    );
    Ok(())
}

async fn cmd_upload(storage: &Storage, config: &GateConfig, dry_run: bool) -> Result<()> {
    let sync = coordinator(storage, config);

    if dry_run {
        let payload = sync
            .prepare_upload()
            .await
            .context("failed to read today's records")?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let client = SyncClient::new(&config.sync)?;
    let summary = sync
        .upload(&client)
        .await
        .with_context(|| format!("upload to {} failed", client.upload_url()))?;
    match summary {
        Some(s) => {
            println!(
                "{} {} records ({} ok, {} failed, {} duplicates). Local records cleared.",
                "Uploaded".green(),
                s.total,
                s.successful,
                s.failed,
                s.duplicates
            );
            if s.failed > 0 {
                println!(
                    "  {} the server rejected {} record(s).",
                    "!".yellow().bold(),
                    s.failed
                );
            }
        }
        None => println!("Nothing to upload."),
    }
    Ok(())
}

async fn cmd_import(storage: &Storage, config: &GateConfig, path: &Path) -> Result<()> {
    let count = coordinator(storage, config)
        .import_file(path)
        .await
        .with_context(|| format!("failed to import {}", path.display()))?;
    println!(
        "{} {} members from {}",
        "Imported".green(),
        count,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::model::{DirectorySnapshot, GuestVisit};
    use gatehouse_core::storage::SqliteStore;

    fn test_storage() -> Storage {
        Storage::Sqlite(SqliteStore::open_in_memory().unwrap())
    }

    fn test_config() -> GateConfig {
        let mut config = GateConfig::default_config();
        config.sync.device_id = Some("test-gate".into());
        config
    }

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("gatehouse-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn seed_roster(storage: &Storage, config: &GateConfig) {
        let today = chrono::Local::now().date_naive();
        let snapshot = DirectorySnapshot::new(vec![
            Member::new(100, "Jordan Ellis")
                .with_guest_visit(GuestVisit::new("Sam", today))
                .with_guest_visit(GuestVisit::new("Sam", today))
                .with_guest_visit(GuestVisit::new("Sam", today)),
            Member::new(200, "Riley Park"),
        ]);
        coordinator(storage, config)
            .ingest_download(&snapshot)
            .await
            .unwrap();
    }

    async fn ledger_len(storage: &Storage) -> usize {
        LedgerStore::new(storage).read_check_ins().await.len()
    }

    // -----------------------------------------------------------------------
    // init
    // -----------------------------------------------------------------------

    #[test]
    fn test_cmd_init_writes_config_and_gitignore() {
        let dir = temp_dir();
        cmd_init(&dir).unwrap();

        let written = std::fs::read_to_string(dir.join(".gatehouse/config.toml")).unwrap();
        let parsed: GateConfig = toml::from_str(&written).unwrap();
        assert_eq!(parsed.rules.max_guests_per_day, 5);
        let gitignore = std::fs::read_to_string(dir.join(".gitignore")).unwrap();
        assert!(gitignore.contains(".gatehouse/config.local.toml"));

        // second run leaves everything alone
        cmd_init(&dir).unwrap();
        let gitignore = std::fs::read_to_string(dir.join(".gitignore")).unwrap();
        assert_eq!(gitignore.matches("config.local.toml").count(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    // -----------------------------------------------------------------------
    // search / list / info
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_cmd_search_and_list() {
        let storage = test_storage();
        let config = test_config();
        assert!(cmd_search(&storage, "jordan", 10, false).await.is_ok());
        seed_roster(&storage, &config).await;
        assert!(cmd_search(&storage, "jordan", 10, true).await.is_ok());
        assert!(cmd_search(&storage, "nobody", 10, false).await.is_ok());
        assert!(cmd_list(&storage, false).await.is_ok());
        assert!(cmd_list(&storage, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_cmd_info_empty_and_seeded() {
        let storage = test_storage();
        let config = test_config();
        assert!(cmd_info(&storage, &config).await.is_ok());
        seed_roster(&storage, &config).await;
        assert!(cmd_info(&storage, &config).await.is_ok());
    }

    // -----------------------------------------------------------------------
    // checkin / add-guests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_cmd_checkin_then_duplicate_fails() {
        let storage = test_storage();
        let config = test_config();
        seed_roster(&storage, &config).await;

        cmd_checkin(&storage, &config, 200, vec!["Ari".into()], None)
            .await
            .unwrap();
        assert_eq!(ledger_len(&storage).await, 1);

        let err = cmd_checkin(&storage, &config, 200, vec![], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already checked in"));
        assert_eq!(ledger_len(&storage).await, 1);
    }

    #[tokio::test]
    async fn test_cmd_checkin_unknown_member_fails() {
        let storage = test_storage();
        let config = test_config();
        seed_roster(&storage, &config).await;
        assert!(cmd_checkin(&storage, &config, 999, vec![], None).await.is_err());
        assert_eq!(ledger_len(&storage).await, 0);
    }

    #[tokio::test]
    async fn test_cmd_checkin_flags_frequent_guest() {
        let storage = test_storage();
        let config = test_config();
        seed_roster(&storage, &config).await;

        cmd_checkin(&storage, &config, 100, vec!["Sam".into()], None)
            .await
            .unwrap();
        let alerts = LedgerStore::new(&storage).read_alerts().await;
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_cmd_add_guests_requires_checkin_and_cap() {
        let storage = test_storage();
        let config = test_config();
        seed_roster(&storage, &config).await;

        assert!(cmd_add_guests(&storage, &config, 200, vec!["Ari".into()])
            .await
            .is_err());

        cmd_checkin(&storage, &config, 200, vec!["A".into(), "B".into()], None)
            .await
            .unwrap();
        let too_many: Vec<String> = ["C", "D", "E", "F"].iter().map(|s| s.to_string()).collect();
        assert!(cmd_add_guests(&storage, &config, 200, too_many).await.is_err());
        cmd_add_guests(&storage, &config, 200, vec!["C".into()])
            .await
            .unwrap();

        let ledger = LedgerStore::new(&storage).read_check_ins().await;
        assert_eq!(ledger.find(200).unwrap().guests.len(), 3);
    }

    #[tokio::test]
    async fn test_cmd_status_and_guests() {
        let storage = test_storage();
        let config = test_config();
        seed_roster(&storage, &config).await;
        assert!(cmd_status(&storage, &config, 100, false).await.is_ok());
        cmd_checkin(&storage, &config, 100, vec!["Sam".into()], Some("late".into()))
            .await
            .unwrap();
        assert!(cmd_status(&storage, &config, 100, false).await.is_ok());
        assert!(cmd_status(&storage, &config, 100, true).await.is_ok());
        assert!(cmd_guests(&storage, &config, 100, true).await.is_ok());
        assert!(cmd_guests(&storage, &config, 200, false).await.is_ok());
    }

    // -----------------------------------------------------------------------
    // alert / today
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_cmd_alert_and_today() {
        let storage = test_storage();
        let config = test_config();
        seed_roster(&storage, &config).await;

        cmd_alert(&storage, &config, "Gate left open", None, None)
            .await
            .unwrap();
        assert!(cmd_alert(&storage, &config, "   ", Some(100), None)
            .await
            .is_err());
        assert_eq!(LedgerStore::new(&storage).read_alerts().await.len(), 1);

        assert!(cmd_today(&storage, &config, false).await.is_ok());
        assert!(cmd_today(&storage, &config, true).await.is_ok());
    }

    // -----------------------------------------------------------------------
    // upload / import
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_cmd_upload_dry_run_keeps_records() {
        let storage = test_storage();
        let config = test_config();
        seed_roster(&storage, &config).await;
        cmd_checkin(&storage, &config, 200, vec![], None)
            .await
            .unwrap();

        cmd_upload(&storage, &config, true).await.unwrap();
        assert_eq!(ledger_len(&storage).await, 1);
    }

    #[tokio::test]
    async fn test_cmd_import_envelope_file() {
        let storage = test_storage();
        let config = test_config();
        let dir = temp_dir();
        let path = dir.join("roster.json");
        std::fs::write(
            &path,
            r#"{"status":200,"message":"ok","data":{"members":[{"profile_id":7,"name":"Quinn Avery"}]}}"#,
        )
        .unwrap();

        cmd_import(&storage, &config, &path).await.unwrap();
        let directory = MemberDirectory::load(&storage).await;
        assert_eq!(directory.get(7).unwrap().name, "Quinn Avery");

        assert!(cmd_import(&storage, &config, &dir.join("missing.json"))
            .await
            .is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_network_error_gets_hint() {
        let config = test_config();
        let plain = anyhow::anyhow!("something else");
        assert_eq!(format_network_error(&plain, &config), "something else");

        let remote = anyhow::Error::new(GateError::Remote {
            status: 401,
            message: "invalid api key".into(),
        });
        assert_eq!(
            format_network_error(&remote, &config),
            format!("{}", remote)
        );

        let busy = anyhow::Error::new(GateError::Remote {
            status: 503,
            message: "maintenance".into(),
        });
        let friendly = format_network_error(&busy, &config);
        assert!(friendly.contains("club server busy"));
        assert!(friendly.contains("maintenance"));
        assert!(friendly.contains("upload again later"));

        let throttled = anyhow::Error::new(GateError::Remote {
            status: 429,
            message: "slow down".into(),
        });
        assert!(format_network_error(&throttled, &config).contains("upload again later"));

        let locked = anyhow::Error::new(GateError::Storage("database is locked".into()));
        assert_eq!(
            format_network_error(&locked, &config),
            format!("{}", locked)
        );
    }
}
