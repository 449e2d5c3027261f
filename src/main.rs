// Entry point and interactive shell.
//
// The shell owns the session: the canonical dataset built from the
// uploaded files and the current filter selections. Every action calls
// into the library and prints what comes back.
// - Option [1] loads CSV files and rebuilds the dataset.
// - Option [2] chooses team / date filters.
// - Option [3] composes the report, previews it and exports it.
// - Option [0] logs out, which discards the session.
use event_report::credentials::CredentialStore;
use event_report::filter::{date_bounds, distinct_values};
use event_report::output::{export_report, preview_table};
use event_report::pipeline::{build_dataset, current_view, CanonicalDataset, Upload};
use event_report::reports::compose;
use event_report::util::{format_int, parse_date_safe};
use event_report::{AppConfig, DateRange, FilterPredicates};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

const OUTPUT_DIR: &str = "report_output";
const LOGIN_ATTEMPTS: usize = 3;

#[derive(Default)]
struct Session {
    dataset: Option<CanonicalDataset>,
    predicates: FilterPredicates,
}

fn prompt(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    prompt("Enter choice: ")
}

/// Ask the user whether to go back to the menu after generating a report.
fn prompt_back_to_menu() -> bool {
    loop {
        match prompt("Back to Menu (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn login(store: &CredentialStore) -> bool {
    for _ in 0..LOGIN_ATTEMPTS {
        let username = prompt("Username: ");
        let password = prompt("Password: ");
        match store.authenticate(&username, &password) {
            Ok(name) => {
                println!("Welcome, {}.\n", name);
                return true;
            }
            Err(e) => println!("Login failed: {}\n", e),
        }
    }
    false
}

/// Handle option [1]: read files and rebuild the canonical dataset.
fn handle_load(session: &mut Session, config: &AppConfig) {
    let line = prompt("CSV file(s), comma separated: ");
    let mut uploads = Vec::new();
    for path in line.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match Upload::from_path(path) {
            Ok(u) => uploads.push(u),
            Err(e) => eprintln!("Failed to read {}: {}", path, e),
        }
    }
    if uploads.is_empty() {
        println!("No files loaded.\n");
        return;
    }

    let outcome = build_dataset(&uploads, &config.pipeline);
    let dataset = outcome.value;
    for failure in &dataset.failures {
        eprintln!("Failed to load {}: {}", failure.name, failure.error);
    }
    println!(
        "Processing dataset... ({} rows before, {} after removing {} duplicate(s))",
        format_int(dataset.merge.rows_before),
        format_int(dataset.merge.rows_after),
        format_int(dataset.merge.duplicates_removed)
    );
    for advisory in &outcome.advisories {
        println!("Note: {}", advisory);
    }
    println!();
    session.dataset = Some(dataset);
    session.predicates = FilterPredicates::default();
}

/// Handle option [2]: pick teams and a date range for the current view.
fn handle_filters(session: &mut Session, config: &AppConfig) {
    let Some(dataset) = &session.dataset else {
        println!("Error: No data loaded. Please load CSV files first (option 1).\n");
        return;
    };
    let cols = &config.pipeline.columns;
    let mut predicates = FilterPredicates::new();

    if let Ok(teams) = distinct_values(&dataset.table, &cols.team) {
        println!("Teams: {}", teams.join(", "));
        let picked = prompt("Teams to include (comma separated, empty = all): ");
        let selected: Vec<String> = picked
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        predicates = predicates.with_category(&cols.team, selected);
    }

    if let Some((lo, hi)) = date_bounds(&dataset.table, &cols.date) {
        println!("Dates available: {} .. {}", lo, hi);
        let start = parse_date_safe(Some(prompt("From (empty = earliest): ").as_str()));
        let end = parse_date_safe(Some(prompt("To (empty = latest): ").as_str()));
        if start.is_some() || end.is_some() {
            predicates = predicates.with_date_range(&cols.date, DateRange::new(start, end));
        }
    }

    let view = current_view(dataset, &predicates);
    println!(
        "Current view: {} of {} row(s)\n",
        format_int(view.value.len()),
        format_int(dataset.table.len())
    );
    session.predicates = predicates;
}

/// Handle option [3]: compose, preview and export the report.
fn handle_report(session: &Session, config: &AppConfig) {
    let Some(dataset) = &session.dataset else {
        println!("Error: No data loaded. Please load CSV files first (option 1).\n");
        return;
    };
    let view = current_view(dataset, &session.predicates);
    for advisory in &view.advisories {
        println!("Note: {}", advisory);
    }
    let mut pipeline = config.pipeline.clone();
    let answer = prompt(&format!(
        "Exclude attendee outliers (|z| >= {})? (Y/N, empty = {}): ",
        pipeline.outlier_z,
        if pipeline.exclude_outliers { "Y" } else { "N" }
    ));
    match answer.to_uppercase().as_str() {
        "Y" => pipeline.exclude_outliers = true,
        "N" => pipeline.exclude_outliers = false,
        _ => {}
    }
    let report = compose(&view.value, &pipeline).value;

    for (name, section) in report.tables() {
        match section.ready() {
            Some(table) => preview_table(name, None, table, 10),
            None => println!("\n{}\n({})\n", name, section.notice().unwrap_or_default()),
        }
    }
    for (name, section) in report.correlations() {
        match section.ready() {
            Some(c) => match c.value() {
                Some(r) => println!("{}: r = {:.3}", name, r),
                None => println!("{}: {:?}", name, c),
            },
            None => println!("{}: {}", name, section.notice().unwrap_or_default()),
        }
    }
    println!();

    match export_report(OUTPUT_DIR, &report) {
        Ok(files) => println!("(Full tables exported to {}, {} file(s))\n", OUTPUT_DIR, files.len()),
        Err(e) => eprintln!("Write error: {}", e),
    }
}

fn run() -> event_report::Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(&config);

    let store = CredentialStore::from_source(&config.credentials)?;
    store.ensure_users()?;
    if !login(&store) {
        println!("Too many failed attempts.");
        return Ok(());
    }

    let mut session = Session::default();
    loop {
        println!("[1] Load CSV files");
        println!("[2] Choose filters");
        println!("[3] Generate report");
        println!("[0] Log out\n");
        match read_choice().as_str() {
            "1" => handle_load(&mut session, &config),
            "2" => handle_filters(&mut session, &config),
            "3" => {
                println!();
                handle_report(&session, &config);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "0" => {
                println!("Logged out.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-3.\n"),
        }
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }
}
