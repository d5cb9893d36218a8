//! `busctl` - CLI for schoolbus
//!
//! This binary provides the command-line interface for administrators,
//! drivers scanning students on and off the bus, and parents.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use schoolbus::cli::{
    render_table, AuthCommand, Cli, Command, ConfigCommand, ListArgs, OutputFormat,
    ParentCommand, PlanCommand, RecordsCommand, ReportCommand, ResourceCommand, RouteCommand,
    ScanArgs, ScanCommand, ScanFeed, ScanInput,
};
use schoolbus::models::{
    Activatable, Bus, DailyPlan, DailyPlanInput, Direction, EventRecord, Resource, Role, Route,
    RouteStop, School, Stop, Student, Trip, User,
};
use schoolbus::parent::{child_status, resolve_child};
use schoolbus::recorder::Notice;
use schoolbus::report::DailyReport;
use schoolbus::scanner::camera::{self, CameraSelector};
use schoolbus::scanner::{LineSource, ScanSource};
use schoolbus::{
    init_logging, listing, ApiClient, Config, DriverContext, Recorder, RecorderState, Session,
    SessionStore,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(cli));
    // stdin readers block a worker thread; do not wait for them.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = e
                .downcast_ref::<schoolbus::Error>()
                .map_or_else(|| format!("{e:#}"), schoolbus::Error::user_message);
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Config commands must work even when the config does not load.
    if let Command::Config(cmd) = cli.command {
        return handle_config(cli.config, cmd);
    }

    let config = Config::load_from(cli.config.clone())?;
    let app = App::new(config)?;

    match cli.command {
        Command::Auth(cmd) => handle_auth(&app, cmd).await,
        Command::School(cmd) => handle_resource::<School>(&app, cmd).await,
        Command::Student(cmd) => handle_resource::<Student>(&app, cmd).await,
        Command::User(cmd) => handle_resource::<User>(&app, cmd).await,
        Command::Bus(cmd) => handle_resource::<Bus>(&app, cmd).await,
        Command::Route(cmd) => handle_route(&app, cmd).await,
        Command::Stop(cmd) => handle_resource::<Stop>(&app, cmd).await,
        Command::Trip(cmd) => handle_resource::<Trip>(&app, cmd).await,
        Command::Plan(cmd) => handle_plan(&app, cmd).await,
        Command::Records(cmd) => handle_records(&app, cmd).await,
        Command::Scan(cmd) => handle_scan(&app, cmd).await,
        Command::Report(cmd) => handle_report(&app, cmd).await,
        Command::Parent(cmd) => handle_parent(&app, cmd).await,
        Command::Config(_) => Ok(()),
    }
}

/// Everything a command handler needs.
#[derive(Debug)]
struct App {
    config: Config,
    api: ApiClient,
    store: SessionStore,
    session: Option<Session>,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let store = SessionStore::new(config.session_path());
        let session = store.load()?;
        let api = ApiClient::new(&config.api)?.with_session_store(store.clone());
        api.set_session(session.as_ref());
        if let Some(session) = &session {
            debug!("Loaded session for {}", session.describe());
        }
        Ok(Self {
            config,
            api,
            store,
            session,
        })
    }

    fn session(&self) -> Result<&Session> {
        Ok(self.session.as_ref().ok_or(schoolbus::Error::NotLoggedIn)?)
    }

    /// Any staff session.
    fn staff(&self) -> Result<&User> {
        let session = self.session()?;
        match session.user() {
            Some(user) => Ok(user),
            None => Err(schoolbus::Error::WrongRole {
                role: session.role().to_string(),
                action: "use staff commands",
            }
            .into()),
        }
    }

    fn admin(&self, action: &'static str) -> Result<&User> {
        Ok(self.session()?.require_staff(Role::Admin, action)?)
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        self.store.save(session)?;
        Ok(())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        println!("{notice}");
    }
}

async fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let line = lines
        .next_line()
        .await?
        .context("no input on stdin")?;
    Ok(line.trim().to_string())
}

async fn handle_auth(app: &App, cmd: AuthCommand) -> Result<()> {
    match cmd {
        AuthCommand::Login {
            email,
            password,
            admin,
        } => {
            let password = match password {
                Some(password) => password,
                None => prompt_line("Password: ").await?,
            };
            let session = if admin {
                app.api.admin_login(&email, &password).await?
            } else {
                app.api.login(&email, &password).await?
            };
            app.save_session(&session)?;
            println!("Logged in as {}", session.describe());
        }
        AuthCommand::ParentLogin { qr_code } => {
            let session = app.api.parent_login(&qr_code).await?;
            app.save_session(&session)?;
            println!("Logged in as {}", session.describe());
        }
        AuthCommand::Logout => {
            if app.session.is_none() {
                println!("Not logged in.");
                return Ok(());
            }
            if let Err(e) = app.api.logout().await {
                warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
            app.store.clear()?;
            println!("Logged out.");
        }
        AuthCommand::Whoami { remote } => {
            if remote {
                let user = app.api.me().await?;
                println!("{} <{}> ({})", user.full_name(), user.email, user.role);
            } else {
                let session = app.session()?;
                println!("{}", session.describe());
                println!("Session file: {}", app.store.path().display());
            }
        }
    }
    Ok(())
}

fn assignments(set: Vec<(String, Value)>) -> Map<String, Value> {
    set.into_iter().collect()
}

async fn handle_resource<R>(app: &App, cmd: ResourceCommand) -> Result<()>
where
    R: Resource + Activatable,
{
    match cmd {
        ResourceCommand::List(args) => {
            app.staff()?;
            let items = app.api.list::<R>().await?;
            print_list(items, &args)?;
        }
        ResourceCommand::Get { id, json } => {
            app.staff()?;
            let item: R = app.api.fetch(id).await?;
            if json {
                print_json(&item)?;
            } else {
                print!("{}", render_table(R::COLUMNS, &[item.row()]));
            }
        }
        ResourceCommand::Create { set } => {
            app.admin("manage resources")?;
            let input: R::Input = serde_json::from_value(Value::Object(assignments(set)))
                .with_context(|| format!("invalid {} fields", R::NAME))?;
            let created: R = app.api.create(&input).await?;
            println!("Created {} {}", R::NAME, created.id());
        }
        ResourceCommand::Update { id, set } => {
            app.admin("manage resources")?;
            let updated: R = app.api.patch(id, assignments(set)).await?;
            print!("{}", render_table(R::COLUMNS, &[updated.row()]));
        }
        ResourceCommand::Activate { id } => {
            app.admin("manage resources")?;
            app.api.set_active::<R>(id, true).await?;
            println!("Activated {} {id}", R::NAME);
        }
        ResourceCommand::Deactivate { id } => {
            app.admin("manage resources")?;
            app.api.set_active::<R>(id, false).await?;
            println!("Deactivated {} {id}", R::NAME);
        }
        ResourceCommand::Delete { id, yes } => {
            app.admin("manage resources")?;
            if !yes {
                bail!(
                    "refusing to delete {} {id} without --yes (use `deactivate` to hide it)",
                    R::NAME
                );
            }
            app.api.remove::<R>(id).await?;
            println!("Deleted {} {id}", R::NAME);
        }
    }
    Ok(())
}

fn print_list<R>(items: Vec<R>, args: &ListArgs) -> Result<()>
where
    R: Resource + Activatable,
{
    let page = listing::apply(items, &args.query())?;
    match args.format {
        OutputFormat::Json => print_json(&page)?,
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = page.items.iter().map(Resource::row).collect();
            print!("{}", render_table(R::COLUMNS, &rows));
            println!(
                "Page {}/{} ({} {}s)",
                page.page,
                page.total_pages.max(1),
                page.total,
                R::NAME
            );
        }
    }
    Ok(())
}

fn route_stop_rows(stops: &[RouteStop]) -> Vec<Vec<String>> {
    stops
        .iter()
        .map(|s| {
            vec![
                s.order.to_string(),
                s.stop_id.to_string(),
                s.stop.as_ref().map(|stop| stop.name.clone()).unwrap_or_default(),
                s.estimated_arrival_time
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect()
}

async fn handle_route(app: &App, cmd: RouteCommand) -> Result<()> {
    const STOP_COLUMNS: [&str; 4] = ["Order", "Stop", "Name", "ETA"];
    match cmd {
        RouteCommand::Resource(cmd) => handle_resource::<Route>(app, cmd).await,
        RouteCommand::Stops { id } => {
            app.staff()?;
            let stops = app.api.route_stops(id).await?;
            print!("{}", render_table(&STOP_COLUMNS, &route_stop_rows(&stops)));
            Ok(())
        }
        RouteCommand::Reorder { id, stop, to } => {
            app.admin("manage resources")?;
            let stops = app.api.reorder_stops(id, stop, to).await?;
            print!("{}", render_table(&STOP_COLUMNS, &route_stop_rows(&stops)));
            Ok(())
        }
    }
}

async fn handle_plan(app: &App, cmd: PlanCommand) -> Result<()> {
    match cmd {
        PlanCommand::List { date, format } => {
            app.staff()?;
            let date = date.unwrap_or_else(today);
            let plans = app.api.plans_for(date).await?;
            match format {
                OutputFormat::Json => print_json(&plans)?,
                OutputFormat::Table => {
                    let rows: Vec<Vec<String>> = plans.iter().map(Resource::row).collect();
                    print!("{}", render_table(DailyPlan::COLUMNS, &rows));
                    println!("{} plans on {date}", plans.len());
                }
            }
        }
        PlanCommand::Create {
            date,
            student,
            trip,
            bus,
            stop,
            direction,
        } => {
            app.admin("manage plans")?;
            let input = DailyPlanInput {
                plan_date: date.unwrap_or_else(today),
                student_id: student,
                trip_id: trip,
                bus_id: bus,
                stop_id: stop,
                is_boarding: Direction::from(direction).is_boarding(),
            };
            let plan: DailyPlan = app.api.create(&input).await?;
            println!("Created plan {} for {}", plan.id, plan.plan_date);
        }
        PlanCommand::Delete { id } => {
            app.admin("manage plans")?;
            app.api.remove::<DailyPlan>(id).await?;
            println!("Deleted plan {id}");
        }
    }
    Ok(())
}

const RECORD_COLUMNS: [&str; 8] = [
    "ID", "Student", "Trip", "Bus", "Driver", "Date", "Time", "Planned",
];

fn record_rows(records: &[EventRecord]) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.student_label(),
                r.trip_id.to_string(),
                r.bus_id.to_string(),
                r.driver_id.to_string(),
                r.record_date.to_string(),
                r.record_time.format("%H:%M:%S").to_string(),
                if r.was_planned { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect()
}

async fn handle_records(app: &App, cmd: RecordsCommand) -> Result<()> {
    app.staff()?;
    let direction = Direction::from(cmd.direction);
    let mut records = if cmd.all {
        app.api.records(direction).await?
    } else {
        app.api
            .records_for(direction, cmd.date.unwrap_or_else(today))
            .await?
    };
    records.sort_by_key(EventRecord::recorded_at);

    match cmd.format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            print!("{}", render_table(&RECORD_COLUMNS, &record_rows(&records)));
            println!("{} {direction} records", records.len());
        }
    }
    Ok(())
}

async fn handle_scan(app: &App, cmd: ScanCommand) -> Result<()> {
    match cmd {
        ScanCommand::Board(args) => run_scan(app, Direction::Boarding, args).await,
        ScanCommand::Disembark(args) => run_scan(app, Direction::Disembarking, args).await,
        ScanCommand::Cameras { sysfs } => list_cameras(&app.config, &sysfs),
    }
}

fn list_cameras(config: &Config, sysfs: &Path) -> Result<()> {
    let devices = camera::discover(sysfs)?;
    if devices.is_empty() {
        println!("No cameras found under {}", sysfs.display());
        return Ok(());
    }
    let selector = CameraSelector::new(&config.scanner.rear_camera_patterns)?;
    let chosen = selector.select(&devices).map(|d| d.id.clone());
    for device in &devices {
        let marker = if chosen.as_ref() == Some(&device.id) { "*" } else { " " };
        println!("{marker} {:<14} {}", device.id, device.label);
    }
    Ok(())
}

enum ScanEvent {
    Line(Option<String>),
    Device(Option<String>),
    Interrupt,
}

async fn next_device_line(rx: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_scan(app: &App, direction: Direction, args: ScanArgs) -> Result<()> {
    let session = app.session()?;
    let driver = DriverContext::resolve(&app.api, session, args.trip).await?;
    let bus_id = driver.bus_id;
    let mut recorder = Recorder::new(&app.api, direction, driver, app.config.cache_ttl());
    let mut feed = ScanFeed::new(app.config.debounce_window());

    let (line_tx, mut lines) = mpsc::channel(32);
    let _stdin_task = LineSource::stdin().start(line_tx).await?;

    let mut device = match &args.device {
        Some(path) => {
            let (tx, rx) = mpsc::channel(32);
            let _device_task = LineSource::open(path).await?.start(tx).await?;
            Some(rx)
        }
        None => None,
    };

    eprintln!(
        "Recording {direction} on bus {}. Scan or type a code; Enter or :y confirms, :n cancels, :q quits.",
        bus_id
    );

    loop {
        let event = tokio::select! {
            line = lines.recv() => ScanEvent::Line(line),
            code = next_device_line(&mut device) => ScanEvent::Device(code),
            _ = tokio::signal::ctrl_c() => ScanEvent::Interrupt,
        };

        let input = match event {
            ScanEvent::Line(Some(line)) => feed.operator(&line),
            ScanEvent::Device(Some(decode)) => match feed.scanner(&decode) {
                Some(input) => input,
                None => continue,
            },
            ScanEvent::Device(None) => {
                warn!("Scanner device closed, continuing with stdin");
                device = None;
                continue;
            }
            ScanEvent::Line(None) | ScanEvent::Interrupt => break,
        };

        let notices = match input {
            ScanInput::Quit => break,
            ScanInput::Confirm if recorder.state() == RecorderState::Confirming => {
                recorder.confirm().await?
            }
            ScanInput::Cancel if recorder.state() == RecorderState::Confirming => {
                recorder.cancel()?
            }
            ScanInput::Confirm | ScanInput::Cancel => continue,
            ScanInput::Code(code) => {
                let mut notices = recorder.scan(&code).await?;
                if args.auto_confirm && recorder.state() == RecorderState::Confirming {
                    notices.extend(recorder.confirm().await?);
                }
                notices
            }
        };
        print_notices(&notices);
    }

    if let Some(pending) = recorder.pending() {
        println!(
            "Discarded unconfirmed scan of {}",
            pending.student.full_name()
        );
    }
    Ok(())
}

async fn handle_report(app: &App, cmd: ReportCommand) -> Result<()> {
    match cmd {
        ReportCommand::Daily {
            date,
            output,
            stdout,
        } => {
            app.admin("export reports")?;
            let report = DailyReport::fetch(&app.api, date.unwrap_or_else(today)).await?;
            if stdout {
                report.write_csv(std::io::stdout().lock())?;
                return Ok(());
            }
            let path = report.save(output.as_deref(), &app.config.report_dir())?;
            let summary = report.summary();
            println!("Report for {} written to {}", report.date, path.display());
            println!(
                "  {} boardings, {} disembarkings, {} planned, {} unplanned, {} planned not boarded",
                summary.boardings,
                summary.disembarkings,
                summary.planned,
                summary.unplanned,
                summary.planned_not_boarded
            );
        }
    }
    Ok(())
}

async fn handle_parent(app: &App, cmd: ParentCommand) -> Result<()> {
    match cmd {
        ParentCommand::Status { qr_code, json } => {
            let lookup = resolve_child(&app.api, app.session.as_ref(), qr_code.as_deref()).await?;
            // Only a freshly opened parent session is stored; staff stay logged in.
            if let Some(session) = &lookup.opened {
                app.save_session(session)?;
            }

            let report = child_status(&app.api, lookup.student, today()).await?;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "{} ({}): {}",
                    report.student.full_name(),
                    report.student.qr_code,
                    report.status
                );
            }
        }
    }
    Ok(())
}

fn handle_config(path: Option<PathBuf>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path)?;
            if json {
                print_json(&config)?;
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[API]");
                println!("  Base URL:           {}", config.api.base_url);
                println!("  Timeout (s):        {}", config.api.timeout_secs);
                println!("  Read retries:       {}", config.api.read_retries);
                println!("  Cache TTL (s):      {}", config.api.cache_ttl_secs);
                println!();
                println!("[Scanner]");
                println!("  Debounce (ms):      {}", config.scanner.debounce_ms);
                println!(
                    "  Rear camera labels: {}",
                    config.scanner.rear_camera_patterns.join(", ")
                );
                println!();
                println!("[Session]");
                println!("  Path:               {}", config.session_path().display());
                println!();
                println!("[Report]");
                println!("  Output dir:         {}", config.report_dir().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", path.unwrap_or_else(Config::default_config_path).display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
