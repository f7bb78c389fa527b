use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use smart_leave::config::AppConfig;
use smart_leave::error::AppError;
use smart_leave::workflows::leave::{
    ChangeBus, Directory, InMemoryLeaveStore, LeaveWorkflowService,
};
use smart_leave::workflows::letter::{HttpLetterGenerator, LetterComposer, LetterGenerator};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Everything the leave routes and the reconciliation loop share.
#[derive(Clone)]
pub(crate) struct LeaveServices {
    pub(crate) store: Arc<InMemoryLeaveStore>,
    pub(crate) service: Arc<LeaveWorkflowService<InMemoryLeaveStore>>,
    pub(crate) letters: Arc<LetterComposer>,
    pub(crate) bus: ChangeBus,
}

pub(crate) fn build_leave_services(config: &AppConfig) -> Result<LeaveServices, AppError> {
    let directory = Arc::new(Directory::from_paths(
        config.directory.departments_csv.as_deref(),
        config.directory.staff_csv.as_deref(),
    )?);
    info!(
        departments = directory.departments().len(),
        staff = directory.staff().len(),
        "staff directory loaded"
    );

    let store = match &config.storage.snapshot_path {
        Some(path) => Arc::new(InMemoryLeaveStore::with_snapshot(path.as_path())?),
        None => Arc::new(InMemoryLeaveStore::new()),
    };

    let bus = ChangeBus::new();
    let service = Arc::new(LeaveWorkflowService::new(
        Arc::clone(&store),
        directory,
        config.auth.clone(),
        bus.clone(),
    ));

    let generator = HttpLetterGenerator::from_config(&config.letter)?
        .map(|generator| Arc::new(generator) as Arc<dyn LetterGenerator>);
    if generator.is_none() {
        info!("no letter generator key configured, letters use the template");
    }
    let letters = Arc::new(LetterComposer::new(generator));

    Ok(LeaveServices {
        store,
        service,
        letters,
        bus,
    })
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
