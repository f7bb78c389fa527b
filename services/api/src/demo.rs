use crate::infra::parse_date;
use chrono::{Local, NaiveDate};
use clap::Args;
use smart_leave::config::AuthConfig;
use smart_leave::error::AppError;
use smart_leave::workflows::export::{authority_export_rows, export_csv};
use smart_leave::workflows::leave::{
    ActingStaffAssignment, ChangeBus, DayType, Decision, Directory, InMemoryLeaveStore,
    LeaveApplication, LeavePurpose, LeaveWorkflowError, LeaveWorkflowService, Period,
    Registration, RejectionReason, Role, UserView,
};
use smart_leave::workflows::letter::{LetterComposer, LetterFields};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// First day of leave (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) from: Option<NaiveDate>,
    /// Number of days requested.
    #[arg(long, default_value_t = 2)]
    pub(crate) days: u32,
    /// Have the principal reject the request with this reason instead of
    /// approving it.
    #[arg(long)]
    pub(crate) reject_with: Option<String>,
}

type DemoService = LeaveWorkflowService<InMemoryLeaveStore>;

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let directory = Arc::new(Directory::standard()?);
    // Demo accounts only, so the cheapest bcrypt cost keeps the walk-through fast.
    let auth = AuthConfig {
        bcrypt_cost: 4,
        ..AuthConfig::default()
    };
    let service = LeaveWorkflowService::new(
        Arc::new(InMemoryLeaveStore::new()),
        directory,
        auth,
        ChangeBus::new(),
    );

    println!("SmartLeave approval demo");
    if let Err(err) = walk_through(&service, args).await {
        println!("  Demo stopped: {err}");
    }
    Ok(())
}

struct Cast {
    head: UserView,
    applicant: UserView,
    colleague: UserView,
    principal: UserView,
}

fn register(
    service: &DemoService,
    name: &str,
    email: &str,
    role: Role,
    is_teaching_staff: bool,
) -> Result<UserView, LeaveWorkflowError> {
    let view = service.register(Registration {
        name: name.to_string(),
        email: email.to_string(),
        password: "demo-password".to_string(),
        role,
        department: None,
        is_teaching_staff,
        gender: smart_leave::workflows::leave::Gender::Other,
    })?;
    println!(
        "- {} registered as {} ({})",
        view.name,
        view.role.label(),
        view.department.as_deref().unwrap_or("no department")
    );
    Ok(view)
}

fn cast(service: &DemoService) -> Result<Cast, LeaveWorkflowError> {
    println!("\nAccounts");
    Ok(Cast {
        head: register(
            service,
            "Lingaraj Mani",
            "lingarajm@sankara.ac.in",
            Role::HeadOfDepartment,
            true,
        )?,
        applicant: register(service, "Bhavya", "bhavyap@sankara.ac.in", Role::Staff, true)?,
        colleague: register(service, "Hema", "hemalathad@sankara.ac.in", Role::Staff, true)?,
        principal: register(
            service,
            "Principal",
            "principal@sankara.ac.in",
            Role::Principal,
            false,
        )?,
    })
}

fn demo_application(from: NaiveDate, days: u32, colleague: &str) -> LeaveApplication {
    let to = from + chrono::Duration::days(i64::from(days.max(1)) - 1);
    let mut acting_staff = ActingStaffAssignment::new();
    let mut day = from;
    while day <= to {
        let periods = acting_staff.entry(day).or_default();
        periods.insert(Period::First, colleague.to_string());
        periods.insert(Period::Fourth, "Free".to_string());
        day += chrono::Duration::days(1);
    }

    LeaveApplication {
        from_date: from,
        to_date: Some(to),
        day_type: DayType::FullDay,
        purpose: LeavePurpose::PersonalIssue,
        description: "Family function out of town".to_string(),
        department: None,
        acting_staff,
        has_medical_certificate: false,
        final_letter_content: String::new(),
        time: None,
        sections: Vec::new(),
    }
}

async fn walk_through(service: &DemoService, args: DemoArgs) -> Result<(), LeaveWorkflowError> {
    let DemoArgs {
        from,
        days,
        reject_with,
    } = args;
    let from = from.unwrap_or_else(|| Local::now().date_naive());

    let cast = cast(service)?;
    let mut application = demo_application(from, days, &cast.colleague.name);

    let fields = LetterFields::from_application(
        &cast.applicant.name,
        cast.applicant.is_teaching_staff,
        cast.applicant.department.as_deref(),
        &application,
    );
    application.final_letter_content = LetterComposer::template_only().compose(&fields).await;
    println!("\nLetter\n{}", application.final_letter_content);

    let leave = service.submit(&cast.applicant.id, application)?;
    let cells: usize = leave
        .acting_staff_statuses
        .values()
        .map(|day| day.len())
        .sum();
    println!(
        "\nSubmitted {} ({} -> {}): {} period cells, HoD stage {}",
        leave.id,
        leave.from_date,
        leave.to_date,
        cells,
        leave.hod_approval.label()
    );
    println!(
        "- {} has {} pending duty periods",
        cast.colleague.name,
        service.pending_duty_count(&cast.colleague.id)?
    );

    service.update_acting_status(&cast.colleague.id, &leave.id, Decision::Approve)?;
    print_latest_notification(service, &cast.applicant)?;

    let board = service.authority_board(&cast.principal.id, None, false)?;
    println!(
        "\nPrincipal board before HoD review: {} request(s)",
        board.leaves.len()
    );

    service.decide_stage(&cast.head.id, &leave.id, Decision::Approve)?;
    print_latest_notification(service, &cast.applicant)?;

    let board = service.authority_board(&cast.principal.id, None, true)?;
    println!(
        "Principal board after HoD approval: {} pending",
        board.pending_count
    );

    let decision = match reject_with {
        Some(reason) => Decision::Reject(RejectionReason::new(reason)?),
        None => Decision::Approve,
    };
    let finished = service.decide_stage(&cast.principal.id, &leave.id, decision)?;
    print_latest_notification(service, &cast.applicant)?;
    println!(
        "\nFinal status: {} (HoD {}, administration {})",
        finished.status.label(),
        finished.hod_approval.label(),
        finished.admin_approval.label()
    );

    let board = service.authority_board(&cast.principal.id, None, false)?;
    match export_csv(&authority_export_rows(&board.leaves)) {
        Ok(csv) => println!("\nReceived leaves export\n{csv}"),
        Err(err) => println!("\nReceived leaves export unavailable: {err}"),
    }
    Ok(())
}

fn print_latest_notification(
    service: &DemoService,
    user: &UserView,
) -> Result<(), LeaveWorkflowError> {
    if let Some(latest) = service.notifications_for(&user.id)?.first() {
        println!("  [{}] {}", user.name, latest.message);
    }
    Ok(())
}
