use crate::infra::{seed_directory, InMemoryOutbox, BACKEND_JOB, DATA_JOB, LEAD_SUPERVISOR};
use chrono::{Duration, Utc};
use clap::Args;
use internship_hub::error::AppError;
use internship_hub::workflows::placement::{
    Application, ApplicationId, ChangeRequest, CompanyId, HiringStatus, InMemoryApplicationStore,
    InterviewDetails, InterviewKind, JobId, PlacementWorkflowService, ResubmissionPatch,
    ReviewDecision, StudentId, SubmitApplication, SupervisorId, WorkflowError, WorkflowReceipt,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Approve the first submission directly instead of requesting changes first.
    #[arg(long)]
    pub(crate) skip_rework: bool,
    /// Print the hired application as JSON at the end of the demo.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
struct DemoSummary<'a> {
    application_id: &'a ApplicationId,
    overall_status: &'static str,
    application_status: &'static str,
    revisions: usize,
    transitions: usize,
    hired_at: Option<String>,
}

type DemoService = PlacementWorkflowService<InMemoryApplicationStore, InMemoryOutbox>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { skip_rework, json } = args;

    let store = Arc::new(InMemoryApplicationStore::default());
    seed_directory(&store).map_err(WorkflowError::from)?;
    let outbox = Arc::new(InMemoryOutbox::default());
    let service = PlacementWorkflowService::new(store, outbox.clone());

    let supervisor = SupervisorId(LEAD_SUPERVISOR.to_string());
    let northwind = CompanyId("comp-northwind".to_string());

    println!("Internship placement demo");
    let receipt = service.submit(SubmitApplication {
        student_id: StudentId("stu-1001".to_string()),
        job_id: JobId(BACKEND_JOB.to_string()),
        supervisor_id: supervisor.clone(),
        cover_letter: Some("I have shipped two Rust services during coursework.".to_string()),
    })?;
    let id = receipt.application.application_id.clone();
    report_step("submitted", &receipt, &outbox);

    if !skip_rework {
        let receipt = service.supervisor_reject_with_feedback(
            &id,
            &supervisor,
            ChangeRequest {
                reason: "CV missing internship project".to_string(),
                details: "Add the capstone project and its outcome to the CV.".to_string(),
                requested_fixes: vec!["update cv".to_string()],
            },
        )?;
        report_step("changes requested", &receipt, &outbox);

        let receipt = service.resubmit(
            &id,
            &StudentId("stu-1001".to_string()),
            ResubmissionPatch {
                cover_letter: Some(
                    "I have shipped two Rust services and led the capstone backend.".to_string(),
                ),
                note: Some("Capstone project added".to_string()),
                ..ResubmissionPatch::default()
            },
        )?;
        report_step("resubmitted", &receipt, &outbox);
    }

    let receipt = service.supervisor_approve(&id, &supervisor)?;
    report_step("supervisor approved", &receipt, &outbox);

    let receipt = service.company_review(
        &id,
        &northwind,
        ReviewDecision::Approved,
        Some("Strong systems background".to_string()),
    )?;
    report_step("company approved", &receipt, &outbox);

    let receipt = service.schedule_interview(
        &id,
        &northwind,
        InterviewDetails {
            kind: InterviewKind::Online,
            scheduled_at: Utc::now() + Duration::days(3),
            location: None,
            meeting_link: Some("https://meet.northwind.example/intern-loop".to_string()),
            notes: Some("Pairing exercise, 45 minutes".to_string()),
        },
    )?;
    report_step("interview scheduled", &receipt, &outbox);

    let receipt = service.set_application_status(
        &id,
        &northwind,
        HiringStatus::Hired,
        Some("Offer accepted".to_string()),
    )?;
    report_step("hired", &receipt, &outbox);

    render_ledger(&receipt.application);
    show_closed_posting(&service);

    if json {
        let application = &receipt.application;
        let summary = DemoSummary {
            application_id: &application.application_id,
            overall_status: application.overall_status().label(),
            application_status: application.application_status().label(),
            revisions: application.revisions.len(),
            transitions: application.history.len(),
            hired_at: application.hiring_date.map(|at| at.to_rfc3339()),
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(body) => println!("\nSummary payload:\n{body}"),
            Err(err) => println!("\nSummary payload unavailable: {err}"),
        }
    }

    Ok(())
}

fn report_step(label: &str, receipt: &WorkflowReceipt, outbox: &InMemoryOutbox) {
    let application = &receipt.application;
    println!(
        "- {label}: {} -> overall={} supervisor={} company={} hiring={}",
        application.application_id,
        application.overall_status().label(),
        application.supervisor_status().label(),
        application.company_status().label(),
        application.application_status().label()
    );
    for event in outbox.drain() {
        println!("    notify {}: {}", event.target_user_id, event.message);
    }
    for warning in &receipt.warnings {
        println!("    warning: {warning}");
    }
}

fn render_ledger(application: &Application) {
    println!("\nRevision ledger for {}", application.application_id);
    for entry in application.revisions.entries() {
        let fields: Vec<_> = entry
            .changes
            .iter()
            .map(|change| change.field.as_str())
            .collect();
        println!(
            "  #{} {:?} at {} [{}]",
            entry.sequence,
            entry.kind,
            entry.recorded_at.format("%Y-%m-%d %H:%M"),
            fields.join(", ")
        );
    }
}

fn show_closed_posting(service: &DemoService) {
    println!("\nSecond applicant for the same posting");
    let attempt = service.submit(SubmitApplication {
        student_id: StudentId("stu-1002".to_string()),
        job_id: JobId(BACKEND_JOB.to_string()),
        supervisor_id: SupervisorId(LEAD_SUPERVISOR.to_string()),
        cover_letter: None,
    });
    match attempt {
        Ok(receipt) => println!(
            "  unexpectedly accepted as {}",
            receipt.application.application_id
        ),
        Err(err) => println!("  refused ({}): {err}", err.kind()),
    }

    match service.submit(SubmitApplication {
        student_id: StudentId("stu-1002".to_string()),
        job_id: JobId(DATA_JOB.to_string()),
        supervisor_id: SupervisorId(LEAD_SUPERVISOR.to_string()),
        cover_letter: None,
    }) {
        Ok(receipt) => println!(
            "  redirected to {DATA_JOB}: {} is {}",
            receipt.application.application_id,
            receipt.application.overall_status().label()
        ),
        Err(err) => println!("  alternate posting refused: {err}"),
    }
}
