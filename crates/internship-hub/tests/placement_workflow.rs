//! Integration scenarios for the internship placement workflow.
//!
//! Everything here goes through the public service facade and HTTP router, the same
//! surface the API binary uses.

mod common {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, TimeZone, Utc};

    use internship_hub::workflows::placement::{
        ApplicationId, CompanyId, DispatchError, InMemoryApplicationStore, JobId, JobPosting,
        JobStatus, NotificationDispatcher, NotificationEvent, PlacementWorkflowService,
        StudentId, StudentProfile, SubmitApplication, SupervisorAccount, SupervisorId, UserRole,
        WorkflowEngine,
    };

    pub(super) fn clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[derive(Default, Clone)]
    pub(super) struct MemoryNotifier {
        events: Arc<Mutex<Vec<NotificationEvent>>>,
    }

    impl MemoryNotifier {
        pub(super) fn events(&self) -> Vec<NotificationEvent> {
            self.events.lock().expect("lock").clone()
        }
    }

    impl NotificationDispatcher for MemoryNotifier {
        fn dispatch(&self, event: NotificationEvent) -> Result<(), DispatchError> {
            self.events.lock().expect("lock").push(event);
            Ok(())
        }
    }

    pub(super) type Service = PlacementWorkflowService<InMemoryApplicationStore, MemoryNotifier>;

    fn profile(id: &str, name: &str) -> StudentProfile {
        StudentProfile {
            student_id: StudentId(id.to_string()),
            name: name.to_string(),
            roll_number: format!("IT-22-{id}"),
            department: "Information Technology".to_string(),
            semester: 7,
            cgpa: 7.9,
            attendance: 91.0,
            backlogs: 0,
            cv: None,
            certificates: Vec::new(),
        }
    }

    fn posting(id: &str, company: &str, hiring_limit: u32) -> JobPosting {
        JobPosting {
            job_id: JobId(id.to_string()),
            company_id: CompanyId(company.to_string()),
            company_name: company.to_uppercase(),
            title: "Platform Intern".to_string(),
            hiring_limit,
            hired_count: 0,
            status: JobStatus::Open,
        }
    }

    pub(super) fn build_service() -> (Service, Arc<InMemoryApplicationStore>, Arc<MemoryNotifier>)
    {
        let store = Arc::new(InMemoryApplicationStore::default());
        store.register_student(profile("st-1", "Dana")).expect("seed");
        store.register_student(profile("st-2", "Eli")).expect("seed");
        store
            .register_supervisor(SupervisorAccount {
                supervisor_id: SupervisorId("prof-1".to_string()),
                name: "Prof. Ruiz".to_string(),
                role: UserRole::Supervisor,
                max_students: 3,
                current_assigned_students: 0,
            })
            .expect("seed");
        store.register_job(posting("solo", "orbit", 1)).expect("seed");
        store.register_job(posting("duo", "vertex", 2)).expect("seed");

        let notifier = Arc::new(MemoryNotifier::default());
        let service = PlacementWorkflowService::with_engine(
            store.clone(),
            notifier.clone(),
            WorkflowEngine::with_clock(clock),
        );
        (service, store, notifier)
    }

    pub(super) fn submit(service: &Service, student: &str, job: &str) -> ApplicationId {
        service
            .submit(SubmitApplication {
                student_id: StudentId(student.to_string()),
                job_id: JobId(job.to_string()),
                supervisor_id: SupervisorId("prof-1".to_string()),
                cover_letter: Some("Motivated and available full time.".to_string()),
            })
            .expect("submission succeeds")
            .application
            .application_id
    }

    pub(super) fn professor() -> SupervisorId {
        SupervisorId("prof-1".to_string())
    }

    pub(super) fn company(id: &str) -> CompanyId {
        CompanyId(id.to_string())
    }
}

mod lifecycle {
    use super::common::*;
    use internship_hub::workflows::placement::{
        ChangeRequest, HiringStatus, JobId, NotificationKind, OverallStatus, ResubmissionPatch,
        ReviewDecision, ReviewStatus, RevisionKind, StudentId, WorkflowError,
    };

    #[test]
    fn rework_round_trip_reaches_hired() {
        let (service, store, notifier) = build_service();
        let id = submit(&service, "st-1", "duo");

        service
            .supervisor_reject_with_feedback(
                &id,
                &professor(),
                ChangeRequest {
                    reason: "Cover letter too generic".to_string(),
                    details: "Mention the team you want to join.".to_string(),
                    requested_fixes: Vec::new(),
                },
            )
            .expect("feedback recorded");
        service
            .resubmit(
                &id,
                &StudentId("st-1".to_string()),
                ResubmissionPatch {
                    cover_letter: Some("I want to join the vertex platform team.".to_string()),
                    ..ResubmissionPatch::default()
                },
            )
            .expect("resubmitted");
        service
            .supervisor_review(&id, &professor(), ReviewDecision::Approved, None)
            .expect("approved");
        service
            .company_review(&id, &company("vertex"), ReviewDecision::Approved, None)
            .expect("company approved");
        let hired = service
            .set_application_status(&id, &company("vertex"), HiringStatus::Hired, None)
            .expect("hired")
            .application;

        assert_eq!(hired.overall_status(), OverallStatus::Approved);
        assert_eq!(hired.company_status(), ReviewStatus::Approved);
        assert_eq!(hired.application_status(), HiringStatus::Hired);
        assert!(hired.is_currently_hired);
        assert_eq!(hired.revisions.len(), 2);
        assert_eq!(hired.revisions.count(RevisionKind::Initial), 1);
        assert_eq!(hired.hiring_date, Some(clock()));

        let job = store
            .job(&JobId("duo".to_string()))
            .expect("store")
            .expect("job");
        assert_eq!(job.hired_count, 1);
        assert!(job.is_open());

        assert!(notifier
            .events()
            .iter()
            .any(|event| event.kind == NotificationKind::Hired && event.target_user_id == "prof-1"));
    }

    #[test]
    fn hired_students_cannot_apply_again() {
        let (service, _, _) = build_service();
        let id = submit(&service, "st-1", "duo");
        service
            .supervisor_approve(&id, &professor())
            .expect("approved");
        service
            .set_application_status(&id, &company("vertex"), HiringStatus::Hired, None)
            .expect("hired");

        let second = service.submit(internship_hub::workflows::placement::SubmitApplication {
            student_id: StudentId("st-1".to_string()),
            job_id: JobId("solo".to_string()),
            supervisor_id: professor(),
            cover_letter: None,
        });

        assert!(matches!(second, Err(WorkflowError::Conflict(_))));
    }
}

mod capacity {
    use super::common::*;
    use internship_hub::workflows::placement::{
        CapacityError, HiringStatus, JobId, JobStatus, WorkflowError,
    };

    #[test]
    fn single_slot_posting_closes_after_first_hire() {
        let (service, store, _) = build_service();
        let first = submit(&service, "st-1", "solo");
        let second = submit(&service, "st-2", "solo");
        for id in [&first, &second] {
            service
                .supervisor_approve(id, &professor())
                .expect("approved");
        }

        service
            .set_application_status(&first, &company("orbit"), HiringStatus::Hired, None)
            .expect("first hire");
        let result =
            service.set_application_status(&second, &company("orbit"), HiringStatus::Hired, None);

        assert!(matches!(
            result,
            Err(WorkflowError::CapacityExceeded(CapacityError::JobClosed { .. }))
        ));
        let job = store
            .job(&JobId("solo".to_string()))
            .expect("store")
            .expect("job");
        assert_eq!(job.status, JobStatus::Closed);
        assert_eq!(job.hired_count, 1);

        let report = service.reconcile_capacity().expect("reconcile");
        assert!(report.is_clean());
    }
}

mod routing {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use internship_hub::workflows::placement::placement_router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn resubmit_route_appends_revision() {
        let (service, _, _) = build_service();
        let id = submit(&service, "st-2", "duo");
        service
            .supervisor_reject_with_feedback(
                &id,
                &professor(),
                internship_hub::workflows::placement::ChangeRequest {
                    reason: "Attendance proof".to_string(),
                    details: "Attach the attendance certificate.".to_string(),
                    requested_fixes: vec!["attendance".to_string()],
                },
            )
            .expect("feedback recorded");
        let router = placement_router(Arc::new(service));

        let response = router
            .oneshot(
                Request::post(format!("/api/v1/placements/applications/{id}/resubmit"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "student_id": "st-2",
                            "patch": { "attendance": 93.5, "note": "certificate attached" }
                        })
                        .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json");
        let application = &body["application"];
        assert_eq!(application["overall_status"], "resubmitted_to_supervisor");
        assert_eq!(application["rejection_feedback"], Value::Null);
        let revisions = application["revisions"].as_array().expect("revisions");
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[1]["kind"], "resubmission");
        assert_eq!(revisions[1]["changes"][0]["field"], "attendance");
        let addressed = &revisions[1]["addressed_feedback"];
        assert_eq!(addressed["details"], "Attach the attendance certificate.");
        assert_eq!(addressed["requested_fixes"][0], "attendance");
        assert_eq!(revisions[0].get("addressed_feedback"), None);
    }
}
