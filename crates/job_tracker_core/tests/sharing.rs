mod support;

use chrono::Duration;
use futures::future::join_all;
use job_tracker_core::domain::{DateRangeKind, Recipient};
use job_tracker_core::sharing::EXPIRATION_DAYS_CEILING;
use job_tracker_core::{PortError, ShareRequest, SharingGateway, ViewRequest};
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use support::{draft, Harness, ScriptedGenerator, BASE_URL};
use uuid::Uuid;

fn seven_days() -> ShareRequest {
    ShareRequest { expiration_days: 7, ..Default::default() }
}

fn view(token: &str) -> ViewRequest {
    ViewRequest {
        token: token.to_string(),
        ip_address: Some("203.0.113.9".to_string()),
        user_agent: Some("curl/8.0".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn shared_snapshot_is_viewable_until_it_expires() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Last month at a glance")).await;
    assert_eq!(config.date_range.kind, DateRangeKind::Last30Days);

    let receipt = h.service.share(owner, config.id, seven_days()).await.unwrap();
    assert_eq!(receipt.share_url, format!("{}/shared/{}", BASE_URL, receipt.token));
    assert_eq!(receipt.expiration_date, support::start_time() + Duration::days(7));

    let first = h.sharing().view(view(&receipt.token)).await.unwrap();
    assert_eq!(first.view_count, 1);
    assert_eq!(first.report_name, "Last month at a glance");
    assert_eq!(first.snapshot.summary.total_applications, Some(42));

    let second = h.sharing().view(view(&receipt.token)).await.unwrap();
    assert_eq!(second.view_count, 2);

    h.clock.advance(Duration::days(7));
    let expired = h.sharing().view(view(&receipt.token)).await;
    assert!(matches!(expired, Err(PortError::AccessDenied)));
    assert_eq!(h.store.share_by_token(&receipt.token).view_count, 2);
}

#[tokio::test]
async fn viewing_never_reaggregates() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let mut with_insights = draft("With insights");
    with_insights.include_ai_insights = true;
    with_insights.insights_focus = vec![job_tracker_core::FocusArea::Trends];
    let config = h.saved_config(owner, with_insights).await;

    let receipt = h.service.share(owner, config.id, seven_days()).await.unwrap();
    assert_eq!(h.aggregator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.call_count(), 1);

    for _ in 0..3 {
        let shared = h.sharing().view(view(&receipt.token)).await.unwrap();
        assert_eq!(shared.snapshot.insights().len(), 1);
    }
    assert_eq!(h.aggregator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.generator.call_count(), 1);
}

#[tokio::test]
async fn successful_view_appends_exactly_one_log_entry() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Report")).await;
    let receipt = h.service.share(owner, config.id, seven_days()).await.unwrap();

    let mut request = view(&receipt.token);
    request.email = Some(" Grace@Example.com".to_string());
    h.sharing().view(request).await.unwrap();

    let log = h.store.access_log(receipt.share_id);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].ip_address.as_deref(), Some("203.0.113.9"));
    assert_eq!(log[0].user_agent.as_deref(), Some("curl/8.0"));
    assert_eq!(log[0].email.as_deref(), Some("grace@example.com"));
    assert_eq!(log[0].accessed_at, support::start_time());

    let share = h.store.share_by_token(&receipt.token);
    assert_eq!(share.last_accessed_at, Some(support::start_time()));
}

#[tokio::test]
async fn wrong_or_missing_password_is_denied_without_side_effects() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Secret")).await;
    let request = ShareRequest { password: Some("open sesame".into()), ..seven_days() };
    let receipt = h.service.share(owner, config.id, request).await.unwrap();

    let stored = h.store.share_by_token(&receipt.token);
    assert!(stored.password_hash.as_deref().is_some_and(|h| h.starts_with("$argon2")));

    let mut wrong = view(&receipt.token);
    wrong.password = Some("wrong".into());
    assert!(matches!(h.sharing().view(wrong).await, Err(PortError::AccessDenied)));
    assert!(matches!(h.sharing().view(view(&receipt.token)).await, Err(PortError::AccessDenied)));
    assert_eq!(h.store.share_by_token(&receipt.token).view_count, 0);
    assert!(h.store.access_log(receipt.share_id).is_empty());

    let mut right = view(&receipt.token);
    right.password = Some("open sesame".into());
    assert_eq!(h.sharing().view(right).await.unwrap().view_count, 1);
}

#[tokio::test]
async fn email_allow_list_is_enforced_case_insensitively() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Recruiters only")).await;
    let request = ShareRequest {
        allowed_emails: vec!["Recruiter@Acme.io".into()],
        shared_with: vec![Recipient { name: Some("Acme".into()), email: "recruiter@acme.io".into() }],
        share_message: Some("Here is my progress".into()),
        ..seven_days()
    };
    let receipt = h.service.share(owner, config.id, request).await.unwrap();

    let mut stranger = view(&receipt.token);
    stranger.email = Some("someone@else.io".into());
    let denied_stranger = h.sharing().view(stranger).await.unwrap_err();
    let denied_anonymous = h.sharing().view(view(&receipt.token)).await.unwrap_err();
    // Both denials look identical to the caller.
    assert_eq!(denied_stranger.to_string(), denied_anonymous.to_string());

    let mut recruiter = view(&receipt.token);
    recruiter.email = Some("recruiter@ACME.io".into());
    let shared = h.sharing().view(recruiter).await.unwrap();
    assert_eq!(shared.share_message.as_deref(), Some("Here is my progress"));
}

#[tokio::test]
async fn password_and_allow_list_failures_are_indistinguishable() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Both")).await;
    let request = ShareRequest {
        password: Some("pw".into()),
        allowed_emails: vec!["a@b.io".into()],
        ..seven_days()
    };
    let receipt = h.service.share(owner, config.id, request).await.unwrap();

    let mut bad_password = view(&receipt.token);
    bad_password.password = Some("nope".into());
    bad_password.email = Some("a@b.io".into());
    let mut bad_email = view(&receipt.token);
    bad_email.password = Some("pw".into());
    bad_email.email = Some("x@y.io".into());

    let first = h.sharing().view(bad_password).await.unwrap_err();
    let second = h.sharing().view(bad_email).await.unwrap_err();
    assert!(matches!(first, PortError::AccessDenied));
    assert!(matches!(second, PortError::AccessDenied));
}

#[tokio::test]
async fn unknown_token_is_not_found_rather_than_denied() {
    let h = Harness::new(ScriptedGenerator::default());
    let result = h.sharing().view(view("does-not-exist")).await;
    assert!(matches!(result, Err(PortError::NotFound(_))));
}

#[tokio::test]
async fn revocation_is_terminal_and_idempotent() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Revoke me")).await;
    let receipt = h
        .service
        .share(owner, config.id, ShareRequest { expiration_days: 30, ..Default::default() })
        .await
        .unwrap();

    let stranger = Uuid::new_v4();
    assert!(matches!(
        h.sharing().revoke(receipt.share_id, stranger).await,
        Err(PortError::NotFound(_))
    ));
    assert!(h.sharing().view(view(&receipt.token)).await.is_ok());

    h.sharing().revoke(receipt.share_id, owner).await.unwrap();
    h.sharing().revoke(receipt.share_id, owner).await.unwrap();

    assert!(matches!(h.sharing().view(view(&receipt.token)).await, Err(PortError::AccessDenied)));
    h.clock.advance(Duration::days(-365));
    assert!(matches!(h.sharing().view(view(&receipt.token)).await, Err(PortError::AccessDenied)));
}

#[tokio::test]
async fn every_share_gets_its_own_token() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Twice")).await;

    let a = h.service.share(owner, config.id, seven_days()).await.unwrap();
    let b = h.service.share(owner, config.id, seven_days()).await.unwrap();

    assert_ne!(a.token, b.token);
    assert_ne!(a.share_id, b.share_id);
    assert_eq!(h.store.share_count(), 2);
}

#[tokio::test]
async fn token_collisions_are_retried_then_give_up() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Collide")).await;

    h.store.forced_conflicts.store(2, Ordering::SeqCst);
    h.service.share(owner, config.id, seven_days()).await.unwrap();
    assert_eq!(h.store.share_insert_attempts.load(Ordering::SeqCst), 3);

    h.store.forced_conflicts.store(3, Ordering::SeqCst);
    let result = h.service.share(owner, config.id, seven_days()).await;
    assert!(matches!(result, Err(PortError::Unexpected(_))));
    assert_eq!(h.store.share_count(), 1);
}

#[tokio::test]
async fn invalid_expiration_is_rejected_before_aggregation() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Bad")).await;

    for days in [0, -3, 366] {
        let result = h
            .service
            .share(owner, config.id, ShareRequest { expiration_days: days, ..Default::default() })
            .await;
        assert!(matches!(result, Err(PortError::Validation(_))), "days = {}", days);
    }
    assert_eq!(h.aggregator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_views_are_all_counted() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Popular")).await;
    let receipt = h.service.share(owner, config.id, seven_days()).await.unwrap();

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let sharing = h.sharing().clone();
            let request = view(&receipt.token);
            tokio::spawn(async move { sharing.view(request).await })
        })
        .collect();
    let results = join_all(handles).await;

    let mut counts: Vec<i64> = results
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().view_count)
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, (1..=25).collect::<Vec<i64>>());
    assert_eq!(h.store.access_log(receipt.share_id).len(), 25);
}

#[tokio::test]
async fn configured_expiration_ceiling_is_clamped() {
    let h = Harness::new(ScriptedGenerator::default());
    let gateway = SharingGateway::new(h.store.clone(), h.clock.clone(), BASE_URL)
        .with_max_expiration_days(i64::MAX);

    let huge = ShareRequest { expiration_days: 1_000_000_000, ..Default::default() };
    assert!(matches!(gateway.validate(&huge), Err(PortError::Validation(_))));

    let ten_years = ShareRequest { expiration_days: EXPIRATION_DAYS_CEILING, ..Default::default() };
    assert!(gateway.validate(&ten_years).is_ok());
}

#[tokio::test]
async fn owner_listing_and_details_are_scoped() {
    let h = Harness::new(ScriptedGenerator::default());
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();
    let config = h.saved_config(owner, draft("Mine")).await;
    let receipt = h
        .service
        .share(owner, config.id, ShareRequest { password: Some("pw".into()), ..seven_days() })
        .await
        .unwrap();

    let listed = h.sharing().list_for_owner(owner).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].token, receipt.token);
    assert!(listed[0].password_protected);
    assert!(h.sharing().list_for_owner(other).await.unwrap().is_empty());

    let mut request = view(&receipt.token);
    request.password = Some("pw".into());
    h.sharing().view(request).await.unwrap();

    let details = h.sharing().details(receipt.share_id, owner).await.unwrap();
    assert_eq!(details.summary.view_count, 1);
    assert_eq!(details.access_log.len(), 1);
    assert!(matches!(
        h.sharing().details(receipt.share_id, other).await,
        Err(PortError::NotFound(_))
    ));
}
