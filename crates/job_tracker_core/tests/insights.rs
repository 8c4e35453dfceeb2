mod support;

use job_tracker_core::domain::{FocusArea, InsightKind};
use job_tracker_core::InsightOrchestrator;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use support::{config_with_focus, sample_report, start_time, Reply, ScriptedGenerator};

fn orchestrator(generator: &Arc<ScriptedGenerator>) -> InsightOrchestrator {
    InsightOrchestrator::new(generator.clone()).with_call_timeout(Duration::from_millis(150))
}

fn kinds(insights: &[job_tracker_core::Insight]) -> Vec<InsightKind> {
    insights.iter().map(|i| i.kind).collect()
}

#[tokio::test]
async fn no_focus_areas_means_no_calls_and_no_insights() {
    let generator = Arc::new(ScriptedGenerator::default());
    let config = config_with_focus(Vec::new());

    let insights = orchestrator(&generator)
        .generate_insights(&sample_report("r", start_time()), &config)
        .await;

    assert!(insights.is_empty());
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn output_follows_requested_order_not_completion_order() {
    let generator = Arc::new(
        ScriptedGenerator::default()
            .with(FocusArea::Patterns, Reply::Delayed(80, "slow pattern".into()))
            .with(FocusArea::Strengths, Reply::Delayed(5, "fast strength".into())),
    );
    let config = config_with_focus(vec![FocusArea::Patterns, FocusArea::Strengths, FocusArea::Trends]);

    let insights = orchestrator(&generator)
        .generate_insights(&sample_report("r", start_time()), &config)
        .await;

    assert_eq!(
        kinds(&insights),
        vec![InsightKind::Patterns, InsightKind::Strengths, InsightKind::Trends]
    );
    assert_eq!(insights[0].content, "slow pattern");
    assert_eq!(insights[0].title, "Patterns & Observations");
    assert_eq!(insights[2].content, "insight about trends");
}

#[tokio::test]
async fn one_failing_area_does_not_affect_the_others() {
    let generator = Arc::new(ScriptedGenerator::default().with(FocusArea::Recommendations, Reply::Fail));
    let config = config_with_focus(FocusArea::ALL.to_vec());

    let insights = orchestrator(&generator)
        .generate_insights(&sample_report("r", start_time()), &config)
        .await;

    assert_eq!(
        kinds(&insights),
        vec![
            InsightKind::Trends,
            InsightKind::Strengths,
            InsightKind::Improvements,
            InsightKind::Patterns
        ]
    );
    assert_eq!(generator.call_count(), 5);
}

#[tokio::test]
async fn a_timed_out_area_is_dropped_like_any_other_failure() {
    let generator = Arc::new(ScriptedGenerator::default().with(FocusArea::Trends, Reply::Hang));
    let config = config_with_focus(vec![FocusArea::Trends, FocusArea::Improvements]);

    let insights = orchestrator(&generator)
        .generate_insights(&sample_report("r", start_time()), &config)
        .await;

    assert_eq!(kinds(&insights), vec![InsightKind::Improvements]);
}

#[tokio::test]
async fn blank_output_counts_as_a_failure() {
    let generator = Arc::new(ScriptedGenerator::default().with(FocusArea::Strengths, Reply::Text("  \n".into())));
    let config = config_with_focus(vec![FocusArea::Strengths, FocusArea::Patterns]);

    let insights = orchestrator(&generator)
        .generate_insights(&sample_report("r", start_time()), &config)
        .await;

    assert_eq!(kinds(&insights), vec![InsightKind::Patterns]);
}

#[tokio::test]
async fn repeated_focus_areas_are_generated_once() {
    let generator = Arc::new(ScriptedGenerator::default());
    let config = config_with_focus(vec![FocusArea::Trends, FocusArea::Trends, FocusArea::Patterns]);

    let insights = orchestrator(&generator)
        .generate_insights(&sample_report("r", start_time()), &config)
        .await;

    assert_eq!(kinds(&insights), vec![InsightKind::Trends, InsightKind::Patterns]);
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn malformed_input_degrades_to_a_single_unavailable_insight() {
    let generator = Arc::new(ScriptedGenerator::default());
    let config = config_with_focus(vec![FocusArea::Trends, FocusArea::Strengths]);
    let mut data = sample_report("r", start_time());
    data.summary.offer_rate = Some(f64::INFINITY);

    let insights = orchestrator(&generator).generate_insights(&data, &config).await;

    assert_eq!(kinds(&insights), vec![InsightKind::Unavailable]);
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn each_area_uses_its_own_generation_bounds() {
    let generator = Arc::new(ScriptedGenerator::default());
    let config = config_with_focus(vec![FocusArea::Recommendations, FocusArea::Strengths]);

    orchestrator(&generator)
        .generate_insights(&sample_report("r", start_time()), &config)
        .await;

    let seen = generator.seen.lock().unwrap().clone();
    let recommendations = seen.iter().find(|(a, _)| *a == FocusArea::Recommendations).unwrap().1;
    let strengths = seen.iter().find(|(a, _)| *a == FocusArea::Strengths).unwrap().1;
    assert_eq!(recommendations.max_tokens, 400);
    assert_eq!(strengths.max_tokens, 250);
    assert!(strengths.temperature < recommendations.temperature);
}
