//! crates/job_tracker_core/src/templates.rs
//!
//! Built-in report templates, seeded once at startup under the system owner.

use chrono::{DateTime, Utc};

use crate::domain::{
    ConfigOwner, ConfigurationDraft, DateRange, DateRangeKind, FocusArea, MetricToggles,
    ReportCategory, ReportConfiguration,
};

fn template(draft: ConfigurationDraft, now: DateTime<Utc>) -> ReportConfiguration {
    let mut config = ReportConfiguration::from_draft(ConfigOwner::System, draft, now);
    config.is_template = true;
    config.is_public = true;
    config
}

fn range(kind: DateRangeKind) -> DateRange {
    DateRange { kind, start_date: None, end_date: None }
}

pub fn default_templates(now: DateTime<Utc>) -> Vec<ReportConfiguration> {
    vec![
        template(
            ConfigurationDraft {
                name: "Weekly Summary".to_string(),
                description: Some("Applications and responses over the last seven days.".to_string()),
                category: ReportCategory::Summary,
                date_range: range(DateRangeKind::Last7Days),
                metrics: MetricToggles {
                    total_applications: true,
                    response_rate: true,
                    status_breakdown: true,
                    application_trend: true,
                    ..Default::default()
                },
                include_ai_insights: true,
                insights_focus: vec![FocusArea::Trends, FocusArea::Recommendations],
                ..Default::default()
            },
            now,
        ),
        template(
            ConfigurationDraft {
                name: "Monthly Performance".to_string(),
                description: Some("Conversion rates through the hiring funnel for the past month.".to_string()),
                category: ReportCategory::Performance,
                date_range: range(DateRangeKind::LastMonth),
                metrics: MetricToggles {
                    total_applications: true,
                    response_rate: true,
                    interview_rate: true,
                    offer_rate: true,
                    average_response_time: true,
                    status_breakdown: true,
                    ..Default::default()
                },
                include_ai_insights: true,
                insights_focus: vec![FocusArea::Strengths, FocusArea::Improvements],
                ..Default::default()
            },
            now,
        ),
        template(
            ConfigurationDraft {
                name: "Industry Analysis".to_string(),
                description: Some("Where applications are going and which companies respond.".to_string()),
                category: ReportCategory::Analysis,
                date_range: range(DateRangeKind::Last90Days),
                metrics: MetricToggles {
                    total_applications: true,
                    industry_breakdown: true,
                    company_breakdown: true,
                    ..Default::default()
                },
                include_ai_insights: true,
                insights_focus: vec![FocusArea::Patterns],
                ..Default::default()
            },
            now,
        ),
        template(
            ConfigurationDraft {
                name: "Complete Overview".to_string(),
                description: Some("Every metric and the full application list.".to_string()),
                category: ReportCategory::Summary,
                date_range: range(DateRangeKind::AllTime),
                metrics: MetricToggles::all(),
                include_ai_insights: true,
                insights_focus: FocusArea::ALL.to_vec(),
                ..Default::default()
            },
            now,
        ),
    ]
}
