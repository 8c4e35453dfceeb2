//! crates/job_tracker_core/src/insights.rs
//!
//! Fans a report's aggregated metrics out into one narrative generation call
//! per requested focus area. Each call is independent: a failure or timeout
//! drops that focus area's insight and nothing else.

use futures::future::join_all;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::domain::{CountEntry, FocusArea, Insight, ReportConfiguration, ReportData};
use crate::ports::{GenerationOptions, TextGenerator};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Below these percentages a rate is called out as below average.
const LOW_RESPONSE_RATE: f64 = 20.0;
const LOW_INTERVIEW_RATE: f64 = 10.0;
const LOW_OFFER_RATE: f64 = 5.0;

//=========================================================================================
// Focus Area Generators
//=========================================================================================

struct FocusGenerator {
    title: &'static str,
    options: GenerationOptions,
    prompt: fn(&ReportData) -> String,
}

static TRENDS: FocusGenerator = FocusGenerator {
    title: "Application Trends",
    options: GenerationOptions { temperature: 0.7, max_tokens: 300 },
    prompt: trends_prompt,
};

static RECOMMENDATIONS: FocusGenerator = FocusGenerator {
    title: "Recommendations",
    options: GenerationOptions { temperature: 0.7, max_tokens: 400 },
    prompt: recommendations_prompt,
};

static STRENGTHS: FocusGenerator = FocusGenerator {
    title: "Your Strengths",
    options: GenerationOptions { temperature: 0.6, max_tokens: 250 },
    prompt: strengths_prompt,
};

static IMPROVEMENTS: FocusGenerator = FocusGenerator {
    title: "Areas for Improvement",
    options: GenerationOptions { temperature: 0.6, max_tokens: 300 },
    prompt: improvements_prompt,
};

static PATTERNS: FocusGenerator = FocusGenerator {
    title: "Patterns & Observations",
    options: GenerationOptions { temperature: 0.8, max_tokens: 300 },
    prompt: patterns_prompt,
};

fn generator_for(area: FocusArea) -> &'static FocusGenerator {
    match area {
        FocusArea::Trends => &TRENDS,
        FocusArea::Recommendations => &RECOMMENDATIONS,
        FocusArea::Strengths => &STRENGTHS,
        FocusArea::Improvements => &IMPROVEMENTS,
        FocusArea::Patterns => &PATTERNS,
    }
}

//=========================================================================================
// The Orchestrator
//=========================================================================================

/// Produces the narrative insights for a report.
#[derive(Clone)]
pub struct InsightOrchestrator {
    generator: Arc<dyn TextGenerator>,
    call_timeout: Duration,
}

impl InsightOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Generates one insight per focus area in `config.insights_focus`, in that
    /// order. Areas whose generation failed are skipped. Never fails: input that
    /// cannot be summarised at all yields a single "unavailable" insight.
    pub async fn generate_insights(
        &self,
        data: &ReportData,
        config: &ReportConfiguration,
    ) -> Vec<Insight> {
        let requested = unique_in_order(&config.insights_focus);
        if requested.is_empty() {
            return Vec::new();
        }

        if let Err(reason) = data.check_consistency() {
            error!(
                "Insight generation skipped for report '{}': {}",
                config.name, reason
            );
            return vec![Insight::unavailable()];
        }

        // join_all yields results in input order regardless of completion order.
        let results = join_all(requested.iter().map(|&area| self.generate_one(area, data))).await;
        results.into_iter().flatten().collect()
    }

    async fn generate_one(&self, area: FocusArea, data: &ReportData) -> Option<Insight> {
        let generator = generator_for(area);
        let prompt = (generator.prompt)(data);
        debug!(focus = area.as_str(), "Requesting insight.");

        let outcome = tokio::time::timeout(
            self.call_timeout,
            self.generator.generate(&prompt, generator.options),
        )
        .await;

        match outcome {
            Ok(Ok(text)) => {
                let content = text.trim();
                if content.is_empty() {
                    warn!(focus = area.as_str(), "Text generator returned an empty insight.");
                    return None;
                }
                Some(Insight {
                    title: generator.title.to_string(),
                    content: content.to_string(),
                    kind: area.into(),
                })
            }
            Ok(Err(e)) => {
                warn!(focus = area.as_str(), "Insight generation failed: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    focus = area.as_str(),
                    "Insight generation timed out after {:?}.", self.call_timeout
                );
                None
            }
        }
    }
}

/// Keeps the first occurrence of each focus area.
fn unique_in_order(areas: &[FocusArea]) -> Vec<FocusArea> {
    let mut unique = Vec::with_capacity(areas.len());
    for area in areas {
        if !unique.contains(area) {
            unique.push(*area);
        }
    }
    unique
}

//=========================================================================================
// Prompt Builders
//=========================================================================================

fn fmt_count(value: Option<i64>) -> String {
    value.map_or_else(|| "not tracked".to_string(), |n| n.to_string())
}

fn fmt_rate(value: Option<f64>) -> String {
    value.map_or_else(|| "not tracked".to_string(), |p| format!("{:.1}%", p))
}

fn fmt_top(entries: &[CountEntry], limit: usize) -> String {
    if entries.is_empty() {
        return "none recorded".to_string();
    }
    entries
        .iter()
        .take(limit)
        .map(|entry| format!("{} ({})", entry.label, entry.count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Qualitative label for a rate against its threshold.
fn assess(rate: Option<f64>, threshold: f64) -> &'static str {
    match rate {
        None => "unknown",
        Some(p) if p < threshold => "below average",
        Some(p) if p < threshold * 2.0 => "average",
        Some(_) => "above average",
    }
}

fn trends_prompt(data: &ReportData) -> String {
    let mut recent = String::new();
    let start = data.application_trend.len().saturating_sub(4);
    for point in &data.application_trend[start..] {
        let _ = writeln!(recent, "- week of {}: {} applications", point.period, point.count);
    }
    if recent.is_empty() {
        recent.push_str("- no weekly data\n");
    }

    format!(
        "You are a career coach reviewing a job seeker's application activity.\n\
         Total applications: {}\n\
         Recent weekly activity:\n{}\
         Top industries: {}\n\n\
         In 2-3 sentences, describe the trend in their application activity and what it suggests. \
         Be specific and encouraging.",
        fmt_count(data.summary.total_applications),
        recent,
        fmt_top(&data.industry_breakdown, 3),
    )
}

fn recommendations_prompt(data: &ReportData) -> String {
    format!(
        "You are a career coach. Based on these job search metrics:\n\
         - Total applications: {}\n\
         - Response rate: {}\n\
         - Interview rate: {}\n\
         - Offer rate: {}\n\
         - Status distribution: {}\n\n\
         Give 3 concise, actionable recommendations to improve their results. \
         Use short sentences and no headings.",
        fmt_count(data.summary.total_applications),
        fmt_rate(data.summary.response_rate),
        fmt_rate(data.summary.interview_rate),
        fmt_rate(data.summary.offer_rate),
        fmt_top(&data.status_breakdown, 6),
    )
}

fn strengths_prompt(data: &ReportData) -> String {
    format!(
        "You are a supportive career coach. A job seeker has these results:\n\
         - Response rate: {}\n\
         - Interview rate: {}\n\
         - Offer rate: {}\n\
         - Companies with the most activity: {}\n\n\
         In 2-3 sentences, highlight what they are doing well.",
        fmt_rate(data.summary.response_rate),
        fmt_rate(data.summary.interview_rate),
        fmt_rate(data.summary.offer_rate),
        fmt_top(&data.company_breakdown, 3),
    )
}

fn improvements_prompt(data: &ReportData) -> String {
    let summary = &data.summary;
    format!(
        "You are a candid career coach. A job seeker's conversion metrics are:\n\
         - Response rate: {} ({})\n\
         - Interview rate: {} ({})\n\
         - Offer rate: {} ({})\n\
         - Average days until a response: {}\n\n\
         In 2-3 sentences, name the weakest stage of their funnel and one concrete way to improve it.",
        fmt_rate(summary.response_rate),
        assess(summary.response_rate, LOW_RESPONSE_RATE),
        fmt_rate(summary.interview_rate),
        assess(summary.interview_rate, LOW_INTERVIEW_RATE),
        fmt_rate(summary.offer_rate),
        assess(summary.offer_rate, LOW_OFFER_RATE),
        summary
            .average_response_days
            .map_or_else(|| "not tracked".to_string(), |d| format!("{:.1}", d)),
    )
}

fn patterns_prompt(data: &ReportData) -> String {
    let busiest_week = data
        .application_trend
        .iter()
        .max_by_key(|point| point.count)
        .map_or_else(
            || "unknown".to_string(),
            |point| format!("week of {} ({} applications)", point.period, point.count),
        );

    format!(
        "You are an analyst looking for patterns in a job search.\n\
         - Industries: {}\n\
         - Companies: {}\n\
         - Statuses: {}\n\
         - Busiest week: {}\n\n\
         In 2-3 sentences, point out one notable pattern and what it might mean.",
        fmt_top(&data.industry_breakdown, 5),
        fmt_top(&data.company_breakdown, 5),
        fmt_top(&data.status_breakdown, 6),
        busiest_week,
    )
}
