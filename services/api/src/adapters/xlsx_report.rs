//! services/api/src/adapters/xlsx_report.rs
//!
//! The workbook renderer. One sheet per dataset present in `ReportData`; the
//! Summary sheet is always written. The document creation time is pinned to
//! `generated_at`, which keeps the output byte-stable for identical input.

use chrono::{Datelike, Timelike};
use job_tracker_core::domain::{CountEntry, ReportConfiguration, ReportData};
use job_tracker_core::ports::{ExportFormat, PortError, PortResult, ReportRenderer};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, FormatAlign, Workbook, Worksheet, XlsxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sheet {
    Summary,
    ByStatus,
    ByIndustry,
    ByCompany,
    ApplicationTrend,
    RawData,
    AiInsights,
}

impl Sheet {
    pub fn name(&self) -> &'static str {
        match self {
            Sheet::Summary => "Summary",
            Sheet::ByStatus => "By Status",
            Sheet::ByIndustry => "By Industry",
            Sheet::ByCompany => "By Company",
            Sheet::ApplicationTrend => "Application Trend",
            Sheet::RawData => "Raw Data",
            Sheet::AiInsights => "AI Insights",
        }
    }
}

/// The sheets a report produces, in workbook order.
pub fn sheets_for(data: &ReportData) -> Vec<Sheet> {
    let mut sheets = vec![Sheet::Summary];
    let optional = [
        (Sheet::ByStatus, !data.status_breakdown.is_empty()),
        (Sheet::ByIndustry, !data.industry_breakdown.is_empty()),
        (Sheet::ByCompany, !data.company_breakdown.is_empty()),
        (Sheet::ApplicationTrend, !data.application_trend.is_empty()),
        (Sheet::RawData, !data.raw_data.is_empty()),
        (Sheet::AiInsights, !data.insights().is_empty()),
    ];
    sheets.extend(optional.into_iter().filter(|(_, present)| *present).map(|(sheet, _)| sheet));
    sheets
}

#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxReportRenderer;

impl XlsxReportRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ReportRenderer for XlsxReportRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Xlsx
    }

    fn render(&self, data: &ReportData, _config: &ReportConfiguration) -> PortResult<Vec<u8>> {
        build_workbook(data).map_err(|e| PortError::Unexpected(format!("failed to write workbook: {}", e)))
    }
}

fn build_workbook(data: &ReportData) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();

    let generated = data.generated_at;
    let created = ExcelDateTime::from_ymd(generated.year() as u16, generated.month() as u8, generated.day() as u8)?
        .and_hms(generated.hour() as u16, generated.minute() as u8, f64::from(generated.second()))?;
    workbook.set_properties(&DocProperties::new().set_title(&data.report_name).set_creation_datetime(&created));

    let bold = Format::new().set_bold();
    for sheet in sheets_for(data) {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(sheet.name())?;
        match sheet {
            Sheet::Summary => write_summary(&mut worksheet, data, &bold)?,
            Sheet::ByStatus => write_counts(&mut worksheet, "Status", &data.status_breakdown, &bold)?,
            Sheet::ByIndustry => write_counts(&mut worksheet, "Industry", &data.industry_breakdown, &bold)?,
            Sheet::ByCompany => write_counts(&mut worksheet, "Company", &data.company_breakdown, &bold)?,
            Sheet::ApplicationTrend => {
                write_header(&mut worksheet, &["Week Starting", "Applications"], &bold)?;
                for (i, point) in data.application_trend.iter().enumerate() {
                    let row = i as u32 + 1;
                    worksheet.write_string(row, 0, point.period.format("%Y-%m-%d").to_string())?;
                    worksheet.write_number(row, 1, point.count as f64)?;
                }
                worksheet.set_column_width(0, 16)?;
            }
            Sheet::RawData => {
                write_header(
                    &mut worksheet,
                    &["Company", "Position", "Status", "Industry", "Location", "Applied Date"],
                    &bold,
                )?;
                for (i, record) in data.raw_data.iter().enumerate() {
                    let row = i as u32 + 1;
                    worksheet.write_string(row, 0, &record.company)?;
                    worksheet.write_string(row, 1, &record.position)?;
                    worksheet.write_string(row, 2, &record.status)?;
                    worksheet.write_string(row, 3, record.industry.as_deref().unwrap_or(""))?;
                    worksheet.write_string(row, 4, record.location.as_deref().unwrap_or(""))?;
                    let applied = record.applied_date.map(|d| d.format("%Y-%m-%d").to_string());
                    worksheet.write_string(row, 5, applied.unwrap_or_default())?;
                }
                for col in 0..6 {
                    worksheet.set_column_width(col, 20)?;
                }
            }
            Sheet::AiInsights => {
                write_header(&mut worksheet, &["Insight", "Details"], &bold)?;
                let wrapped = Format::new().set_text_wrap().set_align(FormatAlign::Top);
                let title_format = Format::new().set_bold().set_align(FormatAlign::Top);
                for (i, insight) in data.insights().iter().enumerate() {
                    let row = i as u32 + 1;
                    worksheet.write_string_with_format(row, 0, &insight.title, &title_format)?;
                    worksheet.write_string_with_format(row, 1, &insight.content, &wrapped)?;
                }
                worksheet.set_column_width(0, 28)?;
                worksheet.set_column_width(1, 100)?;
            }
        }
        workbook.push_worksheet(worksheet);
    }

    workbook.save_to_buffer()
}

fn write_header(worksheet: &mut Worksheet, titles: &[&str], bold: &Format) -> Result<(), XlsxError> {
    for (col, title) in titles.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, bold)?;
    }
    Ok(())
}

fn write_summary(worksheet: &mut Worksheet, data: &ReportData, bold: &Format) -> Result<(), XlsxError> {
    let title = Format::new().set_bold().set_font_size(16);
    worksheet.write_string_with_format(0, 0, &data.report_name, &title)?;
    worksheet.write_string_with_format(1, 0, "Generated", bold)?;
    worksheet.write_string(1, 1, data.generated_at.format("%Y-%m-%d %H:%M UTC").to_string())?;
    worksheet.write_string_with_format(2, 0, "Date Range", bold)?;
    worksheet.write_string(2, 1, data.date_range.to_string())?;

    worksheet.write_string_with_format(4, 0, "Metric", bold)?;
    worksheet.write_string_with_format(4, 1, "Value", bold)?;
    for (i, (label, value)) in data.summary.present_metrics().into_iter().enumerate() {
        let row = i as u32 + 5;
        worksheet.write_string(row, 0, label)?;
        worksheet.write_string(row, 1, value.to_string())?;
    }
    worksheet.set_column_width(0, 24)?;
    worksheet.set_column_width(1, 28)?;
    Ok(())
}

fn write_counts(
    worksheet: &mut Worksheet,
    label_header: &str,
    entries: &[CountEntry],
    bold: &Format,
) -> Result<(), XlsxError> {
    write_header(worksheet, &[label_header, "Applications"], bold)?;
    for (i, entry) in entries.iter().enumerate() {
        let row = i as u32 + 1;
        worksheet.write_string(row, 0, &entry.label)?;
        worksheet.write_number(row, 1, entry.count as f64)?;
    }
    worksheet.set_column_width(0, 28)?;
    Ok(())
}
