pub mod aggregator;
pub mod db;
pub mod pdf_layout;
pub mod pdf_report;
pub mod text_llm;
pub mod xlsx_report;

pub use aggregator::PgMetricAggregator;
pub use db::PgReportStore;
pub use pdf_report::PdfReportRenderer;
pub use text_llm::{DisabledTextGenerator, OpenAiTextAdapter};
pub use xlsx_report::XlsxReportRenderer;
