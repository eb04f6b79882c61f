pub mod base;
pub mod csv;
pub mod html_listing;
pub mod recurring;
pub mod spreadsheet;

use chrono::NaiveDate;

pub use base::Extractor;
pub use html_listing::HtmlListingExtractor;
pub use recurring::RecurringScheduleExtractor;
pub use spreadsheet::SpreadsheetExtractor;

use crate::common::error::Result;
use crate::config::{FetchConfig, SourceConfig, SourceKind};

/// Build the extractor for one configured source.
///
/// `today` is the local date recurring schedules start from.
pub fn create_extractor(
    source: &SourceConfig,
    fetch: &FetchConfig,
    today: NaiveDate,
) -> Result<Box<dyn Extractor>> {
    let extractor: Box<dyn Extractor> = match &source.kind {
        SourceKind::Html(html) => Box::new(HtmlListingExtractor::new(
            source.name.as_str(),
            source.venue.as_str(),
            html,
            fetch.detail_concurrency,
        )?),
        SourceKind::Spreadsheet(sheet) => Box::new(SpreadsheetExtractor::new(
            source.name.as_str(),
            source.venue.as_str(),
            sheet.csv_url.as_str(),
        )),
        SourceKind::Recurring(schedule) => Box::new(RecurringScheduleExtractor::new(
            source.name.as_str(),
            source.venue.as_str(),
            schedule,
            today,
        )?),
    };
    Ok(extractor)
}
