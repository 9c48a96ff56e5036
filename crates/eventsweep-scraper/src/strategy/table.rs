//! Column-mapping extraction over CSV exports, such as a published
//! spreadsheet.
//!
//! Columns are named by header text (matched case-insensitively) or by
//! zero-based index. Every data row passing the optional `row_filter`
//! becomes one candidate.

use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::Value;

use crate::candidate::{clean_text, Confidence, RawCandidate};
use crate::client::Document;
use crate::datetime::DateRules;
use crate::error::ScraperError;
use crate::settings::Settings;

use super::NameRules;

const SETTING_KEYS: &[&str] = &[
    "date_column",
    "name_column",
    "time_column",
    "start_column",
    "end_column",
    "location_column",
    "row_filter",
    "has_header",
    "delimiter",
];

const DEFAULT_DATE_FORMATS: &[&str] = &["%b %d", "%B %d", "%m/%d/%Y", "%Y-%m-%d", "%m/%d"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Column {
    Named(String),
    Index(usize),
}

impl Column {
    fn from_value(setting: &str, value: &Value) -> Result<Self, ScraperError> {
        match value {
            Value::String(name) if !name.trim().is_empty() => {
                Ok(Column::Named(name.trim().to_owned()))
            }
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .map(Column::Index)
                .ok_or_else(|| invalid(setting, format!("expected a column index, got {n}"))),
            other => Err(invalid(
                setting,
                format!("expected a header name or column index, got {other}"),
            )),
        }
    }

    fn resolve(&self, headers: &StringRecord, url: &str) -> Result<usize, ScraperError> {
        match self {
            Column::Index(i) => Ok(*i),
            Column::Named(name) => headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| ScraperError::Unrecognized {
                    url: url.to_owned(),
                    reason: format!("no \"{name}\" column in header row"),
                }),
        }
    }
}

fn invalid(setting: &str, reason: impl Into<String>) -> ScraperError {
    ScraperError::InvalidSetting {
        setting: setting.to_owned(),
        reason: reason.into(),
    }
}

fn optional_column(settings: &Settings<'_>, key: &str) -> Result<Option<Column>, ScraperError> {
    settings
        .optional_value(key)
        .map(|value| Column::from_value(key, value))
        .transpose()
}

fn required_column(settings: &Settings<'_>, key: &str) -> Result<Column, ScraperError> {
    optional_column(settings, key)?.ok_or_else(|| ScraperError::MissingSetting {
        setting: key.to_owned(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RowFilter {
    column: Column,
    equals: String,
}

/// Column positions once the header row is known.
struct Positions {
    date: usize,
    name: usize,
    time: Option<usize>,
    start: Option<usize>,
    end: Option<usize>,
    location: Option<usize>,
    filter: Option<(usize, String)>,
}

#[derive(Debug, Clone)]
pub struct CsvStrategy {
    date: Column,
    name: Column,
    time: Option<Column>,
    start: Option<Column>,
    end: Option<Column>,
    location: Option<Column>,
    filter: Option<RowFilter>,
    has_header: bool,
    delimiter: u8,
    names: NameRules,
    pub(crate) date_rules: DateRules,
}

impl CsvStrategy {
    /// # Errors
    ///
    /// - [`ScraperError::MissingSetting`] when `date_column` or `name_column`
    ///   is absent.
    /// - [`ScraperError::InvalidSetting`] for a malformed column, filter, or
    ///   delimiter, a header name used with `has_header: false`, or an
    ///   unknown key.
    pub fn from_settings(settings: &Settings<'_>) -> Result<Self, ScraperError> {
        settings.check_keys(SETTING_KEYS)?;

        let filter = settings
            .optional_object("row_filter")?
            .map(|object| {
                let column = object
                    .get("column")
                    .ok_or_else(|| invalid("row_filter", "expected a \"column\""))
                    .and_then(|value| Column::from_value("row_filter", value))?;
                let equals = object
                    .get("equals")
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("row_filter", "expected a string \"equals\""))?;
                Ok::<_, ScraperError>(RowFilter {
                    column,
                    equals: equals.trim().to_owned(),
                })
            })
            .transpose()?;

        let delimiter = match settings.optional_str("delimiter")? {
            None => b',',
            Some(text) => match text.as_bytes() {
                [byte] => *byte,
                _ => return Err(invalid("delimiter", "expected a single ASCII character")),
            },
        };

        let strategy = Self {
            date: required_column(settings, "date_column")?,
            name: required_column(settings, "name_column")?,
            time: optional_column(settings, "time_column")?,
            start: optional_column(settings, "start_column")?,
            end: optional_column(settings, "end_column")?,
            location: optional_column(settings, "location_column")?,
            filter,
            has_header: settings.optional_bool("has_header")?.unwrap_or(true),
            delimiter,
            names: NameRules::from_settings(settings)?,
            date_rules: DateRules::from_settings(settings, DEFAULT_DATE_FORMATS)?,
        };

        if !strategy.has_header {
            if let Some(name) = strategy.header_names().next() {
                return Err(invalid(
                    "has_header",
                    format!("column \"{name}\" is named but the export has no header row"),
                ));
            }
        }
        Ok(strategy)
    }

    fn header_names(&self) -> impl Iterator<Item = &str> {
        [Some(&self.date), Some(&self.name)]
            .into_iter()
            .chain([&self.time, &self.start, &self.end, &self.location].map(Option::as_ref))
            .chain([self.filter.as_ref().map(|f| &f.column)])
            .flatten()
            .filter_map(|column| match column {
                Column::Named(name) => Some(name.as_str()),
                Column::Index(_) => None,
            })
    }

    /// # Errors
    ///
    /// - [`ScraperError::UnexpectedContentType`] for an HTML or JSON response.
    /// - [`ScraperError::Csv`] when the header row cannot be read.
    /// - [`ScraperError::Unrecognized`] when a named column is missing from
    ///   the header row.
    pub fn extract(&self, document: &Document) -> Result<Vec<RawCandidate>, ScraperError> {
        if document.content_type_contains("html") || document.content_type_contains("json") {
            return Err(ScraperError::UnexpectedContentType {
                content_type: document.content_type.clone().unwrap_or_default(),
                url: document.url.clone(),
                expected: "text/csv",
            });
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(self.has_header)
            .delimiter(self.delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(document.body.as_bytes());

        let headers = if self.has_header {
            reader
                .headers()
                .map_err(|e| ScraperError::Csv {
                    context: format!("header row from {}", document.url),
                    source: e,
                })?
                .clone()
        } else {
            StringRecord::new()
        };
        let positions = self.positions(&headers, &document.url)?;

        let mut candidates = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!(
                        url = %document.url,
                        row = index + 1,
                        error = %e,
                        "skipping unreadable row"
                    );
                    continue;
                }
            };
            if let Some(candidate) = self.read_row(&record, &positions) {
                candidates.push(candidate);
            }
        }
        Ok(candidates)
    }

    fn positions(&self, headers: &StringRecord, url: &str) -> Result<Positions, ScraperError> {
        let optional = |column: &Option<Column>| {
            column
                .as_ref()
                .map(|c| c.resolve(headers, url))
                .transpose()
        };
        Ok(Positions {
            date: self.date.resolve(headers, url)?,
            name: self.name.resolve(headers, url)?,
            time: optional(&self.time)?,
            start: optional(&self.start)?,
            end: optional(&self.end)?,
            location: optional(&self.location)?,
            filter: self
                .filter
                .as_ref()
                .map(|f| Ok::<_, ScraperError>((f.column.resolve(headers, url)?, f.equals.clone())))
                .transpose()?,
        })
    }

    /// `None` for rows the filter excludes and for rows with nothing in any
    /// mapped column.
    fn read_row(&self, record: &StringRecord, at: &Positions) -> Option<RawCandidate> {
        let cell = |index: usize| record.get(index).and_then(clean_text);
        let optional_cell = |index: Option<usize>| index.and_then(cell);

        if let Some((column, wanted)) = &at.filter {
            let value = cell(*column).unwrap_or_default();
            if !value.eq_ignore_ascii_case(wanted) {
                return None;
            }
        }

        let raw_name = cell(at.name);
        let mut candidate = RawCandidate {
            date: cell(at.date),
            time_range: optional_cell(at.time),
            start_time: optional_cell(at.start),
            end_time: optional_cell(at.end),
            location: optional_cell(at.location),
            ..RawCandidate::default()
        };
        if raw_name.is_none()
            && candidate.date.is_none()
            && candidate.time_range.is_none()
            && candidate.start_time.is_none()
            && candidate.end_time.is_none()
        {
            return None;
        }
        if let Some(name) = raw_name.and_then(|raw| self.names.clean(&raw)) {
            candidate.push_name(&name, Confidence::High);
        }
        Some(candidate)
    }
}
