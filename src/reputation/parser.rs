//! Reputation page parser
//!
//! The report page is a table of repeating section header rows
//! (`<th class="title">`) followed by `(label, value)` rows. Parsing walks
//! the rows once with the current section as its only state:
//!
//! - a header row switches the section
//! - a `<td class="subtitle">` row is skipped
//! - a `(th, td)` row is dispatched on `(section, label)`
//!
//! The fraud score is read separately from the raw document because it is
//! not reliably inside the table.

use crate::reputation::models::{ReputationReport, RiskStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static FRAUD_SCORE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Fraud Score: (\d+)").expect("Invalid fraud score regex"));

static ROW: Lazy<Selector> = Lazy::new(|| selector("tr"));
static SECTION_TITLE: Lazy<Selector> = Lazy::new(|| selector("th.title"));
static SUBTITLE: Lazy<Selector> = Lazy::new(|| selector("td.subtitle"));
static LABEL: Lazy<Selector> = Lazy::new(|| selector("th"));
static VALUE: Lazy<Selector> = Lazy::new(|| selector("td"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a"));
static RISK: Lazy<Selector> = Lazy::new(|| selector("div.risk"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid CSS selector")
}

/// Text of an element with every text node trimmed and concatenated
fn squashed_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// What a table row means to the parser
enum Row<'a> {
    Header(String),
    Subtitle,
    Entry { label: String, cell: ElementRef<'a> },
    Ignored,
}

impl<'a> Row<'a> {
    fn classify(row: ElementRef<'a>) -> Self {
        if let Some(title) = row.select(&SECTION_TITLE).next() {
            return Row::Header(squashed_text(title));
        }
        if row.select(&SUBTITLE).next().is_some() {
            return Row::Subtitle;
        }
        match (row.select(&LABEL).next(), row.select(&VALUE).next()) {
            (Some(label), Some(cell)) => Row::Entry {
                label: squashed_text(label),
                cell,
            },
            _ => Row::Ignored,
        }
    }
}

/// Sections whose rows carry a risk status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Blacklists,
    Proxies,
}

impl Bucket {
    fn for_section(section: &str) -> Option<Self> {
        match section {
            "External Blacklists" => Some(Bucket::Blacklists),
            "Proxies" => Some(Bucket::Proxies),
            _ => None,
        }
    }
}

/// Scalar fields, recognized in any section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Asn,
    IspName,
    City,
    PostalCode,
    Datacenter,
}

impl Field {
    fn for_label(label: &str) -> Option<Self> {
        match label {
            "ASN" => Some(Field::Asn),
            "ISP Name" => Some(Field::IspName),
            "City" => Some(Field::City),
            "Postal Code" => Some(Field::PostalCode),
            "Datacenter" => Some(Field::Datacenter),
            _ => None,
        }
    }
}

/// Row-by-row state machine building a report
#[derive(Default)]
struct ReportParser {
    section: Option<String>,
    report: ReputationReport,
}

impl ReportParser {
    fn feed(&mut self, row: Row<'_>) {
        match row {
            Row::Header(title) => self.section = Some(title),
            Row::Subtitle | Row::Ignored => {}
            Row::Entry { label, cell } => self.entry(&label, cell),
        }
    }

    fn entry(&mut self, label: &str, cell: ElementRef<'_>) {
        if let Some(field) = Field::for_label(label) {
            self.field(field, cell);
            return;
        }

        let Some(bucket) = self.section.as_deref().and_then(Bucket::for_section) else {
            return;
        };
        // rows without a risk badge carry no status
        let Some(risk) = cell.select(&RISK).next() else {
            return;
        };

        let status = RiskStatus::normalize(&squashed_text(risk));
        match bucket {
            Bucket::Blacklists => self.report.record_blacklist(label, &status),
            Bucket::Proxies => self.report.record_proxy_flag(label, &status),
        }
    }

    fn field(&mut self, field: Field, cell: ElementRef<'_>) {
        let value = squashed_text(cell);
        match field {
            Field::Asn => self.report.asn = Some(value),
            Field::IspName => {
                let name = cell.select(&LINK).next().map(squashed_text).unwrap_or(value);
                self.report.isp_name = Some(name);
            }
            Field::City => self.report.city = Some(value),
            Field::PostalCode => self.report.postal_code = Some(value),
            Field::Datacenter => self.report.datacenter = Some(value.to_uppercase()),
        }
    }
}

/// Extract the fraud score from anywhere in the document
pub fn fraud_score(html: &str) -> Option<u32> {
    FRAUD_SCORE_REGEX
        .captures(html)
        .and_then(|caps| caps[1].parse().ok())
}

/// Whether a page looks like a reputation report at all
pub fn has_report_markers(html: &str, markers: &[String]) -> bool {
    let lowered = html.to_lowercase();
    markers
        .iter()
        .any(|marker| lowered.contains(&marker.to_lowercase()))
}

/// Parse a reputation report page. Fields missing from the page stay unset.
pub fn parse_report(html: &str) -> ReputationReport {
    let document = Html::parse_document(html);

    let mut parser = ReportParser::default();
    for row in document.select(&ROW) {
        parser.feed(Row::classify(row));
    }

    let mut report = parser.report;
    report.fraud_score = fraud_score(html);
    report
}
