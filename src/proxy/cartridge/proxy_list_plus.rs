//! list.proxylistplus.com fresh HTTP proxy pages

use super::{cell_text, collect_rows, https_flag, parse_host, parse_port, parse_timestamp, selector, ProxyCartridge};
use crate::error::RowError;
use crate::proxy::country;
use crate::proxy::models::{Anonymity, ProxyRecord, ProxyType};
use crate::proxy::page::PageInstruction;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

pub(crate) const TEMPLATE: &str = "https://list.proxylistplus.com/Fresh-HTTP-Proxy-List-{PAGENO}";

static TABLE: Lazy<Selector> = Lazy::new(|| selector("table.bg"));
static ROW: Lazy<Selector> = Lazy::new(|| selector("tr.cells"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));

// Columns: index, IP, port, anonymity, country, google, https, last checked
const COL_HOST: usize = 1;
const COL_PORT: usize = 2;
const COL_ANONYMITY: usize = 3;
const COL_COUNTRY: usize = 4;
const COL_HTTPS: usize = 6;
const COL_CHECKED: usize = 7;

pub struct ProxyListPlus {
    id: String,
    pages: PageInstruction,
}

impl ProxyListPlus {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            pages: PageInstruction::new(TEMPLATE),
        }
    }

    fn data_rows<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document
            .select(&TABLE)
            .flat_map(|table| table.select(&ROW))
            .filter(|row| row.select(&CELL).next().is_some())
            .collect()
    }

    fn parse_row(&self, row: &ElementRef<'_>) -> Result<ProxyRecord, RowError> {
        let cells: Vec<String> = row.select(&CELL).map(|cell| cell_text(&cell)).collect();
        let column = |index: usize, name: &'static str| {
            cells
                .get(index)
                .map(String::as_str)
                .ok_or(RowError::MissingColumn(name))
        };

        let host = parse_host(column(COL_HOST, "host")?)?;
        let port = parse_port(column(COL_PORT, "port")?)?;
        let proxy_type = column(COL_HTTPS, "https")
            .map(|flag| https_flag(flag, ProxyType::Http))
            .unwrap_or_default();

        let mut record = ProxyRecord::new(&self.id, host, port, proxy_type);
        if let Ok(anonymity) = column(COL_ANONYMITY, "anonymity") {
            record = record.with_anonymity(Anonymity::from_label(anonymity));
        }
        if let Ok(location) = column(COL_COUNTRY, "country") {
            record = record.with_geo(country::parse_location(location));
        }
        if let Ok(checked) = column(COL_CHECKED, "last checked") {
            record = record.with_last_checked(parse_timestamp(checked));
        }
        Ok(record)
    }
}

impl ProxyCartridge for ProxyListPlus {
    fn id(&self) -> &str {
        &self.id
    }

    fn pages(&self) -> &PageInstruction {
        &self.pages
    }

    fn validate_page(&self, content: &str) -> bool {
        let document = Html::parse_document(content);
        !self.data_rows(&document).is_empty()
    }

    fn parse_page(&self, content: &str) -> Vec<ProxyRecord> {
        let document = Html::parse_document(content);
        let rows = self.data_rows(&document);
        collect_rows(&self.id, rows.iter().map(|row| self.parse_row(row)))
    }
}
