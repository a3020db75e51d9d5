//! free-proxy-list.net, a single table page

use super::{cell_text, collect_rows, https_flag, parse_host, parse_port, parse_timestamp, selector, ProxyCartridge};
use crate::error::RowError;
use crate::proxy::country;
use crate::proxy::models::{Anonymity, ProxyRecord, ProxyType};
use crate::proxy::page::PageInstruction;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

pub(crate) const URL: &str = "https://free-proxy-list.net/";

static TABLE: Lazy<Selector> = Lazy::new(|| selector("table.table-striped"));
static ROW: Lazy<Selector> = Lazy::new(|| selector("tbody tr"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));

pub struct FreeProxyList {
    id: String,
    pages: PageInstruction,
}

impl FreeProxyList {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            pages: PageInstruction::single(URL),
        }
    }

    fn data_rows<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document
            .select(&TABLE)
            .flat_map(|table| table.select(&ROW))
            .filter(|row| row.select(&CELL).next().is_some())
            .collect()
    }

    // Columns: IP, port, code, country, anonymity, google, https, last checked
    fn parse_row(&self, row: &ElementRef<'_>) -> Result<ProxyRecord, RowError> {
        let cells: Vec<String> = row.select(&CELL).map(|cell| cell_text(&cell)).collect();
        let [host, port, code, country_name, anonymity, _google, https, checked, ..] = cells.as_slice() else {
            return Err(RowError::MissingColumn("last checked"));
        };

        // the code column is more reliable than the printed name
        let mut geo = country::parse_location(code);
        if geo.is_unknown() {
            geo = country::parse_location(country_name);
        }

        Ok(ProxyRecord::new(
            &self.id,
            parse_host(host)?,
            parse_port(port)?,
            https_flag(https, ProxyType::Http),
        )
        .with_anonymity(Anonymity::from_label(anonymity))
        .with_last_checked(parse_timestamp(checked))
        .with_geo(geo))
    }
}

impl ProxyCartridge for FreeProxyList {
    fn id(&self) -> &str {
        &self.id
    }

    fn pages(&self) -> &PageInstruction {
        &self.pages
    }

    fn max_pages(&self) -> Option<u32> {
        Some(1)
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
