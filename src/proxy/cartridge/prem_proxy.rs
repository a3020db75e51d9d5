//! premproxy.com list pages (two-digit page numbers, combined ip:port cell)

use super::{cell_text, collect_rows, parse_address, parse_timestamp, selector, ProxyCartridge};
use crate::error::RowError;
use crate::proxy::country;
use crate::proxy::models::{Anonymity, ProxyRecord, ProxyType};
use crate::proxy::page::{PadDirection, PageInstruction};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

pub(crate) const TEMPLATE: &str = "https://premproxy.com/list/{PAGENO}.htm";

static LIST: Lazy<Selector> = Lazy::new(|| selector("#proxylistt"));
static ROW: Lazy<Selector> = Lazy::new(|| selector("tbody tr"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));

pub struct PremProxy {
    id: String,
    pages: PageInstruction,
}

impl PremProxy {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            pages: PageInstruction::new(TEMPLATE).with_padding('0', 2, PadDirection::Left),
        }
    }

    fn data_rows<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document
            .select(&LIST)
            .flat_map(|list| list.select(&ROW))
            .filter(|row| row.select(&CELL).next().is_some())
            .collect()
    }

    fn parse_row(&self, row: &ElementRef<'_>) -> Result<ProxyRecord, RowError> {
        let mut cells = row.select(&CELL).map(|cell| cell_text(&cell));

        let address = cells.next().ok_or(RowError::MissingColumn("address"))?;
        let (host, port) = parse_address(&address)?;
        let mut record = ProxyRecord::new(&self.id, host, port, ProxyType::Http);

        if let Some(anonymity) = cells.next() {
            record = record.with_anonymity(Anonymity::from_label(&anonymity));
        }
        if let Some(checked) = cells.next() {
            record = record.with_last_checked(parse_timestamp(&checked));
        }
        if let Some(country_label) = cells.next() {
            let mut geo = country::parse_location(&country_label);
            geo.city = cells.next().filter(|city| !city.is_empty());
            record = record.with_geo(geo);
        }
        Ok(record)
    }
}

impl ProxyCartridge for PremProxy {
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

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<table id="proxylistt">
<thead><tr><th>IP:port</th><th>Anonymity</th><th>Checked</th><th>Country</th><th>City</th></tr></thead>
<tbody>
<tr><td>192.168.10.1:3128</td><td>anonymous</td><td>2024-04-30 08:15</td><td>Brazil</td><td>Sao Paulo</td></tr>
<tr><td>192.168.10.2</td><td>elite</td><td>2024-04-30 08:15</td><td>Brazil</td><td></td></tr>
<tr><td>192.168.10.3:80</td><td>elite</td><td>2024-04-30 08:15</td><td>Japan</td><td></td></tr>
</tbody>
</table>
</body></html>
"#;

    #[test]
    fn test_page_urls_are_zero_padded() {
        let cartridge = PremProxy::new("premproxy");
        assert_eq!(cartridge.pages().format(1), "https://premproxy.com/list/01.htm");
        assert_eq!(cartridge.pages().format(12), "https://premproxy.com/list/12.htm");
    }

    #[test]
    fn test_validate_requires_list() {
        let cartridge = PremProxy::new("premproxy");
        assert!(cartridge.validate_page(PAGE));
        assert!(!cartridge.validate_page("<html><body><h1>404</h1></body></html>"));
    }

    #[test]
    fn test_parse_rows() {
        let records = PremProxy::new("premproxy").parse_page(PAGE);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].to_simple_string(), "192.168.10.1:3128");
        assert_eq!(records[0].anonymity, Anonymity::Anonymous);
        assert_eq!(records[0].geo.country_code.as_deref(), Some("BR"));
        assert_eq!(records[0].geo.city.as_deref(), Some("Sao Paulo"));

        assert_eq!(records[1].to_simple_string(), "192.168.10.3:80");
        assert_eq!(records[1].anonymity, Anonymity::Elite);
        assert!(records[1].geo.city.is_none());
    }

    #[test]
    fn test_absurd_age_keeps_the_row() {
        let page = r#"
<table id="proxylistt"><tbody>
<tr><td>192.168.10.1:3128</td><td>elite</td><td>5 minutes ago</td><td>Brazil</td><td></td></tr>
<tr><td>192.168.10.2:3128</td><td>elite</td><td>9999999999 days ago</td><td>Brazil</td><td></td></tr>
<tr><td>192.168.10.3:3128</td><td>elite</td><td>1 hour ago</td><td>Brazil</td><td></td></tr>
</tbody></table>
"#;
        let before = chrono::Utc::now();
        let records = PremProxy::new("premproxy").parse_page(page);
        assert_eq!(records.len(), 3);
        assert!(records[1].last_checked >= before);
    }
}
