//! Remote tabular data source
//!
//! Fetches CSV text for a logical table. The fetch boundary is a trait so the
//! reconciliation engine can be exercised against scripted sources in tests;
//! the production implementation GETs the spreadsheet export URL with a
//! cache-busting query parameter on every request.

use async_trait::async_trait;
use fieldops_common::config::Config;
use fieldops_common::Result;
use std::time::Duration;
use tracing::debug;

/// Request timeout for table fetches
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The three logical tables exposed by the data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Accounts,
    Assignments,
    AuditLog,
}

/// Source of raw CSV text for a logical table
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn fetch_csv(&self, table: Table) -> Result<String>;
}

/// HTTP implementation against the spreadsheet CSV export endpoint
pub struct HttpSheetSource {
    http_client: reqwest::Client,
    base_url: String,
    accounts_table: String,
    assignments_table: String,
    audit_table: String,
}

impl HttpSheetSource {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.sheet_base_url.trim_end_matches('/').to_string(),
            accounts_table: config.accounts_table.clone(),
            assignments_table: config.assignments_table.clone(),
            audit_table: config.audit_table.clone(),
        })
    }

    fn table_id(&self, table: Table) -> &str {
        match table {
            Table::Accounts => &self.accounts_table,
            Table::Assignments => &self.assignments_table,
            Table::AuditLog => &self.audit_table,
        }
    }

    fn export_url(&self, table: Table) -> String {
        // Cache-busting parameter defeats intermediary caching of the export
        let cache = chrono::Utc::now().timestamp_millis();
        format!(
            "{}/{}/export?format=csv&cache={}",
            self.base_url,
            self.table_id(table),
            cache
        )
    }
}

#[async_trait]
impl SheetSource for HttpSheetSource {
    async fn fetch_csv(&self, table: Table) -> Result<String> {
        let url = self.export_url(table);
        debug!("Fetching table {:?}", table);
        let response = self.http_client.get(&url).send().await?;
        let text = response.error_for_status()?.text().await?;
        Ok(text)
    }
}
