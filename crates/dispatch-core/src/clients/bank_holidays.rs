//! Bank holiday sources for business-day arithmetic

use crate::config::HolidaysConfig;
use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use dispatch_types::Holiday;
use log::debug;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashMap;

/// Read-only list of holidays for one jurisdiction
#[async_trait]
pub trait HolidaySource: Send + Sync {
    async fn holidays(&self) -> Result<Vec<Holiday>>;
}

/// Fixed list of holidays, e.g. from configuration or tests
#[derive(Debug, Clone, Default)]
pub struct StaticHolidays {
    holidays: Vec<Holiday>,
}

impl StaticHolidays {
    pub fn new(holidays: Vec<Holiday>) -> Self {
        Self { holidays }
    }
}

#[async_trait]
impl HolidaySource for StaticHolidays {
    async fn holidays(&self) -> Result<Vec<Holiday>> {
        Ok(self.holidays.clone())
    }
}

/// Shape of the public bank-holidays feed
#[derive(Debug, Deserialize)]
struct Division {
    #[serde(default)]
    division: String,
    events: Vec<Holiday>,
}

pub struct BankHolidaysClient {
    config: HolidaysConfig,
    http_client: HttpClient,
}

impl BankHolidaysClient {
    pub fn new(config: HolidaysConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, http_client })
    }

    /// Pick the configured division out of a feed document
    fn select_division(&self, body: &str) -> Result<Vec<Holiday>> {
        let mut divisions: HashMap<String, Division> = serde_json::from_str(body)?;

        let division = divisions.remove(&self.config.division).ok_or_else(|| {
            DispatchError::NotFound(format!("Division '{}' not present in holiday feed", self.config.division))
        })?;

        debug!("Loaded {} holidays for {}", division.events.len(), division.division);
        Ok(division.events)
    }
}

#[async_trait]
impl HolidaySource for BankHolidaysClient {
    async fn holidays(&self) -> Result<Vec<Holiday>> {
        let response = self.http_client.get(&self.config.url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(DispatchError::Unavailable(format!(
                "Holiday feed returned {}",
                status
            )));
        }

        let body = response.text().await?;
        self.select_division(&body)
    }
}
