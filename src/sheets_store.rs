use crate::{
    service_account::{normalize_private_key, ServiceAccount, TokenSource},
    store::{ReservationStore, StoreError},
    types::Booking,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

pub const HEADER: [&str; 4] = ["date", "time", "name", "bribe"];
pub const DEFAULT_API_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const HEADER_RANGE: &str = "1:1";
const NEW_HEADER_RANGE: &str = "A1:D1";
const ROWS_RANGE: &str = "A2:Z";
const APPEND_RANGE: &str = "A1";

/// Where the spreadsheet lives and how to authenticate against it. Missing
/// values are only reported once the store is used.
#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub sheet_id: Option<String>,
    pub service_account_email: Option<String>,
    pub private_key: Option<String>,
    pub api_url: String,
    pub token_url: String,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            sheet_id: None,
            service_account_email: None,
            private_key: None,
            api_url: DEFAULT_API_URL.into(),
            token_url: DEFAULT_TOKEN_URL.into(),
        }
    }
}

/// Position of each booking field within a sheet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnLayout {
    date: usize,
    time: usize,
    name: usize,
    bribe: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            date: 0,
            time: 1,
            name: 2,
            bribe: 3,
        }
    }
}

impl ColumnLayout {
    fn from_header(header: &[String]) -> Result<Self, StoreError> {
        let position = |column: &'static str| {
            header
                .iter()
                .position(|cell| cell.trim() == column)
                .ok_or_else(|| StoreError::Header {
                    found: header.to_vec(),
                    missing: column,
                })
        };
        Ok(Self {
            date: position("date")?,
            time: position("time")?,
            name: position("name")?,
            bribe: position("bribe")?,
        })
    }

    fn width(&self) -> usize {
        [self.date, self.time, self.name, self.bribe]
            .into_iter()
            .max()
            .unwrap_or_default()
            + 1
    }

    fn booking(&self, row: &[String]) -> Booking {
        let cell = |index: usize| row.get(index).cloned().unwrap_or_default();
        Booking {
            date: cell(self.date),
            time: cell(self.time),
            name: cell(self.name),
            bribe: cell(self.bribe),
        }
    }

    fn row(&self, booking: Booking) -> Vec<String> {
        let mut row = vec![String::new(); self.width()];
        row[self.date] = booking.date;
        row[self.time] = booking.time;
        row[self.name] = booking.name;
        row[self.bribe] = booking.bribe;
        row
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    major_dimension: Option<String>,
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl ValueRange {
    fn rows(values: Vec<Vec<String>>) -> Self {
        Self {
            range: None,
            major_dimension: Some("ROWS".into()),
            values,
        }
    }
}

/// Bookings kept in the first tab of a Google spreadsheet. Every call goes
/// to the Sheets API, only the header layout is remembered.
#[derive(Debug, Clone)]
pub struct SheetsStore {
    client: reqwest::Client,
    settings: Arc<SheetsSettings>,
    tokens: TokenSource,
    layout: Arc<OnceCell<ColumnLayout>>,
}

impl SheetsStore {
    pub fn new(settings: SheetsSettings) -> Self {
        let client = reqwest::Client::new();
        Self {
            tokens: TokenSource::new(client.clone(), settings.token_url.clone()),
            client,
            settings: Arc::new(settings),
            layout: Arc::default(),
        }
    }

    fn target(&self) -> Result<(&str, ServiceAccount), StoreError> {
        let sheet_id = present(&self.settings.sheet_id)
            .ok_or(StoreError::MissingConfiguration("GOOGLE_SHEET_ID"))?;
        let email = present(&self.settings.service_account_email)
            .ok_or(StoreError::MissingConfiguration("GOOGLE_SERVICE_ACCOUNT_EMAIL"))?;
        let private_key = present(&self.settings.private_key)
            .ok_or(StoreError::MissingConfiguration("GOOGLE_PRIVATE_KEY"))?;
        Ok((
            sheet_id,
            ServiceAccount {
                email: email.into(),
                private_key: normalize_private_key(private_key),
            },
        ))
    }

    fn values_url(&self, sheet_id: &str, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.settings.api_url.trim_end_matches('/'),
            sheet_id,
            range
        )
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let code = response.status();
        if code.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(%code, %body, "Spreadsheet request failed");
        Err(StoreError::Status { code, body })
    }

    async fn read(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let (sheet_id, account) = self.target()?;
        let token = self.tokens.access_token(&account).await?;
        let response = self
            .client
            .get(self.values_url(sheet_id, range))
            .bearer_auth(token)
            .send()
            .await?;
        let value_range: ValueRange = Self::checked(response).await?.json().await?;
        Ok(value_range.values)
    }

    async fn write_header(&self) -> Result<(), StoreError> {
        let (sheet_id, account) = self.target()?;
        let token = self.tokens.access_token(&account).await?;
        let header = HEADER.iter().map(|column| column.to_string()).collect();
        let response = self
            .client
            .put(self.values_url(sheet_id, NEW_HEADER_RANGE))
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&ValueRange::rows(vec![header]))
            .send()
            .await?;
        Self::checked(response).await?;
        info!("Wrote header row to empty spreadsheet");
        Ok(())
    }

    async fn layout(&self) -> Result<ColumnLayout, StoreError> {
        self.layout
            .get_or_try_init(|| async {
                let header = self.read(HEADER_RANGE).await?.into_iter().next();
                match header {
                    Some(header) if header.iter().any(|cell| !cell.trim().is_empty()) => {
                        ColumnLayout::from_header(&header)
                    }
                    _ => {
                        self.write_header().await?;
                        Ok(ColumnLayout::default())
                    }
                }
            })
            .await
            .copied()
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

#[async_trait]
impl ReservationStore for SheetsStore {
    async fn list_all(&self) -> Result<Vec<Booking>, StoreError> {
        let layout = self.layout().await?;
        let bookings: Vec<Booking> = self
            .read(ROWS_RANGE)
            .await?
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .map(|row| layout.booking(row))
            .collect();
        debug!(count = bookings.len(), "Loaded bookings from spreadsheet");
        Ok(bookings)
    }

    async fn append(&self, booking: Booking) -> Result<(), StoreError> {
        let layout = self.layout().await?;
        let (sheet_id, account) = self.target()?;
        let token = self.tokens.access_token(&account).await?;
        let url = format!("{}:append", self.values_url(sheet_id, APPEND_RANGE));
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&ValueRange::rows(vec![layout.row(booking)]))
            .send()
            .await?;
        Self::checked(response).await?;
        Ok(())
    }
}
