//! Google Sheets prize inventory
//!
//! The `Prizes` worksheet holds one prize per row under a header row; the
//! `Winners` worksheet receives one appended row per award.

pub mod auth;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::application::errors::InventoryError;
use crate::domain::entities::{Prize, User};
use crate::domain::traits::PrizeInventory;
use crate::infrastructure::config::{SheetColumns, SheetsConfig};

pub use auth::ServiceAccountAuth;

/// Sheets API base URL
const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Prize inventory backed by a Google spreadsheet
pub struct GoogleSheetsInventory {
    client: Client,
    auth: ServiceAccountAuth,
    sheet_id: String,
    prizes_worksheet: String,
    winners_worksheet: String,
    columns: SheetColumns,
}

impl GoogleSheetsInventory {
    pub fn new(sheet_id: impl Into<String>, config: &SheetsConfig) -> Self {
        let client = Client::new();
        Self {
            auth: ServiceAccountAuth::new(&config.credentials, client.clone()),
            client,
            sheet_id: sheet_id.into(),
            prizes_worksheet: config.prizes_worksheet.clone(),
            winners_worksheet: config.winners_worksheet.clone(),
            columns: config.columns.clone(),
        }
    }

    pub fn credentials_present(&self) -> bool {
        self.auth.key_present()
    }

    /// `.../spreadsheets/<id>/values/<range><suffix>` with the range percent-encoded
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, InventoryError> {
        let mut url = Url::parse(API_BASE).map_err(|e| InventoryError::Http(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| InventoryError::Http("invalid API base".to_string()))?
            .push(&self.sheet_id)
            .push("values")
            .push(&format!("{}{}", range, suffix));
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, InventoryError> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| InventoryError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(InventoryError::Api { status, body });
        }
        Ok(response)
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>, InventoryError> {
        let url = self.values_url(range, "")?;
        let response = self.send(self.client.get(url)).await?;
        let data: ValueRange = response
            .json()
            .await
            .map_err(|e| InventoryError::Http(format!("bad values response: {}", e)))?;
        Ok(data.values)
    }

    async fn update_cell(&self, range: &str, value: Value) -> Result<(), InventoryError> {
        let mut url = self.values_url(range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = serde_json::json!({ "range": range, "values": [[value]] });
        self.send(self.client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn append_row(&self, range: &str, row: Vec<Value>) -> Result<(), InventoryError> {
        let mut url = self.values_url(range, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = serde_json::json!({ "values": [row] });
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl PrizeInventory for GoogleSheetsInventory {
    async fn available_prizes(&self) -> Result<Vec<Prize>, InventoryError> {
        let rows = self.get_values(&quote_sheet(&self.prizes_worksheet)).await?;
        let prizes = parse_prizes(&rows, &self.columns, &self.prizes_worksheet)?;
        tracing::debug!("{} prizes available", prizes.len());
        Ok(prizes)
    }

    async fn record_winner(&self, winner: &User, prize: &Prize) -> Result<(), InventoryError> {
        let header = self.get_values(&format!("{}!1:1", quote_sheet(&self.prizes_worksheet))).await?;
        let issued_col = header
            .first()
            .and_then(|row| find_column(row, &self.columns.issued))
            .ok_or_else(|| InventoryError::MissingColumn {
                sheet: self.prizes_worksheet.clone(),
                column: self.columns.issued.clone(),
            })?;

        let cell = cell_ref(&self.prizes_worksheet, issued_col, prize.row);
        self.update_cell(&cell, Value::from(prize.issued + 1)).await?;

        let row = winner_row(winner, prize, Local::now());
        self.append_row(&quote_sheet(&self.winners_worksheet), row).await?;
        Ok(())
    }
}

/// A1 worksheet reference, quoted so names with spaces or quotes work
pub fn quote_sheet(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// 0-based column index to letters: 0 -> A, 25 -> Z, 26 -> AA
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// `'Sheet'!D5` for a 0-based column and 1-based row
pub fn cell_ref(sheet: &str, column: usize, row: usize) -> String {
    format!("{}!{}{}", quote_sheet(sheet), column_letter(column), row)
}

fn find_column(header: &[Value], name: &str) -> Option<usize> {
    header.iter().position(|cell| cell_text(cell).trim() == name)
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Integer cell value; formatted numbers like "1,000" are rejected
fn cell_int(cell: Option<&Value>) -> Option<i64> {
    match cell? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Prizes with stock left; rows with non-integer limit/issued are skipped
pub fn parse_prizes(rows: &[Vec<Value>], columns: &SheetColumns, sheet: &str) -> Result<Vec<Prize>, InventoryError> {
    let Some((header, records)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let column = |name: &str| {
        find_column(header, name).ok_or_else(|| InventoryError::MissingColumn {
            sheet: sheet.to_string(),
            column: name.to_string(),
        })
    };
    let name_col = column(&columns.name)?;
    let limit_col = column(&columns.limit)?;
    let issued_col = column(&columns.issued)?;

    let mut prizes = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let row = idx + 2;
        let (Some(limit), Some(issued)) = (cell_int(record.get(limit_col)), cell_int(record.get(issued_col))) else {
            tracing::debug!("Skipping prize row {}: limit/issued not integers", row);
            continue;
        };
        let name = record.get(name_col).map(cell_text).unwrap_or_default();
        let prize = Prize { name, limit, issued, row };
        if prize.is_available() {
            prizes.push(prize);
        }
    }
    Ok(prizes)
}

/// `[timestamp, user id, @username | NoUsername, prize name]`
pub fn winner_row(winner: &User, prize: &Prize, at: DateTime<Local>) -> Vec<Value> {
    let user_id = winner
        .numeric_id()
        .map(Value::from)
        .unwrap_or_else(|| Value::from(winner.id.clone()));

    vec![
        Value::from(at.format("%Y-%m-%d %H:%M:%S").to_string()),
        user_id,
        Value::from(winner.handle()),
        Value::from(prize.name.clone()),
    ]
}
