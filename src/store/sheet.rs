use super::ScoreStore;
use crate::auth::AccessToken;
use crate::error::{Result, ScoreError};
use crate::model::{MatchRecord, HEADER};
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Match table kept in a spreadsheet range whose first row is the header
pub struct SheetStore {
    client: reqwest::blocking::Client,
    token: AccessToken,
    base: url::Url,
    sheet_id: String,
    range: String,
}

/// Body of a `values.get` response
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetStore {
    pub fn new(
        client: reqwest::blocking::Client,
        token: AccessToken,
        sheet_id: &str,
        range: &str,
    ) -> Result<Self> {
        let base = url::Url::parse(API_BASE)
            .map_err(|e| ScoreError::Config(format!("invalid API base: {}", e)))?;
        Ok(Self {
            client,
            token,
            base,
            sheet_id: sheet_id.to_string(),
            range: range.to_string(),
        })
    }

    /// API URL with the given path segments appended, e.g.
    /// `[id, "values", "Data!A1:E"]`
    fn endpoint(&self, segments: &[&str]) -> Result<url::Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ScoreError::Config("API base cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::Response> {
        let response = request
            .bearer_auth(self.token.secret())
            .send()
            .map_err(|e| ScoreError::BackendUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        log::warn!("sheet {} answered {}: {}", self.sheet_id, status, body);
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ScoreError::BackendUnavailable("access token rejected".to_string())
            }
            StatusCode::NOT_FOUND => {
                ScoreError::BackendUnavailable(format!("sheet {} not found", self.sheet_id))
            }
            _ => ScoreError::BackendUnavailable(format!("sheet API error: {}", status)),
        })
    }

    fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let url = self.endpoint(&[self.sheet_id.as_str(), "values", range])?;
        let body: ValueRange = self.send(self.client.get(url))?.json()?;
        Ok(body.values)
    }

    /// `values.update` URL. Cells are stored as given (`RAW`) so names like
    /// `=x` or `1e3` are not turned into formulas or numbers.
    fn update_url(&self, range: &str) -> Result<url::Url> {
        let mut url = self.endpoint(&[self.sheet_id.as_str(), "values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        Ok(url)
    }

    fn put_values(&self, range: &str, values: &[Vec<Value>]) -> Result<()> {
        let url = self.update_url(range)?;
        let response = self.send(self.client.put(url).json(&json!({ "values": values })))?;
        let body: Value = response.json()?;
        log::debug!("{} cells updated", body["updatedCells"]);
        Ok(())
    }

    fn clear_values(&self, range: &str) -> Result<()> {
        let target = format!("{}:clear", range);
        let url = self.endpoint(&[self.sheet_id.as_str(), "values", target.as_str()])?;
        self.send(self.client.post(url).json(&json!({})))?;
        Ok(())
    }

    fn add_tab(&self, title: &str) -> Result<()> {
        let target = format!("{}:batchUpdate", self.sheet_id);
        let url = self.endpoint(&[target.as_str()])?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        self.send(self.client.post(url).json(&body))?;
        Ok(())
    }
}

fn header_row() -> Vec<Value> {
    HEADER.iter().map(|h| Value::String(h.to_string())).collect()
}

fn record_row(record: &MatchRecord) -> Vec<Value> {
    record.to_cells().into_iter().map(Value::String).collect()
}

/// Cell text; the API returns strings, but numbers are accepted too
fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn cell_number<T: std::str::FromStr>(cell: &Value) -> Option<T> {
    // Formatted numbers may carry thousands separators
    cell_text(cell).replace(',', "").parse().ok()
}

fn row_to_record(row: &[Value]) -> std::result::Result<MatchRecord, String> {
    if row.len() < HEADER.len() {
        return Err(format!("expected {} cells, found {}", HEADER.len(), row.len()));
    }
    let time = cell_number::<f64>(&row[0]).ok_or("time is not a number")?;
    Ok(MatchRecord {
        time: time as i64,
        player: cell_text(&row[1]).to_lowercase(),
        opponent: cell_text(&row[2]).to_lowercase(),
        player_points: cell_number(&row[3]).ok_or("player_points is not a number")?,
        opponent_points: cell_number(&row[4]).ok_or("opponent_points is not a number")?,
    })
}

/// Cast sheet rows to records, skipping the header and rows that don't fit
pub fn rows_to_records(values: &[Vec<Value>]) -> Vec<MatchRecord> {
    values
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(idx, row)| match row_to_record(row) {
            Ok(record) => Some(record),
            Err(reason) => {
                log::warn!("{}", ScoreError::CorruptRow { row: idx + 1, reason });
                None
            }
        })
        .collect()
}

impl ScoreStore for SheetStore {
    fn name(&self) -> &'static str {
        "google sheet"
    }

    fn read(&self) -> Result<Vec<MatchRecord>> {
        Ok(rows_to_records(&self.get_values(&self.range)?))
    }

    fn append(&self, records: &[MatchRecord]) -> Result<()> {
        // Read-modify-write: a concurrent append in between is lost
        let mut values = self.get_values(&self.range)?;
        if values.is_empty() {
            values.push(header_row());
        }
        values.extend(records.iter().map(record_row));
        self.put_values(&self.range, &values)
    }

    fn clear(&self) -> Result<String> {
        let values = self.get_values(&self.range)?;
        if values.len() <= 1 {
            return Err(ScoreError::NoData);
        }

        let title = format!("backup_{}", Utc::now().timestamp());
        self.add_tab(&title)?;
        self.put_values(&format!("'{}'!A1", title), &values)?;
        self.clear_values(&self.range)?;
        self.put_values(&self.range, &[header_row()])?;
        log::info!("moved {} rows of sheet {} to tab {}", values.len() - 1, self.sheet_id, title);
        Ok(title)
    }
}
