//! Implements the `Sheet` trait using the `sheets::Client` to interact with a Google sheet.

use crate::api::{Connector, Sheet, TokenFile};
use crate::{Config, Result};
use anyhow::Context;
use sheets::types::{
    BatchClearValuesRequest, BatchUpdateValuesRequest, DateTimeRenderOption, Dimension,
    ValueInputOption, ValueRange, ValueRenderOption,
};
use sheets::ClientError;
use std::path::PathBuf;
use tracing::{debug, trace};

/// Creates `GoogleSheet` clients for the spreadsheet named in the config.
#[derive(Debug, Clone)]
pub struct GoogleConnector {
    spreadsheet_id: String,
    token_path: PathBuf,
}

impl GoogleConnector {
    pub fn new(config: &Config) -> Self {
        Self {
            spreadsheet_id: config.spreadsheet_id().to_string(),
            token_path: config.token_path(),
        }
    }
}

#[async_trait::async_trait]
impl Connector for GoogleConnector {
    async fn connect(&self) -> Result<Box<dyn Sheet + Send>> {
        let token = TokenFile::load(&self.token_path)
            .await
            .context("Unable to initialize the Google Sheets client")?;
        debug!("Google Sheets client created for {}", self.spreadsheet_id);
        Ok(Box::new(GoogleSheet::new(
            self.spreadsheet_id.clone(),
            &token,
        )))
    }
}

/// Implements the `Sheet` trait using the `sheets::Client`, authenticated with an access token.
pub(super) struct GoogleSheet {
    spreadsheet_id: String,
    client: sheets::Client,
}

impl GoogleSheet {
    fn new(spreadsheet_id: String, token: &TokenFile) -> Self {
        // The sheets crate wants OAuth client details, but API calls only need the access token.
        let client = sheets::Client::new(
            String::new(), // client_id
            String::new(), // client_secret
            String::new(), // redirect_uri
            token.access_token().to_string(),
            token.refresh_token().to_string(),
        );
        Self {
            spreadsheet_id,
            client,
        }
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn get(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        trace!("get {range}");
        let response = self
            .client
            .spreadsheets()
            .values_get(
                &self.spreadsheet_id,
                range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch {range}"))?;
        Ok(response.body.values)
    }

    async fn clear(&mut self, range: &str) -> Result<()> {
        trace!("clear {range}");
        let request = BatchClearValuesRequest {
            ranges: vec![range.to_string()],
        };
        self.client
            .spreadsheets()
            .values_batch_clear(&self.spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to clear {range}"))?;
        Ok(())
    }

    async fn write(&mut self, range: &str, rows: &[Vec<String>]) -> Result<()> {
        trace!("write {} rows to {range}", rows.len());
        let request = update_request(range, rows);
        self.client
            .spreadsheets()
            .values_batch_update(&self.spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write {range}"))?;
        Ok(())
    }
}

/// Cells are stored as typed, so a name like `=SUM(A1)` or `March 5` is not turned into a formula
/// or a date.
fn update_request(range: &str, rows: &[Vec<String>]) -> BatchUpdateValuesRequest {
    BatchUpdateValuesRequest {
        data: vec![ValueRange {
            major_dimension: Some(Dimension::Rows),
            range: range.to_string(),
            values: rows.to_vec(),
        }],
        include_values_in_response: Some(false),
        response_date_time_render_option: None,
        response_value_render_option: None,
        value_input_option: Some(ValueInputOption::Raw),
    }
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}
