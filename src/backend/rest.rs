//! REST backend implementation.
//!
//! Speaks the PostgREST-style row API exposed by the hosted backend: one
//! endpoint per table, `column=eq.value` filters, `Prefer` headers for
//! returning representations and resolving insert conflicts.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::config::Config;

use super::{Backend, Filter, InsertOutcome, Row};

/// HTTP backend client.
#[derive(Clone)]
pub struct RestBackend {
  http: reqwest::Client,
  base: Url,
}

impl RestBackend {
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;

    let mut headers = HeaderMap::new();
    let mut key_value = HeaderValue::from_str(&api_key)
      .map_err(|e| eyre!("Invalid API key: {}", e))?;
    key_value.set_sensitive(true);
    headers.insert("apikey", key_value);
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
      .map_err(|e| eyre!("Invalid API key: {}", e))?;
    bearer.set_sensitive(true);
    headers.insert(reqwest::header::AUTHORIZATION, bearer);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let base = Url::parse(&config.backend.url)
      .map_err(|e| eyre!("Invalid backend URL {}: {}", config.backend.url, e))?;

    Ok(Self { http, base })
  }

  fn table_url(&self, table: &str) -> Result<Url> {
    self
      .base
      .join(table)
      .map_err(|e| eyre!("Invalid table name {}: {}", table, e))
  }

  /// Render a filter value the way the row API expects it: bare strings,
  /// JSON rendering for everything else.
  fn filter_value(value: &Value) -> String {
    match value {
      Value::String(s) => s.clone(),
      other => other.to_string(),
    }
  }

  fn apply_filter(url: &mut Url, filter: &Filter) {
    let mut pairs = url.query_pairs_mut();
    for (column, value) in filter.conditions() {
      pairs.append_pair(column, &format!("eq.{}", Self::filter_value(value)));
    }
  }
}

#[async_trait]
impl Backend for RestBackend {
  async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
    let mut url = self.table_url(table)?;
    Self::apply_filter(&mut url, filter);

    let rows: Vec<Row> = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to query {}: {}", table, e))?
      .error_for_status()
      .map_err(|e| eyre!("Query on {} rejected: {}", table, e))?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse rows from {}: {}", table, e))?;

    Ok(rows)
  }

  async fn insert(&self, table: &str, row: Row) -> Result<Row> {
    let url = self.table_url(table)?;

    let mut inserted: Vec<Row> = self
      .http
      .post(url)
      .header("Prefer", "return=representation")
      .json(&row)
      .send()
      .await
      .map_err(|e| eyre!("Failed to insert into {}: {}", table, e))?
      .error_for_status()
      .map_err(|e| eyre!("Insert into {} rejected: {}", table, e))?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse inserted row from {}: {}", table, e))?;

    inserted
      .pop()
      .ok_or_else(|| eyre!("Insert into {} returned no row", table))
  }

  async fn insert_unique(
    &self,
    table: &str,
    row: Row,
    conflict_columns: &[&str],
  ) -> Result<InsertOutcome> {
    let mut url = self.table_url(table)?;
    url
      .query_pairs_mut()
      .append_pair("on_conflict", &conflict_columns.join(","));

    // ignore-duplicates makes the conflict decision server-side; an empty
    // representation means the row already existed.
    let inserted: Vec<Row> = self
      .http
      .post(url)
      .header("Prefer", "resolution=ignore-duplicates,return=representation")
      .json(&row)
      .send()
      .await
      .map_err(|e| eyre!("Failed to insert into {}: {}", table, e))?
      .error_for_status()
      .map_err(|e| eyre!("Insert into {} rejected: {}", table, e))?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse insert response from {}: {}", table, e))?;

    if inserted.is_empty() {
      Ok(InsertOutcome::Conflict)
    } else {
      Ok(InsertOutcome::Inserted)
    }
  }

  async fn update(&self, table: &str, id: &str, patch: Row) -> Result<()> {
    let mut url = self.table_url(table)?;
    url
      .query_pairs_mut()
      .append_pair("id", &format!("eq.{}", id));

    self
      .http
      .patch(url)
      .json(&patch)
      .send()
      .await
      .map_err(|e| eyre!("Failed to update {} in {}: {}", id, table, e))?
      .error_for_status()
      .map_err(|e| eyre!("Update of {} in {} rejected: {}", id, table, e))?;

    Ok(())
  }

  async fn delete(&self, table: &str, id: &str) -> Result<()> {
    let mut url = self.table_url(table)?;
    url
      .query_pairs_mut()
      .append_pair("id", &format!("eq.{}", id));

    self
      .http
      .delete(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to delete {} from {}: {}", id, table, e))?
      .error_for_status()
      .map_err(|e| eyre!("Delete of {} from {} rejected: {}", id, table, e))?;

    Ok(())
  }
}
