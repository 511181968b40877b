use super::{status_to_wire, DebtGateway, DebtRecord};
use crate::models::{DebtStatus, NewProject, Project};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

/// HTTP implementation of [`DebtGateway`] against the analysis backend's
/// REST surface.
#[derive(Clone)]
pub struct HttpDebtGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDebtGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<HttpDebtGateway> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpDebtGateway {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DebtGateway for HttpDebtGateway {
    async fn resolve_project_by_path(&self, local_path: &str) -> Result<Option<Project>> {
        let url = format!("{}/projects/lookup", self.base_url);
        let resp = self
            .http
            .get(url)
            .query(&[("local_path", local_path)])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("project lookup failed: {status} - {body}"));
        }
        Ok(Some(resp.json().await?))
    }

    async fn create_project(&self, spec: &NewProject) -> Result<Project> {
        let url = format!("{}/projects", self.base_url);
        let resp = self.http.post(url).json(spec).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("project create failed: {status} - {body}"));
        }
        Ok(resp.json().await?)
    }

    async fn fetch_file_debts(&self, project_id: &str, file_path: &str) -> Result<Vec<DebtRecord>> {
        let url = format!("{}/projects/{project_id}/debts", self.base_url);
        let resp = self
            .http
            .get(url)
            .query(&[("file_path", file_path)])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("file debts fetch failed: {status} - {body}"));
        }
        Ok(resp.json().await?)
    }

    async fn fetch_project_debts(&self, project_id: &str) -> Result<Vec<DebtRecord>> {
        let url = format!("{}/projects/{project_id}/debts", self.base_url);
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("project debts fetch failed: {status} - {body}"));
        }
        Ok(resp.json().await?)
    }

    async fn update_debt_status(&self, debt_id: &str, status: DebtStatus) -> Result<DebtRecord> {
        let url = format!("{}/debts/{debt_id}/status", self.base_url);
        let resp = self
            .http
            .put(url)
            .json(&json!({ "status": status_to_wire(status) }))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("status update failed: {status} - {body}"));
        }
        Ok(resp.json().await?)
    }
}
