//! HTTP client for the EXPERTS.AI opportunity search.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::DateTime;
use futures::future::join_all;
use serde_json::Value;

use crate::error::AdapterError;

use super::OpportunitySearch;
use super::model::Opportunity;

const ADAPTER: &str = "opportunity_search";

/// Searches the edumatch endpoint, one concurrent request per keyword.
pub struct ExpertsClient {
    base_url: String,
    limit: u32,
    client: reqwest::Client,
}

impl ExpertsClient {
    pub fn new(base_url: impl Into<String>, limit: u32) -> Self {
        Self {
            base_url: base_url.into(),
            limit,
            client: reqwest::Client::new(),
        }
    }

    async fn search_term(&self, term: &str) -> Result<Vec<Opportunity>, AdapterError> {
        tracing::debug!(term, "Searching opportunities");
        let limit = self.limit.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("query", term),
                ("page", "1"),
                ("limit", limit.as_str()),
                ("includeApplications", "false"),
            ])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AdapterError::transport(ADAPTER, &e))?;

        if !resp.status().is_success() {
            return Err(AdapterError::transport(
                ADAPTER,
                &format!("API error: {}", resp.status()),
            ));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| AdapterError::transport(ADAPTER, &e))?;
        Ok(parse_opportunities(&body))
    }
}

#[async_trait]
impl OpportunitySearch for ExpertsClient {
    async fn search(&self, keywords: &str) -> Result<Vec<Opportunity>, AdapterError> {
        let terms = search_terms(keywords);
        let responses = join_all(terms.iter().map(|term| self.search_term(term))).await;

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        let mut last_error = None;
        let mut any_ok = false;

        for (term, response) in terms.iter().zip(responses) {
            match response {
                Ok(found) => {
                    any_ok = true;
                    for op in found {
                        if seen.insert(op.id.clone()) {
                            results.push(op);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(term = %term, "Opportunity search failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_ok => Err(e),
            _ => Ok(results),
        }
    }
}

/// Lower-case, treat commas as spaces, split on whitespace, drop repeats.
pub fn search_terms(keywords: &str) -> Vec<String> {
    let normalized = keywords.to_lowercase().replace(',', " ");
    let mut terms: Vec<String> = Vec::new();
    for term in normalized.split_whitespace() {
        if !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    }
    terms
}

/// Parse the `opportunityPreviewDtos` array. Entries without an id or name
/// are skipped.
pub fn parse_opportunities(body: &Value) -> Vec<Opportunity> {
    body.get("opportunityPreviewDtos")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_opportunity).collect())
        .unwrap_or_default()
}

fn parse_opportunity(obj: &Value) -> Option<Opportunity> {
    let id = scalar_string(obj.get("opportunityId")?)?;
    let title = obj.get("opportunityName")?.as_str()?.to_string();
    let description = obj
        .get("opportunityDescription")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let company = obj
        .get("organizationBaseDtos")
        .and_then(Value::as_array)
        .and_then(|orgs| orgs.first())
        .and_then(|org| org.get("organizationName"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();

    let job_type = obj
        .get("jobTypes")
        .and_then(Value::as_array)
        .and_then(|types| types.first())
        .and_then(Value::as_i64)
        .map(|t| format!("Type {t}"))
        .unwrap_or_else(|| "N/A".to_string());

    let deadline = obj
        .get("opportunitySignupDate")
        .and_then(Value::as_i64)
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let contact = obj
        .get("expertPreviews")
        .and_then(Value::as_array)
        .and_then(|experts| experts.first())
        .and_then(|e| e.get("name"))
        .and_then(scalar_string);

    Some(Opportunity {
        id,
        title,
        description,
        company,
        job_type,
        deadline,
        url: optional(obj, "opportunityExtLink"),
        wage: optional(obj, "opportunityWage"),
        home_office: optional(obj, "opportunityHomeOffice"),
        benefits: optional(obj, "opportunityBenefit"),
        formal_requirements: optional(obj, "opportunityFormReq"),
        technical_requirements: optional(obj, "opportunityTechReq"),
        contact,
    })
}

fn optional(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(scalar_string)
}

/// Strings, numbers and booleans as text. Null and blank become `None`.
fn scalar_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "Yes" } else { "No" }.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::extract::Query;

    #[test]
    fn terms_are_normalized() {
        assert_eq!(
            search_terms("Java, SQL  backend java"),
            vec!["java", "sql", "backend"]
        );
        assert!(search_terms(" , ").is_empty());
    }

    #[test]
    fn parses_full_entry() {
        let body = serde_json::json!({
            "opportunityPreviewDtos": [{
                "opportunityId": 318,
                "opportunityName": "Data Intern",
                "opportunityDescription": "Crunch numbers",
                "organizationBaseDtos": [{"organizationName": "CVUT"}],
                "jobTypes": [3, 1],
                "opportunitySignupDate": 1_735_689_600_000_i64,
                "opportunityExtLink": "https://example.com/318",
                "opportunityWage": 1200,
                "opportunityHomeOffice": true,
                "opportunityBenefit": null,
                "expertPreviews": [{"name": "Dr. Novak"}]
            }]
        });
        let ops = parse_opportunities(&body);
        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.id, "318");
        assert_eq!(op.company, "CVUT");
        assert_eq!(op.job_type, "Type 3");
        assert_eq!(op.deadline, "2025-01-01");
        assert_eq!(op.url.as_deref(), Some("https://example.com/318"));
        assert_eq!(op.wage.as_deref(), Some("1200"));
        assert_eq!(op.home_office.as_deref(), Some("Yes"));
        assert!(op.benefits.is_none());
        assert_eq!(op.contact.as_deref(), Some("Dr. Novak"));
    }

    #[test]
    fn missing_optional_data_uses_defaults() {
        let body = serde_json::json!({
            "opportunityPreviewDtos": [
                {"opportunityId": "a", "opportunityName": "Thesis"},
                {"opportunityName": "no id, skipped"}
            ]
        });
        let ops = parse_opportunities(&body);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].company, "Unknown");
        assert_eq!(ops[0].job_type, "N/A");
        assert_eq!(ops[0].deadline, "N/A");
        assert_eq!(ops[0].description, "");
        assert!(ops[0].url.is_none());
    }

    #[test]
    fn null_or_missing_list_is_empty() {
        assert!(parse_opportunities(&serde_json::json!({})).is_empty());
        let null_list = serde_json::json!({"opportunityPreviewDtos": null});
        assert!(parse_opportunities(&null_list).is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let client = ExpertsClient::new("http://127.0.0.1:9/opportunity", 5);
        let err = client.search("java").await.unwrap_err();
        assert!(matches!(err, AdapterError::Transport { .. }));
    }

    /// Serve one opportunity per query term after `delay`.
    async fn slow_server(delay: Duration) -> String {
        let app = axum::Router::new().route(
            "/opportunity",
            axum::routing::get(
                move |Query(params): Query<HashMap<String, String>>| async move {
                    tokio::time::sleep(delay).await;
                    let term = params.get("query").cloned().unwrap_or_default();
                    axum::Json(serde_json::json!({
                        "opportunityPreviewDtos": [
                            {"opportunityId": term, "opportunityName": format!("{term} role")},
                            {"opportunityId": "shared", "opportunityName": "Shared role"}
                        ]
                    }))
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{port}/opportunity")
    }

    #[tokio::test]
    async fn terms_are_searched_concurrently_and_merged() {
        let url = slow_server(Duration::from_millis(300)).await;
        let client = ExpertsClient::new(url, 5);

        // Four sequential requests would need 1.2 s.
        let found = tokio::time::timeout(
            Duration::from_millis(900),
            client.search("java, python sql docker"),
        )
        .await
        .expect("search should finish within one request's latency")
        .unwrap();

        let mut ids: Vec<&str> = found.iter().map(|op| op.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["docker", "java", "python", "shared", "sql"]);
    }

    #[tokio::test]
    async fn empty_keywords_search_nothing() {
        let client = ExpertsClient::new("http://127.0.0.1:9/opportunity", 5);
        assert!(client.search(" ,, ").await.unwrap().is_empty());
    }
}
