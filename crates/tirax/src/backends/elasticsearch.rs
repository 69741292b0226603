//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! 🎬 INT. RECONCILIATION TEAM — MONDAY 9:02 AM
//!
//! "Can we search the tapes?" someone asked. Nobody said no fast enough.
//!
//! This sink upserts one document per terminal through the `_bulk` API: an
//! `index` action keyed by `_id = terminal id`, into an index named after the
//! vendor's collection. Elasticsearch answers each item with `created` or
//! `updated`, which is exactly the split the run summary wants.
//!
//! 🔄 No retries in here. A failed bulk fails the report. The caller decides
//! whether Monday deserves a second attempt.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace, warn};

use crate::backends::{UpsertOutcome, UpsertSink};
use crate::common::ReportResult;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ElasticsearchSinkConfig {
    /// 📡 cluster URL, scheme and port included
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 wins over basic auth when both are set
    #[serde(default)]
    pub api_key: Option<String>,
    /// prepended to the collection name: `""` → `tira_ncr`, `"prod-"` → `prod-tira_ncr`
    #[serde(default)]
    pub index_prefix: String,
    /// 🚰 a bulk body is split before it grows past this
    #[serde(default = "default_max_request_size_bytes")]
    pub max_request_size_bytes: usize,
}

// -- 10MB, comfortably under the cluster's default http.max_content_length
fn default_max_request_size_bytes() -> usize {
    10 * 1024 * 1024
}

/// One entry of a `_bulk` response: `{"index": {..}}`.
#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<std::collections::BTreeMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// 📡 Upserts transcripts into Elasticsearch. Holds a pooled client; clones share it.
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    client: reqwest::Client,
    sink_config: ElasticsearchSinkConfig,
}

impl ElasticsearchSink {
    /// 🚀 Build the client and say hello to the cluster once, so a wrong URL fails
    /// before any tape is read rather than after.
    pub async fn new(config: ElasticsearchSinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("💀 The HTTP client refused to be born. Probably the TLS stack. Probably.")?;

        let sink = Self {
            client,
            sink_config: config,
        };

        let response = sink
            .authorized(sink.client.get(&sink.sink_config.url))
            .send()
            .await
            .context(format!(
                "💀 Knocked on '{}' and nobody answered. Is the cluster up? Is the URL right?",
                sink.sink_config.url
            ))?;
        if !response.status().is_success() {
            anyhow::bail!(
                "💀 '{}' answered the ping with {}. Check the credentials.",
                sink.sink_config.url,
                response.status()
            );
        }
        debug!(url = %sink.sink_config.url, "✅ cluster is home");

        Ok(sink)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        // -- 🔒 api_key beats basic auth in this club
        if let Some(ref api_key) = self.sink_config.api_key {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(ref username) = self.sink_config.username {
            request.basic_auth(username, self.sink_config.password.as_ref())
        } else {
            request
        }
    }

    pub fn index_name(&self, report: &ReportResult) -> String {
        format!(
            "{}{}",
            self.sink_config.index_prefix,
            report.vendor.collection_name()
        )
    }

    /// 📦 NDJSON bodies for the report, each under the configured size where possible.
    /// A single document bigger than the limit still goes, alone in its own body.
    fn bulk_bodies(&self, report: &ReportResult) -> Result<Vec<String>> {
        let index = self.index_name(report);
        let limit = self.sink_config.max_request_size_bytes;
        let mut bodies = Vec::new();
        let mut body = String::new();

        for record in report.records() {
            let action = json!({ "index": { "_index": index, "_id": record.terminal_id } });
            let document = serde_json::to_string(&record)
                .context("💀 a transcript refused to become JSON")?;
            let op = format!("{action}\n{document}\n");

            if !body.is_empty() && body.len() + op.len() > limit {
                bodies.push(std::mem::take(&mut body));
            }
            body.push_str(&op);
        }
        if !body.is_empty() {
            bodies.push(body);
        }
        Ok(bodies)
    }

    async fn submit_bulk(&self, body: String) -> Result<UpsertOutcome> {
        let bulk_url = format!("{}/_bulk", self.sink_config.url.trim_end_matches('/'));
        let response = self
            .authorized(self.client.post(&bulk_url))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .context("💀 The bulk request never made it to Elasticsearch.")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("💀 Elasticsearch answered but the body got lost on the way back")?;
        if !status.is_success() {
            anyhow::bail!(
                "💀 Elasticsearch looked at our bulk request and said '{}': {}",
                status,
                text
            );
        }

        let parsed: BulkResponse = serde_json::from_str(&text)
            .context("💀 the _bulk response was not the JSON we were promised")?;

        let mut outcome = UpsertOutcome::default();
        let mut failures = Vec::new();
        for item in parsed.items.into_iter().flat_map(|entry| entry.into_values()) {
            if let Some(error) = item.error {
                failures.push(format!(
                    "{} ({}): {}",
                    item.id.unwrap_or_default(),
                    item.status,
                    error
                ));
                continue;
            }
            match item.result.as_deref() {
                Some("created") => outcome.created += 1,
                Some("updated") | Some("noop") => outcome.updated += 1,
                other => warn!(?other, id = ?item.id, "🤔 bulk item with an unexpected result"),
            }
        }

        if parsed.errors || !failures.is_empty() {
            anyhow::bail!(
                "💀 {} transcript(s) were rejected by Elasticsearch: {}",
                failures.len(),
                failures.join("; ")
            );
        }
        trace!(created = outcome.created, updated = outcome.updated, "🚀 bulk landed");
        Ok(outcome)
    }
}

#[async_trait]
impl UpsertSink for ElasticsearchSink {
    async fn upsert(&mut self, report: &ReportResult) -> Result<UpsertOutcome> {
        let bodies = self.bulk_bodies(report)?;
        debug!(
            index = %self.index_name(report),
            requests = bodies.len(),
            terminals = report.groups.len(),
            "📡 upserting transcripts"
        );

        let mut total = UpsertOutcome::default();
        for body in bodies {
            let outcome = self.submit_bulk(body).await?;
            total.created += outcome.created;
            total.updated += outcome.updated;
        }
        Ok(total)
    }

    async fn close(&mut self) -> Result<()> {
        // -- no buffer; the connection pool says goodbye on drop
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::group_lines;
    use crate::common::Vendor;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// 🪞 Answers a bulk request with one item per action line. Ids in `existing`
    /// come back as `updated`, the rest as `created`.
    struct BulkEcho {
        existing: Vec<&'static str>,
    }

    impl Respond for BulkEcho {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body = String::from_utf8_lossy(&request.body).into_owned();
            let items: Vec<serde_json::Value> = body
                .lines()
                .step_by(2)
                .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
                .map(|action| {
                    let id = action["index"]["_id"].as_str().unwrap_or_default().to_string();
                    let (result, status) = if self.existing.contains(&id.as_str()) {
                        ("updated", 200)
                    } else {
                        ("created", 201)
                    };
                    json!({ "index": { "_id": id, "result": result, "status": status } })
                })
                .collect();
            ResponseTemplate::new(200).set_body_json(json!({ "errors": false, "items": items }))
        }
    }

    async fn a_cluster() -> MockServer {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tagline": "You Know, for Search" })))
            .mount(&the_server)
            .await;
        the_server
    }

    fn config_for(server: &MockServer) -> ElasticsearchSinkConfig {
        ElasticsearchSinkConfig {
            url: server.uri(),
            username: None,
            password: None,
            api_key: None,
            index_prefix: String::new(),
            max_request_size_bytes: default_max_request_size_bytes(),
        }
    }

    fn a_two_terminal_report() -> ReportResult {
        group_lines(
            Vendor::Ncr,
            [
                "MF_PLZESPAN 03/17/25 11:04 7915 7341",
                "RETIRO",
                "SUC_PTARIO5 03/17/25 05:41 7218 6334",
                "CONSULTA",
            ],
        )
    }

    #[tokio::test]
    async fn the_one_where_created_and_updated_are_counted_from_the_response() {
        let the_server = a_cluster().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(header("Content-Type", "application/x-ndjson"))
            .respond_with(BulkEcho { existing: vec!["7341"] })
            .expect(1)
            .mount(&the_server)
            .await;

        let mut the_sink = ElasticsearchSink::new(config_for(&the_server))
            .await
            .expect("💀 the mock cluster should answer the ping");
        let outcome = the_sink
            .upsert(&a_two_terminal_report())
            .await
            .expect("💀 bulk should land");

        assert_eq!(outcome, UpsertOutcome { created: 1, updated: 1 });
    }

    #[tokio::test]
    async fn the_one_where_documents_are_keyed_by_terminal_in_the_vendor_index() {
        let the_server = a_cluster().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(BulkEcho { existing: vec![] })
            .mount(&the_server)
            .await;

        let mut the_config = config_for(&the_server);
        the_config.index_prefix = "prod-".into();
        let mut the_sink = ElasticsearchSink::new(the_config).await.expect("💀 ping");
        the_sink.upsert(&a_two_terminal_report()).await.expect("💀 bulk");

        let the_requests = the_server.received_requests().await.expect("💀 recording is on");
        let the_bulk = the_requests
            .iter()
            .find(|r| r.url.path() == "/_bulk")
            .expect("💀 a bulk request was sent");
        let the_lines: Vec<serde_json::Value> = String::from_utf8_lossy(&the_bulk.body)
            .lines()
            .map(|l| serde_json::from_str(l).expect("💀 ndjson line"))
            .collect();

        assert_eq!(the_lines.len(), 4);
        assert_eq!(the_lines[0]["index"]["_index"], "prod-tira_ncr");
        assert_eq!(the_lines[0]["index"]["_id"], "6334");
        assert_eq!(the_lines[1]["numeroCajero"], "6334");
        assert_eq!(the_lines[1]["tira"][1], "CONSULTA");
        assert!(the_lines[1]["fechaProcesamiento"].is_string());
    }

    #[tokio::test]
    async fn the_one_where_a_small_limit_splits_the_bulk() {
        let the_server = a_cluster().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(BulkEcho { existing: vec![] })
            .expect(2)
            .mount(&the_server)
            .await;

        let mut the_config = config_for(&the_server);
        the_config.max_request_size_bytes = 16;
        let mut the_sink = ElasticsearchSink::new(the_config).await.expect("💀 ping");
        let outcome = the_sink.upsert(&a_two_terminal_report()).await.expect("💀 bulk");
        assert_eq!(outcome.created, 2);
    }

    #[tokio::test]
    async fn the_one_where_item_errors_fail_the_report() {
        let the_server = a_cluster().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": true,
                "items": [
                    { "index": { "_id": "6334", "status": 400, "error": { "type": "mapper_parsing_exception" } } },
                    { "index": { "_id": "7341", "result": "created", "status": 201 } }
                ]
            })))
            .mount(&the_server)
            .await;

        let mut the_sink = ElasticsearchSink::new(config_for(&the_server)).await.expect("💀 ping");
        let the_error = the_sink
            .upsert(&a_two_terminal_report())
            .await
            .expect_err("💀 a rejected item must fail the upsert");
        assert!(the_error.to_string().contains("6334"));
    }

    #[tokio::test]
    async fn the_one_where_a_500_is_not_swept_under_the_rug() {
        let the_server = a_cluster().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(500).set_body_string("shard on fire"))
            .mount(&the_server)
            .await;

        let mut the_sink = ElasticsearchSink::new(config_for(&the_server)).await.expect("💀 ping");
        let the_error = the_sink.upsert(&a_two_terminal_report()).await.expect_err("💀 500");
        assert!(the_error.to_string().contains("shard on fire"));
    }

    #[tokio::test]
    async fn the_one_where_the_api_key_outranks_basic_auth() {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("Authorization", "ApiKey sesame"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&the_server)
            .await;

        let mut the_config = config_for(&the_server);
        the_config.username = Some("elastic".into());
        the_config.password = Some("changeme".into());
        the_config.api_key = Some("sesame".into());
        ElasticsearchSink::new(the_config)
            .await
            .expect("💀 the api key should get us in");
    }

    #[tokio::test]
    async fn the_one_where_an_unhappy_ping_stops_us_early() {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&the_server)
            .await;

        assert!(ElasticsearchSink::new(config_for(&the_server)).await.is_err());
    }
}
