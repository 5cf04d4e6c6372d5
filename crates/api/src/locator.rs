//! Resolution of human-readable site paths and list names to stable identifiers.

use intake_types::{ResourceHandle, ResourceKey};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{encode_path, encode_segment};
use crate::{GraphClient, GraphError, ResourceKind};

/// A list exposed by a site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListSummary {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    /// Internal (URL) name of the list.
    #[serde(default)]
    pub name: Option<String>,
}

impl ListSummary {
    /// Name operators see: the display name, falling back to the internal name.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(self.id.as_str())
    }
}

fn comparable(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Finds the list whose label equals `requested`, ignoring case and
/// surrounding whitespace. Substrings never match.
pub fn find_list<'a>(lists: &'a [ListSummary], requested: &str) -> Result<&'a ListSummary, GraphError> {
    let wanted = comparable(requested);
    lists
        .iter()
        .find(|list| comparable(list.label()) == wanted)
        .ok_or_else(|| GraphError::ResourceNotFound {
            kind: ResourceKind::List,
            requested: requested.to_string(),
            available: lists.iter().map(|list| list.label().to_string()).collect(),
        })
}

impl GraphClient {
    /// Resolves `hostname` + `site_path` (e.g. `/sites/Intake`) to a site id.
    pub async fn resolve_site(&self, hostname: &str, site_path: &str) -> Result<String, GraphError> {
        let url = self.endpoint(&format!("/sites/{}:{}", encode_segment(hostname.trim()), encode_path(site_path)));
        let site = self.get_json(&url).await.map_err(|error| match error.status() {
            Some(404) => GraphError::ResourceNotFound {
                kind: ResourceKind::Site,
                requested: format!("{hostname}:{site_path}"),
                available: Vec::new(),
            },
            _ => error,
        })?;

        let site_id = site
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GraphError::transport(&url, Some(200), "site response is missing 'id'"))?;
        debug!(hostname, site_path, site_id, "site resolved");
        Ok(site_id.to_string())
    }

    /// Enumerates every list of a site, following continuation cursors.
    pub async fn list_lists(&self, site_id: &str) -> Result<Vec<ListSummary>, GraphError> {
        let url = self.endpoint(&format!("/sites/{}/lists", encode_segment(site_id)));
        let items = self.collect_pages(url).await?;
        let mut lists = Vec::with_capacity(items.len());
        for item in items {
            let label = item
                .get("displayName")
                .or_else(|| item.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("<unnamed>")
                .to_string();
            match serde_json::from_value::<ListSummary>(item) {
                Ok(list) => lists.push(list),
                Err(error) => debug!(site_id, list = %label, error = %error, "list entry skipped"),
            }
        }
        Ok(lists)
    }

    /// Resolves a list display name within a site to its id.
    pub async fn resolve_list(&self, site_id: &str, display_name: &str) -> Result<String, GraphError> {
        let lists = self.list_lists(site_id).await?;
        debug!(
            site_id,
            list_count = lists.len(),
            "lists available: {}",
            lists.iter().map(ListSummary::label).collect::<Vec<_>>().join(", ")
        );
        let list = find_list(&lists, display_name)?;
        Ok(list.id.clone())
    }

    /// Resolves the location of `key` to a [`ResourceHandle`].
    pub async fn resolve(&self, key: &ResourceKey) -> Result<ResourceHandle, GraphError> {
        let (hostname, site_path, list_name) = key.location();
        let site_id = self.resolve_site(hostname, site_path).await?;
        let list_id = self.resolve_list(&site_id, list_name).await?;
        let handle = ResourceHandle::new(site_id, list_id);
        info!(resource = %key, handle = %handle, "resource resolved");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{ScriptedTransport, test_client};

    const LISTS_BODY: &str = r#"{
        "value": [
            { "id": "list-survey", "name": "Survey2024", "displayName": "Survey 2024 " },
            { "id": "list-other", "name": "Other", "displayName": "Other" }
        ]
    }"#;

    fn summaries() -> Vec<ListSummary> {
        let body: Value = serde_json::from_str(LISTS_BODY).expect("fixture parses");
        serde_json::from_value(body["value"].clone()).expect("fixture lists")
    }

    #[test]
    fn find_list_ignores_case_and_surrounding_whitespace() {
        let lists = summaries();
        assert_eq!(find_list(&lists, " survey 2024 ").expect("variant matches").id, "list-survey");
        assert_eq!(find_list(&lists, "OTHER").expect("case variant").id, "list-other");
    }

    #[test]
    fn find_list_is_exact_otherwise() {
        let lists = summaries();
        assert!(find_list(&lists, "Survey").is_err(), "substring must not match");
        assert!(find_list(&lists, "Survey  2024").is_err(), "inner whitespace is significant");
    }

    #[test]
    fn label_falls_back_to_internal_name() {
        let list = ListSummary {
            id: "1".into(),
            display_name: None,
            name: Some("Respostas".into()),
        };
        assert_eq!(list.label(), "Respostas");
    }

    #[tokio::test]
    async fn resolve_finds_the_requested_list() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_token()
                .on_get("/sites/contoso.sharepoint.com:/sites/Intake", 200, r#"{"id":"site-1"}"#)
                .on_get("/sites/site-1/lists", 200, LISTS_BODY),
        );
        let client = test_client(&transport);
        let key = ResourceKey::new("contoso.sharepoint.com", "/sites/Intake", " survey 2024 ");

        let handle = client.resolve(&key).await.expect("resolves");
        assert_eq!(handle, ResourceHandle::new("site-1", "list-survey"));
    }

    #[tokio::test]
    async fn missing_list_enumerates_available_names() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_token()
                .on_get("/sites/contoso.sharepoint.com:/sites/Intake", 200, r#"{"id":"site-1"}"#)
                .on_get("/sites/site-1/lists", 200, LISTS_BODY),
        );
        let client = test_client(&transport);
        let key = ResourceKey::new("contoso.sharepoint.com", "/sites/Intake", "Missing List");

        match client.resolve(&key).await {
            Err(GraphError::ResourceNotFound {
                kind,
                requested,
                available,
            }) => {
                assert_eq!(kind, ResourceKind::List);
                assert_eq!(requested, "Missing List");
                assert_eq!(available, vec!["Survey 2024 ".to_string(), "Other".to_string()]);
            }
            other => panic!("expected ResourceNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_site_is_resource_not_found() {
        let transport = Arc::new(ScriptedTransport::new().with_token().on_get(
            "/sites/contoso.sharepoint.com:/sites/Nope",
            404,
            r#"{"error":{"code":"itemNotFound"}}"#,
        ));
        let client = test_client(&transport);

        let error = client
            .resolve_site("contoso.sharepoint.com", "/sites/Nope")
            .await
            .expect_err("404 site");
        assert!(matches!(error, GraphError::ResourceNotFound { kind: ResourceKind::Site, .. }));
    }

    #[tokio::test]
    async fn directory_errors_are_transport_failures() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_token()
                .on_get("/sites/site-1/lists", 503, "Service Unavailable"),
        );
        let client = test_client(&transport);

        let error = client.resolve_list("site-1", "Survey 2024").await.expect_err("503");
        assert!(matches!(error, GraphError::Transport { status: Some(503), .. }));
    }

    #[tokio::test]
    async fn list_enumeration_follows_continuation_cursors() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_token()
                .on_get(
                    "/sites/site-1/lists",
                    200,
                    r#"{"value":[{"id":"a","displayName":"A"}],"@odata.nextLink":"https://graph.test/v1.0/sites/site-1/lists?$skiptoken=p2"}"#,
                )
                .on_get("skiptoken=p2", 200, r#"{"value":[{"id":"b","displayName":"B"}]}"#),
        );
        let client = test_client(&transport);

        let lists = client.list_lists("site-1").await.expect("lists");
        let labels: Vec<&str> = lists.iter().map(ListSummary::label).collect();
        assert_eq!(labels, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn malformed_list_entries_are_skipped_without_failing() {
        let transport = Arc::new(ScriptedTransport::new().with_token().on_get(
            "/sites/site-1/lists",
            200,
            r#"{"value":[{"displayName":"No Id"},{"id":"b","displayName":"B"}]}"#,
        ));
        let client = test_client(&transport);

        let lists = client.list_lists("site-1").await.expect("lists");
        let labels: Vec<&str> = lists.iter().map(ListSummary::label).collect();
        assert_eq!(labels, vec!["B"]);
    }
}
