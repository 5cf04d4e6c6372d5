//! Cursor-following retrieval of list items.

use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use intake_types::{RawRecord, ResourceHandle};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::encode_segment;
use crate::{GraphClient, GraphError};

/// Response field carrying the URL of the next page.
pub const NEXT_LINK_FIELD: &str = "@odata.nextLink";

/// Keeps only the `fields` keys of `record`, when a projection is given.
pub fn project_record(record: RawRecord, fields: Option<&BTreeSet<String>>) -> RawRecord {
    match fields {
        Some(fields) => record.into_iter().filter(|(key, _)| fields.contains(key)).collect(),
        None => record,
    }
}

impl GraphClient {
    /// Retrieves every item of the list behind `handle`, in page order.
    ///
    /// Each record is the item's field map. When `fields` is given, records
    /// carry only those keys. A failing page aborts the whole retrieval; no
    /// partial result is returned.
    pub async fn fetch_all(
        &self,
        handle: &ResourceHandle,
        fields: Option<&BTreeSet<String>>,
    ) -> Result<Vec<RawRecord>, GraphError> {
        let start = Instant::now();
        let url = self.endpoint(&format!(
            "/sites/{}/lists/{}/items?expand=fields",
            encode_segment(&handle.site_id),
            encode_segment(&handle.list_id)
        ));
        let items = self.collect_pages(url).await?;

        let records: Vec<RawRecord> = items
            .into_iter()
            .map(|item| match item {
                Value::Object(mut item) => match item.remove("fields") {
                    Some(Value::Object(fields)) => fields,
                    _ => RawRecord::new(),
                },
                _ => RawRecord::new(),
            })
            .map(|record| project_record(record, fields))
            .collect();

        info!(
            handle = %handle,
            records = records.len(),
            duration_ms = start.elapsed().as_millis(),
            "list items fetched"
        );
        Ok(records)
    }

    /// Follows `@odata.nextLink` from `first_url` until no cursor remains,
    /// concatenating each page's `value` array.
    ///
    /// A cursor that was already visited is a transport failure rather than
    /// an endless loop.
    pub(crate) async fn collect_pages(&self, first_url: String) -> Result<Vec<Value>, GraphError> {
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(first_url);
        let mut page_count = 0usize;

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                return Err(GraphError::transport(url, None, "continuation cursor repeated"));
            }
            let mut page = self.get_json(&url).await?;
            page_count += 1;

            match page.get_mut("value").map(Value::take) {
                Some(Value::Array(values)) => {
                    debug!(page = page_count, items = values.len(), "page received");
                    items.extend(values);
                }
                Some(Value::Null) | None => {
                    debug!(page = page_count, "page without items");
                }
                Some(_) => {
                    return Err(GraphError::transport(url, Some(200), "page 'value' is not an array"));
                }
            }

            next = page
                .get(NEXT_LINK_FIELD)
                .and_then(Value::as_str)
                .filter(|link| !link.is_empty())
                .map(str::to_string);
        }
        Ok(items)
    }
}
