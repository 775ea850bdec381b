//! Hosted remote store
//!
//! Reads and writes go through the PostgREST HTTP API; realtime changes
//! arrive over the websocket channel in [`super::realtime`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, info};

use super::realtime::{self, ChannelHandle};
use super::{EventFilter, RemoteError, RemoteStore, Subscription, SubscriptionId};
use crate::models::Collection;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// PostgREST + realtime client for one project
pub struct SupabaseRemote {
    http: Client,
    base_url: String,
    api_key: String,
    channels: Mutex<HashMap<SubscriptionId, ChannelHandle>>,
}

impl SupabaseRemote {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Unreachable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            channels: Mutex::new(HashMap::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.table_name())
    }

    fn request(&self, method: Method, collection: Collection) -> RequestBuilder {
        self.http
            .request(method, self.table_url(collection))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, collection: Collection, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::from_http(collection, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            collection,
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch_rows(
        &self,
        collection: Collection,
        query: &[(&str, &str)],
    ) -> Result<Vec<Value>, RemoteError> {
        let request = self.request(Method::GET, collection).query(query);
        let rows = self
            .send(collection, request)
            .await?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::from_http(collection, e))?;
        debug!("Fetched {} rows from {}", rows.len(), collection);
        Ok(rows)
    }
}

/// Query for a full-collection read
fn list_query(collection: Collection) -> Vec<(&'static str, &'static str)> {
    let mut query = vec![("select", "*")];
    if collection == Collection::Students {
        query.push(("order", "created_at.desc"));
    }
    query
}

/// PostgREST filter value matching any of `ids`
fn id_in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[async_trait]
impl RemoteStore for SupabaseRemote {
    async fn fetch_all(&self, collection: Collection) -> Result<Vec<Value>, RemoteError> {
        self.fetch_rows(collection, &list_query(collection)).await
    }

    async fn fetch_one(&self, collection: Collection) -> Result<Option<Value>, RemoteError> {
        let rows = self
            .fetch_rows(collection, &[("select", "*"), ("limit", "1")])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert(&self, collection: Collection, rows: Vec<Value>) -> Result<(), RemoteError> {
        if rows.is_empty() {
            return Ok(());
        }
        let count = rows.len();
        let request = self
            .request(Method::POST, collection)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows);
        self.send(collection, request).await?;
        debug!("Upserted {} rows into {}", count, collection);
        Ok(())
    }

    async fn delete(&self, collection: Collection, ids: Vec<String>) -> Result<(), RemoteError> {
        if ids.is_empty() {
            return Ok(());
        }
        let filter = id_in_filter(&ids);
        let request = self
            .request(Method::DELETE, collection)
            .query(&[("id", filter.as_str())]);
        self.send(collection, request).await?;
        debug!("Deleted {} rows from {}", ids.len(), collection);
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        filter: EventFilter,
    ) -> Result<Subscription, RemoteError> {
        let url = realtime::socket_url(&self.base_url, &self.api_key);
        let (handle, events) = realtime::open_channel(&url, collection, filter).await?;

        let id = SubscriptionId::new();
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, handle);
        Ok(Subscription {
            id,
            collection,
            events,
        })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RemoteError> {
        let handle = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&id)
            .ok_or(RemoteError::UnknownSubscription(id))?;
        handle.close().await;
        info!("Released realtime subscription {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url() {
        let remote = SupabaseRemote::new("https://abc.supabase.co/", "anon").unwrap();
        assert_eq!(remote.base_url(), "https://abc.supabase.co");
        assert_eq!(
            remote.table_url(Collection::TeacherProfile),
            "https://abc.supabase.co/rest/v1/teacher_profile"
        );
    }

    #[test]
    fn test_students_are_ordered_by_recency() {
        assert!(list_query(Collection::Students).contains(&("order", "created_at.desc")));
        assert_eq!(list_query(Collection::Links), vec![("select", "*")]);
    }

    #[test]
    fn test_id_in_filter() {
        let ids = vec!["1".to_string(), "17040".to_string()];
        assert_eq!(id_in_filter(&ids), r#"in.("1","17040")"#);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connectivity_error() {
        // Port 9 on localhost is the discard service; nothing listens there
        let remote = SupabaseRemote::new("http://127.0.0.1:9", "anon").unwrap();
        let err = remote.fetch_all(Collection::Links).await.unwrap_err();
        assert!(err.is_connectivity(), "unexpected error: {}", err);
    }
}
