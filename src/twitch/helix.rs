use crate::error::BotResult;
use crate::models::{SubscriptionRecord, SubscriptionTable};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const HELIX_ENDPOINT: &str = "https://api.twitch.tv/helix";
const PAGE_SIZE: &str = "100";

#[derive(Debug, Clone, Deserialize)]
pub struct HelixUser {
    pub id: String,
    pub login: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DataResponse<T> {
    data: Vec<T>,
}

/// One page of `GET /subscriptions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionPage {
    pub data: Vec<SubscriptionRecord>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Anything that can hand out pages of a broadcaster's subscriptions.
#[async_trait]
pub trait SubscriptionSource {
    async fn subscription_page(
        &self,
        broadcaster_id: &str,
        cursor: Option<&str>,
    ) -> BotResult<SubscriptionPage>;
}

/// Minimal Helix client for the two lookups the bot needs.
pub struct HelixClient {
    client: Client,
    endpoint: String,
    client_id: String,
    access_token: String,
}

impl HelixClient {
    pub fn new(client_id: &str, access_token: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: HELIX_ENDPOINT.to_string(),
            client_id: client_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/{}", self.endpoint, path))
            .header("Client-ID", &self.client_id)
            .bearer_auth(&self.access_token)
    }

    /// Looks up a user by login. `Ok(None)` if the login doesn't exist.
    pub async fn get_user(&self, login: &str) -> BotResult<Option<HelixUser>> {
        let response = self
            .get("users")
            .query(&[("login", login)])
            .send()
            .await?
            .error_for_status()?;
        let body: DataResponse<HelixUser> = response.json().await?;
        Ok(body.data.into_iter().next())
    }

    pub async fn get_broadcaster_subscriptions(
        &self,
        broadcaster_id: &str,
        cursor: Option<&str>,
    ) -> BotResult<SubscriptionPage> {
        let mut query = vec![("broadcaster_id", broadcaster_id), ("first", PAGE_SIZE)];
        if let Some(cursor) = cursor {
            query.push(("after", cursor));
        }

        let response = self
            .get("subscriptions")
            .query(&query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SubscriptionSource for HelixClient {
    async fn subscription_page(
        &self,
        broadcaster_id: &str,
        cursor: Option<&str>,
    ) -> BotResult<SubscriptionPage> {
        self.get_broadcaster_subscriptions(broadcaster_id, cursor).await
    }
}

/// Follows the pagination cursor until the API stops returning one.
pub async fn collect_subscriptions<S>(source: &S, broadcaster_id: &str) -> BotResult<SubscriptionTable>
where
    S: SubscriptionSource + Sync + ?Sized,
{
    let mut table = SubscriptionTable::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = source.subscription_page(broadcaster_id, cursor.as_deref()).await?;
        debug!("Fetched {} subscription(s), cursor {:?}", page.data.len(), page.pagination.cursor);
        let empty_page = page.data.is_empty();
        for record in page.data {
            table.insert(record);
        }

        // An empty page ends the walk even if a cursor came back with it
        cursor = page.pagination.cursor.filter(|c| !c.is_empty());
        if cursor.is_none() || empty_page {
            break;
        }
    }

    Ok(table)
}

/// Resolves the channel and loads its subscribers. Failures are logged and
/// yield whatever was fetched (usually an empty table), never an error.
pub async fn load_subscriptions(helix: &HelixClient, channel: &str) -> SubscriptionTable {
    let broadcaster = match helix.get_user(channel).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("Channel {} not found on Helix; subscriber tiers unavailable", channel);
            return SubscriptionTable::new();
        }
        Err(e) => {
            warn!("Could not look up channel {}: {}", channel, e);
            return SubscriptionTable::new();
        }
    };

    match collect_subscriptions(helix, &broadcaster.id).await {
        Ok(table) => {
            info!("Loaded {} subscriber(s) for {}", table.len(), broadcaster.login);
            table
        }
        Err(e) => {
            warn!("Could not load subscriptions for {}: {}", broadcaster.login, e);
            SubscriptionTable::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::models::Tier;
    use std::sync::Mutex;

    /// Serves canned pages keyed by cursor and remembers the cursors asked for.
    struct CannedPages {
        pages: Vec<(Option<&'static str>, SubscriptionPage)>,
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl SubscriptionSource for CannedPages {
        async fn subscription_page(
            &self,
            _broadcaster_id: &str,
            cursor: Option<&str>,
        ) -> BotResult<SubscriptionPage> {
            self.seen.lock().unwrap().push(cursor.map(str::to_string));
            let page = self
                .pages
                .iter()
                .find(|(key, _)| *key == cursor)
                .map(|(_, page)| page.clone())
                .ok_or_else(|| BotError::Chat(format!("unexpected cursor {:?}", cursor)))?;
            Ok(page)
        }
    }

    fn page(records: &[(&str, &str)], cursor: Option<&str>) -> SubscriptionPage {
        SubscriptionPage {
            data: records.iter().map(|(l, t)| SubscriptionRecord::stub(l, t)).collect(),
            pagination: Pagination {
                cursor: cursor.map(str::to_string),
            },
        }
    }

    #[tokio::test]
    async fn follows_cursor_until_exhausted() {
        let source = CannedPages {
            pages: vec![
                (None, page(&[("alice", "1000")], Some("p2"))),
                (Some("p2"), page(&[("bob", "3000")], Some("p3"))),
                (Some("p3"), page(&[("carol", "2000")], None)),
            ],
            seen: Mutex::new(Vec::new()),
        };

        let table = collect_subscriptions(&source, "123").await.unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.tier_of("bob"), Tier::Tier3);
        assert_eq!(
            *source.seen.lock().unwrap(),
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_page_stops_pagination() {
        let source = CannedPages {
            pages: vec![(None, page(&[], Some("again")))],
            seen: Mutex::new(Vec::new()),
        };
        let table = collect_subscriptions(&source, "123").await.unwrap();
        assert_eq!(table.len(), 0);
        assert_eq!(source.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn page_error_propagates() {
        let source = CannedPages {
            pages: vec![(None, page(&[("alice", "1000")], Some("missing")))],
            seen: Mutex::new(Vec::new()),
        };
        assert!(collect_subscriptions(&source, "123").await.is_err());
    }

    #[test]
    fn parses_helix_page() {
        let raw = r#"{
            "data": [{"broadcaster_id":"1","broadcaster_login":"chan","user_id":"9",
                      "user_login":"viewer","user_name":"Viewer","tier":"1000",
                      "is_gift":false,"plan_name":"Channel Subscription"}],
            "pagination": {"cursor": "abc"},
            "total": 1, "points": 1
        }"#;
        let page: SubscriptionPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.data[0].user_login, "viewer");
        assert_eq!(page.pagination.cursor.as_deref(), Some("abc"));

        let last: SubscriptionPage = serde_json::from_str(r#"{"data":[],"pagination":{}}"#).unwrap();
        assert!(last.pagination.cursor.is_none());
    }
}
