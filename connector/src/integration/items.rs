use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::state::ApiState;
use crate::error::{ConnectorError, ConnectorResult};
use crate::integration::oauth::OAuthCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemKind {
    Company,
    Contact,
}

/// A remote object list the connector reads.
#[derive(Debug, Clone, Copy)]
pub struct Collection {
    pub object_type: &'static str,
    pub kind: ItemKind,
}

/// Read in this order; the output keeps it.
pub const COLLECTIONS: [Collection; 2] = [
    Collection {
        object_type: "companies",
        kind: ItemKind::Company,
    },
    Collection {
        object_type: "contacts",
        kind: ItemKind::Contact,
    },
];

/// Normalized remote object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationItem {
    /// `None` when the remote object came without a usable id.
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Connectors for hierarchical sources (drives, wikis) attach these; the
    /// CRM connector leaves them out.
    #[serde(flatten)]
    pub details: Option<ItemDetails>,
}

impl IntegrationItem {
    pub fn new(id: Option<String>, name: Option<String>, kind: ItemKind) -> Self {
        Self {
            id,
            name,
            kind,
            details: None,
        }
    }
}

/// Extension point for connectors whose sources have hierarchy, timestamps
/// or file metadata. Serialized inline next to `id`, `name` and `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDetails {
    pub directory: bool,
    pub parent_id: Option<String>,
    pub parent_path_or_name: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub last_modified_time: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub children: Vec<String>,
    pub mime_type: Option<String>,
    pub delta: Option<String>,
    pub drive_id: Option<String>,
    pub visibility: bool,
}

impl Default for ItemDetails {
    fn default() -> Self {
        Self {
            directory: false,
            parent_id: None,
            parent_path_or_name: None,
            creation_time: None,
            last_modified_time: None,
            url: None,
            children: Vec::new(),
            mime_type: None,
            delta: None,
            drive_id: None,
            visibility: true,
        }
    }
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<CrmObject>,
}

#[derive(Deserialize)]
struct CrmObject {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    #[serde(default)]
    properties: CrmProperties,
}

#[derive(Default, Deserialize)]
struct CrmProperties {
    #[serde(default)]
    name: Option<String>,
}

/// Accepts string or numeric ids; anything else becomes `None`.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(id)) => Some(id),
        Some(serde_json::Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

/// Reads the first page of every collection.
///
/// Fails as a whole if any collection fails; nothing partial is returned.
pub async fn fetch_items(
    state: &ApiState,
    credentials: &OAuthCredentials,
) -> ConnectorResult<Vec<IntegrationItem>> {
    let mut items = Vec::new();

    for collection in COLLECTIONS {
        let objects = fetch_collection(state, &credentials.access_token, collection).await?;
        items.extend(
            objects
                .into_iter()
                .map(|object| IntegrationItem::new(object.id, object.properties.name, collection.kind)),
        );
    }

    tracing::info!(count = items.len(), "fetched integration items");

    Ok(items)
}

async fn fetch_collection(
    state: &ApiState,
    access_token: &str,
    collection: Collection,
) -> ConnectorResult<Vec<CrmObject>> {
    let url = format!(
        "{}/crm/v3/objects/{}",
        state.config().crm.api_base_url.trim_end_matches('/'),
        collection.object_type,
    );

    tracing::debug!(%url, "listing CRM objects");

    let response = state
        .http_client()
        .get(&url)
        .bearer_auth(access_token)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ConnectorError::from_upstream(response).await);
    }

    let list: ListResponse = response.json().await?;
    Ok(list.results)
}
