use axum::Json;
use axum::extract::{Form, Query, State};
use axum::response::Html;

use crate::api::models::integration::{LoadItemsForm, OAuthCallbackQuery, UserForm};
use crate::api::state::ApiState;
use crate::error::{ConnectorError, ConnectorResult};
use crate::integration::{self, IntegrationItem, OAuthCredentials};

/// Served to the consent popup once the callback completes.
const CLOSE_WINDOW_HTML: &str = r#"<html>
    <script>
        window.close();
    </script>
</html>
"#;

pub async fn authorize(
    State(state): State<ApiState>,
    Form(form): Form<UserForm>,
) -> ConnectorResult<Json<String>> {
    let url = integration::authorize(&state, &form.user_id, &form.org_id).await?;
    Ok(Json(url.into()))
}

pub async fn oauth2_callback(
    State(state): State<ApiState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> ConnectorResult<Html<&'static str>> {
    integration::oauth2_callback(&state, query).await?;
    Ok(Html(CLOSE_WINDOW_HTML))
}

pub async fn credentials(
    State(state): State<ApiState>,
    Form(form): Form<UserForm>,
) -> ConnectorResult<Json<OAuthCredentials>> {
    integration::take_credentials(&state, &form.user_id, &form.org_id)
        .await
        .map(Json)
}

pub async fn load_items(
    State(state): State<ApiState>,
    Form(form): Form<LoadItemsForm>,
) -> ConnectorResult<Json<Vec<IntegrationItem>>> {
    let credentials: OAuthCredentials = serde_json::from_str(&form.credentials)
        .map_err(|e| ConnectorError::BadRequest(format!("invalid credentials: {e}")))?;

    integration::fetch_items(&state, &credentials).await.map(Json)
}
