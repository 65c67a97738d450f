use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::models::integration::OAuthCallbackQuery;
use crate::api::state::ApiState;
use crate::error::{ConnectorError, ConnectorResult};
use crate::integration::oauth_state::OAuthState;
use crate::store::{credentials_key, state_key};

/// Token endpoint response, kept verbatim.
///
/// Fields other than the standard ones are preserved in `extra`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthCredentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Builds the provider consent URL and stages the matching anti-CSRF state.
pub async fn authorize(state: &ApiState, user_id: &str, org_id: &str) -> ConnectorResult<Url> {
    let oauth = &state.config().oauth;
    let secrets = state.secrets();

    let oauth_state = OAuthState::generate(user_id, org_id);

    let mut auth_url = oauth.authorization_url.clone();
    auth_url
        .query_pairs_mut()
        .append_pair("client_id", &secrets.client_id)
        .append_pair("scope", &oauth.scope())
        .append_pair("redirect_uri", &oauth.redirect_uri)
        .append_pair("state", &oauth_state.encode()?)
        .append_pair("response_type", "code");

    state
        .store()
        .put(
            &state_key(org_id, user_id),
            &oauth_state.to_json()?,
            state.store_config().state_ttl,
        )
        .await
        .map_err(ConnectorError::Store)?;

    tracing::info!(org_id, user_id, "OAuth authorization initiated");

    Ok(auth_url)
}

/// Validates the provider redirect, exchanges the code and stages the credentials.
///
/// The staged state is deleted alongside the exchange whatever its outcome,
/// so a state value is never redeemable twice.
pub async fn oauth2_callback(state: &ApiState, query: OAuthCallbackQuery) -> ConnectorResult<()> {
    if let Some(error) = query.error.filter(|error| !error.is_empty()) {
        return Err(ConnectorError::BadRequest(
            query.error_description.unwrap_or(error),
        ));
    }

    let code = query.code.filter(|code| !code.is_empty());
    let encoded_state = query.state.filter(|state| !state.is_empty());
    let (Some(code), Some(encoded_state)) = (code, encoded_state) else {
        return Err(ConnectorError::bad_request("missing code or state"));
    };

    let returned = OAuthState::decode(&encoded_state)?;
    let key = state_key(&returned.org_id, &returned.user_id);

    let stored = state.store().get(&key).await.map_err(ConnectorError::Store)?;
    if !stored.is_some_and(|stored| returned.matches_stored(&stored)) {
        tracing::warn!(
            org_id = %returned.org_id,
            user_id = %returned.user_id,
            "OAuth callback rejected: state mismatch"
        );
        return Err(ConnectorError::bad_request("state mismatch"));
    }

    let (credentials, deleted) = tokio::join!(
        exchange_code(state, &code),
        state.store().delete(&key),
    );
    let credentials = credentials?;
    deleted.map_err(ConnectorError::Store)?;

    state
        .store()
        .put(
            &credentials_key(&returned.org_id, &returned.user_id),
            &serde_json::to_string(&credentials)?,
            state.store_config().credentials_ttl,
        )
        .await
        .map_err(ConnectorError::Store)?;

    tracing::info!(
        org_id = %returned.org_id,
        user_id = %returned.user_id,
        "OAuth credentials staged"
    );

    Ok(())
}

/// Hands over the staged credentials. A second call for the same user fails.
pub async fn take_credentials(
    state: &ApiState,
    user_id: &str,
    org_id: &str,
) -> ConnectorResult<OAuthCredentials> {
    let raw = state
        .store()
        .take(&credentials_key(org_id, user_id))
        .await
        .map_err(ConnectorError::Store)?
        .ok_or_else(|| ConnectorError::not_found("no credentials found"))?;

    tracing::info!(org_id, user_id, "OAuth credentials delivered");

    serde_json::from_str(&raw).map_err(Into::into)
}

async fn exchange_code(state: &ApiState, code: &str) -> ConnectorResult<OAuthCredentials> {
    let oauth = &state.config().oauth;
    let secrets = state.secrets();

    tracing::debug!(token_url = %oauth.token_url, "exchanging authorization code");

    let response = state
        .http_client()
        .post(oauth.token_url.as_str())
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
            ("code", code),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ConnectorError::from_upstream(response).await);
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::integration::testing::{TestContext, encoded_state_of_url, state_of_url};

    const TOKEN_BODY: &str = r#"{
        "token_type": "bearer",
        "access_token": "CJSP5qf1KhICAQEYs-gDIIGOBii",
        "refresh_token": "6f18f21e-a743-4509-b7fd-1a5e632fffa1",
        "expires_in": 1800
    }"#;

    fn callback_query(code: &str, state: &str) -> OAuthCallbackQuery {
        OAuthCallbackQuery {
            code: Some(code.to_owned()),
            state: Some(state.to_owned()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn authorize_builds_url_and_stages_state() {
        let ctx = TestContext::new().await;

        let url = authorize(&ctx.state, "TestUser", "TestOrg").await.unwrap();

        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "test-client");
        assert_eq!(
            params["scope"],
            "crm.objects.companies.read crm.objects.contacts.read"
        );
        assert_eq!(params["redirect_uri"], ctx.state.config().oauth.redirect_uri);
        assert_eq!(params["response_type"], "code");
        assert!(url.as_str().starts_with(&format!("{}/oauth/authorize?", ctx.server.url())));

        let returned = state_of_url(&url);
        assert_eq!(returned.user_id, "TestUser");
        assert_eq!(returned.org_id, "TestOrg");

        let stored = ctx.memory.get("state:TestOrg:TestUser").unwrap();
        assert_eq!(serde_json::from_str::<OAuthState>(&stored).unwrap(), returned);
    }

    #[tokio::test]
    async fn reauthorizing_replaces_previous_state() {
        let ctx = TestContext::new().await;

        let first = state_of_url(&authorize(&ctx.state, "u", "o").await.unwrap());
        let second = state_of_url(&authorize(&ctx.state, "u", "o").await.unwrap());

        let stored = ctx.memory.get("state:o:u").unwrap();
        assert!(second.matches_stored(&stored));
        assert!(!first.matches_stored(&stored));
    }

    #[tokio::test]
    async fn callback_exchanges_code_and_stages_credentials() {
        let mut ctx = TestContext::new().await;
        let token = ctx
            .server
            .mock("POST", "/oauth/v1/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("client_id".into(), "test-client".into()),
                Matcher::UrlEncoded("client_secret".into(), "test-secret".into()),
                Matcher::UrlEncoded(
                    "redirect_uri".into(),
                    ctx.state.config().oauth.redirect_uri.clone(),
                ),
                Matcher::UrlEncoded("code".into(), "auth-code".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .expect(1)
            .create_async()
            .await;

        let url = authorize(&ctx.state, "TestUser", "TestOrg").await.unwrap();
        let encoded = encoded_state_of_url(&url);

        oauth2_callback(&ctx.state, callback_query("auth-code", &encoded))
            .await
            .unwrap();

        token.assert_async().await;
        assert_eq!(ctx.memory.get("state:TestOrg:TestUser"), None);

        let staged = ctx.memory.get("credentials:TestOrg:TestUser").unwrap();
        let staged: serde_json::Value = serde_json::from_str(&staged).unwrap();
        let expected: serde_json::Value = serde_json::from_str(TOKEN_BODY).unwrap();
        assert_eq!(staged, expected);
    }

    #[tokio::test]
    async fn state_is_single_use() {
        let mut ctx = TestContext::new().await;
        let _token = ctx
            .server
            .mock("POST", "/oauth/v1/token")
            .with_status(200)
            .with_body(TOKEN_BODY)
            .expect(1)
            .create_async()
            .await;

        let url = authorize(&ctx.state, "u", "o").await.unwrap();
        let encoded = encoded_state_of_url(&url);

        oauth2_callback(&ctx.state, callback_query("c", &encoded))
            .await
            .unwrap();
        let err = oauth2_callback(&ctx.state, callback_query("c", &encoded))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::BadRequest(ref msg) if msg == "state mismatch"));
    }

    #[tokio::test]
    async fn mismatched_nonce_never_reaches_token_endpoint() {
        let mut ctx = TestContext::new().await;
        let token = ctx
            .server
            .mock("POST", "/oauth/v1/token")
            .expect(0)
            .create_async()
            .await;

        authorize(&ctx.state, "u", "o").await.unwrap();
        let forged = OAuthState {
            nonce: "forged".to_owned(),
            user_id: "u".to_owned(),
            org_id: "o".to_owned(),
        };

        let err = oauth2_callback(&ctx.state, callback_query("c", &forged.encode().unwrap()))
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::BadRequest(ref msg) if msg == "state mismatch"));
        token.assert_async().await;
        // The legitimate flow is still redeemable.
        assert!(ctx.memory.get("state:o:u").is_some());
    }

    #[tokio::test]
    async fn unknown_state_is_rejected() {
        let ctx = TestContext::new().await;
        let never_issued = OAuthState::generate("u", "o");

        let err = oauth2_callback(&ctx.state, callback_query("c", &never_issued.encode().unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::BadRequest(ref msg) if msg == "state mismatch"));
    }

    #[tokio::test]
    async fn provider_error_is_reported() {
        let ctx = TestContext::new().await;
        let query = OAuthCallbackQuery {
            error: Some("access_denied".to_owned()),
            error_description: Some("The user denied access".to_owned()),
            ..Default::default()
        };

        let err = oauth2_callback(&ctx.state, query).await.unwrap_err();
        assert!(matches!(err, ConnectorError::BadRequest(ref msg) if msg == "The user denied access"));
    }

    #[tokio::test]
    async fn empty_error_param_is_ignored() {
        let mut ctx = TestContext::new().await;
        let token = ctx
            .server
            .mock("POST", "/oauth/v1/token")
            .with_status(200)
            .with_body(TOKEN_BODY)
            .expect(1)
            .create_async()
            .await;

        let url = authorize(&ctx.state, "u", "o").await.unwrap();
        let query = OAuthCallbackQuery {
            error: Some(String::new()),
            ..callback_query("c", &encoded_state_of_url(&url))
        };

        oauth2_callback(&ctx.state, query).await.unwrap();
        token.assert_async().await;

        let err = oauth2_callback(&ctx.state, OAuthCallbackQuery {
            error: Some(String::new()),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ConnectorError::BadRequest(ref msg) if msg == "missing code or state"));
    }

    #[tokio::test]
    async fn missing_code_or_state_is_rejected() {
        let ctx = TestContext::new().await;

        for query in [
            OAuthCallbackQuery::default(),
            OAuthCallbackQuery {
                code: Some("c".to_owned()),
                ..Default::default()
            },
            callback_query("", "abc"),
        ] {
            let err = oauth2_callback(&ctx.state, query).await.unwrap_err();
            assert!(matches!(err, ConnectorError::BadRequest(ref msg) if msg == "missing code or state"));
        }
    }

    #[tokio::test]
    async fn failed_exchange_still_consumes_state() {
        let mut ctx = TestContext::new().await;
        let _token = ctx
            .server
            .mock("POST", "/oauth/v1/token")
            .with_status(400)
            .with_body(r#"{"status":"BAD_AUTH_CODE","message":"missing or unknown auth code"}"#)
            .create_async()
            .await;

        let url = authorize(&ctx.state, "u", "o").await.unwrap();
        let encoded = encoded_state_of_url(&url);

        let err = oauth2_callback(&ctx.state, callback_query("c", &encoded))
            .await
            .unwrap_err();

        match err {
            ConnectorError::Upstream { status, body } => {
                assert_eq!(status.as_u16(), 400);
                assert!(body.contains("BAD_AUTH_CODE"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ctx.memory.get("state:o:u"), None);
        assert_eq!(ctx.memory.get("credentials:o:u"), None);
    }

    #[tokio::test]
    async fn credentials_are_delivered_once() {
        let ctx = TestContext::new().await;
        ctx.memory.put(
            "credentials:o:u",
            TOKEN_BODY,
            std::time::Duration::from_secs(60),
        );

        let credentials = take_credentials(&ctx.state, "u", "o").await.unwrap();
        assert_eq!(credentials.access_token, "CJSP5qf1KhICAQEYs-gDIIGOBii");
        assert_eq!(credentials.expires_in, Some(1800));

        let err = take_credentials(&ctx.state, "u", "o").await.unwrap_err();
        assert!(matches!(err, ConnectorError::NotFound(ref msg) if msg == "no credentials found"));
    }

    #[tokio::test]
    async fn expired_credentials_are_absent() {
        let ctx = TestContext::new().await;
        ctx.memory
            .put("credentials:o:u", TOKEN_BODY, std::time::Duration::ZERO);

        let err = take_credentials(&ctx.state, "u", "o").await.unwrap_err();
        assert!(matches!(err, ConnectorError::NotFound(_)));
    }

    #[test]
    fn unknown_token_fields_survive() {
        let raw = r#"{"access_token":"a","hub_id":42,"scopes":["crm"]}"#;
        let credentials: OAuthCredentials = serde_json::from_str(raw).unwrap();
        assert_eq!(credentials.extra["hub_id"], 42);

        let back: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&credentials).unwrap()).unwrap();
        assert_eq!(back, serde_json::from_str::<serde_json::Value>(raw).unwrap());
        assert!(!format!("{credentials:?}").contains("\"a\""));
    }
}
