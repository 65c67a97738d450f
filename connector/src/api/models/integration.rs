use serde::Deserialize;

/// Form identifying whose OAuth flow an operation belongs to.
#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub user_id: String,
    pub org_id: String,
}

/// Query parameters received on the provider redirect.
///
/// The provider sends either `code` and `state`, or `error` with an
/// optional `error_description`.
#[derive(Debug, Default, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Form carrying the credential JSON previously returned by `/credentials`.
#[derive(Debug, Deserialize)]
pub struct LoadItemsForm {
    pub credentials: String,
}
