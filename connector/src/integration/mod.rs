//! CRM connector flow: consent redirect, callback, one-time credential
//! handoff, and the item fetch that uses the delivered token.

pub use self::items::{IntegrationItem, fetch_items};
pub use self::oauth::{OAuthCredentials, authorize, oauth2_callback, take_credentials};

pub mod items;
pub mod oauth;
pub mod oauth_state;
