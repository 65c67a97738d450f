use std::net::{Ipv4Addr, SocketAddr};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroize;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// TCP socket address to listen for incoming connections.
    ///
    /// Default: `0.0.0.0:8000`
    pub listen_addr: SocketAddr,

    pub oauth: OAuthConfig,

    pub crm: CrmConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: (Ipv4Addr::UNSPECIFIED, 8000).into(),
            oauth: OAuthConfig::default(),
            crm: CrmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Provider page the user is sent to for consent.
    pub authorization_url: Url,

    /// Provider endpoint exchanging an authorization code for tokens.
    pub token_url: Url,

    /// Must match the redirect URL registered with the provider app.
    ///
    /// Example: `https://api.example.com/integrations/hubspot/oauth2callback`
    pub redirect_uri: String,

    pub scopes: Vec<String>,
}

impl OAuthConfig {
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_url: default_url("https://app.hubspot.com/oauth/authorize"),
            token_url: default_url("https://api.hubapi.com/oauth/v1/token"),
            redirect_uri: "http://localhost:8000/integrations/hubspot/oauth2callback".to_owned(),
            scopes: vec![
                "crm.objects.companies.read".to_owned(),
                "crm.objects.contacts.read".to_owned(),
            ],
        }
    }
}

fn default_url(url: &str) -> Url {
    Url::parse(url).expect("shouldn't happen")
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    /// Base URL of the CRM REST API, without a trailing slash.
    pub api_base_url: String,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.hubapi.com".to_owned(),
        }
    }
}

/// OAuth app credentials — loaded exclusively from environment variables.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct ApiSecrets {
    pub client_id: String,
    pub client_secret: String,
}

impl ApiSecrets {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            client_id: std::env::var("CLIENT_ID").context("CLIENT_ID not set")?,
            client_secret: std::env::var("CLIENT_SECRET").context("CLIENT_SECRET not set")?,
        })
    }
}
