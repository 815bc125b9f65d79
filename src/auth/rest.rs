//! Authenticator backed by the hosted store's auth endpoint.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{ActorIdentity, AuthError, Authenticator},
    config::StoreSettings,
};

const USER_PATH: &str = "auth/v1/user";
const API_KEY_HEADER: &str = "apikey";

/// Resolves bearer tokens against the hosted auth endpoint. The store's
/// row-level permissions are scoped by the same token; this only establishes
/// who the caller is.
#[derive(Clone)]
pub struct RestAuthenticator {
    client: Client,
    base_url: Arc<str>,
    api_key: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
}

impl RestAuthenticator {
    /// Build an authenticator from the store settings.
    pub fn new(settings: &StoreSettings) -> Result<Self, AuthError> {
        let client = Client::builder()
            .build()
            .map_err(|err| AuthError::Unavailable(format!("building auth client: {err}")))?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(settings.base_url.as_str()),
            api_key: Arc::<str>::from(settings.api_key.as_str()),
        })
    }
}

impl Authenticator for RestAuthenticator {
    fn verify(&self, token: String) -> BoxFuture<'static, Result<ActorIdentity, AuthError>> {
        let auth = self.clone();
        Box::pin(async move {
            let url = format!("{}/{}", auth.base_url, USER_PATH);
            let response = auth
                .client
                .get(&url)
                .header(API_KEY_HEADER, auth.api_key.as_ref())
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|err| AuthError::Unavailable(format!("auth lookup failed: {err}")))?;

            match response.status() {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Err(AuthError::InvalidCredential)
                }
                status if status.is_success() => {
                    let user = response.json::<UserResponse>().await.map_err(|err| {
                        AuthError::Unavailable(format!("decoding auth response: {err}"))
                    })?;
                    Ok(ActorIdentity { actor_id: user.id })
                }
                status => Err(AuthError::Unavailable(format!(
                    "unexpected auth response status {status}"
                ))),
            }
        })
    }
}
