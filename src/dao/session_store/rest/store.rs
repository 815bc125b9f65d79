use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, header};

use crate::dao::{
    models::{SessionEntity, SessionPatch},
    session_store::SessionStore,
    storage::{StorageError, StorageResult},
};

use super::{
    RestConfig, RestDaoError, RestResult,
    models::{PatchBody, SessionRow, VersionRow},
};

const SESSIONS_PATH: &str = "rest/v1/sessions";
const API_KEY_HEADER: &str = "apikey";

/// [`SessionStore`] backed by the hosted store's REST interface.
#[derive(Clone)]
pub struct RestSessionStore {
    client: Client,
    base_url: Arc<str>,
    api_key: Arc<str>,
}

impl RestSessionStore {
    /// Build a client and verify the sessions table is reachable.
    pub async fn connect(config: RestConfig) -> RestResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RestDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::<str>::from(config.base_url.as_str()),
            api_key: Arc::<str>::from(config.api_key.as_str()),
        };

        store.probe().await?;
        Ok(store)
    }

    fn request(&self, method: Method) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, SESSIONS_PATH);
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, self.api_key.as_ref())
            .bearer_auth(self.api_key.as_ref())
    }

    /// Minimal authenticated read against the sessions table.
    async fn probe(&self) -> RestResult<()> {
        let response = self
            .request(Method::GET)
            .query(&[("select", "code"), ("limit", "1")])
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: SESSIONS_PATH.into(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RestDaoError::RequestStatus {
                path: SESSIONS_PATH.into(),
                status: response.status(),
            })
        }
    }

    async fn fetch_rows(&self, query: &[(&str, String)]) -> RestResult<Vec<SessionRow>> {
        let response = self
            .request(Method::GET)
            .query(query)
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: SESSIONS_PATH.into(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(RestDaoError::RequestStatus {
                path: SESSIONS_PATH.into(),
                status: response.status(),
            });
        }

        response
            .json::<Vec<SessionRow>>()
            .await
            .map_err(|source| RestDaoError::DecodeResponse {
                path: SESSIONS_PATH.into(),
                source,
            })
    }

    async fn fetch_version(&self, code: &str) -> StorageResult<u64> {
        let response = self
            .request(Method::GET)
            .query(&[
                ("select", "version".to_string()),
                ("code", format!("eq.{code}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: SESSIONS_PATH.into(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(RestDaoError::RequestStatus {
                path: SESSIONS_PATH.into(),
                status: response.status(),
            }
            .into());
        }

        let mut rows = response.json::<Vec<VersionRow>>().await.map_err(|source| {
            RestDaoError::DecodeResponse {
                path: SESSIONS_PATH.into(),
                source,
            }
        })?;

        rows.pop().map(|row| row.version).ok_or(StorageError::NoRows)
    }

    async fn patch_rows(
        &self,
        query: &[(&str, String)],
        body: &PatchBody,
    ) -> RestResult<Vec<SessionRow>> {
        let response = self
            .request(Method::PATCH)
            .query(query)
            .header(header::HeaderName::from_static("prefer"), "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: SESSIONS_PATH.into(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(RestDaoError::RequestStatus {
                path: SESSIONS_PATH.into(),
                status: response.status(),
            });
        }

        response
            .json::<Vec<SessionRow>>()
            .await
            .map_err(|source| RestDaoError::DecodeResponse {
                path: SESSIONS_PATH.into(),
                source,
            })
    }
}

impl SessionStore for RestSessionStore {
    fn find_session(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let query = [
                ("select", "*".to_string()),
                ("code", format!("eq.{code}")),
                ("limit", "1".to_string()),
            ];
            let mut rows = store.fetch_rows(&query).await?;
            match rows.pop() {
                Some(row) => row.into_entity().map(Some),
                None => Ok(None),
            }
        })
    }

    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let code = session.code.clone();
            let row = SessionRow::from_entity(session);
            let response = store
                .request(Method::POST)
                .header(header::HeaderName::from_static("prefer"), "return=minimal")
                .json(&row)
                .send()
                .await
                .map_err(|source| RestDaoError::RequestSend {
                    path: SESSIONS_PATH.into(),
                    source,
                })?;

            match response.status() {
                // Uniqueness violation: another generator claimed the code first.
                StatusCode::CONFLICT => Err(StorageError::Conflict { code }),
                status if status.is_success() => Ok(()),
                status => Err(RestDaoError::RequestStatus {
                    path: SESSIONS_PATH.into(),
                    status,
                }
                .into()),
            }
        })
    }

    fn update_session(
        &self,
        code: String,
        expected_version: u64,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let body = PatchBody::new(patch, expected_version + 1);
            let query = [
                ("code", format!("eq.{code}")),
                ("version", format!("eq.{expected_version}")),
            ];
            let mut rows = store.patch_rows(&query, &body).await?;
            match rows.pop() {
                Some(row) => row.into_entity(),
                // Nothing matched: the row either moved on or never existed.
                None => match store.fetch_version(&code).await {
                    Ok(_) => Err(StorageError::Conflict { code }),
                    Err(StorageError::NoRows) => Err(StorageError::NoRows),
                    Err(err) => Err(err),
                },
            }
        })
    }

    fn force_update_session(
        &self,
        code: String,
        patch: SessionPatch,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let current = store.fetch_version(&code).await?;
            let body = PatchBody::new(patch, current + 1);
            let query = [("code", format!("eq.{code}"))];
            let mut rows = store.patch_rows(&query, &body).await?;
            rows.pop()
                .ok_or(StorageError::NoRows)
                .and_then(SessionRow::into_entity)
        })
    }

    fn count_sessions(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let response = store
                .request(Method::GET)
                .query(&[("select", "code")])
                .header(header::HeaderName::from_static("prefer"), "count=exact")
                .header(header::RANGE, "0-0")
                .send()
                .await
                .map_err(|source| RestDaoError::RequestSend {
                    path: SESSIONS_PATH.into(),
                    source,
                })?;

            if !response.status().is_success() {
                return Err(RestDaoError::RequestStatus {
                    path: SESSIONS_PATH.into(),
                    status: response.status(),
                }
                .into());
            }

            response
                .headers()
                .get(header::CONTENT_RANGE)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_content_range)
                .ok_or_else(|| {
                    RestDaoError::InvalidCountHeader {
                        path: SESSIONS_PATH.into(),
                    }
                    .into()
                })
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.probe().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.probe().await.map_err(Into::into) })
    }
}

/// Extract the total from a `Content-Range` header such as `0-0/42` or `*/42`.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.parse::<u64>().ok()
}
