//! Typed client for a remote bucket server.
//!
//! One `StoreClient` covers both upload shapes the server accepts; the
//! `UploadEncoding` picked at construction decides how create requests are
//! built. 403 responses become `ClientError::NotAuthorized` and 404 becomes
//! `None`/`false`, so callers can tell "does not exist" apart from "broken".

use crate::{
    handlers::object_handlers::{
        HEADER_BUCKET_NAME, HEADER_OBJECT_ID, HEADER_OBJECT_NAME, HEADER_OBJECT_SIZE,
    },
    models::{
        object::{ObjectMetadata, SizedMetadata, StoredObject},
        operation::OperationKind,
    },
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{
    Method, RequestBuilder, Response, StatusCode,
    header::{self, HeaderMap},
    multipart::{Form, Part},
};
use std::collections::BTreeMap;
use thiserror::Error;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum ClientError {
    /// A token is required for this operation and was missing or rejected.
    #[error("not authorized for this operation")]
    NotAuthorized,
    #[error("unexpected response status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// How `create_object` shapes the request body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadEncoding {
    /// The payload is the whole body, with `Content-Type` set to the mime type.
    #[default]
    Raw,
    /// A `multipart/form-data` body with the payload in a `file` part.
    Multipart,
}

#[derive(Debug, Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    encoding: UploadEncoding,
    requirements: BTreeMap<OperationKind, bool>,
}

impl StoreClient {
    /// Connect to the server at `base_url` and fetch its authentication
    /// requirements once.
    pub async fn connect(
        base_url: impl Into<String>,
        token: Option<String>,
        encoding: UploadEncoding,
    ) -> ClientResult<Self> {
        let mut client = Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            encoding,
            requirements: BTreeMap::new(),
        };

        let response = client
            .request(Method::GET, &["System", "AuthenticationRequirements"])
            .send()
            .await?
            .error_for_status()?;
        let raw: BTreeMap<String, bool> = response.json().await?;
        client.requirements = raw
            .into_iter()
            .filter_map(|(name, required)| match name.parse::<OperationKind>() {
                Ok(kind) => Some((kind, required)),
                Err(_) => {
                    tracing::debug!("ignoring unknown operation kind `{}` from server", name);
                    None
                }
            })
            .collect();

        Ok(client)
    }

    /// Authentication requirements as reported by the server.
    pub fn requirements(&self) -> &BTreeMap<OperationKind, bool> {
        &self.requirements
    }

    pub async fn list_buckets(&self) -> ClientResult<Vec<String>> {
        let response = self
            .send(OperationKind::BucketList, Method::GET, &["Bucket", "List"])
            .await?
            .ok_or(ClientError::UnexpectedStatus(StatusCode::NOT_FOUND))?;
        Ok(response.json().await?)
    }

    /// Ids in `bucket`, or `None` when the bucket does not exist.
    pub async fn list_objects(&self, bucket: &str) -> ClientResult<Option<Vec<String>>> {
        match self
            .send(OperationKind::ObjectList, Method::GET, &["Bucket", bucket, "List"])
            .await?
        {
            Some(response) => Ok(Some(response.json().await?)),
            None => Ok(None),
        }
    }

    pub async fn get_object_metadata(
        &self,
        bucket: &str,
        id: &str,
    ) -> ClientResult<Option<SizedMetadata>> {
        let Some(response) = self
            .send(OperationKind::ObjectRead, Method::HEAD, &["Bucket", bucket, id])
            .await?
        else {
            return Ok(None);
        };

        let headers = response.headers();
        // 204 responses may not carry Content-Length, so prefer the mirror header.
        let size = header_str(headers, HEADER_OBJECT_SIZE)
            .or_else(|| header_str(headers, header::CONTENT_LENGTH.as_str()))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(Some(SizedMetadata {
            metadata: metadata_from_headers(headers, bucket, id),
            size,
        }))
    }

    pub async fn get_object(&self, bucket: &str, id: &str) -> ClientResult<Option<StoredObject>> {
        let Some(response) = self
            .send(OperationKind::ObjectRead, Method::GET, &["Bucket", bucket, id])
            .await?
        else {
            return Ok(None);
        };

        let metadata = metadata_from_headers(response.headers(), bucket, id);
        let data = response.bytes().await?.to_vec();
        Ok(Some(StoredObject { metadata, data }))
    }

    /// Upload a new object and return its metadata, including the new id.
    pub async fn create_object(
        &self,
        bucket: &str,
        data: Vec<u8>,
        name: &str,
        mime_type: &str,
    ) -> ClientResult<ObjectMetadata> {
        self.precheck(OperationKind::ObjectCreate)?;

        let builder = self
            .request(Method::PUT, &["Bucket", bucket])
            .query(&[("nameOverride", name), ("mimeOverride", mime_type)]);
        let builder = match self.encoding {
            UploadEncoding::Raw => builder.header(header::CONTENT_TYPE, mime_type).body(data),
            UploadEncoding::Multipart => {
                let part = Part::bytes(data)
                    .file_name(name.to_string())
                    .mime_str(mime_type)?;
                builder.multipart(Form::new().part("file", part))
            }
        };

        let response = check_status(builder.send().await?)?
            .ok_or(ClientError::UnexpectedStatus(StatusCode::NOT_FOUND))?;
        let id: String = response.json().await?;
        if id.is_empty() {
            return Err(ClientError::InvalidResponse("server returned an empty id".into()));
        }

        Ok(ObjectMetadata {
            id,
            bucket: bucket.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
        })
    }

    /// Delete an object. Returns whether it existed.
    pub async fn delete_object(&self, bucket: &str, id: &str) -> ClientResult<bool> {
        Ok(self
            .send(OperationKind::ObjectDelete, Method::DELETE, &["Bucket", bucket, id])
            .await?
            .is_some())
    }

    /// Fail fast when the server requires a token we do not have.
    fn precheck(&self, kind: OperationKind) -> ClientResult<()> {
        let required = self.requirements.get(&kind).copied().unwrap_or(false);
        if required && self.token.is_none() {
            return Err(ClientError::NotAuthorized);
        }
        Ok(())
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.extend(utf8_percent_encode(segment, NON_ALPHANUMERIC));
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.http.request(method, self.url(segments));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        kind: OperationKind,
        method: Method,
        segments: &[&str],
    ) -> ClientResult<Option<Response>> {
        self.precheck(kind)?;
        let response = self.request(method, segments).send().await?;
        check_status(response)
    }
}

/// 403 is an authorization failure, 404 is absence, anything else that is
/// not a success is unexpected.
fn check_status(response: Response) -> ClientResult<Option<Response>> {
    match response.status() {
        StatusCode::FORBIDDEN => Err(ClientError::NotAuthorized),
        StatusCode::NOT_FOUND => Ok(None),
        status if status.is_success() => Ok(Some(response)),
        status => Err(ClientError::UnexpectedStatus(status)),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn metadata_from_headers(headers: &HeaderMap, bucket: &str, id: &str) -> ObjectMetadata {
    ObjectMetadata {
        id: header_str(headers, HEADER_OBJECT_ID).unwrap_or(id).to_string(),
        bucket: header_str(headers, HEADER_BUCKET_NAME)
            .unwrap_or(bucket)
            .to_string(),
        name: header_str(headers, HEADER_OBJECT_NAME).unwrap_or(id).to_string(),
        mime_type: header_str(headers, header::CONTENT_TYPE.as_str())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string(),
    }
}
