use ethflow_common::text_truncate::log_snippet;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use url::Url;

use crate::serde::{SerdePathError, SerdeResponseParseAsync};

const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug)]
pub enum ReqwestStage {
    Send,
    DecodeText,
    Deserialise,
}

#[derive(Debug)]
pub struct ReqwestErrorContext {
    pub url: Url,
}

#[derive(Debug)]
pub enum ReqwestInnerError {
    Reqwest(reqwest::Error),
    SerdePath(SerdePathError),
}

impl ReqwestInnerError {
    pub fn is_connect(&self) -> bool {
        match self {
            Self::Reqwest(err) => err.is_connect(),
            Self::SerdePath(_) => false,
        }
    }
}

/// A GET request against an upstream HTTP API.
///
/// Failures are sorted into the error taxonomy the fetch client retries on:
/// unreachable hosts become `TransientNetwork`, non-2xx responses become
/// `Upstream` carrying the status and a truncated body.
pub struct Reqwest {
    builder: RequestBuilder,
    error_context: Box<ReqwestErrorContext>,
}

impl Reqwest {
    /// Requests share `client` so connections to the same upstream are pooled.
    pub fn get(client: &Client, url: &str) -> crate::Result<Self> {
        let url: Url = url
            .parse()
            .map_err(|e| crate::Error::UrlParsingFailed(url.to_string(), e))?;
        Ok(Self {
            builder: client.get(url.clone()),
            error_context: Box::new(ReqwestErrorContext { url }),
        })
    }

    pub fn query<T: serde::Serialize + Debug>(mut self, query: &T) -> Self {
        self.builder = self.builder.query(query);
        self
    }

    async fn receive_text_internal(self) -> crate::Result<(String, Box<ReqwestErrorContext>)> {
        let Self {
            builder,
            error_context,
        } = self;

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) if err.is_connect() || err.is_timeout() => {
                return Err(crate::Error::internet(&error_context.url, &err));
            }
            Err(err) => {
                return Err(crate::Error::ReqwestFailed {
                    stage: ReqwestStage::Send,
                    context: error_context,
                    inner: ReqwestInnerError::Reqwest(err),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(crate::Error::Upstream {
                status: status.as_u16(),
                message: log_snippet(&body, ERROR_BODY_LIMIT),
            });
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                return Err(crate::Error::ReqwestFailed {
                    stage: ReqwestStage::DecodeText,
                    context: error_context,
                    inner: ReqwestInnerError::Reqwest(err),
                });
            }
        };

        Ok((text, error_context))
    }

    pub async fn receive_json<J: Debug + DeserializeOwned>(self) -> crate::Result<J> {
        let (text, error_context) = self.receive_text_internal().await?;

        text.as_str()
            .serde_parse_custom()
            .await
            .map_err(|err| crate::Error::ReqwestFailed {
                stage: ReqwestStage::Deserialise,
                context: error_context,
                inner: ReqwestInnerError::SerdePath(err),
            })
    }
}
