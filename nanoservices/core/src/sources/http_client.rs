use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use sekolah_utils::error::Error;
use sekolah_utils::{RawRecords, SekolahResult};
use url::Url;

use super::decode::decode_records;
use super::Source;

#[derive(Debug)]
pub struct HttpSourceBuilder {
    method: Method,
    url: String,
    token: Option<String>,
    params: Option<HashMap<String, String>>,
    timeout: Duration,
}

impl HttpSourceBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            token: None,
            params: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn token<T: Into<String>>(mut self, token: Option<T>) -> Self {
        self.token = token.map(|t| t.into());
        self
    }

    pub fn params(mut self, params: HashMap<String, String>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> SekolahResult<HttpSource> {
        let url = Url::parse(&self.url)?;
        let client = ReqwestClient::builder().timeout(self.timeout).build()?;
        Ok(HttpSource {
            client,
            method: self.method,
            url,
            token: self.token,
            params: self.params.unwrap_or_default(),
        })
    }
}

/// Fetches the record collection from an HTTP endpoint returning the same
/// document shape as the file source.
pub struct HttpSource {
    client: ReqwestClient,
    method: Method,
    url: Url,
    token: Option<String>,
    params: HashMap<String, String>,
}

impl HttpSource {
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn fetch_body(&self) -> SekolahResult<Vec<u8>> {
        let mut request = self.client.request(self.method.clone(), self.url.clone());
        if !self.params.is_empty() {
            request = request.query(&self.params);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                Error::NotFound(format!("{} unreachable: {e}", self.url))
            } else {
                Error::HttpError(e)
            }
        })?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(self.url.to_string()));
        }
        let resp = resp.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Source for HttpSource {
    fn name(&self) -> &str { "http" }

    async fn extract(&self) -> SekolahResult<RawRecords> {
        let body = self.fetch_body().await?;
        let records = decode_records(&body)?;
        tracing::debug!(url = %self.url, records = records.len(), "fetched records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer a single request with `status` and `body`; the handle yields the
    /// raw request head.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            // The client may hang up as soon as it has seen the status line.
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
            String::from_utf8_lossy(&head).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn builder_rejects_invalid_url() {
        let result = HttpSourceBuilder::new("not a url").build();
        assert!(matches!(result, Err(Error::UrlParseError(_))));
    }

    #[test]
    fn builder_keeps_settings() {
        let mut params = HashMap::new();
        params.insert("perPage".to_string(), "100".to_string());
        let source = HttpSourceBuilder::new("http://localhost:8080/sekolah")
            .token(Some("secret"))
            .params(params)
            .build()
            .unwrap();
        assert_eq!(source.url().path(), "/sekolah");
        assert_eq!(source.params["perPage"], "100");
        assert_eq!(source.token.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn extract_decodes_served_records_in_order() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"dataSekolah": [
                {"npsn": "1", "sekolah": "SMA 1", "status": "N"},
                {"npsn": "2", "sekolah": "SMA 2", "status": "S"},
                {"npsn": "3", "sekolah": "SMA 3", "status": "N"}
            ]}"#,
        )
        .await;

        let mut params = HashMap::new();
        params.insert("perPage".to_string(), "100".to_string());
        let source = HttpSourceBuilder::new(format!("{base}/sekolah"))
            .token(Some("secret"))
            .params(params)
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        let records = source.extract().await.unwrap();
        let npsn: Vec<&str> = records
            .records()
            .iter()
            .map(|r| r["npsn"].as_str().unwrap())
            .collect();
        assert_eq!(npsn, vec!["1", "2", "3"]);

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /sekolah?perPage=100 "), "unexpected request: {head}");
        assert!(head.to_ascii_lowercase().contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn missing_route_is_not_found() {
        let (base, server) = serve_once("404 Not Found", "{}").await;

        let source = HttpSourceBuilder::new(format!("{base}/nope"))
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let err = source.extract().await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "unexpected error: {err}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn non_collection_body_is_malformed() {
        let (base, server) = serve_once("200 OK", r#"{"data": []}"#).await;

        let source = HttpSourceBuilder::new(format!("{base}/sekolah")).build().unwrap();
        let err = source.extract().await.unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)), "unexpected error: {err}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_host_is_not_found() {
        // Bind then drop a listener so the port is known to be closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpSourceBuilder::new(format!("http://{addr}/sekolah"))
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let err = source.extract().await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "unexpected error: {err}");
    }
}
