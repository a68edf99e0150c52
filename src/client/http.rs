use super::{ClientError, ClientErrorKind, JobClient};
use crate::model::{JobHandle, JobStatus, ResultPage};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::str::FromStr;
use url::Url;


/// [`JobClient`] speaking the DataHub (Dremio v3) REST API.
#[derive(Clone, Debug)]
pub struct HttpJobClient {
    base: Url,
    http: reqwest::Client,
}

impl HttpJobClient {
    /// `base` is the API root, e.g. `https://tenant/service/datahub/dremio/api/v3`.
    /// `headers` are sent with every request.
    pub fn new(base: &str, headers: &HashMap<String, String>) -> Result<Self, ClientError> {
        let mut base = Url::parse(base)?;
        // Relative joins replace the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in headers {
            let name = HeaderName::from_str(key)
                .map_err(|_| ClientError { kind: ClientErrorKind::Header(key.clone()) })?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError { kind: ClientErrorKind::Header(key.clone()) })?;
            default_headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()?;

        Ok(Self { base, http })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::remote(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ClientError> {
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl JobClient for HttpJobClient {
    async fn submit_query(&self, sql: &str) -> Result<JobHandle, ClientError> {
        let url = self.endpoint("sql")?;
        let body = serde_json::json!({ "sql": sql });
        self.send_json(self.http.post(url).json(&body)).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, ClientError> {
        let url = self.endpoint(&format!("job/{job_id}"))?;
        self.send_json(self.http.get(url)).await
    }

    async fn cancel_job(&self, job_id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("job/{job_id}/cancel"))?;
        self.send(self.http.post(url)).await?;
        Ok(())
    }

    async fn fetch_results(
        &self,
        job_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<ResultPage, ClientError> {
        let mut url = self.endpoint(&format!("job/{job_id}/results"))?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string());
        self.send_json(self.http.get(url)).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_joined_below_the_base_path() {
        let client = HttpJobClient::new(
            "https://tenant.example.com/service/datahub/dremio/api/v3",
            &HashMap::new(),
        ).unwrap();

        assert_eq!(
            client.endpoint("job/abc/cancel").unwrap().as_str(),
            "https://tenant.example.com/service/datahub/dremio/api/v3/job/abc/cancel"
        );
        assert_eq!(
            client.endpoint("sql").unwrap().as_str(),
            "https://tenant.example.com/service/datahub/dremio/api/v3/sql"
        );
    }

    #[test]
    fn invalid_headers_are_rejected() {
        let headers = HashMap::from([("bad header".to_string(), "x".to_string())]);

        let error = HttpJobClient::new("https://tenant.example.com/api/", &headers).unwrap_err();

        assert!(matches!(error.kind, ClientErrorKind::Header(ref name) if name == "bad header"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let error = HttpJobClient::new("tenant without scheme", &HashMap::new()).unwrap_err();
        assert!(matches!(error.kind, ClientErrorKind::Url(_)));
    }
}
