use console_protocol::{ConsoleEndpoint, ConsoleError};
use reqwest::{header, Client, RequestBuilder, Response};
use serde_json::Value;
use url::Url;

/// HTTP side of the console broker.
#[derive(Clone)]
pub struct BrokerClient {
    http: Client,
    endpoint: ConsoleEndpoint,
}

impl BrokerClient {
    pub fn new(endpoint: ConsoleEndpoint) -> Result<Self, ConsoleError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ConsoleError::Request(e.to_string()))?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &ConsoleEndpoint {
        &self.endpoint
    }

    pub async fn get_json(&self, url: Url) -> Result<Value, ConsoleError> {
        tracing::debug!("GET {url}");
        let resp = self.send(self.http.get(url)).await?;
        decode(resp).await
    }

    pub async fn post_json(&self, url: Url) -> Result<Value, ConsoleError> {
        tracing::debug!("POST {url}");
        let resp = self.send(self.http.post(url)).await?;
        decode(resp).await
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ConsoleError> {
        let resp = req
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| ConsoleError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let reason = status
                .canonical_reason()
                .map_or_else(|| status.as_str().to_string(), str::to_string);
            tracing::warn!("{} answered {status}", resp.url());
            return Err(ConsoleError::Http {
                code: status.as_u16(),
                reason,
            });
        }
        Ok(resp)
    }
}

async fn decode(resp: Response) -> Result<Value, ConsoleError> {
    resp.json::<Value>()
        .await
        .map_err(|e| ConsoleError::MalformedResponse(e.to_string()))
}

/// Ids come back as strings or bare numbers depending on the backend.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_from_strings_and_numbers() {
        assert_eq!(id_string(&json!("srv-a")).as_deref(), Some("srv-a"));
        assert_eq!(id_string(&json!(42)).as_deref(), Some("42"));
        assert_eq!(id_string(&json!("")), None);
        assert_eq!(id_string(&json!(null)), None);
        assert_eq!(id_string(&json!({"id": 1})), None);
    }
}
