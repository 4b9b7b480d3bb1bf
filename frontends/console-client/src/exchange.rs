use crate::broker::{id_string, BrokerClient};
use console_protocol::{ConsoleError, ConsoleTarget, SessionCredential, TargetInfo};
use serde_json::Value;

/// Everything the broker hands back for one console attach.
#[derive(Debug)]
pub struct Grant {
    pub credential: SessionCredential,
    pub target: Option<TargetInfo>,
}

/// Trade a target (and the picked server, for applications) for a credential.
pub async fn request_credential(
    broker: &BrokerClient,
    target: &ConsoleTarget,
    server_id: Option<&str>,
) -> Result<Grant, ConsoleError> {
    let url = broker.endpoint().token_url(target, server_id);
    let body = broker.post_json(url).await?;
    parse_grant(&body)
}

pub fn parse_grant(body: &Value) -> Result<Grant, ConsoleError> {
    let Value::Object(map) = body else {
        return Err(ConsoleError::MalformedResponse(
            "token response is not an object".into(),
        ));
    };

    let request_id = map.get("request_id").and_then(id_string);
    let token = map
        .get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty());
    let (Some(request_id), Some(token)) = (request_id, token) else {
        return Err(ConsoleError::IncompleteCredential);
    };

    // Only used for the title, so an unknown shape is not fatal
    let target = map
        .get("target")
        .and_then(|t| serde_json::from_value(t.clone()).ok());

    Ok(Grant {
        credential: SessionCredential {
            request_id,
            token: token.to_string(),
        },
        target,
    })
}
