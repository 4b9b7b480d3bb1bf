use crate::broker::{id_string, BrokerClient};
use crate::status::StatusLine;
use console_protocol::{ConsoleError, ConsoleTarget, ServerCandidate};
use serde_json::Value;

/// A target plus, for applications, where it may be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub target: ConsoleTarget,
    /// Empty for server targets.
    pub candidates: Vec<ServerCandidate>,
}

/// Turn the page query into a target, looking up application servers.
///
/// `status` is only touched when a server list has to be fetched.
pub async fn resolve<S: StatusLine>(
    broker: &BrokerClient,
    query: &str,
    status: &mut S,
) -> Result<ResolvedTarget, ConsoleError> {
    let target = ConsoleTarget::from_query(query)?;

    let candidates = match &target {
        ConsoleTarget::Server { server_id } => {
            tracing::info!("Console target: server {server_id}");
            Vec::new()
        }
        ConsoleTarget::Application { application_id } => {
            tracing::info!("Console target: application {application_id}");
            status.show("Fetching available servers...");
            let url = broker.endpoint().servers_url(application_id);
            let body = broker.get_json(url).await?;
            let candidates = parse_candidates(&body)?;
            if candidates.is_empty() {
                return Err(ConsoleError::NoServersAvailable);
            }
            candidates
        }
    };

    Ok(ResolvedTarget { target, candidates })
}

/// `{"east-1": "srv-a", ...}` in document order.
///
/// Entries whose id is unusable are skipped.
pub fn parse_candidates(body: &Value) -> Result<Vec<ServerCandidate>, ConsoleError> {
    let Value::Object(map) = body else {
        return Err(ConsoleError::MalformedResponse(
            "server list is not an object".into(),
        ));
    };

    Ok(map
        .iter()
        .filter_map(|(name, id)| match id_string(id) {
            Some(id) => Some(ServerCandidate::new(name.as_str(), id)),
            None => {
                tracing::warn!("Ignoring server {name} with unusable id {id}");
                None
            }
        })
        .collect())
}
