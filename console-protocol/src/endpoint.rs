//! Broker URL layout.

use crate::error::ConsoleError;
use crate::target::ConsoleTarget;
use crate::types::{Geometry, SessionCredential};
use url::Url;

/// The page a console was opened from.
///
/// All broker calls go to the page's origin; the socket mirrors its scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEndpoint {
    page: Url,
}

impl ConsoleEndpoint {
    pub fn parse(page_url: &str) -> Result<Self, ConsoleError> {
        let page =
            Url::parse(page_url).map_err(|e| ConsoleError::InvalidUrl(e.to_string()))?;
        Self::new(page)
    }

    pub fn new(page: Url) -> Result<Self, ConsoleError> {
        match page.scheme() {
            "http" | "https" if page.has_host() => Ok(Self { page }),
            scheme => Err(ConsoleError::InvalidUrl(format!(
                "unsupported page {scheme}:// URL"
            ))),
        }
    }

    pub fn page(&self) -> &Url {
        &self.page
    }

    pub fn query(&self) -> &str {
        self.page.query().unwrap_or_default()
    }

    /// Replace the page query with a single key, as a hosting page would link it.
    pub fn with_target(mut self, key: &str, value: &str) -> Self {
        self.page.query_pairs_mut().clear().append_pair(key, value);
        self
    }

    pub fn is_secure(&self) -> bool {
        self.page.scheme() == "https"
    }

    /// Plain http is only tolerated for loopback and `.local` hosts.
    pub fn ensure_secure(&self) -> Result<(), ConsoleError> {
        if self.is_secure() || self.is_local_host() {
            Ok(())
        } else {
            Err(ConsoleError::InsecureConnection)
        }
    }

    fn is_local_host(&self) -> bool {
        match self.page.host_str() {
            Some(host) => {
                let host = host.trim_start_matches('[').trim_end_matches(']');
                matches!(host, "localhost" | "127.0.0.1" | "::1") || host.ends_with(".local")
            }
            None => false,
        }
    }

    pub fn servers_url(&self, application_id: &str) -> Url {
        self.at(&["console", "application", application_id, "servers"])
    }

    pub fn token_url(&self, target: &ConsoleTarget, server_id: Option<&str>) -> Url {
        match target {
            ConsoleTarget::Server { server_id } => {
                self.at(&["console", "token", "server", server_id])
            }
            ConsoleTarget::Application { application_id } => self.at(&[
                "console",
                "token",
                "application",
                application_id,
                server_id.unwrap_or_default(),
            ]),
        }
    }

    /// `ws(s)://{host}/console/ws/{request_id}/{token}/{rows}/{cols}`
    pub fn socket_url(
        &self,
        credential: &SessionCredential,
        geometry: Geometry,
    ) -> Result<Url, ConsoleError> {
        let rows = geometry.rows.to_string();
        let cols = geometry.cols.to_string();
        let mut url = self.at(&[
            "console",
            "ws",
            &credential.request_id,
            &credential.token,
            &rows,
            &cols,
        ]);
        let scheme = if self.is_secure() { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ConsoleError::InvalidUrl(format!("cannot switch to {scheme}")))?;
        Ok(url)
    }

    fn at(&self, segments: &[&str]) -> Url {
        let mut url = self.page.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear().extend(segments);
        }
        url
    }
}
