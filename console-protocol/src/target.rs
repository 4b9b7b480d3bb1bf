use crate::error::ConsoleError;

/// What the page asked to open a console on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleTarget {
    Server { server_id: String },
    Application { application_id: String },
}

impl ConsoleTarget {
    /// Resolve from a raw query string (with or without the leading `?`).
    ///
    /// `server` wins over `application`; empty values count as absent.
    pub fn from_query(query: &str) -> Result<Self, ConsoleError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let first = |key: &str| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.into_owned())
        };

        if let Some(server_id) = first("server") {
            return Ok(ConsoleTarget::Server { server_id });
        }
        if let Some(application_id) = first("application") {
            return Ok(ConsoleTarget::Application { application_id });
        }
        Err(ConsoleError::MissingTarget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn server_query() {
        assert_eq!(
            ConsoleTarget::from_query("?server=srv-1").unwrap(),
            ConsoleTarget::Server {
                server_id: "srv-1".into()
            }
        );
    }

    #[test]
    fn server_takes_precedence() {
        for query in [
            "application=app-1&server=srv-1",
            "server=srv-1&application=app-1",
            "junk=1&server=srv-1&other",
        ] {
            assert_eq!(
                ConsoleTarget::from_query(query).unwrap(),
                ConsoleTarget::Server {
                    server_id: "srv-1".into()
                },
                "{query}"
            );
        }
    }

    #[test]
    fn application_query_is_decoded() {
        assert_eq!(
            ConsoleTarget::from_query("application=my%20app").unwrap(),
            ConsoleTarget::Application {
                application_id: "my app".into()
            }
        );
    }

    #[test]
    fn missing_target() {
        for query in ["", "?", "foo=bar", "server=", "servers=1&app=2"] {
            assert_eq!(
                ConsoleTarget::from_query(query),
                Err(ConsoleError::MissingTarget),
                "{query}"
            );
        }
    }
}
