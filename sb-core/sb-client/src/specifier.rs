use core::fmt;

use sb_model::RelayError;

/// Where commands run: on this machine or through a relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSpecifier {
    Local,
    Remote { url: String },
}

impl HostSpecifier {
    /// Parse `local` or a relay address
    ///
    /// `http://` and `https://` are rewritten to `ws://` and `wss://`; a bare
    /// `host:port` gets `ws://`.
    pub fn parse(spec: &str) -> Result<Self, RelayError> {
        let spec = spec.trim();
        if spec.is_empty() || spec.eq_ignore_ascii_case("local") {
            return Ok(HostSpecifier::Local);
        }

        let url = if let Some(rest) = spec.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if let Some(rest) = spec.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if spec.starts_with("ws://") || spec.starts_with("wss://") {
            spec.to_string()
        } else if spec.contains("://") {
            return Err(RelayError::invalid_argument(format!(
                "Unsupported relay address '{spec}'. Use ws://host:port or http://host:port"
            )));
        } else {
            format!("ws://{spec}")
        };
        Ok(HostSpecifier::Remote { url })
    }

    /// `None` means local
    pub fn parse_optional(spec: Option<&str>) -> Result<Self, RelayError> {
        spec.map_or(Ok(HostSpecifier::Local), Self::parse)
    }
}

impl fmt::Display for HostSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostSpecifier::Local => f.write_str("local"),
            HostSpecifier::Remote { url } => f.write_str(url),
        }
    }
}
