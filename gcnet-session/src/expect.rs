//! Expected-response prefixes for outbound requests
//!
//! The Unified TCP API rarely echoes anything that identifies which request a
//! response belongs to. The one fixed point is that each command family
//! answers with a known prefix; `sendir` is the only command whose response
//! (`completeir`) carries the request's own ID.

/// Compute the response prefix a request should be matched against
///
/// Returns `None` for commands this table does not know; such a request is
/// still sendable but can only be resolved by the version-string fallback in
/// the queue.
pub fn expected_prefix(request: &str) -> Option<String> {
    let request = request.trim_end_matches('\r');
    let mut fields = request.split(',');
    let command = fields.next()?;
    let connector = fields.next().filter(|f| is_connector(f));

    match command {
        "getversion" => Some("version".to_string()),
        "getdevices" => Some("device".to_string()),
        "getstate" | "setstate" => Some(with_connector("state", connector)),
        "get_IRL" => Some("IR Learner Enabled".to_string()),
        "stop_IRL" => Some("IR Learner Disabled".to_string()),
        "sendir" => {
            // completeir echoes both the connector and the request ID.
            let connector = connector?;
            let id = fields.next()?;
            Some(format!("completeir,{},{}", connector, id))
        }
        "stopir" => Some(with_connector("stopir", connector)),
        _ => {
            let family = command.strip_prefix("get_").or_else(|| command.strip_prefix("set_"))?;
            match family {
                "NET" | "IR" | "SERIAL" | "RELAY" => Some(with_connector(family, connector)),
                _ => None,
            }
        }
    }
}

fn with_connector(prefix: &str, connector: Option<&str>) -> String {
    match connector {
        Some(c) => format!("{},{}", prefix, c),
        None => prefix.to_string(),
    }
}

/// A connector is a `module:port` pair of decimal numbers
pub(crate) fn is_connector(field: &str) -> bool {
    match field.split_once(':') {
        Some((module, port)) => {
            !module.is_empty()
                && !port.is_empty()
                && module.chars().all(|c| c.is_ascii_digit())
                && port.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_commands() {
        assert_eq!(expected_prefix("getversion\r").as_deref(), Some("version"));
        assert_eq!(expected_prefix("getdevices\r").as_deref(), Some("device"));
    }

    #[test]
    fn test_family_commands_with_connector() {
        assert_eq!(expected_prefix("get_NET,0:1\r").as_deref(), Some("NET,0:1"));
        assert_eq!(expected_prefix("set_IR,1:2,SENSOR\r").as_deref(), Some("IR,1:2"));
        assert_eq!(
            expected_prefix("get_SERIAL,1:1\r").as_deref(),
            Some("SERIAL,1:1")
        );
        assert_eq!(
            expected_prefix("set_RELAY,3:2,1\r").as_deref(),
            Some("RELAY,3:2")
        );
    }

    #[test]
    fn test_family_commands_without_connector() {
        assert_eq!(expected_prefix("get_NET\r").as_deref(), Some("NET"));
    }

    #[test]
    fn test_state_commands() {
        assert_eq!(expected_prefix("getstate,1:1\r").as_deref(), Some("state,1:1"));
        assert_eq!(expected_prefix("setstate,1:2,1\r").as_deref(), Some("state,1:2"));
        assert_eq!(expected_prefix("getstate\r").as_deref(), Some("state"));
    }

    #[test]
    fn test_sendir_carries_id() {
        assert_eq!(
            expected_prefix("sendir,1:1,7,38000,1,1,342,171\r").as_deref(),
            Some("completeir,1:1,7")
        );
        // A sendir without an ID cannot be correlated by prefix.
        assert_eq!(expected_prefix("sendir,1:1\r"), None);
    }

    #[test]
    fn test_stopir() {
        assert_eq!(expected_prefix("stopir,1:1\r").as_deref(), Some("stopir,1:1"));
    }

    #[test]
    fn test_ir_learner() {
        assert_eq!(
            expected_prefix("get_IRL\r").as_deref(),
            Some("IR Learner Enabled")
        );
        assert_eq!(
            expected_prefix("stop_IRL\r").as_deref(),
            Some("IR Learner Disabled")
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(expected_prefix("blink,1\r"), None);
        assert_eq!(expected_prefix("get_FOO,1:1\r"), None);
    }
}
