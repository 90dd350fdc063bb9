//! Static dictionary of device-reported error codes
//!
//! Three generations of firmware report errors differently:
//!
//! - iTach units emit `ERR_<connector>,<code>` with a three-digit code.
//! - Flex and Global Connect units emit `ERR <code>` where the code names a
//!   subsystem (`IR001`, `SL001`, ...).
//! - GC-100 units emit `unknowncommand <code>` with a small numeric code.
//!
//! Unknown codes are not an error at this layer; callers surface them verbatim.

/// Resolve a device error code to its human-readable message
///
/// Accepts the code in the exact shape the classifier extracts it: the bare
/// three-digit iTach code, the full `ERR <code>` Flex line, or the trailing
/// GC-100 token. Returns `None` for codes this table does not know.
pub fn message_for(code: &str) -> Option<&'static str> {
    // Flex codes arrive as the full trimmed line.
    let code = code.strip_prefix("ERR ").unwrap_or(code);

    match code {
        // iTach three-digit codes
        "001" => Some("Invalid command. Command not found."),
        "002" => Some("Invalid module address (does not exist)."),
        "003" => Some("Invalid connector address (does not exist)."),
        "004" => Some("Invalid ID value."),
        "005" => Some("Invalid frequency value."),
        "006" => Some("Invalid repeat value."),
        "007" => Some("Invalid offset value."),
        "008" => Some("Invalid pulse count."),
        "009" => Some("Invalid pulse data."),
        "010" => Some("Uneven amount of <on|off> statements."),
        "011" => Some("No carriage return found."),
        "012" => Some("Repeat count exceeded."),
        "013" => Some("IR command sent to non-IR module."),
        "014" => Some("Blaster command sent to non-blaster connector."),
        "015" => Some("No carriage return before buffer full."),
        "016" => Some("No carriage return."),
        "017" => Some("Bad command syntax."),
        "018" => Some("Sensor command sent to non-input connector."),
        "019" => Some("Repeated IR transmission failure."),
        "020" => Some("Above designated IR <on|off> pair limit."),
        "021" => Some("Symbol odd boundary."),
        "022" => Some("Undefined symbol."),
        "023" => Some("Unknown option."),
        "024" => Some("Invalid baud rate setting."),
        "025" => Some("Invalid flow control setting."),
        "026" => Some("Invalid parity setting."),
        "027" => Some("Settings are locked."),

        // Flex / Global Connect subsystem codes
        "IR001" => Some("Invalid IR command format."),
        "IR002" => Some("Invalid module address."),
        "IR003" => Some("Invalid connector address."),
        "IR004" => Some("Invalid ID value."),
        "IR005" => Some("Invalid frequency value."),
        "SL001" => Some("Invalid baud rate."),
        "SL002" => Some("Invalid flow control setting."),
        "SL003" => Some("Invalid parity setting."),
        "RO001" => Some("Invalid relay state."),

        // GC-100 unknowncommand codes
        "1" => Some("Time out occurred because carriage return was not received."),
        "2" => Some("Invalid module address (module does not exist)."),
        "3" => Some("Invalid connector address (connector does not exist)."),
        "4" => Some("Connector address 1 is set up as \"sensor in\" when attempting an IR command."),
        "5" => Some("Connector address 2 is set up as \"sensor in\" when attempting an IR command."),
        "6" => Some("Connector address 3 is set up as \"sensor in\" when attempting an IR command."),
        "7" => Some("Unknown command."),
        "8" => Some("Unknown sensor in ID."),
        "9" => Some("Unknown module address."),
        "10" => Some("Invalid ID value."),
        "11" => Some("Invalid frequency value."),
        "12" => Some("Invalid repeat value."),
        "13" => Some("Invalid offset value."),
        "14" => Some("Invalid pulse count."),
        "15" => Some("Invalid pulse data."),
        "16" => Some("Odd amount of <on|off> data."),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_itach_codes() {
        assert_eq!(
            message_for("014"),
            Some("Blaster command sent to non-blaster connector.")
        );
        assert_eq!(message_for("001"), Some("Invalid command. Command not found."));
    }

    #[test]
    fn test_flex_codes_with_and_without_prefix() {
        assert_eq!(message_for("ERR SL001"), Some("Invalid baud rate."));
        assert_eq!(message_for("SL001"), Some("Invalid baud rate."));
    }

    #[test]
    fn test_gc100_codes() {
        assert_eq!(message_for("7"), Some("Unknown command."));
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(message_for("XYZ"), None);
    }
}
