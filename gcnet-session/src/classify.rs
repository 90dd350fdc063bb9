//! Response classifier
//!
//! A single pass over a complete response line decides what the device meant.
//! The Unified TCP API has no general correlation identifiers, so this
//! classification is the first step of matching responses back to requests.
//!
//! Recognition rules:
//!
//! | prefix | meaning | code extraction |
//! |---|---|---|
//! | `ERR_` | iTach device error | final three characters of the line |
//! | `ERR ` | Flex / Global Connect device error | the full trimmed line |
//! | `unknowncommand` | GC-100 device error | trailing token |
//! | `busyIR` / `busyir` | IR connector busy | optional `,module:port,id` tail |
//! | `stopir,` | stop acknowledgement | connector after the comma |
//! | anything else | ordinary response | — |

use gcnet_core::ResponseError;

/// Outcome of classifying one response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// An ordinary response, to be matched by expected prefix
    Ok,
    /// The device reported an error
    DeviceError(ResponseError),
    /// An IR connector is occupied by a transmission; the tail is omitted by
    /// some firmware revisions
    Busy {
        connector: Option<String>,
        id: Option<String>,
    },
    /// Acknowledgement of a `stopir` request
    StopAck { connector: String },
}

/// Classify a complete response line
///
/// Total over non-empty input: every line yields exactly one variant.
pub fn classify(line: &str) -> Classified {
    let line = line.trim();

    if line.starts_with("ERR_") {
        // iTach: ERR_<connector>,<code> — the code is the final three
        // characters of the ASCII line, and the prefix guarantees there are
        // at least three.
        let code = &line[line.len() - 3..];
        return Classified::DeviceError(ResponseError::from_code(code));
    }

    if line.starts_with("ERR ") {
        return Classified::DeviceError(ResponseError::from_code(line));
    }

    if let Some(rest) = line.strip_prefix("unknowncommand") {
        let code = rest
            .rsplit(|c| c == ' ' || c == ',')
            .find(|t| !t.is_empty())
            .unwrap_or(rest)
            .trim();
        return Classified::DeviceError(ResponseError::from_code(code));
    }

    if line.starts_with("busyIR") || line.starts_with("busyir") {
        let mut fields = line.split(',').skip(1);
        let connector = fields.next().map(str::to_string).filter(|c| !c.is_empty());
        let id = fields.next().map(str::to_string).filter(|i| !i.is_empty());
        return Classified::Busy { connector, id };
    }

    if let Some(rest) = line.strip_prefix("stopir,") {
        let connector = rest.split(',').next().unwrap_or(rest);
        return Classified::StopAck {
            connector: connector.to_string(),
        };
    }

    Classified::Ok
}
