//! Product family and module classification tables
//!
//! Pure lookup helpers: nothing here touches the network. The tables map the
//! strings a device hands back (`getversion` part numbers, `getdevices`
//! module lines) onto the product families of the GC line.

/// Product family of a GC device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductFamily {
    /// Original GC-100 network adapters
    Gc100,
    /// iTach (IP2IR, WF2IR, IP2SL, ...)
    Itach,
    /// Flex units with interchangeable link cables
    Flex,
    /// Global Connect modular units
    GlobalConnect,
    Unknown,
}

impl ProductFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductFamily::Gc100 => "GC-100",
            ProductFamily::Itach => "iTach",
            ProductFamily::Flex => "Flex",
            ProductFamily::GlobalConnect => "Global Connect",
            ProductFamily::Unknown => "unknown",
        }
    }
}

/// Classify a device from its `getversion` reply
///
/// iTach, Flex and Global Connect firmware report a part number
/// (`710-1005-05`, `710-2000-15`, `710-3000-11`); the GC-100 reports a bare
/// dotted version such as `3.0-12`.
pub fn family_for_version(version: &str) -> ProductFamily {
    let version = version.trim();
    if version.starts_with("710-1") {
        ProductFamily::Itach
    } else if version.starts_with("710-2") {
        ProductFamily::Flex
    } else if version.starts_with("710-3") {
        ProductFamily::GlobalConnect
    } else if version
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
        && version.contains('.')
    {
        ProductFamily::Gc100
    } else {
        ProductFamily::Unknown
    }
}

/// Classify a device from a model string, e.g. out of a discovery beacon
pub fn family_for_model(model: &str) -> ProductFamily {
    if model.contains("iTach") {
        ProductFamily::Itach
    } else if model.contains("Flex") || model.contains("GCF") {
        ProductFamily::Flex
    } else if model.contains("GlobalConnect") || model.contains("Global Connect") {
        ProductFamily::GlobalConnect
    } else if model.contains("GC-100") {
        ProductFamily::Gc100
    } else {
        ProductFamily::Unknown
    }
}

/// Whether a line is plausibly a firmware version string
///
/// Version strings are digits joined by dashes or dots (`710-1005-05`,
/// `3.0-12`). Used to match an unsolicited-looking version line back to a
/// pending `getversion` request, since some firmware answers with the bare
/// string rather than a `version,` prefixed line.
pub fn looks_like_version(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    let mut saw_separator = false;
    for c in line.chars() {
        match c {
            '0'..='9' => {}
            '-' | '.' => saw_separator = true,
            _ => return false,
        }
    }
    saw_separator
        && line.starts_with(|c: char| c.is_ascii_digit())
        && line.ends_with(|c: char| c.is_ascii_digit())
}

/// Kind of I/O module reported by `getdevices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    Ir,
    IrBlaster,
    SensorIn,
    Serial,
    Relay,
    Net,
    Other(String),
}

impl ModuleKind {
    fn from_token(token: &str) -> Self {
        match token {
            "IR" => ModuleKind::Ir,
            "IR_BLASTER" | "IRBLASTER" => ModuleKind::IrBlaster,
            "SENSOR" | "SENSORIN" | "SENSOR_IN" => ModuleKind::SensorIn,
            "SERIAL" => ModuleKind::Serial,
            "RELAY" => ModuleKind::Relay,
            "NET" | "ETHERNET" | "WIFI" => ModuleKind::Net,
            other => ModuleKind::Other(other.to_string()),
        }
    }

    /// Whether connectors of this module accept `sendir`
    pub fn is_ir(&self) -> bool {
        matches!(self, ModuleKind::Ir | ModuleKind::IrBlaster)
    }
}

/// One module line out of a `getdevices` inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceModule {
    pub address: u8,
    pub ports: u8,
    pub kind: ModuleKind,
}

/// Parse a single `device,<module>,<count> <TYPE>` inventory line
pub fn parse_device_line(line: &str) -> Option<DeviceModule> {
    let rest = line.trim().strip_prefix("device,")?;
    let (address, tail) = rest.split_once(',')?;
    let (ports, kind) = tail.trim().split_once(' ')?;
    Some(DeviceModule {
        address: address.trim().parse().ok()?,
        ports: ports.trim().parse().ok()?,
        kind: ModuleKind::from_token(kind.trim()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_for_version() {
        assert_eq!(family_for_version("710-1005-05"), ProductFamily::Itach);
        assert_eq!(family_for_version("710-2000-15"), ProductFamily::Flex);
        assert_eq!(family_for_version("710-3000-11"), ProductFamily::GlobalConnect);
        assert_eq!(family_for_version("3.0-12"), ProductFamily::Gc100);
        assert_eq!(family_for_version("hello"), ProductFamily::Unknown);
    }

    #[test]
    fn test_family_for_model() {
        assert_eq!(family_for_model("iTachIP2IR"), ProductFamily::Itach);
        assert_eq!(family_for_model("GC-100-12"), ProductFamily::Gc100);
    }

    #[test]
    fn test_looks_like_version() {
        assert!(looks_like_version("710-1005-05"));
        assert!(looks_like_version("3.0-12"));
        assert!(!looks_like_version("completeir,1:1,1"));
        assert!(!looks_like_version("device"));
        assert!(!looks_like_version(""));
        assert!(!looks_like_version("1005"));
    }

    #[test]
    fn test_parse_device_line() {
        let m = parse_device_line("device,4,3 IR").unwrap();
        assert_eq!(m.address, 4);
        assert_eq!(m.ports, 3);
        assert_eq!(m.kind, ModuleKind::Ir);
        assert!(m.kind.is_ir());

        let m = parse_device_line("device,1,1 SERIAL").unwrap();
        assert_eq!(m.kind, ModuleKind::Serial);
        assert!(!m.kind.is_ir());

        assert!(parse_device_line("endlistdevices").is_none());
    }
}
