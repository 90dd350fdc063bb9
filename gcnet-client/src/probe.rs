//! One-shot device-info probe
//!
//! A short sequential dialogue on the control port, deliberately outside the
//! core queue: `getversion`, `getdevices`, then one `get_IR` per IR-capable
//! connector. Useful right after discovery to learn what a device is before
//! a long-lived client is set up.

use gcnet_core::model::{family_for_version, parse_device_line, DeviceModule, ProductFamily};
use gcnet_core::{ConnectionError, GcResult};
use gcnet_session::Framer;
use gcnet_transport::{StreamAccessor, TcpSettings, TcpTransport, TransportLayer};
use std::time::Duration;

/// Reported IR mode of one connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrPort {
    pub connector: String,
    /// Mode string as reported, e.g. `IR`, `SENSOR`, `IR_BLASTER`
    pub mode: String,
}

/// Everything the probe learned about a device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub version: String,
    pub family: ProductFamily,
    pub modules: Vec<DeviceModule>,
    pub ir_ports: Vec<IrPort>,
}

/// Probe a device at `host:port`
///
/// `timeout` bounds each read and write of the dialogue.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> GcResult<DeviceInfo> {
    let mut transport = TcpTransport::new(TcpSettings::with_timeout(host, port, timeout));
    transport.open().await?;
    let mut framer = Framer::new();

    transport.write_all(b"getversion\r").await?;
    let version = next_response(&mut transport, &mut framer).await?;

    transport.write_all(b"getdevices\r").await?;
    let listing = next_response(&mut transport, &mut framer).await?;
    let modules: Vec<DeviceModule> = listing.lines().filter_map(parse_device_line).collect();

    let mut ir_ports = Vec::new();
    for module in modules.iter().filter(|m| m.kind.is_ir()) {
        for port_number in 1..=module.ports {
            let connector = format!("{}:{}", module.address, port_number);
            transport
                .write_all(format!("get_IR,{}\r", connector).as_bytes())
                .await?;
            let line = next_response(&mut transport, &mut framer).await?;
            let mode = line.rsplit(',').next().unwrap_or("").to_string();
            ir_ports.push(IrPort { connector, mode });
        }
    }

    let _ = transport.close().await;

    Ok(DeviceInfo {
        family: family_for_version(&version),
        version,
        modules,
        ir_ports,
    })
}

async fn next_response<S: StreamAccessor>(stream: &mut S, framer: &mut Framer) -> GcResult<String> {
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            let (address, port) = stream.peer();
            return Err(ConnectionError::lost(address.to_string(), port, None).into());
        }
        if let Some(frame) = framer.push(&buf[..n]).into_iter().next() {
            return Ok(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcnet_core::model::ModuleKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn read_request(sock: &mut tokio::net::TcpStream) -> Option<String> {
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if sock.read_exact(&mut byte).await.is_err() {
                return None;
            }
            if byte[0] == b'\r' {
                break;
            }
            request.push(byte[0]);
        }
        Some(String::from_utf8(request).unwrap())
    }

    #[tokio::test]
    async fn test_probe_dialogue() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            while let Some(request) = read_request(&mut sock).await {
                let response: &[u8] = match request.as_str() {
                    "getversion" => b"710-1005-05\r",
                    "getdevices" => {
                        b"device,1,1 SERIAL\rdevice,4,2 IR\rendlistdevices\r"
                    }
                    "get_IR,4:1" => b"IR,4:1,IR\r",
                    "get_IR,4:2" => b"IR,4:2,SENSOR\r",
                    other => panic!("unexpected request: {}", other),
                };
                sock.write_all(response).await.unwrap();
            }
        });

        let info = probe("127.0.0.1", addr.port(), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(info.version, "710-1005-05");
        assert_eq!(info.family, ProductFamily::Itach);
        assert_eq!(info.modules.len(), 2);
        assert_eq!(info.modules[1].kind, ModuleKind::Ir);
        assert_eq!(
            info.ir_ports,
            vec![
                IrPort {
                    connector: "4:1".into(),
                    mode: "IR".into()
                },
                IrPort {
                    connector: "4:2".into(),
                    mode: "SENSOR".into()
                },
            ]
        );
    }
}
