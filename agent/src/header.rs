//! Generation of the native datapath header from the local configuration.
//!
//! The datapath programs are compiled against a set of `#define` macros
//! describing this host, its tree neighbors and the training geometry. The
//! header is regenerated from scratch on every `update_local_config`.

use std::fmt::Write as _;
use std::net::Ipv4Addr;

use comms::specs::{LocalConfig, NodeDesc};

use crate::error::AgentError;

/// Renders the complete macro header for `cfg`.
///
/// A root record yields `PARENT_NUM 0` with zeroed parent macros; a leaf
/// record yields `CHILDREN_NUM 0` with empty child lists.
///
/// # Errors
/// Returns `InvalidConfig` when a MAC address in the record is malformed.
pub fn render(cfg: &LocalConfig) -> Result<String, AgentError> {
    let mut out = String::new();

    let _ = writeln!(out, "#define DUMMY_IP {}", ipv4_hex(&cfg.params.dummy_ip));
    let _ = writeln!(out, "#define PORT {}", cfg.params.port);
    let _ = writeln!(out, "#define HOST_ID {}", cfg.record.id);
    let _ = writeln!(out, "#define HOST_IP {}", ipv4_hex(&cfg.record.addr));
    let _ = writeln!(out, "#define HOST_MAC {{{}}}", mac_bytes(&cfg.record.mac)?);
    let _ = writeln!(out, "#define WORKER_NUM {}", cfg.params.worker_num);
    let _ = writeln!(out, "#define SCALE_FACTOR {}", cfg.params.scale_factor);
    let _ = writeln!(out, "#define GRADIENT_SIZE {}", cfg.params.gradient_size);
    let _ = writeln!(out, "#define FRAGMENT_SIZE {}", cfg.params.fragment_size);

    render_children(&mut out, &cfg.record.children)?;
    render_parent(&mut out, cfg.record.parent.as_ref())?;

    Ok(out)
}

fn render_children(out: &mut String, children: &[NodeDesc]) -> Result<(), AgentError> {
    let ids: Vec<String> = children.iter().map(|c| c.id.to_string()).collect();
    let ips: Vec<String> = children.iter().map(|c| ipv4_hex(&c.addr)).collect();
    let macs: Vec<String> = children
        .iter()
        .map(|c| mac_bytes(&c.mac).map(|bytes| format!("{{{bytes}}}")))
        .collect::<Result<_, _>>()?;

    let _ = writeln!(out, "#define CHILDREN_NUM {}", children.len());
    let _ = writeln!(out, "#define CHILDREN_ID {{{}}}", ids.join(", "));
    let _ = writeln!(out, "#define CHILDREN_IP {{{}}}", ips.join(", "));
    let _ = writeln!(out, "#define CHILDREN_MAC {{{}}}", macs.join(", "));
    Ok(())
}

fn render_parent(out: &mut String, parent: Option<&NodeDesc>) -> Result<(), AgentError> {
    let _ = writeln!(out, "#define PARENT_NUM {}", u32::from(parent.is_some()));

    match parent {
        Some(parent) => {
            let _ = writeln!(out, "#define PARENT_ID {}", parent.id);
            let _ = writeln!(out, "#define PARENT_IP {}", ipv4_hex(&parent.addr));
            let _ = writeln!(out, "#define PARENT_MAC {{{}}}", mac_bytes(&parent.mac)?);
        }
        None => {
            let _ = writeln!(out, "#define PARENT_ID 0");
            let _ = writeln!(out, "#define PARENT_IP 0x00000000");
            let _ = writeln!(out, "#define PARENT_MAC {{{}}}", ["0x00"; 6].join(", "));
        }
    }
    Ok(())
}

/// Formats an address the way the datapath compares it, a host-order hex
/// word.
fn ipv4_hex(ip: &Ipv4Addr) -> String {
    format!("0x{:08X}", u32::from_be_bytes(ip.octets()))
}

/// Converts `aa:bb:cc:dd:ee:ff` notation into a byte initializer list.
fn mac_bytes(mac: &str) -> Result<String, AgentError> {
    let bytes: Vec<String> = mac
        .split(':')
        .map(|seg| {
            u8::from_str_radix(seg, 16)
                .map(|byte| format!("0x{byte:02X}"))
                .map_err(|_| AgentError::InvalidConfig(format!("malformed mac `{mac}`")))
        })
        .collect::<Result<_, _>>()?;

    if bytes.len() != 6 {
        return Err(AgentError::InvalidConfig(format!("malformed mac `{mac}`")));
    }

    Ok(bytes.join(", "))
}
