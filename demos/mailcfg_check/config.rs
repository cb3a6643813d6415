//! Configuration structs and schema for the demo daemon.
//!
//! The schema accepts a file like:
//!
//! ```text
//! logging {
//!   facility mail;
//! };
//! server {
//!   port 110;
//!   timeout 600;
//!   tls yes;
//! };
//! acl {
//!   allow from 127.0.0.1/8;
//!   deny any;
//! };
//! ```

use std::net::Ipv4Addr;
use std::time::Duration;

use mailcfg::convert::Typed;
use mailcfg::schema::Context;
use mailcfg::{Cidr, CfgError, ConversionError, Param, ParamType, Section, Value};

#[derive(Debug)]
pub struct DemoConfig {
    pub logging: Logging,
    pub server: Server,
    pub acl: Vec<AclRule>,
}

#[derive(Debug)]
pub struct Logging {
    pub facility: String,
}

#[derive(Debug)]
pub struct Server {
    pub port: u16,
    pub timeout: Duration,
    pub tls: bool,
    pub listen: Vec<Ipv4Addr>,
}

#[derive(Debug, Clone, Copy)]
pub enum AclRule {
    Allow(Cidr),
    Deny(Cidr),
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig {
            logging: Logging {
                facility: "mail".into(),
            },
            server: Server {
                port: 110,
                timeout: Duration::from_secs(600),
                tls: false,
                listen: Vec::new(),
            },
            acl: Vec::new(),
        }
    }
}

impl DemoConfig {
    /// First matching rule wins; no match allows.
    pub fn allows(&self, ip: Ipv4Addr) -> bool {
        for rule in &self.acl {
            match rule {
                AclRule::Allow(c) if c.contains(ip) => return true,
                AclRule::Deny(c) if c.contains(ip) => return false,
                _ => {}
            }
        }
        true
    }
}

fn acl_address(value: &Value, ctx: &Context<'_>) -> Result<Cidr, ConversionError> {
    let words: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let words = match words.as_slice() {
        [first, rest @ ..] if first.as_str() == Some("from") => rest,
        all => all,
    };
    let [word] = words else {
        return Err(ConversionError::custom("junk after IP address"));
    };
    if word.as_str() == Some("any") {
        return Ok(Cidr::any());
    }
    match ctx.convert(word, ParamType::Cidr)? {
        Typed::Cidr(c) => Ok(c),
        _ => Err(ConversionError::custom("invalid address")),
    }
}

pub fn schema() -> Result<Section<DemoConfig>, CfgError> {
    let logging = Section::new("logging")
        .doc("Where diagnostics go.")
        .with_param(
            Param::new("facility", |l: &mut Logging, v: String| l.facility = v)
                .doc("Syslog facility.")
                .argname("name"),
        )?
        .map_target(|c: &mut DemoConfig| &mut c.logging);

    let server = Section::new("server")
        .doc("Listener settings.")
        .with_param(Param::new("port", |s: &mut Server, v: u16| s.port = v).doc("TCP port."))?
        .with_param(
            Param::new("timeout", |s: &mut Server, v: Duration| s.timeout = v)
                .doc("Idle timeout in seconds."),
        )?
        .with_param(Param::new("tls", |s: &mut Server, v: bool| s.tls = v))?
        .with_param(
            Param::list("listen", |s: &mut Server, v: Vec<Ipv4Addr>| s.listen = v)
                .doc("Addresses to bind."),
        )?
        .map_target(|c: &mut DemoConfig| &mut c.server);

    let acl = Section::new("acl")
        .doc("Access control, checked in order.")
        .with_param(
            Param::callback("allow", |c: &mut DemoConfig, v: &Value, ctx| {
                c.acl.push(AclRule::Allow(acl_address(v, ctx)?));
                Ok(())
            })
            .doc("Allow connections from this address. The word `from' may precede it.")
            .argname("addr: cidr"),
        )?
        .with_param(
            Param::callback("deny", |c: &mut DemoConfig, v: &Value, ctx| {
                c.acl.push(AclRule::Deny(acl_address(v, ctx)?));
                Ok(())
            })
            .doc("Deny connections from this address.")
            .argname("addr: cidr"),
        )?;

    Section::root()
        .with_section(logging)?
        .with_section(server)?
        .with_section(acl)
}
