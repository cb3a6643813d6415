//! Conversion of scalar labels into typed values.
//!
//! Integers accept three bases: a leading `0x`/`0X` selects hex, any other
//! leading `0` selects octal, and `0` by itself is zero. Digits accumulate in a
//! `u64` with checked arithmetic. A value that would wrap is an overflow, and
//! a value past the width of the target type is out of range, so nothing is
//! ever silently truncated.
//!
//! CIDR blocks are written `addr/len`, `addr/netmask`, or as a bare address
//! whose trailing zero octets set the mask: `192.168.1.0` is a /24 and
//! `10.0.0.1` is a /32.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConversionError;
use crate::value::Value;

/// Built-in parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    String,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Size,
    /// Whole seconds.
    Time,
    Bool,
    Ipv4,
    Cidr,
    /// Host name or dotted-quad literal.
    Host,
}

impl ParamType {
    pub fn name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Short => "short",
            ParamType::UShort => "ushort",
            ParamType::Int => "int",
            ParamType::UInt => "uint",
            ParamType::Long => "long",
            ParamType::ULong => "ulong",
            ParamType::Size => "size",
            ParamType::Time => "time",
            ParamType::Bool => "bool",
            ParamType::Ipv4 => "ipv4",
            ParamType::Cidr => "cidr",
            ParamType::Host => "host",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A converted value, one variant per [`ParamType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Typed {
    String(String),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Size(usize),
    Time(Duration),
    Bool(bool),
    Ipv4(Ipv4Addr),
    Cidr(Cidr),
    Host(HostAddr),
}

/// A resolved host address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HostAddr(pub Ipv4Addr);

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Rust types a parameter can bind to. Each maps to exactly one
/// [`ParamType`].
pub trait FromTyped: Sized {
    const TYPE: ParamType;

    fn from_typed(typed: Typed) -> Option<Self>;
}

macro_rules! from_typed {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromTyped for $ty {
                const TYPE: ParamType = ParamType::$variant;

                fn from_typed(typed: Typed) -> Option<Self> {
                    match typed {
                        Typed::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

from_typed! {
    String => String,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
    usize => Size,
    Duration => Time,
    bool => Bool,
    Ipv4Addr => Ipv4,
    Cidr => Cidr,
    HostAddr => Host,
}

/// Host name lookup used by [`ParamType::Host`].
pub trait Resolver {
    fn resolve(&self, host: &str) -> Option<Ipv4Addr>;
}

/// Resolves through the system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str) -> Option<Ipv4Addr> {
        (host, 0)
            .to_socket_addrs()
            .ok()?
            .find_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(*v4.ip()),
                SocketAddr::V6(_) => None,
            })
    }
}

/// Convert `value` with the system resolver.
pub fn convert(value: &Value, ty: ParamType) -> Result<Typed, ConversionError> {
    convert_with(value, ty, &SystemResolver)
}

pub fn convert_with(
    value: &Value,
    ty: ParamType,
    resolver: &dyn Resolver,
) -> Result<Typed, ConversionError> {
    let Value::String(s) = value else {
        return Err(ConversionError::NotAString);
    };
    Ok(match ty {
        ParamType::String => Typed::String(s.clone()),
        ParamType::Short => Typed::Short(signed(s)?),
        ParamType::UShort => Typed::UShort(unsigned(s)?),
        ParamType::Int => Typed::Int(signed(s)?),
        ParamType::UInt => Typed::UInt(unsigned(s)?),
        ParamType::Long => Typed::Long(signed(s)?),
        ParamType::ULong => Typed::ULong(unsigned(s)?),
        ParamType::Size => Typed::Size(unsigned(s)?),
        ParamType::Time => Typed::Time(Duration::from_secs(unsigned(s)?)),
        ParamType::Bool => Typed::Bool(parse_bool(s).ok_or(ConversionError::NotABoolean)?),
        ParamType::Ipv4 => Typed::Ipv4(s.parse().map_err(|_| ConversionError::NotAnIpv4)?),
        ParamType::Cidr => Typed::Cidr(s.parse()?),
        ParamType::Host => Typed::Host(parse_host(s, resolver)?),
    })
}

/// `yes`, `on`, `t`, `true`, `1` and `no`, `off`, `nil`, `false`, `0`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "yes" | "on" | "t" | "true" | "1" => Some(true),
        "no" | "off" | "nil" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Parse an unsigned numeral no greater than `limit`.
pub fn parse_number(s: &str, limit: u64) -> Result<u64, ConversionError> {
    let (base, digits) = if s == "0" {
        (10, s)
    } else if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (16, rest)
    } else if let Some(rest) = s.strip_prefix('0') {
        (8, rest)
    } else {
        (10, s)
    };
    if digits.is_empty() {
        return Err(ConversionError::NotANumber { rest: s.to_string() });
    }

    let mut sum: u64 = 0;
    for (i, c) in digits.char_indices() {
        let Some(d) = c.to_digit(base) else {
            return Err(ConversionError::NotANumber {
                rest: digits[i..].to_string(),
            });
        };
        sum = sum
            .checked_mul(u64::from(base))
            .and_then(|v| v.checked_add(u64::from(d)))
            .ok_or(ConversionError::Overflow)?;
        if sum > limit {
            return Err(ConversionError::OutOfRange);
        }
    }
    Ok(sum)
}

fn unsigned<T>(s: &str) -> Result<T, ConversionError>
where
    T: TryFrom<u64> + Bounded,
{
    let n = parse_number(s, T::MAX_U64)?;
    T::try_from(n).map_err(|_| ConversionError::OutOfRange)
}

fn signed<T>(s: &str) -> Result<T, ConversionError>
where
    T: TryFrom<i128> + Bounded,
{
    let n = match s.strip_prefix('-') {
        Some(rest) => -i128::from(parse_number(rest, T::MIN_ABS)?),
        None => i128::from(parse_number(s, T::MAX_U64)?),
    };
    T::try_from(n).map_err(|_| ConversionError::OutOfRange)
}

/// Limits of the integer widths a parameter may have.
trait Bounded {
    const MAX_U64: u64;
    const MIN_ABS: u64 = 0;
}

macro_rules! bounded {
    (unsigned: $($ty:ty),*; signed: $($sty:ty),*) => {
        $(impl Bounded for $ty {
            const MAX_U64: u64 = <$ty>::MAX as u64;
        })*
        $(impl Bounded for $sty {
            const MAX_U64: u64 = <$sty>::MAX as u64;
            const MIN_ABS: u64 = <$sty>::MIN.unsigned_abs() as u64;
        })*
    };
}

bounded!(unsigned: u16, u32, u64, usize; signed: i16, i32, i64);

fn parse_host(s: &str, resolver: &dyn Resolver) -> Result<HostAddr, ConversionError> {
    if let Some(addr) = resolver.resolve(s) {
        return Ok(HostAddr(addr));
    }
    s.parse()
        .map(HostAddr)
        .map_err(|_| ConversionError::UnresolvableHost(s.to_string()))
}

/// An IPv4 network block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Cidr {
    pub addr: Ipv4Addr,
    pub mask_len: u8,
}

impl Cidr {
    pub fn new(addr: Ipv4Addr, mask_len: u8) -> Result<Self, ConversionError> {
        if mask_len > 32 {
            return Err(ConversionError::InvalidCidr(
                "not a valid network mask in CIDR".into(),
            ));
        }
        Ok(Cidr { addr, mask_len })
    }

    /// `0.0.0.0/0`, matching every address.
    pub fn any() -> Self {
        Cidr {
            addr: Ipv4Addr::UNSPECIFIED,
            mask_len: 0,
        }
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask_bits(self.mask_len))
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.addr) & mask_bits(self.mask_len))
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = mask_bits(self.mask_len);
        u32::from(ip) & mask == u32::from(self.addr) & mask
    }
}

fn mask_bits(len: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(len)).unwrap_or(0)
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask_len)
    }
}

impl FromStr for Cidr {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |msg: &str| ConversionError::InvalidCidr(msg.to_string());

        let Some((addr, mask)) = s.split_once('/') else {
            return infer_cidr(s);
        };
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| invalid("not a valid IPv4 address in CIDR"))?;

        let mask_len = if mask.contains('.') {
            let bits = u32::from(
                mask.parse::<Ipv4Addr>()
                    .map_err(|_| invalid("not a valid network in CIDR"))?,
            );
            let len = bits.leading_ones();
            if bits.checked_shl(len).unwrap_or(0) != 0 {
                return Err(invalid("not a valid network mask in CIDR"));
            }
            len
        } else {
            let len = parse_number(mask, 32).map_err(|_| invalid("not a valid network mask in CIDR"))?;
            u32::try_from(len).map_err(|_| invalid("not a valid network mask in CIDR"))?
        };

        let mask_len = u8::try_from(mask_len).map_err(|_| invalid("not a valid network mask in CIDR"))?;
        Cidr::new(addr, mask_len)
    }
}

/// A bare address of one to four octets. Missing octets are zero, and each
/// trailing zero octet takes eight bits off the mask.
fn infer_cidr(s: &str) -> Result<Cidr, ConversionError> {
    let stopped = |rest: &str| ConversionError::InvalidCidr(format!("not a CIDR (stopped near `{rest}')"));

    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() > 4 {
        return Err(stopped(s));
    }
    let mut octets = [0u8; 4];
    for (i, part) in parts.iter().enumerate() {
        let n = parse_number(part, 255).map_err(|_| stopped(part))?;
        octets[i] = u8::try_from(n).map_err(|_| stopped(part))?;
    }

    let trailing = octets.iter().rev().take_while(|&&o| o == 0).count();
    let mask_len = u8::try_from(32 - 8 * trailing).map_err(|_| stopped(s))?;
    Ok(Cidr {
        addr: Ipv4Addr::from(octets),
        mask_len,
    })
}
