#[cfg(test)]
pub mod test {
    use std::time::Duration;

    use crate::convert::{Cidr, ParamType, Typed};
    use crate::error::ConversionError;
    use crate::schema::{Context, Param, Section};
    use crate::value::Value;

    #[derive(Debug, Default, PartialEq)]
    pub struct TestConfig {
        pub logging: Logging,
        pub acl: Vec<AclEntry>,
        pub server: Server,
    }

    #[derive(Debug, Default, PartialEq)]
    pub struct Logging {
        pub facility: String,
        pub level: u32,
    }

    #[derive(Debug, Default, PartialEq)]
    pub struct Server {
        pub port: u16,
        pub timeout: Duration,
        pub aliases: Vec<String>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AclEntry {
        Accept(Cidr),
        Deny(Cidr),
    }

    /// `[from] ADDRESS`, where ADDRESS is a CIDR block or `any`.
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
            return Err(ConversionError::custom("expected a single address"));
        };
        if word.as_str() == Some("any") {
            return Ok(Cidr::any());
        }
        match ctx.convert(word, ParamType::Cidr)? {
            Typed::Cidr(c) => Ok(c),
            _ => Err(ConversionError::custom("expected a CIDR block")),
        }
    }

    fn logging() -> Section<Logging> {
        Section::new("logging")
            .doc("Logging settings.")
            .with_param(
                Param::new("facility", |l: &mut Logging, v: String| l.facility = v)
                    .doc("Syslog facility.")
                    .argname("name"),
            )
            .and_then(|s| s.with_param(Param::new("level", |l: &mut Logging, v: u32| l.level = v)))
            .unwrap()
    }

    pub fn schema() -> Section<TestConfig> {
        let acl = Section::new("acl")
            .doc("Access control list, checked in order.")
            .with_param(
                Param::callback("allow", |c: &mut TestConfig, v: &Value, ctx| {
                    c.acl.push(AclEntry::Accept(acl_address(v, ctx)?));
                    Ok(())
                })
                .doc("Allow connections from this address. The word `from' may precede it.")
                .argname("addr: cidr"),
            )
            .unwrap()
            .with_param(
                Param::callback("deny", |c: &mut TestConfig, v: &Value, ctx| {
                    c.acl.push(AclEntry::Deny(acl_address(v, ctx)?));
                    Ok(())
                })
                .argname("addr: cidr"),
            )
            .unwrap();

        let server = Section::new("server")
            .label("<name>")
            .with_param(Param::new("port", |c: &mut TestConfig, v: u16| c.server.port = v))
            .unwrap()
            .with_param(Param::new("timeout", |c: &mut TestConfig, v: Duration| {
                c.server.timeout = v
            }))
            .unwrap()
            .with_param(Param::list("alias", |c: &mut TestConfig, v: Vec<String>| {
                c.server.aliases.extend(v)
            }))
            .unwrap();

        Section::root()
            .with_section(logging().map_target(|c: &mut TestConfig| &mut c.logging))
            .unwrap()
            .with_section(acl)
            .unwrap()
            .with_section(server)
            .unwrap()
    }

    #[test]
    fn schema_has_expected_sections() {
        let s = schema();
        assert!(s.find_section("logging").is_ok());
        assert!(s.find_section("acl").is_ok());
        assert!(s.find_section("server").is_ok());
        assert_eq!(s.find_section("logging").unwrap().params().len(), 2);
    }

    #[test]
    fn default_config_is_empty() {
        let c = TestConfig::default();
        assert!(c.acl.is_empty());
        assert_eq!(c.logging.facility, "");
    }
}
