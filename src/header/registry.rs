//! Parser selection by transport flags

use tracing::{debug, info, warn};

use super::{
    DelimitedConfig, DelimitedParser, EdlParser, GoesDescribedParser, GoesParser, HeaderParser,
    IridiumParser, ParseFailure, ShefParser,
};
use crate::config::{ConfigError, Properties};
use crate::message::RawMessage;
use crate::protocol::MessageFlags;

/// Chooses the header parser for each retrieved message
///
/// Dispatch is on the message-type bits of the transport flags:
///
/// | Type     | Parser  |
/// |----------|---------|
/// | Iridium  | Iridium |
/// | DAMS-NT  | GOES    |
/// | Net DCP  | EDL, then GOES |
/// | other    | GOES    |
#[derive(Debug)]
pub struct HeaderParserRegistry {
    goes: Box<dyn HeaderParser>,
    iridium: Box<dyn HeaderParser>,
    net_dcp: Box<dyn HeaderParser>,
}

impl Default for HeaderParserRegistry {
    fn default() -> Self {
        Self {
            goes: Box::new(GoesParser::new()),
            iridium: Box::new(IridiumParser::new()),
            net_dcp: Box::new(EdlParser::new()),
        }
    }
}

impl HeaderParserRegistry {
    /// Create a registry with the standard parsers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the GOES parser
    #[must_use]
    pub fn with_goes(mut self, parser: Box<dyn HeaderParser>) -> Self {
        self.goes = parser;
        self
    }

    /// Replace the Iridium parser
    #[must_use]
    pub fn with_iridium(mut self, parser: Box<dyn HeaderParser>) -> Self {
        self.iridium = parser;
        self
    }

    /// Replace the network DCP parser
    #[must_use]
    pub fn with_net_dcp(mut self, parser: Box<dyn HeaderParser>) -> Self {
        self.net_dcp = parser;
        self
    }

    /// Parser for a message with these flags
    #[must_use]
    pub fn select(&self, flags: MessageFlags) -> &dyn HeaderParser {
        if flags.is_iridium() {
            self.iridium.as_ref()
        } else if flags.is_net_dcp() {
            self.net_dcp.as_ref()
        } else {
            // DAMS-NT and plain GOES share the DOMSAT header.
            self.goes.as_ref()
        }
    }

    /// Decode the header of `msg` with the parser chosen by its flags.
    ///
    /// Network DCP messages that fail the EDL parser are retried once with
    /// the GOES parser: devices relayed through a DAMS-NT gateway arrive
    /// tagged as network DCP but carry a DOMSAT header. A message decoded
    /// this way records the failed parser in
    /// [`RawMessage::fallback_from`].
    pub fn parse(&self, msg: RawMessage) -> Result<RawMessage, ParseFailure> {
        let flags = msg.flags();
        let parser = self.select(flags);
        debug!(flags = %flags, parser = %parser.header_type(), "parsing header");

        if !flags.is_net_dcp() {
            return parser.parse(msg);
        }

        let first = match parser.parse(msg.clone()) {
            Ok(parsed) => return Ok(parsed),
            Err(err) => err,
        };

        info!(
            reason = %first.reason,
            "failed to parse net DCP message with EDL header parser, attempting GOES"
        );
        match self.goes.parse(msg) {
            Ok(mut parsed) => {
                parsed.set_fallback_from(parser.header_type());
                Ok(parsed)
            }
            Err(second) => {
                warn!(
                    fragment = %first.fragment,
                    edl = %first.reason,
                    goes = %second.reason,
                    "could not parse net DCP message header"
                );
                Err(ParseFailure {
                    reason: format!(
                        "attempted net DCP message with both EDL and GOES header parsers: {}",
                        first.reason
                    ),
                    ..first
                })
            }
        }
    }

    /// Build a parser by medium type name.
    ///
    /// Delimited parsers (`csv`, `data-logger`) read their columns from
    /// `props`.
    pub fn build(name: &str, props: &Properties) -> Result<Box<dyn HeaderParser>, ConfigError> {
        let parser: Box<dyn HeaderParser> = match name.to_ascii_lowercase().as_str() {
            "goes" | "goes-self-timed" | "goes-random" => Box::new(GoesParser::new()),
            "goes-described" => Box::new(GoesDescribedParser::new()),
            "iridium" => Box::new(IridiumParser::new()),
            "edl" | "netdcp" => Box::new(EdlParser::new()),
            "shef" => Box::new(ShefParser::new()),
            "csv" | "data-logger" => Box::new(DelimitedParser::new(
                DelimitedConfig::from_properties(props)?,
            )?),
            other => {
                return Err(ConfigError::invalid(
                    "mediumType",
                    other,
                    "no header parser for this medium type",
                ));
            }
        };
        Ok(parser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderType;
    use tracing_test::traced_test;

    const GOES: &[u8] = b"CE31D03010132120000G44+0NN118EXE00004data";

    #[test]
    fn test_dispatch_by_flags() {
        let registry = HeaderParserRegistry::new();
        let flags = MessageFlags::new();
        assert_eq!(registry.select(flags).header_type(), HeaderType::Goes);
        assert_eq!(
            registry
                .select(flags.with_type(MessageFlags::TYPE_DAMS_NT))
                .header_type(),
            HeaderType::Goes
        );
        assert_eq!(
            registry
                .select(flags.with_type(MessageFlags::TYPE_IRIDIUM))
                .header_type(),
            HeaderType::Iridium
        );
        assert_eq!(
            registry
                .select(flags.with_type(MessageFlags::TYPE_NET_DCP))
                .header_type(),
            HeaderType::Edl
        );
    }

    #[test]
    #[traced_test]
    fn test_net_dcp_falls_back_to_goes() {
        let registry = HeaderParserRegistry::new();
        let msg = RawMessage::new(GOES)
            .with_flags(MessageFlags::new().with_type(MessageFlags::TYPE_NET_DCP));

        let parsed = registry.parse(msg).unwrap();
        assert_eq!(parsed.medium_id(), Some("CE31D030"));
        assert_eq!(parsed.header_type(), Some(HeaderType::Goes));
        assert_eq!(parsed.fallback_from(), Some(HeaderType::Edl));
        assert!(logs_contain("attempting GOES"));
    }

    #[test]
    fn test_no_fallback_for_goes() {
        let registry = HeaderParserRegistry::new();
        let msg = RawMessage::new(&b"//STATION X\n"[..]);
        let err = registry.parse(msg).unwrap_err();
        assert!(err.reason.contains("GOES header too short"));
    }

    #[test]
    fn test_both_parsers_fail() {
        let registry = HeaderParserRegistry::new();
        let msg = RawMessage::new(&b"garbage"[..])
            .with_flags(MessageFlags::new().with_type(MessageFlags::TYPE_NET_DCP));
        let err = registry.parse(msg).unwrap_err();
        assert!(err.reason.contains("both EDL and GOES"));
        assert_eq!(err.fragment, "garbage");
    }

    #[test]
    fn test_build_by_name() {
        let props: Properties = [("idcol", "1")].into_iter().collect();
        for name in [
            "goes",
            "goes-self-timed",
            "goes-random",
            "data-logger",
            "iridium",
            "edl",
            "netdcp",
            "shef",
            "csv",
            "goes-described",
        ] {
            assert!(HeaderParserRegistry::build(name, &props).is_ok(), "{name}");
        }
        assert!(HeaderParserRegistry::build("csv", &Properties::new()).is_err());
        assert!(HeaderParserRegistry::build("morse", &props).is_err());
    }
}
