//! SDP text parsing
//!
//! The text is processed one `<type>=<value>` line at a time. Lines before the
//! first `m=` line are session level; everything after belongs to the most
//! recent media section. ICE credentials and DTLS attributes found at session
//! level are applied to every media section that does not carry its own.
//!
//! Structural lines (`v=`, `o=`, `m=`, `c=`, `a=rtpmap`) are parsed with `nom`.
//! Attribute values with a simple whitespace grammar are split by hand.

use std::str::FromStr;

use nom::{
    IResult,
    bytes::complete::{tag, take_till1},
    character::complete::{anychar, char, digit1, not_line_ending, space0, space1},
    combinator::{map_res, opt},
    multi::separated_list0,
    sequence::{preceded, tuple},
};
use tracing::trace;

use crate::candidate::{CandidateTransport, CandidateType, IceCandidate, TcpType};
use crate::configuration::{PeerMediaDescription, SessionConfiguration};
use crate::error::{Result, SdpError};
use crate::media::{DtlsSetup, MediaDirection, MediaKind};
use crate::payload::MediaPayload;

/// Parse an SDP line into its type character and trimmed value
pub fn parse_sdp_line(input: &str) -> IResult<&str, (char, &str)> {
    let (input, key) = anychar(input)?;
    let (input, _) = char('=')(input)?;
    let (input, value) = not_line_ending(input)?;

    let input = input.trim_start_matches(['\r', '\n']);

    Ok((input, (key, value.trim())))
}

fn token(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace())(input)
}

fn number<T: FromStr>(input: &str) -> IResult<&str, T> {
    map_res(digit1, |s: &str| s.parse::<T>())(input)
}

fn nom_error(what: &str, value: &str) -> SdpError {
    SdpError::parse(format!("invalid {} '{}'", what, value))
}

/// `- <session id> <session version> IN IP4 <address>`
fn origin(input: &str) -> IResult<&str, (u64, u64)> {
    let (input, (_user, _, id, _, version)) =
        tuple((token, space1, number::<u64>, space1, number::<u64>))(input)?;
    Ok((input, (id, version)))
}

/// `<media> <port>[/<count>] <proto> <fmt> ...`
fn media_line(input: &str) -> IResult<&str, (&str, u16, Vec<&str>)> {
    let (input, (kind, _, port, _count, _, _proto, _, formats)) = tuple((
        token,
        space1,
        number::<u16>,
        opt(preceded(char('/'), number::<u32>)),
        space1,
        token,
        space0,
        separated_list0(space1, token),
    ))(input)?;
    Ok((input, (kind, port, formats)))
}

/// `IN IP4 <address>` / `IN IP6 <address>`
fn connection(input: &str) -> IResult<&str, &str> {
    let (input, (_, _, _family, _, address)) =
        tuple((tag("IN"), space1, token, space1, token))(input)?;
    Ok((input, address))
}

/// `<pt> <encoding>/<clock>[/<channels>]`
fn rtpmap(input: &str) -> IResult<&str, (u8, &str, u32, Option<u16>)> {
    let (input, (pt, _, name, _, clock, channels)) = tuple((
        number::<u8>,
        space1,
        take_till1(|c: char| c == '/'),
        char('/'),
        number::<u32>,
        opt(preceded(char('/'), number::<u16>)),
    ))(input)?;
    Ok((input, (pt, name, clock, channels)))
}

/// Encoding of well-known static payload types that may appear without `a=rtpmap`
fn static_payload(payload_type: u8) -> Option<MediaPayload> {
    match payload_type {
        0 => Some(MediaPayload::new(0, "PCMU", 8000, 1)),
        8 => Some(MediaPayload::new(8, "PCMA", 8000, 1)),
        9 => Some(MediaPayload::new(9, "G722", 8000, 1)),
        18 => Some(MediaPayload::new(18, "G729", 8000, 1)),
        _ => None,
    }
}

/// Attributes that may appear at session level and act as media defaults
#[derive(Debug, Default)]
struct SessionDefaults {
    ice_ufrag: Option<String>,
    ice_password: Option<String>,
    fingerprint: Option<(String, String)>,
    setup: Option<DtlsSetup>,
}

/// Parse a complete SDP blob into a [`SessionConfiguration`]
pub fn parse_session(sdp: &str) -> Result<SessionConfiguration> {
    let mut config = SessionConfiguration::with_session_id(0);
    let mut defaults = SessionDefaults::default();
    let mut current: Option<MediaSection> = None;
    let mut sections: Vec<MediaSection> = Vec::new();
    let mut saw_version = false;
    let mut saw_origin = false;

    for raw in sdp.lines() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (_, (key, value)) =
            parse_sdp_line(raw).map_err(|_| SdpError::parse(format!("malformed SDP line '{}'", raw)))?;

        if !saw_version && key != 'v' {
            return Err(SdpError::parse("SDP must start with a v= line"));
        }

        match key {
            'v' => {
                if value != "0" {
                    return Err(SdpError::parse(format!("unsupported SDP version '{}'", value)));
                }
                saw_version = true;
            }
            'o' => {
                let (_, (id, version)) = origin(value).map_err(|_| nom_error("origin", value))?;
                config.session_id = id;
                config.session_version = version;
                saw_origin = true;
            }
            'm' => {
                if let Some(section) = current.take() {
                    sections.push(section);
                }
                let (_, (kind, port, formats)) =
                    media_line(value).map_err(|_| nom_error("media line", value))?;
                current = Some(MediaSection::new(MediaKind::from(kind), port, &formats));
            }
            'c' => {
                let (_, address) = connection(value).map_err(|_| nom_error("connection line", value))?;
                if let Some(section) = current.as_mut() {
                    section.line.address = address.to_string();
                }
            }
            'a' => match current.as_mut() {
                Some(section) => section.apply_attribute(value)?,
                None => apply_session_attribute(&mut defaults, value)?,
            },
            _ => trace!("Ignoring SDP line type '{}'", key),
        }
    }

    if !saw_version {
        return Err(SdpError::parse("empty SDP"));
    }
    if !saw_origin {
        return Err(SdpError::parse("SDP is missing the o= line"));
    }

    if let Some(section) = current.take() {
        sections.push(section);
    }

    for (index, section) in sections.into_iter().enumerate() {
        config.media_descriptions.push(section.finish(index, &defaults));
    }

    Ok(config)
}

fn apply_session_attribute(defaults: &mut SessionDefaults, value: &str) -> Result<()> {
    let (name, arg) = split_attribute(value);
    match (name, arg) {
        ("ice-ufrag", Some(ufrag)) => defaults.ice_ufrag = Some(ufrag.to_string()),
        ("ice-pwd", Some(pwd)) => defaults.ice_password = Some(pwd.to_string()),
        ("fingerprint", Some(arg)) => defaults.fingerprint = Some(parse_fingerprint(arg)?),
        ("setup", Some(arg)) => defaults.setup = Some(arg.parse()?),
        _ => {}
    }
    Ok(())
}

fn split_attribute(value: &str) -> (&str, Option<&str>) {
    match value.split_once(':') {
        Some((name, arg)) => (name.trim(), Some(arg.trim())),
        None => (value.trim(), None),
    }
}

fn parse_fingerprint(arg: &str) -> Result<(String, String)> {
    let mut parts = arg.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(hash), Some(fingerprint)) => Ok((hash.to_string(), fingerprint.to_string())),
        _ => Err(nom_error("fingerprint", arg)),
    }
}

/// A media section while its attributes are still being collected
struct MediaSection {
    line: PeerMediaDescription,
    mid_seen: bool,
    setup_seen: bool,
    fingerprint_seen: bool,
}

impl MediaSection {
    fn new(kind: MediaKind, port: u16, formats: &[&str]) -> Self {
        let mut line = PeerMediaDescription::new(String::new(), kind);
        line.port = port;
        line.rtcp_mux = false;
        line.payloads = formats
            .iter()
            .filter_map(|fmt| fmt.parse::<u8>().ok())
            .map(|pt| static_payload(pt).unwrap_or_else(|| MediaPayload::new(pt, "", 0, 1)))
            .collect();

        Self {
            line,
            mid_seen: false,
            setup_seen: false,
            fingerprint_seen: false,
        }
    }

    fn apply_attribute(&mut self, value: &str) -> Result<()> {
        let (name, arg) = split_attribute(value);
        let line = &mut self.line;

        match (name, arg) {
            ("mid", Some(mid)) => {
                line.mid = mid.to_string();
                self.mid_seen = true;
            }
            ("sendrecv" | "sendonly" | "recvonly" | "inactive", None) => {
                line.direction = name.parse()?;
            }
            ("rtcp-mux", None) => line.rtcp_mux = true,
            ("rtcp", Some(arg)) => {
                let mut parts = arg.split_whitespace();
                line.rtcp_port = parts
                    .next()
                    .ok_or_else(|| nom_error("rtcp attribute", arg))?
                    .parse()?;
                // `<port> IN IP4 <address>`
                if let Some(address) = parts.nth(2) {
                    line.rtcp_address = address.to_string();
                }
            }
            ("rtpmap", Some(arg)) => {
                let (_, (pt, name, clock, channels)) = rtpmap(arg).map_err(|_| nom_error("rtpmap", arg))?;
                let payload = match line.payloads.iter_mut().find(|p| p.payload_type == pt) {
                    Some(payload) => payload,
                    None => return Err(SdpError::parse(format!("rtpmap for unlisted payload type {}", pt))),
                };
                payload.encoding_name = name.to_string();
                payload.clock_rate = clock;
                payload.channels = channels.unwrap_or(1);
            }
            ("rtcp-fb", Some(arg)) => {
                let mut parts = arg.split_whitespace();
                let pt = parts.next().unwrap_or_default();
                let feedback: Vec<&str> = parts.collect();
                if let Ok(pt) = pt.parse::<u8>() {
                    if let Some(payload) = line.payloads.iter_mut().find(|p| p.payload_type == pt) {
                        match feedback.as_slice() {
                            ["ccm", "fir"] => payload.ccmfir = true,
                            ["nack", "pli"] => payload.nack_pli = true,
                            ["nack"] => payload.nack = true,
                            _ => trace!("Ignoring rtcp-fb '{}'", arg),
                        }
                    }
                }
            }
            ("fmtp", Some(arg)) => {
                let (pt, params) = arg.split_once(' ').ok_or_else(|| nom_error("fmtp", arg))?;
                let pt: u8 = pt.parse()?;
                if let Some(payload) = line.payloads.iter_mut().find(|p| p.payload_type == pt) {
                    for param in params.split(';') {
                        if let Some((key, value)) = param.split_once('=') {
                            // Only integer parameters are modelled
                            if let Ok(value) = value.trim().parse::<u32>() {
                                payload.parameters.insert(key.trim().to_string(), value);
                            }
                        }
                    }
                }
            }
            ("setup", Some(arg)) => {
                line.dtls_setup = arg.parse()?;
                self.setup_seen = true;
            }
            ("fingerprint", Some(arg)) => {
                let (hash, fingerprint) = parse_fingerprint(arg)?;
                line.dtls_fingerprint_hash_function = hash;
                line.dtls_fingerprint = fingerprint;
                self.fingerprint_seen = true;
            }
            ("ice-ufrag", Some(ufrag)) => line.ice_ufrag = ufrag.to_string(),
            ("ice-pwd", Some(pwd)) => line.ice_password = pwd.to_string(),
            ("candidate", Some(_)) => line.ice_candidates.push(parse_candidate(value)?),
            ("end-of-candidates", None) => line.ice_candidate_gathering_done = true,
            ("msid", Some(arg)) => {
                let mut parts = arg.split_whitespace();
                line.media_stream_id = parts.next().unwrap_or_default().to_string();
                line.media_stream_track_id = parts.next().unwrap_or_default().to_string();
            }
            ("ssrc", Some(arg)) => {
                let (ssrc, attribute) = match arg.split_once(' ') {
                    Some((ssrc, attribute)) => (ssrc, Some(attribute.trim())),
                    None => (arg, None),
                };
                let ssrc: u32 = ssrc.parse()?;
                if !line.ssrcs.contains(&ssrc) {
                    line.ssrcs.push(ssrc);
                }
                if let Some(attribute) = attribute {
                    if let Some(cname) = attribute.strip_prefix("cname:") {
                        line.cname = cname.to_string();
                    } else if let Some(msid) = attribute.strip_prefix("msid:") {
                        if line.media_stream_id.is_empty() {
                            let mut parts = msid.split_whitespace();
                            line.media_stream_id = parts.next().unwrap_or_default().to_string();
                            line.media_stream_track_id = parts.next().unwrap_or_default().to_string();
                        }
                    }
                }
            }
            _ => trace!("Ignoring media attribute '{}'", value),
        }
        Ok(())
    }

    fn finish(mut self, index: usize, defaults: &SessionDefaults) -> PeerMediaDescription {
        if !self.mid_seen {
            self.line.mid = index.to_string();
        }
        if self.line.ice_ufrag.is_empty() {
            if let Some(ufrag) = &defaults.ice_ufrag {
                self.line.ice_ufrag = ufrag.clone();
            }
        }
        if self.line.ice_password.is_empty() {
            if let Some(pwd) = &defaults.ice_password {
                self.line.ice_password = pwd.clone();
            }
        }
        if !self.fingerprint_seen {
            if let Some((hash, fingerprint)) = &defaults.fingerprint {
                self.line.dtls_fingerprint_hash_function = hash.clone();
                self.line.dtls_fingerprint = fingerprint.clone();
            }
        }
        if !self.setup_seen {
            if let Some(setup) = defaults.setup {
                self.line.dtls_setup = setup;
            }
        }

        // Dynamic payload types without an rtpmap cannot be used
        self.line.payloads.retain(|p| !p.encoding_name.is_empty());
        self.line
    }
}

/// Parse a `candidate:` attribute (RFC 8839 section 5.1)
///
/// Accepts the value with or without the `a=` and `candidate:` prefixes.
pub fn parse_candidate(input: &str) -> Result<IceCandidate> {
    let value = input.trim();
    let value = value.strip_prefix("a=").unwrap_or(value);
    let value = value.strip_prefix("candidate:").unwrap_or(value);

    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() < 8 {
        return Err(SdpError::parse(format!("candidate has too few fields: '{}'", input)));
    }

    let foundation = parts[0].to_string();
    let component_id: u32 = parts[1].parse()?;
    if !(1..=256).contains(&component_id) {
        return Err(SdpError::parse(format!("candidate component out of range: {}", component_id)));
    }
    let transport: CandidateTransport = parts[2].parse()?;
    let priority: u32 = parts[3].parse()?;
    let address = parts[4].to_string();
    let port: u16 = parts[5].parse()?;

    if parts[6] != "typ" {
        return Err(SdpError::parse(format!("expected 'typ' in candidate, found '{}'", parts[6])));
    }
    let candidate_type: CandidateType = parts[7].parse()?;

    let mut candidate = IceCandidate {
        candidate_type,
        foundation,
        component_id,
        transport,
        priority,
        address,
        port,
        tcp_type: None,
        related_address: None,
        related_port: None,
    };

    // Extension attributes come as name/value pairs
    let mut i = 8;
    while i + 1 < parts.len() {
        match parts[i] {
            "raddr" => candidate.related_address = Some(parts[i + 1].to_string()),
            "rport" => candidate.related_port = Some(parts[i + 1].parse()?),
            "tcptype" => candidate.tcp_type = Some(TcpType::from_str(parts[i + 1])?),
            other => trace!("Ignoring candidate extension '{}'", other),
        }
        i += 2;
    }

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0\r\n\
a=msid-semantic: WMS stream1\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 0 8\r\n\
c=IN IP4 0.0.0.0\r\n\
a=rtcp:9 IN IP4 0.0.0.0\r\n\
a=ice-ufrag:EsAw\r\n\
a=ice-pwd:bP+XJMM09aR8AiX1jdukzR6Y\r\n\
a=fingerprint:sha-256 D2:FA:0E:C3:22:59:5E:14:95:69:92:3D:13:B4:84:24:2C:C2:A2:C0:3E:FD:34:8E:5E:EA:6F:AF:52:CE:E6:0F\r\n\
a=setup:actpass\r\n\
a=mid:0\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=ssrc:3735928559 cname:4TOk42mSjXCkVIa6\r\n\
a=ssrc:3735928559 msid:stream1 track1\r\n";

    #[test]
    fn test_parse_sdp_line() {
        let (_, (key, value)) = parse_sdp_line("a=rtpmap:96 VP8/90000").unwrap();
        assert_eq!(key, 'a');
        assert_eq!(value, "rtpmap:96 VP8/90000");
        assert!(parse_sdp_line("garbage").is_err());
    }

    #[test]
    fn test_parse_browser_offer() {
        let config = parse_session(CHROME_OFFER).expect("Should parse browser offer");
        assert_eq!(config.session_id, 4611731400430051336);
        assert_eq!(config.session_version, 2);
        assert_eq!(config.media_descriptions.len(), 1);

        let audio = &config.media_descriptions[0];
        assert_eq!(audio.mid, "0");
        assert_eq!(audio.kind, MediaKind::Audio);
        assert_eq!(audio.direction, MediaDirection::SendRecv);
        assert!(audio.rtcp_mux);
        assert_eq!(audio.rtcp_port, 9);
        assert_eq!(audio.ice_ufrag, "EsAw");
        assert_eq!(audio.dtls_setup, DtlsSetup::ActPass);
        assert_eq!(audio.dtls_fingerprint_hash_function, "sha-256");
        assert_eq!(audio.payloads.len(), 3);
        assert_eq!(audio.payloads[0].encoding_name, "opus");
        assert_eq!(audio.payloads[0].channels, 2);
        assert_eq!(audio.payloads[0].parameter("useinbandfec"), Some(1));
        assert_eq!(audio.payloads[1].encoding_name, "PCMU");
        assert_eq!(audio.ssrcs, vec![3735928559]);
        assert_eq!(audio.cname, "4TOk42mSjXCkVIa6");
        assert_eq!(audio.media_stream_id, "stream1");
        assert_eq!(audio.media_stream_track_id, "track1");
    }

    #[test]
    fn test_session_level_credentials_apply_to_media() {
        let sdp = "v=0\no=- 1 1 IN IP4 127.0.0.1\ns=-\nt=0 0\na=ice-ufrag:abcd\na=ice-pwd:secretsecretsecretsecret\na=setup:active\nm=audio 9 UDP/TLS/RTP/SAVPF 0\na=mid:a\n";
        let config = parse_session(sdp).unwrap();
        let line = &config.media_descriptions[0];
        assert_eq!(line.ice_ufrag, "abcd");
        assert_eq!(line.ice_password, "secretsecretsecretsecret");
        assert_eq!(line.dtls_setup, DtlsSetup::Active);
    }

    #[test]
    fn test_missing_mid_uses_index() {
        let sdp = "v=0\no=- 1 1 IN IP4 127.0.0.1\ns=-\nt=0 0\nm=audio 9 RTP/AVP 0\nm=video 9 RTP/AVP 96\na=rtpmap:96 VP8/90000\n";
        let config = parse_session(sdp).unwrap();
        assert_eq!(config.media_descriptions[0].mid, "0");
        assert_eq!(config.media_descriptions[1].mid, "1");
        assert_eq!(config.media_descriptions[1].payloads[0].encoding_name, "VP8");
    }

    #[test]
    fn test_dynamic_payload_without_rtpmap_is_dropped() {
        let sdp = "v=0\no=- 1 1 IN IP4 127.0.0.1\ns=-\nt=0 0\nm=video 9 RTP/AVP 96 97\na=rtpmap:96 VP8/90000\n";
        let config = parse_session(sdp).unwrap();
        assert_eq!(config.media_descriptions[0].payloads.len(), 1);
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(parse_session("").is_err());
        assert!(parse_session("this is not sdp").is_err());
        assert!(parse_session("o=- 1 1 IN IP4 127.0.0.1\nv=0\n").is_err());
        assert!(parse_session("v=0\no=- 1 1 IN IP4 127.0.0.1\nm=audio notaport RTP/AVP 0\n").is_err());
        assert!(parse_session("v=0\no=- 1 1 IN IP4 127.0.0.1\nm=audio 9 RTP/AVP 0\na=setup:sideways\n").is_err());
        assert!(parse_session("v=0\ns=-\n").is_err());
    }

    #[test]
    fn test_parse_candidate_variants() {
        let host = parse_candidate("candidate:1 1 UDP 2130706431 192.168.1.2 54400 typ host").unwrap();
        assert_eq!(host.candidate_type, CandidateType::Host);
        assert_eq!(host.port, 54400);

        let srflx = parse_candidate(
            "a=candidate:2 1 udp 1694498815 203.0.113.7 61000 typ srflx raddr 192.168.1.2 rport 54400 generation 0",
        )
        .unwrap();
        assert_eq!(srflx.candidate_type, CandidateType::Srflx);
        assert_eq!(srflx.related_address.as_deref(), Some("192.168.1.2"));
        assert_eq!(srflx.related_port, Some(54400));

        let tcp = parse_candidate("3 1 TCP 1518280447 192.168.1.2 9 typ host tcptype active").unwrap();
        assert_eq!(tcp.transport, CandidateTransport::Tcp);
        assert_eq!(tcp.tcp_type, Some(TcpType::Active));
    }

    #[test]
    fn test_parse_candidate_errors() {
        assert!(parse_candidate("candidate:1 1 UDP 1 1.2.3.4 5").is_err());
        assert!(parse_candidate("candidate:1 0 UDP 1 1.2.3.4 5 typ host").is_err());
        assert!(parse_candidate("candidate:1 1 SCTP 1 1.2.3.4 5 typ host").is_err());
        assert!(parse_candidate("candidate:1 1 UDP 1 1.2.3.4 5 type host").is_err());
        assert!(parse_candidate("candidate:1 1 UDP 1 1.2.3.4 5 typ bogus").is_err());
    }
}
