//! SDP text generation

use std::fmt::Write;

use crate::candidate::IceCandidate;
use crate::configuration::{PeerMediaDescription, SessionConfiguration};
use crate::error::{Result, SdpError};

/// Transport profile written on every media line
const MEDIA_PROTOCOL: &str = "UDP/TLS/RTP/SAVPF";

/// Render a configuration as SDP text (CRLF line endings)
pub fn write_session(config: &SessionConfiguration) -> Result<String> {
    let mut sdp = String::with_capacity(1024 + config.len() * 1024);

    push_line(&mut sdp, "v=0");
    push_line(
        &mut sdp,
        &format!("o=- {} {} IN IP4 127.0.0.1", config.session_id, config.session_version),
    );
    push_line(&mut sdp, "s=-");
    push_line(&mut sdp, "t=0 0");

    let mut stream_ids: Vec<&str> = Vec::new();
    for line in &config.media_descriptions {
        let id = line.media_stream_id.as_str();
        if !id.is_empty() && !stream_ids.contains(&id) {
            stream_ids.push(id);
        }
    }
    if stream_ids.is_empty() {
        push_line(&mut sdp, "a=msid-semantic: WMS");
    } else {
        push_line(&mut sdp, &format!("a=msid-semantic: WMS {}", stream_ids.join(" ")));
    }

    for line in &config.media_descriptions {
        write_media(&mut sdp, line)?;
    }

    Ok(sdp)
}

fn push_line(sdp: &mut String, line: &str) {
    sdp.push_str(line);
    sdp.push_str("\r\n");
}

fn check_token(what: &str, value: &str, line: &PeerMediaDescription) -> Result<()> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(SdpError::internal(format!(
            "media line '{}' has an unrepresentable {} '{}'",
            line.mid, what, value
        )));
    }
    Ok(())
}

fn write_media(sdp: &mut String, line: &PeerMediaDescription) -> Result<()> {
    check_token("mid", &line.mid, line)?;

    let formats: Vec<String> = line.payloads.iter().map(|p| p.payload_type.to_string()).collect();
    let mut m_line = format!("m={} {} {}", line.kind, line.port, MEDIA_PROTOCOL);
    for format in &formats {
        m_line.push(' ');
        m_line.push_str(format);
    }
    push_line(sdp, &m_line);
    push_line(sdp, &format!("c=IN IP4 {}", line.address));

    if line.rtcp_port != 0 {
        let address = if line.rtcp_address.is_empty() { "0.0.0.0" } else { line.rtcp_address.as_str() };
        push_line(sdp, &format!("a=rtcp:{} IN IP4 {}", line.rtcp_port, address));
    }

    push_line(sdp, &format!("a={}", line.direction));
    push_line(sdp, &format!("a=mid:{}", line.mid));

    if !line.media_stream_id.is_empty() {
        if line.media_stream_track_id.is_empty() {
            push_line(sdp, &format!("a=msid:{}", line.media_stream_id));
        } else {
            push_line(
                sdp,
                &format!("a=msid:{} {}", line.media_stream_id, line.media_stream_track_id),
            );
        }
    }

    for payload in &line.payloads {
        check_token("encoding name", &payload.encoding_name, line)?;

        let mut rtpmap = format!("a=rtpmap:{} {}/{}", payload.payload_type, payload.encoding_name, payload.clock_rate);
        if payload.channels > 1 {
            let _ = write!(rtpmap, "/{}", payload.channels);
        }
        push_line(sdp, &rtpmap);

        if payload.ccmfir {
            push_line(sdp, &format!("a=rtcp-fb:{} ccm fir", payload.payload_type));
        }
        if payload.nack {
            push_line(sdp, &format!("a=rtcp-fb:{} nack", payload.payload_type));
        }
        if payload.nack_pli {
            push_line(sdp, &format!("a=rtcp-fb:{} nack pli", payload.payload_type));
        }
        if !payload.parameters.is_empty() {
            let params: Vec<String> = payload
                .parameters
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            push_line(sdp, &format!("a=fmtp:{} {}", payload.payload_type, params.join(";")));
        }
    }

    if line.rtcp_mux {
        push_line(sdp, "a=rtcp-mux");
    }

    push_line(sdp, &format!("a=setup:{}", line.dtls_setup));
    if !line.dtls_fingerprint.is_empty() {
        check_token("fingerprint hash", &line.dtls_fingerprint_hash_function, line)?;
        push_line(
            sdp,
            &format!("a=fingerprint:{} {}", line.dtls_fingerprint_hash_function, line.dtls_fingerprint),
        );
    }

    if !line.ice_ufrag.is_empty() {
        push_line(sdp, &format!("a=ice-ufrag:{}", line.ice_ufrag));
    }
    if !line.ice_password.is_empty() {
        push_line(sdp, &format!("a=ice-pwd:{}", line.ice_password));
    }

    for candidate in &line.ice_candidates {
        push_line(sdp, &format!("a={}", write_candidate(candidate)?));
    }
    if line.ice_candidate_gathering_done {
        push_line(sdp, "a=end-of-candidates");
    }

    for ssrc in &line.ssrcs {
        if line.cname.is_empty() && line.media_stream_id.is_empty() {
            push_line(sdp, &format!("a=ssrc:{}", ssrc));
            continue;
        }
        if !line.cname.is_empty() {
            push_line(sdp, &format!("a=ssrc:{} cname:{}", ssrc, line.cname));
        }
        if !line.media_stream_id.is_empty() {
            push_line(
                sdp,
                &format!("a=ssrc:{} msid:{} {}", ssrc, line.media_stream_id, line.media_stream_track_id)
                    .trim_end()
                    .to_string(),
            );
        }
    }

    Ok(())
}

/// Render a candidate as a `candidate:` attribute value
pub fn write_candidate(candidate: &IceCandidate) -> Result<String> {
    if candidate.foundation.is_empty() || candidate.address.is_empty() {
        return Err(SdpError::internal("candidate without foundation or address"));
    }

    let mut line = format!(
        "candidate:{} {} {} {} {} {} typ {}",
        candidate.foundation,
        candidate.component_id,
        candidate.transport,
        candidate.priority,
        candidate.address,
        candidate.port,
        candidate.candidate_type,
    );

    if let Some(addr) = &candidate.related_address {
        let _ = write!(line, " raddr {}", addr);
    }
    if let Some(port) = candidate.related_port {
        let _ = write!(line, " rport {}", port);
    }
    if let Some(tcp_type) = candidate.tcp_type {
        let _ = write!(line, " tcptype {}", tcp_type.as_str());
    }

    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateType;
    use crate::media::MediaKind;
    use crate::payload::MediaPayload;

    #[test]
    fn test_write_minimal_session() {
        let mut config = SessionConfiguration::with_session_id(77);
        config.session_version = 3;
        let mut line = PeerMediaDescription::new("1", MediaKind::Audio);
        line.payloads.push(MediaPayload::new(111, "OPUS", 48000, 2));
        line.ice_ufrag = "ab12".into();
        config.media_descriptions.push(line);

        let sdp = write_session(&config).unwrap();
        assert!(sdp.starts_with("v=0\r\no=- 77 3 IN IP4 127.0.0.1\r\n"));
        assert!(sdp.contains("m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n"));
        assert!(sdp.contains("a=rtpmap:111 OPUS/48000/2\r\n"));
        assert!(sdp.contains("a=setup:actpass\r\n"));
        assert!(sdp.contains("a=ice-ufrag:ab12\r\n"));
        assert!(sdp.contains("a=rtcp-mux\r\n"));
    }

    #[test]
    fn test_write_candidate_with_related_address() {
        let mut candidate = IceCandidate::host("4", 1694498815, "203.0.113.7", 61000);
        candidate.candidate_type = CandidateType::Srflx;
        candidate.related_address = Some("10.0.0.2".into());
        candidate.related_port = Some(5000);
        assert_eq!(
            write_candidate(&candidate).unwrap(),
            "candidate:4 1 UDP 1694498815 203.0.113.7 61000 typ srflx raddr 10.0.0.2 rport 5000"
        );
    }

    #[test]
    fn test_unrepresentable_values_are_internal_errors() {
        let mut config = SessionConfiguration::with_session_id(1);
        config.media_descriptions.push(PeerMediaDescription::new("has space", MediaKind::Audio));
        assert!(matches!(write_session(&config), Err(SdpError::Internal(_))));

        let candidate = IceCandidate::host("", 1, "1.2.3.4", 1);
        assert!(matches!(write_candidate(&candidate), Err(SdpError::Internal(_))));
    }
}
