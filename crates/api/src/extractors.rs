//! Request extractors.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Address recorded when the peer is unknown.
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// Client IP address for provenance.
///
/// Taken from the first `X-Forwarded-For` entry when it parses as an IP
/// address, else the peer socket address, else [`UNKNOWN_IP`]. The stored
/// form is the canonical rendering of the address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok());

        if let Some(ip) = forwarded {
            return Ok(Self(ip.to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(Self(peer.unwrap_or_else(|| UNKNOWN_IP.to_string())))
    }
}
