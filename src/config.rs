use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use chrono::{FixedOffset, Offset, Utc};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    /// Reference zone for leaderboard period boundaries.
    pub ranking_zone: FixedOffset,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let ranking_zone = parse_utc_offset(std::env::var("RANKING_UTC_OFFSET_MINUTES").ok().as_deref());

        Self {
            host,
            port,
            log_level,
            ranking_zone,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Minutes east of UTC. Missing, malformed or out-of-range values mean UTC.
pub fn parse_utc_offset(minutes: Option<&str>) -> FixedOffset {
    minutes
        .and_then(|value| value.trim().parse::<i32>().ok())
        .and_then(|minutes| minutes.checked_mul(60))
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_parses_minutes_east() {
        assert_eq!(parse_utc_offset(Some("540")).local_minus_utc(), 9 * 3600);
        assert_eq!(parse_utc_offset(Some("-300")).local_minus_utc(), -5 * 3600);
        assert_eq!(parse_utc_offset(Some(" 180 ")).local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn bad_offsets_fall_back_to_utc() {
        assert_eq!(parse_utc_offset(None).local_minus_utc(), 0);
        assert_eq!(parse_utc_offset(Some("tokyo")).local_minus_utc(), 0);
        assert_eq!(parse_utc_offset(Some("100000")).local_minus_utc(), 0);
    }
}
