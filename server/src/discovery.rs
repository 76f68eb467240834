//! Finding the address players should type into their setup dialog.
//!
//! A relay bound to `0.0.0.0` only knows it listens everywhere. Connecting a
//! UDP socket to a public address sends nothing, but makes the OS pick the
//! outgoing interface, whose address is the one other machines on the LAN
//! can reach.

use log::debug;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Public address used only to select a route; no packet is sent to it.
pub const ROUTE_TARGET: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80);

/// Source address the OS would use to reach `target`.
pub async fn route_source_ip(target: SocketAddr) -> io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(target).await?;

    let ip = socket.local_addr()?.ip();
    if ip.is_unspecified() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "no route selected an interface",
        ));
    }
    Ok(ip)
}

/// Like `route_source_ip`, falling back to loopback when there is no route.
pub async fn local_ip_toward(target: SocketAddr) -> IpAddr {
    match route_source_ip(target).await {
        Ok(ip) => ip,
        Err(e) => {
            debug!("Could not determine LAN address, using loopback: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// This machine's LAN address, or 127.0.0.1 when it has no network.
pub async fn lan_address() -> IpAddr {
    local_ip_toward(ROUTE_TARGET).await
}
