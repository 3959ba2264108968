//! Link-settings probe over the ethtool ioctl.
//!
//! Opens a transient datagram socket, issues `ETHTOOL_GSET` for one
//! interface and closes the socket on every path.

use std::os::unix::io::RawFd;

const ETHTOOL_GSET: u32 = 0x0000_0001;
const SIOCETHTOOL: libc::c_ulong = 0x8946;
const IFNAMSIZ: usize = 16;

/// `struct ethtool_cmd` from `linux/ethtool.h`.
#[repr(C)]
#[derive(Clone, Copy)]
struct EthtoolCmd {
    cmd: u32,
    supported: u32,
    advertising: u32,
    /// Link speed in Mbit/s (low 16 bits).
    speed: u16,
    duplex: u8,
    port: u8,
    phy_address: u8,
    transceiver: u8,
    autoneg: u8,
    mdio_support: u8,
    maxtxpkt: u32,
    maxrxpkt: u32,
    speed_hi: u16,
    eth_tp_mdix: u8,
    eth_tp_mdix_ctrl: u8,
    lp_advertising: u32,
    reserved: [u32; 2],
}

/// `struct ifreq` with the data pointer member of its union, padded to the
/// kernel's 40-byte layout.
#[repr(C)]
struct IfReq {
    ifr_name: [libc::c_char; IFNAMSIZ],
    ifr_data: *mut libc::c_void,
    pad: [u8; 16],
}

/// Datagram socket closed on drop, so the descriptor never leaks on an
/// error path.
struct DgramSocket(RawFd);

impl DgramSocket {
    fn open() -> Option<Self> {
        // SAFETY: plain socket(2) call, the result is checked below.
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, libc::IPPROTO_IP) };
        if fd < 0 { None } else { Some(Self(fd)) }
    }
}

impl Drop for DgramSocket {
    fn drop(&mut self) {
        // SAFETY: the descriptor was returned by socket(2) and is owned here.
        unsafe {
            libc::close(self.0);
        }
    }
}

/// Queries speed and duplex of one interface.
///
/// Returns the speed in bits per second and the raw duplex byte, or `None`
/// when the socket, the name or the ioctl fails.
pub fn probe(ifname: &str) -> Option<(i64, u8)> {
    let name = ifname.as_bytes();
    if name.is_empty() || name.len() >= IFNAMSIZ {
        return None;
    }

    let sock = DgramSocket::open()?;

    // SAFETY: both structs are plain-old-data, all-zeroes is a valid state.
    let mut edata: EthtoolCmd = unsafe { std::mem::zeroed() };
    let mut ifr: IfReq = unsafe { std::mem::zeroed() };
    edata.cmd = ETHTOOL_GSET;
    for (dst, src) in ifr.ifr_name.iter_mut().zip(name) {
        *dst = *src as libc::c_char;
    }
    ifr.ifr_data = (&raw mut edata).cast();

    // SAFETY: ifr points at a properly sized ifreq whose data member points
    // at a live ethtool_cmd; the kernel writes the reply into edata.
    let status = unsafe { libc::ioctl(sock.0, SIOCETHTOOL, &raw mut ifr) };
    if status < 0 {
        return None;
    }

    Some((edata.speed as i64 * 1_000_000, edata.duplex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_interface_names() {
        assert_eq!(probe(""), None);
        assert_eq!(probe("this-name-is-way-too-long"), None);
    }

    #[test]
    fn loopback_probe_does_not_leak_or_panic() {
        // lo carries no PHY, the ioctl is expected to fail cleanly.
        let _ = probe("lo");
    }
}
