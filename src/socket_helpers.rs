// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Safe wrappers around the `libc` socket options socket2 does not cover.
//!
//! Every wrapper takes a raw fd borrowed from an owning socket and turns
//! `-1` returns into `McastError::Socket` carrying the OS error.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::unix::io::RawFd;

use crate::error::{McastError, Result};

fn set_int_option(
    fd: RawFd,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
    what: &str,
) -> Result<()> {
    let result = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if result < 0 {
        return Err(McastError::Socket {
            context: format!("failed to set {}", what),
            source: std::io::Error::last_os_error(),
        });
    }

    Ok(())
}

/// Set IP_HDRINCL on a raw socket to craft our own IP headers
pub fn set_ip_hdrincl(fd: RawFd) -> Result<()> {
    set_int_option(fd, libc::IPPROTO_IP, libc::IP_HDRINCL, 1, "IP_HDRINCL")
}

/// Set IP_PKTINFO to receive destination address and arrival interface
pub fn set_ip_pktinfo(fd: RawFd) -> Result<()> {
    set_int_option(fd, libc::IPPROTO_IP, libc::IP_PKTINFO, 1, "IP_PKTINFO")
}

/// Set IP_RECVTTL to receive the TTL of each datagram
pub fn set_ip_recvttl(fd: RawFd) -> Result<()> {
    set_int_option(fd, libc::IPPROTO_IP, libc::IP_RECVTTL, 1, "IP_RECVTTL")
}

fn mreqn(group: Ipv4Addr, interface_index: u32) -> libc::ip_mreqn {
    libc::ip_mreqn {
        imr_multiaddr: libc::in_addr {
            s_addr: u32::from(group).to_be(),
        },
        imr_address: libc::in_addr { s_addr: 0 },
        imr_ifindex: interface_index as libc::c_int,
    }
}

/// Join a multicast group on a specific interface
///
/// Uses ip_mreqn to specify the interface by index; index 0 lets the
/// kernel choose from the routing table.
pub fn join_multicast_group(fd: RawFd, group: Ipv4Addr, interface_index: u32) -> Result<()> {
    let mreqn = mreqn(group, interface_index);
    let result = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_IP,
            libc::IP_ADD_MEMBERSHIP,
            &mreqn as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::ip_mreqn>() as libc::socklen_t,
        )
    };

    if result < 0 {
        return Err(McastError::Socket {
            context: format!("failed to join multicast group {}", group),
            source: std::io::Error::last_os_error(),
        });
    }

    Ok(())
}

/// Send multicast out of the interface with this index
pub fn set_multicast_if_index(fd: RawFd, interface_index: u32) -> Result<()> {
    let mreqn = mreqn(Ipv4Addr::UNSPECIFIED, interface_index);
    let result = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_IP,
            libc::IP_MULTICAST_IF,
            &mreqn as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::ip_mreqn>() as libc::socklen_t,
        )
    };

    if result < 0 {
        return Err(McastError::Socket {
            context: format!("failed to set IP_MULTICAST_IF to index {}", interface_index),
            source: std::io::Error::last_os_error(),
        });
    }

    Ok(())
}

/// Ancillary data read alongside one datagram
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlData {
    /// Header destination address (IP_PKTINFO ipi_addr)
    pub destination: Option<Ipv4Addr>,
    /// Arrival interface index (IP_PKTINFO ipi_ifindex)
    pub interface_index: Option<u32>,
    pub ttl: Option<u8>,
}

/// Result of one `recvmsg`
#[derive(Debug, Clone, Copy)]
pub struct RecvResult {
    pub len: usize,
    pub source: Option<SocketAddrV4>,
    pub control: ControlData,
}

/// Non-blocking `recvmsg` that collects IP_PKTINFO and IP_TTL control messages.
///
/// Returns `WouldBlock` from the OS unchanged so callers can drive it from
/// `AsyncFd::try_io`.
pub fn recv_with_control(fd: RawFd, buf: &mut [u8]) -> std::io::Result<RecvResult> {
    // in_pktinfo (12 bytes) + int TTL, each behind a cmsg header; u64 keeps
    // the buffer aligned for cmsghdr
    let mut cmsg_buf = [0u64; 16];
    let mut source: libc::sockaddr_in = unsafe { std::mem::zeroed() };

    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };

    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_name = &mut source as *mut libc::sockaddr_in as *mut libc::c_void;
    msg.msg_namelen = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = std::mem::size_of_val(&cmsg_buf) as _;

    let n = unsafe { libc::recvmsg(fd, &mut msg, 0) };
    if n < 0 {
        return Err(std::io::Error::last_os_error());
    }

    let mut control = ControlData::default();
    let mut cmsg = unsafe { libc::CMSG_FIRSTHDR(&msg) };
    while !cmsg.is_null() {
        let cmsg_ref = unsafe { &*cmsg };
        let data = unsafe { libc::CMSG_DATA(cmsg) };
        if cmsg_ref.cmsg_level == libc::IPPROTO_IP {
            match cmsg_ref.cmsg_type {
                libc::IP_PKTINFO => {
                    let info =
                        unsafe { std::ptr::read_unaligned(data as *const libc::in_pktinfo) };
                    control.destination =
                        Some(Ipv4Addr::from(u32::from_be(info.ipi_addr.s_addr)));
                    if info.ipi_ifindex > 0 {
                        control.interface_index = Some(info.ipi_ifindex as u32);
                    }
                }
                libc::IP_TTL => {
                    let ttl = unsafe { std::ptr::read_unaligned(data as *const libc::c_int) };
                    control.ttl = u8::try_from(ttl).ok();
                }
                _ => {}
            }
        }
        cmsg = unsafe { libc::CMSG_NXTHDR(&msg, cmsg) };
    }

    let source = if msg.msg_namelen as usize >= std::mem::size_of::<libc::sockaddr_in>()
        && source.sin_family == libc::AF_INET as libc::sa_family_t
    {
        Some(SocketAddrV4::new(
            Ipv4Addr::from(u32::from_be(source.sin_addr.s_addr)),
            u16::from_be(source.sin_port),
        ))
    } else {
        None
    };

    Ok(RecvResult {
        len: n as usize,
        source,
        control,
    })
}

/// Convert interface index to interface name
pub fn interface_name_from_index(index: u32) -> Option<String> {
    if index == 0 {
        return None;
    }
    let mut buf = [0u8; libc::IF_NAMESIZE];
    let result = unsafe { libc::if_indextoname(index, buf.as_mut_ptr() as *mut libc::c_char) };
    if result.is_null() {
        None
    } else {
        let name = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr() as *const libc::c_char) };
        name.to_str().ok().map(|s| s.to_string())
    }
}
