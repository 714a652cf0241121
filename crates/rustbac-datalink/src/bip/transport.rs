use crate::bip::bvlc::{BvlcFunction, BvlcHeader};
use crate::{DataLink, DataLinkAddress, DataLinkError};
use rustbac_core::encoding::{reader::Reader, writer::Writer};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration, Instant};

const MAX_BIP_FRAME_LEN: usize = 1600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastDistributionEntry {
    pub address: SocketAddrV4,
    pub mask: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignDeviceTableEntry {
    pub address: SocketAddrV4,
    pub ttl_seconds: u16,
    pub remaining_seconds: u16,
}

#[derive(Debug, Clone)]
pub struct BacnetIpTransport {
    socket: Arc<UdpSocket>,
    bbmd: Option<SocketAddr>,
    bbmd_command_lock: Arc<Mutex<()>>,
}

impl BacnetIpTransport {
    pub async fn bind(bind_addr: SocketAddr) -> Result<Self, DataLinkError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.set_broadcast(true)?;
        Ok(Self {
            socket: Arc::new(socket),
            bbmd: None,
            bbmd_command_lock: Arc::new(Mutex::new(())),
        })
    }

    pub async fn bind_foreign(
        bind_addr: SocketAddr,
        bbmd_addr: SocketAddr,
    ) -> Result<Self, DataLinkError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.set_broadcast(true)?;
        Ok(Self {
            socket: Arc::new(socket),
            bbmd: Some(bbmd_addr),
            bbmd_command_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DataLinkError> {
        self.socket.local_addr().map_err(DataLinkError::Io)
    }

    pub fn bbmd_addr(&self) -> Option<SocketAddr> {
        self.bbmd
    }

    fn require_bbmd(&self) -> Result<SocketAddr, DataLinkError> {
        self.bbmd.ok_or(DataLinkError::BbmdNotConfigured)
    }

    fn parse_bvlc_result(payload: &[u8]) -> Result<(), DataLinkError> {
        if payload.len() < 2 {
            return Err(DataLinkError::InvalidFrame);
        }
        let code = u16::from_be_bytes([payload[0], payload[1]]);
        if code == 0 {
            Ok(())
        } else {
            Err(DataLinkError::BvlcResult(code))
        }
    }

    async fn send_bvlc_to_bbmd(
        &self,
        function: BvlcFunction,
        payload: &[u8],
    ) -> Result<(), DataLinkError> {
        let bbmd = self.bbmd.ok_or(DataLinkError::BbmdNotConfigured)?;
        let total_len = 4usize
            .checked_add(payload.len())
            .ok_or(DataLinkError::FrameTooLarge)?;
        if total_len > usize::from(u16::MAX) {
            return Err(DataLinkError::FrameTooLarge);
        }

        let mut frame = vec![0u8; total_len];
        let mut w = Writer::new(&mut frame);
        BvlcHeader {
            function,
            length: total_len as u16,
        }
        .encode(&mut w)
        .map_err(|_| DataLinkError::InvalidFrame)?;
        w.write_all(payload)
            .map_err(|_| DataLinkError::InvalidFrame)?;

        self.socket.send_to(w.as_written(), bbmd).await?;
        Ok(())
    }

    async fn recv_bvlc_reply(
        &self,
        expected: BvlcFunction,
        timeout_duration: Duration,
    ) -> Result<Vec<u8>, DataLinkError> {
        let bbmd = self.require_bbmd()?;
        let deadline = Instant::now() + timeout_duration;
        let mut rx = [0u8; 1600];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DataLinkError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "bbmd response timeout",
                )));
            }

            let (n, src) = timeout(remaining, self.socket.recv_from(&mut rx))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "bbmd response timeout"))?
                .map_err(DataLinkError::Io)?;
            if src != bbmd {
                continue;
            }

            let mut r = Reader::new(&rx[..n]);
            let hdr = BvlcHeader::decode(&mut r).map_err(|_| DataLinkError::InvalidFrame)?;
            let payload = r
                .read_exact(hdr.length as usize - 4)
                .map_err(|_| DataLinkError::InvalidFrame)?;

            if hdr.function == expected {
                return Ok(payload.to_vec());
            }

            if hdr.function == BvlcFunction::Result {
                Self::parse_bvlc_result(payload)?;
                if expected == BvlcFunction::Result {
                    return Ok(payload.to_vec());
                }
                return Err(DataLinkError::InvalidFrame);
            }
        }
    }

    pub async fn register_foreign_device_no_wait(
        &self,
        ttl_seconds: u16,
    ) -> Result<(), DataLinkError> {
        let _guard = self.bbmd_command_lock.lock().await;
        let payload = ttl_seconds.to_be_bytes();
        self.send_bvlc_to_bbmd(BvlcFunction::RegisterForeignDevice, &payload)
            .await
    }

    pub async fn register_foreign_device(&self, ttl_seconds: u16) -> Result<(), DataLinkError> {
        let _guard = self.bbmd_command_lock.lock().await;
        let payload = ttl_seconds.to_be_bytes();
        self.send_bvlc_to_bbmd(BvlcFunction::RegisterForeignDevice, &payload)
            .await?;
        let payload = self
            .recv_bvlc_reply(BvlcFunction::Result, Duration::from_secs(2))
            .await?;
        Self::parse_bvlc_result(&payload)
    }

    pub async fn read_broadcast_distribution_table(
        &self,
    ) -> Result<Vec<BroadcastDistributionEntry>, DataLinkError> {
        let _guard = self.bbmd_command_lock.lock().await;
        self.send_bvlc_to_bbmd(BvlcFunction::ReadBroadcastDistributionTable, &[])
            .await?;
        let payload = self
            .recv_bvlc_reply(
                BvlcFunction::ReadBroadcastDistributionTableAck,
                Duration::from_secs(2),
            )
            .await?;
        if payload.len() % 10 != 0 {
            return Err(DataLinkError::InvalidFrame);
        }

        let mut out = Vec::with_capacity(payload.len() / 10);
        for chunk in payload.chunks_exact(10) {
            out.push(BroadcastDistributionEntry {
                address: SocketAddrV4::new(
                    Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]),
                    u16::from_be_bytes([chunk[4], chunk[5]]),
                ),
                mask: Ipv4Addr::new(chunk[6], chunk[7], chunk[8], chunk[9]),
            });
        }
        Ok(out)
    }

    pub async fn write_broadcast_distribution_table(
        &self,
        entries: &[BroadcastDistributionEntry],
    ) -> Result<(), DataLinkError> {
        let _guard = self.bbmd_command_lock.lock().await;
        let mut payload = Vec::with_capacity(entries.len() * 10);
        for entry in entries {
            payload.extend_from_slice(&entry.address.ip().octets());
            payload.extend_from_slice(&entry.address.port().to_be_bytes());
            payload.extend_from_slice(&entry.mask.octets());
        }

        self.send_bvlc_to_bbmd(BvlcFunction::WriteBroadcastDistributionTable, &payload)
            .await?;
        let payload = self
            .recv_bvlc_reply(BvlcFunction::Result, Duration::from_secs(2))
            .await?;
        Self::parse_bvlc_result(&payload)
    }

    pub async fn read_foreign_device_table(
        &self,
    ) -> Result<Vec<ForeignDeviceTableEntry>, DataLinkError> {
        let _guard = self.bbmd_command_lock.lock().await;
        self.send_bvlc_to_bbmd(BvlcFunction::ReadForeignDeviceTable, &[])
            .await?;
        let payload = self
            .recv_bvlc_reply(
                BvlcFunction::ReadForeignDeviceTableAck,
                Duration::from_secs(2),
            )
            .await?;
        if payload.len() % 10 != 0 {
            return Err(DataLinkError::InvalidFrame);
        }

        let mut out = Vec::with_capacity(payload.len() / 10);
        for chunk in payload.chunks_exact(10) {
            out.push(ForeignDeviceTableEntry {
                address: SocketAddrV4::new(
                    Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]),
                    u16::from_be_bytes([chunk[4], chunk[5]]),
                ),
                ttl_seconds: u16::from_be_bytes([chunk[6], chunk[7]]),
                remaining_seconds: u16::from_be_bytes([chunk[8], chunk[9]]),
            });
        }
        Ok(out)
    }

    pub async fn delete_foreign_device_table_entry(
        &self,
        address: SocketAddrV4,
    ) -> Result<(), DataLinkError> {
        let _guard = self.bbmd_command_lock.lock().await;
        let mut payload = [0u8; 6];
        payload[..4].copy_from_slice(&address.ip().octets());
        payload[4..].copy_from_slice(&address.port().to_be_bytes());
        self.send_bvlc_to_bbmd(BvlcFunction::DeleteForeignDeviceTableEntry, &payload)
            .await?;
        let payload = self
            .recv_bvlc_reply(BvlcFunction::Result, Duration::from_secs(2))
            .await?;
        Self::parse_bvlc_result(&payload)
    }
}

impl DataLink for BacnetIpTransport {
    async fn send(&self, address: DataLinkAddress, payload: &[u8]) -> Result<(), DataLinkError> {
        let addr = address.as_socket_addr();
        let is_broadcast = matches!(addr.ip(), IpAddr::V4(v4) if v4.is_broadcast());

        let (function, target_addr) = if is_broadcast {
            if let Some(bbmd) = self.bbmd {
                (BvlcFunction::DistributeBroadcastToNetwork, bbmd)
            } else {
                (BvlcFunction::OriginalBroadcastNpdu, addr)
            }
        } else {
            (BvlcFunction::OriginalUnicastNpdu, addr)
        };

        let mut frame = [0u8; MAX_BIP_FRAME_LEN];
        let total_len = 4usize
            .checked_add(payload.len())
            .ok_or(DataLinkError::FrameTooLarge)?;
        if total_len > frame.len() {
            return Err(DataLinkError::FrameTooLarge);
        }

        let mut w = Writer::new(&mut frame);
        BvlcHeader {
            function,
            length: total_len as u16,
        }
        .encode(&mut w)
        .map_err(|_| DataLinkError::InvalidFrame)?;
        w.write_all(payload)
            .map_err(|_| DataLinkError::FrameTooLarge)?;

        self.socket.send_to(w.as_written(), target_addr).await?;
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, DataLinkAddress), DataLinkError> {
        let mut frame = [0u8; MAX_BIP_FRAME_LEN];
        let (n, src) = self.socket.recv_from(&mut frame).await?;
        let mut r = Reader::new(&frame[..n]);
        let hdr = BvlcHeader::decode(&mut r).map_err(|_| DataLinkError::InvalidFrame)?;

        match hdr.function {
            BvlcFunction::OriginalUnicastNpdu
            | BvlcFunction::OriginalBroadcastNpdu
            | BvlcFunction::DistributeBroadcastToNetwork => {
                let payload_len = hdr.length as usize - 4;
                let payload = r
                    .read_exact(payload_len)
                    .map_err(|_| DataLinkError::InvalidFrame)?;
                if payload.len() > buf.len() {
                    return Err(DataLinkError::FrameTooLarge);
                }
                buf[..payload.len()].copy_from_slice(payload);
                Ok((payload.len(), DataLinkAddress::Ip(src)))
            }
            BvlcFunction::ForwardedNpdu => {
                let forwarded = r
                    .read_exact(hdr.length as usize - 4)
                    .map_err(|_| DataLinkError::InvalidFrame)?;
                if forwarded.len() < 6 {
                    return Err(DataLinkError::InvalidFrame);
                }
                let origin_ip =
                    Ipv4Addr::new(forwarded[0], forwarded[1], forwarded[2], forwarded[3]);
                let origin_port = u16::from_be_bytes([forwarded[4], forwarded[5]]);
                let payload = &forwarded[6..];
                if payload.len() > buf.len() {
                    return Err(DataLinkError::FrameTooLarge);
                }
                buf[..payload.len()].copy_from_slice(payload);
                Ok((
                    payload.len(),
                    DataLinkAddress::Ip(SocketAddr::new(IpAddr::V4(origin_ip), origin_port)),
                ))
            }
            BvlcFunction::Unknown(v) => Err(DataLinkError::UnsupportedBvlcFunction(v)),
            _ => Err(DataLinkError::InvalidFrame),
        }
    }
}
