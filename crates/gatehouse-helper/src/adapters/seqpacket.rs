//! # Unix Seqpacket Transport
//!
//! Record-oriented Unix-domain transport: one `serde_json` frame per
//! datagram, with out-of-band descriptors riding in `SCM_RIGHTS` control
//! messages on the reply. Peer credentials come from the socket itself
//! (`SO_PEERCRED` on Linux, `getpeereid` elsewhere), not from anything the
//! peer claims in a frame.

use std::io;
use std::io::IoSlice;
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;

use async_trait::async_trait;
use libc::c_uint;
use serde::de::DeserializeOwned;
use serde::Serialize;
use socket2::{Domain, MaybeUninitSlice, MsgHdr, MsgHdrMut, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::debug;

use gatehouse_protocol::{
    CallerCredentials, OutHandle, ReplyEnvelope, ReplyFrame, RequestFrame, TransportError,
    MAX_FRAME_BYTES, MAX_HANDLES_PER_MESSAGE,
};

use crate::ports::transport::{HelperConnection, HelperListener};
use gatehouse_client::ClientTransport;

fn control_space_for_fds(count: usize) -> usize {
    unsafe { libc::CMSG_SPACE((count * size_of::<RawFd>()) as _) as usize }
}

fn assume_init(buf: &[MaybeUninit<u8>]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(buf.as_ptr().cast(), buf.len()) }
}

fn extract_fds(control: &mut [MaybeUninit<u8>], len: usize) -> Vec<OwnedFd> {
    if len == 0 {
        return Vec::new();
    }
    let mut fds = Vec::new();
    let mut hdr: libc::msghdr = unsafe { std::mem::zeroed() };
    hdr.msg_control = control.as_mut_ptr().cast();
    hdr.msg_controllen = len as _;

    let mut cmsg = unsafe { libc::CMSG_FIRSTHDR(&hdr) };
    while !cmsg.is_null() {
        let level = unsafe { (*cmsg).cmsg_level };
        let ty = unsafe { (*cmsg).cmsg_type };
        if level == libc::SOL_SOCKET && ty == libc::SCM_RIGHTS {
            let data_ptr = unsafe { libc::CMSG_DATA(cmsg).cast::<RawFd>() };
            let data_len =
                unsafe { (*cmsg).cmsg_len as usize } - unsafe { libc::CMSG_LEN(0) as usize };
            for i in 0..data_len / size_of::<RawFd>() {
                let fd = unsafe { data_ptr.add(i).read() };
                fds.push(unsafe { OwnedFd::from_raw_fd(fd) });
            }
        }
        cmsg = unsafe { libc::CMSG_NXTHDR(&hdr, cmsg) };
    }
    fds
}

fn send_frame_bytes(socket: &Socket, data: &[u8], fds: &[OwnedFd]) -> io::Result<()> {
    let mut control = vec![0u8; control_space_for_fds(fds.len())];
    if !fds.is_empty() {
        unsafe {
            let cmsg = control.as_mut_ptr().cast::<libc::cmsghdr>();
            (*cmsg).cmsg_len =
                libc::CMSG_LEN(size_of::<RawFd>() as c_uint * fds.len() as c_uint) as _;
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            let data_ptr = libc::CMSG_DATA(cmsg).cast::<RawFd>();
            for (i, fd) in fds.iter().enumerate() {
                data_ptr.add(i).write(fd.as_raw_fd());
            }
        }
    }

    let payload = [IoSlice::new(data)];
    let mut msg = MsgHdr::new().with_buffers(&payload);
    if !fds.is_empty() {
        msg = msg.with_control(&control);
    }
    socket.sendmsg(&msg, 0)?;
    Ok(())
}

/// One received record: the frame bytes plus any descriptors that rode
/// along. Empty data means the peer closed the connection.
fn receive_record(socket: &Socket) -> io::Result<(Vec<u8>, Vec<OwnedFd>)> {
    let mut data = vec![MaybeUninit::<u8>::uninit(); MAX_FRAME_BYTES];
    let mut control =
        vec![MaybeUninit::<u8>::uninit(); control_space_for_fds(MAX_HANDLES_PER_MESSAGE)];
    let (received, control_len) = {
        let mut bufs = [MaybeUninitSlice::new(&mut data)];
        let mut msg = MsgHdrMut::new()
            .with_buffers(&mut bufs)
            .with_control(&mut control);
        let received = socket.recvmsg(&mut msg, 0)?;
        (received, msg.control_len())
    };
    let bytes = assume_init(&data[..received]).to_vec();
    Ok((bytes, extract_fds(&mut control, control_len)))
}

/// Nonblocking seqpacket socket driven through the tokio reactor.
struct AsyncSocket {
    inner: AsyncFd<Socket>,
}

impl AsyncSocket {
    fn new(socket: Socket) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self {
            inner: AsyncFd::new(socket)?,
        })
    }

    async fn send_frame<T: Serialize>(&self, frame: &T, fds: &[OwnedFd]) -> Result<(), TransportError> {
        let data = serde_json::to_vec(frame)
            .map_err(|err| TransportError::Encoding(err.to_string()))?;
        if data.len() > MAX_FRAME_BYTES {
            return Err(TransportError::FrameTooLarge { len: data.len() });
        }
        self.inner
            .async_io(Interest::WRITABLE, |socket| {
                send_frame_bytes(socket, &data, fds)
            })
            .await?;
        Ok(())
    }

    /// `Ok(None)` on clean shutdown.
    async fn receive_frame<T: DeserializeOwned>(
        &self,
    ) -> Result<Option<(T, Vec<OwnedFd>)>, TransportError> {
        let (bytes, fds) = self
            .inner
            .async_io(Interest::READABLE, receive_record)
            .await?;
        if bytes.is_empty() && fds.is_empty() {
            return Ok(None);
        }
        let frame =
            serde_json::from_slice(&bytes).map_err(|err| TransportError::Encoding(err.to_string()))?;
        Ok(Some((frame, fds)))
    }
}

#[cfg(target_os = "linux")]
fn socket_peer_credentials(socket: &Socket) -> io::Result<CallerCredentials> {
    let mut ucred = libc::ucred {
        pid: 0,
        uid: 0,
        gid: 0,
    };
    let mut len = size_of::<libc::ucred>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            std::ptr::addr_of_mut!(ucred).cast(),
            &mut len,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    let session_id = unsafe { libc::getsid(ucred.pid) };
    Ok(CallerCredentials {
        pid: ucred.pid,
        uid: ucred.uid,
        gid: ucred.gid,
        session_id,
    })
}

#[cfg(not(target_os = "linux"))]
fn socket_peer_credentials(socket: &Socket) -> io::Result<CallerCredentials> {
    // No portable way to learn the peer pid; uid/gid are enough for the
    // identity verifier to refuse, never to over-trust.
    let mut uid: libc::uid_t = 0;
    let mut gid: libc::gid_t = 0;
    let rc = unsafe { libc::getpeereid(socket.as_raw_fd(), &mut uid, &mut gid) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(CallerCredentials {
        pid: 0,
        uid,
        gid,
        session_id: 0,
    })
}

/// Helper side of one accepted seqpacket connection.
pub struct SeqpacketConnection {
    socket: AsyncSocket,
    credentials: CallerCredentials,
}

#[async_trait]
impl HelperConnection for SeqpacketConnection {
    fn peer_credentials(&self) -> CallerCredentials {
        self.credentials
    }

    async fn next_request(&mut self) -> Result<Option<RequestFrame>, TransportError> {
        // Inbound descriptors are not part of the protocol; dropping them
        // here closes them.
        Ok(self
            .socket
            .receive_frame::<RequestFrame>()
            .await?
            .map(|(frame, _fds)| frame))
    }

    async fn send_reply(&mut self, reply: ReplyEnvelope) -> Result<(), TransportError> {
        let (frame, handles) = reply.into_frame();
        let mut fds = Vec::with_capacity(handles.len());
        for handle in handles {
            let fd = handle.into_fd().ok_or_else(|| {
                TransportError::Protocol("reply handle is not a file descriptor".into())
            })?;
            fds.push(fd);
        }
        self.socket.send_frame(&frame, &fds).await
    }
}

/// Listening seqpacket endpoint bound to a filesystem path.
pub struct SeqpacketListener {
    inner: AsyncFd<Socket>,
}

impl SeqpacketListener {
    /// Bind and listen on `path`. The path must not already exist.
    pub fn bind(path: &Path) -> io::Result<Self> {
        let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None)?;
        socket.bind(&SockAddr::unix(path)?)?;
        socket.listen(16)?;
        socket.set_nonblocking(true)?;
        debug!(path = %path.display(), "seqpacket listener bound");
        Ok(Self {
            inner: AsyncFd::new(socket)?,
        })
    }
}

#[async_trait]
impl HelperListener for SeqpacketListener {
    async fn accept(&mut self) -> Result<Option<Box<dyn HelperConnection>>, TransportError> {
        let (socket, _addr) = self
            .inner
            .async_io(Interest::READABLE, |socket| socket.accept())
            .await?;
        let credentials = socket_peer_credentials(&socket)?;
        let connection = SeqpacketConnection {
            socket: AsyncSocket::new(socket)?,
            credentials,
        };
        Ok(Some(Box::new(connection)))
    }
}

/// Client side of a seqpacket connection.
pub struct SeqpacketClient {
    socket: AsyncSocket,
}

impl SeqpacketClient {
    /// Connect to the helper listening at `path`.
    pub fn connect(path: &Path) -> io::Result<Self> {
        let socket = Socket::new(Domain::UNIX, Type::SEQPACKET, None)?;
        socket.connect(&SockAddr::unix(path)?)?;
        Ok(Self {
            socket: AsyncSocket::new(socket)?,
        })
    }
}

#[async_trait]
impl ClientTransport for SeqpacketClient {
    async fn roundtrip(&mut self, frame: RequestFrame) -> Result<ReplyEnvelope, TransportError> {
        self.socket.send_frame(&frame, &[]).await?;
        let (reply, fds) = self
            .socket
            .receive_frame::<ReplyFrame>()
            .await?
            .ok_or(TransportError::Closed)?;
        if fds.len() != reply.handle_count as usize {
            return Err(TransportError::Protocol(format!(
                "expected {} descriptors, received {}",
                reply.handle_count,
                fds.len()
            )));
        }
        let handles = fds.into_iter().map(OutHandle::from_fd).collect();
        Ok(ReplyEnvelope::from_frame(reply, handles))
    }
}

/// A connected helper/client pair over an anonymous socketpair. The helper
/// side sees this process's own credentials.
pub fn seqpacket_pair() -> io::Result<(SeqpacketConnection, SeqpacketClient)> {
    let (server, client) = Socket::pair(Domain::UNIX, Type::SEQPACKET, None)?;
    let credentials = CallerCredentials {
        pid: std::process::id() as i32,
        uid: unsafe { libc::getuid() },
        gid: unsafe { libc::getgid() },
        session_id: unsafe { libc::getsid(0) },
    };
    Ok((
        SeqpacketConnection {
            socket: AsyncSocket::new(server)?,
            credentials,
        },
        SeqpacketClient {
            socket: AsyncSocket::new(client)?,
        },
    ))
}
