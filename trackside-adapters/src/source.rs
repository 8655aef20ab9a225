//! Raw telemetry sources
//!
//! The two ways simulators expose data: a named shared-memory block and a
//! connectionless UDP stream. Adapters own their vendor struct layouts;
//! this module only hands them bytes and decodes them best-effort.

use std::io;
use std::net::UdpSocket;
use tracing::debug;

/// Marker for plain-old-data structs that may be decoded from raw bytes.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` and valid for any bit pattern
/// (numeric fields and fixed arrays only, no references or padding-borne
/// invariants).
pub unsafe trait Pod: Copy + Sized {}

/// Decode a struct from a byte buffer, best effort.
///
/// Starts from an all-zero value and copies `min(bytes.len(), size_of::<T>())`
/// bytes, so a region shorter than the expected layout yields a partially
/// filled, zero-tailed struct instead of a failure. Callers treat all-zero
/// telemetry as "not yet available".
pub fn read_struct_prefix<T: Pod>(bytes: &[u8]) -> T {
    let mut value = std::mem::MaybeUninit::<T>::zeroed();
    let len = bytes.len().min(std::mem::size_of::<T>());
    // Zeroed is a valid bit pattern for Pod types and the copy stays in
    // bounds of both buffers.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), value.as_mut_ptr() as *mut u8, len);
        value.assume_init()
    }
}

/// Read-only view of a named shared-memory block.
///
/// On Windows this maps the vendor's block; elsewhere `connect` always
/// returns `None` and adapters report no telemetry.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub struct SharedMemoryView {
    #[cfg(target_os = "windows")]
    inner: windows_impl::MappedView,
    #[cfg(not(target_os = "windows"))]
    inner: (),
    len: usize,
}

impl SharedMemoryView {
    /// Open an existing mapping by name, e.g. `Local\\acpmf_physics`.
    ///
    /// `None` when the simulator has not created the block (not running,
    /// or not yet in a session).
    #[cfg(target_os = "windows")]
    pub fn connect(name: &str, len: usize) -> Option<Self> {
        windows_impl::MappedView::open(name, len).map(|inner| Self { inner, len })
    }

    #[cfg(not(target_os = "windows"))]
    pub fn connect(_name: &str, _len: usize) -> Option<Self> {
        None
    }

    /// The mapped bytes; length as requested at connect time
    pub fn bytes(&self) -> &[u8] {
        #[cfg(target_os = "windows")]
        {
            self.inner.bytes(self.len)
        }
        #[cfg(not(target_os = "windows"))]
        {
            let _ = self.len;
            &[]
        }
    }

    /// Decode the block's current content
    pub fn read<T: Pod>(&self) -> T {
        read_struct_prefix(self.bytes())
    }
}

#[cfg(target_os = "windows")]
mod windows_impl {
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Memory::{
        MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, FILE_MAP_READ,
        MEMORY_MAPPED_VIEW_ADDRESS,
    };

    pub struct MappedView {
        handle: HANDLE,
        ptr: *const u8,
    }

    // The view is read-only and the pointer never leaves this struct.
    unsafe impl Send for MappedView {}

    impl MappedView {
        pub fn open(name: &str, len: usize) -> Option<Self> {
            let wide_name: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
            unsafe {
                let handle =
                    OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR(wide_name.as_ptr())).ok()?;
                if handle.is_invalid() {
                    return None;
                }

                let ptr = MapViewOfFile(handle, FILE_MAP_READ, 0, 0, len).Value as *const u8;
                if ptr.is_null() {
                    let _ = CloseHandle(handle);
                    return None;
                }
                Some(Self { handle, ptr })
            }
        }

        pub fn bytes(&self, len: usize) -> &[u8] {
            unsafe { std::slice::from_raw_parts(self.ptr, len) }
        }
    }

    impl Drop for MappedView {
        fn drop(&mut self) {
            unsafe {
                if !self.ptr.is_null() {
                    let _ = UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS {
                        Value: self.ptr as *mut core::ffi::c_void,
                    });
                }
                let _ = CloseHandle(self.handle);
            }
        }
    }
}

/// Connectionless UDP telemetry source
///
/// The socket is non-blocking: `recv_latest` drains whatever arrived since
/// the previous poll and returns the newest datagram, so the poll loop
/// never stalls on the network.
pub struct UdpSource {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpSource {
    pub fn bind(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            buf: vec![0u8; 2048],
        })
    }

    /// Newest pending datagram, or `None` when nothing arrived
    pub fn recv_latest(&mut self) -> Option<Vec<u8>> {
        let mut latest = None;
        loop {
            match self.socket.recv(&mut self.buf) {
                Ok(n) => latest = Some(self.buf[..n].to_vec()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!(error = %e, "udp receive failed, dropping frame");
                    break;
                }
            }
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    #[repr(C)]
    struct Sample {
        a: i32,
        b: f32,
        c: [f32; 2],
    }

    unsafe impl Pod for Sample {}

    #[test]
    fn test_full_buffer_decodes_all_fields() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&7i32.to_le_bytes());
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&2.5f32.to_le_bytes());
        bytes.extend_from_slice(&3.5f32.to_le_bytes());

        let sample: Sample = read_struct_prefix(&bytes);
        assert_eq!(sample.a, 7);
        assert_eq!(sample.b, 1.5);
        assert_eq!(sample.c, [2.5, 3.5]);
    }

    #[test]
    fn test_short_buffer_zero_fills_the_tail() {
        let bytes = 7i32.to_le_bytes();
        let sample: Sample = read_struct_prefix(&bytes);
        assert_eq!(sample.a, 7);
        assert_eq!(sample.b, 0.0);
        assert_eq!(sample.c, [0.0, 0.0]);
    }

    #[test]
    fn test_empty_buffer_decodes_to_zeroed_struct() {
        let sample: Sample = read_struct_prefix(&[]);
        assert_eq!(sample, Sample { a: 0, b: 0.0, c: [0.0, 0.0] });
    }

    #[test]
    fn test_oversized_buffer_ignores_the_excess() {
        let mut bytes = vec![0u8; std::mem::size_of::<Sample>() + 32];
        bytes[..4].copy_from_slice(&9i32.to_le_bytes());
        let sample: Sample = read_struct_prefix(&bytes);
        assert_eq!(sample.a, 9);
    }

    #[test]
    fn test_udp_source_returns_newest_datagram() {
        let mut source = UdpSource::bind(0).expect("bind");
        let local = source.socket.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"old", local).unwrap();
        sender.send_to(b"new", local).unwrap();

        // Give the loopback a moment to deliver both
        std::thread::sleep(std::time::Duration::from_millis(50));

        assert_eq!(source.recv_latest().as_deref(), Some(&b"new"[..]));
        assert_eq!(source.recv_latest(), None);
    }
}
