// Wed Jan 15 2026 - Alex

use crate::memory::Address;
use std::io;

/// Copies `buf.len()` bytes out of `pid` at `addr`. Returns the number of
/// bytes moved, which is short when the range runs into an unmapped or
/// unreadable page.
pub fn read(pid: u32, addr: Address, buf: &mut [u8]) -> io::Result<usize> {
    let local = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };
    let remote = libc::iovec {
        iov_base: addr.as_usize() as *mut libc::c_void,
        iov_len: buf.len(),
    };
    let moved = unsafe { libc::process_vm_readv(pid as libc::pid_t, &local, 1, &remote, 1, 0) };
    if moved < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(moved as usize)
}

/// Copies `data` into `pid` at `addr`. Page protection is honoured, so
/// read-only pages fail with `EFAULT`.
pub fn write(pid: u32, addr: Address, data: &[u8]) -> io::Result<usize> {
    let local = libc::iovec {
        iov_base: data.as_ptr() as *mut libc::c_void,
        iov_len: data.len(),
    };
    let remote = libc::iovec {
        iov_base: addr.as_usize() as *mut libc::c_void,
        iov_len: data.len(),
    };
    let moved = unsafe { libc::process_vm_writev(pid as libc::pid_t, &local, 1, &remote, 1, 0) };
    if moved < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(moved as usize)
}

/// The syscalls are missing or filtered (old kernel, seccomp).
pub fn unavailable(error: &io::Error) -> bool {
    matches!(error.raw_os_error(), Some(libc::ENOSYS) | Some(libc::EPERM))
}
