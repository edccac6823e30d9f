// Wed Jan 15 2026 - Alex

use crate::memory::maps::{modules_from_maps, read_maps};
use crate::memory::vm;
use crate::memory::{AccessKind, Address, AddressWidth, MemoryError, ModuleInfo, ProcessAccess, Protection};
use goblin::elf::header::{ELFCLASS32, EI_CLASS};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

/// Another process on this machine, reached through `process_vm_readv`
/// and `process_vm_writev`. Needs ptrace rights over the target.
pub struct RemoteProcess {
    pid: u32,
    width: AddressWidth,
}

impl RemoteProcess {
    pub fn open(pid: u32) -> Result<Self, MemoryError> {
        if !fs::metadata(format!("/proc/{}", pid)).map(|m| m.is_dir()).unwrap_or(false) {
            return Err(MemoryError::ProcessNotFound(pid.to_string()));
        }
        let width = detect_width(pid).unwrap_or_else(|e| {
            log::warn!("Could not read ELF class of pid {}: {}, assuming native width", pid, e);
            AddressWidth::native()
        });
        log::debug!("Opened pid {} ({})", pid, width);
        Ok(Self { pid, width })
    }

    pub fn open_by_name(name: &str) -> Result<Self, MemoryError> {
        let pid = find_pid_by_name(name)?.ok_or_else(|| MemoryError::ProcessNotFound(name.to_string()))?;
        Self::open(pid)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn write_through_mem_file(&self, addr: Address, data: &[u8]) -> Result<usize, MemoryError> {
        let mut file = OpenOptions::new().write(true).open(format!("/proc/{}/mem", self.pid))?;
        file.seek(SeekFrom::Start(addr.as_u64()))?;
        file.write_all(data)?;
        Ok(data.len())
    }

    fn read_through_mem_file(&self, addr: Address, buf: &mut [u8]) -> Result<(), MemoryError> {
        let mut file = OpenOptions::new().read(true).open(format!("/proc/{}/mem", self.pid))?;
        file.seek(SeekFrom::Start(addr.as_u64()))?;
        file.read_exact(buf)?;
        Ok(())
    }
}

impl ProcessAccess for RemoteProcess {
    fn kind(&self) -> AccessKind {
        AccessKind::Remote
    }

    fn address_width(&self) -> AddressWidth {
        self.width
    }

    fn read_into(&self, addr: Address, buf: &mut [u8]) -> Result<(), MemoryError> {
        if buf.is_empty() {
            return Ok(());
        }
        if matches!(vm::read(self.pid, addr, buf), Ok(read) if read == buf.len()) {
            return Ok(());
        }
        // Partial read; /proc/<pid>/mem also covers PROT_NONE-to-vm pages.
        self.read_through_mem_file(addr, buf)
            .map_err(|_| MemoryError::AccessViolation(addr.as_u64()))
    }

    fn write_bytes(&self, addr: Address, data: &[u8]) -> Result<usize, MemoryError> {
        if data.is_empty() {
            return Ok(0);
        }
        if matches!(vm::write(self.pid, addr, data), Ok(written) if written == data.len()) {
            return Ok(data.len());
        }
        // Read-only pages (code) reject vm writes but accept /proc/<pid>/mem.
        self.write_through_mem_file(addr, data)
            .map_err(|_| MemoryError::WriteFailed(addr.as_u64()))
    }

    fn allocate(&self, size: usize, _protection: Protection) -> Result<Address, MemoryError> {
        log::warn!("Remote allocation in pid {} needs an in-process agent", self.pid);
        Err(MemoryError::AllocationFailure(size))
    }

    fn free(&self, _addr: Address, _size: usize) -> Result<(), MemoryError> {
        Err(MemoryError::NotSupported("remote free".to_string()))
    }

    fn protect(&self, _addr: Address, _size: usize, _protection: Protection) -> Result<Protection, MemoryError> {
        Err(MemoryError::NotSupported("remote protect".to_string()))
    }

    fn enumerate_modules(&self) -> Result<Vec<ModuleInfo>, MemoryError> {
        Ok(modules_from_maps(&read_maps(Some(self.pid))?))
    }
}

/// Reads `EI_CLASS` from the target's executable.
fn detect_width(pid: u32) -> Result<AddressWidth, MemoryError> {
    let mut header = [0u8; 64];
    let mut file = fs::File::open(format!("/proc/{}/exe", pid))?;
    file.read_exact(&mut header)?;
    let parsed = goblin::elf::Elf::parse_header(&header)
        .map_err(|e| MemoryError::NotSupported(format!("not an ELF image: {}", e)))?;
    Ok(if parsed.e_ident[EI_CLASS] == ELFCLASS32 {
        AddressWidth::Bits32
    } else {
        AddressWidth::Bits64
    })
}

/// First pid whose `comm` equals `name`, ignoring case.
pub fn find_pid_by_name(name: &str) -> Result<Option<u32>, MemoryError> {
    let wanted = name.to_lowercase();
    let mut pids: Vec<u32> = fs::read_dir("/proc")?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().and_then(|s| s.parse().ok()))
        .collect();
    pids.sort_unstable();

    for pid in pids {
        let Ok(comm) = fs::read_to_string(format!("/proc/{}/comm", pid)) else {
            continue;
        };
        if comm.trim().to_lowercase() == wanted {
            return Ok(Some(pid));
        }
    }
    Ok(None)
}
