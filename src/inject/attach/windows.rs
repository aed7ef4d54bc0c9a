//! Windows attach.
//!
//! Node publishes the address of its debug signal handler in a named file
//! mapping `node-debug-handler-<pid>`. Starting a remote thread at that
//! address makes the target open its inspector.

use super::AttachError;
use std::ffi::c_void;
use std::io;
use std::thread;
use std::time::Duration;
use windows::Win32::Foundation::{CloseHandle, FALSE, HANDLE};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
};
use windows::Win32::System::Threading::{
    CreateRemoteThread, LPTHREAD_START_ROUTINE, OpenProcess, PROCESS_CREATE_THREAD,
    PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION, PROCESS_VM_READ, PROCESS_VM_WRITE,
};
use windows::core::HSTRING;

/// Closes the wrapped handle on drop.
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// Unmaps the wrapped view on drop.
struct MappedView(MEMORY_MAPPED_VIEW_ADDRESS);

impl Drop for MappedView {
    fn drop(&mut self) {
        unsafe {
            let _ = UnmapViewOfFile(self.0);
        }
    }
}

pub fn attach(pid: u32, warmup: Duration) -> Result<(), AttachError> {
    let access = PROCESS_CREATE_THREAD
        | PROCESS_QUERY_INFORMATION
        | PROCESS_VM_OPERATION
        | PROCESS_VM_WRITE
        | PROCESS_VM_READ;
    let process = unsafe { OpenProcess(access, FALSE, pid) }
        .map(OwnedHandle)
        .map_err(|e| AttachError::OpenProcess {
            pid,
            source: io::Error::other(e),
        })?;

    thread::sleep(warmup);

    let name = HSTRING::from(format!("node-debug-handler-{pid}"));
    let mapping = unsafe { OpenFileMappingW(FILE_MAP_READ.0, FALSE, &name) }
        .map(OwnedHandle)
        .map_err(|e| AttachError::SignalChannelMissing {
            pid,
            source: io::Error::other(e),
        })?;

    let view = unsafe { MapViewOfFile(mapping.0, FILE_MAP_READ, 0, 0, size_of::<usize>()) };
    if view.Value.is_null() {
        return Err(AttachError::SignalChannelMissing {
            pid,
            source: io::Error::last_os_error(),
        });
    }
    let view = MappedView(view);

    let entry = unsafe { std::ptr::read_unaligned(view.0.Value as *const usize) };
    if entry == 0 {
        return Err(AttachError::NullEntry { pid });
    }

    // SAFETY: `entry` is the handler address the target published for this
    // purpose; it is only called inside the target's address space.
    let start: LPTHREAD_START_ROUTINE = unsafe {
        std::mem::transmute::<usize, Option<unsafe extern "system" fn(*mut c_void) -> u32>>(entry)
    };
    let _thread = unsafe { CreateRemoteThread(process.0, None, 0, start, None, 0, None) }
        .map(OwnedHandle)
        .map_err(|e| AttachError::CreateThread {
            pid,
            source: io::Error::other(e),
        })?;

    Ok(())
}
