//! Mach host counters.
//!
//! Per-core ticks come from `host_processor_info(PROCESSOR_CPU_LOAD_INFO)`,
//! page counts from `host_statistics64(HOST_VM_INFO64)`, and installed RAM
//! and swap from `sysctl`.

use std::ffi::CStr;
use std::io;
use std::mem::{self, MaybeUninit};
use std::ptr;
use std::slice;

use libc::{c_int, c_void};

use super::{CoreTickSample, MemorySource, TickBuffer, TickSource, VmPageCounts};
use crate::system::QueryError;

type KernReturn = c_int;
type MachPort = u32;

const KERN_SUCCESS: KernReturn = 0;
const PROCESSOR_CPU_LOAD_INFO: c_int = 2;
const HOST_VM_INFO64: c_int = 4;

const CPU_STATE_USER: usize = 0;
const CPU_STATE_SYSTEM: usize = 1;
const CPU_STATE_IDLE: usize = 2;
const CPU_STATE_MAX: usize = 4;

/// `processor_cpu_load_info`: one record per core in the tick buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct ProcessorCpuLoadInfo {
    cpu_ticks: [u32; CPU_STATE_MAX],
}

/// `vm_statistics64`, as filled by `HOST_VM_INFO64`.
#[repr(C, align(8))]
#[derive(Clone, Copy, Debug, Default)]
struct VmStatistics64 {
    free_count: u32,
    active_count: u32,
    inactive_count: u32,
    wire_count: u32,
    zero_fill_count: u64,
    reactivations: u64,
    pageins: u64,
    pageouts: u64,
    faults: u64,
    cow_faults: u64,
    lookups: u64,
    hits: u64,
    purges: u64,
    purgeable_count: u32,
    speculative_count: u32,
    decompressions: u64,
    compressions: u64,
    swapins: u64,
    swapouts: u64,
    compressor_page_count: u32,
    throttled_count: u32,
    external_page_count: u32,
    internal_page_count: u32,
    total_uncompressed_pages_in_compressor: u64,
}

const HOST_VM_INFO64_COUNT: u32 =
    (mem::size_of::<VmStatistics64>() / mem::size_of::<c_int>()) as u32;

/// `struct xsw_usage` from `vm.swapusage`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct XswUsage {
    xsu_total: u64,
    xsu_avail: u64,
    xsu_used: u64,
    xsu_pagesize: u32,
    xsu_encrypted: i32,
}

unsafe extern "C" {
    static mach_task_self_: MachPort;

    fn mach_host_self() -> MachPort;
    fn host_processor_info(
        host: MachPort,
        flavor: c_int,
        out_processor_count: *mut u32,
        out_processor_info: *mut *mut c_int,
        out_processor_info_count: *mut u32,
    ) -> KernReturn;
    fn host_statistics64(
        host: MachPort,
        flavor: c_int,
        host_info_out: *mut c_int,
        host_info_out_count: *mut u32,
    ) -> KernReturn;
    fn host_page_size(host: MachPort, out_page_size: *mut usize) -> KernReturn;
    fn vm_deallocate(target_task: MachPort, address: usize, size: usize) -> KernReturn;
}

fn kern_result(call: &'static str, code: KernReturn) -> Result<(), QueryError> {
    if code == KERN_SUCCESS {
        Ok(())
    } else {
        Err(QueryError::Kernel { call, code })
    }
}

/// A tick buffer of `words` integers must be whole records and cover
/// `cpu_count` of them.
fn check_layout(words: usize, cpu_count: usize) -> Result<(), QueryError> {
    let expected = cpu_count.saturating_mul(CPU_STATE_MAX);
    if words % CPU_STATE_MAX != 0 || words < expected {
        return Err(QueryError::BufferSize {
            expected,
            actual: words,
        });
    }
    Ok(())
}

/// Tick buffer handed out by `host_processor_info`.
///
/// The kernel allocates it in our address space; it is returned with
/// `vm_deallocate` when this handle drops.
pub struct MachCpuLoad {
    info: *mut c_int,
    info_count: u32,
    cpu_count: usize,
}

// SAFETY: the buffer is plain VM memory owned exclusively by this handle; it
// has no thread affinity and is only read through `&self`.
unsafe impl Send for MachCpuLoad {}

impl MachCpuLoad {
    fn query(host: MachPort) -> Result<Self, QueryError> {
        let mut cpu_count: u32 = 0;
        let mut info: *mut c_int = ptr::null_mut();
        let mut info_count: u32 = 0;

        // SAFETY: all out-pointers reference live locals.
        let code = unsafe {
            host_processor_info(
                host,
                PROCESSOR_CPU_LOAD_INFO,
                &mut cpu_count,
                &mut info,
                &mut info_count,
            )
        };
        kern_result("host_processor_info", code)?;

        // Own the buffer before validating so a bad length still releases it.
        let load = MachCpuLoad {
            info,
            info_count,
            cpu_count: cpu_count as usize,
        };
        if load.info.is_null() {
            return Err(QueryError::BufferSize {
                expected: load.cpu_count.saturating_mul(CPU_STATE_MAX),
                actual: 0,
            });
        }
        check_layout(load.info_count as usize, load.cpu_count)?;
        Ok(load)
    }

    fn records(&self) -> &[ProcessorCpuLoadInfo] {
        // SAFETY: `query` verified the buffer is non-null and holds at least
        // `cpu_count` records of CPU_STATE_MAX words each; the record has the
        // same alignment as `c_int` and the memory lives until `drop`.
        unsafe { slice::from_raw_parts(self.info.cast::<ProcessorCpuLoadInfo>(), self.cpu_count) }
    }
}

impl TickBuffer for MachCpuLoad {
    fn core_count(&self) -> usize {
        self.cpu_count
    }

    fn core(&self, index: usize) -> CoreTickSample {
        let ticks = self.records()[index].cpu_ticks;
        CoreTickSample {
            user: u64::from(ticks[CPU_STATE_USER]),
            system: u64::from(ticks[CPU_STATE_SYSTEM]),
            idle: u64::from(ticks[CPU_STATE_IDLE]),
        }
    }
}

impl Drop for MachCpuLoad {
    fn drop(&mut self) {
        if self.info.is_null() {
            return;
        }
        let size = self.info_count as usize * mem::size_of::<c_int>();
        // SAFETY: `info`/`info_count` are exactly what host_processor_info
        // returned, and this is the only release of that region.
        let code = unsafe { vm_deallocate(mach_task_self_, self.info as usize, size) };
        if code != KERN_SUCCESS {
            tracing::debug!(code, "vm_deallocate failed for cpu load buffer");
        }
    }
}

/// Read a fixed-size sysctl value. Only used with plain-old-data types.
fn sysctl_value<T: Copy>(name: &CStr) -> Result<T, QueryError> {
    let mut value = MaybeUninit::<T>::zeroed();
    let mut size = mem::size_of::<T>();
    // SAFETY: `value` provides `size` writable bytes and the name is
    // NUL-terminated.
    let rc = unsafe {
        libc::sysctlbyname(
            name.as_ptr(),
            value.as_mut_ptr().cast::<c_void>(),
            &mut size,
            ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(QueryError::Sysctl {
            name: name.to_string_lossy().into_owned(),
            source: io::Error::last_os_error(),
        });
    }
    if size != mem::size_of::<T>() {
        return Err(QueryError::BufferSize {
            expected: mem::size_of::<T>(),
            actual: size,
        });
    }
    // SAFETY: the kernel filled all bytes and T is plain data.
    Ok(unsafe { value.assume_init() })
}

pub struct HostCounters {
    host: MachPort,
}

impl Default for HostCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCounters {
    pub fn new() -> Self {
        // SAFETY: returns a send right for the host port; no preconditions.
        let host = unsafe { mach_host_self() };
        HostCounters { host }
    }
}

impl TickSource for HostCounters {
    type Buffer = MachCpuLoad;

    fn cpu_ticks(&mut self) -> Result<Self::Buffer, QueryError> {
        MachCpuLoad::query(self.host)
    }
}

impl MemorySource for HostCounters {
    fn vm_pages(&mut self) -> Result<VmPageCounts, QueryError> {
        let mut stats = VmStatistics64::default();
        let mut count = HOST_VM_INFO64_COUNT;
        // SAFETY: `stats` is HOST_VM_INFO64_COUNT integers long and `count`
        // tells the kernel so.
        let code = unsafe {
            host_statistics64(
                self.host,
                HOST_VM_INFO64,
                (&mut stats as *mut VmStatistics64).cast::<c_int>(),
                &mut count,
            )
        };
        kern_result("host_statistics64", code)?;

        Ok(VmPageCounts {
            active: u64::from(stats.active_count),
            inactive: u64::from(stats.inactive_count),
            wired: u64::from(stats.wire_count),
            compressed: u64::from(stats.compressor_page_count),
            external: u64::from(stats.external_page_count),
        })
    }

    fn page_size(&mut self) -> Result<u64, QueryError> {
        let mut size: usize = 0;
        // SAFETY: `size` is a live local.
        let code = unsafe { host_page_size(self.host, &mut size) };
        kern_result("host_page_size", code)?;
        Ok(size as u64)
    }

    fn physical_memory(&mut self) -> Result<u64, QueryError> {
        sysctl_value::<u64>(c"hw.memsize")
    }

    fn swap_used(&mut self) -> Result<u64, QueryError> {
        sysctl_value::<XswUsage>(c"vm.swapusage").map(|usage| usage.xsu_used)
    }
}
