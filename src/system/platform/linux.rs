use std::path::Path;

use super::{CoreTickSample, MemorySource, TickSource, VmPageCounts};
use crate::system::QueryError;

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";

pub struct HostCounters {
    /// Last `/proc/meminfo` reading; physical memory and swap are answered
    /// from it so one sample sees a single consistent read.
    meminfo: Option<Meminfo>,
}

impl Default for HostCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCounters {
    pub fn new() -> Self {
        HostCounters { meminfo: None }
    }
}

fn read_proc(path: &str) -> Result<String, QueryError> {
    std::fs::read_to_string(path).map_err(|source| QueryError::Io {
        path: path.into(),
        source,
    })
}

fn malformed(path: &str, detail: String) -> QueryError {
    QueryError::Parse {
        path: Path::new(path).to_path_buf(),
        detail,
    }
}

/// Parse the `cpuN` lines of `/proc/stat`.
///
/// nice counts as user time; irq and softirq count as system time; iowait
/// counts as idle. Offline cores have no line, so the core count shrinks
/// while they are unplugged.
pub(crate) fn parse_proc_stat(contents: &str) -> Result<Vec<CoreTickSample>, QueryError> {
    let mut cores = Vec::new();
    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let Some(label) = fields.next() else {
            continue;
        };
        // The aggregate "cpu" line has no index suffix.
        let Some(index) = label.strip_prefix("cpu") else {
            continue;
        };
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let values = fields
            .map(|f| f.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| malformed(PROC_STAT, format!("{label}: {e}")))?;
        if values.len() < 4 {
            return Err(malformed(
                PROC_STAT,
                format!("{label} has {} tick fields", values.len()),
            ));
        }
        let field = |i: usize| values.get(i).copied().unwrap_or(0);

        cores.push(CoreTickSample {
            user: field(0).saturating_add(field(1)),
            system: field(2).saturating_add(field(5)).saturating_add(field(6)),
            idle: field(3).saturating_add(field(4)),
        });
    }
    Ok(cores)
}

/// One parsed `/proc/meminfo` reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Meminfo {
    pub pages: VmPageCounts,
    pub total: u64,
    /// `SwapTotal - SwapFree`; `None` when the kernel reports no swap lines.
    pub swap_used: Option<u64>,
}

/// Map `/proc/meminfo` onto page counts.
///
/// Active/Inactive become active/inactive, the file LRU lists are the
/// file-backed pages, Unevictable + SUnreclaim stand in for wired memory and
/// the zswap pool is the compressed store.
pub(crate) fn parse_meminfo(contents: &str, page_size: u64) -> Result<Meminfo, QueryError> {
    if page_size == 0 {
        return Err(malformed(PROC_MEMINFO, "page size is zero".to_string()));
    }

    let mut total = None;
    let mut active = None;
    let mut inactive = None;
    let mut active_file = None;
    let mut inactive_file = None;
    let mut unevictable = 0u64;
    let mut sunreclaim = 0u64;
    let mut zswap = 0;
    let mut swap_total = None;
    let mut swap_free = None;

    for line in contents.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(kib) = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok())
        else {
            continue;
        };
        let bytes = kib.saturating_mul(1024);
        match key {
            "MemTotal" => total = Some(bytes),
            "Active" => active = Some(bytes),
            "Inactive" => inactive = Some(bytes),
            "Active(file)" => active_file = Some(bytes),
            "Inactive(file)" => inactive_file = Some(bytes),
            "Unevictable" => unevictable = bytes,
            "SUnreclaim" => sunreclaim = bytes,
            "Zswap" => zswap = bytes,
            "SwapTotal" => swap_total = Some(bytes),
            "SwapFree" => swap_free = Some(bytes),
            _ => {}
        }
    }

    let require = |value: Option<u64>, key: &str| {
        value.ok_or_else(|| malformed(PROC_MEMINFO, format!("missing {key}")))
    };
    let pages = |bytes: u64| bytes / page_size;

    let file_backed = require(active_file, "Active(file)")?
        .saturating_add(require(inactive_file, "Inactive(file)")?);

    Ok(Meminfo {
        pages: VmPageCounts {
            active: pages(require(active, "Active")?),
            inactive: pages(require(inactive, "Inactive")?),
            wired: pages(unevictable.saturating_add(sunreclaim)),
            compressed: pages(zswap),
            external: pages(file_backed),
        },
        total: require(total, "MemTotal")?,
        swap_used: swap_total
            .zip(swap_free)
            .map(|(total, free)| total.saturating_sub(free)),
    })
}

impl HostCounters {
    fn read_meminfo(&mut self) -> Result<Meminfo, QueryError> {
        self.meminfo = None;
        let page_size = self.page_size()?;
        let reading = parse_meminfo(&read_proc(PROC_MEMINFO)?, page_size)?;
        self.meminfo = Some(reading);
        Ok(reading)
    }

    fn latest_meminfo(&mut self) -> Result<Meminfo, QueryError> {
        match self.meminfo {
            Some(reading) => Ok(reading),
            None => self.read_meminfo(),
        }
    }
}

impl TickSource for HostCounters {
    type Buffer = Vec<CoreTickSample>;

    fn cpu_ticks(&mut self) -> Result<Self::Buffer, QueryError> {
        parse_proc_stat(&read_proc(PROC_STAT)?)
    }
}

impl MemorySource for HostCounters {
    /// Re-reads `/proc/meminfo`; `physical_memory` and `swap_used` then
    /// answer from this reading.
    fn vm_pages(&mut self) -> Result<VmPageCounts, QueryError> {
        self.read_meminfo().map(|reading| reading.pages)
    }

    fn page_size(&mut self) -> Result<u64, QueryError> {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size <= 0 {
            return Err(QueryError::Sysctl {
                name: "_SC_PAGESIZE".to_string(),
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(size as u64)
    }

    fn physical_memory(&mut self) -> Result<u64, QueryError> {
        self.latest_meminfo().map(|reading| reading.total)
    }

    fn swap_used(&mut self) -> Result<u64, QueryError> {
        self.latest_meminfo()?
            .swap_used
            .ok_or_else(|| malformed(PROC_MEMINFO, "missing SwapTotal/SwapFree".to_string()))
    }
}
