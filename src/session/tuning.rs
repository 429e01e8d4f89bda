//! Scheduling tuning
//!
//! One-shot priority and affinity calls made at startup so injected
//! keystrokes keep their timing under load. Both are best-effort.

use log::{info, warn};
use nix::sched::{sched_setaffinity, CpuSet};
use nix::unistd::Pid;

/// Raise the scheduling priority of the whole process
pub fn boost_process_priority(nice: i32) {
    let ret = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if ret < 0 {
        warn!(
            "setpriority({}) failed: {}",
            nice,
            std::io::Error::last_os_error()
        );
    } else {
        info!("Process priority set to nice {}", nice);
    }
}

/// Build the affinity mask, dropping CPUs the mask cannot hold
fn cpu_set_for(cpus: &[usize]) -> Option<CpuSet> {
    let mut set = CpuSet::new();
    let mut any = false;
    for &cpu in cpus {
        if cpu < CpuSet::count() && set.set(cpu).is_ok() {
            any = true;
        }
    }
    any.then_some(set)
}

/// Pin the calling thread (and threads spawned after it) to `cpus`
pub fn pin_to_cpus(cpus: &[usize]) {
    if cpus.is_empty() {
        return;
    }
    let Some(set) = cpu_set_for(cpus) else {
        warn!("No usable CPU in affinity list {:?}", cpus);
        return;
    };
    match sched_setaffinity(Pid::from_raw(0), &set) {
        Ok(()) => info!("CPU affinity set to {:?}", cpus),
        Err(e) => warn!("sched_setaffinity({:?}) failed: {}", cpus, e),
    }
}
