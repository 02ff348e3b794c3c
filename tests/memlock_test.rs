//! Runs in its own process: lowering `RLIMIT_MEMLOCK` cannot be undone.

use memprobe::allocator::MmapAllocator;
use memprobe::memory::{LockFailure, LockStatus, MemoryRegion, RegionOptions};
use memprobe::util::page_size;

#[test]
fn test_setup_continues_when_mlock_fails() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &limit) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let page = page_size();
    let options = RegionOptions {
        page_size: page,
        lock: true,
    };
    let region = MemoryRegion::setup(&mut MmapAllocator::default(), 8 * page, options)?;
    assert_eq!(region.usable(), 8 * page);
    match region.lock_status() {
        LockStatus::Unlocked(reason) => assert!(matches!(
            reason,
            LockFailure::TooManyPages | LockFailure::InsufficientPermission
        )),
        // CAP_IPC_LOCK ignores the limit
        LockStatus::Locked => assert_eq!(unsafe { libc::geteuid() }, 0),
        LockStatus::Disabled => panic!("locking was requested"),
    }
    Ok(())
}
