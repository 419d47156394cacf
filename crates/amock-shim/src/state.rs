//! Process-lifetime injector state.
//!
//! One configuration store and one origin registry per subsystem, built on
//! library attach and dropped on detach. Dispatch units receive shared
//! references; nothing here mutates after construction.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use amock_config::ConfigStore;

use crate::dcmi::NpuOrigins;
use crate::nvml::GpuOrigins;
use crate::sink;

static STATE: AtomicPtr<InjectorState> = AtomicPtr::new(ptr::null_mut());
static INITIALIZING: AtomicBool = AtomicBool::new(false);

pub(crate) struct InjectorState {
    pub conf: ConfigStore,
    pub gpu: GpuOrigins,
    pub npu: NpuOrigins,
}

impl InjectorState {
    fn init() -> *mut Self {
        Box::into_raw(Box::new(InjectorState {
            conf: ConfigStore::load(),
            gpu: GpuOrigins::new(),
            npu: NpuOrigins::new(),
        }))
    }

    /// Published state, initializing on first use. `None` only while another
    /// thread holds the initialization latch; callers treat it like an
    /// unresolvable origin.
    pub(crate) fn get() -> Option<&'static Self> {
        let published = STATE.load(Ordering::Acquire);
        if !published.is_null() {
            return Some(unsafe { &*published });
        }
        if INITIALIZING.swap(true, Ordering::SeqCst) {
            return None;
        }
        let fresh = Self::init();
        STATE.store(fresh, Ordering::Release);
        INITIALIZING.store(false, Ordering::SeqCst);
        Some(unsafe { &*fresh })
    }
}

/// Library attach: build the state and record a failed configuration load
/// once, at the moment the process gains the shim.
pub(crate) fn attach() {
    if let Some(state) = InjectorState::get() {
        if let Some(reason) = state.conf.failure() {
            sink::write_line(reason);
        }
    }
}

/// Library detach: tear the state down.
pub(crate) fn detach() {
    let taken = STATE.swap(ptr::null_mut(), Ordering::AcqRel);
    if !taken.is_null() {
        drop(unsafe { Box::from_raw(taken) });
    }
}
