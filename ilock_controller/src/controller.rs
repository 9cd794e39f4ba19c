//! Controller: rule engine, lever synchronization and bus polling loop.
//!
//! The `Controller` is the central node on the bus. Inbound lever reports
//! flow through the dispatcher into the [`LeverSyncManager`], which asks the
//! [`Interlocking`] whether to accept them; every lock flip the engine records
//! is pushed back out to the owning lever module after each poll.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ilock_bus::transports::LOOPBACK;
use ilock_bus::{
    BusLink, BusSettings, Dispatch, Init, MessageDispatcher, Register, SetLeverState, Transport,
    TransportRegistry,
};
use ilock_common::config::{BusConfig, ControllerConfig};
use ilock_common::consts::CONTROLLER_DEVICE_ID;
use ilock_common::types::ModuleType;
use ilock_engine::{Interlocking, LeverBinding};
use tracing::{debug, info};

use crate::error::ControllerError;
use crate::lever_sync::LeverSyncManager;

/// State the message handlers operate on.
#[derive(Debug, Clone, Default)]
pub struct ControllerState {
    pub interlocking: Interlocking,
    pub levers: LeverSyncManager,
}

/// Central interlocking node.
pub struct Controller {
    state: ControllerState,
    dispatcher: MessageDispatcher<ControllerState>,
    bus: BusConfig,
    indicate_locks: bool,
    bindings: Vec<LeverBinding>,
    running: Arc<AtomicBool>,
    polls: u64,
}

impl Controller {
    /// Wire an already-built interlocking to its lever bindings.
    pub fn new(
        mut interlocking: Interlocking,
        bindings: Vec<LeverBinding>,
        bus: BusConfig,
        indicate_locks: bool,
    ) -> Self {
        // Lock flips from building the frame are already reflected below.
        interlocking.drain_lock_changes();
        let mut levers = LeverSyncManager::new();
        for binding in &bindings {
            let locked = interlocking
                .locking(binding.id)
                .is_some_and(|locking| locking.is_locked());
            levers.register_lever(binding.slot, binding.id, locked);
            if let Some(locking) = interlocking.locking(binding.id) {
                levers.refresh(binding.id, locking.state(), locked);
            }
        }

        let mut dispatcher = MessageDispatcher::new();
        dispatcher.on_message::<SetLeverState, _>(
            |state: &mut ControllerState, msg: SetLeverState, link: &mut BusLink| {
                let ControllerState {
                    interlocking,
                    levers,
                } = state;
                levers.handle_set_lever_state(&msg, interlocking, link);
            },
        );
        dispatcher.on_message::<Register, _>(
            |state: &mut ControllerState, msg: Register, _: &mut BusLink| {
                state.levers.on_register(&msg);
            },
        );

        Self {
            state: ControllerState {
                interlocking,
                levers,
            },
            dispatcher,
            bus,
            indicate_locks,
            bindings,
            running: Arc::new(AtomicBool::new(false)),
            polls: 0,
        }
    }

    /// Build from a loaded configuration.
    ///
    /// # Arguments
    /// * `base_dir` - Directory used to resolve a relative `layout_file`
    ///
    /// # Errors
    /// Returns error if the layout cannot be loaded or names unknown levers.
    pub fn from_config(config: &ControllerConfig, base_dir: &Path) -> Result<Self, ControllerError> {
        config.validate()?;
        let layout = config.resolve_layout(base_dir)?;
        let (interlocking, bindings) = Interlocking::from_layout(&layout)?;
        info!(
            levers = bindings.len(),
            transport = %config.bus.transport,
            device_id = config.bus.device_id,
            "controller configured"
        );
        Ok(Self::new(
            interlocking,
            bindings,
            config.bus.clone(),
            config.indicate_locks,
        ))
    }

    /// Bring the bus up and synchronize every bound lever module.
    ///
    /// Registers the controller identity, starts `transport`, applies the
    /// lock indication setting, broadcasts `Init` so modules register, then
    /// sends each bound lever its initial lock state.
    ///
    /// # Errors
    /// Returns error if the transport fails to start or was already started.
    pub fn start(&mut self, transport: Box<dyn Transport>) -> Result<(), ControllerError> {
        self.dispatcher
            .register_device(ModuleType::Core, self.bus.device_id);
        self.dispatcher
            .start(transport, &BusSettings::from(&self.bus))?;

        let link = self.dispatcher.link_mut();
        self.state
            .levers
            .set_lever_lock_indication(self.indicate_locks, link);
        link.send_message(CONTROLLER_DEVICE_ID, Init)?;
        for binding in &self.bindings {
            self.state.levers.send_lock_state(binding.slot, link);
        }
        info!(levers = self.bindings.len(), "controller started");
        Ok(())
    }

    /// Create the configured transport from `registry` and start.
    pub fn start_with_registry(
        &mut self,
        registry: &TransportRegistry,
    ) -> Result<(), ControllerError> {
        let transport = registry.create(&self.bus.transport)?;
        self.start(transport)
    }

    /// Handle at most one inbound frame, then forward pending lock changes.
    pub fn poll(&mut self) -> Dispatch {
        let outcome = self.dispatcher.process_received(&mut self.state);
        self.polls += 1;

        let changes = self.state.interlocking.drain_lock_changes();
        if !changes.is_empty() {
            let link = self.dispatcher.link_mut();
            for change in changes {
                self.state
                    .levers
                    .set_lever_lock_state(change.id, change.locked, link);
            }
        }
        outcome
    }

    /// Poll until the running flag is cleared.
    pub fn run(&mut self) {
        self.run_with(|| {});
    }

    /// Poll until the running flag is cleared, calling `between_polls` once
    /// per loop iteration.
    ///
    /// Sleeps `poll_interval_us` whenever the bus was idle.
    pub fn run_with(&mut self, mut between_polls: impl FnMut()) {
        let interval = Duration::from_micros(self.bus.poll_interval_us);
        info!(
            poll_interval_us = self.bus.poll_interval_us,
            "controller loop running"
        );
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            between_polls();
            if self.poll() == Dispatch::Idle && !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }

        info!(
            polls = self.polls,
            faulted = self.state.interlocking.faulted_count(),
            "controller loop stopped"
        );
    }

    /// Request the loop to stop.
    pub fn shutdown(&self) {
        debug!("shutdown requested");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Transport name configured for this controller.
    pub fn transport_name(&self) -> &str {
        &self.bus.transport
    }

    /// Use the in-memory transport regardless of configuration.
    pub fn force_loopback(&mut self) {
        self.bus.transport = LOOPBACK.to_string();
    }

    pub fn interlocking(&self) -> &Interlocking {
        &self.state.interlocking
    }

    pub fn levers(&self) -> &LeverSyncManager {
        &self.state.levers
    }

    pub fn bindings(&self) -> &[LeverBinding] {
        &self.bindings
    }

    pub fn is_started(&self) -> bool {
        self.dispatcher.is_started()
    }

    /// Number of `poll` calls so far.
    pub fn polls(&self) -> u64 {
        self.polls
    }
}
