//! Inter-physical-CPU coordination.
//!
//! Lets one physical CPU invoke a handler on a set of others, waking destinations with an NMI
//! (if active) or a SIPI-style wakeup (if parked waiting for one), and optionally waiting for
//! every destination to acknowledge. This is the monitor's only cross-cpu primitive; there is
//! no shared run queue or work-stealing -- every cross-cpu action goes through here.
//!
//! Modeled on destination-shorthand matching, interlocked ack increment, and lock-held enqueue
//! contracts found in classic VMM IPC layers.
use crate::error::VmError;
use abyss::dev::x86_64::apic;
use abyss::spin_lock::SpinLock;
use alloc::collections::VecDeque;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const MAX_CPU: usize = abyss::MAX_CPU;

/// Delivery-mode bits for an NMI sent through the local APIC ICR (Delivery Mode = 100b).
const ICR_NMI: u32 = 0x400;
/// Delivery-mode bits for the wakeup vector used to rouse a CPU parked in wait-for-SIPI.
const ICR_WAKEUP_VECTOR: u32 = 0xFF;
const ICR_STARTUP: u32 = 0x600;

/// Activity state of a physical CPU, as tracked by the IPC layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ActivityState {
    /// Not yet brought up; sends are dropped.
    NotActive = 0,
    /// Running monitor/guest code normally.
    Active = 1,
    /// Parked waiting for a SIPI-style wakeup.
    Sipi = 2,
}

impl ActivityState {
    fn from_u32(v: u32) -> Self {
        match v {
            0 => Self::NotActive,
            1 => Self::Active,
            _ => Self::Sipi,
        }
    }
}

/// The kind of an IPC message, each with its own enqueue eligibility rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// An ordinary cross-cpu call.
    Normal,
    /// Never enqueued; wakes a stopped destination out of its busy-wait.
    Start,
    /// Asks an active/parked destination to enter the stop busy-wait.
    Stop,
    /// Never enqueued; used only to request a wakeup with no queued work.
    Sync,
}

/// A handler invoked on the destination CPU, in root-mode monitor context.
pub type IpcHandlerFn = fn(usize);

struct IpcMessage {
    ty: MessageType,
    sender: usize,
    handler: IpcHandlerFn,
    arg: usize,
    waits_for_finish: bool,
}

/// Per-physical-CPU IPC state.
pub struct IpcCpuContext {
    activity: AtomicU32,
    queue: SpinLock<VecDeque<IpcMessage>>,
    /// Distinct from "ack received" -- tracks only whether this round already sent a wakeup,
    /// to avoid a double-send race between the sender's empty-check and its wake (§10.F).
    nmi_already_sent_this_round: AtomicBool,

    num_received_nmi: AtomicU32,
    num_processed_nmi: AtomicU32,
    num_sent_ipc_nmi: AtomicU32,
    num_processed_ipc_nmi: AtomicU32,
    num_blocked_guest_nmi_injections: AtomicU32,
    num_start_messages: AtomicU32,
    num_stop_messages: AtomicU32,
    num_sent_ipc_messages: AtomicU32,
    num_received_ipc_messages: AtomicU32,
    num_resends: AtomicU32,
    /// NMIs owed to the guest but not yet observed/injected by the resume path.
    pending_nmi: AtomicU32,
}

impl IpcCpuContext {
    const fn new() -> Self {
        Self {
            activity: AtomicU32::new(ActivityState::NotActive as u32),
            queue: SpinLock::new(VecDeque::new()),
            nmi_already_sent_this_round: AtomicBool::new(false),
            num_received_nmi: AtomicU32::new(0),
            num_processed_nmi: AtomicU32::new(0),
            num_sent_ipc_nmi: AtomicU32::new(0),
            num_processed_ipc_nmi: AtomicU32::new(0),
            num_blocked_guest_nmi_injections: AtomicU32::new(0),
            num_start_messages: AtomicU32::new(0),
            num_stop_messages: AtomicU32::new(0),
            num_sent_ipc_messages: AtomicU32::new(0),
            num_received_ipc_messages: AtomicU32::new(0),
            num_resends: AtomicU32::new(0),
            pending_nmi: AtomicU32::new(0),
        }
    }

    /// Current activity state.
    pub fn activity(&self) -> ActivityState {
        ActivityState::from_u32(self.activity.load(Ordering::Acquire))
    }

    /// Transition into `Active`. Sends enqueued from here on are honored.
    pub fn activate(&self) {
        self.activity
            .store(ActivityState::Active as u32, Ordering::Release);
    }

    /// Transition into `Sipi`, discarding anything still queued (there is no destination to
    /// run it: the CPU is about to park, not execute monitor code).
    pub fn change_state_to_sipi(&self) {
        self.queue.lock().clear();
        self.activity
            .store(ActivityState::Sipi as u32, Ordering::Release);
    }

    /// Number of NMIs this cpu's resume path still owes the guest.
    pub fn take_pending_guest_nmi(&self) -> bool {
        if self.num_blocked_guest_nmi_injections.load(Ordering::Acquire) > 0 {
            self.num_blocked_guest_nmi_injections
                .fetch_sub(1, Ordering::AcqRel);
            true
        } else if self.num_received_nmi.load(Ordering::Acquire)
            > self.num_processed_nmi.load(Ordering::Acquire)
            && self.num_sent_ipc_nmi.load(Ordering::Acquire)
                == self.num_processed_ipc_nmi.load(Ordering::Acquire)
        {
            self.num_processed_nmi.fetch_add(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    /// Record an NMI delivered by hardware to this cpu (called from the NMI ISR entry).
    pub fn record_hw_nmi(&self) {
        self.num_received_nmi.fetch_add(1, Ordering::AcqRel);
        self.pending_nmi.fetch_add(1, Ordering::AcqRel);
    }

    /// Put back an NMI that [`take_pending_guest_nmi`] handed out but the resume path could not
    /// actually inject this round (entry-info already occupied, or NMI currently masked).
    ///
    /// [`take_pending_guest_nmi`]: Self::take_pending_guest_nmi
    pub fn requeue_blocked_guest_nmi(&self) {
        self.num_blocked_guest_nmi_injections
            .fetch_add(1, Ordering::AcqRel);
    }
}

/// Per-`(sender, destination)` acknowledgment attribution, plus a per-sender running total so
/// the sender's spin condition is a single counter compare (§10.F).
struct AckMatrix {
    cells: [[AtomicU32; MAX_CPU]; MAX_CPU],
    totals: [AtomicU32; MAX_CPU],
}

impl AckMatrix {
    const fn new() -> Self {
        const ZERO_ROW: [AtomicU32; MAX_CPU] = {
            const Z: AtomicU32 = AtomicU32::new(0);
            [Z; MAX_CPU]
        };
        const ZERO_TOTALS: [AtomicU32; MAX_CPU] = {
            const Z: AtomicU32 = AtomicU32::new(0);
            [Z; MAX_CPU]
        };
        Self {
            cells: [ZERO_ROW; MAX_CPU],
            totals: ZERO_TOTALS,
        }
    }

    fn reset_row(&self, sender: usize) {
        for cell in &self.cells[sender] {
            cell.store(0, Ordering::Relaxed);
        }
        self.totals[sender].store(0, Ordering::Relaxed);
    }

    fn ack(&self, sender: usize, destination: usize) {
        self.cells[sender][destination].fetch_add(1, Ordering::AcqRel);
        self.totals[sender].fetch_add(1, Ordering::AcqRel);
    }

    fn total(&self, sender: usize) -> u32 {
        self.totals[sender].load(Ordering::Acquire)
    }

    fn acked(&self, sender: usize, destination: usize) -> bool {
        self.cells[sender][destination].load(Ordering::Acquire) > 0
    }
}

/// System-wide IPC state: one context per physical CPU, plus the acknowledgment matrix and
/// the global send lock.
pub struct IpcSystem {
    contexts: [IpcCpuContext; MAX_CPU],
    ack: AckMatrix,
    num_cpus: usize,
    /// Serializes senders against each other; guards the ack-row reset step. The original
    /// implementation's send path is not safe for two concurrent senders (§10.F).
    send_lock: SpinLock<()>,
}

impl IpcSystem {
    /// Build IPC state sized for `num_cpus` physical cpus.
    pub const fn new() -> Self {
        const CTX: IpcCpuContext = IpcCpuContext::new();
        Self {
            contexts: [CTX; MAX_CPU],
            ack: AckMatrix::new(),
            num_cpus: MAX_CPU,
            send_lock: SpinLock::new(()),
        }
    }

    /// Context for physical cpu `id`.
    pub fn context(&self, id: usize) -> &IpcCpuContext {
        &self.contexts[id]
    }

    fn validate_cpu(&self, id: usize) -> Result<(), VmError> {
        if id >= self.num_cpus {
            Err(VmError::IpcTargetInvalid(id))
        } else {
            Ok(())
        }
    }

    fn wake(&self, destination: usize) {
        let ctx = &self.contexts[destination];
        if ctx.nmi_already_sent_this_round.swap(true, Ordering::AcqRel) {
            return;
        }
        match ctx.activity() {
            ActivityState::Active => unsafe { apic::send_ipi(destination, ICR_NMI) },
            ActivityState::Sipi => unsafe {
                apic::send_ipi(destination, ICR_STARTUP | ICR_WAKEUP_VECTOR)
            },
            ActivityState::NotActive => {}
        }
    }

    fn accepts(ty: MessageType, state: ActivityState) -> bool {
        match ty {
            MessageType::Normal | MessageType::Stop => !matches!(state, ActivityState::NotActive),
            MessageType::Start | MessageType::Sync => false,
        }
    }

    /// Invoke `handler(arg)` on every cpu in `destinations` (self excluded automatically).
    /// If `wait_for_finish`, spins until every reachable destination has acknowledged, resending
    /// the wakeup on a bounded timeout and draining this cpu's own queue between spins to avoid
    /// a mutual-send deadlock.
    pub fn execute_send(
        &self,
        this_cpu: usize,
        destinations: &[usize],
        ty: MessageType,
        handler: IpcHandlerFn,
        arg: usize,
        wait_for_finish: bool,
    ) -> Result<(), VmError> {
        for &d in destinations {
            self.validate_cpu(d)?;
        }
        let _send_guard = self.send_lock.lock();
        self.ack.reset_row(this_cpu);
        for &d in destinations {
            if d == this_cpu {
                continue;
            }
            self.contexts[d]
                .nmi_already_sent_this_round
                .store(false, Ordering::Relaxed);
            let ctx = &self.contexts[d];
            let mut queue = ctx.queue.lock();
            let was_empty = queue.is_empty();
            if Self::accepts(ty, ctx.activity()) {
                queue.push_back(IpcMessage {
                    ty,
                    sender: this_cpu,
                    handler,
                    arg,
                    waits_for_finish: wait_for_finish,
                });
                match ty {
                    MessageType::Stop => {
                        ctx.num_stop_messages.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }
            }
            if ty == MessageType::Start {
                ctx.num_start_messages.fetch_add(1, Ordering::Relaxed);
            }
            drop(queue);
            if was_empty || matches!(ty, MessageType::Start | MessageType::Sync) {
                self.wake(d);
            }
            self.contexts[this_cpu]
                .num_sent_ipc_messages
                .fetch_add(1, Ordering::Relaxed);
        }

        let required = destinations.iter().filter(|&&d| d != this_cpu).count() as u32;
        if !wait_for_finish || required == 0 {
            return Ok(());
        }

        let mut spins_since_resend: u32 = 0;
        loop {
            if self.ack.total(this_cpu) >= required {
                return Ok(());
            }
            // Drain our own queue between spins so a mutual send cannot deadlock.
            self.process_one(this_cpu);
            spins_since_resend += 1;
            if spins_since_resend > 1000 {
                spins_since_resend = 0;
                self.contexts[this_cpu].num_resends.fetch_add(1, Ordering::Relaxed);
                for &d in destinations {
                    if d != this_cpu && !self.ack.acked(this_cpu, d) {
                        self.contexts[d]
                            .nmi_already_sent_this_round
                            .store(false, Ordering::Relaxed);
                        self.wake(d);
                    }
                }
            }
            core::hint::spin_loop();
        }
    }

    /// Drain and run every queued message destined for `this_cpu`, acknowledging each back to
    /// its sender. Called from the NMI-window vm-exit dispatcher and from a sender's own spin
    /// loop (so a send can make progress while it is itself a destination of another send).
    pub fn process_one(&self, this_cpu: usize) -> bool {
        let msg = {
            let mut queue = self.contexts[this_cpu].queue.lock();
            queue.pop_front()
        };
        let Some(msg) = msg else { return false };
        self.contexts[this_cpu]
            .num_received_ipc_messages
            .fetch_add(1, Ordering::Relaxed);
        (msg.handler)(msg.arg);
        if msg.waits_for_finish {
            self.ack.ack(msg.sender, this_cpu);
        }
        true
    }

    /// Drain every queued message for `this_cpu`.
    pub fn process_all(&self, this_cpu: usize) {
        while self.process_one(this_cpu) {}
    }

    /// Called from the NMI ISR / NMI-window exit handler: drain the queue, then decide
    /// whether a guest-bound NMI is owed.
    pub fn nmi_window_exit(&self, this_cpu: usize) -> bool {
        self.process_all(this_cpu);
        self.contexts[this_cpu].take_pending_guest_nmi()
    }

    /// See [`IpcCpuContext::requeue_blocked_guest_nmi`].
    pub fn requeue_blocked_guest_nmi(&self, this_cpu: usize) {
        self.contexts[this_cpu].requeue_blocked_guest_nmi();
    }
}

impl Default for IpcSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// The crate-wide IPC instance.
pub static IPC: IpcSystem = IpcSystem::new();

/// Shared stop/start barrier context. One instance per scope (global, or a guest-scoped
/// predicate-filtered subset).
pub struct StopStartContext {
    stop: AtomicBool,
    timestamp: AtomicU32,
    current_timestamp: AtomicU32,
}

impl StopStartContext {
    /// A fresh, non-stopped barrier.
    pub const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            timestamp: AtomicU32::new(0),
            current_timestamp: AtomicU32::new(0),
        }
    }

    /// Busy-wait handler run on a stopped destination. Re-entrant: drains its own queue
    /// between checks so nested `execute_send(wait_for_finish=true)` calls from other cpus
    /// cannot deadlock against this cpu being parked here.
    fn spin_while_stopped(&self, this_cpu: usize, my_timestamp: u32) {
        while self.stop.load(Ordering::Acquire) && self.current_timestamp.load(Ordering::Acquire) == my_timestamp {
            IPC.process_one(this_cpu);
            core::hint::spin_loop();
        }
    }

    /// Stop every cpu in `destinations` (optionally guest-scoped via the caller's filtered
    /// destination list), returning once all are confirmed parked in the busy-wait.
    pub fn stop_all(
        &self,
        this_cpu: usize,
        destinations: &[usize],
    ) -> Result<(), VmError> {
        debug_assert!(!self.stop.load(Ordering::Relaxed), "stop_all called while already stopped");
        let ts = self.timestamp.fetch_add(1, Ordering::AcqRel) + 1;
        self.current_timestamp.store(ts, Ordering::Release);
        self.stop.store(true, Ordering::Release);
        IPC.execute_send(
            this_cpu,
            destinations,
            MessageType::Stop,
            stop_trampoline,
            self as *const Self as usize,
            true,
        )
    }

    /// Release every cpu stopped by the most recent [`Self::stop_all`], running
    /// `on_start(cpu_id, arg)` on each as it exits the busy-wait.
    pub fn start_all(
        &self,
        this_cpu: usize,
        destinations: &[usize],
        on_start: IpcHandlerFn,
        arg: usize,
    ) -> Result<(), VmError> {
        self.stop.store(false, Ordering::Release);
        IPC.execute_send(this_cpu, destinations, MessageType::Start, on_start, arg, false)
    }
}

impl Default for StopStartContext {
    fn default() -> Self {
        Self::new()
    }
}

fn stop_trampoline(ctx_addr: usize) {
    let ctx = unsafe { &*(ctx_addr as *const StopStartContext) };
    let ts = ctx.current_timestamp.load(Ordering::Acquire);
    ctx.spin_while_stopped(abyss::x86_64::intrinsics::cpuid(), ts);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicU32 as StdAtomicU32;

    static HANDLER_CALLS: StdAtomicU32 = StdAtomicU32::new(0);
    fn counting_handler(_arg: usize) {
        HANDLER_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn message_prefilter_rules() {
        assert!(IpcSystem::accepts(MessageType::Normal, ActivityState::Active));
        assert!(!IpcSystem::accepts(MessageType::Normal, ActivityState::NotActive));
        assert!(!IpcSystem::accepts(MessageType::Start, ActivityState::Active));
        assert!(!IpcSystem::accepts(MessageType::Sync, ActivityState::Active));
        assert!(IpcSystem::accepts(MessageType::Stop, ActivityState::Sipi));
    }

    #[test]
    fn process_one_runs_queued_handler_and_acks() {
        let sys = IpcSystem::new();
        sys.context(1).activate();
        HANDLER_CALLS.store(0, Ordering::SeqCst);
        {
            let mut q = sys.contexts[1].queue.lock();
            q.push_back(IpcMessage {
                ty: MessageType::Normal,
                sender: 0,
                handler: counting_handler,
                arg: 0,
                waits_for_finish: true,
            });
        }
        assert!(sys.process_one(1));
        assert_eq!(HANDLER_CALLS.load(Ordering::SeqCst), 1);
        assert!(sys.ack.acked(0, 1));
        assert_eq!(sys.ack.total(0), 1);
        assert!(!sys.process_one(1));
    }

    #[test]
    fn change_state_to_sipi_discards_queue() {
        let sys = IpcSystem::new();
        sys.context(2).activate();
        {
            let mut q = sys.contexts[2].queue.lock();
            q.push_back(IpcMessage {
                ty: MessageType::Normal,
                sender: 0,
                handler: counting_handler,
                arg: 0,
                waits_for_finish: false,
            });
        }
        sys.context(2).change_state_to_sipi();
        assert!(!sys.process_one(2));
        assert_eq!(sys.context(2).activity(), ActivityState::Sipi);
    }
}
