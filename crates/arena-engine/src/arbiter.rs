//! Move arbiter
//!
//! Every strategy instance runs on its own worker thread for the length of a
//! match. The arbiter hands it both histories over a channel and waits at
//! most the move budget for an answer. A worker that misses the deadline is
//! abandoned instead of joined, and its kill switch is fired, so a hung call
//! never stalls the tournament.
//!
//! Before the first turn each instance gets one `prepare` call under a
//! separate, larger startup budget. Missing it is a construction fault.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::disqualification::DisqualificationSet;
use crate::error::Fault;
use crate::strategy::{Decision, Instance, KillSwitch, StrategyUnit};

/// Startup allowance used unless the caller sets one
pub const DEFAULT_STARTUP_BUDGET: Duration = Duration::from_secs(5);

/// Enforces the per-move budget and records disqualifications
#[derive(Clone, Debug)]
pub struct Arbiter {
    budget: Duration,
    startup: Duration,
    disqualified: Arc<DisqualificationSet>,
}

impl Arbiter {
    pub fn new(budget: Duration, disqualified: Arc<DisqualificationSet>) -> Self {
        Self {
            budget,
            startup: DEFAULT_STARTUP_BUDGET,
            disqualified,
        }
    }

    pub fn with_startup_budget(mut self, startup: Duration) -> Self {
        self.startup = startup;
        self
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn startup_budget(&self) -> Duration {
        self.startup
    }

    pub fn disqualified(&self) -> &DisqualificationSet {
        &self.disqualified
    }

    /// Start a fresh instance of `unit` on its own worker and wait until it
    /// is ready to play
    pub fn seat(&self, unit: &StrategyUnit) -> Result<Seat, Fault> {
        Seat::open(unit, self.startup).map_err(|fault| self.disqualify(fault))
    }

    /// Ask the seated instance for its next move.
    ///
    /// Any fault disqualifies the owning strategy before it is returned.
    pub fn decide(
        &self,
        seat: &mut Seat,
        own: &[Decision],
        opponent: &[Decision],
    ) -> Result<Decision, Fault> {
        seat.ask(own, opponent, self.budget)
            .map_err(|fault| self.disqualify(fault))
    }

    fn disqualify(&self, fault: Fault) -> Fault {
        if self.disqualified.insert(fault.strategy()) {
            warn!(strategy = fault.strategy(), "disqualified: {}", fault);
        }
        fault
    }
}

struct Request {
    own: Vec<Decision>,
    opponent: Vec<Decision>,
}

type Reply = anyhow::Result<Decision>;
type Ready = anyhow::Result<()>;

/// One strategy instance running on a worker thread for one match
pub struct Seat {
    strategy: String,
    requests: Option<Sender<Request>>,
    replies: Receiver<Reply>,
    kill: Option<KillSwitch>,
    worker: Option<JoinHandle<()>>,
}

impl Seat {
    fn open(unit: &StrategyUnit, startup: Duration) -> Result<Self, Fault> {
        let strategy = unit.name().to_string();
        let instance = unit.instantiate().map_err(|cause| Fault::Construction {
            strategy: strategy.clone(),
            cause,
        })?;
        let kill = instance.kill_switch();

        let (ready_tx, ready_rx) = mpsc::channel();
        let (request_tx, request_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(format!("strategy:{}", strategy))
            .spawn(move || serve(instance, ready_tx, request_rx, reply_tx))
            .map_err(|e| Fault::Construction {
                strategy: strategy.clone(),
                cause: e.into(),
            })?;

        let mut seat = Self {
            strategy,
            requests: Some(request_tx),
            replies: reply_rx,
            kill,
            worker: Some(worker),
        };
        seat.await_ready(&ready_rx, startup)?;
        Ok(seat)
    }

    fn await_ready(&mut self, ready: &Receiver<Ready>, startup: Duration) -> Result<(), Fault> {
        let cause = match ready.recv_timeout(startup) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(cause)) => cause,
            Err(RecvTimeoutError::Timeout) => {
                self.abandon();
                anyhow!("not ready within {:?}", startup)
            }
            Err(RecvTimeoutError::Disconnected) => anyhow!("worker exited during startup"),
        };
        Err(Fault::Construction {
            strategy: self.strategy.clone(),
            cause,
        })
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    fn ask(&mut self, own: &[Decision], opponent: &[Decision], budget: Duration) -> Result<Decision, Fault> {
        let started = Instant::now();
        let request = Request {
            own: own.to_vec(),
            opponent: opponent.to_vec(),
        };
        let sent = match &self.requests {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        };
        if !sent {
            return Err(self.execution_fault(anyhow!("worker is no longer running")));
        }

        match self.replies.recv_timeout(budget) {
            Ok(Ok(decision)) => Ok(decision),
            Ok(Err(cause)) => Err(self.execution_fault(cause)),
            Err(RecvTimeoutError::Timeout) => {
                self.abandon();
                Err(Fault::Timeout {
                    strategy: self.strategy.clone(),
                    elapsed: started.elapsed(),
                    budget,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(self.execution_fault(anyhow!("worker exited without replying")))
            }
        }
    }

    fn execution_fault(&self, cause: anyhow::Error) -> Fault {
        Fault::Execution {
            strategy: self.strategy.clone(),
            cause,
        }
    }

    /// Give up on a worker stuck in a call. It is detached, not joined.
    fn abandon(&mut self) {
        self.requests = None;
        if let Some(kill) = &self.kill {
            kill.fire();
        }
        if self.worker.take().is_some() {
            debug!(strategy = %self.strategy, "abandoned unresponsive worker");
        }
    }
}

impl Drop for Seat {
    fn drop(&mut self) {
        // Closing the request channel ends the worker's loop
        self.requests = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn serve(mut instance: Instance, ready: Sender<Ready>, requests: Receiver<Request>, replies: Sender<Reply>) {
    let prepared = guarded(|| instance.prepare());
    let failed = prepared.is_err();
    if ready.send(prepared).is_err() || failed {
        return;
    }

    for request in requests {
        let reply = guarded(|| instance.decide(&request.own, &request.opponent));
        if replies.send(reply).is_err() {
            break;
        }
    }
}

/// Run a strategy call, turning a panic into an error
fn guarded<T>(call: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;

    struct Sleeper(Duration);

    impl Strategy for Sleeper {
        fn decide(&mut self, _own: &[Decision], _opponent: &[Decision]) -> anyhow::Result<Decision> {
            thread::sleep(self.0);
            Ok(Decision::Cooperate)
        }
    }

    struct Failing;

    impl Strategy for Failing {
        fn decide(&mut self, _own: &[Decision], _opponent: &[Decision]) -> anyhow::Result<Decision> {
            anyhow::bail!("division by zero")
        }
    }

    struct Panicking;

    impl Strategy for Panicking {
        fn decide(&mut self, _own: &[Decision], _opponent: &[Decision]) -> anyhow::Result<Decision> {
            panic!("index out of range")
        }
    }

    /// Counts its own calls; proves state survives between turns
    struct Counter(usize);

    impl Strategy for Counter {
        fn decide(&mut self, own: &[Decision], _opponent: &[Decision]) -> anyhow::Result<Decision> {
            assert_eq!(self.0, own.len());
            self.0 += 1;
            Ok(Decision::Defect)
        }
    }

    fn arbiter(budget_ms: u64) -> Arbiter {
        Arbiter::new(Duration::from_millis(budget_ms), Arc::new(DisqualificationSet::new()))
    }

    #[test]
    fn test_compliant_strategy_answers() {
        let arbiter = arbiter(500);
        let unit = StrategyUnit::from_fn("counter", || Counter(0));
        let mut seat = arbiter.seat(&unit).unwrap();
        let mut history = Vec::new();
        for _ in 0..5 {
            let decision = arbiter.decide(&mut seat, &history, &[]).unwrap();
            history.push(decision);
        }
        assert_eq!(history, vec![Decision::Defect; 5]);
        assert!(arbiter.disqualified().is_empty());
    }

    #[test]
    fn test_timeout_disqualifies_without_waiting() {
        let arbiter = arbiter(20);
        let unit = StrategyUnit::from_fn("sleepy", || Sleeper(Duration::from_secs(5)));
        let mut seat = arbiter.seat(&unit).unwrap();

        let started = Instant::now();
        let fault = arbiter.decide(&mut seat, &[], &[]).unwrap_err();
        drop(seat);

        assert!(fault.is_timeout());
        assert_eq!(fault.strategy(), "sleepy");
        assert!(started.elapsed() < Duration::from_secs(2), "arbiter waited for the hung call");
        assert!(arbiter.disqualified().contains("sleepy"));
    }

    #[test]
    fn test_error_is_execution_fault() {
        let arbiter = arbiter(500);
        let unit = StrategyUnit::from_fn("failing", || Failing);
        let mut seat = arbiter.seat(&unit).unwrap();
        let fault = arbiter.decide(&mut seat, &[], &[]).unwrap_err();
        assert!(matches!(fault, Fault::Execution { .. }));
        assert!(fault.to_string().contains("division by zero"));
        assert!(arbiter.disqualified().contains("failing"));
    }

    #[test]
    fn test_panic_is_execution_fault() {
        let arbiter = arbiter(500);
        let unit = StrategyUnit::from_fn("panicking", || Panicking);
        let mut seat = arbiter.seat(&unit).unwrap();
        let fault = arbiter.decide(&mut seat, &[], &[]).unwrap_err();
        assert!(matches!(fault, Fault::Execution { .. }));
        assert!(fault.to_string().contains("index out of range"));
    }

    #[test]
    fn test_construction_failure_disqualifies() {
        let arbiter = arbiter(500);
        let factory = || -> anyhow::Result<Instance> { anyhow::bail!("missing model file") };
        let unit = StrategyUnit::new("unbuildable", "test", Arc::new(factory));
        let fault = arbiter.seat(&unit).err().unwrap();
        assert!(matches!(fault, Fault::Construction { .. }));
        assert!(arbiter.disqualified().contains("unbuildable"));
    }

    /// Takes a while to get ready, then answers instantly
    struct SlowStart(Duration);

    impl Strategy for SlowStart {
        fn prepare(&mut self) -> anyhow::Result<()> {
            thread::sleep(self.0);
            Ok(())
        }

        fn decide(&mut self, _own: &[Decision], _opponent: &[Decision]) -> anyhow::Result<Decision> {
            Ok(Decision::Cooperate)
        }
    }

    #[test]
    fn test_startup_not_charged_to_first_move() {
        let arbiter = arbiter(20);
        let unit = StrategyUnit::from_fn("slow-start", || SlowStart(Duration::from_millis(150)));
        let mut seat = arbiter.seat(&unit).unwrap();
        assert_eq!(arbiter.decide(&mut seat, &[], &[]).unwrap(), Decision::Cooperate);
        assert!(arbiter.disqualified().is_empty());
    }

    #[test]
    fn test_missed_startup_budget_is_construction_fault() {
        let arbiter = arbiter(20).with_startup_budget(Duration::from_millis(50));
        let unit = StrategyUnit::from_fn("never-ready", || SlowStart(Duration::from_secs(2)));

        let started = Instant::now();
        let fault = arbiter.seat(&unit).err().unwrap();
        assert!(matches!(fault, Fault::Construction { .. }));
        assert!(fault.to_string().contains("not ready"));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(arbiter.disqualified().contains("never-ready"));
    }

    #[test]
    fn test_kill_switch_fired_on_timeout() {
        use std::sync::atomic::{AtomicBool, Ordering};

        struct Hung(Arc<AtomicBool>);

        impl Strategy for Hung {
            fn decide(&mut self, _own: &[Decision], _opponent: &[Decision]) -> anyhow::Result<Decision> {
                while !self.0.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
                anyhow::bail!("killed")
            }

            fn kill_switch(&self) -> Option<KillSwitch> {
                let flag = Arc::clone(&self.0);
                Some(KillSwitch::new(move || flag.store(true, Ordering::SeqCst)))
            }
        }

        let killed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&killed);
        let arbiter = arbiter(20);
        let unit = StrategyUnit::from_fn("hung", move || Hung(Arc::clone(&flag)));
        let mut seat = arbiter.seat(&unit).unwrap();
        assert!(arbiter.decide(&mut seat, &[], &[]).unwrap_err().is_timeout());
        assert!(killed.load(Ordering::SeqCst));
    }
}
