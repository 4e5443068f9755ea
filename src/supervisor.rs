//! Supervised units of execution.
//!
//! On the board every bridge runs as its own OS process: the binary
//! re-executes itself with a `unit` subcommand, and the child owns its
//! resources outright (pins, subscription, voice client).  Units talk to
//! the rest of the system only through pipes and the pub/sub transport.
//! The supervisor starts units, reports liveness, and stops them with
//! SIGINT, escalating to a kill when a bounded terminate runs out.
//!
//! ```text
//!   spawn(name, cmd) ──▶ [ child: run_unit(routine) ] ──▶ exit code
//!   start(name, f)   ──▶ [ thread: routine(interrupt) ] ──▶ ExitStatus
//!            ▲                         │
//!   terminate ─ SIGINT / raise ────────┘  wait / join
//! ```
//!
//! Thread units carry the behavior router and every unit of a bench run
//! on the in-process broker.
//!
//! An interrupt is a normal stop request, not an error.  A routine that
//! returns `Err` or panics exits as [`ExitStatus::Failed`].

use std::os::unix::process::ExitStatusExt;
use std::panic::{self, AssertUnwindSafe};
use std::process::{Child, ChildStderr, ChildStdout, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::error::{Result, SupervisorError};

/// How often a bounded terminate checks whether a child has exited.
const EXIT_POLL: Duration = Duration::from_millis(10);

// ───────────────────────────────────────────────────────────────
// Interrupt
// ───────────────────────────────────────────────────────────────

/// Stop request shared between a unit and whoever may cancel it.
///
/// Raising is sticky: once raised it stays raised.  Sleeping units wake
/// immediately when it is raised.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `duration` or until raised.  Returns `true` if raised.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, duration, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

// ───────────────────────────────────────────────────────────────
// Exit status
// ───────────────────────────────────────────────────────────────

/// How a unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// The routine returned on its own.
    Completed,
    /// The routine returned after its interrupt was raised.
    Interrupted,
    /// The routine returned an error or panicked.
    Failed(String),
    /// The unit ignored its interrupt and was killed.
    Killed,
}

impl ExitStatus {
    /// Process exit code a child unit reports this status with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed | Self::Interrupted => 0,
            Self::Failed(_) => 1,
            Self::Killed => 137,
        }
    }

    /// Interpret a child's exit.  `interrupted` is whether SIGINT was sent.
    fn from_child(status: std::process::ExitStatus, interrupted: bool) -> Self {
        match (status.code(), status.signal()) {
            (Some(0), _) if interrupted => Self::Interrupted,
            (Some(0), _) => Self::Completed,
            (Some(code), _) => Self::Failed(format!("exit code {code}")),
            (None, Some(sig)) if interrupted && sig == Signal::SIGINT as i32 => Self::Interrupted,
            (None, Some(sig)) => Self::Failed(format!("terminated by signal {sig}")),
            (None, None) => Self::Failed("unknown exit".into()),
        }
    }
}

/// Run `routine` to completion and classify how it ended.
fn run_routine<F>(name: &str, routine: F, interrupt: &Interrupt) -> ExitStatus
where
    F: FnOnce(Interrupt) -> Result<()>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| routine(interrupt.clone())));
    match outcome {
        Ok(Ok(())) if interrupt.is_raised() => {
            info!("{}: interrupted, cleanup done", name);
            ExitStatus::Interrupted
        }
        Ok(Ok(())) => ExitStatus::Completed,
        Ok(Err(e)) => {
            error!("{}: {}", name, e);
            ExitStatus::Failed(e.to_string())
        }
        Err(_) => {
            error!("{}: routine panicked", name);
            ExitStatus::Failed("routine panicked".into())
        }
    }
}

/// Body of a child unit process.
///
/// SIGINT raises the routine's interrupt, so the routine runs its own
/// cleanup before the process exits.  Call once per process, then exit
/// with [`ExitStatus::exit_code`].
pub fn run_unit<F>(name: &str, routine: F) -> ExitStatus
where
    F: FnOnce(Interrupt) -> Result<()>,
{
    let interrupt = Interrupt::new();
    let on_signal = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || on_signal.raise()) {
        error!("{}: unable to handle SIGINT: {}", name, e);
        return ExitStatus::Failed(e.to_string());
    }
    info!("{} running (pid {})", name, std::process::id());
    let status = run_routine(name, routine, &interrupt);
    info!("{} exited: {:?}", name, status);
    status
}

// ───────────────────────────────────────────────────────────────
// Supervised unit
// ───────────────────────────────────────────────────────────────

/// Clears the liveness flag and closes the exit channel when a thread
/// unit finishes, however it finishes.
struct ExitNotifier {
    alive: Arc<AtomicBool>,
    _exited: Sender<()>,
}

impl Drop for ExitNotifier {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

enum Unit {
    Thread {
        interrupt: Interrupt,
        alive: Arc<AtomicBool>,
        exited: mpsc::Receiver<()>,
        handle: JoinHandle<ExitStatus>,
    },
    Child {
        child: Child,
        interrupted: bool,
    },
}

/// Handle to a running unit.
pub struct SupervisedProcess {
    name: String,
    unit: Unit,
}

impl SupervisedProcess {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id, for child units.
    pub fn pid(&self) -> Option<u32> {
        match &self.unit {
            Unit::Child { child, .. } => Some(child.id()),
            Unit::Thread { .. } => None,
        }
    }

    pub fn is_alive(&mut self) -> bool {
        match &mut self.unit {
            Unit::Thread { alive, .. } => alive.load(Ordering::Acquire),
            Unit::Child { child, .. } => matches!(child.try_wait(), Ok(None)),
        }
    }

    /// Ask the unit to stop without waiting for it: raise a thread's
    /// interrupt, or send SIGINT to a child.
    pub fn interrupt(&mut self) {
        match &mut self.unit {
            Unit::Thread { interrupt, .. } => interrupt.raise(),
            Unit::Child { child, interrupted } => {
                *interrupted = true;
                // A reaped pid may already belong to someone else.
                if !matches!(child.try_wait(), Ok(None)) {
                    return;
                }
                if let Err(e) = send_sigint(child) {
                    warn!("{}: SIGINT not delivered: {}", self.name, e);
                }
            }
        }
    }

    /// The child's piped stdout, if it was spawned with one.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        match &mut self.unit {
            Unit::Child { child, .. } => child.stdout.take(),
            Unit::Thread { .. } => None,
        }
    }

    /// The child's piped stderr, if it was spawned with one.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        match &mut self.unit {
            Unit::Child { child, .. } => child.stderr.take(),
            Unit::Thread { .. } => None,
        }
    }

    /// Interrupt the unit and block until it has exited.
    pub fn terminate(mut self) -> ExitStatus {
        self.interrupt();
        self.join()
    }

    /// Like [`terminate`](Self::terminate) but bounded by `timeout`.
    ///
    /// A child that does not stop in time is killed and reported as
    /// [`ExitStatus::Killed`].  Threads cannot be killed, so a thread unit
    /// that does not stop in time is detached with
    /// [`SupervisorError::TerminateTimedOut`] and keeps running until its
    /// next interrupt check.
    pub fn terminate_timeout(mut self, timeout: Duration) -> Result<ExitStatus> {
        self.interrupt();
        let deadline = Instant::now() + timeout;
        match &mut self.unit {
            Unit::Thread { exited, .. } => match exited.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => {
                    warn!("{} did not stop within {:?}, detaching", self.name, timeout);
                    Err(SupervisorError::TerminateTimedOut.into())
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => Ok(self.join()),
            },
            Unit::Child { child, .. } => {
                while Instant::now() < deadline {
                    match child.try_wait() {
                        Ok(None) => thread::sleep(EXIT_POLL),
                        Ok(Some(_)) | Err(_) => return Ok(self.join()),
                    }
                }
                warn!("{} did not stop within {:?}, killing", self.name, timeout);
                if let Err(e) = child.kill() {
                    warn!("{}: kill failed: {}", self.name, e);
                }
                let _ = child.wait();
                info!("{} exited: {:?}", self.name, ExitStatus::Killed);
                Ok(ExitStatus::Killed)
            }
        }
    }

    /// Block until the unit exits.
    pub fn join(self) -> ExitStatus {
        let status = match self.unit {
            Unit::Thread { handle, .. } => handle.join().unwrap_or_else(|_| {
                ExitStatus::Failed("unit panicked outside its routine".into())
            }),
            Unit::Child {
                mut child,
                interrupted,
            } => match child.wait() {
                Ok(status) => ExitStatus::from_child(status, interrupted),
                Err(e) => ExitStatus::Failed(format!("wait failed: {e}")),
            },
        };
        info!("{} exited: {:?}", self.name, status);
        status
    }
}

fn send_sigint(child: &Child) -> core::result::Result<(), SupervisorError> {
    let pid = i32::try_from(child.id()).map_err(|_| SupervisorError::SignalFailed)?;
    kill(Pid::from_raw(pid), Signal::SIGINT).map_err(|_| SupervisorError::SignalFailed)
}

fn check_name(name: &str) -> core::result::Result<(), SupervisorError> {
    if name.is_empty() || name.contains('\0') {
        return Err(SupervisorError::InvalidName);
    }
    Ok(())
}

/// Start `command` as a child unit process.
///
/// Returns `None`, after logging at error level, if the process cannot be
/// created.  Callers must treat a missing handle as "feature unavailable".
pub fn spawn(name: &str, mut command: Command) -> Option<SupervisedProcess> {
    let spawned = check_name(name).and_then(|()| {
        command
            .spawn()
            .map_err(|e| SupervisorError::SpawnFailed(e.kind()))
    });
    match spawned {
        Ok(child) => {
            info!("{} started (pid {})", name, child.id());
            Some(SupervisedProcess {
                name: name.to_owned(),
                unit: Unit::Child {
                    child,
                    interrupted: false,
                },
            })
        }
        Err(e) => {
            error!("unable to start {}: {}", name, e);
            None
        }
    }
}

/// Start `routine` in its own thread unit.
///
/// Returns `None`, after logging at error level, if the unit cannot be
/// created.  Callers must treat a missing handle as "feature unavailable".
pub fn start<F>(name: &str, routine: F) -> Option<SupervisedProcess>
where
    F: FnOnce(Interrupt) -> Result<()> + Send + 'static,
{
    match try_start(name, routine) {
        Ok(unit) => {
            info!("{} started", name);
            Some(unit)
        }
        Err(e) => {
            error!("unable to start {}: {}", name, e);
            None
        }
    }
}

fn try_start<F>(name: &str, routine: F) -> core::result::Result<SupervisedProcess, SupervisorError>
where
    F: FnOnce(Interrupt) -> Result<()> + Send + 'static,
{
    check_name(name)?;

    let interrupt = Interrupt::new();
    let alive = Arc::new(AtomicBool::new(true));
    let (exited_tx, exited) = mpsc::channel();

    let notifier = ExitNotifier {
        alive: alive.clone(),
        _exited: exited_tx,
    };
    let unit_interrupt = interrupt.clone();
    let unit_name = name.to_owned();

    let handle = thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            let _notifier = notifier;
            run_routine(&unit_name, routine, &unit_interrupt)
        })
        .map_err(|e| SupervisorError::SpawnFailed(e.kind()))?;

    Ok(SupervisedProcess {
        name: name.to_owned(),
        unit: Unit::Thread {
            interrupt,
            alive,
            exited,
            handle,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, PinError};
    use crate::gpio::PinId;

    #[test]
    fn sleep_wakes_on_raise() {
        let interrupt = Interrupt::new();
        let remote = interrupt.clone();
        let t = thread::spawn(move || remote.sleep(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        interrupt.raise();
        assert!(t.join().unwrap());
    }

    #[test]
    fn sleep_times_out_when_not_raised() {
        assert!(!Interrupt::new().sleep(Duration::from_millis(5)));
    }

    #[test]
    fn terminate_joins_and_reports_interrupted() {
        let mut unit = start("looper", |interrupt| {
            while !interrupt.sleep(Duration::from_millis(10)) {}
            Ok(())
        })
        .unwrap();
        assert!(unit.is_alive());
        assert_eq!(unit.pid(), None);
        assert_eq!(unit.terminate(), ExitStatus::Interrupted);
    }

    #[test]
    fn routine_error_is_failed_status() {
        let unit = start("failing", |_| {
            Err(Error::Pin(PinError::NotConfigured(PinId(16))))
        })
        .unwrap();
        assert_eq!(
            unit.join(),
            ExitStatus::Failed("pin: GPIO16 is not configured".into())
        );
    }

    #[test]
    fn panic_is_contained() {
        let unit = start("panicker", |_| panic!("boom")).unwrap();
        assert_eq!(unit.join(), ExitStatus::Failed("routine panicked".into()));
    }

    #[test]
    fn invalid_name_is_start_failure() {
        assert!(start("bad\0name", |_| Ok(())).is_none());
        assert!(start("", |_| Ok(())).is_none());
    }

    #[test]
    fn bounded_terminate_gives_up() {
        let unit = start("stubborn", |_| {
            thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .unwrap();
        let started = Instant::now();
        let result = unit.terminate_timeout(Duration::from_millis(20));
        assert_eq!(
            result,
            Err(Error::Supervisor(SupervisorError::TerminateTimedOut))
        );
        assert!(started.elapsed() < Duration::from_millis(300));
    }

    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn sigint_stops_a_child_unit() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let mut unit = spawn("sleeper", cmd).unwrap();
        assert!(unit.is_alive());
        assert!(unit.pid().is_some());
        assert_eq!(unit.terminate(), ExitStatus::Interrupted);
    }

    #[test]
    fn child_cleanup_runs_before_terminate_returns() {
        let marker = std::env::temp_dir().join(format!("rokku-cleanup-{}", std::process::id()));
        let script = format!(
            "trap 'touch {}; exit 0' INT; while :; do sleep 0.02; done",
            marker.display()
        );
        let unit = spawn("trapper", shell(&script)).unwrap();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(unit.terminate(), ExitStatus::Interrupted);
        assert!(marker.exists(), "trap ran before terminate returned");
        std::fs::remove_file(marker).unwrap();
    }

    #[test]
    fn child_exit_codes_map_to_status() {
        assert_eq!(spawn("ok", shell("exit 0")).unwrap().join(), ExitStatus::Completed);
        assert_eq!(
            spawn("bad", shell("exit 3")).unwrap().join(),
            ExitStatus::Failed("exit code 3".into())
        );
    }

    #[test]
    fn stubborn_child_is_killed_after_timeout() {
        let unit = spawn("stubborn child", shell("trap '' INT; exec sleep 30")).unwrap();
        thread::sleep(Duration::from_millis(200));
        let started = Instant::now();
        assert_eq!(
            unit.terminate_timeout(Duration::from_millis(100)),
            Ok(ExitStatus::Killed)
        );
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_program_is_spawn_failure() {
        assert!(spawn("ghost", Command::new("/nonexistent/rokku-unit")).is_none());
        assert!(spawn("", Command::new("true")).is_none());
    }

    #[test]
    fn child_stdout_can_be_taken_once() {
        let mut cmd = shell("echo hello");
        cmd.stdout(std::process::Stdio::piped());
        let mut unit = spawn("talker", cmd).unwrap();
        let mut text = String::new();
        std::io::Read::read_to_string(&mut unit.take_stdout().unwrap(), &mut text).unwrap();
        assert_eq!(text, "hello\n");
        assert!(unit.take_stdout().is_none());
        assert_eq!(unit.join(), ExitStatus::Completed);
    }

    #[test]
    fn exit_codes_for_child_units() {
        assert_eq!(ExitStatus::Interrupted.exit_code(), 0);
        assert_eq!(ExitStatus::Completed.exit_code(), 0);
        assert_eq!(ExitStatus::Failed("x".into()).exit_code(), 1);
    }
}
