//! Bot channels: the only way the engine talks to a bot.
//!
//! RULE: one request, one response, strictly in turn. The engine writes
//! a line and blocks until a line comes back; there is no deadline, so a
//! hung bot stalls the round.
//!
//! Diagnostics (a process bot's stderr) are drained by a dedicated
//! thread into an append-only queue for the life of the channel. That
//! thread never touches game state; the engine empties the queue between
//! ticks.

use crate::error::{SimError, SimResult};
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long a bot gets to exit on its own after its stdin is closed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

pub trait BotChannel: Send {
    /// Human-readable name for logs.
    fn label(&self) -> &str;

    /// Send one request line and block for one response line.
    /// End of stream is `io::ErrorKind::UnexpectedEof`.
    fn exchange(&mut self, request: &str) -> io::Result<String>;

    /// Take every diagnostic line queued since the last call.
    fn drain_diagnostics(&mut self) -> Vec<String>;

    /// Ask the bot to exit, wait up to `grace`, then force it.
    /// Must be safe to call more than once.
    fn shutdown(&mut self, grace: Duration);

    /// A way to stop the bot from another thread, even while `exchange`
    /// is blocked on it. Used for interrupts.
    fn stop_hook(&self) -> Option<StopHook> {
        None
    }
}

/// Stops one bot from outside the thread that talks to it.
pub type StopHook = Box<dyn Fn() + Send + Sync>;

// ── Process-backed bot ──────────────────────────────────────────────

/// The parts of a bot process that another thread may need to stop it
/// while the engine is blocked reading its output.
struct ProcessControl {
    label: String,
    child: Mutex<Child>,
    stdin: Mutex<Option<ChildStdin>>,
    finished: AtomicBool,
}

impl ProcessControl {
    /// Close stdin, wait up to `grace`, then kill. Runs once.
    fn terminate(&self, grace: Duration) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        // Closing stdin is the polite request to exit. A writer stuck on a
        // full pipe holds the lock; the kill below still ends it.
        if let Ok(mut stdin) = self.stdin.try_lock() {
            drop(stdin.take());
        }

        let mut child = match self.child.lock() {
            Ok(child) => child,
            Err(poisoned) => poisoned.into_inner(),
        };
        let deadline = Instant::now() + grace;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    log::debug!("bot '{}' exited: {status}", self.label);
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                _ => break,
            }
        }
        log::debug!("bot '{}' did not exit within {grace:?}; killing", self.label);
        let _ = child.kill();
        let _ = child.wait();
    }
}

pub struct ProcessBot {
    control: Arc<ProcessControl>,
    stdout: BufReader<ChildStdout>,
    diagnostics: Receiver<String>,
    _drain: JoinHandle<()>,
}

impl ProcessBot {
    /// Start `program` with piped stdio, in its own process group on unix
    /// so a terminal interrupt reaches the runner and not the bot.
    pub fn spawn(program: &str, args: &[String], cwd: Option<&Path>) -> SimResult<Self> {
        Self::start(program.to_string(), program, args, cwd)
    }

    /// Start `<dir>/start.sh` from inside `dir`.
    pub fn launch_dir(dir: &Path) -> SimResult<Self> {
        let script = dir.join("start.sh");
        Self::start(dir.display().to_string(), &script.to_string_lossy(), &[], Some(dir))
    }

    fn start(label: String, program: &str, args: &[String], cwd: Option<&Path>) -> SimResult<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let spawn_err = |source: io::Error| SimError::BotSpawn {
            program: program.to_string(),
            source,
        };
        let mut child = cmd.spawn().map_err(spawn_err)?;

        let missing = |what: &str| spawn_err(io::Error::new(io::ErrorKind::BrokenPipe, format!("no {what} pipe")));
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let (tx, rx) = mpsc::channel();
        let drain = thread::Builder::new()
            .name(format!("bot-stderr-{}", child.id()))
            .spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            })
            .map_err(spawn_err)?;

        log::debug!("started bot '{program}' pid={}", child.id());
        Ok(Self {
            control: Arc::new(ProcessControl {
                label,
                child: Mutex::new(child),
                stdin: Mutex::new(Some(stdin)),
                finished: AtomicBool::new(false),
            }),
            stdout: BufReader::new(stdout),
            diagnostics: rx,
            _drain: drain,
        })
    }
}

impl BotChannel for ProcessBot {
    fn label(&self) -> &str {
        &self.control.label
    }

    fn exchange(&mut self, request: &str) -> io::Result<String> {
        {
            let mut guard = self
                .control
                .stdin
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "bot stdin poisoned"))?;
            let stdin = guard
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "bot already shut down"))?;
            stdin.write_all(request.as_bytes())?;
            stdin.write_all(b"\n")?;
            stdin.flush()?;
        }

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "bot closed its output"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn drain_diagnostics(&mut self) -> Vec<String> {
        self.diagnostics.try_iter().collect()
    }

    fn shutdown(&mut self, grace: Duration) {
        self.control.terminate(grace);
    }

    fn stop_hook(&self) -> Option<StopHook> {
        let control = Arc::clone(&self.control);
        Some(Box::new(move || control.terminate(SHUTDOWN_GRACE)))
    }
}

impl Drop for ProcessBot {
    fn drop(&mut self) {
        self.shutdown(SHUTDOWN_GRACE);
    }
}

// ── Scripted bot ────────────────────────────────────────────────────

type Responder = Box<dyn FnMut(&str) -> String + Send>;

/// Shared view into a scripted bot, kept by tests after the bot itself
/// has been handed to the engine.
#[derive(Clone, Default)]
pub struct ScriptHandle {
    transcript: Arc<Mutex<Vec<String>>>,
    shut_down: Arc<AtomicBool>,
}

impl ScriptHandle {
    /// Every request line the bot has received, in order.
    pub fn requests(&self) -> Vec<String> {
        self.transcript.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// In-process bot that answers from a script or a closure. Used for
/// deterministic tests and replays; behaves exactly like a process bot
/// from the engine's side.
pub struct ScriptedBot {
    label: String,
    responder: Responder,
    handle: ScriptHandle,
    hang_up_after: Option<usize>,
    chatter: Option<String>,
    exchanges: usize,
    diagnostics: Vec<String>,
}

impl ScriptedBot {
    /// Answer with `script` in order, then `WAIT` forever.
    pub fn new<I, S>(label: &str, script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queue: VecDeque<String> = script.into_iter().map(Into::into).collect();
        Self::from_fn(label, move |_| queue.pop_front().unwrap_or_else(|| "WAIT".into()))
    }

    /// Answer each request line with `f(request)`.
    pub fn from_fn(label: &str, f: impl FnMut(&str) -> String + Send + 'static) -> Self {
        Self {
            label: label.to_string(),
            responder: Box::new(f),
            handle: ScriptHandle::default(),
            hang_up_after: None,
            chatter: None,
            exchanges: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Behave like a process that exits after `n` answered requests.
    pub fn hang_up_after(mut self, n: usize) -> Self {
        self.hang_up_after = Some(n);
        self
    }

    /// Emit `line` as a diagnostic on every exchange.
    pub fn chatter(mut self, line: &str) -> Self {
        self.chatter = Some(line.to_string());
        self
    }

    pub fn handle(&self) -> ScriptHandle {
        self.handle.clone()
    }
}

impl BotChannel for ScriptedBot {
    fn label(&self) -> &str {
        &self.label
    }

    fn exchange(&mut self, request: &str) -> io::Result<String> {
        if self.handle.was_shut_down() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "bot already shut down"));
        }
        if self.hang_up_after.is_some_and(|n| self.exchanges >= n) {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "scripted hang-up"));
        }
        if let Ok(mut t) = self.handle.transcript.lock() {
            t.push(request.to_string());
        }
        if let Some(line) = &self.chatter {
            self.diagnostics.push(line.clone());
        }
        self.exchanges += 1;
        Ok((self.responder)(request))
    }

    fn drain_diagnostics(&mut self) -> Vec<String> {
        std::mem::take(&mut self.diagnostics)
    }

    fn shutdown(&mut self, _grace: Duration) {
        self.handle.shut_down.store(true, Ordering::SeqCst);
    }

    fn stop_hook(&self) -> Option<StopHook> {
        let flag = Arc::clone(&self.handle.shut_down);
        Some(Box::new(move || flag.store(true, Ordering::SeqCst)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_bot_replays_then_waits() {
        let mut bot = ScriptedBot::new("s", ["N", "E"]);
        assert_eq!(bot.exchange("{}").unwrap(), "N");
        assert_eq!(bot.exchange("{}").unwrap(), "E");
        assert_eq!(bot.exchange("{}").unwrap(), "WAIT");
        assert_eq!(bot.handle().requests().len(), 3);
    }

    #[test]
    fn scripted_hang_up_is_end_of_stream() {
        let mut bot = ScriptedBot::new("s", ["N"]).hang_up_after(1);
        bot.exchange("{}").unwrap();
        let err = bot.exchange("{}").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn chatter_is_drained_once() {
        let mut bot = ScriptedBot::new("s", ["WAIT"]).chatter("thinking");
        bot.exchange("{}").unwrap();
        bot.exchange("{}").unwrap();
        assert_eq!(bot.drain_diagnostics(), vec!["thinking", "thinking"]);
        assert!(bot.drain_diagnostics().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn process_bot_round_trips_and_drains_stderr() {
        let script = "while read line; do echo chatty >&2; echo 'S extra words'; done".to_string();
        let mut bot = ProcessBot::spawn("sh", &["-c".into(), script], None).unwrap();
        assert_eq!(bot.exchange("{\"tick\":0}").unwrap(), "S extra words");
        assert_eq!(bot.exchange("{\"tick\":1}").unwrap(), "S extra words");

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut diag = Vec::new();
        while diag.len() < 2 && Instant::now() < deadline {
            diag.extend(bot.drain_diagnostics());
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(diag, vec!["chatty", "chatty"]);
        bot.shutdown(SHUTDOWN_GRACE);
        assert!(bot.exchange("{}").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn process_bot_exit_is_end_of_stream() {
        let mut bot = ProcessBot::spawn("sh", &["-c".into(), "exit 0".into()], None).unwrap();
        let err = bot.exchange("{}").unwrap_err();
        assert!(
            matches!(err.kind(), io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe),
            "unexpected error kind {:?}",
            err.kind()
        );
    }

    #[cfg(unix)]
    #[test]
    fn stop_hook_unblocks_an_exchange_with_a_silent_bot() {
        let mut bot = ProcessBot::spawn("sh", &["-c".into(), "exec sleep 30".into()], None).unwrap();
        let stop = bot.stop_hook().unwrap();
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            let _ = tx.send(bot.exchange("{}"));
        });

        thread::sleep(Duration::from_millis(100));
        let started = Instant::now();
        stop();
        let result = rx.recv_timeout(Duration::from_secs(5)).expect("exchange returns after stop");
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        worker.join().unwrap();
    }

    #[test]
    fn scripted_stop_hook_marks_shut_down() {
        let bot = ScriptedBot::new("s", ["N"]);
        let handle = bot.handle();
        (bot.stop_hook().unwrap())();
        assert!(handle.was_shut_down());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = ProcessBot::spawn("/definitely/not/a/bot", &[], None).err().unwrap();
        assert!(matches!(err, SimError::BotSpawn { .. }), "got {err:?}");
    }
}
