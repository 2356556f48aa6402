//! Process adapter - one external bot program per player per round
//!
//! ## Architecture
//! - Level 2: [`BotLink`] (what the round engine talks to)
//! - Level 3: [`ProcessLink`] (child process with piped stdin/stdout)
//! - Level 4: reader and writer threads, bounded waits
//!
//! Both directions are bounded by the move deadline. Outgoing lines go to a
//! writer thread and the engine waits for the flush with `recv_timeout`, so a
//! bot that stops reading cannot block the round on a full pipe. Stdout is
//! drained by a reader thread that runs at most one line ahead of the engine.
//! A bot that misses a deadline is killed and passes for the rest of the
//! round, so a late answer can never be taken as the reply to a later prompt.
//!
//! On unix every bot runs in its own process group and the whole group is
//! killed, including anything a wrapper script started.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Lines the reader thread may hold before the engine asks for them
const READ_AHEAD: usize = 1;

/// How an exchange ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// A line came back before the hard timeout
    Answered,
    /// The prompt could not be delivered or nothing came back in time; the
    /// bot has been cut off
    TimedOut,
    /// The process is gone, never started, or closed its output
    Disconnected,
}

/// Result of sending a prompt and waiting for the reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange {
    /// The reply line, without its newline
    pub response: Option<String>,
    pub elapsed: Duration,
    pub outcome: ExchangeOutcome,
    /// Took longer than the deadline
    pub slow: bool,
}

impl Exchange {
    pub fn answered(line: String, elapsed: Duration, deadline: Duration) -> Self {
        Self {
            response: Some(line),
            elapsed,
            outcome: ExchangeOutcome::Answered,
            slow: elapsed > deadline,
        }
    }

    pub fn timed_out(elapsed: Duration) -> Self {
        Self {
            response: None,
            elapsed,
            outcome: ExchangeOutcome::TimedOut,
            slow: true,
        }
    }

    pub fn disconnected(elapsed: Duration) -> Self {
        Self {
            response: None,
            elapsed,
            outcome: ExchangeOutcome::Disconnected,
            slow: false,
        }
    }
}

/// Result of ending a bot's round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shutdown {
    pub elapsed: Duration,
    /// Did not exit within the shutdown deadline
    pub slow: bool,
}

/// Connection to one bot for one round
pub trait BotLink {
    /// Send the `BEGIN` line, giving up after `deadline`
    fn handshake(&mut self, line: &str, deadline: Duration);

    /// Send `outgoing` lines, then wait for one reply line; the whole
    /// exchange is bounded by `deadline`
    fn exchange(&mut self, outgoing: &[String], deadline: Duration) -> Exchange;

    /// Send the final lines, close the bot's input and wait for it to exit
    fn stop(&mut self, outgoing: &[String], deadline: Duration) -> Shutdown;
}

/// Failure to start a bot process
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("child process has no {0} pipe")]
    MissingPipe(&'static str),
}

/// Why outgoing lines did not reach the bot
#[derive(Debug)]
enum WriteFailure {
    /// Not flushed before the deadline; the bot is not reading
    Stalled,
    /// The pipe or the writer thread is gone
    Closed,
}

/// A running bot process
///
/// The reader and writer threads are detached. They end when their pipe
/// closes or their channel is dropped.
struct Running {
    child: Child,
    /// Dropping this closes the bot's stdin once queued lines are written
    outgoing: Option<Sender<Vec<String>>>,
    /// One result per batch handed to the writer thread
    written: Receiver<io::Result<()>>,
    lines: Receiver<String>,
}

impl Running {
    /// Hand `lines` to the writer thread and wait for the flush
    fn send(&self, lines: &[String], deadline: Duration) -> Result<(), WriteFailure> {
        let outgoing = self.outgoing.as_ref().ok_or(WriteFailure::Closed)?;
        outgoing.send(lines.to_vec()).map_err(|_| WriteFailure::Closed)?;
        match self.written.recv_timeout(deadline) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::debug!("write to bot failed: {}", e);
                Err(WriteFailure::Closed)
            }
            Err(RecvTimeoutError::Timeout) => Err(WriteFailure::Stalled),
            Err(RecvTimeoutError::Disconnected) => Err(WriteFailure::Closed),
        }
    }

    /// Kill and reap
    fn terminate(mut self) {
        self.outgoing.take();
        kill_group(&mut self.child);
        if let Err(e) = self.child.wait() {
            tracing::warn!("failed to reap bot process: {}", e);
        }
    }
}

/// [`BotLink`] backed by a child process
pub struct ProcessLink {
    label: String,
    running: Option<Running>,
}

impl ProcessLink {
    /// Spawn `command` with piped stdin and stdout
    pub fn launch(label: impl Into<String>, command: &[String]) -> Result<Self, LaunchError> {
        let (program, args) = command.split_first().ok_or(LaunchError::EmptyCommand)?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => {
                kill_group(&mut child);
                let _ = child.wait();
                return Err(LaunchError::MissingPipe("stdin"));
            }
        };
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                kill_group(&mut child);
                let _ = child.wait();
                return Err(LaunchError::MissingPipe("stdout"));
            }
        };
        let (outgoing, written) = spawn_writer(stdin);
        let lines = spawn_reader(stdout);

        Ok(Self {
            label: label.into(),
            running: Some(Running {
                child,
                outgoing: Some(outgoing),
                written,
                lines,
            }),
        })
    }

    /// Launch, falling back to a closed link that passes every turn
    pub fn connect(label: impl Into<String>, command: &[String]) -> Self {
        let label = label.into();
        match Self::launch(label.clone(), command) {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!("Bot {} could not be started: {}", label, e);
                Self::closed(label)
            }
        }
    }

    /// A link with no process behind it
    pub fn closed(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Cut the bot off for the rest of the round
    fn abandon(&mut self) {
        if let Some(running) = self.running.take() {
            running.terminate();
        }
    }
}

impl BotLink for ProcessLink {
    fn handshake(&mut self, line: &str, deadline: Duration) {
        let Some(running) = self.running.as_ref() else {
            return;
        };
        if let Err(e) = running.send(&[line.to_string()], deadline) {
            tracing::debug!("Bot {} did not take BEGIN: {:?}", self.label, e);
            self.abandon();
        }
    }

    fn exchange(&mut self, outgoing: &[String], deadline: Duration) -> Exchange {
        let start = Instant::now();
        let Some(running) = self.running.as_ref() else {
            return Exchange::disconnected(start.elapsed());
        };

        match running.send(outgoing, deadline) {
            Ok(()) => {}
            Err(WriteFailure::Stalled) => {
                tracing::debug!("Bot {} stopped reading its input", self.label);
                self.abandon();
                return Exchange::timed_out(start.elapsed());
            }
            Err(WriteFailure::Closed) => {
                tracing::debug!("Bot {} closed its input", self.label);
                self.abandon();
                return Exchange::disconnected(start.elapsed());
            }
        }

        let remaining = deadline.saturating_sub(start.elapsed());
        match running.lines.recv_timeout(remaining) {
            Ok(line) => Exchange::answered(line, start.elapsed(), deadline),
            Err(RecvTimeoutError::Timeout) => {
                self.abandon();
                Exchange::timed_out(start.elapsed())
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("Bot {} closed its output", self.label);
                self.abandon();
                Exchange::disconnected(start.elapsed())
            }
        }
    }

    fn stop(&mut self, outgoing: &[String], deadline: Duration) -> Shutdown {
        let start = Instant::now();
        let Some(mut running) = self.running.take() else {
            return Shutdown {
                elapsed: start.elapsed(),
                slow: false,
            };
        };

        match running.send(outgoing, deadline) {
            Ok(()) => {}
            Err(WriteFailure::Stalled) => {
                tracing::debug!("Bot {} stopped reading before its score", self.label);
                running.terminate();
                return Shutdown {
                    elapsed: start.elapsed(),
                    slow: true,
                };
            }
            Err(WriteFailure::Closed) => {
                tracing::debug!("Bot {} missed its score report", self.label);
            }
        }
        running.outgoing.take();

        let exited = wait_with_deadline(&mut running.child, deadline.saturating_sub(start.elapsed()));
        if !exited {
            running.terminate();
        }

        let elapsed = start.elapsed();
        Shutdown {
            elapsed,
            slow: !exited || elapsed > deadline,
        }
    }
}

impl Drop for ProcessLink {
    fn drop(&mut self) {
        self.abandon();
    }
}

/// Write each batch of lines, reporting every flush back
fn spawn_writer<W: Write + Send + 'static>(sink: W) -> (Sender<Vec<String>>, Receiver<io::Result<()>>) {
    let (tx, rx) = mpsc::channel::<Vec<String>>();
    let (done_tx, done_rx) = mpsc::sync_channel(1);
    thread::spawn(move || {
        let mut writer = BufWriter::new(sink);
        for batch in rx {
            let result = write_lines(&mut writer, &batch);
            let failed = result.is_err();
            if done_tx.send(result).is_err() || failed {
                break;
            }
        }
    });
    (tx, done_rx)
}

fn write_lines<W: Write>(writer: &mut W, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Forward lines into a bounded channel until EOF
fn spawn_reader<R: Read + Send + 'static>(source: R) -> Receiver<String> {
    let (tx, rx) = mpsc::sync_channel(READ_AHEAD);
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf: Vec<u8> = Vec::with_capacity(64);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Kill the bot's whole process group
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    // SAFETY: kill(2) touches no memory; the child is not reaped yet, so its
    // pid still names the group created at launch.
    let rc = unsafe { libc::kill(-pid, libc::SIGKILL) };
    if rc != 0 {
        if let Err(e) = child.kill() {
            tracing::debug!("kill failed (process probably exited): {}", e);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!("kill failed (process probably exited): {}", e);
    }
}

/// Poll until the child exits or `deadline` passes; true if it exited
fn wait_with_deadline(child: &mut Child, deadline: Duration) -> bool {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("failed to poll bot process: {}", e);
                return false;
            }
        }
        if start.elapsed() > deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const MOVE_DEADLINE: Duration = Duration::from_millis(1500);

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn lines(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    /// Reads BEGIN, then answers every prompt with the BEGIN line and the prompt
    const ECHO_BOT: &str = r#"
        read begin
        while read line; do
            case "$line" in
                DESTROY*|ACTIVATE*) echo "$begin / $line" ;;
            esac
        done
    "#;

    #[test]
    fn test_launch_empty_command() {
        assert!(matches!(
            ProcessLink::launch("empty", &[]),
            Err(LaunchError::EmptyCommand)
        ));
    }

    #[test]
    fn test_launch_missing_program() {
        let command = vec!["/definitely/not/a/bot".to_string()];
        assert!(matches!(
            ProcessLink::launch("ghost", &command),
            Err(LaunchError::Spawn { .. })
        ));

        let mut link = ProcessLink::connect("ghost", &command);
        assert!(!link.is_running());
        let exchange = link.exchange(&lines(&["DESTROY 0"]), MOVE_DEADLINE);
        assert_eq!(exchange.outcome, ExchangeOutcome::Disconnected);
        assert!(!exchange.slow);
        assert!(!link.stop(&[], Duration::from_secs(1)).slow);
    }

    #[test]
    fn test_handshake_and_exchange() {
        let mut link = ProcessLink::launch("echo", &sh(ECHO_BOT)).unwrap();
        link.handshake("BEGIN 2 4 8", MOVE_DEADLINE);

        let first = link.exchange(&lines(&["DESTROY 0"]), MOVE_DEADLINE);
        assert_eq!(first.outcome, ExchangeOutcome::Answered);
        assert_eq!(first.response.as_deref(), Some("BEGIN 2 4 8 / DESTROY 0"));
        assert!(!first.slow);

        let second = link.exchange(&lines(&["BROKEN 0 N N", "ACTIVATE 0"]), MOVE_DEADLINE);
        assert_eq!(second.response.as_deref(), Some("BEGIN 2 4 8 / ACTIVATE 0"));

        let shutdown = link.stop(&lines(&["OWNED 0 N N", "SCORE 0 0"]), Duration::from_secs(1));
        assert!(!shutdown.slow);
        assert!(!link.is_running());
    }

    #[test]
    fn test_timeout_cuts_bot_off() {
        let script = r#"
            while read line; do
                case "$line" in
                    DESTROY*) sleep 3; echo "VERTEX 0,0" ;;
                    ACTIVATE*) echo "VERTEX 0,0" ;;
                esac
            done
        "#;
        let mut link = ProcessLink::launch("sleepy", &sh(script)).unwrap();
        let deadline = Duration::from_millis(200);

        let exchange = link.exchange(&lines(&["DESTROY 0"]), deadline);
        assert_eq!(exchange.outcome, ExchangeOutcome::TimedOut);
        assert!(exchange.slow);
        assert!(exchange.response.is_none());
        assert!(exchange.elapsed < Duration::from_secs(2));
        assert!(!link.is_running());

        let next = link.exchange(&lines(&["ACTIVATE 0"]), deadline);
        assert_eq!(next.outcome, ExchangeOutcome::Disconnected);
        assert!(next.response.is_none());
    }

    #[test]
    fn test_exited_bot_is_disconnected() {
        let mut link = ProcessLink::launch("quitter", &sh("exit 0")).unwrap();
        let exchange = link.exchange(&lines(&["DESTROY 0"]), MOVE_DEADLINE);
        assert_eq!(exchange.outcome, ExchangeOutcome::Disconnected);
        assert!(!exchange.slow);
    }

    #[test]
    fn test_slow_shutdown_is_killed() {
        let script = "cat > /dev/null; sleep 5";
        let mut link = ProcessLink::launch("lingering", &sh(script)).unwrap();
        let shutdown = link.stop(&lines(&["SCORE 0"]), Duration::from_millis(200));
        assert!(shutdown.slow);
        assert!(shutdown.elapsed < Duration::from_secs(3));
        assert!(!link.is_running());
    }

    #[test]
    fn test_clean_shutdown() {
        let mut link = ProcessLink::launch("polite", &sh("cat > /dev/null")).unwrap();
        let shutdown = link.stop(&lines(&["SCORE 3 1"]), Duration::from_secs(1));
        assert!(!shutdown.slow);
    }

    #[test]
    fn test_answered_late_is_slow() {
        let exchange = Exchange::answered(
            "VERTEX 0,0".into(),
            Duration::from_millis(300),
            Duration::from_millis(200),
        );
        assert!(exchange.slow);
        assert_eq!(exchange.outcome, ExchangeOutcome::Answered);
    }

    #[test]
    fn test_bot_that_stops_reading_is_cut_off() {
        // Answers forever without reading, so its stdin pipe fills up
        let mut link = ProcessLink::launch("deaf", &sh("yes PASS")).unwrap();
        let report = format!("OWNED 0{}", " N".repeat(100));
        let batch: Vec<String> = std::iter::repeat(report)
            .take(100)
            .chain(["ACTIVATE 0".to_string()])
            .collect();
        let deadline = Duration::from_millis(200);
        let started = Instant::now();

        let mut last = None;
        for _ in 0..50 {
            let exchange = link.exchange(&batch, deadline);
            assert!(exchange.elapsed < Duration::from_secs(1));
            let answered = exchange.outcome == ExchangeOutcome::Answered;
            last = Some(exchange);
            if !answered {
                break;
            }
        }

        let exchange = last.unwrap();
        assert_eq!(exchange.outcome, ExchangeOutcome::TimedOut);
        assert!(exchange.slow);
        assert!(!link.is_running());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    /// Endless `PASS` lines, one per read call
    struct Flood {
        reads: Arc<AtomicUsize>,
    }

    impl Read for Flood {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let line = b"PASS\n";
            let n = line.len().min(buf.len());
            buf[..n].copy_from_slice(&line[..n]);
            Ok(n)
        }
    }

    #[test]
    fn test_reader_stays_bounded_behind_flooding_bot() {
        let reads = Arc::new(AtomicUsize::new(0));
        let lines = spawn_reader(Flood {
            reads: Arc::clone(&reads),
        });
        thread::sleep(Duration::from_millis(100));
        // One queued line, one blocked in send, at most one more being read
        assert!(reads.load(Ordering::SeqCst) <= READ_AHEAD + 2);

        assert_eq!(lines.recv_timeout(MOVE_DEADLINE).unwrap(), "PASS");
        thread::sleep(Duration::from_millis(50));
        assert!(reads.load(Ordering::SeqCst) <= READ_AHEAD + 3);
    }

    #[test]
    fn test_timeout_kills_whole_process_group() {
        let dir = std::env::temp_dir().join(format!("claimwar-group-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let marker = dir.join("alive");
        let script = format!(
            r#"(sleep 1; echo alive > "{}") & while read line; do sleep 5; done"#,
            marker.display()
        );
        let mut link = ProcessLink::launch("forking", &sh(&script)).unwrap();

        let exchange = link.exchange(&lines(&["DESTROY 0"]), Duration::from_millis(200));
        assert_eq!(exchange.outcome, ExchangeOutcome::TimedOut);

        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
