//! The step loop.
//!
//! Start-up prints the traced process, its alphabet and the initially
//! acceptable events (each suppressible); then events are taken one
//! at a time — from the user, or drawn by the PRNG in automatic mode —
//! and fed to `proceed` until the process terminates successfully
//! (`OK`), rejects an event (exit 1), or input runs out.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use csp_engine::{ProcId, ProcessGraph, Status};
use csp_syntax::Diagnostics;

pub struct Options {
    /// `-A`: print the alphabet, one event per line, and exit.
    pub alphabet_only: bool,
    /// `-a` clears this: print the alphabet at the beginning.
    pub show_alphabet: bool,
    /// `-e`: print events, if accepted.
    pub echo_events: bool,
    /// `-p` clears this: print the current process after each event.
    pub show_process: bool,
    /// `-v` clears this: print the set of acceptable events.
    pub show_acceptable: bool,
    /// `-P n`: trace automatically for up to `n` events.
    pub auto_events: Option<usize>,
}

pub struct Tracer {
    graph: ProcessGraph,
    current: ProcId,
    status: Status,
    diags: Diagnostics,
    opts: Options,
}

impl Tracer {
    pub fn new(
        graph: ProcessGraph,
        root: ProcId,
        status: Status,
        diags: Diagnostics,
        opts: Options,
    ) -> Self {
        Self { graph, current: root, status, diags, opts }
    }

    /// Run the trace; returns the process exit code.
    pub fn run(&mut self) -> Result<i32> {
        if self.opts.alphabet_only {
            for event in self.graph.alphabet(self.current).iter() {
                println!("{event}");
            }
            return Ok(0);
        }
        if self.opts.show_process {
            println!(
                "Tracing: {}",
                self.graph.display_expanded(self.current)
            );
        }
        if self.opts.show_alphabet {
            println!("Alphabet: {}", self.graph.alphabet(self.current));
        }
        if self.opts.show_acceptable {
            println!(
                "Acceptable: {}",
                self.graph.acceptable(self.current, &self.status)
            );
        }
        self.drain_runtime_diags();

        let code = match self.opts.auto_events {
            Some(budget) => self.run_automatic(budget),
            None => self.run_interactive()?,
        };
        Ok(code)
    }

    fn run_interactive(&mut self) -> Result<i32> {
        let mut editor = DefaultEditor::new()?;
        'trace: while !self.graph.accepts_success(self.current, &self.status)
        {
            let line = match editor.readline("") {
                Ok(line) => {
                    let _ = editor.add_history_entry(&line);
                    line
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            };
            for event in line.split_whitespace() {
                match self.take(event) {
                    Step::Accepted => {}
                    Step::Terminated => break 'trace,
                    Step::Rejected => {
                        eprintln!("cannot accept {event}");
                        return Ok(1);
                    }
                }
            }
        }
        println!("OK");
        Ok(0)
    }

    fn run_automatic(&mut self, budget: usize) -> i32 {
        for _ in 0..budget {
            if self.graph.accepts_success(self.current, &self.status) {
                break;
            }
            let acceptable =
                self.graph.acceptable(self.current, &self.status);
            let drawn = self
                .status
                .with_prng(|prng| acceptable.draw_event(prng));
            let Some(event) = drawn else {
                eprintln!("deadlock: no acceptable events");
                return 1;
            };
            match self.take(&event) {
                Step::Accepted => {}
                Step::Terminated => break,
                Step::Rejected => {
                    eprintln!("cannot accept {event}");
                    return 1;
                }
            }
        }
        println!("OK");
        0
    }

    /// Feed one event to the current process.
    fn take(&mut self, event: &str) -> Step {
        if !self.graph.alphabet(self.current).is_member(event) {
            println!("Not in alphabet: {event}");
            return Step::Accepted;
        }
        let (next, status) =
            self.graph.proceed(self.current, event, &self.status);
        self.drain_runtime_diags();
        let Some(next) = next else {
            return Step::Rejected;
        };
        self.current = next;
        self.status = status;
        if self.graph.accepts_success(self.current, &self.status) {
            return Step::Terminated;
        }
        if self.opts.echo_events {
            println!("{event}");
        }
        if self.opts.show_process {
            println!("Process: {}", self.graph.display_expanded(self.current));
        }
        if self.opts.show_acceptable {
            println!(
                "Acceptable: {}",
                self.graph.acceptable(self.current, &self.status)
            );
        }
        Step::Accepted
    }

    fn drain_runtime_diags(&mut self) {
        for diag in self.graph.diagnostics().drain() {
            self.diags.runtime(&diag);
        }
    }
}

enum Step {
    Accepted,
    Terminated,
    Rejected,
}
