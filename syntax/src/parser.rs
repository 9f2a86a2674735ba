//! Recursive-descent parser for CSP scripts.
//!
//! A script is a sequence of statements: process definitions
//! (`P = …`, possibly parameterised), channel declarations
//! (`channel c : {0,1}.`) and alphabet assignments (`alpha P = {…}.`,
//! `alpha c(P) = {…}.`). The traced root process is the last
//! definition of the script.
//!
//! Operator binding, loosest to tightest:
//! `;` < `|| ||| [] |~| >> //` < `|` < `\` < prefixes
//! (`e ->`, `c?v ->`, `c!expr ->`, `l:`, `mu`).
//!
//! The parser builds nodes directly into the process graph and
//! records definitions in the symbol table; names referenced before
//! their equation has been read are queued and patched when the
//! outermost scope closes. Errors are reported and parsing resumes at
//! the next statement; a non-zero error count at the end means no
//! process is returned.

use csp_engine::diag::SourcePos;
use csp_engine::{
    Alphabet, BinOp, ChanId, Channel, EngineError, Expr, Output, ProcId,
    ProcessGraph, ProcessKind, SymTable, SymbolChanger,
};

use crate::scanner::{Scanner, Tok, Token};
use crate::source::Diagnostics;

/// Parse a script; returns the root process if it is error-free.
pub fn parse_script(
    source: &str,
    graph: &mut ProcessGraph,
    symtab: &mut SymTable,
    diags: &mut Diagnostics,
) -> Option<ProcId> {
    let mut parser = Parser::new(source, graph, symtab, diags);
    parser.script()
}

struct Parser<'a> {
    scanner: Scanner,
    cur: Token,
    next: Token,
    graph: &'a mut ProcessGraph,
    symtab: &'a mut SymTable,
    diags: &'a mut Diagnostics,
    /// Name of the definition being parsed, recorded on channel
    /// subscriptions for per-process channel alphabets.
    current_def: Option<String>,
    root: Option<ProcId>,
}

impl<'a> Parser<'a> {
    fn new(
        source: &str,
        graph: &'a mut ProcessGraph,
        symtab: &'a mut SymTable,
        diags: &'a mut Diagnostics,
    ) -> Self {
        let mut scanner = Scanner::new(source);
        let cur = fetch(&mut scanner, diags);
        let next = fetch(&mut scanner, diags);
        Self {
            scanner,
            cur,
            next,
            graph,
            symtab,
            diags,
            current_def: None,
            root: None,
        }
    }

    fn script(&mut self) -> Option<ProcId> {
        self.symtab.open();
        while self.cur.tok != Tok::Eof {
            if self.statement().is_none() {
                self.synchronize();
            }
        }
        if let Err(errors) = self.symtab.close(self.graph) {
            for e in errors {
                let pos = match &e {
                    EngineError::Unresolved { pos, .. }
                    | EngineError::ArityMismatch { pos, .. } => *pos,
                    _ => SourcePos::default(),
                };
                self.diags.error(pos, 1, &e.to_string());
            }
        }
        if self.diags.error_count() > 0 {
            return None;
        }
        if self.root.is_none() {
            self.diags.error(
                self.cur.pos,
                1,
                "the script defines no process to trace",
            );
        }
        self.root
    }

    // === statements ===

    fn statement(&mut self) -> Option<()> {
        match &self.cur.tok {
            Tok::Event(s) if s == "channel" => self.channel_declaration(),
            Tok::Alpha => self.alpha_declaration(),
            Tok::Process(_) => self.definition(),
            _ => {
                self.error_here(
                    "expected a process definition, channel or alpha declaration",
                );
                None
            }
        }
    }

    /// `channel c : <set>.`
    fn channel_declaration(&mut self) -> Option<()> {
        self.advance(); // the soft keyword
        let (name, pos) = self.expect_event("channel name")?;
        self.expect(Tok::Colon, "':'")?;
        let messages = self.set_expr()?;
        self.expect(Tok::Dot, "'.'")?;
        let id = self.channel_id(&name);
        if !self.graph.channel_mut(id).set_alphabet(messages) {
            self.diags.error(
                pos,
                name.len() as u32,
                &format!("the alphabet of channel {name} is already fixed"),
            );
        }
        Some(())
    }

    /// `alpha P = <set>.` or `alpha c(P) = <set>.`
    fn alpha_declaration(&mut self) -> Option<()> {
        self.advance(); // alpha
        match self.cur.tok.clone() {
            Tok::Process(name) => {
                let pos = self.cur.pos;
                self.advance();
                self.expect(Tok::Equal, "'='")?;
                let alphabet = self.set_expr()?;
                self.expect(Tok::Dot, "'.'")?;
                match self.symtab.lookup_process(&name) {
                    Some(id) => {
                        if let Err(e) = self.graph.set_alphabet(id, alphabet) {
                            self.diags.error(
                                pos,
                                name.len() as u32,
                                &e.to_string(),
                            );
                        }
                    }
                    None => self.diags.error(
                        pos,
                        name.len() as u32,
                        &format!("{name} is not defined"),
                    ),
                }
                Some(())
            }
            Tok::Event(chan) => {
                self.advance();
                self.expect(Tok::LParen, "'('")?;
                let (process, ppos) = self.expect_process("process name")?;
                self.expect(Tok::RParen, "')'")?;
                self.expect(Tok::Equal, "'='")?;
                let alphabet = self.set_expr()?;
                self.expect(Tok::Dot, "'.'")?;
                let id = self.channel_id(&chan);
                if !self
                    .graph
                    .channel_mut(id)
                    .set_process_alphabet(&process, alphabet)
                {
                    self.diags.error(
                        ppos,
                        process.len() as u32,
                        &format!(
                            "the alphabet of channel {chan} for {process} \
                             is already set"
                        ),
                    );
                }
                Some(())
            }
            _ => {
                self.error_here("expected a process or channel name");
                None
            }
        }
    }

    /// `N = P` or `N(p1, …, pk) = P`
    fn definition(&mut self) -> Option<()> {
        let (name, pos) = self.expect_process("process name")?;
        let mut params = Vec::new();
        if self.cur.tok == Tok::LParen {
            self.advance();
            loop {
                let (p, _) = self.expect_event("parameter name")?;
                params.push(p);
                if self.cur.tok == Tok::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(Tok::RParen, "')'")?;
        }
        self.expect(Tok::Equal, "'='")?;

        let def = self.graph.add_definition(&name, params, false);
        if let Err(e) = self.symtab.insert_process(&name, def) {
            self.diags.error(pos, name.len() as u32, &e.to_string());
        }
        self.current_def = Some(name);
        let body = self.process();
        self.current_def = None;
        let body = body?;
        self.graph.set_definition_body(def, body);
        self.root = Some(def);
        Some(())
    }

    /// Skip to something that can start a statement.
    fn synchronize(&mut self) {
        loop {
            match &self.cur.tok {
                Tok::Eof => return,
                Tok::Dot => {
                    self.advance();
                    return;
                }
                Tok::Alpha => return,
                Tok::Process(_)
                    if matches!(self.next.tok, Tok::Equal | Tok::LParen) =>
                {
                    return;
                }
                Tok::Event(s)
                    if s == "channel"
                        && matches!(self.next.tok, Tok::Event(_)) =>
                {
                    return;
                }
                _ => self.advance(),
            }
        }
    }

    // === processes ===

    fn process(&mut self) -> Option<ProcId> {
        let mut p = self.composition()?;
        while self.cur.tok == Tok::Semicolon {
            self.advance();
            let q = self.composition()?;
            p = self.graph.add(ProcessKind::Sequence { first: p, second: q });
        }
        Some(p)
    }

    fn composition(&mut self) -> Option<ProcId> {
        let mut p = self.selection()?;
        loop {
            let op = self.cur.tok.clone();
            if !matches!(
                op,
                Tok::Parallel
                    | Tok::Interleave
                    | Tok::ExternalChoice
                    | Tok::InternalChoice
                    | Tok::Pipe
                    | Tok::Subordination
            ) {
                break;
            }
            self.advance();
            let right = self.selection()?;
            let kind = match op {
                Tok::Parallel => ProcessKind::Parallel { left: p, right },
                Tok::Interleave => {
                    ProcessKind::Interleaving { left: p, right }
                }
                Tok::ExternalChoice => {
                    ProcessKind::ExternalChoice { left: p, right }
                }
                Tok::InternalChoice => {
                    ProcessKind::InternalChoice { left: p, right }
                }
                Tok::Pipe => {
                    ProcessKind::Pipe { left: p, right, reduced: None }
                }
                _ => ProcessKind::Subordination {
                    left: p,
                    right,
                    reduced: None,
                },
            };
            p = self.graph.add(kind);
        }
        Some(p)
    }

    fn selection(&mut self) -> Option<ProcId> {
        let first = self.hiding()?;
        if self.cur.tok != Tok::Bar {
            return Some(first);
        }
        let mut branches = vec![first];
        while self.cur.tok == Tok::Bar {
            self.advance();
            branches.push(self.hiding()?);
        }
        Some(self.graph.add(ProcessKind::Selection { branches }))
    }

    fn hiding(&mut self) -> Option<ProcId> {
        let mut p = self.prefix()?;
        while self.cur.tok == Tok::Backslash {
            let pos = self.cur.pos;
            self.advance();
            let hidden = self.set_atom()?;
            if hidden.is_empty() {
                self.diags.error(
                    pos,
                    1,
                    "the concealed event set must not be empty",
                );
                return None;
            }
            p = self.graph.add(ProcessKind::Concealed { inner: p, hidden });
        }
        Some(p)
    }

    fn prefix(&mut self) -> Option<ProcId> {
        match (self.cur.tok.clone(), &self.next.tok) {
            (Tok::Event(event), Tok::Arrow) => {
                self.advance();
                self.advance();
                let next = self.prefix()?;
                Some(self.graph.add(ProcessKind::Prefixed { event, next }))
            }
            (Tok::Event(chan), Tok::Question) => {
                self.advance();
                self.advance();
                let (variable, _) = self.expect_event("variable name")?;
                self.expect(Tok::Arrow, "'->'")?;
                let next = self.prefix()?;
                let channel = self.channel_id(&chan);
                Some(self.graph.add(ProcessKind::Reading {
                    channel,
                    variable,
                    next,
                    owner: self.current_def.clone(),
                }))
            }
            (Tok::Event(chan), Tok::Exclamation) => {
                self.advance();
                self.advance();
                let output = self.output()?;
                self.expect(Tok::Arrow, "'->'")?;
                let next = self.prefix()?;
                let channel = self.channel_id(&chan);
                Some(self.graph.add(ProcessKind::Writing {
                    channel,
                    output,
                    next,
                    owner: self.current_def.clone(),
                }))
            }
            (Tok::Event(label), Tok::Colon) => {
                self.advance();
                self.advance();
                let inner = self.prefix()?;
                Some(self.graph.add(ProcessKind::Mapped {
                    inner,
                    changer: SymbolChanger::qualifier(label),
                }))
            }
            (Tok::Event(_), _) => {
                self.error_here("expected '->' after the event");
                None
            }
            (Tok::Mu, _) => self.recursion(),
            _ => self.atom(),
        }
    }

    /// `mu N . P` or `mu N : {…} . P`
    fn recursion(&mut self) -> Option<ProcId> {
        self.advance(); // mu
        let (name, pos) = self.expect_process("recursion name")?;
        let def = self.graph.add_definition(&name, vec![], true);
        if self.cur.tok == Tok::Colon {
            self.advance();
            let alphabet = self.set_atom()?;
            if let Err(e) = self.graph.set_alphabet(def, alphabet) {
                self.diags.error(pos, name.len() as u32, &e.to_string());
            }
        }
        self.expect(Tok::Dot, "'.'")?;

        self.symtab.open();
        // the recursion name is in scope only within the body
        if let Err(e) = self.symtab.insert_process(&name, def) {
            self.diags.error(pos, name.len() as u32, &e.to_string());
        }
        let body = self.selection();
        if let Err(errors) = self.symtab.close(self.graph) {
            for e in errors {
                self.diags.error(pos, 1, &e.to_string());
            }
        }
        self.graph.set_definition_body(def, body?);
        Some(def)
    }

    fn atom(&mut self) -> Option<ProcId> {
        match self.cur.tok.clone() {
            Tok::LParen => {
                self.advance();
                let p = self.process()?;
                self.expect(Tok::RParen, "')'")?;
                Some(p)
            }
            Tok::Process(name) => self.reference(name),
            Tok::Stop => self.constant(|alpha_of| ProcessKind::Stop { alpha_of }),
            Tok::Run => self.constant(|alpha_of| ProcessKind::Run { alpha_of }),
            Tok::Skip => self.constant(|alpha_of| ProcessKind::Skip { alpha_of }),
            Tok::Chaos => {
                self.constant(|alpha_of| ProcessKind::Chaos { alpha_of })
            }
            _ => {
                self.error_here("expected a process");
                None
            }
        }
    }

    /// A reference `N` or `N(e₁, …, eₖ)`, resolved now when the name
    /// is known, queued for the scope close otherwise.
    fn reference(&mut self, name: String) -> Option<ProcId> {
        let pos = self.cur.pos;
        self.advance();
        let mut actuals = Vec::new();
        if self.cur.tok == Tok::LParen {
            self.advance();
            loop {
                match self.cur.tok.clone() {
                    Tok::Event(e) => {
                        actuals.push(e);
                        self.advance();
                    }
                    Tok::Integer(n) => {
                        actuals.push(n.to_string());
                        self.advance();
                    }
                    Tok::Str(s) => {
                        actuals.push(s);
                        self.advance();
                    }
                    _ => {
                        self.error_here("expected an argument");
                        return None;
                    }
                }
                if self.cur.tok == Tok::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(Tok::RParen, "')'")?;
        }
        let id = self.graph.add(ProcessKind::Reference {
            name: name.clone(),
            actuals,
            pos,
            target: None,
        });
        match self.symtab.lookup_process(&name) {
            Some(target) => {
                if let Err(e) = self.graph.resolve_reference(id, target) {
                    self.diags.error(pos, name.len() as u32, &e.to_string());
                }
            }
            None => self.symtab.add_pending(&name, pos, id),
        }
        Some(id)
    }

    /// `STOP {…}`, `RUN alpha P`, … — a constant with an explicit
    /// alphabet or one borrowed from another process.
    fn constant(
        &mut self,
        make: impl FnOnce(Option<ProcId>) -> ProcessKind,
    ) -> Option<ProcId> {
        self.advance(); // the constant keyword
        if self.cur.tok == Tok::Alpha {
            self.advance();
            let (name, pos) = self.expect_process("process name")?;
            let of = self.graph.add(ProcessKind::Reference {
                name: name.clone(),
                actuals: vec![],
                pos,
                target: None,
            });
            match self.symtab.lookup_process(&name) {
                Some(target) => {
                    if let Err(e) = self.graph.resolve_reference(of, target) {
                        self.diags.error(pos, name.len() as u32, &e.to_string());
                    }
                }
                None => self.symtab.add_pending(&name, pos, of),
            }
            return Some(self.graph.add(make(Some(of))));
        }
        let pos = self.cur.pos;
        let alphabet = self.set_atom()?;
        let id = self.graph.add(make(None));
        if let Err(e) = self.graph.set_alphabet(id, alphabet) {
            self.diags.error(pos, 1, &e.to_string());
        }
        Some(id)
    }

    /// The payload of `c!…`: a lone bound variable passes through
    /// verbatim, anything else is arithmetic.
    fn output(&mut self) -> Option<Output> {
        if let (Tok::Event(name), Tok::Arrow) =
            (self.cur.tok.clone(), &self.next.tok)
        {
            let pos = self.cur.pos;
            self.advance();
            return Some(Output::Var { name, pos });
        }
        Some(Output::Expr(self.expr()?))
    }

    // === arithmetic expressions ===

    fn expr(&mut self) -> Option<Expr> {
        let mut e = self.expr_term()?;
        loop {
            let op = match self.cur.tok {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.expr_term()?;
            e = Expr::binary(op, e, rhs);
        }
        Some(e)
    }

    fn expr_term(&mut self) -> Option<Expr> {
        let mut e = self.expr_factor()?;
        loop {
            let op = match self.cur.tok {
                Tok::Star => BinOp::Mul,
                Tok::Div => BinOp::Div,
                Tok::Mod => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.expr_factor()?;
            e = Expr::binary(op, e, rhs);
        }
        Some(e)
    }

    fn expr_factor(&mut self) -> Option<Expr> {
        match self.cur.tok.clone() {
            Tok::Event(name) => {
                let pos = self.cur.pos;
                self.advance();
                Some(Expr::var(name, pos))
            }
            Tok::Integer(n) => {
                self.advance();
                Some(Expr::Lit(n))
            }
            Tok::LParen => {
                self.advance();
                let e = self.expr()?;
                self.expect(Tok::RParen, "')'")?;
                Some(e)
            }
            _ => {
                self.error_here("expected a variable or integer");
                None
            }
        }
    }

    // === event sets ===

    fn set_expr(&mut self) -> Option<Alphabet> {
        let mut a = self.set_term()?;
        loop {
            match self.cur.tok {
                Tok::Plus => {
                    self.advance();
                    a = a.union(&self.set_term()?);
                }
                Tok::Minus => {
                    self.advance();
                    a = a.difference(&self.set_term()?);
                }
                _ => return Some(a),
            }
        }
    }

    fn set_term(&mut self) -> Option<Alphabet> {
        let mut a = self.set_atom()?;
        while self.cur.tok == Tok::Star {
            self.advance();
            a = a.intersection(&self.set_atom()?);
        }
        Some(a)
    }

    fn set_atom(&mut self) -> Option<Alphabet> {
        match self.cur.tok.clone() {
            Tok::LBrace => {
                self.advance();
                let mut a = Alphabet::new();
                if self.cur.tok != Tok::RBrace {
                    loop {
                        a.add(self.member()?);
                        if self.cur.tok == Tok::Comma {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Tok::RBrace, "'}'")?;
                Some(a)
            }
            Tok::IntegerKw => {
                self.advance();
                Some(Alphabet::integer())
            }
            Tok::StringKw => {
                self.advance();
                Some(Alphabet::string())
            }
            Tok::LParen => {
                self.advance();
                let a = self.set_expr()?;
                self.expect(Tok::RParen, "')'")?;
                Some(a)
            }
            _ => {
                self.error_here("expected an event set");
                None
            }
        }
    }

    /// One member of a set literal: an event, integer or string, or a
    /// qualified `chan.tail` form; `chan.integer` / `chan.string`
    /// denote all messages of that kind on the channel.
    fn member(&mut self) -> Option<String> {
        match self.cur.tok.clone() {
            Tok::Event(e) => {
                self.advance();
                if self.cur.tok != Tok::Dot {
                    return Some(e);
                }
                self.advance();
                let tail = match self.cur.tok.clone() {
                    Tok::Event(t) => t,
                    Tok::Integer(n) => n.to_string(),
                    Tok::Str(s) => s,
                    Tok::IntegerKw => "*integer*".to_string(),
                    Tok::StringKw => "*string*".to_string(),
                    _ => {
                        self.error_here("expected a message after '.'");
                        return None;
                    }
                };
                self.advance();
                Some(format!("{e}.{tail}"))
            }
            Tok::Integer(n) => {
                self.advance();
                Some(n.to_string())
            }
            Tok::Str(s) => {
                self.advance();
                Some(s)
            }
            _ => {
                self.error_here("expected an event");
                None
            }
        }
    }

    // === helpers ===

    /// Look a channel up, declaring it implicitly on first use.
    fn channel_id(&mut self, name: &str) -> ChanId {
        if let Some(id) = self.symtab.lookup_channel(name) {
            return id;
        }
        let id = self.graph.new_channel(Channel::new(name));
        // first use wins; a later `channel` declaration fixes the alphabet
        let _ = self.symtab.insert_channel(name, id);
        id
    }

    fn advance(&mut self) {
        self.cur = std::mem::replace(
            &mut self.next,
            fetch(&mut self.scanner, self.diags),
        );
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Option<()> {
        if self.cur.tok == tok {
            self.advance();
            Some(())
        } else {
            self.error_here(&format!("expected {what}"));
            None
        }
    }

    fn expect_event(&mut self, what: &str) -> Option<(String, SourcePos)> {
        match self.cur.tok.clone() {
            Tok::Event(name) => {
                let pos = self.cur.pos;
                self.advance();
                Some((name, pos))
            }
            _ => {
                self.error_here(&format!("expected a {what}"));
                None
            }
        }
    }

    fn expect_process(&mut self, what: &str) -> Option<(String, SourcePos)> {
        match self.cur.tok.clone() {
            Tok::Process(name) => {
                let pos = self.cur.pos;
                self.advance();
                Some((name, pos))
            }
            _ => {
                self.error_here(&format!("expected a {what}"));
                None
            }
        }
    }

    fn error_here(&mut self, message: &str) {
        let (pos, len) = (self.cur.pos, self.cur.len);
        self.diags.error(pos, len, message);
    }
}

fn fetch(scanner: &mut Scanner, diags: &mut Diagnostics) -> Token {
    loop {
        match scanner.next_token() {
            Ok(token) => return token,
            Err(e) => diags.error(e.pos, e.len, &e.message),
        }
    }
}
