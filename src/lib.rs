//! Thompson-style finite-state automaton for a small regular-expression
//! dialect, with whole-string matching.
//!
//! Construction follows Russ Cox's article
//! <https://swtch.com/~rsc/regexp/regexp1.html>: states live in a single
//! arena and refer to each other by index, and matching simulates every
//! path at once by keeping the set of live states (the *frontier*) instead
//! of backtracking.
//!
//! # Syntax
//!
//! | Pattern   | Meaning                                              |
//! |-----------|------------------------------------------------------|
//! | `c`       | the literal character `c`                            |
//! | `.`       | any single character, `\n` included                  |
//! | `[abc]`   | any of `a`, `b`, `c`                                 |
//! | `[a-z]`   | any character in the inclusive range `a..=z`         |
//! | `[^a-z]`  | any character **not** in the class                   |
//! | `U*`      | zero or more occurrences of the preceding unit `U`  |
//! | `U+`      | one or more occurrences of the preceding unit `U`   |
//! | `A\|B`    | either the whole of `A` or the whole of `B`          |
//!
//! There are no groups: `|` splits the entire pattern into top-level
//! alternatives, and `*`/`+` bind to the single unit before them.  Every
//! other character, including `(`, `?`, `$` and `\`, is a literal.
//!
//! # Architecture
//!
//! ```text
//! pattern ──RegexBuilder::build──>  Regex (State arena)  ──Matcher──>  bool
//! ```
//!
//! The builder makes one left-to-right pass over the pattern, keeping a
//! "tail" state whose dangling `out` edge receives the next unit.  A
//! repetition operator wraps the unit it follows in a [`State::Repeat`]:
//!
//! ```text
//!   a*        pred ──ε──> Repeat ──ε──> (next)
//!                          │  ^
//!                   repeat │  │ a
//!                          v  │
//!                           Lit(a)
//!
//!   a+        pred ──> Lit(a) ──a──> Repeat ──ε──> (next)
//!                        ^             │
//!                        └── repeat ───┘
//! ```
//!
//! Alternatives are built as independent chains and combined at the end
//! by a tree of [`State::Split`] branch points, with every chain's tail
//! merged into one [`State::Join`].
//!
//! The compiled [`Regex`] is immutable and `Send + Sync`.  Matching state
//! lives in a [`MatcherMemory`], so one `Regex` can serve any number of
//! concurrent matches as long as each has its own memory.

use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};
use std::iter::{Enumerate, Peekable};
use std::ops::{Index, IndexMut};
use std::str::Chars;

use indexmap::IndexSet;
use log::{debug, trace};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// An error returned when a pattern is structurally invalid.
///
/// Positions are 0-based character offsets into the pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A `[` without a matching `]`.
    #[error("unterminated character class starting at position {0}")]
    UnterminatedClass(usize),

    /// A `*` or `+` with no unit before it: at the start of the pattern,
    /// right after `|`, or right after another repetition operator.
    #[error("repetition operator `{op}` at position {position} has nothing to repeat")]
    DanglingRepetition { op: char, position: usize },

    /// A `|` with nothing on one of its sides.
    #[error("empty alternative at `|` in position {0}")]
    EmptyAlternative(usize),

    /// A class range whose end sorts before its start, like `[z-a]`.
    #[error("invalid range `{start}-{end}` in character class at position {position}")]
    InvalidRange {
        start: char,
        end: char,
        position: usize,
    },
}

// ---------------------------------------------------------------------------
// Character classes
// ---------------------------------------------------------------------------

/// A set of characters kept as sorted, non-overlapping inclusive ranges.
///
/// `[a-z]` is stored as the single range `('a', 'z')` rather than 26
/// members, so classes such as `[^\0-\u{10FFFF}]` stay small.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CharClass {
    ranges: Box<[(char, char)]>,
    negated: bool,
}

impl CharClass {
    /// Sort and merge `ranges` into canonical form.  Two classes with the
    /// same members therefore compare (and hash) equal, which lets the
    /// builder intern them.
    fn new(mut ranges: Vec<(char, char)>, negated: bool) -> Self {
        ranges.sort_unstable();
        let mut merged: Vec<(char, char)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some((_, last_end)) if (start as u32) <= (*last_end as u32) + 1 => {
                    if end > *last_end {
                        *last_end = end;
                    }
                }
                _ => merged.push((start, end)),
            }
        }
        Self {
            ranges: merged.into_boxed_slice(),
            negated,
        }
    }

    /// `true` iff `ch` is a member, XOR the class is negated.
    #[inline]
    fn contains(&self, ch: char) -> bool {
        let member = self
            .ranges
            .binary_search_by(|&(start, end)| {
                if end < ch {
                    Ordering::Less
                } else if start > ch {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
            .is_ok();
        member != self.negated
    }
}

/// Renders the class back in bracket syntax, e.g. `[^a-z0]`.
impl fmt::Display for CharClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        if self.negated {
            f.write_str("^")?;
        }
        for &(start, end) in self.ranges.iter() {
            write!(f, "{}", start.escape_debug())?;
            if start != end {
                write!(f, "-{}", end.escape_debug())?;
            }
        }
        f.write_str("]")
    }
}

/// Index into the class table ([`Regex::classes`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ClassIdx(usize);

impl ClassIdx {
    #[inline]
    fn idx(self) -> usize {
        self.0
    }
}

/// `classes[class_idx]` — typed access to the class table.
impl Index<ClassIdx> for [CharClass] {
    type Output = CharClass;

    #[inline]
    fn index(&self, idx: ClassIdx) -> &CharClass {
        &self[idx.idx()]
    }
}

// ---------------------------------------------------------------------------
// Automaton states
// ---------------------------------------------------------------------------

/// A single automaton state.
///
/// `Literal`, `Wildcard` and `CharClass` consume one character and are the
/// only states tested against input.  The others are structural: they are
/// expanded through their zero-width edges while computing the epsilon
/// closure in [`Matcher::addstate`], and never see a character.
#[derive(Clone, Copy, Debug)]
enum State {
    /// Entry point.  Exactly one per automaton.
    Start { out: StateIdx },

    /// Match exactly `ch`, then follow `out`.
    Literal { ch: char, out: StateIdx },

    /// Match any character, then follow `out`.
    Wildcard { out: StateIdx },

    /// Match any character in `classes[class]`, then follow `out`.
    CharClass { class: ClassIdx, out: StateIdx },

    /// Zero-or-more loop around the unit at `inner`.
    ///
    /// Both edges are zero-width: `inner` re-enters the unit, `out` skips
    /// past it.  The unit's own `out` points back here, which is the only
    /// kind of cycle an automaton can contain.
    Repeat { inner: StateIdx, out: StateIdx },

    /// Union branch point: follow both `out` and `out1`.
    Split { out: StateIdx, out1: StateIdx },

    /// Union merge point shared by the tails of every alternative.
    Join { out: StateIdx },

    /// The accepting state.  Exactly one per automaton, no outgoing edges.
    Termination,
}

/// The outgoing edges of a [`State`], split by kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edges {
    /// `Termination` only.
    None,
    /// Followed after the state accepts one input character.
    Consuming(StateIdx),
    /// Followed without consuming input.
    Epsilon(StateIdx),
    /// Two zero-width edges (`Repeat` and `Split`).
    EpsilonFork(StateIdx, StateIdx),
}

impl State {
    /// Whether this state accepts `ch`.  Always `false` for structural
    /// states.
    #[inline]
    fn accepts(&self, ch: char, classes: &[CharClass]) -> bool {
        match *self {
            State::Literal { ch: expected, .. } => ch == expected,
            State::Wildcard { .. } => true,
            State::CharClass { class, .. } => classes[class].contains(ch),
            State::Start { .. }
            | State::Repeat { .. }
            | State::Split { .. }
            | State::Join { .. }
            | State::Termination => false,
        }
    }

    #[inline]
    fn edges(&self) -> Edges {
        match *self {
            State::Literal { out, .. } | State::Wildcard { out } | State::CharClass { out, .. } => {
                Edges::Consuming(out)
            }
            State::Start { out } | State::Join { out } => Edges::Epsilon(out),
            State::Repeat { inner, out } => Edges::EpsilonFork(inner, out),
            State::Split { out, out1 } => Edges::EpsilonFork(out, out1),
            State::Termination => Edges::None,
        }
    }

    /// Overwrite the "dangling out" edge, the one wired to whatever comes
    /// next in the pattern.
    fn set_out(&mut self, next: StateIdx) {
        match self {
            State::Start { out }
            | State::Literal { out, .. }
            | State::Wildcard { out }
            | State::CharClass { out, .. }
            | State::Repeat { out, .. }
            | State::Join { out } => *out = next,
            other @ (State::Split { .. } | State::Termination) => {
                unreachable!("{:?} has no dangling edge", other)
            }
        }
    }
}

/// Index into the state arena ([`Regex::states`]).
///
/// [`StateIdx::NONE`] marks an edge that has not been wired yet.  No
/// `NONE` edge survives [`RegexBuilder::build`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct StateIdx(u32);

impl StateIdx {
    /// Sentinel for unwired edges during construction.
    const NONE: Self = Self(u32::MAX);

    /// Return the raw index as `usize`.  Panics on `NONE` in debug builds.
    #[inline]
    fn idx(self) -> usize {
        debug_assert!(self != Self::NONE, "StateIdx::NONE used as index");
        self.0 as usize
    }
}

impl fmt::Display for StateIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `states[state_idx]` — typed access to the state arena.
impl Index<StateIdx> for [State] {
    type Output = State;

    #[inline]
    fn index(&self, idx: StateIdx) -> &State {
        &self[idx.idx()]
    }
}

impl IndexMut<StateIdx> for [State] {
    #[inline]
    fn index_mut(&mut self, idx: StateIdx) -> &mut State {
        &mut self[idx.idx()]
    }
}

// ---------------------------------------------------------------------------
// Fragments (used during construction)
// ---------------------------------------------------------------------------

/// A chain of states with a `start` state and an `out` state whose
/// dangling edge will be wired to whatever follows.  Both are
/// [`StateIdx::NONE`] while the chain is empty.
#[derive(Clone, Copy, Debug)]
struct Fragment {
    start: StateIdx,
    out: StateIdx,
}

impl Fragment {
    const EMPTY: Self = Self::new(StateIdx::NONE, StateIdx::NONE);

    const fn new(start: StateIdx, out: StateIdx) -> Self {
        Self { start, out }
    }

    fn is_empty(&self) -> bool {
        self.start == StateIdx::NONE
    }
}

/// The alternative currently being compiled.
#[derive(Debug)]
struct Chain {
    frag: Fragment,
    /// The most recent unit, paired with the state whose edge leads into it
    /// (`NONE` when the unit opens the chain).  Taken by a repetition
    /// operator, so a second operator finds nothing to bind to.
    last_unit: Option<(StateIdx, StateIdx)>,
}

impl Chain {
    fn new() -> Self {
        Self {
            frag: Fragment::EMPTY,
            last_unit: None,
        }
    }
}

/// The two repetition operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Repetition {
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Repetition {
    fn op(self) -> char {
        match self {
            Repetition::ZeroOrMore => '*',
            Repetition::OneOrMore => '+',
        }
    }
}

// ---------------------------------------------------------------------------
// Compiled regex
// ---------------------------------------------------------------------------

struct StateList(Box<[State]>);

impl fmt::Debug for StateList {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_map().entries(self.0.iter().enumerate()).finish()
    }
}

impl std::ops::Deref for StateList {
    type Target = [State];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A compiled automaton ready for matching.
///
/// Immutable once built.  Use [`Regex::is_match`] for one-off checks, or a
/// [`MatcherMemory`] to match many inputs without reallocating.
#[derive(Debug)]
pub struct Regex {
    pattern: Box<str>,
    states: StateList,
    start: StateIdx,
    termination: StateIdx,
    /// Class table referenced by [`State::CharClass::class`].
    classes: Box<[CharClass]>,
}

/// Compile `pattern` into a [`Regex`].
pub fn compile(pattern: &str) -> Result<Regex, CompileError> {
    RegexBuilder::default().build(pattern)
}

/// Return `true` iff `regex` accepts the whole of `input`.
pub fn matches(regex: &Regex, input: &str) -> bool {
    regex.is_match(input)
}

impl Regex {
    /// Compile `pattern`.  Shorthand for [`compile`].
    pub fn new(pattern: &str) -> Result<Self, CompileError> {
        compile(pattern)
    }

    /// The pattern this automaton was compiled from.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Number of states in the automaton, `Start` and `Termination`
    /// included.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Return `true` iff the whole of `input` is accepted.
    pub fn is_match(&self, input: &str) -> bool {
        let mut memory = MatcherMemory::default();
        let mut matcher = memory.matcher(self);
        matcher.chunk(input);
        matcher.finish()
    }

    /// Emit a Graphviz DOT representation of the automaton.
    pub fn to_dot(&self, mut buffer: impl Write) -> io::Result<()> {
        let mut visited = vec![false; self.states.len()];
        writeln!(buffer, "digraph fsm {{")?;
        writeln!(buffer, "\trankdir=LR;")?;
        writeln!(buffer, "\t{} [shape=box];", self.start)?;
        let mut stack = vec![self.start];
        while let Some(s) = stack.pop() {
            let i = s.idx();
            if !visited[i] {
                visited[i] = true;
                writeln!(buffer, "\t// [{}] {:?}", s, self.states[s])?;
                self.write_dot_state(s, &mut buffer, &mut stack)?;
            }
        }
        writeln!(buffer, "}}")
    }

    fn write_dot_state(
        &self,
        idx: StateIdx,
        buffer: &mut impl Write,
        stack: &mut Vec<StateIdx>,
    ) -> io::Result<()> {
        match self.states[idx] {
            State::Start { out } | State::Join { out } => {
                stack.push(out);
                writeln!(buffer, "\t{} -> {} [label=\"ε\"];", idx, out)
            }
            State::Literal { ch, out } => {
                stack.push(out);
                writeln!(buffer, "\t{} -> {} [label=\"{}\"];", idx, out, ch.escape_debug())
            }
            State::Wildcard { out } => {
                stack.push(out);
                writeln!(buffer, "\t{} -> {} [label=\".\"];", idx, out)
            }
            State::CharClass { class, out } => {
                stack.push(out);
                writeln!(buffer, "\t{} -> {} [label=\"{}\"];", idx, out, self.classes[class])
            }
            State::Repeat { inner, out } => {
                stack.push(inner);
                writeln!(buffer, "\t{} -> {} [label=\"repeat\"];", idx, inner)?;
                stack.push(out);
                writeln!(buffer, "\t{} -> {} [label=\"ε\"];", idx, out)
            }
            State::Split { out, out1 } => {
                stack.push(out);
                writeln!(buffer, "\t{} -> {} [label=\"ε\"];", idx, out)?;
                stack.push(out1);
                writeln!(buffer, "\t{} -> {} [label=\"ε\"];", idx, out1)
            }
            State::Termination => writeln!(buffer, "\t{} [peripheries=2];", idx),
        }
    }
}

// ---------------------------------------------------------------------------
// Automaton builder (pattern -> states)
// ---------------------------------------------------------------------------

type Tokens<'p> = Peekable<Enumerate<Chars<'p>>>;

/// Builds a compiled [`Regex`] from pattern text.
///
/// The builder keeps its scratch buffers between calls to
/// [`build`](Self::build), so compiling many patterns with one builder
/// allocates less.
#[derive(Debug, Default)]
pub struct RegexBuilder {
    states: Vec<State>,
    /// Deduplicated class table; indices are stored in
    /// [`State::CharClass`].
    classes: IndexSet<CharClass>,
    /// Alternatives finished so far, in pattern order.
    alternatives: Vec<Fragment>,
}

impl RegexBuilder {
    /// Push a new state and return its index.
    fn state(&mut self, state: State) -> StateIdx {
        let idx = StateIdx(self.states.len() as u32);
        self.states.push(state);
        idx
    }

    #[inline]
    fn state_mut(&mut self, idx: StateIdx) -> &mut State {
        &mut self.states.as_mut_slice()[idx]
    }

    /// Return the index of `class` in `self.classes`, inserting it if it is
    /// not already present.
    fn intern_class(&mut self, class: CharClass) -> ClassIdx {
        let (idx, _) = self.classes.insert_full(class);
        ClassIdx(idx)
    }

    /// Make the edge from `pred` lead to `target`.  A `NONE` predecessor
    /// means `target` becomes the first state of the chain.
    fn link(&mut self, chain: &mut Chain, pred: StateIdx, target: StateIdx) {
        if pred == StateIdx::NONE {
            chain.frag.start = target;
        } else {
            self.state_mut(pred).set_out(target);
        }
    }

    /// Append a consuming state to the chain and advance its tail.
    fn push_unit(&mut self, chain: &mut Chain, state: State) {
        let idx = self.state(state);
        let pred = chain.frag.out;
        self.link(chain, pred, idx);
        chain.frag.out = idx;
        chain.last_unit = Some((pred, idx));
    }

    /// Wrap the chain's last unit in a [`State::Repeat`].
    ///
    /// The unit's edge is rewired to loop back to the `Repeat`, which
    /// becomes the new tail.  For `*` the predecessor is also rewired to
    /// the `Repeat`, so the unit can be skipped entirely.  For `+` the
    /// predecessor keeps pointing at the unit and the first pass is
    /// mandatory.
    fn wrap_in_repeat(
        &mut self,
        chain: &mut Chain,
        repetition: Repetition,
        position: usize,
    ) -> Result<(), CompileError> {
        let Some((pred, unit)) = chain.last_unit.take() else {
            return Err(CompileError::DanglingRepetition {
                op: repetition.op(),
                position,
            });
        };
        let repeat = self.state(State::Repeat {
            inner: unit,
            out: StateIdx::NONE,
        });
        self.state_mut(unit).set_out(repeat);
        if repetition == Repetition::ZeroOrMore {
            self.link(chain, pred, repeat);
        }
        chain.frag.out = repeat;
        Ok(())
    }

    /// Parse a bracket class whose `[` sits at `open`.  On return `tokens`
    /// is positioned right after the closing `]`.
    fn parse_class(&mut self, tokens: &mut Tokens<'_>, open: usize) -> Result<ClassIdx, CompileError> {
        let negated = tokens.next_if(|&(_, ch)| ch == '^').is_some();

        let mut members = Vec::new();
        loop {
            match tokens.next() {
                Some((_, ']')) => break,
                Some(member) => members.push(member),
                None => return Err(CompileError::UnterminatedClass(open)),
            }
        }

        let mut ranges = Vec::with_capacity(members.len());
        let mut k = 0;
        while k < members.len() {
            let (position, start) = members[k];
            match (members.get(k + 1), members.get(k + 2)) {
                (Some(&(_, '-')), Some(&(_, end))) => {
                    if end < start {
                        return Err(CompileError::InvalidRange {
                            start,
                            end,
                            position,
                        });
                    }
                    ranges.push((start, end));
                    k += 3;
                }
                _ => {
                    ranges.push((start, start));
                    k += 1;
                }
            }
        }

        Ok(self.intern_class(CharClass::new(ranges, negated)))
    }

    /// Combine the finished alternatives into a single fragment.  With more
    /// than one alternative, a right-leaning tree of `Split` states fans out
    /// to every chain and a single `Join` collects their tails.
    fn union(&mut self) -> Fragment {
        let mut alternatives = std::mem::take(&mut self.alternatives);
        let frag = match alternatives.len() {
            0 => Fragment::EMPTY,
            1 => alternatives[0],
            _ => {
                let join = self.state(State::Join {
                    out: StateIdx::NONE,
                });
                for alternative in alternatives.iter() {
                    self.state_mut(alternative.out).set_out(join);
                }
                let mut rest = alternatives.pop().map_or(StateIdx::NONE, |a| a.start);
                while let Some(alternative) = alternatives.pop() {
                    rest = self.state(State::Split {
                        out: alternative.start,
                        out1: rest,
                    });
                }
                Fragment::new(rest, join)
            }
        };
        alternatives.clear();
        self.alternatives = alternatives;
        frag
    }

    /// Compile `pattern` into a ready-to-match [`Regex`].
    ///
    /// On error nothing is returned: a partially wired automaton never
    /// leaves the builder.
    pub fn build(&mut self, pattern: &str) -> Result<Regex, CompileError> {
        self.states.clear();
        self.classes.clear();
        self.alternatives.clear();

        let start = self.state(State::Start {
            out: StateIdx::NONE,
        });

        let mut chain = Chain::new();
        let mut last_bar = None;
        let mut tokens: Tokens<'_> = pattern.chars().enumerate().peekable();

        while let Some((position, ch)) = tokens.next() {
            match ch {
                '*' => self.wrap_in_repeat(&mut chain, Repetition::ZeroOrMore, position)?,
                '+' => self.wrap_in_repeat(&mut chain, Repetition::OneOrMore, position)?,
                '|' => {
                    if chain.frag.is_empty() {
                        return Err(CompileError::EmptyAlternative(position));
                    }
                    self.alternatives.push(chain.frag);
                    chain = Chain::new();
                    last_bar = Some(position);
                }
                '[' => {
                    let class = self.parse_class(&mut tokens, position)?;
                    self.push_unit(
                        &mut chain,
                        State::CharClass {
                            class,
                            out: StateIdx::NONE,
                        },
                    );
                }
                '.' => self.push_unit(
                    &mut chain,
                    State::Wildcard {
                        out: StateIdx::NONE,
                    },
                ),
                _ => self.push_unit(
                    &mut chain,
                    State::Literal {
                        ch,
                        out: StateIdx::NONE,
                    },
                ),
            }
        }

        if let Some(position) = last_bar {
            if chain.frag.is_empty() {
                return Err(CompileError::EmptyAlternative(position));
            }
        }
        if !chain.frag.is_empty() {
            self.alternatives.push(chain.frag);
        }

        let body = self.union();
        let termination = self.state(State::Termination);
        if body.is_empty() {
            self.state_mut(start).set_out(termination);
        } else {
            self.state_mut(start).set_out(body.start);
            self.state_mut(body.out).set_out(termination);
        }

        debug!(
            "compiled pattern {:?} into {} states and {} classes",
            pattern,
            self.states.len(),
            self.classes.len()
        );

        Ok(Regex {
            pattern: pattern.into(),
            states: StateList(self.states.to_vec().into_boxed_slice()),
            start,
            termination,
            classes: self.classes.drain(..).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Frontier simulation
// ---------------------------------------------------------------------------

/// Reusable buffers for [`Matcher`].
///
/// Keep one per thread and call [`matcher`](Self::matcher) for each input;
/// the buffers retain their capacity across calls.
#[derive(Debug, Default)]
pub struct MatcherMemory {
    /// Per-state: the `listid` when the state was last added.  Used for
    /// O(1) deduplication in `addstate`.
    lastlist: Vec<usize>,
    /// Current and next frontiers (swapped each step).
    clist: Vec<StateIdx>,
    nlist: Vec<StateIdx>,
    /// Work stack for the epsilon closure.
    stack: Vec<StateIdx>,
}

impl MatcherMemory {
    /// Start a new match of `regex`.  The returned matcher is positioned
    /// before the first character.
    pub fn matcher<'a>(&'a mut self, regex: &'a Regex) -> Matcher<'a> {
        self.lastlist.clear();
        self.lastlist.resize(regex.states.len(), usize::MAX);
        self.clist.clear();
        self.nlist.clear();
        self.stack.clear();

        let mut m = Matcher {
            states: &regex.states,
            classes: &regex.classes,
            termination: regex.termination,
            lastlist: &mut self.lastlist,
            listid: 0,
            clist: &mut self.clist,
            nlist: &mut self.nlist,
            stack: &mut self.stack,
            consumed: 0,
        };

        m.startlist(regex.start);
        m
    }
}

/// Runs the frontier simulation of a [`Regex`] over one input.
///
/// Input may be fed in any number of [`step`](Self::step) and
/// [`chunk`](Self::chunk) calls; the verdict depends only on the
/// concatenation of everything fed.
#[derive(Debug)]
pub struct Matcher<'a> {
    states: &'a [State],
    classes: &'a [CharClass],
    termination: StateIdx,
    /// Per-state deduplication stamp (compared against `listid`).
    lastlist: &'a mut [usize],
    /// Monotonically increasing step ID.
    listid: usize,
    /// Current frontier: consuming states plus, possibly, `Termination`.
    clist: &'a mut Vec<StateIdx>,
    /// Next frontier (built during a step).
    nlist: &'a mut Vec<StateIdx>,
    stack: &'a mut Vec<StateIdx>,
    /// Characters fed so far.
    consumed: usize,
}

impl<'a> Matcher<'a> {
    /// Compute the initial frontier, the epsilon closure of `start`.
    #[inline]
    fn startlist(&mut self, start: StateIdx) {
        self.addstate(start);
        std::mem::swap(self.clist, self.nlist);
        self.listid += 1;
    }

    /// Add `idx` and every state reachable from it through zero-width
    /// edges to `nlist`.
    ///
    /// Only states that can take part in the next step are recorded:
    /// consuming states and `Termination`.  The `lastlist`/`listid` stamp
    /// guarantees each state is expanded at most once per step, which
    /// bounds a step by the automaton size no matter how many `Repeat` and
    /// `Split` states the paths cross.  An explicit stack keeps long
    /// `a*b*c*...` chains from growing the call stack.
    fn addstate(&mut self, idx: StateIdx) {
        self.stack.push(idx);
        while let Some(idx) = self.stack.pop() {
            let i = idx.idx();
            if self.lastlist[i] == self.listid {
                continue;
            }
            self.lastlist[i] = self.listid;

            match self.states[idx].edges() {
                Edges::Epsilon(out) => self.stack.push(out),
                Edges::EpsilonFork(out, out1) => {
                    self.stack.push(out1);
                    self.stack.push(out);
                }
                Edges::Consuming(_) | Edges::None => self.nlist.push(idx),
            }
        }
    }

    /// Advance the simulation by one input character.
    ///
    /// Every frontier state that accepts `ch` contributes the closure of its
    /// consuming edge to the next frontier.  Once the frontier is empty it
    /// stays empty, and further steps return immediately.
    pub fn step(&mut self, ch: char) {
        if self.clist.is_empty() {
            return;
        }

        self.nlist.clear();
        let clist = std::mem::take(self.clist);
        let states = self.states;

        for &idx in &clist {
            let state = &states[idx];
            if state.accepts(ch, self.classes) {
                if let Edges::Consuming(out) = state.edges() {
                    self.addstate(out);
                }
            }
        }

        *self.clist = std::mem::replace(self.nlist, clist);
        self.listid += 1;
        self.consumed += 1;

        if self.clist.is_empty() {
            trace!(
                "frontier emptied after {} characters at {:?}, rejecting",
                self.consumed, ch
            );
        }
    }

    /// Feed a whole string slice through the matcher, one character at a
    /// time.  Stops early once the input can no longer be accepted.
    pub fn chunk(&mut self, input: &str) {
        for ch in input.chars() {
            if self.is_dead() {
                break;
            }
            self.step(ch);
        }
    }

    /// `true` once no continuation of the input fed so far can be accepted.
    pub fn is_dead(&self) -> bool {
        self.clist.is_empty()
    }

    /// Whether the input fed so far, taken as the complete input, is
    /// accepted.
    pub fn is_accepting(&self) -> bool {
        self.clist.contains(&self.termination)
    }

    /// Signal end-of-input and return the verdict.
    ///
    /// Consumes the matcher, since no further input can be fed once the
    /// input is complete.
    pub fn finish(self) -> bool {
        self.is_accepting()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
