//! The reasoner engine: one commit thread, a pool of inference workers, and
//! the machinery that turns committed assertions into new work.
//!
//! The commit thread serializes all knowledge-base writes. Workers only read
//! KB snapshots and push candidates back through the commit queue. All loops
//! observe a shared pause flag and a shutdown flag; every blocking wait
//! carries a short timeout, so shutdown joins complete in bounded time.

mod derive;
mod queue;
mod skolem;

pub use queue::{CommitSender, InferenceTask, TaskQueue, commit_queue};
pub use skolem::skolemize;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::config::ReasonerConfig;
use crate::event::EventSink;
use crate::kb::{Assertion, AssertionType, KnowledgeBase, PotentialAssertion, Rule, TermShapeError};
use crate::term::Term;
use crate::unify::{Bindings, match_pattern, substitute, unify};

use queue::OFFER_TIMEOUT;

/// Back-off after a worker fault before the next task.
const FAULT_BACKOFF: Duration = Duration::from_millis(50);

pub(crate) struct EngineCore {
    pub(crate) config: ReasonerConfig,
    pub(crate) kb: KnowledgeBase,
    pub(crate) commit: CommitSender,
    rules: RwLock<Vec<Arc<Rule>>>,
    tasks: TaskQueue,
    // Kept so `clear` can flush candidates the commit thread has not taken.
    commit_rx: Receiver<PotentialAssertion>,
    paused: Mutex<bool>,
    pause_cond: Condvar,
    shutdown: AtomicBool,
}

impl EngineCore {
    fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Block while the engine is paused, re-checking in bounded time.
    fn pause_gate(&self) {
        let mut paused = self.paused.lock();
        while *paused && !self.is_shut_down() {
            self.pause_cond
                .wait_for(&mut paused, Duration::from_millis(100));
        }
    }

    fn rules_snapshot(&self) -> Vec<Arc<Rule>> {
        self.rules.read().clone()
    }

    /// Compile and install a rule form, skipping directions already present
    /// (rule equality is by form). Returns how many rules were added.
    pub(crate) fn install_rule(
        &self,
        form: &Term,
        priority: f64,
    ) -> Result<usize, TermShapeError> {
        let compiled = Rule::compile(form, priority)?;
        let mut rules = self.rules.write();
        let mut added = 0;
        for rule in compiled {
            if rules.iter().any(|existing| **existing == rule) {
                continue;
            }
            tracing::debug!(form = %rule.form, id = %rule.id, "installed rule");
            rules.push(Arc::new(rule));
            added += 1;
        }
        Ok(added)
    }
}

/// The reasoning kernel: knowledge base, rule set, and inference threads.
pub struct Reasoner {
    core: Arc<EngineCore>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Reasoner {
    /// Build a reasoner and start its commit thread and worker pool.
    pub fn new(config: ReasonerConfig, events: EventSink) -> Self {
        let (commit_tx, commit_rx) = commit_queue(config.commit_queue_capacity);
        let core = Arc::new(EngineCore {
            kb: KnowledgeBase::new(config.capacity, events),
            commit: commit_tx,
            rules: RwLock::new(Vec::new()),
            tasks: TaskQueue::new(config.task_queue_capacity),
            commit_rx: commit_rx.clone(),
            paused: Mutex::new(false),
            pause_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            config,
        });

        let mut handles = Vec::new();
        {
            let core = Arc::clone(&core);
            handles.push(
                thread::Builder::new()
                    .name("noesis-commit".into())
                    .spawn(move || commit_loop(&core, &commit_rx))
                    .expect("spawn commit thread"),
            );
        }
        for i in 0..core.config.worker_count() {
            let core = Arc::clone(&core);
            handles.push(
                thread::Builder::new()
                    .name(format!("noesis-worker-{i}"))
                    .spawn(move || worker_loop(&core))
                    .expect("spawn worker thread"),
            );
        }

        Self {
            core,
            handles: Mutex::new(handles),
        }
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.core.config
    }

    pub fn kb(&self) -> &KnowledgeBase {
        &self.core.kb
    }

    /// Offer a candidate assertion to the commit queue. Sheds on saturation.
    pub fn submit(&self, candidate: PotentialAssertion) -> bool {
        self.core.commit.offer(candidate)
    }

    /// Install a rule form (`=>` or `<=>`; the latter installs both
    /// directions). Returns how many one-way rules were added.
    pub fn add_rule(&self, form: &Term, priority: f64) -> Result<usize, TermShapeError> {
        self.core.install_rule(form, priority)
    }

    /// Remove every installed rule whose form equals `form`.
    pub fn remove_rule(&self, form: &Term) -> bool {
        let mut rules = self.core.rules.write();
        let before = rules.len();
        rules.retain(|rule| rule.form != *form);
        before != rules.len()
    }

    pub fn rules(&self) -> Vec<Arc<Rule>> {
        self.core.rules_snapshot()
    }

    pub fn rule_count(&self) -> usize {
        self.core.rules.read().len()
    }

    /// Atomically flip the pause flag; unpausing wakes all gated threads.
    pub fn set_paused(&self, paused: bool) {
        *self.core.paused.lock() = paused;
        if !paused {
            self.core.pause_cond.notify_all();
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.core.paused.lock()
    }

    /// Pause, flush both queues, empty the KB and rule set, resume. Tasks
    /// already in flight finish their current step against the cleared
    /// state.
    pub fn clear(&self) {
        self.set_paused(true);
        self.core.tasks.clear();
        while self.core.commit_rx.try_recv().is_ok() {}
        self.core.kb.clear();
        self.core.rules.write().clear();
        self.set_paused(false);
    }

    /// Signal shutdown, wake every waiter, and join all threads. Loops
    /// observe the flag within one poll timeout.
    pub fn stop(&self) {
        self.core.shutdown.store(true, Ordering::Release);
        self.set_paused(false);
        self.core.tasks.wake_all();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("engine thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Reasoner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn commit_loop(core: &EngineCore, rx: &Receiver<PotentialAssertion>) {
    while !core.is_shut_down() {
        core.pause_gate();
        match rx.recv_timeout(OFFER_TIMEOUT) {
            Ok(candidate) => {
                if let Some(assertion) = core.kb.commit(candidate) {
                    post_commit(core, &assertion);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn worker_loop(core: &EngineCore) {
    while !core.is_shut_down() {
        core.pause_gate();
        let Some(task) = core.tasks.poll(OFFER_TIMEOUT) else {
            continue;
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| execute_task(core, &task)));
        if outcome.is_err() {
            tracing::error!(?task, "inference task panicked; worker continues");
            thread::sleep(FAULT_BACKOFF);
        }
    }
}

fn execute_task(core: &EngineCore, task: &InferenceTask) {
    match task {
        InferenceTask::MatchAntecedent {
            rule,
            trigger,
            bindings,
        } => derive::run_match_antecedent(core, rule, trigger, bindings),
        InferenceTask::ApplyOrderedRewrite { rewrite, target } => {
            derive::run_rewrite(core, rewrite, target);
        }
    }
}

/// Generate follow-up work for a freshly committed assertion: rule-match
/// tasks, rewrite tasks in both directions, and universal instantiation.
fn post_commit(core: &EngineCore, assertion: &Arc<Assertion>) {
    if assertion.assertion_type != AssertionType::Universal {
        enqueue_rule_matches(core, assertion);
        enqueue_rewrites(core, assertion);
    }
    if assertion.assertion_type == AssertionType::Ground {
        instantiate_universals(core, assertion);
    }
}

fn enqueue_rule_matches(core: &EngineCore, assertion: &Arc<Assertion>) {
    for rule in core.rules_snapshot() {
        for clause in &rule.antecedents {
            if Rule::clause_negated(clause) != assertion.is_negated {
                continue;
            }
            let Some(seed) = unify(
                Rule::clause_pattern(clause),
                assertion.effective_term(),
                &Bindings::default(),
            ) else {
                continue;
            };
            let priority = (rule.priority + assertion.priority) / 2.0;
            core.tasks.offer(
                InferenceTask::MatchAntecedent {
                    rule: Arc::clone(&rule),
                    trigger: assertion.id.clone(),
                    bindings: seed,
                },
                priority,
            );
        }
    }
}

fn enqueue_rewrites(core: &EngineCore, assertion: &Arc<Assertion>) {
    if derive::is_rewrite_rule(assertion) {
        let lhs = &assertion.kif.args()[0];
        for target in core.kb.ground_snapshot() {
            if target.id == assertion.id {
                continue;
            }
            if derive::has_redex(target.effective_term(), lhs) {
                let priority = (assertion.priority + target.priority) / 2.0;
                core.tasks.offer(
                    InferenceTask::ApplyOrderedRewrite {
                        rewrite: Arc::clone(assertion),
                        target,
                    },
                    priority,
                );
            }
        }
    } else {
        for equality in core.kb.oriented_equality_snapshot() {
            if equality.id == assertion.id {
                continue;
            }
            if derive::has_redex(assertion.effective_term(), &equality.kif.args()[0]) {
                let priority = (equality.priority + assertion.priority) / 2.0;
                core.tasks.offer(
                    InferenceTask::ApplyOrderedRewrite {
                        rewrite: equality,
                        target: Arc::clone(assertion),
                    },
                    priority,
                );
            }
        }
    }
}

/// Match a new ground assertion against every list sub-expression of each
/// relevant universal's body; complete coverage of the quantified variables
/// yields a closed instance.
fn instantiate_universals(core: &EngineCore, assertion: &Arc<Assertion>) {
    let Some(head) = assertion.effective_term().operator() else {
        return;
    };
    let head = Term::atom(head);
    for universal in core.kb.find_relevant_universals(&head) {
        if universal.derivation_depth >= core.config.max_derivation_depth {
            continue;
        }
        let body = universal.effective_term();
        for sub in list_subterms(body) {
            let Some(bindings) =
                match_pattern(sub, assertion.effective_term(), &Bindings::default())
            else {
                continue;
            };
            if !universal
                .quantified_vars
                .iter()
                .all(|v| bindings.contains_key(v))
            {
                continue;
            }
            let instance = substitute(body, &bindings);
            if instance.contains_variable() {
                continue;
            }
            let mut support = universal.support.clone();
            support.extend(assertion.support.iter().cloned());
            support.insert(universal.id.clone());
            support.insert(assertion.id.clone());
            derive::submit_candidate(
                core,
                instance,
                universal.priority.min(assertion.priority)
                    * core.config.derived_priority_decay,
                universal.derivation_depth.max(assertion.derivation_depth) + 1,
                support,
                "instantiation",
            );
        }
    }
}

/// All list-typed subterms of `term`, in pre-order, including `term` itself.
fn list_subterms(term: &Term) -> Vec<&Term> {
    let mut out = Vec::new();
    let mut stack = vec![term];
    while let Some(t) = stack.pop() {
        if let Some(children) = t.as_list() {
            out.push(t);
            for child in children.iter().rev() {
                stack.push(child);
            }
        }
    }
    out
}
