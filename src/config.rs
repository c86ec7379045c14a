//! Reasoner configuration knobs.

/// Tunable limits and feature flags for the engine.
#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    /// Maximum number of stored assertions.
    pub capacity: usize,
    /// Derived candidates deeper than this are discarded.
    pub max_derivation_depth: u32,
    /// Derived terms heavier than this are discarded.
    pub max_derived_term_weight: u64,
    pub commit_queue_capacity: usize,
    pub task_queue_capacity: usize,
    /// Lower bound on the inference worker pool size.
    pub min_inference_workers: usize,
    /// Multiplier applied to the minimum supporter priority of a derivation.
    pub derived_priority_decay: f64,
    /// Store bare `forall` facts for instantiation against new ground facts.
    pub enable_forward_instantiation: bool,
    /// Install rule-shaped derived consequents as new rules.
    pub enable_rule_derivation: bool,
    /// Eliminate existentials by introducing skolem terms.
    pub enable_skolemization: bool,
    /// Priority base for facts arriving from files or the broadcast surface.
    pub input_priority_base: f64,
    /// Priority base for facts arriving from the language-model adapter.
    pub adapter_priority_base: f64,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            capacity: 65_536,
            max_derivation_depth: 10,
            max_derived_term_weight: 150,
            commit_queue_capacity: 1 << 20,
            task_queue_capacity: 1 << 20,
            min_inference_workers: 2,
            derived_priority_decay: 0.95,
            enable_forward_instantiation: true,
            enable_rule_derivation: true,
            enable_skolemization: true,
            input_priority_base: 10.0,
            adapter_priority_base: 15.0,
        }
    }
}

impl ReasonerConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_max_derivation_depth(mut self, depth: u32) -> Self {
        self.max_derivation_depth = depth;
        self
    }

    pub fn with_max_derived_term_weight(mut self, weight: u64) -> Self {
        self.max_derived_term_weight = weight;
        self
    }

    pub fn with_min_inference_workers(mut self, workers: usize) -> Self {
        self.min_inference_workers = workers;
        self
    }

    pub fn with_forward_instantiation(mut self, enabled: bool) -> Self {
        self.enable_forward_instantiation = enabled;
        self
    }

    pub fn with_rule_derivation(mut self, enabled: bool) -> Self {
        self.enable_rule_derivation = enabled;
        self
    }

    pub fn with_skolemization(mut self, enabled: bool) -> Self {
        self.enable_skolemization = enabled;
        self
    }

    /// Worker pool size: at least `min_inference_workers`, scaling with half
    /// the available cores.
    pub fn worker_count(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        self.min_inference_workers.max(cores / 2)
    }
}
