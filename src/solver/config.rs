/// Tuning parameters of the CDCL core.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Variable activity decay factor.
    pub var_decay: f64,
    /// Clause activity decay factor.
    pub clause_decay: f64,
    /// Conflicts before the first restart.
    pub restart_first: u64,
    /// Base of the Luby restart sequence.
    pub restart_inc: f64,
    /// Initial learnt clause limit as a fraction of the original clauses.
    pub learntsize_factor: f64,
    /// Growth of the learnt clause limit on every restart.
    pub learntsize_inc: f64,
    /// Drop redundant literals from learnt clauses.
    pub clause_minimization: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            var_decay: 0.95,
            clause_decay: 0.999,
            restart_first: 100,
            restart_inc: 2.0,
            learntsize_factor: 1.0 / 3.0,
            learntsize_inc: 1.1,
            clause_minimization: true,
        }
    }
}

impl SolverConfig {
    pub fn with_var_decay(mut self, var_decay: f64) -> Self {
        assert!(
            var_decay > 0.0 && var_decay < 1.0,
            "Variable decay should be in the range (0, 1)"
        );
        self.var_decay = var_decay;
        self
    }

    pub fn with_clause_decay(mut self, clause_decay: f64) -> Self {
        assert!(
            clause_decay > 0.0 && clause_decay < 1.0,
            "Clause decay should be in the range (0, 1)"
        );
        self.clause_decay = clause_decay;
        self
    }

    pub fn with_restart_first(mut self, restart_first: u64) -> Self {
        assert!(restart_first > 0, "First restart interval should be positive");
        self.restart_first = restart_first;
        self
    }

    pub fn with_restart_inc(mut self, restart_inc: f64) -> Self {
        assert!(restart_inc > 1.0, "Restart increment should be greater than 1");
        self.restart_inc = restart_inc;
        self
    }

    pub fn with_learntsize_factor(mut self, learntsize_factor: f64) -> Self {
        self.learntsize_factor = learntsize_factor;
        self
    }

    pub fn with_learntsize_inc(mut self, learntsize_inc: f64) -> Self {
        self.learntsize_inc = learntsize_inc;
        self
    }

    pub fn with_clause_minimization(mut self, clause_minimization: bool) -> Self {
        self.clause_minimization = clause_minimization;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = SolverConfig::default()
            .with_var_decay(0.8)
            .with_restart_first(50)
            .with_clause_minimization(false);
        assert_eq!(config.var_decay, 0.8);
        assert_eq!(config.restart_first, 50);
        assert!(!config.clause_minimization);
        assert_eq!(config.clause_decay, SolverConfig::default().clause_decay);
    }

    #[test]
    #[should_panic(expected = "Variable decay")]
    fn test_bad_decay() {
        let _ = SolverConfig::default().with_var_decay(1.5);
    }
}
