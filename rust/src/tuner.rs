//! Coefficient tuner: adapts the (power, cost, time) weights after each allocation.
//!
//! After every placement the weights move toward whichever of cost or time is
//! currently closer to its ceiling, then get renormalized with a softmax. The
//! update is a heuristic bias with no convergence guarantee.

/// Weight vector `(x, y, z)` on the probability simplex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Weights {
    /// x: weight of the standardized unit cost/power of the PE type.
    pub power: f64,
    /// y: weight of the standardized per-task cost.
    pub cost: f64,
    /// z: weight of the standardized per-task time.
    pub time: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            power: 1.0 / 3.0,
            cost: 1.0 / 3.0,
            time: 1.0 / 3.0,
        }
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.power + self.cost + self.time
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.power, self.cost, self.time]
    }
}

/// `exp(a_i) / Σ exp(a_j)`, shifted by the maximum for numerical safety.
pub fn softmax(values: [f64; 3]) -> [f64; 3] {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = values.map(|v| (v - max).exp());
    let total: f64 = exps.iter().sum();
    exps.map(|e| e / total)
}

/// Owner of the weight vector for one allocation pass.
#[derive(Clone, Debug)]
pub struct CoefficientTuner {
    weights: Weights,
    total_tasks: usize,
    time_ceiling: Option<f64>,
    cost_ceiling: Option<f64>,
}

impl CoefficientTuner {
    pub fn new(total_tasks: usize, time_ceiling: Option<f64>, cost_ceiling: Option<f64>) -> Self {
        Self {
            weights: Weights::default(),
            total_tasks,
            time_ceiling,
            cost_ceiling,
        }
    }

    pub fn weights(&self) -> Weights {
        self.weights
    }

    /// Apply the momentum update after a successful allocation.
    ///
    /// `allocated` counts placed tasks including the one just placed; `cost` and
    /// `time` are the running totals of the partial plan. Without both ceilings the
    /// weights are left unchanged.
    pub fn update(&mut self, allocated: usize, cost: f64, time: f64) -> Weights {
        let (Some(t_max), Some(c_max)) = (self.time_ceiling, self.cost_ceiling) else {
            return self.weights;
        };

        let mass = 1.0 + allocated as f64 / self.total_tasks.max(1) as f64;
        let v_cost = cost / c_max - time / t_max;
        let v_time = -v_cost;
        let p_cost = mass * v_cost;
        let p_time = mass * v_time;

        let [power, cost_w, time_w] = softmax([
            self.weights.power + p_cost,
            self.weights.cost + p_cost,
            self.weights.time + p_time,
        ]);
        self.weights = Weights {
            power,
            cost: cost_w,
            time: time_w,
        };
        self.weights
    }
}
