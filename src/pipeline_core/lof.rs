//! Density-based local-outlier scoring over a KD-tree, in novelty mode.
//!
//! Fitting stores the per-training-point k-distance and local reachability
//! density so unseen rows can be scored against the training population
//! without touching it again.

use kiddo::KdTree;
use kiddo::SquaredEuclidean;
use ndarray::Array2;

use crate::pipeline_core::{pad_points, MAX_DETECTOR_FEATURES};
use crate::utils::PipelineError;

/// Default neighborhood size for the local-outlier score
pub const DEFAULT_NEIGHBORS: usize = 20;

/// Floor for reachability sums so duplicate points cannot divide by zero
const DENSITY_FLOOR: f64 = 1e-10;

/// A fitted local-outlier-factor detector
pub struct LofDetector {
    tree: KdTree<f64, MAX_DETECTOR_FEATURES>,
    k_distance: Vec<f64>,
    local_density: Vec<f64>,
    k: usize,
    n_features: usize,
}

impl LofDetector {
    /// Fit the detector on training rows.
    ///
    /// `k` is capped at `n - 1`; at least two rows are required.
    pub fn fit(features: &Array2<f64>, k: usize) -> Result<Self, PipelineError> {
        let points = pad_points(features)?;
        let n = points.len();
        if n < 2 {
            return Err(PipelineError::Estimator(
                "local-outlier scoring needs at least 2 training rows".to_string(),
            ));
        }
        let k = k.min(n - 1).max(1);

        let mut tree: KdTree<f64, MAX_DETECTOR_FEATURES> = KdTree::new();
        for (i, point) in points.iter().enumerate() {
            tree.add(point, i as u64);
        }

        // k-distance and neighbor sets per training point (skip self)
        let mut k_distance = vec![0.0; n];
        let mut neighbor_sets: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
        for (i, point) in points.iter().enumerate() {
            let found = tree.nearest_n::<SquaredEuclidean>(point, k + 1);
            let neighbors: Vec<(usize, f64)> = found
                .iter()
                .skip(1)
                .map(|nb| (nb.item as usize, nb.distance.sqrt()))
                .collect();
            k_distance[i] = neighbors.last().map(|(_, d)| *d).unwrap_or(0.0);
            neighbor_sets.push(neighbors);
        }

        // local reachability density
        let mut local_density = vec![0.0; n];
        for i in 0..n {
            let reach_sum: f64 = neighbor_sets[i]
                .iter()
                .map(|(j, d)| d.max(k_distance[*j]))
                .sum();
            local_density[i] = k as f64 / reach_sum.max(DENSITY_FLOOR);
        }

        Ok(Self {
            tree,
            k_distance,
            local_density,
            k,
            n_features: features.ncols(),
        })
    }

    /// Score rows against the fitted training population.
    ///
    /// Returns the negated local outlier factor, so larger values mean more
    /// normal (the `score_samples` orientation).
    pub fn score(&self, features: &Array2<f64>) -> Result<Vec<f64>, PipelineError> {
        if features.ncols() != self.n_features {
            return Err(PipelineError::SchemaMismatch(format!(
                "detector was fit on {} columns, got {}",
                self.n_features,
                features.ncols()
            )));
        }
        let points = pad_points(features)?;
        Ok(points.iter().map(|p| self.score_point(p)).collect())
    }

    fn score_point(&self, point: &[f64; MAX_DETECTOR_FEATURES]) -> f64 {
        let found = self.tree.nearest_n::<SquaredEuclidean>(point, self.k);

        let mut reach_sum = 0.0;
        let mut density_sum = 0.0;
        for nb in &found {
            let j = nb.item as usize;
            let distance = nb.distance.sqrt();
            reach_sum += distance.max(self.k_distance[j]);
            density_sum += self.local_density[j];
        }

        let own_density = found.len() as f64 / reach_sum.max(DENSITY_FLOOR);
        let lof = (density_sum / found.len() as f64) / own_density.max(DENSITY_FLOOR);
        -lof
    }
}
